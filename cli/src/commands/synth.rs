// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Synthesize the cloud assembly

use anyhow::{Context, Result};
use colored::Colorize;

use studio_infra_core::Synthesizer;

use super::{load_deployment, GlobalArgs};

pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let deployment = load_deployment(globals)?;

    let assembly = Synthesizer::new()
        .synthesize(&deployment)
        .context("Failed to synthesize templates")?;

    assembly
        .write_to(&globals.out)
        .with_context(|| format!("Failed to write assembly to {}", globals.out.display()))?;

    println!("{}", "Stacks (deployment order):".bold());
    for stack in &assembly.stacks {
        let deps = if stack.dependencies.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            stack.dependencies.join(", ")
        };
        println!(
            "  {} {} resources, depends on {}",
            stack.name.bold(),
            stack.resource_count(),
            deps
        );
    }
    println!();
    println!(
        "{}",
        format!("✓ Assembly written: {}", globals.out.display()).green()
    );

    Ok(())
}
