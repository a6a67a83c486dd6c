// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Structural policy check
//!
//! Exits non-zero when any violation is found, so it can gate a pipeline.

use anyhow::{bail, Result};
use colored::Colorize;

use studio_infra_core::domain::policy;

use super::{load_deployment, GlobalArgs};

pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let deployment = load_deployment(globals)?;

    println!(
        "Checking {} stacks, {} resources...",
        deployment.stacks.len(),
        deployment.resource_count()
    );

    let violations = policy::evaluate(&deployment);
    if violations.is_empty() {
        println!("{}", "✓ All policies hold".green());
        return Ok(());
    }

    for violation in &violations {
        println!("  {} {}", "✗".red(), violation);
    }
    bail!("{} policy violation(s)", violations.len());
}
