// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dependency graph views

use anyhow::{Context, Result};
use colored::Colorize;

use studio_infra_core::infrastructure::DependencyGraph;

use super::{load_deployment, GlobalArgs};

pub async fn execute(globals: &GlobalArgs, dot: bool, stack: Option<String>) -> Result<()> {
    let deployment = load_deployment(globals)?;

    let graph = match &stack {
        Some(name) => {
            let stack = deployment
                .stack(name)
                .with_context(|| format!("No stack named '{}'", name))?;
            DependencyGraph::for_resources(stack)?
        }
        None => DependencyGraph::for_stacks(&deployment)?,
    };

    if dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    let order = graph.deployment_order()?;
    println!("{}", "Deployment order:".bold());
    for (i, label) in order.iter().enumerate() {
        let deps = graph.dependencies_of(label);
        if deps.is_empty() {
            println!("  {}. {}", i + 1, label);
        } else {
            println!("  {}. {} {}", i + 1, label, format!("<- {}", deps.join(", ")).dimmed());
        }
    }

    Ok(())
}
