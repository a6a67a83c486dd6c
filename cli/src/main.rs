// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Studio Infrastructure CLI
//!
//! The `studio-infra` binary assembles the studio deployment from its
//! configuration and writes deployment templates for it.
//!
//! ## Commands
//!
//! - `studio-infra synth` - Write the cloud assembly (one template per stack plus a manifest)
//! - `studio-infra check` - Evaluate structural policies over the assembled deployment
//! - `studio-infra graph` - Print stack deployment order or a DOT dependency graph
//! - `studio-infra config show|validate|generate|schema` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use studio_infra::commands::{self, ConfigCommand, GlobalArgs};

/// Studio Infrastructure - Synthesize game-studio cloud deployments
#[derive(Parser)]
#[command(name = "studio-infra")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STUDIO_INFRA_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Skip seeding the depot with sample data
    #[arg(long, global = true)]
    vanilla: bool,

    /// Output directory for synthesized templates
    #[arg(long, global = true, env = "STUDIO_INFRA_OUT", default_value = "cdk.out")]
    out: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STUDIO_INFRA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the deployment and write its templates
    #[command(name = "synth")]
    Synth,

    /// Assemble the deployment and report policy violations
    #[command(name = "check")]
    Check,

    /// Show deployment ordering
    #[command(name = "graph")]
    Graph {
        /// Emit Graphviz DOT instead of a list
        #[arg(long)]
        dot: bool,

        /// Resource graph of one stack instead of the stack graph
        #[arg(long, value_name = "STACK")]
        stack: Option<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let globals = GlobalArgs {
        config: cli.config,
        vanilla: cli.vanilla,
        out: cli.out,
    };

    match cli.command {
        Commands::Synth => commands::synth::execute(&globals).await,
        Commands::Check => commands::check::execute(&globals).await,
        Commands::Graph { dot, stack } => commands::graph::execute(&globals, dot, stack).await,
        Commands::Config { command } => commands::config::handle_command(command, globals.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
