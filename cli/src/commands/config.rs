// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate, schema

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use studio_infra_core::domain::deployment_config::{MANIFEST_ENV, USER_MANIFEST, WORKDIR_MANIFEST};
use studio_infra_core::DeploymentManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./studio-infra.yaml)
        #[arg(short, long, default_value = "./studio-infra.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },

    /// Print the JSON Schema of the configuration manifest
    Schema,
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
        ConfigCommand::Schema => schema().await,
    }
}

fn yes_no(flag: bool) -> colored::ColoredString {
    if flag {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let (config, source) =
        DeploymentManifest::load(config_override.as_deref()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            MANIFEST_ENV,
            std::env::var(MANIFEST_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./{}", WORKDIR_MANIFEST);
        println!("  4. ~/{}", USER_MANIFEST);
        println!();
    }
    println!("Loaded from: {}", source.to_string().cyan());
    println!();

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Deployment: {}", config.metadata.name);
    println!();

    println!("{}", "Access:".bold());
    let allow_list = spec.allow_list();
    if allow_list.is_empty() {
        println!("  {}", "(no allow-list entries; protected ports are VPC-only)".yellow());
    }
    for peer in &allow_list {
        println!("  - {}", peer);
    }
    println!();

    println!("{}", "Network:".bold());
    println!("  VPC range: {}", spec.network.vpc_cidr);
    println!("  Availability zones: {}", spec.network.max_azs);
    println!("  Private zone: {}", spec.network.zone_name);
    println!("  Directory: {}", spec.directory.name);
    println!();

    println!("{}", "Hosts:".bold());
    println!(
        "  Depot server: {} ({}.{}), sample data: {}",
        spec.version_control.perforce_instance_type,
        spec.version_control.perforce_record,
        spec.network.zone_name,
        yes_no(!spec.version_control.vanilla)
    );
    println!(
        "  HTTP repository: {}",
        if spec.version_control.svn {
            format!(
                "{} ({}.{})",
                spec.version_control.svn_instance_type, spec.version_control.svn_record, spec.network.zone_name
            )
        } else {
            "disabled".dimmed().to_string()
        }
    );
    println!(
        "  CI coordinator: {} ({}.{})",
        spec.ci.instance_type, spec.ci.record, spec.network.zone_name
    );
    println!(
        "  Build worker template: {} (tag {}={})",
        spec.build_worker.instance_type, spec.ci.worker_tag_key, spec.ci.worker_tag_value
    );
    println!(
        "  Workstation template: {}, distributed build: {}",
        spec.workstation.instance_type,
        yes_no(spec.workstation.incredibuild)
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let (config, source) = DeploymentManifest::load(config_path.as_deref()).context("Failed to load configuration")?;
    println!("  Source: {}", source);

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

async fn schema() -> Result<()> {
    let schema = DeploymentManifest::json_schema()?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
