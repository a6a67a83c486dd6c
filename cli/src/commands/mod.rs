// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the studio-infra CLI

pub mod check;
pub mod config;
pub mod graph;
pub mod synth;

pub use self::config::ConfigCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use studio_infra_core::{assemble, Deployment, DeploymentManifest};

/// Flags shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub vanilla: bool,
    pub out: PathBuf,
}

/// Load, override and validate the manifest.
pub fn load_manifest(globals: &GlobalArgs) -> Result<DeploymentManifest> {
    let (mut manifest, source) =
        DeploymentManifest::load(globals.config.as_deref()).context("Failed to load configuration")?;
    info!("Configuration: {}", source);

    if globals.vanilla {
        info!("--vanilla set: depot will not be seeded with sample data");
        manifest.spec.version_control.vanilla = true;
    }

    manifest.validate().context("Configuration validation failed")?;
    Ok(manifest)
}

/// Load the configuration and assemble the deployment it describes.
pub fn load_deployment(globals: &GlobalArgs) -> Result<Deployment> {
    let manifest = load_manifest(globals)?;
    info!("Assembling deployment '{}'", manifest.metadata.name);
    assemble(&manifest.spec)
}
