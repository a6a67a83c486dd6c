// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deployment Orchestrator
//!
//! Composes the component builders into five stacks and threads each
//! component's outputs into the ones that consume them:
//!
//! ```text
//! SetupStack ──► VCSStack
//!     │    └───► BuildNodeStack ──► CICDStack
//!     └────────► WorkstationStack
//! ```
//!
//! Cross-stack values stay as references here; the synthesizer turns them
//! into exports and imports.

use anyhow::{Context, Result};
use tracing::info;

use super::backup::build_backup;
use super::build_worker::build_worker_template;
use super::continuous_integration::build_ci_host;
use super::directory::build_directory;
use super::foundation::build_foundation;
use super::name_resolution::bind_record;
use super::version_control::{build_perforce_host, build_svn_host};
use super::workstation::build_workstation_template;
use super::ComponentContext;
use crate::domain::deployment::{Deployment, Stack};
use crate::domain::deployment_config::DeploymentSpec;
use crate::domain::resource::Tags;
use crate::infrastructure::bootstrap_templates::ScriptTemplateEngine;

pub const SETUP_STACK: &str = "SetupStack";
pub const VCS_STACK: &str = "VCSStack";
pub const BUILD_NODE_STACK: &str = "BuildNodeStack";
pub const CICD_STACK: &str = "CICDStack";
pub const WORKSTATION_STACK: &str = "WorkstationStack";

/// Build the whole studio deployment from `spec`.
///
/// Allow-list entries are passed through as given; `policy::check_allow_list`
/// is where malformed ones surface.
pub fn assemble(spec: &DeploymentSpec) -> Result<Deployment> {
    spec.check_host_records()?;
    let allow_list = spec.allow_list();
    let scripts = ScriptTemplateEngine::new().context("Failed to initialize bootstrap templates")?;

    info!(
        "Assembling studio deployment ({} allow-list entries, svn: {}, vanilla: {})",
        allow_list.len(),
        spec.version_control.svn,
        spec.version_control.vanilla
    );

    let mut setup = Stack::new(SETUP_STACK, "Studio network, directory, shared buckets and backup plan");
    let foundation = build_foundation(&mut setup, spec).context("Failed to build network foundation")?;
    let directory =
        build_directory(&mut setup, &spec.directory.name, &foundation).context("Failed to build directory")?;
    let backup = build_backup(&mut setup).context("Failed to build backup plan")?;
    info!("{}: {} resources", SETUP_STACK, setup.resources.len());

    let ctx = ComponentContext {
        foundation: &foundation,
        allow_list: &allow_list,
        scripts: &scripts,
    };
    let vcs_config = &spec.version_control;

    let mut vcs = Stack::new(VCS_STACK, "Version control hosts");
    let perforce = build_perforce_host(&mut vcs, &ctx, &backup, vcs_config).context("Failed to build depot server")?;
    bind_record(&mut vcs, &foundation.zone, &foundation.zone_name, &vcs_config.perforce_record, &perforce)
        .context("Failed to bind depot server record")?;
    if vcs_config.svn {
        let svn = build_svn_host(&mut vcs, &ctx, &backup, vcs_config).context("Failed to build repository host")?;
        bind_record(&mut vcs, &foundation.zone, &foundation.zone_name, &vcs_config.svn_record, &svn)
            .context("Failed to bind repository host record")?;
    }
    info!("{}: {} resources", VCS_STACK, vcs.resources.len());

    let worker_tags = Tags::new().with(&spec.ci.worker_tag_key, &spec.ci.worker_tag_value);
    let mut build_node = Stack::new(BUILD_NODE_STACK, "Build worker launch template");
    let worker = build_worker_template(&mut build_node, &ctx, &spec.build_worker, &worker_tags)
        .context("Failed to build worker template")?;
    info!("{}: {} resources", BUILD_NODE_STACK, build_node.resources.len());

    let mut cicd = Stack::new(CICD_STACK, "CI coordinator");
    let ci = build_ci_host(&mut cicd, &ctx, &spec.ci, &worker).context("Failed to build CI coordinator")?;
    bind_record(&mut cicd, &foundation.zone, &foundation.zone_name, &spec.ci.record, &ci)
        .context("Failed to bind CI coordinator record")?;
    info!("{}: {} resources", CICD_STACK, cicd.resources.len());

    let mut workstation = Stack::new(WORKSTATION_STACK, "Remote workstation template and domain join");
    build_workstation_template(&mut workstation, &ctx, &spec.workstation, &directory)
        .context("Failed to build workstation template")?;
    info!("{}: {} resources", WORKSTATION_STACK, workstation.resources.len());

    let mut deployment = Deployment::new(allow_list);
    for stack in [setup, vcs, build_node, cicd, workstation] {
        deployment.push(stack);
    }

    info!(
        "Assembled {} stacks with {} resources",
        deployment.stacks.len(),
        deployment.resource_count()
    );
    Ok(deployment)
}
