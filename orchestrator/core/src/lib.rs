// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Studio Infrastructure Core
//!
//! Declarative description of a game-studio cloud deployment: a private
//! network, a managed directory, version control and CI hosts, build-worker
//! and workstation templates, backup and name resolution. The description is
//! assembled into stacks and synthesized into deployment templates; nothing
//! here talks to a cloud API.
//!
//! # Architecture
//!
//! - **domain:** configuration records, the deployment aggregate, structural policies
//! - **application:** component builders and the orchestrator composing them
//! - **infrastructure:** bootstrap script templating, dependency ordering, template synthesis

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::orchestrator::assemble;
pub use domain::deployment::Deployment;
pub use domain::deployment_config::{DeploymentManifest, DeploymentSpec};
pub use infrastructure::cloudformation::{CloudAssembly, Synthesizer};
