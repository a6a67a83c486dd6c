// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Component builders. Each one declares its resources into the stack it is
//! handed and returns plain output records that the orchestrator threads into
//! the next component.

pub mod access_policy;
pub mod foundation;
pub mod directory;
pub mod backup;
pub mod version_control;
pub mod build_worker;
pub mod continuous_integration;
pub mod workstation;
pub mod name_resolution;
pub mod orchestrator;

use crate::domain::network::Peer;
use crate::domain::resource::{ResourceId, Value};
use crate::infrastructure::bootstrap_templates::ScriptTemplateEngine;
use foundation::FoundationOutputs;

/// Shared inputs every host component reads
#[derive(Clone, Copy)]
pub struct ComponentContext<'a> {
    pub foundation: &'a FoundationOutputs,
    /// Operator-supplied sources, passed through unvalidated
    pub allow_list: &'a [Peer],
    pub scripts: &'a ScriptTemplateEngine,
}

/// A running host as seen by later components
#[derive(Debug, Clone)]
pub struct HostOutputs {
    pub instance: ResourceId,
    /// Private address at creation time
    pub private_ip: Value,
    pub security_group: ResourceId,
}

impl HostOutputs {
    pub fn new(instance: ResourceId, security_group: ResourceId) -> Self {
        Self {
            private_ip: Value::attr(&instance, "PrivateIp"),
            instance,
            security_group,
        }
    }
}
