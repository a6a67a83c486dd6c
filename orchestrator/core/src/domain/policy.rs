// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Structural Policy Checks
//!
//! Properties every assembled [`Deployment`] must hold regardless of
//! configuration: protected ports stay behind the allow-list, durable volumes
//! survive termination and are picked up by backups, lifecycle permissions are
//! tag-scoped, private zones resolve, and every reference points somewhere.

use ipnet::IpNet;
use thiserror::Error;

use super::deployment::{Deployment, ResourceKind};
use super::iam::LIFECYCLE_ACTIONS;
use super::network::{Peer, PortRange};
use super::resource::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("security group {security_group} exposes protected port {ports} to {peer}")]
    UnrestrictedIngress {
        security_group: ResourceId,
        ports: PortRange,
        peer: String,
    },

    #[error("{host}: durable volume {device} is deleted on termination")]
    DurableVolumeDeletable { host: ResourceId, device: String },

    #[error("{host} holds durable volumes but no backup selection matches its tags")]
    BackupTagMissing { host: ResourceId },

    #[error("{policy} grants {action} without a resource-tag condition")]
    UnconditionalLifecycleAction { policy: ResourceId, action: String },

    #[error("private zone {zone} is attached to {vpc} which does not resolve internal names")]
    PrivateZoneWithoutDns { zone: ResourceId, vpc: ResourceId },

    #[error("allow-list entry '{entry}' is not a valid CIDR: {reason}")]
    MalformedAllowListEntry { entry: String, reason: String },

    #[error("{from} references {to}, which is not declared")]
    DanglingReference { from: ResourceId, to: ResourceId },
}

/// Run every structural check over `deployment`.
pub fn evaluate(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    violations.extend(check_protected_ingress(deployment));
    violations.extend(check_durable_volumes(deployment));
    violations.extend(check_lifecycle_conditions(deployment));
    violations.extend(check_private_zones(deployment));
    violations.extend(check_allow_list(&deployment.allow_list));
    violations.extend(check_references(deployment));
    violations
}

pub fn check_protected_ingress(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    for resource in deployment.resources() {
        let ResourceKind::SecurityGroup(sg) = &resource.kind else {
            continue;
        };

        for rule in &sg.ingress {
            if !sg.is_protected(&rule.ports) {
                continue;
            }
            let admitted = match &rule.peer {
                Peer::VpcCidr(_) => true,
                peer if peer.is_unrestricted() => false,
                peer => deployment.allow_list.contains(peer),
            };
            if !admitted {
                violations.push(PolicyViolation::UnrestrictedIngress {
                    security_group: resource.id.clone(),
                    ports: rule.ports,
                    peer: rule.peer.to_string(),
                });
            }
        }
    }

    violations
}

/// Delete-on-termination and backup coverage for every host holding durable data.
pub fn check_durable_volumes(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    let selections: Vec<_> = deployment.backup_selections().collect();

    for host in deployment.instances_and_templates() {
        let mut durable = false;
        for dev in host.block_devices.iter().filter(|d| d.purpose.is_durable()) {
            durable = true;
            if dev.delete_on_termination {
                violations.push(PolicyViolation::DurableVolumeDeletable {
                    host: host.resource.id.clone(),
                    device: dev.device_name.clone(),
                });
            }
        }

        if durable && !selections.iter().any(|s| s.matches(host.tags)) {
            violations.push(PolicyViolation::BackupTagMissing {
                host: host.resource.id.clone(),
            });
        }
    }

    violations
}

pub fn check_lifecycle_conditions(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    for resource in deployment.resources() {
        let ResourceKind::InlinePolicy(policy) = &resource.kind else {
            continue;
        };
        for statement in &policy.document.statements {
            if statement.is_tag_scoped() {
                continue;
            }
            for action in LIFECYCLE_ACTIONS {
                if statement.grants(action) {
                    violations.push(PolicyViolation::UnconditionalLifecycleAction {
                        policy: resource.id.clone(),
                        action: action.to_string(),
                    });
                }
            }
        }
    }

    violations
}

pub fn check_private_zones(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    for resource in deployment.resources() {
        let ResourceKind::HostedZone(zone) = &resource.kind else {
            continue;
        };
        let resolves = matches!(
            deployment.resource(&zone.vpc).map(|r| &r.kind),
            Some(ResourceKind::Vpc(vpc)) if vpc.resolves_internal_names()
        );
        if !resolves {
            violations.push(PolicyViolation::PrivateZoneWithoutDns {
                zone: resource.id.clone(),
                vpc: zone.vpc.clone(),
            });
        }
    }

    violations
}

/// Parse each operator-supplied CIDR. Prefix-list ids are opaque and not checked.
pub fn check_allow_list(allow_list: &[Peer]) -> Vec<PolicyViolation> {
    allow_list
        .iter()
        .filter_map(|peer| match peer {
            Peer::Cidr(entry) => entry
                .parse::<IpNet>()
                .err()
                .map(|e| PolicyViolation::MalformedAllowListEntry {
                    entry: entry.clone(),
                    reason: e.to_string(),
                }),
            _ => None,
        })
        .collect()
}

pub fn check_references(deployment: &Deployment) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    for resource in deployment.resources() {
        for target in resource.dependencies() {
            if deployment.resource(&target).is_none() {
                violations.push(PolicyViolation::DanglingReference {
                    from: resource.id.clone(),
                    to: target,
                });
            }
        }
    }

    violations
}
