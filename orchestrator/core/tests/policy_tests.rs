// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use studio_infra_core::assemble;
use studio_infra_core::domain::backup::BACKUP_TAG_KEY;
use studio_infra_core::domain::deployment::{Deployment, Resource, ResourceKind};
use studio_infra_core::domain::deployment_config::DeploymentSpec;
use studio_infra_core::domain::network::{IngressRule, Peer};
use studio_infra_core::domain::policy::{self, PolicyViolation};

fn deployment() -> Deployment {
    let mut spec = DeploymentSpec::default();
    spec.access.allow_cidrs = vec!["192.0.2.0/24".to_string()];
    assemble(&spec).unwrap()
}

fn perforce_host(deployment: &mut Deployment) -> &mut Resource {
    deployment
        .stacks
        .iter_mut()
        .flat_map(|s| s.resources.iter_mut())
        .find(|r| r.tags.get("Name") == Some("PerforcePrimary"))
        .unwrap()
}

#[test]
fn test_assembled_deployment_is_clean() {
    assert_eq!(policy::evaluate(&deployment()), Vec::new());
}

#[test]
fn test_open_world_on_protected_port_is_flagged() {
    let mut deployment = deployment();
    for sg in deployment
        .stacks
        .iter_mut()
        .flat_map(|s| s.resources.iter_mut())
        .filter_map(|r| match &mut r.kind {
            ResourceKind::SecurityGroup(sg) => Some(sg),
            _ => None,
        })
    {
        sg.allow(IngressRule::tcp(Peer::Cidr("0.0.0.0/0".into()), 3389));
    }

    let violations = policy::check_protected_ingress(&deployment);
    // only groups protecting the port are reported
    assert!(!violations.is_empty());
    assert!(violations
        .iter()
        .all(|v| matches!(v, PolicyViolation::UnrestrictedIngress { peer, .. } if peer == "0.0.0.0/0")));
}

#[test]
fn test_allow_list_peer_outside_deployment_list_is_flagged() {
    let mut deployment = deployment();
    deployment.allow_list.clear();

    let violations = policy::check_protected_ingress(&deployment);
    assert!(violations
        .iter()
        .any(|v| matches!(v, PolicyViolation::UnrestrictedIngress { peer, .. } if peer == "192.0.2.0/24")));
}

#[test]
fn test_untagged_durable_host_is_flagged() {
    let mut deployment = deployment();
    let host = perforce_host(&mut deployment);
    host.tags.0.remove(BACKUP_TAG_KEY);
    let id = host.id.clone();

    assert_eq!(
        policy::check_durable_volumes(&deployment),
        vec![PolicyViolation::BackupTagMissing { host: id }]
    );
}

#[test]
fn test_deletable_durable_volume_is_flagged() {
    let mut deployment = deployment();
    let host = perforce_host(&mut deployment);
    let ResourceKind::Instance(instance) = &mut host.kind else {
        panic!("not an instance");
    };
    let depot = instance
        .block_devices
        .iter_mut()
        .find(|d| d.purpose.is_durable())
        .unwrap();
    depot.delete_on_termination = true;
    let device = depot.device_name.clone();
    let id = host.id.clone();

    assert_eq!(
        policy::check_durable_volumes(&deployment),
        vec![PolicyViolation::DurableVolumeDeletable { host: id, device }]
    );
}

#[test]
fn test_unscoped_lifecycle_grant_is_flagged() {
    let mut deployment = deployment();
    let mut stripped = 0;
    for resource in deployment.stacks.iter_mut().flat_map(|s| s.resources.iter_mut()) {
        if let ResourceKind::InlinePolicy(policy) = &mut resource.kind {
            for statement in &mut policy.document.statements {
                if statement.grants("ec2:TerminateInstances") {
                    statement.conditions.clear();
                    stripped += 1;
                }
            }
        }
    }
    assert_eq!(stripped, 1);

    let violations = policy::check_lifecycle_conditions(&deployment);
    assert_eq!(violations.len(), 3);
}

#[test]
fn test_malformed_allow_list_only_surfaces_in_check() {
    let mut spec = DeploymentSpec::default();
    spec.access.allow_cidrs = vec!["192.0.2.0/24".to_string(), "192.0.2.0/33".to_string()];
    let deployment = assemble(&spec).unwrap();

    let violations = policy::evaluate(&deployment);
    assert_eq!(violations.len(), 1);
    assert!(matches!(
        &violations[0],
        PolicyViolation::MalformedAllowListEntry { entry, .. } if entry == "192.0.2.0/33"
    ));
}
