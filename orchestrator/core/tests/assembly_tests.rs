// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use studio_infra_core::application::orchestrator::{CICD_STACK, SETUP_STACK, VCS_STACK, WORKSTATION_STACK};
use studio_infra_core::assemble;
use studio_infra_core::domain::backup::{BACKUP_TAG_KEY, BACKUP_TAG_VALUE};
use studio_infra_core::domain::deployment::{Deployment, ResourceKind};
use studio_infra_core::domain::deployment_config::{DeploymentManifest, DeploymentSpec};
use studio_infra_core::domain::iam::LIFECYCLE_ACTIONS;
use studio_infra_core::domain::network::Peer;
use studio_infra_core::domain::resource::Value;

fn spec() -> DeploymentSpec {
    let mut spec = DeploymentSpec::default();
    spec.access.allow_cidrs = vec!["198.51.100.0/24".to_string()];
    spec
}

fn instance_names(deployment: &Deployment) -> Vec<String> {
    deployment
        .instances()
        .filter_map(|(r, _)| r.tags.get("Name").map(str::to_string))
        .collect()
}

#[test]
fn test_env_overrides_reach_assembly() {
    let mut manifest = DeploymentManifest::default();
    manifest.apply_overrides_from(|key| match key {
        "ALLOW_CIDR" => Some("203.0.113.5/32, 198.51.100.0/24".to_string()),
        "ALLOW_PREFIX_LIST" => Some("pl-0abc".to_string()),
        "IS_SVN" => Some("yes".to_string()),
        _ => None,
    });

    let deployment = assemble(&manifest.spec).unwrap();
    assert_eq!(
        deployment.allow_list,
        vec![
            Peer::Cidr("203.0.113.5/32".into()),
            Peer::Cidr("198.51.100.0/24".into()),
            Peer::PrefixList("pl-0abc".into()),
        ]
    );
    assert_eq!(instance_names(&deployment), vec!["PerforcePrimary", "SVN", "Jenkins"]);
}

#[test]
fn test_every_durable_host_is_selected_for_backup() {
    let mut spec = spec();
    spec.version_control.svn = true;
    let deployment = assemble(&spec).unwrap();

    let protected: Vec<_> = deployment.backup_protected().into_iter().map(|r| r.id.clone()).collect();
    for (resource, instance) in deployment.instances() {
        if instance.holds_durable_data() {
            assert!(protected.contains(&resource.id), "{} not protected", resource.id);
            assert!(resource.tags.contains_pair(BACKUP_TAG_KEY, BACKUP_TAG_VALUE));
        }
    }
    // CI keeps its state in the backup bucket, not on durable volumes
    let ci = deployment.stack(CICD_STACK).unwrap();
    assert!(ci.resources.iter().all(|r| !protected.contains(&r.id)));
}

#[test]
fn test_lifecycle_grants_only_in_ci_stack() {
    let deployment = assemble(&spec()).unwrap();

    for resource in deployment.resources() {
        let ResourceKind::InlinePolicy(policy) = &resource.kind else {
            continue;
        };
        for statement in &policy.document.statements {
            if LIFECYCLE_ACTIONS.iter().any(|a| statement.grants(a)) {
                assert_eq!(resource.id.stack.as_str(), CICD_STACK);
                assert!(statement.is_tag_scoped());
            }
        }
    }
}

#[test]
fn test_workstation_joins_directory_from_setup_stack() {
    let deployment = assemble(&spec()).unwrap();
    let workstation = deployment.stack(WORKSTATION_STACK).unwrap();

    let join = workstation
        .resources
        .iter()
        .find_map(|r| match &r.kind {
            ResourceKind::DomainJoinAssociation(j) => Some(j),
            _ => None,
        })
        .unwrap();

    assert_eq!(join.directory_name, "corp.gamestudio.aws.internal");
    assert_eq!(join.directory_ou, "DC=corp,DC=gamestudio,DC=aws,DC=internal");
    let Value::List(addresses) = &join.dns_addresses else {
        panic!("expected a list of resolver addresses");
    };
    assert_eq!(addresses.len(), 2);
    for target in join.directory_id.references() {
        assert_eq!(target.stack.as_str(), SETUP_STACK);
    }

    let joined_templates = deployment
        .launch_templates()
        .filter(|(_, t)| t.instance_tags.contains_pair("Feature", "Join-AD"))
        .count();
    assert_eq!(joined_templates, 1);
}

#[test]
fn test_records_resolve_in_private_zone() {
    let mut spec = spec();
    spec.version_control.svn = true;
    let deployment = assemble(&spec).unwrap();

    let fqdns: Vec<_> = deployment.records().map(|r| r.fqdn()).collect();
    assert_eq!(
        fqdns,
        vec![
            "perforce.gamestudio.aws.internal",
            "svn.gamestudio.aws.internal",
            "jenkins.gamestudio.aws.internal",
        ]
    );

    let vcs = deployment.stack(VCS_STACK).unwrap();
    for record in vcs.resources.iter().filter(|r| matches!(r.kind, ResourceKind::ARecord(_))) {
        assert_eq!(record.depends_on.len(), 1);
        assert!(matches!(
            deployment.resource(&record.depends_on[0]).map(|r| &r.kind),
            Some(ResourceKind::Instance(_))
        ));
    }
}

#[test]
fn test_vanilla_skips_sample_depot() {
    let mut spec = spec();
    let seeded = assemble(&spec).unwrap();
    spec.version_control.vanilla = true;
    let vanilla = assemble(&spec).unwrap();

    let script = |d: &Deployment| {
        d.instances()
            .find(|(r, _)| r.tags.get("Name") == Some("PerforcePrimary"))
            .map(|(_, i)| i.user_data.preview())
            .unwrap()
    };
    assert!(script(&seeded).contains("sampledepot"));
    assert!(!script(&vanilla).contains("sampledepot"));
}
