// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Version Control Hosts
//!
//! Two variants share one shape: a single instance in a public subnet, a
//! security group admitting the primary protocol only from the allow-list and
//! the VPC range, durable data volumes, and a first-boot script.
//!
//! - **Centralized HTTP** (`build_svn_host`): port 80, one repository volume,
//!   administrator password read from a generated secret at boot.
//! - **Distributed depot** (`build_perforce_host`): ports 1666 and 1999, depot,
//!   metadata and log volumes, optional sample-data seeding.
//!
//! Both instances carry the backup tag so the daily plan snapshots their volumes.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::access_policy::{attach_policy, declare_host_role};
use super::backup::BackupOutputs;
use super::{ComponentContext, HostOutputs};
use crate::domain::compute::{BlockDevice, EbsVolumeType, InstanceSpec, InstanceType, MachineImage, VolumePurpose};
use crate::domain::deployment::{ResourceKind, Stack};
use crate::domain::deployment_config::VersionControlConfig;
use crate::domain::iam::{grant_secret_read, RoleSpec, EC2_SERVICE};
use crate::domain::network::{IngressRule, Peer, PortRange, Protocol, SecurityGroupSpec};
use crate::domain::resource::{Tags, Value};
use crate::domain::storage::SecretSpec;
use crate::infrastructure::bootstrap_templates::{concat_scripts, templates, ScriptContext};

pub const SVN_HTTP_PORT: u16 = 80;
pub const P4_PORT: u16 = 1666;
pub const P4_SECONDARY_PORT: u16 = 1999;

const ROOT_DEVICE: &str = "/dev/xvda";
const SVN_ADMIN_USER: &str = "admin";
const SVN_REPO_ROOT: &str = "/svn";
const SVN_REPO_NAME: &str = "testrepo";
const P4_SERVER_ID: &str = "master.1";
const P4_SUPER_USER: &str = "perforce";
const P4_SAMPLE_DEPOT_URL: &str = "https://ftp.perforce.com/perforce/tools/sampledepot.tar.gz";

fn host_tags(backup: &BackupOutputs, name: &str) -> Tags {
    let mut tags = backup.tags();
    tags.insert("Name", name);
    tags
}

/// Security group admitting `ports` from every allow-list entry and from the VPC range.
fn restricted_group(ctx: &ComponentContext<'_>, description: &str, ports: &[u16]) -> SecurityGroupSpec {
    let vpc = &ctx.foundation.vpc;
    let mut sg = SecurityGroupSpec::new(description, vpc);
    for &port in ports {
        sg = sg.protect(PortRange::single(port));
    }
    for &port in ports {
        sg.allow_from_each(ctx.allow_list, Protocol::Tcp, PortRange::single(port), None);
        sg.allow(IngressRule::tcp(Peer::vpc(vpc), port).describe("internal network"));
    }
    sg
}

pub fn build_svn_host(
    stack: &mut Stack,
    ctx: &ComponentContext<'_>,
    backup: &BackupOutputs,
    config: &VersionControlConfig,
) -> Result<HostOutputs> {
    let foundation = ctx.foundation;

    let sg = stack.add(
        "svn/sg",
        ResourceKind::SecurityGroup(restricted_group(ctx, "Centralized repository access", &[SVN_HTTP_PORT])),
    )?;

    let secret = stack.add(
        "svn/admin-secret",
        ResourceKind::Secret(SecretSpec::admin_credential("Centralized repository administrator", SVN_ADMIN_USER)),
    )?;

    let host = declare_host_role(stack, "svn", RoleSpec::for_service(EC2_SERVICE), &foundation.ssm_log_bucket)?;
    attach_policy(stack, "svn/secret-policy", "svn-secret-read", &host.role, vec![grant_secret_read(&secret)])?;

    let data_volume = BlockDevice::durable("/dev/sdb", config.svn_volume_gib, EbsVolumeType::Gp3, VolumePurpose::Repository);
    let script = ctx.scripts.render(
        templates::SVN,
        &ScriptContext::new()
            .var("data_device", &data_volume.device_name)
            .var("repo_root", SVN_REPO_ROOT)
            .var("repo_name", SVN_REPO_NAME)
            .var("admin_user", SVN_ADMIN_USER)
            .reference("secret_arn", Value::reference(&secret))
            .reference("region", Value::Region),
    )?;

    let instance = stack.add_tagged(
        "svn/instance",
        ResourceKind::Instance(InstanceSpec {
            subnet: foundation.host_subnet()?.clone(),
            security_group: sg.clone(),
            instance_type: InstanceType::new(&config.svn_instance_type),
            image: MachineImage::AmazonLinux2,
            profile: host.profile,
            block_devices: vec![
                BlockDevice::ephemeral(ROOT_DEVICE, 8, EbsVolumeType::Gp3, VolumePurpose::Root),
                data_volume,
            ],
            user_data: script,
        }),
        host_tags(backup, "SVN"),
    )?;

    info!("Centralized repository host declared in {}", stack.name);
    Ok(HostOutputs::new(instance, sg))
}

/// Base setup plus, unless `vanilla`, the sample depot.
pub fn perforce_script(ctx: &ComponentContext<'_>, vanilla: bool) -> Result<Value> {
    let base = ScriptContext::new()
        .var("depot_device", "/dev/sdb")
        .var("metadata_device", "/dev/sdc")
        .var("logs_device", "/dev/sdd")
        .var("server_id", P4_SERVER_ID)
        .var("p4_port", P4_PORT.to_string())
        .var("super_user", P4_SUPER_USER);

    let mut parts = vec![ctx
        .scripts
        .render(templates::PERFORCE_BASE, &base)
        .context("Failed to render depot server setup")?];

    if vanilla {
        debug!("Vanilla deployment: skipping sample depot");
    } else {
        let sample = ScriptContext::new()
            .var("sample_depot_url", P4_SAMPLE_DEPOT_URL)
            .var("p4_port", P4_PORT.to_string())
            .var("super_user", P4_SUPER_USER);
        parts.push(ctx.scripts.render(templates::PERFORCE_SAMPLE_DATA, &sample)?);
    }

    Ok(concat_scripts(parts))
}

pub fn build_perforce_host(
    stack: &mut Stack,
    ctx: &ComponentContext<'_>,
    backup: &BackupOutputs,
    config: &VersionControlConfig,
) -> Result<HostOutputs> {
    let foundation = ctx.foundation;

    let sg = stack.add(
        "perforce/sg",
        ResourceKind::SecurityGroup(restricted_group(ctx, "Depot server access", &[P4_PORT, P4_SECONDARY_PORT])),
    )?;
    let host = declare_host_role(stack, "perforce", RoleSpec::for_service(EC2_SERVICE), &foundation.ssm_log_bucket)?;

    let instance = stack.add_tagged(
        "perforce/primary-instance",
        ResourceKind::Instance(InstanceSpec {
            subnet: foundation.host_subnet()?.clone(),
            security_group: sg.clone(),
            instance_type: InstanceType::new(&config.perforce_instance_type),
            image: MachineImage::AmazonLinux2,
            profile: host.profile,
            block_devices: vec![
                BlockDevice::ephemeral(ROOT_DEVICE, 8, EbsVolumeType::Gp3, VolumePurpose::Root),
                BlockDevice::durable("/dev/sdb", 500, EbsVolumeType::St1, VolumePurpose::Depot),
                BlockDevice::durable("/dev/sdc", 64, EbsVolumeType::Gp3, VolumePurpose::Metadata),
                BlockDevice::durable("/dev/sdd", 128, EbsVolumeType::Gp3, VolumePurpose::Logs),
            ],
            user_data: perforce_script(ctx, config.vanilla)?,
        }),
        host_tags(backup, "PerforcePrimary"),
    )?;

    info!(
        "Depot server declared in {} (sample data: {})",
        stack.name,
        if config.vanilla { "no" } else { "yes" }
    );
    Ok(HostOutputs::new(instance, sg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backup::build_backup;
    use crate::application::foundation::{build_foundation, FoundationOutputs};
    use crate::domain::deployment::Deployment;
    use crate::domain::deployment_config::DeploymentSpec;
    use crate::domain::policy;
    use crate::infrastructure::bootstrap_templates::ScriptTemplateEngine;

    struct Fixture {
        setup: Stack,
        foundation: FoundationOutputs,
        backup: BackupOutputs,
        engine: ScriptTemplateEngine,
        allow: Vec<Peer>,
    }

    fn fixture() -> Fixture {
        let mut setup = Stack::new("SetupStack", "");
        let foundation = build_foundation(&mut setup, &DeploymentSpec::default()).unwrap();
        let backup = build_backup(&mut setup).unwrap();
        Fixture {
            setup,
            foundation,
            backup,
            engine: ScriptTemplateEngine::new().unwrap(),
            allow: vec![Peer::Cidr("203.0.113.0/24".into()), Peer::PrefixList("pl-0123".into())],
        }
    }

    fn ctx(f: &Fixture) -> ComponentContext<'_> {
        ComponentContext {
            foundation: &f.foundation,
            allow_list: &f.allow,
            scripts: &f.engine,
        }
    }

    fn contains_text(value: &Value, needle: &str) -> bool {
        value.preview().contains(needle)
    }

    #[test]
    fn test_perforce_volumes_and_tags() {
        let f = fixture();
        let mut vcs = Stack::new("VCSStack", "");
        let out = build_perforce_host(&mut vcs, &ctx(&f), &f.backup, &VersionControlConfig::default()).unwrap();

        let resource = vcs.get(&out.instance).unwrap();
        let ResourceKind::Instance(instance) = &resource.kind else {
            panic!("not an instance");
        };
        assert_eq!(instance.block_devices.len(), 4);
        let durable: Vec<_> = instance.block_devices.iter().filter(|d| d.purpose.is_durable()).collect();
        assert_eq!(durable.len(), 3);
        assert!(durable.iter().all(|d| !d.delete_on_termination));
        assert!(resource.tags.contains_pair("aws-backup", "true"));
        assert_eq!(resource.tags.get("Name"), Some("PerforcePrimary"));
    }

    #[test]
    fn test_vanilla_controls_sample_data() {
        let f = fixture();
        let seeded = perforce_script(&ctx(&f), false).unwrap();
        let vanilla = perforce_script(&ctx(&f), true).unwrap();
        assert!(contains_text(&seeded, "sampledepot"));
        assert!(!contains_text(&vanilla, "sampledepot"));
        assert!(contains_text(&vanilla, "configure-helix-p4d.sh"));
    }

    #[test]
    fn test_svn_host_reads_secret_at_boot() {
        let f = fixture();
        let mut vcs = Stack::new("VCSStack", "");
        let out = build_svn_host(&mut vcs, &ctx(&f), &f.backup, &VersionControlConfig::default()).unwrap();

        let ResourceKind::Instance(instance) = &vcs.get(&out.instance).unwrap().kind else {
            panic!("not an instance");
        };
        let secret = vcs.find_by_path("svn/admin-secret").unwrap().id.clone();
        assert!(instance.user_data.references().contains(&&secret));
        assert!(contains_text(&instance.user_data, "svnadmin create testrepo"));

        let repo = instance.block_devices.iter().find(|d| d.purpose == VolumePurpose::Repository).unwrap();
        assert_eq!(repo.size_gib, 300);
        assert!(!repo.delete_on_termination);
    }

    #[test]
    fn test_ingress_is_restricted() {
        let f = fixture();
        let mut vcs = Stack::new("VCSStack", "");
        build_perforce_host(&mut vcs, &ctx(&f), &f.backup, &VersionControlConfig::default()).unwrap();
        build_svn_host(&mut vcs, &ctx(&f), &f.backup, &VersionControlConfig::default()).unwrap();

        let mut d = Deployment::new(f.allow.clone());
        d.push(f.setup);
        d.push(vcs);
        assert!(policy::evaluate(&d).is_empty(), "{:?}", policy::evaluate(&d));

        let sg = d.stack("VCSStack").unwrap().find_by_path("perforce/sg").unwrap();
        let ResourceKind::SecurityGroup(sg) = &sg.kind else {
            panic!("not a security group");
        };
        // two allow-list entries plus the VPC, for each of two ports
        assert_eq!(sg.ingress.len(), 6);
    }
}
