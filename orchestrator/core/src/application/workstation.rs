// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interactive Workstation Template
//!
//! GPU remote-desktop workstations are launched from a template tagged for the
//! recurring domain-join association declared next to it. Remote desktop and
//! remote display are reachable from the allow-list; file sharing and the
//! distributed-build ports only from inside the VPC.
//!
//! The first-boot script has no rollback: a failure part-way leaves the
//! instance running half-configured for the operator to inspect and relaunch.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use tracing::info;

use super::access_policy::{attach_policy, declare_host_role};
use super::build_worker::RDP_PORT;
use super::directory::DirectoryOutputs;
use super::ComponentContext;
use crate::domain::compute::{
    BlockDevice, EbsVolumeType, InstanceType, LaunchTemplateSpec, MachineImage, Tenancy, VolumePurpose,
};
use crate::domain::deployment::{ResourceKind, Stack};
use crate::domain::deployment_config::WorkstationConfig;
use crate::domain::directory::{
    DomainJoinAssociationSpec, DOMAIN_JOIN_SCHEDULE, DOMAIN_JOIN_TAG_KEY, DOMAIN_JOIN_TAG_VALUE,
};
use crate::domain::iam::{grant_bucket_read, PolicyStatement, RoleSpec, EC2_SERVICE};
use crate::domain::network::{IngressRule, Peer, PortRange, Protocol, SecurityGroupSpec};
use crate::domain::resource::{ResourceId, Tags, Value};
use crate::infrastructure::bootstrap_templates::{templates, ScriptContext};

pub const DCV_PORT: u16 = 8443;
pub const SMB_PORT: u16 = 445;
pub const DISTRIBUTED_BUILD_PORTS: PortRange = PortRange { from: 31100, to: 31105 };

const TEMPLATE_NAME: &str = "workstation-template";
const SECURITY_GROUP_NAME: &str = "WorkstationSG";
const SESSION_OWNER: &str = "Administrator";

#[derive(Debug, Clone)]
pub struct WorkstationOutputs {
    pub template: ResourceId,
    pub security_group: ResourceId,
    pub role: ResourceId,
    pub domain_join: ResourceId,
}

/// Read-only access to the remote-display license buckets and the GPU driver buckets
fn vendor_bucket_statements(config: &WorkstationConfig) -> Vec<PolicyStatement> {
    let licenses = config
        .dcv_license_regions
        .iter()
        .map(|region| Value::literal(format!("arn:aws:s3:::dcv-license.{}/*", region)))
        .collect();

    let driver_buckets: BTreeSet<&str> = config.driver_sources.iter().map(|s| s.bucket.as_str()).collect();
    let drivers = driver_buckets
        .into_iter()
        .flat_map(|bucket| {
            [
                Value::literal(format!("arn:aws:s3:::{}", bucket)),
                Value::literal(format!("arn:aws:s3:::{}/*", bucket)),
            ]
        })
        .collect();

    vec![
        PolicyStatement::allow(["s3:GetObject"], licenses),
        PolicyStatement::allow(["s3:Get*", "s3:List*"], drivers),
    ]
}

fn workstation_group(ctx: &ComponentContext<'_>) -> SecurityGroupSpec {
    let vpc = &ctx.foundation.vpc;
    let mut sg = SecurityGroupSpec::new("Workstation remote access", vpc)
        .named(SECURITY_GROUP_NAME)
        .protect(PortRange::single(RDP_PORT))
        .protect(PortRange::single(DCV_PORT));

    sg.allow_from_each(ctx.allow_list, Protocol::Tcp, PortRange::single(RDP_PORT), Some("allow RDP access"));
    sg.allow_from_each(ctx.allow_list, Protocol::Tcp, PortRange::single(DCV_PORT), Some("allow remote display access"));
    sg.allow_from_each(
        ctx.allow_list,
        Protocol::Udp,
        PortRange::single(DCV_PORT),
        Some("allow remote display QUIC access"),
    );

    sg.allow(IngressRule::tcp(Peer::vpc(vpc), SMB_PORT).describe("file sharing"));
    sg.allow(IngressRule {
        peer: Peer::vpc(vpc),
        protocol: Protocol::Tcp,
        ports: DISTRIBUTED_BUILD_PORTS,
        description: Some("distributed build agents".to_string()),
    });
    sg
}

pub fn build_workstation_template(
    stack: &mut Stack,
    ctx: &ComponentContext<'_>,
    config: &WorkstationConfig,
    directory: &DirectoryOutputs,
) -> Result<WorkstationOutputs> {
    let foundation = ctx.foundation;

    let role_spec = RoleSpec::for_service(EC2_SERVICE)
        .with_managed_policy("AmazonSSMManagedInstanceCore")
        .with_managed_policy("AmazonSSMDirectoryServiceAccess");
    let host = declare_host_role(stack, "workstation", role_spec, &foundation.ssm_log_bucket)?;

    let mut statements = vec![grant_bucket_read(&foundation.resources_bucket)];
    statements.extend(vendor_bucket_statements(config));
    attach_policy(stack, "workstation/vendor-policy", "workstation-vendor-buckets", &host.role, statements)?;

    let sg = stack.add("workstation/sg", ResourceKind::SecurityGroup(workstation_group(ctx)))?;

    let driver_sources =
        serde_json::to_value(&config.driver_sources).context("Failed to encode driver sources")?;
    let script = ctx.scripts.render(
        templates::WORKSTATION,
        &ScriptContext::new()
            .var("firefox_url", &config.firefox_url)
            .var("session_owner", SESSION_OWNER)
            .var("dcv_server_url", &config.dcv_server_url)
            .flag("incredibuild", config.incredibuild)
            .var("incredibuild_url", &config.incredibuild_url)
            .var("driver_region", &config.driver_region)
            .extra("driver_sources", driver_sources),
    )?;

    let template = stack.add(
        "workstation/launch-template",
        ResourceKind::LaunchTemplate(LaunchTemplateSpec {
            template_name: TEMPLATE_NAME.to_string(),
            instance_type: InstanceType::new(&config.instance_type),
            image: MachineImage::WindowsServer2019(config.image_locale.clone()),
            profile: host.profile,
            block_devices: vec![BlockDevice::ephemeral(
                "/dev/sda1",
                config.root_volume_gib,
                EbsVolumeType::Gp3,
                VolumePurpose::Root,
            )],
            security_groups: vec![sg.clone()],
            user_data: script,
            instance_tags: Tags::new()
                .with("Name", "Workstation")
                .with(DOMAIN_JOIN_TAG_KEY, DOMAIN_JOIN_TAG_VALUE),
            tenancy: Tenancy::Default,
        }),
    )?;

    let domain_join = stack.add(
        "workstation/domain-join",
        ResourceKind::DomainJoinAssociation(DomainJoinAssociationSpec {
            association_name: "workstation-domain-join".to_string(),
            directory_id: directory.directory_id(),
            directory_name: directory.name.clone(),
            directory_ou: directory.ou_path.clone(),
            dns_addresses: directory.dns_addresses.clone(),
            schedule: DOMAIN_JOIN_SCHEDULE.to_string(),
        }),
    )?;

    info!(
        "Workstation template declared in {} (distributed build: {})",
        stack.name, config.incredibuild
    );

    Ok(WorkstationOutputs {
        template,
        security_group: sg,
        role: host.role,
        domain_join,
    })
}
