// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Worker Launch Template
//!
//! Not a running host: the CI coordinator launches workers from this template
//! on demand. The instance profile and security group are handed to the CI
//! component so the coordinator can reference them when it launches.
//!
//! The worker script creates a local administrator from a generated secret,
//! installs a browser and an archive utility, then writes `C:\init-complete.txt`
//! as the ready signal. Any failure uploads the exception text to
//! `errorlogs/<epoch>.txt` in the logging bucket, once, and stops.

use anyhow::Result;
use tracing::info;

use super::access_policy::{attach_policy, declare_host_role};
use super::ComponentContext;
use crate::domain::compute::{BlockDevice, EbsVolumeType, InstanceType, LaunchTemplateSpec, MachineImage, VolumePurpose};
use crate::domain::deployment::{ResourceKind, Stack};
use crate::domain::deployment_config::BuildWorkerConfig;
use crate::domain::iam::{grant_bucket_put, grant_bucket_read, grant_secret_read, PolicyStatement, RoleSpec, EC2_SERVICE};
use crate::domain::network::{IngressRule, Peer, PortRange, Protocol, SecurityGroupSpec};
use crate::domain::resource::{ResourceId, Tags, Value};
use crate::domain::storage::SecretSpec;
use crate::infrastructure::bootstrap_templates::{templates, ScriptContext};

pub const RDP_PORT: u16 = 3389;
/// Coordinator agent callback port
pub const AGENT_PORT: u16 = 50000;

const TEMPLATE_NAME: &str = "build-machine-image-template";
const WORKER_USER: &str = "buildnode";

#[derive(Debug, Clone)]
pub struct BuildWorkerOutputs {
    pub role: ResourceId,
    pub profile: ResourceId,
    pub security_group: ResourceId,
    pub template: ResourceId,
}

pub fn build_worker_template(
    stack: &mut Stack,
    ctx: &ComponentContext<'_>,
    config: &BuildWorkerConfig,
    worker_tags: &Tags,
) -> Result<BuildWorkerOutputs> {
    let foundation = ctx.foundation;

    let user_secret = stack.add(
        "build-worker/user-secret",
        ResourceKind::Secret(SecretSpec::admin_credential("Build worker local administrator", WORKER_USER)),
    )?;

    let host = declare_host_role(stack, "build-worker", RoleSpec::for_service(EC2_SERVICE), &foundation.ssm_log_bucket)?;
    attach_policy(
        stack,
        "build-worker/worker-policy",
        "build-worker",
        &host.role,
        vec![
            grant_bucket_read(&foundation.resources_bucket),
            grant_bucket_put(&foundation.resources_bucket),
            grant_bucket_put(&foundation.logging_bucket),
            PolicyStatement::allow_any(["ec2:CreateTags", "ec2:DeleteTags", "ec2:DescribeTags"]),
            PolicyStatement::allow_any(["ec2:DescribeInstances"]),
            grant_secret_read(&user_secret),
        ],
    )?;

    let mut sg_spec = SecurityGroupSpec::new("Allow RDP access to build workers", &foundation.vpc)
        .protect(PortRange::single(RDP_PORT));
    sg_spec.allow_from_each(ctx.allow_list, Protocol::Tcp, PortRange::single(RDP_PORT), Some("allow RDP access"));
    sg_spec.allow(IngressRule::tcp(Peer::vpc(&foundation.vpc), AGENT_PORT).describe("coordinator agent callback"));
    let sg = stack.add("build-worker/sg", ResourceKind::SecurityGroup(sg_spec))?;

    let script = ctx.scripts.render(
        templates::BUILD_WORKER,
        &ScriptContext::new()
            .var("firefox_url", &config.firefox_url)
            .var("seven_zip_url", &config.seven_zip_url)
            .reference("user_secret_arn", Value::reference(&user_secret))
            .reference("logging_bucket", Value::reference(&foundation.logging_bucket)),
    )?;

    let mut instance_tags = worker_tags.clone();
    instance_tags.insert("Name", "BuildWorker");

    let template = stack.add(
        "build-worker/launch-template",
        ResourceKind::LaunchTemplate(LaunchTemplateSpec {
            template_name: TEMPLATE_NAME.to_string(),
            instance_type: InstanceType::new(&config.instance_type),
            image: MachineImage::WindowsServer2019(config.image_locale.clone()),
            profile: host.profile.clone(),
            block_devices: vec![BlockDevice::ephemeral(
                "/dev/sda1",
                config.root_volume_gib,
                EbsVolumeType::Gp3,
                VolumePurpose::Root,
            )],
            security_groups: vec![sg.clone()],
            user_data: script,
            instance_tags,
            tenancy: config.tenancy,
        }),
    )?;

    info!("Build worker template '{}' declared in {}", TEMPLATE_NAME, stack.name);

    Ok(BuildWorkerOutputs {
        role: host.role,
        profile: host.profile,
        security_group: sg,
        template,
    })
}
