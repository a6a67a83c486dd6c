// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CI Coordinator Host
//!
//! Single instance running the CI coordinator. Its role may launch build
//! workers and tag them; start, stop and terminate are only granted on
//! instances carrying the worker tag.
//!
//! The first-boot script runs fail-fast and is not idempotent. Besides the
//! coordinator it writes a backup helper and an environment file exposing the
//! worker launch parameters to job scripts.

use anyhow::Result;
use tracing::info;

use super::access_policy::{attach_policy, declare_host_role};
use super::build_worker::{BuildWorkerOutputs, AGENT_PORT};
use super::{ComponentContext, HostOutputs};
use crate::domain::compute::{BlockDevice, EbsVolumeType, InstanceSpec, InstanceType, MachineImage, VolumePurpose};
use crate::domain::deployment::{ResourceKind, Stack};
use crate::domain::deployment_config::CiConfig;
use crate::domain::iam::{
    grant_bucket_read_write, Condition, PolicyStatement, RoleSpec, EC2_SERVICE, LIFECYCLE_ACTIONS,
};
use crate::domain::network::{IngressRule, Peer, PortRange, Protocol, SecurityGroupSpec};
use crate::domain::resource::{Tags, Value};
use crate::infrastructure::bootstrap_templates::{templates, ScriptContext};

pub const CI_PORTS: [u16; 3] = [80, 443, AGENT_PORT];

/// Permissions letting the coordinator manage worker instances
pub fn worker_launch_statements(worker: &BuildWorkerOutputs, config: &CiConfig) -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow_any([
            "ec2:RunInstances",
            "ec2:RequestSpotInstances",
            "ec2:CreateTags",
            "ec2:Describe*",
        ]),
        PolicyStatement::allow(["iam:PassRole"], vec![Value::attr(&worker.role, "Arn")]),
        PolicyStatement::allow_any(LIFECYCLE_ACTIONS).when(Condition::string_equals(
            format!("ec2:ResourceTag/{}", config.worker_tag_key),
            &config.worker_tag_value,
        )),
    ]
}

pub fn build_ci_host(
    stack: &mut Stack,
    ctx: &ComponentContext<'_>,
    config: &CiConfig,
    worker: &BuildWorkerOutputs,
) -> Result<HostOutputs> {
    let foundation = ctx.foundation;
    let vpc = &foundation.vpc;

    let mut sg_spec = SecurityGroupSpec::new("CI coordinator access", vpc);
    for port in CI_PORTS {
        sg_spec = sg_spec.protect(PortRange::single(port));
    }
    for port in CI_PORTS {
        sg_spec.allow_from_each(ctx.allow_list, Protocol::Tcp, PortRange::single(port), None);
        // workers call back from inside the VPC
        sg_spec.allow(IngressRule::tcp(Peer::vpc(vpc), port).describe("build workers"));
    }
    let sg = stack.add("jenkins/sg", ResourceKind::SecurityGroup(sg_spec))?;

    let host = declare_host_role(stack, "jenkins", RoleSpec::for_service(EC2_SERVICE), &foundation.ssm_log_bucket)?;
    attach_policy(
        stack,
        "jenkins/backup-policy",
        "jenkins-backup",
        &host.role,
        vec![grant_bucket_read_write(&foundation.ci_backup_bucket)],
    )?;
    attach_policy(
        stack,
        "jenkins/worker-launch-policy",
        "jenkins-worker-launch",
        &host.role,
        worker_launch_statements(worker, config),
    )?;

    let subnet = foundation.host_subnet()?.clone();
    let script = ctx.scripts.render(
        templates::JENKINS,
        &ScriptContext::new()
            .var("jenkins_repo_url", &config.jenkins_repo_url)
            .var("jenkins_key_url", &config.jenkins_key_url)
            .var("worker_tag_key", &config.worker_tag_key)
            .var("worker_tag_value", &config.worker_tag_value)
            .reference("backup_bucket", Value::reference(&foundation.ci_backup_bucket))
            .reference("subnet_id", Value::reference(&subnet))
            .reference("instance_profile_arn", Value::attr(&worker.profile, "Arn"))
            .reference("security_group_id", Value::attr(&worker.security_group, "GroupId"))
            .reference("region", Value::Region)
            .reference("resource_bucket", Value::reference(&foundation.resources_bucket)),
    )?;

    let instance = stack.add_tagged(
        "jenkins/instance",
        ResourceKind::Instance(InstanceSpec {
            subnet,
            security_group: sg.clone(),
            instance_type: InstanceType::new(&config.instance_type),
            image: MachineImage::AmazonLinux2,
            profile: host.profile,
            block_devices: vec![BlockDevice::ephemeral(
                "/dev/xvda",
                config.root_volume_gib,
                EbsVolumeType::Gp2,
                VolumePurpose::Root,
            )],
            user_data: script,
        }),
        Tags::new().with("Name", "Jenkins"),
    )?;

    info!("CI coordinator declared in {} ({})", stack.name, config.instance_type);
    Ok(HostOutputs::new(instance, sg))
}
