// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Network Foundation
//!
//! The isolated network every other component is placed into, plus the shared
//! buckets and the private hosted zone declared alongside it in the setup stack.
//!
//! # Layout
//!
//! - VPC with DNS support and hostnames enabled
//! - one public and one private subnet per availability zone
//! - internet gateway for the public subnets, a single NAT gateway for the private ones
//! - buckets: CI backups, shared resources, build logs, remote-management session logs
//! - private hosted zone attached to the VPC

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::domain::deployment::{ResourceKind, Stack};
use crate::domain::deployment_config::DeploymentSpec;
use crate::domain::dns::HostedZoneSpec;
use crate::domain::network::{
    plan_subnets, GatewayAttachmentSpec, NatGatewaySpec, RouteSpec, RouteTableSpec, RouteTarget, SubnetKind,
    SubnetRouteTableAssociationSpec, SubnetSpec, VpcSpec,
};
use crate::domain::resource::{ResourceId, Value};
use crate::domain::storage::BucketSpec;

const ANY_IPV4: &str = "0.0.0.0/0";

/// Handles threaded from the foundation into every later component
#[derive(Debug, Clone)]
pub struct FoundationOutputs {
    pub vpc: ResourceId,
    /// Address range of the VPC, resolved at provisioning time
    pub vpc_cidr: Value,
    pub public_subnets: Vec<ResourceId>,
    pub private_subnets: Vec<ResourceId>,
    pub ci_backup_bucket: ResourceId,
    pub resources_bucket: ResourceId,
    pub logging_bucket: ResourceId,
    pub ssm_log_bucket: ResourceId,
    pub zone: ResourceId,
    pub zone_name: String,
}

impl FoundationOutputs {
    /// Subnet hosts are placed into
    pub fn host_subnet(&self) -> Result<&ResourceId> {
        self.public_subnets.first().context("Foundation declared no public subnet")
    }
}

pub fn build_foundation(stack: &mut Stack, spec: &DeploymentSpec) -> Result<FoundationOutputs> {
    let network = &spec.network;

    let vpc = stack.add(
        "vpc",
        ResourceKind::Vpc(VpcSpec::with_internal_dns(network.vpc_cidr.clone(), network.max_azs)),
    )?;

    let igw = stack.add("vpc/igw", ResourceKind::InternetGateway)?;
    let attachment = stack.add(
        "vpc/igw-attachment",
        ResourceKind::GatewayAttachment(GatewayAttachmentSpec {
            vpc: vpc.clone(),
            gateway: igw.clone(),
        }),
    )?;

    let plan = plan_subnets(&network.vpc_cidr, network.max_azs)
        .with_context(|| format!("Cannot carve subnets from VPC range '{}'", network.vpc_cidr))?;

    let mut public_subnets = Vec::new();
    let mut private_subnets = Vec::new();
    let mut private_tables = Vec::new();

    for (kind, az, cidr) in plan {
        let base = format!("vpc/{}-{}", kind, az);
        let subnet = stack.add(
            &base,
            ResourceKind::Subnet(SubnetSpec {
                vpc: vpc.clone(),
                kind,
                cidr,
                availability_zone_index: az,
            }),
        )?;
        let table = stack.add(&format!("{}/route-table", base), ResourceKind::RouteTable(RouteTableSpec { vpc: vpc.clone() }))?;
        stack.add(
            &format!("{}/route-table-association", base),
            ResourceKind::SubnetRouteTableAssociation(SubnetRouteTableAssociationSpec {
                subnet: subnet.clone(),
                route_table: table.clone(),
            }),
        )?;

        match kind {
            SubnetKind::Public => {
                let route = stack.add(
                    &format!("{}/default-route", base),
                    ResourceKind::Route(RouteSpec {
                        route_table: table,
                        destination: ANY_IPV4.to_string(),
                        target: RouteTarget::InternetGateway(igw.clone()),
                    }),
                )?;
                stack.add_dependency(&route, &attachment);
                public_subnets.push(subnet);
            }
            SubnetKind::Private => {
                private_tables.push((base, table));
                private_subnets.push(subnet);
            }
        }
    }

    // One NAT gateway in the first public subnet serves every private subnet
    if let Some(nat_subnet) = public_subnets.first() {
        let eip = stack.add("vpc/nat-eip", ResourceKind::ElasticIp)?;
        stack.add_dependency(&eip, &attachment);
        let nat = stack.add(
            "vpc/nat-gateway",
            ResourceKind::NatGateway(NatGatewaySpec {
                subnet: nat_subnet.clone(),
                elastic_ip: eip,
            }),
        )?;
        for (base, table) in private_tables {
            stack.add(
                &format!("{}/default-route", base),
                ResourceKind::Route(RouteSpec {
                    route_table: table,
                    destination: ANY_IPV4.to_string(),
                    target: RouteTarget::NatGateway(nat.clone()),
                }),
            )?;
        }
    }

    debug!(
        "Declared VPC {} with {} public and {} private subnets",
        network.vpc_cidr,
        public_subnets.len(),
        private_subnets.len()
    );

    let bucket = |stack: &mut Stack, path: &str, purpose: &str| {
        stack.add(path, ResourceKind::Bucket(BucketSpec { purpose: purpose.to_string() }))
    };
    let ci_backup_bucket = bucket(stack, "ci-backup-bucket", "CI coordinator home backups")?;
    let resources_bucket = bucket(stack, "resources-bucket", "Shared studio resources")?;
    let logging_bucket = bucket(stack, "logging-bucket", "Build worker bootstrap logs")?;
    let ssm_log_bucket = bucket(stack, "ssm-logging-bucket", "Remote-management session logs")?;

    // Requires DNS support and hostnames on the VPC, declared above
    let zone = stack.add(
        "hosted-zone",
        ResourceKind::HostedZone(HostedZoneSpec {
            zone_name: network.zone_name.clone(),
            vpc: vpc.clone(),
        }),
    )?;

    stack.output(
        "CiBackupBucketName",
        Value::reference(&ci_backup_bucket),
        Some("CI coordinator backup bucket name"),
    );
    stack.output(
        "ResourcesBucketName",
        Value::reference(&resources_bucket),
        Some("Shared studio resources bucket name"),
    );

    info!("Foundation declared in {} (zone {})", stack.name, network.zone_name);

    Ok(FoundationOutputs {
        vpc_cidr: Value::attr(&vpc, "CidrBlock"),
        vpc,
        public_subnets,
        private_subnets,
        ci_backup_bucket,
        resources_bucket,
        logging_bucket,
        ssm_log_bucket,
        zone,
        zone_name: network.zone_name.clone(),
    })
}
