// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Deployment Aggregate
//!
//! A [`Deployment`] is the complete declared cloud state: an ordered list of
//! [`Stack`]s, each exclusively owning its [`Resource`]s. Components never share
//! resources across stacks except by reference ([`ResourceId`] / [`Value`]).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Aggregate root produced by the orchestrator and consumed by the
//!   policy checks and the synthesizer

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::backup::{BackupPlanSpec, BackupSelectionSpec, BackupVaultSpec, KmsKeySpec};
use super::compute::{BlockDevice, InstanceSpec, LaunchTemplateSpec};
use super::directory::{DhcpAssociationSpec, DhcpOptionsSpec, DirectorySpec, DomainJoinAssociationSpec};
use super::dns::{ARecordSpec, HostedZoneSpec};
use super::iam::{InlinePolicySpec, InstanceProfileSpec, RoleSpec};
use super::network::{
    GatewayAttachmentSpec, NatGatewaySpec, Peer, RouteSpec, RouteTableSpec, RouteTarget, SecurityGroupSpec,
    SubnetRouteTableAssociationSpec, SubnetSpec, VpcSpec,
};
use super::resource::{LogicalId, ResourceId, StackName, Tags, Value};
use super::storage::{BucketSpec, SecretSpec};

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec", rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc(VpcSpec),
    Subnet(SubnetSpec),
    InternetGateway,
    GatewayAttachment(GatewayAttachmentSpec),
    ElasticIp,
    NatGateway(NatGatewaySpec),
    RouteTable(RouteTableSpec),
    Route(RouteSpec),
    SubnetRouteTableAssociation(SubnetRouteTableAssociationSpec),
    Bucket(BucketSpec),
    Secret(SecretSpec),
    HostedZone(HostedZoneSpec),
    Directory(DirectorySpec),
    DhcpOptions(DhcpOptionsSpec),
    DhcpAssociation(DhcpAssociationSpec),
    DomainJoinAssociation(DomainJoinAssociationSpec),
    KmsKey(KmsKeySpec),
    BackupVault(BackupVaultSpec),
    BackupPlan(BackupPlanSpec),
    BackupSelection(BackupSelectionSpec),
    Role(RoleSpec),
    InlinePolicy(InlinePolicySpec),
    InstanceProfile(InstanceProfileSpec),
    SecurityGroup(SecurityGroupSpec),
    Instance(InstanceSpec),
    LaunchTemplate(LaunchTemplateSpec),
    ARecord(ARecordSpec),
}

impl ResourceKind {
    /// Short kind label used in logs and the DOT graph
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vpc(_) => "vpc",
            Self::Subnet(_) => "subnet",
            Self::InternetGateway => "internet-gateway",
            Self::GatewayAttachment(_) => "gateway-attachment",
            Self::ElasticIp => "elastic-ip",
            Self::NatGateway(_) => "nat-gateway",
            Self::RouteTable(_) => "route-table",
            Self::Route(_) => "route",
            Self::SubnetRouteTableAssociation(_) => "subnet-route-table-association",
            Self::Bucket(_) => "bucket",
            Self::Secret(_) => "secret",
            Self::HostedZone(_) => "hosted-zone",
            Self::Directory(_) => "directory",
            Self::DhcpOptions(_) => "dhcp-options",
            Self::DhcpAssociation(_) => "dhcp-association",
            Self::DomainJoinAssociation(_) => "domain-join-association",
            Self::KmsKey(_) => "kms-key",
            Self::BackupVault(_) => "backup-vault",
            Self::BackupPlan(_) => "backup-plan",
            Self::BackupSelection(_) => "backup-selection",
            Self::Role(_) => "role",
            Self::InlinePolicy(_) => "inline-policy",
            Self::InstanceProfile(_) => "instance-profile",
            Self::SecurityGroup(_) => "security-group",
            Self::Instance(_) => "instance",
            Self::LaunchTemplate(_) => "launch-template",
            Self::ARecord(_) => "a-record",
        }
    }

    /// Every resource this record points at, directly or through a [`Value`].
    pub fn references(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = Vec::new();
        let mut values: Vec<&Value> = Vec::new();

        match self {
            Self::Vpc(_) | Self::InternetGateway | Self::ElasticIp | Self::Bucket(_) | Self::Secret(_) => {}
            Self::KmsKey(_) | Self::Role(_) => {}
            Self::Subnet(s) => ids.push(s.vpc.clone()),
            Self::GatewayAttachment(g) => ids.extend([g.vpc.clone(), g.gateway.clone()]),
            Self::NatGateway(n) => ids.extend([n.subnet.clone(), n.elastic_ip.clone()]),
            Self::RouteTable(r) => ids.push(r.vpc.clone()),
            Self::Route(r) => {
                ids.push(r.route_table.clone());
                match &r.target {
                    RouteTarget::InternetGateway(g) | RouteTarget::NatGateway(g) => ids.push(g.clone()),
                }
            }
            Self::SubnetRouteTableAssociation(a) => ids.extend([a.subnet.clone(), a.route_table.clone()]),
            Self::HostedZone(z) => ids.push(z.vpc.clone()),
            Self::Directory(d) => {
                ids.push(d.vpc.clone());
                ids.extend(d.subnets.iter().cloned());
                values.push(&d.password);
            }
            Self::DhcpOptions(o) => values.push(&o.name_servers),
            Self::DhcpAssociation(a) => ids.extend([a.options.clone(), a.vpc.clone()]),
            Self::DomainJoinAssociation(j) => values.extend([&j.directory_id, &j.dns_addresses]),
            Self::BackupVault(v) => ids.push(v.encryption_key.clone()),
            Self::BackupPlan(p) => ids.push(p.vault.clone()),
            Self::BackupSelection(s) => ids.extend([s.plan.clone(), s.role.clone()]),
            Self::InlinePolicy(p) => {
                ids.extend(p.roles.iter().cloned());
                for st in &p.document.statements {
                    values.extend(st.resources.iter());
                }
            }
            Self::InstanceProfile(p) => ids.extend(p.roles.iter().cloned()),
            Self::SecurityGroup(sg) => {
                ids.push(sg.vpc.clone());
                for rule in &sg.ingress {
                    if let Peer::VpcCidr(vpc) = &rule.peer {
                        ids.push(vpc.clone());
                    }
                }
            }
            Self::Instance(i) => {
                ids.extend([i.subnet.clone(), i.security_group.clone(), i.profile.clone()]);
                values.push(&i.user_data);
            }
            Self::LaunchTemplate(t) => {
                ids.push(t.profile.clone());
                ids.extend(t.security_groups.iter().cloned());
                values.push(&t.user_data);
            }
            Self::ARecord(r) => {
                ids.push(r.zone.clone());
                values.push(&r.target);
            }
        }

        for v in values {
            ids.extend(v.references().into_iter().cloned());
        }

        let mut unique: Vec<ResourceId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Construct path the logical id was derived from
    pub path: String,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceId>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl Resource {
    /// Explicit plus implicit dependencies
    pub fn dependencies(&self) -> Vec<ResourceId> {
        let mut deps = self.kind.references();
        for d in &self.depends_on {
            if !deps.contains(d) {
                deps.push(d.clone());
            }
        }
        deps
    }
}

// ============================================================================
// Stacks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack {stack} already declares a resource at '{path}' ({logical_id})")]
    DuplicatePath {
        stack: StackName,
        path: String,
        logical_id: LogicalId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub name: StackName,
    pub description: String,
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl Stack {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: StackName::new(name),
            description: description.into(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare a resource under `path` and return its address.
    pub fn add(&mut self, path: &str, kind: ResourceKind) -> Result<ResourceId, StackError> {
        self.add_tagged(path, kind, Tags::new())
    }

    /// Paths are unique per stack; a second declaration at the same path is refused.
    pub fn add_tagged(&mut self, path: &str, kind: ResourceKind, tags: Tags) -> Result<ResourceId, StackError> {
        let id = ResourceId::new(self.name.clone(), LogicalId::from_path(&self.name, path));
        if self.resources.iter().any(|r| r.path == path || r.id == id) {
            return Err(StackError::DuplicatePath {
                stack: self.name.clone(),
                path: path.to_string(),
                logical_id: id.logical,
            });
        }
        self.resources.push(Resource {
            id: id.clone(),
            path: path.to_string(),
            kind,
            depends_on: Vec::new(),
            tags,
        });
        Ok(id)
    }

    /// Record an explicit ordering edge: `id` is created after `on`.
    pub fn add_dependency(&mut self, id: &ResourceId, on: &ResourceId) {
        if let Some(r) = self.resources.iter_mut().find(|r| &r.id == id) {
            if !r.depends_on.contains(on) {
                r.depends_on.push(on.clone());
            }
        }
    }

    pub fn output(&mut self, name: impl Into<String>, value: Value, description: Option<&str>) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value,
            description: description.map(str::to_string),
            export_name: None,
        });
    }

    pub fn export(&mut self, name: impl Into<String>, value: Value, export_name: impl Into<String>) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value,
            description: None,
            export_name: Some(export_name.into()),
        });
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn find_by_path(&self, path: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.path == path)
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// Borrowed view over anything that runs a host: an instance or a launch template.
/// `tags` are the tags the running host carries.
#[derive(Debug, Clone)]
pub struct HostView<'a> {
    pub resource: &'a Resource,
    pub security_groups: Vec<&'a ResourceId>,
    pub block_devices: &'a [BlockDevice],
    pub tags: &'a Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub stacks: Vec<Stack>,
    /// Operator-supplied sources granted access to the studio hosts
    #[serde(default)]
    pub allow_list: Vec<Peer>,
}

impl Deployment {
    pub fn new(allow_list: Vec<Peer>) -> Self {
        Self {
            stacks: Vec::new(),
            allow_list,
        }
    }

    pub fn push(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name.as_str() == name)
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.stacks
            .iter()
            .find(|s| s.name == id.stack)
            .and_then(|s| s.get(id))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.stacks.iter().flat_map(|s| s.resources.iter())
    }

    pub fn resource_count(&self) -> usize {
        self.stacks.iter().map(|s| s.resources.len()).sum()
    }

    pub fn find_by_tag<'a>(&'a self, key: &'a str, value: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources().filter(move |r| r.tags.contains_pair(key, value))
    }

    pub fn security_group_of(&self, id: &ResourceId) -> Option<&SecurityGroupSpec> {
        match self.resource(id).map(|r| &r.kind) {
            Some(ResourceKind::SecurityGroup(sg)) => Some(sg),
            _ => None,
        }
    }

    pub fn instances(&self) -> impl Iterator<Item = (&Resource, &InstanceSpec)> {
        self.resources().filter_map(|r| match &r.kind {
            ResourceKind::Instance(i) => Some((r, i)),
            _ => None,
        })
    }

    pub fn launch_templates(&self) -> impl Iterator<Item = (&Resource, &LaunchTemplateSpec)> {
        self.resources().filter_map(|r| match &r.kind {
            ResourceKind::LaunchTemplate(t) => Some((r, t)),
            _ => None,
        })
    }

    /// Running hosts and launch templates as one uniform view
    pub fn instances_and_templates(&self) -> Vec<HostView<'_>> {
        let mut hosts: Vec<HostView<'_>> = self
            .instances()
            .map(|(r, i)| HostView {
                resource: r,
                security_groups: vec![&i.security_group],
                block_devices: &i.block_devices,
                tags: &r.tags,
            })
            .collect();
        hosts.extend(self.launch_templates().map(|(r, t)| HostView {
            resource: r,
            security_groups: t.security_groups.iter().collect(),
            block_devices: &t.block_devices,
            tags: &t.instance_tags,
        }));
        hosts
    }

    pub fn records(&self) -> impl Iterator<Item = &ARecordSpec> {
        self.resources().filter_map(|r| match &r.kind {
            ResourceKind::ARecord(a) => Some(a),
            _ => None,
        })
    }

    pub fn backup_selections(&self) -> impl Iterator<Item = &BackupSelectionSpec> {
        self.resources().filter_map(|r| match &r.kind {
            ResourceKind::BackupSelection(s) => Some(s),
            _ => None,
        })
    }

    /// Resources the backup selections would pick up on their next run
    pub fn backup_protected(&self) -> Vec<&Resource> {
        let selections: Vec<_> = self.backup_selections().collect();
        self.resources()
            .filter(|r| selections.iter().any(|s| s.matches(&r.tags)))
            .collect()
    }
}
