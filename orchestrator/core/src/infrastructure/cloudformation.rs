// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CloudFormation Synthesizer
//!
//! Renders a [`Deployment`] into a cloud assembly: one CloudFormation JSON
//! template per stack plus a manifest listing the stacks in deployment order.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Translate domain records and deferred [`Value`]s into template JSON
//! - **Integration:** `studio-infra synth` -> `<out>/<Stack>.template.json`, `<out>/manifest.json`
//!
//! # Cross-Stack References
//!
//! A reference to a resource owned by the stack being rendered becomes `Ref` or
//! `Fn::GetAtt`. A reference into another stack becomes
//! `Fn::ImportValue "<Stack>:<Logical>:<Attribute>"`, and the owning stack gains
//! an output exporting exactly that name.

use serde::Serialize;
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::dependency_graph::DependencyGraph;
use crate::domain::compute::{BlockDevice, MachineImage, Tenancy};
use crate::domain::deployment::{Deployment, Resource, ResourceKind, Stack};
use crate::domain::iam::{Effect, PolicyDocument};
use crate::domain::network::{peer_source, RouteTarget, SubnetKind};
use crate::domain::resource::{ResourceId, StackName, Tags, Value};

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const ASSEMBLY_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("{from} references {to}, which is not declared")]
    DanglingReference { from: String, to: ResourceId },

    #[error("dependency cycle among: {members}")]
    CycleDetected { members: String },

    #[error("stack not found in assembly: {0}")]
    UnknownStack(String),

    #[error("failed to serialize template: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Cloud Assembly
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StackArtifact {
    pub name: String,
    pub template: Json,
    /// Stacks that must be deployed first
    pub dependencies: Vec<String>,
}

impl StackArtifact {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }

    pub fn resource_count(&self) -> usize {
        self.template["Resources"].as_object().map_or(0, Map::len)
    }

    pub fn export_names(&self) -> Vec<&str> {
        let Some(outputs) = self.template["Outputs"].as_object() else {
            return Vec::new();
        };
        outputs
            .values()
            .filter_map(|o| o["Export"]["Name"].as_str())
            .collect()
    }
}

/// Synthesized templates in deployment order
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    pub stacks: Vec<StackArtifact>,
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Result<&StackArtifact, SynthError> {
        self.stacks
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SynthError::UnknownStack(name.to_string()))
    }

    pub fn manifest(&self) -> Json {
        let stacks: Vec<Json> = self
            .stacks
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "templateFile": s.template_file(),
                    "dependencies": s.dependencies,
                })
            })
            .collect();
        json!({ "version": ASSEMBLY_VERSION, "stacks": stacks })
    }

    /// Write every template and the manifest into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, SynthError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SynthError::Io { path, source }
        };

        std::fs::create_dir_all(dir).map_err(io_err(dir))?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            let body = serde_json::to_string_pretty(&stack.template)?;
            std::fs::write(&path, body).map_err(io_err(&path))?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        let path = dir.join("manifest.json");
        std::fs::write(&path, serde_json::to_string_pretty(&self.manifest())?).map_err(io_err(&path))?;
        written.push(path);

        Ok(written)
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Export recorded on the producing stack for a cross-stack reference
#[derive(Debug, Clone)]
struct Export {
    name: String,
    value: Value,
}

#[derive(Debug, Default)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, deployment: &Deployment) -> Result<CloudAssembly, SynthError> {
        check_references(deployment)?;

        let stack_graph = DependencyGraph::for_stacks(deployment)?;
        let order: Vec<String> = stack_graph
            .deployment_order()?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut exports: BTreeMap<StackName, Vec<Export>> = BTreeMap::new();
        let mut templates: BTreeMap<String, Map<String, Json>> = BTreeMap::new();

        for name in &order {
            let stack = deployment
                .stack(name)
                .ok_or_else(|| SynthError::UnknownStack(name.clone()))?;
            let mut renderer = Renderer {
                stack: &stack.name,
                exports: &mut exports,
            };
            let template = renderer.stack_template(stack)?;
            templates.insert(name.clone(), template);
        }

        let mut artifacts = Vec::with_capacity(order.len());
        for name in order {
            let mut template = templates.remove(&name).ok_or_else(|| SynthError::UnknownStack(name.clone()))?;

            let stack_name = StackName::new(name.as_str());
            if let Some(stack_exports) = exports.get(&stack_name) {
                let mut scratch = BTreeMap::new();
                let renderer = Renderer {
                    stack: &stack_name,
                    exports: &mut scratch,
                };
                let outputs = template
                    .entry("Outputs")
                    .or_insert_with(|| Json::Object(Map::new()));
                if let Json::Object(outputs) = outputs {
                    for export in stack_exports {
                        outputs.insert(
                            output_name(&export.name),
                            json!({
                                "Value": renderer.local(&export.value),
                                "Export": { "Name": export.name },
                            }),
                        );
                    }
                }
                info!("{}: exported {} value(s) to dependent stacks", name, stack_exports.len());
            }

            let dependencies = stack_graph
                .dependencies_of(&name)
                .into_iter()
                .map(str::to_string)
                .collect();
            artifacts.push(StackArtifact {
                name,
                template: Json::Object(template),
                dependencies,
            });
        }

        Ok(CloudAssembly { stacks: artifacts })
    }
}

fn check_references(deployment: &Deployment) -> Result<(), SynthError> {
    for resource in deployment.resources() {
        for dep in resource.dependencies() {
            if deployment.resource(&dep).is_none() {
                return Err(SynthError::DanglingReference {
                    from: resource.id.to_string(),
                    to: dep,
                });
            }
        }
    }
    for stack in &deployment.stacks {
        for output in &stack.outputs {
            for dep in output.value.references() {
                if deployment.resource(dep).is_none() {
                    return Err(SynthError::DanglingReference {
                        from: format!("{}/{}", stack.name, output.name),
                        to: dep.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn output_name(export_name: &str) -> String {
    let alnum: String = export_name.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("Export{}", alnum)
}

fn export_name(id: &ResourceId, attribute: &str) -> String {
    format!("{}:{}:{}", id.stack, id.logical, attribute)
}

// ============================================================================
// Rendering
// ============================================================================

struct Renderer<'a> {
    stack: &'a StackName,
    exports: &'a mut BTreeMap<StackName, Vec<Export>>,
}

impl<'a> Renderer<'a> {
    fn is_local(&self, id: &ResourceId) -> bool {
        &id.stack == self.stack
    }

    fn import(&mut self, id: &ResourceId, attribute: &str, producer_value: Value) -> Json {
        let name = export_name(id, attribute);
        let list = self.exports.entry(id.stack.clone()).or_default();
        if !list.iter().any(|e| e.name == name) {
            list.push(Export {
                name: name.clone(),
                value: producer_value,
            });
        }
        json!({ "Fn::ImportValue": name })
    }

    /// Render a value that only refers to the current stack.
    fn local(&self, value: &Value) -> Json {
        let mut scratch = BTreeMap::new();
        Renderer {
            stack: self.stack,
            exports: &mut scratch,
        }
        .value(value)
    }

    fn value(&mut self, value: &Value) -> Json {
        match value {
            Value::Literal(s) => Json::String(s.clone()),
            Value::Number(n) => json!(n),
            Value::Region => json!({ "Ref": "AWS::Region" }),
            Value::Ref(id) if self.is_local(id) => json!({ "Ref": id.logical.as_str() }),
            Value::Ref(id) => self.import(id, "Ref", value.clone()),
            Value::Attr { target, attribute } if self.is_local(target) => {
                json!({ "Fn::GetAtt": [target.logical.as_str(), attribute] })
            }
            Value::Attr { target, attribute } => self.import(target, attribute, value.clone()),
            Value::Select { index, list } => match list.as_ref() {
                Value::Attr { target, attribute } if !self.is_local(target) => {
                    self.import(target, &format!("{}:{}", attribute, index), value.clone())
                }
                other => json!({ "Fn::Select": [index, self.value(other)] }),
            },
            Value::Join(parts) => {
                let parts: Vec<Json> = parts.iter().map(|p| self.value(p)).collect();
                json!({ "Fn::Join": ["", parts] })
            }
            Value::Base64(inner) => json!({ "Fn::Base64": self.value(inner) }),
            Value::SecretField { secret, field } => {
                let arn = self.value(&Value::reference(secret));
                json!({
                    "Fn::Join": ["", ["{{resolve:secretsmanager:", arn, format!(":SecretString:{}}}}}", field)]]
                })
            }
            Value::List(items) => Json::Array(items.iter().map(|v| self.value(v)).collect()),
        }
    }

    fn id(&mut self, id: &ResourceId) -> Json {
        self.value(&Value::reference(id))
    }

    fn attr(&mut self, id: &ResourceId, attribute: &str) -> Json {
        self.value(&Value::attr(id, attribute))
    }

    fn stack_template(&mut self, stack: &Stack) -> Result<Map<String, Json>, SynthError> {
        let graph = DependencyGraph::for_resources(stack)?;
        let order = graph.deployment_order()?;

        let mut resources = Map::new();
        for logical in order {
            let Some(resource) = stack.resources.iter().find(|r| r.id.logical.as_str() == logical) else {
                continue;
            };
            for (name, body) in self.resource(resource) {
                resources.insert(name, body);
            }
        }

        let mut outputs = Map::new();
        for output in &stack.outputs {
            let mut body = Map::new();
            body.insert("Value".to_string(), self.value(&output.value));
            if let Some(description) = &output.description {
                body.insert("Description".to_string(), json!(description));
            }
            if let Some(export) = &output.export_name {
                body.insert("Export".to_string(), json!({ "Name": export }));
            }
            outputs.insert(output.name.clone(), Json::Object(body));
        }

        info!(
            "Synthesized {} ({} resources, {} outputs)",
            stack.name,
            resources.len(),
            outputs.len()
        );

        let mut template = Map::new();
        template.insert("AWSTemplateFormatVersion".to_string(), json!(TEMPLATE_FORMAT_VERSION));
        template.insert("Description".to_string(), json!(stack.description));
        template.insert("Resources".to_string(), Json::Object(resources));
        if !outputs.is_empty() {
            template.insert("Outputs".to_string(), Json::Object(outputs));
        }
        Ok(template)
    }

    /// One or more template entries for a declared resource
    fn resource(&mut self, resource: &Resource) -> Vec<(String, Json)> {
        let logical = resource.id.logical.to_string();
        let mut extra: Vec<(String, Json)> = Vec::new();

        let (kind, properties) = match &resource.kind {
            ResourceKind::Vpc(vpc) => (
                "AWS::EC2::VPC",
                json!({
                    "CidrBlock": vpc.cidr,
                    "EnableDnsSupport": vpc.enable_dns_support,
                    "EnableDnsHostnames": vpc.enable_dns_hostnames,
                }),
            ),
            ResourceKind::Subnet(subnet) => (
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": self.id(&subnet.vpc),
                    "CidrBlock": subnet.cidr,
                    "AvailabilityZone": { "Fn::Select": [subnet.availability_zone_index, { "Fn::GetAZs": "" }] },
                    "MapPublicIpOnLaunch": subnet.kind == SubnetKind::Public,
                }),
            ),
            ResourceKind::InternetGateway => ("AWS::EC2::InternetGateway", json!({})),
            ResourceKind::GatewayAttachment(a) => (
                "AWS::EC2::VPCGatewayAttachment",
                json!({ "VpcId": self.id(&a.vpc), "InternetGatewayId": self.id(&a.gateway) }),
            ),
            ResourceKind::ElasticIp => ("AWS::EC2::EIP", json!({ "Domain": "vpc" })),
            ResourceKind::NatGateway(n) => (
                "AWS::EC2::NatGateway",
                json!({
                    "SubnetId": self.id(&n.subnet),
                    "AllocationId": self.attr(&n.elastic_ip, "AllocationId"),
                }),
            ),
            ResourceKind::RouteTable(t) => ("AWS::EC2::RouteTable", json!({ "VpcId": self.id(&t.vpc) })),
            ResourceKind::Route(r) => {
                let (target_key, target) = match &r.target {
                    RouteTarget::InternetGateway(g) => ("GatewayId", self.id(g)),
                    RouteTarget::NatGateway(g) => ("NatGatewayId", self.id(g)),
                };
                let mut properties = json!({
                    "RouteTableId": self.id(&r.route_table),
                    "DestinationCidrBlock": r.destination,
                });
                properties[target_key] = target;
                ("AWS::EC2::Route", properties)
            }
            ResourceKind::SubnetRouteTableAssociation(a) => (
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({ "SubnetId": self.id(&a.subnet), "RouteTableId": self.id(&a.route_table) }),
            ),
            ResourceKind::Bucket(_) => (
                "AWS::S3::Bucket",
                json!({
                    "BucketEncryption": {
                        "ServerSideEncryptionConfiguration": [
                            { "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" } }
                        ]
                    },
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": true,
                        "BlockPublicPolicy": true,
                        "IgnorePublicAcls": true,
                        "RestrictPublicBuckets": true,
                    },
                }),
            ),
            ResourceKind::Secret(secret) => (
                "AWS::SecretsManager::Secret",
                json!({
                    "Description": secret.description,
                    "GenerateSecretString": {
                        "SecretStringTemplate": json!({ "username": secret.username }).to_string(),
                        "GenerateStringKey": secret.password_key,
                        "ExcludePunctuation": secret.exclude_punctuation,
                    },
                }),
            ),
            ResourceKind::HostedZone(zone) => (
                "AWS::Route53::HostedZone",
                json!({
                    "Name": format!("{}.", zone.zone_name),
                    "VPCs": [{ "VPCId": self.id(&zone.vpc), "VPCRegion": { "Ref": "AWS::Region" } }],
                }),
            ),
            ResourceKind::Directory(dir) => {
                let subnets: Vec<Json> = dir.subnets.iter().map(|s| self.id(s)).collect();
                (
                    "AWS::DirectoryService::SimpleAD",
                    json!({
                        "Name": dir.name,
                        "Password": self.value(&dir.password),
                        "Size": dir.size.as_str(),
                        "VpcSettings": { "VpcId": self.id(&dir.vpc), "SubnetIds": subnets },
                    }),
                )
            }
            ResourceKind::DhcpOptions(o) => (
                "AWS::EC2::DHCPOptions",
                json!({ "DomainName": o.domain_name, "DomainNameServers": self.value(&o.name_servers) }),
            ),
            ResourceKind::DhcpAssociation(a) => (
                "AWS::EC2::VPCDHCPOptionsAssociation",
                json!({ "DhcpOptionsId": self.id(&a.options), "VpcId": self.id(&a.vpc) }),
            ),
            ResourceKind::DomainJoinAssociation(j) => (
                "AWS::SSM::Association",
                json!({
                    "Name": crate::domain::directory::DOMAIN_JOIN_DOCUMENT,
                    "AssociationName": j.association_name,
                    "ScheduleExpression": j.schedule,
                    "Targets": [{
                        "Key": format!("tag:{}", crate::domain::directory::DOMAIN_JOIN_TAG_KEY),
                        "Values": [crate::domain::directory::DOMAIN_JOIN_TAG_VALUE],
                    }],
                    "Parameters": {
                        "directoryId": [self.value(&j.directory_id)],
                        "directoryName": [j.directory_name],
                        "directoryOU": [j.directory_ou],
                        "dnsIpAddresses": self.value(&j.dns_addresses),
                    },
                }),
            ),
            ResourceKind::KmsKey(key) => {
                extra.push((
                    format!("{}Alias", logical),
                    json!({
                        "Type": "AWS::KMS::Alias",
                        "Properties": {
                            "AliasName": format!("alias/{}", key.alias),
                            "TargetKeyId": { "Ref": logical },
                        },
                    }),
                ));
                (
                    "AWS::KMS::Key",
                    json!({
                        "EnableKeyRotation": key.enable_key_rotation,
                        "KeyPolicy": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": {
                                    "AWS": { "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, ":iam::", { "Ref": "AWS::AccountId" }, ":root"]] }
                                },
                                "Action": "kms:*",
                                "Resource": "*",
                            }],
                        },
                    }),
                )
            }
            ResourceKind::BackupVault(v) => (
                "AWS::Backup::BackupVault",
                json!({
                    "BackupVaultName": v.vault_name,
                    "EncryptionKeyArn": self.attr(&v.encryption_key, "Arn"),
                }),
            ),
            ResourceKind::BackupPlan(p) => {
                let vault = self.id(&p.vault);
                let rules: Vec<Json> = p
                    .rules
                    .iter()
                    .map(|r| {
                        json!({
                            "RuleName": r.rule_name,
                            "TargetBackupVault": vault,
                            "ScheduleExpression": r.schedule,
                            "Lifecycle": { "DeleteAfterDays": r.delete_after_days },
                        })
                    })
                    .collect();
                (
                    "AWS::Backup::BackupPlan",
                    json!({ "BackupPlan": { "BackupPlanName": p.plan_name, "BackupPlanRule": rules } }),
                )
            }
            ResourceKind::BackupSelection(s) => (
                "AWS::Backup::BackupSelection",
                json!({
                    "BackupPlanId": self.attr(&s.plan, "BackupPlanId"),
                    "BackupSelection": {
                        "SelectionName": s.selection_name,
                        "IamRoleArn": self.attr(&s.role, "Arn"),
                        "ListOfTags": [{
                            "ConditionType": "STRINGEQUALS",
                            "ConditionKey": s.tag_key,
                            "ConditionValue": s.tag_value,
                        }],
                    },
                }),
            ),
            ResourceKind::Role(role) => {
                let mut properties = json!({
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": role.service_principal },
                            "Action": "sts:AssumeRole",
                        }],
                    },
                });
                if !role.managed_policies.is_empty() {
                    let arns: Vec<Json> = role
                        .managed_policies
                        .iter()
                        .map(|name| {
                            json!({ "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, format!(":iam::aws:policy/{}", name)]] })
                        })
                        .collect();
                    properties["ManagedPolicyArns"] = Json::Array(arns);
                }
                ("AWS::IAM::Role", properties)
            }
            ResourceKind::InlinePolicy(p) => {
                let roles: Vec<Json> = p.roles.iter().map(|r| self.id(r)).collect();
                (
                    "AWS::IAM::Policy",
                    json!({
                        "PolicyName": p.policy_name,
                        "PolicyDocument": self.policy_document(&p.document),
                        "Roles": roles,
                    }),
                )
            }
            ResourceKind::InstanceProfile(p) => {
                let roles: Vec<Json> = p.roles.iter().map(|r| self.id(r)).collect();
                ("AWS::IAM::InstanceProfile", json!({ "Path": p.path, "Roles": roles }))
            }
            ResourceKind::SecurityGroup(sg) => {
                let ingress: Vec<Json> = sg
                    .ingress
                    .iter()
                    .map(|rule| {
                        let (source_key, source) = peer_source(&rule.peer);
                        let mut entry = Map::new();
                        entry.insert("IpProtocol".to_string(), json!(rule.protocol.as_str()));
                        entry.insert("FromPort".to_string(), json!(rule.ports.from));
                        entry.insert("ToPort".to_string(), json!(rule.ports.to));
                        entry.insert(source_key.to_string(), self.value(&source));
                        if let Some(d) = &rule.description {
                            entry.insert("Description".to_string(), json!(d));
                        }
                        Json::Object(entry)
                    })
                    .collect();
                let mut properties = json!({
                    "GroupDescription": sg.description,
                    "VpcId": self.id(&sg.vpc),
                    "SecurityGroupIngress": ingress,
                    "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1", "Description": "Allow all outbound traffic by default" }],
                });
                if let Some(name) = &sg.group_name {
                    properties["GroupName"] = json!(name);
                }
                ("AWS::EC2::SecurityGroup", properties)
            }
            ResourceKind::Instance(i) => {
                let mut properties = json!({
                    "ImageId": image_id(&i.image),
                    "InstanceType": i.instance_type.0,
                    "SubnetId": self.id(&i.subnet),
                    "SecurityGroupIds": [self.attr(&i.security_group, "GroupId")],
                    "IamInstanceProfile": self.id(&i.profile),
                    "BlockDeviceMappings": block_devices(&i.block_devices),
                    "UserData": self.value(&Value::base64(i.user_data.clone())),
                });
                if !resource.tags.is_empty() {
                    properties["Tags"] = tags_json(&resource.tags);
                }
                ("AWS::EC2::Instance", properties)
            }
            ResourceKind::LaunchTemplate(t) => {
                let groups: Vec<Json> = t.security_groups.iter().map(|g| self.attr(g, "GroupId")).collect();
                let mut data = json!({
                    "InstanceType": t.instance_type.0,
                    "ImageId": image_id(&t.image),
                    "UserData": self.value(&Value::base64(t.user_data.clone())),
                    "IamInstanceProfile": { "Arn": self.attr(&t.profile, "Arn") },
                    "BlockDeviceMappings": block_devices(&t.block_devices),
                    "SecurityGroupIds": groups,
                });
                if t.tenancy != Tenancy::Default {
                    data["Placement"] = json!({ "Tenancy": t.tenancy.as_str() });
                }
                if !t.instance_tags.is_empty() {
                    data["TagSpecifications"] = json!([
                        { "ResourceType": "instance", "Tags": tags_json(&t.instance_tags) }
                    ]);
                }
                (
                    "AWS::EC2::LaunchTemplate",
                    json!({ "LaunchTemplateName": t.template_name, "LaunchTemplateData": data }),
                )
            }
            ResourceKind::ARecord(r) => (
                "AWS::Route53::RecordSet",
                json!({
                    "HostedZoneId": self.id(&r.zone),
                    "Name": format!("{}.", r.fqdn()),
                    "Type": "A",
                    "TTL": r.ttl.to_string(),
                    "ResourceRecords": [self.value(&r.target)],
                }),
            ),
        };

        let mut body = Map::new();
        body.insert("Type".to_string(), json!(kind));
        body.insert("Properties".to_string(), properties);

        let local_deps: Vec<Json> = resource
            .depends_on
            .iter()
            .filter(|d| self.is_local(d))
            .map(|d| json!(d.logical.as_str()))
            .collect();
        if !local_deps.is_empty() {
            body.insert("DependsOn".to_string(), Json::Array(local_deps));
        }

        if matches!(resource.kind, ResourceKind::Bucket(_) | ResourceKind::KmsKey(_) | ResourceKind::Secret(_)) {
            body.insert("UpdateReplacePolicy".to_string(), json!("Retain"));
            body.insert("DeletionPolicy".to_string(), json!("Retain"));
        }

        let mut entries = vec![(logical, Json::Object(body))];
        entries.extend(extra);
        entries
    }

    fn policy_document(&mut self, document: &PolicyDocument) -> Json {
        let statements: Vec<Json> = document
            .statements
            .iter()
            .map(|st| {
                let mut entry = Map::new();
                let effect = match st.effect {
                    Effect::Allow => "Allow",
                    Effect::Deny => "Deny",
                };
                entry.insert("Effect".to_string(), json!(effect));
                entry.insert("Action".to_string(), json!(st.actions));
                let resources: Vec<Json> = st.resources.iter().map(|r| self.value(r)).collect();
                entry.insert("Resource".to_string(), Json::Array(resources));
                if !st.conditions.is_empty() {
                    let mut conditions: Map<String, Json> = Map::new();
                    for c in &st.conditions {
                        let op = conditions
                            .entry(c.operator.clone())
                            .or_insert_with(|| Json::Object(Map::new()));
                        op[c.key.as_str()] = json!(c.values);
                    }
                    entry.insert("Condition".to_string(), Json::Object(conditions));
                }
                Json::Object(entry)
            })
            .collect();
        json!({ "Version": "2012-10-17", "Statement": statements })
    }
}

fn image_id(image: &MachineImage) -> Json {
    match (image, image.ssm_parameter()) {
        (_, Some(parameter)) => json!(format!("{{{{resolve:ssm:{}}}}}", parameter)),
        (MachineImage::Id(id), None) => json!(id),
        (_, None) => Json::Null,
    }
}

fn block_devices(devices: &[BlockDevice]) -> Json {
    Json::Array(
        devices
            .iter()
            .map(|d| {
                json!({
                    "DeviceName": d.device_name,
                    "Ebs": {
                        "VolumeSize": d.size_gib,
                        "VolumeType": d.volume_type.as_str(),
                        "DeleteOnTermination": d.delete_on_termination,
                        "Encrypted": true,
                    },
                })
            })
            .collect(),
    )
}

fn tags_json(tags: &Tags) -> Json {
    Json::Array(tags.iter().map(|(k, v)| json!({ "Key": k, "Value": v })).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dns::{ARecordSpec, HostedZoneSpec};
    use crate::domain::network::VpcSpec;
    use crate::domain::storage::SecretSpec;

    fn deployment() -> (Deployment, ResourceId) {
        let mut setup = Stack::new("SetupStack", "network");
        let vpc = setup.add("vpc", ResourceKind::Vpc(VpcSpec::with_internal_dns("10.0.0.0/16", 2))).unwrap();
        let zone = setup.add(
            "zone",
            ResourceKind::HostedZone(HostedZoneSpec {
                zone_name: "gamestudio.aws.internal".into(),
                vpc: vpc.clone(),
            }),
        )
        .unwrap();

        let mut vcs = Stack::new("VCSStack", "vcs");
        let secret = vcs.add("secret", ResourceKind::Secret(SecretSpec::admin_credential("svn", "admin"))).unwrap();
        vcs.add(
            "record",
            ResourceKind::ARecord(ARecordSpec {
                zone: zone.clone(),
                zone_name: "gamestudio.aws.internal".into(),
                record_name: "svn".into(),
                target: Value::literal("10.0.1.10"),
                ttl: 300,
            }),
        )
        .unwrap();
        vcs.output("SecretArn", Value::reference(&secret), Some("svn admin secret"));

        let mut d = Deployment::new(vec![]);
        d.push(vcs);
        d.push(setup);
        (d, zone)
    }

    #[test]
    fn test_stacks_are_ordered_by_dependency() {
        let (d, _) = deployment();
        let assembly = Synthesizer::new().synthesize(&d).unwrap();
        let names: Vec<_> = assembly.stacks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SetupStack", "VCSStack"]);
        assert_eq!(assembly.stack("VCSStack").unwrap().dependencies, vec!["SetupStack"]);
    }

    #[test]
    fn test_cross_stack_reference_imports_and_exports() {
        let (d, zone) = deployment();
        let assembly = Synthesizer::new().synthesize(&d).unwrap();

        let expected = format!("SetupStack:{}:Ref", zone.logical);
        let setup = assembly.stack("SetupStack").unwrap();
        assert_eq!(setup.export_names(), vec![expected.as_str()]);

        let vcs = &assembly.stack("VCSStack").unwrap().template;
        let record = vcs["Resources"]
            .as_object()
            .unwrap()
            .values()
            .find(|r| r["Type"] == "AWS::Route53::RecordSet")
            .unwrap();
        assert_eq!(record["Properties"]["HostedZoneId"], json!({ "Fn::ImportValue": expected }));
        assert_eq!(record["Properties"]["Name"], json!("svn.gamestudio.aws.internal."));
    }

    #[test]
    fn test_local_reference_and_retained_secret() {
        let (d, _) = deployment();
        let assembly = Synthesizer::new().synthesize(&d).unwrap();
        let vcs = &assembly.stack("VCSStack").unwrap().template;

        let output = &vcs["Outputs"]["SecretArn"];
        assert!(output["Value"]["Ref"].as_str().unwrap().starts_with("Secret"));

        let secret = vcs["Resources"]
            .as_object()
            .unwrap()
            .values()
            .find(|r| r["Type"] == "AWS::SecretsManager::Secret")
            .unwrap();
        assert_eq!(secret["DeletionPolicy"], "Retain");
        assert_eq!(
            secret["Properties"]["GenerateSecretString"]["SecretStringTemplate"],
            json!("{\"username\":\"admin\"}")
        );
    }

    #[test]
    fn test_secret_field_renders_dynamic_reference() {
        let stack = StackName::new("SetupStack");
        let secret = ResourceId::new(stack.clone(), crate::domain::resource::LogicalId("AdminSecret".into()));
        let mut exports = BTreeMap::new();
        let mut renderer = Renderer {
            stack: &stack,
            exports: &mut exports,
        };
        let rendered = renderer.value(&Value::secret_field(&secret, "password"));
        assert_eq!(
            rendered,
            json!({ "Fn::Join": ["", ["{{resolve:secretsmanager:", { "Ref": "AdminSecret" }, ":SecretString:password}}"]] })
        );
        assert!(exports.is_empty());
    }

    #[test]
    fn test_cross_stack_select_exports_single_element() {
        let stack = StackName::new("WorkstationStack");
        let dir = ResourceId::new(StackName::new("SetupStack"), crate::domain::resource::LogicalId("Dir".into()));
        let mut exports = BTreeMap::new();
        let mut renderer = Renderer {
            stack: &stack,
            exports: &mut exports,
        };
        let rendered = renderer.value(&Value::select(1, Value::attr(&dir, "DnsIpAddresses")));
        assert_eq!(rendered, json!({ "Fn::ImportValue": "SetupStack:Dir:DnsIpAddresses:1" }));

        let recorded = &exports[&StackName::new("SetupStack")];
        assert_eq!(recorded.len(), 1);
        let producer = Renderer {
            stack: &StackName::new("SetupStack"),
            exports: &mut BTreeMap::new(),
        };
        assert_eq!(
            producer.local(&recorded[0].value),
            json!({ "Fn::Select": [1, { "Fn::GetAtt": ["Dir", "DnsIpAddresses"] }] })
        );
    }

    #[test]
    fn test_dangling_reference_fails() {
        let (mut d, _) = deployment();
        d.stacks.retain(|s| s.name.as_str() != "SetupStack");
        assert!(matches!(
            Synthesizer::new().synthesize(&d),
            Err(SynthError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_write_to_creates_templates_and_manifest() {
        let (d, _) = deployment();
        let assembly = Synthesizer::new().synthesize(&d).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdk.out");

        let written = assembly.write_to(&out).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out.join("SetupStack.template.json").exists());

        let manifest: Json = serde_json::from_str(&std::fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["stacks"][0]["name"], "SetupStack");
        assert_eq!(manifest["stacks"][1]["dependencies"], json!(["SetupStack"]));
    }
}
