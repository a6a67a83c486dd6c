// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # IAM Permission Records
//!
//! Statements, documents, roles, inline policies and instance profiles. All
//! of it is static data; the only behavior is a few grant helpers and the
//! predicates used by the structural policy checks.

use serde::{Deserialize, Serialize};

use super::resource::{ResourceId, Value};

pub const EC2_SERVICE: &str = "ec2.amazonaws.com";
pub const BACKUP_SERVICE: &str = "backup.amazonaws.com";

/// Instance-lifecycle actions that must always be scoped by a resource-tag condition
pub const LIFECYCLE_ACTIONS: [&str; 3] = [
    "ec2:StartInstances",
    "ec2:StopInstances",
    "ec2:TerminateInstances",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// `{ operator: { key: values } }` condition block entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub operator: String,
    pub key: String,
    pub values: Vec<String>,
}

impl Condition {
    pub fn string_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operator: "StringEquals".to_string(),
            key: key.into(),
            values: vec![value.into()],
        }
    }

    pub fn is_resource_tag(&self) -> bool {
        self.key.starts_with("ec2:ResourceTag/") || self.key.starts_with("aws:ResourceTag/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl PolicyStatement {
    pub fn allow<I, S>(actions: I, resources: Vec<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources,
            conditions: Vec::new(),
        }
    }

    /// Statement over every resource (`"*"`)
    pub fn allow_any<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::allow(actions, vec![Value::literal("*")])
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether the statement grants `action`, honoring trailing `*` wildcards.
    pub fn grants(&self, action: &str) -> bool {
        self.effect == Effect::Allow
            && self.actions.iter().any(|a| match a.strip_suffix('*') {
                Some(prefix) => action.starts_with(prefix),
                None => a == action,
            })
    }

    pub fn is_tag_scoped(&self) -> bool {
        self.conditions.iter().any(Condition::is_resource_tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    pub fn push(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn extend(&mut self, other: PolicyDocument) {
        self.statements.extend(other.statements);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub service_principal: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
}

impl RoleSpec {
    pub fn for_service(principal: impl Into<String>) -> Self {
        Self {
            service_principal: principal.into(),
            managed_policies: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(name.into());
        self
    }
}

/// Permission bundle attached inline to one or more roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePolicySpec {
    pub policy_name: String,
    pub document: PolicyDocument,
    pub roles: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfileSpec {
    pub path: String,
    pub roles: Vec<ResourceId>,
}

// ============================================================================
// Bucket Grants
// ============================================================================

fn bucket_arns(bucket: &ResourceId) -> Vec<Value> {
    vec![
        Value::attr(bucket, "Arn"),
        Value::join(vec![Value::attr(bucket, "Arn"), Value::literal("/*")]),
    ]
}

pub fn grant_bucket_read(bucket: &ResourceId) -> PolicyStatement {
    PolicyStatement::allow(["s3:GetObject*", "s3:GetBucket*", "s3:List*"], bucket_arns(bucket))
}

pub fn grant_bucket_put(bucket: &ResourceId) -> PolicyStatement {
    PolicyStatement::allow(
        ["s3:PutObject", "s3:PutObjectLegalHold", "s3:PutObjectRetention", "s3:Abort*"],
        bucket_arns(bucket),
    )
}

pub fn grant_bucket_read_write(bucket: &ResourceId) -> PolicyStatement {
    PolicyStatement::allow(
        [
            "s3:GetObject*",
            "s3:GetBucket*",
            "s3:List*",
            "s3:DeleteObject*",
            "s3:PutObject",
            "s3:Abort*",
        ],
        bucket_arns(bucket),
    )
}

pub fn grant_secret_read(secret: &ResourceId) -> PolicyStatement {
    PolicyStatement::allow(
        ["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
        vec![Value::reference(secret)],
    )
}
