// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remote-Management Access Policy
//!
//! Baseline permission bundle attached to every compute role: session-manager
//! channels, session log shipping to the remote-management log bucket, log
//! group access and the encryption calls the session agent makes.

use crate::domain::deployment::{ResourceKind, Stack, StackError};
use crate::domain::iam::{InlinePolicySpec, InstanceProfileSpec, PolicyDocument, PolicyStatement, RoleSpec};
use crate::domain::resource::{ResourceId, Value};

pub const SSM_POLICY_NAME: &str = "ssm-policy";

/// Build the bundle for `log_bucket`. Identical input yields an identical document.
pub fn ssm_access_policy(log_bucket: &ResourceId) -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow_any([
            "ssmmessages:CreateControlChannel",
            "ssmmessages:CreateDataChannel",
            "ssmmessages:OpenControlChannel",
            "ssmmessages:OpenDataChannel",
            "ssm:UpdateInstanceInformation",
        ]),
        PolicyStatement::allow(["s3:PutObject"], vec![Value::attr(log_bucket, "Arn")]),
        PolicyStatement::allow_any([
            "logs:CreateLogStream",
            "logs:PutLogEvents",
            "logs:DescribeLogGroups",
            "logs:DescribeLogStreams",
        ]),
        PolicyStatement::allow_any(["s3:GetEncryptionConfiguration"]),
        PolicyStatement::allow_any(["kms:GenerateDataKey"]),
    ])
}

/// Declare the bundle as an inline policy on `role`.
pub fn attach_ssm_policy(
    stack: &mut Stack,
    path: &str,
    role: &ResourceId,
    log_bucket: &ResourceId,
) -> Result<ResourceId, StackError> {
    stack.add(
        path,
        ResourceKind::InlinePolicy(InlinePolicySpec {
            policy_name: SSM_POLICY_NAME.to_string(),
            document: ssm_access_policy(log_bucket),
            roles: vec![role.clone()],
        }),
    )
}

/// EC2 role carrying the remote-management bundle, plus the instance profile wrapping it
#[derive(Debug, Clone)]
pub struct HostRole {
    pub role: ResourceId,
    pub profile: ResourceId,
}

pub fn declare_host_role(
    stack: &mut Stack,
    prefix: &str,
    role: RoleSpec,
    log_bucket: &ResourceId,
) -> Result<HostRole, StackError> {
    let role = stack.add(&format!("{}/role", prefix), ResourceKind::Role(role))?;
    attach_ssm_policy(stack, &format!("{}/ssm-policy", prefix), &role, log_bucket)?;
    let profile = stack.add(
        &format!("{}/instance-profile", prefix),
        ResourceKind::InstanceProfile(InstanceProfileSpec {
            path: "/".to_string(),
            roles: vec![role.clone()],
        }),
    )?;
    Ok(HostRole { role, profile })
}

/// Extra inline permissions for a host role
pub fn attach_policy(
    stack: &mut Stack,
    path: &str,
    name: &str,
    role: &ResourceId,
    statements: Vec<PolicyStatement>,
) -> Result<ResourceId, StackError> {
    stack.add(
        path,
        ResourceKind::InlinePolicy(InlinePolicySpec {
            policy_name: name.to_string(),
            document: PolicyDocument::new(statements),
            roles: vec![role.clone()],
        }),
    )
}
