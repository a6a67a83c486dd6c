// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backup Policy
//!
//! Declares the backup service role, the KMS-encrypted vault, the daily plan
//! and the tag-based selection. Callers opt a resource in by applying
//! [`BackupOutputs::tags`].

use tracing::info;

use crate::domain::backup::{
    BackupPlanSpec, BackupRule, BackupSelectionSpec, BackupVaultSpec, KmsKeySpec, BACKUP_PLAN_NAME,
    BACKUP_SELECTION_NAME, BACKUP_TAG_KEY, BACKUP_TAG_VALUE, BACKUP_VAULT_NAME,
};
use crate::domain::deployment::{ResourceKind, Stack, StackError};
use crate::domain::iam::{InlinePolicySpec, PolicyDocument, PolicyStatement, RoleSpec, BACKUP_SERVICE};
use crate::domain::resource::{ResourceId, Tags, Value};

const VAULT_KEY_ALIAS: &str = "backup/default";

#[derive(Debug, Clone)]
pub struct BackupOutputs {
    pub tag_key: String,
    pub tag_value: String,
    pub selection: ResourceId,
}

impl BackupOutputs {
    pub fn tags(&self) -> Tags {
        Tags::new().with(&self.tag_key, &self.tag_value)
    }
}

fn ebs_backup_policy() -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow_any([
            "ssmmessages:CreateControlChannel",
            "ssmmessages:CreateDataChannel",
            "ssmmessages:OpenControlChannel",
            "ssmmessages:OpenDataChannel",
            "ssm:UpdateInstanceInformation",
        ]),
        PolicyStatement::allow(
            ["ec2:CreateSnapshot", "ec2:DeleteSnapshot"],
            vec![
                Value::literal("arn:aws:ec2:*::snapshot/*"),
                Value::literal("arn:aws:ec2:*:*:volume/*"),
            ],
        ),
        PolicyStatement::allow_any(["ec2:DescribeVolumes", "ec2:DescribeSnapshots"]),
        PolicyStatement::allow_any(["tag:GetResources"]),
    ])
}

pub fn build_backup(stack: &mut Stack) -> Result<BackupOutputs, StackError> {
    let role = stack.add("backup/role", ResourceKind::Role(RoleSpec::for_service(BACKUP_SERVICE)))?;
    stack.add(
        "backup/ebs-backup-policy",
        ResourceKind::InlinePolicy(InlinePolicySpec {
            policy_name: "EBSBackupPolicy".to_string(),
            document: ebs_backup_policy(),
            roles: vec![role.clone()],
        }),
    )?;

    let key = stack.add(
        "backup/vault-key",
        ResourceKind::KmsKey(KmsKeySpec {
            alias: VAULT_KEY_ALIAS.to_string(),
            enable_key_rotation: true,
        }),
    )?;
    let vault = stack.add(
        "backup/vault",
        ResourceKind::BackupVault(BackupVaultSpec {
            vault_name: BACKUP_VAULT_NAME.to_string(),
            encryption_key: key,
        }),
    )?;
    let plan = stack.add(
        "backup/plan",
        ResourceKind::BackupPlan(BackupPlanSpec {
            plan_name: BACKUP_PLAN_NAME.to_string(),
            vault,
            rules: vec![BackupRule::daily()],
        }),
    )?;
    let selection = stack.add(
        "backup/selection",
        ResourceKind::BackupSelection(BackupSelectionSpec {
            selection_name: BACKUP_SELECTION_NAME.to_string(),
            plan,
            role,
            tag_key: BACKUP_TAG_KEY.to_string(),
            tag_value: BACKUP_TAG_VALUE.to_string(),
        }),
    )?;

    info!("Backup plan '{}' selects {}={}", BACKUP_PLAN_NAME, BACKUP_TAG_KEY, BACKUP_TAG_VALUE);

    Ok(BackupOutputs {
        tag_key: BACKUP_TAG_KEY.to_string(),
        tag_value: BACKUP_TAG_VALUE.to_string(),
        selection,
    })
}
