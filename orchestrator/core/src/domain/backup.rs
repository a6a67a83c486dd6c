// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Backup Policy Records
//!
//! One vault, one plan with a single daily rule, and one tag-based selection.
//! Schedule and retention are fixed constants. A resource created without the
//! backup tag is silently excluded; that is the intended contract, not a failure.

use serde::{Deserialize, Serialize};

use super::resource::{ResourceId, Tags};

pub const BACKUP_TAG_KEY: &str = "aws-backup";
pub const BACKUP_TAG_VALUE: &str = "true";
pub const BACKUP_SCHEDULE: &str = "cron(0 12 * * ? *)";
pub const BACKUP_RETENTION_DAYS: u32 = 10;
pub const BACKUP_VAULT_NAME: &str = "backup-vault";
pub const BACKUP_PLAN_NAME: &str = "ebs-backup";
pub const BACKUP_RULE_NAME: &str = "daily-10days-retention";
pub const BACKUP_SELECTION_NAME: &str = "ebs-by-tag";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsKeySpec {
    pub alias: String,
    pub enable_key_rotation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupVaultSpec {
    pub vault_name: String,
    pub encryption_key: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRule {
    pub rule_name: String,
    pub schedule: String,
    pub delete_after_days: u32,
}

impl BackupRule {
    pub fn daily() -> Self {
        Self {
            rule_name: BACKUP_RULE_NAME.to_string(),
            schedule: BACKUP_SCHEDULE.to_string(),
            delete_after_days: BACKUP_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPlanSpec {
    pub plan_name: String,
    pub vault: ResourceId,
    pub rules: Vec<BackupRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSelectionSpec {
    pub selection_name: String,
    pub plan: ResourceId,
    pub role: ResourceId,
    pub tag_key: String,
    pub tag_value: String,
}

impl BackupSelectionSpec {
    /// `STRINGEQUALS` tag condition: exact key and exact value.
    pub fn matches(&self, tags: &Tags) -> bool {
        tags.contains_pair(&self.tag_key, &self.tag_value)
    }
}

/// The tag a caller applies to opt a resource into the next scheduled run
pub fn backup_tags() -> Tags {
    Tags::new().with(BACKUP_TAG_KEY, BACKUP_TAG_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{LogicalId, StackName};

    fn selection() -> BackupSelectionSpec {
        let id = |s: &str| ResourceId::new(StackName::new("SetupStack"), LogicalId(s.into()));
        BackupSelectionSpec {
            selection_name: BACKUP_SELECTION_NAME.into(),
            plan: id("Plan"),
            role: id("Role"),
            tag_key: BACKUP_TAG_KEY.into(),
            tag_value: BACKUP_TAG_VALUE.into(),
        }
    }

    #[test]
    fn test_tagged_resource_is_selected() {
        assert!(selection().matches(&backup_tags().with("Name", "PerforcePrimary")));
    }

    #[test]
    fn test_untagged_resource_is_excluded() {
        assert!(!selection().matches(&Tags::new().with("Name", "Jenkins")));
        assert!(!selection().matches(&Tags::new().with(BACKUP_TAG_KEY, "false")));
    }

    #[test]
    fn test_daily_rule_constants() {
        let rule = BackupRule::daily();
        assert_eq!(rule.delete_after_days, 10);
        assert_eq!(rule.schedule, "cron(0 12 * * ? *)");
    }
}
