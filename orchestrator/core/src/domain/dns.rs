// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use super::resource::{ResourceId, Value};

pub const DEFAULT_RECORD_TTL: u32 = 300;

/// Private hosted zone attached to the studio network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneSpec {
    pub zone_name: String,
    pub vpc: ResourceId,
}

/// A record pointing a human-friendly name at a host's private address.
///
/// The target is captured when the record is created; replacing the host
/// leaves the record stale until the stack is redeployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecordSpec {
    pub zone: ResourceId,
    pub zone_name: String,
    pub record_name: String,
    pub target: Value,
    pub ttl: u32,
}

impl ARecordSpec {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.record_name, self.zone_name)
    }
}
