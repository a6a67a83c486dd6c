// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Name resolution records for the studio hosts.

use tracing::debug;

use super::HostOutputs;
use crate::domain::deployment::{ResourceKind, Stack, StackError};
use crate::domain::dns::{ARecordSpec, DEFAULT_RECORD_TTL};
use crate::domain::resource::ResourceId;

/// Point `<record_name>.<zone_name>` at the host's private address.
///
/// The record is declared after the host so the address is known when it is
/// created. It is not refreshed if the host is later replaced.
pub fn bind_record(
    stack: &mut Stack,
    zone: &ResourceId,
    zone_name: &str,
    record_name: &str,
    host: &HostOutputs,
) -> Result<ResourceId, StackError> {
    let record = stack.add(
        &format!("dns/{}", record_name),
        ResourceKind::ARecord(ARecordSpec {
            zone: zone.clone(),
            zone_name: zone_name.to_string(),
            record_name: record_name.to_string(),
            target: host.private_ip.clone(),
            ttl: DEFAULT_RECORD_TTL,
        }),
    )?;
    stack.add_dependency(&record, &host.instance);

    debug!("Record {}.{} bound to {}", record_name, zone_name, host.instance);
    Ok(record)
}
