// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory Service and DHCP Binding
//!
//! Declares a small managed directory in the private subnets, its generated
//! administrator credential, and the DHCP options that hand its resolver
//! addresses to every host in the network.
//!
//! The two resolver addresses are also exported individually under fixed names
//! (`StudioADDNS1`, `StudioADDNS2`) for consumers outside the deployment.

use tracing::info;

use super::foundation::FoundationOutputs;
use crate::domain::deployment::{ResourceKind, Stack, StackError};
use crate::domain::directory::{
    organizational_unit_path, DhcpAssociationSpec, DhcpOptionsSpec, DirectorySize, DirectorySpec,
};
use crate::domain::resource::{ResourceId, Value};
use crate::domain::storage::SecretSpec;

pub const DNS_EXPORT_NAMES: [&str; 2] = ["StudioADDNS1", "StudioADDNS2"];

const DNS_ADDRESSES_ATTR: &str = "DnsIpAddresses";

#[derive(Debug, Clone)]
pub struct DirectoryOutputs {
    pub directory: ResourceId,
    pub name: String,
    /// `DC=`-path of the directory domain
    pub ou_path: String,
    /// Both resolver addresses, element by element
    pub dns_addresses: Value,
    pub admin_secret: ResourceId,
}

impl DirectoryOutputs {
    pub fn directory_id(&self) -> Value {
        Value::reference(&self.directory)
    }
}

pub fn build_directory(
    stack: &mut Stack,
    name: &str,
    foundation: &FoundationOutputs,
) -> Result<DirectoryOutputs, StackError> {
    let admin_secret = stack.add(
        "directory/admin-secret",
        ResourceKind::Secret(SecretSpec::admin_credential("Directory administrator credential", "admin")),
    )?;

    let directory = stack.add(
        "directory",
        ResourceKind::Directory(DirectorySpec {
            name: name.to_string(),
            size: DirectorySize::Small,
            password: Value::secret_field(&admin_secret, "password"),
            vpc: foundation.vpc.clone(),
            subnets: foundation.private_subnets.clone(),
        }),
    )?;

    let all_addresses = Value::attr(&directory, DNS_ADDRESSES_ATTR);
    let per_address: Vec<Value> = (0..DNS_EXPORT_NAMES.len())
        .map(|i| Value::select(i, all_addresses.clone()))
        .collect();
    for (export, value) in DNS_EXPORT_NAMES.iter().zip(&per_address) {
        stack.export(*export, value.clone(), *export);
    }

    let options = stack.add(
        "directory/dhcp-options",
        ResourceKind::DhcpOptions(DhcpOptionsSpec {
            domain_name: name.to_string(),
            name_servers: all_addresses,
        }),
    )?;
    stack.add(
        "directory/dhcp-association",
        ResourceKind::DhcpAssociation(DhcpAssociationSpec {
            options,
            vpc: foundation.vpc.clone(),
        }),
    )?;

    let ou_path = organizational_unit_path(name);
    info!("Directory {} declared ({})", name, ou_path);

    Ok(DirectoryOutputs {
        directory,
        name: name.to_string(),
        ou_path,
        dns_addresses: Value::List(per_address),
        admin_secret,
    })
}
