// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Directory Service Records
//!
//! A small managed directory used for host domain-join, the DHCP binding that
//! points the network at its resolvers, and the recurring association that
//! joins tagged hosts to it.

use serde::{Deserialize, Serialize};

use super::resource::{ResourceId, Value};

/// Tag pair that enrolls an instance in the recurring domain-join association
pub const DOMAIN_JOIN_TAG_KEY: &str = "Feature";
pub const DOMAIN_JOIN_TAG_VALUE: &str = "Join-AD";
pub const DOMAIN_JOIN_DOCUMENT: &str = "AWS-JoinDirectoryServiceDomain";
pub const DOMAIN_JOIN_SCHEDULE: &str = "rate(30 minutes)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectorySize {
    Small,
    Large,
}

impl DirectorySize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Large => "Large",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySpec {
    pub name: String,
    pub size: DirectorySize,
    /// Reference to the generated administrative credential
    pub password: Value,
    pub vpc: ResourceId,
    pub subnets: Vec<ResourceId>,
}

/// Distinguished-name path for a domain: `"a.b.c"` becomes `"DC=a,DC=b,DC=c"`.
pub fn organizational_unit_path(domain: &str) -> String {
    domain
        .split('.')
        .filter(|label| !label.is_empty())
        .map(|label| format!("DC={}", label))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpOptionsSpec {
    pub domain_name: String,
    /// List-valued resolver addresses of the directory
    pub name_servers: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpAssociationSpec {
    pub options: ResourceId,
    pub vpc: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainJoinAssociationSpec {
    pub association_name: String,
    pub directory_id: Value,
    pub directory_name: String,
    pub directory_ou: String,
    pub dns_addresses: Value,
    pub schedule: String,
}
