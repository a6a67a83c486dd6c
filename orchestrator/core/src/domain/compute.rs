// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Compute Records
//!
//! Running hosts ([`InstanceSpec`]) and stamped-out specifications
//! ([`LaunchTemplateSpec`]) share the same shape: placement, security group,
//! size, image, role, block devices and a bootstrap script body.
//!
//! # Durable Volumes
//!
//! A [`BlockDevice`] whose [`VolumePurpose`] holds durable data must survive
//! instance replacement, so `delete_on_termination` is always `false` for it.
//! [`BlockDevice::durable`] is the only constructor for such volumes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::resource::{ResourceId, Tags, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceType(pub String);

impl InstanceType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Machine image selection. Named families resolve through the public SSM
/// parameter store so the template always picks up the latest build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "value", rename_all = "snake_case")]
pub enum MachineImage {
    AmazonLinux2,
    /// Windows Server 2019 full base in the given locale (e.g. `English`, `Japanese`)
    WindowsServer2019(String),
    /// Explicit AMI id
    Id(String),
}

impl MachineImage {
    pub fn ssm_parameter(&self) -> Option<String> {
        match self {
            Self::AmazonLinux2 => {
                Some("/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2".to_string())
            }
            Self::WindowsServer2019(locale) => Some(format!(
                "/aws/service/ami-windows-latest/Windows_Server-2019-{}-Full-Base",
                locale
            )),
            Self::Id(_) => None,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::WindowsServer2019(_))
    }
}

/// Hardware placement of launched instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tenancy {
    /// Shared hardware
    #[default]
    Default,
    /// Single-tenant hardware
    Dedicated,
    /// A dedicated host
    Host,
}

impl Tenancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dedicated => "dedicated",
            Self::Host => "host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbsVolumeType {
    Gp2,
    Gp3,
    St1,
    Io1,
}

impl EbsVolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gp2 => "gp2",
            Self::Gp3 => "gp3",
            Self::St1 => "st1",
            Self::Io1 => "io1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumePurpose {
    Root,
    /// Centralized repository store
    Repository,
    Depot,
    Metadata,
    Logs,
    /// Scratch space that may be discarded with the instance
    Workspace,
}

impl VolumePurpose {
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Repository | Self::Depot | Self::Metadata | Self::Logs)
    }
}

impl fmt::Display for VolumePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Root => "root",
            Self::Repository => "repository",
            Self::Depot => "depot",
            Self::Metadata => "metadata",
            Self::Logs => "logs",
            Self::Workspace => "workspace",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    pub device_name: String,
    pub size_gib: u32,
    pub volume_type: EbsVolumeType,
    pub delete_on_termination: bool,
    pub purpose: VolumePurpose,
}

impl BlockDevice {
    /// Volume discarded with the instance
    pub fn ephemeral(device_name: &str, size_gib: u32, volume_type: EbsVolumeType, purpose: VolumePurpose) -> Self {
        Self {
            device_name: device_name.to_string(),
            size_gib,
            volume_type,
            delete_on_termination: true,
            purpose,
        }
    }

    /// Volume that outlives a sudden termination
    pub fn durable(device_name: &str, size_gib: u32, volume_type: EbsVolumeType, purpose: VolumePurpose) -> Self {
        Self {
            device_name: device_name.to_string(),
            size_gib,
            volume_type,
            delete_on_termination: false,
            purpose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub subnet: ResourceId,
    pub security_group: ResourceId,
    pub instance_type: InstanceType,
    pub image: MachineImage,
    pub profile: ResourceId,
    pub block_devices: Vec<BlockDevice>,
    pub user_data: Value,
}

impl InstanceSpec {
    pub fn holds_durable_data(&self) -> bool {
        self.block_devices.iter().any(|d| d.purpose.is_durable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTemplateSpec {
    pub template_name: String,
    pub instance_type: InstanceType,
    pub image: MachineImage,
    pub profile: ResourceId,
    pub block_devices: Vec<BlockDevice>,
    pub security_groups: Vec<ResourceId>,
    pub user_data: Value,
    /// Tags stamped onto every instance launched from the template
    #[serde(default)]
    pub instance_tags: Tags,
    #[serde(default)]
    pub tenancy: Tenancy,
}
