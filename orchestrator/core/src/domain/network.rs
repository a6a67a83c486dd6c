// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Foundation Records
//!
//! The isolated network every other component is placed into, plus the
//! ingress model (peers, port ranges, security groups) used to scope access
//! to each host.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** VPC/subnet/routing records and the security-group value objects

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::resource::{ResourceId, Value};

/// Default address space of the studio network
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Smallest subnet the cloud provider accepts
pub const MAX_SUBNET_PREFIX: u8 = 28;

// ============================================================================
// VPC and Subnets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcSpec {
    pub cidr: String,
    pub enable_dns_support: bool,
    pub enable_dns_hostnames: bool,
    pub max_azs: u8,
}

impl VpcSpec {
    /// A VPC with internal name resolution switched on. Private hosted zones
    /// require both DNS flags.
    pub fn with_internal_dns(cidr: impl Into<String>, max_azs: u8) -> Self {
        Self {
            cidr: cidr.into(),
            enable_dns_support: true,
            enable_dns_hostnames: true,
            max_azs,
        }
    }

    pub fn resolves_internal_names(&self) -> bool {
        self.enable_dns_support && self.enable_dns_hostnames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetKind {
    Public,
    Private,
}

impl fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub vpc: ResourceId,
    pub kind: SubnetKind,
    pub cidr: String,
    /// Index into the region's availability zones (`Fn::GetAZs`)
    pub availability_zone_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubnetPlanError {
    #[error("invalid VPC range: {0}")]
    InvalidRange(#[from] ipnet::AddrParseError),

    #[error("at least one availability zone is required")]
    NoAvailabilityZones,

    #[error("{cidr} cannot hold {blocks} subnets of /{max_prefix} or larger ({azs} availability zones, public and private in each)")]
    RangeTooSmall {
        cidr: String,
        azs: u8,
        blocks: usize,
        max_prefix: u8,
    },
}

/// Split a VPC range into `2 * azs` equally sized blocks: the first `azs`
/// become public subnets, the rest private ones.
///
/// Every zone gets both kinds or the plan is refused.
pub fn plan_subnets(vpc_cidr: &str, azs: u8) -> Result<Vec<(SubnetKind, usize, String)>, SubnetPlanError> {
    let net: Ipv4Net = vpc_cidr.trim().parse()?;
    if azs == 0 {
        return Err(SubnetPlanError::NoAvailabilityZones);
    }
    let zones = usize::from(azs);
    let blocks = 2 * zones;
    let extra_bits = (usize::BITS - (blocks - 1).leading_zeros()) as u8;
    let new_prefix = net.prefix_len() + extra_bits;

    let too_small = || SubnetPlanError::RangeTooSmall {
        cidr: net.to_string(),
        azs,
        blocks,
        max_prefix: MAX_SUBNET_PREFIX,
    };
    if new_prefix > MAX_SUBNET_PREFIX {
        return Err(too_small());
    }

    let mut plan = Vec::with_capacity(blocks);
    let subnets = net.subnets(new_prefix).map_err(|_| too_small())?.take(blocks);
    for (i, subnet) in subnets.enumerate() {
        let kind = if i < zones { SubnetKind::Public } else { SubnetKind::Private };
        plan.push((kind, i % zones, subnet.to_string()));
    }
    if plan.len() < blocks {
        return Err(too_small());
    }
    Ok(plan)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAttachmentSpec {
    pub vpc: ResourceId,
    pub gateway: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGatewaySpec {
    pub subnet: ResourceId,
    pub elastic_ip: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableSpec {
    pub vpc: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteTarget {
    InternetGateway(ResourceId),
    NatGateway(ResourceId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub route_table: ResourceId,
    pub destination: String,
    pub target: RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRouteTableAssociationSpec {
    pub subnet: ResourceId,
    pub route_table: ResourceId,
}

// ============================================================================
// Ingress Model
// ============================================================================

/// Source of inbound traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Peer {
    /// IPv4/IPv6 range, kept verbatim as supplied by the operator
    Cidr(String),
    /// Managed prefix-list identifier (`pl-...`)
    PrefixList(String),
    /// The whole address range of the given VPC
    VpcCidr(ResourceId),
}

impl Peer {
    /// Parse the comma-separated allow-list environment values.
    ///
    /// Entries are trimmed and empties dropped; nothing else is validated here.
    /// A malformed CIDR is carried through and only rejected by the
    /// provisioning engine at apply time.
    pub fn parse_allow_list(cidrs: Option<&str>, prefix_lists: Option<&str>) -> Vec<Peer> {
        let split = |raw: Option<&str>| -> Vec<String> {
            raw.unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        split(cidrs)
            .into_iter()
            .map(Peer::Cidr)
            .chain(split(prefix_lists).into_iter().map(Peer::PrefixList))
            .collect()
    }

    /// Whether the peer admits every address: any range with a zero-length prefix.
    /// Entries that do not parse are never unrestricted; `check_allow_list` reports them.
    pub fn is_unrestricted(&self) -> bool {
        match self {
            Peer::Cidr(cidr) => cidr
                .trim()
                .parse::<IpNet>()
                .map(|net| net.prefix_len() == 0)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn vpc(id: &ResourceId) -> Self {
        Peer::VpcCidr(id.clone())
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Peer::VpcCidr(_))
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Cidr(c) => f.write_str(c),
            Peer::PrefixList(p) => f.write_str(p),
            Peer::VpcCidr(id) => write!(f, "vpc({})", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    pub fn range(from: u16, to: u16) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub peer: Peer,
    pub protocol: Protocol,
    pub ports: PortRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IngressRule {
    pub fn tcp(peer: Peer, port: u16) -> Self {
        Self {
            peer,
            protocol: Protocol::Tcp,
            ports: PortRange::single(port),
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Restricted ingress rule set attached to a host or template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub description: String,
    pub vpc: ResourceId,
    pub ingress: Vec<IngressRule>,
    /// Ports carrying the owning component's primary protocol. These must never
    /// be reachable from outside the allow-list and the VPC range.
    #[serde(default)]
    pub protected_ports: Vec<PortRange>,
}

impl SecurityGroupSpec {
    pub fn new(description: impl Into<String>, vpc: &ResourceId) -> Self {
        Self {
            group_name: None,
            description: description.into(),
            vpc: vpc.clone(),
            ingress: Vec::new(),
            protected_ports: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.group_name = Some(name.into());
        self
    }

    pub fn protect(mut self, ports: PortRange) -> Self {
        self.protected_ports.push(ports);
        self
    }

    pub fn allow(&mut self, rule: IngressRule) {
        self.ingress.push(rule);
    }

    /// Add `protocol`/`ports` from every peer in `peers`.
    pub fn allow_from_each(&mut self, peers: &[Peer], protocol: Protocol, ports: PortRange, description: Option<&str>) {
        for peer in peers {
            self.ingress.push(IngressRule {
                peer: peer.clone(),
                protocol,
                ports,
                description: description.map(str::to_string),
            });
        }
    }

    pub fn is_protected(&self, ports: &PortRange) -> bool {
        self.protected_ports.iter().any(|p| p.overlaps(ports))
    }
}

/// Render a peer into the CIDR/prefix-list pair CloudFormation expects.
pub fn peer_source(peer: &Peer) -> (&'static str, Value) {
    match peer {
        Peer::Cidr(c) if c.contains(':') => ("CidrIpv6", Value::literal(c.clone())),
        Peer::Cidr(c) => ("CidrIp", Value::literal(c.clone())),
        Peer::PrefixList(p) => ("SourcePrefixListId", Value::literal(p.clone())),
        Peer::VpcCidr(vpc) => ("CidrIp", Value::attr(vpc, "CidrBlock")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{LogicalId, StackName};

    #[test]
    fn test_parse_allow_list_trims_and_drops_empties() {
        let peers = Peer::parse_allow_list(Some(" 10.1.0.0/16, ,192.168.0.0/24 "), Some("pl-123,"));
        assert_eq!(
            peers,
            vec![
                Peer::Cidr("10.1.0.0/16".into()),
                Peer::Cidr("192.168.0.0/24".into()),
                Peer::PrefixList("pl-123".into()),
            ]
        );
        assert!(Peer::parse_allow_list(None, None).is_empty());
    }

    #[test]
    fn test_parse_allow_list_keeps_malformed_entries_verbatim() {
        let peers = Peer::parse_allow_list(Some("not-a-cidr"), None);
        assert_eq!(peers, vec![Peer::Cidr("not-a-cidr".into())]);
    }

    #[test]
    fn test_unrestricted_detection() {
        assert!(Peer::Cidr("0.0.0.0/0".into()).is_unrestricted());
        assert!(Peer::Cidr("::/0".into()).is_unrestricted());
        assert!(!Peer::Cidr("10.0.0.0/8".into()).is_unrestricted());
        assert!(!Peer::PrefixList("pl-1".into()).is_unrestricted());
    }

    #[test]
    fn test_unrestricted_detection_ignores_spelling() {
        for open in ["0:0:0:0:0:0:0:0/0", " 0.0.0.0/0 ", "10.0.0.0/0", "::ffff:0:0/0"] {
            assert!(Peer::Cidr(open.into()).is_unrestricted(), "{}", open);
        }
        for closed in ["10.0.0.0/8", "192.168.0.0/10", "0.0.0.0/1", "not-a-range/0", "0.0.0.0"] {
            assert!(!Peer::Cidr(closed.into()).is_unrestricted(), "{}", closed);
        }
    }

    #[test]
    fn test_plan_subnets_two_azs() {
        let plan = plan_subnets("10.0.0.0/16", 2).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0], (SubnetKind::Public, 0, "10.0.0.0/18".to_string()));
        assert_eq!(plan[1], (SubnetKind::Public, 1, "10.0.64.0/18".to_string()));
        assert_eq!(plan[2], (SubnetKind::Private, 0, "10.0.128.0/18".to_string()));
        assert_eq!(plan[3], (SubnetKind::Private, 1, "10.0.192.0/18".to_string()));
    }

    #[test]
    fn test_plan_subnets_rejects_garbage() {
        assert!(matches!(plan_subnets("garbage", 2), Err(SubnetPlanError::InvalidRange(_))));
        assert_eq!(plan_subnets("10.0.0.0/16", 0), Err(SubnetPlanError::NoAvailabilityZones));
    }

    #[test]
    fn test_plan_subnets_refuses_range_without_room_for_private_subnets() {
        let err = plan_subnets("10.0.0.0/27", 2).unwrap_err();
        assert_eq!(
            err,
            SubnetPlanError::RangeTooSmall {
                cidr: "10.0.0.0/27".to_string(),
                azs: 2,
                blocks: 4,
                max_prefix: 28,
            }
        );
        assert!(err.to_string().contains("10.0.0.0/27"));
    }

    #[test]
    fn test_plan_subnets_smallest_usable_range() {
        let plan = plan_subnets("10.0.0.0/26", 2).unwrap();
        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|(_, _, cidr)| cidr.ends_with("/28")));
        let private = plan.iter().filter(|(kind, _, _)| *kind == SubnetKind::Private).count();
        assert_eq!(private, 2);

        // three zones need six blocks, rounded up to eight
        let plan = plan_subnets("10.0.0.0/16", 3).unwrap();
        assert_eq!(plan.len(), 6);
        assert_eq!(plan[5], (SubnetKind::Private, 2, "10.0.160.0/19".to_string()));
    }

    #[test]
    fn test_port_range_overlap() {
        let incredibuild = PortRange::range(31100, 31105);
        assert!(incredibuild.contains(31102));
        assert!(incredibuild.overlaps(&PortRange::single(31105)));
        assert!(!incredibuild.overlaps(&PortRange::single(445)));
    }

    #[test]
    fn test_peer_source_for_vpc_uses_cidr_attribute() {
        let vpc = ResourceId::new(StackName::new("SetupStack"), LogicalId("Vpc".into()));
        let (key, value) = peer_source(&Peer::vpc(&vpc));
        assert_eq!(key, "CidrIp");
        assert_eq!(value, Value::attr(&vpc, "CidrBlock"));
    }
}
