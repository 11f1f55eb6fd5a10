// Copyright 2021 Rayhaan Jaufeerally.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed representation of a router's routing policy, built from the value tree.
//!
//! Attributes that can be inherited are held in `PeerAttributes` where every
//! field is optional: absence means "fall through to the next level". The
//! override resolver turns a stack of these into concrete values.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::IpNet;
use serde::{Serialize, Serializer};
use serde_yaml_ng::Value;

use crate::community::{CommunityCeiling, LargeCommunity};
use crate::constraints::ConstraintKey;
use crate::error::SchemaError;
use crate::value::Node;

/// Relationship between this router and a BGP neighbor.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum PeerType {
    Customer,
    Internal,
    Peer,
    RouteCollector,
    RouteServer,
    RrClient,
    RrServer,
    RrServerRrServer,
    Transit,
}

impl PeerType {
    pub const ALL: [PeerType; 9] = [
        PeerType::Customer,
        PeerType::Internal,
        PeerType::Peer,
        PeerType::RouteCollector,
        PeerType::RouteServer,
        PeerType::RrClient,
        PeerType::RrServer,
        PeerType::RrServerRrServer,
        PeerType::Transit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerType::Customer => "customer",
            PeerType::Internal => "internal",
            PeerType::Peer => "peer",
            PeerType::RouteCollector => "routecollector",
            PeerType::RouteServer => "routeserver",
            PeerType::RrClient => "rrclient",
            PeerType::RrServer => "rrserver",
            PeerType::RrServerRrServer => "rrserver-rrserver",
            PeerType::Transit => "transit",
        }
    }

    /// Internal types share our ASN and carry relation signalling between
    /// routers of the same network.
    pub fn is_internal(&self) -> bool {
        match self {
            PeerType::Internal
            | PeerType::RrClient
            | PeerType::RrServer
            | PeerType::RrServerRrServer => true,
            PeerType::Customer
            | PeerType::Peer
            | PeerType::RouteCollector
            | PeerType::RouteServer
            | PeerType::Transit => false,
        }
    }

    pub fn is_route_reflection(&self) -> bool {
        matches!(
            self,
            PeerType::RrClient | PeerType::RrServer | PeerType::RrServerRrServer
        )
    }
}

impl fmt::Display for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PeerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeerType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown peer type '{}'", s))
    }
}

impl Serialize for PeerType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// Suffix used on attribute names, e.g. `prefix_limit4`.
    pub fn suffix(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "4",
            AddressFamily::Ipv6 => "6",
        }
    }

    pub fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl Serialize for AddressFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        })
    }
}

/// Inbound acceptance flags.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum AcceptOption {
    Default,
    BgpCustomerBlackhole,
    BgpOwnBlackhole,
    BgpOwnDefault,
    BgpTransitDefault,
}

impl AcceptOption {
    pub const ALL: [AcceptOption; 5] = [
        AcceptOption::Default,
        AcceptOption::BgpCustomerBlackhole,
        AcceptOption::BgpOwnBlackhole,
        AcceptOption::BgpOwnDefault,
        AcceptOption::BgpTransitDefault,
    ];

    /// Options meaningful for the RIP and OSPF tables.
    pub const IGP: [AcceptOption; 1] = [AcceptOption::Default];

    pub fn key(&self) -> &'static str {
        match self {
            AcceptOption::Default => "default",
            AcceptOption::BgpCustomerBlackhole => "bgp_customer_blackhole",
            AcceptOption::BgpOwnBlackhole => "bgp_own_blackhole",
            AcceptOption::BgpOwnDefault => "bgp_own_default",
            AcceptOption::BgpTransitDefault => "bgp_transit_default",
        }
    }
}

impl Serialize for AcceptOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Route sources that can be redistributed.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum RedistributeOption {
    Connected,
    Kernel,
    KernelBlackhole,
    Static,
    StaticBlackhole,
    Originated,
    Default,
    Bgp,
    BgpOwn,
    BgpCustomer,
    BgpPeering,
    BgpTransit,
    Ospf,
    Rip,
}

impl RedistributeOption {
    /// Options meaningful towards a BGP peer.
    pub const PEER: [RedistributeOption; 12] = [
        RedistributeOption::Connected,
        RedistributeOption::Kernel,
        RedistributeOption::KernelBlackhole,
        RedistributeOption::Static,
        RedistributeOption::StaticBlackhole,
        RedistributeOption::Originated,
        RedistributeOption::Default,
        RedistributeOption::Bgp,
        RedistributeOption::BgpOwn,
        RedistributeOption::BgpCustomer,
        RedistributeOption::BgpPeering,
        RedistributeOption::BgpTransit,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RedistributeOption::Connected => "connected",
            RedistributeOption::Kernel => "kernel",
            RedistributeOption::KernelBlackhole => "kernel_blackhole",
            RedistributeOption::Static => "static",
            RedistributeOption::StaticBlackhole => "static_blackhole",
            RedistributeOption::Originated => "originated",
            RedistributeOption::Default => "default",
            RedistributeOption::Bgp => "bgp",
            RedistributeOption::BgpOwn => "bgp_own",
            RedistributeOption::BgpCustomer => "bgp_customer",
            RedistributeOption::BgpPeering => "bgp_peering",
            RedistributeOption::BgpTransit => "bgp_transit",
            RedistributeOption::Ospf => "ospf",
            RedistributeOption::Rip => "rip",
        }
    }

    /// Options meaningful for an IGP table, which never redistributes itself.
    pub fn igp(protocol: Igp) -> [RedistributeOption; 6] {
        let other = match protocol {
            Igp::Rip => RedistributeOption::Ospf,
            Igp::Ospf => RedistributeOption::Rip,
        };
        [
            RedistributeOption::Connected,
            RedistributeOption::Kernel,
            RedistributeOption::Static,
            RedistributeOption::Default,
            RedistributeOption::Bgp,
            other,
        ]
    }
}

impl Serialize for RedistributeOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

fn parse_flags<K: Copy + Ord>(
    node: &Node,
    allowed: &[K],
    key_of: fn(&K) -> &'static str,
) -> Result<BTreeMap<K, bool>, SchemaError> {
    let mut flags = BTreeMap::new();
    for (key, child) in node.entries()? {
        let option = allowed
            .iter()
            .find(|o| key_of(*o) == key)
            .ok_or_else(|| node.unknown(&key))?;
        flags.insert(*option, child.as_bool()?);
    }
    Ok(flags)
}

/// Routing tables managed by the daemon.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum Table {
    Master,
    Kernel,
    Bgp,
    Ospf,
    Rip,
    Static,
    Direct,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Master,
        Table::Kernel,
        Table::Bgp,
        Table::Ospf,
        Table::Rip,
        Table::Static,
        Table::Direct,
    ];

    /// Source tables whose routes may be exported into the kernel.
    pub const KERNEL_SOURCES: [Table; 4] = [Table::Bgp, Table::Ospf, Table::Rip, Table::Static];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Master => "master",
            Table::Kernel => "kernel",
            Table::Bgp => "bgp",
            Table::Ospf => "ospf",
            Table::Rip => "rip",
            Table::Static => "static",
            Table::Direct => "direct",
        }
    }

    /// The master gate and the kernel sources carry `export_kernel`.
    pub fn takes_export_kernel(&self) -> bool {
        *self == Table::Master || Table::KERNEL_SOURCES.contains(self)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Per table attributes, shared by every peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAttributes {
    /// For a source table: export its routes to the kernel.
    /// For the master table: the final gate on all kernel export.
    pub export_kernel: Option<bool>,
}

impl TableAttributes {
    fn from_node(table: Table, node: &Node) -> Result<Self, SchemaError> {
        let mut attrs = TableAttributes::default();
        for (key, child) in node.entries()? {
            match key.as_str() {
                "export_kernel" if table.takes_export_kernel() => {
                    attrs.export_kernel = Some(child.as_bool()?)
                }
                _ => return Err(node.unknown(&key)),
            }
        }
        Ok(attrs)
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Bgp,
    Kernel,
    Ospf,
    Rip,
    Static,
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum Igp {
    Rip,
    Ospf,
}

impl Igp {
    pub fn table(&self) -> Table {
        match self {
            Igp::Rip => Table::Rip,
            Igp::Ospf => Table::Ospf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticTarget {
    Via(IpAddr),
    Interface(String),
    Blackhole,
}

/// A configured static route such as `0.0.0.0/0 via 100.101.0.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    pub prefix: IpNet,
    pub target: StaticTarget,
}

impl StaticRoute {
    pub fn family(&self) -> AddressFamily {
        match self.prefix {
            IpNet::V4(_) => AddressFamily::Ipv4,
            IpNet::V6(_) => AddressFamily::Ipv6,
        }
    }

    pub fn is_default(&self) -> bool {
        self.prefix.prefix_len() == 0
    }

    pub fn is_blackhole(&self) -> bool {
        self.target == StaticTarget::Blackhole
    }
}

impl FromStr for StaticRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let prefix: IpNet = parts
            .first()
            .ok_or("empty static route")?
            .parse()
            .map_err(|e| format!("bad prefix: {}", e))?;
        let target = match parts[1..] {
            ["blackhole"] => StaticTarget::Blackhole,
            ["via", nexthop] if nexthop.starts_with('"') => {
                StaticTarget::Interface(nexthop.trim_matches('"').to_string())
            }
            ["via", nexthop] => {
                let nexthop: IpAddr = nexthop
                    .parse()
                    .map_err(|e| format!("bad nexthop: {}", e))?;
                if nexthop.is_ipv4() != prefix.addr().is_ipv4() {
                    return Err("nexthop family does not match prefix".to_string());
                }
                StaticTarget::Via(nexthop)
            }
            _ => return Err("expected '<prefix> via <nexthop>' or '<prefix> blackhole'".into()),
        };
        Ok(StaticRoute { prefix, target })
    }
}

impl fmt::Display for StaticRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            StaticTarget::Via(nh) => write!(f, "{} via {}", self.prefix, nh),
            StaticTarget::Interface(iface) => write!(f, "{} via \"{}\"", self.prefix, iface),
            StaticTarget::Blackhole => write!(f, "{} blackhole", self.prefix),
        }
    }
}

impl Serialize for StaticRoute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Import filter lists. Each list replaces the inherited one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterAttributes {
    pub prefixes: Option<Vec<IpNet>>,
    pub asns: Option<Vec<u32>>,
    pub as_sets: Option<Vec<String>>,
}

impl FilterAttributes {
    fn from_node(node: &Node) -> Result<Self, SchemaError> {
        let mut filter = FilterAttributes::default();
        for (key, child) in node.entries()? {
            match key.as_str() {
                "prefixes" => filter.prefixes = Some(child.parsed_list()?),
                "asns" => filter.asns = Some(child.parsed_list()?),
                "as_sets" => filter.as_sets = Some(child.string_list()?),
                _ => return Err(node.unknown(&key)),
            }
        }
        Ok(filter)
    }

    fn overlay(&self, lower: &FilterAttributes) -> FilterAttributes {
        FilterAttributes {
            prefixes: self.prefixes.clone().or_else(|| lower.prefixes.clone()),
            asns: self.asns.clone().or_else(|| lower.asns.clone()),
            as_sets: self.as_sets.clone().or_else(|| lower.as_sets.clone()),
        }
    }
}

/// Attributes that can be set globally, by a peer type default, or per peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerAttributes {
    pub passive: Option<bool>,
    pub multihop: Option<u32>,
    pub graceful_shutdown: Option<bool>,
    pub quarantine: Option<bool>,
    pub prefix_limit4: Option<u32>,
    pub prefix_limit6: Option<u32>,
    pub rr_cluster_id: Option<Ipv4Addr>,
    pub prepend: Option<u32>,
    pub location: Option<u32>,
    pub replace_aspath: Option<bool>,
    pub blackhole_community: Option<Vec<LargeCommunity>>,
    pub accept: BTreeMap<AcceptOption, bool>,
    pub redistribute: BTreeMap<RedistributeOption, bool>,
    pub filter: FilterAttributes,
    /// A `None` bound is an explicit "unbounded".
    pub constraints: BTreeMap<ConstraintKey, Option<u8>>,
    pub ceilings: BTreeMap<CommunityCeiling, i64>,
    pub incoming_large_communities: Option<Vec<LargeCommunity>>,
    pub outgoing_large_communities: Option<Vec<LargeCommunity>>,
}

impl PeerAttributes {
    /// Returns the attributes with `self` taking precedence over `lower`.
    /// Flag maps and constraint bounds are merged per key.
    pub fn overlay(&self, lower: &PeerAttributes) -> PeerAttributes {
        let mut accept = lower.accept.clone();
        accept.extend(self.accept.iter().map(|(k, v)| (*k, *v)));
        let mut redistribute = lower.redistribute.clone();
        redistribute.extend(self.redistribute.iter().map(|(k, v)| (*k, *v)));
        let mut constraints = lower.constraints.clone();
        constraints.extend(self.constraints.iter().map(|(k, v)| (*k, *v)));
        let mut ceilings = lower.ceilings.clone();
        ceilings.extend(self.ceilings.iter().map(|(k, v)| (*k, *v)));

        PeerAttributes {
            passive: self.passive.or(lower.passive),
            multihop: self.multihop.or(lower.multihop),
            graceful_shutdown: self.graceful_shutdown.or(lower.graceful_shutdown),
            quarantine: self.quarantine.or(lower.quarantine),
            prefix_limit4: self.prefix_limit4.or(lower.prefix_limit4),
            prefix_limit6: self.prefix_limit6.or(lower.prefix_limit6),
            rr_cluster_id: self.rr_cluster_id.or(lower.rr_cluster_id),
            prepend: self.prepend.or(lower.prepend),
            location: self.location.or(lower.location),
            replace_aspath: self.replace_aspath.or(lower.replace_aspath),
            blackhole_community: self
                .blackhole_community
                .clone()
                .or_else(|| lower.blackhole_community.clone()),
            accept,
            redistribute,
            filter: self.filter.overlay(&lower.filter),
            constraints,
            ceilings,
            incoming_large_communities: self
                .incoming_large_communities
                .clone()
                .or_else(|| lower.incoming_large_communities.clone()),
            outgoing_large_communities: self
                .outgoing_large_communities
                .clone()
                .or_else(|| lower.outgoing_large_communities.clone()),
        }
    }

    /// Consumes one attribute key. Returns false if the key is not an
    /// inheritable attribute so that the caller can handle or reject it.
    fn parse_key(&mut self, key: &str, node: &Node) -> Result<bool, SchemaError> {
        match key {
            "passive" => self.passive = Some(node.as_bool()?),
            "multihop" => self.multihop = Some(node.as_bounded(255)?),
            "graceful_shutdown" => self.graceful_shutdown = Some(node.as_bool()?),
            "quarantine" => self.quarantine = Some(node.as_bool()?),
            "prefix_limit4" => self.prefix_limit4 = Some(node.as_u32()?),
            "prefix_limit6" => self.prefix_limit6 = Some(node.as_u32()?),
            "rr_cluster_id" => self.rr_cluster_id = Some(node.parse()?),
            "prepend" => self.prepend = Some(node.as_bounded(10)?),
            "location" => self.location = Some(node.as_u32()?),
            "replace_aspath" => self.replace_aspath = Some(node.as_bool()?),
            "blackhole_community" => self.blackhole_community = Some(node.parsed_list()?),
            "accept" => {
                self.accept = parse_flags(node, &AcceptOption::ALL, AcceptOption::key)?;
            }
            "redistribute" => {
                self.redistribute =
                    parse_flags(node, &RedistributeOption::PEER, RedistributeOption::key)?;
            }
            "filter" => self.filter = FilterAttributes::from_node(node)?,
            "constraints" => self.parse_constraints(node)?,
            "incoming_large_communities" => {
                self.incoming_large_communities = Some(node.parsed_list()?)
            }
            "outgoing_large_communities" => {
                self.outgoing_large_communities = Some(node.parsed_list()?)
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn parse_constraints(&mut self, node: &Node) -> Result<(), SchemaError> {
        for (key, child) in node.entries()? {
            if let Ok(ceiling) = key.parse::<CommunityCeiling>() {
                self.ceilings.insert(ceiling, child.as_i64()?);
                continue;
            }
            let constraint: ConstraintKey = key.parse().map_err(|_| node.unknown(&key))?;
            let bound = if child.is_null() {
                None
            } else {
                // Family limits are checked by the validator so the message
                // can name the peer.
                Some(child.as_bounded(u8::MAX as u32)? as u8)
            };
            self.constraints.insert(constraint, bound);
        }
        Ok(())
    }
}

/// Explicit configuration of a single BGP peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub name: String,
    pub asn: u32,
    pub peer_type: PeerType,
    pub description: Option<String>,
    pub neighbor4: Option<Ipv4Addr>,
    pub neighbor6: Option<Ipv6Addr>,
    pub source_address4: Option<Ipv4Addr>,
    pub source_address6: Option<Ipv6Addr>,
    pub attributes: PeerAttributes,
}

impl PeerConfig {
    /// Builds a peer with no explicit attributes.
    pub fn new(name: impl Into<String>, asn: u32, peer_type: PeerType) -> Self {
        PeerConfig {
            name: name.into(),
            asn,
            peer_type,
            description: None,
            neighbor4: None,
            neighbor6: None,
            source_address4: None,
            source_address6: None,
            attributes: PeerAttributes::default(),
        }
    }

    fn from_node(name: &str, node: &Node) -> Result<Self, SchemaError> {
        let mut asn = None;
        let mut peer_type = None;
        let mut peer = PeerConfig::new(name, 0, PeerType::Peer);
        for (key, child) in node.entries()? {
            match key.as_str() {
                "asn" => asn = Some(child.as_u32()?),
                "peer_type" => peer_type = Some(child.parse()?),
                "description" => peer.description = Some(child.as_str()?.to_string()),
                "neighbor4" => peer.neighbor4 = Some(child.parse()?),
                "neighbor6" => peer.neighbor6 = Some(child.parse()?),
                "source_address4" => peer.source_address4 = Some(child.parse()?),
                "source_address6" => peer.source_address6 = Some(child.parse()?),
                _ => {
                    if !peer.attributes.parse_key(&key, &child)? {
                        return Err(node.unknown(&key));
                    }
                }
            }
        }
        peer.asn = asn.ok_or_else(|| node.missing("asn"))?;
        peer.peer_type = peer_type.ok_or_else(|| node.missing("peer_type"))?;
        Ok(peer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpConfig {
    pub asn: u32,
    /// Global level of the attribute hierarchy.
    pub attributes: PeerAttributes,
    pub peers: BTreeMap<String, PeerConfig>,
}

impl BgpConfig {
    pub fn new(asn: u32) -> Self {
        BgpConfig {
            asn,
            attributes: PeerAttributes::default(),
            peers: BTreeMap::new(),
        }
    }

    pub fn add_peer(&mut self, peer: PeerConfig) {
        self.peers.insert(peer.name.clone(), peer);
    }

    fn from_node(node: &Node) -> Result<Self, SchemaError> {
        let mut asn = None;
        let mut bgp = BgpConfig::new(0);
        for (key, child) in node.entries()? {
            match key.as_str() {
                "asn" => asn = Some(child.as_u32()?),
                "peers" => {
                    for (name, peer_node) in child.entries()? {
                        bgp.add_peer(PeerConfig::from_node(&name, &peer_node)?);
                    }
                }
                _ => {
                    if !bgp.attributes.parse_key(&key, &child)? {
                        return Err(node.unknown(&key));
                    }
                }
            }
        }
        bgp.asn = asn.ok_or_else(|| node.missing("asn"))?;
        Ok(bgp)
    }
}

/// RIP or OSPF protocol section. These are table scoped: their policies apply
/// to the protocol table as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgpConfig {
    pub protocol: Igp,
    pub accept: BTreeMap<AcceptOption, bool>,
    pub redistribute: BTreeMap<RedistributeOption, bool>,
    pub interfaces: Vec<String>,
}

impl IgpConfig {
    pub fn new(protocol: Igp) -> Self {
        IgpConfig {
            protocol,
            accept: BTreeMap::new(),
            redistribute: BTreeMap::new(),
            interfaces: vec![],
        }
    }

    fn from_node(protocol: Igp, node: &Node) -> Result<Self, SchemaError> {
        let mut igp = IgpConfig::new(protocol);
        for (key, child) in node.entries()? {
            match key.as_str() {
                "accept" => {
                    igp.accept = parse_flags(&child, &AcceptOption::IGP, AcceptOption::key)?
                }
                "redistribute" => {
                    igp.redistribute = parse_flags(
                        &child,
                        &RedistributeOption::igp(protocol),
                        RedistributeOption::key,
                    )?
                }
                "interfaces" => {
                    igp.interfaces = child.entries()?.into_iter().map(|(k, _)| k).collect()
                }
                _ => return Err(node.unknown(&key)),
            }
        }
        Ok(igp)
    }
}

/// The configuration of one router, as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub router_id: Ipv4Addr,
    pub static_routes: Vec<StaticRoute>,
    pub tables: BTreeMap<Table, TableAttributes>,
    pub rip: Option<IgpConfig>,
    pub ospf: Option<IgpConfig>,
    pub bgp: Option<BgpConfig>,
}

impl RouterConfig {
    pub fn new(router_id: Ipv4Addr) -> Self {
        RouterConfig {
            router_id,
            static_routes: vec![],
            tables: BTreeMap::new(),
            rip: None,
            ospf: None,
            bgp: None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let root = Node::root(value);
        let mut router_id = None;
        let mut config = RouterConfig::new(Ipv4Addr::UNSPECIFIED);
        for (key, child) in root.entries()? {
            match key.as_str() {
                "router_id" => router_id = Some(child.parse()?),
                "static" => config.static_routes = child.parsed_list()?,
                "tables" => {
                    for (name, table_node) in child.entries()? {
                        let table = Table::ALL
                            .iter()
                            .find(|t| t.as_str() == name)
                            .ok_or_else(|| child.unknown(&name))?;
                        config
                            .tables
                            .insert(*table, TableAttributes::from_node(*table, &table_node)?);
                    }
                }
                "rip" => config.rip = Some(IgpConfig::from_node(Igp::Rip, &child)?),
                "ospf" => config.ospf = Some(IgpConfig::from_node(Igp::Ospf, &child)?),
                "bgp" => config.bgp = Some(BgpConfig::from_node(&child)?),
                _ => return Err(root.unknown(&key)),
            }
        }
        config.router_id = router_id.ok_or_else(|| root.missing("router_id"))?;
        Ok(config)
    }

    pub fn igps(&self) -> impl Iterator<Item = &IgpConfig> {
        self.rip.iter().chain(self.ospf.iter())
    }

    pub fn enabled_protocols(&self) -> Vec<Protocol> {
        let mut protocols = vec![Protocol::Kernel];
        if self.bgp.is_some() {
            protocols.push(Protocol::Bgp);
        }
        if self.ospf.is_some() {
            protocols.push(Protocol::Ospf);
        }
        if self.rip.is_some() {
            protocols.push(Protocol::Rip);
        }
        if !self.static_routes.is_empty() {
            protocols.push(Protocol::Static);
        }
        protocols.sort();
        protocols
    }
}
