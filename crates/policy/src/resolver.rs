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

//! Override resolution: peer explicit value, then peer type default, then
//! global value, then the built in schema default. The first level that
//! defines an attribute wins.
//!
//! Runtime peer lists (graceful shutdown, quarantine) sit above all of these
//! for the two attributes they control.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use serde::Serialize;
use tracing::trace;

use crate::community::{CommunityCeiling, LargeCommunity};
use crate::constraints::{self, Constraint, ConstraintKey};
use crate::defaults;
use crate::peer_list::RuntimeLists;
use crate::schema::{
    AcceptOption, AddressFamily, PeerAttributes, PeerConfig, PeerType, RedistributeOption,
};

/// The level an attribute value was taken from.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    RuntimeList,
    Peer,
    PeerType,
    Global,
    Schema,
}

/// The three configuration levels for one peer.
#[derive(Debug, Clone)]
pub struct Layers<'a> {
    peer: &'a PeerAttributes,
    peer_type: PeerAttributes,
    global: &'a PeerAttributes,
}

impl<'a> Layers<'a> {
    pub fn new(peer: &'a PeerConfig, global: &'a PeerAttributes) -> Self {
        Layers {
            peer: &peer.attributes,
            peer_type: defaults::for_peer_type(peer.peer_type),
            global,
        }
    }

    /// Returns the first value defined by a level, or the schema default.
    pub fn pick<T>(&self, get: impl Fn(&PeerAttributes) -> Option<T>, schema: T) -> (T, Level) {
        if let Some(v) = get(self.peer) {
            return (v, Level::Peer);
        }
        if let Some(v) = get(&self.peer_type) {
            return (v, Level::PeerType);
        }
        if let Some(v) = get(self.global) {
            return (v, Level::Global);
        }
        (schema, Level::Schema)
    }
}

/// Identifies one resolvable attribute of a peer.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum Attribute {
    Passive,
    Multihop,
    GracefulShutdown,
    Quarantine,
    PrefixLimit(AddressFamily),
    RrClusterId,
    Prepend,
    Location,
    ReplaceAspath,
    BlackholeCommunity,
    Accept(AcceptOption),
    Redistribute(RedistributeOption),
    FilterPrefixes,
    FilterAsns,
    FilterAsSets,
    Constraint(ConstraintKey),
    Ceiling(CommunityCeiling),
    IncomingLargeCommunities,
    OutgoingLargeCommunities,
}

impl Attribute {
    /// Every attribute in a fixed order.
    pub fn all() -> Vec<Attribute> {
        let mut all = vec![
            Attribute::Passive,
            Attribute::Multihop,
            Attribute::GracefulShutdown,
            Attribute::Quarantine,
            Attribute::PrefixLimit(AddressFamily::Ipv4),
            Attribute::PrefixLimit(AddressFamily::Ipv6),
            Attribute::RrClusterId,
            Attribute::Prepend,
            Attribute::Location,
            Attribute::ReplaceAspath,
            Attribute::BlackholeCommunity,
        ];
        all.extend(AcceptOption::ALL.iter().map(|o| Attribute::Accept(*o)));
        all.extend(RedistributeOption::PEER.iter().map(|o| Attribute::Redistribute(*o)));
        all.extend([
            Attribute::FilterPrefixes,
            Attribute::FilterAsns,
            Attribute::FilterAsSets,
        ]);
        all.extend(ConstraintKey::all().into_iter().map(Attribute::Constraint));
        all.extend(CommunityCeiling::ALL.iter().map(|c| Attribute::Ceiling(*c)));
        all.extend([
            Attribute::IncomingLargeCommunities,
            Attribute::OutgoingLargeCommunities,
        ]);
        all
    }

    /// Boolean flags nested in a category, reported as `category[key]`.
    pub fn is_nested_flag(&self) -> bool {
        matches!(self, Attribute::Accept(_) | Attribute::Redistribute(_))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Passive => write!(f, "passive"),
            Attribute::Multihop => write!(f, "multihop"),
            Attribute::GracefulShutdown => write!(f, "graceful_shutdown"),
            Attribute::Quarantine => write!(f, "quarantine"),
            Attribute::PrefixLimit(family) => write!(f, "prefix_limit{}", family.suffix()),
            Attribute::RrClusterId => write!(f, "rr_cluster_id"),
            Attribute::Prepend => write!(f, "prepend"),
            Attribute::Location => write!(f, "location"),
            Attribute::ReplaceAspath => write!(f, "replace_aspath"),
            Attribute::BlackholeCommunity => write!(f, "blackhole_community"),
            Attribute::Accept(o) => write!(f, "accept[{}]", o.key()),
            Attribute::Redistribute(o) => write!(f, "redistribute[{}]", o.key()),
            Attribute::FilterPrefixes => write!(f, "filter[prefixes]"),
            Attribute::FilterAsns => write!(f, "filter[asns]"),
            Attribute::FilterAsSets => write!(f, "filter[as_sets]"),
            Attribute::Constraint(key) => write!(f, "constraints[{}]", key),
            Attribute::Ceiling(c) => write!(f, "constraints[{}]", c.key()),
            Attribute::IncomingLargeCommunities => write!(f, "incoming_large_communities"),
            Attribute::OutgoingLargeCommunities => write!(f, "outgoing_large_communities"),
        }
    }
}

/// A resolved attribute value, independent of its Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Flag(bool),
    Number(Option<i64>),
    Address(Option<Ipv4Addr>),
    Bound(Option<u8>),
    Communities(Vec<LargeCommunity>),
    Prefixes(Vec<IpNet>),
    Asns(Vec<u32>),
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: AttributeValue,
    pub level: Level,
}

impl Resolved {
    /// Whether the attribute counts as set for compatibility checks: a true
    /// flag or a present address at any level. Numbers, bounds and lists
    /// taken from a default level apply only where the type permits them, so
    /// they count as set only when the peer configures them itself.
    pub fn is_set(&self) -> bool {
        let explicit = self.level == Level::Peer;
        match &self.value {
            AttributeValue::Flag(b) => *b,
            AttributeValue::Address(a) => a.is_some(),
            AttributeValue::Number(n) => explicit && n.is_some(),
            AttributeValue::Bound(_) => explicit,
            AttributeValue::Communities(v) => explicit && !v.is_empty(),
            AttributeValue::Prefixes(v) => explicit && !v.is_empty(),
            AttributeValue::Asns(v) => explicit && !v.is_empty(),
            AttributeValue::Names(v) => explicit && !v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub prefixes: Vec<IpNet>,
    pub asns: Vec<u32>,
    pub as_sets: Vec<String>,
}

/// A peer with every attribute resolved to a concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeer {
    pub name: String,
    pub asn: u32,
    pub peer_type: PeerType,
    pub description: Option<String>,
    pub neighbor4: Option<Ipv4Addr>,
    pub neighbor6: Option<Ipv6Addr>,
    pub source_address4: Option<Ipv4Addr>,
    pub source_address6: Option<Ipv6Addr>,
    pub passive: bool,
    pub multihop: Option<u32>,
    pub graceful_shutdown: bool,
    pub quarantine: bool,
    pub prefix_limit4: Option<u32>,
    pub prefix_limit6: Option<u32>,
    pub rr_cluster_id: Option<Ipv4Addr>,
    pub prepend: u32,
    pub location: Option<u32>,
    pub replace_aspath: bool,
    pub blackhole_community: Vec<LargeCommunity>,
    pub accept: BTreeMap<AcceptOption, bool>,
    pub redistribute: BTreeMap<RedistributeOption, bool>,
    pub filter: Filter,
    pub constraints: Vec<Constraint>,
    pub ceilings: BTreeMap<CommunityCeiling, i64>,
    pub incoming_large_communities: Vec<LargeCommunity>,
    pub outgoing_large_communities: Vec<LargeCommunity>,
}

impl ResolvedPeer {
    pub fn accept(&self, option: AcceptOption) -> bool {
        self.accept.get(&option).copied().unwrap_or(false)
    }

    pub fn redistribute(&self, option: RedistributeOption) -> bool {
        self.redistribute.get(&option).copied().unwrap_or(false)
    }
}

/// Resolves peer attributes against the global level of one router.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    global: &'a PeerAttributes,
    lists: &'a RuntimeLists,
}

impl<'a> Resolver<'a> {
    pub fn new(global: &'a PeerAttributes, lists: &'a RuntimeLists) -> Self {
        Resolver { global, lists }
    }

    pub fn layers<'p>(&self, peer: &'p PeerConfig) -> Layers<'p>
    where
        'a: 'p,
    {
        Layers::new(peer, self.global)
    }

    /// Resolves a single attribute of a peer.
    pub fn resolve(&self, attribute: Attribute, peer: &PeerConfig) -> Resolved {
        let layers = self.layers(peer);
        let (value, level) = match attribute {
            Attribute::Passive => flag(layers.pick(|a| a.passive, false)),
            Attribute::Multihop => number(layers.pick(|a| a.multihop.map(Some), None)),
            Attribute::GracefulShutdown => {
                if self.lists.graceful_shutdown.matches(&peer.name) {
                    (AttributeValue::Flag(true), Level::RuntimeList)
                } else {
                    flag(layers.pick(|a| a.graceful_shutdown, false))
                }
            }
            Attribute::Quarantine => {
                if self.lists.quarantine.matches(&peer.name) {
                    (AttributeValue::Flag(true), Level::RuntimeList)
                } else {
                    flag(layers.pick(|a| a.quarantine, false))
                }
            }
            Attribute::PrefixLimit(AddressFamily::Ipv4) => {
                number(layers.pick(|a| a.prefix_limit4.map(Some), None))
            }
            Attribute::PrefixLimit(AddressFamily::Ipv6) => {
                number(layers.pick(|a| a.prefix_limit6.map(Some), None))
            }
            Attribute::RrClusterId => {
                let (v, level) = layers.pick(|a| a.rr_cluster_id.map(Some), None);
                (AttributeValue::Address(v), level)
            }
            Attribute::Prepend => {
                let (v, level) = layers.pick(|a| a.prepend, 0);
                (AttributeValue::Number(Some(v.into())), level)
            }
            Attribute::Location => number(layers.pick(|a| a.location.map(Some), None)),
            Attribute::ReplaceAspath => flag(layers.pick(|a| a.replace_aspath, false)),
            Attribute::BlackholeCommunity => {
                let (v, level) = layers.pick(|a| a.blackhole_community.clone(), vec![]);
                (AttributeValue::Communities(v), level)
            }
            Attribute::Accept(option) => {
                flag(layers.pick(|a| a.accept.get(&option).copied(), false))
            }
            Attribute::Redistribute(option) => {
                flag(layers.pick(|a| a.redistribute.get(&option).copied(), false))
            }
            Attribute::FilterPrefixes => {
                let (v, level) = layers.pick(|a| a.filter.prefixes.clone(), vec![]);
                (AttributeValue::Prefixes(v), level)
            }
            Attribute::FilterAsns => {
                let (v, level) = layers.pick(|a| a.filter.asns.clone(), vec![]);
                (AttributeValue::Asns(v), level)
            }
            Attribute::FilterAsSets => {
                let (v, level) = layers.pick(|a| a.filter.as_sets.clone(), vec![]);
                (AttributeValue::Names(v), level)
            }
            Attribute::Constraint(key) => {
                let (v, level) = constraints::resolve_bound(&layers, &key);
                (AttributeValue::Bound(v), level)
            }
            Attribute::Ceiling(ceiling) => {
                let (v, level) =
                    layers.pick(|a| a.ceilings.get(&ceiling).copied(), ceiling.schema_default());
                (AttributeValue::Number(Some(v)), level)
            }
            Attribute::IncomingLargeCommunities => {
                let (v, level) = layers.pick(|a| a.incoming_large_communities.clone(), vec![]);
                (AttributeValue::Communities(v), level)
            }
            Attribute::OutgoingLargeCommunities => {
                let (v, level) = layers.pick(|a| a.outgoing_large_communities.clone(), vec![]);
                (AttributeValue::Communities(v), level)
            }
        };
        trace!(peer = %peer.name, %attribute, ?level, "resolved attribute");
        Resolved { value, level }
    }

    /// Resolves every attribute of a peer.
    pub fn resolve_peer(&self, peer: &PeerConfig) -> ResolvedPeer {
        let layers = self.layers(peer);
        let flag_of = |attribute| match self.resolve(attribute, peer).value {
            AttributeValue::Flag(b) => b,
            _ => false,
        };

        let accept = AcceptOption::ALL
            .iter()
            .map(|o| (*o, flag_of(Attribute::Accept(*o))))
            .collect();
        let redistribute = RedistributeOption::PEER
            .iter()
            .map(|o| (*o, flag_of(Attribute::Redistribute(*o))))
            .collect();
        let ceilings = CommunityCeiling::ALL
            .iter()
            .map(|c| {
                let (v, _) = layers.pick(|a| a.ceilings.get(c).copied(), c.schema_default());
                (*c, v)
            })
            .collect();

        ResolvedPeer {
            name: peer.name.clone(),
            asn: peer.asn,
            peer_type: peer.peer_type,
            description: peer.description.clone(),
            neighbor4: peer.neighbor4,
            neighbor6: peer.neighbor6,
            source_address4: peer.source_address4,
            source_address6: peer.source_address6,
            passive: flag_of(Attribute::Passive),
            multihop: layers.pick(|a| a.multihop.map(Some), None).0,
            graceful_shutdown: flag_of(Attribute::GracefulShutdown),
            quarantine: flag_of(Attribute::Quarantine),
            prefix_limit4: layers.pick(|a| a.prefix_limit4.map(Some), None).0,
            prefix_limit6: layers.pick(|a| a.prefix_limit6.map(Some), None).0,
            rr_cluster_id: layers.pick(|a| a.rr_cluster_id.map(Some), None).0,
            prepend: layers.pick(|a| a.prepend, 0).0,
            location: layers.pick(|a| a.location.map(Some), None).0,
            replace_aspath: flag_of(Attribute::ReplaceAspath),
            blackhole_community: layers.pick(|a| a.blackhole_community.clone(), vec![]).0,
            accept,
            redistribute,
            filter: Filter {
                prefixes: layers.pick(|a| a.filter.prefixes.clone(), vec![]).0,
                asns: layers.pick(|a| a.filter.asns.clone(), vec![]).0,
                as_sets: layers.pick(|a| a.filter.as_sets.clone(), vec![]).0,
            },
            constraints: constraints::resolve_all(&layers),
            ceilings,
            incoming_large_communities: layers
                .pick(|a| a.incoming_large_communities.clone(), vec![])
                .0,
            outgoing_large_communities: layers
                .pick(|a| a.outgoing_large_communities.clone(), vec![])
                .0,
        }
    }
}

fn flag((v, level): (bool, Level)) -> (AttributeValue, Level) {
    (AttributeValue::Flag(v), level)
}

fn number((v, level): (Option<u32>, Level)) -> (AttributeValue, Level) {
    (AttributeValue::Number(v.map(i64::from)), level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Bound, Dimension};
    use crate::peer_list::PeerList;
    use pretty_assertions::assert_eq;

    fn global_with(f: impl FnOnce(&mut PeerAttributes)) -> PeerAttributes {
        let mut global = PeerAttributes::default();
        f(&mut global);
        global
    }

    #[test]
    fn test_peer_explicit_wins() {
        let global = global_with(|g| g.passive = Some(true));
        let lists = RuntimeLists::default();
        let resolver = Resolver::new(&global, &lists);

        let mut peer = PeerConfig::new("r2", 65000, PeerType::RrClient);
        peer.attributes.passive = Some(true);
        let resolved = resolver.resolve(Attribute::Passive, &peer);
        assert_eq!(resolved.value, AttributeValue::Flag(true));
        assert_eq!(resolved.level, Level::Peer);
    }

    #[test]
    fn test_peer_type_default_beats_global() {
        let global = global_with(|g| g.passive = Some(true));
        let lists = RuntimeLists::default();
        let resolver = Resolver::new(&global, &lists);

        let peer = PeerConfig::new("r2", 65000, PeerType::RrServer);
        let resolved = resolver.resolve(Attribute::Passive, &peer);
        assert_eq!(resolved.value, AttributeValue::Flag(false));
        assert_eq!(resolved.level, Level::PeerType);

        // Customers have no passive default so the global value applies.
        let peer = PeerConfig::new("c1", 65001, PeerType::Customer);
        let resolved = resolver.resolve(Attribute::Passive, &peer);
        assert_eq!(resolved.value, AttributeValue::Flag(true));
        assert_eq!(resolved.level, Level::Global);
    }

    #[test]
    fn test_schema_default_is_total() {
        let global = PeerAttributes::default();
        let lists = RuntimeLists::default();
        let resolver = Resolver::new(&global, &lists);
        let peer = PeerConfig::new("p1", 65001, PeerType::Peer);
        for attribute in Attribute::all() {
            // Every attribute resolves, nothing is left unset.
            let _ = resolver.resolve(attribute, &peer);
        }
        let resolved = resolver.resolve(Attribute::Ceiling(CommunityCeiling::Large), &peer);
        assert_eq!(resolved.value, AttributeValue::Number(Some(10)));
        assert_eq!(resolved.level, Level::Schema);
    }

    #[test]
    fn test_runtime_list_overrides() {
        let global = PeerAttributes::default();
        let mut lists = RuntimeLists::default();
        lists.graceful_shutdown = PeerList::from_iter(["p*"]);
        let resolver = Resolver::new(&global, &lists);

        let mut peer = PeerConfig::new("p1", 65001, PeerType::Peer);
        peer.attributes.graceful_shutdown = Some(false);
        let resolved = resolver.resolve(Attribute::GracefulShutdown, &peer);
        assert_eq!(resolved.value, AttributeValue::Flag(true));
        assert_eq!(resolved.level, Level::RuntimeList);
        assert!(resolver.resolve_peer(&peer).graceful_shutdown);
        assert!(!resolver.resolve_peer(&peer).quarantine);
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(
            Attribute::Redistribute(RedistributeOption::Default).to_string(),
            "redistribute[default]"
        );
        assert_eq!(
            Attribute::Ceiling(CommunityCeiling::Large).to_string(),
            "constraints[large_community_maxlen]"
        );
        assert_eq!(Attribute::PrefixLimit(AddressFamily::Ipv6).to_string(), "prefix_limit6");
    }

    #[test]
    fn test_default_levels_do_not_count_as_set() {
        let key = ConstraintKey::new(
            Dimension::BlackholeImport,
            Bound::Max,
            Some(AddressFamily::Ipv4),
        );
        let global = global_with(|g| {
            g.constraints.insert(key, Some(31));
            g.prefix_limit4 = Some(500);
        });
        let lists = RuntimeLists::default();
        let resolver = Resolver::new(&global, &lists);

        let mut t1 = PeerConfig::new("t1", 65002, PeerType::Transit);
        let resolved = resolver.resolve(Attribute::Constraint(key), &t1);
        assert_eq!(resolved.value, AttributeValue::Bound(Some(31)));
        assert_eq!(resolved.level, Level::Global);
        assert!(!resolved.is_set());
        let limit = Attribute::PrefixLimit(AddressFamily::Ipv4);
        assert!(!resolver.resolve(limit, &t1).is_set());

        t1.attributes.constraints.insert(key, Some(30));
        assert!(resolver.resolve(Attribute::Constraint(key), &t1).is_set());
    }

    #[test]
    fn test_global_flag_counts_as_set() {
        let global = global_with(|g| {
            g.redistribute.insert(RedistributeOption::Default, true);
        });
        let lists = RuntimeLists::default();
        let resolver = Resolver::new(&global, &lists);
        let peer = PeerConfig::new("t1", 65002, PeerType::Transit);
        let attribute = Attribute::Redistribute(RedistributeOption::Default);
        assert!(resolver.resolve(attribute, &peer).is_set());
    }
}
