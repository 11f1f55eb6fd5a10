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

//! Large community encoding of route origin, relation and action functions.
//!
//! All functional communities are of the form `LOCAL_ASN:function:argument`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::resolver::ResolvedPeer;
use crate::schema::{AcceptOption, PeerType};

pub const FUNCTION_RELATION: u32 = 3;
pub const FUNCTION_NOEXPORT: u32 = 4;
pub const FUNCTION_PREPEND_ONE: u32 = 6;
pub const FUNCTION_PREPEND_TWO: u32 = 62;
pub const FUNCTION_PREPEND_THREE: u32 = 63;
pub const FUNCTION_PREPEND_LOCATION_ONE: u32 = 7;
pub const FUNCTION_PREPEND_LOCATION_TWO: u32 = 72;
pub const FUNCTION_PREPEND_LOCATION_THREE: u32 = 73;
pub const FUNCTION_LOCALPREF_MINUS: u32 = 8;
pub const FUNCTION_BLACKHOLE: u32 = 666;
pub const FUNCTION_STRIP: u32 = 1000;

/// RFC 8326 well-known community attached to routes towards peers in
/// graceful shutdown.
pub const GRACEFUL_SHUTDOWN: (u16, u16) = (65535, 0);

/// A RFC 8092 large community.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct LargeCommunity {
    pub asn: u32,
    pub function: u32,
    pub argument: u32,
}

impl LargeCommunity {
    pub fn new(asn: u32, function: u32, argument: u32) -> Self {
        LargeCommunity {
            asn,
            function,
            argument,
        }
    }
}

impl FromStr for LargeCommunity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .trim_matches(|c: char| c == '(' || c == ')')
            .split([':', ','])
            .collect();
        if parts.len() != 3 {
            return Err(format!("large community '{}' must have three parts", s));
        }
        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|e| format!("large community '{}': {}", s, e))?;
        }
        Ok(LargeCommunity::new(values[0], values[1], values[2]))
    }
}

impl fmt::Display for LargeCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.asn, self.function, self.argument)
    }
}

impl Serialize for LargeCommunity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Per route ceilings on the number of communities of each kind. Routes over
/// the ceiling are rejected by the daemon, never truncated.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum CommunityCeiling {
    Standard,
    Extended,
    Large,
}

impl CommunityCeiling {
    pub const ALL: [CommunityCeiling; 3] = [
        CommunityCeiling::Standard,
        CommunityCeiling::Extended,
        CommunityCeiling::Large,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CommunityCeiling::Standard => "community_maxlen",
            CommunityCeiling::Extended => "extended_community_maxlen",
            CommunityCeiling::Large => "large_community_maxlen",
        }
    }

    pub fn schema_default(&self) -> i64 {
        match self {
            CommunityCeiling::Standard => 100,
            CommunityCeiling::Extended => 100,
            CommunityCeiling::Large => 10,
        }
    }
}

impl FromStr for CommunityCeiling {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommunityCeiling::ALL
            .iter()
            .find(|c| c.key() == s)
            .copied()
            .ok_or_else(|| format!("unknown community ceiling '{}'", s))
    }
}

impl Serialize for CommunityCeiling {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Where a route was originally learned, as carried in `ASN:3:N`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Own = 1,
    Customer = 2,
    Peer = 3,
    Transit = 4,
    RouteServer = 5,
}

impl Relation {
    /// Relation tag attached to routes learned from a peer type. Internal
    /// types propagate the tag of the edge router and route collectors are
    /// never a source of routes.
    pub fn for_peer_type(peer_type: PeerType) -> Option<Relation> {
        match peer_type {
            PeerType::Customer => Some(Relation::Customer),
            PeerType::Peer => Some(Relation::Peer),
            PeerType::Transit => Some(Relation::Transit),
            PeerType::RouteServer => Some(Relation::RouteServer),
            PeerType::RouteCollector
            | PeerType::Internal
            | PeerType::RrClient
            | PeerType::RrServer
            | PeerType::RrServerRrServer => None,
        }
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityFunction {
    RelationTag,
    LocalPrefAdjust,
    Prepend,
    Blackhole,
    NoExport,
    Strip,
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum Argument {
    Exact(u32),
    /// Matches any argument, the value is taken from the route.
    Any,
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Exact(v) => write!(f, "{}", v),
            Argument::Any => write!(f, "*"),
        }
    }
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Argument::Exact(v) => serializer.serialize_u32(*v),
            Argument::Any => serializer.serialize_str("*"),
        }
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Applied to routes received from the peer.
    Import,
    /// Applied to routes sent to the peer.
    Export,
}

/// One `ASN:function:argument` rule.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
pub struct CommunityRule {
    pub direction: Direction,
    pub function: CommunityFunction,
    pub asn: u32,
    pub code: u32,
    pub argument: Argument,
}

impl CommunityRule {
    fn new(
        direction: Direction,
        function: CommunityFunction,
        asn: u32,
        code: u32,
        argument: Argument,
    ) -> Self {
        CommunityRule {
            direction,
            function,
            asn,
            code,
            argument,
        }
    }

    /// Number of times the AS path is prepended for prepend rules.
    pub fn prepend_count(&self) -> Option<u8> {
        if self.function != CommunityFunction::Prepend {
            return None;
        }
        match self.code {
            FUNCTION_PREPEND_ONE | FUNCTION_PREPEND_LOCATION_ONE => Some(1),
            FUNCTION_PREPEND_TWO | FUNCTION_PREPEND_LOCATION_TWO => Some(2),
            FUNCTION_PREPEND_THREE | FUNCTION_PREPEND_LOCATION_THREE => Some(3),
            _ => None,
        }
    }

    pub fn community(&self) -> Option<LargeCommunity> {
        match self.argument {
            Argument::Exact(v) => Some(LargeCommunity::new(self.asn, self.code, v)),
            Argument::Any => None,
        }
    }
}

impl fmt::Display for CommunityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.asn, self.code, self.argument)
    }
}

fn honoured_functions(asn: u32, blackhole: bool) -> Vec<CommunityRule> {
    use CommunityFunction::*;
    let import = |function, code| {
        CommunityRule::new(Direction::Import, function, asn, code, Argument::Any)
    };
    let mut rules = vec![
        import(LocalPrefAdjust, FUNCTION_LOCALPREF_MINUS),
        import(NoExport, FUNCTION_NOEXPORT),
        import(Prepend, FUNCTION_PREPEND_ONE),
        import(Prepend, FUNCTION_PREPEND_TWO),
        import(Prepend, FUNCTION_PREPEND_THREE),
        import(Prepend, FUNCTION_PREPEND_LOCATION_ONE),
        import(Prepend, FUNCTION_PREPEND_LOCATION_TWO),
        import(Prepend, FUNCTION_PREPEND_LOCATION_THREE),
        import(Strip, FUNCTION_STRIP),
    ];
    if blackhole {
        rules.push(CommunityRule::new(
            Direction::Import,
            Blackhole,
            asn,
            FUNCTION_BLACKHOLE,
            Argument::Exact(0),
        ));
    }
    rules
}

/// Action communities that change how a route is exported to an eBGP peer.
fn edge_export_actions(asn: u32, peer: &ResolvedPeer) -> Vec<CommunityRule> {
    use CommunityFunction::*;
    let export = |function, code, argument| {
        CommunityRule::new(Direction::Export, function, asn, code, Argument::Exact(argument))
    };
    let mut rules = vec![
        export(NoExport, FUNCTION_NOEXPORT, 0),
        export(NoExport, FUNCTION_NOEXPORT, peer.asn),
        export(Prepend, FUNCTION_PREPEND_ONE, peer.asn),
        export(Prepend, FUNCTION_PREPEND_TWO, peer.asn),
        export(Prepend, FUNCTION_PREPEND_THREE, peer.asn),
        export(Strip, FUNCTION_STRIP, 0),
    ];
    if let Some(location) = peer.location {
        rules.push(export(Prepend, FUNCTION_PREPEND_LOCATION_ONE, location));
        rules.push(export(Prepend, FUNCTION_PREPEND_LOCATION_TWO, location));
        rules.push(export(Prepend, FUNCTION_PREPEND_LOCATION_THREE, location));
    }
    rules
}

/// Computes the community rules for a peer. `relation` is the relation of
/// routes learned from the peer.
pub fn encode(
    peer: &ResolvedPeer,
    local_asn: u32,
    relation: Option<Relation>,
) -> BTreeSet<CommunityRule> {
    let mut rules = BTreeSet::new();
    if let Some(relation) = relation {
        rules.insert(CommunityRule::new(
            Direction::Import,
            CommunityFunction::RelationTag,
            local_asn,
            FUNCTION_RELATION,
            Argument::Exact(relation as u32),
        ));
    }

    match peer.peer_type {
        PeerType::Customer => {
            let blackhole = peer.accept(AcceptOption::BgpCustomerBlackhole);
            rules.extend(honoured_functions(local_asn, blackhole));
            rules.extend(edge_export_actions(local_asn, peer));
        }
        PeerType::Peer | PeerType::Transit | PeerType::RouteServer | PeerType::RouteCollector => {
            rules.extend(edge_export_actions(local_asn, peer));
        }
        PeerType::Internal
        | PeerType::RrClient
        | PeerType::RrServer
        | PeerType::RrServerRrServer => {
            let blackhole = peer.accept(AcceptOption::BgpCustomerBlackhole)
                || peer.accept(AcceptOption::BgpOwnBlackhole);
            rules.extend(honoured_functions(local_asn, blackhole));
            // Routes we redistribute ourselves are tagged as our own.
            rules.insert(CommunityRule::new(
                Direction::Export,
                CommunityFunction::RelationTag,
                local_asn,
                FUNCTION_RELATION,
                Argument::Exact(Relation::Own as u32),
            ));
        }
    }
    rules
}

/// Whether communities carrying our ASN are removed from routes received
/// from the peer. Only customers and internal peers may instruct us.
pub fn strips_own_inbound(peer_type: PeerType) -> bool {
    match peer_type {
        PeerType::Peer
        | PeerType::Transit
        | PeerType::RouteServer
        | PeerType::RouteCollector => true,
        PeerType::Customer
        | PeerType::Internal
        | PeerType::RrClient
        | PeerType::RrServer
        | PeerType::RrServerRrServer => false,
    }
}
