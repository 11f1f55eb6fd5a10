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

//! The compiled policy document handed to the daemon config renderer.
//!
//! Every collection is ordered so the same input always produces
//! byte-identical output.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

use crate::community::{
    self, CommunityCeiling, CommunityRule, LargeCommunity, Relation, GRACEFUL_SHUTDOWN,
};
use crate::constraints::Constraint;
use crate::redistribution::{self, AcceptancePolicy, KernelExport, RedistributionPolicy};
use crate::resolver::{Filter, ResolvedPeer};
use crate::schema::{IgpConfig, PeerType, Protocol, RouterConfig, StaticRoute, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    pub router_id: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    pub protocols: Vec<Protocol>,
    pub kernel_export: KernelExport,
    pub static_routes: Vec<StaticRoute>,
    pub igps: Vec<IgpEntry>,
    pub peers: Vec<PeerEntry>,
}

impl PolicyDocument {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn peer(&self, name: &str) -> Option<&PeerEntry> {
        self.peers.iter().find(|p| p.name == name)
    }

    pub fn igp(&self, table: Table) -> Option<&IgpEntry> {
        self.igps.iter().find(|i| i.table == table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgpEntry {
    pub table: Table,
    pub interfaces: Vec<String>,
    pub export_kernel: bool,
    pub redistribution: RedistributionPolicy,
    pub acceptance: AcceptancePolicy,
}

impl IgpEntry {
    pub fn build(igp: &IgpConfig, router: &RouterConfig, kernel: &KernelExport) -> Self {
        let table = igp.protocol.table();
        IgpEntry {
            table,
            interfaces: igp.interfaces.clone(),
            export_kernel: kernel.exports(table),
            redistribution: redistribution::igp_redistribution(igp, router, kernel),
            acceptance: redistribution::igp_acceptance(igp),
        }
    }
}

/// Community handling for one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    pub rules: BTreeSet<CommunityRule>,
    pub strip_own_inbound: bool,
    /// Well-known community attached to every exported route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graceful_shutdown: Option<String>,
    pub blackhole: Vec<LargeCommunity>,
    pub incoming: Vec<LargeCommunity>,
    pub outgoing: Vec<LargeCommunity>,
    pub ceilings: BTreeMap<CommunityCeiling, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerEntry {
    pub name: String,
    pub asn: u32,
    pub peer_type: PeerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor6: Option<Ipv6Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address6: Option<Ipv6Addr>,
    pub passive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multihop: Option<u32>,
    pub graceful_shutdown: bool,
    pub quarantine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_limit4: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_limit6: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_cluster_id: Option<Ipv4Addr>,
    pub prepend: u32,
    pub replace_aspath: bool,
    pub filter: Filter,
    pub constraints: Vec<Constraint>,
    pub redistribution: RedistributionPolicy,
    pub acceptance: AcceptancePolicy,
    pub communities: CommunityPolicy,
}

impl PeerEntry {
    pub fn build(
        peer: ResolvedPeer,
        local_asn: u32,
        router: &RouterConfig,
        kernel: &KernelExport,
    ) -> Self {
        let relation = Relation::for_peer_type(peer.peer_type);
        let communities = CommunityPolicy {
            relation,
            rules: community::encode(&peer, local_asn, relation),
            strip_own_inbound: community::strips_own_inbound(peer.peer_type),
            graceful_shutdown: peer
                .graceful_shutdown
                .then(|| format!("{}:{}", GRACEFUL_SHUTDOWN.0, GRACEFUL_SHUTDOWN.1)),
            blackhole: peer.blackhole_community.clone(),
            incoming: peer.incoming_large_communities.clone(),
            outgoing: peer.outgoing_large_communities.clone(),
            ceilings: peer.ceilings.clone(),
        };
        let redistribution = redistribution::peer_redistribution(&peer, router, kernel);
        let acceptance = redistribution::peer_acceptance(&peer);

        PeerEntry {
            redistribution,
            acceptance,
            communities,
            name: peer.name,
            asn: peer.asn,
            peer_type: peer.peer_type,
            description: peer.description,
            neighbor4: peer.neighbor4,
            neighbor6: peer.neighbor6,
            source_address4: peer.source_address4,
            source_address6: peer.source_address6,
            passive: peer.passive,
            multihop: peer.multihop,
            graceful_shutdown: peer.graceful_shutdown,
            quarantine: peer.quarantine,
            prefix_limit4: peer.prefix_limit4,
            prefix_limit6: peer.prefix_limit6,
            rr_cluster_id: peer.rr_cluster_id,
            prepend: peer.prepend,
            replace_aspath: peer.replace_aspath,
            filter: peer.filter,
            constraints: peer.constraints,
        }
    }
}
