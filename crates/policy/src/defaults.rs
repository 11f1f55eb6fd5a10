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

//! Peer type default table: the middle level of the attribute hierarchy.

use crate::constraints::{Bound, ConstraintKey, Dimension};
use crate::schema::{AcceptOption, AddressFamily, PeerAttributes, PeerType, RedistributeOption};

const EBGP_EXPORT: [RedistributeOption; 3] = [
    RedistributeOption::Originated,
    RedistributeOption::BgpOwn,
    RedistributeOption::BgpCustomer,
];

const FULL_TABLE_EXPORT: [RedistributeOption; 5] = [
    RedistributeOption::Originated,
    RedistributeOption::BgpOwn,
    RedistributeOption::BgpCustomer,
    RedistributeOption::BgpPeering,
    RedistributeOption::BgpTransit,
];

const INTERNAL_EXPORT: [RedistributeOption; 5] = [
    RedistributeOption::Bgp,
    RedistributeOption::BgpOwn,
    RedistributeOption::BgpCustomer,
    RedistributeOption::BgpPeering,
    RedistributeOption::BgpTransit,
];

fn enable<K: Ord + Copy>(map: &mut std::collections::BTreeMap<K, bool>, keys: &[K]) {
    for key in keys {
        map.insert(*key, true);
    }
}

fn internal_constraints(attrs: &mut PeerAttributes) {
    for dimension in [
        Dimension::PrefixImport,
        Dimension::PrefixExport,
        Dimension::BlackholeImport,
        Dimension::BlackholeExport,
    ] {
        for family in AddressFamily::ALL {
            let min = ConstraintKey::new(dimension, Bound::Min, Some(family));
            attrs.constraints.insert(min, Some(0));
            attrs
                .constraints
                .insert(min.other_bound(), Some(family.max_prefix_len()));
        }
    }
    // Locally originated routes reach internal peers with an empty path.
    attrs.constraints.insert(
        ConstraintKey::new(Dimension::AsPathImport, Bound::Min, None),
        Some(0),
    );
}

/// Returns the attributes a peer type implies. Only what differs from the
/// global and schema defaults is set.
pub fn for_peer_type(peer_type: PeerType) -> PeerAttributes {
    let mut attrs = PeerAttributes::default();
    match peer_type {
        PeerType::Customer => {
            enable(&mut attrs.redistribute, &FULL_TABLE_EXPORT);
        }
        PeerType::Peer | PeerType::RouteServer | PeerType::Transit => {
            enable(&mut attrs.redistribute, &EBGP_EXPORT);
        }
        PeerType::RouteCollector => {
            attrs.passive = Some(true);
            enable(&mut attrs.redistribute, &FULL_TABLE_EXPORT);
        }
        PeerType::Internal => {
            enable(&mut attrs.redistribute, &INTERNAL_EXPORT);
            enable(
                &mut attrs.accept,
                &[
                    AcceptOption::BgpCustomerBlackhole,
                    AcceptOption::BgpOwnBlackhole,
                    AcceptOption::BgpOwnDefault,
                    AcceptOption::BgpTransitDefault,
                ],
            );
            internal_constraints(&mut attrs);
        }
        PeerType::RrClient | PeerType::RrServer | PeerType::RrServerRrServer => {
            attrs.passive = Some(false);
            enable(&mut attrs.redistribute, &INTERNAL_EXPORT);
            enable(
                &mut attrs.accept,
                &[
                    AcceptOption::BgpCustomerBlackhole,
                    AcceptOption::BgpOwnBlackhole,
                    AcceptOption::BgpOwnDefault,
                    AcceptOption::BgpTransitDefault,
                ],
            );
            internal_constraints(&mut attrs);
        }
    }
    attrs
}

/// Local preference assigned to routes learned from a peer type. Internal
/// types keep whatever the originating router assigned.
pub fn local_pref(peer_type: PeerType) -> Option<u32> {
    match peer_type {
        PeerType::Customer => Some(750),
        PeerType::Peer => Some(470),
        PeerType::RouteServer => Some(450),
        PeerType::Transit => Some(150),
        PeerType::RouteCollector => Some(0),
        PeerType::Internal
        | PeerType::RrClient
        | PeerType::RrServer
        | PeerType::RrServerRrServer => None,
    }
}
