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

//! Cross attribute checks over the resolved configuration.
//!
//! Each peer stops at its first failure and the next peer is checked, so one
//! run reports at most one problem per peer and every broken peer once.

use tracing::{debug, warn};

use crate::constraints::{Bound, ConstraintKey};
use crate::error::ValidationException;
use crate::matrix::{self, Rule};
use crate::peer_list::{ListKind, RuntimeLists};
use crate::resolver::{Attribute, AttributeValue, Resolver};
use crate::schema::{Igp, IgpConfig, PeerConfig, RedistributeOption, RouterConfig};

/// Validates every peer and router scoped rule of a router.
pub fn validate(router: &RouterConfig, lists: &RuntimeLists) -> Vec<ValidationException> {
    let router_id = router.router_id.to_string();
    let mut failures = vec![];

    if let Some(message) = igp_loop(router) {
        failures.push(ValidationException::router(&router_id, message));
    }

    if let Some(bgp) = &router.bgp {
        let resolver = Resolver::new(&bgp.attributes, lists);
        for peer in bgp.peers.values() {
            if let Err(message) = check_peer(&resolver, bgp.asn, peer) {
                debug!(peer = %peer.name, %message, "peer failed validation");
                failures.push(ValidationException::peer(&router_id, &peer.name, message));
            }
        }

        let names: Vec<&str> = bgp.peers.keys().map(String::as_str).collect();
        for kind in [ListKind::GracefulShutdown, ListKind::Quarantine] {
            for entry in lists.get(kind).unmatched(&names) {
                warn!("Entry '{}' in the {} list matches no peer", entry, kind.as_str());
            }
        }
    }
    failures
}

fn check_peer(resolver: &Resolver, local_asn: u32, peer: &PeerConfig) -> Result<(), String> {
    check_asn(local_asn, peer)?;

    for attribute in Attribute::all() {
        let rule = matrix::rule(peer.peer_type, attribute);
        if rule == Rule::Optional {
            continue;
        }
        let set = resolver.resolve(attribute, peer).is_set();
        match rule {
            Rule::Required if !set => {
                return Err(matrix::required_message(attribute, &peer.name, peer.peer_type))
            }
            Rule::Forbidden if set => {
                return Err(matrix::forbidden_message(attribute, &peer.name, peer.peer_type))
            }
            _ => {}
        }
    }

    check_constraints(resolver, peer)
}

fn check_asn(local_asn: u32, peer: &PeerConfig) -> Result<(), String> {
    if peer.peer_type.is_internal() && peer.asn != local_asn {
        return Err(format!(
            "Peer '{}' with type '{}' must use our ASN {} but has {}",
            peer.name, peer.peer_type, local_asn, peer.asn
        ));
    }
    if !peer.peer_type.is_internal() && peer.asn == local_asn {
        return Err(format!(
            "Peer '{}' with type '{}' cannot use our own ASN {}",
            peer.name, peer.peer_type, local_asn
        ));
    }
    Ok(())
}

fn bound(resolver: &Resolver, key: ConstraintKey, peer: &PeerConfig) -> Option<u8> {
    match resolver.resolve(Attribute::Constraint(key), peer).value {
        AttributeValue::Bound(b) => b,
        _ => None,
    }
}

fn check_constraints(resolver: &Resolver, peer: &PeerConfig) -> Result<(), String> {
    let keys = ConstraintKey::all();
    for key in &keys {
        if let Some(value) = bound(resolver, *key, peer) {
            if value > key.limit() {
                return Err(format!(
                    "Constraint 'constraints[{}]' for peer '{}' must be between 0 and {}",
                    key,
                    peer.name,
                    key.limit()
                ));
            }
        }
    }

    for min_key in keys.iter().filter(|k| k.bound == Bound::Min) {
        let max_key = min_key.other_bound();
        if let (Some(min), Some(max)) = (
            bound(resolver, *min_key, peer),
            bound(resolver, max_key, peer),
        ) {
            if min > max {
                return Err(format!(
                    "Having 'constraints[{}]' greater than 'constraints[{}]' for peer '{}' with type '{}' makes no sense",
                    min_key, max_key, peer.name, peer.peer_type
                ));
            }
        }
    }

    for attribute in Attribute::all() {
        if let Attribute::Ceiling(ceiling) = attribute {
            if let AttributeValue::Number(Some(n)) = resolver.resolve(attribute, peer).value {
                if n < 0 {
                    return Err(format!(
                        "Constraint 'constraints[{}]' for peer '{}' must be a non-negative integer",
                        ceiling.key(),
                        peer.name
                    ));
                }
            }
        }
    }
    Ok(())
}

/// RIP and OSPF redistributing into each other feed routes back and forth.
fn igp_loop(router: &RouterConfig) -> Option<String> {
    let (rip, ospf) = (router.rip.as_ref()?, router.ospf.as_ref()?);
    let into = |igp: &IgpConfig, source: RedistributeOption| {
        igp.redistribute.get(&source).copied().unwrap_or(false)
    };
    if into(rip, RedistributeOption::Ospf) && into(ospf, RedistributeOption::Rip) {
        return Some(format!(
            "Redistributing '{}' into '{}' and '{}' into '{}' creates a routing loop",
            Igp::Ospf.table(),
            Igp::Rip.table(),
            Igp::Rip.table(),
            Igp::Ospf.table()
        ));
    }
    None
}
