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

//! Peer type compatibility rules.
//!
//! Every attribute is either optional, required or forbidden for a peer type.
//! The rules are written as exhaustive matches over the peer type so adding a
//! new type does not compile until its rules are spelled out.

use serde::Serialize;

use crate::constraints::Dimension;
use crate::defaults;
use crate::error::AuthoringError;
use crate::resolver::Attribute;
use crate::schema::{AcceptOption, PeerType, RedistributeOption};

#[derive(Eq, PartialEq, Debug, Copy, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Optional,
    Required,
    Forbidden,
}

/// Rule for an attribute on a peer type.
pub fn rule(peer_type: PeerType, attribute: Attribute) -> Rule {
    match peer_type {
        PeerType::Customer => customer(attribute),
        PeerType::Peer | PeerType::RouteServer => lateral(attribute),
        PeerType::Transit => transit(attribute),
        PeerType::RouteCollector => collector(attribute),
        PeerType::Internal => internal(attribute),
        PeerType::RrClient | PeerType::RrServer | PeerType::RrServerRrServer => {
            route_reflection(attribute)
        }
    }
}

pub fn is_forbidden(peer_type: PeerType, attribute: Attribute) -> bool {
    rule(peer_type, attribute) == Rule::Forbidden
}

fn customer(attribute: Attribute) -> Rule {
    use AcceptOption as A;
    use RedistributeOption as R;
    match attribute {
        Attribute::Redistribute(R::KernelBlackhole | R::StaticBlackhole) => Rule::Forbidden,
        Attribute::Accept(
            A::Default | A::BgpOwnBlackhole | A::BgpOwnDefault | A::BgpTransitDefault,
        ) => Rule::Forbidden,
        Attribute::BlackholeCommunity => Rule::Forbidden,
        Attribute::Constraint(key) if key.dimension == Dimension::BlackholeExport => {
            Rule::Forbidden
        }
        _ => Rule::Optional,
    }
}

/// Peers and route servers: routes learned sideways.
fn lateral(attribute: Attribute) -> Rule {
    use RedistributeOption as R;
    match attribute {
        Attribute::Redistribute(R::Default | R::Bgp | R::BgpPeering | R::BgpTransit) => {
            Rule::Forbidden
        }
        Attribute::Accept(_) => Rule::Forbidden,
        Attribute::ReplaceAspath => Rule::Forbidden,
        Attribute::Constraint(key) if key.dimension == Dimension::BlackholeImport => {
            Rule::Forbidden
        }
        _ => Rule::Optional,
    }
}

fn transit(attribute: Attribute) -> Rule {
    use AcceptOption as A;
    use RedistributeOption as R;
    match attribute {
        Attribute::Redistribute(R::Default | R::Bgp | R::BgpPeering | R::BgpTransit) => {
            Rule::Forbidden
        }
        Attribute::Accept(
            A::BgpCustomerBlackhole | A::BgpOwnBlackhole | A::BgpOwnDefault | A::BgpTransitDefault,
        ) => Rule::Forbidden,
        Attribute::ReplaceAspath => Rule::Forbidden,
        Attribute::Constraint(key) if key.dimension == Dimension::BlackholeImport => {
            Rule::Forbidden
        }
        _ => Rule::Optional,
    }
}

fn collector(attribute: Attribute) -> Rule {
    use RedistributeOption as R;
    match attribute {
        Attribute::Redistribute(R::Default | R::KernelBlackhole | R::StaticBlackhole) => {
            Rule::Forbidden
        }
        Attribute::Accept(_) => Rule::Forbidden,
        Attribute::FilterPrefixes | Attribute::FilterAsns | Attribute::FilterAsSets => {
            Rule::Forbidden
        }
        Attribute::ReplaceAspath
        | Attribute::PrefixLimit(_)
        | Attribute::IncomingLargeCommunities
        | Attribute::BlackholeCommunity => Rule::Forbidden,
        Attribute::Constraint(key)
            if matches!(
                key.dimension,
                Dimension::BlackholeImport | Dimension::BlackholeExport
            ) =>
        {
            Rule::Forbidden
        }
        _ => Rule::Optional,
    }
}

fn internal(attribute: Attribute) -> Rule {
    match attribute {
        Attribute::FilterPrefixes | Attribute::FilterAsns | Attribute::FilterAsSets => {
            Rule::Forbidden
        }
        Attribute::ReplaceAspath | Attribute::BlackholeCommunity => Rule::Forbidden,
        _ => Rule::Optional,
    }
}

fn route_reflection(attribute: Attribute) -> Rule {
    match attribute {
        Attribute::RrClusterId => Rule::Required,
        _ => internal(attribute),
    }
}

/// Message for a forbidden attribute that is set on a peer.
pub fn forbidden_message(attribute: Attribute, peer: &str, peer_type: PeerType) -> String {
    if attribute.is_nested_flag() {
        format!(
            "Having '{}' as True for peer '{}' with type '{}' makes no sense",
            attribute, peer, peer_type
        )
    } else {
        format!(
            "Having '{}' set for peer '{}' with type '{}' makes no sense",
            attribute, peer, peer_type
        )
    }
}

/// Message for a required attribute that no level sets.
pub fn required_message(attribute: Attribute, peer: &str, peer_type: PeerType) -> String {
    format!(
        "Peer '{}' with type '{}' requires '{}' to be set",
        peer, peer_type, attribute
    )
}

/// Checks that no peer type default enables a flag its own rules forbid.
pub fn check_authoring() -> Result<(), AuthoringError> {
    for peer_type in PeerType::ALL {
        let type_defaults = defaults::for_peer_type(peer_type);
        let accepts = type_defaults
            .accept
            .iter()
            .filter(|(_, on)| **on)
            .map(|(o, _)| Attribute::Accept(*o));
        let redistributes = type_defaults
            .redistribute
            .iter()
            .filter(|(_, on)| **on)
            .map(|(o, _)| Attribute::Redistribute(*o));
        if let Some(attribute) = accepts
            .chain(redistributes)
            .find(|a| is_forbidden(peer_type, *a))
        {
            return Err(AuthoringError::ForbiddenDefault {
                peer_type: peer_type.as_str(),
                attribute: attribute.to_string(),
            });
        }
    }
    Ok(())
}
