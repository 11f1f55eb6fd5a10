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

//! Length constraints on prefixes, blackholes and AS paths.
//!
//! A constraint is a (minlen, maxlen) pair for a dimension, per address
//! family where the dimension is family scoped. Each bound is resolved on its
//! own through the same levels as every other peer attribute, so a peer may
//! override `import_maxlen4` and still inherit the rest.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AuthoringError;
use crate::resolver::{Layers, Level};
use crate::schema::{AddressFamily, PeerType};
use crate::defaults;

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PrefixImport,
    PrefixExport,
    BlackholeImport,
    BlackholeExport,
    AsPathImport,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::PrefixImport,
        Dimension::PrefixExport,
        Dimension::BlackholeImport,
        Dimension::BlackholeExport,
        Dimension::AsPathImport,
    ];

    fn prefix(&self) -> &'static str {
        match self {
            Dimension::PrefixImport => "import",
            Dimension::PrefixExport => "export",
            Dimension::BlackholeImport => "blackhole_import",
            Dimension::BlackholeExport => "blackhole_export",
            Dimension::AsPathImport => "aspath_import",
        }
    }

    /// AS path lengths do not depend on the address family.
    pub fn is_family_scoped(&self) -> bool {
        !matches!(self, Dimension::AsPathImport)
    }

    pub fn families(&self) -> Vec<Option<AddressFamily>> {
        if self.is_family_scoped() {
            AddressFamily::ALL.iter().copied().map(Some).collect()
        } else {
            vec![None]
        }
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub enum Bound {
    Min,
    Max,
}

/// Names one bound of one constraint, e.g. `blackhole_import_minlen6`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct ConstraintKey {
    pub dimension: Dimension,
    pub bound: Bound,
    pub family: Option<AddressFamily>,
}

impl ConstraintKey {
    pub fn new(dimension: Dimension, bound: Bound, family: Option<AddressFamily>) -> Self {
        ConstraintKey {
            dimension,
            bound,
            family: if dimension.is_family_scoped() {
                family
            } else {
                None
            },
        }
    }

    pub fn all() -> Vec<ConstraintKey> {
        let mut keys = vec![];
        for dimension in Dimension::ALL {
            for family in dimension.families() {
                for bound in [Bound::Min, Bound::Max] {
                    keys.push(ConstraintKey::new(dimension, bound, family));
                }
            }
        }
        keys
    }

    pub fn other_bound(&self) -> ConstraintKey {
        let bound = match self.bound {
            Bound::Min => Bound::Max,
            Bound::Max => Bound::Min,
        };
        ConstraintKey { bound, ..*self }
    }

    /// Upper limit for a bound of this key.
    pub fn limit(&self) -> u8 {
        match self.family {
            Some(family) => family.max_prefix_len(),
            None => u8::MAX,
        }
    }
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = match self.bound {
            Bound::Min => "minlen",
            Bound::Max => "maxlen",
        };
        let family = self.family.map(|f| f.suffix()).unwrap_or("");
        write!(f, "{}_{}{}", self.dimension.prefix(), bound, family)
    }
}

impl FromStr for ConstraintKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintKey::all()
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| format!("unknown constraint '{}'", s))
    }
}

/// Built in bound when no level sets one. `None` is unbounded.
pub fn schema_default(key: &ConstraintKey) -> Option<u8> {
    use AddressFamily::*;
    use Bound::*;
    use Dimension::*;
    match (key.dimension, key.family, key.bound) {
        (PrefixImport | PrefixExport, Some(Ipv4), Min) => Some(8),
        (PrefixImport | PrefixExport, Some(Ipv4), Max) => Some(24),
        (PrefixImport | PrefixExport, Some(Ipv6), Min) => Some(16),
        (PrefixImport | PrefixExport, Some(Ipv6), Max) => Some(48),
        (BlackholeImport | BlackholeExport, Some(Ipv4), Min) => Some(24),
        (BlackholeImport | BlackholeExport, Some(Ipv4), Max) => Some(32),
        (BlackholeImport | BlackholeExport, Some(Ipv6), Min) => Some(64),
        (BlackholeImport | BlackholeExport, Some(Ipv6), Max) => Some(128),
        (AsPathImport, _, Min) => Some(1),
        (AsPathImport, _, Max) => Some(100),
        (_, None, _) => None,
    }
}

/// A resolved (minlen, maxlen) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub dimension: Dimension,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<AddressFamily>,
    pub minlen: Option<u8>,
    pub maxlen: Option<u8>,
}

impl Constraint {
    pub fn is_inverted(&self) -> bool {
        matches!((self.minlen, self.maxlen), (Some(min), Some(max)) if min > max)
    }
}

/// Resolves one bound and reports the level that supplied it.
pub fn resolve_bound(layers: &Layers, key: &ConstraintKey) -> (Option<u8>, Level) {
    layers.pick(|a| a.constraints.get(key).copied(), schema_default(key))
}

/// Resolves the constraint for a dimension and family. The family is ignored
/// for dimensions that are not family scoped.
pub fn resolve(layers: &Layers, dimension: Dimension, family: Option<AddressFamily>) -> Constraint {
    let min_key = ConstraintKey::new(dimension, Bound::Min, family);
    let max_key = ConstraintKey::new(dimension, Bound::Max, family);
    Constraint {
        dimension,
        family: min_key.family,
        minlen: resolve_bound(layers, &min_key).0,
        maxlen: resolve_bound(layers, &max_key).0,
    }
}

/// Every constraint of a peer, in a fixed order.
pub fn resolve_all(layers: &Layers) -> Vec<Constraint> {
    let mut out = vec![];
    for dimension in Dimension::ALL {
        for family in dimension.families() {
            out.push(resolve(layers, dimension, family));
        }
    }
    out
}

/// Checks that no peer type default produces an inverted pair when combined
/// with the schema defaults.
pub fn check_authoring() -> Result<(), AuthoringError> {
    for peer_type in PeerType::ALL {
        let type_defaults = defaults::for_peer_type(peer_type);
        for key in ConstraintKey::all()
            .into_iter()
            .filter(|k| k.bound == Bound::Min)
        {
            let max_key = key.other_bound();
            let min = type_defaults
                .constraints
                .get(&key)
                .copied()
                .unwrap_or_else(|| schema_default(&key));
            let max = type_defaults
                .constraints
                .get(&max_key)
                .copied()
                .unwrap_or_else(|| schema_default(&max_key));
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(AuthoringError::InvertedConstraint {
                        peer_type: peer_type.as_str(),
                        minimum: key.to_string(),
                        maximum: max_key.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PeerAttributes, PeerConfig};

    #[test]
    fn test_key_names_round_trip() {
        for key in ConstraintKey::all() {
            assert_eq!(key.to_string().parse::<ConstraintKey>().unwrap(), key);
        }
        assert_eq!(ConstraintKey::all().len(), 18);
        assert!("aspath_import_maxlen4".parse::<ConstraintKey>().is_err());
    }

    #[test]
    fn test_peer_type_tables_are_consistent() {
        assert_eq!(check_authoring(), Ok(()));
    }

    #[test]
    fn test_per_family_merge() {
        let mut peer = PeerConfig::new("p1", 65001, PeerType::Customer);
        let key4 = ConstraintKey::new(
            Dimension::PrefixImport,
            Bound::Max,
            Some(AddressFamily::Ipv4),
        );
        peer.attributes.constraints.insert(key4, Some(22));
        let global = PeerAttributes::default();
        let layers = Layers::new(&peer, &global);

        let v4 = resolve(&layers, Dimension::PrefixImport, Some(AddressFamily::Ipv4));
        assert_eq!((v4.minlen, v4.maxlen), (Some(8), Some(22)));
        let v6 = resolve(&layers, Dimension::PrefixImport, Some(AddressFamily::Ipv6));
        assert_eq!((v6.minlen, v6.maxlen), (Some(16), Some(48)));
        assert_eq!(resolve_bound(&layers, &key4).1, Level::Peer);
    }

    #[test]
    fn test_internal_types_widen_prefix_lengths() {
        let peer = PeerConfig::new("r2", 65000, PeerType::RrClient);
        let global = PeerAttributes::default();
        let layers = Layers::new(&peer, &global);
        let v6 = resolve(&layers, Dimension::PrefixExport, Some(AddressFamily::Ipv6));
        assert_eq!((v6.minlen, v6.maxlen), (Some(0), Some(128)));
        let aspath = resolve(&layers, Dimension::AsPathImport, Some(AddressFamily::Ipv6));
        assert_eq!(aspath.family, None);
        assert_eq!((aspath.minlen, aspath.maxlen), (Some(0), Some(100)));
    }

    #[test]
    fn test_explicit_unbounded() {
        let mut peer = PeerConfig::new("p1", 65001, PeerType::Peer);
        let key = ConstraintKey::new(
            Dimension::PrefixImport,
            Bound::Max,
            Some(AddressFamily::Ipv6),
        );
        peer.attributes.constraints.insert(key, None);
        let global = PeerAttributes::default();
        let layers = Layers::new(&peer, &global);
        let v6 = resolve(&layers, Dimension::PrefixImport, Some(AddressFamily::Ipv6));
        assert_eq!(v6.maxlen, None);
    }
}
