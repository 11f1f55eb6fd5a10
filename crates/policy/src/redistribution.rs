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

//! Derives what each table and peer exports and what it accepts.
//!
//! Flags only express intent. Here they are combined with the peer type rules,
//! the runtime lists and the kernel export gate into the effective policy.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::defaults;
use crate::matrix;
use crate::resolver::{Attribute, ResolvedPeer};
use crate::schema::{
    AcceptOption, IgpConfig, PeerType, RedistributeOption, RouterConfig, StaticRoute, Table,
};

/// Kernel export state of every source table after applying the master gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelExport {
    pub gate: bool,
    pub sources: BTreeMap<Table, bool>,
}

impl KernelExport {
    pub fn derive(router: &RouterConfig) -> Self {
        let flag = |table: Table| {
            router
                .tables
                .get(&table)
                .and_then(|t| t.export_kernel)
                .unwrap_or(true)
        };
        let gate = flag(Table::Master);
        let sources = Table::KERNEL_SOURCES
            .iter()
            .map(|t| (*t, gate && flag(*t)))
            .collect();
        KernelExport { gate, sources }
    }

    pub fn exports(&self, table: Table) -> bool {
        self.sources.get(&table).copied().unwrap_or(false)
    }

    /// Tables whose routes are already in the kernel. Redistributing kernel
    /// routes must skip these or they would be fed back to their origin.
    pub fn exported_origins(&self) -> Vec<Table> {
        self.sources
            .iter()
            .filter(|(_, on)| **on)
            .map(|(t, _)| *t)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedistributionRule {
    pub source: RedistributeOption,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_origins: Vec<Table>,
}

/// What a table or peer exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedistributionPolicy {
    pub rules: Vec<RedistributionRule>,
    pub default_route: bool,
    pub static_routes: Vec<StaticRoute>,
}

impl RedistributionPolicy {
    pub fn exports(&self, source: RedistributeOption) -> bool {
        self.rules.iter().any(|r| r.source == source)
    }
}

/// What a table or peer imports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcceptancePolicy {
    pub reject_all: bool,
    pub accept: BTreeMap<AcceptOption, bool>,
    pub default_route: bool,
    pub blackhole: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_pref: Option<u32>,
}

struct Intent<'a> {
    flags: &'a BTreeMap<RedistributeOption, bool>,
    default_allowed: bool,
}

impl Intent<'_> {
    fn on(&self, option: RedistributeOption) -> bool {
        self.flags.get(&option).copied().unwrap_or(false)
    }

    fn default_route(&self) -> bool {
        self.default_allowed && self.on(RedistributeOption::Default)
    }
}

fn rules<'a>(
    options: impl Iterator<Item = &'a RedistributeOption>,
    kernel: &KernelExport,
) -> Vec<RedistributionRule> {
    options
        .filter(|o| **o != RedistributeOption::Default)
        .map(|o| RedistributionRule {
            source: *o,
            exclude_origins: if *o == RedistributeOption::Kernel {
                kernel.exported_origins()
            } else {
                vec![]
            },
        })
        .collect()
}

/// Static routes leaving a table or peer. Default routes additionally need
/// default route export, blackhole routes their own flag.
fn static_routes(routes: &[StaticRoute], intent: &Intent) -> Vec<StaticRoute> {
    routes
        .iter()
        .filter(|route| {
            if route.is_blackhole() {
                intent.on(RedistributeOption::StaticBlackhole)
            } else if route.is_default() {
                intent.on(RedistributeOption::Static) && intent.default_route()
            } else {
                intent.on(RedistributeOption::Static)
            }
        })
        .cloned()
        .collect()
}

/// Export policy of a BGP peer.
pub fn peer_redistribution(
    peer: &ResolvedPeer,
    router: &RouterConfig,
    kernel: &KernelExport,
) -> RedistributionPolicy {
    if peer.quarantine {
        return RedistributionPolicy::default();
    }
    let allowed = |o: RedistributeOption| {
        !matrix::is_forbidden(peer.peer_type, Attribute::Redistribute(o))
    };
    let intent = Intent {
        flags: &peer.redistribute,
        default_allowed: allowed(RedistributeOption::Default),
    };
    let enabled = RedistributeOption::PEER
        .iter()
        .filter(|o| intent.on(**o) && allowed(**o));
    RedistributionPolicy {
        rules: rules(enabled, kernel),
        default_route: intent.default_route(),
        static_routes: static_routes(&router.static_routes, &intent),
    }
}

/// Import policy of a BGP peer.
pub fn peer_acceptance(peer: &ResolvedPeer) -> AcceptancePolicy {
    let reject_all = peer.quarantine || peer.peer_type == PeerType::RouteCollector;
    let accept: BTreeMap<AcceptOption, bool> = AcceptOption::ALL
        .iter()
        .map(|o| {
            let on = !reject_all
                && peer.accept(*o)
                && !matrix::is_forbidden(peer.peer_type, Attribute::Accept(*o));
            (*o, on)
        })
        .collect();
    let on = |o: AcceptOption| accept.get(&o).copied().unwrap_or(false);
    AcceptancePolicy {
        reject_all,
        default_route: on(AcceptOption::Default)
            || on(AcceptOption::BgpOwnDefault)
            || on(AcceptOption::BgpTransitDefault),
        blackhole: on(AcceptOption::BgpCustomerBlackhole) || on(AcceptOption::BgpOwnBlackhole),
        local_pref: if peer.graceful_shutdown {
            Some(0)
        } else {
            defaults::local_pref(peer.peer_type)
        },
        accept,
    }
}

/// Export policy of an IGP table. IGP flags have no inherited level and
/// default to off.
pub fn igp_redistribution(
    igp: &IgpConfig,
    router: &RouterConfig,
    kernel: &KernelExport,
) -> RedistributionPolicy {
    let intent = Intent {
        flags: &igp.redistribute,
        default_allowed: true,
    };
    let options = RedistributeOption::igp(igp.protocol);
    let enabled = options.iter().filter(|o| intent.on(**o));
    RedistributionPolicy {
        rules: rules(enabled, kernel),
        default_route: intent.default_route(),
        static_routes: static_routes(&router.static_routes, &intent),
    }
}

pub fn igp_acceptance(igp: &IgpConfig) -> AcceptancePolicy {
    let accept: BTreeMap<AcceptOption, bool> = AcceptOption::IGP
        .iter()
        .map(|o| (*o, igp.accept.get(o).copied().unwrap_or(false)))
        .collect();
    AcceptancePolicy {
        reject_all: false,
        default_route: accept.get(&AcceptOption::Default).copied().unwrap_or(false),
        blackhole: false,
        local_pref: None,
        accept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_list::RuntimeLists;
    use crate::resolver::Resolver;
    use crate::schema::{Igp, PeerAttributes, PeerConfig, TableAttributes};
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn router() -> RouterConfig {
        let mut router = RouterConfig::new(Ipv4Addr::new(0, 0, 0, 1));
        router.static_routes = [
            "0.0.0.0/0 via 100.101.0.2",
            "::/0 via fc00:101::2",
            "10.0.0.0/8 via 100.101.0.3",
            "192.0.2.0/24 blackhole",
        ]
        .iter()
        .map(|r| r.parse().unwrap())
        .collect();
        router
    }

    fn resolved(peer: PeerConfig, lists: &RuntimeLists) -> ResolvedPeer {
        let global = PeerAttributes::default();
        Resolver::new(&global, lists).resolve_peer(&peer)
    }

    #[test]
    fn test_customer_gets_default_static_routes() {
        let router = router();
        let mut peer = PeerConfig::new("c1", 65001, PeerType::Customer);
        peer.attributes.redistribute.insert(RedistributeOption::Default, true);
        peer.attributes.redistribute.insert(RedistributeOption::Static, true);
        let peer = resolved(peer, &RuntimeLists::default());
        let policy = peer_redistribution(&peer, &router, &KernelExport::derive(&router));
        assert!(policy.default_route);
        let routes: Vec<String> = policy.static_routes.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            routes,
            vec!["0.0.0.0/0 via 100.101.0.2", "::/0 via fc00:101::2", "10.0.0.0/8 via 100.101.0.3"]
        );
    }

    #[test]
    fn test_static_without_default() {
        let router = router();
        let mut peer = PeerConfig::new("c1", 65001, PeerType::Customer);
        peer.attributes.redistribute.insert(RedistributeOption::Static, true);
        let peer = resolved(peer, &RuntimeLists::default());
        let policy = peer_redistribution(&peer, &router, &KernelExport::derive(&router));
        assert_eq!(policy.static_routes.len(), 1);
        assert!(!policy.default_route);
    }

    #[test]
    fn test_forbidden_flags_are_not_effective() {
        let router = router();
        let mut peer = PeerConfig::new("t1", 65002, PeerType::Transit);
        peer.attributes.redistribute.insert(RedistributeOption::Default, true);
        peer.attributes.redistribute.insert(RedistributeOption::Static, true);
        let peer = resolved(peer, &RuntimeLists::default());
        let policy = peer_redistribution(&peer, &router, &KernelExport::derive(&router));
        assert!(!policy.default_route);
        assert_eq!(policy.static_routes.len(), 1);
        assert!(policy.exports(RedistributeOption::BgpCustomer));
        assert!(!policy.exports(RedistributeOption::BgpTransit));
    }

    #[test]
    fn test_quarantine_blocks_everything() {
        let router = router();
        let mut lists = RuntimeLists::default();
        lists.quarantine.add("c1");
        let peer = resolved(PeerConfig::new("c1", 65001, PeerType::Customer), &lists);
        let policy = peer_redistribution(&peer, &router, &KernelExport::derive(&router));
        assert_eq!(policy, RedistributionPolicy::default());
        let acceptance = peer_acceptance(&peer);
        assert!(acceptance.reject_all);
        assert!(acceptance.accept.values().all(|on| !on));
    }

    #[test]
    fn test_route_collector_imports_nothing() {
        let peer = resolved(
            PeerConfig::new("rc1", 65009, PeerType::RouteCollector),
            &RuntimeLists::default(),
        );
        let acceptance = peer_acceptance(&peer);
        assert!(acceptance.reject_all);
        assert_eq!(acceptance.local_pref, Some(0));
    }

    #[test]
    fn test_graceful_shutdown_drops_local_pref() {
        let mut lists = RuntimeLists::default();
        lists.graceful_shutdown.add("c1");
        let peer = resolved(PeerConfig::new("c1", 65001, PeerType::Customer), &lists);
        assert_eq!(peer_acceptance(&peer).local_pref, Some(0));
        let peer = resolved(
            PeerConfig::new("c1", 65001, PeerType::Customer),
            &RuntimeLists::default(),
        );
        assert_eq!(peer_acceptance(&peer).local_pref, Some(750));
    }

    #[test]
    fn test_kernel_gate() {
        let mut router = router();
        let kernel = KernelExport::derive(&router);
        assert!(kernel.gate);
        assert_eq!(kernel.exported_origins().len(), 4);

        router.tables.insert(
            Table::Rip,
            TableAttributes {
                export_kernel: Some(false),
            },
        );
        let kernel = KernelExport::derive(&router);
        assert!(!kernel.exports(Table::Rip));
        assert!(kernel.exports(Table::Ospf));

        router.tables.insert(
            Table::Master,
            TableAttributes {
                export_kernel: Some(false),
            },
        );
        let kernel = KernelExport::derive(&router);
        assert!(Table::KERNEL_SOURCES.iter().all(|t| !kernel.exports(*t)));
    }

    #[test]
    fn test_igp_kernel_redistribution_skips_exported_origins() {
        let mut router = router();
        router.tables.insert(
            Table::Static,
            TableAttributes {
                export_kernel: Some(false),
            },
        );
        let mut ospf = IgpConfig::new(Igp::Ospf);
        ospf.redistribute.insert(RedistributeOption::Kernel, true);
        ospf.redistribute.insert(RedistributeOption::Connected, true);
        let policy = igp_redistribution(&ospf, &router, &KernelExport::derive(&router));
        assert_eq!(policy.rules.len(), 2);
        let kernel_rule = policy
            .rules
            .iter()
            .find(|r| r.source == RedistributeOption::Kernel)
            .unwrap();
        assert_eq!(kernel_rule.exclude_origins, vec![Table::Bgp, Table::Ospf, Table::Rip]);
    }
}
