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

use std::net::Ipv4Addr;

use integration_tests::{fragments, init, Fixture, LOCAL_ASN};
use pretty_assertions::assert_eq;
use routeplan_policy::constraints::{self, Bound, ConstraintKey, Dimension};
use routeplan_policy::matrix;
use routeplan_policy::resolver::Attribute;
use routeplan_policy::schema::{
    AcceptOption, AddressFamily, PeerAttributes, PeerType, RedistributeOption,
};
use routeplan_policy::{compile_str, CompileError, ListKind, RuntimeLists, StateFile};

fn peer_asn(peer_type: PeerType) -> u32 {
    if peer_type.is_internal() {
        LOCAL_ASN
    } else {
        65100
    }
}

/// Fragments every peer of a type needs to validate.
fn baseline(peer_type: PeerType) -> Vec<PeerAttributes> {
    if peer_type.is_route_reflection() {
        vec![fragments::rr_cluster_id(Ipv4Addr::new(0, 0, 0, 1))]
    } else {
        vec![]
    }
}

/// A fragment that sets an attribute, for the attributes the peer type rules
/// can forbid.
fn setting(attribute: Attribute) -> PeerAttributes {
    let mut attrs = PeerAttributes::default();
    match attribute {
        Attribute::Accept(option) => {
            attrs.accept.insert(option, true);
        }
        Attribute::Redistribute(option) => {
            attrs.redistribute.insert(option, true);
        }
        Attribute::FilterPrefixes => {
            attrs.filter.prefixes = Some(vec!["100.64.0.0/16".parse().unwrap()])
        }
        Attribute::FilterAsns => attrs.filter.asns = Some(vec![65101]),
        Attribute::FilterAsSets => attrs.filter.as_sets = Some(vec!["AS-EXAMPLE".to_string()]),
        Attribute::ReplaceAspath => attrs.replace_aspath = Some(true),
        Attribute::PrefixLimit(AddressFamily::Ipv4) => attrs.prefix_limit4 = Some(100),
        Attribute::PrefixLimit(AddressFamily::Ipv6) => attrs.prefix_limit6 = Some(100),
        Attribute::BlackholeCommunity => {
            attrs.blackhole_community = Some(vec!["65100:666:0".parse().unwrap()])
        }
        Attribute::IncomingLargeCommunities => {
            attrs.incoming_large_communities = Some(vec!["65000:3:2".parse().unwrap()])
        }
        Attribute::Constraint(key) => {
            attrs.constraints.insert(key, constraints::schema_default(&key));
        }
        other => panic!("no fixture setting for '{}'", other),
    }
    attrs
}

#[test]
fn test_routecollector_default_export() {
    init();
    let fixture = Fixture::new().peer(
        "rc1",
        65100,
        PeerType::RouteCollector,
        &[fragments::redistribute(&[(RedistributeOption::Default, true)])],
    );
    assert_eq!(
        fixture.failures(&RuntimeLists::default()),
        vec!["Having 'redistribute[default]' as True for peer 'rc1' with type 'routecollector' makes no sense"]
    );
}

#[test]
fn test_routeserver_default_accept() {
    init();
    let fixture = Fixture::new().peer(
        "rs1",
        65100,
        PeerType::RouteServer,
        &[fragments::accept(&[(AcceptOption::Default, true)])],
    );
    assert_eq!(
        fixture.failures(&RuntimeLists::default()),
        vec!["Having 'accept[default]' as True for peer 'rs1' with type 'routeserver' makes no sense"]
    );
}

#[test]
fn test_peer_customer_blackhole_accept() {
    init();
    let fixture = Fixture::new().peer(
        "e1",
        65100,
        PeerType::Peer,
        &[fragments::accept(&[(AcceptOption::BgpCustomerBlackhole, true)])],
    );
    assert_eq!(
        fixture.failures(&RuntimeLists::default()),
        vec!["Having 'accept[bgp_customer_blackhole]' as True for peer 'e1' with type 'peer' makes no sense"]
    );
}

#[test]
fn test_customer_default_static_routes() {
    init();
    let document = Fixture::new()
        .static_route("0.0.0.0/0 via 100.101.0.2")
        .static_route("::/0 via fc00:101::2")
        .peer(
            "c1",
            65100,
            PeerType::Customer,
            &[fragments::redistribute(&[
                (RedistributeOption::Default, true),
                (RedistributeOption::Static, true),
            ])],
        )
        .compile(&RuntimeLists::default())
        .unwrap();

    let c1 = document.peer("c1").unwrap();
    assert!(c1.redistribution.default_route);
    let routes: Vec<String> = c1
        .redistribution
        .static_routes
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(routes, vec!["0.0.0.0/0 via 100.101.0.2", "::/0 via fc00:101::2"]);
}

#[test]
fn test_route_reflection_requires_cluster_id() {
    init();
    let fixture = Fixture::new()
        .peer("r2", LOCAL_ASN, PeerType::RrClient, &[])
        .peer("r3", LOCAL_ASN, PeerType::RrServer, &[]);
    assert_eq!(
        fixture.failures(&RuntimeLists::default()),
        vec![
            "Peer 'r2' with type 'rrclient' requires 'rr_cluster_id' to be set",
            "Peer 'r3' with type 'rrserver' requires 'rr_cluster_id' to be set",
        ]
    );

    let fixture = fixture.global(&[fragments::rr_cluster_id(Ipv4Addr::new(0, 0, 0, 1))]);
    let document = fixture.compile(&RuntimeLists::default()).unwrap();
    assert_eq!(
        document.peer("r2").unwrap().rr_cluster_id,
        Some(Ipv4Addr::new(0, 0, 0, 1))
    );
}

#[test]
fn test_every_type_validates_with_defaults() {
    init();
    for peer_type in PeerType::ALL {
        let fixture = Fixture::new().peer("n1", peer_asn(peer_type), peer_type, &baseline(peer_type));
        assert!(
            fixture.compile(&RuntimeLists::default()).is_ok(),
            "{} does not validate with its own defaults",
            peer_type
        );
    }
}

#[test]
fn test_every_forbidden_attribute_fails_once() {
    init();
    for peer_type in PeerType::ALL {
        for attribute in Attribute::all() {
            if !matrix::is_forbidden(peer_type, attribute) {
                continue;
            }
            let mut layers = baseline(peer_type);
            layers.push(setting(attribute));
            let fixture = Fixture::new().peer("n1", peer_asn(peer_type), peer_type, &layers);
            assert_eq!(
                fixture.failures(&RuntimeLists::default()),
                vec![matrix::forbidden_message(attribute, "n1", peer_type)],
                "{} on {}",
                attribute,
                peer_type
            );
        }
    }
}

#[test]
fn test_override_precedence() {
    init();
    let fixture = Fixture::new()
        .global(&[fragments::passive(true)])
        .peer("c1", 65100, PeerType::Customer, &[])
        .peer("r2", LOCAL_ASN, PeerType::Internal, &[])
        .peer("r3", LOCAL_ASN, PeerType::RrClient, &[
            fragments::rr_cluster_id(Ipv4Addr::new(0, 0, 0, 1)),
        ])
        .peer("r4", LOCAL_ASN, PeerType::RrServer, &[
            fragments::rr_cluster_id(Ipv4Addr::new(0, 0, 0, 1)),
            fragments::passive(false),
            fragments::passive(true),
        ]);
    let document = fixture.compile(&RuntimeLists::default()).unwrap();

    // Global applies where no peer type default exists.
    assert!(document.peer("c1").unwrap().passive);
    assert!(document.peer("r2").unwrap().passive);
    // The peer type default is more specific than the global value.
    assert!(!document.peer("r3").unwrap().passive);
    // Later fragments override earlier ones, and the peer beats everything.
    assert!(document.peer("r4").unwrap().passive);
}

#[test]
fn test_inverted_constraints_are_rejected() {
    init();
    let mut attrs = PeerAttributes::default();
    attrs.constraints.insert(
        ConstraintKey::new(Dimension::AsPathImport, Bound::Min, None),
        Some(50),
    );
    attrs.constraints.insert(
        ConstraintKey::new(Dimension::AsPathImport, Bound::Max, None),
        Some(10),
    );
    let fixture = Fixture::new().peer("t1", 65100, PeerType::Transit, &[attrs]);
    assert_eq!(
        fixture.failures(&RuntimeLists::default()),
        vec!["Having 'constraints[aspath_import_minlen]' greater than 'constraints[aspath_import_maxlen]' for peer 't1' with type 'transit' makes no sense"]
    );
}

#[test]
fn test_negative_ceiling() {
    init();
    let text = r#"
router_id: 0.0.0.1
bgp:
  asn: 65000
  constraints:
    large_community_maxlen: -1
  peers:
    t1:
      asn: 65100
      peer_type: transit
"#;
    match compile_str(text, &RuntimeLists::default()) {
        Err(CompileError::Validation(errors)) => assert_eq!(
            errors.messages(),
            vec!["Constraint 'constraints[large_community_maxlen]' for peer 't1' must be a non-negative integer"]
        ),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_global_blackhole_bound_with_transit_peer() {
    init();
    let text = r#"
router_id: 0.0.0.1
bgp:
  asn: 65000
  constraints:
    blackhole_import_maxlen4: 31
  peers:
    c1:
      asn: 65001
      peer_type: customer
    t1:
      asn: 65100
      peer_type: transit
"#;
    let document = compile_str(text, &RuntimeLists::default()).unwrap();
    let blackhole4 = document
        .peer("c1")
        .unwrap()
        .constraints
        .iter()
        .find(|c| {
            c.dimension == Dimension::BlackholeImport && c.family == Some(AddressFamily::Ipv4)
        })
        .cloned()
        .unwrap();
    assert_eq!(blackhole4.maxlen, Some(31));
}

#[test]
fn test_output_is_deterministic() {
    init();
    let build = |order: &[&str]| {
        let mut fixture = Fixture::new()
            .static_route("10.0.0.0/8 via 100.101.0.3")
            .global(&[fragments::rr_cluster_id(Ipv4Addr::new(0, 0, 0, 1))]);
        for name in order {
            let peer_type = match *name {
                "c1" => PeerType::Customer,
                "t1" => PeerType::Transit,
                _ => PeerType::RrClient,
            };
            fixture = fixture.peer(name, peer_asn(peer_type), peer_type, &[]);
        }
        fixture
            .compile(&RuntimeLists::default())
            .unwrap()
            .to_json()
            .unwrap()
    };
    let first = build(&["c1", "t1", "r2"]);
    assert_eq!(first, build(&["c1", "t1", "r2"]));
    assert_eq!(first, build(&["r2", "t1", "c1"]));
}

#[test]
fn test_yaml_end_to_end() {
    init();
    let text = r#"
router_id: 0.0.0.1
static:
  - 0.0.0.0/0 via 100.101.0.2
  - 192.0.2.0/24 blackhole
tables:
  rip:
    export_kernel: false
ospf:
  redistribute:
    kernel: true
  interfaces:
    eth0: {}
bgp:
  asn: 65000
  peers:
    c1:
      asn: 65001
      peer_type: customer
      description: Example customer
      neighbor4: 192.0.2.1
      location: 10
      accept:
        bgp_customer_blackhole: true
      filter:
        asns: [65001]
    t1:
      asn: 65002
      peer_type: transit
      accept:
        default: true
"#;
    let document = compile_str(text, &RuntimeLists::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();

    assert_eq!(json["router_id"], "0.0.0.1");
    assert_eq!(json["asn"], 65000);
    assert_eq!(
        json["protocols"],
        serde_json::json!(["bgp", "kernel", "ospf", "static"])
    );
    assert_eq!(json["kernel_export"]["sources"]["rip"], false);
    assert_eq!(json["kernel_export"]["sources"]["ospf"], true);

    let ospf = &json["igps"][0];
    assert_eq!(ospf["table"], "ospf");
    assert_eq!(ospf["interfaces"], serde_json::json!(["eth0"]));
    assert_eq!(
        ospf["redistribution"]["rules"][0]["exclude_origins"],
        serde_json::json!(["bgp", "ospf", "static"])
    );

    let c1 = document.peer("c1").unwrap();
    assert_eq!(c1.acceptance.local_pref, Some(750));
    assert!(c1.acceptance.blackhole);
    assert_eq!(c1.filter.asns, vec![65001]);
    assert!(c1
        .communities
        .rules
        .iter()
        .any(|r| r.to_string() == "65000:7:10"));

    let t1 = document.peer("t1").unwrap();
    assert!(t1.acceptance.default_route);
    assert_eq!(t1.acceptance.local_pref, Some(150));
    assert!(t1.communities.strip_own_inbound);
}

#[test]
fn test_runtime_lists() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let state = StateFile::new(dir.path().join("state.json"));
    state.add(ListKind::Quarantine, "c1").unwrap();
    state.add(ListKind::Quarantine, "c1").unwrap();
    state.add(ListKind::GracefulShutdown, "t*").unwrap();
    state.remove(ListKind::GracefulShutdown, "missing").unwrap();
    let lists = state.load().unwrap();
    assert_eq!(lists.quarantine.list(), vec!["c1"]);

    let fixture = Fixture::new()
        .static_route("10.0.0.0/8 via 100.101.0.3")
        .peer(
            "c1",
            65100,
            PeerType::Customer,
            &[fragments::redistribute(&[(RedistributeOption::Static, true)])],
        )
        .peer("t1", 65200, PeerType::Transit, &[]);
    let document = fixture.compile(&lists).unwrap();

    let c1 = document.peer("c1").unwrap();
    assert!(c1.quarantine);
    assert!(c1.acceptance.reject_all);
    assert!(c1.redistribution.rules.is_empty());
    assert!(c1.redistribution.static_routes.is_empty());

    let t1 = document.peer("t1").unwrap();
    assert!(t1.graceful_shutdown);
    assert_eq!(t1.acceptance.local_pref, Some(0));
    assert_eq!(t1.communities.graceful_shutdown.as_deref(), Some("65535:0"));

    // The compile reads the lists but never changes them.
    assert_eq!(state.load().unwrap(), lists);
}
