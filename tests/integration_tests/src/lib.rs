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

//! Shared fixtures for the integration tests.
//!
//! A router is built from a base policy plus named fragments. Fragments are
//! partial attribute sets merged with `PeerAttributes::overlay`, later
//! fragments taking precedence, so a test reads as the composition of the
//! behaviours it needs.

use std::net::Ipv4Addr;

use routeplan_policy::schema::{
    AcceptOption, BgpConfig, PeerAttributes, PeerConfig, PeerType, RedistributeOption,
    RouterConfig,
};
use routeplan_policy::{compile_router, CompileError, PolicyDocument, RuntimeLists};

pub fn init() {
    match tracing_subscriber::fmt()
        .with_env_filter("routeplan_policy=debug")
        .try_init()
    {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Failed to setup tracing: {}", e);
        }
    }
}

pub const LOCAL_ASN: u32 = 65000;

/// Composes fragments, each overriding the ones before it.
pub fn compose(fragments: &[PeerAttributes]) -> PeerAttributes {
    fragments
        .iter()
        .fold(PeerAttributes::default(), |acc, fragment| {
            fragment.overlay(&acc)
        })
}

pub mod fragments {
    use super::*;

    pub fn redistribute(flags: &[(RedistributeOption, bool)]) -> PeerAttributes {
        let mut attrs = PeerAttributes::default();
        attrs.redistribute.extend(flags.iter().copied());
        attrs
    }

    pub fn accept(flags: &[(AcceptOption, bool)]) -> PeerAttributes {
        let mut attrs = PeerAttributes::default();
        attrs.accept.extend(flags.iter().copied());
        attrs
    }

    pub fn rr_cluster_id(id: Ipv4Addr) -> PeerAttributes {
        PeerAttributes {
            rr_cluster_id: Some(id),
            ..Default::default()
        }
    }

    pub fn passive(on: bool) -> PeerAttributes {
        PeerAttributes {
            passive: Some(on),
            ..Default::default()
        }
    }
}

/// A router under construction.
#[derive(Debug, Clone)]
pub struct Fixture {
    router: RouterConfig,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Base policy: router 0.0.0.1 running BGP in AS 65000 with no peers.
    pub fn new() -> Self {
        let mut router = RouterConfig::new(Ipv4Addr::new(0, 0, 0, 1));
        router.bgp = Some(BgpConfig::new(LOCAL_ASN));
        Fixture { router }
    }

    pub fn global(mut self, fragments: &[PeerAttributes]) -> Self {
        if let Some(bgp) = self.router.bgp.as_mut() {
            bgp.attributes = compose(fragments).overlay(&bgp.attributes);
        }
        self
    }

    pub fn peer(
        mut self,
        name: &str,
        asn: u32,
        peer_type: PeerType,
        fragments: &[PeerAttributes],
    ) -> Self {
        let mut peer = PeerConfig::new(name, asn, peer_type);
        peer.attributes = compose(fragments);
        if let Some(bgp) = self.router.bgp.as_mut() {
            bgp.add_peer(peer);
        }
        self
    }

    pub fn static_route(mut self, route: &str) -> Self {
        match route.parse() {
            Ok(route) => self.router.static_routes.push(route),
            Err(e) => panic!("bad static route fixture '{}': {}", route, e),
        }
        self
    }

    pub fn router(&self) -> &RouterConfig {
        &self.router
    }

    pub fn compile(&self, lists: &RuntimeLists) -> Result<PolicyDocument, CompileError> {
        compile_router(&self.router, lists)
    }

    /// Messages of a compile that is expected to fail validation.
    pub fn failures(&self, lists: &RuntimeLists) -> Vec<String> {
        match self.compile(lists) {
            Err(CompileError::Validation(errors)) => {
                errors.messages().into_iter().map(String::from).collect()
            }
            Err(e) => panic!("expected validation failures, got {}", e),
            Ok(_) => vec![],
        }
    }
}
