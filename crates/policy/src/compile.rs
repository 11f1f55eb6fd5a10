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

//! The compile pipeline: value tree in, policy document out.

use serde_yaml_ng::Value;
use tracing::{debug, error, info};

use crate::constraints;
use crate::document::{IgpEntry, PeerEntry, PolicyDocument};
use crate::error::{CompileError, ValidationErrors};
use crate::matrix;
use crate::peer_list::RuntimeLists;
use crate::redistribution::KernelExport;
use crate::resolver::Resolver;
use crate::schema::RouterConfig;
use crate::validator;
use crate::value;

/// Parses YAML text and compiles it.
pub fn compile_str(text: &str, lists: &RuntimeLists) -> Result<PolicyDocument, CompileError> {
    compile(&value::parse(text)?, lists)
}

/// Compiles one router's value tree. Nothing is emitted unless the whole
/// router validates.
pub fn compile(tree: &Value, lists: &RuntimeLists) -> Result<PolicyDocument, CompileError> {
    constraints::check_authoring()?;
    matrix::check_authoring()?;

    let router = RouterConfig::from_value(tree)?;
    debug!(router_id = %router.router_id, "parsed router configuration");
    compile_router(&router, lists)
}

pub fn compile_router(
    router: &RouterConfig,
    lists: &RuntimeLists,
) -> Result<PolicyDocument, CompileError> {
    let kernel = KernelExport::derive(router);

    let peers: Vec<PeerEntry> = match &router.bgp {
        Some(bgp) => {
            let resolver = Resolver::new(&bgp.attributes, lists);
            bgp.peers
                .values()
                .map(|peer| {
                    let resolved = resolver.resolve_peer(peer);
                    PeerEntry::build(resolved, bgp.asn, router, &kernel)
                })
                .collect()
        }
        None => vec![],
    };
    let igps: Vec<IgpEntry> = router
        .igps()
        .map(|igp| IgpEntry::build(igp, router, &kernel))
        .collect();
    debug!(peers = peers.len(), igps = igps.len(), "derived policies");

    let failures = validator::validate(router, lists);
    if !failures.is_empty() {
        for failure in &failures {
            error!(router_id = %failure.router_id, "{}", failure.message);
        }
        return Err(ValidationErrors(failures).into());
    }

    info!(router_id = %router.router_id, peers = peers.len(), "compiled policy");
    Ok(PolicyDocument {
        router_id: router.router_id,
        asn: router.bgp.as_ref().map(|b| b.asn),
        protocols: router.enabled_protocols(),
        kernel_export: kernel,
        static_routes: router.static_routes.clone(),
        igps,
        peers,
    })
}
