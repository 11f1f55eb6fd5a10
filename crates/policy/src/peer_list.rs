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

//! Operator maintained runtime lists of peers: graceful shutdown and
//! quarantine. They are read once at the start of a compile and only changed
//! through the explicit list operations below, never by the compile itself.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PeerListError;

/// An ordered, duplicate free list of peer names. Entries may contain `*`
/// wildcards which match any run of characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerList(BTreeSet<String>);

impl PeerList {
    /// Adds a peer. Returns false if it was already listed.
    pub fn add(&mut self, peer: &str) -> bool {
        self.0.insert(peer.to_string())
    }

    /// Removes a peer. Removing a peer that is not listed is a no-op.
    pub fn remove(&mut self, peer: &str) -> bool {
        self.0.remove(peer)
    }

    pub fn list(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a peer name is covered by any entry.
    pub fn matches(&self, peer: &str) -> bool {
        self.0.iter().any(|pattern| wildcard_match(pattern, peer))
    }

    /// Entries that match none of the given peer names.
    pub fn unmatched<'a>(&'a self, peers: &[&str]) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|pattern| !peers.iter().any(|p| wildcard_match(pattern, p)))
            .map(String::as_str)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PeerList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PeerList(iter.into_iter().map(Into::into).collect())
    }
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((head, rest)) => {
            let Some(tail) = name.strip_prefix(head) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            (0..=tail.len())
                .filter(|i| tail.is_char_boundary(*i))
                .any(|i| wildcard_match(rest, &tail[i..]))
        }
    }
}

#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum ListKind {
    GracefulShutdown,
    Quarantine,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::GracefulShutdown => "graceful shutdown",
            ListKind::Quarantine => "quarantine",
        }
    }
}

/// Both runtime lists, as persisted in the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLists {
    #[serde(default)]
    pub graceful_shutdown: PeerList,
    #[serde(default)]
    pub quarantine: PeerList,
}

impl RuntimeLists {
    pub fn get(&self, kind: ListKind) -> &PeerList {
        match kind {
            ListKind::GracefulShutdown => &self.graceful_shutdown,
            ListKind::Quarantine => &self.quarantine,
        }
    }

    pub fn get_mut(&mut self, kind: ListKind) -> &mut PeerList {
        match kind {
            ListKind::GracefulShutdown => &mut self.graceful_shutdown,
            ListKind::Quarantine => &mut self.quarantine,
        }
    }
}

/// JSON file backed store for the runtime lists.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        StateFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads the lists. A missing state file holds empty lists.
    pub fn load(&self) -> Result<RuntimeLists, PeerListError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, using empty lists");
                Ok(RuntimeLists::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, lists: &RuntimeLists) -> Result<(), PeerListError> {
        let contents = serde_json::to_string_pretty(lists)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn add(&self, kind: ListKind, peer: &str) -> Result<(), PeerListError> {
        let mut lists = self.load()?;
        if lists.get_mut(kind).add(peer) {
            info!("Added '{}' to the {} list", peer, kind.as_str());
            self.save(&lists)?;
        }
        Ok(())
    }

    pub fn remove(&self, kind: ListKind, peer: &str) -> Result<(), PeerListError> {
        let mut lists = self.load()?;
        if lists.get_mut(kind).remove(peer) {
            info!("Removed '{}' from the {} list", peer, kind.as_str());
            self.save(&lists)?;
        }
        Ok(())
    }

    pub fn list(&self, kind: ListKind) -> Result<Vec<String>, PeerListError> {
        Ok(self.load()?.get(kind).list())
    }
}
