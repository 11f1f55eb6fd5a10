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

use std::fmt;

use thiserror::Error;

/// SchemaError is raised when an entry of the value tree has the wrong shape
/// for the attribute it configures. It aborts the compile immediately.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid configuration at '{path}': {kind}")]
pub struct SchemaError {
    /// Colon separated location of the offending entry, e.g. `bgp:peers:p1:accept`.
    pub path: String,
    pub kind: SchemaErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaErrorKind {
    #[error("expected {expected} but got {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("mandatory attribute '{0}' is missing")]
    Missing(&'static str),

    #[error("invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },
}

impl SchemaError {
    pub fn new(path: impl Into<String>, kind: SchemaErrorKind) -> Self {
        SchemaError {
            path: path.into(),
            kind,
        }
    }

    pub fn invalid(path: impl Into<String>, value: impl ToString, reason: impl ToString) -> Self {
        SchemaError::new(
            path,
            SchemaErrorKind::InvalidValue {
                value: value.to_string(),
                reason: reason.to_string(),
            },
        )
    }
}

/// ValidationException is a semantically invalid but well formed piece of
/// configuration. They are collected across all peers before the compile is
/// aborted so that an operator sees every problem in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationException {
    pub router_id: String,
    /// None for router scoped failures.
    pub peer: Option<String>,
    pub message: String,
}

impl ValidationException {
    pub fn router(router_id: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationException {
            router_id: router_id.into(),
            peer: None,
            message: message.into(),
        }
    }

    pub fn peer(
        router_id: impl Into<String>,
        peer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationException {
            router_id: router_id.into(),
            peer: Some(peer.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationException {}

/// The full list of validation failures for one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationException>);

impl ValidationErrors {
    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.message.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failure(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n  {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// AuthoringError flags a contradiction inside the built-in policy tables.
/// It is a programming error and never caused by operator input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthoringError {
    #[error("peer type '{peer_type}' default for '{minimum}' is greater than '{maximum}'")]
    InvertedConstraint {
        peer_type: &'static str,
        minimum: String,
        maximum: String,
    },

    #[error("peer type '{peer_type}' enables '{attribute}' by default but it is forbidden")]
    ForbiddenDefault {
        peer_type: &'static str,
        attribute: String,
    },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("internal policy table error: {0}")]
    Authoring(#[from] AuthoringError),
}

#[derive(Debug, Error)]
pub enum PeerListError {
    #[error("failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode state file: {0}")]
    Decode(#[from] serde_json::Error),
}
