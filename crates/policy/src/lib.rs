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

//! Compiles a declarative router configuration into a per peer routing
//! policy document.

pub mod community;
pub mod compile;
pub mod constraints;
pub mod defaults;
pub mod document;
pub mod error;
pub mod matrix;
pub mod peer_list;
pub mod redistribution;
pub mod resolver;
pub mod schema;
pub mod validator;
pub mod value;

pub use compile::{compile, compile_router, compile_str};
pub use document::PolicyDocument;
pub use error::{CompileError, SchemaError, ValidationErrors, ValidationException};
pub use peer_list::{ListKind, PeerList, RuntimeLists, StateFile};
