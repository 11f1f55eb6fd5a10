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

//! Access helpers for the untyped value tree the policy is built from.
//!
//! The tree is whatever the YAML loader produced. Every accessor reports a
//! SchemaError carrying the colon separated path of the offending entry.

use std::fmt::Display;
use std::str::FromStr;

use serde_yaml_ng::Value;

use crate::error::{SchemaError, SchemaErrorKind};

/// Parses configuration text into a value tree.
pub fn parse(text: &str) -> Result<Value, SchemaError> {
    serde_yaml_ng::from_str(text).map_err(|e| SchemaError::invalid("", "<document>", e))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Node is a borrowed position within the value tree.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    path: String,
    value: &'a Value,
}

impl<'a> Node<'a> {
    pub fn root(value: &'a Value) -> Self {
        Node {
            path: String::new(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    fn child(&self, key: &str, value: &'a Value) -> Node<'a> {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.path, key)
        };
        Node { path, value }
    }

    fn wrong_type(&self, expected: &'static str) -> SchemaError {
        SchemaError::new(
            self.path.clone(),
            SchemaErrorKind::WrongType {
                expected,
                found: kind_of(self.value),
            },
        )
    }

    pub fn unknown(&self, key: &str) -> SchemaError {
        SchemaError::new(
            self.path.clone(),
            SchemaErrorKind::UnknownAttribute(key.to_string()),
        )
    }

    pub fn missing(&self, key: &'static str) -> SchemaError {
        SchemaError::new(self.path.clone(), SchemaErrorKind::Missing(key))
    }

    /// Returns the entries of a mapping in document order. A null node is
    /// treated as an empty mapping so that `peers:` with no body is accepted.
    pub fn entries(&self) -> Result<Vec<(String, Node<'a>)>, SchemaError> {
        let mapping = match self.value {
            Value::Null => return Ok(vec![]),
            Value::Mapping(m) => m,
            _ => return Err(self.wrong_type("mapping")),
        };
        let mut out = Vec::with_capacity(mapping.len());
        for (k, v) in mapping {
            let key = match k {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(SchemaError::new(
                        self.path.clone(),
                        SchemaErrorKind::WrongType {
                            expected: "scalar key",
                            found: kind_of(other),
                        },
                    ))
                }
            };
            let node = self.child(&key, v);
            out.push((key, node));
        }
        Ok(out)
    }

    pub fn sequence(&self) -> Result<Vec<Node<'a>>, SchemaError> {
        match self.value {
            Value::Null => Ok(vec![]),
            Value::Sequence(s) => Ok(s
                .iter()
                .enumerate()
                .map(|(i, v)| self.child(&i.to_string(), v))
                .collect()),
            _ => Err(self.wrong_type("list")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, SchemaError> {
        self.value.as_bool().ok_or_else(|| self.wrong_type("boolean"))
    }

    pub fn as_str(&self) -> Result<&'a str, SchemaError> {
        self.value.as_str().ok_or_else(|| self.wrong_type("string"))
    }

    pub fn as_i64(&self) -> Result<i64, SchemaError> {
        self.value.as_i64().ok_or_else(|| self.wrong_type("integer"))
    }

    pub fn as_u32(&self) -> Result<u32, SchemaError> {
        let v = self.as_i64()?;
        u32::try_from(v).map_err(|_| SchemaError::invalid(self.path.clone(), v, "out of range"))
    }

    /// Integers bounded to `0..=max`.
    pub fn as_bounded(&self, max: u32) -> Result<u32, SchemaError> {
        let v = self.as_u32()?;
        if v > max {
            return Err(SchemaError::invalid(
                self.path.clone(),
                v,
                format!("must be between 0 and {}", max),
            ));
        }
        Ok(v)
    }

    /// Parses a string (or a number, for ASN-like values) using FromStr.
    pub fn parse<T>(&self) -> Result<T, SchemaError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let text = match self.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(self.wrong_type("string")),
        };
        text.parse::<T>()
            .map_err(|e| SchemaError::invalid(self.path.clone(), &text, e))
    }

    pub fn string_list(&self) -> Result<Vec<String>, SchemaError> {
        self.sequence()?
            .iter()
            .map(|n| n.as_str().map(str::to_string))
            .collect()
    }

    pub fn parsed_list<T>(&self) -> Result<Vec<T>, SchemaError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.sequence()?.iter().map(|n| n.parse::<T>()).collect()
    }
}
