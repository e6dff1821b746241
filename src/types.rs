//! Common types used throughout apikit
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Entity Keys
// ============================================================================

/// Identity key for a cached entity.
///
/// Remote APIs key entities by numeric id or by opaque string id depending
/// on the resource; both forms share one cache keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    /// Numeric identity (user ids, asset ids, ...)
    Int(i64),
    /// Opaque string identity (conversation ids, uuids, ...)
    Str(String),
}

impl EntityKey {
    /// Convert a raw JSON id into a key.
    ///
    /// Fails with [`Error::InvalidKey`] for null, missing, or non-scalar
    /// values, which is where the "key is never null" contract is enforced
    /// when ids come straight out of response bodies.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Number(n) => n
                .as_i64()
                .map(EntityKey::Int)
                .ok_or_else(|| Error::invalid_key(format!("non-integer id: {n}"))),
            JsonValue::String(s) if !s.is_empty() => Ok(EntityKey::Str(s.clone())),
            JsonValue::String(_) => Err(Error::invalid_key("empty string id")),
            JsonValue::Null => Err(Error::invalid_key("id was null")),
            other => Err(Error::invalid_key(format!("non-scalar id: {other}"))),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(n) => write!(f, "{n}"),
            EntityKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(id: i64) -> Self {
        EntityKey::Int(id)
    }
}

impl From<u32> for EntityKey {
    fn from(id: u32) -> Self {
        EntityKey::Int(i64::from(id))
    }
}

impl From<&str> for EntityKey {
    fn from(id: &str) -> Self {
        EntityKey::Str(id.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(id: String) -> Self {
        EntityKey::Str(id)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
