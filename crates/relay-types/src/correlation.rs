//! Correlation keys for request tracking.
//!
//! A key is derived from the request tag and its arguments, so two calls with
//! equal arguments map to the same key. Array arguments are sorted first,
//! which makes `["a", "b"]` and `["b", "a"]` equivalent.

use crate::dispatch::DispatchType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Correlation key linking a request envelope to its response envelope(s).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Derive the key for `(kind, args)`.
    pub fn derive(kind: DispatchType, args: &[Value]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(Value::from(kind.as_str()).to_string().as_bytes());

        for arg in args {
            hasher.update(normalize(arg).to_string().as_bytes());
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a key received on the wire.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Sort top-level arrays by the JSON text of their elements.
fn normalize(arg: &Value) -> Value {
    match arg {
        Value::Array(items) => {
            let mut sorted = items.clone();
            sorted.sort_by_cached_key(|item| item.to_string());
            Value::Array(sorted)
        }
        other => other.clone(),
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
