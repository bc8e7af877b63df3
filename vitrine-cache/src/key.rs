//! Cache key derivation from request identity.
//!
//! A key is the request address, optionally followed by `:` and the
//! parameters serialised as a JSON object with names in lexicographic
//! order. Insertion order of the parameters never affects the key.
//!
//! The address is used verbatim. It is neither escaped nor hashed, so two
//! callers that hand-build query strings into the address can collide.

use serde_json::{Map, Value};
use std::fmt;

use vitrine_core::RequestParams;

/// Separator between the address and the canonical parameter block.
const SEPARATOR: char = ':';

/// A canonical request identity used as the cache map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `address` and `params`.
    ///
    /// Pure: the same inputs always yield the same key. With no parameters
    /// the key is the address itself.
    pub fn derive(address: &str, params: Option<&RequestParams>) -> Self {
        let Some(params) = params else {
            return Self(address.to_string());
        };

        let mut names: Vec<&String> = params.keys().collect();
        names.sort();

        let canonical: Map<String, Value> = names
            .into_iter()
            .map(|name| (name.clone(), params[name].clone()))
            .collect();

        Self(format!("{address}{SEPARATOR}{}", Value::Object(canonical)))
    }

    /// Use a caller-supplied key as is.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::from_raw(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self::from_raw(key)
    }
}
