//! The storable request record.
//!
//! This is the Rust shape of `[SERIALIZABLE_REQUEST]`: a plain,
//! `Serialize`/`Deserialize` record with no live-network attachments, so
//! it can sit in a `Store` untouched. The forward/reverse transform
//! to/from a live `reqwest::Request` lives in `queue-http`, which is the
//! only crate that knows what "live" means here. `queue-core` stays
//! backend-agnostic the same way `spin-key-value`'s `Store` trait never
//! mentions Redis or SQLite.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mirrors the `RequestCache` Web platform enum; preserved verbatim
/// because an interoperating host may branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCache {
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCredentials {
    Omit,
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    SameOrigin,
    Cors,
    NoCors,
    Navigate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestRedirect {
    Follow,
    Error,
    Manual,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::Default
    }
}

impl Default for RequestCredentials {
    fn default() -> Self {
        Self::SameOrigin
    }
}

impl Default for RequestMode {
    fn default() -> Self {
        Self::Cors
    }
}

impl Default for RequestRedirect {
    fn default() -> Self {
        Self::Follow
    }
}

/// A fully in-memory, cloneable record of an HTTP request, losslessly
/// round-trippable to and from a live request (see `queue-http`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Absolute URL.
    pub url: String,
    /// Upper-case HTTP method, e.g. `"POST"`.
    pub method: String,
    /// Header name -> value. A `Vec` (not a `HashMap`) preserves
    /// duplicate-header and insertion order, which a `HashMap` would lose.
    pub headers: Vec<(String, String)>,
    /// Body bytes. Absent for methods that don't carry one (`GET`/`HEAD`).
    pub body: Option<Vec<u8>>,
    pub mode: RequestMode,
    pub credentials: RequestCredentials,
    pub cache: RequestCache,
    pub redirect: RequestRedirect,
    pub referrer: Option<String>,
    pub integrity: Option<String>,
}

impl RequestRecord {
    /// Methods that never carry a body, per the Fetch spec.
    pub fn method_permits_body(method: &str) -> bool {
        !matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD")
    }

    /// Convenience constructor for the common case: a GET/POST with a flat
    /// header map and every other field defaulted.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: Vec::new(),
            body: None,
            mode: RequestMode::default(),
            credentials: RequestCredentials::default(),
            cache: RequestCache::default(),
            redirect: RequestRedirect::default(),
            referrer: None,
            integrity: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Headers as a map, for callers that don't care about duplicates or
    /// order.
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers.iter().cloned().collect()
    }
}
