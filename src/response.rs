//! Handler responses.
//!
//! Bodies are JSON values, mirroring how handler chains exchange data. Text
//! payloads (YAML documents, HTML docs pages) travel as `Value::String` with an
//! explicit content type; [`HandlerResponse::body_bytes`] renders either form
//! for the transport.

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 8;

/// Stack-allocated header storage; names are shared `Arc<str>`
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Response produced by a route chain.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body
    pub body: Value,
}

impl HandlerResponse {
    /// Create a new response with the given status, headers, and body
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self::new(status, headers, body)
    }

    /// Create a text response with an explicit content type
    #[must_use]
    pub fn text(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), content_type.to_string()));
        Self::new(status, headers, Value::String(body.into()))
    }

    /// Create a body-less response
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Serialize the body for the wire.
    ///
    /// JSON responses are encoded with `serde_json`; text responses emit the
    /// string verbatim; `Value::Null` with no content type is an empty body.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        let is_json = self
            .get_header("content-type")
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        match &self.body {
            Value::Null if !is_json => Vec::new(),
            Value::String(text) if !is_json => text.as_bytes().to_vec(),
            other => serde_json::to_vec(other).unwrap_or_default(),
        }
    }
}
