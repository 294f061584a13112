//! Request and response wrappers.
//!
//! [`Request`] wraps an incoming call's payload, metadata, and full method
//! name. [`Response`] wraps the outgoing payload; [`Response::empty`] is the
//! placeholder used when an error path still has to produce a value.

use std::sync::OnceLock;

use bytes::Bytes;

use crate::error::StatusCode;

/// Case-preserving string key/value map over call metadata.
///
/// Keys keep the case they were inserted with; lookup is case-insensitive,
/// matching header conventions.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Creates an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key/value pair, preserving the key's case.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns the first value for `key`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all values for `key`, compared case-insensitively.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An incoming call.
#[derive(Debug)]
pub struct Request {
    method: String,
    metadata: Metadata,
    payload: Bytes,
    service: OnceLock<Option<String>>,
}

impl Request {
    /// Creates a request from its full method name, payload, and metadata.
    #[must_use]
    pub fn new(method: impl Into<String>, payload: Bytes, metadata: Metadata) -> Self {
        Self {
            method: method.into(),
            metadata,
            payload,
            service: OnceLock::new(),
        }
    }

    /// The full method name, e.g. `/echo.Echo/Ping`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw request payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The call metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The qualified service name derived from the method, e.g. `echo.Echo`.
    ///
    /// Computed at most once per request.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service
            .get_or_init(|| {
                let mut parts = self.method.rsplit('/');
                let _method = parts.next()?;
                let service = parts.next()?;
                if service.is_empty() {
                    None
                } else {
                    Some(service.to_string())
                }
            })
            .as_deref()
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
}

impl Response {
    /// Creates a response carrying `payload`.
    #[must_use]
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// The empty placeholder response.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            payload: Bytes::new(),
        }
    }

    /// The response payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this is an empty value in the hook contract's sense.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Bytes> for Response {
    fn from(payload: Bytes) -> Self {
        Self::new(payload)
    }
}

impl From<&'static str> for Response {
    fn from(payload: &'static str) -> Self {
        Self::new(Bytes::from_static(payload.as_bytes()))
    }
}

/// Sink for the status reported back to the caller.
///
/// The transport hands one of these to each call; error handlers and the
/// exception stage write the final code and message through it.
pub trait StatusSink: Send {
    /// Sets the status code reported to the caller.
    fn set_status_code(&mut self, code: StatusCode);

    /// Sets the status detail message reported to the caller.
    fn set_status_message(&mut self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_case_insensitive_lookup() {
        let mut metadata = Metadata::new();
        metadata.insert("X-Request-Id", "abc");
        assert_eq!(metadata.get("x-request-id"), Some("abc"));
        assert_eq!(metadata.get("X-REQUEST-ID"), Some("abc"));
        assert_eq!(metadata.get("missing"), None);
    }

    #[test]
    fn test_metadata_preserves_key_case() {
        let mut metadata = Metadata::new();
        metadata.insert("X-Token", "t");
        let (key, _) = metadata.iter().next().expect("entry present");
        assert_eq!(key, "X-Token");
    }

    #[test]
    fn test_metadata_multiple_values() {
        let mut metadata = Metadata::new();
        metadata.insert("accept", "a");
        metadata.insert("Accept", "b");
        assert_eq!(metadata.get("accept"), Some("a"));
        assert_eq!(metadata.get_all("accept").count(), 2);
    }

    #[test]
    fn test_service_from_method() {
        let request = Request::new("/echo.Echo/Ping", Bytes::new(), Metadata::new());
        assert_eq!(request.service(), Some("echo.Echo"));
        // second access hits the cached value
        assert_eq!(request.service(), Some("echo.Echo"));
    }

    #[test]
    fn test_service_missing_for_malformed_method() {
        let request = Request::new("Ping", Bytes::new(), Metadata::new());
        assert_eq!(request.service(), None);

        let request = Request::new("/Ping", Bytes::new(), Metadata::new());
        assert_eq!(request.service(), None);
    }

    #[test]
    fn test_empty_response() {
        assert!(Response::empty().is_empty());
        assert!(!Response::from("ok").is_empty());
    }
}
