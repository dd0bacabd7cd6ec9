//! HTTP transport abstraction for the MTD API client
//!
//! Defines the `Transport` trait that decouples the request executor from the
//! HTTP stack. `ReqwestTransport` is the production implementation; the
//! scripted `StubTransport` (feature `stub`) records every request so tests can
//! assert exactly what was sent and how many times.
//!
//! A transport only reports *transport* failures (no response obtained). Any
//! response, including 4xx/5xx, comes back as `Ok(HttpResponse)` and the
//! caller decides what the status means.

pub mod http;
#[cfg(feature = "stub")]
pub mod stub;

pub use http::ReqwestTransport;
pub use reqwest::Method;
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
#[cfg(feature = "stub")]
pub use stub::StubTransport;

use std::future::Future;
use std::pin::Pin;

/// Body of an outbound request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as `application/json`
    Json(serde_json::Value),
    /// Serialized as `application/x-www-form-urlencoded` (token endpoint)
    Form(Vec<(String, String)>),
}

/// A fully resolved outbound request: absolute URL, headers, query and body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if the body is form-encoded.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// A response as received from the server, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a response header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body as JSON. Empty or non-JSON bodies yield `None`.
    pub fn json(&self) -> Option<serde_json::Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

/// Failures where no HTTP response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Abstraction over the HTTP stack used to reach the tax API.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "stub")
    fn id(&self) -> &str;

    /// Send one request and return the response, or a transport error when
    /// no response was received.
    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_json_tolerates_empty_and_invalid_bodies() {
        assert!(HttpResponse::new(204, "").json().is_none());
        assert!(HttpResponse::new(200, "   ").json().is_none());
        assert!(HttpResponse::new(500, "<html>oops</html>").json().is_none());

        let body = HttpResponse::new(401, r#"{"code":"INVALID_CREDENTIALS"}"#)
            .json()
            .unwrap();
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = HttpResponse::new(201, "{}")
            .with_header("X-CorrelationId", "corr-1")
            .with_header("Receipt-ID", "rcpt-1");
        assert_eq!(response.header_str("x-correlationid"), Some("corr-1"));
        assert_eq!(response.header_str("RECEIPT-ID"), Some("rcpt-1"));
        assert!(response.header_str("receipt-timestamp").is_none());
    }

    #[test]
    fn with_header_skips_invalid_names() {
        let response = HttpResponse::new(200, "").with_header("bad header", "v");
        assert!(response.headers.is_empty());
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(201, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
        assert!(!HttpResponse::new(503, "").is_success());
    }

    #[test]
    fn request_lookups() {
        let mut request = HttpRequest::new(Method::POST, "https://example.test/oauth/token");
        request.query.push(("from".into(), "2017-01-01".into()));
        request.body = RequestBody::Form(vec![("grant_type".into(), "refresh_token".into())]);

        assert_eq!(request.query_param("from"), Some("2017-01-01"));
        assert_eq!(request.query_param("to"), None);
        assert_eq!(request.form_field("grant_type"), Some("refresh_token"));
        assert_eq!(request.form_field("code"), None);
    }
}
