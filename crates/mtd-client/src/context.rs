//! Per-call request description
//!
//! A `CallContext` says what to call and with which credential; it carries no
//! results. The executor borrows it immutably, so one context can be sent any
//! number of times and nothing from a previous call can leak into it.

use mtd_auth::CredentialClass;
use serde_json::Value;
use transport::Method;

#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    endpoint: String,
    method: Method,
    credential_class: CredentialClass,
    query: Vec<(String, String)>,
    body: Option<Value>,
    test_scenario: Option<String>,
    capture_receipt: bool,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            method: Method::GET,
            credential_class: CredentialClass::User,
            query: Vec::new(),
            body: None,
            test_scenario: None,
            capture_receipt: false,
        }
    }
}

impl CallContext {
    /// A GET of `endpoint` (relative to the API base URL) with user credentials.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// A POST of `body` as JSON to `endpoint` with user credentials.
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_credential_class(mut self, class: CredentialClass) -> Self {
        self.credential_class = class;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sandbox only: ask the API for a canned scenario.
    pub fn with_test_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.test_scenario = Some(scenario.into());
        self
    }

    /// Submission-type call: read Receipt-ID/Receipt-Timestamp on success.
    pub fn with_receipt(mut self) -> Self {
        self.capture_receipt = true;
        self
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub fn set_test_scenario(&mut self, scenario: Option<String>) {
        self.test_scenario = scenario;
    }

    /// Restore every field to its default so the context can describe a new call.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn credential_class(&self) -> CredentialClass {
        self.credential_class
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn test_scenario(&self) -> Option<&str> {
        self.test_scenario.as_deref()
    }

    pub fn captures_receipt(&self) -> bool {
        self.capture_receipt
    }
}
