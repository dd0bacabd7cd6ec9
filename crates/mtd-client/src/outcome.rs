//! Result of one logical call
//!
//! Every `Executor::execute` produces a fresh `CallOutcome`. Failures are
//! data here, not control flow: callers branch on `status` and inspect
//! `status_code`, `body` and `error` against the API's error vocabulary.

use mtd_auth::TokenPair;
use serde::Serialize;
use serde_json::Value;
use transport::{HeaderMap, HttpResponse, TransportError};

use crate::classify::error_code;

pub const CORRELATION_ID_HEADER: &str = "X-CorrelationId";
pub const RECEIPT_ID_HEADER: &str = "Receipt-ID";
pub const RECEIPT_TIMESTAMP_HEADER: &str = "Receipt-Timestamp";

/// Tri-state call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    /// Succeeded after the access token was refreshed during this call.
    /// The new pair is in `CallOutcome::rotated_credentials`.
    SuccessWithRotatedCredentials,
    Error,
}

impl CallStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::SuccessWithRotatedCredentials => "success_with_rotated_credentials",
            CallStatus::Error => "error",
        }
    }
}

/// Why a call ended in `CallStatus::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with an error status.
    #[error("API error {status}: {}", .code.as_deref().unwrap_or("no error code"))]
    Api { status: u16, code: Option<String> },

    /// The refresh exchange triggered by INVALID_CREDENTIALS failed.
    #[error("token refresh failed: {message}")]
    Refresh { status: Option<u16>, message: String },
}

/// Submission receipt returned with a successful return submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: String,
    pub timestamp: Option<String>,
}

impl Receipt {
    /// Read `Receipt-ID` (required) and `Receipt-Timestamp` from headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let id = header_string(headers, RECEIPT_ID_HEADER)?;
        Some(Self {
            id,
            timestamp: header_string(headers, RECEIPT_TIMESTAMP_HEADER),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub status: CallStatus,
    /// HTTP status; `None` when no response was received.
    pub status_code: Option<u16>,
    pub body_raw: String,
    /// Decoded JSON body; `None` for empty or non-JSON bodies.
    pub body: Option<Value>,
    pub correlation_id: Option<String>,
    pub receipt: Option<Receipt>,
    /// The pair issued by a refresh during this call, if one happened.
    pub rotated_credentials: Option<TokenPair>,
    pub error: Option<CallError>,
    pub headers: HeaderMap,
}

impl CallOutcome {
    /// Outcome for a 2xx response.
    pub(crate) fn success(
        response: HttpResponse,
        body: Option<Value>,
        capture_receipt: bool,
        rotated: Option<TokenPair>,
    ) -> Self {
        let status = if rotated.is_some() {
            CallStatus::SuccessWithRotatedCredentials
        } else {
            CallStatus::Success
        };
        let receipt = if capture_receipt {
            Receipt::from_headers(&response.headers)
        } else {
            None
        };
        Self {
            status,
            status_code: Some(response.status),
            correlation_id: header_string(&response.headers, CORRELATION_ID_HEADER),
            body_raw: response.body,
            body,
            receipt,
            rotated_credentials: rotated,
            error: None,
            headers: response.headers,
        }
    }

    /// Outcome for an error status the executor does not recover from.
    pub(crate) fn api_error(
        response: HttpResponse,
        body: Option<Value>,
        rotated: Option<TokenPair>,
    ) -> Self {
        let code = error_code(body.as_ref()).map(str::to_owned);
        Self {
            status: CallStatus::Error,
            status_code: Some(response.status),
            correlation_id: header_string(&response.headers, CORRELATION_ID_HEADER),
            body_raw: response.body,
            body,
            receipt: None,
            rotated_credentials: rotated,
            error: Some(CallError::Api {
                status: response.status,
                code,
            }),
            headers: response.headers,
        }
    }

    /// Outcome when no response was received.
    pub(crate) fn transport_failure(error: &TransportError, rotated: Option<TokenPair>) -> Self {
        Self {
            status: CallStatus::Error,
            status_code: None,
            body_raw: String::new(),
            body: None,
            correlation_id: None,
            receipt: None,
            rotated_credentials: rotated,
            error: Some(CallError::Transport(error.to_string())),
            headers: HeaderMap::new(),
        }
    }

    /// Outcome when the refresh exchange failed. Status and body are the
    /// token endpoint's, when it answered.
    pub(crate) fn refresh_failure(error: &mtd_auth::Error) -> Self {
        let body = error.body().cloned();
        Self {
            status: CallStatus::Error,
            status_code: error.status(),
            body_raw: error.body_raw().to_owned(),
            body,
            correlation_id: None,
            receipt: None,
            rotated_credentials: None,
            error: Some(CallError::Refresh {
                status: error.status(),
                message: error.to_string(),
            }),
            headers: HeaderMap::new(),
        }
    }

    /// `Success` or `SuccessWithRotatedCredentials`.
    pub fn is_success(&self) -> bool {
        self.status != CallStatus::Error
    }

    /// Top-level `code` of the decoded body (API error vocabulary).
    pub fn error_code(&self) -> Option<&str> {
        error_code(self.body.as_ref())
    }

    /// Summary suitable for printing: status, code, ids and body.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "status": self.status,
            "status_code": self.status_code,
            "correlation_id": self.correlation_id,
            "receipt": self.receipt,
            "credentials_rotated": self.rotated_credentials.is_some(),
            "error": self.error.as_ref().map(ToString::to_string),
            "body": self.body,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
