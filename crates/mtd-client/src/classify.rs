//! Response classification for the retry decision
//!
//! The API reports an expired or revoked access token as 401 with body
//! `{"code":"INVALID_CREDENTIALS", ...}`. That exact code is the only signal
//! that a refresh can help; other 401s (missing or malformed Authorization
//! header, unknown client) must surface unchanged.

use serde_json::Value;

/// Application error code for expired/invalid bearer tokens.
pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";

/// What a received response means for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// 401 with code INVALID_CREDENTIALS
    InvalidCredentials,
    /// Any other 4xx/5xx (or non-2xx status)
    ApiError,
}

/// Top-level `code` field of an API error body, if present.
pub fn error_code(body: Option<&Value>) -> Option<&str> {
    body.and_then(|b| b.get("code")).and_then(|c| c.as_str())
}

/// Classify a response by status and decoded body.
pub fn classify_response(status: u16, body: Option<&Value>) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        401 if error_code(body) == Some(INVALID_CREDENTIALS) => ResponseClass::InvalidCredentials,
        _ => ResponseClass::ApiError,
    }
}
