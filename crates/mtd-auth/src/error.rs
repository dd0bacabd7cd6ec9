//! Error types for OAuth token operations

/// Errors from the token endpoint and credential handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response from the token endpoint (connection, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {}", .error.as_deref().unwrap_or("unknown error"))]
    TokenEndpoint {
        status: u16,
        /// OAuth2 `error` field, e.g. `invalid_grant`
        error: Option<String>,
        /// OAuth2 `error_description` field
        description: Option<String>,
        /// Decoded response body, when it was JSON
        body: Option<serde_json::Value>,
        /// Response body exactly as received
        body_raw: String,
    },

    /// Success status but the body was not a usable token response.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("no refresh token available")]
    MissingRefreshToken,
}

impl Error {
    /// HTTP status reported by the token endpoint, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenEndpoint { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Token endpoint body as received; empty when there was no response.
    pub fn body_raw(&self) -> &str {
        match self {
            Error::TokenEndpoint { body_raw, .. } => body_raw,
            _ => "",
        }
    }

    /// Decoded token endpoint body, if one was received.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Error::TokenEndpoint { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
