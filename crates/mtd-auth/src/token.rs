//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (after user consent)
//! 2. Token refresh (when the API reports INVALID_CREDENTIALS)
//!
//! Both operations POST a form to `{base}/oauth/token` with different grant
//! types and the application's client id/secret.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use transport::{HttpRequest, Method, RequestBody, Transport};

use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};

/// Successful token endpoint response for both exchange and refresh.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// A token response together with the raw JSON it was decoded from.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub tokens: TokenResponse,
    pub raw: serde_json::Value,
}

/// OAuth2 error body: `{"error": "...", "error_description": "..."}`
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens (`authorization_code` grant).
pub async fn exchange_code(
    transport: &dyn Transport,
    token_url: &str,
    client: &ClientCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenGrant> {
    let form = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), code.to_string()),
        ("client_id".to_string(), client.client_id.clone()),
        (
            "client_secret".to_string(),
            client.client_secret.expose().clone(),
        ),
        ("redirect_uri".to_string(), redirect_uri.to_string()),
    ];
    post_token_form(transport, token_url, form, "authorization_code").await
}

/// Refresh an access token (`refresh_token` grant).
pub async fn refresh_token(
    transport: &dyn Transport,
    token_url: &str,
    client: &ClientCredentials,
    refresh: &str,
) -> Result<TokenGrant> {
    let form = vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), refresh.to_string()),
        ("client_id".to_string(), client.client_id.clone()),
        (
            "client_secret".to_string(),
            client.client_secret.expose().clone(),
        ),
    ];
    post_token_form(transport, token_url, form, "refresh_token").await
}

async fn post_token_form(
    transport: &dyn Transport,
    token_url: &str,
    form: Vec<(String, String)>,
    grant_type: &str,
) -> Result<TokenGrant> {
    let mut request = HttpRequest::new(Method::POST, token_url);
    request.body = RequestBody::Form(form);

    let response = transport
        .send(request)
        .await
        .map_err(|e| Error::Http(format!("{grant_type} request failed: {e}")))?;

    let body = response.json();

    if !response.is_success() {
        let parsed = body
            .clone()
            .and_then(|b| serde_json::from_value::<TokenErrorBody>(b).ok());
        let (error, description) = match parsed {
            Some(p) => (p.error, p.error_description),
            None => (None, None),
        };
        warn!(
            grant_type,
            status = response.status,
            error = error.as_deref().unwrap_or("unknown"),
            "token endpoint rejected request"
        );
        return Err(Error::TokenEndpoint {
            status: response.status,
            error,
            description,
            body,
            body_raw: response.body,
        });
    }

    let raw = body.ok_or_else(|| {
        Error::InvalidTokenResponse(format!("{grant_type} response body is not JSON"))
    })?;
    let tokens: TokenResponse = serde_json::from_value(raw.clone())
        .map_err(|e| Error::InvalidTokenResponse(format!("{grant_type}: {e}")))?;

    debug!(grant_type, expires_in = ?tokens.expires_in, "token endpoint issued new tokens");
    Ok(TokenGrant { tokens, raw })
}
