//! Credential store for one API client
//!
//! Holds the application's static credentials (client id/secret, server
//! token) and the user's mutable access/refresh token pair. The pair is only
//! ever replaced as a whole, under a tokio Mutex, by a successful code
//! exchange or refresh. A second Mutex serializes refresh exchanges so two
//! callers never spend the same refresh token.
//!
//! Persistence is the caller's job: register a `RotationCallback` and it is
//! invoked with every new pair.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use transport::Transport;

use crate::authorize::build_authorization_url;
use crate::constants::{TOKEN_PATH, join_url};
use crate::error::{Error, Result};
use crate::token::{self, TokenGrant};

/// Which bearer credential a call presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialClass {
    /// No Authorization header
    None,
    /// User-delegated access token
    #[default]
    User,
    /// Application server token
    Server,
}

/// Per-application credentials issued by the Developer Hub.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub server_token: Secret<String>,
}

/// The user's access/refresh token pair.
///
/// Serializes as `{"access_token": "...", "refresh_token": "..."}`, the shape
/// token files are persisted in.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Notified with the new pair every time tokens are rotated.
///
/// Called after the token lock is released, in rotation order. A blocking
/// implementation stalls the task that triggered the rotation.
pub trait RotationCallback: Send + Sync {
    fn on_credentials_rotated(&self, tokens: &TokenPair);
}

impl<F> RotationCallback for F
where
    F: Fn(&TokenPair) + Send + Sync,
{
    fn on_credentials_rotated(&self, tokens: &TokenPair) {
        self(tokens)
    }
}

/// Thread-safe holder of one client's credentials.
pub struct CredentialStore {
    client: ClientCredentials,
    base_url: String,
    tokens: Mutex<TokenPair>,
    refresh_guard: Mutex<()>,
    notify_guard: Mutex<()>,
    on_rotate: Option<Arc<dyn RotationCallback>>,
    transport: Arc<dyn Transport>,
}

impl CredentialStore {
    /// Create a store for the API at `base_url`. `tokens` may be empty when
    /// the user has not granted access yet.
    pub fn new(
        client: ClientCredentials,
        tokens: TokenPair,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            tokens: Mutex::new(tokens),
            refresh_guard: Mutex::new(()),
            notify_guard: Mutex::new(()),
            on_rotate: None,
            transport,
        }
    }

    /// Register the callback invoked with every rotated token pair.
    pub fn with_rotation_callback(mut self, callback: impl RotationCallback + 'static) -> Self {
        self.on_rotate = Some(Arc::new(callback));
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Snapshot of the current token pair.
    pub async fn tokens(&self) -> TokenPair {
        self.tokens.lock().await.clone()
    }

    /// Bearer value for a credential class. `None` for `CredentialClass::None`.
    pub async fn bearer_for(&self, class: CredentialClass) -> Option<String> {
        match class {
            CredentialClass::None => None,
            CredentialClass::User => Some(self.tokens.lock().await.access_token.clone()),
            CredentialClass::Server => Some(self.client.server_token.expose().clone()),
        }
    }

    /// Replace both tokens at once and notify the rotation callback.
    ///
    /// Returns the pair now in effect.
    pub async fn rotate(&self, access_token: String, refresh_token: String) -> TokenPair {
        let mut tokens = self.tokens.lock().await;
        if tokens.access_token == access_token || tokens.refresh_token == refresh_token {
            warn!("token rotation reused a previous token value");
        }
        *tokens = TokenPair {
            access_token,
            refresh_token,
        };
        let rotated = tokens.clone();
        // Taken before the token lock is released so callbacks see pairs in order.
        let _notify = self.notify_guard.lock().await;
        drop(tokens);

        if let Some(callback) = &self.on_rotate {
            callback.on_credentials_rotated(&rotated);
        }
        info!(
            callback = self.on_rotate.is_some(),
            "credentials rotated"
        );
        rotated
    }

    /// Complete the consent flow: exchange an authorization code for tokens
    /// and rotate them into the store.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        let grant = token::exchange_code(
            self.transport.as_ref(),
            &self.token_url(),
            &self.client,
            code,
            redirect_uri,
        )
        .await?;
        self.rotate(
            grant.tokens.access_token.clone(),
            grant.tokens.refresh_token.clone(),
        )
        .await;
        Ok(grant)
    }

    /// Spend the current refresh token for a new pair and rotate it into the
    /// store.
    pub async fn exchange_refresh_token(&self) -> Result<TokenGrant> {
        let _guard = self.refresh_guard.lock().await;

        let refresh = self.tokens.lock().await.refresh_token.clone();
        if refresh.is_empty() {
            return Err(Error::MissingRefreshToken);
        }

        debug!("exchanging refresh token");
        let grant = token::refresh_token(
            self.transport.as_ref(),
            &self.token_url(),
            &self.client,
            &refresh,
        )
        .await?;
        self.rotate(
            grant.tokens.access_token.clone(),
            grant.tokens.refresh_token.clone(),
        )
        .await;
        Ok(grant)
    }

    /// Consent URI for this client.
    pub fn authorization_url(&self, scope: &str, state: &str, redirect_uri: &str) -> String {
        build_authorization_url(
            &self.base_url,
            &self.client.client_id,
            scope,
            state,
            redirect_uri,
        )
    }

    fn token_url(&self) -> String {
        join_url(&self.base_url, TOKEN_PATH)
    }
}
