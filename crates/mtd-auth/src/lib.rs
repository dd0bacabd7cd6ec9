//! OAuth credentials for the HMRC Making Tax Digital API
//!
//! Provides the credential store the request executor reads bearer tokens
//! from, the token endpoint exchanges that rotate them, and the consent URI
//! builder. Usable on its own, with no dependency on the executor.
//!
//! Credential flow:
//! 1. Caller builds the consent URI with `CredentialStore::authorization_url()`
//! 2. User grants access and returns an authorization code
//! 3. `CredentialStore::exchange_authorization_code()` obtains the first pair
//! 4. The executor calls `CredentialStore::exchange_refresh_token()` when the
//!    API answers 401 INVALID_CREDENTIALS
//! 5. Every new pair is handed to the caller's `RotationCallback` for storage

pub mod authorize;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use authorize::{build_authorization_url, generate_state};
pub use constants::*;
pub use credentials::{
    ClientCredentials, CredentialClass, CredentialStore, RotationCallback, TokenPair,
};
pub use error::{Error, Result};
pub use token::{TokenGrant, TokenResponse, exchange_code, refresh_token};
