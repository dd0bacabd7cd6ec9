//! User consent URI construction
//!
//! Builds the `oauth/authorize` URL the user visits to grant the application
//! access. No request is made here; the resulting authorization code comes
//! back through the redirect URI (or is pasted by hand with the out-of-band
//! redirect) and is exchanged with `CredentialStore::exchange_authorization_code`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use urlencoding::encode;

use crate::constants::{AUTHORIZE_PATH, join_url};

/// Generate a random opaque `state` value for CSRF protection.
///
/// 32 random bytes encoded as URL-safe base64 (no padding), 43 characters.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL with all required OAuth parameters.
///
/// `scope` is space separated (e.g. `read:vat write:vat`). The authorization
/// server returns `state` unchanged in the callback.
pub fn build_authorization_url(
    base_url: &str,
    client_id: &str,
    scope: &str,
    state: &str,
    redirect_uri: &str,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&scope={}&state={}&redirect_uri={}",
        join_url(base_url, AUTHORIZE_PATH),
        encode(client_id),
        encode(scope),
        encode(state),
        encode(redirect_uri),
    )
}
