//! HMRC API constants and environment selection
//!
//! Client id, secret and server token are issued per application and are
//! never compiled in; they arrive through `ClientCredentials`.

use serde::Deserialize;

/// Production API host
pub const PRODUCTION_BASE_URL: &str = "https://api.service.hmrc.gov.uk";

/// Sandbox API host used with Developer Hub test credentials
pub const SANDBOX_BASE_URL: &str = "https://test-api.service.hmrc.gov.uk";

/// Token endpoint path for code exchange and token refresh
pub const TOKEN_PATH: &str = "oauth/token";

/// User consent page path
pub const AUTHORIZE_PATH: &str = "oauth/authorize";

/// Out-of-band redirect URI. HMRC requires a redirect URI on code exchange
/// even when the code was copied by hand.
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Scopes needed to read obligations and submit VAT returns.
pub const VAT_SCOPES: &str = "read:vat write:vat";

/// Accept header pinning version 1.0 of the API.
pub const ACCEPT_HEADER: &str = "application/vnd.hmrc.1.0+json";

/// Sandbox-only header selecting a canned test scenario.
pub const GOV_TEST_SCENARIO_HEADER: &str = "Gov-Test-Scenario";

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    #[serde(alias = "live")]
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
