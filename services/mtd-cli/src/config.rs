//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The client secret and server token are loaded from CLIENT_SECRET /
//! SERVER_TOKEN or from the files named in `[credentials]`, never stored in
//! the TOML directly to avoid leaking secrets.

use common::Secret;
use mtd_auth::Environment;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hmrc: HmrcConfig,
    pub credentials: CredentialsConfig,
}

/// API endpoint and behaviour settings
#[derive(Debug, Deserialize)]
pub struct HmrcConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's base URL (local mocks)
    #[serde(default)]
    pub base_url: Option<String>,
    /// VAT registration number the VAT subcommands act on
    #[serde(default)]
    pub vrn: String,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for HmrcConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            vrn: String::new(),
            auto_refresh: default_auto_refresh(),
            timeout_secs: default_timeout(),
            token_file: default_token_file(),
        }
    }
}

/// Application credentials from the Developer Hub
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Secret<String>,
    #[serde(skip)]
    pub server_token: Secret<String>,
    /// Path to a file containing the client secret (alternative to CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Path to a file containing the server token (alternative to SERVER_TOKEN)
    #[serde(default)]
    pub server_token_file: Option<PathBuf>,
}

fn default_auto_refresh() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_token_file() -> PathBuf {
    PathBuf::from("mtd-tokens.json")
}

impl HmrcConfig {
    /// Configured override, or the environment's API host.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, per secret:
    /// 1. CLIENT_SECRET / SERVER_TOKEN env var
    /// 2. client_secret_file / server_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            config.credentials.client_id = client_id;
        }
        if let Ok(vrn) = std::env::var("VAT_REGISTRATION_NUMBER") {
            config.hmrc.vrn = vrn;
        }

        config.credentials.client_secret = resolve_secret(
            "CLIENT_SECRET",
            config.credentials.client_secret_file.as_deref(),
        )?;
        config.credentials.server_token = resolve_secret(
            "SERVER_TOKEN",
            config.credentials.server_token_file.as_deref(),
        )?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if let Some(base_url) = &self.hmrc.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "base_url must start with http:// or https://, got: {base_url}"
                )));
            }
        }

        if self.hmrc.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.credentials.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "client_id must be set in [credentials] or CLIENT_ID".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("mtd-vat.toml")
    }
}

/// Env var wins over file; a missing secret is empty, not an error, since
/// not every subcommand needs both.
fn resolve_secret(env_var: &str, file: Option<&Path>) -> common::Result<Secret<String>> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(Secret::new(value));
    }
    let Some(file) = file else {
        return Ok(Secret::new(String::new()));
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    Ok(Secret::new(value.trim().to_owned()))
}
