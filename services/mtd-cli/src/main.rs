//! Making Tax Digital VAT command-line client
//!
//! Single-binary tool that:
//! 1. Loads application credentials and the stored token pair
//! 2. Runs one consent, token or VAT API command
//! 3. Persists rotated tokens whenever the access token is refreshed
//! 4. Prints the result as JSON (exit code 1 on error)

mod cli;
mod config;
mod error;
mod token_file;

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use mtd_auth::{
    ClientCredentials, CredentialStore, DEFAULT_REDIRECT_URI, Environment, TokenGrant, TokenPair,
    VAT_SCOPES, generate_state,
};
use mtd_client::{CallOutcome, Executor, VatClient, VatReturn};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{ReqwestTransport, Transport};

use crate::cli::{Args, Command};
use crate::config::Config;
use crate::token_file::TokenFile;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // JSON logs on stderr with LOG_LEVEL / RUST_LOG support; stdout carries results
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        environment = config.hmrc.environment.label(),
        base_url = config.hmrc.base_url(),
        auto_refresh = config.hmrc.auto_refresh,
        token_file = %config.hmrc.token_file.display(),
        "configuration loaded"
    );

    run(args, config).await
}

async fn run(args: Args, config: Config) -> Result<ExitCode> {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::default().with_timeout(config.hmrc.timeout()));

    let token_file = TokenFile::new(&config.hmrc.token_file);
    let tokens = token_file.load()?;
    let unsaved = UnsavedTokens::default();

    let client = ClientCredentials {
        client_id: config.credentials.client_id.clone(),
        client_secret: config.credentials.client_secret.clone(),
        server_token: config.credentials.server_token.clone(),
    };
    let store = Arc::new(
        CredentialStore::new(client, tokens, config.hmrc.base_url(), transport.clone())
            .with_rotation_callback(persist_rotated(token_file.clone(), unsaved.clone())),
    );

    match args.command {
        Command::AuthorizeUrl { state } => {
            let state = state.unwrap_or_else(generate_state);
            let url = store.authorization_url(VAT_SCOPES, &state, DEFAULT_REDIRECT_URI);
            print_json(&json!({ "url": url, "state": state }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Exchange { code } => {
            let result = store
                .exchange_authorization_code(&code, DEFAULT_REDIRECT_URI)
                .await;
            let (report, success) = grant_report(result, &token_file);
            finish(report, success, &unsaved)
        }
        Command::Refresh => {
            let result = store.exchange_refresh_token().await;
            let (report, success) = grant_report(result, &token_file);
            finish(report, success, &unsaved)
        }
        command => {
            let executor =
                Executor::new(store, transport).with_auto_refresh(config.hmrc.auto_refresh);
            let mut vat = VatClient::new(executor, config.hmrc.vrn.clone());
            if let Some(scenario) = args.scenario {
                if config.hmrc.environment == Environment::Production {
                    warn!("test scenarios are only honoured by the sandbox");
                }
                vat.set_test_scenario(scenario);
            }
            let outcome = run_vat_command(&mut vat, command).await?;
            finish(outcome.to_json(), outcome.is_success(), &unsaved)
        }
    }
}

async fn run_vat_command(vat: &mut VatClient, command: Command) -> Result<CallOutcome> {
    let outcome = match command {
        Command::Obligations { from, to, status } => vat.obligations(&from, &to, status).await?,
        Command::GetReturn { period_key } => vat.get_return(&period_key).await?,
        Command::SubmitReturn { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let vat_return: VatReturn = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a valid VAT return", file.display()))?;
            if !vat_return.finalised {
                warn!(period_key = %vat_return.period_key, "submitting a return that is not finalised");
            }
            vat.submit_return(&vat_return).await?
        }
        Command::Liabilities { from, to } => vat.liabilities(&from, &to).await?,
        Command::Payments { from, to } => vat.payments(&from, &to).await?,
        Command::CreateTestUser { services } => vat.create_test_user(&services).await?,
        Command::AuthorizeUrl { .. } | Command::Exchange { .. } | Command::Refresh => {
            anyhow::bail!("not a VAT API command")
        }
    };
    Ok(outcome)
}

/// Rotated pair that could not be written to the token file.
///
/// The old refresh token is already spent when this is set, so the pair
/// must reach the user some other way.
#[derive(Clone, Default)]
struct UnsavedTokens(Arc<Mutex<Option<(String, TokenPair)>>>);

impl UnsavedTokens {
    fn record(&self, error: String, tokens: TokenPair) {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some((error, tokens));
    }

    fn clear(&self) {
        self.take();
    }

    fn take(&self) -> Option<(String, TokenPair)> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Rotation callback writing each new pair to `token_file`. Failures are
/// kept in `unsaved` for `finish` to report.
fn persist_rotated(
    token_file: TokenFile,
    unsaved: UnsavedTokens,
) -> impl Fn(&TokenPair) + Send + Sync + 'static {
    move |tokens: &TokenPair| match token_file.save(tokens) {
        // A later successful save supersedes an earlier failure.
        Ok(()) => unsaved.clear(),
        Err(e) => {
            error!(error = %e, "failed to persist rotated tokens");
            unsaved.record(e.to_string(), tokens.clone());
        }
    }
}

/// Fold a token persistence failure into the report. Any failure turns the
/// run into an error and carries the unsaved pair so it is not lost.
fn with_persist_status(mut report: Value, success: bool, unsaved: &UnsavedTokens) -> (Value, bool) {
    match unsaved.take() {
        Some((error, tokens)) => {
            if let Some(object) = report.as_object_mut() {
                object.insert("token_persist_error".into(), Value::String(error));
                object.insert("unsaved_tokens".into(), json!(tokens));
            }
            (report, false)
        }
        None => (report, success),
    }
}

fn finish(report: Value, success: bool, unsaved: &UnsavedTokens) -> Result<ExitCode> {
    let (report, success) = with_persist_status(report, success, unsaved);
    print_json(&report)?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn grant_report(result: mtd_auth::Result<TokenGrant>, token_file: &TokenFile) -> (Value, bool) {
    match result {
        Ok(grant) => (
            json!({
                "status": "success",
                "token_type": grant.tokens.token_type,
                "scope": grant.tokens.scope,
                "expires_in": grant.tokens.expires_in,
                "token_file": token_file.path().display().to_string(),
            }),
            true,
        ),
        Err(e) => (
            json!({
                "status": "error",
                "status_code": e.status(),
                "error": e.to_string(),
                "body": e.body(),
                "body_raw": e.body_raw(),
            }),
            false,
        ),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
