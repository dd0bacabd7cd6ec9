//! VAT endpoint call builders and a thin client over the executor
//!
//! The builders are pure: each returns the `CallContext` for one VAT API
//! operation. `VatClient` binds them to a VAT registration number and an
//! `Executor`, and holds a sandbox test scenario that applies to the next
//! call only.

use mtd_auth::CredentialClass;
use serde_json::json;
use tracing::debug;
use urlencoding::encode;

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::outcome::CallOutcome;
use crate::types::{ObligationStatus, VatReturn};

/// Service enrolled for sandbox test users when none are given.
pub const DEFAULT_TEST_USER_SERVICE: &str = "mtd-vat";

const CREATE_TEST_USER_PATH: &str = "create-test-user/organisations";

fn vat_path(vrn: &str, resource: &str) -> String {
    format!("organisations/vat/{}/{resource}", encode(vrn))
}

fn dated(endpoint: String, from: &str, to: &str) -> CallContext {
    CallContext::get(endpoint)
        .with_query("from", from)
        .with_query("to", to)
}

/// `GET organisations/vat/{vrn}/obligations?from=&to=[&status=]`
pub fn obligations(vrn: &str, from: &str, to: &str, status: Option<ObligationStatus>) -> CallContext {
    let context = dated(vat_path(vrn, "obligations"), from, to);
    match status {
        Some(status) => context.with_query("status", status.as_str()),
        None => context,
    }
}

/// `GET organisations/vat/{vrn}/returns/{periodKey}`
pub fn get_return(vrn: &str, period_key: &str) -> CallContext {
    CallContext::get(vat_path(vrn, &format!("returns/{}", encode(period_key))))
}

/// `POST organisations/vat/{vrn}/returns` with the return as JSON.
///
/// Marked as a submission so the receipt headers are captured.
pub fn submit_return(vrn: &str, vat_return: &VatReturn) -> Result<CallContext> {
    let body =
        serde_json::to_value(vat_return).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(CallContext::post(vat_path(vrn, "returns"), body).with_receipt())
}

/// `GET organisations/vat/{vrn}/liabilities?from=&to=`
pub fn liabilities(vrn: &str, from: &str, to: &str) -> CallContext {
    dated(vat_path(vrn, "liabilities"), from, to)
}

/// `GET organisations/vat/{vrn}/payments?from=&to=`
pub fn payments(vrn: &str, from: &str, to: &str) -> CallContext {
    dated(vat_path(vrn, "payments"), from, to)
}

/// `POST create-test-user/organisations` (sandbox only, server token).
///
/// An empty service list enrols the organisation for `mtd-vat`.
pub fn create_test_user(services: &[String]) -> CallContext {
    let services: Vec<&str> = if services.is_empty() {
        vec![DEFAULT_TEST_USER_SERVICE]
    } else {
        services.iter().map(String::as_str).collect()
    };
    CallContext::post(CREATE_TEST_USER_PATH, json!({ "serviceNames": services }))
        .with_credential_class(CredentialClass::Server)
}

/// VAT operations for one VAT registration number.
pub struct VatClient {
    executor: Executor,
    vrn: String,
    test_scenario: Option<String>,
}

impl VatClient {
    pub fn new(executor: Executor, vrn: impl Into<String>) -> Self {
        Self {
            executor,
            vrn: vrn.into(),
            test_scenario: None,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn vrn(&self) -> &str {
        &self.vrn
    }

    /// Sandbox scenario sent with the next call, then cleared.
    pub fn set_test_scenario(&mut self, scenario: impl Into<String>) {
        self.test_scenario = Some(scenario.into());
    }

    pub fn test_scenario(&self) -> Option<&str> {
        self.test_scenario.as_deref()
    }

    pub async fn obligations(
        &mut self,
        from: &str,
        to: &str,
        status: Option<ObligationStatus>,
    ) -> Result<CallOutcome> {
        let context = obligations(self.require_vrn()?, from, to, status);
        self.run(context).await
    }

    pub async fn get_return(&mut self, period_key: &str) -> Result<CallOutcome> {
        if period_key.trim().is_empty() {
            return Err(Error::Configuration("period key is empty".into()));
        }
        let context = get_return(self.require_vrn()?, period_key);
        self.run(context).await
    }

    pub async fn submit_return(&mut self, vat_return: &VatReturn) -> Result<CallOutcome> {
        let context = submit_return(self.require_vrn()?, vat_return)?;
        self.run(context).await
    }

    pub async fn liabilities(&mut self, from: &str, to: &str) -> Result<CallOutcome> {
        let context = liabilities(self.require_vrn()?, from, to);
        self.run(context).await
    }

    pub async fn payments(&mut self, from: &str, to: &str) -> Result<CallOutcome> {
        let context = payments(self.require_vrn()?, from, to);
        self.run(context).await
    }

    pub async fn create_test_user(&mut self, services: &[String]) -> Result<CallOutcome> {
        self.run(create_test_user(services)).await
    }

    fn require_vrn(&self) -> Result<&str> {
        let vrn = self.vrn.trim();
        if vrn.is_empty() {
            return Err(Error::Configuration("VAT registration number is not set".into()));
        }
        Ok(vrn)
    }

    async fn run(&mut self, mut context: CallContext) -> Result<CallOutcome> {
        if let Some(scenario) = self.test_scenario.take() {
            debug!(%scenario, "applying sandbox test scenario");
            context.set_test_scenario(Some(scenario));
        }
        self.executor.execute(&context).await
    }
}
