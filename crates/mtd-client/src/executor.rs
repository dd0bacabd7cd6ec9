//! Request executor with refresh-once-and-retry
//!
//! One `execute` call sends the request, and when the API answers 401
//! `INVALID_CREDENTIALS` it spends the refresh token once and resends with
//! the new access token. A second rejection is final. The decision of what
//! to do after each response lives in the pure `next_step` so the state
//! machine can be tested without any I/O.

use std::sync::Arc;

use mtd_auth::{ACCEPT_HEADER, CredentialStore, GOV_TEST_SCENARIO_HEADER, TokenPair, join_url};
use tracing::{debug, info, instrument, warn};
use transport::{HeaderName, HeaderValue, HttpRequest, Method, RequestBody, Transport};
use uuid::Uuid;

use crate::classify::{ResponseClass, classify_response};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::metrics::{record_call, record_refresh};
use crate::outcome::CallOutcome;

/// What the executor does after classifying a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Terminal success.
    Succeed,
    /// Spend the refresh token and resend.
    Refresh,
    /// Terminal API error.
    Fail,
}

/// Transition function of the retry state machine.
///
/// `refreshed` is true once a refresh was attempted during the current
/// call; a call refreshes at most once.
pub fn next_step(class: ResponseClass, auto_refresh: bool, refreshed: bool) -> Step {
    match class {
        ResponseClass::Success => Step::Succeed,
        ResponseClass::InvalidCredentials if auto_refresh && !refreshed => Step::Refresh,
        ResponseClass::InvalidCredentials | ResponseClass::ApiError => Step::Fail,
    }
}

/// Sends `CallContext`s with the bearer credentials from a `CredentialStore`.
pub struct Executor {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    auto_refresh: bool,
}

impl Executor {
    /// Auto-refresh is on by default.
    pub fn new(credentials: Arc<CredentialStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials,
            transport,
            auto_refresh: true,
        }
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    /// Run one logical call to completion.
    ///
    /// `Err` only for configuration problems detected before anything is
    /// sent. Every other failure is reported in the returned outcome.
    #[instrument(
        skip_all,
        fields(
            call_id = %Uuid::new_v4(),
            endpoint = %context.endpoint(),
            method = %context.method(),
        )
    )]
    pub async fn execute(&self, context: &CallContext) -> Result<CallOutcome> {
        if context.endpoint().trim().is_empty() {
            return Err(Error::Configuration("call has no endpoint".into()));
        }

        let mut refreshed = false;
        let mut rotated: Option<TokenPair> = None;

        loop {
            let request = self.build_request(context).await?;
            debug!(transport = self.transport.id(), "sending request");

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "no response from API");
                    return Ok(finish(CallOutcome::transport_failure(&e, rotated)));
                }
            };

            let body = response.json();
            let class = classify_response(response.status, body.as_ref());
            debug!(status = response.status, ?class, "response received");

            match next_step(class, self.auto_refresh, refreshed) {
                Step::Succeed => {
                    return Ok(finish(CallOutcome::success(
                        response,
                        body,
                        context.captures_receipt(),
                        rotated,
                    )));
                }
                Step::Fail => {
                    warn!(status = response.status, "API call failed");
                    return Ok(finish(CallOutcome::api_error(response, body, rotated)));
                }
                Step::Refresh => {
                    refreshed = true;
                    info!("access token rejected, refreshing");
                    match self.credentials.exchange_refresh_token().await {
                        Ok(grant) => {
                            record_refresh(true);
                            rotated = Some(TokenPair::new(
                                grant.tokens.access_token,
                                grant.tokens.refresh_token,
                            ));
                        }
                        Err(e) => {
                            record_refresh(false);
                            warn!(error = %e, "token refresh failed");
                            return Ok(finish(CallOutcome::refresh_failure(&e)));
                        }
                    }
                }
            }
        }
    }

    async fn build_request(&self, context: &CallContext) -> Result<HttpRequest> {
        let url = join_url(self.credentials.base_url(), context.endpoint());
        let mut request = HttpRequest::new(context.method().clone(), url);
        request.query = context.query().to_vec();

        request
            .headers
            .insert("accept", HeaderValue::from_static(ACCEPT_HEADER));

        if let Some(bearer) = self.credentials.bearer_for(context.credential_class()).await {
            let mut value = HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|_| Error::Configuration("bearer token is not a valid header value".into()))?;
            value.set_sensitive(true);
            request.headers.insert("authorization", value);
        }

        if let Some(scenario) = context.test_scenario() {
            let value = HeaderValue::from_str(scenario).map_err(|_| {
                Error::Configuration(format!("invalid test scenario {scenario:?}"))
            })?;
            let name = HeaderName::from_bytes(GOV_TEST_SCENARIO_HEADER.as_bytes())
                .map_err(|e| Error::Configuration(e.to_string()))?;
            request.headers.insert(name, value);
        }

        if *context.method() != Method::GET {
            if let Some(body) = context.body() {
                request.body = RequestBody::Json(body.clone());
            }
        }

        Ok(request)
    }
}

fn finish(outcome: CallOutcome) -> CallOutcome {
    record_call(outcome.status);
    info!(
        status = outcome.status.label(),
        status_code = outcome.status_code,
        correlation_id = outcome.correlation_id.as_deref(),
        "call finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{CallError, CallStatus};
    use common::Secret;
    use mtd_auth::{ClientCredentials, CredentialClass};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use transport::{HttpResponse, StubTransport, TransportError};

    const BASE_URL: &str = "https://test-api.service.hmrc.gov.uk";
    const INVALID: &str =
        r#"{"code":"INVALID_CREDENTIALS","message":"Invalid Authentication information provided"}"#;
    const TOKENS: &str = r#"{"access_token":"at-2","refresh_token":"rt-2","expires_in":14400,"token_type":"bearer"}"#;

    fn client() -> ClientCredentials {
        ClientCredentials {
            client_id: "client-id".into(),
            client_secret: Secret::from("client-secret"),
            server_token: Secret::from("server-token"),
        }
    }

    fn setup(stub: &Arc<StubTransport>) -> Executor {
        let transport: Arc<dyn Transport> = stub.clone();
        let store = CredentialStore::new(
            client(),
            TokenPair::new("at-1", "rt-1"),
            BASE_URL,
            transport.clone(),
        );
        Executor::new(Arc::new(store), transport)
    }

    fn obligations() -> CallContext {
        CallContext::get("organisations/vat/123456789/obligations")
            .with_query("from", "2017-01-01")
            .with_query("to", "2017-12-31")
    }

    #[test]
    fn next_step_transitions() {
        use ResponseClass::*;
        assert_eq!(next_step(Success, true, false), Step::Succeed);
        assert_eq!(next_step(Success, true, true), Step::Succeed);
        assert_eq!(next_step(InvalidCredentials, true, false), Step::Refresh);
        assert_eq!(next_step(InvalidCredentials, true, true), Step::Fail);
        assert_eq!(next_step(InvalidCredentials, false, false), Step::Fail);
        assert_eq!(next_step(ApiError, true, false), Step::Fail);
    }

    #[tokio::test]
    async fn success_sends_expected_request() {
        let stub = Arc::new(StubTransport::new());
        stub.push(Ok(HttpResponse::new(200, r#"{"obligations":[]}"#)
            .with_header("X-CorrelationId", "corr-1")));
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.correlation_id.as_deref(), Some("corr-1"));
        assert!(outcome.rotated_credentials.is_none());

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url,
            "https://test-api.service.hmrc.gov.uk/organisations/vat/123456789/obligations"
        );
        assert_eq!(request.header_str("accept"), Some("application/vnd.hmrc.1.0+json"));
        assert_eq!(request.header_str("authorization"), Some("Bearer at-1"));
        assert_eq!(request.query_param("from"), Some("2017-01-01"));
        assert_eq!(request.query_param("to"), Some("2017-12-31"));
        assert!(request.header_str("gov-test-scenario").is_none());
        assert_eq!(request.body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn credential_class_none_sends_no_authorization() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, "{}");
        let executor = setup(&stub);

        let context = obligations().with_credential_class(CredentialClass::None);
        executor.execute(&context).await.unwrap();

        assert!(stub.requests()[0].header_str("authorization").is_none());
    }

    #[tokio::test]
    async fn server_class_uses_server_token() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(201, r#"{"userId":"u"}"#);
        let executor = setup(&stub);

        let context = CallContext::post(
            "create-test-user/organisations",
            json!({"serviceNames": ["mtd-vat"]}),
        )
        .with_credential_class(CredentialClass::Server);
        let outcome = executor.execute(&context).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Success);
        let request = &stub.requests()[0];
        assert_eq!(request.header_str("authorization"), Some("Bearer server-token"));
        assert_eq!(
            request.body,
            RequestBody::Json(json!({"serviceNames": ["mtd-vat"]}))
        );
    }

    #[tokio::test]
    async fn get_never_sends_body() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, "{}");
        let executor = setup(&stub);

        let context = obligations().with_body(json!({"ignored": true}));
        executor.execute(&context).await.unwrap();

        assert_eq!(stub.requests()[0].body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn scenario_header_sent_when_set() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, "{}");
        let executor = setup(&stub);

        let context = obligations().with_test_scenario("QUARTERLY_ONE_MET");
        executor.execute(&context).await.unwrap();

        assert_eq!(
            stub.requests()[0].header_str("Gov-Test-Scenario"),
            Some("QUARTERLY_ONE_MET")
        );
    }

    #[tokio::test]
    async fn empty_endpoint_is_configuration_error_without_sending() {
        let stub = Arc::new(StubTransport::new());
        let executor = setup(&stub);

        let err = executor.execute(&CallContext::default()).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(stub.sent(), 0);
    }

    #[tokio::test]
    async fn invalid_credentials_refreshes_once_and_retries() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID)
            .push_response(200, TOKENS)
            .push_response(200, r#"{"obligations":[]}"#);
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::SuccessWithRotatedCredentials);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.rotated_credentials, Some(TokenPair::new("at-2", "rt-2")));
        assert_eq!(stub.sent(), 3);
        assert_eq!(stub.sent_to("/oauth/token"), 1);
        assert_eq!(stub.sent_to("/obligations"), 2);

        let requests = stub.requests();
        assert_eq!(requests[1].form_field("grant_type"), Some("refresh_token"));
        assert_eq!(requests[1].form_field("refresh_token"), Some("rt-1"));
        assert_eq!(requests[2].header_str("authorization"), Some("Bearer at-2"));
        assert_eq!(
            executor.credentials().tokens().await,
            TokenPair::new("at-2", "rt-2")
        );
    }

    #[tokio::test]
    async fn rotation_callback_fires_once_with_new_pair() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID)
            .push_response(200, TOKENS)
            .push_response(200, "{}");

        let seen: Arc<StdMutex<Vec<TokenPair>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let transport: Arc<dyn Transport> = stub.clone();
        let store = CredentialStore::new(
            client(),
            TokenPair::new("at-1", "rt-1"),
            BASE_URL,
            transport.clone(),
        )
        .with_rotation_callback(move |tokens: &TokenPair| {
            sink.lock().unwrap().push(tokens.clone());
        });
        let executor = Executor::new(Arc::new(store), transport);

        executor.execute(&obligations()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0].access_token, "at-1");
        assert_ne!(seen[0].refresh_token, "rt-1");
        assert_eq!(seen[0], TokenPair::new("at-2", "rt-2"));
    }

    #[tokio::test]
    async fn second_invalid_credentials_is_final() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID)
            .push_response(200, TOKENS)
            .push_response(401, INVALID);
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.status_code, Some(401));
        assert_eq!(outcome.error_code(), Some("INVALID_CREDENTIALS"));
        assert!(outcome.rotated_credentials.is_some());
        assert_eq!(stub.sent_to("/oauth/token"), 1);
        assert_eq!(stub.sent(), 3);
    }

    #[tokio::test]
    async fn other_401_codes_do_not_refresh() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, r#"{"code":"MISSING_CREDENTIALS"}"#);
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(
            outcome.error,
            Some(CallError::Api {
                status: 401,
                code: Some("MISSING_CREDENTIALS".into())
            })
        );
        assert_eq!(stub.sent(), 1);
        assert_eq!(stub.sent_to("/oauth/token"), 0);
    }

    #[tokio::test]
    async fn auto_refresh_disabled_surfaces_invalid_credentials() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID);
        let executor = setup(&stub).with_auto_refresh(false);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.error_code(), Some("INVALID_CREDENTIALS"));
        assert_eq!(stub.sent(), 1);
    }

    #[tokio::test]
    async fn not_found_without_code_is_error_without_refresh() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(404, "");
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.status_code, Some(404));
        assert!(outcome.body.is_none());
        assert_eq!(
            outcome.error,
            Some(CallError::Api {
                status: 404,
                code: None
            })
        );
        assert_eq!(stub.sent(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_token_endpoint_status() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID).push_response(
            400,
            r#"{"error":"invalid_grant","error_description":"refresh token expired"}"#,
        );
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.status_code, Some(400));
        assert_eq!(outcome.body.as_ref().unwrap()["error"], "invalid_grant");
        assert_eq!(
            outcome.body_raw,
            r#"{"error":"invalid_grant","error_description":"refresh token expired"}"#
        );
        assert!(matches!(
            outcome.error,
            Some(CallError::Refresh {
                status: Some(400),
                ..
            })
        ));
        assert!(outcome.rotated_credentials.is_none());
        assert_eq!(stub.sent(), 2);
        assert_eq!(
            executor.credentials().tokens().await,
            TokenPair::new("at-1", "rt-1")
        );
    }

    #[tokio::test]
    async fn refresh_failure_keeps_non_json_body_verbatim() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID);
        stub.push(Ok(HttpResponse::new(503, "<html>Service Unavailable</html>")
            .with_header("content-type", "text/html")));
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.body_raw, "<html>Service Unavailable</html>");
        assert!(outcome.body.is_none());
        assert!(matches!(
            outcome.error,
            Some(CallError::Refresh {
                status: Some(503),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn transport_failure_has_no_status_and_no_retry() {
        let stub = Arc::new(StubTransport::new());
        stub.push_error(TransportError::Connect("connection refused".into()));
        let executor = setup(&stub);

        let outcome = executor.execute(&obligations()).await.unwrap();

        assert_eq!(outcome.status, CallStatus::Error);
        assert!(outcome.status_code.is_none());
        assert!(matches!(outcome.error, Some(CallError::Transport(_))));
        assert_eq!(stub.sent(), 1);
    }

    #[tokio::test]
    async fn authorization_code_then_call_uses_new_token() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, TOKENS).push_response(200, r#"{"payments":[]}"#);
        let transport: Arc<dyn Transport> = stub.clone();
        let store = Arc::new(CredentialStore::new(
            client(),
            TokenPair::default(),
            BASE_URL,
            transport.clone(),
        ));
        let executor = Executor::new(store.clone(), transport);

        store
            .exchange_authorization_code("auth-code", mtd_auth::DEFAULT_REDIRECT_URI)
            .await
            .unwrap();
        let outcome = executor
            .execute(&CallContext::get("organisations/vat/123456789/payments"))
            .await
            .unwrap();

        assert_eq!(outcome.status, CallStatus::Success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(
            stub.requests()[1].header_str("authorization"),
            Some("Bearer at-2")
        );
    }

    #[tokio::test]
    async fn reused_context_gets_fresh_outcomes() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(401, INVALID)
            .push_response(200, TOKENS)
            .push_response(200, r#"{"obligations":[]}"#)
            .push_response(500, r#"{"code":"SERVER_ERROR"}"#)
            .push_response(200, "");
        let executor = setup(&stub);
        let context = obligations();

        let first = executor.execute(&context).await.unwrap();
        assert_eq!(first.status, CallStatus::SuccessWithRotatedCredentials);

        let second = executor.execute(&context).await.unwrap();
        assert_eq!(second.status, CallStatus::Error);
        assert_eq!(second.status_code, Some(500));
        assert!(second.rotated_credentials.is_none());

        let third = executor.execute(&context).await.unwrap();
        assert_eq!(third.status, CallStatus::Success);
        assert!(third.body.is_none());
        assert!(third.error.is_none());
        assert!(third.receipt.is_none());
    }
}
