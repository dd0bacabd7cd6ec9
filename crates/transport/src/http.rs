//! reqwest-backed transport
//!
//! Maps `HttpRequest` onto a `reqwest::Client` call and reads the whole
//! response body. Error statuses are returned as responses; only failures
//! without a response become `TransportError`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{HttpRequest, HttpResponse, RequestBody, Result, Transport, TransportError};

/// Production transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Apply a per-request timeout to every call made through this transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), &request.url)
                .headers(request.headers);

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }

            builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(&value),
                RequestBody::Form(fields) => builder.form(&fields),
            };

            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await.map_err(map_send_error)?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(|e| {
                warn!(status, error = %e, "failed to read response body");
                TransportError::Body(e.to_string())
            })?;

            debug!(method = %request.method, url = %request.url, status, "response received");

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}
