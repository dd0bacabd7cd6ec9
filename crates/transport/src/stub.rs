//! Scripted transport for tests
//!
//! Responses are queued up front and handed out in order; every request is
//! recorded so tests can count sends and inspect headers, query and body.
//! Running out of scripted responses yields a `TransportError::Request`.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::{HttpRequest, HttpResponse, Result, Transport, TransportError};

#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn push_response(&self, status: u16, body: &str) -> &Self {
        self.push(Ok(HttpResponse::new(status, body)))
    }

    /// Queue a fully built response (e.g. with headers).
    pub fn push(&self, response: Result<HttpResponse>) -> &Self {
        lock(&self.responses).push_back(response);
        self
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    /// Snapshot of every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Total number of requests sent.
    pub fn sent(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests whose URL ends with `suffix`.
    pub fn sent_to(&self, suffix: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

/// Poisoning only happens if a test panicked mid-send; keep going with the data.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Transport for StubTransport {
    fn id(&self) -> &str {
        "stub"
    }

    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        let url = request.url.clone();
        lock(&self.requests).push(request);
        let next = lock(&self.responses).pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| {
                Err(TransportError::Request(format!(
                    "stub transport has no scripted response for {url}"
                )))
            })
        })
    }
}
