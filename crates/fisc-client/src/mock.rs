//! Scripted [`Transport`] for tests and dry runs.
//!
//! Responses are consumed in order. Once the script is exhausted the
//! fallback (if any) answers every request; otherwise the request fails
//! with a connection error. Every request is recorded.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::transport::{Transport, TransportRequest, TransportResponse};

type Scripted = Result<TransportResponse, TransportError>;

/// Transport answering from a script.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Empty script, no fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.script.lock().push_back(Ok(response(status, body.into())));
        self
    }

    /// Queue a JSON response.
    pub fn respond_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.respond(status, body.to_string())
    }

    /// Queue a transport failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Queue a timeout.
    pub fn time_out(&self) -> &Self {
        self.fail(TransportError::Timeout {
            endpoint: "mock".into(),
            elapsed_ms: 30_000,
        })
    }

    /// Answer with this JSON response once the script is exhausted.
    pub fn always_json(&self, status: u16, body: serde_json::Value) -> &Self {
        *self.fallback.lock() = Some(Ok(response(status, body.to_string())));
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next(&self, request: TransportRequest) -> Scripted {
        self.requests.lock().push(request.clone());
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted;
        }
        match self.fallback.lock().as_ref() {
            Some(scripted) => scripted.clone(),
            None => Err(TransportError::Connection {
                endpoint: request.url,
                reason: "no scripted response".into(),
            }),
        }
    }
}

fn response(status: u16, body: String) -> TransportResponse {
    TransportResponse {
        status,
        body,
        elapsed_ms: 1,
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.next(request)
    }
}
