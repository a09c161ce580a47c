//! # Transport Seam
//!
//! The engine never talks to `reqwest` directly. It hands a fully built
//! [`TransportRequest`] to a [`Transport`] and gets back either the raw
//! [`TransportResponse`] or a [`TransportError`]. Interpretation of the
//! response belongs to [`crate::authority::classify`].
//!
//! [`AnyTransport`] selects an implementation at runtime from configuration
//! while keeping the engine generic over a single concrete type.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::http::HttpTransport;
use crate::mock::MockTransport;
use crate::simulated::SimulatedTransport;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully built outbound request.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs, in send order.
    pub headers: Vec<(String, String)>,
    /// Request body, sent verbatim.
    pub body: Option<String>,
}

impl TransportRequest {
    /// A `POST` with a JSON body.
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body.into()),
        }
    }

    /// A `GET` without a body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values carry credentials.
impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &names)
            .field("body_len", &self.body.as_ref().map(String::len))
            .finish()
    }
}

/// Raw authority response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
    /// Round-trip time.
    pub elapsed_ms: u64,
}

impl TransportResponse {
    /// The body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What happened on the wire, as recorded on a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// A response was received.
    Delivered {
        /// HTTP status code.
        http_status: u16,
    },
    /// No response before the timeout.
    Timeout,
    /// The connection failed.
    ConnectionError,
}

impl Delivery {
    /// Delivery outcome of a transport result.
    pub fn of(result: &Result<TransportResponse, TransportError>) -> Self {
        match result {
            Ok(resp) => Self::Delivered {
                http_status: resp.status,
            },
            Err(TransportError::Timeout { .. }) => Self::Timeout,
            Err(TransportError::Connection { .. }) => Self::ConnectionError,
        }
    }
}

/// Sends requests to an authority.
///
/// Implementations must not retry a request that may have reached the
/// authority; the engine owns retry policy.
pub trait Transport: Send + Sync {
    /// Send one request.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// Runtime-selected transport.
#[derive(Debug)]
pub enum AnyTransport {
    /// Real HTTP.
    Http(HttpTransport),
    /// Offline sandbox simulation.
    Simulated(SimulatedTransport),
    /// Scripted responses (tests and dry runs).
    Mock(MockTransport),
}

impl Transport for AnyTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        match self {
            Self::Http(t) => t.send(request).await,
            Self::Simulated(t) => t.send(request).await,
            Self::Mock(t) => t.send(request).await,
        }
    }
}

impl From<HttpTransport> for AnyTransport {
    fn from(t: HttpTransport) -> Self {
        Self::Http(t)
    }
}

impl From<SimulatedTransport> for AnyTransport {
    fn from(t: SimulatedTransport) -> Self {
        Self::Simulated(t)
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(t: MockTransport) -> Self {
        Self::Mock(t)
    }
}
