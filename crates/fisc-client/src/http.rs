//! reqwest-backed [`Transport`].

use std::time::{Duration, Instant};

use fisc_core::FiscalConfig;

use crate::error::{ClientError, TransportError};
use crate::retry::retry_connect;
use crate::transport::{Method, Transport, TransportRequest, TransportResponse};

/// HTTP transport with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Transport using the configuration's timeout.
    pub fn for_config(config: &FiscalConfig) -> Result<Self, ClientError> {
        Self::new(config.timeout())
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn builder(&self, request: &TransportRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;
        tracing::debug!(method = request.method.as_str(), url = %request.url, "authority request");

        let resp = retry_connect(|| self.builder(&request).send())
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        endpoint: request.url.clone(),
                        elapsed_ms: elapsed_ms(),
                    }
                } else {
                    TransportError::Connection {
                        endpoint: request.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    endpoint: request.url.clone(),
                    elapsed_ms: elapsed_ms(),
                }
            } else {
                TransportError::Connection {
                    endpoint: request.url.clone(),
                    reason: format!("reading response body: {e}"),
                }
            }
        })?;

        let elapsed_ms = elapsed_ms();
        tracing::debug!(status, elapsed_ms, url = %request.url, "authority response");
        Ok(TransportResponse {
            status,
            body,
            elapsed_ms,
        })
    }
}
