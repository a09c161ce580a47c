//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. The engine owns every store; handlers only
//! call engine operations and shape the responses.

use std::sync::Arc;

use fisc_client::AnyTransport;
use fisc_engine::SubmissionEngine;

/// Server configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<SubmissionEngine<AnyTransport>>,
    pub config: AppConfig,
}

impl AppState {
    /// State over `engine` with default configuration.
    pub fn new(engine: SubmissionEngine<AnyTransport>) -> Self {
        Self::with_config(engine, AppConfig::default())
    }

    /// State over `engine` with explicit configuration.
    pub fn with_config(engine: SubmissionEngine<AnyTransport>, config: AppConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
        }
    }
}
