//! # fisc-api — HTTP Service for Fiscal Submission
//!
//! Axum application over [`fisc_engine::SubmissionEngine`].
//!
//! ## Middleware Stack
//!
//! ```text
//! TraceLayer → Auth → DefaultBodyLimit → Handler
//! ```
//!
//! `/health/liveness` and `/health/readiness` are outside the auth layer
//! so orchestrator probes need no token.

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Maximum request body size.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig::new(state.config.auth_token.clone());

    let api = Router::new()
        .merge(routes::documents::router())
        .merge(routes::operations::router())
        .merge(routes::configs::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state);

    let probes = Router::new()
        .route("/health/liveness", get(|| async { "ok" }))
        .route("/health/readiness", get(|| async { "ready" }));

    Router::new().merge(probes).merge(api)
}
