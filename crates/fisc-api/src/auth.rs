//! # Authentication Middleware
//!
//! Bearer-token check on every `/v1` route. The expected token travels in
//! request extensions as [`AuthConfig`]; when it is `None`, authentication
//! is disabled (local development, simulated sandbox).

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{ErrorBody, ErrorDetail};

/// Auth configuration injected into request extensions.
///
/// The token is wiped on drop and redacted from `Debug`.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Zeroizing<String>>,
}

impl AuthConfig {
    /// Require `token` on every request. A blank token disables auth.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(Zeroizing::new),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time comparison of bearer tokens. A length mismatch still
/// performs one comparison before returning.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Reject requests without a valid `Authorization: Bearer` header.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(provided) if constant_time_token_eq(provided, expected.as_str()) => {
                next.run(request).await
            }
            Some(_) => {
                tracing::warn!("authentication failed: invalid bearer token");
                unauthorized_response("invalid bearer token")
            }
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
