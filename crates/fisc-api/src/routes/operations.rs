//! # Operational Endpoints
//!
//! - **POST `/v1/batches/submit`**: submit many documents, continuing past failures
//! - **POST `/v1/sweep`**: recover interrupted submissions and retry due rejections
//! - **GET `/v1/attempts/integrity`**: verify the attempt hash chain
//! - **POST `/v1/sequences/floor`**: register numbers issued outside the engine
//! - **GET `/v1/sequences/:taxpayer/:branch`**: highest number issued in a scope

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use fisc_core::{BranchId, DocumentId, SequenceScope, TaxpayerId, Timestamp};
use fisc_engine::{BatchSummary, ChainIntegrity, SweepReport};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

/// Most documents accepted in one batch request.
pub const MAX_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/batches/submit`.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub document_ids: Vec<DocumentId>,
}

impl Validate for BatchRequest {
    fn validate(&self) -> Result<(), String> {
        if self.document_ids.is_empty() {
            return Err("document_ids must not be empty".to_string());
        }
        if self.document_ids.len() > MAX_BATCH_SIZE {
            return Err(format!(
                "document_ids must not exceed {MAX_BATCH_SIZE} entries"
            ));
        }
        Ok(())
    }
}

/// Body of `POST /v1/sequences/floor`.
#[derive(Debug, Deserialize)]
pub struct SeedFloorRequest {
    pub taxpayer: String,
    pub branch: String,
    /// Last number the authority already holds for the scope.
    pub last_issued: u64,
}

/// Sequence position of a scope.
#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceResponse {
    pub scope: String,
    pub current: u64,
}

fn scope(taxpayer: String, branch: String) -> Result<SequenceScope, AppError> {
    Ok(SequenceScope::new(
        TaxpayerId::new(taxpayer)?,
        BranchId::new(branch)?,
    ))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the operations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/batches/submit", post(submit_batch))
        .route("/v1/sweep", post(sweep))
        .route("/v1/attempts/integrity", get(attempt_integrity))
        .route("/v1/sequences/floor", post(seed_floor))
        .route("/v1/sequences/:taxpayer/:branch", get(current_sequence))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/batches/submit: One result per id, in request order.
///
/// Already-accepted documents count as `skipped`.
async fn submit_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchSummary>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.engine.submit_batch(&req.document_ids).await))
}

/// POST /v1/sweep
async fn sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.engine.sweep_retryable(Timestamp::now()).await)
}

/// GET /v1/attempts/integrity
async fn attempt_integrity(State(state): State<AppState>) -> Json<ChainIntegrity> {
    Json(state.engine.verify_attempt_chain())
}

/// POST /v1/sequences/floor: The floor only ever moves up.
async fn seed_floor(
    State(state): State<AppState>,
    body: Result<Json<SeedFloorRequest>, JsonRejection>,
) -> Result<Json<SequenceResponse>, AppError> {
    let req = extract_json(body)?;
    let scope = scope(req.taxpayer, req.branch)?;
    state.engine.seed_floor(&scope, req.last_issued).await?;
    let current = state.engine.current_sequence(&scope).await?;
    Ok(Json(SequenceResponse {
        scope: scope.to_string(),
        current,
    }))
}

/// GET /v1/sequences/:taxpayer/:branch
async fn current_sequence(
    State(state): State<AppState>,
    Path((taxpayer, branch)): Path<(String, String)>,
) -> Result<Json<SequenceResponse>, AppError> {
    let scope = scope(taxpayer, branch)?;
    let current = state.engine.current_sequence(&scope).await?;
    Ok(Json(SequenceResponse {
        scope: scope.to_string(),
        current,
    }))
}
