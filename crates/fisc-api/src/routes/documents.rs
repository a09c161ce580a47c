//! # Document Submission API
//!
//! - **POST `/v1/documents`**: register a draft document
//! - **GET `/v1/documents`**: list documents, optionally by `status`
//! - **GET `/v1/documents/:id`**: document status
//! - **POST `/v1/documents/:id/submit`**: submit to the authority
//! - **POST `/v1/documents/:id/retry`**: resend a retryable rejection
//! - **POST `/v1/documents/:id/abandon`**: give up on a rejected document
//! - **GET `/v1/documents/:id/receipt`**: receipt with QR and dash-grouped views
//! - **GET `/v1/documents/:id/attempts`**: attempt log
//!
//! Submission outcomes are returned with 200 whatever the authority said;
//! `status` and `retryable` distinguish accepted, rejected and permanently
//! rejected documents. Error statuses mean no outcome was produced.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fisc_core::{
    DocumentDraft, DocumentId, DocumentKind, DocumentSource, Receipt, SequenceNumber, Timestamp,
};
use fisc_engine::{FiscalDocument, SubmissionAttempt, SubmissionResult};
use fisc_state::SubmissionState;
use fisc_tax::MappingDiagnostic;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Document status as exposed over HTTP.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: DocumentId,
    pub reference: String,
    pub taxpayer: String,
    pub branch: String,
    pub kind: DocumentKind,
    pub source: DocumentSource,
    pub status: SubmissionState,
    pub retryable: bool,
    pub attempts: u32,
    pub sequence_number: Option<SequenceNumber>,
    /// Grand total in minor units, once mapped.
    pub total: Option<i64>,
    pub last_error: Option<String>,
    pub next_retry_at: Option<Timestamp>,
    /// Lines whose tax fell back to the default code.
    pub diagnostics: Vec<MappingDiagnostic>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<FiscalDocument> for DocumentResponse {
    fn from(doc: FiscalDocument) -> Self {
        Self {
            id: doc.id,
            reference: doc.draft.reference.clone(),
            taxpayer: doc.draft.taxpayer.to_string(),
            branch: doc.draft.branch.to_string(),
            kind: doc.draft.kind,
            source: doc.draft.source,
            status: doc.state(),
            retryable: doc.retryable(),
            attempts: doc.lifecycle.attempts,
            sequence_number: doc.sequence_number,
            total: doc.total(),
            last_error: doc.lifecycle.last_error.clone(),
            next_retry_at: doc.lifecycle.next_retry_at,
            diagnostics: doc.diagnostics().to_vec(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Receipt with the derived views printed on the fiscal document.
#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub qr_content: String,
    pub formatted_signature: String,
    pub formatted_internal_data: String,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            qr_content: receipt.qr_content(),
            formatted_signature: receipt.formatted_signature(),
            formatted_internal_data: receipt.formatted_internal_data(),
            receipt,
        }
    }
}

/// Query for `GET /v1/documents`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsQuery {
    pub status: Option<SubmissionState>,
}

/// Body of `POST /v1/documents/:id/abandon`.
#[derive(Debug, Deserialize)]
pub struct AbandonRequest {
    pub reason: String,
}

impl Validate for AbandonRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        if self.reason.len() > 500 {
            return Err("reason must not exceed 500 characters".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents", get(list_documents).post(create_document))
        .route("/v1/documents/:id", get(get_document))
        .route("/v1/documents/:id/submit", post(submit_document))
        .route("/v1/documents/:id/retry", post(retry_document))
        .route("/v1/documents/:id/abandon", post(abandon_document))
        .route("/v1/documents/:id/receipt", get(get_receipt))
        .route("/v1/documents/:id/attempts", get(list_attempts))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/documents: Register a draft. Lines are frozen from here on.
async fn create_document(
    State(state): State<AppState>,
    body: Result<Json<DocumentDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let draft = extract_json(body)?;
    let doc = state.engine.register_document(draft).await?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

/// GET /v1/documents
async fn list_documents(
    State(state): State<AppState>,
    query: Result<Query<ListDocumentsQuery>, QueryRejection>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let query = extract_query(query)?;
    let docs = state
        .engine
        .list_documents(query.status)
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    Ok(Json(docs))
}

/// GET /v1/documents/:id
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    let doc = state.engine.get_document(DocumentId::from_uuid(id))?;
    Ok(Json(doc.into()))
}

/// POST /v1/documents/:id/submit: Number, build and send the document.
///
/// An accepted document answers 409 `ALREADY_SUBMITTED` without contacting
/// the authority.
async fn submit_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionResult>, AppError> {
    let result = state.engine.submit(DocumentId::from_uuid(id)).await?;
    Ok(Json(result))
}

/// POST /v1/documents/:id/retry: Resend the frozen payload of a
/// retryable rejection. Ignores the sweep's retry budget.
async fn retry_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionResult>, AppError> {
    let result = state.engine.retry(DocumentId::from_uuid(id)).await?;
    Ok(Json(result))
}

/// POST /v1/documents/:id/abandon
async fn abandon_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AbandonRequest>, JsonRejection>,
) -> Result<Json<DocumentResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let doc = state
        .engine
        .abandon(DocumentId::from_uuid(id), &req.reason)
        .await?;
    Ok(Json(doc.into()))
}

/// GET /v1/documents/:id/receipt: 404 `RECEIPT_NOT_FOUND` until the
/// document is accepted.
async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReceiptResponse>, AppError> {
    let receipt = state.engine.get_receipt(DocumentId::from_uuid(id))?;
    Ok(Json(receipt.into()))
}

/// GET /v1/documents/:id/attempts
async fn list_attempts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionAttempt>>, AppError> {
    Ok(Json(state.engine.attempts(DocumentId::from_uuid(id))?))
}
