//! # Engine Errors
//!
//! Every way an engine operation can fail. Submission outcomes (accepted,
//! rejected, retryable) are not errors: they are reported on
//! [`crate::SubmissionResult`]. An `EngineError` means the operation did not
//! reach the authority, or could not be recorded. The one exception is
//! [`EngineError::InvalidCredentials`]: the request was sent, the attempt
//! is recorded and the document stays `rejected` and retryable, but the
//! fault lies with the configuration rather than the document.

use thiserror::Error;
use uuid::Uuid;

use fisc_client::ClientError;
use fisc_core::{DocumentId, ValidationError};
use fisc_payload::PayloadError;
use fisc_state::LifecycleError;
use fisc_tax::TaxError;

use crate::allocator::AllocationError;
use crate::receipts::ReceiptConflict;
use crate::registry::RegistryError;

/// Errors raised by the submission engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No document with this id.
    #[error("document {document_id} not found")]
    NotFound {
        /// The document.
        document_id: DocumentId,
    },

    /// The document has no receipt.
    #[error("no receipt recorded for document {document_id}")]
    ReceiptNotFound {
        /// The document.
        document_id: DocumentId,
    },

    /// The document was already accepted. No request was sent.
    #[error("document {document_id} was already accepted")]
    AlreadySubmitted {
        /// The document.
        document_id: DocumentId,
    },

    /// The document was permanently rejected.
    #[error("document {document_id} was permanently rejected")]
    AlreadyFinalized {
        /// The document.
        document_id: DocumentId,
    },

    /// A submission precondition does not hold.
    #[error("document {document_id} is not ready: {reason}")]
    NotReady {
        /// The document.
        document_id: DocumentId,
        /// The failed precondition.
        reason: String,
    },

    /// The authority refused the configuration's credentials. The document
    /// is held out of retry sweeps until the configuration passes a
    /// connection test.
    #[error("authority refused the credentials of configuration {config_id} ({code}): {message}")]
    InvalidCredentials {
        /// The document that was being submitted.
        document_id: DocumentId,
        /// The configuration whose credentials were refused.
        config_id: Uuid,
        /// Transport status, e.g. `HTTP 401`.
        code: String,
        /// Authority message, verbatim.
        message: String,
    },

    /// Structural validation failure of a draft.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Sequence allocation failure.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Tax mapping failure.
    #[error(transparent)]
    Tax(#[from] TaxError),

    /// Payload build failure, including totals that do not reconcile.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Illegal lifecycle transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A receipt already exists for the document.
    #[error(transparent)]
    ReceiptConflict(#[from] ReceiptConflict),

    /// Request construction or connection-test failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Persistence failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ReceiptNotFound { .. } => "RECEIPT_NOT_FOUND",
            Self::AlreadySubmitted { .. } => "ALREADY_SUBMITTED",
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::NotReady { .. } => "NOT_READY",
            Self::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Registry(RegistryError::NotConfigured { .. }) => "NOT_CONFIGURED",
            Self::Registry(RegistryError::UnknownConfig { .. }) => "NOT_FOUND",
            Self::Registry(RegistryError::AlreadyActive { .. }) => "CONFLICT",
            Self::Registry(RegistryError::Invalid(_)) => "INVALID_CONFIGURATION",
            Self::Allocation(AllocationError::Conflict { .. }) => "ALLOCATION_CONFLICT",
            Self::Allocation(_) => "ALLOCATION_ERROR",
            Self::Tax(_) => "TAX_MAPPING_ERROR",
            Self::Payload(PayloadError::Consistency { .. }) => "CONSISTENCY_ERROR",
            Self::Payload(_) => "PAYLOAD_ERROR",
            Self::Lifecycle(_) => "INVALID_TRANSITION",
            Self::ReceiptConflict(_) => "RECEIPT_CONFLICT",
            Self::Client(ClientError::InvalidCredentials { .. }) => "INVALID_CREDENTIALS",
            Self::Client(ClientError::ConnectionTest { .. }) => "CONNECTION_TEST_FAILED",
            Self::Client(_) => "CLIENT_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    pub(crate) fn not_ready(document_id: DocumentId, reason: impl Into<String>) -> Self {
        Self::NotReady {
            document_id,
            reason: reason.into(),
        }
    }
}
