//! Errors raised while building authority payloads.

use thiserror::Error;

/// Payload building errors.
///
/// Every variant is raised before any network call. `Consistency` signals a
/// programming error: amounts that were computed once and frozen no longer
/// reconcile.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// Header totals do not equal the sum of line amounts.
    #[error("payload totals do not reconcile for {field}: expected {expected}, got {actual}")]
    Consistency {
        /// Field that failed the check.
        field: String,
        /// Sum of line amounts (minor units).
        expected: i64,
        /// Reported amount (minor units).
        actual: i64,
    },

    /// A credit note is missing its original's authority number.
    #[error("credit note {reference} has no original sequence number")]
    MissingOriginal {
        /// Internal reference of the credit note.
        reference: String,
    },

    /// A credit note is missing its reason.
    #[error("credit note {reference} has no reason")]
    MissingReason {
        /// Internal reference of the credit note.
        reference: String,
    },

    /// The document belongs to a different taxpayer, branch or authority than
    /// the configuration.
    #[error("document {field} \"{document}\" does not match configuration \"{config}\"")]
    ConfigMismatch {
        /// Mismatching field.
        field: String,
        /// Value on the document.
        document: String,
        /// Value on the configuration.
        config: String,
    },

    /// JSON serialization failure.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
