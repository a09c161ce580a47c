//! The engine's record of one fiscal document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fisc_core::{DocumentDraft, DocumentId, DocumentKind, SequenceNumber, Timestamp};
use fisc_payload::Payload;
use fisc_state::{SubmissionLifecycle, SubmissionState};
use fisc_tax::{MappedDocument, MappingDiagnostic};

/// A registered document and everything the engine has learned about it.
///
/// `mapped`, `sequence_number` and `payload` are each written once and
/// never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalDocument {
    /// Engine identifier.
    pub id: DocumentId,
    /// Source snapshot as registered.
    pub draft: DocumentDraft,
    /// Frozen tax mapping.
    pub mapped: Option<MappedDocument>,
    /// Authority sequence number.
    pub sequence_number: Option<SequenceNumber>,
    /// Frozen request body, resent verbatim on retry.
    pub payload: Option<Payload>,
    /// Configuration the payload was built for.
    pub config_id: Option<Uuid>,
    /// Submission state, retry flag, attempts and transition log.
    pub lifecycle: SubmissionLifecycle,
    /// Registration time.
    pub created_at: Timestamp,
    /// Last mutation.
    pub updated_at: Timestamp,
}

impl FiscalDocument {
    /// A new document in `Draft`.
    pub fn new(draft: DocumentDraft) -> Self {
        let now = Timestamp::now();
        Self {
            id: DocumentId::new(),
            draft,
            mapped: None,
            sequence_number: None,
            payload: None,
            config_id: None,
            lifecycle: SubmissionLifecycle::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Current state.
    pub fn state(&self) -> SubmissionState {
        self.lifecycle.state
    }

    /// Whether a rejection may be retried.
    pub fn retryable(&self) -> bool {
        self.lifecycle.retryable
    }

    /// Credit note?
    pub fn is_credit_note(&self) -> bool {
        self.draft.kind == DocumentKind::CreditNote
    }

    /// Lines that fell back to the default tax code.
    pub fn diagnostics(&self) -> &[MappingDiagnostic] {
        self.mapped
            .as_ref()
            .map_or(&[], |m| m.diagnostics.as_slice())
    }

    /// Whether every draft line has its mapped counterpart, in order.
    pub fn lines_frozen(&self) -> bool {
        self.mapped.as_ref().is_some_and(|m| {
            m.lines.len() == self.draft.lines.len()
                && m.lines
                    .iter()
                    .zip(&self.draft.lines)
                    .all(|(mapped, line)| mapped.line == *line)
        })
    }

    /// Grand total in minor units, once mapped.
    pub fn total(&self) -> Option<i64> {
        self.mapped.as_ref().map(|m| m.totals.total)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
