//! The prepared input and the built output of a payload builder.

use serde::{Deserialize, Serialize};

use fisc_core::{Authority, DocumentDraft, DocumentId, PayloadDigest, SequenceNumber};
use fisc_tax::MappedDocument;

/// Everything a builder needs: the draft, its frozen tax mapping, the
/// reserved sequence number, and for credit notes the original's number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedDocument {
    /// Engine identifier of the document.
    pub document_id: DocumentId,
    /// Source snapshot.
    pub draft: DocumentDraft,
    /// Frozen tax mapping.
    pub mapped: MappedDocument,
    /// Reserved authority sequence number.
    pub sequence_number: SequenceNumber,
    /// Authority sequence number of the original sale (credit notes only).
    pub original_sequence: Option<SequenceNumber>,
}

/// The exact request body for one authority call, and its digest.
///
/// Built once, then resent verbatim on every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Target authority.
    pub authority: Authority,
    /// Sequence number carried in the body.
    pub sequence_number: SequenceNumber,
    /// Request body bytes (UTF-8 JSON).
    pub body: String,
    /// SHA-256 of `body`.
    pub digest: PayloadDigest,
}

impl Payload {
    /// Wrap a serialized body and digest it.
    pub fn new(authority: Authority, sequence_number: SequenceNumber, body: String) -> Self {
        let digest = PayloadDigest::of(body.as_bytes());
        Self {
            authority,
            sequence_number,
            body,
            digest,
        }
    }

    /// Whether the stored digest still matches the body.
    pub fn verify(&self) -> bool {
        self.digest.matches(self.body.as_bytes())
    }

    /// The body parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
