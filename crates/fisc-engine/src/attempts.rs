//! # Submission Attempt Log
//!
//! Append-only record of every outbound submission, hash-chained so that
//! tampering with or dropping an attempt is detectable:
//!
//! ```text
//! attempt_hash = SHA-256(previous_hash || document_id || attempt_number
//!                        || payload_digest || classification || attempted_at)
//! ```
//!
//! The chain starts from [`GENESIS_HASH`] and runs across all documents in
//! append order. Attempts are never mutated or deleted, including after
//! the owning document reaches a terminal state.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fisc_client::Delivery;
use fisc_core::{sha256_hex, DocumentId, PayloadDigest, Timestamp};

/// Hash preceding the first attempt.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One outbound submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    /// Attempt identifier.
    pub id: Uuid,
    /// Owning document.
    pub document_id: DocumentId,
    /// 1-based attempt number for this document.
    pub attempt_number: u32,
    /// When the request was sent.
    pub attempted_at: Timestamp,
    /// SHA-256 of the request body.
    pub payload_digest: PayloadDigest,
    /// What happened on the wire.
    pub delivery: Delivery,
    /// Authority result code.
    pub result_code: Option<String>,
    /// Authority message.
    pub message: Option<String>,
    /// `accepted`, `rejected` or `transient`.
    pub classification: String,
    /// Round-trip time.
    pub duration_ms: u64,
    /// Hash of the preceding attempt in the log.
    pub previous_hash: String,
    /// Hash of this attempt.
    pub attempt_hash: String,
}

/// An attempt before it is linked into the chain.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    /// Owning document.
    pub document_id: DocumentId,
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// When the request was sent.
    pub attempted_at: Timestamp,
    /// SHA-256 of the request body.
    pub payload_digest: PayloadDigest,
    /// What happened on the wire.
    pub delivery: Delivery,
    /// Authority result code.
    pub result_code: Option<String>,
    /// Authority message.
    pub message: Option<String>,
    /// Classification label.
    pub classification: String,
    /// Round-trip time.
    pub duration_ms: u64,
}

/// Chain link hash.
pub fn attempt_hash(previous_hash: &str, attempt: &NewAttempt) -> String {
    sha256_hex(format!(
        "{}{}{}{}{}{}",
        previous_hash,
        attempt.document_id,
        attempt.attempt_number,
        attempt.payload_digest.as_str(),
        attempt.classification,
        attempt.attempted_at.to_canonical_string(),
    ))
}

/// Result of verifying the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIntegrity {
    /// Attempts checked.
    pub total_attempts: usize,
    /// Links whose `previous_hash` or `attempt_hash` do not match.
    pub broken_links: usize,
    /// `broken_links == 0`.
    pub chain_valid: bool,
}

#[derive(Debug)]
struct LogState {
    head: String,
    order: Vec<(DocumentId, usize)>,
    by_document: HashMap<DocumentId, Vec<SubmissionAttempt>>,
}

/// In-memory attempt log.
#[derive(Debug)]
pub struct AttemptLog {
    state: Mutex<LogState>,
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptLog {
    /// Empty log starting at the genesis hash.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                head: GENESIS_HASH.to_string(),
                order: Vec::new(),
                by_document: HashMap::new(),
            }),
        }
    }

    /// Link and append an attempt.
    pub fn append(&self, attempt: NewAttempt) -> SubmissionAttempt {
        let mut state = self.state.lock();
        let previous_hash = state.head.clone();
        let hash = attempt_hash(&previous_hash, &attempt);
        let record = SubmissionAttempt {
            id: Uuid::new_v4(),
            document_id: attempt.document_id,
            attempt_number: attempt.attempt_number,
            attempted_at: attempt.attempted_at,
            payload_digest: attempt.payload_digest,
            delivery: attempt.delivery,
            result_code: attempt.result_code,
            message: attempt.message,
            classification: attempt.classification,
            duration_ms: attempt.duration_ms,
            previous_hash,
            attempt_hash: hash.clone(),
        };
        state.head = hash;
        let entries = state.by_document.entry(record.document_id).or_default();
        entries.push(record.clone());
        let index = entries.len() - 1;
        state.order.push((record.document_id, index));
        record
    }

    /// Restore previously persisted attempts, in chain order.
    pub fn restore(&self, attempts: Vec<SubmissionAttempt>) {
        let mut state = self.state.lock();
        for record in attempts {
            state.head = record.attempt_hash.clone();
            let entries = state.by_document.entry(record.document_id).or_default();
            entries.push(record.clone());
            let index = entries.len() - 1;
            state.order.push((record.document_id, index));
        }
    }

    /// Attempts for one document, oldest first.
    pub fn for_document(&self, id: &DocumentId) -> Vec<SubmissionAttempt> {
        self.state
            .lock()
            .by_document
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Hash of the most recent attempt.
    pub fn head(&self) -> String {
        self.state.lock().head.clone()
    }

    /// Recompute every link in append order.
    pub fn verify(&self) -> ChainIntegrity {
        let state = self.state.lock();
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut broken_links = 0;
        for (doc, index) in &state.order {
            let Some(a) = state.by_document.get(doc).and_then(|v| v.get(*index)) else {
                broken_links += 1;
                continue;
            };
            let recomputed = attempt_hash(
                &a.previous_hash,
                &NewAttempt {
                    document_id: a.document_id,
                    attempt_number: a.attempt_number,
                    attempted_at: a.attempted_at,
                    payload_digest: a.payload_digest.clone(),
                    delivery: a.delivery,
                    result_code: a.result_code.clone(),
                    message: a.message.clone(),
                    classification: a.classification.clone(),
                    duration_ms: a.duration_ms,
                },
            );
            if a.previous_hash != expected_prev || a.attempt_hash != recomputed {
                broken_links += 1;
            }
            expected_prev = a.attempt_hash.clone();
        }
        ChainIntegrity {
            total_attempts: state.order.len(),
            broken_links,
            chain_valid: broken_links == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(doc: DocumentId, n: u32, class: &str) -> NewAttempt {
        NewAttempt {
            document_id: doc,
            attempt_number: n,
            attempted_at: Timestamp::now(),
            payload_digest: PayloadDigest::of(b"{}"),
            delivery: Delivery::Timeout,
            result_code: None,
            message: Some("timed out".into()),
            classification: class.into(),
            duration_ms: 30_000,
        }
    }

    #[test]
    fn chain_links_across_documents() {
        let log = AttemptLog::new();
        let (a, b) = (DocumentId::new(), DocumentId::new());
        let first = log.append(attempt(a, 1, "transient"));
        let second = log.append(attempt(b, 1, "accepted"));
        let third = log.append(attempt(a, 2, "accepted"));
        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.attempt_hash);
        assert_eq!(third.previous_hash, second.attempt_hash);
        assert_eq!(log.head(), third.attempt_hash);
        assert_eq!(log.for_document(&a).len(), 2);
        assert!(log.verify().chain_valid);
    }

    #[test]
    fn restore_continues_the_chain() {
        let log = AttemptLog::new();
        let doc = DocumentId::new();
        let a = log.append(attempt(doc, 1, "transient"));

        let reloaded = AttemptLog::new();
        reloaded.restore(vec![a.clone()]);
        let b = reloaded.append(attempt(doc, 2, "accepted"));
        assert_eq!(b.previous_hash, a.attempt_hash);
        assert_eq!(reloaded.verify().total_attempts, 2);
        assert!(reloaded.verify().chain_valid);
    }

    #[test]
    fn tampering_breaks_the_chain() {
        let log = AttemptLog::new();
        let doc = DocumentId::new();
        log.append(attempt(doc, 1, "transient"));
        let mut records = log.for_document(&doc);
        records[0].classification = "accepted".into();

        let forged = AttemptLog::new();
        forged.restore(records);
        assert!(!forged.verify().chain_valid);
    }
}
