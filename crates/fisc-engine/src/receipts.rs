//! Write-once receipt store.

use fisc_core::{DocumentId, Receipt};

use crate::store::Store;

/// A second write for the same document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("receipt for document {document_id} already recorded")]
pub struct ReceiptConflict {
    /// The document.
    pub document_id: DocumentId,
}

/// Receipts keyed by document.
#[derive(Debug, Clone, Default)]
pub struct ReceiptStore {
    data: Store<Receipt>,
}

impl ReceiptStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a receipt. Fails if one is already recorded for the document;
    /// the stored receipt is never replaced.
    pub fn record(&self, receipt: Receipt) -> Result<(), ReceiptConflict> {
        let document_id = receipt.document_id;
        if self.data.insert_new(*document_id.as_uuid(), receipt) {
            Ok(())
        } else {
            Err(ReceiptConflict { document_id })
        }
    }

    /// Receipt for a document.
    pub fn get(&self, document_id: &DocumentId) -> Option<Receipt> {
        self.data.get(document_id.as_uuid())
    }

    /// Number of receipts.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// No receipts yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
