//! Fiscal document persistence.
//!
//! The full record is stored as JSON next to the columns the engine
//! queries on. `sequence_number` is written once: an upsert never clears
//! or replaces a number already stored, including one set by
//! [`super::sequences::allocate`].

use sqlx::PgPool;
use uuid::Uuid;

use fisc_core::SequenceNumber;

use crate::db::{to_i64, to_u64};
use crate::document::FiscalDocument;

/// Insert or update a document.
pub async fn upsert(pool: &PgPool, doc: &FiscalDocument) -> Result<(), sqlx::Error> {
    let json = serde_json::to_value(doc).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let sequence = doc
        .sequence_number
        .map(|n| to_i64(n.value(), "sequence_number"))
        .transpose()?;
    let attempts = i32::try_from(doc.lifecycle.attempts).unwrap_or(i32::MAX);

    sqlx::query(
        "INSERT INTO fiscal_documents (id, reference, taxpayer, branch, source, kind,
         status, retryable, attempts, sequence_number, document, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status,
           retryable = EXCLUDED.retryable,
           attempts = EXCLUDED.attempts,
           sequence_number = COALESCE(fiscal_documents.sequence_number, EXCLUDED.sequence_number),
           document = EXCLUDED.document,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(doc.id.as_uuid())
    .bind(&doc.draft.reference)
    .bind(doc.draft.taxpayer.as_str())
    .bind(doc.draft.branch.as_str())
    .bind(doc.draft.source.as_str())
    .bind(doc.draft.kind.as_str())
    .bind(doc.state().as_str())
    .bind(doc.retryable())
    .bind(attempts)
    .bind(sequence)
    .bind(json)
    .bind(*doc.created_at.as_datetime())
    .bind(*doc.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every document, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FiscalDocument>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, sequence_number, document
         FROM fiscal_documents ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DocumentRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    sequence_number: Option<i64>,
    document: serde_json::Value,
}

impl DocumentRow {
    fn into_record(self) -> Result<FiscalDocument, sqlx::Error> {
        let decode = |source: Box<dyn std::error::Error + Send + Sync>| sqlx::Error::ColumnDecode {
            index: "document".into(),
            source,
        };
        let mut doc: FiscalDocument =
            serde_json::from_value(self.document).map_err(|e| decode(Box::new(e)))?;
        if doc.id.as_uuid() != &self.id {
            return Err(decode(format!("id mismatch for row {}", self.id).into()));
        }
        // The allocator writes the column before the JSON is refreshed.
        if doc.sequence_number.is_none() {
            if let Some(n) = self.sequence_number {
                let n = to_u64(n, "sequence_number")?;
                doc.sequence_number = SequenceNumber::new(n).ok();
            }
        }
        Ok(doc)
    }
}
