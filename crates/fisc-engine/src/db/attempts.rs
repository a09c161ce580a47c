//! Submission attempt persistence.
//!
//! All functions take a `&PgPool` and operate on the `submission_attempts`
//! table. Attempts are immutable once created; there are no update or
//! delete operations. `seq` preserves the global chain order.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fisc_core::{DocumentId, PayloadDigest, Timestamp};

use crate::attempts::SubmissionAttempt;
use crate::db::{to_i64, to_u64};

/// Insert a linked attempt.
pub async fn insert(pool: &PgPool, attempt: &SubmissionAttempt) -> Result<(), sqlx::Error> {
    let delivery =
        serde_json::to_value(attempt.delivery).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO submission_attempts (id, document_id, attempt_number, attempted_at,
         payload_digest, delivery, result_code, message, classification, duration_ms,
         previous_hash, attempt_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(attempt.id)
    .bind(attempt.document_id.as_uuid())
    .bind(i32::try_from(attempt.attempt_number).unwrap_or(i32::MAX))
    .bind(*attempt.attempted_at.as_datetime())
    .bind(attempt.payload_digest.as_str())
    .bind(delivery)
    .bind(&attempt.result_code)
    .bind(&attempt.message)
    .bind(&attempt.classification)
    .bind(to_i64(attempt.duration_ms, "duration_ms")?)
    .bind(&attempt.previous_hash)
    .bind(&attempt.attempt_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every attempt in chain order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<SubmissionAttempt>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AttemptRow>(
        "SELECT id, document_id, attempt_number, attempted_at, payload_digest, delivery,
         result_code, message, classification, duration_ms, previous_hash, attempt_hash
         FROM submission_attempts ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AttemptRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    document_id: Uuid,
    attempt_number: i32,
    attempted_at: DateTime<Utc>,
    payload_digest: String,
    delivery: serde_json::Value,
    result_code: Option<String>,
    message: Option<String>,
    classification: String,
    duration_ms: i64,
    previous_hash: String,
    attempt_hash: String,
}

impl AttemptRow {
    fn into_record(self) -> Result<SubmissionAttempt, sqlx::Error> {
        let delivery = serde_json::from_value(self.delivery).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "delivery".into(),
                source: Box::new(e),
            }
        })?;
        let attempt_number =
            u32::try_from(self.attempt_number).map_err(|_| sqlx::Error::ColumnDecode {
                index: "attempt_number".into(),
                source: format!("negative value {}", self.attempt_number).into(),
            })?;
        Ok(SubmissionAttempt {
            id: self.id,
            document_id: DocumentId::from_uuid(self.document_id),
            attempt_number,
            attempted_at: Timestamp::from_datetime(self.attempted_at),
            payload_digest: PayloadDigest::from_hex(self.payload_digest),
            delivery,
            result_code: self.result_code,
            message: self.message,
            classification: self.classification,
            duration_ms: to_u64(self.duration_ms, "duration_ms")?,
            previous_hash: self.previous_hash,
            attempt_hash: self.attempt_hash,
        })
    }
}
