//! Sequence allocation under a PostgreSQL advisory lock.
//!
//! Each call runs in one transaction that first takes
//! `pg_advisory_xact_lock(hashtext(scope_key))`, so allocations in the same
//! scope are serialised across every process sharing the database. The
//! partial unique index on `(taxpayer, branch, sequence_number)` turns a
//! broken lock into [`AllocationError::Conflict`] instead of a duplicate.

use sqlx::{PgPool, Postgres, Transaction};

use fisc_core::{DocumentId, SequenceNumber, SequenceScope};

use crate::allocator::AllocationError;
use crate::db::{to_i64, to_u64};

async fn lock_scope(
    tx: &mut Transaction<'_, Postgres>,
    scope: &SequenceScope,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(scope.lock_key())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn current_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: &SequenceScope,
) -> Result<u64, sqlx::Error> {
    let current: i64 = sqlx::query_scalar(
        "SELECT GREATEST(
            COALESCE((SELECT MAX(sequence_number) FROM fiscal_documents
                      WHERE taxpayer = $1 AND branch = $2), 0),
            COALESCE((SELECT last_issued FROM sequence_floors
                      WHERE taxpayer = $1 AND branch = $2), 0))",
    )
    .bind(scope.taxpayer.as_str())
    .bind(scope.branch.as_str())
    .fetch_one(&mut **tx)
    .await?;
    to_u64(current, "sequence_number")
}

/// The document's number, allocating `max + 1` if it has none.
pub async fn allocate(
    pool: &PgPool,
    scope: &SequenceScope,
    document: DocumentId,
) -> Result<SequenceNumber, AllocationError> {
    let mut tx = pool.begin().await?;
    lock_scope(&mut tx, scope).await?;

    let existing: Option<Option<i64>> =
        sqlx::query_scalar("SELECT sequence_number FROM fiscal_documents WHERE id = $1")
            .bind(document.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
    match existing {
        None => return Err(AllocationError::UnknownDocument { document_id: document }),
        Some(Some(n)) => {
            tx.commit().await?;
            let n = to_u64(n, "sequence_number")?;
            return SequenceNumber::new(n).map_err(|_| AllocationError::Conflict {
                scope: scope.to_string(),
                number: n,
            });
        }
        Some(None) => {}
    }

    let current = current_in_tx(&mut tx, scope).await?;
    let next = SequenceNumber::after(current).ok_or_else(|| AllocationError::Exhausted {
        scope: scope.to_string(),
    })?;
    let conflict = || AllocationError::Conflict {
        scope: scope.to_string(),
        number: next.value(),
    };

    let updated = sqlx::query(
        "UPDATE fiscal_documents SET sequence_number = $1, updated_at = NOW()
         WHERE id = $2 AND sequence_number IS NULL",
    )
    .bind(to_i64(next.value(), "sequence_number")?)
    .bind(document.as_uuid())
    .execute(&mut *tx)
    .await;
    match updated {
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Err(conflict()),
        Err(e) => return Err(e.into()),
        Ok(r) if r.rows_affected() == 0 => return Err(conflict()),
        Ok(_) => {}
    }

    tx.commit().await?;
    tracing::debug!(scope = %scope, document_id = %document, number = next.value(), "sequence number allocated");
    Ok(next)
}

/// Raise the scope floor to `last_issued` (never lowers it).
pub async fn seed_floor(
    pool: &PgPool,
    scope: &SequenceScope,
    last_issued: u64,
) -> Result<(), AllocationError> {
    let mut tx = pool.begin().await?;
    lock_scope(&mut tx, scope).await?;
    sqlx::query(
        "INSERT INTO sequence_floors (taxpayer, branch, last_issued, updated_at)
         VALUES ($1, $2, $3, NOW())
         ON CONFLICT (taxpayer, branch) DO UPDATE
         SET last_issued = GREATEST(sequence_floors.last_issued, EXCLUDED.last_issued),
             updated_at = NOW()",
    )
    .bind(scope.taxpayer.as_str())
    .bind(scope.branch.as_str())
    .bind(to_i64(last_issued, "last_issued")?)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    tracing::info!(scope = %scope, last_issued, "sequence floor seeded");
    Ok(())
}

/// Highest number issued or floored in the scope.
pub async fn current(pool: &PgPool, scope: &SequenceScope) -> Result<u64, AllocationError> {
    let mut tx = pool.begin().await?;
    let current = current_in_tx(&mut tx, scope).await?;
    tx.commit().await?;
    Ok(current)
}
