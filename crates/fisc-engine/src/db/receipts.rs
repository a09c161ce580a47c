//! Receipt persistence. One row per document, never updated.

use sqlx::PgPool;

use fisc_core::Receipt;

/// Insert a receipt. Returns `false` if the document already has one; the
/// stored row is left untouched.
pub async fn insert(pool: &PgPool, receipt: &Receipt) -> Result<bool, sqlx::Error> {
    let json = serde_json::to_value(receipt).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let result = sqlx::query(
        "INSERT INTO fiscal_receipts (document_id, authority, signature, cu_invoice_number,
         receipt, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (document_id) DO NOTHING",
    )
    .bind(receipt.document_id.as_uuid())
    .bind(receipt.authority.as_str())
    .bind(&receipt.signature)
    .bind(&receipt.cu_invoice_number)
    .bind(json)
    .bind(*receipt.recorded_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every receipt.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Receipt>, sqlx::Error> {
    let rows: Vec<serde_json::Value> =
        sqlx::query_scalar("SELECT receipt FROM fiscal_receipts ORDER BY recorded_at")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|json| {
            serde_json::from_value(json).map_err(|e| sqlx::Error::ColumnDecode {
                index: "receipt".into(),
                source: Box::new(e),
            })
        })
        .collect()
}
