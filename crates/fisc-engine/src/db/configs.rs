//! Fiscal configuration persistence.
//!
//! The partial unique index `fiscal_configs_one_active` backs the
//! registry's one-active-per-(taxpayer, environment) rule.

use sqlx::PgPool;

use fisc_core::FiscalConfig;

/// Insert or update a configuration.
pub async fn upsert(pool: &PgPool, config: &FiscalConfig) -> Result<(), sqlx::Error> {
    let json = serde_json::to_value(config).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO fiscal_configs (id, authority, environment, taxpayer, branch, status,
         active, config, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status,
           active = EXCLUDED.active,
           config = EXCLUDED.config,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(config.id)
    .bind(config.authority.as_str())
    .bind(config.environment.as_str())
    .bind(config.taxpayer.as_str())
    .bind(config.branch.as_str())
    .bind(config.status.as_str())
    .bind(config.active)
    .bind(json)
    .bind(*config.created_at.as_datetime())
    .bind(*config.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every configuration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FiscalConfig>, sqlx::Error> {
    let rows: Vec<serde_json::Value> =
        sqlx::query_scalar("SELECT config FROM fiscal_configs ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|json| {
            serde_json::from_value(json).map_err(|e| sqlx::Error::ColumnDecode {
                index: "config".into(),
                source: Box::new(e),
            })
        })
        .collect()
}
