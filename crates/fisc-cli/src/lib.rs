//! # fisc-cli — Command-Line Tool for Fiscal Submission
//!
//! Provides the `fisc` command:
//!
//! - `fisc preview`: map taxes and build the authority payload of a draft
//!   without numbering or sending it.
//! - `fisc submit`: register and submit drafts, printing a batch summary.
//! - `fisc qr`: render the QR payload and dash-grouped views of a receipt.
//! - `fisc sweep`: recover interrupted submissions and retry due rejections.
//! - `fisc config check`: validate configurations, optionally probing the
//!   authority.
//!
//! Documents, receipts and sequence numbers persist across runs only when
//! `DATABASE_URL` is set.
//!
//! Exit codes: `0` success, `1` error, `2` some documents or
//! configurations failed.

pub mod config;
pub mod preview;
pub mod qr;
pub mod settings;
pub mod submit;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use fisc_client::AnyTransport;
use fisc_engine::SubmissionEngine;

use crate::settings::Settings;

/// Exit code for partial failure.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Read a JSON or YAML file, chosen by extension.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
    }
}

/// Single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")
}

/// Engine over the configured transport and, when `DATABASE_URL` is set,
/// PostgreSQL. Configurations from `settings` are registered unless an
/// active one for the same taxpayer and environment is already stored.
pub async fn open_engine(settings: &Settings) -> Result<SubmissionEngine<AnyTransport>> {
    let mut engine = SubmissionEngine::new(settings.build_transport()?)
        .with_retry_policy(settings.retry_policy());
    if let Some(pool) = fisc_engine::db::init_pool().await? {
        engine = engine.with_pool(pool);
    }
    engine.load().await?;

    for config in settings.fiscal_configs(|var| std::env::var(var).ok())? {
        let stored = engine.registry().list().into_iter().any(|c| {
            c.active && c.taxpayer == config.taxpayer && c.environment == config.environment
        });
        if config.active && stored {
            tracing::debug!(taxpayer = %config.taxpayer, "active configuration already stored");
            continue;
        }
        engine.register_config(config).await?;
    }
    Ok(engine)
}
