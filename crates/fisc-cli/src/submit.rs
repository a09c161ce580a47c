//! # Submit and Sweep Subcommands
//!
//! `fisc submit` registers each draft and submits them as one batch; a
//! failing document never stops the rest. `fisc sweep` runs the retry
//! sweep over stored documents and is only useful with `DATABASE_URL`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use fisc_client::AnyTransport;
use fisc_core::{DocumentDraft, Timestamp};
use fisc_engine::{BatchSummary, SubmissionEngine, SweepReport};

use crate::settings::Settings;
use crate::{open_engine, read_file, runtime, EXIT_PARTIAL_FAILURE};

/// Arguments for `fisc submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Draft documents (JSON, or YAML by extension), submitted in order.
    #[arg(required = true)]
    pub drafts: Vec<PathBuf>,
}

/// Arguments for `fisc sweep`.
#[derive(Args, Debug)]
pub struct SweepArgs {}

/// Register `drafts` and submit them in order.
pub async fn submit_drafts(
    engine: &SubmissionEngine<AnyTransport>,
    drafts: Vec<DocumentDraft>,
) -> Result<BatchSummary> {
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in drafts {
        ids.push(engine.register_document(draft).await?.id);
    }
    Ok(engine.submit_batch(&ids).await)
}

/// Execute `fisc submit`.
pub fn run_submit(args: &SubmitArgs, settings: &Settings) -> Result<u8> {
    let drafts = args
        .drafts
        .iter()
        .map(|path| read_file::<DocumentDraft>(path))
        .collect::<Result<Vec<_>>>()?;

    let summary = runtime()?.block_on(async {
        let engine = open_engine(settings).await?;
        submit_drafts(&engine, drafts).await
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        "batch finished"
    );
    Ok(if summary.failed == 0 { 0 } else { EXIT_PARTIAL_FAILURE })
}

/// Execute `fisc sweep`.
pub fn run_sweep(_args: &SweepArgs, settings: &Settings) -> Result<u8> {
    let report: SweepReport = runtime()?.block_on(async {
        let engine = open_engine(settings).await?;
        anyhow::Ok(engine.sweep_retryable(Timestamp::now()).await)
    })?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    let failed = report.errors.len() + report.retried.iter().filter(|r| !r.is_accepted()).count();
    Ok(if failed == 0 { 0 } else { EXIT_PARTIAL_FAILURE })
}
