//! # Preview Subcommand
//!
//! Runs a draft through tax mapping and payload building with a
//! caller-chosen sequence number. Nothing is numbered, stored or sent.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use fisc_core::{DocumentDraft, DocumentId, SequenceNumber};
use fisc_engine::ConfigRegistry;
use fisc_payload::PreparedDocument;
use fisc_tax::{map_document, mapper_for, DocumentTotals, MappingDiagnostic};

use crate::read_file;
use crate::settings::Settings;

/// Arguments for `fisc preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Draft document (JSON, or YAML by extension).
    pub draft: PathBuf,

    /// Sequence number to place in the payload.
    #[arg(long, default_value_t = 1)]
    pub number: u64,

    /// Authority number of the original sale, for credit notes.
    #[arg(long)]
    pub original_number: Option<u64>,
}

/// What `fisc preview` prints.
#[derive(Debug, Serialize)]
pub struct Preview {
    pub authority: String,
    pub sequence_number: SequenceNumber,
    pub totals: DocumentTotals,
    pub diagnostics: Vec<MappingDiagnostic>,
    pub digest: String,
    pub payload: serde_json::Value,
}

/// Build the preview of `draft` against the configuration resolved for
/// its taxpayer.
pub fn preview(
    draft: DocumentDraft,
    settings: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
    number: u64,
    original_number: Option<u64>,
) -> Result<Preview> {
    draft.validate()?;
    let registry = ConfigRegistry::new();
    for config in settings.fiscal_configs(lookup)? {
        registry.register(config)?;
    }
    let config = registry.resolve(&draft.taxpayer)?;

    let mapper = mapper_for(&config)?;
    let mapped = map_document(&draft, mapper.as_ref())?;
    let prepared = PreparedDocument {
        document_id: DocumentId::new(),
        draft,
        mapped,
        sequence_number: SequenceNumber::new(number)?,
        original_sequence: original_number.map(SequenceNumber::new).transpose()?,
    };
    let payload = fisc_payload::build(&prepared, &config)?;
    Ok(Preview {
        authority: config.authority.to_string(),
        sequence_number: payload.sequence_number,
        totals: prepared.mapped.totals,
        diagnostics: prepared.mapped.diagnostics,
        digest: payload.digest.to_string(),
        payload: payload.json().context("payload body is not JSON")?,
    })
}

/// Execute `fisc preview`.
pub fn run_preview(args: &PreviewArgs, settings: &Settings) -> Result<u8> {
    let draft: DocumentDraft = read_file(&args.draft)?;
    let preview = preview(
        draft,
        settings,
        |var| std::env::var(var).ok(),
        args.number,
        args.original_number,
    )?;
    for diagnostic in &preview.diagnostics {
        tracing::warn!(line = diagnostic.line, "{}", diagnostic.message);
    }
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(0)
}
