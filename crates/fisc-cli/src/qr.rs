//! # QR Subcommand
//!
//! Renders the printable views of a stored receipt: the QR payload, the
//! dash-grouped signature and internal data, and the counter line with its
//! receipt type label.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use fisc_core::{Receipt, ReceiptKind, TransactionType};

use crate::read_file;

/// How the receipt is being printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrintMode {
    /// The original fiscal receipt.
    Normal,
    /// A reprint.
    Copy,
    /// Training mode.
    Training,
    /// A quotation.
    Proforma,
}

impl From<PrintMode> for TransactionType {
    fn from(mode: PrintMode) -> Self {
        match mode {
            PrintMode::Normal => Self::Normal,
            PrintMode::Copy => Self::Copy,
            PrintMode::Training => Self::Training,
            PrintMode::Proforma => Self::Proforma,
        }
    }
}

/// Arguments for `fisc qr`.
#[derive(Args, Debug)]
pub struct QrArgs {
    /// Receipt file (JSON, or YAML by extension).
    pub receipt: PathBuf,

    /// The receipt is for a credit note.
    #[arg(long)]
    pub credit_note: bool,

    /// Print mode, which selects the receipt type label.
    #[arg(long, value_enum, default_value = "normal")]
    pub mode: PrintMode,

    /// Print all views as one JSON object.
    #[arg(long)]
    pub json: bool,
}

/// Printable views of a receipt.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReceiptView {
    pub qr_content: String,
    pub signature: String,
    pub internal_data: String,
    pub cu_invoice_number: String,
    /// `"{current}/{total} {label}"`, when the counters are numeric.
    pub counter: Option<String>,
}

impl ReceiptView {
    /// Views of `receipt` printed in `mode`.
    pub fn new(receipt: &Receipt, mode: PrintMode, kind: ReceiptKind) -> Result<Self> {
        let transaction = TransactionType::from(mode);
        if fisc_core::receipt::receipt_label(transaction, kind).is_none() {
            bail!("a {mode:?} receipt cannot be printed for a credit note");
        }
        Ok(Self {
            qr_content: receipt.qr_content(),
            signature: receipt.formatted_signature(),
            internal_data: receipt.formatted_internal_data(),
            cu_invoice_number: receipt.cu_invoice_number.clone(),
            counter: receipt.counter_line(transaction, kind),
        })
    }
}

/// Execute `fisc qr`.
pub fn run_qr(args: &QrArgs) -> Result<u8> {
    let receipt: Receipt = read_file(&args.receipt)?;
    let kind = if args.credit_note {
        ReceiptKind::CreditNote
    } else {
        ReceiptKind::Sale
    };
    let view = ReceiptView::new(&receipt, args.mode, kind)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("QR:            {}", view.qr_content);
        println!("Signature:     {}", view.signature);
        println!("Internal data: {}", view.internal_data);
        println!("CU invoice:    {}", view.cu_invoice_number);
        if let Some(counter) = &view.counter {
            println!("Counter:       {counter}");
        }
    }
    Ok(0)
}
