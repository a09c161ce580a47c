//! # CLI Pipeline
//!
//! The `fisc` command's library surface wired to the engine: settings from
//! a file, drafts from disk, preview against submission, and the QR views
//! of the resulting receipt.

use std::path::PathBuf;

use serde_json::json;

use fisc_cli::preview::preview;
use fisc_cli::qr::{PrintMode, ReceiptView};
use fisc_cli::settings::Settings;
use fisc_cli::submit::submit_drafts;
use fisc_cli::{open_engine, read_file};
use fisc_core::{DocumentDraft, ReceiptKind};

const SETTINGS: &str = r#"
transport: simulated
controller_id: KRACU0100000001
configs:
  - authority: kra_etims
    taxpayer: P051234567X
    credential_env: FISC_PIPELINE_TEST_KEY
    device_serial: KRACU0100000001
"#;

fn lookup(var: &str) -> Option<String> {
    (var == "FISC_PIPELINE_TEST_KEY").then(|| "cmc-key".to_string())
}

fn write_draft(dir: &tempfile::TempDir, name: &str, reference: &str) -> PathBuf {
    let path = dir.path().join(name);
    let draft = json!({
        "reference": reference,
        "taxpayer": "P051234567X",
        "branch": "00",
        "kind": "sale",
        "currency": "KES",
        "issued_at": "2026-03-07T10:15:00",
        "lines": [{
            "item_code": "SKU-1",
            "description": "Widget",
            "quantity": 3,
            "unit_price": 20000,
            "tax": {"name": "VAT 16%", "rate": 1600}
        }]
    });
    std::fs::write(&path, draft.to_string()).unwrap();
    path
}

#[tokio::test]
async fn preview_matches_what_is_submitted() {
    std::env::set_var("FISC_PIPELINE_TEST_KEY", "cmc-key");
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("fisc.yaml");
    std::fs::write(&settings_path, SETTINGS).unwrap();
    let settings = Settings::load(Some(&settings_path)).unwrap();

    let draft: DocumentDraft = read_file(&write_draft(&dir, "sale.json", "INV/CLI/001")).unwrap();
    let previewed = preview(draft.clone(), &settings, lookup, 1, None).unwrap();
    assert_eq!(previewed.totals.total, 69_600);

    let engine = open_engine(&settings).await.unwrap();
    let summary = submit_drafts(&engine, vec![draft]).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let id = summary.results[0].document_id;
    let doc = engine.get_document(id).unwrap();
    let payload = doc.payload.unwrap();
    assert_eq!(payload.sequence_number.value(), 1);
    assert_eq!(payload.digest.to_string(), previewed.digest);

    let receipt = engine.get_receipt(id).unwrap();
    let view = ReceiptView::new(&receipt, PrintMode::Normal, ReceiptKind::Sale).unwrap();
    assert_eq!(view.cu_invoice_number, "KRACU0100000001/1");
    assert!(view.qr_content.starts_with("07032026#101500#KRACU0100000001#1#"));
    assert!(view.signature.split('-').all(|group| group.len() <= 4));
    assert_eq!(view.counter.as_deref(), Some("1/1 NS"));
}

#[tokio::test]
async fn yaml_drafts_submit_in_order() {
    std::env::set_var("FISC_PIPELINE_TEST_KEY", "cmc-key");
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::from_yaml(SETTINGS).unwrap();

    let yaml_path = dir.path().join("second.yaml");
    std::fs::write(
        &yaml_path,
        r#"
reference: INV/CLI/003
taxpayer: P051234567X
branch: "00"
kind: sale
currency: KES
issued_at: "2026-03-07T11:00:00"
lines:
  - item_code: SKU-2
    description: Gadget
    quantity: 1
    unit_price: 50000
    tax:
      name: VAT 16%
      rate: 1600
"#,
    )
    .unwrap();

    let drafts: Vec<DocumentDraft> = vec![
        read_file(&write_draft(&dir, "first.json", "INV/CLI/002")).unwrap(),
        read_file(&yaml_path).unwrap(),
    ];
    let engine = open_engine(&settings).await.unwrap();
    let summary = submit_drafts(&engine, drafts).await.unwrap();
    assert_eq!(summary.succeeded, 2);
    let references: Vec<_> = summary
        .results
        .iter()
        .map(|r| r.result.as_ref().unwrap().reference.clone())
        .collect();
    assert_eq!(references, vec!["INV/CLI/002", "INV/CLI/003"]);
}
