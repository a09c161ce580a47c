//! End-to-end engine behaviour over the mock and simulated transports.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use fisc_client::{MockTransport, SimulatedTransport};
use fisc_core::{
    Authority, BranchId, Buyer, Credential, Currency, DocumentDraft, DocumentId, DocumentKind,
    DocumentLine, DocumentSource, FiscalConfig, InternalTax, Quantity, RateBps, SequenceScope,
    TaxpayerId, Timestamp,
};
use fisc_engine::{EngineError, SubmissionEngine};
use fisc_state::SubmissionState;
use fisc_tax::{AuthorityTaxCode, EtimsTaxType};

const KE_TIN: &str = "P051234567X";
const GH_TIN: &str = "C0000000000";

fn etims_config() -> FiscalConfig {
    let mut config =
        FiscalConfig::local_mock(Authority::KraEtims, "http://simulated.local", KE_TIN).unwrap();
    config.device_serial = Some("KRACU0100000001".into());
    config
}

fn line(unit_price: i64, tax: Option<InternalTax>) -> DocumentLine {
    DocumentLine {
        item_code: "SKU-1".into(),
        classification_code: None,
        description: "Widget".into(),
        quantity: Quantity::units(1).unwrap(),
        unit_price,
        discount: RateBps::ZERO,
        tax_inclusive: false,
        tax,
    }
}

fn draft(tin: &str, branch: &str, currency: &str, reference: &str, lines: Vec<DocumentLine>) -> DocumentDraft {
    DocumentDraft {
        reference: reference.into(),
        taxpayer: TaxpayerId::new(tin).unwrap(),
        branch: BranchId::new(branch).unwrap(),
        kind: DocumentKind::Sale,
        source: DocumentSource::Invoice,
        original: None,
        credit_reason: None,
        buyer: Buyer::default(),
        currency: Currency::new(currency).unwrap(),
        issued_at: NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap(),
        remark: None,
        lines,
    }
}

fn kenyan_sale(reference: &str) -> DocumentDraft {
    draft(
        KE_TIN,
        "00",
        "KES",
        reference,
        vec![line(100_000, Some(InternalTax::new("VAT 16%", RateBps::from_bps(1600))))],
    )
}

fn etims_accepted(n: u64) -> serde_json::Value {
    json!({
        "resultCd": "000",
        "resultMsg": "It is succeeded",
        "data": {
            "curRcptNo": n,
            "totRcptNo": n,
            "intrlData": "WQGSYJBQOQ7BSJ3CV3UMHLQKXM",
            "rcptSign": "SVJ3IC4M3YB2XZHS",
            "sdcDateTime": "20260307101501"
        }
    })
}

#[tokio::test]
async fn batch_continues_after_failures() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_json(200, etims_accepted(1))
        .respond_json(200, json!({"resultCd": "910", "resultMsg": "Invalid item code"}))
        .respond_json(200, etims_accepted(2));
    let engine = SubmissionEngine::new(Arc::clone(&mock));
    engine.register_config(etims_config()).await.unwrap();

    let mut ids = Vec::new();
    for reference in ["INV/001", "INV/002", "INV/003"] {
        ids.push(engine.register_document(kenyan_sale(reference)).await.unwrap().id);
    }
    ids.insert(1, DocumentId::new());

    let summary = engine.submit_batch(&ids).await;
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.results.len(), 4);
    assert_eq!(summary.results[1].error_code.as_deref(), Some("NOT_FOUND"));
    let rejected = summary.results[2].result.as_ref().unwrap();
    assert_eq!(rejected.status, SubmissionState::PermanentlyRejected);
    assert_eq!(rejected.error.as_deref(), Some("Invalid item code"));
    assert!(summary.results[3].result.as_ref().unwrap().is_accepted());
    assert_eq!(mock.call_count(), 3);

    let again = engine.submit_batch(&ids[..1]).await;
    assert_eq!(again.skipped, 1);
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn rejected_documents_keep_their_numbers() {
    let mock = Arc::new(MockTransport::new());
    mock.time_out().respond_json(200, etims_accepted(2));
    let engine = SubmissionEngine::new(Arc::clone(&mock));
    engine.register_config(etims_config()).await.unwrap();

    let first = engine.register_document(kenyan_sale("INV/001")).await.unwrap();
    let second = engine.register_document(kenyan_sale("INV/002")).await.unwrap();
    let r1 = engine.submit(first.id).await.unwrap();
    let r2 = engine.submit(second.id).await.unwrap();

    assert_eq!(r1.status, SubmissionState::Rejected);
    assert_eq!(r1.sequence_number.unwrap().value(), 1);
    assert_eq!(r2.sequence_number.unwrap().value(), 2);
}

#[tokio::test]
async fn unknown_rate_maps_to_default_with_diagnostic() {
    let engine = SubmissionEngine::new(SimulatedTransport::new("KRACU0100000001"));
    engine.register_config(etims_config()).await.unwrap();

    let doc = engine
        .register_document(draft(
            KE_TIN,
            "00",
            "KES",
            "INV/012",
            vec![line(50_000, Some(InternalTax::new("VAT 12%", RateBps::from_bps(1200))))],
        ))
        .await
        .unwrap();
    let result = engine.submit(doc.id).await.unwrap();
    assert!(result.is_accepted());

    let doc = engine.get_document(doc.id).unwrap();
    let diagnostics = doc.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].line, 1);
    assert_eq!(diagnostics[0].assigned, AuthorityTaxCode::Etims(EtimsTaxType::B));
}

#[tokio::test]
async fn ghana_sale_through_simulated_sandbox() {
    let engine = SubmissionEngine::new(SimulatedTransport::new("SDC-GH-0001"));
    let config = FiscalConfig::local_mock(Authority::GraEvat, "http://simulated.local", GH_TIN).unwrap();
    engine.register_config(config).await.unwrap();

    let doc = engine
        .register_document(draft(
            GH_TIN,
            "001",
            "GHS",
            "INV/GH/001",
            vec![line(100_000, Some(InternalTax::new("VAT 15%", RateBps::from_bps(1500))))],
        ))
        .await
        .unwrap();
    let result = engine.submit(doc.id).await.unwrap();
    assert!(result.is_accepted(), "{result:?}");
    assert_eq!(engine.get_document(doc.id).unwrap().total(), Some(120_000));

    let receipt = engine.get_receipt(doc.id).unwrap();
    assert_eq!(receipt.controller_id, "SDC-GH-0001");
    assert_eq!(receipt.cu_invoice_number, "SDC-GH-0001/1");
    assert!(receipt.verification_url.is_some());
    assert_eq!(receipt.qr_content(), receipt.qr_content());
    assert!(receipt.qr_content().starts_with("07032026#101500#SDC-GH-0001#1#"));
    assert!(engine.verify_attempt_chain().chain_valid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_submissions_are_numbered_gaplessly() {
    let engine = Arc::new(SubmissionEngine::new(SimulatedTransport::new("KRACU0100000001")));
    engine.register_config(etims_config()).await.unwrap();
    let scope = SequenceScope::new(TaxpayerId::new(KE_TIN).unwrap(), BranchId::new("00").unwrap());
    engine.seed_floor(&scope, 100).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let doc = engine
                .register_document(kenyan_sale(&format!("POS/{i:03}")))
                .await
                .unwrap();
            engine.submit(doc.id).await.unwrap()
        }));
    }
    let mut numbers = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_accepted());
        numbers.push(result.sequence_number.unwrap().value());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (101..=120).collect::<Vec<u64>>());
    assert_eq!(engine.current_sequence(&scope).await.unwrap(), 120);
}

#[tokio::test]
async fn receipt_lookup_distinguishes_missing_document_from_missing_receipt() {
    let engine = SubmissionEngine::new(SimulatedTransport::new("KRACU0100000001"));
    engine.register_config(etims_config()).await.unwrap();
    let doc = engine.register_document(kenyan_sale("INV/001")).await.unwrap();

    assert!(matches!(
        engine.get_receipt(doc.id),
        Err(EngineError::ReceiptNotFound { .. })
    ));
    assert!(matches!(
        engine.get_receipt(DocumentId::new()),
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn connection_test_is_recorded_on_the_config() {
    let engine = SubmissionEngine::new(SimulatedTransport::new("KRACU0100000001"));
    let config = engine.register_config(etims_config()).await.unwrap();
    let tested = engine.test_connection(config.id).await.unwrap();
    assert_eq!(tested.status, fisc_core::ConfigStatus::Active);
    assert!(tested.last_tested_at.is_some());
}

#[tokio::test]
async fn refused_credentials_hold_the_document_until_the_config_is_fixed() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(401, "Unauthorized")
        .respond_json(200, json!({"resultCd": "000", "resultMsg": "It is succeeded"}))
        .respond_json(200, etims_accepted(1));
    let engine = SubmissionEngine::new(Arc::clone(&mock));
    let stale = engine.register_config(etims_config()).await.unwrap();
    let doc = engine.register_document(kenyan_sale("INV/001")).await.unwrap();

    let err = engine.submit(doc.id).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CREDENTIALS");
    assert!(matches!(err, EngineError::InvalidCredentials { config_id, .. } if config_id == stale.id));

    let held = engine.get_document(doc.id).unwrap();
    assert_eq!(held.state(), SubmissionState::Rejected);
    assert!(held.retryable());
    assert!(held.lifecycle.held_for_credentials);
    assert_eq!(held.sequence_number.unwrap().value(), 1);
    assert_eq!(engine.attempts(doc.id).unwrap()[0].classification, "unauthorized");
    assert_eq!(
        engine.registry().get(stale.id).unwrap().status,
        fisc_core::ConfigStatus::Error
    );

    let sweep = engine.sweep_retryable(Timestamp::now().plus_secs(86_400)).await;
    assert!(sweep.retried.is_empty());
    assert_eq!(sweep.held, 1);
    assert_eq!(mock.call_count(), 1);

    engine.deactivate_config(stale.id).await.unwrap();
    let mut fixed = etims_config();
    fixed.credential = Credential::new("rotated-key");
    let fixed = engine.register_config(fixed).await.unwrap();
    let tested = engine.test_connection(fixed.id).await.unwrap();
    assert_eq!(tested.status, fisc_core::ConfigStatus::Active);
    assert!(!engine.get_document(doc.id).unwrap().lifecycle.held_for_credentials);

    let result = engine.retry(doc.id).await.unwrap();
    assert!(result.is_accepted());
    assert_eq!(result.sequence_number.unwrap().value(), 1);
    assert_eq!(result.attempt, 2);
    assert_eq!(engine.get_document(doc.id).unwrap().config_id, Some(fixed.id));

    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].body, requests[2].body);
    assert_eq!(requests[2].header_value("cmcKey"), Some("rotated-key"));
}

#[tokio::test]
async fn explicit_retry_ignores_the_credential_hold() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(403, "Forbidden").respond_json(200, etims_accepted(1));
    let engine = SubmissionEngine::new(Arc::clone(&mock));
    engine.register_config(etims_config()).await.unwrap();
    let doc = engine.register_document(kenyan_sale("INV/001")).await.unwrap();

    assert_eq!(engine.submit(doc.id).await.unwrap_err().code(), "INVALID_CREDENTIALS");
    let result = engine.retry(doc.id).await.unwrap();
    assert!(result.is_accepted());
    assert!(!engine.get_document(doc.id).unwrap().lifecycle.held_for_credentials);
}

#[tokio::test]
async fn deactivated_config_is_not_used_for_retries() {
    let mock = Arc::new(MockTransport::new());
    mock.time_out().respond_json(200, etims_accepted(1));
    let engine = SubmissionEngine::new(Arc::clone(&mock));
    let config = engine.register_config(etims_config()).await.unwrap();
    let doc = engine.register_document(kenyan_sale("INV/001")).await.unwrap();

    let first = engine.submit(doc.id).await.unwrap();
    assert_eq!(first.status, SubmissionState::Rejected);
    engine.deactivate_config(config.id).await.unwrap();

    let err = engine.retry(doc.id).await.unwrap_err();
    assert_eq!(err.code(), "NOT_CONFIGURED");
    let sweep = engine.sweep_retryable(Timestamp::now().plus_secs(3_600)).await;
    assert!(sweep.retried.is_empty());
    assert_eq!(sweep.errors.len(), 1);
    assert_eq!(sweep.errors[0].error_code.as_deref(), Some("NOT_CONFIGURED"));
    assert_eq!(mock.call_count(), 1);
    assert_eq!(engine.get_document(doc.id).unwrap().state(), SubmissionState::Rejected);

    engine.activate_config(config.id).await.unwrap();
    assert!(engine.retry(doc.id).await.unwrap().is_accepted());
    assert_eq!(mock.call_count(), 2);
}
