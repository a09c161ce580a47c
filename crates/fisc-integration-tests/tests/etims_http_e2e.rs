//! # Kenya eTIMS over HTTP
//!
//! Drives the engine through the real HTTP transport against a wiremock
//! stand-in for the KRA OSCU endpoint: a sale, its credit note, and a
//! transient failure resent byte for byte.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use fisc_client::HttpTransport;
use fisc_core::{
    Authority, BranchId, Buyer, CreditNoteReason, Currency, DocumentDraft, DocumentId,
    DocumentKind, DocumentLine, DocumentSource, FiscalConfig, InternalTax, Quantity, RateBps,
    TaxpayerId, Timestamp,
};
use fisc_engine::SubmissionEngine;
use fisc_state::SubmissionState;

const TIN: &str = "P051234567X";
const CU: &str = "KRACU0100000001";

fn config(server: &MockServer) -> FiscalConfig {
    let mut config = FiscalConfig::local_mock(Authority::KraEtims, &server.uri(), TIN).unwrap();
    config.device_serial = Some(CU.into());
    config
}

async fn engine(server: &MockServer) -> SubmissionEngine<HttpTransport> {
    let engine = SubmissionEngine::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    engine.register_config(config(server)).await.unwrap();
    engine
}

fn sale(reference: &str) -> DocumentDraft {
    DocumentDraft {
        reference: reference.into(),
        taxpayer: TaxpayerId::new(TIN).unwrap(),
        branch: BranchId::new("00").unwrap(),
        kind: DocumentKind::Sale,
        source: DocumentSource::Pos,
        original: None,
        credit_reason: None,
        buyer: Buyer::default(),
        currency: Currency::new("KES").unwrap(),
        issued_at: NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap(),
        remark: None,
        lines: vec![DocumentLine {
            item_code: "SKU-1".into(),
            classification_code: None,
            description: "Maize flour 2kg".into(),
            quantity: Quantity::units(2).unwrap(),
            unit_price: 50_000,
            discount: RateBps::ZERO,
            tax_inclusive: false,
            tax: Some(InternalTax::new("VAT 16%", RateBps::from_bps(1_600))),
        }],
    }
}

fn credit_note(reference: &str, original: DocumentId) -> DocumentDraft {
    DocumentDraft {
        kind: DocumentKind::CreditNote,
        original: Some(original),
        credit_reason: Some(CreditNoteReason::Damaged),
        ..sale(reference)
    }
}

fn accepted(receipt: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "resultCd": "000",
        "resultMsg": "It is succeeded",
        "data": {
            "curRcptNo": receipt,
            "totRcptNo": 300 + receipt,
            "intrlData": "WQGSYJBQOQ7BSJ3CV3UMHLQKXM",
            "rcptSign": "SVJ3IC4M3YB2XZHS",
            "sdcDateTime": "20260307101501"
        }
    }))
}

fn body_of(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn sale_and_credit_note_are_numbered_and_linked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .and(header("tin", TIN))
        .and(header("bhfId", "00"))
        .and(header("cmcKey", "test-key"))
        .respond_with(accepted(1))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(accepted(2))
        .mount(&server)
        .await;

    let engine = engine(&server).await;
    let sale_doc = engine.register_document(sale("INV/2026/0001")).await.unwrap();
    let result = engine.submit(sale_doc.id).await.unwrap();
    assert!(result.is_accepted(), "{result:?}");
    assert_eq!(result.sequence_number.unwrap().value(), 1);

    let receipt = engine.get_receipt(sale_doc.id).unwrap();
    assert_eq!(receipt.cu_invoice_number, format!("{CU}/1"));
    assert_eq!(receipt.total_receipt_number.as_deref(), Some("301"));
    assert_eq!(receipt.formatted_signature(), "SVJ3-IC4M-3YB2-XZHS");
    assert!(receipt
        .qr_content()
        .starts_with(&format!("07032026#101500#{CU}#1#")));

    let note = engine
        .register_document(credit_note("CN/2026/0001", sale_doc.id))
        .await
        .unwrap();
    let result = engine.submit(note.id).await.unwrap();
    assert!(result.is_accepted(), "{result:?}");
    assert_eq!(result.sequence_number.unwrap().value(), 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let sale_body = body_of(&requests[0]);
    assert_eq!(sale_body["invcNo"], 1);
    assert_eq!(sale_body["orgInvcNo"], 0);
    assert_eq!(sale_body["rcptTyCd"], "S");
    assert_eq!(sale_body["trdInvcNo"], "INV/2026/0001");
    assert_eq!(sale_body["totAmt"], 1160.0);
    assert_eq!(sale_body["itemList"][0]["taxTyCd"], "B");

    let note_body = body_of(&requests[1]);
    assert_eq!(note_body["invcNo"], 2);
    assert_eq!(note_body["orgInvcNo"], 1);
    assert_eq!(note_body["rcptTyCd"], "R");
    assert_eq!(note_body["rfdRsnCd"], "01");
}

#[tokio::test]
async fn credit_note_waits_for_an_accepted_original() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = engine(&server).await;
    let sale_doc = engine.register_document(sale("INV/2026/0002")).await.unwrap();
    let result = engine.submit(sale_doc.id).await.unwrap();
    assert_eq!(result.status, SubmissionState::Rejected);
    assert!(result.retryable);

    let note = engine
        .register_document(credit_note("CN/2026/0002", sale_doc.id))
        .await
        .unwrap();
    let err = engine.submit(note.id).await.unwrap_err();
    assert_eq!(err.code(), "NOT_READY");
    assert!(engine.get_document(note.id).unwrap().sequence_number.is_none());
}

#[tokio::test]
async fn transient_failure_is_resent_verbatim_and_keeps_its_number() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCd": "899",
            "resultMsg": "Temporary server error"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(accepted(7))
        .mount(&server)
        .await;

    let engine = engine(&server).await;
    let doc = engine.register_document(sale("INV/2026/0003")).await.unwrap();

    let first = engine.submit(doc.id).await.unwrap();
    assert_eq!(first.status, SubmissionState::Rejected);
    assert!(first.retryable);
    assert_eq!(first.code.as_deref(), Some("899"));
    assert_eq!(first.error.as_deref(), Some("Temporary server error"));

    // Nothing is due until the backoff has passed.
    let early = engine.sweep_retryable(Timestamp::now()).await;
    assert!(early.retried.is_empty());

    let report = engine.sweep_retryable(Timestamp::now().plus_secs(3_600)).await;
    assert_eq!(report.retried.len(), 1);
    let second = &report.retried[0];
    assert!(second.is_accepted(), "{second:?}");
    assert_eq!(second.sequence_number, first.sequence_number);
    assert_eq!(second.attempt, 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);

    let attempts = engine.attempts(doc.id).unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].payload_digest, attempts[1].payload_digest);
    assert_eq!(attempts[0].classification, "transient");
    assert_eq!(attempts[1].classification, "accepted");
    assert!(engine.verify_attempt_chain().chain_valid);
}

#[tokio::test]
async fn business_rejection_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCd": "910",
            "resultMsg": "Request parameter error: itemClsCd"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server).await;
    let doc = engine.register_document(sale("INV/2026/0004")).await.unwrap();
    let result = engine.submit(doc.id).await.unwrap();
    assert_eq!(result.status, SubmissionState::PermanentlyRejected);
    assert!(!result.retryable);
    assert_eq!(result.error.as_deref(), Some("Request parameter error: itemClsCd"));

    let err = engine.retry(doc.id).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_FINALIZED");
    let report = engine.sweep_retryable(Timestamp::now().plus_secs(86_400)).await;
    assert!(report.retried.is_empty());
}
