//! # Ghana E-VAT over HTTP
//!
//! The engine against a wiremock stand-in for the GRA virtual SDC.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fisc_client::HttpTransport;
use fisc_core::{
    Authority, BranchId, Buyer, ConfigStatus, Currency, DocumentDraft, DocumentKind,
    DocumentLine, DocumentSource, FiscalConfig, InternalTax, Quantity, RateBps, SequenceScope,
    TaxpayerId,
};
use fisc_engine::SubmissionEngine;
use fisc_state::SubmissionState;

const TIN: &str = "C0000000000";
const RECEIPT_PATH: &str = "/vsdc/api/v1/taxpayer/C0000000000-001/post_receipt_Json.jsp";

async fn engine(server: &MockServer) -> (SubmissionEngine<HttpTransport>, FiscalConfig) {
    let engine = SubmissionEngine::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    let config = FiscalConfig::local_mock(Authority::GraEvat, &server.uri(), TIN).unwrap();
    let config = engine.register_config(config).await.unwrap();
    (engine, config)
}

fn sale(reference: &str) -> DocumentDraft {
    DocumentDraft {
        reference: reference.into(),
        taxpayer: TaxpayerId::new(TIN).unwrap(),
        branch: BranchId::new("001").unwrap(),
        kind: DocumentKind::Sale,
        source: DocumentSource::Invoice,
        original: None,
        credit_reason: None,
        buyer: Buyer::default(),
        currency: Currency::new("GHS").unwrap(),
        issued_at: NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap(),
        remark: None,
        lines: vec![DocumentLine {
            item_code: "GH-100".into(),
            classification_code: None,
            description: "Cement 50kg".into(),
            quantity: Quantity::units(1).unwrap(),
            unit_price: 100_000,
            discount: RateBps::ZERO,
            tax_inclusive: false,
            tax: Some(InternalTax::new("VAT 15%", RateBps::from_bps(1_500))),
        }],
    }
}

#[tokio::test]
async fn accepted_receipt_carries_sdc_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECEIPT_PATH))
        .and(header("security_key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SDC_ID": "SDC-GH-0001",
            "SDC_TIME": "2026-03-07 10:15:02",
            "INVOICE_NUMBER": "55",
            "INTERNAL_DATA": "AAAABBBBCCCCDDDD",
            "SIGNATURE": "SIGNATURE0001",
            "QRCODE_URL": "https://vsdc.example/verify/SIGNATURE0001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = engine(&server).await;
    let doc = engine.register_document(sale("GH/INV/0001")).await.unwrap();
    let result = engine.submit(doc.id).await.unwrap();
    assert!(result.is_accepted(), "{result:?}");

    let receipt = engine.get_receipt(doc.id).unwrap();
    assert_eq!(receipt.cu_invoice_number, "SDC-GH-0001/55");
    assert_eq!(receipt.formatted_internal_data(), "AAAA-BBBB-CCCC-DDDD");
    assert_eq!(
        receipt.verification_url.as_deref(),
        Some("https://vsdc.example/verify/SIGNATURE0001")
    );

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["TRANS_TYPE"], "SALE");
    assert_eq!(body["INVOICE_NUMBER"], "1");
    assert_eq!(body["INVOICE_DATE"], "2026-03-07");
    assert_eq!(body["CLIENT_NAME"], "CASH CUSTOMER");
    assert_eq!(body["TOTAL_AMOUNT"], 1200.0);
    assert_eq!(body["ITEMS"][0]["TAX_CODE"], "TAX_B");
}

#[tokio::test]
async fn rejected_numbers_are_never_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECEIPT_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("E604 Invalid TAX_CODE on item 1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RECEIPT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SDC_ID": "SDC-GH-0001",
            "INVOICE_NUMBER": "56",
            "INTERNAL_DATA": "AAAA",
            "SIGNATURE": "SIG"
        })))
        .mount(&server)
        .await;

    let (engine, _) = engine(&server).await;
    let first = engine.register_document(sale("GH/INV/0002")).await.unwrap();
    let rejected = engine.submit(first.id).await.unwrap();
    assert_eq!(rejected.status, SubmissionState::PermanentlyRejected);
    assert_eq!(rejected.code.as_deref(), Some("HTTP 400"));
    assert_eq!(rejected.error.as_deref(), Some("E604 Invalid TAX_CODE on item 1"));

    let second = engine.register_document(sale("GH/INV/0003")).await.unwrap();
    let accepted = engine.submit(second.id).await.unwrap();
    assert!(accepted.is_accepted());
    assert_eq!(rejected.sequence_number.unwrap().value(), 1);
    assert_eq!(accepted.sequence_number.unwrap().value(), 2);

    let scope = SequenceScope::new(TaxpayerId::new(TIN).unwrap(), BranchId::new("001").unwrap());
    assert_eq!(engine.current_sequence(&scope).await.unwrap(), 2);
}

#[tokio::test]
async fn connection_test_reports_bad_security_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/health"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, config) = engine(&server).await;
    let tested = engine.test_connection(config.id).await.unwrap();
    assert_eq!(tested.status, ConfigStatus::Error);
    assert!(tested.last_error.unwrap().contains("E907"));
}

#[tokio::test]
async fn connection_test_passes_when_sdc_is_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/health"))
        .and(header("security_key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "UP"})))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, config) = engine(&server).await;
    let tested = engine.test_connection(config.id).await.unwrap();
    assert_eq!(tested.status, ConfigStatus::Active);
    assert!(tested.last_error.is_none());
}
