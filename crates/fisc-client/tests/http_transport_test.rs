//! HTTP transport and authority classification against wiremock servers.

use std::time::Duration;

use fisc_client::{
    classify_result, submit_request, test_connection, Classification, ClientError, HttpTransport,
    Transport, TransportError,
};
use fisc_core::{Authority, FiscalConfig, SequenceNumber};
use fisc_payload::Payload;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn etims_config(server: &MockServer) -> FiscalConfig {
    let mut config =
        FiscalConfig::local_mock(Authority::KraEtims, &server.uri(), "P051234567X").expect("config");
    config.device_serial = Some("KRACU0100000001".into());
    config
}

fn evat_config(server: &MockServer) -> FiscalConfig {
    FiscalConfig::local_mock(Authority::GraEvat, &server.uri(), "C0000000000").expect("config")
}

fn payload(authority: Authority, body: &str) -> Payload {
    Payload::new(authority, SequenceNumber::new(7).expect("seq"), body.to_string())
}

#[tokio::test]
async fn etims_submit_is_sent_verbatim_and_accepted() {
    let server = MockServer::start().await;
    let body = r#"{"invcNo":7,"totAmt":1160.0}"#;

    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .and(header("tin", "P051234567X"))
        .and(header("bhfId", "00"))
        .and(header("cmcKey", "test-key"))
        .and(body_string(body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resultCd": "000",
            "resultMsg": "It is succeeded",
            "data": {
                "curRcptNo": 12,
                "totRcptNo": 340,
                "intrlData": "QWERTYUIOPASDFGH",
                "rcptSign": "ZXCVBNMLKJHGFDSA",
                "sdcDateTime": "20260307101502"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = etims_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    let request = submit_request(&config, &payload(Authority::KraEtims, body)).expect("request");
    let result = transport.send(request).await;

    let Classification::Accepted(receipt) = classify_result(&config, &result) else {
        panic!("expected accepted, got {result:?}");
    };
    assert_eq!(receipt.receipt_number, "12");
    assert_eq!(receipt.controller_id, "KRACU0100000001");
    assert_eq!(receipt.server_time.as_deref(), Some("20260307101502"));
}

#[tokio::test]
async fn evat_rejection_keeps_authority_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/post_receipt_Json.jsp"))
        .and(header("security_key", "test-key"))
        .respond_with(ResponseTemplate::new(400).set_body_string("E604 Invalid TAX_CODE on item 1"))
        .expect(1)
        .mount(&server)
        .await;

    let config = evat_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    let request = submit_request(&config, &payload(Authority::GraEvat, "{}")).expect("request");
    let result = transport.send(request).await;

    match classify_result(&config, &result) {
        Classification::Rejected { code, message } => {
            assert_eq!(code, "HTTP 400");
            assert_eq!(message, "E604 Invalid TAX_CODE on item 1");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_security_key_is_unauthorized_not_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/post_receipt_Json.jsp"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let config = evat_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    let request = submit_request(&config, &payload(Authority::GraEvat, "{}")).expect("request");
    match classify_result(&config, &transport.send(request).await) {
        Classification::Unauthorized { code, message } => {
            assert_eq!(code, "HTTP 401");
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("expected unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let config = etims_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    let request = submit_request(&config, &payload(Authority::KraEtims, "{}")).expect("request");
    let classification = classify_result(&config, &transport.send(request).await);
    assert!(classification.is_retryable());
    assert_eq!(classification.code(), Some("HTTP 503"));
}

#[tokio::test]
async fn slow_authority_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/saveTrnsSalesOsdc"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;

    let config = etims_config(&server);
    let transport = HttpTransport::new(Duration::from_millis(100)).expect("transport");
    let request = submit_request(&config, &payload(Authority::KraEtims, "{}")).expect("request");
    let result = transport.send(request).await;
    assert!(matches!(result, Err(TransportError::Timeout { .. })));
    assert!(classify_result(&config, &result).is_retryable());
}

#[tokio::test]
async fn evat_connection_test() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "UP"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = evat_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    test_connection(&transport, &config).await.expect("healthy");
}

#[tokio::test]
async fn evat_connection_test_bad_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vsdc/api/v1/taxpayer/C0000000000-001/health"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let config = evat_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    match test_connection(&transport, &config).await {
        Err(ClientError::ConnectionTest { status, .. }) => assert_eq!(status, "E907"),
        other => panic!("expected E907, got {other:?}"),
    }
}

#[tokio::test]
async fn etims_connection_test_reports_result_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/selectInitOsdcInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resultCd": "901",
            "resultMsg": "It is not valid device"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = etims_config(&server);
    let transport = HttpTransport::for_config(&config).expect("transport");
    match test_connection(&transport, &config).await {
        Err(ClientError::ConnectionTest { status, message }) => {
            assert_eq!(status, "901");
            assert_eq!(message, "It is not valid device");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
