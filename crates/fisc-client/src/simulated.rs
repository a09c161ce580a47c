//! Offline sandbox [`Transport`].
//!
//! Answers submit, health and initialisation requests the way the authority
//! sandboxes do, without leaving the process. Receipt numbers count up from
//! one per transport; signatures are the first 32 hex characters of
//! `sha256(invoice_number + receipt_number)`, so a given document and
//! counter always produce the same signature.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde_json::{json, Value};

use fisc_core::sha256_hex;

use crate::authority::{ETIMS_INIT_PATH, EVAT_RECEIPT_FILE};
use crate::error::TransportError;
use crate::transport::{Transport, TransportRequest, TransportResponse};
use fisc_payload::etims::SALES_PATH;

/// Signature length produced by the simulator.
const SIGNATURE_LEN: usize = 32;

/// In-process authority sandbox.
#[derive(Debug)]
pub struct SimulatedTransport {
    controller_id: String,
    receipts: AtomicU64,
}

impl SimulatedTransport {
    /// Simulator reporting `controller_id` as its control unit.
    pub fn new(controller_id: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            receipts: AtomicU64::new(0),
        }
    }

    /// Receipts issued so far.
    pub fn issued(&self) -> u64 {
        self.receipts.load(Ordering::SeqCst)
    }

    fn sign(invoice_number: &str, receipt_number: u64) -> String {
        let mut hex = sha256_hex(format!("{invoice_number}{receipt_number}"));
        hex.truncate(SIGNATURE_LEN);
        hex.to_uppercase()
    }

    fn internal_data(&self, invoice_number: &str) -> String {
        let mut hex = sha256_hex(format!("{}:{invoice_number}", self.controller_id));
        hex.truncate(SIGNATURE_LEN);
        hex.to_uppercase()
    }

    fn etims_sale(&self, body: &Value) -> Value {
        let invoice = text(&body["invcNo"]);
        let receipt = self.receipts.fetch_add(1, Ordering::SeqCst) + 1;
        json!({
            "resultCd": "000",
            "resultMsg": "It is succeeded",
            "resultDt": Utc::now().format("%Y%m%d%H%M%S").to_string(),
            "data": {
                "curRcptNo": receipt,
                "totRcptNo": receipt,
                "intrlData": self.internal_data(&invoice),
                "rcptSign": Self::sign(&invoice, receipt),
                "sdcDateTime": Utc::now().format("%Y%m%d%H%M%S").to_string(),
            }
        })
    }

    fn evat_receipt(&self, body: &Value) -> Value {
        let invoice = text(&body["INVOICE_NUMBER"]);
        let receipt = self.receipts.fetch_add(1, Ordering::SeqCst) + 1;
        let signature = Self::sign(&invoice, receipt);
        json!({
            "SDC_ID": self.controller_id,
            "SDC_TIME": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "INVOICE_NUMBER": receipt.to_string(),
            "INTERNAL_DATA": self.internal_data(&invoice),
            "SIGNATURE": signature,
            "QRCODE_URL": format!("https://sandbox.invalid/verify/{signature}"),
        })
    }

    fn answer(&self, request: &TransportRequest) -> TransportResponse {
        let body = request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_str::<Value>(b).ok())
            .unwrap_or(Value::Null);
        let path = request.url.split('?').next().unwrap_or_default();

        let (status, reply) = if path.ends_with(SALES_PATH) {
            (200, self.etims_sale(&body))
        } else if path.ends_with(EVAT_RECEIPT_FILE) {
            (200, self.evat_receipt(&body))
        } else if path.ends_with(ETIMS_INIT_PATH) {
            (
                200,
                json!({
                    "resultCd": "000",
                    "resultMsg": "It is succeeded",
                    "data": { "info": { "sdcId": self.controller_id } }
                }),
            )
        } else if path.ends_with("/health") {
            (200, json!({ "status": "UP" }))
        } else {
            (404, json!({ "message": format!("no such endpoint: {path}") }))
        };

        TransportResponse {
            status,
            body: reply.to_string(),
            elapsed_ms: 0,
        }
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Transport for SimulatedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        tracing::debug!(url = %request.url, "simulated authority request");
        Ok(self.answer(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn etims_sale_is_signed_and_counted() {
        let sim = SimulatedTransport::new("KRACU0100000001");
        let req = TransportRequest::post(
            format!("https://sbx{SALES_PATH}"),
            json!({ "invcNo": 7 }).to_string(),
        );
        let v: Value = serde_json::from_str(&sim.send(req.clone()).await.unwrap().body).unwrap();
        assert_eq!(v["resultCd"], "000");
        assert_eq!(v["data"]["curRcptNo"], 1);
        let sig = v["data"]["rcptSign"].as_str().unwrap().to_string();
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert_eq!(sig, SimulatedTransport::sign("7", 1));

        sim.send(req).await.unwrap();
        assert_eq!(sim.issued(), 2);
    }

    #[tokio::test]
    async fn evat_receipt_and_health() {
        let sim = SimulatedTransport::new("SDC-001");
        let url = "https://x/vsdc/api/v1/taxpayer/C0000000000-001/post_receipt_Json.jsp";
        let req = TransportRequest::post(url, json!({ "INVOICE_NUMBER": "12" }).to_string());
        let v = sim.send(req).await.unwrap().json().unwrap();
        assert_eq!(v["SDC_ID"], "SDC-001");
        assert_eq!(v["SIGNATURE"], SimulatedTransport::sign("12", 1));

        let health = TransportRequest::get("https://x/vsdc/api/v1/taxpayer/C0000000000-001/health");
        let v = sim.send(health).await.unwrap().json().unwrap();
        assert_eq!(v["status"], "UP");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let sim = SimulatedTransport::new("X");
        let resp = sim.send(TransportRequest::get("https://x/nope")).await.unwrap();
        assert_eq!(resp.status, 404);
    }
}
