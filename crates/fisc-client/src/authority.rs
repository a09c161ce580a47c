//! # Authority Request Building and Response Classification
//!
//! Turns a frozen [`Payload`] into the authority's HTTP request (URL and
//! authentication headers), and turns whatever comes back into exactly one
//! [`Classification`]:
//!
//! | Response | Classification |
//! |---|---|
//! | timeout, connection failure | `Transient` |
//! | HTTP 5xx, 408, 429 | `Transient` |
//! | HTTP 401, 403 | `Unauthorized` |
//! | other HTTP 4xx | `Rejected` |
//! | eTIMS `resultCd == "000"` with receipt data | `Accepted` |
//! | eTIMS transient result codes (894, 899, 999) | `Transient` |
//! | other eTIMS result codes | `Rejected`, `resultMsg` verbatim |
//! | E-VAT 200/201 with a signature | `Accepted` |
//! | 2xx that cannot be parsed or lacks receipt data | `Transient` |
//!
//! Anything ambiguous is transient: the document stays retryable and the
//! reserved sequence number is kept. A credential refusal is kept apart
//! from both: it says nothing about the document.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use fisc_core::receipt::cu_invoice_number;
use fisc_core::{Authority, DocumentId, FiscalConfig, Receipt, Timestamp};
use fisc_payload::{etims, evat, Payload};

use crate::error::{ClientError, TransportError};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// eTIMS device initialisation path, used as the connection test.
pub const ETIMS_INIT_PATH: &str = "/selectInitOsdcInfo";

/// Last path segment of the E-VAT receipt endpoint.
pub const EVAT_RECEIPT_FILE: &str = "post_receipt_Json.jsp";

/// eTIMS success result code.
pub const ETIMS_SUCCESS: &str = "000";

/// eTIMS result codes that signal a server-side fault rather than a
/// problem with the document.
pub const ETIMS_TRANSIENT_CODES: &[&str] = &["894", "899", "999"];

/// Longest authority message kept from a non-JSON error body.
const MAX_MESSAGE_LEN: usize = 500;

// ─── Receipts ───────────────────────────────────────────────────────────

/// Receipt fields extracted from a successful authority response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityReceipt {
    /// Receipt signature.
    pub signature: String,
    /// Internal data.
    pub internal_data: String,
    /// Control unit / SDC identifier.
    pub controller_id: String,
    /// Receipt number.
    pub receipt_number: String,
    /// Total receipt counter.
    pub total_receipt_number: Option<String>,
    /// Authority timestamp, verbatim.
    pub server_time: Option<String>,
    /// Verification URL.
    pub verification_url: Option<String>,
    /// The full response body.
    pub raw: Value,
}

impl AuthorityReceipt {
    /// The durable receipt for `document_id`.
    pub fn into_receipt(
        self,
        document_id: DocumentId,
        authority: Authority,
        document_time: NaiveDateTime,
        recorded_at: Timestamp,
    ) -> Receipt {
        let cu = cu_invoice_number(&self.controller_id, &self.receipt_number);
        Receipt {
            document_id,
            authority,
            signature: self.signature,
            internal_data: self.internal_data,
            controller_id: self.controller_id,
            receipt_number: self.receipt_number,
            total_receipt_number: self.total_receipt_number,
            server_time: self.server_time,
            document_time,
            cu_invoice_number: cu,
            verification_url: self.verification_url,
            raw_response: self.raw,
            recorded_at,
        }
    }
}

// ─── Classification ─────────────────────────────────────────────────────

/// The single interpretation of one submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Definitive success.
    Accepted(AuthorityReceipt),
    /// Definitive business rejection.
    Rejected {
        /// Authority result code or `HTTP nnn`.
        code: String,
        /// Authority message, verbatim.
        message: String,
    },
    /// The authority refused the credentials (HTTP 401/403). The document
    /// itself was never judged.
    Unauthorized {
        /// `HTTP 401` or `HTTP 403`.
        code: String,
        /// Authority message, verbatim.
        message: String,
    },
    /// Transient or ambiguous failure.
    Transient {
        /// Authority result code or `HTTP nnn`, when a response arrived.
        code: Option<String>,
        /// Description.
        message: String,
    },
}

impl Classification {
    /// `accepted`, `rejected`, `unauthorized` or `transient`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Transient { .. } => "transient",
        }
    }

    /// Whether the document may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Unauthorized { .. })
    }

    /// Result code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected { code, .. } | Self::Unauthorized { code, .. } => Some(code),
            Self::Transient { code, .. } => code.as_deref(),
        }
    }

    /// Failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Transient { message, .. } => Some(message),
        }
    }
}

impl From<&TransportError> for Classification {
    fn from(err: &TransportError) -> Self {
        Self::Transient {
            code: None,
            message: err.to_string(),
        }
    }
}

/// Classify a transport result.
pub fn classify_result(
    config: &FiscalConfig,
    result: &Result<TransportResponse, TransportError>,
) -> Classification {
    match result {
        Ok(resp) => classify(config, resp),
        Err(err) => Classification::from(err),
    }
}

/// Classify an authority response.
pub fn classify(config: &FiscalConfig, response: &TransportResponse) -> Classification {
    let status = response.status;
    if status >= 500 || status == 408 || status == 429 {
        return Classification::Transient {
            code: Some(format!("HTTP {status}")),
            message: error_message(response),
        };
    }
    if status == 401 || status == 403 {
        return Classification::Unauthorized {
            code: format!("HTTP {status}"),
            message: error_message(response),
        };
    }
    if !response.is_success() {
        return Classification::Rejected {
            code: error_code(response),
            message: error_message(response),
        };
    }
    let Some(body) = response.json() else {
        return Classification::Transient {
            code: Some(format!("HTTP {status}")),
            message: "response body is not JSON".into(),
        };
    };
    match config.authority {
        Authority::KraEtims => classify_etims(config, body),
        Authority::GraEvat => classify_evat(body),
    }
}

fn classify_etims(config: &FiscalConfig, body: Value) -> Classification {
    let code = field(&body, &["resultCd"]).unwrap_or_default();
    let message = field(&body, &["resultMsg"]).unwrap_or_default();
    if code != ETIMS_SUCCESS {
        return if ETIMS_TRANSIENT_CODES.contains(&code.as_str()) || code.is_empty() {
            Classification::Transient {
                code: Some(code).filter(|c| !c.is_empty()),
                message,
            }
        } else {
            Classification::Rejected { code, message }
        };
    }

    let data = &body["data"];
    let (Some(signature), Some(receipt_number)) = (
        field(data, &["rcptSign"]),
        field(data, &["curRcptNo", "rcptNo"]),
    ) else {
        return Classification::Transient {
            code: Some(code),
            message: "success response without receipt data".into(),
        };
    };
    let controller_id = config
        .device_serial
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| field(data, &["sdcId"]))
        .unwrap_or_default();
    Classification::Accepted(AuthorityReceipt {
        signature,
        internal_data: field(data, &["intrlData"]).unwrap_or_default(),
        controller_id,
        receipt_number,
        total_receipt_number: field(data, &["totRcptNo"]),
        server_time: field(data, &["sdcDateTime"]),
        verification_url: None,
        raw: body,
    })
}

fn classify_evat(body: Value) -> Classification {
    let Some(signature) = field(&body, &["SIGNATURE", "signature"]) else {
        return Classification::Transient {
            code: field(&body, &["CODE", "code", "STATUS", "status"]),
            message: field(&body, &["MESSAGE", "message"])
                .unwrap_or_else(|| "success response without signature".into()),
        };
    };
    Classification::Accepted(AuthorityReceipt {
        signature,
        internal_data: field(&body, &["INTERNAL_DATA", "internalData"]).unwrap_or_default(),
        controller_id: field(&body, &["SDC_ID", "sdc_id"]).unwrap_or_default(),
        receipt_number: field(&body, &["INVOICE_NUMBER", "invoice_number"]).unwrap_or_default(),
        total_receipt_number: None,
        server_time: field(&body, &["SDC_TIME", "sdc_time"]),
        verification_url: field(&body, &["QRCODE_URL", "QRCodeURL"]),
        raw: body,
    })
}

/// First non-empty value among `keys`, numbers rendered as text.
fn field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn error_code(response: &TransportResponse) -> String {
    response
        .json()
        .and_then(|v| field(&v, &["resultCd", "CODE", "code"]))
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

fn error_message(response: &TransportResponse) -> String {
    if let Some(msg) = response
        .json()
        .and_then(|v| field(&v, &["resultMsg", "MESSAGE", "message", "error"]))
    {
        return msg;
    }
    if response.body.trim().is_empty() {
        return format!("HTTP {}", response.status);
    }
    response.body.chars().take(MAX_MESSAGE_LEN).collect()
}

// ─── Requests ───────────────────────────────────────────────────────────

fn checked_header(name: &str, value: &str) -> Result<(), ClientError> {
    if value.is_empty() {
        return Err(ClientError::InvalidCredentials {
            header: name.to_string(),
            reason: "is empty".into(),
        });
    }
    reqwest::header::HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|_| ClientError::InvalidCredentials {
            header: name.to_string(),
            reason: "contains characters not allowed in a header".into(),
        })
}

fn authenticate(
    config: &FiscalConfig,
    request: TransportRequest,
) -> Result<TransportRequest, ClientError> {
    let key = config.credential.expose();
    match config.authority {
        Authority::KraEtims => {
            checked_header("cmcKey", key)?;
            Ok(request
                .header("tin", config.taxpayer.as_str())
                .header("bhfId", config.branch.as_str())
                .header("cmcKey", key))
        }
        Authority::GraEvat => {
            checked_header("security_key", key)?;
            Ok(request
                .header("Accept", "application/json")
                .header("security_key", key))
        }
    }
}

/// The submit request carrying `payload` byte for byte.
pub fn submit_request(
    config: &FiscalConfig,
    payload: &Payload,
) -> Result<TransportRequest, ClientError> {
    let base = config.base_url_str()?;
    let path = match config.authority {
        Authority::KraEtims => etims::SALES_PATH.to_string(),
        Authority::GraEvat => evat::receipt_path(&config.taxpayer, &config.branch),
    };
    authenticate(
        config,
        TransportRequest::post(format!("{base}{path}"), payload.body.clone()),
    )
}

/// The connection-test request.
pub fn health_request(config: &FiscalConfig) -> Result<TransportRequest, ClientError> {
    let base = config.base_url_str()?;
    let request = match config.authority {
        Authority::KraEtims => TransportRequest::post(
            format!("{base}{ETIMS_INIT_PATH}"),
            json!({
                "tin": config.taxpayer.as_str(),
                "bhfId": config.branch.as_str(),
                "dvcSrlNo": config.device_serial.clone().unwrap_or_default(),
            })
            .to_string(),
        ),
        Authority::GraEvat => TransportRequest::get(format!(
            "{base}{}",
            evat::health_path(&config.taxpayer, &config.branch)
        )),
    };
    authenticate(config, request)
}

/// Probe the authority with the configured credentials.
pub async fn test_connection<T: Transport>(
    transport: &T,
    config: &FiscalConfig,
) -> Result<(), ClientError> {
    let response = transport.send(health_request(config)?).await?;
    let body = response.json().unwrap_or(Value::Null);
    match config.authority {
        Authority::KraEtims => {
            let code = field(&body, &["resultCd"]);
            if response.is_success() && code.as_deref() == Some(ETIMS_SUCCESS) {
                return Ok(());
            }
            Err(ClientError::ConnectionTest {
                status: code.unwrap_or_else(|| format!("HTTP {}", response.status)),
                message: error_message(&response),
            })
        }
        Authority::GraEvat => {
            if response.status == 200 && field(&body, &["status"]).as_deref() == Some("UP") {
                return Ok(());
            }
            if response.status == 403 {
                return Err(ClientError::ConnectionTest {
                    status: "E907".into(),
                    message: "invalid security key or taxpayer reference".into(),
                });
            }
            Err(ClientError::ConnectionTest {
                status: format!("HTTP {}", response.status),
                message: error_message(&response),
            })
        }
    }
}
