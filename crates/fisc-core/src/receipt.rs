//! # Fiscal Receipts
//!
//! The signed artifact an authority returns for an accepted document, plus
//! the pure helpers that render it for printing: dash-grouped signature and
//! internal data, the CU invoice number, the receipt counter line and the
//! QR payload string.
//!
//! All helpers are pure: identical inputs always yield byte-identical
//! output, so receipts can be reprinted years later and still match.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::authority::Authority;
use crate::identity::DocumentId;
use crate::temporal::{qr_date_time, Timestamp};

/// Characters per dash-separated group on printed receipts.
pub const DASH_GROUP_SIZE: usize = 4;

/// The authority's signed acknowledgement of an accepted document.
///
/// Written exactly once per document; never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// The accepted document.
    pub document_id: DocumentId,
    /// Authority that signed it.
    pub authority: Authority,
    /// Receipt signature.
    pub signature: String,
    /// Internal data (encrypted counters) returned by the controller.
    pub internal_data: String,
    /// Control unit / SDC identifier.
    pub controller_id: String,
    /// Receipt number assigned by the controller.
    pub receipt_number: String,
    /// Total receipt counter, where the authority reports one.
    #[serde(default)]
    pub total_receipt_number: Option<String>,
    /// Authority server timestamp, verbatim.
    #[serde(default)]
    pub server_time: Option<String>,
    /// Local date and time printed on the document.
    pub document_time: NaiveDateTime,
    /// `{controller_id}/{receipt_number}`.
    pub cu_invoice_number: String,
    /// Public verification URL, where the authority returns one.
    #[serde(default)]
    pub verification_url: Option<String>,
    /// The full authority response body.
    pub raw_response: serde_json::Value,
    /// When the engine recorded the receipt.
    pub recorded_at: Timestamp,
}

impl Receipt {
    /// Signature grouped for printing.
    pub fn formatted_signature(&self) -> String {
        format_with_dashes(&self.signature)
    }

    /// Internal data grouped for printing.
    pub fn formatted_internal_data(&self) -> String {
        format_with_dashes(&self.internal_data)
    }

    /// QR payload for this receipt.
    pub fn qr_content(&self) -> String {
        format_qr_content(self)
    }

    /// Counter line for a printed receipt, e.g. `"153/153 NS"`. The total
    /// falls back to the receipt number when the authority reports none.
    ///
    /// `None` when either counter is not numeric or the label does not
    /// exist (proforma credit notes).
    pub fn counter_line(&self, transaction: TransactionType, kind: ReceiptKind) -> Option<String> {
        let label = receipt_label(transaction, kind)?;
        let current: u64 = self.receipt_number.trim().parse().ok()?;
        let total: u64 = match &self.total_receipt_number {
            Some(total) => total.trim().parse().ok()?,
            None => current,
        };
        Some(format_receipt_counter(current, total, label))
    }
}

/// Strip dashes and whitespace, then regroup in blocks of four separated by
/// `-` (`"ABCDEFGHIJ"` → `"ABCD-EFGH-IJ"`).
pub fn format_with_dashes(data: &str) -> String {
    let clean: Vec<char> = data
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '\t' | '\n' | '\r'))
        .collect();
    clean
        .chunks(DASH_GROUP_SIZE)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// `{controller}/{receipt_number}`, or empty if either part is missing.
pub fn cu_invoice_number(controller_id: &str, receipt_number: &str) -> String {
    if controller_id.is_empty() || receipt_number.is_empty() {
        return String::new();
    }
    format!("{controller_id}/{receipt_number}")
}

/// Receipt counter line: `"{current}/{total} {label}"`.
pub fn format_receipt_counter(current: u64, total: u64, label: &str) -> String {
    format!("{current}/{total} {label}")
}

/// QR payload: `ddmmyyyy#hhmmss#controller#receipt_number#internal_data#signature`,
/// dated with the document's own date-time.
pub fn format_qr_content(receipt: &Receipt) -> String {
    let (date, time) = qr_date_time(&receipt.document_time);
    [
        date.as_str(),
        time.as_str(),
        receipt.controller_id.as_str(),
        receipt.receipt_number.as_str(),
        receipt.internal_data.as_str(),
        receipt.signature.as_str(),
    ]
    .join("#")
}

/// How a receipt was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Ordinary fiscal receipt.
    Normal,
    /// Reprint of an earlier receipt.
    Copy,
    /// Issued in training mode.
    Training,
    /// Quotation, not a sale.
    Proforma,
}

/// Sale or credit-note receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    /// Sales receipt.
    Sale,
    /// Credit-note receipt.
    CreditNote,
}

/// Two-letter receipt type label (NS, NC, CS, CC, TS, TC, PS).
///
/// Proforma credit notes do not exist and yield `None`.
pub fn receipt_label(transaction: TransactionType, kind: ReceiptKind) -> Option<&'static str> {
    match (transaction, kind) {
        (TransactionType::Normal, ReceiptKind::Sale) => Some("NS"),
        (TransactionType::Normal, ReceiptKind::CreditNote) => Some("NC"),
        (TransactionType::Copy, ReceiptKind::Sale) => Some("CS"),
        (TransactionType::Copy, ReceiptKind::CreditNote) => Some("CC"),
        (TransactionType::Training, ReceiptKind::Sale) => Some("TS"),
        (TransactionType::Training, ReceiptKind::CreditNote) => Some("TC"),
        (TransactionType::Proforma, ReceiptKind::Sale) => Some("PS"),
        (TransactionType::Proforma, ReceiptKind::CreditNote) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn receipt() -> Receipt {
        Receipt {
            document_id: DocumentId::new(),
            authority: Authority::KraEtims,
            signature: "V249J39C3MFA6N3G".into(),
            internal_data: "7YHSEFMJ2XU5NFBLHI6QVL6BGQ".into(),
            controller_id: "KRACU0100000001".into(),
            receipt_number: "153".into(),
            total_receipt_number: Some("153".into()),
            server_time: Some("20260307101502".into()),
            document_time: NaiveDate::from_ymd_opt(2026, 3, 7)
                .and_then(|d| d.and_hms_opt(10, 15, 0))
                .unwrap(),
            cu_invoice_number: "KRACU0100000001/153".into(),
            verification_url: None,
            raw_response: serde_json::json!({"resultCd": "000"}),
            recorded_at: Timestamp::now(),
        }
    }

    #[test]
    fn dashes_group_by_four() {
        assert_eq!(format_with_dashes("ABCDEFGHIJ"), "ABCD-EFGH-IJ");
        assert_eq!(format_with_dashes("AB-CD EF\tGH\n"), "ABCD-EFGH");
        assert_eq!(format_with_dashes(""), "");
        assert_eq!(format_with_dashes("ABCD"), "ABCD");
    }

    #[test]
    fn qr_content_layout() {
        let r = receipt();
        assert_eq!(
            format_qr_content(&r),
            "07032026#101500#KRACU0100000001#153#7YHSEFMJ2XU5NFBLHI6QVL6BGQ#V249J39C3MFA6N3G"
        );
    }

    #[test]
    fn qr_content_ignores_recording_time() {
        let a = receipt();
        let mut b = a.clone();
        b.recorded_at = a.recorded_at.plus_secs(3600);
        b.raw_response = serde_json::json!({"other": true});
        assert_eq!(format_qr_content(&a), format_qr_content(&b));
    }

    #[test]
    fn cu_number_and_counter() {
        assert_eq!(cu_invoice_number("KRACU01", "12345"), "KRACU01/12345");
        assert_eq!(cu_invoice_number("", "12345"), "");
        assert_eq!(format_receipt_counter(123, 500, "NS"), "123/500 NS");
    }

    #[test]
    fn labels() {
        assert_eq!(
            receipt_label(TransactionType::Normal, ReceiptKind::CreditNote),
            Some("NC")
        );
        assert_eq!(
            receipt_label(TransactionType::Training, ReceiptKind::Sale),
            Some("TS")
        );
        assert_eq!(
            receipt_label(TransactionType::Proforma, ReceiptKind::CreditNote),
            None
        );
    }

    #[test]
    fn counter_line_uses_the_receipt_counters() {
        let mut r = receipt();
        r.total_receipt_number = Some("500".into());
        assert_eq!(
            r.counter_line(TransactionType::Normal, ReceiptKind::CreditNote).as_deref(),
            Some("153/500 NC")
        );
        r.total_receipt_number = None;
        assert_eq!(
            r.counter_line(TransactionType::Copy, ReceiptKind::Sale).as_deref(),
            Some("153/153 CS")
        );
        assert!(r
            .counter_line(TransactionType::Proforma, ReceiptKind::CreditNote)
            .is_none());
        r.receipt_number = "R-153".into();
        assert!(r.counter_line(TransactionType::Normal, ReceiptKind::Sale).is_none());
    }

    #[test]
    fn formatted_views() {
        let r = receipt();
        assert_eq!(r.formatted_signature(), "V249-J39C-3MFA-6N3G");
        assert_eq!(r.qr_content(), format_qr_content(&r));
    }

    proptest! {
        #[test]
        fn dashes_preserve_content(s in "[A-Z0-9]{0,64}") {
            let formatted = format_with_dashes(&s);
            prop_assert_eq!(formatted.replace('-', ""), s.clone());
            prop_assert!(formatted.split('-').all(|g| g.len() <= 4));
            prop_assert_eq!(format_with_dashes(&formatted), formatted);
        }
    }
}
