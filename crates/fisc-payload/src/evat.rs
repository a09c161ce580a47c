//! # Ghana E-VAT Receipt Payload
//!
//! Builds the JSON body posted to
//! `{base}/vsdc/api/v1/taxpayer/{tin}-{branch}/post_receipt_Json.jsp`.
//! Dates are `YYYY-MM-DD`, times `YYYY-MM-DD HH:MM:SS`, amounts JSON
//! numbers in cedis. Standard-rated lines carry NHIL (`LEVY_A`) and GETFund
//! (`LEVY_B`), plus the COVID-19 levy (`LEVY_D`) when enabled.

use serde::Serialize;

use fisc_core::temporal::{iso_date, iso_datetime};
use fisc_core::{Authority, BranchId, CreditNoteReason, DocumentKind, FiscalConfig, TaxpayerId};
use fisc_tax::{LevyCode, CATEGORY_COUNT};

use crate::builder::{accumulate, clip, preflight, reconcile, PayloadBuilder};
use crate::error::PayloadError;
use crate::payload::{Payload, PreparedDocument};

/// Buyer name reported for anonymous sales.
pub const CASH_CUSTOMER: &str = "CASH CUSTOMER";

/// Submit path for a taxpayer branch, relative to the E-VAT base URL.
pub fn receipt_path(taxpayer: &TaxpayerId, branch: &BranchId) -> String {
    format!("/vsdc/api/v1/taxpayer/{taxpayer}-{branch}/post_receipt_Json.jsp")
}

/// Health path for a taxpayer branch, relative to the E-VAT base URL.
pub fn health_path(taxpayer: &TaxpayerId, branch: &BranchId) -> String {
    format!("/vsdc/api/v1/taxpayer/{taxpayer}-{branch}/health")
}

/// E-VAT refund reason (`REFUND_REASON`).
pub fn refund_reason_code(reason: CreditNoteReason) -> &'static str {
    match reason {
        CreditNoteReason::Damaged
        | CreditNoteReason::WrongItem
        | CreditNoteReason::QualityIssue
        | CreditNoteReason::ChangeOfMind => "RETURN",
        CreditNoteReason::PriceDispute | CreditNoteReason::QuantityDispute => "ADJUSTMENT",
        CreditNoteReason::Cancellation | CreditNoteReason::Duplicate => "CANCELLATION",
        CreditNoteReason::LateDelivery | CreditNoteReason::Other => "OTHER",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ReceiptRequest {
    trans_type: &'static str,
    invoice_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_reason: Option<&'static str>,
    invoice_date: String,
    invoice_time: String,
    client_tin: String,
    client_name: String,
    client_address: String,
    items: Vec<Item>,
    tax_a_base: f64,
    tax_a_amt: f64,
    tax_b_base: f64,
    tax_b_amt: f64,
    tax_c_base: f64,
    tax_c_amt: f64,
    tax_d_base: f64,
    tax_d_amt: f64,
    tax_e_base: f64,
    tax_e_amt: f64,
    levy_a_amt: f64,
    levy_b_amt: f64,
    levy_d_amt: f64,
    total_base: f64,
    total_tax: f64,
    total_levy: f64,
    total_amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct Item {
    item_seq: usize,
    item_code: String,
    item_desc: String,
    unit_price: f64,
    quantity: f64,
    discount_amt: f64,
    tax_code: String,
    tax_rate: f64,
    tax_amt: f64,
    levy_a_amt: f64,
    levy_b_amt: f64,
    levy_d_amt: f64,
    total_amt: f64,
}

/// Ghana E-VAT payload builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvatBuilder;

impl PayloadBuilder for EvatBuilder {
    fn authority(&self) -> Authority {
        Authority::GraEvat
    }

    fn build(&self, doc: &PreparedDocument, config: &FiscalConfig) -> Result<Payload, PayloadError> {
        let original = preflight(doc, config, Authority::GraEvat)?;
        let draft = &doc.draft;
        let currency = &draft.currency;
        let major = |minor: i64| currency.to_major(minor);

        let mut base = [0i64; CATEGORY_COUNT];
        let mut tax = [0i64; CATEGORY_COUNT];
        let (mut nhil, mut getfund, mut covid) = (0i64, 0i64, 0i64);
        let mut total = 0i64;
        let mut items = Vec::with_capacity(doc.mapped.lines.len());
        for line in &doc.mapped.lines {
            let slot = line.code.slot();
            accumulate("TAXABLE_AMOUNT", &mut base[slot], line.taxable)?;
            accumulate("TAX_AMOUNT", &mut tax[slot], line.tax)?;
            let (a, b, d) = (
                line.levy(LevyCode::Nhil),
                line.levy(LevyCode::GetFund),
                line.levy(LevyCode::Covid19),
            );
            accumulate("LEVY_AMOUNT_A", &mut nhil, a)?;
            accumulate("LEVY_AMOUNT_B", &mut getfund, b)?;
            accumulate("LEVY_AMOUNT_D", &mut covid, d)?;
            accumulate("TOTAL_AMOUNT", &mut total, line.total)?;
            items.push(Item {
                item_seq: line.seq,
                item_code: clip(&line.line.item_code, 50),
                item_desc: clip(&line.line.description, 100),
                unit_price: major(line.line.unit_price),
                quantity: line.line.quantity.as_f64(),
                discount_amt: major(line.discount),
                tax_code: line.code.wire_code(),
                tax_rate: line.code.rate().as_percent(),
                tax_amt: major(line.tax),
                levy_a_amt: major(a),
                levy_b_amt: major(b),
                levy_d_amt: major(d),
                total_amt: major(line.total),
            });
        }

        let totals = &doc.mapped.totals;
        for (i, letter) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            reconcile(
                &format!("TAX_{letter}_BASE"),
                base[i],
                totals.by_category[i].taxable,
            )?;
            reconcile(&format!("TAX_{letter}_AMT"), tax[i], totals.by_category[i].tax)?;
        }
        reconcile("LEVY_A_AMT", nhil, totals.levy_amount(LevyCode::Nhil))?;
        reconcile("LEVY_B_AMT", getfund, totals.levy_amount(LevyCode::GetFund))?;
        reconcile("LEVY_D_AMT", covid, totals.levy_amount(LevyCode::Covid19))?;
        reconcile("TOTAL_BASE", base.iter().sum(), totals.taxable)?;
        reconcile("TOTAL_TAX", tax.iter().sum(), totals.tax)?;
        reconcile("TOTAL_LEVY", nhil + getfund + covid, totals.levy)?;
        reconcile("TOTAL_AMOUNT", total, totals.total)?;

        let is_refund = draft.kind == DocumentKind::CreditNote;
        let request = ReceiptRequest {
            trans_type: if is_refund { "REFUND" } else { "SALE" },
            invoice_number: doc.sequence_number.to_string(),
            original_invoice_number: original.map(|n| n.to_string()),
            refund_reason: draft
                .credit_reason
                .filter(|_| is_refund)
                .map(refund_reason_code),
            invoice_date: iso_date(&draft.issued_at),
            invoice_time: iso_datetime(&draft.issued_at),
            client_tin: draft.buyer.tin().unwrap_or_default().to_string(),
            client_name: clip(draft.buyer.name().unwrap_or(CASH_CUSTOMER), 100),
            client_address: clip(draft.buyer.address.as_deref().unwrap_or_default(), 200),
            items,
            tax_a_base: major(base[0]),
            tax_a_amt: major(tax[0]),
            tax_b_base: major(base[1]),
            tax_b_amt: major(tax[1]),
            tax_c_base: major(base[2]),
            tax_c_amt: major(tax[2]),
            tax_d_base: major(base[3]),
            tax_d_amt: major(tax[3]),
            tax_e_base: major(base[4]),
            tax_e_amt: major(tax[4]),
            levy_a_amt: major(nhil),
            levy_b_amt: major(getfund),
            levy_d_amt: major(covid),
            total_base: major(totals.taxable),
            total_tax: major(totals.tax),
            total_levy: major(totals.levy),
            total_amount: major(totals.total),
        };

        let body = serde_json::to_string(&request)?;
        Ok(Payload::new(Authority::GraEvat, doc.sequence_number, body))
    }
}
