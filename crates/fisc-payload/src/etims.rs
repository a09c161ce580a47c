//! # Kenya eTIMS Sales Payload
//!
//! Builds the OSCU `TrnsSalesSaveWrReq` body posted to `/saveTrnsSalesOsdc`.
//! Dates are `YYYYMMDD`, date-times `YYYYMMDDHHmmss`, amounts JSON numbers
//! in shillings. `invcNo` is the engine's gapless sequence number.

use serde::Serialize;

use fisc_core::temporal::{compact_date, compact_datetime};
use fisc_core::{Authority, CreditNoteReason, DocumentKind, FiscalConfig};
use fisc_tax::{EtimsTaxType, CATEGORY_COUNT};

use crate::builder::{accumulate, clip, preflight, reconcile, PayloadBuilder};
use crate::error::PayloadError;
use crate::payload::{Payload, PreparedDocument};

/// Submit path relative to the eTIMS base URL.
pub const SALES_PATH: &str = "/saveTrnsSalesOsdc";

/// Buyer name reported for anonymous sales.
pub const CASH_CUSTOMER: &str = "Cash Customer";

/// Registrant recorded on every transaction.
const REGISTRANT_ID: &str = "fisc";
const REGISTRANT_NAME: &str = "Fiscal Engine";

/// eTIMS refund reason (`rfdRsnCd`): 01 Return, 02 Incorrect information,
/// 03 Omission, 04 Cancellation, 05 Other.
pub fn refund_reason_code(reason: CreditNoteReason) -> &'static str {
    match reason {
        CreditNoteReason::Damaged | CreditNoteReason::QualityIssue => "01",
        CreditNoteReason::WrongItem | CreditNoteReason::PriceDispute => "02",
        CreditNoteReason::QuantityDispute => "03",
        CreditNoteReason::Cancellation => "04",
        CreditNoteReason::ChangeOfMind
        | CreditNoteReason::LateDelivery
        | CreditNoteReason::Duplicate
        | CreditNoteReason::Other => "05",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SalesRequest {
    trd_invc_no: String,
    invc_no: u64,
    org_invc_no: u64,
    cust_tin: String,
    cust_nm: String,
    rcpt_ty_cd: &'static str,
    pmt_ty_cd: &'static str,
    sales_stts_cd: &'static str,
    cfm_dt: String,
    sales_dt: String,
    stock_rls_dt: String,
    cncl_req_dt: String,
    cncl_dt: String,
    rfd_dt: String,
    rfd_rsn_cd: String,
    tot_item_cnt: usize,
    taxbl_amt_a: f64,
    taxbl_amt_b: f64,
    taxbl_amt_c: f64,
    taxbl_amt_d: f64,
    taxbl_amt_e: f64,
    tax_rt_a: f64,
    tax_rt_b: f64,
    tax_rt_c: f64,
    tax_rt_d: f64,
    tax_rt_e: f64,
    tax_amt_a: f64,
    tax_amt_b: f64,
    tax_amt_c: f64,
    tax_amt_d: f64,
    tax_amt_e: f64,
    tot_taxbl_amt: f64,
    tot_tax_amt: f64,
    tot_amt: f64,
    prchr_acptc_yn: &'static str,
    remark: String,
    regr_id: &'static str,
    regr_nm: &'static str,
    modr_id: &'static str,
    modr_nm: &'static str,
    receipt: ReceiptBlock,
    item_list: Vec<Item>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBlock {
    cust_tin: String,
    cust_mbl_no: String,
    rcpt_pbct_dt: String,
    trde_nm: String,
    adrs: String,
    top_msg: String,
    btm_msg: String,
    prchr_acptc_yn: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    item_seq: usize,
    item_cd: String,
    item_cls_cd: String,
    item_nm: String,
    pkg_unit_cd: &'static str,
    pkg: u32,
    qty_unit_cd: &'static str,
    qty: f64,
    prc: f64,
    sply_amt: f64,
    dc_rt: f64,
    dc_amt: f64,
    tax_ty_cd: String,
    taxbl_amt: f64,
    tax_amt: f64,
    tot_amt: f64,
}

/// Kenya eTIMS payload builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtimsBuilder;

impl PayloadBuilder for EtimsBuilder {
    fn authority(&self) -> Authority {
        Authority::KraEtims
    }

    fn build(&self, doc: &PreparedDocument, config: &FiscalConfig) -> Result<Payload, PayloadError> {
        let original = preflight(doc, config, Authority::KraEtims)?;
        let draft = &doc.draft;
        let currency = &draft.currency;
        let major = |minor: i64| currency.to_major(minor);

        let mut taxable = [0i64; CATEGORY_COUNT];
        let mut tax = [0i64; CATEGORY_COUNT];
        let mut total = 0i64;
        let mut items = Vec::with_capacity(doc.mapped.lines.len());
        for line in &doc.mapped.lines {
            let slot = line.code.slot();
            accumulate("taxblAmt", &mut taxable[slot], line.taxable)?;
            accumulate("taxAmt", &mut tax[slot], line.tax)?;
            accumulate("totAmt", &mut total, line.total)?;
            items.push(Item {
                item_seq: line.seq,
                item_cd: clip(&line.line.item_code, 20),
                item_cls_cd: line.line.classification_code.clone().unwrap_or_default(),
                item_nm: clip(&line.line.description, 200),
                pkg_unit_cd: "NT",
                pkg: 1,
                qty_unit_cd: "U",
                qty: line.line.quantity.as_f64(),
                prc: major(line.line.unit_price),
                sply_amt: major(line.total),
                dc_rt: line.line.discount.as_percent(),
                dc_amt: major(line.discount),
                tax_ty_cd: line.code.wire_code(),
                taxbl_amt: major(line.taxable),
                tax_amt: major(line.tax),
                tot_amt: major(line.total),
            });
        }

        let totals = &doc.mapped.totals;
        for (i, letter) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            reconcile(
                &format!("taxblAmt{letter}"),
                taxable[i],
                totals.by_category[i].taxable,
            )?;
            reconcile(&format!("taxAmt{letter}"), tax[i], totals.by_category[i].tax)?;
        }
        reconcile("totTaxblAmt", taxable.iter().sum(), totals.taxable)?;
        reconcile("totTaxAmt", tax.iter().sum(), totals.tax)?;
        reconcile("totAmt", total, totals.total)?;

        let is_refund = draft.kind == DocumentKind::CreditNote;
        let issued = compact_datetime(&draft.issued_at);
        let cust_tin = draft.buyer.tin().unwrap_or_default().to_string();
        let rate = |t: EtimsTaxType| t.rate().as_percent();

        let request = SalesRequest {
            trd_invc_no: clip(&draft.reference, 50),
            invc_no: doc.sequence_number.value(),
            org_invc_no: original.map_or(0, |n| n.value()),
            cust_tin: cust_tin.clone(),
            cust_nm: clip(draft.buyer.name().unwrap_or(CASH_CUSTOMER), 100),
            rcpt_ty_cd: if is_refund { "R" } else { "S" },
            pmt_ty_cd: "01",
            sales_stts_cd: "02",
            cfm_dt: issued.clone(),
            sales_dt: compact_date(&draft.issued_at),
            stock_rls_dt: issued.clone(),
            cncl_req_dt: String::new(),
            cncl_dt: String::new(),
            rfd_dt: if is_refund {
                compact_date(&draft.issued_at)
            } else {
                String::new()
            },
            rfd_rsn_cd: draft
                .credit_reason
                .filter(|_| is_refund)
                .map(refund_reason_code)
                .unwrap_or_default()
                .to_string(),
            tot_item_cnt: items.len(),
            taxbl_amt_a: major(taxable[0]),
            taxbl_amt_b: major(taxable[1]),
            taxbl_amt_c: major(taxable[2]),
            taxbl_amt_d: major(taxable[3]),
            taxbl_amt_e: major(taxable[4]),
            tax_rt_a: rate(EtimsTaxType::A),
            tax_rt_b: rate(EtimsTaxType::B),
            tax_rt_c: rate(EtimsTaxType::C),
            tax_rt_d: rate(EtimsTaxType::D),
            tax_rt_e: rate(EtimsTaxType::E),
            tax_amt_a: major(tax[0]),
            tax_amt_b: major(tax[1]),
            tax_amt_c: major(tax[2]),
            tax_amt_d: major(tax[3]),
            tax_amt_e: major(tax[4]),
            tot_taxbl_amt: major(totals.taxable),
            tot_tax_amt: major(totals.tax),
            tot_amt: major(totals.total),
            prchr_acptc_yn: "N",
            remark: clip(draft.remark.as_deref().unwrap_or_default(), 400),
            regr_id: REGISTRANT_ID,
            regr_nm: REGISTRANT_NAME,
            modr_id: REGISTRANT_ID,
            modr_nm: REGISTRANT_NAME,
            receipt: ReceiptBlock {
                cust_tin,
                cust_mbl_no: draft.buyer.phone.clone().unwrap_or_default(),
                rcpt_pbct_dt: issued,
                trde_nm: clip(draft.buyer.name().unwrap_or_default(), 100),
                adrs: clip(draft.buyer.address.as_deref().unwrap_or_default(), 200),
                top_msg: String::new(),
                btm_msg: String::new(),
                prchr_acptc_yn: "N",
            },
            item_list: items,
        };

        let body = serde_json::to_string(&request)?;
        Ok(Payload::new(Authority::KraEtims, doc.sequence_number, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{credit_note, prepared, sale_line};
    use fisc_core::{InternalTax, RateBps, SequenceNumber};

    fn config() -> FiscalConfig {
        FiscalConfig::local_mock(Authority::KraEtims, "http://127.0.0.1:1", "P051234567X")
            .unwrap()
    }

    fn vat16() -> Option<InternalTax> {
        Some(InternalTax::new("VAT 16%", RateBps::from_bps(1_600)))
    }

    #[test]
    fn sale_payload_fields() {
        let doc = prepared(
            Authority::KraEtims,
            vec![sale_line(100_000, vat16()), sale_line(5_000, None)],
        );
        let payload = EtimsBuilder.build(&doc, &config()).unwrap();
        assert!(payload.verify());
        let v = payload.json().unwrap();
        assert_eq!(v["invcNo"], 7);
        assert_eq!(v["orgInvcNo"], 0);
        assert_eq!(v["rcptTyCd"], "S");
        assert_eq!(v["custNm"], "Cash Customer");
        assert_eq!(v["salesDt"], "20260307");
        assert_eq!(v["cfmDt"], "20260307101500");
        assert_eq!(v["rfdDt"], "");
        assert_eq!(v["taxRtB"], 16.0);
        assert_eq!(v["taxRtE"], 8.0);
        assert_eq!(v["taxblAmtB"], 1000.0);
        assert_eq!(v["taxAmtB"], 160.0);
        assert_eq!(v["taxblAmtD"], 50.0);
        assert_eq!(v["totAmt"], 1210.0);
        assert_eq!(v["totItemCnt"], 2);
        assert_eq!(v["itemList"][0]["taxTyCd"], "B");
        assert_eq!(v["itemList"][0]["splyAmt"], 1160.0);
        assert_eq!(v["itemList"][1]["taxTyCd"], "D");
        assert_eq!(v["receipt"]["prchrAcptcYn"], "N");
    }

    #[test]
    fn build_is_deterministic() {
        let doc = prepared(Authority::KraEtims, vec![sale_line(12_345, vat16())]);
        let a = EtimsBuilder.build(&doc, &config()).unwrap();
        let b = EtimsBuilder.build(&doc, &config()).unwrap();
        assert_eq!(a.body, b.body);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn credit_note_carries_original_and_reason() {
        let mut doc = credit_note(
            Authority::KraEtims,
            vec![sale_line(10_000, vat16())],
            CreditNoteReason::QuantityDispute,
        );
        doc.original_sequence = Some(SequenceNumber::new(3).unwrap());
        let v = EtimsBuilder.build(&doc, &config()).unwrap().json().unwrap();
        assert_eq!(v["rcptTyCd"], "R");
        assert_eq!(v["orgInvcNo"], 3);
        assert_eq!(v["rfdRsnCd"], "03");
        assert_eq!(v["rfdDt"], "20260307");
    }

    #[test]
    fn credit_note_without_original_number_fails() {
        let doc = credit_note(
            Authority::KraEtims,
            vec![sale_line(10_000, vat16())],
            CreditNoteReason::Damaged,
        );
        assert!(matches!(
            EtimsBuilder.build(&doc, &config()),
            Err(PayloadError::MissingOriginal { .. })
        ));
    }

    #[test]
    fn tampered_totals_are_a_consistency_error() {
        let mut doc = prepared(Authority::KraEtims, vec![sale_line(10_000, vat16())]);
        doc.mapped.totals.tax += 1;
        assert!(matches!(
            EtimsBuilder.build(&doc, &config()),
            Err(PayloadError::Consistency { .. })
        ));
    }

    #[test]
    fn overflowing_line_amounts_are_a_consistency_error() {
        let mut doc = prepared(
            Authority::KraEtims,
            vec![sale_line(10_000, vat16()), sale_line(10_000, vat16())],
        );
        doc.mapped.lines[0].taxable = i64::MAX;
        assert!(matches!(
            EtimsBuilder.build(&doc, &config()),
            Err(PayloadError::Consistency { .. })
        ));
    }

    #[test]
    fn wrong_taxpayer_is_rejected() {
        let doc = prepared(Authority::KraEtims, vec![sale_line(10_000, vat16())]);
        let other =
            FiscalConfig::local_mock(Authority::KraEtims, "http://127.0.0.1:1", "P999").unwrap();
        assert!(matches!(
            EtimsBuilder.build(&doc, &other),
            Err(PayloadError::ConfigMismatch { .. })
        ));
    }

    #[test]
    fn reason_map_is_closed() {
        let codes: Vec<&str> = CreditNoteReason::ALL
            .iter()
            .map(|r| refund_reason_code(*r))
            .collect();
        assert_eq!(
            codes,
            vec!["01", "05", "02", "05", "05", "02", "03", "01", "04", "05"]
        );
    }
}
