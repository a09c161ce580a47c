//! # Line Arithmetic
//!
//! Maps every line of a draft and computes its amounts in minor units:
//!
//! ```text
//! gross     = round(quantity × unit_price)
//! discount  = round(gross × discount_rate)
//! supply    = gross − discount
//! base      = supply                                   (tax-exclusive)
//!           = round(supply × 10000 / (10000 + Σrates)) (tax-inclusive)
//! tax       = round(base × code_rate)
//! levy_i    = round(base × levy_rate_i)
//! total     = base + tax + Σlevy_i
//! ```
//!
//! Tax and levies are always computed against the taxable base, never
//! against a taxed amount. Document totals accumulate the rounded line
//! amounts, so totals always equal the sum of their lines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fisc_core::money::{apply_rate, extend, extract_base};
use fisc_core::{DocumentDraft, DocumentLine, RateBps};

use crate::codes::{AuthorityTaxCode, LevyCode, CATEGORY_COUNT};
use crate::error::TaxError;
use crate::mapper::{MappingDiagnostic, TaxMapper};

/// One levy on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyAmount {
    /// Which levy.
    pub code: LevyCode,
    /// Rate applied.
    pub rate: RateBps,
    /// Amount in minor units.
    pub amount: i64,
}

/// A document line after tax mapping. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedLine {
    /// 1-based position in the document.
    pub seq: usize,
    /// The source line.
    pub line: DocumentLine,
    /// Assigned authority code.
    pub code: AuthorityTaxCode,
    /// Quantity × unit price.
    pub gross: i64,
    /// Discount amount.
    pub discount: i64,
    /// Gross less discount, as priced (may include tax).
    pub supply: i64,
    /// Taxable base.
    pub taxable: i64,
    /// Tax at the code's statutory rate.
    pub tax: i64,
    /// Co-applied levies.
    pub levies: Vec<LevyAmount>,
    /// Base + tax + levies.
    pub total: i64,
}

impl MappedLine {
    /// Amount of one levy on this line, zero if it does not apply.
    pub fn levy(&self, code: LevyCode) -> i64 {
        self.levies
            .iter()
            .filter(|l| l.code == code)
            .map(|l| l.amount)
            .sum()
    }

    /// Sum of all levies on this line.
    pub fn levy_total(&self) -> i64 {
        self.levies.iter().map(|l| l.amount).sum()
    }
}

/// Taxable base and tax for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// Sum of taxable bases.
    pub taxable: i64,
    /// Sum of tax.
    pub tax: i64,
}

/// Document totals accumulated line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    /// Per category, A..E.
    pub by_category: [CategoryTotal; CATEGORY_COUNT],
    /// Per levy.
    pub levies: BTreeMap<LevyCode, i64>,
    /// Sum of taxable bases.
    pub taxable: i64,
    /// Sum of tax.
    pub tax: i64,
    /// Sum of levies.
    pub levy: i64,
    /// Sum of line totals.
    pub total: i64,
}

impl DocumentTotals {
    /// Accumulate totals from mapped lines.
    pub fn from_lines(lines: &[MappedLine]) -> Result<Self, TaxError> {
        let mut totals = Self::default();
        for line in lines {
            let overflow = || TaxError::Overflow { line: line.seq };
            let slot = &mut totals.by_category[line.code.slot()];
            slot.taxable = slot.taxable.checked_add(line.taxable).ok_or_else(overflow)?;
            slot.tax = slot.tax.checked_add(line.tax).ok_or_else(overflow)?;
            for levy in &line.levies {
                let entry = totals.levies.entry(levy.code).or_insert(0);
                *entry = entry.checked_add(levy.amount).ok_or_else(overflow)?;
                totals.levy = totals.levy.checked_add(levy.amount).ok_or_else(overflow)?;
            }
            totals.taxable = totals.taxable.checked_add(line.taxable).ok_or_else(overflow)?;
            totals.tax = totals.tax.checked_add(line.tax).ok_or_else(overflow)?;
            totals.total = totals.total.checked_add(line.total).ok_or_else(overflow)?;
        }
        Ok(totals)
    }

    /// Per-category totals for a code's category.
    pub fn category(&self, code: AuthorityTaxCode) -> CategoryTotal {
        self.by_category[code.slot()]
    }

    /// Total of one levy.
    pub fn levy_amount(&self, code: LevyCode) -> i64 {
        self.levies.get(&code).copied().unwrap_or(0)
    }
}

/// A draft with every line mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedDocument {
    /// Mapped lines in document order.
    pub lines: Vec<MappedLine>,
    /// Accumulated totals.
    pub totals: DocumentTotals,
    /// Lines that fell back to the default code.
    pub diagnostics: Vec<MappingDiagnostic>,
}

/// Compute one line.
pub fn map_line(
    seq: usize,
    line: &DocumentLine,
    mapper: &dyn TaxMapper,
) -> Result<(MappedLine, Option<MappingDiagnostic>), TaxError> {
    let overflow = || TaxError::Overflow { line: seq };
    let mapping = mapper.map(line.tax.as_ref());
    let code = mapping.code;
    let levy_codes = mapper.applicable_levies(code);

    let gross = extend(line.quantity, line.unit_price);
    if gross == i64::MAX {
        return Err(overflow());
    }
    let discount = apply_rate(gross, line.discount);
    let supply = gross.checked_sub(discount).ok_or_else(overflow)?;

    let combined = levy_codes
        .iter()
        .fold(code.rate(), |acc, levy| acc.plus(levy.rate()));
    let taxable = if line.tax_inclusive {
        extract_base(supply, combined)
    } else {
        supply
    };

    let tax = apply_rate(taxable, code.rate());
    let levies: Vec<LevyAmount> = levy_codes
        .into_iter()
        .map(|levy| LevyAmount {
            code: levy,
            rate: levy.rate(),
            amount: apply_rate(taxable, levy.rate()),
        })
        .collect();
    let total = levies
        .iter()
        .try_fold(taxable.checked_add(tax).ok_or_else(overflow)?, |acc, l| {
            acc.checked_add(l.amount)
        })
        .ok_or_else(overflow)?;

    let diagnostic = if mapping.fallback {
        let (tax_name, rate) = line
            .tax
            .as_ref()
            .map(|t| (t.name.clone(), t.rate))
            .unwrap_or_default();
        let message = format!(
            "line {seq}: internal tax \"{tax_name}\" at {rate} has no {} category; reported as {}",
            mapper.authority(),
            code.wire_code()
        );
        tracing::warn!(
            line = seq,
            tax_name = %tax_name,
            rate = %rate,
            assigned = %code,
            "internal tax fell back to default authority code"
        );
        Some(MappingDiagnostic {
            line: seq,
            tax_name,
            rate,
            assigned: code,
            message,
        })
    } else {
        None
    };

    Ok((
        MappedLine {
            seq,
            line: line.clone(),
            code,
            gross,
            discount,
            supply,
            taxable,
            tax,
            levies,
            total,
        },
        diagnostic,
    ))
}

/// Map every line of a draft and accumulate totals.
///
/// # Errors
///
/// [`TaxError::Overflow`] if an amount does not fit in an `i64`.
pub fn map_document(
    draft: &DocumentDraft,
    mapper: &dyn TaxMapper,
) -> Result<MappedDocument, TaxError> {
    let mut lines = Vec::with_capacity(draft.lines.len());
    let mut diagnostics = Vec::new();
    for (index, line) in draft.lines.iter().enumerate() {
        let (mapped, diagnostic) = map_line(index + 1, line, mapper)?;
        lines.push(mapped);
        diagnostics.extend(diagnostic);
    }
    let totals = DocumentTotals::from_lines(&lines)?;
    Ok(MappedDocument {
        lines,
        totals,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{EtimsTaxType, EvatTaxCode};
    use crate::mapper::{EtimsTaxMapper, EvatTaxMapper};
    use chrono::NaiveDate;
    use fisc_core::{
        BranchId, Buyer, Currency, DocumentKind, DocumentSource, InternalTax, Quantity,
        TaxpayerId,
    };
    use proptest::prelude::*;

    fn line(price: i64, qty: i64, tax: Option<InternalTax>) -> DocumentLine {
        DocumentLine {
            item_code: "SKU".into(),
            classification_code: None,
            description: "Item".into(),
            quantity: Quantity::units(qty).unwrap(),
            unit_price: price,
            discount: RateBps::ZERO,
            tax_inclusive: false,
            tax,
        }
    }

    fn vat(bps: u32) -> Option<InternalTax> {
        Some(InternalTax::new(format!("VAT {bps}"), RateBps::from_bps(bps)))
    }

    fn draft(lines: Vec<DocumentLine>) -> DocumentDraft {
        DocumentDraft {
            reference: "INV/1".into(),
            taxpayer: TaxpayerId::new("C0001").unwrap(),
            branch: BranchId::new("001").unwrap(),
            kind: DocumentKind::Sale,
            source: DocumentSource::Invoice,
            original: None,
            credit_reason: None,
            buyer: Buyer::default(),
            currency: Currency::new("GHS").unwrap(),
            issued_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            remark: None,
            lines,
        }
    }

    #[test]
    fn ghana_standard_with_levies() {
        // 1000.00 base, 15% + 2.5% + 2.5%.
        let (mapped, diag) =
            map_line(1, &line(100_000, 1, vat(1_500)), &EvatTaxMapper::default()).unwrap();
        assert!(diag.is_none());
        assert_eq!(mapped.code, AuthorityTaxCode::Evat(EvatTaxCode::B));
        assert_eq!(mapped.taxable, 100_000);
        assert_eq!(mapped.tax, 15_000);
        assert_eq!(mapped.levy(LevyCode::Nhil), 2_500);
        assert_eq!(mapped.levy(LevyCode::GetFund), 2_500);
        assert_eq!(mapped.levy(LevyCode::Covid19), 0);
        assert_eq!(mapped.total, 120_000);
    }

    #[test]
    fn kenya_inclusive_price_extracts_base() {
        let mut l = line(11_600, 1, vat(1_600));
        l.tax_inclusive = true;
        let (mapped, _) = map_line(1, &l, &EtimsTaxMapper::default()).unwrap();
        assert_eq!(mapped.taxable, 10_000);
        assert_eq!(mapped.tax, 1_600);
        assert_eq!(mapped.total, 11_600);
    }

    #[test]
    fn ghana_inclusive_price_includes_levies_in_divisor() {
        // 120.00 inclusive of 15% + 5% levies -> 100.00 base.
        let mut l = line(12_000, 1, vat(1_500));
        l.tax_inclusive = true;
        let (mapped, _) = map_line(1, &l, &EvatTaxMapper::default()).unwrap();
        assert_eq!(mapped.taxable, 10_000);
        assert_eq!(mapped.tax, 1_500);
        assert_eq!(mapped.levy_total(), 500);
    }

    #[test]
    fn discount_reduces_base() {
        let mut l = line(10_000, 2, vat(1_600));
        l.discount = RateBps::from_bps(1_000);
        let (mapped, _) = map_line(1, &l, &EtimsTaxMapper::default()).unwrap();
        assert_eq!(mapped.gross, 20_000);
        assert_eq!(mapped.discount, 2_000);
        assert_eq!(mapped.taxable, 18_000);
        assert_eq!(mapped.tax, 2_880);
    }

    #[test]
    fn unknown_rate_records_diagnostic() {
        let doc = map_document(
            &draft(vec![line(1_000, 1, vat(1_400)), line(1_000, 1, None)]),
            &EtimsTaxMapper::default(),
        )
        .unwrap();
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].line, 1);
        assert_eq!(
            doc.diagnostics[0].assigned,
            AuthorityTaxCode::Etims(EtimsTaxType::B)
        );
        assert_eq!(doc.lines[1].code, AuthorityTaxCode::Etims(EtimsTaxType::D));
    }

    #[test]
    fn totals_are_sum_of_lines() {
        let doc = map_document(
            &draft(vec![
                line(100_000, 1, vat(1_500)),
                line(3_333, 3, vat(1_500)),
                line(5_000, 1, vat(300)),
                line(2_000, 1, None),
            ]),
            &EvatTaxMapper::default(),
        )
        .unwrap();
        let t = &doc.totals;
        assert_eq!(t.taxable, doc.lines.iter().map(|l| l.taxable).sum::<i64>());
        assert_eq!(t.tax, doc.lines.iter().map(|l| l.tax).sum::<i64>());
        assert_eq!(t.total, t.taxable + t.tax + t.levy);
        assert_eq!(t.category(AuthorityTaxCode::Evat(EvatTaxCode::B)).taxable, 109_999);
        assert_eq!(t.category(AuthorityTaxCode::Evat(EvatTaxCode::E)).tax, 150);
        assert_eq!(t.category(AuthorityTaxCode::Evat(EvatTaxCode::D)).taxable, 2_000);
        assert_eq!(t.levy_amount(LevyCode::Nhil), t.levy_amount(LevyCode::GetFund));
    }

    proptest! {
        #[test]
        fn line_total_is_base_plus_tax_plus_levies(
            price in 0i64..100_000_000,
            qty in 1i64..1_000,
            bps in prop::sample::select(vec![0u32, 300, 800, 1_500, 1_600]),
            inclusive in any::<bool>(),
        ) {
            let mut l = line(price, qty, vat(bps));
            l.tax_inclusive = inclusive;
            let (m, _) = map_line(1, &l, &EvatTaxMapper::default()).unwrap();
            prop_assert_eq!(m.total, m.taxable + m.tax + m.levy_total());
            prop_assert!(m.taxable <= m.supply);
        }
    }
}
