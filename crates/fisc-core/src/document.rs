//! # Fiscal Document Model
//!
//! A [`DocumentDraft`] is the read-only snapshot the sales system hands to
//! the engine: identity, date, buyer, currency and ordered lines. Lines
//! carry the *internal* tax reference; the authority tax code is assigned
//! later by the tax mapper, once, and frozen with the document.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{BranchId, DocumentId, SequenceScope, TaxpayerId};
use crate::money::{Currency, Quantity, RateBps};

/// Sale or credit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A sale invoice or receipt.
    Sale,
    /// A refund against a previously accepted sale.
    CreditNote,
}

impl DocumentKind {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::CreditNote => "credit_note",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which internal system the document originated from. Invoices and POS
/// orders share one authority sequence per scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Back-office invoice.
    #[default]
    Invoice,
    /// Point-of-sale order.
    Pos,
}

impl DocumentSource {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Pos => "pos",
        }
    }
}

/// Buyer identity. Every field is optional; anonymous buyers are reported
/// with the authority's generic cash-customer name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    /// Buyer's taxpayer identification number.
    #[serde(default)]
    pub tin: Option<String>,
    /// Buyer's name.
    #[serde(default)]
    pub name: Option<String>,
    /// Buyer's address (E-VAT `CLIENT_ADDRESS`).
    #[serde(default)]
    pub address: Option<String>,
    /// Buyer's mobile number (eTIMS `custMblNo`).
    #[serde(default)]
    pub phone: Option<String>,
}

impl Buyer {
    /// Buyer TIN, or `None` if absent or blank.
    pub fn tin(&self) -> Option<&str> {
        self.tin.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Buyer name, or `None` if absent or blank.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// The internal tax applied to a line, as the sales system knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InternalTax {
    /// Tax name (e.g. "VAT 16%", "Exempt", "Export").
    pub name: String,
    /// Tax rate in basis points.
    pub rate: RateBps,
}

impl InternalTax {
    /// Create an internal tax reference.
    pub fn new(name: impl Into<String>, rate: RateBps) -> Self {
        Self {
            name: name.into(),
            rate,
        }
    }
}

/// One line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    /// Internal item code.
    pub item_code: String,
    /// Authority item classification code (eTIMS `itemClsCd`), if known.
    #[serde(default)]
    pub classification_code: Option<String>,
    /// Item description.
    pub description: String,
    /// Quantity sold.
    pub quantity: Quantity,
    /// Unit price in minor units.
    pub unit_price: i64,
    /// Line discount rate.
    #[serde(default)]
    pub discount: RateBps,
    /// Whether `unit_price` already includes tax and levies.
    #[serde(default)]
    pub tax_inclusive: bool,
    /// Internal tax reference, or `None` for "no tax".
    #[serde(default)]
    pub tax: Option<InternalTax>,
}

/// Internal reasons for issuing a credit note.
///
/// Each authority maps these onto its own closed reason enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteReason {
    /// Goods arrived damaged.
    Damaged,
    /// Buyer changed their mind.
    ChangeOfMind,
    /// Wrong item supplied.
    WrongItem,
    /// Delivered late.
    LateDelivery,
    /// Duplicate sale.
    Duplicate,
    /// Price charged was disputed.
    PriceDispute,
    /// Quantity delivered was disputed.
    QuantityDispute,
    /// Quality problem.
    QualityIssue,
    /// Sale cancelled.
    Cancellation,
    /// Anything else.
    Other,
}

impl CreditNoteReason {
    /// Every reason, in code order.
    pub const ALL: [CreditNoteReason; 10] = [
        Self::Damaged,
        Self::ChangeOfMind,
        Self::WrongItem,
        Self::LateDelivery,
        Self::Duplicate,
        Self::PriceDispute,
        Self::QuantityDispute,
        Self::QualityIssue,
        Self::Cancellation,
        Self::Other,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Damaged => "damaged",
            Self::ChangeOfMind => "change_of_mind",
            Self::WrongItem => "wrong_item",
            Self::LateDelivery => "late_delivery",
            Self::Duplicate => "duplicate",
            Self::PriceDispute => "price_dispute",
            Self::QuantityDispute => "quantity_dispute",
            Self::QualityIssue => "quality_issue",
            Self::Cancellation => "cancellation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for CreditNoteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a sales document submitted to the engine for fiscalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    /// Stable internal reference from the sales system. Never reused.
    pub reference: String,
    /// Selling taxpayer.
    pub taxpayer: TaxpayerId,
    /// Selling branch.
    pub branch: BranchId,
    /// Sale or credit note.
    pub kind: DocumentKind,
    /// Originating system.
    #[serde(default)]
    pub source: DocumentSource,
    /// The original sale this credit note refunds.
    #[serde(default)]
    pub original: Option<DocumentId>,
    /// Why the credit note was issued.
    #[serde(default)]
    pub credit_reason: Option<CreditNoteReason>,
    /// Buyer identity.
    #[serde(default)]
    pub buyer: Buyer,
    /// Document currency.
    pub currency: Currency,
    /// Local date and time printed on the document.
    pub issued_at: NaiveDateTime,
    /// Free-text remark passed through to the authority.
    #[serde(default)]
    pub remark: Option<String>,
    /// Ordered lines.
    pub lines: Vec<DocumentLine>,
}

impl DocumentDraft {
    /// The sequence scope this document is numbered in.
    pub fn scope(&self) -> SequenceScope {
        SequenceScope::new(self.taxpayer.clone(), self.branch.clone())
    }

    /// Check the structural rules every draft must satisfy before the
    /// engine accepts it.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyDocument`] if there are no lines, otherwise
    /// [`ValidationError::InvalidDocument`] describing the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let reference = self.reference.trim();
        let invalid = |reason: String| ValidationError::InvalidDocument {
            reference: self.reference.clone(),
            reason,
        };
        if reference.is_empty() {
            return Err(invalid("reference must not be empty".into()));
        }
        if self.lines.is_empty() {
            return Err(ValidationError::EmptyDocument {
                reference: self.reference.clone(),
            });
        }
        match self.kind {
            DocumentKind::Sale => {
                if self.original.is_some() {
                    return Err(invalid("a sale cannot reference an original document".into()));
                }
            }
            DocumentKind::CreditNote => {
                if self.original.is_none() {
                    return Err(invalid("a credit note must reference its original sale".into()));
                }
                if self.credit_reason.is_none() {
                    return Err(invalid("a credit note must carry a reason".into()));
                }
            }
        }
        for (index, line) in self.lines.iter().enumerate() {
            let n = index + 1;
            if line.item_code.trim().is_empty() {
                return Err(invalid(format!("line {n}: item code must not be empty")));
            }
            if line.description.trim().is_empty() {
                return Err(invalid(format!("line {n}: description must not be empty")));
            }
            if line.unit_price < 0 {
                return Err(invalid(format!(
                    "line {n}: unit price must not be negative (credit notes carry positive amounts)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn line() -> DocumentLine {
        DocumentLine {
            item_code: "SKU-1".into(),
            classification_code: None,
            description: "Maize flour 2kg".into(),
            quantity: Quantity::units(2).unwrap(),
            unit_price: 25_000,
            discount: RateBps::ZERO,
            tax_inclusive: false,
            tax: Some(InternalTax::new("VAT 16%", RateBps::from_bps(1_600))),
        }
    }

    fn draft(kind: DocumentKind) -> DocumentDraft {
        DocumentDraft {
            reference: "INV/2026/0001".into(),
            taxpayer: TaxpayerId::new("P051234567X").unwrap(),
            branch: BranchId::new("00").unwrap(),
            kind,
            source: DocumentSource::Invoice,
            original: None,
            credit_reason: None,
            buyer: Buyer::default(),
            currency: Currency::new("KES").unwrap(),
            issued_at: NaiveDate::from_ymd_opt(2026, 3, 7)
                .and_then(|d| d.and_hms_opt(10, 0, 0))
                .unwrap(),
            remark: None,
            lines: vec![line()],
        }
    }

    #[test]
    fn valid_sale_passes() {
        assert!(draft(DocumentKind::Sale).validate().is_ok());
    }

    #[test]
    fn empty_document_is_rejected() {
        let mut d = draft(DocumentKind::Sale);
        d.lines.clear();
        assert!(matches!(
            d.validate(),
            Err(ValidationError::EmptyDocument { .. })
        ));
    }

    #[test]
    fn credit_note_needs_original_and_reason() {
        let mut d = draft(DocumentKind::CreditNote);
        assert!(d.validate().is_err());
        d.original = Some(DocumentId::new());
        assert!(d.validate().is_err());
        d.credit_reason = Some(CreditNoteReason::Damaged);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn sale_with_original_is_rejected() {
        let mut d = draft(DocumentKind::Sale);
        d.original = Some(DocumentId::new());
        assert!(d.validate().is_err());
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut d = draft(DocumentKind::Sale);
        d.lines[0].unit_price = -1;
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn buyer_blank_fields_are_absent() {
        let b = Buyer {
            tin: Some("  ".into()),
            name: Some(" Acme Ltd ".into()),
            address: None,
            phone: None,
        };
        assert_eq!(b.tin(), None);
        assert_eq!(b.name(), Some("Acme Ltd"));
    }

    #[test]
    fn draft_deserializes_with_defaults() {
        let json = r#"{
            "reference": "POS/0001",
            "taxpayer": "c0000000000",
            "branch": "001",
            "kind": "sale",
            "source": "pos",
            "currency": "GHS",
            "issued_at": "2026-03-07T10:00:00",
            "lines": [{
                "item_code": "A1",
                "description": "Soap",
                "quantity": "1.5",
                "unit_price": 1000
            }]
        }"#;
        let d: DocumentDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.source, DocumentSource::Pos);
        assert_eq!(d.lines[0].quantity.thousandths(), 1_500);
        assert!(d.lines[0].tax.is_none());
        assert_eq!(d.scope().to_string(), "C0000000000/001");
    }

    #[test]
    fn credit_reasons_are_ten() {
        assert_eq!(CreditNoteReason::ALL.len(), 10);
        assert_eq!(CreditNoteReason::PriceDispute.to_string(), "price_dispute");
    }
}
