//! Shared fixtures for builder tests.

use chrono::NaiveDate;

use fisc_core::{
    Authority, BranchId, Buyer, CreditNoteReason, Currency, DocumentDraft, DocumentId,
    DocumentKind, DocumentLine, DocumentSource, InternalTax, Quantity, RateBps, SequenceNumber,
    TaxpayerId,
};
use fisc_tax::{map_document, EtimsTaxMapper, EvatTaxMapper, TaxMapper};

use crate::payload::PreparedDocument;

pub(crate) fn sale_line(unit_price: i64, tax: Option<InternalTax>) -> DocumentLine {
    DocumentLine {
        item_code: "SKU-001".into(),
        classification_code: Some("5020230100".into()),
        description: "Test item".into(),
        quantity: Quantity::units(1).unwrap(),
        unit_price,
        discount: RateBps::ZERO,
        tax_inclusive: false,
        tax,
    }
}

fn draft(authority: Authority, kind: DocumentKind, lines: Vec<DocumentLine>) -> DocumentDraft {
    let tin = match authority {
        Authority::KraEtims => "P051234567X",
        Authority::GraEvat => "C0000000000",
    };
    DocumentDraft {
        reference: "INV/2026/0007".into(),
        taxpayer: TaxpayerId::new(tin).unwrap(),
        branch: BranchId::new(authority.default_branch()).unwrap(),
        kind,
        source: DocumentSource::Invoice,
        original: None,
        credit_reason: None,
        buyer: Buyer::default(),
        currency: Currency::new(authority.default_currency()).unwrap(),
        issued_at: NaiveDate::from_ymd_opt(2026, 3, 7)
            .and_then(|d| d.and_hms_opt(10, 15, 0))
            .unwrap(),
        remark: None,
        lines,
    }
}

fn prepare(authority: Authority, draft: DocumentDraft) -> PreparedDocument {
    let mapper: Box<dyn TaxMapper> = match authority {
        Authority::KraEtims => Box::new(EtimsTaxMapper::default()),
        Authority::GraEvat => Box::new(EvatTaxMapper::default()),
    };
    let mapped = map_document(&draft, mapper.as_ref()).unwrap();
    PreparedDocument {
        document_id: DocumentId::new(),
        draft,
        mapped,
        sequence_number: SequenceNumber::new(7).unwrap(),
        original_sequence: None,
    }
}

pub(crate) fn prepared(authority: Authority, lines: Vec<DocumentLine>) -> PreparedDocument {
    prepare(authority, draft(authority, DocumentKind::Sale, lines))
}

pub(crate) fn credit_note(
    authority: Authority,
    lines: Vec<DocumentLine>,
    reason: CreditNoteReason,
) -> PreparedDocument {
    let mut d = draft(authority, DocumentKind::CreditNote, lines);
    d.original = Some(DocumentId::new());
    d.credit_reason = Some(reason);
    prepare(authority, d)
}
