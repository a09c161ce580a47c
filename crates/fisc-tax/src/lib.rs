//! # fisc-tax — Tax and Levy Mapping
//!
//! Turns the internal tax on each document line into exactly one authority
//! tax code, applies statutory levies, and computes line and document
//! amounts in minor units.
//!
//! - [`codes`]: closed per-authority tax categories ([`AuthorityTaxCode`])
//!   and levies ([`LevyCode`]).
//! - [`mapper`]: the [`TaxMapper`] trait with the eTIMS and E-VAT rules.
//! - [`lines`]: line arithmetic and totals.
//!
//! Classification never fails a sale. An internal tax no rule recognises
//! is reported under the configured default code and surfaces as a
//! [`MappingDiagnostic`].

pub mod codes;
pub mod error;
pub mod lines;
pub mod mapper;

pub use codes::{AuthorityTaxCode, EtimsTaxType, EvatTaxCode, LevyCode, CATEGORY_COUNT};
pub use error::TaxError;
pub use lines::{
    map_document, map_line, CategoryTotal, DocumentTotals, LevyAmount, MappedDocument, MappedLine,
};
pub use mapper::{mapper_for, EtimsTaxMapper, EvatTaxMapper, MappingDiagnostic, TaxMapper, TaxMapping};
