#![deny(missing_docs)]

//! # fisc-core — Foundational Types for the Fiscal Submission Engine
//!
//! This crate defines the types every other crate in the workspace depends on.
//! It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`TaxpayerId`] cannot be
//!    passed where a [`BranchId`] is expected, and a [`SequenceNumber`] is
//!    never confused with an internal document reference.
//!
//! 2. **Integer money.** Every amount is an `i64` in the currency's minor
//!    unit and every rate is in basis points. Rounding is round-half-up and
//!    happens in exactly one place ([`money::apply_rate`]).
//!
//! 3. **Closed authority set.** [`Authority`] enumerates the tax authorities
//!    the engine speaks to. Per-authority behaviour is selected by matching
//!    on it, never by string comparison.
//!
//! 4. **Structured errors.** `thiserror` enums with diagnostic context; no
//!    `.unwrap()` outside tests.

pub mod authority;
pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod identity;
pub mod money;
pub mod receipt;
pub mod temporal;

pub use authority::{Authority, Environment};
pub use config::{ConfigError, ConfigStatus, Credential, FiscalConfig};
pub use digest::{sha256_hex, PayloadDigest};
pub use document::{
    Buyer, CreditNoteReason, DocumentDraft, DocumentKind, DocumentLine, DocumentSource,
    InternalTax,
};
pub use error::{FiscError, ValidationError};
pub use identity::{BranchId, DocumentId, SequenceNumber, SequenceScope, TaxpayerId};
pub use money::{Currency, Quantity, RateBps};
pub use receipt::{Receipt, ReceiptKind, TransactionType};
pub use temporal::Timestamp;
