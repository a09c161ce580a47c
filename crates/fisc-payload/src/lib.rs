//! # fisc-payload — Authority Payload Builders
//!
//! Pure functions from a numbered, tax-mapped document to the exact request
//! bytes an authority expects:
//!
//! - [`etims`]: Kenya eTIMS `saveTrnsSalesOsdc`.
//! - [`evat`]: Ghana E-VAT `post_receipt_Json.jsp`.
//!
//! The resulting [`Payload`] carries its SHA-256 digest. The engine freezes
//! the first successful build on the document and resends those bytes on
//! every retry.

pub mod builder;
pub mod error;
pub mod etims;
pub mod evat;
pub mod payload;

#[cfg(test)]
pub(crate) mod testutil;

pub use builder::{build, builder_for, PayloadBuilder};
pub use error::PayloadError;
pub use etims::EtimsBuilder;
pub use evat::EvatBuilder;
pub use payload::{Payload, PreparedDocument};
