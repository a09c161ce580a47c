//! Errors raised while mapping taxes.

use thiserror::Error;

/// Tax mapping errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxError {
    /// The configured default tax code is not a code of the authority.
    #[error("invalid default tax code \"{code}\" for {authority}")]
    InvalidDefaultCode {
        /// Configured authority.
        authority: String,
        /// Offending code.
        code: String,
    },

    /// A line amount does not fit in an `i64` of minor units.
    #[error("amount overflow on line {line}")]
    Overflow {
        /// 1-based line number.
        line: usize,
    },
}
