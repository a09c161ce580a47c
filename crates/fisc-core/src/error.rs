//! # Error Hierarchy
//!
//! Structured error types shared by every crate in the workspace, built with
//! `thiserror`. Each variant carries the offending input and, where useful,
//! the expected format so operators can fix source data without guesswork.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum FiscError {
    /// Domain primitive or document validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Authority configuration failure.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors for newtypes and document drafts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Taxpayer identification number is empty, too long, or not alphanumeric.
    #[error("invalid taxpayer ID: \"{0}\" (expected 1-20 ASCII letters or digits)")]
    InvalidTaxpayerId(String),

    /// Branch identifier is empty, too long, or not alphanumeric.
    #[error("invalid branch ID: \"{0}\" (expected 1-10 ASCII letters or digits)")]
    InvalidBranchId(String),

    /// Authority sequence numbers start at 1.
    #[error("invalid sequence number: {0} (sequence numbers start at 1)")]
    InvalidSequenceNumber(u64),

    /// Currency code is not a three-letter ISO 4217 code.
    #[error("invalid currency code: \"{0}\" (expected three uppercase letters)")]
    InvalidCurrency(String),

    /// A decimal amount could not be parsed into minor units.
    #[error("invalid amount: \"{0}\"")]
    InvalidAmount(String),

    /// A quantity could not be parsed or is not positive.
    #[error("invalid quantity: \"{0}\" (expected a positive number with at most 3 decimals)")]
    InvalidQuantity(String),

    /// A rate is outside 0..=100%.
    #[error("invalid rate: {0} basis points (expected 0..=10000)")]
    InvalidRate(u32),

    /// Unknown authority identifier.
    #[error("unknown authority: \"{0}\" (expected kra_etims or gra_evat)")]
    UnknownAuthority(String),

    /// Unknown environment identifier.
    #[error("unknown environment: \"{0}\" (expected sandbox or production)")]
    UnknownEnvironment(String),

    /// A document has no lines.
    #[error("document {reference} has no lines")]
    EmptyDocument {
        /// Internal reference of the offending document.
        reference: String,
    },

    /// A document field violates a structural rule.
    #[error("document {reference}: {reason}")]
    InvalidDocument {
        /// Internal reference of the offending document.
        reference: String,
        /// What is wrong with it.
        reason: String,
    },
}
