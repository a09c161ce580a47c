//! # API Route Modules
//!
//! - `documents`: registration, submission, retry, abandonment, receipts
//!   and attempt logs of individual documents.
//! - `operations`: batch submission, the retry sweep, attempt-chain
//!   verification and sequence floors.
//! - `configs`: the per-taxpayer authority configuration registry.

pub mod configs;
pub mod documents;
pub mod operations;
