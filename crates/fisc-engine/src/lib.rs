//! # fisc-engine — Fiscal Submission Engine
//!
//! Ties the workspace together: documents registered here are mapped
//! ([`fisc_tax`]), numbered ([`allocator`]), built ([`fisc_payload`]),
//! sent ([`fisc_client`]) and tracked ([`fisc_state`]) until the authority
//! returns a receipt ([`receipts`]).
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`allocator`] | Gapless sequence numbers per taxpayer/branch scope |
//! | [`registry`] | Per-taxpayer authority configurations |
//! | [`engine`] | submit / retry / abandon / batch / sweep |
//! | [`attempts`] | Hash-chained, append-only attempt log |
//! | [`receipts`] | Write-once receipt store |
//! | [`retry`] | Backoff and attempt budget |
//! | [`db`] | Optional PostgreSQL write-through |
//!
//! Without a database pool everything lives in memory.

pub mod allocator;
pub mod attempts;
pub mod db;
pub mod document;
pub mod engine;
pub mod error;
pub mod receipts;
pub mod registry;
pub mod retry;
pub mod store;

pub use allocator::{AllocationError, AnyAllocator, MemoryAllocator, PgAllocator, SequenceAllocator};
pub use attempts::{AttemptLog, ChainIntegrity, SubmissionAttempt, GENESIS_HASH};
pub use document::FiscalDocument;
pub use engine::{BatchItem, BatchSummary, SubmissionEngine, SubmissionResult, SweepReport};
pub use error::EngineError;
pub use receipts::{ReceiptConflict, ReceiptStore};
pub use registry::{ConfigRegistry, RegistryError};
pub use retry::RetryPolicy;
