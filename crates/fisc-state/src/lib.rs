//! # fisc-state — Submission Lifecycle
//!
//! The state machine every fiscal document moves through on its way to an
//! authority receipt:
//!
//! ```text
//! Draft ──▶ Sequencing ──▶ Built ──▶ Submitting ──▶ Accepted (terminal)
//!                                       │   ▲
//!                                       │   │ retry (retryable only)
//!                                       ▼   │
//!                                     Rejected ──▶ PermanentlyRejected (terminal)
//!                                                        ▲
//!                     Submitting ────────────────────────┘ (business rejection)
//! ```
//!
//! The lifecycle knows nothing about transports or payloads. The engine
//! drives it and persists it alongside the document.

pub mod submission;

pub use submission::{LifecycleError, SubmissionLifecycle, SubmissionState, TransitionRecord};
