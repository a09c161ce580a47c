//! # Submission State Machine
//!
//! Tracks where a fiscal document is on its way to the authority and why it
//! got there. Every transition appends a [`TransitionRecord`]; terminal
//! states refuse all further transitions.
//!
//! `Rejected` is never terminal on its own: it is always paired with the
//! `retryable` flag. A retryable rejection may go back to `Submitting`;
//! a non-retryable one can only be abandoned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fisc_core::Timestamp;

// ─── Submission State ────────────────────────────────────────────────

/// The lifecycle state of a fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// Registered, lines not yet numbered or built.
    Draft,
    /// Sequence number being allocated.
    Sequencing,
    /// Numbered, payload built and frozen.
    Built,
    /// Request in flight to the authority.
    Submitting,
    /// Authority accepted the document and returned a receipt (terminal).
    Accepted,
    /// Last attempt failed. See `retryable`.
    Rejected,
    /// Authority definitively rejected the document, or an operator
    /// abandoned it (terminal).
    PermanentlyRejected,
}

impl SubmissionState {
    /// Every state.
    pub const ALL: [SubmissionState; 7] = [
        Self::Draft,
        Self::Sequencing,
        Self::Built,
        Self::Submitting,
        Self::Accepted,
        Self::Rejected,
        Self::PermanentlyRejected,
    ];

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::PermanentlyRejected)
    }

    /// Stable snake_case identifier, used in storage and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sequencing => "sequencing",
            Self::Built => "built",
            Self::Submitting => "submitting",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::PermanentlyRejected => "permanently_rejected",
        }
    }

    /// Parse the snake_case identifier produced by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s)
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Sequencing => "SEQUENCING",
            Self::Built => "BUILT",
            Self::Submitting => "SUBMITTING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::PermanentlyRejected => "PERMANENTLY_REJECTED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by illegal lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid submission transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Document is in a terminal state.
    #[error("document is in terminal state {state}")]
    TerminalState {
        /// The terminal state.
        state: String,
    },

    /// A rejected document cannot be retried because the rejection was not
    /// transient.
    #[error("document was rejected and is not retryable")]
    NotRetryable,

    /// Lines must be mapped to authority tax codes before numbering.
    #[error("document lines are not frozen; map every line before sequencing")]
    LinesNotFrozen,
}

// ─── Transition Record ───────────────────────────────────────────────

/// Record of a submission state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the transition.
    pub from_state: SubmissionState,
    /// State after the transition.
    pub to_state: SubmissionState,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Reason for the transition.
    pub reason: String,
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// The submission lifecycle of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionLifecycle {
    /// Current state.
    pub state: SubmissionState,
    /// Whether a `Rejected` document may be retried.
    pub retryable: bool,
    /// Number of times the document entered `Submitting`.
    pub attempts: u32,
    /// Message of the most recent failure, verbatim.
    pub last_error: Option<String>,
    /// Earliest time the retry sweep may pick the document up again.
    pub next_retry_at: Option<Timestamp>,
    /// The authority refused the credentials. The sweep skips the document
    /// until the hold is released; an explicit retry is still allowed.
    #[serde(default)]
    pub held_for_credentials: bool,
    /// Ordered log of all state transitions.
    pub transitions: Vec<TransitionRecord>,
}

impl Default for SubmissionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionLifecycle {
    /// A fresh lifecycle in `Draft`.
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Draft,
            retryable: false,
            attempts: 0,
            last_error: None,
            next_retry_at: None,
            held_for_credentials: false,
            transitions: Vec::new(),
        }
    }

    /// DRAFT → SEQUENCING. Requires every line to carry its authority tax
    /// code.
    pub fn begin_sequencing(&mut self, lines_frozen: bool) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Draft, "SEQUENCING")?;
        if !lines_frozen {
            return Err(LifecycleError::LinesNotFrozen);
        }
        self.do_transition(SubmissionState::Sequencing, "lines frozen");
        Ok(())
    }

    /// SEQUENCING → BUILT, once the number is reserved and the payload frozen.
    pub fn mark_built(&mut self, reason: &str) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Sequencing, "BUILT")?;
        self.do_transition(SubmissionState::Built, reason);
        Ok(())
    }

    /// BUILT → SUBMITTING, or REJECTED → SUBMITTING for a retryable
    /// rejection. Counts the attempt.
    pub fn begin_submission(&mut self) -> Result<(), LifecycleError> {
        self.require_not_terminal()?;
        match self.state {
            SubmissionState::Built => {}
            SubmissionState::Rejected if self.retryable => {}
            SubmissionState::Rejected => return Err(LifecycleError::NotRetryable),
            _ => return Err(self.invalid("SUBMITTING")),
        }
        self.attempts = self.attempts.saturating_add(1);
        let reason = format!("attempt {}", self.attempts);
        self.do_transition(SubmissionState::Submitting, &reason);
        Ok(())
    }

    /// SUBMITTING → ACCEPTED.
    pub fn accept(&mut self, reason: &str) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Submitting, "ACCEPTED")?;
        self.retryable = false;
        self.last_error = None;
        self.next_retry_at = None;
        self.held_for_credentials = false;
        self.do_transition(SubmissionState::Accepted, reason);
        Ok(())
    }

    /// SUBMITTING → REJECTED with `retryable = true`.
    pub fn reject_retryable(
        &mut self,
        error: &str,
        next_retry_at: Option<Timestamp>,
    ) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Submitting, "REJECTED")?;
        self.retryable = true;
        self.last_error = Some(error.to_string());
        self.next_retry_at = next_retry_at;
        self.held_for_credentials = false;
        self.do_transition(SubmissionState::Rejected, error);
        Ok(())
    }

    /// SUBMITTING → REJECTED when the authority refused the credentials.
    /// The document stays retryable but is held out of sweeps.
    pub fn reject_unauthorized(&mut self, error: &str) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Submitting, "REJECTED")?;
        self.retryable = true;
        self.last_error = Some(error.to_string());
        self.next_retry_at = None;
        self.held_for_credentials = true;
        self.do_transition(SubmissionState::Rejected, error);
        Ok(())
    }

    /// Let the sweep pick up a document held for credentials. Returns
    /// whether a hold was released.
    pub fn release_credential_hold(&mut self) -> bool {
        let held = self.state == SubmissionState::Rejected && self.held_for_credentials;
        self.held_for_credentials = false;
        held
    }

    /// SUBMITTING → PERMANENTLY_REJECTED on a definitive business rejection.
    pub fn reject_permanently(&mut self, message: &str) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Submitting, "PERMANENTLY_REJECTED")?;
        self.retryable = false;
        self.last_error = Some(message.to_string());
        self.next_retry_at = None;
        self.held_for_credentials = false;
        self.do_transition(SubmissionState::PermanentlyRejected, message);
        Ok(())
    }

    /// REJECTED → PERMANENTLY_REJECTED by operator decision.
    pub fn abandon(&mut self, reason: &str) -> Result<(), LifecycleError> {
        self.require_state(SubmissionState::Rejected, "PERMANENTLY_REJECTED")?;
        self.retryable = false;
        self.next_retry_at = None;
        self.held_for_credentials = false;
        self.do_transition(SubmissionState::PermanentlyRejected, reason);
        Ok(())
    }

    /// Whether the document is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the document is `Rejected`, retryable, not held for
    /// credentials, and past its backoff.
    pub fn is_retry_due(&self, now: Timestamp) -> bool {
        self.state == SubmissionState::Rejected
            && self.retryable
            && !self.held_for_credentials
            && self.next_retry_at.map_or(true, |at| at <= now)
    }

    fn require_not_terminal(&self) -> Result<(), LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::TerminalState {
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn require_state(&self, expected: SubmissionState, target: &str) -> Result<(), LifecycleError> {
        self.require_not_terminal()?;
        if self.state != expected {
            return Err(self.invalid(target));
        }
        Ok(())
    }

    fn invalid(&self, target: &str) -> LifecycleError {
        LifecycleError::InvalidTransition {
            from: self.state.to_string(),
            to: target.to_string(),
        }
    }

    fn do_transition(&mut self, to: SubmissionState, reason: &str) {
        self.transitions.push(TransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.state = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
