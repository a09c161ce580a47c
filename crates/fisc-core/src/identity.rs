//! # Identity Newtypes
//!
//! String identifiers issued by tax authorities ([`TaxpayerId`], [`BranchId`])
//! validate format at construction time. [`DocumentId`] is UUID-based and
//! always valid by construction.
//!
//! [`SequenceScope`] is the (taxpayer, branch) key that authority-facing
//! invoice numbers are unique and gapless within.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers
// ---------------------------------------------------------------------------

/// Stable internal identifier of a fiscal document. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new random document identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a document identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Authority-issued identifiers
// ---------------------------------------------------------------------------

/// Taxpayer identification number (Kenya PIN, Ghana TIN).
///
/// Stored uppercase. Authorities issue 1-20 character alphanumeric codes
/// (e.g. `P051234567X`, `C0000000000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxpayerId(String);

impl TaxpayerId {
    /// Create a taxpayer ID, trimming whitespace and uppercasing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTaxpayerId`] if the trimmed value is
    /// empty, longer than 20 characters, or contains non-alphanumerics.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_uppercase();
        if s.is_empty() || s.len() > 20 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidTaxpayerId(raw));
        }
        Ok(Self(s))
    }

    /// Access the TIN string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaxpayerId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaxpayerId> for String {
    fn from(id: TaxpayerId) -> Self {
        id.0
    }
}

/// Branch (eTIMS `bhfId`) or outlet identifier within a taxpayer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchId(String);

impl BranchId {
    /// Create a branch ID.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBranchId`] if the trimmed value is
    /// empty, longer than 10 characters, or contains non-alphanumerics.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_string();
        if s.is_empty() || s.len() > 10 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidBranchId(raw));
        }
        Ok(Self(s))
    }

    /// Access the branch string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchId> for String {
    fn from(id: BranchId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Sequence numbering
// ---------------------------------------------------------------------------

/// The (taxpayer, branch) key within which authority sequence numbers are
/// unique, strictly increasing and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceScope {
    /// Taxpayer that owns the sequence.
    pub taxpayer: TaxpayerId,
    /// Branch within the taxpayer.
    pub branch: BranchId,
}

impl SequenceScope {
    /// Create a scope from its parts.
    pub fn new(taxpayer: TaxpayerId, branch: BranchId) -> Self {
        Self { taxpayer, branch }
    }

    /// Stable key used for named locks (e.g. PostgreSQL advisory locks
    /// keyed by `hashtext(lock_key)`).
    pub fn lock_key(&self) -> String {
        format!("fisc_seq:{}:{}", self.taxpayer, self.branch)
    }
}

impl std::fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.taxpayer, self.branch)
    }
}

/// An authority-facing invoice number. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The first number of every scope.
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    /// Create a sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSequenceNumber`] for zero.
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidSequenceNumber(value));
        }
        Ok(Self(value))
    }

    /// The raw integer.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number following `current_max`, where zero means "no number
    /// issued yet in this scope".
    pub fn after(current_max: u64) -> Option<Self> {
        current_max.checked_add(1).map(Self)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for SequenceNumber {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SequenceNumber> for u64 {
    fn from(n: SequenceNumber) -> Self {
        n.0
    }
}
