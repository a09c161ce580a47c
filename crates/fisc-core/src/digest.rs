//! # Payload Digests
//!
//! Every request body sent to an authority is identified by the SHA-256 of
//! its exact bytes. The digest is recorded on every submission attempt and
//! lets operators prove that a retry resent the same payload.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    let hash = Sha256::digest(input.as_ref());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 digest of a payload body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadDigest(String);

impl PayloadDigest {
    /// Digest the given bytes.
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        Self(sha256_hex(bytes))
    }

    /// Wrap an already-computed hex digest (e.g. loaded from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The 64-character lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `bytes` hash to this digest.
    pub fn matches(&self, bytes: impl AsRef<[u8]>) -> bool {
        sha256_hex(bytes) == self.0
    }
}

impl std::fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}
