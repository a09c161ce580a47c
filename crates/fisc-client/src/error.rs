//! Transport and client error types.

use fisc_core::ConfigError;

/// A request that never produced an HTTP response.
///
/// Every variant is ambiguous from the engine's point of view: the authority
/// may or may not have processed the request, so callers treat all of them
/// as retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response within the configured timeout.
    #[error("request to {endpoint} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Target URL.
        endpoint: String,
        /// Time spent before giving up.
        elapsed_ms: u64,
    },

    /// Connection refused, reset, DNS failure or TLS failure.
    #[error("connection to {endpoint} failed: {reason}")]
    Connection {
        /// Target URL.
        endpoint: String,
        /// Underlying error text.
        reason: String,
    },
}

impl TransportError {
    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors building requests or talking to an authority outside a
/// submission.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration could not produce a usable request.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A credential or identifier cannot be carried in an HTTP header.
    #[error("invalid credentials: header {header} {reason}")]
    InvalidCredentials {
        /// Header name.
        header: String,
        /// Why it was refused.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The authority answered a connection test with a failure.
    #[error("connection test failed ({status}): {message}")]
    ConnectionTest {
        /// HTTP status or authority result code.
        status: String,
        /// Authority message.
        message: String,
    },
}
