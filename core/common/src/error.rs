//! Common error types for DriveGate.

use thiserror::Error;

/// Top-level error type for DriveGate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed (key derivation, encryption).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A session or continuation token failed to authenticate, or the
    /// identity it carried is no longer current.
    ///
    /// Surfaced to callers as an unauthenticated response; never partial
    /// data and never a fallback to a default identity.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The upstream identity provider rejected a credential refresh.
    ///
    /// Does not invalidate other credentials in the pool; callers must
    /// force reselection rather than retry the same credential.
    #[error("Credential refresh failed: {0}")]
    AuthRefreshFailed(String),

    /// Network failure or non-2xx from the remote API or a blob fetch.
    ///
    /// Retryable at the request level; no automatic retry is performed
    /// inside the core.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// The resumable-upload poll endpoint returned a status code outside
    /// the recognized 200/404/308 set.
    #[error("unexpected API response status: {0}")]
    UnexpectedStatus(u16),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
