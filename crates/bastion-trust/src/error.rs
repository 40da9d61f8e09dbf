//! Error types for backends and trust operations.

use bastion_types::{CertAuthId, TypeError};
use thiserror::Error;

/// Error returned by a key/value [`crate::Backend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No live value is stored under the key.
    #[error("key {key:?} is not found")]
    NotFound { key: String },

    /// The backend could not serve the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn not_found(key: impl Into<String>) -> Self {
        BackendError::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

/// Error type for certificate authority operations.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Deactivation was requested for an authority that is not active.
    #[error("{0} is not active")]
    NotActive(CertAuthId),

    /// Activation was requested for an authority that is not deactivated.
    #[error("{0} is not deactivated")]
    NotDeactivated(CertAuthId),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A stored record could not be encoded or decoded.
    #[error("failed to marshal certificate authority: {0}")]
    Marshal(#[from] serde_json::Error),

    #[error("invalid certificate authority: {0}")]
    Invalid(#[from] TypeError),
}

impl TrustError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrustError::Backend(err) if err.is_not_found())
    }
}

/// Result type for trust operations.
pub type Result<T> = std::result::Result<T, TrustError>;
