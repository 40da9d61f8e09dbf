//! Role validation errors.

use bastion_types::TypeError;
use thiserror::Error;

use crate::traits::TemplateError;

/// Error raised while parsing, converting or validating a role document.
///
/// A role that produced one of these never reaches a [`crate::RoleSet`].
#[derive(Debug, Error)]
pub enum RoleError {
    /// The document was empty.
    #[error("empty input")]
    EmptyInput,

    /// The document is not well-formed JSON or does not fit the schema.
    #[error("failed to parse role: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document names a schema version this crate cannot read.
    #[error("role version {0:?} is not supported")]
    UnsupportedVersion(String),

    /// A field failed validation.
    #[error("failed to validate: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A login carries a malformed trait placeholder.
    #[error("failed to validate: login {login:?}: {source}")]
    TraitSyntax {
        login: String,
        #[source]
        source: TemplateError,
    },
}

impl From<TypeError> for RoleError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::Validation { field, reason } => RoleError::Validation {
                field: field.to_string(),
                reason,
            },
            other => RoleError::Validation {
                field: "spec".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for role operations.
pub type Result<T> = std::result::Result<T, RoleError>;
