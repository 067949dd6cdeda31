//! Domain error model.

use thiserror::Error;

/// Result type used across the pure client layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic, input-driven failures (validation, parsing).
///
/// Transport and provider failures have their own taxonomy in
/// `miniteacher-session`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed form input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
