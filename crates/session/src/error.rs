//! Failure taxonomy of the session layer.
//!
//! Nothing here is fatal: the worst outcome of any of these is a redirect to
//! the sign-in view.

use thiserror::Error;

use miniteacher_core::{DomainError, UserId};

/// Failures returned by sign-in, sign-out and the recovery flows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email/password. Shown inline; the user can correct it.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Transport failure; the same action may be retried.
    #[error("network error: {0}")]
    Network(String),

    /// Local form validation failed before anything was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,

    /// Session is valid but the profile could not be loaded.
    #[error("profile unavailable: {0}")]
    ProfileUnavailable(String),

    #[error("unexpected auth failure: {0}")]
    Unknown(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::ProfileUnavailable(_))
    }

    /// Message suitable for direct display.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password".to_string(),
            AuthError::Network(_) => "Could not reach the server, please try again".to_string(),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::NotAuthenticated => "Please sign in again".to_string(),
            AuthError::ProfileUnavailable(_) => "Your profile could not be loaded".to_string(),
            AuthError::Unknown(_) => "Something went wrong".to_string(),
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                AuthError::Validation(msg)
            }
        }
    }
}

/// Failures of a profile lookup. Absorbed by the store; never ends a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("no profile for user {0}")]
    NotFound(UserId),

    #[error("network error: {0}")]
    Network(String),

    #[error("could not decode profile: {0}")]
    Decode(String),
}

impl From<ProfileError> for AuthError {
    fn from(value: ProfileError) -> Self {
        AuthError::ProfileUnavailable(value.to_string())
    }
}
