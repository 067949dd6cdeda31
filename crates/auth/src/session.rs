use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use miniteacher_core::UserId;

/// Subject identity carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credential bundle issued by the identity provider.
///
/// Opaque to the client: it is never edited in place, only replaced wholesale
/// when the provider signs in, refreshes or signs out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    pub fn subject(&self) -> UserId {
        self.user.id
    }

    /// True once `now` is within `margin` of the expiry (or past it).
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session carries an empty access token")]
    MissingAccessToken,
}

/// Check a restored session before trusting it.
///
/// Signature and revocation are the provider's business; this only checks
/// what the client can see locally.
pub fn validate_session(
    session: &Session,
    now: DateTime<Utc>,
) -> Result<(), SessionValidationError> {
    if session.access_token.is_empty() {
        return Err(SessionValidationError::MissingAccessToken);
    }
    if now >= session.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: SessionUser {
                id: UserId::new(),
                email: Some("ana@example.com".to_string()),
            },
        }
    }

    #[test]
    fn live_session_is_valid() {
        let now = Utc::now();
        let session = session_expiring_at(now + Duration::minutes(30));
        assert_eq!(validate_session(&session, now), Ok(()));
    }

    #[test]
    fn expired_session_is_rejected() {
        let now = Utc::now();
        let session = session_expiring_at(now);
        assert_eq!(validate_session(&session, now), Err(SessionValidationError::Expired));
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let now = Utc::now();
        let mut session = session_expiring_at(now + Duration::minutes(30));
        session.access_token.clear();
        assert_eq!(
            validate_session(&session, now),
            Err(SessionValidationError::MissingAccessToken)
        );
    }

    #[test]
    fn expires_within_margin() {
        let now = Utc::now();
        let session = session_expiring_at(now + Duration::seconds(30));
        assert!(session.expires_within(now, Duration::minutes(1)));
        assert!(!session.expires_within(now, Duration::seconds(10)));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let session = session_expiring_at(Utc::now());
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("\"access\""));
        assert!(rendered.contains("<redacted>"));
    }
}
