//! The externally observable authentication state.

use miniteacher_core::UserId;

use crate::{Profile, Role, Session};

/// Immutable view of `{ session, profile, loading }`.
///
/// Fields are private so that a profile can never be attached without a
/// session. While `is_loading()` is true neither the session nor the profile
/// is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    session: Option<Session>,
    profile: Option<Profile>,
    loading: bool,
}

impl AuthSnapshot {
    /// State before the store has restored anything.
    pub fn loading() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            session: None,
            profile: None,
            loading: false,
        }
    }

    /// A profile, when given, must belong to the session's subject; a
    /// mismatched one is dropped.
    pub fn authenticated(session: Session, profile: Option<Profile>, loading: bool) -> Self {
        let profile = profile.filter(|p| p.id == session.subject());
        Self {
            session: Some(session),
            profile,
            loading,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn subject(&self) -> Option<UserId> {
        self.session.as_ref().map(Session::subject)
    }

    /// Resolved role, if the profile has arrived.
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Authenticated but the profile is pending or unavailable.
    pub fn profile_pending(&self) -> bool {
        self.session.is_some() && self.profile.is_none()
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}
