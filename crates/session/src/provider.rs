//! Seams to the external identity and profile services.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use miniteacher_auth::{Profile, Session};
use miniteacher_core::UserId;

use crate::error::{AuthError, ProfileError};

/// Kind of auth-state change reported by the identity provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One notification on the provider's change channel.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Identity provider contract (credential verification lives behind it).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Persisted session to restore at startup, if any.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribe to auth-state changes, delivered in emission order.
    fn on_auth_state_change(&self) -> mpsc::UnboundedReceiver<AuthChange>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError>;
}

/// Keyed profile lookup by authenticated subject.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, ProfileError>;
}

/// Fan-out of [`AuthChange`]s to every live subscriber.
#[derive(Debug, Default)]
pub struct ChangeBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthChange>>>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver to all subscribers, dropping the ones that went away.
    pub fn emit(&self, change: AuthChange) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        tracing::debug!(
            event = ?change.event,
            subscribers = subscribers.len(),
            "auth change emitted"
        );
    }
}
