//! In-memory identity and profile services for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use miniteacher_auth::{Profile, Session, SessionUser};
use miniteacher_core::UserId;

use crate::error::{AuthError, ProfileError};
use crate::provider::{AuthChange, AuthEvent, ChangeBroadcaster, IdentityProvider, ProfileStore};

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
}

/// Identity provider backed by a local account table.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    changes: ChangeBroadcaster,
    fail_sign_out: AtomicBool,
    recovery_requests: RwLock<Vec<(String, String)>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its subject id.
    pub async fn add_account(&self, email: &str, password: &str) -> UserId {
        let id = UserId::new();
        self.accounts.write().await.insert(
            email.to_lowercase(),
            Account {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    /// Pretend a session survived from a previous run.
    pub async fn persist_session(&self, session: Session) {
        *self.current.write().await = Some(session);
    }

    /// Make remote sign-out fail with a network error.
    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Rotate the current session's tokens and notify subscribers.
    pub async fn refresh(&self) -> Option<Session> {
        let refreshed = {
            let mut current = self.current.write().await;
            let session = current.as_mut()?;
            session.access_token = token();
            session.refresh_token = token();
            session.expires_at = Utc::now() + Duration::hours(1);
            session.clone()
        };
        self.changes
            .emit(AuthChange::new(AuthEvent::TokenRefreshed, Some(refreshed.clone())));
        Some(refreshed)
    }

    /// `(email, redirect_to)` pairs received by the recovery endpoint.
    pub async fn recovery_requests(&self) -> Vec<(String, String)> {
        self.recovery_requests.read().await.clone()
    }
}

fn token() -> String {
    Uuid::now_v7().simple().to_string()
}

/// A fresh one-hour session for `id`.
pub fn issue_session(id: UserId, email: Option<&str>) -> Session {
    Session {
        access_token: token(),
        refresh_token: token(),
        expires_at: Utc::now() + Duration::hours(1),
        user: SessionUser {
            id,
            email: email.map(str::to_string),
        },
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current.read().await.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let account = self
            .accounts
            .read()
            .await
            .get(&email.to_lowercase())
            .cloned()
            .filter(|account| account.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let session = issue_session(account.id, Some(email));
        *self.current.write().await = Some(session.clone());
        self.changes
            .emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        if self.current.write().await.take().is_some() {
            self.changes.emit(AuthChange::new(AuthEvent::SignedOut, None));
        }
        Ok(())
    }

    fn on_auth_state_change(&self) -> mpsc::UnboundedReceiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        self.recovery_requests
            .write()
            .await
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self
            .current
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .values_mut()
            .find(|account| account.id == session.subject())
            .ok_or_else(|| AuthError::Unknown("account disappeared".to_string()))?;
        account.password = new_password.to_string();
        drop(accounts);

        self.changes
            .emit(AuthChange::new(AuthEvent::UserUpdated, Some(session)));
        Ok(())
    }
}

/// Profile store backed by a map; counts lookups.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<UserId, Profile>>,
    lookups: AtomicUsize,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id, profile);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, ProfileError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(ProfileError::NotFound(user_id))
    }
}
