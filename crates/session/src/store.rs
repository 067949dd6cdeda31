//! Session Store: the single owner of authentication state.
//!
//! This module provides a `SessionStore` that:
//! - Restores a persisted session once at startup and resolves its profile
//! - Processes provider change notifications one at a time, in order
//! - Publishes immutable [`AuthSnapshot`]s to consumers
//! - Discards profile fetches superseded by a newer session
//!
//! The event loop only holds a weak reference to the store: dropping the last
//! handle stops it. `shutdown` stops it deterministically and waits for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;

use miniteacher_auth::{
    validate_session, AuthSnapshot, NewPassword, PasswordResetRequest, Profile, Session, SignInForm,
};
use miniteacher_core::UserId;

use crate::error::{AuthError, ProfileError};
use crate::provider::{AuthChange, AuthEvent, IdentityProvider, ProfileStore};

/// Handle to the store. Clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    state: Mutex<StoreState>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    initialized: AtomicBool,
    shutdown: Arc<Notify>,
    /// Asks the event loop to drop every change queued so far. Closed on
    /// shutdown.
    fence: Mutex<Option<mpsc::UnboundedSender<oneshot::Sender<()>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// A profile fetch in flight. Only the most recent ticket may land.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct FetchTicket {
    subject: UserId,
    seq: u64,
}

#[derive(Debug)]
struct StoreState {
    session: Option<Session>,
    profile: Option<Profile>,
    restoring: bool,
    pending: Option<FetchTicket>,
    next_seq: u64,
    /// Bumped on every session replacement.
    revision: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            session: None,
            profile: None,
            restoring: true,
            pending: None,
            next_seq: 0,
            revision: 0,
        }
    }

    fn subject(&self) -> Option<UserId> {
        self.session.as_ref().map(Session::subject)
    }

    fn start_fetch(&mut self, subject: UserId) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket {
            subject,
            seq: self.next_seq,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// Replace the session wholesale. Returns a ticket when the subject
    /// changed and its profile must be fetched.
    fn replace_session(&mut self, session: Option<Session>) -> Option<FetchTicket> {
        self.revision += 1;
        let previous = self.subject();

        match session {
            None => {
                self.session = None;
                self.profile = None;
                self.pending = None;
                None
            }
            Some(session) => {
                let subject = session.subject();
                self.session = Some(session);
                if previous == Some(subject) {
                    return None;
                }
                self.profile = None;
                Some(self.start_fetch(subject))
            }
        }
    }

    fn snapshot(&self) -> AuthSnapshot {
        let loading = self.restoring || self.pending.is_some();
        match &self.session {
            None if loading => AuthSnapshot::loading(),
            None => AuthSnapshot::signed_out(),
            Some(session) => {
                AuthSnapshot::authenticated(session.clone(), self.profile.clone(), loading)
            }
        }
    }
}

/// How a profile fetch ended.
#[derive(Debug)]
enum FetchOutcome {
    Applied(Profile),
    Failed(ProfileError),
    Superseded,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::loading());
        Self {
            inner: Arc::new(Inner {
                identity,
                profiles,
                state: Mutex::new(StoreState::new()),
                snapshot_tx,
                initialized: AtomicBool::new(false),
                shutdown: Arc::new(Notify::new()),
                fence: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Current immutable view of the auth state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Restore the persisted session and resolve its profile.
    ///
    /// Subscribes to the provider's change channel first so no notification
    /// emitted during the restore is lost. Only the first call does anything.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("session store already initialized; ignoring");
            return;
        }

        let changes = self.inner.identity.on_auth_state_change();
        let (fence_tx, fences) = mpsc::unbounded_channel();
        *self.inner.fence.lock().await = Some(fence_tx);
        let worker = tokio::spawn(Self::run_event_loop(
            Arc::downgrade(&self.inner),
            self.inner.shutdown.clone(),
            changes,
            fences,
        ));
        *self.inner.worker.lock().await = Some(worker);

        let revision = self.inner.state.lock().await.revision;

        let restored = match self.inner.identity.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("failed to restore persisted session: {}", e);
                None
            }
        };
        let restored = restored.filter(|session| match validate_session(session, Utc::now()) {
            Ok(()) => true,
            Err(e) => {
                tracing::info!("discarding restored session: {}", e);
                false
            }
        });

        let ticket = {
            let mut state = self.inner.state.lock().await;
            state.restoring = false;
            let ticket = if state.revision == revision {
                tracing::info!(
                    user_id = ?restored.as_ref().map(Session::subject),
                    "restored persisted session"
                );
                state.replace_session(restored)
            } else {
                tracing::debug!("session changed while restoring; keeping newer session");
                None
            };
            self.publish(&state);
            ticket
        };

        if let Some(ticket) = ticket {
            self.fetch_profile(ticket).await;
        }
    }

    /// Verify credentials with the identity provider.
    ///
    /// State is not touched here: the provider's `SignedIn` notification
    /// drives the update, so repeated or racing calls are harmless.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        SignInForm { email, password }.validate()?;

        match self.inner.identity.sign_in_with_password(email.trim(), password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.subject(), "sign-in accepted");
                Ok(())
            }
            Err(e) => {
                match &e {
                    AuthError::Unknown(_) => tracing::error!("sign-in failed: {}", e),
                    _ => tracing::warn!("sign-in failed: {}", e),
                }
                Err(e)
            }
        }
    }

    /// Invalidate the session remotely (best effort) and clear it locally.
    ///
    /// Local state is cleared even when the remote call fails; the remote
    /// error is still returned for display. Notifications the provider queued
    /// before this call are dropped, so none of them can restore the session.
    /// Returns once the event loop has finished the change it was handling.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = self.inner.identity.sign_out().await;
        if let Err(e) = &remote {
            tracing::warn!("remote sign-out failed, clearing local session anyway: {}", e);
        }

        {
            let mut state = self.inner.state.lock().await;
            if state.session.is_some() {
                tracing::info!(user_id = ?state.subject(), "signed out");
            }
            state.replace_session(None);
            self.publish(&state);
        }

        self.fence_queued_changes().await;
        remote
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        PasswordResetRequest { email }.validate()?;
        self.inner
            .identity
            .reset_password_for_email(email.trim(), redirect_to)
            .await
            .inspect_err(|e| tracing::warn!("password reset request failed: {}", e))
    }

    pub async fn update_password(
        &self,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        NewPassword {
            password,
            confirmation,
        }
        .validate()?;
        if !self.snapshot().is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        self.inner
            .identity
            .update_password(password)
            .await
            .inspect_err(|e| tracing::warn!("password update failed: {}", e))
    }

    /// Fetch the profile for the current subject again.
    ///
    /// Manual retry after a `ProfileUnavailable`; returns `Ok(None)` when
    /// nobody is signed in.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>, AuthError> {
        let ticket = {
            let mut state = self.inner.state.lock().await;
            let Some(subject) = state.subject() else {
                return Ok(None);
            };
            let ticket = state.start_fetch(subject);
            self.publish(&state);
            ticket
        };

        match self.fetch_profile(ticket).await {
            FetchOutcome::Applied(profile) => Ok(Some(profile)),
            FetchOutcome::Failed(e) => Err(e.into()),
            FetchOutcome::Superseded => Ok(self.snapshot().profile().cloned()),
        }
    }

    /// Stop processing change notifications and wait for the loop to exit.
    ///
    /// Does nothing before `initialize`.
    pub async fn shutdown(&self) {
        if !self.inner.initialized.load(Ordering::SeqCst) {
            tracing::debug!("session store not initialized; nothing to shut down");
            return;
        }

        self.inner.fence.lock().await.take();
        self.inner.shutdown.notify_one();
        let worker = self.inner.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("session event loop ended abnormally: {}", e);
            }
        }
    }

    async fn run_event_loop(
        inner: Weak<Inner>,
        shutdown: Arc<Notify>,
        mut changes: mpsc::UnboundedReceiver<AuthChange>,
        mut fences: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    ) {
        tracing::debug!("session event loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => {
                    tracing::debug!("session event loop received shutdown signal");
                    break;
                }
                fence = fences.recv() => {
                    let Some((reply, store)) = fence.zip(Self::upgrade(&inner)) else {
                        tracing::debug!("session store released");
                        break;
                    };
                    store.discard_queued(&mut changes).await;
                    let _ = reply.send(());
                }
                change = changes.recv() => {
                    let Some(change) = change else {
                        tracing::debug!("identity provider closed its change channel");
                        break;
                    };
                    let Some(store) = Self::upgrade(&inner) else {
                        tracing::debug!("session store released");
                        break;
                    };
                    // Handled to completion before the next one is read.
                    store.handle_change(change).await;
                }
            }
        }

        tracing::debug!("session event loop stopped");
    }

    fn upgrade(inner: &Weak<Inner>) -> Option<SessionStore> {
        inner.upgrade().map(|inner| SessionStore { inner })
    }

    /// Wait until the event loop has dropped every change queued so far.
    async fn fence_queued_changes(&self) {
        let fence = self.inner.fence.lock().await.clone();
        let Some(fence) = fence else {
            return;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if fence.send(reply_tx).is_ok() {
            // The reply is dropped unanswered when the loop stops first.
            let _ = reply_rx.await;
        }
    }

    async fn discard_queued(&self, changes: &mut mpsc::UnboundedReceiver<AuthChange>) {
        let mut discarded = 0usize;
        while let Ok(change) = changes.try_recv() {
            tracing::debug!(event = ?change.event, "dropping auth change queued before sign-out");
            discarded += 1;
        }
        if discarded > 0 {
            tracing::info!(discarded, "dropped auth changes queued before sign-out");
        }

        let mut state = self.inner.state.lock().await;
        state.replace_session(None);
        self.publish(&state);
    }

    async fn handle_change(&self, change: AuthChange) {
        tracing::debug!(
            event = ?change.event,
            user_id = ?change.session.as_ref().map(Session::subject),
            "processing auth change"
        );

        let session = match change.event {
            AuthEvent::SignedOut => None,
            _ => change.session,
        };

        let ticket = {
            let mut state = self.inner.state.lock().await;
            let ticket = state.replace_session(session);
            self.publish(&state);
            ticket
        };

        if let Some(ticket) = ticket {
            self.fetch_profile(ticket).await;
        }
    }

    async fn fetch_profile(&self, ticket: FetchTicket) -> FetchOutcome {
        let result = self.inner.profiles.get_profile(ticket.subject).await;

        let mut state = self.inner.state.lock().await;
        if state.pending != Some(ticket) || state.subject() != Some(ticket.subject) {
            tracing::warn!(user_id = %ticket.subject, "discarding superseded profile fetch");
            return FetchOutcome::Superseded;
        }
        state.pending = None;

        let outcome = match result {
            Ok(profile) if profile.id == ticket.subject => {
                state.profile = Some(profile.clone());
                FetchOutcome::Applied(profile)
            }
            Ok(profile) => {
                let e = ProfileError::Decode(format!(
                    "profile {} returned for user {}",
                    profile.id, ticket.subject
                ));
                tracing::warn!(user_id = %ticket.subject, "profile unavailable: {}", e);
                FetchOutcome::Failed(e)
            }
            Err(e) => {
                tracing::warn!(user_id = %ticket.subject, "profile unavailable: {}", e);
                FetchOutcome::Failed(e)
            }
        };

        self.publish(&state);
        outcome
    }

    fn publish(&self, state: &StoreState) {
        let next = state.snapshot();
        self.inner.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use miniteacher_auth::{Role, SessionUser};

    fn session_for(id: UserId) -> Session {
        Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + Duration::hours(1),
            user: SessionUser { id, email: None },
        }
    }

    #[test]
    fn clearing_the_session_clears_profile_and_pending_fetch() {
        let id = UserId::new();
        let mut state = StoreState::new();
        state.restoring = false;
        let ticket = state.replace_session(Some(session_for(id)));
        assert!(ticket.is_some());
        state.profile = Some(Profile {
            id,
            name: None,
            lastname: None,
            nick: None,
            role: Role::Student,
        });

        assert_eq!(state.replace_session(None), None);
        assert!(state.profile.is_none());
        assert!(state.pending.is_none());
        assert_eq!(state.snapshot(), AuthSnapshot::signed_out());
    }

    #[test]
    fn same_subject_keeps_profile_without_refetch() {
        let id = UserId::new();
        let mut state = StoreState::new();
        state.restoring = false;
        state.replace_session(Some(session_for(id)));
        state.pending = None;

        let mut refreshed = session_for(id);
        refreshed.access_token = "rotated".into();
        assert_eq!(state.replace_session(Some(refreshed)), None);
        assert_eq!(state.session.as_ref().map(|s| s.access_token.as_str()), Some("rotated"));
    }

    #[test]
    fn loading_tracks_restore_and_pending_fetch() {
        let mut state = StoreState::new();
        assert!(state.snapshot().is_loading());

        state.restoring = false;
        assert!(!state.snapshot().is_loading());

        state.replace_session(Some(session_for(UserId::new())));
        assert!(state.snapshot().is_loading());

        state.pending = None;
        assert!(!state.snapshot().is_loading());
    }

    #[test]
    fn newer_fetch_supersedes_older_ticket() {
        let id = UserId::new();
        let mut state = StoreState::new();
        let first = state.start_fetch(id);
        let second = state.start_fetch(id);
        assert_ne!(first, second);
        assert_eq!(state.pending, Some(second));
    }
}
