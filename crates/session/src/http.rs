//! `reqwest` adapters for a GoTrue/PostgREST style backend.

use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, RwLock};

use miniteacher_auth::{Profile, Session, SessionUser};
use miniteacher_core::UserId;

use crate::config::ClientConfig;
use crate::error::{AuthError, ProfileError};
use crate::provider::{AuthChange, AuthEvent, ChangeBroadcaster, IdentityProvider, ProfileStore};

/// Restored sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: SessionUser {
                id: self.user.id,
                email: self.user.email,
            },
        }
    }
}

/// Identity provider speaking the `/auth/v1` REST API.
///
/// Keeps the current session in memory and, when configured, mirrors it to
/// a JSON file so the next process can restore it.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    config: ClientConfig,
    current: RwLock<Option<Session>>,
    changes: ChangeBroadcaster,
}

impl HttpIdentityProvider {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            current: RwLock::new(None),
            changes: ChangeBroadcaster::new(),
        }
    }

    /// Bearer token for data requests: the user's access token when signed
    /// in, the public key otherwise.
    pub async fn bearer_token(&self) -> String {
        match self.current.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.config.anon_key.clone(),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .header("Content-Type", "application/json")
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let url = self.config.auth_url("/token");
        let resp = self
            .request(self.client.post(&url))
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            status if status.is_success() => {
                let token: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| AuthError::Unknown(format!("malformed token response: {}", e)))?;
                Ok(token.into_session(Utc::now()))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            _ => Err(unexpected(resp).await),
        }
    }

    async fn load_persisted(&self) -> Option<Session> {
        let path = self.config.session_file.as_ref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("ignoring unreadable session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("failed to read session file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn persist(&self, session: Option<&Session>) {
        let Some(path) = self.config.session_file.as_ref() else {
            return;
        };
        let result = match session {
            Some(session) => match serde_json::to_vec(session) {
                Ok(bytes) => tokio::fs::write(path, bytes).await,
                Err(e) => {
                    tracing::warn!("failed to encode session: {}", e);
                    return;
                }
            },
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!("failed to update session file {}: {}", path.display(), e);
        }
    }

    async fn store_session(&self, session: Option<Session>) {
        self.persist(session.as_ref()).await;
        *self.current.write().await = session;
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let known = self.current.read().await.clone();
        let session = match known {
            Some(session) => session,
            None => match self.load_persisted().await {
                Some(session) => session,
                None => return Ok(None),
            },
        };

        if !session.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
            *self.current.write().await = Some(session.clone());
            return Ok(Some(session));
        }

        tracing::debug!(user_id = %session.subject(), "refreshing restored session");
        match self
            .token_grant("refresh_token", json!({ "refresh_token": session.refresh_token }))
            .await
        {
            Ok(refreshed) => {
                self.store_session(Some(refreshed.clone())).await;
                self.changes
                    .emit(AuthChange::new(AuthEvent::TokenRefreshed, Some(refreshed.clone())));
                Ok(Some(refreshed))
            }
            Err(AuthError::InvalidCredentials) => {
                tracing::info!("persisted session was revoked; discarding");
                self.store_session(None).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.store_session(Some(session.clone())).await;
        self.changes
            .emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.current.read().await.clone() else {
            return Ok(());
        };

        let remote = self
            .request(self.client.post(self.config.auth_url("/logout")))
            .bearer_auth(&session.access_token)
            .send()
            .await;

        // The local copy goes regardless of what the server says.
        self.store_session(None).await;
        self.changes.emit(AuthChange::new(AuthEvent::SignedOut, None));

        let resp = remote.map_err(network)?;
        if resp.status().is_success() || resp.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(unexpected(resp).await)
        }
    }

    fn on_auth_state_change(&self) -> mpsc::UnboundedReceiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let resp = self
            .request(self.client.post(self.config.auth_url("/recover")))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(network)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(resp).await)
        }
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self
            .current
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        let resp = self
            .request(self.client.put(self.config.auth_url("/user")))
            .bearer_auth(&session.access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            status if status.is_success() => {
                self.changes
                    .emit(AuthChange::new(AuthEvent::UserUpdated, Some(session)));
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(AuthError::NotAuthenticated),
            StatusCode::UNPROCESSABLE_ENTITY => Err(AuthError::Validation(
                resp.text().await.unwrap_or_default(),
            )),
            _ => Err(unexpected(resp).await),
        }
    }
}

fn network(e: reqwest::Error) -> AuthError {
    AuthError::Network(e.to_string())
}

async fn unexpected(resp: Response) -> AuthError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    AuthError::Unknown(format!("{}: {}", status, body))
}

/// Profile lookups against the `/rest/v1` row API.
pub struct HttpProfileStore {
    client: reqwest::Client,
    config: ClientConfig,
    identity: Arc<HttpIdentityProvider>,
}

impl HttpProfileStore {
    pub fn new(config: ClientConfig, identity: Arc<HttpIdentityProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            identity,
        }
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, ProfileError> {
        let url = self.config.rest_url(&self.config.profiles_table);
        let filter = format!("eq.{}", user_id);

        let resp = self
            .client
            .get(&url)
            .query(&[("id", filter.as_str()), ("select", "*")])
            .header("apikey", &self.config.anon_key)
            .header("Accept", "application/vnd.pgrst.object+json")
            .bearer_auth(self.identity.bearer_token().await)
            .send()
            .await
            .map_err(|e| ProfileError::Network(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => resp
                .json::<Profile>()
                .await
                .map_err(|e| ProfileError::Decode(e.to_string())),
            // PostgREST answers 406 when a single-object request matches no row.
            StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => {
                Err(ProfileError::NotFound(user_id))
            }
            status => Err(ProfileError::Network(format!(
                "{}: {}",
                status,
                resp.text().await.unwrap_or_default()
            ))),
        }
    }
}
