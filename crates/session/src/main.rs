//! Command-line session check.
//!
//! Restores the persisted session (or signs in with `MINITEACHER_EMAIL` /
//! `MINITEACHER_PASSWORD`), then reports what the client would show at
//! `MINITEACHER_ROUTE` (default `/dashboard`). With `MINITEACHER_RESET_EMAIL`
//! set it requests a password recovery email instead of signing in.

use std::sync::Arc;

use anyhow::Context;

use miniteacher_auth::{base_navigation, decide, initials_for, navigation_for, role_label, Route};
use miniteacher_session::{ClientConfig, HttpIdentityProvider, HttpProfileStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    miniteacher_observability::init();

    let config = ClientConfig::from_env().context("loading client configuration")?;
    tracing::info!(api_url = %config.api_url, "starting session check");

    let reset_redirect = config.reset_password_redirect();
    let identity = Arc::new(HttpIdentityProvider::new(config.clone()));
    let profiles = Arc::new(HttpProfileStore::new(config, identity.clone()));
    let store = SessionStore::new(identity, profiles);

    store.initialize().await;

    if let Ok(email) = std::env::var("MINITEACHER_RESET_EMAIL") {
        let result = store.request_password_reset(&email, &reset_redirect).await;
        match result {
            Ok(()) => {
                tracing::info!(redirect_to = %reset_redirect, "password recovery requested")
            }
            Err(e) => tracing::error!("password recovery failed: {}", e.user_message()),
        }
        store.shutdown().await;
        return Ok(());
    }

    let mut expect_session = store.snapshot().is_authenticated();
    if !expect_session {
        if let (Ok(email), Ok(password)) = (
            std::env::var("MINITEACHER_EMAIL"),
            std::env::var("MINITEACHER_PASSWORD"),
        ) {
            match store.sign_in(&email, &password).await {
                Ok(()) => expect_session = true,
                Err(e) => tracing::error!("sign-in failed: {}", e.user_message()),
            }
        }
    }

    // The sign-in notification is applied by the store's event loop.
    let mut updates = store.subscribe();
    let snapshot = updates
        .wait_for(|s| !s.is_loading() && (s.is_authenticated() || !expect_session))
        .await
        .context("session store stopped before settling")?
        .clone();

    let location = std::env::var("MINITEACHER_ROUTE")
        .unwrap_or_else(|_| Route::Dashboard.path().to_string());
    let route = Route::from_path(&location).with_context(|| format!("unknown route {location}"))?;

    let profile = snapshot.profile();
    let entries = navigation_for(&base_navigation(), profile);
    let navigation: Vec<&str> = entries.iter().map(|item| item.route.path()).collect();
    let active = entries.iter().find(|item| item.is_active(&location)).map(|item| item.title);

    tracing::info!(
        authenticated = snapshot.is_authenticated(),
        user_id = ?snapshot.subject(),
        initials = %initials_for(profile),
        role = role_label(profile),
        ?navigation,
        ?active,
        route = %route,
        decision = ?decide(&snapshot, route),
        "session settled"
    );

    store.shutdown().await;
    Ok(())
}
