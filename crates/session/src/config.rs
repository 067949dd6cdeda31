//! Client configuration, read from the environment.

use std::path::PathBuf;

use thiserror::Error;

use miniteacher_auth::Route;

pub const DEFAULT_API_URL: &str = "http://localhost:54321";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROFILES_TABLE: &str = "profiles";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Where the auth/data backend lives and how the client talks to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend (auth under `/auth/v1`, rows under `/rest/v1`).
    pub api_url: String,
    /// Public API key sent with every request.
    pub anon_key: String,
    pub profiles_table: String,
    /// Persisted session location; `None` keeps sessions in memory only.
    pub session_file: Option<PathBuf>,
    /// Public origin of the client, used for email redirect links.
    pub site_url: String,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            anon_key: anon_key.into(),
            profiles_table: DEFAULT_PROFILES_TABLE.to_string(),
            session_file: None,
            site_url: DEFAULT_SITE_URL.to_string(),
        }
    }

    /// Read `MINITEACHER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url =
            non_empty("MINITEACHER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "MINITEACHER_API_URL",
                reason: format!("expected an http(s) URL, got '{}'", api_url),
            });
        }

        let anon_key = non_empty("MINITEACHER_ANON_KEY")
            .ok_or(ConfigError::Missing("MINITEACHER_ANON_KEY"))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key,
            profiles_table: non_empty("MINITEACHER_PROFILES_TABLE")
                .unwrap_or_else(|| DEFAULT_PROFILES_TABLE.to_string()),
            session_file: non_empty("MINITEACHER_SESSION_FILE").map(PathBuf::from),
            site_url: non_empty("MINITEACHER_SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
        })
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Link target embedded in password recovery emails.
    pub fn reset_password_redirect(&self) -> String {
        format!("{}{}", self.site_url, Route::ResetPassword.path())
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.api_url, path)
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }
}
