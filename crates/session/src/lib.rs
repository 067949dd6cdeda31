//! `miniteacher-session`
//!
//! **Responsibility:** the async side of authentication in the client.
//!
//! This crate provides:
//! - `SessionStore`, the single owner of session/profile state
//! - Provider seams (`IdentityProvider`, `ProfileStore`) and their change channel
//! - HTTP adapters for the hosted auth/data backend
//! - In-memory adapters for local runs and tests
//!
//! Access decisions and navigation are pure and live in `miniteacher-auth`.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod provider;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use error::{AuthError, ProfileError};
pub use http::{HttpIdentityProvider, HttpProfileStore};
pub use provider::{AuthChange, AuthEvent, ChangeBroadcaster, IdentityProvider, ProfileStore};
pub use store::SessionStore;
