//! `miniteacher-core`: primitives shared by the client crates.
//!
//! No IO, no async, no transport concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
