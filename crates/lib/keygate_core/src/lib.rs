//! # keygate_core
//!
//! Core domain logic for Keygate: credential verification, token issuance,
//! refresh-session storage, verification-code flow, and the collaborator
//! contracts (user directory, mail, key-value cache) the auth flows consume.

pub mod auth;
pub mod cache;
pub mod directory;
pub mod mail;
pub mod migrate;
pub mod models;
pub mod sync;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
