//! Authentication: the credential record, its store, and the identity provider
//!
//! This module provides:
//! - The single persisted OAuth2 credential record
//! - SQLite and in-memory credential stores
//! - Google token refresh, code exchange, revocation and userinfo
//! - The browser login flow (PKCE + loopback redirect)

mod pkce;
mod credentials;
mod store;
mod identity;
mod callback_server;
mod login;

pub use credentials::{Credentials, GOOGLE_ISSUER};
pub use store::{CredentialStore, InMemoryCredentialStore, SqliteCredentialStore};
pub use identity::{GoogleIdentity, TokenRefresher, UserInfo, SCOPES};
pub use login::{logout, LoginFlow};
