//! Client-side authentication session core.
//!
//! Acquires, validates, refreshes and discards a bearer-token session and
//! keeps the in-memory user in sync with the persisted credentials.
//!
//! - `token`: structural decoding of access token claims
//! - `auth`: durable storage of the access and refresh tokens
//! - `api`: the backend contract and its REST client
//! - `session`: the lifecycle state machine and its subscribable store
//! - `config`: client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod token;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, AuthBackend, UserDirectory};
pub use auth::CredentialStore;
pub use config::Config;
pub use models::{Avatar, AvatarFile, Credentials, NewAccount, ProfileUpdate, User};
pub use session::{Action, Session, SessionError, SessionMachine, SessionStore, Settled, Snapshot};
