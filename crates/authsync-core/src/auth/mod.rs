//! Durable credential persistence.
//!
//! This module provides:
//! - `CredentialStore`: save/load/clear of the access and refresh token strings
//! - `CredentialBackend`: the key-value storage seam behind the store
//! - `KeyringBackend`, `FileBackend`, `MemoryBackend`: concrete storage
//!
//! Presence of an access token in the store is the only durable evidence of a
//! prior session.

pub mod backends;
pub mod credentials;

pub use backends::{FileBackend, KeyringBackend, MemoryBackend};
pub use credentials::{CredentialBackend, CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
