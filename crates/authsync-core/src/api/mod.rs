//! Network collaborator contract and its REST implementation.
//!
//! The session core depends only on the `AuthBackend` and `UserDirectory`
//! traits. `ApiClient` implements both against the backend's REST API using
//! JWT bearer authentication.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{Credentials, NewAccount, ProfileUpdate, TokenPair, User};

pub use client::ApiClient;
pub use error::{ApiError, ErrorPayload};

/// Account endpoints: token issuance, registration and profile updates
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for an access + refresh token pair
    async fn obtain_token(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;

    /// Create a new account. Does not issue tokens.
    async fn register(&self, account: &NewAccount) -> Result<User, ApiError>;

    /// Apply a sparse update to a user's profile
    async fn update_user(
        &self,
        user_id: i64,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError>;
}

/// Profile lookup by id
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_user(&self, user_id: i64, token: &str) -> Result<User, ApiError>;
}
