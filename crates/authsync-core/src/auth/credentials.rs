use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Durable, client-scoped string storage.
///
/// A missing key is a valid state and must be reported as `Ok(None)`.
/// Removing a missing key is a no-op.
pub trait CredentialBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Persists the token pair under fixed keys.
/// Clone is cheap - the backend is shared.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    /// Store both tokens, replacing any previous pair.
    /// If the refresh token cannot be written the access token is removed
    /// again, so a new access token never sits next to a stale refresh token.
    pub fn save(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.backend
            .set(ACCESS_TOKEN_KEY, access_token)
            .context("Failed to store access token")?;
        if let Err(e) = self.backend.set(REFRESH_TOKEN_KEY, refresh_token) {
            if let Err(rollback) = self.backend.remove(ACCESS_TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back access token");
            }
            return Err(e).context("Failed to store refresh token");
        }
        debug!("Credentials saved");
        Ok(())
    }

    pub fn load_access(&self) -> Result<Option<String>> {
        self.backend
            .get(ACCESS_TOKEN_KEY)
            .context("Failed to read access token")
    }

    pub fn load_refresh(&self) -> Result<Option<String>> {
        self.backend
            .get(REFRESH_TOKEN_KEY)
            .context("Failed to read refresh token")
    }

    /// Remove both tokens. Clearing an empty store succeeds.
    pub fn clear(&self) -> Result<()> {
        // Attempt both removals even if the first fails
        let access = self.backend.remove(ACCESS_TOKEN_KEY);
        let refresh = self.backend.remove(REFRESH_TOKEN_KEY);
        access.context("Failed to remove access token")?;
        refresh.context("Failed to remove refresh token")?;
        debug!("Credentials cleared");
        Ok(())
    }

    /// Check if an access token is persisted
    pub fn has_credentials(&self) -> bool {
        matches!(self.load_access(), Ok(Some(_)))
    }
}

// ============================================================================
// Tests
// ============================================================================
