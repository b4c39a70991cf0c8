//! Session lifecycle transitions.
//!
//! Each asynchronous operation commits its pending phase synchronously when
//! called and returns a future that settles it. Failures never escape: every
//! future resolves to a `Settled` record and the session carries the message.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthBackend, UserDirectory};
use crate::auth::CredentialStore;
use crate::models::{Credentials, NewAccount, ProfileUpdate, User};
use crate::token;

use super::error::{
    field_errors, SessionError, LOGIN_MESSAGES, REGISTER_MESSAGES, UPDATE_PROFILE_MESSAGES,
};
use super::state::{Operation, Phase, Snapshot};
use super::store::{SessionStore, SessionWatcher, Ticket};

/// Outcome of one invocation
#[derive(Debug)]
pub struct Settled {
    pub operation: Operation,
    pub seq: u64,
    /// False when a newer invocation of the same operation superseded this one
    pub committed: bool,
    pub result: Result<(), SessionError>,
}

impl Settled {
    fn new(ticket: &Ticket, committed: bool, result: Result<(), SessionError>) -> Self {
        Self {
            operation: ticket.operation,
            seq: ticket.seq,
            committed,
            result,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.result.is_ok()
    }

    pub fn phase(&self) -> Phase {
        if self.result.is_ok() {
            Phase::Fulfilled
        } else {
            Phase::Rejected
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.result.as_ref().err()
    }
}

/// Drives the session through its lifecycle.
/// Clone is cheap - all collaborators are shared.
#[derive(Clone)]
pub struct SessionMachine {
    store: Arc<SessionStore>,
    credentials: CredentialStore,
    auth: Arc<dyn AuthBackend>,
    directory: Arc<dyn UserDirectory>,
}

impl SessionMachine {
    pub fn new(
        store: Arc<SessionStore>,
        credentials: CredentialStore,
        auth: Arc<dyn AuthBackend>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            credentials,
            auth,
            directory,
        }
    }

    /// Use one REST client for both collaborator roles
    pub fn with_client(store: Arc<SessionStore>, credentials: CredentialStore, client: ApiClient) -> Self {
        let client = Arc::new(client);
        Self::new(store, credentials, client.clone(), client)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> SessionWatcher {
        self.store.subscribe()
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Exchange credentials for tokens, persist them, and load the user.
    /// A failure records the error but never logs out an existing session.
    pub fn login(&self, credentials: Credentials) -> impl Future<Output = Settled> + Send + 'static {
        let ticket = self.store.begin(Operation::Login);
        let this = self.clone();
        async move { this.finish_login(ticket, credentials).await }
    }

    async fn finish_login(&self, ticket: Ticket, credentials: Credentials) -> Settled {
        match self.authenticate(&credentials).await {
            Ok((token, user)) => {
                let user_id = user.id;
                let committed = self.store.settle(&ticket, Phase::Fulfilled, |s| {
                    s.authenticated = true;
                    s.user = Some(user);
                    s.token = Some(token);
                    s.pending = false;
                });
                info!(user_id, committed, "Login successful");
                Settled::new(&ticket, committed, Ok(()))
            }
            Err(e) => {
                let message = LOGIN_MESSAGES.message(&e);
                debug!(error = %e, "Login failed");
                let committed = self.store.settle(&ticket, Phase::Rejected, |s| {
                    s.pending = false;
                    s.error = Some(message);
                });
                Settled::new(&ticket, committed, Err(e))
            }
        }
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(String, User), SessionError> {
        let pair = self.auth.obtain_token(credentials).await?;
        self.credentials.save(&pair.access, &pair.refresh)?;
        let claims = token::decode(&pair.access)?;
        let user = self.directory.fetch_user(claims.subject_id, &pair.access).await?;
        Ok((pair.access, user))
    }

    // =========================================================================
    // Register
    // =========================================================================

    /// Create an account. Never authenticates the session; the returned user
    /// is discarded and a separate login is required.
    pub fn register(&self, account: NewAccount) -> impl Future<Output = Settled> + Send + 'static {
        let ticket = self.store.begin(Operation::Register);
        let this = self.clone();
        async move { this.finish_register(ticket, account).await }
    }

    async fn finish_register(&self, ticket: Ticket, account: NewAccount) -> Settled {
        match self.auth.register(&account).await {
            Ok(user) => {
                info!(user_id = user.id, "Account registered");
                let committed = self.store.settle(&ticket, Phase::Fulfilled, |s| {
                    s.pending = false;
                });
                Settled::new(&ticket, committed, Ok(()))
            }
            Err(e) => {
                let e = SessionError::from(e);
                let message = REGISTER_MESSAGES.message(&e);
                debug!(error = %e, "Registration failed");
                let committed = self.store.settle(&ticket, Phase::Rejected, |s| {
                    s.pending = false;
                    s.error = Some(message);
                });
                Settled::new(&ticket, committed, Err(e))
            }
        }
    }

    // =========================================================================
    // Update profile
    // =========================================================================

    /// Send a sparse update for the current user and replace `user` with the
    /// server's record. Rejects without a network call when no user is loaded.
    pub fn update_profile(&self, update: ProfileUpdate) -> impl Future<Output = Settled> + Send + 'static {
        let ticket = self.store.begin(Operation::UpdateProfile);
        let current = self.store.session();
        let target = current.user_id().zip(current.token);
        let this = self.clone();
        async move { this.finish_update_profile(ticket, target, update).await }
    }

    async fn finish_update_profile(
        &self,
        ticket: Ticket,
        target: Option<(i64, String)>,
        update: ProfileUpdate,
    ) -> Settled {
        let result = match target {
            Some((user_id, token)) => self
                .auth
                .update_user(user_id, &token, &update)
                .await
                .map_err(SessionError::from),
            None => Err(SessionError::NotAuthenticated),
        };

        match result {
            Ok(user) => {
                let user_id = user.id;
                let committed = self.store.settle(&ticket, Phase::Fulfilled, |s| {
                    s.user = Some(user);
                    s.pending = false;
                });
                info!(user_id, committed, "Profile updated");
                Settled::new(&ticket, committed, Ok(()))
            }
            Err(e) => {
                let message = UPDATE_PROFILE_MESSAGES.message(&e);
                let fields = field_errors(&e);
                debug!(error = %e, "Profile update failed");
                let committed = self.store.settle(&ticket, Phase::Rejected, |s| {
                    s.pending = false;
                    s.error = Some(message);
                    s.field_errors = fields;
                });
                Settled::new(&ticket, committed, Err(e))
            }
        }
    }

    // =========================================================================
    // Check auth
    // =========================================================================

    /// Resume a persisted session at startup. Any failure clears the stored
    /// tokens and resolves to `InvalidToken`, whatever the underlying cause.
    pub fn check_auth(&self) -> impl Future<Output = Settled> + Send + 'static {
        let ticket = self.store.begin(Operation::CheckAuth);
        let this = self.clone();
        async move { this.finish_check_auth(ticket).await }
    }

    async fn finish_check_auth(&self, ticket: Ticket) -> Settled {
        match self.resume().await {
            Ok((token, user)) => {
                let user_id = user.id;
                let committed = self.store.settle(&ticket, Phase::Fulfilled, |s| {
                    s.authenticated = true;
                    s.user = Some(user);
                    s.token = Some(token);
                    s.pending = false;
                });
                info!(user_id, committed, "Session resumed");
                Settled::new(&ticket, committed, Ok(()))
            }
            Err(cause) => {
                debug!(cause = %cause, "Session resume failed");
                if let Err(e) = self.credentials.clear() {
                    warn!(error = %e, "Failed to clear stored credentials");
                }
                let committed = self.store.settle(&ticket, Phase::Rejected, |s| {
                    s.authenticated = false;
                    s.user = None;
                    s.token = None;
                    s.pending = false;
                });
                Settled::new(&ticket, committed, Err(SessionError::InvalidToken))
            }
        }
    }

    async fn resume(&self) -> Result<(String, User), SessionError> {
        let token = self.credentials.load_access()?.ok_or(SessionError::NoToken)?;
        let claims = token::decode(&token)?;
        if token::is_expired(&claims, Utc::now()) {
            return Err(SessionError::InvalidToken);
        }
        let user = self.directory.fetch_user(claims.subject_id, &token).await?;
        Ok((token, user))
    }

    // =========================================================================
    // Logout
    // =========================================================================

    /// Drop the session and its stored tokens. Synchronous; no network call.
    pub fn logout(&self) -> Settled {
        let ticket = self.store.commit(Operation::Logout, |s| {
            s.authenticated = false;
            s.user = None;
            s.token = None;
        });
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        info!("Logged out");
        Settled::new(&ticket, true, Ok(()))
    }
}

// ============================================================================
// Tests
// ============================================================================
