//! Scripted collaborators and token minting for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::api::{ApiError, AuthBackend, UserDirectory};
use crate::auth::{CredentialStore, MemoryBackend};
use crate::models::{Avatar, Credentials, NewAccount, ProfileUpdate, TokenPair, User};
use crate::session::{SessionMachine, SessionStore};

/// Build an unsigned token whose claims carry `user_id` and `expires_at`
pub fn mint_token(user_id: i64, expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "token_type": "access",
        "user_id": user_id,
        "iat": (expires_at - Duration::minutes(5)).timestamp(),
        "exp": expires_at.timestamp(),
        "jti": format!("jti-{}-{}", user_id, expires_at.timestamp_nanos_opt().unwrap_or_default()),
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn user(id: i64, username: &str) -> User {
    User {
        id,
        email: format!("{}@example.com", username),
        username: username.to_string(),
        avatar: None,
    }
}

/// A canned failure, rebuilt on every call since `ApiError` is not `Clone`
#[derive(Clone)]
pub enum Failure {
    Status(u16, String),
    Transport(String),
}

impl Failure {
    fn to_error(&self) -> ApiError {
        match self {
            Failure::Status(code, body) => {
                ApiError::from_status(StatusCode::from_u16(*code).unwrap(), body)
            }
            Failure::Transport(message) => ApiError::InvalidResponse(message.clone()),
        }
    }
}

struct Account {
    password: String,
    user_id: i64,
}

/// In-memory stand-in for the backend
#[derive(Default)]
pub struct FakeBackend {
    accounts: Mutex<HashMap<String, Account>>,
    users: Mutex<HashMap<i64, User>>,
    /// Overrides the access token issued on login
    issued_access: Mutex<Option<String>>,
    register_failure: Mutex<Option<Failure>>,
    update_failure: Mutex<Option<Failure>>,
    fetch_failure: Mutex<Option<Failure>>,
    /// Login calls for a given email/password wait on its gate
    login_gates: Mutex<HashMap<(String, String), Arc<Notify>>>,
    pub token_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub last_update: Mutex<Option<ProfileUpdate>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, user: User) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user_id: user.id,
            },
        );
        self.users.lock().unwrap().insert(user.id, user);
        self
    }

    pub fn issue_access(self, token: String) -> Self {
        *self.issued_access.lock().unwrap() = Some(token);
        self
    }

    pub fn fail_register(self, failure: Failure) -> Self {
        *self.register_failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn fail_update(self, failure: Failure) -> Self {
        *self.update_failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn fail_fetch(self, failure: Failure) -> Self {
        *self.fetch_failure.lock().unwrap() = Some(failure);
        self
    }

    /// Hold logins with these credentials until the returned gate is notified
    pub fn gate_login(&self, email: &str, password: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.login_gates
            .lock()
            .unwrap()
            .insert((email.to_string(), password.to_string()), gate.clone());
        gate
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn obtain_token(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .login_gates
            .lock()
            .unwrap()
            .get(&(credentials.email.clone(), credentials.password.clone()))
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let user_id = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => account.user_id,
                _ => {
                    return Err(ApiError::from_status(
                        StatusCode::UNAUTHORIZED,
                        r#"{"detail": "No active account found with the given credentials"}"#,
                    ))
                }
            }
        };

        let access = self
            .issued_access
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| mint_token(user_id, Utc::now() + Duration::minutes(5)));
        Ok(TokenPair {
            access,
            refresh: format!("refresh-{}", user_id),
        })
    }

    async fn register(&self, account: &NewAccount) -> Result<User, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.register_failure.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        let mut users = self.users.lock().unwrap();
        let id = users.keys().max().copied().unwrap_or(0) + 1;
        let user = User {
            id,
            email: account.email.clone(),
            username: account.username.clone(),
            avatar: None,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: i64,
        _token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock().unwrap() = Some(update.clone());
        if let Some(failure) = self.update_failure.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        let mut users = self.users.lock().unwrap();
        let Some(stored) = users.get_mut(&user_id) else {
            return Err(ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail": "Not found."}"#));
        };
        for (field, value) in update.text_fields() {
            match field {
                "username" => stored.username = value.to_string(),
                "email" => stored.email = value.to_string(),
                "avatar" => stored.avatar = Some(value.to_string()),
                _ => {}
            }
        }
        if let Some(Avatar::File(file)) = update.supplied_avatar() {
            stored.avatar = Some(format!("https://cdn.example.com/avatars/{}", file.file_name));
        }
        Ok(stored.clone())
    }
}

#[async_trait]
impl UserDirectory for FakeBackend {
    async fn fetch_user(&self, user_id: i64, _token: &str) -> Result<User, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.fetch_failure.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail": "Not found."}"#))
    }
}

/// A machine over `backend` with in-memory credential storage
pub fn machine(backend: Arc<FakeBackend>) -> (SessionMachine, CredentialStore) {
    let credentials = CredentialStore::new(Arc::new(MemoryBackend::new()));
    let machine = SessionMachine::new(
        Arc::new(SessionStore::new()),
        credentials.clone(),
        backend.clone(),
        backend,
    );
    (machine, credentials)
}
