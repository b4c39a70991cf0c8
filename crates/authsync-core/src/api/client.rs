//! REST client for the account backend.
//!
//! Implements `AuthBackend` and `UserDirectory` over reqwest. Tokens are
//! passed per call; the client itself holds no session state.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Avatar, Credentials, NewAccount, ProfileUpdate, TokenPair, User};

use super::{ApiError, AuthBackend, UserDirectory};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the account backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Override the initial rate-limit backoff
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    /// `build` is invoked once per attempt since multipart bodies cannot be cloned.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> Result<RequestBuilder, ApiError>,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build()?.send().await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            return Self::check_response(response).await;
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    fn profile_form(update: &ProfileUpdate) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in update.text_fields() {
            form = form.text(name, value.to_string());
        }
        if let Some(Avatar::File(file)) = update.supplied_avatar() {
            let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            if let Some(ref mime) = file.content_type {
                part = part.mime_str(mime)?;
            }
            form = form.part("avatar", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn obtain_token(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let url = self.url("/api/token/");
        debug!(email = %credentials.email, "Requesting token pair");

        let response = self
            .send(|| Ok(self.client.post(&url).json(credentials)))
            .await?;
        Self::parse(response, "token response").await
    }

    async fn register(&self, account: &NewAccount) -> Result<User, ApiError> {
        let url = self.url("/api/user/");
        debug!(email = %account.email, username = %account.username, "Registering account");

        let response = self
            .send(|| Ok(self.client.post(&url).json(account)))
            .await?;
        Self::parse(response, "registration response").await
    }

    async fn update_user(
        &self,
        user_id: i64,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        let url = self.url(&format!("/api/user/{}/", user_id));
        debug!(user_id, fields = ?update.text_fields().iter().map(|(k, _)| *k).collect::<Vec<_>>(), "Updating profile");

        let response = self
            .send(|| {
                Ok(self
                    .client
                    .patch(&url)
                    .bearer_auth(token)
                    .multipart(Self::profile_form(update)?))
            })
            .await?;
        Self::parse(response, "profile update response").await
    }
}

#[async_trait]
impl UserDirectory for ApiClient {
    async fn fetch_user(&self, user_id: i64, token: &str) -> Result<User, ApiError> {
        let url = self.url(&format!("/api/user/{}/", user_id));
        debug!(user_id, "Fetching user");

        let response = self
            .send(|| Ok(self.client.get(&url).bearer_auth(token)))
            .await?;
        Self::parse(response, "user response").await
    }
}

// ============================================================================
// Tests
// ============================================================================
