//! Failure taxonomy for lifecycle operations and the rules for turning a
//! failure into the message stored in `Session::error`.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;
use crate::token::TokenError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    MalformedToken(#[from] TokenError),

    #[error("No token found")]
    NoToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Credential storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SessionError {
    /// Structured body supplied by the backend, if the failure came from one
    pub fn payload(&self) -> Option<&Value> {
        match self {
            SessionError::Api(e) => e.payload(),
            _ => None,
        }
    }

    /// True for failures whose own text is fit for the user: the request
    /// never got a usable answer, or no session exists.
    /// Decoder and storage failures are internal and never qualify.
    fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SessionError::NotAuthenticated
                | SessionError::Api(
                    ApiError::NetworkError(_)
                        | ApiError::InvalidResponse(_)
                        | ApiError::RateLimited
                )
        )
    }
}

/// One way of pulling a human-readable message out of a failure.
/// Every strategy is total: it returns `None` rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `{"detail": "..."}`
    Detail,
    /// `["...", ...]`
    FirstArrayEntry,
    /// `{"field": ["...", ...]}`, rendered as `field: ...`
    FirstFieldError,
    /// The failure's own text, for transport failures and a missing session
    TransportMessage,
}

impl ExtractionStrategy {
    pub fn extract(self, error: &SessionError) -> Option<String> {
        match self {
            ExtractionStrategy::Detail => error
                .payload()
                .and_then(|p| p.get("detail"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ExtractionStrategy::FirstArrayEntry => error
                .payload()
                .and_then(Value::as_array)
                .and_then(|entries| entries.first())
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ExtractionStrategy::FirstFieldError => {
                let fields = error.payload().and_then(Value::as_object)?;
                fields.iter().find_map(|(field, messages)| {
                    first_message(messages).map(|m| format!("{}: {}", field, m))
                })
            }
            ExtractionStrategy::TransportMessage => {
                error.is_user_facing().then(|| error.to_string())
            }
        }
    }
}

/// Ordered strategies ending in a guaranteed fallback
#[derive(Debug, Clone, Copy)]
pub struct MessagePolicy {
    pub strategies: &'static [ExtractionStrategy],
    pub fallback: &'static str,
}

impl MessagePolicy {
    pub fn message(&self, error: &SessionError) -> String {
        self.strategies
            .iter()
            .find_map(|s| s.extract(error))
            .unwrap_or_else(|| self.fallback.to_string())
    }
}

pub const LOGIN_MESSAGES: MessagePolicy = MessagePolicy {
    strategies: &[ExtractionStrategy::Detail, ExtractionStrategy::TransportMessage],
    fallback: "An error occurred during login",
};

pub const REGISTER_MESSAGES: MessagePolicy = MessagePolicy {
    strategies: &[
        ExtractionStrategy::Detail,
        ExtractionStrategy::FirstArrayEntry,
        ExtractionStrategy::TransportMessage,
    ],
    fallback: "An error occurred during registration",
};

pub const UPDATE_PROFILE_MESSAGES: MessagePolicy = MessagePolicy {
    strategies: &[
        ExtractionStrategy::Detail,
        ExtractionStrategy::FirstFieldError,
        ExtractionStrategy::FirstArrayEntry,
        ExtractionStrategy::TransportMessage,
    ],
    fallback: "An error occurred while updating profile",
};

/// Field-level validation messages (`{"field": ["msg", ...]}`) from the payload.
/// `detail` and `non_field_errors` are not fields and are skipped.
pub fn field_errors(error: &SessionError) -> BTreeMap<String, Vec<String>> {
    let Some(fields) = error.payload().and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    fields
        .iter()
        .filter(|(field, _)| field.as_str() != "detail" && field.as_str() != "non_field_errors")
        .filter_map(|(field, messages)| {
            let messages: Vec<String> = match messages {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect()
}

fn first_message(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.as_str()),
        Value::Array(items) => items.iter().filter_map(Value::as_str).find(|s| !s.is_empty()),
        _ => None,
    }
}
