use serde_json::Value;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// The body of a failed response, kept both raw and parsed.
#[derive(Debug, Clone, Default)]
pub struct ErrorPayload {
    /// Truncated response text
    pub raw: String,
    /// Full body parsed as JSON, when it was JSON
    pub json: Option<Value>,
}

impl ErrorPayload {
    pub fn from_body(body: &str) -> Self {
        Self {
            raw: truncate_body(body),
            json: serde_json::from_str(body).ok(),
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized(ErrorPayload),

    #[error("Resource not found: {0}")]
    NotFound(ErrorPayload),

    #[error("Request rejected ({status}): {payload}")]
    Rejected {
        status: reqwest::StatusCode,
        payload: ErrorPayload,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(ErrorPayload),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let payload = ErrorPayload::from_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(payload),
            404 => ApiError::NotFound(payload),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(payload),
            _ => ApiError::Rejected { status, payload },
        }
    }

    /// Structured body supplied by the backend, if any
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiError::Unauthorized(p)
            | ApiError::NotFound(p)
            | ApiError::ServerError(p)
            | ApiError::Rejected { payload: p, .. } => p.json.as_ref(),
            ApiError::RateLimited | ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => {
                None
            }
        }
    }
}
