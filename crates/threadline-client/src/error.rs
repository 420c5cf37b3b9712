//! Error type shared by the session store, the interceptor and the comment
//! store.

use reqwest::StatusCode;
use thiserror::Error;

use threadline_types::api::ErrorBody;

/// Every variant carries a message fit for display; stores copy
/// `to_string()` into their `error` state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected before any request was sent, or a 400/422 from the backend
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or an expired session (401)
    #[error("{0}")]
    Authentication(String),

    /// The backend refused the action (403)
    #[error("{0}")]
    Authorization(String),

    /// The identity already exists (409)
    #[error("{0}")]
    Conflict(String),

    /// The resource is gone (404)
    #[error("{0}")]
    NotFound(String),

    /// Transport failure: connection refused, reset, DNS
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// The backend answered with a body we could not read
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Persisted token storage failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify a non-success response. The backend's own message wins over
    /// `fallback` when the body carries one.
    pub fn from_status(status: StatusCode, body: &[u8], fallback: &str) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| fallback.to_string());

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(message),
            StatusCode::UNAUTHORIZED => Self::Authentication(message),
            StatusCode::FORBIDDEN => Self::Authorization(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            other => Self::Server {
                status: other.as_u16(),
                message,
            },
        }
    }

    /// Login rejections. Input was already validated locally, so a 400 or
    /// 404 from the backend ("Incorrect password", "No user exists") means
    /// the credentials were refused.
    pub fn from_login_status(status: StatusCode, body: &[u8], fallback: &str) -> Self {
        match Self::from_status(status, body, fallback) {
            Self::Validation(message) | Self::NotFound(message)
                if matches!(status, StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND) =>
            {
                Self::Authentication(message)
            }
            other => other,
        }
    }

    /// Signup rejections. Some backends answer a taken identity with 400.
    pub fn from_signup_status(status: StatusCode, body: &[u8], fallback: &str) -> Self {
        match Self::from_status(status, body, fallback) {
            Self::Validation(message) if message.to_lowercase().contains("already exists") => {
                Self::Conflict(message)
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<anyhow::Error> for ClientError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{e:#}"))
    }
}
