use serde::{Deserialize, Serialize};

use crate::models::{Comment, CommentId, UserId, UserProfile};

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Signup answers with the new profile. Some deployments also hand out an
/// access token so the user is signed in straight away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Wire form of a login. Exactly one of `username` / `email` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl LoginRequest {
    /// Route a free-form identifier to `email` when it contains `@`, else to
    /// `username`.
    pub fn new(identifier: &str, password: &str, remember_me: bool) -> Self {
        let (username, email) = if identifier.contains('@') {
            (None, Some(identifier.to_string()))
        } else {
            (Some(identifier.to_string()), None)
        };

        Self {
            username,
            email,
            password: password.to_string(),
            remember_me,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

// -- Comments --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
}

// -- Errors --

/// Error body returned by the backend. Older endpoints use `error`, newer
/// ones `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}
