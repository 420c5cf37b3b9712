use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use threadline_types::CommentId;

use crate::error::ClientError;

// -- Endpoints --

pub const SIGNUP_PATH: &str = "/users/signup";
pub const LOGIN_PATH: &str = "/users/login";
pub const REFRESH_PATH: &str = "/users/refresh";
pub const COMMENTS_LIST_PATH: &str = "/comments/list";
pub const COMMENTS_CREATE_PATH: &str = "/comments/create";

pub fn comment_delete_path(id: CommentId) -> String {
    format!("/comments/delete/{}", id)
}

/// A request that can be sent more than once. The interceptor replays it
/// after a token refresh, so the body is kept as owned JSON.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, ClientError> {
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-success status into the matching `ClientError`.
    pub fn into_result(self, fallback: &str) -> Result<Self, ClientError> {
        self.into_result_with(fallback, ClientError::from_status)
    }

    /// `into_result` with an endpoint-specific classification of failures.
    pub fn into_result_with(
        self,
        fallback: &str,
        classify: fn(StatusCode, &[u8], &str) -> ClientError,
    ) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(classify(self.status, &self.body, fallback))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Thin wrapper over `reqwest::Client` bound to the service base URL.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send once. Non-success statuses are returned as responses, only
    /// transport failures become errors.
    pub async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            authorized = bearer.is_some(),
            "Request completed"
        );

        Ok(ApiResponse { status, body })
    }
}
