//! Authorized request pipeline with a single silent token refresh.

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use threadline_types::api::{RefreshRequest, RefreshResponse};

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest, ApiResponse, REFRESH_PATH};
use crate::session::{Generation, SessionStore};

/// Refreshes allowed per logical request.
const MAX_REFRESHES: u8 = 1;

/// Sends requests with the persisted access token attached. A 401 triggers
/// one refresh and one replay; a second 401, or a failed refresh, clears the
/// session and publishes `SessionEvent::LoginRequired`. Both only apply to
/// the session the request started in; after a logout or a new login they
/// are dropped.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
    session: SessionStore,
}

impl AuthClient {
    pub fn new(session: SessionStore) -> Self {
        Self {
            api: session.api().clone(),
            session,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send `request`, refreshing the access token at most once. Responses
    /// other than 401 are returned untouched, error statuses included.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let started = self.session.generation();
        let mut refreshes: u8 = 0;

        loop {
            let token = self.session.access_token()?;
            let response = self.api.send(request, token.as_deref()).await?;

            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let rejected =
                ClientError::from_status(response.status, &response.body, "Session expired");

            if refreshes >= MAX_REFRESHES {
                warn!(path = %request.path, "Still unauthorized after token refresh");
                self.session.expire(started);
                return Err(rejected);
            }
            refreshes += 1;

            match self.refresh(started).await {
                Ok(()) => debug!(path = %request.path, "Replaying request with refreshed token"),
                Err(e) => {
                    warn!(path = %request.path, error = %e, "Token refresh failed");
                    self.session.expire(started);
                    return Err(rejected);
                }
            }
        }
    }

    /// `send`, then map any non-success status to its error.
    pub async fn send_checked(
        &self,
        request: &ApiRequest,
        fallback: &str,
    ) -> Result<ApiResponse, ClientError> {
        self.send(request).await?.into_result(fallback)
    }

    async fn refresh(&self, started: Generation) -> Result<(), ClientError> {
        let refresh_token = self
            .session
            .refresh_token()?
            .ok_or_else(|| ClientError::Authentication("No refresh token stored".into()))?;

        let request = ApiRequest::post(REFRESH_PATH, &RefreshRequest { refresh_token })?;
        let response = self
            .api
            .send(&request, None)
            .await?
            .into_result("Token refresh failed")?;
        let RefreshResponse { access_token } = response.json()?;

        self.session.store_access_token(started, &access_token)?;
        info!("Access token refreshed");
        Ok(())
    }
}
