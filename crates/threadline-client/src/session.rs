//! Session store: who is signed in, and the persisted tokens that keep them
//! signed in.
//!
//! Storage writes happen in `login`, `signup`, `logout` and in the two
//! crate-private hooks the token refresh interceptor uses
//! (`store_access_token`, `expire`). Nothing else touches the keys.
//!
//! Every sign-in, sign-out and expiry starts a new session generation. The
//! interceptor hooks take the generation the request started in and do
//! nothing once it is stale, so a refresh that completes after `logout`
//! cannot write a token back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use threadline_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, Storage, USER_KEY};
use threadline_types::api::{LoginRequest, LoginResponse, SignupRequest, SignupResponse};
use threadline_types::events::SessionEvent;
use threadline_types::{UserId, UserProfile};

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest, LOGIN_PATH, SIGNUP_PATH};
use crate::validation;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// What the login form hands over.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Routed to `email` when it contains `@`, otherwise to `username`.
    pub username_or_email: String,
    pub password: String,
    /// Persist the refresh token instead of the access token.
    pub remember_me: bool,
}

impl Credentials {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>, remember_me: bool) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
            remember_me,
        }
    }
}

/// Cheap to clone; clones share state and storage.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    storage: Arc<dyn Storage>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    /// Current session generation. Held while the keys are written.
    generation: Mutex<u64>,
}

/// Identifies the session a request was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Generation(u64);

impl SessionStore {
    /// Restores any persisted session before returning, so
    /// `is_authenticated` is already right for the first render.
    pub fn new(api: ApiClient, storage: Arc<dyn Storage>) -> Self {
        let initial = restore(storage.as_ref());
        if initial.is_authenticated {
            info!(
                username = initial.user.as_ref().map(|u| u.username.as_str()).unwrap_or("<unknown>"),
                "Restored persisted session"
            );
        }

        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                api,
                storage,
                state,
                events,
                generation: Mutex::new(0),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Watch for state changes (for re-rendering).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to session lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.borrow().user.clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.inner.state.borrow().user.as_ref().map(|u| u.id)
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        self.begin();
        let result = self.try_signup(username, email, password).await;
        self.settle(result)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ClientError> {
        self.begin();
        let result = self.try_login(credentials).await;
        self.settle(result)
    }

    /// Clear persisted tokens and profile and reset to signed out. Safe to
    /// call when already signed out.
    pub fn logout(&self) {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.clear_storage();
        drop(generation);

        let was_signed_in = {
            let current = self.inner.state.borrow();
            current.is_authenticated || current.user.is_some()
        };
        self.inner.state.send_replace(SessionState::default());

        if was_signed_in {
            info!("Logged out");
            let _ = self.inner.events.send(SessionEvent::SignedOut);
        }
    }

    async fn try_signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        validation::validate_signup(username, email, password)?;

        let request = ApiRequest::post(
            SIGNUP_PATH,
            &SignupRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
        )?;
        let response = self
            .inner
            .api
            .send(&request, None)
            .await?
            .into_result_with("Signup failed", ClientError::from_signup_status)?;
        let SignupResponse { user, access_token } = response.json()?;

        // Only a token makes the session survive a restart; without one the
        // profile stays in memory.
        if let Some(token) = access_token {
            let storage = &self.inner.storage;
            storage.remove(REFRESH_TOKEN_KEY)?;
            storage.set(ACCESS_TOKEN_KEY, &token)?;
            storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        }

        Ok(user)
    }

    async fn try_login(&self, credentials: &Credentials) -> Result<UserProfile, ClientError> {
        validation::validate_login(&credentials.username_or_email, &credentials.password)?;

        let payload = LoginRequest::new(
            credentials.username_or_email.trim(),
            &credentials.password,
            credentials.remember_me,
        );
        let request = ApiRequest::post(LOGIN_PATH, &payload)?;
        let response = self
            .inner
            .api
            .send(&request, None)
            .await?
            .into_result_with("Login failed", ClientError::from_login_status)?;
        let LoginResponse {
            access_token,
            refresh_token,
            user,
        } = response.json()?;

        // One token is "the" persisted token: the refresh token when
        // remembered, the access token otherwise.
        let storage = &self.inner.storage;
        if credentials.remember_me {
            storage.remove(ACCESS_TOKEN_KEY)?;
            storage.set(REFRESH_TOKEN_KEY, &refresh_token)?;
        } else {
            storage.remove(REFRESH_TOKEN_KEY)?;
            storage.set(ACCESS_TOKEN_KEY, &access_token)?;
        }
        storage.set(USER_KEY, &serde_json::to_string(&user)?)?;

        Ok(user)
    }

    fn begin(&self) {
        *self.lock_generation() += 1;
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn settle(&self, result: Result<UserProfile, ClientError>) -> Result<UserProfile, ClientError> {
        match &result {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "Signed in");
                self.inner.state.send_modify(|s| {
                    s.user = Some(user.clone());
                    s.is_authenticated = true;
                    s.loading = false;
                    s.error = None;
                });
                let _ = self
                    .inner
                    .events
                    .send(SessionEvent::SignedIn { user: user.clone() });
            }
            Err(e) => {
                warn!(error = %e, "Authentication request failed");
                self.inner.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
            }
        }
        result
    }

    // -- Interceptor hooks --

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn generation(&self) -> Generation {
        Generation(*self.lock_generation())
    }

    pub(crate) fn access_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.inner.storage.get(ACCESS_TOKEN_KEY)?)
    }

    pub(crate) fn refresh_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.inner.storage.get(REFRESH_TOKEN_KEY)?)
    }

    /// Persist a freshly minted access token. The profile is left alone.
    /// Refused when the session changed since `started`.
    pub(crate) fn store_access_token(
        &self,
        started: Generation,
        token: &str,
    ) -> Result<(), ClientError> {
        let generation = self.lock_generation();
        if Generation(*generation) != started {
            debug!("Discarding refreshed token for a session that has ended");
            return Err(ClientError::Authentication("Session ended during token refresh".into()));
        }
        self.inner.storage.set(ACCESS_TOKEN_KEY, token)?;
        Ok(())
    }

    /// The session can't be recovered: wipe it and ask the view to send the
    /// user back to login. A no-op when the session changed since `started`.
    pub(crate) fn expire(&self, started: Generation) {
        let mut generation = self.lock_generation();
        if Generation(*generation) != started {
            debug!("Not expiring a session that has already been replaced");
            return;
        }
        *generation += 1;
        self.clear_storage();
        drop(generation);

        self.inner.state.send_replace(SessionState::default());
        warn!("Session expired, login required");
        let _ = self.inner.events.send(SessionEvent::LoginRequired);
    }

    fn clear_storage(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.inner.storage.remove(key) {
                error!("Failed to clear '{}' from storage: {:#}", key, e);
            }
        }
    }
}

fn restore(storage: &dyn Storage) -> SessionState {
    let read = |key: &str| {
        storage.get(key).unwrap_or_else(|e| {
            error!("Failed to read '{}' from storage: {:#}", key, e);
            None
        })
    };

    let has_token = read(REFRESH_TOKEN_KEY).or_else(|| read(ACCESS_TOKEN_KEY)).is_some();
    let user = read(USER_KEY).and_then(|raw| {
        serde_json::from_str::<UserProfile>(&raw)
            .map_err(|e| warn!("Ignoring corrupt persisted user profile: {}", e))
            .ok()
    });

    SessionState {
        user,
        is_authenticated: has_token,
        loading: false,
        error: None,
    }
}
