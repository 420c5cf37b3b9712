//! In-process stand-in for the comment service. Issues real JWT access
//! tokens, keeps comments in memory and counts every call so tests can assert
//! exactly what the client sent.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use threadline_client::Threadline;
use threadline_store::{MemoryStorage, Storage};
use threadline_types::UserProfile;
use threadline_types::api::{
    CreateCommentRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    SignupRequest, SignupResponse,
};

pub const PASSWORD: &str = "Sup3r$ecret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
    pub jti: String,
}

struct MockUser {
    id: i64,
    username: String,
    email: String,
    password: String,
}

struct StoredComment {
    id: i64,
    text: String,
    user_id: i64,
    username: String,
    parent_id: Option<i64>,
    created_at: String,
}

pub struct MockState {
    jwt_secret: String,
    next_id: AtomicI64,
    users: Mutex<Vec<MockUser>>,
    comments: Mutex<Vec<StoredComment>>,
    active_tokens: Mutex<HashSet<String>>,
    refresh_tokens: Mutex<HashMap<String, i64>>,

    pub signup_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
    /// Bearer token (if any) of every request to a protected route.
    pub seen_bearers: Mutex<Vec<Option<String>>>,

    pub fail_refresh: AtomicBool,
    pub reject_all: AtomicBool,
    pub fail_list: AtomicBool,
    /// Milliseconds the refresh endpoint waits before answering.
    pub refresh_delay_ms: AtomicU64,
    /// Reject bad credentials and taken identities with 400, the way the
    /// Flask backend does.
    pub reject_with_bad_request: AtomicBool,
}

impl MockState {
    fn new() -> Self {
        Self {
            jwt_secret: "test-secret".into(),
            next_id: AtomicI64::new(1),
            users: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            active_tokens: Mutex::new(HashSet::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            signup_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            comment_calls: AtomicUsize::new(0),
            seen_bearers: Mutex::new(Vec::new()),
            fail_refresh: AtomicBool::new(false),
            reject_all: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            reject_with_bad_request: AtomicBool::new(false),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add_user(&self, username: &str, email: &str, password: &str) -> i64 {
        let id = self.next_id();
        self.users.lock().unwrap().push(MockUser {
            id,
            username: username.into(),
            email: email.into(),
            password: password.into(),
        });
        id
    }

    pub fn add_comment(&self, text: &str, user_id: i64, parent_id: Option<i64>) -> i64 {
        let id = self.next_id();
        let username = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| "unknown".into());
        self.comments.lock().unwrap().push(StoredComment {
            id,
            text: text.into(),
            user_id,
            username,
            parent_id,
            created_at: chrono::Utc::now().to_rfc2822(),
        });
        id
    }

    pub fn comment_count(&self) -> usize {
        self.comments.lock().unwrap().len()
    }

    /// Invalidate every access token handed out so far.
    pub fn revoke_access_tokens(&self) {
        self.active_tokens.lock().unwrap().clear();
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.seen_bearers.lock().unwrap().clone()
    }

    pub fn issue_access_token(&self, user_id: i64) -> String {
        let username = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        let claims = Claims {
            sub: user_id,
            username,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .unwrap();
        self.active_tokens.lock().unwrap().insert(token.clone());
        token
    }

    fn tree(&self) -> Vec<Value> {
        let comments = self.comments.lock().unwrap();
        let mut roots: Vec<&StoredComment> =
            comments.iter().filter(|c| c.parent_id.is_none()).collect();
        roots.sort_by(|a, b| b.id.cmp(&a.id));
        roots.into_iter().map(|c| build_tree(c, &comments)).collect()
    }
}

/// Nested replies omit `parent_id`, like the real list endpoint.
fn build_tree(comment: &StoredComment, all: &[StoredComment]) -> Value {
    let mut replies: Vec<&StoredComment> =
        all.iter().filter(|r| r.parent_id == Some(comment.id)).collect();
    replies.sort_by_key(|r| r.id);

    json!({
        "id": comment.id,
        "user_id": comment.user_id,
        "username": comment.username,
        "text": comment.text,
        "created_at": comment.created_at,
        "replies": replies.into_iter().map(|r| build_tree(r, all)).collect::<Vec<_>>(),
    })
}

pub struct MockBackend {
    pub url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::new());
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self, storage: Arc<dyn Storage>) -> Threadline {
        Threadline::new(&self.url, storage)
    }

    pub fn client_with_memory(&self) -> (Threadline, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (self.client(storage.clone()), storage)
    }
}

fn router(state: Arc<MockState>) -> Router {
    let public = Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh));

    let protected = Router::new()
        .route("/comments/list", get(list_comments))
        .route("/comments/create", post(create_comment))
        .route("/comments/delete/{id}", delete(delete_comment))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected).with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn require_auth(
    State(state): State<Arc<MockState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    state.comment_calls.fetch_add(1, Ordering::SeqCst);

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.seen_bearers.lock().unwrap().push(token.clone());

    if state.reject_all.load(Ordering::SeqCst) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = token.ok_or(StatusCode::UNAUTHORIZED)?;
    if !state.active_tokens.lock().unwrap().contains(&token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

async fn signup(State(state): State<Arc<MockState>>, Json(req): Json<SignupRequest>) -> Response {
    state.signup_calls.fetch_add(1, Ordering::SeqCst);

    let taken = state
        .users
        .lock()
        .unwrap()
        .iter()
        .any(|u| u.username == req.username || u.email == req.email);
    if taken {
        let message = "User with this email or username already exists";
        if state.reject_with_bad_request.load(Ordering::SeqCst) {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
        }
        return error(StatusCode::CONFLICT, message);
    }

    let id = state.add_user(&req.username, &req.email, &req.password);
    (
        StatusCode::CREATED,
        Json(SignupResponse {
            user: UserProfile {
                id,
                username: req.username,
                email: Some(req.email),
            },
            access_token: None,
        }),
    )
        .into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(req): Json<LoginRequest>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let user = {
        let users = state.users.lock().unwrap();
        users
            .iter()
            .find(|u| {
                req.username.as_deref() == Some(u.username.as_str())
                    || req.email.as_deref() == Some(u.email.as_str())
            })
            .filter(|u| u.password == req.password)
            .map(|u| UserProfile {
                id: u.id,
                username: u.username.clone(),
                email: Some(u.email.clone()),
            })
    };

    let Some(user) = user else {
        if state.reject_with_bad_request.load(Ordering::SeqCst) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Incorrect password" })),
            )
                .into_response();
        }
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid username or password" })),
        )
            .into_response();
    };

    let access_token = state.issue_access_token(user.id);
    let refresh_token = Uuid::new_v4().to_string();
    state
        .refresh_tokens
        .lock()
        .unwrap()
        .insert(refresh_token.clone(), user.id);

    Json(LoginResponse {
        access_token,
        refresh_token,
        user,
    })
    .into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(req): Json<RefreshRequest>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.fail_refresh.load(Ordering::SeqCst) {
        return error(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }

    let user_id = state.refresh_tokens.lock().unwrap().get(&req.refresh_token).copied();
    match user_id {
        Some(user_id) => Json(RefreshResponse {
            access_token: state.issue_access_token(user_id),
        })
        .into_response(),
        None => error(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
    }
}

async fn list_comments(State(state): State<Arc<MockState>>) -> Response {
    if state.fail_list.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
    }
    Json(json!({ "comments": state.tree() })).into_response()
}

async fn create_comment(
    State(state): State<Arc<MockState>>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Response {
    let len = req.text.chars().count();
    if !(3..=200).contains(&len) {
        return error(StatusCode::BAD_REQUEST, "Text must be between 3 and 200 characters");
    }

    let parent_exists = req
        .parent_id
        .is_some_and(|pid| state.comments.lock().unwrap().iter().any(|c| c.id == pid));
    let parent_id = if parent_exists { req.parent_id } else { None };

    let id = state.add_comment(&req.text, req.user_id, parent_id);
    let comments = state.comments.lock().unwrap();
    let Some(stored) = comments.iter().find(|c| c.id == id) else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Comment vanished");
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "id": stored.id,
            "text": stored.text,
            "user_id": stored.user_id,
            "username": stored.username,
            "parent_id": stored.parent_id,
            "created_at": stored.created_at,
        })),
    )
        .into_response()
}

async fn delete_comment(
    State(state): State<Arc<MockState>>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Response {
    let mut comments = state.comments.lock().unwrap();

    let Some(target) = comments.iter().find(|c| c.id == id) else {
        return error(StatusCode::NOT_FOUND, "Comment not found");
    };
    if target.user_id != claims.sub {
        return error(StatusCode::FORBIDDEN, "Only the author may delete this comment");
    }

    let mut doomed = vec![id];
    let mut i = 0;
    while i < doomed.len() {
        let parent = doomed[i];
        doomed.extend(comments.iter().filter(|c| c.parent_id == Some(parent)).map(|c| c.id));
        i += 1;
    }
    comments.retain(|c| !doomed.contains(&c.id));

    StatusCode::NO_CONTENT.into_response()
}
