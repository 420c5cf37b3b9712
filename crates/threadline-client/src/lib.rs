//! Client core for the threaded-comment service: session and token
//! lifecycle, the refresh-once request pipeline, and the comment forest.

pub mod comments;
pub mod config;
pub mod error;
pub mod forest;
pub mod http;
pub mod interceptor;
pub mod session;
pub mod validation;

use std::sync::Arc;

use threadline_store::{Database, Storage};

pub use comments::{CommentState, CommentStore};
pub use config::ClientConfig;
pub use error::ClientError;
pub use forest::Forest;
pub use http::ApiClient;
pub use interceptor::AuthClient;
pub use session::{Credentials, SessionState, SessionStore};

/// Both stores wired to one storage backend and one HTTP client.
#[derive(Clone)]
pub struct Threadline {
    pub session: SessionStore,
    pub comments: CommentStore,
}

impl Threadline {
    pub fn new(api_url: &str, storage: Arc<dyn Storage>) -> Self {
        let session = SessionStore::new(ApiClient::new(api_url), storage);
        let comments = CommentStore::new(AuthClient::new(session.clone()));
        Self { session, comments }
    }

    /// Open the SQLite storage named in `config` and build the stores.
    pub fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let db = Database::open(&config.storage_path)?;
        Ok(Self::new(&config.api_url, Arc::new(db)))
    }
}
