use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_STORAGE_PATH: &str = "threadline.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the comment service, without a trailing slash.
    pub api_url: String,
    /// SQLite file holding the persisted session.
    pub storage_path: PathBuf,
}

impl ClientConfig {
    /// Read `THREADLINE_API_URL` and `THREADLINE_STORAGE_PATH`, falling back
    /// to a local development backend.
    pub fn from_env() -> Self {
        let api_url = std::env::var("THREADLINE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let storage_path = std::env::var("THREADLINE_STORAGE_PATH")
            .unwrap_or_else(|_| DEFAULT_STORAGE_PATH.into())
            .into();

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            storage_path,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            storage_path: DEFAULT_STORAGE_PATH.into(),
        }
    }
}
