use std::path::PathBuf;

use crate::defaults::{DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend, without the `/api` prefix.
    pub api_url: String,
    /// Where the signed-in user is persisted between runs.
    pub session_file: Option<PathBuf>,
    pub metrics_port: Option<u16>,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let api_url = std::env::var("COWORK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let session_file = std::env::var("COWORK_SESSION_FILE")
            .ok()
            .map(PathBuf::from)
            .or_else(default_session_file);
        let metrics_port: Option<u16> = std::env::var("COWORK_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        let http_timeout_secs: u64 = std::env::var("COWORK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            api_url,
            session_file,
            metrics_port,
            http_timeout_secs,
        }
    }
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".cowork").join("current_user.json"))
}
