use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the REST API binds to
    pub host: String,

    /// Port for the REST API server
    pub port: u16,

    /// Directory holding the local filter storage files
    pub data_dir: PathBuf,

    /// Base URL of the console API used by the client commands
    pub api_url: String,

    /// Timeout for outbound API requests
    pub request_timeout_secs: u64,

    /// Owner recorded on filters saved from this console
    pub user_id: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: PathBuf::from(".opsconsole"),
            api_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 10,
            user_id: None,
        }
    }
}
