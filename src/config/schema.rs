use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP API listens on.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Optional API key required by every endpoint except /api/health.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the browser driver control API
    /// (e.g., "http://127.0.0.1:9515").
    #[serde(default = "default_driver_url")]
    pub driver_url: String,

    /// WebSocket endpoint the capture channel dials for live interaction
    /// events (e.g., "ws://127.0.0.1:9515/events").
    #[serde(default = "default_driver_ws_url")]
    pub driver_ws_url: String,

    /// Optional external failure-analysis service consulted on failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_url: Option<String>,

    /// Per-step timeout for playback, in milliseconds.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Override for the script storage directory. Defaults to
    /// ~/.testflow/scripts when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts_dir: Option<PathBuf>,
}

fn default_api_port() -> u16 {
    8081
}

fn default_driver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}

fn default_driver_ws_url() -> String {
    "ws://127.0.0.1:9515/events".to_string()
}

fn default_step_timeout_ms() -> u64 {
    30000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            api_key: None,
            driver_url: default_driver_url(),
            driver_ws_url: default_driver_ws_url(),
            analysis_url: None,
            step_timeout_ms: default_step_timeout_ms(),
            scripts_dir: None,
        }
    }
}
