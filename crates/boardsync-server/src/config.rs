//! Server configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Directory holding the persisted state.
    pub data_dir: PathBuf,
    /// File name of the persisted state inside `data_dir`.
    pub state_file: String,
    /// Directory static assets are served from.
    pub static_dir: PathBuf,
    /// Asset served at `/`.
    pub landing_page: String,
    /// Per-subscriber queue depth before it is considered lagging.
    pub max_send_queue: usize,
    /// Max update body size in bytes.
    pub max_body_bytes: usize,
    /// Interval between SSE keep-alive comments.
    pub keep_alive_secs: u64,
    /// How long shutdown waits for open connections to drain.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8787,
            data_dir: PathBuf::from("."),
            state_file: "boards.json".into(),
            static_dir: PathBuf::from("."),
            landing_page: "index.html".into(),
            max_send_queue: 64,
            max_body_bytes: 16 * 1024 * 1024, // 16 MB
            keep_alive_secs: 15,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    pub fn landing_path(&self) -> PathBuf {
        self.static_dir.join(&self.landing_page)
    }
}
