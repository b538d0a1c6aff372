//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/chunkup/config.toml`
//! - Windows: `%APPDATA%/chunkup/config.toml`
//!
//! Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkup_uploader::{RetryPolicy, UploadOptions};
use chunkup_ws_client::WsClientConfig;
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage service WebSocket endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token for the storage service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Requested chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Files larger than this are refused before any upload starts.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Timeout for one request/reply exchange, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whole-upload attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Send the file's SHA-256 in the init request.
    #[serde(default)]
    pub compute_hash: bool,

    /// Prefix server keys with the upload time in milliseconds.
    #[serde(default = "default_true")]
    pub timestamp_keys: bool,
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8080/upload".into()
}

fn default_chunk_size() -> usize {
    chunkup_transfer::DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    30
}

fn default_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_token: None,
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            request_timeout_secs: default_request_timeout(),
            attempts: default_attempts(),
            compute_hash: false,
            timestamp_keys: default_true(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let p = config_path();
                if p.exists() {
                    Self::from_file(&p)
                } else {
                    tracing::debug!(path = %p.display(), "no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Rejects values no upload can run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.endpoint.is_empty(), "endpoint must not be empty");
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(self.max_file_size > 0, "max_file_size must be positive");
        anyhow::ensure!(self.attempts > 0, "attempts must be at least 1");
        anyhow::ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be positive"
        );
        Ok(())
    }

    pub fn ws_config(&self) -> WsClientConfig {
        let mut cfg = WsClientConfig::new(&self.endpoint)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(token) = &self.auth_token {
            cfg = cfg.with_auth_token(token);
        }
        cfg
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            compute_hash: self.compute_hash,
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("chunkup").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("chunkup")
            .join("config.toml")
    }
}
