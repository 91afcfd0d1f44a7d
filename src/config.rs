//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `PURRTAINER_CONNECT_TIMEOUT_MS`,
//!    `PURRTAINER_CREDENTIALS`, `PURRTAINER_HIDDEN_STACKS`
//! 2. **Config file** — path via `--config <path>`, else `PURRTAINER_CONFIG`,
//!    else `~/.config/purrtainer/config.toml` if it exists
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [http]
//! connect_timeout_secs = 10
//! timeout_secs = 10
//!
//! [terminal]
//! connect_timeout_ms = 5000
//! deferred_decode_threshold = 65536   # binary frames this large decode off-loop
//!
//! [storage]
//! credentials_path = "~/.config/purrtainer/credentials.json"
//! hidden_stacks_path = "~/.config/purrtainer/hidden_stacks.json"
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! Server address and tokens are not configuration: they live in the
//! credential store (see [`crate::credentials`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::util::home_path;

const DEFAULT_CONFIG_PATH: &str = "~/.config/purrtainer/config.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST client timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// TCP/TLS connect timeout in seconds (default 10).
    #[serde(default = "default_http_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (default 10).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Attach terminal settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    /// How long the WebSocket handshake may take before the attach is
    /// abandoned, in milliseconds (default 5000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Binary frames of at least this many bytes are decoded on the blocking
    /// pool rather than inline (default 64 KiB).
    #[serde(default = "default_deferred_decode_threshold")]
    pub deferred_decode_threshold: usize,
}

/// Where persisted client state lives.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    #[serde(default = "default_hidden_stacks_path")]
    pub hidden_stacks_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `warn`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Errors loading configuration or persisted client state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },
}

fn default_http_connect_timeout() -> u64 {
    10
}
fn default_http_timeout() -> u64 {
    10
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_deferred_decode_threshold() -> usize {
    64 * 1024
}
fn default_credentials_path() -> String {
    "~/.config/purrtainer/credentials.json".to_string()
}
fn default_hidden_stacks_path() -> String {
    "~/.config/purrtainer/hidden_stacks.json".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_http_connect_timeout(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            deferred_decode_threshold: default_deferred_decode_threshold(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            hidden_stacks_path: default_hidden_stacks_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TerminalConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl StorageConfig {
    pub fn credentials_path(&self) -> PathBuf {
        home_path(&self.credentials_path)
    }

    pub fn hidden_stacks_path(&self) -> PathBuf {
        home_path(&self.hidden_stacks_path)
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// An explicit `path` (or `PURRTAINER_CONFIG`) must exist; the default
    /// location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PURRTAINER_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(p) => Self::from_file(&home_path(&p.to_string_lossy()))?,
            None => {
                let default_path = home_path(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("PURRTAINER_CONNECT_TIMEOUT_MS") {
            self.terminal.connect_timeout_ms = value.parse().map_err(|_| ConfigError::Env {
                name: "PURRTAINER_CONNECT_TIMEOUT_MS",
                value: value.clone(),
            })?;
        }
        if let Ok(path) = std::env::var("PURRTAINER_CREDENTIALS") {
            self.storage.credentials_path = path;
        }
        if let Ok(path) = std::env::var("PURRTAINER_HIDDEN_STACKS") {
            self.storage.hidden_stacks_path = path;
        }
        Ok(())
    }
}
