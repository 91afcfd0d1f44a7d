//! Persisted server address and tokens.
//!
//! [`Credentials`] is a plain value: it is built at login, cleared at logout,
//! and passed by reference to whatever needs it (the REST client, the attach
//! controller). Nothing reads it from global state.
//!
//! [`CredentialStore`] persists it as JSON. Environment variables
//! `PURRTAINER_URL`, `PURRTAINER_API_TOKEN` and `PURRTAINER_SESSION_TOKEN`
//! override the stored values for the current process only.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::util::write_private;

/// Server address plus the two tokens the server hands out.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Base address, e.g. `http://192.168.1.10:9000`.
    #[serde(default)]
    pub server_url: Option<String>,
    /// General API token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Session token (JWT) from `POST /api/auth`.
    #[serde(default)]
    pub session_token: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl Credentials {
    pub fn server_url(&self) -> Option<&str> {
        non_empty(self.server_url.as_ref())
    }

    /// The token to authenticate with: the session token if there is one,
    /// otherwise the API token.
    pub fn usable_token(&self) -> Option<&str> {
        non_empty(self.session_token.as_ref()).or_else(|| non_empty(self.api_token.as_ref()))
    }

    pub fn is_logged_in(&self) -> bool {
        self.server_url().is_some() && self.usable_token().is_some()
    }

    /// Overlay `PURRTAINER_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PURRTAINER_URL") {
            self.server_url = Some(url);
        }
        if let Ok(token) = std::env::var("PURRTAINER_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Ok(token) = std::env::var("PURRTAINER_SESSION_TOKEN") {
            self.session_token = Some(token);
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|s| format!("<{} chars>", s.len()));
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("api_token", &redact(&self.api_token))
            .field("session_token", &redact(&self.session_token))
            .finish()
    }
}

/// JSON-file-backed credential storage.
pub struct CredentialStore {
    path: PathBuf,
    credentials: Credentials,
}

impl CredentialStore {
    /// Load from `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let credentials = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credentials at {}", path.display());
                Credentials::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Ok(Self { path, credentials })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Store a fresh login and persist it.
    pub fn login(
        &mut self,
        server_url: &str,
        api_token: Option<&str>,
        session_token: &str,
    ) -> Result<(), ConfigError> {
        self.credentials = Credentials {
            server_url: Some(server_url.trim_end_matches('/').to_string()),
            api_token: api_token.map(str::to_string),
            session_token: Some(session_token.to_string()),
        };
        self.save()
    }

    /// Forget both tokens. The server address is kept for the next login.
    pub fn logout(&mut self) -> Result<(), ConfigError> {
        self.credentials.api_token = None;
        self.credentials.session_token = None;
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(&self.credentials).map_err(|source| {
            ConfigError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        write_private(&self.path, &json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
