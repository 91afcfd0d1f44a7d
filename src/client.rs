//! HTTP client for the Portainer REST API.
//!
//! [`PortainerClient`] wraps `reqwest::Client` with one typed method per
//! endpoint the CLI uses. Docker calls go through Portainer's proxy at
//! `/api/endpoints/{env}/docker/...`.
//!
//! ## Authentication
//!
//! Every request except `POST /api/auth` carries the token twice: as
//! `X-API-Token` and as `Authorization: Bearer`. Servers accept one or the
//! other depending on version and token kind. A `Referer` header pointing at
//! the server is also sent; some container operations are refused without it.
//!
//! ## Error handling
//!
//! Non-2xx responses become [`ClientError::Server`], with the message taken
//! from the JSON body's `message`, `details` or `error` field when present,
//! else the raw body.

use reqwest::header::{HeaderValue, REFERER};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::credentials::Credentials;
use crate::demux;
use crate::filter::stacks_in_endpoint;
use crate::models::{Container, ContainerDetails, Endpoint, Stack};

/// Errors returned by [`PortainerClient`] methods.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure: connection refused, timeout, DNS, TLS.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// No server address or token is stored.
    #[error("not logged in (run `purrtainer login` first)")]
    NotLoggedIn,
    /// An environment, container or exec id that cannot be a path segment.
    #[error("invalid identifier {0:?}")]
    InvalidId(String),
}

impl ClientError {
    /// The token was rejected or has expired.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Server { status: 401, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }
}

/// Container lifecycle operations exposed as `POST .../containers/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl ContainerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }
}

/// HTTP client for one Portainer server.
pub struct PortainerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PortainerClient {
    /// Client for `base_url`. Without a token only [`authenticate`](Self::authenticate)
    /// is useful.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        config: &HttpConfig,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    /// Client using the stored server address and the preferred token.
    pub fn from_credentials(
        credentials: &Credentials,
        config: &HttpConfig,
    ) -> Result<Self, ClientError> {
        let (Some(url), Some(token)) = (credentials.server_url(), credentials.usable_token())
        else {
            return Err(ClientError::NotLoggedIn);
        };
        Self::new(url, Some(token), config)
    }

    /// The server's base URL (without trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as a single segment so
    /// `/`, `?` and `#` inside an id cannot change the endpoint.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let invalid = || ClientError::Protocol(format!("invalid server URL: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/api/endpoints/{env}/docker/...` for caller-supplied ids.
    fn docker_url(&self, env: &str, segments: &[&str]) -> Result<Url, ClientError> {
        let mut path = vec!["api", "endpoints", id_segment(env)?, "docker"];
        for segment in segments {
            path.push(id_segment(segment)?);
        }
        self.url(&path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        if let Ok(referer) = HeaderValue::from_str(&self.base_url) {
            builder = builder.header(REFERER, referer);
        }
        match &self.token {
            Some(token) => builder.header("X-API-Token", token).bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!("GET {}", url.path());
        let resp = self.authorize(self.http.get(url)).send().await?;
        Self::parse_json(resp).await
    }

    /// `POST /api/auth`: exchange username, password and API key for a JWT.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        api_key: &str,
    ) -> Result<String, ClientError> {
        let body = json!({
            "username": username,
            "password": password,
            "apiKey": api_key,
        });
        let resp = self
            .http
            .post(self.url(&["api", "auth"])?)
            .json(&body)
            .send()
            .await?;
        let value: Value = Self::parse_json(resp).await?;
        value["jwt"]
            .as_str()
            .filter(|jwt| !jwt.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Protocol("auth response has no jwt".into()))
    }

    /// `GET /api/endpoints`
    pub async fn endpoints(&self) -> Result<Vec<Endpoint>, ClientError> {
        self.get_json(self.url(&["api", "endpoints"])?).await
    }

    /// `GET /api/endpoints/{env}/docker/containers/json`, including stopped
    /// containers when `all` is set.
    pub async fn containers(&self, env: &str, all: bool) -> Result<Vec<Container>, ClientError> {
        let mut url = self.docker_url(env, &["containers", "json"])?;
        if all {
            url.query_pairs_mut().append_pair("all", "1");
        }
        self.get_json(url).await
    }

    /// `GET /api/endpoints/{env}/docker/containers/{id}/json`
    pub async fn container(&self, env: &str, id: &str) -> Result<ContainerDetails, ClientError> {
        self.get_json(self.docker_url(env, &["containers", id, "json"])?)
            .await
    }

    /// `POST /api/endpoints/{env}/docker/containers/{id}/{action}`.
    ///
    /// Docker answers 304 when the container is already in the requested
    /// state; that counts as success.
    pub async fn container_action(
        &self,
        env: &str,
        id: &str,
        action: ContainerAction,
    ) -> Result<(), ClientError> {
        let url = self.docker_url(env, &["containers", id, action.as_str()])?;
        debug!("POST {}", url.path());
        let resp = self.authorize(self.http.post(url)).send().await?;
        if resp.status() == StatusCode::NOT_MODIFIED {
            debug!("Container {id} already in the state `{}` asks for", action.as_str());
            return Ok(());
        }
        Self::check(resp).await.map(drop)
    }

    /// Last `tail` lines of stdout and stderr, demultiplexed.
    pub async fn container_logs(
        &self,
        env: &str,
        id: &str,
        tail: u32,
    ) -> Result<String, ClientError> {
        let mut url = self.docker_url(env, &["containers", id, "logs"])?;
        url.query_pairs_mut()
            .append_pair("stdout", "1")
            .append_pair("stderr", "1")
            .append_pair("tail", &tail.to_string())
            .append_pair("timestamps", "0");
        let resp = self.authorize(self.http.get(url)).send().await?;
        let body = Self::check(resp).await?.bytes().await?;
        Ok(demux::to_text(&body))
    }

    /// Run `command` through `/bin/sh -c` in the container and return its
    /// combined output.
    ///
    /// Two calls: create the exec instance, then start it attached and read
    /// the (multiplexed) body to the end.
    pub async fn exec(&self, env: &str, id: &str, command: &str) -> Result<String, ClientError> {
        let create = json!({
            "AttachStdout": true,
            "AttachStderr": true,
            "Tty": false,
            "Cmd": ["/bin/sh", "-c", command],
        });
        let resp = self
            .authorize(self.http.post(self.docker_url(env, &["containers", id, "exec"])?))
            .json(&create)
            .send()
            .await?;
        let created: Value = Self::parse_json(resp).await?;
        let exec_id = created["Id"]
            .as_str()
            .ok_or_else(|| ClientError::Protocol("exec create response has no Id".into()))?;
        debug!("Created exec {exec_id} in container {id}");

        let resp = self
            .authorize(self.http.post(self.docker_url(env, &["exec", exec_id, "start"])?))
            .json(&json!({ "Detach": false, "Tty": false }))
            .send()
            .await?;
        let body = Self::check(resp).await?.bytes().await?;
        Ok(demux::to_text(&body))
    }

    /// Stacks deployed to environment `env`.
    ///
    /// Asks the server to filter first; older servers reject the filter, in
    /// which case the full list is fetched. Either way the result is
    /// filtered again locally by `EndpointId`.
    pub async fn stacks(&self, env: u64) -> Result<Vec<Stack>, ClientError> {
        let mut url = self.url(&["api", "stacks"])?;
        url.query_pairs_mut()
            .append_pair("filters", &json!({ "EndpointID": env }).to_string());
        let stacks = match self.get_json::<Vec<Stack>>(url).await {
            Ok(stacks) => stacks,
            Err(e) => {
                warn!("Filtered stack list failed ({e}), fetching all stacks");
                self.get_json(self.url(&["api", "stacks"])?).await?
            }
        };
        Ok(stacks_in_endpoint(stacks, env))
    }

    /// `GET /api/stacks/{id}`
    pub async fn stack(&self, id: u64) -> Result<Stack, ClientError> {
        let id = id.to_string();
        self.get_json(self.url(&["api", "stacks", id.as_str()])?)
            .await
    }

    /// Pass 2xx responses through; turn anything else into [`ClientError::Server`].
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await?;
        Err(ClientError::Server {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let body = Self::check(resp).await?.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::Protocol(format!("invalid JSON from server: {e}")))
    }
}

/// `id` if it is usable as one path segment. `.` and `..` would be dropped
/// by URL normalization, so they are refused along with the empty string.
fn id_segment(id: &str) -> Result<&str, ClientError> {
    match id {
        "" | "." | ".." => Err(ClientError::InvalidId(id.to_string())),
        _ => Ok(id),
    }
}

/// Best human-readable message in an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "details", "error"]
                .iter()
                .find_map(|key| v[*key].as_str().filter(|s| !s.is_empty()).map(String::from))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
