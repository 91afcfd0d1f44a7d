//! Attach socket URL construction.
//!
//! The REST base address is mapped onto the WebSocket scheme (`http` → `ws`,
//! `https` → `wss`), keeping host and port but dropping any path:
//!
//! ```text
//! ws://host:9000/api/websocket/attach?endpointId=5&token=<encoded>&id=<container>
//! ```
//!
//! The token goes in the query string (no `Authorization` header is
//! available during the upgrade handshake), so it is percent-encoded.

use reqwest::Url;

use super::session::AttachTarget;
use super::TerminalError;
use crate::credentials::Credentials;

const ATTACH_PATH: &str = "/api/websocket/attach";

/// Everything needed to open one attach socket. Built fresh per attempt.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub url: Url,
}

impl ConnectionParams {
    pub fn build(credentials: &Credentials, target: &AttachTarget) -> Result<Self, TerminalError> {
        let server = credentials
            .server_url()
            .ok_or_else(|| TerminalError::Configuration("no server address".into()))?;
        if target.environment_id.trim().is_empty() {
            return Err(TerminalError::Configuration("no environment id".into()));
        }
        if target.container_id.trim().is_empty() {
            return Err(TerminalError::Configuration("no container id".into()));
        }
        let token = credentials
            .usable_token()
            .ok_or_else(|| TerminalError::Configuration("no authentication token".into()))?;

        let url = build_ws_url(server, &target.environment_id, token, &target.container_id)?;
        Ok(Self { url })
    }
}

fn build_ws_url(
    base_url: &str,
    environment_id: &str,
    token: &str,
    container_id: &str,
) -> Result<Url, TerminalError> {
    let base = Url::parse(base_url)
        .map_err(|e| TerminalError::Configuration(format!("invalid server address {base_url}: {e}")))?;
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(TerminalError::Configuration(format!(
                "unsupported URL scheme: {other}"
            )))
        }
    };
    let host = base
        .host_str()
        .ok_or_else(|| TerminalError::Configuration(format!("no host in {base_url}")))?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut url = Url::parse(&format!("{scheme}://{authority}{ATTACH_PATH}"))
        .map_err(|e| TerminalError::Configuration(format!("invalid attach URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("endpointId", environment_id)
        .append_pair("token", token)
        .append_pair("id", container_id);
    Ok(url)
}
