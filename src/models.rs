//! Portainer and Docker REST response types.
//!
//! Field names follow the server's PascalCase JSON. Only the fields the
//! client shows or filters on are modeled; everything else is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An environment (Docker host, agent, edge agent...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: u32,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(default)]
    pub group_id: u64,
    #[serde(rename = "PublicURL", default)]
    pub public_url: String,
    /// 1 = up, 2 = down.
    #[serde(default)]
    pub status: u32,
}

impl Endpoint {
    pub fn is_up(&self) -> bool {
        self.status == 1
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_up() {
            "up"
        } else {
            "down"
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            1 => "docker",
            2 => "agent",
            3 => "azure",
            4 => "edge-agent",
            5 => "kubernetes",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Port {
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,
    pub private_port: u16,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(rename = "Type", default)]
    pub protocol: String,
}

/// One row of `GET /docker/containers/json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    /// `running`, `exited`, ...
    #[serde(default)]
    pub state: String,
    /// Human-readable, e.g. `Up 2 hours`.
    #[serde(default)]
    pub status: String,
}

/// Docker's short id length.
const SHORT_ID_LEN: usize = 12;

impl Container {
    /// First name without Docker's leading `/`, or the short id.
    pub fn display_name(&self) -> &str {
        match self.names.first() {
            Some(name) => name.strip_prefix('/').unwrap_or(name),
            None => self.short_id(),
        }
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..SHORT_ID_LEN).unwrap_or(&self.id)
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_ref()?.get(key).map(String::as_str)
    }

    /// `0.0.0.0:8080->80/tcp, 443/tcp`
    pub fn ports_summary(&self) -> String {
        self.ports
            .iter()
            .map(|p| match p.public_port {
                Some(public) => format!(
                    "{}:{public}->{}/{}",
                    p.ip.as_deref().unwrap_or("0.0.0.0"),
                    p.private_port,
                    p.protocol
                ),
                None => format!("{}/{}", p.private_port, p.protocol),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `GET /docker/containers/{id}/json`, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub state: ContainerState,
    #[serde(default)]
    pub config: ContainerConfig,
}

impl ContainerDetails {
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub finished_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub env: Option<Vec<String>>,
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

/// A Compose or Swarm stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: u32,
    #[serde(default)]
    pub endpoint_id: u64,
    #[serde(default)]
    pub swarm_id: String,
    /// 1 = active, 2 = inactive.
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub creation_date: i64,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub update_date: i64,
    #[serde(default)]
    pub updated_by: String,
}

impl Stack {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            1 => "swarm",
            2 => "compose",
            3 => "kubernetes",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_list_row_parses() {
        let json = r#"{
            "Id": "4f66ad9a0b2e8f3c1d7e6a5b4c3d2e1f",
            "Names": ["/web-1"],
            "Image": "nginx:1.27",
            "Command": "nginx -g 'daemon off;'",
            "Created": 1717000000,
            "Ports": [{"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"},
                      {"PrivatePort": 443, "Type": "tcp"}],
            "Labels": {"com.docker.compose.project": "web"},
            "State": "running",
            "Status": "Up 2 hours",
            "HostConfig": {"NetworkMode": "bridge"},
            "Mounts": []
        }"#;
        let c: Container = serde_json::from_str(json).unwrap();
        assert_eq!(c.display_name(), "web-1");
        assert_eq!(c.short_id(), "4f66ad9a0b2e");
        assert!(c.is_running());
        assert_eq!(c.label("com.docker.compose.project"), Some("web"));
        assert_eq!(c.ports_summary(), "0.0.0.0:8080->80/tcp, 443/tcp");
    }

    #[test]
    fn null_labels_and_no_names() {
        let c: Container =
            serde_json::from_str(r#"{"Id": "abc", "Labels": null, "State": "exited"}"#).unwrap();
        assert_eq!(c.display_name(), "abc");
        assert_eq!(c.label("anything"), None);
        assert!(!c.is_running());
    }

    #[test]
    fn endpoint_and_stack_labels() {
        let e: Endpoint = serde_json::from_str(
            r#"{"Id": 5, "Name": "local", "Type": 1, "URL": "unix:///var/run/docker.sock", "Status": 2}"#,
        )
        .unwrap();
        assert_eq!(e.kind_label(), "docker");
        assert_eq!(e.status_label(), "down");

        let s: Stack = serde_json::from_str(
            r#"{"Id": 3, "Name": "monitoring", "Type": 2, "EndpointId": 5, "Status": 1}"#,
        )
        .unwrap();
        assert_eq!(s.kind_label(), "compose");
        assert!(s.is_active());
    }

    #[test]
    fn inspect_parses_nested_state() {
        let d: ContainerDetails = serde_json::from_str(
            r#"{"Id": "abc", "Name": "/db", "RestartCount": 2,
                "State": {"Status": "running", "Running": true, "Pid": 42, "ExitCode": 0,
                          "StartedAt": "2024-06-01T10:00:00Z"},
                "Config": {"Image": "postgres:16", "Env": ["PGDATA=/data"], "Cmd": null}}"#,
        )
        .unwrap();
        assert_eq!(d.display_name(), "db");
        assert!(d.state.running);
        assert_eq!(d.config.image, "postgres:16");
        assert!(d.config.cmd.is_none());
    }
}
