//! Container records as listed by the engine and stored in the snapshot.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a container.
///
/// `Unavailable` is never reported by the engine. It marks entries known only
/// from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published or exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type", default)]
    pub protocol: String,
}

/// One container, in the engine's list format.
///
/// `env` holds only dependency-marker variables; it is filled in from an
/// inspect call and is empty on records straight from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerRecord {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    pub state: ContainerState,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    #[serde(default)]
    pub env: Vec<String>,
}

impl ContainerRecord {
    /// Stable key: first display name without its leading `/`, else the id.
    pub fn identity(&self) -> &str {
        match self.names.first() {
            Some(name) => {
                let name = name.strip_prefix('/').unwrap_or(name.as_str());
                if name.is_empty() {
                    &self.id
                } else {
                    name
                }
            }
            None => &self.id,
        }
    }

    /// Copy of this record as known only from the snapshot.
    pub fn into_unavailable(self, status: &str) -> Self {
        Self {
            state: ContainerState::Unavailable,
            status: status.to_string(),
            ..self
        }
    }
}

#[cfg(test)]
pub(crate) fn record(id: &str, name: &str, state: ContainerState) -> ContainerRecord {
    ContainerRecord {
        id: id.to_string(),
        names: vec![format!("/{name}")],
        image: format!("registry.local/{name}:latest"),
        state,
        status: String::new(),
        ports: Vec::new(),
        env: Vec::new(),
    }
}
