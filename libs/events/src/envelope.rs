//! Message envelopes and their JSON encoding.

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::types::{
    event_names, LogDataPayload, LogErrorPayload, RebuildStatusPayload, ScriptCompletedPayload,
    ScriptOutputPayload,
};

/// An event pushed from the server to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    LogData(LogDataPayload),
    LogError(LogErrorPayload),
    RebuildStatusChanged(RebuildStatusPayload),
    ScriptOutput(ScriptOutputPayload),
    ScriptCompleted(ScriptCompletedPayload),
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::LogData(_) => event_names::LOG_DATA,
            ServerEvent::LogError(_) => event_names::LOG_ERROR,
            ServerEvent::RebuildStatusChanged(_) => event_names::REBUILD_STATUS_CHANGED,
            ServerEvent::ScriptOutput(_) => event_names::SCRIPT_OUTPUT,
            ServerEvent::ScriptCompleted(_) => event_names::SCRIPT_COMPLETED,
        }
    }

    /// Container the event is about.
    pub fn container_id(&self) -> &str {
        match self {
            ServerEvent::LogData(p) => &p.container_id,
            ServerEvent::LogError(p) => &p.container_id,
            ServerEvent::RebuildStatusChanged(p) => &p.container_id,
            ServerEvent::ScriptOutput(p) => &p.container_id,
            ServerEvent::ScriptCompleted(p) => &p.container_id,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A request sent by an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    SubscribeLogs { container_id: String },
    UnsubscribeLogs,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// `subscribe-logs` accepts the id either bare or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubscribeTarget {
    Bare(String),
    #[serde(rename_all = "camelCase")]
    Wrapped { container_id: String },
}

impl ClientCommand {
    /// Decode an observer's JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, EventError> {
        let raw: RawMessage = serde_json::from_str(text)?;
        match raw.event.as_str() {
            event_names::SUBSCRIBE_LOGS => {
                let target: SubscribeTarget = serde_json::from_value(raw.data)
                    .map_err(|e| EventError::InvalidPayload(e.to_string()))?;
                let container_id = match target {
                    SubscribeTarget::Bare(id) => id,
                    SubscribeTarget::Wrapped { container_id } => container_id,
                };
                if container_id.trim().is_empty() {
                    return Err(EventError::InvalidPayload(
                        "container id cannot be empty".to_string(),
                    ));
                }
                Ok(ClientCommand::SubscribeLogs { container_id })
            }
            event_names::UNSUBSCRIBE_LOGS => Ok(ClientCommand::UnsubscribeLogs),
            other => Err(EventError::UnknownEvent(other.to_string())),
        }
    }
}
