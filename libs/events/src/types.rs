//! Payloads carried by live-channel events.

use serde::{Deserialize, Serialize};

/// All event names as constants.
pub mod event_names {
    // Server → observer
    pub const LOG_DATA: &str = "log-data";
    pub const LOG_ERROR: &str = "log-error";
    pub const REBUILD_STATUS_CHANGED: &str = "rebuild-status-changed";
    pub const SCRIPT_OUTPUT: &str = "script-output";
    pub const SCRIPT_COMPLETED: &str = "script-completed";

    // Observer → server
    pub const SUBSCRIBE_LOGS: &str = "subscribe-logs";
    pub const UNSUBSCRIBE_LOGS: &str = "unsubscribe-logs";
}

/// Which pipe a chunk of script output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// A piece of a followed container's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDataPayload {
    pub container_id: String,
    pub data: String,
}

/// The log follow for a container failed or ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogErrorPayload {
    pub container_id: String,
    pub error: String,
}

/// A container entered or left the rebuilding state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildStatusPayload {
    pub container_id: String,
    pub rebuilding: bool,
    pub container_name: String,
    /// Set only when `rebuilding` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A chunk of rebuild script output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutputPayload {
    pub container_id: String,
    pub container_name: String,
    pub data: String,
    #[serde(rename = "type")]
    pub kind: StreamKind,
}

/// Final outcome of a rebuild, whether the script ran or never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCompletedPayload {
    pub container_id: String,
    pub container_name: String,
    /// Everything the script wrote, stdout and stderr interleaved.
    pub output: String,
    pub exit_code: i32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
