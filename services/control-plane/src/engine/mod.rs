//! Container engine interface.
//!
//! The engine is the remote container runtime reached over HTTP. The
//! [`Engine`] trait covers the calls the control plane makes:
//! - Listing, inspecting and acting on containers
//! - Fetching and following multiplexed logs
//!
//! [`HttpEngine`] talks to a real engine; [`MockEngine`] is an in-memory
//! stand-in for tests and local development.

mod http;
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::fleet::ContainerRecord;

pub use http::HttpEngine;
pub use mock::MockEngine;

/// Errors from engine calls.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not be reached (connection refused, timeout, ...).
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The container or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The engine answered with an error status.
    #[error("engine returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The engine answered with a body we could not read.
    #[error("invalid engine response: {0}")]
    Decode(String),
}

impl EngineError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

/// Raw chunks of a followed log stream.
pub type LogStream = BoxStream<'static, Result<Bytes, EngineError>>;

/// Options for a bounded log fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogsQuery {
    pub tail: usize,
    pub timestamps: bool,
}

/// Inspect output for one container.
///
/// The full document is kept for pass-through; accessors pull out the
/// fields the control plane reads itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDetails(Value);

impl ContainerDetails {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// `Config.Env` as `KEY=value` entries.
    pub fn env(&self) -> Vec<String> {
        self.0
            .pointer("/Config/Env")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Display name without the leading `/`.
    pub fn name(&self) -> Option<&str> {
        let name = self.0.get("Name")?.as_str()?;
        let name = name.strip_prefix('/').unwrap_or(name);
        (!name.is_empty()).then_some(name)
    }

    pub fn into_raw(self) -> Value {
        self.0
    }
}

/// Container engine interface.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), EngineError>;

    /// List every container, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, EngineError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn stop_container(&self, id: &str) -> Result<(), EngineError>;

    async fn restart_container(&self, id: &str) -> Result<(), EngineError>;

    /// Force-remove a container.
    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Fetch the tail of a container's log as one multiplexed body.
    async fn container_logs(&self, id: &str, query: LogsQuery) -> Result<Bytes, EngineError>;

    /// Follow a container's log. The stream ends when the container stops.
    async fn follow_logs(&self, id: &str, tail: usize) -> Result<LogStream, EngineError>;

    /// One-shot resource usage sample.
    async fn container_stats(&self, id: &str) -> Result<Value, EngineError>;

    /// Engine-wide information.
    async fn info(&self) -> Result<Value, EngineError>;
}
