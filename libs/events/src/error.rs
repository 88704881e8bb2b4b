//! Error types for live-channel messages.

use thiserror::Error;

/// Errors that can occur when encoding or decoding live-channel messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event name is not one this side understands.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The payload does not match the event.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
