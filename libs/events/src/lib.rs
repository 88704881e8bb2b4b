//! # fleetdeck-events
//!
//! Wire types for the live channel between the server and its observers.
//!
//! ## Design Principles
//!
//! - Every message is one JSON text frame: `{"event": <name>, "data": <payload>}`
//! - Server events are broadcast; nothing is acknowledged or replayed
//! - Output chunks for one rebuild arrive in generation order; there is no
//!   ordering between different rebuilds
//!
//! ## Server → observer
//!
//! - `log-data`, `log-error` (per-container log follow)
//! - `rebuild-status-changed`, `script-output`, `script-completed` (fleet-wide)
//!
//! ## Observer → server
//!
//! - `subscribe-logs` (payload: container id), `unsubscribe-logs`

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
