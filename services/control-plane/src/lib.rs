//! fleetdeck control plane library.
//!
//! This crate primarily ships the `fleetdeck` binary, but we expose the
//! library surface for integration testing and reuse.

pub mod api;
pub mod bus;
pub mod config;
pub mod engine;
pub mod fleet;
pub mod graph;
pub mod layout;
pub mod logs;
pub mod rebuild;
pub mod scripts;
pub mod state;
pub mod store;
