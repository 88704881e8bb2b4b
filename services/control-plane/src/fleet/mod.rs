//! Fleet view: live engine state merged with the persisted snapshot.

mod cache;
mod reconciler;
mod record;

pub use cache::FleetCache;
pub use reconciler::{merge_view, FleetError, Reconciler};
pub use record::{ContainerRecord, ContainerState, PortBinding};

#[cfg(test)]
pub(crate) use record::record;

/// Status text for snapshot entries missing from a live listing.
pub const STATUS_CACHED: &str = "Unavailable (cached)";

/// Status text for snapshot entries served while the engine is down.
pub const STATUS_ENGINE_DOWN: &str = "Unavailable (engine unavailable)";
