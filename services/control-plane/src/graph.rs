//! Feeds the reconciled fleet into the dependency graph builder.

use fleetdeck_depgraph::{build, DependencyGraph, DependencyRules, GraphNode};
use futures_util::future::join_all;
use tracing::warn;

use crate::engine::Engine;
use crate::fleet::{ContainerRecord, ContainerState};

/// Environment for one container: cached for unavailable entries, inspected
/// live otherwise, falling back to whatever the record carries.
async fn node_for(engine: &dyn Engine, record: &ContainerRecord) -> GraphNode {
    let env = if record.state == ContainerState::Unavailable {
        record.env.clone()
    } else {
        match engine.inspect_container(&record.id).await {
            Ok(details) => details.env(),
            Err(e) => {
                warn!(container_id = %record.id, error = %e, "Failed to inspect container");
                record.env.clone()
            }
        }
    };

    GraphNode {
        id: record.id.clone(),
        name: record.identity().to_string(),
        state: record.state.as_str().to_string(),
        status: record.status.clone(),
        env,
    }
}

/// Inspect the fleet concurrently and build its dependency graph.
///
/// A failed inspect only affects that container's edges.
pub async fn dependency_graph(
    engine: &dyn Engine,
    fleet: &[ContainerRecord],
    rules: &DependencyRules,
) -> DependencyGraph {
    let nodes = join_all(fleet.iter().map(|record| node_for(engine, record))).await;
    build(&nodes, rules)
}
