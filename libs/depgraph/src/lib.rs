//! # fleetdeck-depgraph
//!
//! Turns environment-variable naming conventions into a dependency graph.
//!
//! Containers advertise their listening port through variables ending in a
//! port suffix (`HTTP_PORT=9000`) and declare what they talk to through
//! variables carrying a dependency-marker prefix (`URI_BILLING=http://billing:9000/`).
//! Matching the port in the URL against the advertised ports yields an edge.
//!
//! ## Passes
//!
//! 1. [`resolve_ports`]: port value → container identity (last writer wins).
//! 2. [`infer_edges`]: per container, parse marker values and resolve them.
//! 3. [`compute_levels`] / [`grid_positions`]: layered layout.
//!
//! [`build`] runs all three.

mod edges;
mod layout;
mod rules;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

pub use edges::{extract_port, infer_edges, resolve_ports, DependencyEdge, GraphNode, PortTable};
pub use layout::{
    apply_saved_positions, compute_levels, grid_positions, Grid, Position, DEFAULT_COLUMN_WIDTH,
    DEFAULT_ROW_HEIGHT,
};
pub use rules::{
    split_env, DependencyRules, DEFAULT_DEPENDENCY_PREFIXES, DEFAULT_PORT_EXCLUDE_PREFIX,
    DEFAULT_PORT_SUFFIX,
};

/// State value that marks a dependency target as down.
const EXITED_STATE: &str = "exited";

/// One container's entry in the dependency report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub id: String,
    pub name: String,
    pub state: String,
    pub status: String,
    pub dependencies: Vec<DependencyEdge>,
    /// Some dependency target is in the `exited` state. Advisory only.
    pub broken_dependency: bool,
    pub level: usize,
}

/// Result of a full graph build.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    pub nodes: Vec<NodeReport>,
}

impl DependencyGraph {
    /// Every edge, in node order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.nodes.iter().flat_map(|n| n.dependencies.iter())
    }

    /// Computed grid positions keyed by identity.
    pub fn positions(&self, grid: Grid) -> BTreeMap<String, Position> {
        let levels: Vec<(String, usize)> = self
            .nodes
            .iter()
            .map(|n| (n.name.clone(), n.level))
            .collect();
        grid_positions(&levels, grid)
    }
}

/// Run port resolution, edge inference and leveling over `nodes`.
pub fn build(nodes: &[GraphNode], rules: &DependencyRules) -> DependencyGraph {
    let ports = resolve_ports(nodes, rules);
    let per_node: Vec<Vec<DependencyEdge>> = nodes
        .iter()
        .map(|node| infer_edges(node, &ports, rules))
        .collect();

    let state_by_name: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.name.as_str(), n.state.as_str()))
        .collect();

    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let pairs: Vec<(String, String)> = per_node
        .iter()
        .flatten()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();
    let levels: HashMap<String, usize> = compute_levels(&names, &pairs).into_iter().collect();

    let nodes = nodes
        .iter()
        .zip(per_node)
        .map(|(node, dependencies)| {
            let broken_dependency = dependencies.iter().any(|edge| {
                state_by_name.get(edge.target.as_str()).copied() == Some(EXITED_STATE)
            });
            NodeReport {
                id: node.id.clone(),
                name: node.name.clone(),
                state: node.state.clone(),
                status: node.status.clone(),
                level: levels.get(&node.name).copied().unwrap_or(0),
                dependencies,
                broken_dependency,
            }
        })
        .collect();

    DependencyGraph { nodes }
}
