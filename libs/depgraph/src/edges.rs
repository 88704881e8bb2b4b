//! Port resolution and edge inference.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::{split_env, DependencyRules};

/// `scheme://host:port`, capturing the port. Anything after the port is ignored.
static URL_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z][a-zA-Z0-9+.\-]*://[^:/\s]+:(\d+)").expect("URL pattern is valid")
});

/// A container as seen by the graph builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Engine-assigned id.
    pub id: String,
    /// Identity (display name).
    pub name: String,
    pub state: String,
    pub status: String,
    /// `KEY=value` entries.
    pub env: Vec<String>,
}

/// An inferred dependency of one container on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub source: String,
    pub env_var: String,
    pub target: String,
    pub url: String,
    pub port: String,
}

/// Port value → identity of the container advertising it.
pub type PortTable = HashMap<String, String>;

/// Extract the port from a `scheme://host:port[/path]` value.
pub fn extract_port(url: &str) -> Option<&str> {
    URL_PORT
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Build the port lookup table.
///
/// When two containers advertise the same port value the one scanned last
/// wins.
pub fn resolve_ports(nodes: &[GraphNode], rules: &DependencyRules) -> PortTable {
    let mut table = PortTable::new();
    for node in nodes {
        for (key, value) in node.env.iter().filter_map(|e| split_env(e)) {
            if value.is_empty() || !rules.is_port_key(key) {
                continue;
            }
            if let Some(previous) = table.insert(value.to_string(), node.name.clone()) {
                if previous != node.name {
                    debug!(
                        port = %value,
                        previous = %previous,
                        current = %node.name,
                        "Port advertised by more than one container, keeping the latest"
                    );
                }
            }
        }
    }
    table
}

/// Emit the dependency edges declared by `node`'s environment.
///
/// Values that do not parse, or whose port nobody advertises, are dropped.
pub fn infer_edges(node: &GraphNode, ports: &PortTable, rules: &DependencyRules) -> Vec<DependencyEdge> {
    let mut edges = Vec::new();
    for (key, value) in node.env.iter().filter_map(|e| split_env(e)) {
        if value.is_empty() || !rules.is_dependency_key(key) {
            continue;
        }
        let Some(port) = extract_port(value) else {
            debug!(container = %node.name, env_var = %key, "Dependency value has no port");
            continue;
        };
        let Some(target) = ports.get(port) else {
            debug!(container = %node.name, env_var = %key, port = %port, "No container advertises port");
            continue;
        };
        edges.push(DependencyEdge {
            source: node.name.clone(),
            env_var: key.to_string(),
            target: target.clone(),
            url: value.to_string(),
            port: port.to_string(),
        });
    }
    edges
}
