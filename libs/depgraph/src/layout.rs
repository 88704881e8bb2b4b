//! Deterministic layered placement.
//!
//! Containers with no dependencies sit in column 0; every other container
//! sits one column to the right of its deepest dependency. Containers caught
//! in a cycle never get a level from the walk and fall back to column 0.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Default horizontal distance between levels.
pub const DEFAULT_COLUMN_WIDTH: f64 = 650.0;

/// Default vertical distance between containers of one level.
pub const DEFAULT_ROW_HEIGHT: f64 = 280.0;

/// A node coordinate on the graph canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Grid cell size used for computed positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub column_width: f64,
    pub row_height: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            column_width: DEFAULT_COLUMN_WIDTH,
            row_height: DEFAULT_ROW_HEIGHT,
        }
    }
}

/// Assign a level to every name.
///
/// `edges` are `(dependent, dependency)` pairs; edges naming an unknown
/// container are ignored. The result follows the order of `names`.
pub fn compute_levels(names: &[String], edges: &[(String, String)]) -> Vec<(String, usize)> {
    let known: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for name in names {
        forward.entry(name.as_str()).or_default();
        reverse.entry(name.as_str()).or_default();
    }
    for (dependent, dependency) in edges {
        let (dependent, dependency) = (dependent.as_str(), dependency.as_str());
        if !known.contains(dependent) || !known.contains(dependency) {
            continue;
        }
        forward.entry(dependent).or_default().push(dependency);
        reverse.entry(dependency).or_default().push(dependent);
    }

    let mut levels: HashMap<&str, usize> = HashMap::new();
    let mut frontier: VecDeque<&str> = VecDeque::new();
    for name in names {
        let name = name.as_str();
        if forward.get(name).is_some_and(Vec::is_empty) && !levels.contains_key(name) {
            levels.insert(name, 0);
            frontier.push_back(name);
        }
    }

    while let Some(current) = frontier.pop_front() {
        let Some(dependents) = reverse.get(current) else {
            continue;
        };
        for &dependent in dependents {
            if levels.contains_key(dependent) {
                continue;
            }
            let deps = forward.get(dependent).map(Vec::as_slice).unwrap_or_default();
            if !deps.iter().all(|dep| levels.contains_key(dep)) {
                continue;
            }
            let level = 1 + deps.iter().filter_map(|dep| levels.get(dep)).max().copied().unwrap_or(0);
            levels.insert(dependent, level);
            frontier.push_back(dependent);
        }
    }

    names
        .iter()
        .map(|name| (name.clone(), levels.get(name.as_str()).copied().unwrap_or(0)))
        .collect()
}

/// Place leveled names on the grid: level → column, rank within level → row.
pub fn grid_positions(levels: &[(String, usize)], grid: Grid) -> BTreeMap<String, Position> {
    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut positions = BTreeMap::new();
    for (name, level) in levels {
        if positions.contains_key(name) {
            continue;
        }
        let row = rows.entry(*level).or_insert(0);
        positions.insert(
            name.clone(),
            Position {
                x: *level as f64 * grid.column_width,
                y: *row as f64 * grid.row_height,
            },
        );
        *row += 1;
    }
    positions
}

/// Overlay operator-saved positions on a computed layout.
///
/// Saved entries always win; saved entries for names not in `computed`
/// are carried through untouched.
pub fn apply_saved_positions(
    mut computed: BTreeMap<String, Position>,
    saved: &BTreeMap<String, Position>,
) -> BTreeMap<String, Position> {
    for (name, position) in saved {
        computed.insert(name.clone(), *position);
    }
    computed
}
