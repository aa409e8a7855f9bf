use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::models::location::LocationNode;

pub const MAX_PATH_DEPTH: usize = 15;
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Why a walk toward the root stopped before reaching it cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Cycle,
    MissingAncestor,
    DepthExceeded,
}

impl Truncation {
    pub fn as_str(self) -> &'static str {
        match self {
            Truncation::Cycle => "cycle",
            Truncation::MissingAncestor => "missing_ancestor",
            Truncation::DepthExceeded => "depth_exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTrace {
    pub segments: Vec<String>,
    pub truncation: Option<Truncation>,
}

/// Parent and name lookups built from the flat location records.
#[derive(Debug, Clone, Default)]
pub struct LocationTree {
    parents: HashMap<String, Option<String>>,
    names: HashMap<String, String>,
}

impl LocationTree {
    pub fn from_nodes(nodes: &[LocationNode]) -> Self {
        let mut tree = Self::default();
        for node in nodes {
            let parent = node
                .parent_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            tree.parents.insert(node.id.clone(), parent);
            tree.names.insert(node.id.clone(), node.name.clone());
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn resolve(&self, location_id: &str) -> Vec<String> {
        let trace = trace_path(location_id, &self.parents, &self.names);
        if let Some(reason) = trace.truncation {
            debug!(
                target: "app::paths",
                location_id,
                reason = reason.as_str(),
                kept = trace.segments.len(),
                "location path truncated"
            );
        }
        if trace.segments.is_empty() {
            warn!(target: "app::paths", location_id, "location id not present in tree");
            return vec![UNKNOWN_LOCATION.to_string()];
        }
        trace.segments
    }

    pub fn trace(&self, location_id: &str) -> PathTrace {
        trace_path(location_id, &self.parents, &self.names)
    }
}

/// Root-to-leaf names for `location_id`. Returns the partial path on a cycle,
/// a missing ancestor or when [`MAX_PATH_DEPTH`] is reached, and
/// `["Unknown"]` when the id itself is not known.
pub fn resolve_path(
    location_id: &str,
    parents: &HashMap<String, Option<String>>,
    names: &HashMap<String, String>,
) -> Vec<String> {
    let trace = trace_path(location_id, parents, names);
    if trace.segments.is_empty() {
        vec![UNKNOWN_LOCATION.to_string()]
    } else {
        trace.segments
    }
}

fn trace_path(
    location_id: &str,
    parents: &HashMap<String, Option<String>>,
    names: &HashMap<String, String>,
) -> PathTrace {
    let mut segments = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = location_id;
    let mut truncation = None;

    loop {
        if !visited.insert(current) {
            truncation = Some(Truncation::Cycle);
            break;
        }
        let Some(name) = names.get(current) else {
            if !segments.is_empty() {
                truncation = Some(Truncation::MissingAncestor);
            }
            break;
        };
        segments.push(name.clone());

        match parents.get(current).and_then(|parent| parent.as_deref()) {
            Some(parent) => {
                if segments.len() >= MAX_PATH_DEPTH {
                    truncation = Some(Truncation::DepthExceeded);
                    break;
                }
                current = parent;
            }
            None => break,
        }
    }

    segments.reverse();
    PathTrace {
        segments,
        truncation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(depth: usize) -> Vec<LocationNode> {
        (0..depth)
            .map(|index| {
                let parent = index.checked_sub(1).map(|p| p.to_string());
                LocationNode::new(index.to_string(), parent.as_deref(), format!("L{index}"))
            })
            .collect()
    }

    #[test]
    fn resolves_root_to_leaf() {
        let tree = LocationTree::from_nodes(&[
            LocationNode::new("A", None, "Quality"),
            LocationNode::new("B", Some("A"), "Tower-F"),
            LocationNode::new("C", Some("B"), "101"),
        ]);
        assert_eq!(tree.resolve("C"), vec!["Quality", "Tower-F", "101"]);
        assert_eq!(tree.trace("C").truncation, None);
    }

    #[test]
    fn path_length_equals_depth_for_acyclic_chains() {
        for depth in 1..=MAX_PATH_DEPTH {
            let tree = LocationTree::from_nodes(&chain(depth));
            let leaf = (depth - 1).to_string();
            assert_eq!(tree.resolve(&leaf).len(), depth);
        }
    }

    #[test]
    fn deep_chains_are_cut_at_the_depth_bound() {
        let tree = LocationTree::from_nodes(&chain(40));
        let trace = tree.trace("39");
        assert_eq!(trace.segments.len(), MAX_PATH_DEPTH);
        assert_eq!(trace.truncation, Some(Truncation::DepthExceeded));
        assert_eq!(trace.segments.last().map(String::as_str), Some("L39"));
    }

    #[test]
    fn cycles_terminate_with_partial_path() {
        let tree = LocationTree::from_nodes(&[
            LocationNode::new("A", Some("C"), "Quality"),
            LocationNode::new("B", Some("A"), "Tower-F"),
            LocationNode::new("C", Some("B"), "101"),
        ]);
        let trace = tree.trace("C");
        assert_eq!(trace.truncation, Some(Truncation::Cycle));
        assert_eq!(trace.segments, vec!["Quality", "Tower-F", "101"]);

        let self_loop = LocationTree::from_nodes(&[LocationNode::new("X", Some("X"), "Loop")]);
        assert_eq!(self_loop.resolve("X"), vec!["Loop"]);
    }

    #[test]
    fn missing_ancestor_and_unknown_start() {
        let tree = LocationTree::from_nodes(&[
            LocationNode::new("B", Some("gone"), "Tower-F"),
            LocationNode::new("C", Some("B"), "101"),
        ]);
        let trace = tree.trace("C");
        assert_eq!(trace.segments, vec!["Tower-F", "101"]);
        assert_eq!(trace.truncation, Some(Truncation::MissingAncestor));

        assert_eq!(tree.resolve("nope"), vec![UNKNOWN_LOCATION]);
        let parents = HashMap::new();
        let names = HashMap::new();
        assert_eq!(resolve_path("nope", &parents, &names), vec![UNKNOWN_LOCATION]);
    }

    #[test]
    fn blank_parent_ids_are_roots() {
        let tree = LocationTree::from_nodes(&[
            LocationNode::new("A", Some(" "), "Quality"),
            LocationNode::new("B", Some("A"), "Tower-G"),
        ]);
        assert_eq!(tree.resolve("B"), vec!["Quality", "Tower-G"]);
    }
}
