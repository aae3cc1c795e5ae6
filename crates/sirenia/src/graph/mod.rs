use crate::error::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-side description of a (possibly nested) graph.
///
/// Compound nodes are not declared separately: any node referenced as another node's `parent`
/// becomes a compound whose size is derived from its children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn validate(&self) -> Result<()> {
        let mut parents: FxHashMap<&str, Option<&str>> = FxHashMap::default();
        parents.reserve(self.nodes.len());
        for n in &self.nodes {
            if parents
                .insert(n.id.as_str(), n.parent.as_deref())
                .is_some()
            {
                return Err(Error::DuplicateNode {
                    node_id: n.id.clone(),
                });
            }
        }

        for n in &self.nodes {
            let Some(parent) = n.parent.as_deref() else {
                continue;
            };
            if !parents.contains_key(parent) {
                return Err(Error::UnknownParent {
                    node_id: n.id.clone(),
                    parent_id: parent.to_string(),
                });
            }
        }

        // Every parent chain must reach a top-level node.
        let mut known_acyclic: FxHashSet<&str> = FxHashSet::default();
        for n in &self.nodes {
            let mut chain: Vec<&str> = Vec::new();
            let mut cur = Some(n.id.as_str());
            while let Some(id) = cur {
                if known_acyclic.contains(id) {
                    break;
                }
                if chain.contains(&id) {
                    return Err(Error::ParentCycle {
                        node_id: n.id.clone(),
                    });
                }
                chain.push(id);
                cur = parents.get(id).copied().flatten();
            }
            known_acyclic.extend(chain);
        }

        for e in &self.edges {
            if !parents.contains_key(e.source.as_str()) || !parents.contains_key(e.target.as_str())
            {
                return Err(Error::MissingEndpoint {
                    edge_id: e.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub width: f64,
    pub height: f64,
    /// Optional initial position (center). Only honored in incremental mode.
    pub x: f64,
    pub y: f64,
    pub parent: Option<String>,
    /// Padding between a compound's border and its children. Ignored for leaves.
    pub padding: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub bend_points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Final geometry of one node (center + size). Compound sizes are the wrapped children bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeLayout {
    pub fn left(&self) -> f64 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f64 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, other: &NodeLayout) -> bool {
        self.left() <= other.left()
            && self.right() >= other.right()
            && self.top() <= other.top()
            && self.bottom() >= other.bottom()
    }

    pub fn overlaps(&self, other: &NodeLayout) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRoute {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Source center, bend points, target center.
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    /// `false` when the input could not be laid out (empty graph, or an edge between a node and
    /// one of its ancestors). Positions are then the caller's input centers.
    pub successful: bool,
    pub iterations: usize,
    pub positions: BTreeMap<String, Point>,
    pub nodes: BTreeMap<String, NodeLayout>,
    pub edges: Vec<EdgeRoute>,
}

impl LayoutResult {
    pub(crate) fn unsuccessful(graph: &Graph) -> Self {
        let mut nodes: BTreeMap<String, NodeLayout> = BTreeMap::new();
        let mut positions: BTreeMap<String, Point> = BTreeMap::new();
        for n in &graph.nodes {
            positions.insert(n.id.clone(), Point { x: n.x, y: n.y });
            nodes.insert(
                n.id.clone(),
                NodeLayout {
                    x: n.x,
                    y: n.y,
                    width: n.width,
                    height: n.height,
                },
            );
        }
        let edges = graph
            .edges
            .iter()
            .map(|e| {
                let mut points = Vec::with_capacity(e.bend_points.len() + 2);
                points.push(positions.get(&e.source).copied().unwrap_or_default());
                points.extend(e.bend_points.iter().copied());
                points.push(positions.get(&e.target).copied().unwrap_or_default());
                EdgeRoute {
                    id: e.id.clone(),
                    source: e.source.clone(),
                    target: e.target.clone(),
                    points,
                }
            })
            .collect();
        Self {
            successful: false,
            iterations: 0,
            positions,
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>) -> Node {
        Node {
            id: id.to_string(),
            width: 10.0,
            height: 10.0,
            parent: parent.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let g = Graph {
            nodes: vec![node("a", None), node("a", None)],
            edges: Vec::new(),
        };
        assert!(matches!(g.validate(), Err(Error::DuplicateNode { .. })));
    }

    #[test]
    fn validate_rejects_parent_cycles() {
        let g = Graph {
            nodes: vec![node("a", Some("b")), node("b", Some("a"))],
            edges: Vec::new(),
        };
        assert!(matches!(g.validate(), Err(Error::ParentCycle { .. })));
    }

    #[test]
    fn validate_rejects_unknown_parent_and_missing_endpoint() {
        let g = Graph {
            nodes: vec![node("a", Some("zzz"))],
            edges: Vec::new(),
        };
        assert!(matches!(g.validate(), Err(Error::UnknownParent { .. })));

        let g = Graph {
            nodes: vec![node("a", None)],
            edges: vec![Edge {
                id: "e".to_string(),
                source: "a".to_string(),
                target: "b".to_string(),
                bend_points: Vec::new(),
            }],
        };
        assert!(matches!(g.validate(), Err(Error::MissingEndpoint { .. })));
    }

    #[test]
    fn validate_accepts_nested_graph() {
        let g = Graph {
            nodes: vec![node("c", None), node("a", Some("c")), node("b", Some("c"))],
            edges: vec![Edge {
                id: "e".to_string(),
                source: "a".to_string(),
                target: "b".to_string(),
                bend_points: Vec::new(),
            }],
        };
        assert!(g.validate().is_ok());
    }
}
