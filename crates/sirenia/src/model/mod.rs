//! Arena-backed compound graph model (layout-base `LGraphManager` / `LGraph` / `LNode` / `LEdge`).
//!
//! Nodes, edges and graphs live in flat vectors owned by a [`GraphManager`] and are referred to
//! by copyable handles. A node belongs to exactly one owning graph and may own one child graph;
//! an edge is registered either in the graph shared by both endpoints or, when the endpoints
//! live in different graphs, in the manager's inter-graph list.

mod hierarchy;
mod manager;

pub use manager::GraphManager;

use crate::geom::RectD;

/// Margin around the root graph's content (layout-base `DEFAULT_GRAPH_MARGIN`).
pub const DEFAULT_GRAPH_MARGIN: f64 = 15.0;
/// Estimated size of an empty compound (layout-base `EMPTY_COMPOUND_NODE_SIZE`).
pub const EMPTY_COMPOUND_NODE_SIZE: f64 = 40.0;
/// Baseline node size used by the smart ideal edge length (layout-base `SIMPLE_NODE_SIZE`).
pub const SIMPLE_NODE_SIZE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl GraphId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Grid cells covered by a node's rectangle, inclusive on both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridSpan {
    pub start_x: i32,
    pub finish_x: i32,
    pub start_y: i32,
    pub finish_y: i32,
}

#[derive(Debug, Clone)]
pub struct LNode {
    pub id: String,
    pub rect: RectD,
    /// Padding applied around the child graph when this node is a compound.
    pub padding: f64,
    pub(crate) owner: Option<GraphId>,
    pub(crate) child: Option<GraphId>,
    pub(crate) edges: Vec<EdgeId>,
    /// Synthetic compound inserted by zero-degree tiling.
    pub(crate) dummy: bool,

    pub(crate) spring_fx: f64,
    pub(crate) spring_fy: f64,
    pub(crate) repulsion_fx: f64,
    pub(crate) repulsion_fy: f64,
    pub(crate) gravitation_fx: f64,
    pub(crate) gravitation_fy: f64,

    pub(crate) grid: GridSpan,
    pub(crate) surrounding: Vec<NodeId>,
    pub(crate) apply_gravity: bool,

    pub(crate) estimated_size: f64,
    pub(crate) inclusion_tree_depth: usize,
    /// Number of leaf descendants (1 for leaves); used as the node's mass.
    pub(crate) leaf_count: f64,
}

impl LNode {
    pub(crate) fn new(id: String, rect: RectD) -> Self {
        Self {
            id,
            rect,
            padding: DEFAULT_GRAPH_MARGIN,
            owner: None,
            child: None,
            edges: Vec::new(),
            dummy: false,
            spring_fx: 0.0,
            spring_fy: 0.0,
            repulsion_fx: 0.0,
            repulsion_fy: 0.0,
            gravitation_fx: 0.0,
            gravitation_fy: 0.0,
            grid: GridSpan::default(),
            surrounding: Vec::new(),
            apply_gravity: false,
            estimated_size: 0.0,
            inclusion_tree_depth: 1,
            leaf_count: 1.0,
        }
    }

    pub fn owner(&self) -> Option<GraphId> {
        self.owner
    }

    pub fn child(&self) -> Option<GraphId> {
        self.child
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    pub fn estimated_size(&self) -> f64 {
        self.estimated_size
    }

    pub fn inclusion_tree_depth(&self) -> usize {
        self.inclusion_tree_depth
    }

    pub fn leaf_count(&self) -> f64 {
        self.leaf_count
    }

    pub(crate) fn reset_forces(&mut self) {
        self.spring_fx = 0.0;
        self.spring_fy = 0.0;
        self.repulsion_fx = 0.0;
        self.repulsion_fy = 0.0;
        self.gravitation_fx = 0.0;
        self.gravitation_fy = 0.0;
    }
}

/// Where an edge is currently registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeSlot {
    Detached,
    Graph(GraphId),
    InterGraph,
}

#[derive(Debug, Clone)]
pub struct LEdge {
    pub id: String,
    pub ideal_length: f64,
    pub bend_points: Vec<(f64, f64)>,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
    pub(crate) inter_graph: bool,
    pub(crate) slot: EdgeSlot,
    pub(crate) lca: Option<GraphId>,
    pub(crate) source_in_lca: NodeId,
    pub(crate) target_in_lca: NodeId,
    pub(crate) length: f64,
    pub(crate) length_x: f64,
    pub(crate) length_y: f64,
    pub(crate) overlapping: bool,
}

impl LEdge {
    pub(crate) fn new(id: String, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            ideal_length: 0.0,
            bend_points: Vec::new(),
            source,
            target,
            inter_graph: false,
            slot: EdgeSlot::Detached,
            lca: None,
            source_in_lca: source,
            target_in_lca: target,
            length: 0.0,
            length_x: 0.0,
            length_y: 0.0,
            overlapping: false,
        }
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn is_inter_graph(&self) -> bool {
        self.inter_graph
    }

    pub fn is_registered(&self) -> bool {
        self.slot != EdgeSlot::Detached
    }

    pub fn lca(&self) -> Option<GraphId> {
        self.lca
    }

    pub fn source_in_lca(&self) -> NodeId {
        self.source_in_lca
    }

    pub fn target_in_lca(&self) -> NodeId {
        self.target_in_lca
    }

    /// Length measured by the last spring pass (clip-point or centre distance).
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_overlapping(&self) -> bool {
        self.overlapping
    }

    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LGraph {
    pub(crate) parent: Option<NodeId>,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) edges: Vec<EdgeId>,
    pub(crate) left: f64,
    pub(crate) top: f64,
    pub(crate) right: f64,
    pub(crate) bottom: f64,
    pub(crate) margin: f64,
    pub(crate) estimated_size: f64,
    pub(crate) connected: bool,
    pub(crate) live: bool,
}

impl LGraph {
    pub(crate) fn new(parent: Option<NodeId>, margin: f64) -> Self {
        Self {
            parent,
            nodes: Vec::new(),
            edges: Vec::new(),
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
            margin,
            estimated_size: 0.0,
            connected: false,
            live: true,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn estimated_size(&self) -> f64 {
        self.estimated_size
    }

    pub fn bounds(&self) -> RectD {
        RectD::new(
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top,
        )
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }
}
