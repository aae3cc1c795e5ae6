use super::{
    DEFAULT_GRAPH_MARGIN, EdgeId, EdgeSlot, GraphId, LEdge, LGraph, LNode, NodeId,
};
use crate::error::{Error, Result};
use crate::geom::RectD;
use std::cell::RefCell;
use std::rc::Rc;

/// Owner of every node, edge and graph of one layout run.
#[derive(Debug)]
pub struct GraphManager {
    pub(crate) nodes: Vec<LNode>,
    pub(crate) edges: Vec<LEdge>,
    pub(crate) graphs: Vec<LGraph>,
    /// Live graphs in creation order; the root is always first.
    pub(crate) graph_order: Vec<GraphId>,
    pub(crate) inter_graph_edges: Vec<EdgeId>,
    root: GraphId,

    // Whole-hierarchy views are requested every tick but only change when the structure does.
    // Mutators drop them; the next query rebuilds.
    all_nodes_cache: RefCell<Option<Rc<[NodeId]>>>,
    all_edges_cache: RefCell<Option<Rc<[EdgeId]>>>,
}

impl Default for GraphManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphManager {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            graphs: vec![LGraph::new(None, DEFAULT_GRAPH_MARGIN)],
            graph_order: vec![GraphId(0)],
            inter_graph_edges: Vec::new(),
            root: GraphId(0),
            all_nodes_cache: RefCell::new(None),
            all_edges_cache: RefCell::new(None),
        }
    }

    fn invalidate(&mut self) {
        *self.all_nodes_cache.get_mut() = None;
        *self.all_edges_cache.get_mut() = None;
    }

    pub fn root(&self) -> GraphId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &LNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LNode {
        &mut self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &LEdge {
        &self.edges[id.0]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut LEdge {
        &mut self.edges[id.0]
    }

    pub fn graph(&self, id: GraphId) -> &LGraph {
        &self.graphs[id.0]
    }

    /// Live graphs, root first.
    pub fn graphs(&self) -> &[GraphId] {
        &self.graph_order
    }

    pub fn inter_graph_edges(&self) -> &[EdgeId] {
        &self.inter_graph_edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_live(&self, graph: GraphId) -> bool {
        self.graphs.get(graph.0).is_some_and(|g| g.live)
    }

    /// Every node attached to a live graph, graph by graph in creation order.
    pub fn all_nodes(&self) -> Rc<[NodeId]> {
        let mut cache = self.all_nodes_cache.borrow_mut();
        if let Some(v) = cache.as_ref() {
            return v.clone();
        }
        let v: Rc<[NodeId]> = self
            .graph_order
            .iter()
            .flat_map(|g| self.graphs[g.0].nodes.iter().copied())
            .collect();
        *cache = Some(v.clone());
        v
    }

    /// Intra-graph edges of every live graph followed by the inter-graph edges.
    pub fn all_edges(&self) -> Rc<[EdgeId]> {
        let mut cache = self.all_edges_cache.borrow_mut();
        if let Some(v) = cache.as_ref() {
            return v.clone();
        }
        let v: Rc<[EdgeId]> = self
            .graph_order
            .iter()
            .flat_map(|g| self.graphs[g.0].edges.iter().copied())
            .chain(self.inter_graph_edges.iter().copied())
            .collect();
        *cache = Some(v.clone());
        v
    }

    /// Creates a detached node. Attach it with [`GraphManager::add_node`].
    pub fn new_node(&mut self, id: impl Into<String>, rect: RectD) -> NodeId {
        let nid = NodeId(self.nodes.len());
        self.nodes.push(LNode::new(id.into(), rect));
        nid
    }

    pub fn add_node(&mut self, graph: GraphId, node: NodeId) -> Result<()> {
        if !self.is_live(graph) {
            return Err(Error::invalid_op("target graph is not part of this manager"));
        }
        let Some(n) = self.nodes.get(node.0) else {
            return Err(Error::invalid_op("node is not part of this manager"));
        };
        if n.owner.is_some() {
            return Err(Error::invalid_op(format!(
                "node {} already belongs to a graph",
                n.id
            )));
        }
        self.nodes[node.0].owner = Some(graph);
        self.graphs[graph.0].nodes.push(node);
        self.invalidate();
        Ok(())
    }

    /// Creates an empty child graph below `parent`. The graph margin is the node's padding.
    pub fn add_child_graph(&mut self, parent: NodeId) -> Result<GraphId> {
        let Some(n) = self.nodes.get(parent.0) else {
            return Err(Error::invalid_op("parent node is not part of this manager"));
        };
        if n.child.is_some() {
            return Err(Error::invalid_op(format!(
                "node {} already owns a child graph",
                n.id
            )));
        }
        let gid = GraphId(self.graphs.len());
        self.graphs.push(LGraph::new(Some(parent), n.padding));
        self.graph_order.push(gid);
        self.nodes[parent.0].child = Some(gid);
        self.invalidate();
        Ok(gid)
    }

    /// Creates an edge between two attached nodes and registers it.
    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        source: NodeId,
        target: NodeId,
    ) -> Result<EdgeId> {
        if source.0 >= self.nodes.len() || target.0 >= self.nodes.len() {
            return Err(Error::invalid_op("edge endpoint is not part of this manager"));
        }
        let eid = EdgeId(self.edges.len());
        self.edges.push(LEdge::new(id.into(), source, target));
        if let Err(err) = self.attach_edge(eid) {
            self.edges.pop();
            return Err(err);
        }
        Ok(eid)
    }

    /// Registers a detached edge: in the shared owner graph, else in the inter-graph list.
    pub fn attach_edge(&mut self, edge: EdgeId) -> Result<()> {
        let Some(e) = self.edges.get(edge.0) else {
            return Err(Error::invalid_op("edge is not part of this manager"));
        };
        if e.slot != EdgeSlot::Detached {
            return Err(Error::invalid_op(format!("edge {} is already registered", e.id)));
        }
        let (source, target) = (e.source, e.target);
        let source_owner = self.live_owner(source)?;
        let target_owner = self.live_owner(target)?;

        let slot = if source_owner == target_owner {
            self.graphs[source_owner.0].edges.push(edge);
            EdgeSlot::Graph(source_owner)
        } else {
            self.inter_graph_edges.push(edge);
            EdgeSlot::InterGraph
        };
        let e = &mut self.edges[edge.0];
        e.slot = slot;
        e.inter_graph = slot == EdgeSlot::InterGraph;

        self.nodes[source.0].edges.push(edge);
        if target != source {
            self.nodes[target.0].edges.push(edge);
        }
        self.invalidate();
        Ok(())
    }

    fn live_owner(&self, node: NodeId) -> Result<GraphId> {
        let n = &self.nodes[node.0];
        match n.owner {
            Some(g) if self.graphs[g.0].live => Ok(g),
            Some(_) => Err(Error::invalid_op(format!(
                "node {} belongs to a graph that is not live",
                n.id
            ))),
            None => Err(Error::invalid_op(format!(
                "node {} is not in any graph of this manager",
                n.id
            ))),
        }
    }

    /// Unregisters an edge from its endpoints and its owning collection. The edge record is kept
    /// and can be re-registered with [`GraphManager::attach_edge`].
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<()> {
        let Some(e) = self.edges.get(edge.0) else {
            return Err(Error::invalid_op("edge is not part of this manager"));
        };
        let (source, target, slot) = (e.source, e.target, e.slot);
        let id = e.id.clone();

        let source_pos = self.nodes[source.0].edges.iter().position(|&x| x == edge);
        let target_pos = self.nodes[target.0].edges.iter().position(|&x| x == edge);
        let (Some(source_pos), Some(target_pos)) = (source_pos, target_pos) else {
            return Err(Error::invalid_op(format!(
                "edge {id} is missing from an endpoint's incidence list"
            )));
        };
        let owning: &mut Vec<EdgeId> = match slot {
            EdgeSlot::Detached => {
                return Err(Error::invalid_op(format!("edge {id} is not registered")));
            }
            EdgeSlot::Graph(g) => &mut self.graphs[g.0].edges,
            EdgeSlot::InterGraph => &mut self.inter_graph_edges,
        };
        let Some(owning_pos) = owning.iter().position(|&x| x == edge) else {
            return Err(Error::invalid_op(format!(
                "edge {id} is missing from its owning edge list"
            )));
        };
        owning.remove(owning_pos);

        self.nodes[source.0].edges.remove(source_pos);
        if target != source {
            self.nodes[target.0].edges.remove(target_pos);
        }
        self.edges[edge.0].slot = EdgeSlot::Detached;
        self.invalidate();
        Ok(())
    }

    /// Removes every incident edge, then detaches the node from its owner. A child graph stays
    /// linked to the node.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let Some(n) = self.nodes.get(node.0) else {
            return Err(Error::invalid_op("node is not part of this manager"));
        };
        let Some(owner) = n.owner else {
            return Err(Error::invalid_op(format!(
                "node {} is not in any graph",
                n.id
            )));
        };
        let Some(pos) = self.graphs[owner.0].nodes.iter().position(|&x| x == node) else {
            return Err(Error::invalid_op(format!(
                "node {} is missing from its owner graph",
                n.id
            )));
        };

        let incident = n.edges.clone();
        for e in incident {
            self.remove_edge(e)?;
        }
        self.graphs[owner.0].nodes.remove(pos);
        self.nodes[node.0].owner = None;
        self.invalidate();
        Ok(())
    }

    /// Moves a node (and its subtree) into another graph. Incident edges are re-routed.
    pub fn move_node(&mut self, node: NodeId, to: GraphId) -> Result<()> {
        let incident = self.nodes[node.0].edges.clone();
        self.remove_node(node)?;
        self.add_node(to, node)?;
        for e in incident {
            self.attach_edge(e)?;
        }
        Ok(())
    }

    /// Takes the child graph of `node` out of the hierarchy. Its members keep their owner so the
    /// graph can be put back with [`GraphManager::reattach_child_graph`].
    pub fn detach_child_graph(&mut self, node: NodeId) -> Result<GraphId> {
        let Some(gid) = self.nodes.get(node.0).and_then(|n| n.child) else {
            return Err(Error::invalid_op("node has no child graph to detach"));
        };
        let Some(pos) = self.graph_order.iter().position(|&g| g == gid) else {
            return Err(Error::invalid_op("child graph is not live"));
        };
        self.graph_order.remove(pos);
        self.graphs[gid.0].live = false;
        self.nodes[node.0].child = None;
        self.invalidate();
        Ok(gid)
    }

    pub fn reattach_child_graph(&mut self, node: NodeId, graph: GraphId) -> Result<()> {
        let Some(g) = self.graphs.get(graph.0) else {
            return Err(Error::invalid_op("graph is not part of this manager"));
        };
        if g.live || g.parent != Some(node) {
            return Err(Error::invalid_op(
                "only a detached child graph can be reattached to its own parent",
            ));
        }
        if self.nodes[node.0].child.is_some() {
            return Err(Error::invalid_op("node already owns a child graph"));
        }
        self.graphs[graph.0].live = true;
        self.graph_order.push(graph);
        self.nodes[node.0].child = Some(graph);
        self.invalidate();
        Ok(())
    }

    /// Live child graph of a node, if any.
    pub fn child_of(&self, node: NodeId) -> Option<GraphId> {
        self.nodes[node.0].child.filter(|g| self.graphs[g.0].live)
    }

    /// A node with a child graph (even an empty one).
    pub fn is_compound(&self, node: NodeId) -> bool {
        self.child_of(node).is_some()
    }

    /// A compound whose child graph has at least one member.
    pub fn has_children(&self, node: NodeId) -> bool {
        self.child_of(node)
            .is_some_and(|g| !self.graphs[g.0].nodes.is_empty())
    }

    /// Degree counting incident edges only; a self-loop counts once.
    pub fn degree(&self, node: NodeId) -> usize {
        self.nodes[node.0].edges.len()
    }

    /// Degree summed over the node and its whole live subtree.
    pub fn degree_with_children(&self, node: NodeId) -> usize {
        self.with_children(node)
            .into_iter()
            .map(|n| self.degree(n))
            .sum()
    }

    /// The node followed by every descendant in its live child graphs.
    pub fn with_children(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut i = 0;
        while i < out.len() {
            if let Some(g) = self.child_of(out[i]) {
                out.extend(self.graphs[g.0].nodes.iter().copied());
            }
            i += 1;
        }
        out
    }

    /// Parent node of the graph owning `node`.
    pub fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0]
            .owner
            .and_then(|g| self.graphs[g.0].parent)
    }

    /// `node` or its ancestor that is a direct member of `graph`.
    pub fn ancestor_in(&self, node: NodeId, graph: GraphId) -> Option<NodeId> {
        let mut cur = node;
        loop {
            let owner = self.nodes[cur.0].owner?;
            if owner == graph {
                return Some(cur);
            }
            cur = self.graphs[owner.0].parent?;
        }
    }

    /// Other endpoint of `edge`, lifted to its ancestor that is a direct member of `graph`.
    pub fn other_end_in_graph(&self, edge: EdgeId, node: NodeId, graph: GraphId) -> Option<NodeId> {
        let other = self.edges[edge.0].other_end(node)?;
        self.ancestor_in(other, graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> RectD {
        RectD::new(0.0, 0.0, 10.0, 10.0)
    }

    fn attached(gm: &mut GraphManager, graph: GraphId, id: &str) -> NodeId {
        let n = gm.new_node(id, rect());
        gm.add_node(graph, n).expect("add node");
        n
    }

    #[test]
    fn edges_are_routed_by_owner() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = attached(&mut gm, root, "a");
        let b = attached(&mut gm, root, "b");
        let c = attached(&mut gm, root, "c");
        let inner = gm.add_child_graph(c).expect("child graph");
        let d = attached(&mut gm, inner, "d");

        let ab = gm.add_edge("ab", a, b).expect("ab");
        let ad = gm.add_edge("ad", a, d).expect("ad");
        assert_eq!(gm.graph(root).edges(), &[ab]);
        assert_eq!(gm.inter_graph_edges(), &[ad]);
        assert!(gm.edge(ad).is_inter_graph());
        assert!(!gm.edge(ab).is_inter_graph());
        assert_eq!(gm.all_edges().as_ref(), &[ab, ad]);
        assert_eq!(gm.all_nodes().as_ref(), &[a, b, c, d]);
    }

    #[test]
    fn contract_violations_are_rejected() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = attached(&mut gm, root, "a");
        let loose = gm.new_node("loose", rect());

        assert!(matches!(
            gm.add_edge("e", a, loose),
            Err(Error::InvalidGraphOperation { .. })
        ));
        assert!(gm.remove_node(loose).is_err());
        assert!(gm.add_node(root, a).is_err());

        let b = attached(&mut gm, root, "b");
        let e = gm.add_edge("e", a, b).expect("edge");
        assert!(gm.attach_edge(e).is_err());
        gm.remove_edge(e).expect("remove");
        assert!(gm.remove_edge(e).is_err());
        assert!(gm.graph(root).edges().is_empty());
        assert!(gm.node(a).edges().is_empty());
    }

    #[test]
    fn remove_node_cascades_and_attach_restores() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = attached(&mut gm, root, "a");
        let b = attached(&mut gm, root, "b");
        let e = gm.add_edge("e", a, b).expect("edge");
        assert_eq!(gm.all_nodes().len(), 2);

        gm.remove_node(b).expect("remove");
        assert!(!gm.edge(e).is_registered());
        assert!(gm.node(a).edges().is_empty());
        assert_eq!(gm.all_nodes().as_ref(), &[a]);
        assert!(gm.all_edges().is_empty());

        gm.add_node(root, b).expect("re-add");
        gm.attach_edge(e).expect("re-attach");
        assert_eq!(gm.degree(a), 1);
        assert_eq!(gm.degree(b), 1);
        assert_eq!(gm.all_edges().as_ref(), &[e]);
    }

    #[test]
    fn self_loop_counts_once() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = attached(&mut gm, root, "a");
        let e = gm.add_edge("loop", a, a).expect("loop");
        assert_eq!(gm.degree(a), 1);
        gm.remove_edge(e).expect("remove loop");
        assert_eq!(gm.degree(a), 0);
    }

    #[test]
    fn detached_child_graph_leaves_views() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let c = attached(&mut gm, root, "c");
        let inner = gm.add_child_graph(c).expect("child graph");
        let x = attached(&mut gm, inner, "x");
        assert_eq!(gm.all_nodes().len(), 2);

        let g = gm.detach_child_graph(c).expect("detach");
        assert_eq!(g, inner);
        assert_eq!(gm.all_nodes().as_ref(), &[c]);
        assert!(!gm.is_compound(c));
        assert_eq!(gm.node(x).owner(), Some(inner));

        gm.reattach_child_graph(c, g).expect("reattach");
        assert_eq!(gm.all_nodes().as_ref(), &[c, x]);
        assert!(gm.reattach_child_graph(c, g).is_err());
    }

    #[test]
    fn move_node_reroutes_edges() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = attached(&mut gm, root, "a");
        let b = attached(&mut gm, root, "b");
        let c = attached(&mut gm, root, "c");
        let inner = gm.add_child_graph(c).expect("child graph");
        let e = gm.add_edge("ab", a, b).expect("edge");

        gm.move_node(b, inner).expect("move");
        assert!(gm.edge(e).is_inter_graph());
        assert_eq!(gm.inter_graph_edges(), &[e]);
        assert!(gm.graph(root).edges().is_empty());
        assert_eq!(gm.ancestor_in(b, root), Some(c));
        assert_eq!(gm.other_end_in_graph(e, a, root), Some(c));
    }
}
