//! Whole-hierarchy queries: LCA, inclusion depth, connectivity, bounds and size estimates.

use super::{EMPTY_COMPOUND_NODE_SIZE, GraphId, GraphManager, NodeId};
use crate::geom::{RectD, bounds_of};

impl GraphManager {
    /// Live graphs reachable from the root, every child graph before its parent.
    pub fn graphs_bottom_up(&self) -> Vec<GraphId> {
        let mut pre_order: Vec<GraphId> = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(g) = stack.pop() {
            pre_order.push(g);
            for &n in &self.graphs[g.0].nodes {
                if let Some(child) = self.child_of(n) {
                    stack.push(child);
                }
            }
        }
        pre_order.reverse();
        pre_order
    }

    /// Inclusion-tree depth of a graph: its parent node's depth, 1 for the root.
    pub fn graph_depth(&self, graph: GraphId) -> usize {
        self.graphs[graph.0]
            .parent
            .map_or(1, |p| self.nodes[p.0].inclusion_tree_depth)
    }

    pub fn calc_inclusion_tree_depths(&mut self) {
        let mut stack: Vec<(GraphId, usize)> = vec![(self.root(), 1)];
        while let Some((g, depth)) = stack.pop() {
            for i in 0..self.graphs[g.0].nodes.len() {
                let n = self.graphs[g.0].nodes[i];
                self.nodes[n.0].inclusion_tree_depth = depth;
                if let Some(child) = self.child_of(n) {
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    /// Caches, for every registered edge, the innermost graph containing both endpoints and the
    /// endpoints' ancestors that are direct members of it.
    pub fn calc_lowest_common_ancestors(&mut self) {
        let edges = self.all_edges();
        for &e in edges.iter() {
            let (source, target) = (self.edges[e.0].source, self.edges[e.0].target);

            // (graph, node of the source chain that is a member of that graph), innermost first.
            let mut source_chain: Vec<(GraphId, NodeId)> = Vec::new();
            let mut cur = Some(source);
            while let Some(n) = cur {
                let Some(owner) = self.nodes[n.0].owner else {
                    break;
                };
                source_chain.push((owner, n));
                cur = self.graphs[owner.0].parent;
            }

            let mut found = None;
            let mut cur = Some(target);
            while let Some(n) = cur {
                let Some(owner) = self.nodes[n.0].owner else {
                    break;
                };
                if let Some(&(_, source_in)) = source_chain.iter().find(|(g, _)| *g == owner) {
                    found = Some((owner, source_in, n));
                    break;
                }
                cur = self.graphs[owner.0].parent;
            }

            let edge = &mut self.edges[e.0];
            match found {
                Some((lca, source_in, target_in)) => {
                    edge.lca = Some(lca);
                    edge.source_in_lca = source_in;
                    edge.target_in_lca = target_in;
                }
                None => {
                    edge.lca = None;
                    edge.source_in_lca = source;
                    edge.target_in_lca = target;
                }
            }
        }
    }

    /// True when the nodes are equal or one lies in the other's subtree.
    pub fn is_one_ancestor_of_other(&self, a: NodeId, b: NodeId) -> bool {
        a == b || self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.parent_node(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent_node(p);
        }
        false
    }

    /// Some inter-graph edge connects a node to one of its own ancestors.
    pub fn includes_invalid_edge(&self) -> bool {
        self.inter_graph_edges.iter().any(|&e| {
            let edge = &self.edges[e.0];
            self.is_one_ancestor_of_other(edge.source, edge.target)
        })
    }

    /// Recomputes whether every direct member of `graph` is reachable from the first one.
    ///
    /// Visiting a node visits its whole subtree, and a neighbour outside `graph`'s direct
    /// members is lifted to its ancestor that is one.
    pub fn update_connected(&mut self, graph: GraphId) {
        let members = self.graphs[graph.0].nodes.clone();
        let Some(&first) = members.first() else {
            self.graphs[graph.0].connected = true;
            return;
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut queue: std::collections::VecDeque<NodeId> = self.with_children(first).into();
        for &n in &queue {
            visited[n.0] = true;
        }
        while let Some(cur) = queue.pop_front() {
            for &e in &self.nodes[cur.0].edges {
                let Some(other) = self.other_end_in_graph(e, cur, graph) else {
                    continue;
                };
                if visited[other.0] {
                    continue;
                }
                for n in self.with_children(other) {
                    if !visited[n.0] {
                        visited[n.0] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        self.graphs[graph.0].connected = members.iter().all(|n| visited[n.0]);
    }

    /// Recomputes every compound rectangle from its children, innermost first.
    ///
    /// A non-empty graph's bounds are its members' bounding box grown by the graph margin and the
    /// parent compound takes those bounds. An empty child graph takes its parent's rectangle.
    pub fn update_bounds(&mut self) {
        for g in self.graphs_bottom_up() {
            let graph = &self.graphs[g.0];
            let content = bounds_of(graph.nodes.iter().map(|n| &self.nodes[n.0].rect));
            let parent = graph.parent;
            let margin = graph.margin;

            let bounds = match (content, parent) {
                (Some(r), _) => RectD::new(
                    r.x - margin,
                    r.y - margin,
                    r.width + 2.0 * margin,
                    r.height + 2.0 * margin,
                ),
                (None, Some(p)) => self.nodes[p.0].rect,
                (None, None) => RectD::default(),
            };
            let graph = &mut self.graphs[g.0];
            graph.left = bounds.x;
            graph.top = bounds.y;
            graph.right = bounds.right();
            graph.bottom = bounds.bottom();

            if let (Some(_), Some(p)) = (content, parent) {
                self.nodes[p.0].rect = bounds;
            }
        }
    }

    /// Estimated sizes bottom-up; compound rectangles are resized to their estimate.
    ///
    /// Returns the root graph's estimate.
    pub fn calc_estimated_size(&mut self) -> f64 {
        for g in self.graphs_bottom_up() {
            let mut total = 0.0;
            for i in 0..self.graphs[g.0].nodes.len() {
                let n = self.graphs[g.0].nodes[i];
                let size = match self.child_of(n) {
                    Some(child) => {
                        let s = self.graphs[child.0].estimated_size;
                        let rect = &mut self.nodes[n.0].rect;
                        rect.width = s;
                        rect.height = s;
                        s
                    }
                    None => {
                        let r = self.nodes[n.0].rect;
                        (r.width + r.height) / 2.0
                    }
                };
                self.nodes[n.0].estimated_size = size;
                total += size;
            }
            let count = self.graphs[g.0].nodes.len();
            self.graphs[g.0].estimated_size = if total == 0.0 {
                EMPTY_COMPOUND_NODE_SIZE
            } else {
                total / (count as f64).sqrt()
            };
        }
        self.graphs[self.root().0].estimated_size
    }

    /// Leaf-descendant counts; leaves and empty compounds count as one.
    pub fn calc_leaf_counts(&mut self) {
        for g in self.graphs_bottom_up() {
            for i in 0..self.graphs[g.0].nodes.len() {
                let n = self.graphs[g.0].nodes[i];
                let count = match self.child_of(n) {
                    Some(child) if !self.graphs[child.0].nodes.is_empty() => self.graphs
                        [child.0]
                        .nodes
                        .iter()
                        .map(|c| self.nodes[c.0].leaf_count)
                        .sum(),
                    _ => 1.0,
                };
                self.nodes[n.0].leaf_count = count;
            }
        }
    }
}
