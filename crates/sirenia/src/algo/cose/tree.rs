//! Pendant-tree pruning before the simulation and batch-wise regrowth afterwards.

use super::grid::RepulsionGrid;
use crate::error::Result;
use crate::model::{EdgeId, GraphId, GraphManager, NodeId};
use crate::rng::XorShift64Star;

/// A node removed by tree reduction, with the edge and graph needed to put it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrunedNode {
    pub(crate) node: NodeId,
    pub(crate) edge: EdgeId,
    pub(crate) owner: GraphId,
}

/// Repeatedly removes non-compound nodes hanging on a single intra-graph edge.
///
/// Returns one batch per pass, outermost leaves first. Within a pass a node is only removed if it
/// still has exactly one edge, so the far end of an isolated edge survives.
pub(crate) fn reduce_trees(gm: &mut GraphManager) -> Result<Vec<Vec<PrunedNode>>> {
    let mut batches: Vec<Vec<PrunedNode>> = Vec::new();
    loop {
        let nodes = gm.all_nodes();
        let candidates: Vec<PrunedNode> = nodes
            .iter()
            .filter_map(|&n| {
                let node = gm.node(n);
                let [e] = node.edges() else {
                    return None;
                };
                if gm.edge(*e).is_inter_graph() || node.child().is_some() {
                    return None;
                }
                Some(PrunedNode {
                    node: n,
                    edge: *e,
                    owner: node.owner()?,
                })
            })
            .collect();
        if candidates.is_empty() {
            break;
        }

        let mut batch: Vec<PrunedNode> = Vec::new();
        for p in candidates {
            if gm.degree(p.node) == 1 {
                gm.remove_node(p.node)?;
                batch.push(p);
            }
        }
        batches.push(batch);
    }
    Ok(batches)
}

/// Puts the most recently pruned batch back, each node next to its neighbour on the least
/// crowded side. Returns `false` when there was nothing left to grow.
pub(crate) fn grow_tree(
    gm: &mut GraphManager,
    batches: &mut Vec<Vec<PrunedNode>>,
    grid: Option<&RepulsionGrid>,
    ideal_edge_length: f64,
    rng: &mut XorShift64Star,
) -> Result<bool> {
    let Some(batch) = batches.pop() else {
        return Ok(false);
    };
    for p in batch {
        find_place_for_pruned_node(gm, p, grid, ideal_edge_length, rng);
        gm.add_node(p.owner, p.node)?;
        gm.attach_edge(p.edge)?;
    }
    Ok(true)
}

/// Node counts in the four grid bands (up, right, down, left) bordering a node's cell span.
pub(crate) fn control_regions(
    gm: &GraphManager,
    anchor: NodeId,
    grid: &RepulsionGrid,
) -> [usize; 4] {
    let span = gm.node(anchor).grid;
    let pair = |outer: (i32, i32), inner: (i32, i32)| -> usize {
        (grid.cell_len(outer.0, outer.1) + grid.cell_len(inner.0, inner.1)).saturating_sub(1)
    };

    let mut regions = [0usize; 4];
    if span.start_y > 0 {
        regions[0] = (span.start_x..=span.finish_x)
            .map(|x| pair((x, span.start_y - 1), (x, span.start_y)))
            .sum();
    }
    if span.finish_x < grid.size_x() - 1 {
        regions[1] = (span.start_y..=span.finish_y)
            .map(|y| pair((span.finish_x + 1, y), (span.finish_x, y)))
            .sum();
    }
    if span.finish_y < grid.size_y() - 1 {
        regions[2] = (span.start_x..=span.finish_x)
            .map(|x| pair((x, span.finish_y + 1), (x, span.finish_y)))
            .sum();
    }
    if span.start_x > 0 {
        regions[3] = (span.start_y..=span.finish_y)
            .map(|y| pair((span.start_x - 1, y), (span.start_x, y)))
            .sum();
    }
    regions
}

fn find_place_for_pruned_node(
    gm: &mut GraphManager,
    p: PrunedNode,
    grid: Option<&RepulsionGrid>,
    ideal_edge_length: f64,
    rng: &mut XorShift64Star,
) {
    let Some(anchor) = gm.edge(p.edge).other_end(p.node) else {
        return;
    };
    let regions = grid.map_or([0; 4], |g| control_regions(gm, anchor, g));
    let min = regions.iter().copied().min().unwrap_or(0);
    let tied: Vec<usize> = (0..4).filter(|&i| regions[i] == min).collect();
    let side = if tied.len() > 1 {
        tied[rng.next_usize(tied.len())]
    } else {
        tied.first().copied().unwrap_or(0)
    };

    let a = gm.node(anchor).rect;
    let r = gm.node(p.node).rect;
    let (cx, cy) = match side {
        0 => (
            a.center_x(),
            a.center_y() - a.half_h() - ideal_edge_length - r.half_h(),
        ),
        1 => (
            a.center_x() + a.half_w() + ideal_edge_length + r.half_w(),
            a.center_y(),
        ),
        2 => (
            a.center_x(),
            a.center_y() + a.half_h() + ideal_edge_length + r.half_h(),
        ),
        _ => (
            a.center_x() - a.half_w() - ideal_edge_length - r.half_w(),
            a.center_y(),
        ),
    };
    gm.node_mut(p.node).rect.set_center(cx, cy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::RectD;

    fn leaf(gm: &mut GraphManager, g: GraphId, id: &str) -> NodeId {
        let n = gm.new_node(id, RectD::new(0.0, 0.0, 10.0, 10.0));
        gm.add_node(g, n).expect("add node");
        n
    }

    // Triangle a-b-c with a tail c-d-e and a pendant f on a.
    fn triangle_with_tails() -> (GraphManager, Vec<NodeId>) {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let ids = ["a", "b", "c", "d", "e", "f"];
        let n: Vec<NodeId> = ids.iter().map(|id| leaf(&mut gm, root, id)).collect();
        for (i, (s, t)) in [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (0, 5)]
            .into_iter()
            .enumerate()
        {
            gm.add_edge(format!("e{i}"), n[s], n[t]).expect("edge");
        }
        (gm, n)
    }

    #[test]
    fn reduction_prunes_tails_in_layers() {
        let (mut gm, n) = triangle_with_tails();
        let batches = reduce_trees(&mut gm).expect("reduce");
        assert_eq!(batches.len(), 2);
        let first: Vec<NodeId> = batches[0].iter().map(|p| p.node).collect();
        assert_eq!(first, vec![n[4], n[5]]);
        let second: Vec<NodeId> = batches[1].iter().map(|p| p.node).collect();
        assert_eq!(second, vec![n[3]]);
        assert_eq!(gm.all_nodes().as_ref(), &n[..3]);
        assert_eq!(gm.all_edges().len(), 3);
    }

    #[test]
    fn lone_edge_keeps_one_endpoint() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = leaf(&mut gm, root, "a");
        let b = leaf(&mut gm, root, "b");
        gm.add_edge("ab", a, b).expect("edge");
        let batches = reduce_trees(&mut gm).expect("reduce");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].node, a);
        assert_eq!(gm.all_nodes().as_ref(), &[b]);
    }

    #[test]
    fn inter_graph_and_compound_nodes_are_kept() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = leaf(&mut gm, root, "a");
        let c = leaf(&mut gm, root, "c");
        let g = gm.add_child_graph(c).expect("child");
        let x = leaf(&mut gm, g, "x");
        gm.add_edge("ax", a, x).expect("edge");
        let batches = reduce_trees(&mut gm).expect("reduce");
        assert!(batches.is_empty());
    }

    fn sorted<T: Ord + Copy>(items: &[T]) -> Vec<T> {
        let mut v = items.to_vec();
        v.sort();
        v
    }

    #[test]
    fn regrowth_restores_structure() {
        let (mut gm, n) = triangle_with_tails();
        let root = gm.root();
        let nodes_before = sorted(&gm.all_nodes());
        let edges_before = sorted(&gm.all_edges());
        let root_edges_before = sorted(gm.graph(root).edges());
        let mut batches = reduce_trees(&mut gm).expect("reduce");
        let mut rng = XorShift64Star::new(9);
        while grow_tree(&mut gm, &mut batches, None, 50.0, &mut rng).expect("grow") {}

        assert!(batches.is_empty());
        assert_eq!(sorted(&gm.all_nodes()), nodes_before);
        assert_eq!(sorted(&gm.all_edges()), edges_before);
        assert_eq!(sorted(gm.graph(root).edges()), root_edges_before);
        assert!(gm.inter_graph_edges().is_empty());
        assert_eq!(gm.degree(n[2]), 3);
        assert_eq!(gm.degree(n[4]), 1);

        // e sits one ideal length (plus half sizes) from d on some side.
        let d = gm.node(n[3]).rect;
        let e = gm.node(n[4]).rect;
        let gap = (d.center_x() - e.center_x()).abs() + (d.center_y() - e.center_y()).abs();
        assert!((gap - 60.0).abs() < 1e-9, "gap={gap}");
    }

    #[test]
    fn regrowth_prefers_the_empty_side() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let hub = gm.new_node("hub", RectD::new(500.0, 500.0, 10.0, 10.0));
        gm.add_node(root, hub).expect("hub");
        // Crowd everything but the right side.
        for (i, (x, y)) in [(500.0, 380.0), (500.0, 620.0), (380.0, 500.0)]
            .into_iter()
            .enumerate()
        {
            let other = gm.new_node(format!("o{i}"), RectD::new(x, y, 10.0, 10.0));
            gm.add_node(root, other).expect("other");
            gm.add_edge(format!("h{i}"), hub, other).expect("edge");
        }
        let extra = gm.new_node("far", RectD::new(900.0, 900.0, 10.0, 10.0));
        gm.add_node(root, extra).expect("far");
        let pendant = gm.new_node("p", RectD::new(0.0, 0.0, 10.0, 10.0));
        gm.add_node(root, pendant).expect("pendant");
        let e = gm.add_edge("hp", hub, pendant).expect("edge");
        gm.remove_node(pendant).expect("prune");

        gm.update_bounds();
        let grid = RepulsionGrid::build(&mut gm, 100.0).expect("grid");
        let regions = control_regions(&gm, hub, &grid);
        assert_eq!(regions[1], 0);
        assert!(regions[0] > 0 && regions[2] > 0 && regions[3] > 0);

        let mut batches = vec![vec![PrunedNode {
            node: pendant,
            edge: e,
            owner: root,
        }]];
        let mut rng = XorShift64Star::new(1);
        grow_tree(&mut gm, &mut batches, Some(&grid), 50.0, &mut rng).expect("grow");
        let p = gm.node(pendant).rect;
        assert_eq!(p.center_x(), 505.0 + 5.0 + 50.0 + 5.0);
        assert_eq!(p.center_y(), 505.0);
    }
}
