//! Spring-electrical forces with compound-aware gravity (layout-base `FDLayout` / cose-base
//! `CoSELayout`).

use super::base::{Cooling, GRID_CALCULATION_CHECK_PERIOD, Params};
use super::grid::RepulsionGrid;
use crate::geom::{calc_separation_amount, clip_points, sign};
use crate::model::{EdgeId, GraphManager, NodeId, SIMPLE_NODE_SIZE};

/// Ideal length of every registered edge. Inter-graph edges grow with the nesting levels they
/// cross and, with smart lengths, with the size of the subtrees they connect.
pub(crate) fn calc_ideal_edge_lengths(gm: &mut GraphManager, params: &Params) {
    let edges = gm.all_edges();
    for &e in edges.iter() {
        let edge = gm.edge(e);
        let mut ideal = params.ideal_edge_length;
        if edge.is_inter_graph() {
            if params.smart_ideal_edge_length {
                let size_source = gm.node(edge.source_in_lca()).estimated_size();
                let size_target = gm.node(edge.target_in_lca()).estimated_size();
                ideal += size_source + size_target - 2.0 * SIMPLE_NODE_SIZE;
            }
            let lca_depth = edge.lca().map_or(1, |g| gm.graph_depth(g)) as f64;
            let source_depth = gm.node(edge.source()).inclusion_tree_depth() as f64;
            let target_depth = gm.node(edge.target()).inclusion_tree_depth() as f64;
            ideal += params.ideal_edge_length
                * params.nesting_factor
                * (source_depth + target_depth - 2.0 * lca_depth);
        }
        gm.edge_mut(e).ideal_length = ideal;
    }
}

fn snap_unit(v: f64) -> f64 {
    if v.abs() < 1.0 { sign(v) } else { v }
}

/// Measures the edge: centre distance for two uniform leaves, clip-point distance otherwise.
/// Returns `false` (and flags the edge) when the endpoints overlap.
fn update_edge_length(gm: &mut GraphManager, e: EdgeId, params: &Params) -> bool {
    let (source, target) = (gm.edge(e).source(), gm.edge(e).target());
    let s = gm.node(source).rect;
    let t = gm.node(target).rect;
    let simple =
        params.uniform_leaf_node_sizes && !gm.is_compound(source) && !gm.is_compound(target);

    let (lx, ly) = if simple {
        (t.center_x() - s.center_x(), t.center_y() - s.center_y())
    } else {
        match clip_points(&t, &s) {
            Some([tx, ty, sx, sy]) => (tx - sx, ty - sy),
            None => {
                gm.edge_mut(e).overlapping = true;
                return false;
            }
        }
    };
    let lx = snap_unit(lx);
    let ly = snap_unit(ly);
    let edge = gm.edge_mut(e);
    edge.overlapping = false;
    edge.length_x = lx;
    edge.length_y = ly;
    edge.length = (lx * lx + ly * ly).sqrt();
    true
}

pub(crate) fn calc_spring_force(gm: &mut GraphManager, e: EdgeId, params: &Params) {
    if !update_edge_length(gm, e, params) {
        return;
    }
    let edge = gm.edge(e);
    let length = edge.length;
    if length == 0.0 {
        return;
    }
    let force = params.spring_constant * (length - edge.ideal_length);
    let fx = force * (edge.length_x / length);
    let fy = force * (edge.length_y / length);
    let (source, target) = (edge.source(), edge.target());

    let s = gm.node_mut(source);
    s.spring_fx += fx;
    s.spring_fy += fy;
    let t = gm.node_mut(target);
    t.spring_fx -= fx;
    t.spring_fy -= fy;
}

pub(crate) fn calc_spring_forces(gm: &mut GraphManager, params: &Params) {
    let edges = gm.all_edges();
    for &e in edges.iter() {
        calc_spring_force(gm, e, params);
    }
}

/// Repulsion between two nodes of the same graph, weighted by their leaf-descendant counts.
pub(crate) fn calc_repulsion_force(gm: &mut GraphManager, a: NodeId, b: NodeId, params: &Params) {
    let ra = gm.node(a).rect;
    let rb = gm.node(b).rect;
    let ma = gm.node(a).leaf_count();
    let mb = gm.node(b).leaf_count();

    let (fx, fy) = if ra.intersects(&rb) {
        let (ox, oy) = calc_separation_amount(&ra, &rb, params.separation_buffer);
        let children_constant = ma * mb / (ma + mb);
        (
            children_constant * 2.0 * ox,
            children_constant * 2.0 * oy,
        )
    } else {
        let simple = params.uniform_leaf_node_sizes && !gm.is_compound(a) && !gm.is_compound(b);
        let (mut dx, mut dy) = if simple {
            (rb.center_x() - ra.center_x(), rb.center_y() - ra.center_y())
        } else {
            match clip_points(&ra, &rb) {
                Some([ax, ay, bx, by]) => (bx - ax, by - ay),
                None => return,
            }
        };
        if dx.abs() < params.min_repulsion_dist {
            dx = sign(dx) * params.min_repulsion_dist;
        }
        if dy.abs() < params.min_repulsion_dist {
            dy = sign(dy) * params.min_repulsion_dist;
        }
        let dist_sq = dx * dx + dy * dy;
        let dist = dist_sq.sqrt();
        if dist_sq == 0.0 || !dist.is_finite() {
            return;
        }
        let force = params.repulsion_constant * ma * mb / dist_sq;
        (force * dx / dist, force * dy / dist)
    };

    let na = gm.node_mut(a);
    na.repulsion_fx -= fx;
    na.repulsion_fy -= fy;
    let nb = gm.node_mut(b);
    nb.repulsion_fx += fx;
    nb.repulsion_fy += fy;
}

/// Grid state carried between ticks by the repulsion pass.
#[derive(Debug, Default)]
pub(crate) struct RepulsionState {
    pub(crate) grid: Option<RepulsionGrid>,
}

impl RepulsionState {
    /// Rebuilds the grid from the current root bounds.
    pub(crate) fn update_grid(&mut self, gm: &mut GraphManager, params: &Params) {
        self.grid = RepulsionGrid::build(gm, params.repulsion_range);
    }

    /// One repulsion pass. In grid mode the grid is rebuilt every
    /// [`GRID_CALCULATION_CHECK_PERIOD`] ticks when allowed, and surrounding sets are refreshed on
    /// the same cadence or when `force_surrounding_update` is set.
    pub(crate) fn calc_repulsion_forces(
        &mut self,
        gm: &mut GraphManager,
        params: &Params,
        total_iterations: usize,
        grid_update_allowed: bool,
        force_surrounding_update: bool,
    ) {
        let nodes = gm.all_nodes();
        if !params.grid_repulsion {
            for (i, &a) in nodes.iter().enumerate() {
                for &b in &nodes[i + 1..] {
                    if gm.node(a).owner() != gm.node(b).owner() {
                        continue;
                    }
                    calc_repulsion_force(gm, a, b, params);
                }
            }
            return;
        }

        let periodic =
            total_iterations % GRID_CALCULATION_CHECK_PERIOD == 1 && grid_update_allowed;
        if periodic || self.grid.is_none() {
            self.update_grid(gm, params);
        }
        let refresh = periodic || force_surrounding_update;

        let mut processed = vec![false; gm.node_count()];
        for &a in nodes.iter() {
            if refresh {
                match &self.grid {
                    Some(grid) => grid.refresh_node_surrounding(gm, a, &processed),
                    None => gm.node_mut(a).surrounding.clear(),
                }
            }
            let surrounding = std::mem::take(&mut gm.node_mut(a).surrounding);
            for &b in &surrounding {
                calc_repulsion_force(gm, a, b, params);
            }
            gm.node_mut(a).surrounding = surrounding;
            processed[a.index()] = true;
        }
    }
}

/// Members of every graph that is not connected: the only nodes gravity pulls on.
pub(crate) fn nodes_to_apply_gravitation(gm: &mut GraphManager) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::new();
    for g in gm.graphs().to_vec() {
        gm.update_connected(g);
        if !gm.graph(g).is_connected() {
            out.extend(gm.graph(g).nodes().iter().copied());
        }
    }
    out
}

/// Marks exactly `nodes` as subject to gravity.
pub(crate) fn set_nodes_to_apply_gravitation(gm: &mut GraphManager, nodes: &[NodeId]) {
    for i in 0..gm.node_count() {
        gm.node_mut(NodeId(i)).apply_gravity = false;
    }
    for &n in nodes {
        gm.node_mut(n).apply_gravity = true;
    }
}

/// Pulls flagged nodes toward their owner's centre once they stray past the owner's estimated
/// size times the range factor (root and compound members use separate constants).
pub(crate) fn calc_gravitational_forces(gm: &mut GraphManager, params: &Params) {
    let root = gm.root();
    let nodes = gm.all_nodes();
    for &n in nodes.iter() {
        let node = gm.node(n);
        if !node.apply_gravity {
            continue;
        }
        let Some(owner) = node.owner() else {
            continue;
        };
        let graph = gm.graph(owner);
        let (cx, cy) = graph.center();
        let r = node.rect;
        let dx = r.center_x() - cx;
        let dy = r.center_y() - cy;
        let abs_dx = dx.abs() + r.half_w();
        let abs_dy = dy.abs() + r.half_h();

        let (range_factor, constant) = if owner == root {
            (params.gravity_range_factor, params.gravity_constant)
        } else {
            (
                params.compound_gravity_range_factor,
                params.gravity_constant * params.compound_gravity_constant,
            )
        };
        let estimated = graph.estimated_size() * range_factor;
        if abs_dx > estimated || abs_dy > estimated {
            let node = gm.node_mut(n);
            node.gravitation_fx = -constant * dx;
            node.gravitation_fy = -constant * dy;
        }
    }
}

fn clamp_displacement(d: f64, max: f64) -> f64 {
    if d.abs() > max { max * sign(d) } else { d }
}

/// Applies one displacement step to every node and returns the summed absolute displacement.
///
/// Leaves and empty compounds move themselves; a non-empty compound hands its displacement down
/// to every descendant leaf.
pub(crate) fn move_nodes(gm: &mut GraphManager, cooling: &Cooling) -> f64 {
    let max = cooling.max_displacement();
    let nodes = gm.all_nodes();
    let mut total = 0.0;
    for &n in nodes.iter() {
        let node = gm.node(n);
        let mass = node.leaf_count().max(1.0);
        let mut dx = cooling.factor * (node.spring_fx + node.repulsion_fx + node.gravitation_fx)
            / mass;
        let mut dy = cooling.factor * (node.spring_fy + node.repulsion_fy + node.gravitation_fy)
            / mass;
        if !dx.is_finite() {
            dx = 0.0;
        }
        if !dy.is_finite() {
            dy = 0.0;
        }
        dx = clamp_displacement(dx, max);
        dy = clamp_displacement(dy, max);

        if gm.has_children(n) {
            propagate_displacement_to_children(gm, n, dx, dy);
        } else {
            gm.node_mut(n).rect.move_by(dx, dy);
        }
        total += dx.abs() + dy.abs();
        gm.node_mut(n).reset_forces();
    }
    total
}

fn propagate_displacement_to_children(gm: &mut GraphManager, node: NodeId, dx: f64, dy: f64) {
    let mut stack = vec![node];
    while let Some(cur) = stack.pop() {
        let Some(child) = gm.child_of(cur) else {
            continue;
        };
        let members = gm.graph(child).nodes().to_vec();
        for c in members {
            if gm.has_children(c) {
                stack.push(c);
            } else {
                gm.node_mut(c).rect.move_by(dx, dy);
            }
        }
    }
}

/// Displacement bookkeeping for the periodic convergence test.
#[derive(Debug, Clone)]
pub(crate) struct ConvergenceMonitor {
    pub(crate) total_displacement: f64,
    old_total_displacement: f64,
    threshold: f64,
    max_iterations: usize,
}

impl ConvergenceMonitor {
    pub(crate) fn new(params: &Params, node_count: usize, max_iterations: usize) -> Self {
        let per_node = 3.0 * params.ideal_edge_length / 100.0;
        Self {
            total_displacement: 0.0,
            old_total_displacement: 0.0,
            threshold: per_node * node_count as f64,
            max_iterations,
        }
    }

    /// Converged when the last tick moved less than the threshold, or when past a third of the
    /// budget the total displacement stopped changing.
    pub(crate) fn is_converged(&mut self, total_iterations: usize) -> bool {
        let oscillating = total_iterations > self.max_iterations / 3
            && (self.total_displacement - self.old_total_displacement).abs() < 2.0;
        let converged = self.total_displacement < self.threshold;
        self.old_total_displacement = self.total_displacement;
        converged || oscillating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::CoseOptions;
    use crate::geom::RectD;
    use crate::model::GraphId;

    fn params() -> Params {
        Params::from_options(&CoseOptions::default())
    }

    fn node(gm: &mut GraphManager, g: GraphId, id: &str, x: f64, y: f64) -> NodeId {
        let n = gm.new_node(id, RectD::new(x, y, 20.0, 20.0));
        gm.add_node(g, n).expect("add node");
        n
    }

    #[test]
    fn spring_pulls_stretched_edge_together() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let b = node(&mut gm, root, "b", 200.0, 0.0);
        let e = gm.add_edge("e", a, b).expect("edge");
        let p = params();
        calc_ideal_edge_lengths(&mut gm, &p);
        assert_eq!(gm.edge(e).ideal_length, 50.0);

        calc_spring_force(&mut gm, e, &p);
        // Clip distance 180, force 0.45 * 130 toward each other.
        assert!((gm.node(a).spring_fx - 58.5).abs() < 1e-9);
        assert!((gm.node(b).spring_fx + 58.5).abs() < 1e-9);
        assert_eq!(gm.node(a).spring_fy, 0.0);
    }

    #[test]
    fn overlapping_endpoints_skip_the_spring() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let b = node(&mut gm, root, "b", 5.0, 5.0);
        let e = gm.add_edge("e", a, b).expect("edge");
        calc_spring_force(&mut gm, e, &params());
        assert!(gm.edge(e).is_overlapping());
        assert_eq!(gm.node(a).spring_fx, 0.0);
    }

    #[test]
    fn repulsion_is_symmetric_and_floored() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let b = node(&mut gm, root, "b", 100.0, 0.0);
        let p = params();
        calc_repulsion_force(&mut gm, a, b, &p);
        let (ax, ay) = (gm.node(a).repulsion_fx, gm.node(a).repulsion_fy);
        let (bx, by) = (gm.node(b).repulsion_fx, gm.node(b).repulsion_fy);
        assert!(ax < 0.0 && bx > 0.0);
        assert_eq!(ax, -bx);
        assert_eq!(ay, -by);
        // Same centre line: dy is 0 and stays 0 after the floor.
        assert_eq!(ay, 0.0);
        // dx = 80: 4500 / 6400.
        assert!((bx - 4500.0 / 6400.0).abs() < 1e-12);
    }

    #[test]
    fn overlapping_nodes_are_pushed_apart() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let b = node(&mut gm, root, "b", 10.0, 0.0);
        calc_repulsion_force(&mut gm, a, b, &params());
        assert!(gm.node(a).repulsion_fx < 0.0);
        assert!(gm.node(b).repulsion_fx > 0.0);
    }

    #[test]
    fn nested_inter_graph_edges_are_longer() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let c = node(&mut gm, root, "c", 100.0, 0.0);
        let g = gm.add_child_graph(c).expect("child");
        let x = node(&mut gm, g, "x", 100.0, 0.0);
        let e = gm.add_edge("ax", a, x).expect("edge");
        gm.calc_lowest_common_ancestors();
        gm.calc_inclusion_tree_depths();
        gm.calc_estimated_size();

        let mut p = params();
        p.smart_ideal_edge_length = false;
        calc_ideal_edge_lengths(&mut gm, &p);
        // Depths 1 and 2, LCA depth 1: one level crossed.
        assert!((gm.edge(e).ideal_length - (50.0 + 50.0 * 0.1)).abs() < 1e-12);

        p.smart_ideal_edge_length = true;
        calc_ideal_edge_lengths(&mut gm, &p);
        // a and c both estimate to 20.
        let expected = 50.0 + 20.0 + 20.0 - 80.0 + 5.0;
        assert!((gm.edge(e).ideal_length - expected).abs() < 1e-12);
    }

    #[test]
    fn gravity_only_pulls_far_flagged_nodes() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = node(&mut gm, root, "a", 0.0, 0.0);
        let b = node(&mut gm, root, "b", 1000.0, 0.0);
        gm.update_bounds();
        gm.calc_estimated_size();
        let flagged = nodes_to_apply_gravitation(&mut gm);
        assert_eq!(flagged, vec![a, b]);
        set_nodes_to_apply_gravitation(&mut gm, &flagged);

        calc_gravitational_forces(&mut gm, &params());
        // Owner estimate 40/sqrt(2) * 3.8 ~ 107; both nodes are ~500 away from the centre.
        assert!(gm.node(a).gravitation_fx > 0.0);
        assert!(gm.node(b).gravitation_fx < 0.0);

        gm.add_edge("ab", a, b).expect("edge");
        assert!(nodes_to_apply_gravitation(&mut gm).is_empty());
    }

    #[test]
    fn displacement_is_capped_and_propagated() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let c = node(&mut gm, root, "c", 0.0, 0.0);
        let g = gm.add_child_graph(c).expect("child");
        let x = node(&mut gm, g, "x", 0.0, 0.0);
        let y = node(&mut gm, g, "y", 50.0, 0.0);
        gm.calc_leaf_counts();

        gm.node_mut(c).spring_fx = 1.0e6;
        let cooling = Cooling::new(false, crate::algo::Quality::Default, 3, 2500);
        let total = move_nodes(&mut gm, &cooling);
        // Compound moves are capped at 300 and shared by both leaves.
        assert_eq!(gm.node(x).rect.x, 300.0);
        assert_eq!(gm.node(y).rect.x, 350.0);
        assert_eq!(total, 300.0);
        assert_eq!(gm.node(c).spring_fx, 0.0);
    }

    #[test]
    fn convergence_detects_small_and_stalled_motion() {
        let p = params();
        let mut m = ConvergenceMonitor::new(&p, 10, 3000);
        m.total_displacement = 14.0;
        assert!(m.is_converged(100));
        m.total_displacement = 500.0;
        assert!(!m.is_converged(200));
        m.total_displacement = 501.0;
        assert!(!m.is_converged(300));
        assert!(m.is_converged(1100));
    }
}
