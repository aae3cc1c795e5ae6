//! Layout-engine base: derived parameters, cooling schedule, scatter, flat-forest detection and
//! the final world transform.

use crate::algo::{CoseOptions, Quality};
use crate::geom::{RectD, Transform};
use crate::model::{GraphManager, NodeId};
use crate::rng::XorShift64Star;
use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) const DEFAULT_EDGE_LENGTH: f64 = 50.0; // layout-base `FDLayoutConstants.DEFAULT_EDGE_LENGTH`
pub(crate) const WORLD_BOUNDARY: f64 = 1_000_000.0; // layout-base `LayoutConstants.WORLD_BOUNDARY`
pub(crate) const INITIAL_WORLD_BOUNDARY: f64 = 1000.0;
pub(crate) const WORLD_CENTER_X: f64 = 1200.0;
pub(crate) const WORLD_CENTER_Y: f64 = 900.0;

pub(crate) const CONVERGENCE_CHECK_PERIOD: usize = 100;
pub(crate) const GRID_CALCULATION_CHECK_PERIOD: usize = 10;

const DEFAULT_COOLING_FACTOR: f64 = 1.0;
pub(crate) const DEFAULT_COOLING_FACTOR_INCREMENTAL: f64 = 0.3; // layout-base `FDLayoutConstants.DEFAULT_COOLING_FACTOR_INCREMENTAL`
const COOLING_ADAPTATION_FACTOR: f64 = 0.33;
const ADAPTATION_LOWER_NODE_LIMIT: f64 = 1000.0;
const ADAPTATION_UPPER_NODE_LIMIT: f64 = 5000.0;
const MAX_NODE_DISPLACEMENT: f64 = 300.0;
const MAX_NODE_DISPLACEMENT_INCREMENTAL: f64 = 100.0; // layout-base `FDLayoutConstants.MAX_NODE_DISPLACEMENT_INCREMENTAL`
pub(crate) const FINAL_TEMPERATURE: f64 = 0.04; // cose-base `CoSELayout.initSpringEmbedder()`

/// Option values resolved into the constants the simulation reads every tick.
#[derive(Debug, Clone)]
pub(crate) struct Params {
    pub(crate) quality: Quality,
    pub(crate) incremental: bool,
    pub(crate) uniform_leaf_node_sizes: bool,
    pub(crate) ideal_edge_length: f64,
    pub(crate) spring_constant: f64,
    pub(crate) repulsion_constant: f64,
    pub(crate) gravity_constant: f64,
    pub(crate) gravity_range_factor: f64,
    pub(crate) compound_gravity_constant: f64,
    pub(crate) compound_gravity_range_factor: f64,
    pub(crate) nesting_factor: f64,
    pub(crate) smart_ideal_edge_length: bool,
    pub(crate) grid_repulsion: bool,
    pub(crate) num_iter: usize,
    pub(crate) min_repulsion_dist: f64,
    pub(crate) separation_buffer: f64,
    /// `2 * (level + 1) * ideal`; the coarsening level is always 0 here.
    pub(crate) repulsion_range: f64,
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

impl Params {
    pub(crate) fn from_options(opts: &CoseOptions) -> Self {
        let ideal = Some(opts.ideal_edge_length)
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_EDGE_LENGTH);
        let level = 0.0;
        Self {
            quality: opts.quality,
            incremental: opts.incremental,
            uniform_leaf_node_sizes: opts.uniform_node_dimensions,
            ideal_edge_length: ideal,
            spring_constant: finite_or(opts.edge_elasticity, 0.45),
            repulsion_constant: finite_or(opts.node_repulsion, 4500.0),
            gravity_constant: finite_or(opts.gravity, 0.25),
            gravity_range_factor: finite_or(opts.gravity_range, 3.8),
            compound_gravity_constant: finite_or(opts.gravity_compound, 1.0),
            compound_gravity_range_factor: finite_or(opts.gravity_range_compound, 1.5),
            nesting_factor: finite_or(opts.nesting_factor, 0.1),
            smart_ideal_edge_length: opts.smart_ideal_edge_length,
            grid_repulsion: opts.grid_repulsion,
            num_iter: opts.num_iter,
            min_repulsion_dist: ideal / 10.0,
            separation_buffer: ideal / 2.0,
            repulsion_range: 2.0 * (level + 1.0) * ideal,
        }
    }
}

/// Cooling schedule: the factor scaling every displacement, lowered once per convergence period.
#[derive(Debug, Clone)]
pub(crate) struct Cooling {
    pub(crate) factor: f64,
    initial: f64,
    cycle: f64,
    max_cycle: f64,
    max_node_displacement: f64,
    quality: Quality,
}

impl Cooling {
    pub(crate) fn new(
        incremental: bool,
        quality: Quality,
        node_count: usize,
        max_iterations: usize,
    ) -> Self {
        let s = node_count as f64;
        let over_limit = s > ADAPTATION_LOWER_NODE_LIMIT;
        let ramp = (s - ADAPTATION_LOWER_NODE_LIMIT)
            / (ADAPTATION_UPPER_NODE_LIMIT - ADAPTATION_LOWER_NODE_LIMIT);

        let (initial, factor, max_node_displacement) = if incremental {
            let base = DEFAULT_COOLING_FACTOR_INCREMENTAL;
            let factor = if over_limit {
                (base * COOLING_ADAPTATION_FACTOR)
                    .max(base - ramp * base * (1.0 - COOLING_ADAPTATION_FACTOR))
            } else {
                base
            };
            (base, factor, MAX_NODE_DISPLACEMENT_INCREMENTAL)
        } else {
            let factor = if over_limit {
                COOLING_ADAPTATION_FACTOR.max(1.0 - ramp * (1.0 - COOLING_ADAPTATION_FACTOR))
            } else {
                DEFAULT_COOLING_FACTOR
            };
            (DEFAULT_COOLING_FACTOR, factor, MAX_NODE_DISPLACEMENT)
        };

        Self {
            factor,
            initial,
            cycle: 0.0,
            max_cycle: (max_iterations as f64) / (CONVERGENCE_CHECK_PERIOD as f64),
            max_node_displacement,
            quality,
        }
    }

    /// Advances one convergence period and recomputes the factor.
    pub(crate) fn next_cycle(&mut self) {
        self.cycle += 1.0;
        let adjuster = match self.quality {
            Quality::Draft => self.cycle,
            Quality::Default => self.cycle / 3.0,
            Quality::Proof => 1.0,
        };
        let numerator = (100.0 * (self.initial - FINAL_TEMPERATURE)).ln();
        let denominator = self.max_cycle.ln().max(1e-9);
        let schedule = self.cycle.powf(numerator / denominator) / 100.0 * adjuster;
        self.factor = (self.initial - schedule).max(FINAL_TEMPERATURE);
    }

    /// Per-axis displacement cap at the current factor.
    pub(crate) fn max_displacement(&self) -> f64 {
        self.factor * self.max_node_displacement
    }
}

/// Scatters every leaf and empty compound around the world centre, then refreshes compound
/// bounds.
pub(crate) fn position_nodes_randomly(gm: &mut GraphManager, rng: &mut XorShift64Star) {
    let root = gm.root();
    let mut stack: Vec<NodeId> = gm.graph(root).nodes().iter().rev().copied().collect();
    while let Some(n) = stack.pop() {
        if gm.has_children(n) {
            if let Some(child) = gm.child_of(n) {
                stack.extend(gm.graph(child).nodes().iter().rev().copied());
            }
            continue;
        }
        let min = -INITIAL_WORLD_BOUNDARY;
        let max = INITIAL_WORLD_BOUNDARY;
        let x = WORLD_CENTER_X + rng.next_f64_unit() * (max - min) + min;
        let y = WORLD_CENTER_Y + rng.next_f64_unit() * (max - min) + min;
        let rect = &mut gm.node_mut(n).rect;
        rect.x = x;
        rect.y = y;
    }
    gm.update_bounds();
}

/// Trees of the root graph when it is a flat forest, otherwise empty.
///
/// The root must hold no compounds and every component must be acyclic; a self-loop or a second
/// edge between the same pair of nodes counts as a cycle. Each tree lists its nodes in BFS order.
pub(crate) fn get_flat_forest(gm: &GraphManager) -> Vec<Vec<NodeId>> {
    let root_nodes = gm.graph(gm.root()).nodes();
    if root_nodes.iter().any(|&n| gm.node(n).child().is_some()) {
        return Vec::new();
    }

    let mut forest: Vec<Vec<NodeId>> = Vec::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    for &start in root_nodes {
        if seen.contains(&start) {
            continue;
        }
        let mut tree: Vec<NodeId> = Vec::new();
        let mut parent_edge: FxHashMap<NodeId, crate::model::EdgeId> = FxHashMap::default();
        let mut queue = std::collections::VecDeque::from([start]);
        seen.insert(start);
        while let Some(cur) = queue.pop_front() {
            tree.push(cur);
            for &e in gm.node(cur).edges() {
                if parent_edge.get(&cur) == Some(&e) {
                    continue;
                }
                let Some(other) = gm.edge(e).other_end(cur) else {
                    continue;
                };
                if seen.contains(&other) {
                    return Vec::new();
                }
                seen.insert(other);
                parent_edge.insert(other, e);
                queue.push_back(other);
            }
        }
        forest.push(tree);
    }
    forest
}

/// Peels leaf layers until at most two nodes remain; returns the first survivor in `tree` order.
pub(crate) fn find_center_of_tree(gm: &GraphManager, tree: &[NodeId]) -> Option<NodeId> {
    if tree.len() <= 2 {
        return tree.first().copied();
    }
    let members: FxHashSet<NodeId> = tree.iter().copied().collect();
    let neighbours = |n: NodeId| -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for &e in gm.node(n).edges() {
            if let Some(o) = gm.edge(e).other_end(n) {
                if o != n && members.contains(&o) && !out.contains(&o) {
                    out.push(o);
                }
            }
        }
        out
    };

    let mut degree: FxHashMap<NodeId, usize> =
        tree.iter().map(|&n| (n, neighbours(n).len())).collect();
    let mut removed: FxHashSet<NodeId> = FxHashSet::default();
    let mut remaining = tree.len();
    let mut layer: Vec<NodeId> = tree
        .iter()
        .copied()
        .filter(|n| degree.get(n).copied().unwrap_or(0) <= 1)
        .collect();

    while remaining > 2 && !layer.is_empty() {
        let mut next: Vec<NodeId> = Vec::new();
        for &n in &layer {
            removed.insert(n);
            remaining -= 1;
        }
        for &n in &layer {
            for nb in neighbours(n) {
                if removed.contains(&nb) {
                    continue;
                }
                if let Some(d) = degree.get_mut(&nb) {
                    *d = d.saturating_sub(1);
                    if *d == 1 {
                        next.push(nb);
                    }
                }
            }
        }
        layer = next;
    }

    tree.iter().copied().find(|n| !removed.contains(n))
}

/// Top-left corner of the root content minus the root margin.
pub(crate) fn root_left_top(gm: &GraphManager) -> Option<(f64, f64)> {
    let root = gm.graph(gm.root());
    let mut left = f64::INFINITY;
    let mut top = f64::INFINITY;
    for &n in root.nodes() {
        let r = gm.node(n).rect;
        left = left.min(r.x);
        top = top.min(r.y);
    }
    if !(left.is_finite() && top.is_finite()) {
        return None;
    }
    Some((left - root.margin, top - root.margin))
}

/// Moves the whole drawing so the root's left-top corner lands on `origin`.
pub(crate) fn transform_to(gm: &mut GraphManager, origin: (f64, f64)) {
    let Some(left_top) = root_left_top(gm) else {
        return;
    };
    let trans = Transform::translating(left_top, origin);
    let nodes = gm.all_nodes();
    for &n in nodes.iter() {
        let rect = &mut gm.node_mut(n).rect;
        let left = rect.x.clamp(-WORLD_BOUNDARY, WORLD_BOUNDARY);
        let top = rect.y.clamp(-WORLD_BOUNDARY, WORLD_BOUNDARY);
        let (x, y) = trans.inverse_transform_point(left, top);
        *rect = RectD::new(x, y, rect.width, rect.height);
    }
    gm.update_bounds();
}
