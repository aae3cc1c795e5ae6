//! Compound spring embedder (CoSE family), driven as a resumable state machine.
//!
//! A run builds a [`GraphManager`] from the caller's [`Graph`], optionally tiles edge-less
//! members, lays a flat forest out radially or prunes pendant trees, then iterates the
//! spring-electrical simulation until it cools down or converges. Pruned trees are grown back
//! in batches near the end and everything tiled is unpacked before the result is read.

mod base;
mod forces;
mod grid;
mod radial;
mod tiling;
mod tree;

use crate::algo::CoseOptions;
use crate::error::Result;
use crate::geom::RectD;
use crate::graph::{EdgeRoute, Graph, LayoutResult, NodeLayout, Point};
use crate::model::{DEFAULT_GRAPH_MARGIN, GraphManager, NodeId};
use crate::rng::XorShift64Star;
use base::{
    CONVERGENCE_CHECK_PERIOD, Cooling, DEFAULT_COOLING_FACTOR_INCREMENTAL,
    GRID_CALCULATION_CHECK_PERIOD, Params,
};
use forces::{ConvergenceMonitor, RepulsionState};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiling::Tiling;
use tree::PrunedNode;

/// Ticks spent in the post-growth cool-down before the run is forced to finish.
const AFTER_GROWTH_ITERATIONS: usize = 100;

#[derive(Debug, Default, Clone)]
struct CoseLayoutTimings {
    total: std::time::Duration,
    build: std::time::Duration,
    init: std::time::Duration,
    simulation: std::time::Duration,
    output: std::time::Duration,
}

/// Where a [`LayoutRun`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    RadialPlacement,
    NormalEmbedding,
    TreeGrowing,
    GrowthFinished,
    Done,
}

/// Cooperative cancellation for a running layout. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One layout run over a private copy of the caller's graph.
///
/// `layout` drives it to completion; [`LayoutRun::advance`] lets a caller interleave batches of
/// ticks with drawing.
#[derive(Debug)]
pub struct LayoutRun {
    input: Graph,
    handles: Vec<NodeId>,
    gm: GraphManager,
    params: Params,
    opts: CoseOptions,
    rng: XorShift64Star,
    phase: Phase,
    successful: bool,
    finished: bool,
    stop: StopHandle,

    tiling: Option<Tiling>,
    pruned: Vec<Vec<PrunedNode>>,
    nodes_with_gravity: Vec<NodeId>,
    repulsion: RepulsionState,
    cooling: Cooling,
    monitor: ConvergenceMonitor,
    total_iterations: usize,
    max_iterations: usize,
    grow_iterations: usize,
    after_growth_iterations: usize,
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Builds the layout model. Parents are attached before their children; self-loops carry no
/// force and are left out.
fn build_model(graph: &Graph) -> Result<(GraphManager, Vec<NodeId>)> {
    let mut gm = GraphManager::new();
    let mut by_id: FxHashMap<&str, usize> = FxHashMap::default();
    by_id.reserve(graph.nodes.len());

    let mut handles: Vec<NodeId> = Vec::with_capacity(graph.nodes.len());
    for (idx, n) in graph.nodes.iter().enumerate() {
        let w = finite_or_zero(n.width).max(0.0);
        let h = finite_or_zero(n.height).max(0.0);
        let mut rect = RectD::new(0.0, 0.0, w, h);
        rect.set_center(finite_or_zero(n.x), finite_or_zero(n.y));
        let handle = gm.new_node(n.id.clone(), rect);
        gm.node_mut(handle).padding = n
            .padding
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(DEFAULT_GRAPH_MARGIN);
        handles.push(handle);
        by_id.insert(n.id.as_str(), idx);
    }

    let mut attached = vec![false; graph.nodes.len()];
    for start in 0..graph.nodes.len() {
        // Collect the unattached part of the parent chain, then attach it outermost first.
        let mut chain: Vec<usize> = Vec::new();
        let mut cur = Some(start);
        while let Some(i) = cur {
            if attached[i] {
                break;
            }
            chain.push(i);
            cur = graph.nodes[i]
                .parent
                .as_deref()
                .and_then(|p| by_id.get(p).copied());
        }
        for &i in chain.iter().rev() {
            let owner = match graph.nodes[i].parent.as_deref().and_then(|p| by_id.get(p)) {
                Some(&p) => match gm.node(handles[p]).child() {
                    Some(g) => g,
                    None => gm.add_child_graph(handles[p])?,
                },
                None => gm.root(),
            };
            gm.add_node(owner, handles[i])?;
            attached[i] = true;
        }
    }

    for e in &graph.edges {
        let (Some(&s), Some(&t)) = (by_id.get(e.source.as_str()), by_id.get(e.target.as_str()))
        else {
            continue;
        };
        if s == t {
            continue;
        }
        let eid = gm.add_edge(e.id.clone(), handles[s], handles[t])?;
        gm.edge_mut(eid).bend_points = e.bend_points.iter().map(|p| (p.x, p.y)).collect();
    }

    gm.update_bounds();
    Ok((gm, handles))
}

impl LayoutRun {
    /// Validates the input and builds the model. No layout work happens until the first
    /// [`LayoutRun::advance`].
    pub fn new(graph: &Graph, opts: &CoseOptions) -> Result<Self> {
        graph.validate()?;
        let (gm, handles) = build_model(graph)?;
        let params = Params::from_options(opts);
        let cooling = Cooling::new(params.incremental, params.quality, 0, params.num_iter);
        let monitor = ConvergenceMonitor::new(&params, 0, params.num_iter);
        Ok(Self {
            input: graph.clone(),
            handles,
            gm,
            rng: XorShift64Star::new(opts.random_seed),
            opts: opts.clone(),
            params,
            phase: Phase::Initializing,
            successful: true,
            finished: false,
            stop: StopHandle::default(),
            tiling: None,
            pruned: Vec::new(),
            nodes_with_gravity: Vec::new(),
            repulsion: RepulsionState::default(),
            cooling,
            monitor,
            total_iterations: 0,
            max_iterations: 0,
            grow_iterations: 0,
            after_growth_iterations: 0,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iterations(&self) -> usize {
        self.total_iterations
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn graph_manager(&self) -> &GraphManager {
        &self.gm
    }

    /// Runs up to `ticks` simulation ticks (initializing first if needed) and returns the phase
    /// reached. Once the run is done the model is unpacked and mapped to its final coordinates.
    pub fn advance(&mut self, ticks: usize) -> Result<Phase> {
        if self.phase == Phase::Initializing {
            self.initialize()?;
        }
        let mut done = 0;
        while done < ticks && self.phase != Phase::Done {
            if self.stop.is_stopped() {
                tracing::debug!(
                    "cose: stopped after {} iterations in {:?}",
                    self.total_iterations,
                    self.phase
                );
                self.phase = Phase::Done;
                break;
            }
            self.tick()?;
            done += 1;
        }
        if self.phase == Phase::Done && !self.finished {
            self.finish_layout()?;
        }
        Ok(self.phase)
    }

    /// Drives the run to completion and returns the result.
    pub fn finish(mut self) -> Result<LayoutResult> {
        while self.advance(usize::MAX)? != Phase::Done {}
        Ok(self.snapshot())
    }

    /// Current positions in caller terms. Before the run is done these are simulation
    /// coordinates: pruned nodes sit on the node they hang from and members of a collapsed
    /// compound sit on that compound.
    pub fn snapshot(&self) -> LayoutResult {
        if !self.successful {
            return LayoutResult::unsuccessful(&self.input);
        }
        let stand_ins = self.stand_in_centers();
        let mut positions: BTreeMap<String, Point> = BTreeMap::new();
        let mut nodes: BTreeMap<String, NodeLayout> = BTreeMap::new();
        for (n, &h) in self.input.nodes.iter().zip(&self.handles) {
            let r = self.gm.node(h).rect;
            let center = match stand_ins.get(&h) {
                Some(&(x, y)) => Point { x, y },
                None => Point {
                    x: r.center_x(),
                    y: r.center_y(),
                },
            };
            positions.insert(n.id.clone(), center);
            nodes.insert(
                n.id.clone(),
                NodeLayout {
                    x: center.x,
                    y: center.y,
                    width: r.width,
                    height: r.height,
                },
            );
        }
        let edges = self
            .input
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
        LayoutResult {
            successful: true,
            iterations: self.total_iterations,
            positions,
            nodes,
            edges,
        }
    }

    /// Centres for nodes that are out of the simulation mid-run. Empty once the run is done.
    fn stand_in_centers(&self) -> FxHashMap<NodeId, (f64, f64)> {
        let mut centers: FxHashMap<NodeId, (f64, f64)> = FxHashMap::default();
        if self.finished {
            return centers;
        }
        // The last batch hangs from live nodes, earlier batches from later ones.
        for batch in self.pruned.iter().rev() {
            for p in batch {
                let Some(anchor) = self.gm.edge(p.edge).other_end(p.node) else {
                    continue;
                };
                let center = self.visible_center(anchor, &centers);
                centers.insert(p.node, center);
            }
        }
        for &h in &self.handles {
            let hidden = self
                .gm
                .node(h)
                .owner()
                .is_some_and(|owner| !self.gm.is_live(owner));
            if hidden && !centers.contains_key(&h) {
                let center = self.visible_center(h, &centers);
                centers.insert(h, center);
            }
        }
        centers
    }

    /// Centre of `node`, or of its innermost ancestor that is still placed by the simulation.
    fn visible_center(
        &self,
        mut node: NodeId,
        centers: &FxHashMap<NodeId, (f64, f64)>,
    ) -> (f64, f64) {
        loop {
            if let Some(&c) = centers.get(&node) {
                return c;
            }
            let Some(owner) = self.gm.node(node).owner() else {
                break;
            };
            if self.gm.is_live(owner) {
                break;
            }
            match self.gm.graph(owner).parent() {
                Some(parent) => node = parent,
                None => break,
            }
        }
        let r = self.gm.node(node).rect;
        (r.center_x(), r.center_y())
    }

    fn initialize(&mut self) -> Result<()> {
        let root = self.gm.root();
        if self.gm.graph(root).nodes().is_empty() || self.gm.includes_invalid_edge() {
            tracing::debug!("cose: nothing to lay out or an edge joins a node to its ancestor");
            self.successful = false;
            self.finished = true;
            self.phase = Phase::Done;
            return Ok(());
        }

        if self.opts.tile {
            let tiling = Tiling::preprocess(
                &mut self.gm,
                self.opts.tiling_padding_vertical,
                self.opts.tiling_padding_horizontal,
            )?;
            tracing::debug!(
                "cose: tiled {} zero-degree groups and {} compounds",
                tiling.synthetic_count(),
                tiling.collapsed_count()
            );
            self.tiling = Some(tiling);
        }

        self.nodes_with_gravity = forces::nodes_to_apply_gravitation(&mut self.gm);
        forces::set_nodes_to_apply_gravitation(&mut self.gm, &self.nodes_with_gravity);
        self.gm.calc_leaf_counts();
        self.gm.calc_lowest_common_ancestors();
        self.gm.calc_inclusion_tree_depths();
        self.gm.calc_estimated_size();
        forces::calc_ideal_edge_lengths(&mut self.gm, &self.params);

        let mut scatter = !self.params.incremental;
        if !self.params.incremental {
            let forest = base::get_flat_forest(&self.gm);
            if !forest.is_empty() {
                self.phase = Phase::RadialPlacement;
                tracing::debug!("cose: radial placement of {} trees", forest.len());
                radial::position_nodes_radially(
                    &mut self.gm,
                    &forest,
                    self.params.ideal_edge_length,
                    self.opts.component_separation,
                );
                if !self.opts.refine_forest {
                    self.phase = Phase::Done;
                    return Ok(());
                }
                scatter = false;
            } else if self.opts.tree_reduction {
                self.pruned = tree::reduce_trees(&mut self.gm)?;
                self.restrict_gravity_to_live_nodes();
                tracing::debug!(
                    "cose: pruned {} nodes in {} batches",
                    self.pruned.iter().map(Vec::len).sum::<usize>(),
                    self.pruned.len()
                );
            }
        }
        if scatter {
            base::position_nodes_randomly(&mut self.gm, &mut self.rng);
        }

        let node_count = self.gm.all_nodes().len();
        self.max_iterations = self.params.num_iter.max(5 * node_count);
        self.cooling = Cooling::new(
            self.params.incremental,
            self.params.quality,
            node_count,
            self.max_iterations,
        );
        self.monitor = ConvergenceMonitor::new(&self.params, node_count, self.max_iterations);
        self.phase = Phase::NormalEmbedding;
        tracing::debug!(
            "cose: embedding {} nodes, at most {} iterations",
            node_count,
            self.max_iterations
        );
        Ok(())
    }

    fn restrict_gravity_to_live_nodes(&mut self) {
        let live: FxHashSet<NodeId> = self.gm.all_nodes().iter().copied().collect();
        let flagged: Vec<NodeId> = self
            .nodes_with_gravity
            .iter()
            .copied()
            .filter(|n| live.contains(n))
            .collect();
        forces::set_nodes_to_apply_gravitation(&mut self.gm, &flagged);
    }

    /// Leaves the main embedding: grow pruned trees back if any, else finish.
    fn end_embedding(&mut self) {
        if self.pruned.is_empty() {
            self.phase = Phase::Done;
        } else {
            tracing::debug!(
                "cose: growing {} batches back after {} iterations",
                self.pruned.len(),
                self.total_iterations
            );
            self.phase = Phase::TreeGrowing;
        }
    }

    fn refresh_grid(&mut self) {
        self.gm.update_bounds();
        self.repulsion.update_grid(&mut self.gm, &self.params);
    }

    fn tick(&mut self) -> Result<()> {
        self.total_iterations += 1;

        if self.phase == Phase::NormalEmbedding && self.total_iterations == self.max_iterations {
            self.end_embedding();
            if self.phase == Phase::Done {
                return Ok(());
            }
        }
        if self.phase == Phase::NormalEmbedding
            && self.total_iterations % CONVERGENCE_CHECK_PERIOD == 0
        {
            if self.monitor.is_converged(self.total_iterations) {
                self.end_embedding();
                if self.phase == Phase::Done {
                    return Ok(());
                }
            }
            self.cooling.next_cycle();
            tracing::trace!(
                "cose: iteration {} displacement {:.3} cooling {:.4}",
                self.total_iterations,
                self.monitor.total_displacement,
                self.cooling.factor
            );
        }

        if self.phase == Phase::TreeGrowing {
            if self.grow_iterations % GRID_CALCULATION_CHECK_PERIOD == 0 {
                if !self.pruned.is_empty() {
                    self.refresh_grid();
                    tree::grow_tree(
                        &mut self.gm,
                        &mut self.pruned,
                        self.repulsion.grid.as_ref(),
                        self.params.ideal_edge_length,
                        &mut self.rng,
                    )?;
                    self.restrict_gravity_to_live_nodes();
                    self.refresh_grid();
                    self.cooling.factor = DEFAULT_COOLING_FACTOR_INCREMENTAL;
                }
                if self.pruned.is_empty() {
                    self.phase = Phase::GrowthFinished;
                }
            }
            self.grow_iterations += 1;
        }

        if self.phase == Phase::GrowthFinished {
            if self.monitor.is_converged(self.total_iterations)
                || self.after_growth_iterations >= AFTER_GROWTH_ITERATIONS
            {
                self.phase = Phase::Done;
                return Ok(());
            }
            if self.after_growth_iterations % GRID_CALCULATION_CHECK_PERIOD == 0 {
                self.refresh_grid();
            }
            let remaining = (AFTER_GROWTH_ITERATIONS - self.after_growth_iterations) as f64;
            self.cooling.factor = (DEFAULT_COOLING_FACTOR_INCREMENTAL * remaining
                / AFTER_GROWTH_ITERATIONS as f64)
                .max(0.0);
            self.after_growth_iterations += 1;
        }

        let growing = self.phase == Phase::TreeGrowing;
        let finished = self.phase == Phase::GrowthFinished;
        let grid_update_allowed = !growing && !finished;
        let force_surrounding_update = (growing
            && self.grow_iterations % GRID_CALCULATION_CHECK_PERIOD == 1)
            || (finished && self.after_growth_iterations % GRID_CALCULATION_CHECK_PERIOD == 1);

        self.gm.update_bounds();
        forces::calc_spring_forces(&mut self.gm, &self.params);
        self.repulsion.calc_repulsion_forces(
            &mut self.gm,
            &self.params,
            self.total_iterations,
            grid_update_allowed,
            force_surrounding_update,
        );
        forces::calc_gravitational_forces(&mut self.gm, &self.params);
        self.monitor.total_displacement = forces::move_nodes(&mut self.gm, &self.cooling);
        Ok(())
    }

    /// Regrows whatever is still pruned, unpacks tiled members and maps the drawing so its
    /// top-left corner sits at the origin (kept in place for incremental runs).
    fn finish_layout(&mut self) -> Result<()> {
        self.finished = true;
        while !self.pruned.is_empty() {
            self.refresh_grid();
            tree::grow_tree(
                &mut self.gm,
                &mut self.pruned,
                self.repulsion.grid.as_ref(),
                self.params.ideal_edge_length,
                &mut self.rng,
            )?;
        }
        if let Some(mut tiling) = self.tiling.take() {
            tiling.postprocess(&mut self.gm)?;
        }
        self.gm.update_bounds();
        if !self.params.incremental {
            base::transform_to(&mut self.gm, (0.0, 0.0));
        }
        tracing::debug!("cose: done after {} iterations", self.total_iterations);
        Ok(())
    }
}

/// Lays the graph out in one go.
///
/// Set `SIRENIA_COSE_TIMING=1` to print a per-stage timing line to stderr.
pub fn layout(graph: &Graph, opts: &CoseOptions) -> Result<LayoutResult> {
    let timing_enabled = std::env::var("SIRENIA_COSE_TIMING").ok().as_deref() == Some("1");
    let mut timings = CoseLayoutTimings::default();
    let total_start = timing_enabled.then(std::time::Instant::now);

    let build_start = timing_enabled.then(std::time::Instant::now);
    let mut run = LayoutRun::new(graph, opts)?;
    if let Some(s) = build_start {
        timings.build = s.elapsed();
    }

    let init_start = timing_enabled.then(std::time::Instant::now);
    run.advance(0)?;
    if let Some(s) = init_start {
        timings.init = s.elapsed();
    }

    let simulation_start = timing_enabled.then(std::time::Instant::now);
    while run.phase() != Phase::Done {
        run.advance(CONVERGENCE_CHECK_PERIOD)?;
    }
    if let Some(s) = simulation_start {
        timings.simulation = s.elapsed();
    }

    let output_start = timing_enabled.then(std::time::Instant::now);
    let result = run.snapshot();
    if let Some(s) = output_start {
        timings.output = s.elapsed();
    }

    if let Some(s) = total_start {
        timings.total = s.elapsed();
        eprintln!(
            "[sirenia-cose-timing] total={:?} build={:?} init={:?} simulation={:?} output={:?} nodes={} edges={} compounds={} iterations={} successful={}",
            timings.total,
            timings.build,
            timings.init,
            timings.simulation,
            timings.output,
            graph.nodes.len(),
            graph.edges.len(),
            run.graph_manager().graphs().len().saturating_sub(1),
            result.iterations,
            result.successful,
        );
    }
    Ok(result)
}

/// Lays the graph out, calling `on_frame` with a snapshot after every `ticks_per_frame` ticks
/// and once more with the final result.
pub fn layout_with_frames<F>(
    graph: &Graph,
    opts: &CoseOptions,
    ticks_per_frame: usize,
    mut on_frame: F,
) -> Result<LayoutResult>
where
    F: FnMut(Phase, &LayoutResult),
{
    let mut run = LayoutRun::new(graph, opts)?;
    let ticks = ticks_per_frame.max(1);
    loop {
        let phase = run.advance(ticks)?;
        let frame = run.snapshot();
        on_frame(phase, &frame);
        if phase == Phase::Done {
            return Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn node(id: &str, parent: Option<&str>) -> Node {
        Node {
            id: id.to_string(),
            width: 30.0,
            height: 20.0,
            parent: parent.map(str::to_string),
            ..Default::default()
        }
    }

    fn edge(id: &str, s: &str, t: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: s.to_string(),
            target: t.to_string(),
            bend_points: Vec::new(),
        }
    }

    fn cyclic() -> Graph {
        Graph {
            nodes: ["a", "b", "c", "d"].iter().map(|id| node(id, None)).collect(),
            edges: vec![
                edge("ab", "a", "b"),
                edge("bc", "b", "c"),
                edge("ca", "c", "a"),
                edge("cd", "c", "d"),
            ],
        }
    }

    #[test]
    fn model_attaches_children_declared_before_parents() {
        let graph = Graph {
            nodes: vec![node("x", Some("inner")), node("inner", Some("outer")), node("outer", None)],
            edges: vec![edge("loop", "x", "x")],
        };
        let (gm, handles) = build_model(&graph).expect("model");
        assert_eq!(gm.graph(gm.root()).nodes(), &[handles[2]]);
        assert_eq!(gm.parent_node(handles[0]), Some(handles[1]));
        assert_eq!(gm.parent_node(handles[1]), Some(handles[2]));
        assert!(gm.all_edges().is_empty());
    }

    #[test]
    fn run_walks_through_phases() {
        let mut run = LayoutRun::new(&cyclic(), &CoseOptions::default()).expect("run");
        assert_eq!(run.phase(), Phase::Initializing);
        assert_eq!(run.advance(1).expect("advance"), Phase::NormalEmbedding);
        assert_eq!(run.iterations(), 1);
        let result = run.finish().expect("finish");
        assert!(result.successful);
        assert!(result.iterations >= 100);
        assert_eq!(result.positions.len(), 4);
    }

    #[test]
    fn pruned_pendant_is_grown_back() {
        let mut run = LayoutRun::new(&cyclic(), &CoseOptions::default()).expect("run");
        run.advance(0).expect("init");
        assert_eq!(run.pruned.len(), 1);
        assert_eq!(run.gm.all_nodes().len(), 3);
        let result = run.finish().expect("finish");
        let c = result.positions["c"];
        let d = result.positions["d"];
        assert!(c.x.is_finite() && d.x.is_finite());
        assert!((c.x - d.x).hypot(c.y - d.y) > 0.0);
    }

    #[test]
    fn mid_run_snapshot_puts_pruned_nodes_on_their_anchor() {
        let mut run = LayoutRun::new(&cyclic(), &CoseOptions::default()).expect("run");
        run.advance(5).expect("advance");
        assert_eq!(run.pruned.len(), 1);
        let frame = run.snapshot();
        assert_eq!(frame.positions["d"], frame.positions["c"]);
        assert_eq!(frame.nodes["d"].width, 30.0);

        let result = run.finish().expect("finish");
        assert_ne!(result.positions["d"], result.positions["c"]);
    }

    #[test]
    fn mid_run_snapshot_puts_tiled_members_on_their_compound() {
        let graph = Graph {
            nodes: vec![
                node("a", None),
                node("b", None),
                node("box", None),
                node("x", Some("box")),
                node("y", Some("box")),
            ],
            edges: vec![edge("ab", "a", "b"), edge("abox", "a", "box")],
        };
        let mut run = LayoutRun::new(&graph, &CoseOptions::default()).expect("run");
        run.advance(3).expect("advance");
        let frame = run.snapshot();
        assert_eq!(frame.positions["x"], frame.positions["box"]);
        assert_eq!(frame.positions["y"], frame.positions["box"]);

        let result = run.finish().expect("finish");
        assert_ne!(result.positions["x"], result.positions["y"]);
    }

    #[test]
    fn stopping_right_away_still_unpacks_the_model() {
        let run = LayoutRun::new(&cyclic(), &CoseOptions::default()).expect("run");
        run.stop_handle().stop();
        let result = run.finish().expect("finish");
        assert!(result.successful);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.positions.len(), 4);
    }

    #[test]
    fn frames_end_with_the_final_result() {
        let mut frames = 0;
        let mut last_phase = Phase::Initializing;
        let result = layout_with_frames(&cyclic(), &CoseOptions::default(), 50, |phase, _| {
            frames += 1;
            last_phase = phase;
        })
        .expect("layout");
        assert!(frames >= 2);
        assert_eq!(last_phase, Phase::Done);
        let direct = layout(&cyclic(), &CoseOptions::default()).expect("layout");
        assert_eq!(result.positions, direct.positions);
    }
}
