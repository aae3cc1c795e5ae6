use rustc_hash::FxHashMap;

use super::base::WORLD_BOUNDARY;
use crate::model::{GraphManager, GridSpan, NodeId};

/// Upper bound on the number of grid cells; the cell size grows past the repulsion range to stay
/// under it.
pub(crate) const MAX_GRID_CELLS: f64 = 262_144.0;

/// Uniform grid over the root bounds used to find nearby nodes for repulsion (layout-base FR-grid
/// variant) and to measure congestion around a node during tree regrowth.
#[derive(Debug, Clone)]
pub(crate) struct RepulsionGrid {
    left: f64,
    top: f64,
    range: f64,
    cell_size: f64,
    size_x: i32,
    size_y: i32,
    // Only occupied cells are stored.
    cells: FxHashMap<(i32, i32), Vec<NodeId>>,
}

fn clamp_to_world(v: f64) -> f64 {
    v.clamp(-WORLD_BOUNDARY, WORLD_BOUNDARY)
}

impl RepulsionGrid {
    pub(crate) fn size_x(&self) -> i32 {
        self.size_x
    }

    pub(crate) fn size_y(&self) -> i32 {
        self.size_y
    }

    pub(crate) fn cell(&self, x: i32, y: i32) -> &[NodeId] {
        self.cells.get(&(x, y)).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn cell_len(&self, x: i32, y: i32) -> usize {
        self.cell(x, y).len()
    }

    /// Builds the grid from the root graph's current bounds and records every node's cell span.
    ///
    /// Call after [`GraphManager::update_bounds`].
    pub(crate) fn build(gm: &mut GraphManager, range: f64) -> Option<Self> {
        if !range.is_finite() || range <= 0.0 {
            return None;
        }
        let nodes = gm.all_nodes();
        if nodes.is_empty() {
            return None;
        }
        let bounds = gm.graph(gm.root()).bounds();
        if !(bounds.x.is_finite() && bounds.y.is_finite()) {
            return None;
        }

        let left = clamp_to_world(bounds.x);
        let top = clamp_to_world(bounds.y);
        let width = clamp_to_world(bounds.right()) - left;
        let height = clamp_to_world(bounds.bottom()) - top;

        let cells_for =
            |size: f64| (width / size).ceil().max(1.0) * (height / size).ceil().max(1.0);
        let mut cell_size = range;
        while cells_for(cell_size) > MAX_GRID_CELLS {
            cell_size *= 2.0;
        }

        let size_x = ((width / cell_size).ceil() as i32).max(1);
        let size_y = ((height / cell_size).ceil() as i32).max(1);
        let mut grid = Self {
            left,
            top,
            range,
            cell_size,
            size_x,
            size_y,
            cells: FxHashMap::default(),
        };

        for &n in nodes.iter() {
            let span = grid.span_of(gm, n);
            for gx in span.start_x..=span.finish_x {
                for gy in span.start_y..=span.finish_y {
                    grid.cells.entry((gx, gy)).or_default().push(n);
                }
            }
            gm.node_mut(n).grid = span;
        }
        Some(grid)
    }

    fn span_of(&self, gm: &GraphManager, node: NodeId) -> GridSpan {
        let r = gm.node(node).rect;
        let cell = |v: f64, origin: f64, size: i32| -> i32 {
            (((clamp_to_world(v) - origin) / self.cell_size).floor() as i32).clamp(0, size - 1)
        };
        GridSpan {
            start_x: cell(r.x, self.left, self.size_x),
            finish_x: cell(r.right(), self.left, self.size_x),
            start_y: cell(r.y, self.top, self.size_y),
            finish_y: cell(r.bottom(), self.top, self.size_y),
        }
    }

    /// Recomputes `node`'s surrounding set: same-owner nodes in the neighbouring cells, not yet
    /// processed this pass, whose rectangles are within the repulsion range on both axes.
    pub(crate) fn refresh_node_surrounding(
        &self,
        gm: &mut GraphManager,
        node: NodeId,
        processed: &[bool],
    ) {
        let span = gm.node(node).grid;
        let owner = gm.node(node).owner();
        let a = gm.node(node).rect;

        let mut surrounding: Vec<NodeId> = Vec::new();
        for gx in (span.start_x - 1)..=(span.finish_x + 1) {
            for gy in (span.start_y - 1)..=(span.finish_y + 1) {
                for &other in self.cell(gx, gy) {
                    if other == node || gm.node(other).owner() != owner {
                        continue;
                    }
                    if processed.get(other.index()).copied().unwrap_or(false) {
                        continue;
                    }
                    if surrounding.contains(&other) {
                        continue;
                    }

                    let b = gm.node(other).rect;
                    let dx = (a.center_x() - b.center_x()).abs() - (a.half_w() + b.half_w());
                    let dy = (a.center_y() - b.center_y()).abs() - (a.half_h() + b.half_h());
                    if dx <= self.range && dy <= self.range {
                        surrounding.push(other);
                    }
                }
            }
        }
        gm.node_mut(node).surrounding = surrounding;
    }
}
