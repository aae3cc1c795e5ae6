//! Tiling of edge-less members (cose-base `tilingPreLayout` / `tilingPostLayout`).
//!
//! Before the simulation, zero-degree siblings are grouped under a synthetic compound and
//! compounds whose whole subtree is edge-less are collapsed into a single box. Both are packed
//! into rows; after the simulation the packed members are laid out inside their box again.

use crate::error::Result;
use crate::geom::{RectD, bounds_of};
use crate::model::{GraphId, GraphManager, NodeId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TileItem {
    pub(crate) node: NodeId,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

/// Rows produced by the packer. `width` and `height` include the box's own padding.
#[derive(Debug, Clone, Default)]
pub(crate) struct Organization {
    pub(crate) rows: Vec<Vec<TileItem>>,
    pub(crate) row_width: Vec<f64>,
    pub(crate) row_height: Vec<f64>,
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) vertical_padding: f64,
    pub(crate) horizontal_padding: f64,
}

impl Organization {
    fn shortest_row_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &w) in self.row_width.iter().enumerate() {
            if best.is_none_or(|b| w < self.row_width[b]) {
                best = Some(i);
            }
        }
        best
    }

    fn longest_row_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &w) in self.row_width.iter().enumerate() {
            if best.is_none_or(|b| w > self.row_width[b]) {
                best = Some(i);
            }
        }
        best
    }

    fn insert_node_to_row(&mut self, item: TileItem, row_index: usize, min_width: f64) {
        if row_index == self.rows.len() {
            self.rows.push(Vec::new());
            self.row_width.push(min_width);
            self.row_height.push(0.0);
        }

        let mut w = self.row_width[row_index] + item.width;
        if !self.rows[row_index].is_empty() {
            w += self.horizontal_padding;
        }
        self.row_width[row_index] = w;
        if self.width < w {
            self.width = w;
        }

        let mut h = item.height;
        if row_index > 0 {
            h += self.vertical_padding;
        }
        if h > self.row_height[row_index] {
            self.height += h - self.row_height[row_index];
            self.row_height[row_index] = h;
        }
        self.rows[row_index].push(item);
    }

    /// Whether appending to the shortest row keeps the box closer to square than opening a row.
    fn can_add_horizontal(&self, extra_width: f64, extra_height: f64) -> bool {
        let Some(sri) = self.shortest_row_index() else {
            return true;
        };
        let min = self.row_width[sri];
        if min + self.horizontal_padding + extra_width <= self.width {
            return true;
        }

        let mut h_diff = 0.0;
        if self.row_height[sri] < extra_height && sri > 0 {
            h_diff = extra_height + self.vertical_padding - self.row_height[sri];
        }
        let mut add_to_row_ratio = if self.width - min >= extra_width + self.horizontal_padding {
            (self.height + h_diff) / (min + extra_width + self.horizontal_padding)
        } else {
            (self.height + h_diff) / self.width
        };

        let h_diff = extra_height + self.vertical_padding;
        let mut add_new_row_ratio = if self.width < extra_width {
            (self.height + h_diff) / extra_width
        } else {
            (self.height + h_diff) / self.width
        };

        if add_new_row_ratio < 1.0 {
            add_new_row_ratio = 1.0 / add_new_row_ratio;
        }
        if add_to_row_ratio < 1.0 {
            add_to_row_ratio = 1.0 / add_to_row_ratio;
        }
        add_to_row_ratio < add_new_row_ratio
    }

    /// Moves trailing items of the longest row to the last row while that narrows the box.
    fn shift_to_last_row(&mut self) {
        loop {
            let Some(longest) = self.longest_row_index() else {
                return;
            };
            let last = self.row_width.len() - 1;
            let Some(&item) = self.rows[longest].last() else {
                return;
            };
            let diff = item.width + self.horizontal_padding;
            if longest == last || self.width - self.row_width[last] <= diff {
                return;
            }

            self.rows[longest].pop();
            self.rows[last].push(item);
            self.row_width[longest] -= diff;
            self.row_width[last] += diff;
            if let Some(l) = self.longest_row_index() {
                self.width = self.row_width[l];
            }

            let mut max_height = self.rows[longest]
                .iter()
                .map(|it| it.height)
                .fold(0.0, f64::max);
            if longest > 0 {
                max_height += self.vertical_padding;
            }
            let prev_total = self.row_height[longest] + self.row_height[last];
            self.row_height[longest] = max_height;
            if self.row_height[last] < item.height + self.vertical_padding {
                self.row_height[last] = item.height + self.vertical_padding;
            }
            let final_total = self.row_height[longest] + self.row_height[last];
            self.height += final_total - prev_total;
        }
    }
}

/// Packs items into rows, largest area first, filling the shortest row while that keeps the box
/// balanced. `min_width` is the horizontal padding of the enclosing box.
pub(crate) fn tile_nodes(
    mut items: Vec<TileItem>,
    min_width: f64,
    vertical_padding: f64,
    horizontal_padding: f64,
) -> Organization {
    let mut org = Organization {
        width: 0.0,
        // The box is assumed as tall as it is wide before any row exists.
        height: min_width,
        vertical_padding,
        horizontal_padding,
        ..Default::default()
    };
    items.sort_by(|a, b| (b.width * b.height).total_cmp(&(a.width * a.height)));

    for item in items {
        if org.rows.is_empty() {
            org.insert_node_to_row(item, 0, min_width);
        } else if org.can_add_horizontal(item.width, item.height) {
            let row = org.shortest_row_index().unwrap_or(0);
            org.insert_node_to_row(item, row, min_width);
        } else {
            let row = org.rows.len();
            org.insert_node_to_row(item, row, min_width);
        }
        org.shift_to_last_row();
    }
    org
}

/// Places the packed members row by row inside a box whose top-left corner is `(x, y)`.
pub(crate) fn adjust_locations(
    gm: &mut GraphManager,
    org: &Organization,
    x: f64,
    y: f64,
    horizontal_margin: f64,
    vertical_margin: f64,
) {
    let left = x + horizontal_margin;
    let mut y = y + vertical_margin;
    for row in &org.rows {
        let mut x = left;
        let mut max_height: f64 = 0.0;
        for item in row {
            let rect = &mut gm.node_mut(item.node).rect;
            rect.x = x;
            rect.y = y;
            x += rect.width + org.horizontal_padding;
            max_height = max_height.max(rect.height);
        }
        y += max_height + org.vertical_padding;
    }
}

fn tile_items(gm: &GraphManager, nodes: &[NodeId]) -> Vec<TileItem> {
    nodes
        .iter()
        .map(|&n| {
            let r = gm.node(n).rect;
            TileItem {
                node: n,
                width: r.width,
                height: r.height,
            }
        })
        .collect()
}

/// Resizes `node` to the packed box, centred where its members were.
fn fit_to_organization(gm: &mut GraphManager, node: NodeId, members: &[NodeId], org: &Organization) {
    let center = bounds_of(members.iter().map(|&m| &gm.node(m).rect))
        .map(|b| (b.center_x(), b.center_y()))
        .unwrap_or_else(|| {
            let r = gm.node(node).rect;
            (r.center_x(), r.center_y())
        });
    let rect = &mut gm.node_mut(node).rect;
    *rect = RectD::new(0.0, 0.0, org.width, org.height);
    rect.set_center(center.0, center.1);
}

/// Record of everything tiling changed, so it can be undone after the simulation.
#[derive(Debug, Default)]
pub(crate) struct Tiling {
    vertical_padding: f64,
    horizontal_padding: f64,
    to_be_tiled: FxHashMap<NodeId, bool>,
    /// Synthetic compound → (graph it was inserted into, its members).
    member_groups: IndexMap<NodeId, (GraphId, Vec<NodeId>)>,
    /// Collapsed compounds, innermost first.
    compound_order: Vec<NodeId>,
    detached: FxHashMap<NodeId, GraphId>,
    tiled_member_pack: FxHashMap<NodeId, Organization>,
    tiled_zero_degree_pack: IndexMap<NodeId, Organization>,
}

impl Tiling {
    pub(crate) fn preprocess(
        gm: &mut GraphManager,
        vertical_padding: f64,
        horizontal_padding: f64,
    ) -> Result<Self> {
        let mut tiling = Self {
            vertical_padding,
            horizontal_padding,
            ..Default::default()
        };
        tiling.group_zero_degree_members(gm)?;
        tiling.clear_compounds(gm)?;
        tiling.clear_zero_degree_members(gm)?;
        Ok(tiling)
    }

    pub(crate) fn synthetic_count(&self) -> usize {
        self.member_groups.len()
    }

    pub(crate) fn collapsed_count(&self) -> usize {
        self.compound_order.len()
    }

    /// A non-empty compound whose descendants have no edges at all.
    fn is_to_be_tiled(&mut self, gm: &GraphManager, node: NodeId) -> bool {
        if let Some(&v) = self.to_be_tiled.get(&node) {
            return v;
        }
        let v = gm.has_children(node)
            && gm
                .with_children(node)
                .into_iter()
                .skip(1)
                .all(|d| gm.degree(d) == 0);
        self.to_be_tiled.insert(node, v);
        v
    }

    /// Moves zero-degree siblings (two or more per graph) under a synthetic compound.
    fn group_zero_degree_members(&mut self, gm: &mut GraphManager) -> Result<()> {
        let mut groups: IndexMap<GraphId, Vec<NodeId>> = IndexMap::new();
        let nodes = gm.all_nodes();
        for &n in nodes.iter() {
            if gm.degree_with_children(n) != 0 {
                continue;
            }
            if let Some(parent) = gm.parent_node(n) {
                if self.is_to_be_tiled(gm, parent) {
                    continue;
                }
            }
            if let Some(owner) = gm.node(n).owner() {
                groups.entry(owner).or_default().push(n);
            }
        }

        for (graph, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let parent = gm.graph(graph).parent();
            let padding = parent.map_or(0.0, |p| gm.node(p).padding);
            let label = parent.map_or_else(|| "root".to_string(), |p| gm.node(p).id.clone());

            let dummy = gm.new_node(format!("DummyCompound_{label}"), RectD::default());
            {
                let d = gm.node_mut(dummy);
                d.dummy = true;
                d.padding = padding;
            }
            gm.add_node(graph, dummy)?;
            let inner = gm.add_child_graph(dummy)?;
            for &m in &members {
                gm.move_node(m, inner)?;
            }
            self.member_groups.insert(dummy, (graph, members));
        }
        Ok(())
    }

    /// Collapses every to-be-tiled compound (innermost first) into a packed box.
    fn clear_compounds(&mut self, gm: &mut GraphManager) -> Result<()> {
        let root = gm.root();
        let mut stack: Vec<(NodeId, bool)> = gm
            .graph(root)
            .nodes()
            .iter()
            .rev()
            .map(|&n| (n, false))
            .collect();
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                if !gm.node(n).is_dummy() && self.is_to_be_tiled(gm, n) {
                    self.compound_order.push(n);
                }
                continue;
            }
            stack.push((n, true));
            if let Some(child) = gm.child_of(n) {
                stack.extend(gm.graph(child).nodes().iter().rev().map(|&c| (c, false)));
            }
        }

        for i in 0..self.compound_order.len() {
            let compound = self.compound_order[i];
            let Some(child) = gm.child_of(compound) else {
                continue;
            };
            let members = gm.graph(child).nodes().to_vec();
            let padding = gm.node(compound).padding;
            let org = tile_nodes(
                tile_items(gm, &members),
                2.0 * padding,
                self.vertical_padding,
                self.horizontal_padding,
            );
            fit_to_organization(gm, compound, &members, &org);
            let detached = gm.detach_child_graph(compound)?;
            self.detached.insert(compound, detached);
            self.tiled_member_pack.insert(compound, org);
        }
        Ok(())
    }

    /// Packs each synthetic compound and takes its members out of the simulation.
    fn clear_zero_degree_members(&mut self, gm: &mut GraphManager) -> Result<()> {
        for (&dummy, (_, members)) in &self.member_groups {
            let padding = gm.node(dummy).padding;
            let org = tile_nodes(
                tile_items(gm, members),
                2.0 * padding,
                self.vertical_padding,
                self.horizontal_padding,
            );
            fit_to_organization(gm, dummy, members, &org);
            gm.detach_child_graph(dummy)?;
            self.tiled_zero_degree_pack.insert(dummy, org);
        }
        Ok(())
    }

    /// Lays packed members out inside their boxes, restores collapsed compounds outermost first
    /// and dissolves the synthetic compounds.
    pub(crate) fn postprocess(&mut self, gm: &mut GraphManager) -> Result<()> {
        for (&dummy, org) in &self.tiled_zero_degree_pack {
            let rect = gm.node(dummy).rect;
            let padding = gm.node(dummy).padding;
            adjust_locations(gm, org, rect.x, rect.y, padding, padding);
        }
        for (dummy, (graph, members)) in std::mem::take(&mut self.member_groups) {
            for m in members {
                gm.move_node(m, graph)?;
            }
            gm.remove_node(dummy)?;
        }

        for &compound in self.compound_order.iter().rev() {
            let rect = gm.node(compound).rect;
            let padding = gm.node(compound).padding;
            if let Some(org) = self.tiled_member_pack.get(&compound) {
                adjust_locations(gm, org, rect.x, rect.y, padding, padding);
            }
            if let Some(graph) = self.detached.remove(&compound) {
                gm.reattach_child_graph(compound, graph)?;
            }
        }
        self.compound_order.clear();
        self.tiled_zero_degree_pack.clear();
        self.tiled_member_pack.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(sizes: &[(f64, f64)]) -> Vec<TileItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| TileItem {
                node: NodeId(i),
                width: w,
                height: h,
            })
            .collect()
    }

    fn placed(org: &Organization, x: f64, y: f64) -> Vec<RectD> {
        let mut out = Vec::new();
        let mut cy = y;
        for row in &org.rows {
            let mut cx = x;
            let mut max_h: f64 = 0.0;
            for it in row {
                out.push(RectD::new(cx, cy, it.width, it.height));
                cx += it.width + org.horizontal_padding;
                max_h = max_h.max(it.height);
            }
            cy += max_h + org.vertical_padding;
        }
        out
    }

    #[test]
    fn packer_bounds_cover_every_member() {
        let sizes = [
            (40.0, 40.0),
            (10.0, 30.0),
            (25.0, 25.0),
            (60.0, 10.0),
            (5.0, 5.0),
            (30.0, 20.0),
            (15.0, 15.0),
        ];
        let org = tile_nodes(items(&sizes), 0.0, 0.0, 0.0);
        let rects = placed(&org, 0.0, 0.0);
        assert_eq!(rects.len(), sizes.len());
        for r in &rects {
            assert!(r.right() <= org.width + 1e-9, "{r:?} exceeds width {}", org.width);
            assert!(r.bottom() <= org.height + 1e-9, "{r:?} exceeds height {}", org.height);
        }
        let total_area: f64 = sizes.iter().map(|(w, h)| w * h).sum();
        assert!(org.width * org.height >= total_area);
    }

    #[test]
    fn packed_members_do_not_overlap() {
        let sizes = [(20.0, 20.0); 9];
        let org = tile_nodes(items(&sizes), 20.0, 10.0, 10.0);
        let rects = placed(&org, 10.0, 10.0);
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                let overlap = a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom();
                assert!(!overlap, "{a:?} overlaps {b:?}");
            }
        }
        // Nine equal squares settle into a 3x3 block.
        assert_eq!(org.rows.len(), 3);
        assert!(org.rows.iter().all(|r| r.len() == 3));
        assert_eq!(org.width, 20.0 + 3.0 * 20.0 + 2.0 * 10.0);
    }

    #[test]
    fn largest_area_goes_first() {
        let org = tile_nodes(items(&[(5.0, 5.0), (50.0, 50.0)]), 0.0, 0.0, 0.0);
        assert_eq!(org.rows[0][0].node, NodeId(1));
    }

    fn leaf(gm: &mut GraphManager, g: GraphId, id: &str, x: f64) -> NodeId {
        let n = gm.new_node(id, RectD::new(x, 0.0, 20.0, 20.0));
        gm.add_node(g, n).expect("add node");
        n
    }

    #[test]
    fn zero_degree_siblings_are_grouped_and_restored() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = leaf(&mut gm, root, "a", 0.0);
        let b = leaf(&mut gm, root, "b", 100.0);
        let lone1 = leaf(&mut gm, root, "lone1", 200.0);
        let lone2 = leaf(&mut gm, root, "lone2", 300.0);
        gm.add_edge("ab", a, b).expect("edge");

        let mut tiling = Tiling::preprocess(&mut gm, 10.0, 10.0).expect("tiling");
        assert_eq!(tiling.synthetic_count(), 1);
        let nodes = gm.all_nodes();
        assert_eq!(nodes.len(), 3);
        let dummy = nodes[2];
        assert!(gm.node(dummy).is_dummy());
        // Root padding is 0: two 20x20 squares side by side.
        assert_eq!(gm.node(dummy).rect.width, 50.0);
        assert_eq!(gm.node(dummy).rect.height, 20.0);

        gm.node_mut(dummy).rect = RectD::new(1000.0, 500.0, 50.0, 20.0);
        tiling.postprocess(&mut gm).expect("postprocess");
        assert_eq!(gm.all_nodes().as_ref(), &[a, b, lone1, lone2]);
        let r1 = gm.node(lone1).rect;
        let r2 = gm.node(lone2).rect;
        assert_eq!((r1.x, r1.y), (1000.0, 500.0));
        assert_eq!((r2.x, r2.y), (1030.0, 500.0));
    }

    #[test]
    fn edgeless_compounds_collapse_innermost_first() {
        let mut gm = GraphManager::new();
        let root = gm.root();
        let a = leaf(&mut gm, root, "a", 0.0);
        let outer = leaf(&mut gm, root, "outer", 100.0);
        gm.add_edge("ao", a, outer).expect("edge");
        let og = gm.add_child_graph(outer).expect("outer graph");
        let inner = leaf(&mut gm, og, "inner", 100.0);
        let x = leaf(&mut gm, og, "x", 150.0);
        let ig = gm.add_child_graph(inner).expect("inner graph");
        let y = leaf(&mut gm, ig, "y", 100.0);

        let mut tiling = Tiling::preprocess(&mut gm, 10.0, 10.0).expect("tiling");
        assert_eq!(tiling.collapsed_count(), 2);
        assert_eq!(tiling.synthetic_count(), 0);
        assert_eq!(gm.all_nodes().as_ref(), &[a, outer]);
        // inner: 20 + 2*15 wide; outer holds inner (50x50) and x (20x20) in one row.
        assert_eq!(gm.node(inner).rect.width, 50.0);
        assert_eq!(gm.node(outer).rect.width, 30.0 + 50.0 + 10.0 + 20.0);

        gm.node_mut(outer).rect.x = 0.0;
        gm.node_mut(outer).rect.y = 0.0;
        tiling.postprocess(&mut gm).expect("postprocess");
        gm.update_bounds();
        assert_eq!(gm.all_nodes().len(), 5);
        let o = gm.node(outer).rect;
        for n in [inner, x, y] {
            let r = gm.node(n).rect;
            assert!(r.x >= o.x && r.right() <= o.right(), "{r:?} outside {o:?}");
            assert!(r.y >= o.y && r.bottom() <= o.bottom(), "{r:?} outside {o:?}");
        }
        assert_eq!(gm.node(y).rect.x, 15.0 + 15.0);
    }
}
