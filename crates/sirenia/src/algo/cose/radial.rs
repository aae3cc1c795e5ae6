//! Radial placement of a flat forest (cose-base `positionNodesRadially`).

use super::base::{WORLD_BOUNDARY, WORLD_CENTER_X, WORLD_CENTER_Y, find_center_of_tree, transform_to};
use crate::geom::{RectD, Transform, bounds_of};
use crate::model::{GraphManager, NodeId};
use std::f64::consts::PI;

/// Lays every tree out on concentric rings around its centre and packs the trees into
/// `ceil(sqrt(k))` columns, `component_separation` apart.
pub(crate) fn position_nodes_radially(
    gm: &mut GraphManager,
    forest: &[Vec<NodeId>],
    ideal_edge_length: f64,
    component_separation: f64,
) {
    if forest.is_empty() {
        return;
    }
    let columns = (forest.len() as f64).sqrt().ceil() as usize;
    let mut height = 0.0;
    let mut current_x = 0.0;
    let mut current_y = 0.0;
    let mut point = (0.0, 0.0);

    for (i, tree) in forest.iter().enumerate() {
        if i % columns == 0 {
            current_x = 0.0;
            current_y = height;
            if i != 0 {
                current_y += component_separation;
            }
            height = 0.0;
        }
        let Some(center) = find_center_of_tree(gm, tree) else {
            continue;
        };
        point = radial_layout(gm, tree, center, (current_x, current_y), ideal_edge_length);
        if point.1 > height {
            height = point.1.ceil();
        }
        current_x = (point.0 + component_separation).ceil();
    }

    gm.update_bounds();
    transform_to(
        gm,
        (WORLD_CENTER_X - point.0 / 2.0, WORLD_CENTER_Y - point.1 / 2.0),
    );
}

/// Places one tree with its top-left corner at `start`; returns its bottom-right corner.
fn radial_layout(
    gm: &mut GraphManager,
    tree: &[NodeId],
    center: NodeId,
    start: (f64, f64),
    ideal_edge_length: f64,
) -> (f64, f64) {
    let max_diagonal = tree
        .iter()
        .map(|&n| gm.node(n).rect.diagonal())
        .fold(0.0, f64::max);
    let radial_separation = max_diagonal.max(ideal_edge_length);
    branch_radial_layout(gm, center, radial_separation);

    let Some(bounds) = bounds_of(tree.iter().map(|&n| &gm.node(n).rect)) else {
        return start;
    };
    let trans = Transform::translating((bounds.x, bounds.y), start);
    for &n in tree {
        let rect = &mut gm.node_mut(n).rect;
        let left = rect.x.clamp(-WORLD_BOUNDARY, WORLD_BOUNDARY);
        let top = rect.y.clamp(-WORLD_BOUNDARY, WORLD_BOUNDARY);
        let (x, y) = trans.inverse_transform_point(left, top);
        *rect = RectD::new(x, y, rect.width, rect.height);
    }
    trans.inverse_transform_point(bounds.right(), bounds.bottom())
}

struct Branch {
    node: NodeId,
    parent: Option<NodeId>,
    start_angle: f64,
    end_angle: f64,
    distance: f64,
}

/// Gives each branch an equal slice of its parent's angular interval, one ring further out.
fn branch_radial_layout(gm: &mut GraphManager, center: NodeId, radial_separation: f64) {
    let mut stack = vec![Branch {
        node: center,
        parent: None,
        start_angle: 0.0,
        end_angle: 359.0,
        distance: 0.0,
    }];

    while let Some(b) = stack.pop() {
        let mut half_interval = (b.end_angle - b.start_angle + 1.0) / 2.0;
        if half_interval < 0.0 {
            half_interval += 180.0;
        }
        let node_angle = (half_interval + b.start_angle) % 360.0;
        let teta = node_angle * 2.0 * PI / 360.0;
        gm.node_mut(b.node)
            .rect
            .set_center(b.distance * teta.cos(), b.distance * teta.sin());

        let edges = gm.node(b.node).edges().to_vec();
        let incident = edges.len();
        let child_count = match b.parent {
            Some(_) => incident.saturating_sub(1),
            None => incident,
        };
        if child_count == 0 {
            continue;
        }
        let start_index = b
            .parent
            .and_then(|p| {
                edges
                    .iter()
                    .position(|&e| gm.edge(e).other_end(b.node) == Some(p))
            })
            .map_or(0, |i| (i + 1) % incident);
        let step_angle = (b.end_angle - b.start_angle).abs() / child_count as f64;

        let mut branch_count = 0;
        let mut i = start_index;
        while branch_count != child_count {
            let neighbour = gm.edge(edges[i]).other_end(b.node);
            i = (i + 1) % incident;
            let Some(neighbour) = neighbour else {
                branch_count += 1;
                continue;
            };
            if Some(neighbour) == b.parent {
                continue;
            }
            let child_start = (b.start_angle + branch_count as f64 * step_angle) % 360.0;
            let child_end = (child_start + step_angle) % 360.0;
            stack.push(Branch {
                node: neighbour,
                parent: Some(b.node),
                start_angle: child_start,
                end_angle: child_end,
                distance: b.distance + radial_separation,
            });
            branch_count += 1;
        }
    }
}
