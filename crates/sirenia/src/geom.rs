//! Rectangle geometry and coordinate transforms used by the force-directed core.
//!
//! Rectangles are top-left anchored (layout-base `RectangleD` style).

use nalgebra as na;

/// `-1`, `0` or `1`. Unlike `f64::signum`, zero maps to zero so degenerate axes stay collapsed.
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RectD {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectD {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn half_w(&self) -> f64 {
        self.width / 2.0
    }

    pub fn half_h(&self) -> f64 {
        self.height / 2.0
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    pub fn set_center(&mut self, cx: f64, cy: f64) {
        self.x = cx - self.width / 2.0;
        self.y = cy - self.height / 2.0;
    }

    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Closed intersection test: touching rectangles count as intersecting.
    pub fn intersects(&self, other: &RectD) -> bool {
        !(self.right() < other.x
            || self.bottom() < other.y
            || other.right() < self.x
            || other.bottom() < self.y)
    }
}

/// Point where the segment from `a`'s center toward `b`'s center leaves `a`.
pub fn clip_point_towards(a: &RectD, b: &RectD) -> (f64, f64) {
    let ax = a.center_x();
    let ay = a.center_y();
    let dx = b.center_x() - ax;
    let dy = b.center_y() - ay;

    if dx == 0.0 && dy == 0.0 {
        return (ax, ay);
    }

    let mut t_x = f64::INFINITY;
    let mut t_y = f64::INFINITY;
    if dx != 0.0 {
        t_x = (a.half_w() / dx.abs()).max(0.0);
    }
    if dy != 0.0 {
        t_y = (a.half_h() / dy.abs()).max(0.0);
    }
    let t = t_x.min(t_y);
    (ax + t * dx, ay + t * dy)
}

/// Clip points on both rectangles along the center line, or `None` when they intersect.
///
/// Returns `[a_x, a_y, b_x, b_y]`.
pub fn clip_points(a: &RectD, b: &RectD) -> Option<[f64; 4]> {
    if a.intersects(b) {
        return None;
    }
    let (ax, ay) = clip_point_towards(a, b);
    let (bx, by) = clip_point_towards(b, a);
    Some([ax, ay, bx, by])
}

fn decide_directions_for_overlapping_nodes(a: &RectD, b: &RectD) -> (f64, f64) {
    let dir_x = if a.center_x() < b.center_x() {
        -1.0
    } else {
        1.0
    };
    let dir_y = if a.center_y() < b.center_y() {
        -1.0
    } else {
        1.0
    };
    (dir_x, dir_y)
}

/// Half of the translation that separates two intersecting rectangles, plus `separation_buffer`.
///
/// Moving `a` by `-result` and `b` by `+result` resolves the overlap along the center line.
pub fn calc_separation_amount(a: &RectD, b: &RectD, separation_buffer: f64) -> (f64, f64) {
    debug_assert!(a.intersects(b));

    let (dir_x, dir_y) = decide_directions_for_overlapping_nodes(a, b);

    let mut overlap_x = a.right().min(b.right()) - a.x.max(b.x);
    let mut overlap_y = a.bottom().min(b.bottom()) - a.y.max(b.y);

    if (a.x <= b.x) && (a.right() >= b.right()) {
        overlap_x += (b.x - a.x).min(a.right() - b.right());
    } else if (b.x <= a.x) && (b.right() >= a.right()) {
        overlap_x += (a.x - b.x).min(b.right() - a.right());
    }
    if (a.y <= b.y) && (a.bottom() >= b.bottom()) {
        overlap_y += (b.y - a.y).min(a.bottom() - b.bottom());
    } else if (b.y <= a.y) && (b.bottom() >= a.bottom()) {
        overlap_y += (a.y - b.y).min(b.bottom() - a.bottom());
    }

    let mut slope = ((b.center_y() - a.center_y()) / (b.center_x() - a.center_x())).abs();
    if (b.center_y() == a.center_y()) && (b.center_x() == a.center_x()) {
        slope = 1.0;
    }

    let mut move_by_y = slope * overlap_x;
    let mut move_by_x = overlap_y / slope;
    if overlap_x < move_by_x {
        move_by_x = overlap_x;
    } else {
        move_by_y = overlap_y;
    }
    if !move_by_x.is_finite() {
        move_by_x = 0.0;
    }
    if !move_by_y.is_finite() {
        move_by_y = 0.0;
    }

    let dx = -dir_x * ((move_by_x / 2.0) + separation_buffer);
    let dy = -dir_y * ((move_by_y / 2.0) + separation_buffer);
    (dx, dy)
}

/// Axis-aligned bounding box of a set of rectangles, or `None` for an empty set.
pub fn bounds_of<'a>(rects: impl IntoIterator<Item = &'a RectD>) -> Option<RectD> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for r in rects {
        min_x = min_x.min(r.x);
        min_y = min_y.min(r.y);
        max_x = max_x.max(r.right());
        max_y = max_y.max(r.bottom());
    }
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }
    Some(RectD::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// World/device coordinate mapping (layout-base `Transform`).
///
/// `inverse_transform_point` maps device (simulation) coordinates into world (caller)
/// coordinates: `world_org + (p - device_org) * world_ext / device_ext`.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub world_org: (f64, f64),
    pub world_ext: (f64, f64),
    pub device_org: (f64, f64),
    pub device_ext: (f64, f64),
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            world_org: (0.0, 0.0),
            world_ext: (1.0, 1.0),
            device_org: (0.0, 0.0),
            device_ext: (1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn translating(device_org: (f64, f64), world_org: (f64, f64)) -> Self {
        Self {
            world_org,
            device_org,
            ..Self::default()
        }
    }

    fn axis_scale(from_ext: f64, to_ext: f64) -> f64 {
        if from_ext == 0.0 {
            0.0
        } else {
            to_ext / from_ext
        }
    }

    fn affine(from_org: (f64, f64), to_org: (f64, f64), scale: (f64, f64)) -> na::Matrix3<f64> {
        na::Matrix3::new_translation(&na::Vector2::new(to_org.0, to_org.1))
            * na::Matrix3::new_nonuniform_scaling(&na::Vector2::new(scale.0, scale.1))
            * na::Matrix3::new_translation(&na::Vector2::new(-from_org.0, -from_org.1))
    }

    /// World → device.
    pub fn matrix(&self) -> na::Matrix3<f64> {
        let scale = (
            Self::axis_scale(self.world_ext.0, self.device_ext.0),
            Self::axis_scale(self.world_ext.1, self.device_ext.1),
        );
        Self::affine(self.world_org, self.device_org, scale)
    }

    /// Device → world.
    pub fn inverse_matrix(&self) -> na::Matrix3<f64> {
        let scale = (
            Self::axis_scale(self.device_ext.0, self.world_ext.0),
            Self::axis_scale(self.device_ext.1, self.world_ext.1),
        );
        Self::affine(self.device_org, self.world_org, scale)
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.matrix().transform_point(&na::Point2::new(x, y));
        (p.x, p.y)
    }

    pub fn inverse_transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.inverse_matrix().transform_point(&na::Point2::new(x, y));
        (p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_keeps_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(0.25), 1.0);
    }

    #[test]
    fn touching_rectangles_intersect() {
        let a = RectD::new(0.0, 0.0, 10.0, 10.0);
        let b = RectD::new(10.0, 0.0, 10.0, 10.0);
        let c = RectD::new(10.5, 0.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn clip_points_lie_on_facing_sides() {
        let a = RectD::new(0.0, 0.0, 10.0, 10.0);
        let b = RectD::new(30.0, 0.0, 10.0, 10.0);
        let [ax, ay, bx, by] = clip_points(&a, &b).expect("disjoint");
        assert_eq!((ax, ay), (10.0, 5.0));
        assert_eq!((bx, by), (30.0, 5.0));
        assert!(clip_points(&a, &RectD::new(5.0, 5.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn separation_pushes_along_center_line() {
        // b overlaps a from the right; separating a by -dx moves it left.
        let a = RectD::new(0.0, 0.0, 10.0, 10.0);
        let b = RectD::new(6.0, 0.0, 10.0, 10.0);
        let (dx, dy) = calc_separation_amount(&a, &b, 0.0);
        assert!((dx - 2.0).abs() < 1e-9, "dx={dx}");
        assert_eq!(dy, 0.0);
    }

    #[test]
    fn separation_of_coincident_rectangles_is_finite() {
        let a = RectD::new(0.0, 0.0, 10.0, 10.0);
        let (dx, dy) = calc_separation_amount(&a, &a, 25.0);
        assert!(dx.is_finite() && dy.is_finite());
    }

    #[test]
    fn transform_round_trips_and_translates() {
        let t = Transform::translating((100.0, 50.0), (0.0, 0.0));
        let (wx, wy) = t.inverse_transform_point(115.0, 65.0);
        assert!((wx - 15.0).abs() < 1e-9 && (wy - 15.0).abs() < 1e-9);
        let (dx, dy) = t.transform_point(wx, wy);
        assert!((dx - 115.0).abs() < 1e-9 && (dy - 65.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_of_empty_is_none() {
        assert!(bounds_of(std::iter::empty()).is_none());
        let r = bounds_of(&[RectD::new(0.0, 0.0, 1.0, 1.0), RectD::new(5.0, -2.0, 1.0, 1.0)])
            .expect("bounds");
        assert_eq!(r, RectD::new(0.0, -2.0, 6.0, 3.0));
    }
}
