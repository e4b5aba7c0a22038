//! Geometry helpers shared by the scene graph and the editor.
//!
//! All world-space geometry is in screen pixels: the view transform is the
//! outermost factor of every node's world transform.

use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// Emit a number with at most four decimals and no trailing zeros.
pub fn format_num(v: f64) -> String {
    let r = (v * 10_000.0).round() / 10_000.0;
    if r == 0.0 {
        return "0".to_string();
    }
    if r.fract() == 0.0 && r.abs() < 1e15 {
        format!("{}", r as i64)
    } else {
        format!("{r}")
    }
}

// ─── BBox reference points ───────────────────────────────────────────────

/// The six alignment positions of a bounding box. The first three are
/// x-coordinates, the last three y-coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BBoxPoint {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

impl BBoxPoint {
    pub const ALL: [BBoxPoint; 6] = [
        BBoxPoint::Left,
        BBoxPoint::Center,
        BBoxPoint::Right,
        BBoxPoint::Top,
        BBoxPoint::Middle,
        BBoxPoint::Bottom,
    ];

    pub const HORIZ: [BBoxPoint; 3] = [BBoxPoint::Left, BBoxPoint::Center, BBoxPoint::Right];
    pub const VERT: [BBoxPoint; 3] = [BBoxPoint::Top, BBoxPoint::Middle, BBoxPoint::Bottom];

    /// True for the x-coordinate kinds.
    pub fn is_horiz(self) -> bool {
        matches!(self, BBoxPoint::Left | BBoxPoint::Center | BBoxPoint::Right)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The coordinate of this kind on `r`.
    pub fn value(self, r: Rect) -> f64 {
        match self {
            BBoxPoint::Left => r.x0,
            BBoxPoint::Center => 0.5 * (r.x0 + r.x1),
            BBoxPoint::Right => r.x1,
            BBoxPoint::Top => r.y0,
            BBoxPoint::Middle => 0.5 * (r.y0 + r.y1),
            BBoxPoint::Bottom => r.y1,
        }
    }

    /// Translate `r` (size preserved) so that this kind's coordinate equals `v`.
    pub fn set_value(self, r: Rect, v: f64) -> Rect {
        let d = v - self.value(r);
        if self.is_horiz() {
            r + Vec2::new(d, 0.0)
        } else {
            r + Vec2::new(0.0, d)
        }
    }
}

// ─── Delta transforms ────────────────────────────────────────────────────

/// World-space delta transform: `p' = R·S·(p − pivot) + pivot + trans`.
/// `rot` is in radians.
pub fn delta_transform(trans: Vec2, scale: Vec2, rot: f64, pivot: Point) -> Affine {
    Affine::translate(pivot.to_vec2() + trans)
        * Affine::rotate(rot)
        * Affine::scale_non_uniform(scale.x, scale.y)
        * Affine::translate(-pivot.to_vec2())
}

/// Whether a delta would leave geometry untouched.
pub fn is_identity_delta(trans: Vec2, scale: Vec2, rot: f64) -> bool {
    trans.x.abs() < EPS
        && trans.y.abs() < EPS
        && (scale.x - 1.0).abs() < EPS
        && (scale.y - 1.0).abs() < EPS
        && rot.abs() < EPS
}

/// True when the transform has no rotation or skew component.
pub fn is_axis_aligned(xf: Affine) -> bool {
    let c = xf.as_coeffs();
    c[1].abs() < EPS && c[2].abs() < EPS
}

/// Linear (non-translating) part of a transform applied to a vector.
pub fn transform_vec(xf: Affine, v: Vec2) -> Vec2 {
    let c = xf.as_coeffs();
    Vec2::new(c[0] * v.x + c[2] * v.y, c[1] * v.x + c[3] * v.y)
}

// ─── Rect helpers ────────────────────────────────────────────────────────

/// Round to whole pixels, as cached on nodes.
pub fn pixel_rect(r: Rect) -> Rect {
    r.round()
}

pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Union of a sequence of rects; `None` when empty.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|a, b| a.union(b))
}
