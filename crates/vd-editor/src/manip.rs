//! Move, reshape and rotate of the selection.
//!
//! Every drag frame starts again from the drag-start snapshots and applies
//! one world-space delta, so rounding never accumulates and a frame that
//! lands back on the start leaves the nodes exactly as they were.

use crate::input::Pointer;
use crate::settings::Settings;
use crate::snap::{Grid, SnapMatch, constrain_point};
use crate::sprites::SpriteSub;
use crate::state::EditState;
use kurbo::{Affine, Point, Rect, Vec2};
use vd_core::SceneGraph;
use vd_core::geom::{delta_transform, is_identity_delta};

/// Smallest size a reshape may shrink the selection to, in pixels.
const MIN_SIZE: f64 = 1.0;

/// Angle quantum for unconstrained rotation, degrees.
pub const ROTATE_STEP: f64 = 15.0;

const UNIT: Vec2 = Vec2::new(1.0, 1.0);

/// Reset each selected node to its snapshot, then apply `delta`.
pub fn apply_from_snapshots(graph: &mut SceneGraph, state: &EditState, delta: Option<Affine>) {
    for (id, snap) in state.snapshots() {
        let Some(idx) = graph.index_of(id) else {
            continue;
        };
        graph.graph[idx] = snap.clone();
        if let Some(d) = delta {
            graph.apply_delta(idx, d);
        }
    }
}

fn snap_grid_point(p: Point, settings: &Settings, grid: &Grid) -> Point {
    if settings.snap_grid {
        grid.snap(p, settings.snap_zone)
    } else {
        p
    }
}

/// One move frame. Returns the guide matches to indicate.
pub fn move_drag(
    graph: &mut SceneGraph,
    state: &mut EditState,
    settings: &Settings,
    grid: &Grid,
    ptr: &Pointer,
) -> Vec<SnapMatch> {
    let target = if ptr.mods.ctrl {
        constrain_point(state.drag_start, ptr.pos).0
    } else {
        ptr.pos
    };
    state.drag_pos = ptr.pos;
    let b0 = state.bbox_start;
    let mut b = b0 + (target - state.drag_start);
    state.bbox_cur = b;

    let min = snap_grid_point(b.origin(), settings, grid);
    b = b + (min - b.origin());
    let mut matches = Vec::new();
    if settings.snap_guide {
        (b, matches) = state.align_pts.snap_bbox(b, settings.snap_zone);
    }
    state.bbox_eff = b;

    let t = b.origin() - b0.origin();
    let delta = (!is_identity_delta(t, UNIT, 0.0)).then(|| delta_transform(t, UNIT, 0.0, b0.origin()));
    apply_from_snapshots(graph, state, delta);
    matches
}

/// Drag-start bbox with the edges of `sub` pulled by `d`, each edge kept
/// at least `MIN_SIZE` from its opposite.
fn pull_edges(b0: Rect, sub: SpriteSub, d: Vec2) -> Rect {
    let (l, t, r, bt) = sub.edges();
    let mut b = b0;
    if l {
        b.x0 = (b.x0 + d.x).min(b.x1 - MIN_SIZE);
    }
    if r {
        b.x1 = (b.x1 + d.x).max(b.x0 + MIN_SIZE);
    }
    if t {
        b.y0 = (b.y0 + d.y).min(b.y1 - MIN_SIZE);
    }
    if bt {
        b.y1 = (b.y1 + d.y).max(b.y0 + MIN_SIZE);
    }
    b
}

/// Grow the short side of `b` to the aspect `ratio` (w/h), keeping the
/// corner opposite to the dragged one fixed.
fn fit_aspect(b: Rect, sub: SpriteSub, ratio: f64) -> Rect {
    let (l, t, _, _) = sub.edges();
    let (w, h) = (b.width(), b.height());
    let (w, h) = if w >= h * ratio { (w, w / ratio) } else { (h * ratio, h) };
    let mut out = b;
    if l {
        out.x0 = b.x1 - w;
    } else {
        out.x1 = b.x0 + w;
    }
    if t {
        out.y0 = b.y1 - h;
    } else {
        out.y1 = b.y0 + h;
    }
    out
}

fn scale_of(b: Rect, b0: Rect) -> Vec2 {
    let sx = if b0.width() > f64::EPSILON { b.width() / b0.width() } else { 1.0 };
    let sy = if b0.height() > f64::EPSILON { b.height() / b0.height() } else { 1.0 };
    Vec2::new(sx, sy)
}

/// One reshape frame through handle `sub`. With Ctrl on a corner, the box
/// is squared when the only selected node is a rect, ellipse or circle,
/// and kept at its starting proportions otherwise.
pub fn reshape_drag(
    graph: &mut SceneGraph,
    state: &mut EditState,
    settings: &Settings,
    grid: &Grid,
    ptr: &Pointer,
    sub: SpriteSub,
) -> Vec<SnapMatch> {
    state.drag_pos = ptr.pos;
    let b0 = state.bbox_start;
    let mut b = pull_edges(b0, sub, ptr.pos - state.drag_start);
    state.bbox_cur = b;

    let (l, t, r, bt) = sub.edges();
    let corner = Point::new(if l { b.x0 } else { b.x1 }, if t { b.y0 } else { b.y1 });
    let mut snapped = snap_grid_point(corner, settings, grid);
    let mut matches = Vec::new();
    if settings.snap_guide {
        (snapped, matches) = state.align_pts.snap_point(snapped, settings.snap_zone);
    }
    b = pull_edges(b, sub, snapped - corner);
    // Axes the handle does not move keep their extent.
    if !(l || r) {
        b.x0 = b0.x0;
        b.x1 = b0.x1;
    }
    if !(t || bt) {
        b.y0 = b0.y0;
        b.y1 = b0.y1;
    }

    if ptr.mods.ctrl && sub.is_corner() {
        let ratio = if sole_round_or_rect(graph, state) || b0.width() <= f64::EPSILON || b0.height() <= f64::EPSILON {
            1.0
        } else {
            b0.width() / b0.height()
        };
        b = fit_aspect(b, sub, ratio);
    }
    state.bbox_eff = b;

    let t = b.origin() - b0.origin();
    let s = scale_of(b, b0);
    let delta = (!is_identity_delta(t, s, 0.0)).then(|| delta_transform(t, s, 0.0, b0.origin()));
    apply_from_snapshots(graph, state, delta);
    matches
}

fn sole_round_or_rect(graph: &SceneGraph, state: &EditState) -> bool {
    use vd_core::NodeKind;
    let ids = state.selected_ids();
    ids.len() == 1
        && ids.iter().all(|&id| {
            graph.get_by_id(id).is_some_and(|n| {
                matches!(
                    n.kind,
                    NodeKind::Rect { .. } | NodeKind::Ellipse { .. } | NodeKind::Circle { .. }
                )
            })
        })
}

/// Pivot for rotating through handle `sub`: the opposite corner for a
/// corner handle, the center for a mid handle.
pub fn rotate_pivot(b: Rect, sub: SpriteSub) -> Point {
    let opposite = match sub {
        SpriteSub::UpL => SpriteSub::DnR,
        SpriteSub::UpR => SpriteSub::DnL,
        SpriteSub::DnL => SpriteSub::UpR,
        SpriteSub::DnR => SpriteSub::UpL,
        _ => return b.center(),
    };
    opposite.handle_point(b).unwrap_or(b.center())
}

/// Rotation angle in degrees for an incremental pointer delta on handle
/// `sub`, quantized to `ROTATE_STEP` unless `free`.
pub fn rotate_angle(delta: Vec2, sub: SpriteSub, free: bool) -> f64 {
    let sx = if matches!(sub, SpriteSub::UpL | SpriteSub::DnL | SpriteSub::LfM) { -1.0 } else { 1.0 };
    let sy = if matches!(sub, SpriteSub::UpL | SpriteSub::UpC | SpriteSub::UpR) { -1.0 } else { 1.0 };
    let deg = (sy * delta.y).atan2(sx * delta.x).to_degrees();
    if free { deg } else { (deg / ROTATE_STEP).round() * ROTATE_STEP }
}

/// One rotate frame. Returns the applied angle in degrees.
pub fn rotate_drag(graph: &mut SceneGraph, state: &mut EditState, ptr: &Pointer, sub: SpriteSub) -> f64 {
    state.drag_pos = ptr.pos;
    let deg = rotate_angle(ptr.prev_delta, sub, ptr.mods.shift);
    let pivot = rotate_pivot(state.bbox_start, sub);
    let rad = deg.to_radians();
    let delta = (!is_identity_delta(Vec2::ZERO, UNIT, rad)).then(|| delta_transform(Vec2::ZERO, UNIT, rad, pivot));
    apply_from_snapshots(graph, state, delta);
    deg
}
