//! Grid, guide and node snapping, plus the Ctrl axis constraint.
//!
//! All distances are screen pixels.

use kurbo::{Affine, Point, Rect, Vec2};
use std::collections::HashSet;
use vd_core::{BBoxPoint, NodeId, SceneGraph, WalkControl};

/// Ties closer than this count as the same distance.
const TIE_EPS: f64 = 1e-4;

/// Most match lines drawn per axis.
pub const MAX_MATCHES: usize = 4;

/// Round `v` to the nearest `offset + k·incr`, but only when that is
/// within `zone`; otherwise return `v` unchanged.
pub fn snap_to_incr(v: f64, offset: f64, incr: f64, zone: f64) -> f64 {
    if incr <= 0.0 {
        return v;
    }
    let snapped = offset + ((v - offset) / incr).round() * incr;
    if (snapped - v).abs() <= zone {
        snapped
    } else {
        v
    }
}

/// Screen-space grid: the document grid mapped through the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub offset: Vec2,
    pub incr: f64,
}

impl Grid {
    /// Grid of `spacing` document units under `view` (scale + translate).
    pub fn from_view(view: Affine, spacing: f64) -> Self {
        let [zoom, _, _, _, tx, ty] = view.as_coeffs();
        Self {
            offset: Vec2::new(tx, ty),
            incr: spacing * zoom.abs(),
        }
    }

    pub fn snap(&self, p: Point, zone: f64) -> Point {
        Point::new(
            snap_to_incr(p.x, self.offset.x, self.incr, zone),
            snap_to_incr(p.y, self.offset.y, self.incr, zone),
        )
    }
}

/// Snap a value to the nearest candidate within `zone`.
pub fn snap_value(v: f64, candidates: impl IntoIterator<Item = f64>, zone: f64) -> f64 {
    candidates
        .into_iter()
        .map(|c| (c, (c - v).abs()))
        .filter(|(_, d)| *d <= zone)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(v, |(c, _)| c)
}

/// Snap a point to other path nodes, per axis.
pub fn snap_to_nodes(p: Point, nodes: &[Point], zone: f64) -> Point {
    Point::new(
        snap_value(p.x, nodes.iter().map(|n| n.x), zone),
        snap_value(p.y, nodes.iter().map(|n| n.y), zone),
    )
}

// ─── Alignment guides ────────────────────────────────────────────────────

/// One guide candidate: a coordinate plus the point it came from, used to
/// draw the match line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignCand {
    pub value: f64,
    pub at: Point,
}

/// A guide match to indicate: from the snapped point to the candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapMatch {
    pub from: Point,
    pub to: Point,
}

/// Candidate coordinates of the six bbox point kinds, gathered from every
/// node that is not being dragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignPoints {
    pts: [Vec<AlignCand>; 6],
}

/// The point of `r` a kind refers to; horizontal kinds sit on the middle
/// row, vertical kinds on the center column.
fn kind_point(kind: BBoxPoint, r: Rect) -> Point {
    let c = r.center();
    if kind.is_horiz() {
        Point::new(kind.value(r), c.y)
    } else {
        Point::new(c.x, kind.value(r))
    }
}

impl AlignPoints {
    /// Walk the scene, skipping selected subtrees, definitions and layer
    /// groups themselves.
    pub fn gather(graph: &SceneGraph, selected: &HashSet<NodeId>) -> Self {
        let mut out = Self::default();
        graph.walk(graph.root, |idx, node| {
            if idx == graph.root || node.is_layer() {
                return WalkControl::Continue;
            }
            if node.kind.is_definition() || selected.contains(&node.id) {
                return WalkControl::SkipChildren;
            }
            if node.bbox != Rect::ZERO {
                out.add(node.bbox);
            }
            WalkControl::Continue
        });
        out
    }

    pub fn add(&mut self, r: Rect) {
        for kind in BBoxPoint::ALL {
            self.pts[kind.index()].push(AlignCand {
                value: kind.value(r),
                at: kind_point(kind, r),
            });
        }
    }

    pub fn get(&self, kind: BBoxPoint) -> &[AlignCand] {
        &self.pts[kind.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.pts.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        for v in &mut self.pts {
            v.clear();
        }
    }

    fn axis(&self, horiz: bool) -> impl Iterator<Item = &AlignCand> {
        let kinds = if horiz { BBoxPoint::HORIZ } else { BBoxPoint::VERT };
        kinds.into_iter().flat_map(move |k| self.get(k).iter())
    }

    /// Best shift along one axis for the given sample points, with every
    /// tied candidate.
    fn best_shift(&self, horiz: bool, samples: &[Point], zone: f64) -> Option<(f64, Vec<SnapMatch>)> {
        let coord = |p: Point| if horiz { p.x } else { p.y };
        let mut best: Option<f64> = None;
        let mut hits: Vec<(Point, AlignCand, f64)> = Vec::new();
        for &sample in samples {
            for cand in self.axis(horiz) {
                let shift = cand.value - coord(sample);
                let dist = shift.abs();
                match best {
                    Some(b) if dist > b + TIE_EPS => {}
                    Some(b) if dist >= b - TIE_EPS => hits.push((sample, *cand, shift)),
                    _ => {
                        best = Some(dist);
                        hits.clear();
                        hits.push((sample, *cand, shift));
                    }
                }
            }
        }
        let best = best.filter(|b| *b <= zone)?;
        // All ties share the magnitude; follow the first one's direction.
        let shift = hits.first().map_or(0.0, |h| h.2);
        let matches = hits
            .iter()
            .filter(|h| (h.2 - shift).abs() <= TIE_EPS)
            .take(MAX_MATCHES)
            .map(|(sample, cand, _)| {
                let from = if horiz {
                    Point::new(sample.x + shift, sample.y)
                } else {
                    Point::new(sample.x, sample.y + shift)
                };
                SnapMatch { from, to: cand.at }
            })
            .collect();
        log::trace!("guide snap {} by {shift} (dist {best})", if horiz { "x" } else { "y" });
        Some((shift, matches))
    }

    /// Snap a moving bbox: any of its six points may match a candidate.
    pub fn snap_bbox(&self, r: Rect, zone: f64) -> (Rect, Vec<SnapMatch>) {
        let mut matches = Vec::new();
        let mut shift = Vec2::ZERO;
        let hp: Vec<Point> = BBoxPoint::HORIZ.iter().map(|k| kind_point(*k, r)).collect();
        if let Some((dx, m)) = self.best_shift(true, &hp, zone) {
            shift.x = dx;
            matches.extend(m);
        }
        let vp: Vec<Point> = BBoxPoint::VERT.iter().map(|k| kind_point(*k, r)).collect();
        if let Some((dy, m)) = self.best_shift(false, &vp, zone) {
            shift.y = dy;
            matches.extend(m);
        }
        (r + shift, matches)
    }

    /// Snap a single point against all candidates.
    pub fn snap_point(&self, p: Point, zone: f64) -> (Point, Vec<SnapMatch>) {
        let mut out = p;
        let mut matches = Vec::new();
        if let Some((dx, m)) = self.best_shift(true, &[p], zone) {
            out.x += dx;
            matches.extend(m);
        }
        if let Some((dy, m)) = self.best_shift(false, &[p], zone) {
            out.y += dy;
            matches.extend(m);
        }
        (out, matches)
    }
}

// ─── Axis constraint ─────────────────────────────────────────────────────

/// Project `p` onto the nearest of the four canonical rays from `start`:
/// pure X, pure Y and the two diagonals. Returns the constrained point and
/// whether the winner was a diagonal.
pub fn constrain_point(start: Point, p: Point) -> (Point, bool) {
    let d = p - start;
    let t1 = (d.x + d.y) / 2.0;
    let t2 = (d.x - d.y) / 2.0;
    let options = [
        (Vec2::new(d.x, 0.0), false),
        (Vec2::new(0.0, d.y), false),
        (Vec2::new(t1, t1), true),
        (Vec2::new(t2, -t2), true),
    ];
    let (best, diag) = options
        .into_iter()
        .min_by(|a, b| (a.0 - d).hypot2().total_cmp(&(b.0 - d).hypot2()))
        .unwrap_or((d, false));
    (start + best, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn incr_snaps_within_zone_only() {
        assert_eq!(snap_to_incr(8.0, 0.0, 10.0, 3.0), 10.0);
        assert_eq!(snap_to_incr(11.0, 0.0, 10.0, 3.0), 10.0);
        assert_eq!(snap_to_incr(15.0, 0.0, 10.0, 3.0), 15.0);
        assert_eq!(snap_to_incr(7.0, 2.0, 5.0, 3.0), 7.0);
        assert_eq!(snap_to_incr(-8.0, 0.0, 10.0, 3.0), -10.0);
    }

    #[test]
    fn grid_follows_view() {
        let g = Grid::from_view(Affine::translate((3.0, 0.0)) * Affine::scale(2.0), 10.0);
        assert_eq!(g.incr, 20.0);
        assert_eq!(g.snap(Point::new(24.0, 19.0), 2.0), Point::new(23.0, 20.0));
    }

    #[test]
    fn value_snap_picks_nearest() {
        assert_eq!(snap_value(10.0, [13.0, 11.5, 30.0], 3.0), 11.5);
        assert_eq!(snap_value(10.0, [20.0], 3.0), 10.0);
        assert_eq!(
            snap_to_nodes(Point::new(1.0, 9.0), &[Point::new(0.0, 50.0), Point::new(40.0, 10.0)], 2.0),
            Point::new(0.0, 10.0)
        );
    }

    #[test]
    fn bbox_snaps_to_nearest_edge_with_matches() {
        let mut pts = AlignPoints::default();
        pts.add(Rect::new(100.0, 0.0, 120.0, 20.0));
        let (r, m) = pts.snap_bbox(Rect::new(60.0, 50.0, 97.0, 60.0), 5.0);
        // right edge 97 → left edge 100
        assert_eq!(r, Rect::new(63.0, 50.0, 100.0, 60.0));
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].to, Point::new(100.0, 10.0));
        assert_eq!(m[0].from, Point::new(100.0, 55.0));
    }

    #[test]
    fn out_of_zone_is_untouched() {
        let mut pts = AlignPoints::default();
        pts.add(Rect::new(100.0, 100.0, 120.0, 120.0));
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(pts.snap_bbox(r, 5.0), (r, vec![]));
        let (p, m) = pts.snap_point(Point::new(108.0, 50.0), 3.0);
        assert_eq!(p, Point::new(110.0, 50.0));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn ties_report_every_match() {
        let mut pts = AlignPoints::default();
        pts.add(Rect::new(0.0, 0.0, 10.0, 10.0));
        pts.add(Rect::new(0.0, 40.0, 30.0, 50.0));
        let (p, m) = pts.snap_point(Point::new(1.0, 25.0), 3.0);
        assert_eq!(p, Point::new(0.0, 25.0));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn constraint_picks_nearest_ray() {
        let s = Point::new(5.0, 5.0);
        assert_eq!(constrain_point(s, Point::new(27.0, 4.0)), (Point::new(27.0, 5.0), false));
        assert_eq!(constrain_point(s, Point::new(6.0, 30.0)), (Point::new(5.0, 30.0), false));
        assert_eq!(constrain_point(s, Point::new(15.0, 16.0)), (Point::new(15.5, 15.5), true));
        assert_eq!(constrain_point(s, Point::new(-5.0, 15.0)), (Point::new(-5.0, 15.0), true));
    }

    /// Lines through `start` at 0°, 90°, 45° and 135°, as unit directions.
    fn canonical_dirs() -> [Vec2; 4] {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        [Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(h, h), Vec2::new(h, -h)]
    }

    proptest! {
        #[test]
        fn value_snap_is_idempotent(
            v in -1.0e4..1.0e4f64,
            cands in prop::collection::vec(-1.0e4..1.0e4f64, 0..8),
            zone in 0.0..20.0f64,
        ) {
            let once = snap_value(v, cands.iter().copied(), zone);
            prop_assert_eq!(snap_value(once, cands.iter().copied(), zone), once);
        }

        #[test]
        fn incr_snap_is_idempotent(
            v in -1.0e4..1.0e4f64,
            offset in -50.0..50.0f64,
            incr in 0.5..100.0f64,
            zone in 0.0..20.0f64,
        ) {
            let once = snap_to_incr(v, offset, incr, zone);
            prop_assert_eq!(snap_to_incr(once, offset, incr, zone), once);

            let grid = Grid { offset: Vec2::new(offset, -offset), incr };
            let p = grid.snap(Point::new(v, -v), zone);
            prop_assert_eq!(grid.snap(p, zone), p);
        }

        #[test]
        fn constraint_lands_on_the_nearest_line(
            sx in -500.0..500.0f64,
            sy in -500.0..500.0f64,
            px in -500.0..500.0f64,
            py in -500.0..500.0f64,
        ) {
            let (start, p) = (Point::new(sx, sy), Point::new(px, py));
            let (out, diag) = constrain_point(start, p);
            let d = out - start;
            let tol = 1e-9 * (1.0 + (p - start).hypot());

            // The result sits on one of the four lines.
            let off_line = canonical_dirs()
                .iter()
                .map(|u| (d - *u * d.dot(*u)).hypot())
                .fold(f64::INFINITY, f64::min);
            prop_assert!(off_line <= tol, "{out:?} is off every line ({off_line})");
            if diag {
                prop_assert!((d.x.abs() - d.y.abs()).abs() <= tol);
            }

            // And no other line's projection is closer to the pointer.
            let got = (p - out).hypot();
            for u in canonical_dirs() {
                let proj = start + u * (p - start).dot(u);
                prop_assert!(got <= (p - proj).hypot() + tol, "{proj:?} beats {out:?}");
            }
        }
    }
}
