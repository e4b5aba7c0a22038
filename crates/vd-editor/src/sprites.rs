//! Sprites: the interactive overlay of handles, boxes and indicators.
//!
//! Every sprite is addressed by `(kind, sub, index)`, which yields a
//! deterministic name. The store sits behind an explicit lock: mutations
//! go through `lock()`, and `nolock()` is only for callers that already
//! hold the store exclusively.

use crate::snap::SnapMatch;
use crate::state::CtrlKind;
use kurbo::{Point, Rect};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use vd_core::model::Color;
use vd_core::{PathNode, PathOp};
use vd_render::{Paint, Painter};

/// Side of a square handle, in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;

const HANDLE_COLOR: Color = Color::rgba(0.2, 0.4, 0.9, 1.0);
const ACTIVE_COLOR: Color = Color::rgba(0.95, 0.45, 0.1, 1.0);
const GUIDE_COLOR: Color = Color::rgba(0.9, 0.1, 0.6, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpriteKind {
    /// Corner and mid handles around the selection.
    ReshapeBox,
    /// The selection outline itself.
    SelBox,
    NodePoint,
    NodeCtrl,
    RubberBand,
    AlignMatch,
    LineAdd,
}

impl SpriteKind {
    pub fn name(self) -> &'static str {
        match self {
            SpriteKind::ReshapeBox => "reshape",
            SpriteKind::SelBox => "sel-box",
            SpriteKind::NodePoint => "node-point",
            SpriteKind::NodeCtrl => "node-ctrl",
            SpriteKind::RubberBand => "rubber-band",
            SpriteKind::AlignMatch => "align-match",
            SpriteKind::LineAdd => "line-add",
        }
    }

    /// Hit priority; zero means display only.
    fn priority(self) -> u8 {
        match self {
            SpriteKind::NodeCtrl => 3,
            SpriteKind::NodePoint => 2,
            SpriteKind::ReshapeBox => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpriteSub {
    None,
    UpL,
    UpC,
    UpR,
    DnL,
    DnC,
    DnR,
    LfM,
    RtM,
    Move,
    Line,
    Quad,
    Cube,
    Quad1,
    Cube1,
    Cube2,
}

impl SpriteSub {
    /// The eight reshape handle positions.
    pub const HANDLES: [SpriteSub; 8] = [
        SpriteSub::UpL,
        SpriteSub::UpC,
        SpriteSub::UpR,
        SpriteSub::DnL,
        SpriteSub::DnC,
        SpriteSub::DnR,
        SpriteSub::LfM,
        SpriteSub::RtM,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpriteSub::None => "none",
            SpriteSub::UpL => "upl",
            SpriteSub::UpC => "upc",
            SpriteSub::UpR => "upr",
            SpriteSub::DnL => "dnl",
            SpriteSub::DnC => "dnc",
            SpriteSub::DnR => "dnr",
            SpriteSub::LfM => "lfm",
            SpriteSub::RtM => "rtm",
            SpriteSub::Move => "move",
            SpriteSub::Line => "line",
            SpriteSub::Quad => "quad",
            SpriteSub::Cube => "cube",
            SpriteSub::Quad1 => "quad1",
            SpriteSub::Cube1 => "cube1",
            SpriteSub::Cube2 => "cube2",
        }
    }

    /// Where a reshape handle sits on `r`.
    pub fn handle_point(self, r: Rect) -> Option<Point> {
        let c = r.center();
        let p = match self {
            SpriteSub::UpL => Point::new(r.x0, r.y0),
            SpriteSub::UpC => Point::new(c.x, r.y0),
            SpriteSub::UpR => Point::new(r.x1, r.y0),
            SpriteSub::DnL => Point::new(r.x0, r.y1),
            SpriteSub::DnC => Point::new(c.x, r.y1),
            SpriteSub::DnR => Point::new(r.x1, r.y1),
            SpriteSub::LfM => Point::new(r.x0, c.y),
            SpriteSub::RtM => Point::new(r.x1, c.y),
            _ => return None,
        };
        Some(p)
    }

    /// Which bbox edges a reshape handle drags: (left, top, right, bottom).
    pub fn edges(self) -> (bool, bool, bool, bool) {
        match self {
            SpriteSub::UpL => (true, true, false, false),
            SpriteSub::UpC => (false, true, false, false),
            SpriteSub::UpR => (false, true, true, false),
            SpriteSub::DnL => (true, false, false, true),
            SpriteSub::DnC => (false, false, false, true),
            SpriteSub::DnR => (false, false, true, true),
            SpriteSub::LfM => (true, false, false, false),
            SpriteSub::RtM => (false, false, true, false),
            _ => (false, false, false, false),
        }
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            SpriteSub::UpL | SpriteSub::UpR | SpriteSub::DnL | SpriteSub::DnR
        )
    }

    pub fn from_op(op: PathOp) -> Self {
        match op {
            PathOp::MoveTo => SpriteSub::Move,
            PathOp::LineTo => SpriteSub::Line,
            PathOp::QuadTo => SpriteSub::Quad,
            PathOp::CubeTo => SpriteSub::Cube,
            PathOp::Close => SpriteSub::None,
        }
    }

    pub fn ctrl_kind(self) -> Option<CtrlKind> {
        match self {
            SpriteSub::Quad1 => Some(CtrlKind::Quad1),
            SpriteSub::Cube1 => Some(CtrlKind::Cube1),
            SpriteSub::Cube2 => Some(CtrlKind::Cube2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteKey {
    pub kind: SpriteKind,
    pub sub: SpriteSub,
    pub index: usize,
}

impl SpriteKey {
    pub fn new(kind: SpriteKind, sub: SpriteSub, index: usize) -> Self {
        Self { kind, sub, index }
    }

    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.kind.name(), self.sub.name(), self.index)
    }
}

pub type DrawFn = fn(&Sprite, &mut dyn Painter);

#[derive(Debug, Clone)]
pub struct Sprite {
    pub key: SpriteKey,
    /// Event-hit rectangle, screen pixels.
    pub rect: Rect,
    /// Dependent positions, e.g. the endpoint a control handle hangs off.
    pub props: BTreeMap<&'static str, Point>,
    /// Highlighted (a selected path node).
    pub active: bool,
    pub draw: DrawFn,
}

impl Sprite {
    pub fn new(key: SpriteKey, rect: Rect, draw: DrawFn) -> Self {
        Self {
            key,
            rect,
            props: BTreeMap::new(),
            active: false,
            draw,
        }
    }

    pub fn with_prop(mut self, key: &'static str, p: Point) -> Self {
        self.props.insert(key, p);
        self
    }

    pub fn prop(&self, key: &str) -> Option<Point> {
        self.props.get(key).copied()
    }

    /// Inclusive containment; handles are small enough that edges matter.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.rect.x0 && p.x <= self.rect.x1 && p.y >= self.rect.y0 && p.y <= self.rect.y1
    }
}

fn handle_rect(p: Point) -> Rect {
    Rect::from_center_size(p, (HANDLE_SIZE, HANDLE_SIZE))
}

// ─── Draw callbacks ──────────────────────────────────────────────────────

fn draw_handle(s: &Sprite, pc: &mut dyn Painter) {
    pc.blit_box(s.rect, if s.active { ACTIVE_COLOR } else { HANDLE_COLOR });
}

fn draw_ctrl(s: &Sprite, pc: &mut dyn Painter) {
    if let Some(end) = s.prop("end") {
        pc.set_fill(None);
        pc.set_stroke(Some(Paint::Solid(HANDLE_COLOR)), 1.0, &[]);
        pc.move_to(end);
        pc.line_to(s.rect.center());
        pc.draw();
    }
    pc.set_fill(Some(Paint::Solid(Color::WHITE)));
    pc.set_stroke(Some(Paint::Solid(HANDLE_COLOR)), 1.0, &[]);
    pc.circle(s.rect.center(), HANDLE_SIZE / 2.0);
    pc.draw();
}

fn draw_outline(s: &Sprite, pc: &mut dyn Painter) {
    pc.set_fill(None);
    pc.set_stroke(Some(Paint::Solid(HANDLE_COLOR)), 1.0, &[4.0, 4.0]);
    pc.rectangle(s.rect);
    pc.draw();
}

fn draw_segment(s: &Sprite, pc: &mut dyn Painter) {
    let (Some(from), Some(to)) = (s.prop("from"), s.prop("to")) else {
        return;
    };
    let color = if s.key.kind == SpriteKind::AlignMatch {
        GUIDE_COLOR
    } else {
        HANDLE_COLOR
    };
    pc.set_fill(None);
    pc.set_stroke(Some(Paint::Solid(color)), 1.0, &[]);
    pc.move_to(from);
    pc.line_to(to);
    pc.draw();
}

// ─── Sprite map ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SpriteMap {
    sprites: BTreeMap<String, Sprite>,
}

impl SpriteMap {
    pub fn insert(&mut self, sprite: Sprite) -> String {
        let name = sprite.key.name();
        self.sprites.insert(name.clone(), sprite);
        name
    }

    pub fn get(&self, key: &SpriteKey) -> Option<&Sprite> {
        self.sprites.get(&key.name())
    }

    pub fn remove(&mut self, key: &SpriteKey) -> Option<Sprite> {
        self.sprites.remove(&key.name())
    }

    pub fn remove_kind(&mut self, kind: SpriteKind) {
        self.sprites.retain(|_, s| s.key.kind != kind);
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn count(&self, kind: SpriteKind) -> usize {
        self.sprites.values().filter(|s| s.key.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites.values()
    }

    /// Interactive sprite under `p`. Control handles beat node handles,
    /// which beat reshape handles.
    pub fn hit(&self, p: Point) -> Option<SpriteKey> {
        self.sprites
            .values()
            .filter(|s| s.key.kind.priority() > 0 && s.contains(p))
            .max_by_key(|s| s.key.kind.priority())
            .map(|s| s.key)
    }

    /// Draw everything, display boxes under handles.
    pub fn draw_all(&self, pc: &mut dyn Painter) {
        let mut order: Vec<&Sprite> = self.sprites.values().collect();
        order.sort_by_key(|s| s.key.kind.priority());
        for s in order {
            (s.draw)(s, pc);
        }
    }

    // ─── Builders ────────────────────────────────────────────────────────

    /// Show (or with `None` hide) the selection box and its handles.
    pub fn set_reshape_box(&mut self, bbox: Option<Rect>) {
        self.remove_kind(SpriteKind::ReshapeBox);
        self.remove_kind(SpriteKind::SelBox);
        let Some(r) = bbox else {
            return;
        };
        self.insert(Sprite::new(
            SpriteKey::new(SpriteKind::SelBox, SpriteSub::None, 0),
            r,
            draw_outline,
        ));
        for sub in SpriteSub::HANDLES {
            if let Some(p) = sub.handle_point(r) {
                let key = SpriteKey::new(SpriteKind::ReshapeBox, sub, 0);
                self.insert(Sprite::new(key, handle_rect(p), draw_handle));
            }
        }
    }

    /// Node and control handles for a path display list.
    pub fn set_node_handles(&mut self, records: &[PathNode], selected: &BTreeSet<usize>) {
        self.remove_kind(SpriteKind::NodePoint);
        self.remove_kind(SpriteKind::NodeCtrl);
        let mut prev_end: Option<Point> = None;
        for rec in records {
            let i = rec.point_index;
            let mut point = Sprite::new(
                SpriteKey::new(SpriteKind::NodePoint, SpriteSub::from_op(rec.op), i),
                handle_rect(rec.world_end),
                draw_handle,
            )
            .with_prop("end", rec.world_end);
            point.active = selected.contains(&i);
            self.insert(point);

            let start = prev_end.unwrap_or(rec.world_end);
            let ctrls = match rec.op {
                PathOp::QuadTo => [(SpriteSub::Quad1, rec.world_cp1, rec.world_end), (SpriteSub::None, None, start)],
                PathOp::CubeTo => [(SpriteSub::Cube1, rec.world_cp1, start), (SpriteSub::Cube2, rec.world_cp2, rec.world_end)],
                _ => [(SpriteSub::None, None, start), (SpriteSub::None, None, start)],
            };
            for (sub, cp, end) in ctrls {
                if let Some(cp) = cp {
                    self.insert(
                        Sprite::new(SpriteKey::new(SpriteKind::NodeCtrl, sub, i), handle_rect(cp), draw_ctrl)
                            .with_prop("end", end),
                    );
                }
            }
            prev_end = Some(rec.world_end);
        }
    }

    pub fn set_rubber_band(&mut self, r: Option<Rect>) {
        self.remove_kind(SpriteKind::RubberBand);
        if let Some(r) = r {
            let key = SpriteKey::new(SpriteKind::RubberBand, SpriteSub::None, 0);
            self.insert(Sprite::new(key, r, draw_outline));
        }
    }

    /// Replace the guide match indicators.
    pub fn set_matches(&mut self, matches: &[SnapMatch]) {
        self.remove_kind(SpriteKind::AlignMatch);
        for (i, m) in matches.iter().enumerate() {
            let key = SpriteKey::new(SpriteKind::AlignMatch, SpriteSub::None, i);
            self.insert(
                Sprite::new(key, Rect::from_points(m.from, m.to), draw_segment)
                    .with_prop("from", m.from)
                    .with_prop("to", m.to),
            );
        }
    }

    /// Bezier tool preview from the last node to the pointer.
    pub fn set_line_add(&mut self, seg: Option<(Point, Point)>) {
        self.remove_kind(SpriteKind::LineAdd);
        if let Some((from, to)) = seg {
            let key = SpriteKey::new(SpriteKind::LineAdd, SpriteSub::None, 0);
            self.insert(
                Sprite::new(key, Rect::from_points(from, to), draw_segment)
                    .with_prop("from", from)
                    .with_prop("to", to),
            );
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SpriteStore {
    inner: Mutex<SpriteMap>,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, SpriteMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct access for a caller that owns the store exclusively.
    pub fn nolock(&mut self) -> &mut SpriteMap {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render every sprite; callbacks run under the lock.
    pub fn draw(&self, pc: &mut dyn Painter) {
        self.lock().draw_all(pc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vd_core::{PathCmd, PathData, path_nodes};
    use vd_render::Recorder;

    #[test]
    fn names_are_deterministic() {
        let key = SpriteKey::new(SpriteKind::NodeCtrl, SpriteSub::Cube2, 3);
        assert_eq!(key.name(), "node-ctrl-cube2-3");
    }

    #[test]
    fn reshape_box_has_eight_handles() {
        let mut map = SpriteMap::default();
        map.set_reshape_box(Some(Rect::new(0.0, 0.0, 100.0, 50.0)));
        assert_eq!(map.count(SpriteKind::ReshapeBox), 8);
        assert_eq!(map.count(SpriteKind::SelBox), 1);
        let hit = map.hit(Point::new(101.0, 49.0)).unwrap();
        assert_eq!(hit.sub, SpriteSub::DnR);
        assert_eq!(map.hit(Point::new(50.0, 25.0)), None);
        map.set_reshape_box(None);
        assert!(map.is_empty());
    }

    #[test]
    fn control_handles_track_their_endpoints() {
        let data = PathData::from_cmds(&[
            PathCmd::MoveTo(0.0, 0.0),
            PathCmd::CubeTo(2.0, 0.0, 20.0, 10.0, 30.0, 10.0),
        ]);
        let recs = path_nodes(&data, kurbo::Affine::IDENTITY);
        let mut map = SpriteMap::default();
        map.set_node_handles(&recs, &BTreeSet::from([1]));
        assert_eq!(map.count(SpriteKind::NodePoint), 2);
        assert_eq!(map.count(SpriteKind::NodeCtrl), 2);
        let c1 = map.get(&SpriteKey::new(SpriteKind::NodeCtrl, SpriteSub::Cube1, 1)).unwrap();
        assert_eq!(c1.prop("end"), Some(Point::ZERO));
        let c2 = map.get(&SpriteKey::new(SpriteKind::NodeCtrl, SpriteSub::Cube2, 1)).unwrap();
        assert_eq!(c2.prop("end"), Some(Point::new(30.0, 10.0)));
        assert!(map.get(&SpriteKey::new(SpriteKind::NodePoint, SpriteSub::Cube, 1)).unwrap().active);
        // The control wins where it overlaps the endpoint handle
        let key = map.hit(Point::new(1.0, 0.0)).unwrap();
        assert_eq!(key.kind, SpriteKind::NodeCtrl);
    }

    #[test]
    fn store_draws_under_lock() {
        let mut store = SpriteStore::new();
        store.nolock().set_rubber_band(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
        store.lock().set_line_add(Some((Point::ZERO, Point::new(5.0, 5.0))));
        let mut rec = Recorder::new();
        store.draw(&mut rec);
        assert_eq!(rec.draws(), 2);
        assert_eq!(rec.depth(), 0);
    }
}
