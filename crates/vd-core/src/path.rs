//! Path command buffer.
//!
//! Path data lives in a single flat `Vec<f64>`: every command is an opcode
//! tag followed by a fixed number of coordinates (see [`PathOp::n_args`]).
//! Editing code addresses commands by the buffer position of their opcode
//! (`cmd_index`) and by their logical endpoint number (`point_index`).
//! `Close` owns no endpoint, so it has no logical index.

use crate::error::CoreError;
use crate::geom::format_num;
use kurbo::{Affine, BezPath, Point, Rect, Shape, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

// ─── Opcodes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PathOp {
    MoveTo = 0,
    LineTo = 1,
    QuadTo = 2,
    CubeTo = 3,
    Close = 4,
}

impl PathOp {
    /// Number of coordinates following the opcode tag.
    pub const fn n_args(self) -> usize {
        match self {
            PathOp::MoveTo | PathOp::LineTo => 2,
            PathOp::QuadTo => 4,
            PathOp::CubeTo => 6,
            PathOp::Close => 0,
        }
    }

    /// Number of logical endpoints the command contributes (0 or 1).
    pub const fn point_count(self) -> usize {
        match self {
            PathOp::Close => 0,
            _ => 1,
        }
    }

    pub const fn code(self) -> f64 {
        self as u8 as f64
    }

    pub fn from_code(v: f64) -> Option<Self> {
        if v.fract() != 0.0 {
            return None;
        }
        match v as i64 {
            0 => Some(PathOp::MoveTo),
            1 => Some(PathOp::LineTo),
            2 => Some(PathOp::QuadTo),
            3 => Some(PathOp::CubeTo),
            4 => Some(PathOp::Close),
            _ => None,
        }
    }

    /// SVG path letter (absolute form).
    pub const fn letter(self) -> char {
        match self {
            PathOp::MoveTo => 'M',
            PathOp::LineTo => 'L',
            PathOp::QuadTo => 'Q',
            PathOp::CubeTo => 'C',
            PathOp::Close => 'Z',
        }
    }
}

// ─── Commands ────────────────────────────────────────────────────────────

/// A single decoded path command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),           // control, end
    CubeTo(f64, f64, f64, f64, f64, f64), // c1, c2, end
    Close,
}

impl PathCmd {
    pub fn op(&self) -> PathOp {
        match self {
            PathCmd::MoveTo(..) => PathOp::MoveTo,
            PathCmd::LineTo(..) => PathOp::LineTo,
            PathCmd::QuadTo(..) => PathOp::QuadTo,
            PathCmd::CubeTo(..) => PathOp::CubeTo,
            PathCmd::Close => PathOp::Close,
        }
    }

    fn encode(&self, out: &mut Vec<f64>) {
        out.push(self.op().code());
        match *self {
            PathCmd::MoveTo(x, y) | PathCmd::LineTo(x, y) => out.extend_from_slice(&[x, y]),
            PathCmd::QuadTo(cx, cy, x, y) => out.extend_from_slice(&[cx, cy, x, y]),
            PathCmd::CubeTo(c1x, c1y, c2x, c2y, x, y) => {
                out.extend_from_slice(&[c1x, c1y, c2x, c2y, x, y])
            }
            PathCmd::Close => {}
        }
    }

    fn decode(op: PathOp, args: &[f64]) -> Self {
        match op {
            PathOp::MoveTo => PathCmd::MoveTo(args[0], args[1]),
            PathOp::LineTo => PathCmd::LineTo(args[0], args[1]),
            PathOp::QuadTo => PathCmd::QuadTo(args[0], args[1], args[2], args[3]),
            PathOp::CubeTo => {
                PathCmd::CubeTo(args[0], args[1], args[2], args[3], args[4], args[5])
            }
            PathOp::Close => PathCmd::Close,
        }
    }

    /// Build a command of kind `op` spanning `start` → `end`, deriving
    /// control points with the quarter rule: a quad control sits a quarter
    /// of the way along the segment; cubic controls sit a quarter in from
    /// each end.
    pub fn synthesize(op: PathOp, start: Point, end: Point) -> Self {
        let quarter = (end - start) * 0.25;
        match op {
            PathOp::MoveTo => PathCmd::MoveTo(end.x, end.y),
            PathOp::LineTo => PathCmd::LineTo(end.x, end.y),
            PathOp::QuadTo => {
                let c = start + quarter;
                PathCmd::QuadTo(c.x, c.y, end.x, end.y)
            }
            PathOp::CubeTo => {
                let c1 = start + quarter;
                let c2 = end - quarter;
                PathCmd::CubeTo(c1.x, c1.y, c2.x, c2.y, end.x, end.y)
            }
            PathOp::Close => PathCmd::Close,
        }
    }
}

// ─── Buffer ──────────────────────────────────────────────────────────────

/// Opcode-prefixed flat path buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    buf: Vec<f64>,
}

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cmds(cmds: &[PathCmd]) -> Self {
        cmds.iter().copied().collect()
    }

    /// Wrap a raw buffer. The buffer is not checked; call [`validate`](Self::validate).
    pub fn from_raw(buf: Vec<f64>) -> Self {
        Self { buf }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push(&mut self, cmd: PathCmd) {
        cmd.encode(&mut self.buf);
    }

    /// Check that opcode positions partition the buffer exactly and that the
    /// path starts with a `MoveTo`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut i = 0;
        let mut first = true;
        while i < self.buf.len() {
            let op = PathOp::from_code(self.buf[i]).ok_or_else(|| {
                CoreError::InvalidPath(format!("bad opcode {} at {i}", self.buf[i]))
            })?;
            if first && op != PathOp::MoveTo {
                return Err(CoreError::InvalidPath(format!(
                    "path starts with {op:?}, expected MoveTo"
                )));
            }
            first = false;
            let next = i + 1 + op.n_args();
            if next > self.buf.len() {
                return Err(CoreError::InvalidPath(format!(
                    "{op:?} at {i} needs {} args, buffer ends at {}",
                    op.n_args(),
                    self.buf.len()
                )));
            }
            if self.buf[i + 1..next].iter().any(|v| !v.is_finite()) {
                return Err(CoreError::InvalidPath(format!(
                    "non-finite coordinate in {op:?} at {i}"
                )));
            }
            i = next;
        }
        Ok(())
    }

    /// Iterate decoded commands with their geometric context.
    pub fn scan(&self) -> PathScanner<'_> {
        PathScanner {
            buf: &self.buf,
            pos: 0,
            point: 0,
            current: Point::ZERO,
            subpath_start: Point::ZERO,
        }
    }

    pub fn cmds(&self) -> impl Iterator<Item = PathCmd> + '_ {
        self.scan().map(|seg| seg.cmd)
    }

    /// Number of logical endpoints.
    pub fn point_count(&self) -> usize {
        self.scan().map(|seg| seg.op().point_count()).sum()
    }

    /// Whether `cmd_index` is the buffer position of an opcode.
    pub fn is_boundary(&self, cmd_index: usize) -> bool {
        self.scan().any(|seg| seg.index == cmd_index)
    }

    pub fn cmd_at(&self, cmd_index: usize) -> Option<PathCmd> {
        if !self.is_boundary(cmd_index) {
            return None;
        }
        let op = PathOp::from_code(*self.buf.get(cmd_index)?)?;
        let args = self.buf.get(cmd_index + 1..cmd_index + 1 + op.n_args())?;
        Some(PathCmd::decode(op, args))
    }

    /// Buffer position of the command owning logical endpoint `point_index`.
    pub fn cmd_index_of_point(&self, point_index: usize) -> Option<usize> {
        self.scan()
            .find(|seg| seg.point == Some(point_index))
            .map(|seg| seg.index)
    }

    /// The segment record for logical endpoint `point_index`.
    pub fn segment(&self, point_index: usize) -> Option<PathSeg> {
        self.scan().find(|seg| seg.point == Some(point_index))
    }

    /// Replace the command at `cmd_index`, splicing when the size changes.
    pub fn replace_cmd(&mut self, cmd_index: usize, cmd: PathCmd) -> Result<(), CoreError> {
        let old = self.cmd_at(cmd_index).ok_or_else(|| {
            CoreError::InvalidPath(format!("no command at buffer index {cmd_index}"))
        })?;
        let mut enc = Vec::with_capacity(1 + cmd.op().n_args());
        cmd.encode(&mut enc);
        let end = cmd_index + 1 + old.op().n_args();
        self.buf.splice(cmd_index..end, enc);
        Ok(())
    }

    /// Insert `cmd` so its opcode lands at `cmd_index` (which must be a
    /// command boundary or the end of the buffer).
    pub fn insert_cmd(&mut self, cmd_index: usize, cmd: PathCmd) -> Result<(), CoreError> {
        if cmd_index != self.buf.len() && !self.is_boundary(cmd_index) {
            return Err(CoreError::InvalidPath(format!(
                "buffer index {cmd_index} is not a command boundary"
            )));
        }
        let mut enc = Vec::with_capacity(1 + cmd.op().n_args());
        cmd.encode(&mut enc);
        self.buf.splice(cmd_index..cmd_index, enc);
        Ok(())
    }

    pub fn remove_cmd(&mut self, cmd_index: usize) -> Result<PathCmd, CoreError> {
        let old = self.cmd_at(cmd_index).ok_or_else(|| {
            CoreError::InvalidPath(format!("no command at buffer index {cmd_index}"))
        })?;
        self.buf.drain(cmd_index..cmd_index + 1 + old.op().n_args());
        Ok(old)
    }

    /// Offset the endpoint of the command at `cmd_index`.
    pub fn translate_end(&mut self, cmd_index: usize, delta: Vec2) {
        if let Some(op) = self.buf.get(cmd_index).and_then(|v| PathOp::from_code(*v)) {
            let n = op.n_args();
            if n >= 2 {
                self.buf[cmd_index + n - 1] += delta.x;
                self.buf[cmd_index + n] += delta.y;
            }
        }
    }

    /// Offset control point `which` (1 or 2) of the command at `cmd_index`.
    /// Commands without that control are left alone.
    pub fn translate_ctrl(&mut self, cmd_index: usize, which: usize, delta: Vec2) {
        let Some(op) = self.buf.get(cmd_index).and_then(|v| PathOp::from_code(*v)) else {
            return;
        };
        let slot = match (op, which) {
            (PathOp::QuadTo, 1) | (PathOp::CubeTo, 1) => cmd_index + 1,
            (PathOp::CubeTo, 2) => cmd_index + 3,
            _ => return,
        };
        self.buf[slot] += delta.x;
        self.buf[slot + 1] += delta.y;
    }

    /// Apply an affine transform to every coordinate.
    pub fn apply_affine(&mut self, xf: Affine) {
        let mut i = 0;
        while i < self.buf.len() {
            let Some(op) = PathOp::from_code(self.buf[i]) else {
                return;
            };
            let n = op.n_args();
            let mut j = i + 1;
            while j < i + n {
                let p = xf * Point::new(self.buf[j], self.buf[j + 1]);
                self.buf[j] = p.x;
                self.buf[j + 1] = p.y;
                j += 2;
            }
            i += 1 + n;
        }
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut bp = BezPath::new();
        for cmd in self.cmds() {
            match cmd {
                PathCmd::MoveTo(x, y) => bp.move_to((x, y)),
                PathCmd::LineTo(x, y) => bp.line_to((x, y)),
                PathCmd::QuadTo(cx, cy, x, y) => bp.quad_to((cx, cy), (x, y)),
                PathCmd::CubeTo(c1x, c1y, c2x, c2y, x, y) => {
                    bp.curve_to((c1x, c1y), (c2x, c2y), (x, y))
                }
                PathCmd::Close => bp.close_path(),
            }
        }
        bp
    }

    /// Tight bounds of the path after transforming by `xf`.
    pub fn bounds(&self, xf: Affine) -> Option<Rect> {
        if self.point_count() == 0 {
            return None;
        }
        let mut bp = self.to_bez_path();
        bp.apply_affine(xf);
        Some(bp.bounding_box())
    }

    /// SVG `d` attribute text (absolute commands).
    pub fn to_svg_d(&self) -> String {
        let mut out = String::with_capacity(self.buf.len() * 4);
        for cmd in self.cmds() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push(cmd.op().letter());
            let args: &[f64] = &match cmd {
                PathCmd::MoveTo(x, y) | PathCmd::LineTo(x, y) => vec![x, y],
                PathCmd::QuadTo(cx, cy, x, y) => vec![cx, cy, x, y],
                PathCmd::CubeTo(a, b, c, d, x, y) => vec![a, b, c, d, x, y],
                PathCmd::Close => vec![],
            };
            for v in args {
                let _ = write!(out, " {}", format_num(*v));
            }
        }
        out
    }
}

impl FromIterator<PathCmd> for PathData {
    fn from_iter<I: IntoIterator<Item = PathCmd>>(iter: I) -> Self {
        let mut data = PathData::new();
        for cmd in iter {
            data.push(cmd);
        }
        data
    }
}

// ─── Scanner ─────────────────────────────────────────────────────────────

/// One command with its geometric context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSeg {
    pub cmd: PathCmd,
    /// Buffer position of the opcode.
    pub index: usize,
    /// Logical endpoint number (`None` for `Close`).
    pub point: Option<usize>,
    pub start: Point,
    pub end: Point,
    pub cp1: Option<Point>,
    pub cp2: Option<Point>,
}

impl PathSeg {
    pub fn op(&self) -> PathOp {
        self.cmd.op()
    }
}

/// Walks a [`PathData`] buffer, tracking the current point and subpath start.
/// Stops at the first malformed opcode.
pub struct PathScanner<'a> {
    buf: &'a [f64],
    pos: usize,
    point: usize,
    current: Point,
    subpath_start: Point,
}

impl Iterator for PathScanner<'_> {
    type Item = PathSeg;

    fn next(&mut self) -> Option<PathSeg> {
        let index = self.pos;
        let op = PathOp::from_code(*self.buf.get(index)?)?;
        let args = self.buf.get(index + 1..index + 1 + op.n_args())?;
        let cmd = PathCmd::decode(op, args);
        self.pos = index + 1 + op.n_args();

        let start = self.current;
        let (end, cp1, cp2) = match cmd {
            PathCmd::MoveTo(x, y) => {
                self.subpath_start = Point::new(x, y);
                (Point::new(x, y), None, None)
            }
            PathCmd::LineTo(x, y) => (Point::new(x, y), None, None),
            PathCmd::QuadTo(cx, cy, x, y) => (Point::new(x, y), Some(Point::new(cx, cy)), None),
            PathCmd::CubeTo(c1x, c1y, c2x, c2y, x, y) => (
                Point::new(x, y),
                Some(Point::new(c1x, c1y)),
                Some(Point::new(c2x, c2y)),
            ),
            PathCmd::Close => (self.subpath_start, None, None),
        };
        self.current = end;

        let point = if op.point_count() > 0 {
            let p = self.point;
            self.point += 1;
            Some(p)
        } else {
            None
        };

        Some(PathSeg {
            cmd,
            index,
            point,
            start,
            end,
            cp1,
            cp2,
        })
    }
}

// ─── Display list ────────────────────────────────────────────────────────

/// Per-endpoint record used to place node and control handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathNode {
    pub op: PathOp,
    pub cmd_index: usize,
    pub point_index: usize,
    pub start: Point,
    pub end: Point,
    pub cp1: Option<Point>,
    pub cp2: Option<Point>,
    pub world_end: Point,
    pub world_cp1: Option<Point>,
    pub world_cp2: Option<Point>,
}

/// Materialize the display list for `data`, with world positions computed
/// through `xf` (the path's full world transform).
pub fn path_nodes(data: &PathData, xf: Affine) -> Vec<PathNode> {
    data.scan()
        .filter_map(|seg| {
            let point_index = seg.point?;
            Some(PathNode {
                op: seg.op(),
                cmd_index: seg.index,
                point_index,
                start: seg.start,
                end: seg.end,
                cp1: seg.cp1,
                cp2: seg.cp2,
                world_end: xf * seg.end,
                world_cp1: seg.cp1.map(|p| xf * p),
                world_cp2: seg.cp2.map(|p| xf * p),
            })
        })
        .collect()
}
