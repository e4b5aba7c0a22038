//! Tools and the shapes they create.
//!
//! The active tool decides how a press on the canvas is interpreted:
//!
//! | Tool | Press | Slide | Release without slide |
//! |------|-------|-------|-----------------------|
//! | Select | pick / pending drag | move, reshape, rotate, rubber band | cycle deeper |
//! | Node | pick path or node | move node or control | — |
//! | Rect, Ellipse | — | size new shape (Ctrl squares) | default-size shape |
//! | Bezier | — | line preview | add node (double-click ends) |
//! | Text | — | — | place text |

use kurbo::{Point, Rect};
use vd_core::{NodeId, NodeKind, PathCmd, PathData, SceneNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Node,
    Rect,
    Ellipse,
    Bezier,
    Text,
}

impl ToolKind {
    /// Whether a press with this tool creates a new element.
    pub fn creates(self) -> bool {
        matches!(
            self,
            ToolKind::Rect | ToolKind::Ellipse | ToolKind::Bezier | ToolKind::Text
        )
    }
}

/// Normalized rectangle spanned by a drag. With `square` the shorter side
/// grows to match the longer, away from `start`.
pub fn drag_rect(start: Point, cur: Point, square: bool) -> Rect {
    let mut d = cur - start;
    if square {
        let side = d.x.abs().max(d.y.abs());
        d.x = side.copysign(if d.x == 0.0 { 1.0 } else { d.x });
        d.y = side.copysign(if d.y == 0.0 { 1.0 } else { d.y });
    }
    Rect::from_points(start, start + d)
}

fn shape_style(stroke_width: f64) -> String {
    format!("fill:#cccccc;stroke:#000000;stroke-width:{stroke_width}")
}

/// A new Rect or Ellipse filling `r` (in its parent's coordinates).
/// Other tools create nothing here.
pub fn new_shape(tool: ToolKind, id: NodeId, r: Rect, stroke_width: f64) -> Option<SceneNode> {
    let kind = match tool {
        ToolKind::Rect => NodeKind::Rect {
            x: r.x0,
            y: r.y0,
            width: r.width(),
            height: r.height(),
        },
        ToolKind::Ellipse => {
            let c = r.center();
            NodeKind::Ellipse {
                cx: c.x,
                cy: c.y,
                rx: r.width() / 2.0,
                ry: r.height() / 2.0,
            }
        }
        _ => return None,
    };
    Some(SceneNode::new(id, kind).with_prop("style", &shape_style(stroke_width)))
}

pub fn new_text(id: NodeId, at: Point, text: &str) -> SceneNode {
    SceneNode::new(
        id,
        NodeKind::Text {
            x: at.x,
            y: at.y,
            text: text.to_string(),
        },
    )
    .with_prop("style", "font-size:16px;fill:#000000")
}

/// A path holding only its first `MoveTo`.
pub fn new_path(id: NodeId, at: Point, stroke_width: f64) -> SceneNode {
    SceneNode::new(
        id,
        NodeKind::Path {
            data: PathData::from_cmds(&[PathCmd::MoveTo(at.x, at.y)]),
        },
    )
    .with_prop("style", &format!("fill:none;stroke:#000000;stroke-width:{stroke_width}"))
}

/// Bezier tool progress: the path being drawn and its last node on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathDraft {
    pub path: NodeId,
    pub last: Point,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drag_rect_normalizes_and_squares() {
        let s = Point::new(10.0, 10.0);
        assert_eq!(drag_rect(s, Point::new(0.0, 30.0), false), Rect::new(0.0, 10.0, 10.0, 30.0));
        assert_eq!(drag_rect(s, Point::new(0.0, 30.0), true), Rect::new(-10.0, 10.0, 10.0, 30.0));
        assert_eq!(drag_rect(s, Point::new(14.0, 10.0), true), Rect::new(10.0, 10.0, 14.0, 14.0));
    }

    #[test]
    fn shapes_fill_their_rect() {
        let r = Rect::new(0.0, 0.0, 20.0, 10.0);
        let e = new_shape(ToolKind::Ellipse, NodeId::intern("tool-e"), r, 1.0).unwrap();
        assert_eq!(
            e.kind,
            NodeKind::Ellipse {
                cx: 10.0,
                cy: 5.0,
                rx: 10.0,
                ry: 5.0
            }
        );
        assert_eq!(e.prop("stroke-width"), Some("1"));
        assert!(new_shape(ToolKind::Text, NodeId::intern("tool-t"), r, 1.0).is_none());
    }
}
