//! Per-kind geometry: local bounds, delta folding, position and size.
//!
//! The node kind set is closed, so everything here dispatches on
//! `NodeKind` rather than through trait objects.

use crate::geom::is_axis_aligned;
use crate::model::{NodeKind, SceneNode};
use kurbo::{Affine, Circle, Ellipse, Line, Point, Rect, Shape, Size, Vec2};

/// Default font size for text bounds when none is set.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;

const EPS: f64 = 1e-9;

/// Geometry operations every node kind answers.
pub trait NodeGeom {
    /// Bounds in the node's own coordinate space (before its transform).
    /// `None` for containers and definitions.
    fn bbox_local(&self) -> Option<Rect>;

    /// Tight bounds after mapping the geometry through `xf`.
    fn bbox_world(&self, xf: Affine) -> Option<Rect>;

    /// Apply a delta expressed in the node's geometry space. Folded into
    /// the geometry when the kind can represent the result, otherwise
    /// appended to the local transform.
    fn apply_delta(&mut self, m: Affine);

    /// Place the top-left of the local bounds at `pos`.
    fn set_node_pos(&mut self, pos: Point);

    /// Resize the local bounds, keeping the top-left fixed.
    fn set_node_size(&mut self, size: Size);
}

/// Font size in user units, from `font-size` (a leading number, any unit).
pub fn font_size(node: &SceneNode) -> f64 {
    node.prop("font-size")
        .and_then(|s| {
            let end = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .unwrap_or(s.len());
            s[..end].parse::<f64>().ok()
        })
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn text_bounds(x: f64, y: f64, text: &str, size: f64) -> Option<Rect> {
    let chars = text.chars().count();
    if chars == 0 {
        return None;
    }
    let width = chars as f64 * size * GLYPH_ADVANCE;
    Some(Rect::new(x, y - 0.8 * size, x + width, y + 0.2 * size))
}

impl NodeGeom for SceneNode {
    fn bbox_local(&self) -> Option<Rect> {
        match &self.kind {
            NodeKind::Rect {
                x,
                y,
                width,
                height,
            }
            | NodeKind::Image {
                x,
                y,
                width,
                height,
            } => Some(Rect::new(*x, *y, x + width, y + height)),
            NodeKind::Ellipse { cx, cy, rx, ry } => {
                Some(Rect::new(cx - rx, cy - ry, cx + rx, cy + ry))
            }
            NodeKind::Circle { cx, cy, r } => Some(Rect::new(cx - r, cy - r, cx + r, cy + r)),
            NodeKind::Line { x1, y1, x2, y2 } => {
                Some(Rect::from_points((*x1, *y1), (*x2, *y2)))
            }
            NodeKind::Path { data } => data.bounds(Affine::IDENTITY),
            NodeKind::Text { x, y, text } => text_bounds(*x, *y, text, font_size(self)),
            NodeKind::Root
            | NodeKind::Group
            | NodeKind::Defs
            | NodeKind::MetaData { .. }
            | NodeKind::Gradient { .. } => None,
        }
    }

    fn bbox_world(&self, xf: Affine) -> Option<Rect> {
        match &self.kind {
            NodeKind::Ellipse { cx, cy, rx, ry } => {
                Some((xf * Ellipse::new((*cx, *cy), (*rx, *ry), 0.0)).bounding_box())
            }
            NodeKind::Circle { cx, cy, r } => {
                Some((xf * Circle::new((*cx, *cy), *r)).bounding_box())
            }
            NodeKind::Line { x1, y1, x2, y2 } => {
                Some((xf * Line::new((*x1, *y1), (*x2, *y2))).bounding_box())
            }
            NodeKind::Path { data } => data.bounds(xf),
            _ => self.bbox_local().map(|r| xf.transform_rect_bbox(r)),
        }
    }

    fn apply_delta(&mut self, m: Affine) {
        let aligned = is_axis_aligned(m);
        let [sx, _, _, sy, _, _] = m.as_coeffs();
        match &mut self.kind {
            NodeKind::Path { data } => data.apply_affine(m),
            NodeKind::Line { x1, y1, x2, y2 } => {
                let a = m * Point::new(*x1, *y1);
                let b = m * Point::new(*x2, *y2);
                (*x1, *y1, *x2, *y2) = (a.x, a.y, b.x, b.y);
            }
            NodeKind::Rect {
                x,
                y,
                width,
                height,
            }
            | NodeKind::Image {
                x,
                y,
                width,
                height,
            } if aligned => {
                let r = m.transform_rect_bbox(Rect::new(*x, *y, *x + *width, *y + *height));
                (*x, *y, *width, *height) = (r.x0, r.y0, r.width(), r.height());
            }
            NodeKind::Ellipse { cx, cy, rx, ry } if aligned => {
                let c = m * Point::new(*cx, *cy);
                (*cx, *cy, *rx, *ry) = (c.x, c.y, *rx * sx.abs(), *ry * sy.abs());
            }
            NodeKind::Circle { cx, cy, r } if aligned && (sx.abs() - sy.abs()).abs() < EPS => {
                let c = m * Point::new(*cx, *cy);
                (*cx, *cy, *r) = (c.x, c.y, *r * sx.abs());
            }
            NodeKind::Text { x, y, .. }
                if aligned && (sx - 1.0).abs() < EPS && (sy - 1.0).abs() < EPS =>
            {
                let p = m * Point::new(*x, *y);
                (*x, *y) = (p.x, p.y);
            }
            NodeKind::Root
            | NodeKind::Defs
            | NodeKind::MetaData { .. }
            | NodeKind::Gradient { .. } => {}
            _ => self.transform *= m,
        }
    }

    fn set_node_pos(&mut self, pos: Point) {
        let Some(bounds) = self.bbox_local() else {
            return;
        };
        let d = pos - bounds.origin();
        match &mut self.kind {
            NodeKind::Rect { x, y, .. }
            | NodeKind::Image { x, y, .. }
            | NodeKind::Text { x, y, .. } => {
                *x += d.x;
                *y += d.y;
            }
            NodeKind::Ellipse { cx, cy, .. } | NodeKind::Circle { cx, cy, .. } => {
                *cx += d.x;
                *cy += d.y;
            }
            NodeKind::Line { x1, y1, x2, y2 } => {
                (*x1, *y1, *x2, *y2) = (*x1 + d.x, *y1 + d.y, *x2 + d.x, *y2 + d.y);
            }
            NodeKind::Path { data } => data.apply_affine(Affine::translate(d)),
            _ => {}
        }
    }

    fn set_node_size(&mut self, size: Size) {
        let w = size.width.abs();
        let h = size.height.abs();
        match &mut self.kind {
            NodeKind::Rect { width, height, .. } | NodeKind::Image { width, height, .. } => {
                (*width, *height) = (w, h);
            }
            NodeKind::Ellipse { cx, cy, rx, ry } => {
                let origin = Point::new(*cx - *rx, *cy - *ry);
                (*rx, *ry) = (w / 2.0, h / 2.0);
                (*cx, *cy) = (origin.x + *rx, origin.y + *ry);
            }
            NodeKind::Circle { cx, cy, r } => {
                let origin = Point::new(*cx - *r, *cy - *r);
                *r = w.min(h) / 2.0;
                (*cx, *cy) = (origin.x + *r, origin.y + *r);
            }
            NodeKind::Line { x1, y1, x2, y2 } => {
                let sgn = Vec2::new((*x2 - *x1).signum(), (*y2 - *y1).signum());
                (*x2, *y2) = (*x1 + sgn.x * w, *y1 + sgn.y * h);
            }
            NodeKind::Path { data } => {
                let Some(b) = data.bounds(Affine::IDENTITY) else {
                    return;
                };
                let sx = if b.width() > EPS { w / b.width() } else { 1.0 };
                let sy = if b.height() > EPS { h / b.height() } else { 1.0 };
                data.apply_affine(
                    Affine::translate(b.origin().to_vec2())
                        * Affine::scale_non_uniform(sx, sy)
                        * Affine::translate(-b.origin().to_vec2()),
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::path::{PathCmd, PathData};
    use pretty_assertions::assert_eq;

    fn node(kind: NodeKind) -> SceneNode {
        SceneNode::new(NodeId::intern("shape-test"), kind)
    }

    #[test]
    fn axis_aligned_delta_folds_into_rect() {
        let mut n = node(NodeKind::Rect {
            x: 10.0,
            y: 10.0,
            width: 10.0,
            height: 20.0,
        });
        let m = Affine::translate((10.0, 10.0)) * Affine::scale(2.0) * Affine::translate((-10.0, -10.0));
        n.apply_delta(m);
        assert_eq!(
            n.kind,
            NodeKind::Rect {
                x: 10.0,
                y: 10.0,
                width: 20.0,
                height: 40.0
            }
        );
        assert_eq!(n.transform, Affine::IDENTITY);
    }

    #[test]
    fn rotation_goes_to_transform() {
        let mut n = node(NodeKind::Rect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        });
        let m = Affine::rotate(0.5);
        n.apply_delta(m);
        assert_eq!(n.transform, m);
        assert!(matches!(n.kind, NodeKind::Rect { x: 0.0, .. }));
    }

    #[test]
    fn non_uniform_circle_keeps_geometry() {
        let mut n = node(NodeKind::Circle {
            cx: 0.0,
            cy: 0.0,
            r: 5.0,
        });
        n.apply_delta(Affine::scale_non_uniform(2.0, 1.0));
        assert_eq!(n.kind, NodeKind::Circle { cx: 0.0, cy: 0.0, r: 5.0 });
        let b = n.bbox_world(n.transform).unwrap_or(Rect::ZERO);
        assert!((b.width() - 20.0).abs() < 1e-6 && (b.height() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn path_always_folds() {
        let data = PathData::from_cmds(&[PathCmd::MoveTo(0.0, 0.0), PathCmd::LineTo(10.0, 0.0)]);
        let mut n = node(NodeKind::Path { data });
        n.apply_delta(Affine::translate((0.0, 5.0)));
        assert_eq!(n.bbox_local(), Some(Rect::new(0.0, 5.0, 10.0, 5.0)));
    }

    #[test]
    fn text_bounds_use_font_size() {
        let n = node(NodeKind::Text {
            x: 0.0,
            y: 20.0,
            text: "abcd".into(),
        })
        .with_prop("font-size", "10px");
        assert_eq!(n.bbox_local(), Some(Rect::new(0.0, 12.0, 24.0, 22.0)));
    }

    #[test]
    fn pos_and_size() {
        let mut n = node(NodeKind::Ellipse {
            cx: 5.0,
            cy: 5.0,
            rx: 5.0,
            ry: 5.0,
        });
        n.set_node_pos(Point::new(20.0, 30.0));
        n.set_node_size(Size::new(40.0, 10.0));
        assert_eq!(n.bbox_local(), Some(Rect::new(20.0, 30.0, 60.0, 40.0)));

        let mut p = node(NodeKind::Path {
            data: PathData::from_cmds(&[PathCmd::MoveTo(0.0, 0.0), PathCmd::LineTo(10.0, 10.0)]),
        });
        p.set_node_size(Size::new(20.0, 5.0));
        assert_eq!(p.bbox_local(), Some(Rect::new(0.0, 0.0, 20.0, 5.0)));
    }
}
