//! Scene graph → painter calls.
//!
//! Rendering itself is delegated: anything implementing `Painter` (a GPU
//! canvas, a raster backend, the `Recorder` below) receives a path-drawing
//! API under a transform stack. Stroke widths and dashes are handed over in
//! device pixels, already scaled by the current world transform.

use kurbo::{Affine, PathEl, Point, Rect, Shape};
use vd_core::model::{Color, NodeKind, SceneGraph, SceneNode, paint_url};
use vd_core::{NodeId, NodeIndex};

/// Resolved fill or stroke paint.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// A gradient definition; `fallback` is its first stop color, for
    /// painters that do not render gradients.
    Gradient { id: NodeId, fallback: Color },
}

/// The drawing interface the renderer consumes.
pub trait Painter {
    fn push_context(&mut self, xf: Affine);
    fn pop_context(&mut self);

    /// Fill for the next `draw`; `None` disables filling.
    fn set_fill(&mut self, paint: Option<Paint>);
    /// Stroke for the next `draw`, width and dashes in device pixels.
    fn set_stroke(&mut self, paint: Option<Paint>, width: f64, dashes: &[f64]);

    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    fn quad_to(&mut self, c: Point, p: Point);
    fn cube_to(&mut self, c1: Point, c2: Point, p: Point);
    fn close(&mut self);

    fn rectangle(&mut self, r: Rect);
    fn circle(&mut self, center: Point, radius: f64);
    fn polygon(&mut self, points: &[Point]);

    /// Fill and stroke the current path, then clear it.
    fn draw(&mut self);

    /// Solid box in device space, no stroke. Used for handles.
    fn blit_box(&mut self, r: Rect, color: Color);
}

/// Feed any kurbo shape to a painter as path elements.
pub fn draw_shape(painter: &mut dyn Painter, shape: &impl Shape) {
    for el in shape.path_elements(0.1) {
        match el {
            PathEl::MoveTo(p) => painter.move_to(p),
            PathEl::LineTo(p) => painter.line_to(p),
            PathEl::QuadTo(c, p) => painter.quad_to(c, p),
            PathEl::CurveTo(c1, c2, p) => painter.cube_to(c1, c2, p),
            PathEl::ClosePath => painter.close(),
        }
    }
}

// ─── Property resolution ─────────────────────────────────────────────────

/// Value of an inherited presentation property: the node's own, else the
/// nearest ancestor's.
pub fn resolve_prop<'a>(graph: &'a SceneGraph, idx: NodeIndex, key: &str) -> Option<&'a str> {
    std::iter::once(idx)
        .chain(graph.ancestors(idx))
        .find_map(|i| graph.graph[i].prop(key))
}

fn resolve_paint(graph: &SceneGraph, idx: NodeIndex, key: &str, default: Option<Color>) -> Option<Paint> {
    let Some(value) = resolve_prop(graph, idx, key) else {
        return default.map(Paint::Solid);
    };
    if let Some(id) = paint_url(value) {
        let fallback = graph
            .get_by_id(id)
            .and_then(|g| match &g.kind {
                NodeKind::Gradient { stops, .. } => stops.first().map(|s| s.color),
                _ => None,
            })
            .unwrap_or(Color::BLACK);
        return Some(Paint::Gradient { id, fallback });
    }
    let mut color = Color::parse(value)?;
    if let Some(op) = resolve_prop(graph, idx, &format!("{key}-opacity")).and_then(|o| o.parse::<f32>().ok()) {
        color.a *= op.clamp(0.0, 1.0);
    }
    Some(Paint::Solid(color))
}

fn parse_dashes(value: Option<&str>) -> Vec<f64> {
    value
        .filter(|v| *v != "none")
        .map(|v| {
            v.split([',', ' '])
                .filter_map(|s| s.trim().parse::<f64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

// ─── Scene painting ──────────────────────────────────────────────────────

/// Paint the whole scene. Hidden layers and definitions are skipped.
pub fn paint_scene(painter: &mut dyn Painter, graph: &SceneGraph) {
    painter.push_context(graph.view);
    for &child in graph.children(graph.root) {
        paint_node(painter, graph, child, graph.view);
    }
    painter.pop_context();
}

fn paint_node(painter: &mut dyn Painter, graph: &SceneGraph, idx: NodeIndex, parent_xf: Affine) {
    let node = &graph.graph[idx];
    if node.kind.is_definition() || (node.is_layer() && !graph.is_visible(idx)) {
        return;
    }
    if node.prop("display") == Some("none") {
        return;
    }
    let world = parent_xf * node.transform;
    painter.push_context(node.transform);

    if node.kind.is_shape() {
        let device_scale = world.determinant().abs().sqrt();
        let width = resolve_prop(graph, idx, "stroke-width")
            .map(vd_core::parser::parse_length)
            .filter(|w| *w > 0.0)
            .unwrap_or(1.0);
        let dashes: Vec<f64> = parse_dashes(resolve_prop(graph, idx, "stroke-dasharray"))
            .into_iter()
            .map(|d| d * device_scale)
            .collect();
        painter.set_fill(resolve_paint(graph, idx, "fill", Some(Color::BLACK)));
        painter.set_stroke(
            resolve_paint(graph, idx, "stroke", None),
            width * device_scale,
            &dashes,
        );
        emit_geometry(painter, node);
    }

    for &child in graph.children(idx) {
        paint_node(painter, graph, child, world);
    }
    painter.pop_context();
}

fn emit_geometry(painter: &mut dyn Painter, node: &SceneNode) {
    match &node.kind {
        NodeKind::Rect {
            x,
            y,
            width,
            height,
        } => {
            painter.rectangle(Rect::new(*x, *y, x + width, y + height));
            painter.draw();
        }
        NodeKind::Circle { cx, cy, r } => {
            painter.circle(Point::new(*cx, *cy), *r);
            painter.draw();
        }
        NodeKind::Ellipse { cx, cy, rx, ry } => {
            draw_shape(painter, &kurbo::Ellipse::new((*cx, *cy), (*rx, *ry), 0.0));
            painter.draw();
        }
        NodeKind::Line { x1, y1, x2, y2 } => {
            painter.move_to(Point::new(*x1, *y1));
            painter.line_to(Point::new(*x2, *y2));
            painter.draw();
        }
        NodeKind::Path { data } => {
            draw_shape(painter, &data.to_bez_path());
            painter.draw();
        }
        NodeKind::Text { text, .. } => {
            // Glyph rendering belongs to the painter's text stack.
            log::trace!("text {:?} {:?}", node.id, text);
        }
        NodeKind::Image { x, y, width, height } => {
            // Placeholder frame; pixels come from the host.
            painter.set_fill(None);
            painter.rectangle(Rect::new(*x, *y, x + width, y + height));
            painter.draw();
        }
        _ => {}
    }
}

// ─── Recorder ────────────────────────────────────────────────────────────

/// One recorded painter call.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Push(Affine),
    Pop,
    Fill(Option<Paint>),
    Stroke(Option<Paint>, f64, Vec<f64>),
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubeTo(Point, Point, Point),
    Close,
    Rectangle(Rect),
    Circle(Point, f64),
    Polygon(Vec<Point>),
    Draw,
    BlitBox(Rect, Color),
}

/// A painter that records every call, for headless use and tests.
#[derive(Debug, Default)]
pub struct Recorder {
    pub ops: Vec<PaintOp>,
    depth: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `draw` calls so far.
    pub fn draws(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, PaintOp::Draw)).count()
    }

    /// Current transform stack depth; zero when pushes and pops balance.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Painter for Recorder {
    fn push_context(&mut self, xf: Affine) {
        self.depth += 1;
        self.ops.push(PaintOp::Push(xf));
    }
    fn pop_context(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.ops.push(PaintOp::Pop);
    }
    fn set_fill(&mut self, paint: Option<Paint>) {
        self.ops.push(PaintOp::Fill(paint));
    }
    fn set_stroke(&mut self, paint: Option<Paint>, width: f64, dashes: &[f64]) {
        self.ops.push(PaintOp::Stroke(paint, width, dashes.to_vec()));
    }
    fn move_to(&mut self, p: Point) {
        self.ops.push(PaintOp::MoveTo(p));
    }
    fn line_to(&mut self, p: Point) {
        self.ops.push(PaintOp::LineTo(p));
    }
    fn quad_to(&mut self, c: Point, p: Point) {
        self.ops.push(PaintOp::QuadTo(c, p));
    }
    fn cube_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.ops.push(PaintOp::CubeTo(c1, c2, p));
    }
    fn close(&mut self) {
        self.ops.push(PaintOp::Close);
    }
    fn rectangle(&mut self, r: Rect) {
        self.ops.push(PaintOp::Rectangle(r));
    }
    fn circle(&mut self, center: Point, radius: f64) {
        self.ops.push(PaintOp::Circle(center, radius));
    }
    fn polygon(&mut self, points: &[Point]) {
        self.ops.push(PaintOp::Polygon(points.to_vec()));
    }
    fn draw(&mut self) {
        self.ops.push(PaintOp::Draw);
    }
    fn blit_box(&mut self, r: Rect, color: Color) {
        self.ops.push(PaintOp::BlitBox(r, color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vd_core::parse_svg;

    fn scene(body: &str) -> SceneGraph {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape">{body}</svg>"#
        );
        parse_svg(&svg).expect("test svg parses").0
    }

    #[test]
    fn paints_shapes_in_order_with_balanced_stack() {
        let g = scene(
            r#"<rect id="a" width="10" height="10" fill="red"/>
               <circle id="b" cx="5" cy="5" r="2" stroke="blue" stroke-width="2"/>"#,
        );
        let mut rec = Recorder::new();
        paint_scene(&mut rec, &g);
        assert_eq!(rec.draws(), 2);
        assert_eq!(rec.depth(), 0);
        assert!(rec.ops.contains(&PaintOp::Rectangle(Rect::new(0.0, 0.0, 10.0, 10.0))));
        assert!(rec.ops.contains(&PaintOp::Fill(Some(Paint::Solid(Color::rgba(1.0, 0.0, 0.0, 1.0))))));
        assert!(rec.ops.contains(&PaintOp::Stroke(
            Some(Paint::Solid(Color::rgba(0.0, 0.0, 1.0, 1.0))),
            2.0,
            vec![]
        )));
    }

    #[test]
    fn stroke_scales_to_device_units() {
        let mut g = scene(r#"<line id="l" x2="10" stroke="black" stroke-width="1" stroke-dasharray="2,1"/>"#);
        g.view = Affine::scale(2.0);
        let mut rec = Recorder::new();
        paint_scene(&mut rec, &g);
        let stroke = rec.ops.iter().find_map(|op| match op {
            PaintOp::Stroke(_, w, d) => Some((*w, d.clone())),
            _ => None,
        });
        assert_eq!(stroke, Some((2.0, vec![4.0, 2.0])));
    }

    #[test]
    fn inherits_group_paint_and_skips_hidden_layers() {
        let g = scene(
            r#"<g id="grp" fill="url(#gr)"><rect id="r" width="1" height="1"/></g>
               <g id="hidden" inkscape:groupmode="layer" style="display:none">
                 <rect id="h" width="1" height="1"/>
               </g>
               <defs><linearGradient id="gr"><stop offset="0" stop-color="white"/></linearGradient></defs>"#,
        );
        let mut rec = Recorder::new();
        paint_scene(&mut rec, &g);
        assert_eq!(rec.draws(), 1);
        assert!(rec.ops.contains(&PaintOp::Fill(Some(Paint::Gradient {
            id: NodeId::intern("gr"),
            fallback: Color::WHITE,
        }))));
    }
}
