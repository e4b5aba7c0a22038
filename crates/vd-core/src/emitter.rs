//! Emitter: SceneGraph → SVG text.
//!
//! One element per line, attributes in a fixed order, so the output is a
//! stable line-partitioned form: the undo stack stores it split into lines
//! and the parser round-trips it.

use crate::document::NamedView;
use crate::geom::format_num;
use crate::model::*;
use kurbo::Affine;
use petgraph::graph::NodeIndex;
use std::fmt::Write;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Emit a scene graph (plus editor metadata) as an SVG document.
#[must_use]
pub fn emit_svg(graph: &SceneGraph, view: Option<&NamedView>) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let root = &graph.graph[graph.root];
    let _ = write!(
        out,
        "<svg xmlns=\"{SVG_NS}\" xmlns:inkscape=\"{INKSCAPE_NS}\" xmlns:sodipodi=\"{SODIPODI_NS}\" xmlns:xlink=\"{XLINK_NS}\""
    );
    if root.id.as_str() != "root" {
        push_attr(&mut out, "id", root.id.as_str());
    }
    emit_props(&mut out, root);
    out.push_str(">\n");

    if let Some(view) = view {
        emit_namedview(&mut out, view);
    }
    for &child in graph.children(graph.root) {
        emit_node(&mut out, graph, child, 1, false);
    }
    out.push_str("</svg>\n");
    out
}

/// The emitted document split into lines, as stored by the undo stack.
pub fn emit_lines(graph: &SceneGraph, view: Option<&NamedView>) -> Vec<String> {
    emit_svg(graph, view).lines().map(str::to_string).collect()
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn emit_namedview(out: &mut String, view: &NamedView) {
    indent(out, 1);
    out.push_str("<sodipodi:namedview");
    push_attr(out, "id", "namedview1");
    push_attr(out, "inkscape:cx", &format_num(view.cx));
    push_attr(out, "inkscape:cy", &format_num(view.cy));
    push_attr(out, "inkscape:zoom", &format_num(view.zoom));
    if let Some(layer) = &view.current_layer {
        push_attr(out, "inkscape:current-layer", layer);
    }
    push_attr(out, "inkscape:document-units", &view.units);
    match &view.grid {
        None => out.push_str("/>\n"),
        Some(grid) => {
            out.push_str(">\n");
            indent(out, 2);
            out.push_str("<inkscape:grid");
            push_attr(out, "id", "grid1");
            push_attr(out, "type", "xygrid");
            push_attr(out, "spacingx", &format_num(grid.spacing));
            push_attr(out, "spacingy", &format_num(grid.spacing));
            push_attr(out, "units", &grid.units);
            out.push_str("/>\n");
            indent(out, 1);
            out.push_str("</sodipodi:namedview>\n");
        }
    }
}

fn emit_node(out: &mut String, graph: &SceneGraph, idx: NodeIndex, depth: usize, in_text: bool) {
    let node = &graph.graph[idx];
    let tag = element_name(node, in_text);

    indent(out, depth);
    let _ = write!(out, "<{tag}");
    push_attr(out, "id", node.id.as_str());
    if !node.name.is_empty() {
        push_attr(out, "inkscape:label", &node.name);
    }
    emit_geometry(out, &node.kind);
    if node.transform != Affine::IDENTITY {
        push_attr(out, "transform", &transform_to_svg(node.transform));
    }
    emit_props(out, node);

    let children = graph.children(idx);
    match &node.kind {
        NodeKind::Text { text, .. } => {
            out.push('>');
            out.push_str(&escape(text));
            if !children.is_empty() {
                out.push('\n');
                for &child in children {
                    emit_node(out, graph, child, depth + 1, true);
                }
                indent(out, depth);
            }
            let _ = writeln!(out, "</{tag}>");
        }
        NodeKind::Gradient { stops, .. } if children.is_empty() && !stops.is_empty() => {
            out.push_str(">\n");
            for stop in stops {
                indent(out, depth + 1);
                let _ = writeln!(
                    out,
                    "<stop offset=\"{}\" style=\"stop-color:{};stop-opacity:{}\"/>",
                    format_num(stop.offset),
                    stop.color.to_hex(),
                    format_num(stop.color.a as f64)
                );
            }
            indent(out, depth);
            let _ = writeln!(out, "</{tag}>");
        }
        _ if children.is_empty() => out.push_str("/>\n"),
        _ => {
            out.push_str(">\n");
            for &child in children {
                emit_node(out, graph, child, depth + 1, in_text);
            }
            indent(out, depth);
            let _ = writeln!(out, "</{tag}>");
        }
    }
}

fn element_name(node: &SceneNode, in_text: bool) -> &str {
    match &node.kind {
        NodeKind::Root => "svg",
        NodeKind::Group => "g",
        NodeKind::Defs => "defs",
        NodeKind::Rect { .. } => "rect",
        NodeKind::Ellipse { .. } => "ellipse",
        NodeKind::Circle { .. } => "circle",
        NodeKind::Line { .. } => "line",
        NodeKind::Path { .. } => "path",
        NodeKind::Text { .. } if in_text => "tspan",
        NodeKind::Text { .. } => "text",
        NodeKind::Image { .. } => "image",
        NodeKind::MetaData { tag } => tag,
        NodeKind::Gradient { radial: false, .. } => "linearGradient",
        NodeKind::Gradient { radial: true, .. } => "radialGradient",
    }
}

fn emit_geometry(out: &mut String, kind: &NodeKind) {
    let nums: &[(&str, f64)] = &match kind {
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
        } => vec![("x", *x), ("y", *y), ("width", *width), ("height", *height)],
        NodeKind::Ellipse { cx, cy, rx, ry } => {
            vec![("cx", *cx), ("cy", *cy), ("rx", *rx), ("ry", *ry)]
        }
        NodeKind::Circle { cx, cy, r } => vec![("cx", *cx), ("cy", *cy), ("r", *r)],
        NodeKind::Line { x1, y1, x2, y2 } => {
            vec![("x1", *x1), ("y1", *y1), ("x2", *x2), ("y2", *y2)]
        }
        NodeKind::Text { x, y, .. } => vec![("x", *x), ("y", *y)],
        NodeKind::Path { data } => {
            push_attr(out, "d", &data.to_svg_d());
            return;
        }
        _ => return,
    };
    for (key, v) in nums {
        push_attr(out, key, &format_num(*v));
    }
}

/// Attribute properties, with editor-owned keys mapped back to their
/// namespaced names.
fn emit_props(out: &mut String, node: &SceneNode) {
    for (key, value) in &node.props {
        let name = match key.as_str() {
            "groupmode" => "inkscape:groupmode",
            "insensitive" => "sodipodi:insensitive",
            "href" => "xlink:href",
            other => other,
        };
        push_attr(out, name, value);
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape(value));
}

/// SVG `transform` text: `translate(..)` for pure offsets, else `matrix(..)`.
pub fn transform_to_svg(xf: Affine) -> String {
    let [a, b, c, d, e, f] = xf.as_coeffs();
    if a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0 {
        return format!("translate({} {})", format_num(e), format_num(f));
    }
    let parts: Vec<String> = [a, b, c, d, e, f].into_iter().map(format_num).collect();
    format!("matrix({})", parts.join(" "))
}

/// Escape text for use in XML attribute values and character data.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::path::{PathCmd, PathData};
    use pretty_assertions::assert_eq;

    #[test]
    fn emits_one_element_per_line() {
        let mut g = SceneGraph::new();
        let mut layer = SceneNode::new(NodeId::intern("layer1"), NodeKind::Group)
            .with_prop("groupmode", "layer");
        layer.name = "Layer1".into();
        let layer = g.insert(g.root, layer, None);
        g.insert(
            layer,
            SceneNode::new(
                NodeId::intern("rect1"),
                NodeKind::Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 10.5,
                    height: 10.0,
                },
            )
            .with_prop("style", "fill:#ff0000"),
            None,
        );
        g.insert(
            layer,
            SceneNode::new(
                NodeId::intern("path1"),
                NodeKind::Path {
                    data: PathData::from_cmds(&[
                        PathCmd::MoveTo(0.0, 0.0),
                        PathCmd::LineTo(10.0, 0.0),
                    ]),
                },
            ),
            None,
        );

        let lines = emit_lines(&g, None);
        assert_eq!(
            &lines[2..],
            &[
                "  <g id=\"layer1\" inkscape:label=\"Layer1\" inkscape:groupmode=\"layer\">",
                "    <rect id=\"rect1\" x=\"0\" y=\"0\" width=\"10.5\" height=\"10\" style=\"fill:#ff0000\"/>",
                "    <path id=\"path1\" d=\"M 0 0 L 10 0\"/>",
                "  </g>",
                "</svg>",
            ]
        );
    }

    #[test]
    fn transform_text() {
        assert_eq!(transform_to_svg(Affine::translate((5.0, -2.5))), "translate(5 -2.5)");
        assert_eq!(
            transform_to_svg(Affine::scale(2.0)),
            "matrix(2 0 0 2 0 0)"
        );
    }

    #[test]
    fn text_escaped() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
