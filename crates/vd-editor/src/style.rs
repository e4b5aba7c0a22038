//! Paint and style changes on the selection.
//!
//! Properties always land on leaves: a selected group passes the change to
//! every shape below it. Gradient paint keeps one private definition per
//! node, created in `<defs>` on demand and dropped once unreferenced.

use vd_core::geom::format_num;
use vd_core::model::{Color, GradientStop, paint_url, url_of};
use vd_core::parser::parse_length;
use vd_core::{NodeId, NodeIndex, NodeKind, SceneGraph, SceneNode, WalkControl};

/// How a fill or stroke is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintKind {
    Off,
    Solid,
    Linear,
    Radial,
    /// Drop the node's own value so it inherits from its parent.
    Inherit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPos {
    Start,
    Mid,
    End,
}

impl MarkerPos {
    pub fn prop(self) -> &'static str {
        match self {
            MarkerPos::Start => "marker-start",
            MarkerPos::Mid => "marker-mid",
            MarkerPos::End => "marker-end",
        }
    }
}

/// Color given to a marker definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerColor {
    StrokeColor,
    FillColor,
    Custom(Color),
}

/// Shape leaves under `roots` (a shape root is its own leaf).
pub fn leaves(graph: &SceneGraph, roots: &[NodeIndex]) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    for &root in roots {
        graph.walk(root, |idx, node| {
            if node.kind.is_definition() {
                return WalkControl::SkipChildren;
            }
            if node.kind.is_shape() {
                out.push(idx);
                return WalkControl::SkipChildren;
            }
            WalkControl::Continue
        });
    }
    out.dedup();
    out
}

/// Run `f` on every leaf under `roots`. Returns the number of leaves.
pub fn for_each_leaf(
    graph: &mut SceneGraph,
    roots: &[NodeIndex],
    mut f: impl FnMut(&mut SceneGraph, NodeIndex),
) -> usize {
    let targets = leaves(graph, roots);
    for &idx in &targets {
        f(graph, idx);
    }
    targets.len()
}

/// Set a plain property on every leaf.
pub fn set_prop(graph: &mut SceneGraph, roots: &[NodeIndex], key: &str, value: &str) -> usize {
    for_each_leaf(graph, roots, |g, idx| g.graph[idx].set_prop(key, value))
}

// ─── Paint ───────────────────────────────────────────────────────────────

fn transparent(c: Color) -> Color {
    Color { a: 0.0, ..c }
}

/// Paint `prop` (`fill` or `stroke`) on every leaf.
pub fn set_paint(
    graph: &mut SceneGraph,
    roots: &[NodeIndex],
    prop: &str,
    kind: PaintKind,
    color: Color,
) -> usize {
    let opacity = format!("{prop}-opacity");
    for_each_leaf(graph, roots, |g, idx| {
        let old = g.graph[idx].prop(prop).and_then(paint_url);
        match kind {
            PaintKind::Off => {
                g.graph[idx].set_prop(prop, "none");
                g.graph[idx].remove_prop(&opacity);
            }
            PaintKind::Solid => {
                let node = &mut g.graph[idx];
                node.set_prop(prop, &color.to_hex());
                if color.a < 1.0 {
                    node.set_prop(&opacity, &format_num(f64::from(color.a)));
                } else {
                    node.remove_prop(&opacity);
                }
            }
            PaintKind::Inherit => {
                g.graph[idx].remove_prop(prop);
                g.graph[idx].remove_prop(&opacity);
            }
            PaintKind::Linear | PaintKind::Radial => {
                let radial = kind == PaintKind::Radial;
                if let Some(gid) = old
                    && update_private_gradient(g, gid, radial, color)
                {
                    return;
                }
                let gid = new_gradient(g, radial, color);
                g.graph[idx].set_prop(prop, &url_of(gid));
            }
        }
        if let Some(gid) = old {
            g.drop_gradient_if_unused(gid);
        }
    })
}

/// Recolor `gid` in place when only one node uses it and it has the
/// wanted shape. Returns whether it did.
fn update_private_gradient(graph: &mut SceneGraph, gid: NodeId, radial: bool, color: Color) -> bool {
    if graph.ref_count(gid) != 1 {
        return false;
    }
    let Some(node) = graph.get_by_id_mut(gid) else {
        return false;
    };
    match &mut node.kind {
        NodeKind::Gradient { radial: r, stops } if *r == radial => {
            match stops.first_mut() {
                Some(stop) => stop.color = color,
                None => stops.push(GradientStop { offset: 0.0, color }),
            }
            true
        }
        _ => false,
    }
}

fn new_gradient(graph: &mut SceneGraph, radial: bool, color: Color) -> NodeId {
    let kind = NodeKind::Gradient {
        radial,
        stops: vec![
            GradientStop { offset: 0.0, color },
            GradientStop {
                offset: 1.0,
                color: transparent(color),
            },
        ],
    };
    let id = graph.assign_unique_id(kind.id_prefix());
    let defs = graph.defs();
    graph.insert(defs, SceneNode::new(id, kind), None);
    log::trace!("new gradient {id:?}");
    id
}

// ─── Stroke ──────────────────────────────────────────────────────────────

fn stroke_width_of(node: &SceneNode) -> f64 {
    node.prop("stroke-width").map(parse_length).filter(|w| *w > 0.0).unwrap_or(1.0)
}

/// `stroke-dasharray` for a dash pattern given in stroke widths.
pub fn dash_string(pattern: &[f64], width: f64) -> String {
    pattern
        .iter()
        .map(|p| format_num(p * width))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_dashes(s: &str) -> Vec<f64> {
    s.split([',', ' '])
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.trim().parse().ok())
        .collect()
}

/// Set the stroke width; an existing dash array keeps its proportions.
pub fn set_stroke_width(graph: &mut SceneGraph, roots: &[NodeIndex], width: f64) -> usize {
    for_each_leaf(graph, roots, |g, idx| {
        let node = &mut g.graph[idx];
        let old = stroke_width_of(node);
        node.set_prop("stroke-width", &format_num(width));
        let Some(dashes) = node.prop("stroke-dasharray").map(parse_dashes) else {
            return;
        };
        if dashes.is_empty() {
            return;
        }
        let pattern: Vec<f64> = dashes.iter().map(|d| d / old).collect();
        node.set_prop("stroke-dasharray", &dash_string(&pattern, width));
    })
}

/// Set the dash pattern (in stroke widths); an empty pattern removes it.
pub fn set_dashes(graph: &mut SceneGraph, roots: &[NodeIndex], pattern: &[f64]) -> usize {
    for_each_leaf(graph, roots, |g, idx| {
        let node = &mut g.graph[idx];
        if pattern.is_empty() {
            node.remove_prop("stroke-dasharray");
        } else {
            let width = stroke_width_of(node);
            node.set_prop("stroke-dasharray", &dash_string(pattern, width));
        }
    })
}

// ─── Markers ─────────────────────────────────────────────────────────────

/// Set or (with `None`) clear a marker. Each name/color pair gets one
/// marker definition, shared by every node using it.
pub fn set_marker(
    graph: &mut SceneGraph,
    roots: &[NodeIndex],
    pos: MarkerPos,
    name: Option<&str>,
    color: MarkerColor,
) -> usize {
    for_each_leaf(graph, roots, |g, idx| {
        let Some(name) = name else {
            g.graph[idx].remove_prop(pos.prop());
            return;
        };
        let node = &g.graph[idx];
        let c = match color {
            MarkerColor::StrokeColor => node.prop("stroke").and_then(Color::parse),
            MarkerColor::FillColor => node.prop("fill").and_then(Color::parse),
            MarkerColor::Custom(c) => Some(c),
        }
        .unwrap_or(Color::BLACK);
        let hex = c.to_hex();
        let id = NodeId::intern(&format!("{name}-{}", hex.trim_start_matches('#')));
        if g.index_of(id).is_none() {
            let defs = g.defs();
            let mut marker = SceneNode::new(
                id,
                NodeKind::MetaData {
                    tag: "marker".to_string(),
                },
            )
            .with_prop("fill", &hex)
            .with_prop("orient", "auto");
            marker.name = name.to_string();
            g.insert(defs, marker, None);
        }
        g.graph[idx].set_prop(pos.prop(), &url_of(id));
    })
}

// ─── Text ────────────────────────────────────────────────────────────────

/// Set a text property (font-size, font-family, ...) on text leaves only.
pub fn set_text_prop(graph: &mut SceneGraph, roots: &[NodeIndex], key: &str, value: &str) -> usize {
    let texts: Vec<NodeIndex> = leaves(graph, roots)
        .into_iter()
        .filter(|&i| matches!(graph.graph[i].kind, NodeKind::Text { .. }))
        .collect();
    for &idx in &texts {
        graph.graph[idx].set_prop(key, value);
    }
    texts.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vd_core::parse_svg;

    fn setup() -> SceneGraph {
        parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <g id="grp">
                   <rect id="r1" width="10" height="10" style="fill:#ff0000;stroke:#000000"/>
                   <path id="p1" d="M 0 0 L 10 10" style="stroke:#00ff00;stroke-width:2"/>
                 </g>
               </svg>"#,
        )
        .unwrap()
        .0
    }

    fn idx(g: &SceneGraph, id: &str) -> NodeIndex {
        g.index_of(NodeId::intern(id)).unwrap()
    }

    fn prop<'a>(g: &'a SceneGraph, id: &str, key: &str) -> Option<&'a str> {
        g.get_by_id(NodeId::intern(id)).unwrap().prop(key)
    }

    #[test]
    fn group_changes_reach_leaves() {
        let mut g = setup();
        let grp = idx(&g, "grp");
        let blue = Color::rgba(0.0, 0.0, 1.0, 0.5);
        assert_eq!(set_paint(&mut g, &[grp], "fill", PaintKind::Solid, blue), 2);
        assert_eq!(prop(&g, "r1", "fill"), Some("#0000ff"));
        assert_eq!(prop(&g, "p1", "fill-opacity"), Some("0.5"));
        assert_eq!(g.get_by_id(NodeId::intern("grp")).unwrap().prop("fill"), None);
        set_paint(&mut g, &[grp], "fill", PaintKind::Off, blue);
        assert_eq!(prop(&g, "r1", "fill"), Some("none"));
        assert_eq!(prop(&g, "p1", "fill-opacity"), None);
    }

    #[test]
    fn gradient_is_private_and_dropped() {
        let mut g = setup();
        let r1 = idx(&g, "r1");
        let red = Color::rgba(1.0, 0.0, 0.0, 1.0);
        set_paint(&mut g, &[r1], "fill", PaintKind::Linear, red);
        let gid = prop(&g, "r1", "fill").and_then(paint_url).unwrap();
        assert!(matches!(
            g.get_by_id(gid).unwrap().kind,
            NodeKind::Gradient { radial: false, .. }
        ));

        // Recoloring reuses the private definition
        set_paint(&mut g, &[r1], "fill", PaintKind::Linear, Color::WHITE);
        assert_eq!(prop(&g, "r1", "fill").and_then(paint_url), Some(gid));

        // Switching to radial replaces it
        set_paint(&mut g, &[r1], "fill", PaintKind::Radial, red);
        let rid = prop(&g, "r1", "fill").and_then(paint_url).unwrap();
        assert_ne!(rid, gid);
        assert!(g.get_by_id(gid).is_none());

        set_paint(&mut g, &[r1], "fill", PaintKind::Solid, red);
        assert!(g.get_by_id(rid).is_none());
    }

    #[test]
    fn dashes_follow_width() {
        let mut g = setup();
        let p1 = idx(&g, "p1");
        set_dashes(&mut g, &[p1], &[2.0, 1.0]);
        assert_eq!(prop(&g, "p1", "stroke-dasharray"), Some("4,2"));
        set_stroke_width(&mut g, &[p1], 3.0);
        assert_eq!(prop(&g, "p1", "stroke-width"), Some("3"));
        assert_eq!(prop(&g, "p1", "stroke-dasharray"), Some("6,3"));
        set_dashes(&mut g, &[p1], &[]);
        assert_eq!(prop(&g, "p1", "stroke-dasharray"), None);
    }

    #[test]
    fn markers_share_definitions() {
        let mut g = setup();
        let grp = idx(&g, "grp");
        set_marker(&mut g, &[grp], MarkerPos::End, Some("Arrow"), MarkerColor::Custom(Color::BLACK));
        assert_eq!(prop(&g, "r1", "marker-end"), Some("url(#Arrow-000000)"));
        assert_eq!(prop(&g, "p1", "marker-end"), Some("url(#Arrow-000000)"));
        assert!(g.get_by_id(NodeId::intern("Arrow-000000")).is_some());
        set_marker(&mut g, &[grp], MarkerPos::End, None, MarkerColor::StrokeColor);
        assert_eq!(prop(&g, "p1", "marker-end"), None);
    }

    #[test]
    fn text_props_skip_shapes() {
        let (mut g, _) = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="t" x="0" y="10">hi</text><rect id="r" width="1" height="1"/></svg>"#,
        )
        .unwrap();
        let root = g.root;
        assert_eq!(set_text_prop(&mut g, &[root], "font-size", "20px"), 1);
        assert_eq!(prop(&g, "t", "font-size"), Some("20px"));
        assert_eq!(prop(&g, "r", "font-size"), None);
    }
}
