//! Hit testing: point and marquee → node lookup.
//!
//! Walks the scene front-to-back against the cached pixel bboxes. Locked
//! and hidden layers are invisible to both queries, as are definitions.

use kurbo::{Point, Rect};
use std::collections::HashSet;
use vd_core::geom::contains_rect;
use vd_core::id::NodeId;
use vd_core::model::{NodeKind, SceneGraph};
use vd_core::NodeIndex;

fn contains_point(r: Rect, p: Point) -> bool {
    p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
}

/// Whether the walk may enter `idx` at all.
fn is_pickable(graph: &SceneGraph, idx: NodeIndex) -> bool {
    let node = &graph.graph[idx];
    if node.kind.is_definition() {
        return false;
    }
    !node.is_layer() || (graph.is_visible(idx) && !graph.is_locked(idx))
}

/// Find the topmost shape whose bbox contains `pos`, skipping any node
/// in `exclude`. Returns `None` on background.
pub fn hit_point(graph: &SceneGraph, pos: Point, exclude: &HashSet<NodeId>) -> Option<NodeId> {
    hit_point_node(graph, graph.root, pos, exclude)
}

fn hit_point_node(
    graph: &SceneGraph,
    idx: NodeIndex,
    pos: Point,
    exclude: &HashSet<NodeId>,
) -> Option<NodeId> {
    if !is_pickable(graph, idx) {
        return None;
    }
    let node = &graph.graph[idx];
    if node.kind.is_shape() {
        // Text spans belong to their text node.
        return (!exclude.contains(&node.id) && contains_point(node.bbox, pos)).then_some(node.id);
    }

    // Last painted = topmost
    graph
        .children(idx)
        .iter()
        .rev()
        .find_map(|&child| hit_point_node(graph, child, pos, exclude))
}

/// Find every node fully inside `r`, in paint order. A group that fits
/// is returned whole and not descended into. Layers and the root are
/// containers only and never match themselves.
pub fn hit_rect(graph: &SceneGraph, r: Rect) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_contained(graph, graph.root, r, &mut out);
    out
}

fn collect_contained(graph: &SceneGraph, idx: NodeIndex, r: Rect, out: &mut Vec<NodeId>) {
    if !is_pickable(graph, idx) {
        return;
    }
    let node = &graph.graph[idx];
    let container = matches!(node.kind, NodeKind::Root) || node.is_layer();
    if !container {
        if node.bbox != Rect::ZERO && contains_rect(r, node.bbox) {
            out.push(node.id);
            return;
        }
        if node.kind.is_shape() {
            return;
        }
    }
    for &child in graph.children(idx) {
        collect_contained(graph, child, r, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vd_core::{parse_svg, recompute_bboxes};

    fn scene(body: &str) -> SceneGraph {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd">{body}</svg>"#
        );
        let (mut g, _) = parse_svg(&svg).expect("test svg parses");
        recompute_bboxes(&mut g);
        g
    }

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn topmost_wins() {
        let g = scene(
            r#"<rect id="back" width="100" height="100"/>
               <rect id="front" x="50" y="50" width="100" height="100"/>"#,
        );
        let none = HashSet::new();
        assert_eq!(hit_point(&g, Point::new(75.0, 75.0), &none), Some(id("front")));
        assert_eq!(hit_point(&g, Point::new(10.0, 10.0), &none), Some(id("back")));
        assert_eq!(hit_point(&g, Point::new(500.0, 500.0), &none), None);
    }

    #[test]
    fn exclusion_reveals_what_is_below() {
        let g = scene(
            r#"<rect id="ex-back" width="100" height="100"/>
               <rect id="ex-front" width="100" height="100"/>"#,
        );
        let exclude: HashSet<_> = [id("ex-front")].into();
        assert_eq!(hit_point(&g, Point::new(5.0, 5.0), &exclude), Some(id("ex-back")));
    }

    #[test]
    fn returns_leaf_inside_group() {
        let g = scene(r#"<g id="hg"><circle id="hc" cx="10" cy="10" r="5"/></g>"#);
        assert_eq!(hit_point(&g, Point::new(10.0, 10.0), &HashSet::new()), Some(id("hc")));
    }

    #[test]
    fn locked_and_hidden_layers_are_skipped() {
        let g = scene(
            r#"<g id="base" inkscape:groupmode="layer"><rect id="lk-base" width="10" height="10"/></g>
               <g id="locked" inkscape:groupmode="layer" sodipodi:insensitive="true">
                 <rect id="lk-locked" width="10" height="10"/>
               </g>
               <g id="hidden" inkscape:groupmode="layer" style="display:none">
                 <rect id="lk-hidden" width="10" height="10"/>
               </g>"#,
        );
        assert_eq!(hit_point(&g, Point::new(5.0, 5.0), &HashSet::new()), Some(id("lk-base")));
        assert_eq!(hit_rect(&g, Rect::new(-1.0, -1.0, 20.0, 20.0)), vec![id("lk-base")]);
    }

    #[test]
    fn marquee_needs_full_containment() {
        let g = scene(
            r#"<rect id="in" x="10" y="10" width="10" height="10"/>
               <rect id="out" x="90" y="90" width="50" height="50"/>
               <g id="grp"><rect id="ga" x="30" y="30" width="5" height="5"/><rect id="gb" x="40" y="40" width="5" height="5"/></g>"#,
        );
        assert_eq!(
            hit_rect(&g, Rect::new(0.0, 0.0, 100.0, 100.0)),
            vec![id("in"), id("grp")]
        );
        // Group only partly inside: its fitting children are picked
        assert_eq!(hit_rect(&g, Rect::new(25.0, 25.0, 37.0, 37.0)), vec![id("ga")]);
    }
}
