//! World-space bounding boxes.
//!
//! `recompute_bboxes` walks the tree once, accumulating transforms from the
//! view down, and caches a pixel-rounded AABB on every node. Containers
//! take the union of their children. Definitions get `Rect::ZERO`.

use crate::geom::{pixel_rect, union_all};
use crate::model::SceneGraph;
use crate::shape::NodeGeom;
use kurbo::{Affine, Rect};
use petgraph::graph::NodeIndex;

/// Refresh every cached bbox. Returns the drawing bounds (root union).
pub fn recompute_bboxes(graph: &mut SceneGraph) -> Option<Rect> {
    let root = graph.root;
    let view = graph.view;
    recompute_from(graph, root, view)
}

fn recompute_from(graph: &mut SceneGraph, idx: NodeIndex, parent_xf: Affine) -> Option<Rect> {
    let node = &graph.graph[idx];
    if node.kind.is_definition() {
        let children = graph.children(idx).to_vec();
        graph.graph[idx].bbox = Rect::ZERO;
        for child in children {
            clear_subtree(graph, child);
        }
        return None;
    }

    let xf = parent_xf * node.transform;
    let own = node.bbox_world(xf);
    let children = graph.children(idx).to_vec();
    let child_bounds: Vec<Rect> = children
        .into_iter()
        .filter_map(|c| recompute_from(graph, c, xf))
        .collect();

    let raw = union_all(own.into_iter().chain(child_bounds));
    graph.graph[idx].bbox = raw.map_or(Rect::ZERO, pixel_rect);
    raw
}

fn clear_subtree(graph: &mut SceneGraph, idx: NodeIndex) {
    graph.graph[idx].bbox = Rect::ZERO;
    for child in graph.children(idx).to_vec() {
        clear_subtree(graph, child);
    }
}

/// Unrounded world bbox of a single node, computed from scratch.
pub fn world_bbox(graph: &SceneGraph, idx: NodeIndex) -> Option<Rect> {
    let node = &graph.graph[idx];
    if node.kind.is_definition() {
        return None;
    }
    let xf = graph.world_transform(idx);
    let own = node.bbox_world(xf);
    let children = graph
        .children(idx)
        .iter()
        .filter_map(|&c| world_bbox(graph, c));
    union_all(own.into_iter().chain(children))
}

/// Union of the cached bboxes of the given nodes.
pub fn union_cached(graph: &SceneGraph, nodes: impl IntoIterator<Item = NodeIndex>) -> Option<Rect> {
    union_all(
        nodes
            .into_iter()
            .filter(|&i| graph.graph.contains_node(i))
            .map(|i| graph.graph[i].bbox)
            .filter(|r| *r != Rect::ZERO),
    )
}
