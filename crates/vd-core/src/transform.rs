//! Structural passes over groups that mutate the `SceneGraph` in place.
//!
//! Each pass preserves the rendered result: styles move from groups down
//! to the leaves they affect and group transforms are pushed into their
//! children before the group goes away.

use crate::model::SceneGraph;
use crate::shape::NodeGeom;
use kurbo::Affine;
use petgraph::graph::NodeIndex;

/// Presentation properties that inherit from a group to its content.
pub const INHERITED_PROPS: [&str; 12] = [
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-dasharray",
    "marker-start",
    "marker-mid",
    "marker-end",
    "font-size",
    "font-family",
];

fn is_plain_group(graph: &SceneGraph, idx: NodeIndex) -> bool {
    let node = &graph.graph[idx];
    node.is_group() && !node.is_layer()
}

// ─── Distribute ──────────────────────────────────────────────────────────

/// Push the inherited style properties of `group` down to its children,
/// recursively, so they land on leaves. A child's own value wins.
pub fn distribute_props(graph: &mut SceneGraph, group: NodeIndex) {
    let children = graph.children(group).to_vec();
    for key in INHERITED_PROPS {
        let Some(value) = graph.graph[group].prop(key).map(str::to_string) else {
            continue;
        };
        for &child in &children {
            let node = &mut graph.graph[child];
            if node.prop(key).is_none() && !node.kind.is_definition() {
                node.set_prop(key, &value);
            }
        }
        graph.graph[group].remove_prop(key);
    }
    for child in children {
        if graph.graph[child].is_group() {
            distribute_props(graph, child);
        }
    }
}

/// Distribute styles out of every plain (non-layer) group.
pub fn distribute_all(graph: &mut SceneGraph) {
    let groups: Vec<NodeIndex> = graph
        .graph
        .node_indices()
        .filter(|&i| is_plain_group(graph, i))
        .collect();
    for g in groups {
        distribute_props(graph, g);
    }
}

// ─── Ungroup ─────────────────────────────────────────────────────────────

/// Dissolve a plain group: its styles and transform move into the
/// children, which take the group's place in its parent. Returns the
/// former children in paint order; empty if `group` is not a plain group.
pub fn ungroup(graph: &mut SceneGraph, group: NodeIndex) -> Vec<NodeIndex> {
    if !is_plain_group(graph, group) {
        return Vec::new();
    }
    let Some(parent) = graph.parent(group) else {
        return Vec::new();
    };
    distribute_props(graph, group);

    let gxf = graph.graph[group].transform;
    let at = graph.child_position(group).unwrap_or(0);
    let children = graph.children(group).to_vec();
    for (i, &child) in children.iter().enumerate() {
        push_transform(graph, child, gxf);
        graph.move_node(child, parent, Some(at + i));
    }
    graph.remove(group);
    children
}

/// Make `child` carry `gxf` on the outside of its own transform. Leaves
/// without a transform get it folded into their geometry where possible.
fn push_transform(graph: &mut SceneGraph, child: NodeIndex, gxf: Affine) {
    if gxf == Affine::IDENTITY {
        return;
    }
    let leaf = graph.children(child).is_empty();
    let node = &mut graph.graph[child];
    if leaf && node.transform == Affine::IDENTITY && node.kind.is_shape() {
        node.apply_delta(gxf);
    } else {
        node.transform = gxf * node.transform;
    }
}

/// Ungroup every plain group holding exactly one leaf. Returns how many
/// groups were removed.
pub fn ungroup_singletons(graph: &mut SceneGraph) -> usize {
    let singles: Vec<NodeIndex> = graph
        .graph
        .node_indices()
        .filter(|&i| {
            is_plain_group(graph, i)
                && matches!(graph.children(i), [only] if graph.graph[*only].kind.is_shape())
        })
        .collect();
    let count = singles.len();
    for g in singles {
        ungroup(graph, g);
    }
    count
}
