//! Layer discipline.
//!
//! A layer is a `Group` with `groupmode=layer` directly under the root. It
//! is locked when `insensitive` is truthy and hidden when its `style` is
//! exactly `display:none`.

use crate::id::NodeId;
use crate::model::{NodeKind, SceneGraph, SceneNode};
use petgraph::graph::NodeIndex;

const HIDDEN_STYLE: &str = "display:none";

fn truthy(v: &str) -> bool {
    matches!(v.trim(), "true" | "1" | "yes")
}

/// Flat view of one layer, as shown in a layer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub id: NodeId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
}

impl SceneGraph {
    /// Nearest strict ancestor that is a layer.
    pub fn parent_layer(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.ancestors(idx)
            .into_iter()
            .find(|&a| self.graph[a].is_layer())
    }

    /// Layer groups under the root, back to front.
    pub fn layers(&self) -> Vec<NodeIndex> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|&c| self.graph[c].is_layer())
            .collect()
    }

    pub fn is_locked(&self, layer: NodeIndex) -> bool {
        self.graph[layer]
            .props
            .get("insensitive")
            .is_some_and(|v| truthy(v))
    }

    pub fn is_visible(&self, layer: NodeIndex) -> bool {
        self.graph[layer].props.get("style").map(String::as_str) != Some(HIDDEN_STYLE)
    }

    /// Whether interactive selection may pick this node: its layer (if
    /// any) is unlocked and visible.
    pub fn is_editable(&self, idx: NodeIndex) -> bool {
        match self.parent_layer(idx) {
            Some(layer) => !self.is_locked(layer) && self.is_visible(layer),
            None => true,
        }
    }

    pub fn set_locked(&mut self, layer: NodeIndex, locked: bool) {
        let props = &mut self.graph[layer].props;
        if locked {
            props.insert("insensitive".into(), "true".into());
        } else {
            props.remove("insensitive");
        }
    }

    pub fn set_visible(&mut self, layer: NodeIndex, visible: bool) {
        let props = &mut self.graph[layer].props;
        if visible {
            if props.get("style").map(String::as_str) == Some(HIDDEN_STYLE) {
                props.remove("style");
            }
        } else {
            props.insert("style".into(), HIDDEN_STYLE.into());
        }
    }

    /// Append a new layer on top with the first free `Layer<N>` name.
    pub fn add_layer(&mut self) -> NodeIndex {
        let taken: Vec<String> = self
            .layers()
            .into_iter()
            .map(|l| self.graph[l].name.clone())
            .collect();
        let name = (1..)
            .map(|n| format!("Layer{n}"))
            .find(|n| !taken.contains(n))
            .unwrap_or_default();
        let id = self.assign_unique_id("layer");
        let mut node = SceneNode::new(id, NodeKind::Group).with_prop("groupmode", "layer");
        node.name = name;
        log::debug!("adding layer {id:?} ({})", node.name);
        self.insert(self.root, node, None)
    }

    /// Layer list for a UI, back to front.
    pub fn layers_from_scene(&self) -> Vec<LayerInfo> {
        self.layers()
            .into_iter()
            .map(|l| LayerInfo {
                id: self.graph[l].id,
                name: self.graph[l].name.clone(),
                visible: self.is_visible(l),
                locked: self.is_locked(l),
            })
            .collect()
    }

    /// Write a (possibly edited) layer list back: names, flags and order.
    /// Entries whose id is not a layer are ignored.
    pub fn layers_to_scene(&mut self, list: &[LayerInfo]) {
        for info in list {
            let Some(idx) = self.index_of(info.id).filter(|&i| self.graph[i].is_layer()) else {
                log::warn!("layer list names unknown layer {:?}", info.id);
                continue;
            };
            self.graph[idx].name = info.name.clone();
            self.set_visible(idx, info.visible);
            self.set_locked(idx, info.locked);
            let root = self.root;
            self.move_node(idx, root, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_layer_names_are_unique() {
        let mut g = SceneGraph::new();
        let a = g.add_layer();
        let b = g.add_layer();
        assert_eq!(g.graph[a].name, "Layer1");
        assert_eq!(g.graph[b].name, "Layer2");
        assert_eq!(g.layers(), vec![a, b]);
        g.remove(a);
        let c = g.add_layer();
        assert_eq!(g.graph[c].name, "Layer1");
    }

    #[test]
    fn parent_layer_and_editability() {
        let mut g = SceneGraph::new();
        let layer = g.add_layer();
        let grp = g.insert(layer, SceneNode::new(NodeId::intern("pl-g"), NodeKind::Group), None);
        let leaf = g.insert(
            grp,
            SceneNode::new(NodeId::intern("pl-leaf"), NodeKind::Circle { cx: 0.0, cy: 0.0, r: 1.0 }),
            None,
        );
        assert_eq!(g.parent_layer(leaf), Some(layer));
        assert_eq!(g.parent_layer(layer), None);
        assert!(g.is_editable(leaf));

        g.set_locked(layer, true);
        assert!(!g.is_editable(leaf));
        g.set_locked(layer, false);
        g.set_visible(layer, false);
        assert!(!g.is_editable(leaf));
        g.set_visible(layer, true);
        assert!(g.is_editable(leaf));
    }

    #[test]
    fn locked_means_truthy() {
        let mut g = SceneGraph::new();
        let layer = g.add_layer();
        g.graph[layer].props.insert("insensitive".into(), "false".into());
        assert!(!g.is_locked(layer));
        g.graph[layer].props.insert("style".into(), "display:inline".into());
        assert!(g.is_visible(layer));
    }

    #[test]
    fn layer_list_sync() {
        let mut g = SceneGraph::new();
        let a = g.add_layer();
        let b = g.add_layer();
        let mut list = g.layers_from_scene();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|l| l.visible && !l.locked));

        list.swap(0, 1);
        list[0].locked = true;
        list[1].visible = false;
        list[1].name = "Top".into();
        g.layers_to_scene(&list);

        assert_eq!(g.layers(), vec![b, a]);
        assert!(g.is_locked(b));
        assert!(!g.is_visible(a));
        assert_eq!(g.graph[a].name, "Top");
        assert_eq!(g.layers_from_scene(), list);
    }
}
