//! Current-layer policy and the flat layer list.
//!
//! The current layer is tracked in the edit state and mirrored into the
//! namedview so it survives save and undo.

use crate::error::EditError;
use crate::state::EditState;
use vd_core::{Document, LayerInfo, NodeId, NodeIndex};

/// The current layer, if it still names a layer in the document.
pub fn current_layer(doc: &Document, state: &EditState) -> Option<NodeIndex> {
    let idx = doc.graph.index_of(state.current_layer?)?;
    doc.graph.graph[idx].is_layer().then_some(idx)
}

/// Where new elements go: the current layer, else the root.
pub fn insertion_parent(doc: &Document, state: &EditState) -> NodeIndex {
    current_layer(doc, state).unwrap_or(doc.graph.root)
}

fn remember(doc: &mut Document, state: &mut EditState, id: Option<NodeId>) {
    state.current_layer = id;
    doc.view.current_layer = id.map(|id| id.to_string());
}

/// Append a new `Layer<N>` on top and make it current.
pub fn add_layer(doc: &mut Document, state: &mut EditState) -> NodeId {
    let idx = doc.graph.add_layer();
    let id = doc.graph.graph[idx].id;
    remember(doc, state, Some(id));
    id
}

/// Make `id` the current layer. Choosing a locked or hidden layer unlocks
/// and shows it.
pub fn set_current_layer(doc: &mut Document, state: &mut EditState, id: NodeId) -> Result<(), EditError> {
    let idx = doc
        .graph
        .index_of(id)
        .filter(|&i| doc.graph.graph[i].is_layer())
        .ok_or(EditError::NotALayer(id))?;
    if doc.graph.is_locked(idx) || !doc.graph.is_visible(idx) {
        log::debug!("layer {id} made current: clearing lock and hide");
        doc.graph.set_locked(idx, false);
        doc.graph.set_visible(idx, true);
    }
    remember(doc, state, Some(id));
    Ok(())
}

/// Pick the current layer up from the document after a load or undo,
/// falling back to the topmost layer.
pub fn restore_current_layer(doc: &mut Document, state: &mut EditState) {
    let named = doc
        .view
        .current_layer
        .as_deref()
        .and_then(|name| doc.graph.index_of(NodeId::intern(name)))
        .filter(|&i| doc.graph.graph[i].is_layer());
    let idx = named.or_else(|| doc.graph.layers().last().copied());
    let id = idx.map(|i| doc.graph.graph[i].id);
    remember(doc, state, id);
}

pub fn sync_layers_from_scene(doc: &Document) -> Vec<LayerInfo> {
    doc.graph.layers_from_scene()
}

/// Apply an edited layer list. The current layer is dropped when it is
/// no longer visible and unlocked.
pub fn sync_layers_to_scene(doc: &mut Document, state: &mut EditState, list: &[LayerInfo]) {
    doc.graph.layers_to_scene(list);
    if let Some(idx) = current_layer(doc, state)
        && (doc.graph.is_locked(idx) || !doc.graph.is_visible(idx))
    {
        remember(doc, state, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_layer_becomes_current() {
        let mut doc = Document::new();
        let mut st = EditState::new();
        assert_eq!(insertion_parent(&doc, &st), doc.graph.root);
        let id = add_layer(&mut doc, &mut st);
        assert_eq!(st.current_layer, Some(id));
        assert_eq!(doc.view.current_layer.as_deref(), Some(id.as_str()));
        assert_eq!(insertion_parent(&doc, &st), doc.graph.index_of(id).unwrap());
    }

    #[test]
    fn choosing_a_locked_layer_unlocks_it() {
        let mut doc = Document::new();
        let mut st = EditState::new();
        let a = add_layer(&mut doc, &mut st);
        let _b = add_layer(&mut doc, &mut st);
        let ai = doc.graph.index_of(a).unwrap();
        doc.graph.set_locked(ai, true);
        doc.graph.set_visible(ai, false);
        set_current_layer(&mut doc, &mut st, a).unwrap();
        assert!(!doc.graph.is_locked(ai));
        assert!(doc.graph.is_visible(ai));
        assert_eq!(st.current_layer, Some(a));
        let root = doc.graph.graph[doc.graph.root].id;
        assert!(matches!(
            set_current_layer(&mut doc, &mut st, root),
            Err(EditError::NotALayer(id)) if id == root
        ));
    }

    #[test]
    fn list_round_trip_and_current_layer_fallback() {
        let mut doc = Document::new();
        let mut st = EditState::new();
        let a = add_layer(&mut doc, &mut st);
        let b = add_layer(&mut doc, &mut st);
        let mut list = sync_layers_from_scene(&doc);
        assert_eq!(list.iter().map(|l| l.id).collect::<Vec<_>>(), vec![a, b]);
        list[1].locked = true;
        list.reverse();
        sync_layers_to_scene(&mut doc, &mut st, &list);
        assert_eq!(doc.graph.layers_from_scene().iter().map(|l| l.id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(st.current_layer, None);

        doc.view.current_layer = None;
        restore_current_layer(&mut doc, &mut st);
        assert_eq!(st.current_layer, Some(a));
    }
}
