//! Align the selection against an anchor.

use crate::error::EditError;
use crate::state::EditState;
use kurbo::{Affine, Rect};
use vd_core::geom::union_all;
use vd_core::{BBoxPoint, NodeIndex, SceneGraph, world_bbox};

/// What the selection aligns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignAnchor {
    #[default]
    FirstSelected,
    LastSelected,
    /// The bounds of the whole drawing.
    Drawing,
    /// The union of the selection.
    SelectBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignKind {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
    /// Text baselines are not tracked; aligns left edges.
    BaselineHoriz,
    /// Aligns top edges.
    BaselineVert,
}

impl AlignKind {
    pub fn bbox_point(self) -> BBoxPoint {
        match self {
            AlignKind::Left | AlignKind::BaselineHoriz => BBoxPoint::Left,
            AlignKind::Center => BBoxPoint::Center,
            AlignKind::Right => BBoxPoint::Right,
            AlignKind::Top | AlignKind::BaselineVert => BBoxPoint::Top,
            AlignKind::Middle => BBoxPoint::Middle,
            AlignKind::Bottom => BBoxPoint::Bottom,
        }
    }
}

/// Translate each selected node so its `kind` coordinate matches the
/// anchor's. Returns how many nodes moved.
pub fn align_selected(
    graph: &mut SceneGraph,
    state: &EditState,
    kind: AlignKind,
    anchor: AlignAnchor,
) -> Result<usize, EditError> {
    let sel = state.selected_indices(graph);
    if sel.is_empty() {
        return Err(EditError::NoSelection);
    }
    let (anchor_rect, skip): (Option<Rect>, Option<NodeIndex>) = match anchor {
        AlignAnchor::FirstSelected => (world_bbox(graph, sel[0]), Some(sel[0])),
        AlignAnchor::LastSelected => {
            let last = sel[sel.len() - 1];
            (world_bbox(graph, last), Some(last))
        }
        AlignAnchor::Drawing => (world_bbox(graph, graph.root), None),
        AlignAnchor::SelectBox => (union_all(sel.iter().filter_map(|&i| world_bbox(graph, i))), None),
    };
    let Some(anchor_rect) = anchor_rect else {
        return Ok(0);
    };
    let bp = kind.bbox_point();
    let value = bp.value(anchor_rect);

    let mut moved = 0;
    for idx in sel {
        if Some(idx) == skip {
            continue;
        }
        let Some(r) = world_bbox(graph, idx) else {
            continue;
        };
        let t = bp.set_value(r, value).origin() - r.origin();
        if t.hypot() < 1e-9 {
            continue;
        }
        graph.apply_delta(idx, Affine::translate(t));
        moved += 1;
    }
    log::debug!("aligned {moved} node(s) {kind:?} to {anchor:?}");
    Ok(moved)
}
