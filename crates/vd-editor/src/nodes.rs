//! Path-node editing: move nodes and control points, insert, replace and
//! delete segments of the active path.
//!
//! Node indices are logical endpoint numbers (`Close` owns none). Drags
//! work from the path snapshot taken at drag start; structural edits work
//! on a copy of the command buffer that is validated before it replaces
//! the path's data.

use crate::error::EditError;
use crate::input::Pointer;
use crate::settings::Settings;
use crate::snap::{Grid, snap_to_nodes};
use crate::state::{CtrlKind, EditState};
use kurbo::{Affine, Point, Vec2};
use std::collections::BTreeSet;
use vd_core::geom::transform_vec;
use vd_core::{NodeIndex, NodeKind, PathCmd, PathData, PathOp, SceneGraph};

fn path_data(graph: &SceneGraph, idx: NodeIndex) -> Option<&PathData> {
    match &graph.graph[idx].kind {
        NodeKind::Path { data } => Some(data),
        _ => None,
    }
}

/// Replace the path's data after checking the buffer is well formed. A
/// malformed result leaves the path untouched.
pub fn commit_path(graph: &mut SceneGraph, idx: NodeIndex, data: PathData) -> Result<(), EditError> {
    let checked = data.validate();
    debug_assert!(checked.is_ok(), "path edit produced a malformed buffer: {checked:?}");
    checked?;
    if let NodeKind::Path { data: current } = &mut graph.graph[idx].kind {
        *current = data;
    }
    Ok(())
}

/// The path's world transform and its inverse, if invertible.
fn frames(graph: &SceneGraph, idx: NodeIndex) -> Option<(Affine, Affine)> {
    let xf = graph.world_transform(idx);
    (xf.determinant().abs() > 1e-12).then(|| (xf, xf.inverse()))
}

/// Drag path and snapshot data, when a node drag is in progress.
fn drag_context(graph: &SceneGraph, state: &EditState) -> Option<(NodeIndex, usize, PathData)> {
    let idx = state.active_path(graph)?;
    let index = state.node.drag_index?;
    let snap = state.node.snapshot.as_ref()?;
    match &snap.kind {
        NodeKind::Path { data } => Some((idx, index, data.clone())),
        _ => None,
    }
}

/// One node-move frame. Moves every selected node when the dragged node is
/// part of the selection, else only the dragged one. Without Alt, the
/// controls attached to each moved node travel with it.
pub fn node_move(
    graph: &mut SceneGraph,
    state: &mut EditState,
    settings: &Settings,
    grid: &Grid,
    ptr: &Pointer,
) -> Result<(), EditError> {
    let Some((idx, index, base)) = drag_context(graph, state) else {
        return Ok(());
    };
    let Some((xf, inv)) = frames(graph, idx) else {
        return Ok(());
    };
    let Some(seg) = base.segment(index) else {
        return Ok(());
    };
    state.drag_pos = ptr.pos;

    let moving: BTreeSet<usize> = if state.node.selected.contains(&index) {
        state.node.selected.clone()
    } else {
        BTreeSet::from([index])
    };

    let origin = xf * seg.end;
    let mut target = origin + (ptr.pos - state.drag_start);
    if settings.snap_grid {
        target = grid.snap(target, settings.snap_zone);
    }
    if settings.snap_nodes {
        let others: Vec<Point> = state
            .node
            .records
            .iter()
            .filter(|r| !moving.contains(&r.point_index))
            .map(|r| r.world_end)
            .collect();
        target = snap_to_nodes(target, &others, settings.snap_zone);
    }
    let d = transform_vec(inv, target - origin);

    let mut data = base.clone();
    let mut ctrls_done: BTreeSet<(usize, usize)> = BTreeSet::new();
    for &i in &moving {
        let Some(seg) = base.segment(i) else {
            continue;
        };
        data.translate_end(seg.index, d);
        if ptr.mods.alt {
            continue;
        }
        for which in [1, 2] {
            if ctrls_done.insert((seg.index, which)) {
                data.translate_ctrl(seg.index, which, d);
            }
        }
        if let Some(next) = base.segment(i + 1).filter(|n| n.op() == PathOp::CubeTo)
            && ctrls_done.insert((next.index, 1))
        {
            data.translate_ctrl(next.index, 1, d);
        }
    }
    commit_path(graph, idx, data)?;
    state.refresh_node_records(graph);
    Ok(())
}

/// One control-move frame: only the dragged control point changes.
pub fn ctrl_move(
    graph: &mut SceneGraph,
    state: &mut EditState,
    settings: &Settings,
    grid: &Grid,
    ptr: &Pointer,
) -> Result<(), EditError> {
    let Some((idx, index, base)) = drag_context(graph, state) else {
        return Ok(());
    };
    let Some(kind) = state.node.drag_ctrl else {
        return Ok(());
    };
    let Some((xf, inv)) = frames(graph, idx) else {
        return Ok(());
    };
    let Some(seg) = base.segment(index) else {
        return Ok(());
    };
    let cp = match kind {
        CtrlKind::Quad1 | CtrlKind::Cube1 => seg.cp1,
        CtrlKind::Cube2 => seg.cp2,
    };
    let Some(cp) = cp else {
        return Ok(());
    };
    state.drag_pos = ptr.pos;

    let origin = xf * cp;
    let mut target = origin + (ptr.pos - state.drag_start);
    if settings.snap_grid {
        target = grid.snap(target, settings.snap_zone);
    }
    let mut data = base;
    data.translate_ctrl(seg.index, kind.which(), transform_vec(inv, target - origin));
    commit_path(graph, idx, data)?;
    state.refresh_node_records(graph);
    Ok(())
}

// ─── Structural edits ────────────────────────────────────────────────────

fn active(graph: &SceneGraph, state: &EditState) -> Result<(NodeIndex, PathData), EditError> {
    let idx = state.active_path(graph).ok_or(EditError::NoActivePath)?;
    let data = path_data(graph, idx).cloned().ok_or(EditError::NoActivePath)?;
    Ok((idx, data))
}

/// Insert a Line, Quad or Cube segment. After the lowest selected node
/// (when it is not the last) the new node splits the following segment at
/// its midpoint; otherwise it is appended `offset` screen pixels to the
/// right of the last node. Returns the new node's index, now selected.
pub fn insert_node(
    graph: &mut SceneGraph,
    state: &mut EditState,
    op: PathOp,
    offset: f64,
) -> Result<Option<usize>, EditError> {
    if !matches!(op, PathOp::LineTo | PathOp::QuadTo | PathOp::CubeTo) {
        return Ok(None);
    }
    let (idx, mut data) = active(graph, state)?;
    let count = data.point_count();
    let Some(last) = count.checked_sub(1) else {
        return Ok(None);
    };

    let (at, cmd, new_index) = match state.node.selected.first() {
        Some(&i) if i < last => {
            let (Some(a), Some(b)) = (data.segment(i), data.segment(i + 1)) else {
                return Ok(None);
            };
            let mid = a.end.midpoint(b.end);
            (b.index, PathCmd::synthesize(op, a.end, mid), i + 1)
        }
        _ => {
            let Some(a) = data.segment(last) else {
                return Ok(None);
            };
            let step = frames(graph, idx).map_or(Vec2::new(offset, 0.0), |(_, inv)| {
                transform_vec(inv, Vec2::new(offset, 0.0))
            });
            let end = data.as_slice().len();
            (end, PathCmd::synthesize(op, a.end, a.end + step), last + 1)
        }
    };
    data.insert_cmd(at, cmd)?;
    commit_path(graph, idx, data)?;
    log::debug!("inserted {:?} node {new_index}", op);
    state.node.selected = BTreeSet::from([new_index]);
    state.refresh_node_records(graph);
    Ok(Some(new_index))
}

/// Change the kind of every selected segment, keeping endpoints. `MoveTo`
/// nodes are left alone. Returns how many segments changed.
pub fn replace_node(graph: &mut SceneGraph, state: &mut EditState, op: PathOp) -> Result<usize, EditError> {
    if !matches!(op, PathOp::LineTo | PathOp::QuadTo | PathOp::CubeTo) {
        return Ok(0);
    }
    let (idx, mut data) = active(graph, state)?;
    let mut changed = 0;
    for &i in state.node.selected.iter().rev() {
        let Some(seg) = data.segment(i) else {
            continue;
        };
        if seg.op() == PathOp::MoveTo || seg.op() == op {
            continue;
        }
        data.replace_cmd(seg.index, PathCmd::synthesize(op, seg.start, seg.end))?;
        changed += 1;
    }
    if changed > 0 {
        commit_path(graph, idx, data)?;
        state.refresh_node_records(graph);
    }
    Ok(changed)
}

/// Remove the selected nodes, highest index first. Removing a `MoveTo`
/// turns the next node into the subpath start. A deletion that would leave
/// fewer than two nodes is refused and the path left as it was.
pub fn delete_nodes(graph: &mut SceneGraph, state: &mut EditState) -> Result<usize, EditError> {
    let (idx, mut data) = active(graph, state)?;
    if state.node.selected.is_empty() {
        return Ok(0);
    }
    let mut removed = 0;
    for &i in state.node.selected.iter().rev() {
        let Some(seg) = data.segment(i) else {
            continue;
        };
        data.remove_cmd(seg.index)?;
        removed += 1;
        if seg.op() != PathOp::MoveTo {
            continue;
        }
        while data.cmd_at(seg.index) == Some(PathCmd::Close) {
            data.remove_cmd(seg.index)?;
        }
        if let Some(next) = data.scan().find(|s| s.index == seg.index) {
            data.replace_cmd(next.index, PathCmd::MoveTo(next.end.x, next.end.y))?;
        }
    }
    if data.point_count() < 2 {
        log::warn!("refusing node delete: path would keep {} node(s)", data.point_count());
        return Ok(0);
    }
    commit_path(graph, idx, data)?;
    state.node.selected.clear();
    state.refresh_node_records(graph);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use pretty_assertions::assert_eq;
    use vd_core::{NodeId, parse_svg, recompute_bboxes};

    fn setup(d: &str) -> (SceneGraph, EditState) {
        let (mut g, _) = parse_svg(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><path id="p" d="{d}"/></svg>"#
        ))
        .unwrap();
        recompute_bboxes(&mut g);
        let mut st = EditState::new();
        st.set_active_path(&g, Some(NodeId::intern("p")));
        (g, st)
    }

    fn d_of(g: &SceneGraph) -> String {
        match &g.get_by_id(NodeId::intern("p")).unwrap().kind {
            NodeKind::Path { data } => data.to_svg_d(),
            _ => unreachable!(),
        }
    }

    fn grid() -> Grid {
        Grid::from_view(Affine::IDENTITY, 10.0)
    }

    #[test]
    fn insert_splits_following_segment() {
        let (mut g, mut st) = setup("M 0 0 L 10 0 L 20 0");
        st.node.selected.insert(0);
        assert_eq!(insert_node(&mut g, &mut st, PathOp::CubeTo, 20.0).unwrap(), Some(1));
        assert_eq!(d_of(&g), "M 0 0 C 1.25 0 3.75 0 5 0 L 10 0 L 20 0");
        assert_eq!(st.node.selected, BTreeSet::from([1]));
        assert_eq!(st.node.records.len(), 4);
    }

    #[test]
    fn insert_appends_after_last() {
        let (mut g, mut st) = setup("M 0 0 L 10 0");
        insert_node(&mut g, &mut st, PathOp::QuadTo, 20.0).unwrap();
        assert_eq!(d_of(&g), "M 0 0 L 10 0 Q 15 0 30 0");
    }

    #[test]
    fn replace_keeps_endpoints() {
        let (mut g, mut st) = setup("M 0 0 L 8 0");
        st.node.selected.extend([0, 1]);
        assert_eq!(replace_node(&mut g, &mut st, PathOp::CubeTo).unwrap(), 1);
        assert_eq!(d_of(&g), "M 0 0 C 2 0 6 0 8 0");
    }

    #[test]
    fn delete_in_reverse_order() {
        let (mut g, mut st) = setup("M 0 0 L 10 0 L 10 10 L 0 10");
        st.node.selected.extend([1, 2]);
        assert_eq!(delete_nodes(&mut g, &mut st).unwrap(), 2);
        assert_eq!(d_of(&g), "M 0 0 L 0 10");
    }

    #[test]
    fn delete_moveto_promotes_next() {
        let (mut g, mut st) = setup("M 0 0 L 10 0 L 20 0");
        st.node.selected.insert(0);
        delete_nodes(&mut g, &mut st).unwrap();
        assert_eq!(d_of(&g), "M 10 0 L 20 0");
    }

    #[test]
    fn delete_refuses_to_leave_one_node() {
        let (mut g, mut st) = setup("M 0 0 L 10 0");
        st.node.selected.insert(1);
        assert_eq!(delete_nodes(&mut g, &mut st).unwrap(), 0);
        assert_eq!(d_of(&g), "M 0 0 L 10 0");
    }

    #[test]
    fn node_move_carries_controls_unless_alt() {
        let (mut g, mut st) = setup("M 0 0 C 2 0 8 0 10 0 C 12 0 18 0 20 0");
        let settings = Settings::without_snapping();
        st.drag_node_start(&g, Point::new(10.0, 0.0), 1);
        node_move(&mut g, &mut st, &settings, &grid(), &Pointer::at(10.0, 5.0)).unwrap();
        assert_eq!(d_of(&g), "M 0 0 C 2 5 8 5 10 5 C 12 5 18 0 20 0");

        let ptr = Pointer::at(10.0, 5.0).with_mods(Modifiers::ALT);
        node_move(&mut g, &mut st, &settings, &grid(), &ptr).unwrap();
        assert_eq!(d_of(&g), "M 0 0 C 2 0 8 0 10 5 C 12 0 18 0 20 0");
    }

    #[test]
    fn ctrl_move_touches_only_the_control() {
        let (mut g, mut st) = setup("M 0 0 C 2 0 8 0 10 0");
        st.drag_ctrl_start(&g, Point::new(8.0, 0.0), 1, CtrlKind::Cube2);
        ctrl_move(&mut g, &mut st, &Settings::without_snapping(), &grid(), &Pointer::at(8.0, -4.0)).unwrap();
        assert_eq!(d_of(&g), "M 0 0 C 2 0 8 -4 10 0");
    }

    #[test]
    fn node_move_snaps_to_other_nodes() {
        let (mut g, mut st) = setup("M 0 0 L 50 0 L 100 3");
        let settings = Settings {
            snap_grid: false,
            snap_guide: false,
            snap_nodes: true,
            snap_zone: 5.0,
            ..Settings::default()
        };
        st.drag_node_start(&g, Point::new(50.0, 0.0), 1);
        node_move(&mut g, &mut st, &settings, &grid(), &Pointer::at(98.0, 40.0)).unwrap();
        assert_eq!(d_of(&g), "M 0 0 L 100 40 L 100 3");
    }
}
