//! Edit state: the per-document record every handler consults.
//!
//! Holds the current tool and action (behind the action mutex), the
//! selection with its drag-start snapshots, the recents window used for
//! click cycling, the drag geometry and the path-node substate.

use crate::error::EditError;
use crate::input::SelectMode;
use crate::snap::AlignPoints;
use crate::tools::ToolKind;
use kurbo::{Point, Rect};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use vd_core::{NodeId, NodeIndex, NodeKind, PathNode, SceneGraph, SceneNode, path_nodes, union_cached};
use vd_render::hit_point;

// ─── Actions ─────────────────────────────────────────────────────────────

/// The undoable transaction currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    None,
    Move,
    Reshape,
    Rotate,
    BoxSelect,
    SetStrokeColor,
    SetFillColor,
    /// Width, dash, marker and text property changes.
    SetStyle,
    NewElement,
    NewText,
    NewPath,
    NodeMove,
    /// Insert, replace or delete path nodes.
    NodeEdit,
    Align,
    /// Structural edits: delete, duplicate, group, z-order, layers.
    Edit,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::None => "None",
            Action::Move => "Move",
            Action::Reshape => "Reshape",
            Action::Rotate => "Rotate",
            Action::BoxSelect => "BoxSelect",
            Action::SetStrokeColor => "SetStrokeColor",
            Action::SetFillColor => "SetFillColor",
            Action::SetStyle => "SetStyle",
            Action::NewElement => "NewElement",
            Action::NewText => "NewText",
            Action::NewPath => "NewPath",
            Action::NodeMove => "NodeMove",
            Action::NodeEdit => "NodeEdit",
            Action::Align => "Align",
            Action::Edit => "Edit",
        }
    }

    /// Whether the action changes the document and so saves undo state.
    pub fn is_undoable(self) -> bool {
        !matches!(self, Action::None | Action::BoxSelect)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
struct ActionSlot {
    action: Action,
    data: String,
    locked: bool,
    acquired: usize,
    released: usize,
}

/// Serializes action start/end. `start` takes the lock and claims the
/// action; `unlock` releases the lock once start-of-action side effects
/// are done; `done` clears the action.
#[derive(Debug, Default)]
pub struct ActionMutex {
    slot: Mutex<ActionSlot>,
}

impl ActionMutex {
    fn slot(&self) -> MutexGuard<'_, ActionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self, action: Action, data: &str) -> Result<(), EditError> {
        let mut slot = self.slot();
        if slot.locked || slot.action != Action::None {
            log::debug!("rejecting {action}: {} in progress", slot.action);
            return Err(EditError::ActionBusy(slot.action));
        }
        slot.action = action;
        slot.data = data.to_string();
        slot.locked = true;
        slot.acquired += 1;
        log::debug!("action start {action} {data:?}");
        Ok(())
    }

    pub fn unlock(&self) {
        let mut slot = self.slot();
        if slot.locked {
            slot.locked = false;
            slot.released += 1;
        }
    }

    /// Clear the current action (releasing the lock if still held) and
    /// return it.
    pub fn done(&self) -> Action {
        let mut slot = self.slot();
        if slot.locked {
            slot.locked = false;
            slot.released += 1;
        }
        let prev = std::mem::take(&mut slot.action);
        slot.data.clear();
        if prev != Action::None {
            log::debug!("action done {prev}");
        }
        prev
    }

    pub fn current(&self) -> Action {
        self.slot().action
    }

    pub fn data(&self) -> String {
        self.slot().data.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.slot().locked
    }

    /// Times the lock was acquired and released.
    pub fn counts(&self) -> (usize, usize) {
        let slot = self.slot();
        (slot.acquired, slot.released)
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

/// Per-node selection record.
#[derive(Debug, Clone)]
pub struct Selected {
    /// Append index; later selections have larger values.
    pub order: usize,
    /// Deep copy of the node taken when selected or at drag start.
    pub snapshot: SceneNode,
}

/// Sort order for `selected_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelOrder {
    Ascending,
    Descending,
    /// Deepest nodes first, then by selection order.
    Depth,
}

// ─── Path-node substate ──────────────────────────────────────────────────

/// Which control point of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtrlKind {
    Quad1,
    Cube1,
    Cube2,
}

impl CtrlKind {
    /// Control slot number in the command (1 or 2).
    pub fn which(self) -> usize {
        match self {
            CtrlKind::Quad1 | CtrlKind::Cube1 => 1,
            CtrlKind::Cube2 => 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeEditState {
    /// The path being edited.
    pub path: Option<NodeId>,
    /// Display list, one record per endpoint.
    pub records: Vec<PathNode>,
    /// Selected logical point indices.
    pub selected: BTreeSet<usize>,
    /// Node under the pointer while dragging.
    pub drag_index: Option<usize>,
    /// Set when the drag moves a control point instead of the node.
    pub drag_ctrl: Option<CtrlKind>,
    /// The path as it was at drag start.
    pub snapshot: Option<SceneNode>,
}

// ─── Edit state ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EditState {
    pub tool: ToolKind,
    pub mutex: ActionMutex,
    /// Layer new elements go into.
    pub current_layer: Option<NodeId>,
    /// Gradient definitions available for paint.
    pub gradients: Vec<NodeId>,
    selected: HashMap<NodeId, Selected>,
    next_order: usize,
    recents: HashSet<NodeId>,
    recents_anchor: Option<Point>,
    pub drag_start: Point,
    pub drag_pos: Point,
    /// Selection bbox at drag start, as dragged, and after snapping.
    pub bbox_start: Rect,
    pub bbox_cur: Rect,
    pub bbox_eff: Rect,
    pub align_pts: AlignPoints,
    pub node: NodeEditState,
    pub changed: bool,
}

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to a fresh state, as on document close. The action counters
    /// survive so lock accounting stays balanced.
    pub fn reset(&mut self) {
        self.mutex.done();
        self.tool = ToolKind::Select;
        self.current_layer = None;
        self.gradients.clear();
        self.selected.clear();
        self.next_order = 0;
        self.recents.clear();
        self.recents_anchor = None;
        self.drag_reset();
        self.node = NodeEditState::default();
        self.changed = false;
    }

    // ─── Action boundaries ───────────────────────────────────────────────

    pub fn act_start(&self, action: Action, data: &str) -> Result<(), EditError> {
        self.mutex.start(action, data)
    }

    pub fn act_unlock(&self) {
        self.mutex.unlock();
    }

    pub fn act_done(&mut self) -> Action {
        self.align_pts.clear();
        self.mutex.done()
    }

    pub fn in_action(&self) -> Action {
        self.mutex.current()
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn has_selected(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.contains_key(&id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn selected_ids(&self) -> HashSet<NodeId> {
        self.selected.keys().copied().collect()
    }

    pub fn selected_record(&self, id: NodeId) -> Option<&Selected> {
        self.selected.get(&id)
    }

    /// Drag-start snapshot of every selected node.
    pub fn snapshots(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.selected.iter().map(|(id, sel)| (*id, &sel.snapshot))
    }

    /// Add `id`, dropping any selected ancestor or descendant of it.
    /// The root, layers and definitions are never selectable.
    pub fn add_selected(&mut self, graph: &SceneGraph, id: NodeId) {
        let Some(idx) = graph.index_of(id) else {
            return;
        };
        if !is_selectable(graph, idx) {
            log::trace!("{id:?} is not selectable");
            return;
        }
        if self.selected.contains_key(&id) {
            return;
        }
        self.selected.retain(|other, _| {
            graph
                .index_of(*other)
                .is_some_and(|o| !graph.is_ancestor_of(o, idx) && !graph.is_ancestor_of(idx, o))
        });
        self.selected.insert(
            id,
            Selected {
                order: self.next_order,
                snapshot: graph.graph[idx].clone(),
            },
        );
        self.next_order += 1;
    }

    pub fn remove_selected(&mut self, id: NodeId) -> bool {
        self.selected.remove(&id).is_some()
    }

    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    /// Drop selected ids that no longer exist and any node whose ancestor
    /// is also selected.
    pub fn sanitize_selected(&mut self, graph: &SceneGraph) {
        let present: Vec<(NodeId, NodeIndex)> = self
            .selected
            .keys()
            .filter_map(|&id| graph.index_of(id).map(|i| (id, i)))
            .collect();
        let keep: HashSet<NodeId> = present
            .iter()
            .filter(|(_, idx)| {
                !present
                    .iter()
                    .any(|(_, other)| graph.is_ancestor_of(*other, *idx))
            })
            .map(|(id, _)| *id)
            .collect();
        self.selected.retain(|id, _| keep.contains(id));
        self.recents.retain(|id| graph.index_of(*id).is_some());
    }

    /// Apply a click on `id` with the given mode. Returns whether the
    /// selection changed.
    pub fn select_action(
        &mut self,
        graph: &SceneGraph,
        id: NodeId,
        mode: SelectMode,
        pos: Point,
        snap_tol: f64,
    ) -> bool {
        if !mode.is_quiet() {
            self.touch_recents(pos, snap_tol);
        }
        match mode {
            SelectMode::SelectOne | SelectMode::SelectQuiet => {
                if self.selected.len() == 1 && self.selected.contains_key(&id) {
                    return false;
                }
                self.selected.retain(|k, _| *k == id);
                self.add_selected(graph, id);
                true
            }
            SelectMode::ExtendContinuous | SelectMode::ExtendOne => {
                if !self.remove_selected(id) {
                    self.add_selected(graph, id);
                }
                true
            }
            SelectMode::Unselect | SelectMode::UnselectQuiet => self.remove_selected(id),
        }
    }

    /// Start a new recents window unless `pos` is within `tol` of the
    /// previous click. Returns true when the window continues.
    fn touch_recents(&mut self, pos: Point, tol: f64) -> bool {
        let same = self
            .recents_anchor
            .is_some_and(|a| (a.x - pos.x).abs() <= tol && (a.y - pos.y).abs() <= tol);
        if !same {
            self.recents.clear();
        }
        self.recents_anchor = Some(pos);
        same
    }

    pub fn recents(&self) -> &HashSet<NodeId> {
        &self.recents
    }

    /// Secondary selection for a click that did not move: the current
    /// selection joins the recents and the next node under `pos` that is
    /// in neither gets selected. When every candidate has been visited the
    /// window starts over.
    pub fn cycle_select(&mut self, graph: &SceneGraph, pos: Point, snap_tol: f64) -> Option<NodeId> {
        self.touch_recents(pos, snap_tol);
        let current = self.selected_ids();
        self.recents.extend(current.iter().copied());
        let hit = match hit_point(graph, pos, &self.recents) {
            Some(hit) => Some(hit),
            None => {
                self.recents.clear();
                hit_point(graph, pos, &current).or_else(|| hit_point(graph, pos, &HashSet::new()))
            }
        }?;
        self.select_action(graph, hit, SelectMode::SelectQuiet, pos, snap_tol);
        Some(hit)
    }

    pub fn selected_list(&self, graph: &SceneGraph, order: SelOrder) -> Vec<NodeId> {
        let mut list: Vec<(&NodeId, &Selected)> = self.selected.iter().collect();
        match order {
            SelOrder::Ascending => list.sort_by_key(|(_, s)| s.order),
            SelOrder::Descending => list.sort_by_key(|(_, s)| std::cmp::Reverse(s.order)),
            SelOrder::Depth => list.sort_by_key(|(id, s)| {
                let depth = graph.index_of(**id).map_or(0, |i| graph.depth(i));
                (std::cmp::Reverse(depth), s.order)
            }),
        }
        list.into_iter().map(|(id, _)| *id).collect()
    }

    /// Selected node indices in selection order, skipping stale ids.
    pub fn selected_indices(&self, graph: &SceneGraph) -> Vec<NodeIndex> {
        self.selected_list(graph, SelOrder::Ascending)
            .into_iter()
            .filter_map(|id| graph.index_of(id))
            .collect()
    }

    /// First selected node that is not a group. With `recurse`, a selected
    /// group yields its first non-group descendant.
    pub fn first_selected_non_group(&self, graph: &SceneGraph, recurse: bool) -> Option<NodeId> {
        self.selected_indices(graph).into_iter().find_map(|idx| {
            if !graph.graph[idx].is_group() {
                return Some(graph.graph[idx].id);
            }
            if !recurse {
                return None;
            }
            let mut found = None;
            graph.walk(idx, |_, node| {
                if node.is_group() {
                    return vd_core::WalkControl::Continue;
                }
                found = Some(node.id);
                vd_core::WalkControl::Break
            });
            found
        })
    }

    /// Labels (or ids) of the selection, in selection order.
    pub fn selected_names(&self, graph: &SceneGraph) -> Vec<String> {
        self.selected_indices(graph)
            .into_iter()
            .map(|idx| {
                let node = &graph.graph[idx];
                if node.name.is_empty() {
                    node.id.to_string()
                } else {
                    node.name.clone()
                }
            })
            .collect()
    }

    /// Union of the cached bboxes of the selection.
    pub fn selection_bbox(&self, graph: &SceneGraph) -> Option<Rect> {
        union_cached(graph, self.selected_indices(graph))
    }

    // ─── Drag lifecycle ──────────────────────────────────────────────────

    /// Record the selection bbox and snapshot every selected node.
    pub fn drag_sel_start(&mut self, graph: &SceneGraph, pos: Point) {
        self.drag_start = pos;
        self.drag_pos = pos;
        let bbox = self.selection_bbox(graph).unwrap_or(Rect::from_origin_size(pos, (0.0, 0.0)));
        self.bbox_start = bbox;
        self.bbox_cur = bbox;
        self.bbox_eff = bbox;
        for (id, sel) in &mut self.selected {
            if let Some(idx) = graph.index_of(*id) {
                sel.snapshot = graph.graph[idx].clone();
            }
        }
    }

    pub fn drag_reset(&mut self) {
        self.drag_start = Point::ZERO;
        self.drag_pos = Point::ZERO;
        self.bbox_start = Rect::ZERO;
        self.bbox_cur = Rect::ZERO;
        self.bbox_eff = Rect::ZERO;
        self.align_pts.clear();
        self.node.drag_index = None;
        self.node.drag_ctrl = None;
        self.node.snapshot = None;
    }

    /// Start dragging path node `index`.
    pub fn drag_node_start(&mut self, graph: &SceneGraph, pos: Point, index: usize) {
        self.drag_start = pos;
        self.drag_pos = pos;
        self.node.drag_index = Some(index);
        self.node.drag_ctrl = None;
        self.node.snapshot = self.active_path(graph).map(|idx| graph.graph[idx].clone());
    }

    /// Start dragging control `kind` of the segment ending at node `index`.
    pub fn drag_ctrl_start(&mut self, graph: &SceneGraph, pos: Point, index: usize, kind: CtrlKind) {
        self.drag_node_start(graph, pos, index);
        self.node.drag_ctrl = Some(kind);
    }

    // ─── Node editing ────────────────────────────────────────────────────

    /// Index of the active path, if it still exists and is a path.
    pub fn active_path(&self, graph: &SceneGraph) -> Option<NodeIndex> {
        let idx = graph.index_of(self.node.path?)?;
        matches!(graph.graph[idx].kind, NodeKind::Path { .. }).then_some(idx)
    }

    pub fn set_active_path(&mut self, graph: &SceneGraph, path: Option<NodeId>) {
        if self.node.path != path {
            self.node.selected.clear();
        }
        self.node.path = path;
        self.refresh_node_records(graph);
    }

    /// Rebuild the display list from the active path.
    pub fn refresh_node_records(&mut self, graph: &SceneGraph) {
        match self.active_path(graph) {
            Some(idx) => {
                if let NodeKind::Path { data } = &graph.graph[idx].kind {
                    self.node.records = path_nodes(data, graph.world_transform(idx));
                }
                let n = self.node.records.len();
                self.node.selected.retain(|&i| i < n);
            }
            None => {
                self.node.path = None;
                self.node.records.clear();
                self.node.selected.clear();
            }
        }
    }
}

/// Whether interactive selection may hold `idx`: anything but the root,
/// a layer, or a definition (or something inside one).
pub fn is_selectable(graph: &SceneGraph, idx: NodeIndex) -> bool {
    idx != graph.root
        && !graph.graph[idx].is_layer()
        && !graph.graph[idx].kind.is_definition()
        && !graph
            .ancestors(idx)
            .iter()
            .any(|&a| graph.graph[a].kind.is_definition())
}
