//! The editor engine: owns the document and all edit state, and advances
//! the `(tool, action)` state machine one input event at a time.
//!
//! Every event is handled to completion. Afterwards bboxes are recomputed,
//! the selection is sanitized and the sprites are rebuilt from the
//! selection, so handle positions always agree with the scene between
//! events.
//!
//! Document-changing operations run inside an action: the action mutex is
//! taken, the pre-action state is saved on the undo stack, the change is
//! applied and the action is closed. A failure part way restores the saved
//! state and drops its undo record.

use crate::align::{AlignAnchor, AlignKind, align_selected};
use crate::error::EditError;
use crate::export::{self, ExportFormat, ExportOptions};
use crate::input::{InputEvent, Modifiers, Pointer, SelectMode};
use crate::layers;
use crate::manip::{move_drag, reshape_drag, rotate_drag};
use crate::nodes;
use crate::settings::Settings;
use crate::shortcuts::{KeyFunction, Keymap};
use crate::snap::{AlignPoints, Grid};
use crate::sprites::{SpriteKind, SpriteMap, SpriteStore, SpriteSub};
use crate::state::{Action, CtrlKind, EditState, is_selectable};
use crate::style::{self, MarkerColor, MarkerPos, PaintKind};
use crate::tools::{self, PathDraft, ToolKind};
use crate::undo::UndoStack;
use kurbo::{Affine, Point, Rect, Vec2};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::MutexGuard;
use vd_core::model::Color;
use vd_core::{
    Document, LayerInfo, NodeGeom, NodeId, NodeIndex, NodeKind, PathCmd, PathOp, SceneGraph, SceneNode, Subtree,
    WalkControl, distribute_all, recompute_bboxes, ungroup, ungroup_singletons,
};
use vd_render::{Painter, hit_point, hit_rect, paint_scene};

const ZOOM_STEP: f64 = 1.25;
const MIN_ZOOM: f64 = 0.01;
const MAX_ZOOM: f64 = 256.0;

/// Content of a text node placed with the Text tool.
const DEFAULT_TEXT: &str = "Text";

/// What observers are told after an event or operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The document changed.
    Changed,
    SelectionChanged,
    /// An action closed; carries its label.
    ActionDone(String),
}

pub type Observer = Box<dyn FnMut(&Notice)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    Raise,
    Lower,
    RaiseToTop,
    LowerToBottom,
}

// ─── Gesture tracking ────────────────────────────────────────────────────

/// What a release without slide does after a press inside the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Click {
    Nothing,
    /// Select the next node under the pointer.
    Cycle,
    Toggle(NodeId),
}

/// How the current press will be interpreted once it slides or releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Idle,
    /// On a reshape handle: reshape, or rotate with Alt.
    Handle(SpriteSub),
    Move(Click),
    RubberBand { extend: bool },
    Node(usize),
    Ctrl(usize, CtrlKind),
    Create(ToolKind),
    Bezier,
    Text,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    pos: Point,
    mods: Modifiers,
    gesture: Gesture,
    sliding: bool,
    /// Element created by this press and sized while sliding.
    created: Option<NodeId>,
}

fn inverse_or_identity(xf: Affine) -> Affine {
    if xf.determinant().abs() > 1e-12 {
        xf.inverse()
    } else {
        log::warn!("degenerate frame {xf:?}, using identity");
        Affine::IDENTITY
    }
}

fn is_path(graph: &SceneGraph, id: NodeId) -> bool {
    matches!(graph.get_by_id(id).map(|n| &n.kind), Some(NodeKind::Path { .. }))
}

/// Give every node of a detached copy a fresh id.
fn refresh_ids(graph: &mut SceneGraph, tree: &mut Subtree) {
    tree.node.id = graph.assign_unique_id(tree.node.kind.id_prefix());
    for child in &mut tree.children {
        refresh_ids(graph, child);
    }
}

// ─── Editor ──────────────────────────────────────────────────────────────

pub struct Editor {
    doc: Document,
    state: EditState,
    settings: Settings,
    sprites: SpriteStore,
    undo: UndoStack,
    pub keymap: Keymap,
    observers: Vec<Observer>,
    status: String,
    press: Option<Press>,
    draft: Option<PathDraft>,
    last_selection: HashSet<NodeId>,
}

impl Editor {
    pub fn new(doc: Document, settings: Settings) -> Self {
        let mut editor = Self {
            doc,
            state: EditState::new(),
            undo: UndoStack::new(settings.undo_depth),
            settings,
            sprites: SpriteStore::new(),
            keymap: Keymap::default(),
            observers: Vec::new(),
            status: String::new(),
            press: None,
            draft: None,
            last_selection: HashSet::new(),
        };
        layers::restore_current_layer(&mut editor.doc, &mut editor.state);
        editor.doc.sync_view();
        editor.after_change();
        editor
    }

    pub fn open(path: &Path, settings: Settings) -> Result<Self, EditError> {
        Ok(Self::new(Document::load(path)?, settings))
    }

    /// Replace the document with parsed SVG text. On failure the current
    /// document stays.
    pub fn load_svg(&mut self, text: &str) -> Result<(), EditError> {
        let doc = match Document::from_svg(text) {
            Ok(doc) => doc,
            Err(e) => return self.quiet(Err(e.into())),
        };
        self.abort();
        self.doc = doc;
        self.state.reset();
        self.undo.clear();
        layers::restore_current_layer(&mut self.doc, &mut self.state);
        self.after_change();
        self.notify(Notice::Changed);
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), EditError> {
        let result = self.doc.save(path).map_err(EditError::from);
        if result.is_ok() {
            self.state.changed = false;
            self.status = format!("saved {}", path.display());
        }
        self.quiet(result)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Last human-readable message: errors, undo labels, rotate angles.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_modified(&self) -> bool {
        self.state.changed
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn sprites(&self) -> MutexGuard<'_, SpriteMap> {
        self.sprites.lock()
    }

    /// Screen grid for the current view.
    pub fn grid(&self) -> Grid {
        let spacing = self.doc.grid_spacing().unwrap_or(self.settings.grid_spacing);
        Grid::from_view(self.doc.graph.view, spacing)
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&Notice) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Paint the scene, then the overlay on top.
    pub fn paint(&self, painter: &mut dyn Painter) {
        paint_scene(painter, &self.doc.graph);
        self.sprites.draw(painter);
    }

    fn notify(&mut self, notice: Notice) {
        log::trace!("notice {notice:?}");
        for observer in &mut self.observers {
            observer(&notice);
        }
    }

    /// Record a failure on the status line. Quiet conditions become a
    /// no-op result.
    fn quiet<T: Default>(&mut self, result: Result<T, EditError>) -> Result<T, EditError> {
        match result {
            Err(e) if e.is_quiet() => {
                self.status = e.to_string();
                Ok(T::default())
            }
            Err(e) => {
                self.status = e.to_string();
                Err(e)
            }
            ok => ok,
        }
    }

    // ─── Event dispatch ──────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: &InputEvent) -> Result<(), EditError> {
        log::trace!("event {event:?}");
        let result = match event {
            InputEvent::MouseDown(ptr) => self.mouse_down(ptr),
            InputEvent::SlideStart(_) | InputEvent::MouseEnter(_) => Ok(()),
            InputEvent::SlideMove(ptr) => self.slide_move(ptr),
            InputEvent::SlideStop(ptr) | InputEvent::MouseUp(ptr) => self.release(ptr),
            InputEvent::Scroll { pointer, delta } => {
                self.scroll(pointer, *delta);
                Ok(())
            }
            InputEvent::MouseLeave(_) => {
                self.sprites.lock().set_line_add(None);
                Ok(())
            }
            InputEvent::DoubleClick(_) => self.finish_path(),
            InputEvent::KeyChord(chord) => self.key_chord(chord),
        };
        self.after_change();
        self.quiet(result)
    }

    /// Post-event bookkeeping.
    fn after_change(&mut self) {
        recompute_bboxes(&mut self.doc.graph);
        self.state.sanitize_selected(&self.doc.graph);
        self.state.refresh_node_records(&self.doc.graph);
        self.refresh_sprites();
        let selection = self.state.selected_ids();
        if selection != self.last_selection {
            self.last_selection = selection;
            self.notify(Notice::SelectionChanged);
        }
    }

    fn refresh_sprites(&mut self) {
        let bbox = match self.state.tool {
            ToolKind::Select => self.state.selection_bbox(&self.doc.graph),
            _ => None,
        };
        let mut sprites = self.sprites.lock();
        sprites.set_reshape_box(bbox);
        if self.state.tool == ToolKind::Node {
            sprites.set_node_handles(&self.state.node.records, &self.state.node.selected);
        } else {
            sprites.remove_kind(SpriteKind::NodePoint);
            sprites.remove_kind(SpriteKind::NodeCtrl);
        }
    }

    fn mouse_down(&mut self, ptr: &Pointer) -> Result<(), EditError> {
        if let Some(stale) = self.press.take()
            && stale.sliding
        {
            self.slide_done(stale, ptr)?;
        }
        let gesture = match self.state.tool {
            ToolKind::Select => self.select_press(ptr),
            ToolKind::Node => self.node_press(ptr),
            tool @ (ToolKind::Rect | ToolKind::Ellipse) => Gesture::Create(tool),
            ToolKind::Bezier => Gesture::Bezier,
            ToolKind::Text => Gesture::Text,
        };
        log::trace!("press at {:?}: {gesture:?}", ptr.pos);
        self.press = Some(Press {
            pos: ptr.pos,
            mods: ptr.mods,
            gesture,
            sliding: false,
            created: None,
        });
        Ok(())
    }

    fn select_press(&mut self, ptr: &Pointer) -> Gesture {
        let handle = self.sprites.lock().hit(ptr.pos);
        if let Some(key) = handle
            && key.kind == SpriteKind::ReshapeBox
        {
            return Gesture::Handle(key.sub);
        }

        let graph = &self.doc.graph;
        let mode = ptr.select_mode();
        let hit = hit_point(graph, ptr.pos, &HashSet::new());
        let inside = self
            .state
            .selection_bbox(graph)
            .is_some_and(|b| b.contains(ptr.pos));
        if inside {
            return Gesture::Move(match (mode.is_extend(), hit) {
                (true, Some(id)) => Click::Toggle(id),
                (true, None) => Click::Nothing,
                (false, _) => Click::Cycle,
            });
        }
        match hit {
            Some(id) => {
                self.state
                    .select_action(graph, id, mode, ptr.pos, self.settings.snap_tol);
                if self.state.is_selected(id) {
                    Gesture::Move(Click::Nothing)
                } else {
                    Gesture::Idle
                }
            }
            None => {
                if !mode.is_extend() {
                    self.state.clear_selected();
                }
                Gesture::RubberBand {
                    extend: mode.is_extend(),
                }
            }
        }
    }

    fn node_press(&mut self, ptr: &Pointer) -> Gesture {
        let handle = self.sprites.lock().hit(ptr.pos);
        if let Some(key) = handle {
            match key.kind {
                SpriteKind::NodePoint => {
                    let i = key.index;
                    let selected = &mut self.state.node.selected;
                    if ptr.mods.shift || ptr.mods.ctrl {
                        if !selected.remove(&i) {
                            selected.insert(i);
                        }
                    } else if !selected.contains(&i) {
                        *selected = BTreeSet::from([i]);
                    }
                    return Gesture::Node(i);
                }
                SpriteKind::NodeCtrl => {
                    if let Some(kind) = key.sub.ctrl_kind() {
                        return Gesture::Ctrl(key.index, kind);
                    }
                }
                _ => {}
            }
        }

        let graph = &self.doc.graph;
        let path = hit_point(graph, ptr.pos, &HashSet::new()).filter(|&id| is_path(graph, id));
        match path {
            Some(id) => {
                self.state
                    .select_action(graph, id, SelectMode::SelectOne, ptr.pos, self.settings.snap_tol);
                self.state.set_active_path(graph, Some(id));
            }
            None => self.state.node.selected.clear(),
        }
        Gesture::Idle
    }

    fn slide_move(&mut self, ptr: &Pointer) -> Result<(), EditError> {
        let Some(press) = self.press.as_mut() else {
            return Ok(());
        };
        let first = !press.sliding;
        press.sliding = true;
        let (start, gesture) = (press.pos, press.gesture);
        if first && let Err(e) = self.begin_gesture(gesture, start, ptr) {
            self.press = None;
            return Err(e);
        }
        self.gesture_frame(gesture, start, ptr)
    }

    /// Start the action a sliding press stands for.
    fn begin_gesture(&mut self, gesture: Gesture, start: Point, ptr: &Pointer) -> Result<(), EditError> {
        match gesture {
            Gesture::Move(_) => self.manip_start(Action::Move, start),
            Gesture::Handle(_) if ptr.mods.alt => self.manip_start(Action::Rotate, start),
            Gesture::Handle(_) => self.manip_start(Action::Reshape, start),
            Gesture::RubberBand { .. } => {
                self.state.act_start(Action::BoxSelect, "")?;
                self.state.act_unlock();
                Ok(())
            }
            Gesture::Node(index) => self.node_drag_start(start, index, None),
            Gesture::Ctrl(index, kind) => self.node_drag_start(start, index, Some(kind)),
            Gesture::Create(tool) => self.create_start(tool, start),
            Gesture::Idle | Gesture::Bezier | Gesture::Text => Ok(()),
        }
    }

    fn gesture_frame(&mut self, gesture: Gesture, start: Point, ptr: &Pointer) -> Result<(), EditError> {
        let grid = self.grid();
        match gesture {
            Gesture::Move(_) => {
                let matches = move_drag(&mut self.doc.graph, &mut self.state, &self.settings, &grid, ptr);
                self.sprites.lock().set_matches(&matches);
            }
            Gesture::Handle(sub) if self.state.in_action() == Action::Rotate => {
                let deg = rotate_drag(&mut self.doc.graph, &mut self.state, ptr, sub);
                self.status = format!("Rotate {deg}°");
            }
            Gesture::Handle(sub) => {
                let matches = reshape_drag(&mut self.doc.graph, &mut self.state, &self.settings, &grid, ptr, sub);
                self.sprites.lock().set_matches(&matches);
            }
            Gesture::RubberBand { .. } => {
                self.sprites
                    .lock()
                    .set_rubber_band(Some(Rect::from_points(start, ptr.pos)));
            }
            Gesture::Node(_) => {
                let moved = nodes::node_move(&mut self.doc.graph, &mut self.state, &self.settings, &grid, ptr);
                moved.map_err(|e| self.fail_action(e))?;
            }
            Gesture::Ctrl(..) => {
                let moved = nodes::ctrl_move(&mut self.doc.graph, &mut self.state, &self.settings, &grid, ptr);
                moved.map_err(|e| self.fail_action(e))?;
            }
            Gesture::Create(_) => {
                if let Some(id) = self.press.and_then(|p| p.created) {
                    self.resize_created(id, tools::drag_rect(start, ptr.pos, ptr.mods.ctrl));
                }
            }
            Gesture::Bezier => {
                let from = self.draft.map(|d| d.last);
                self.sprites.lock().set_line_add(from.map(|f| (f, ptr.pos)));
            }
            Gesture::Idle | Gesture::Text => {}
        }
        Ok(())
    }

    fn release(&mut self, ptr: &Pointer) -> Result<(), EditError> {
        let Some(press) = self.press.take() else {
            return Ok(());
        };
        if press.sliding {
            self.slide_done(press, ptr)
        } else {
            self.click(press, ptr)
        }
    }

    fn slide_done(&mut self, press: Press, ptr: &Pointer) -> Result<(), EditError> {
        match press.gesture {
            Gesture::RubberBand { extend } => {
                let r = Rect::from_points(press.pos, ptr.pos);
                let graph = &self.doc.graph;
                if !extend {
                    self.state.clear_selected();
                }
                for id in hit_rect(graph, r) {
                    self.state.add_selected(graph, id);
                }
                self.finish_action();
            }
            Gesture::Create(_) => {
                if let Some(id) = press.created {
                    self.select(&[id]);
                }
                self.finish_action();
            }
            Gesture::Bezier => self.bezier_add(ptr.pos)?,
            Gesture::Idle | Gesture::Text => {}
            Gesture::Move(_) | Gesture::Handle(_) | Gesture::Node(_) | Gesture::Ctrl(..) => self.finish_action(),
        }
        Ok(())
    }

    /// A release that never slid.
    fn click(&mut self, press: Press, ptr: &Pointer) -> Result<(), EditError> {
        let tol = self.settings.snap_tol;
        match press.gesture {
            Gesture::Move(Click::Cycle) => {
                if let Some(id) = self.state.cycle_select(&self.doc.graph, press.pos, tol) {
                    log::debug!("cycled selection to {id:?}");
                }
            }
            Gesture::Move(Click::Toggle(id)) => {
                self.state
                    .select_action(&self.doc.graph, id, press.mods.select_mode(), press.pos, tol);
            }
            Gesture::Create(tool) => {
                let side = self.settings.new_shape_size * self.doc.view.zoom;
                let r = Rect::from_origin_size(press.pos, (side, side));
                let created = self.run_action(Action::NewElement, "", |ed| Ok(ed.insert_shape(tool, r)))?;
                if let Some(id) = created {
                    self.select(&[id]);
                }
            }
            Gesture::Text => {
                let id = self.run_action(Action::NewText, DEFAULT_TEXT, |ed| {
                    let parent = layers::insertion_parent(&ed.doc, &ed.state);
                    let graph = &mut ed.doc.graph;
                    let at = inverse_or_identity(graph.world_transform(parent)) * press.pos;
                    let id = graph.assign_unique_id("text");
                    graph.insert(parent, tools::new_text(id, at, DEFAULT_TEXT), None);
                    Ok(id)
                })?;
                self.select(&[id]);
            }
            Gesture::Bezier => self.bezier_add(ptr.pos)?,
            Gesture::Move(Click::Nothing)
            | Gesture::Idle
            | Gesture::Handle(_)
            | Gesture::RubberBand { .. }
            | Gesture::Node(_)
            | Gesture::Ctrl(..) => {}
        }
        Ok(())
    }

    fn scroll(&mut self, ptr: &Pointer, delta: Vec2) {
        if self.state.in_action() != Action::None {
            return;
        }
        let anchor = inverse_or_identity(self.doc.graph.view) * ptr.pos;
        let view = &mut self.doc.view;
        let zoom = view.zoom.max(MIN_ZOOM);
        if ptr.mods.ctrl {
            let factor = if delta.y < 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
            view.zoom = (zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            // Keep the document point under the pointer fixed.
            view.cx = anchor.x - ptr.pos.x / view.zoom;
            view.cy = anchor.y - ptr.pos.y / view.zoom;
        } else {
            view.cx += delta.x / zoom;
            view.cy += delta.y / zoom;
        }
        log::trace!("view at ({}, {}) zoom {}", view.cx, view.cy, view.zoom);
        self.doc.sync_view();
    }

    fn key_chord(&mut self, chord: &str) -> Result<(), EditError> {
        let Some(function) = self.keymap.resolve(chord) else {
            log::trace!("unbound chord {chord:?}");
            return Ok(());
        };
        log::debug!("key {chord} -> {function:?}");
        match function {
            KeyFunction::Abort => self.abort(),
            KeyFunction::Undo => return self.undo().map(drop),
            KeyFunction::Redo => return self.redo().map(drop),
            KeyFunction::Delete if self.state.tool == ToolKind::Node => return self.delete_nodes().map(drop),
            KeyFunction::Delete => return self.delete_selection().map(drop),
            KeyFunction::SelectAll => self.select_all(),
            KeyFunction::Duplicate => return self.duplicate_selection().map(drop),
            KeyFunction::Group => return self.group_selection().map(drop),
            KeyFunction::Ungroup => return self.ungroup_selection().map(drop),
            KeyFunction::ToolSelect => self.set_tool(ToolKind::Select),
            KeyFunction::ToolNode => self.set_tool(ToolKind::Node),
            KeyFunction::ToolRect => self.set_tool(ToolKind::Rect),
            KeyFunction::ToolEllipse => self.set_tool(ToolKind::Ellipse),
            KeyFunction::ToolBezier => self.set_tool(ToolKind::Bezier),
            KeyFunction::ToolText => self.set_tool(ToolKind::Text),
            KeyFunction::Raise => return self.z_order(ZOrder::Raise).map(drop),
            KeyFunction::Lower => return self.z_order(ZOrder::Lower).map(drop),
            KeyFunction::RaiseToTop => return self.z_order(ZOrder::RaiseToTop).map(drop),
            KeyFunction::LowerToBottom => return self.z_order(ZOrder::LowerToBottom).map(drop),
        }
        Ok(())
    }

    // ─── Action boundaries ───────────────────────────────────────────────

    /// Take the action mutex and save the pre-action state. The mutex stays
    /// locked until the caller's start-of-action work is done.
    fn begin_action(&mut self, action: Action, data: &str) -> Result<(), EditError> {
        self.state.act_start(action, data)?;
        if action.is_undoable() {
            self.undo.save(action.label(), data, self.doc.lines());
        }
        Ok(())
    }

    /// Close the current action. An undoable action that left the document
    /// as it was drops its undo record.
    fn finish_action(&mut self) {
        let action = self.state.act_done();
        self.state.drag_reset();
        let sprites = self.sprites.nolock();
        sprites.set_matches(&[]);
        sprites.set_rubber_band(None);
        if action == Action::None {
            return;
        }
        if action.is_undoable() {
            let unchanged = self
                .undo
                .last_state()
                .is_some_and(|saved| saved == self.doc.lines().as_slice());
            if unchanged {
                log::debug!("{action} left the document unchanged");
                self.undo.discard_last();
            } else {
                self.state.changed = true;
                self.notify(Notice::Changed);
            }
        }
        self.notify(Notice::ActionDone(action.label().to_string()));
    }

    /// Abandon the current action after an error: put the pre-action state
    /// back and release the mutex.
    fn fail_action(&mut self, err: EditError) -> EditError {
        let action = self.state.in_action();
        log::warn!("{action} abandoned: {err}");
        if action.is_undoable() {
            self.rollback();
        }
        self.state.act_done();
        self.state.drag_reset();
        self.press = None;
        err
    }

    fn rollback(&mut self) {
        let Some(lines) = self.undo.last_state().map(<[String]>::to_vec) else {
            return;
        };
        if let Err(e) = self.doc.restore_lines(&lines) {
            log::warn!("could not restore pre-action state: {e}");
        }
        self.undo.discard_last();
        self.state.refresh_node_records(&self.doc.graph);
    }

    /// Run a one-shot action around `f`.
    fn run_action<T>(
        &mut self,
        action: Action,
        data: &str,
        f: impl FnOnce(&mut Self) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        self.begin_action(action, data)?;
        self.state.act_unlock();
        let result = match f(self) {
            Ok(value) => {
                self.finish_action();
                Ok(value)
            }
            Err(e) => Err(self.fail_action(e)),
        };
        self.after_change();
        result
    }

    /// Run `f` over the selection as one action.
    fn with_selection<T>(
        &mut self,
        action: Action,
        f: impl FnOnce(&mut Self, &[NodeIndex]) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        if !self.state.has_selected() {
            return Err(EditError::NoSelection);
        }
        let data = self.state.selected_names(&self.doc.graph).join(",");
        self.run_action(action, &data, |ed| {
            let graph = &ed.doc.graph;
            let selected: Vec<NodeIndex> = ed
                .state
                .selected_indices(graph)
                .into_iter()
                .filter(|&idx| is_selectable(graph, idx))
                .collect();
            f(ed, &selected)
        })
    }

    fn ensure_idle(&self) -> Result<(), EditError> {
        match self.state.in_action() {
            Action::None => Ok(()),
            busy => Err(EditError::ActionBusy(busy)),
        }
    }

    /// Start a move, reshape or rotate drag: one undo save and a snapshot
    /// of every selected node.
    fn manip_start(&mut self, action: Action, pos: Point) -> Result<(), EditError> {
        if !self.state.has_selected() {
            return Err(EditError::NoSelection);
        }
        let data = self.state.selected_names(&self.doc.graph).join(",");
        self.begin_action(action, &data)?;
        self.state.drag_sel_start(&self.doc.graph, pos);
        self.state.align_pts = AlignPoints::gather(&self.doc.graph, &self.state.selected_ids());
        self.state.act_unlock();
        Ok(())
    }

    fn node_drag_start(&mut self, start: Point, index: usize, ctrl: Option<CtrlKind>) -> Result<(), EditError> {
        let path = self.state.node.path.ok_or(EditError::NoActivePath)?;
        self.begin_action(Action::NodeMove, path.as_str())?;
        match ctrl {
            Some(kind) => self.state.drag_ctrl_start(&self.doc.graph, start, index, kind),
            None => self.state.drag_node_start(&self.doc.graph, start, index),
        }
        self.state.act_unlock();
        Ok(())
    }

    // ─── Creation ────────────────────────────────────────────────────────

    /// Insert a Rect or Ellipse covering the screen rectangle `r` into the
    /// current layer.
    fn insert_shape(&mut self, tool: ToolKind, r: Rect) -> Option<NodeId> {
        let prefix = match tool {
            ToolKind::Rect => "rect",
            ToolKind::Ellipse => "ellipse",
            _ => return None,
        };
        let parent = layers::insertion_parent(&self.doc, &self.state);
        let graph = &mut self.doc.graph;
        let local = inverse_or_identity(graph.world_transform(parent)).transform_rect_bbox(r);
        let id = graph.assign_unique_id(prefix);
        let node = tools::new_shape(tool, id, local, self.settings.stroke_width)?;
        graph.insert(parent, node, None);
        Some(id)
    }

    fn create_start(&mut self, tool: ToolKind, start: Point) -> Result<(), EditError> {
        self.begin_action(Action::NewElement, "")?;
        let created = self.insert_shape(tool, Rect::from_points(start, start));
        self.state.act_unlock();
        if let Some(press) = self.press.as_mut() {
            press.created = created;
        }
        Ok(())
    }

    fn resize_created(&mut self, id: NodeId, screen: Rect) {
        let graph = &mut self.doc.graph;
        let Some(idx) = graph.index_of(id) else {
            return;
        };
        let local = inverse_or_identity(graph.parent_world_transform(idx)).transform_rect_bbox(screen);
        let node = &mut graph.graph[idx];
        node.set_node_pos(local.origin());
        node.set_node_size(local.size());
    }

    /// Bezier tool press: start a path, or extend the one being drawn.
    fn bezier_add(&mut self, pos: Point) -> Result<(), EditError> {
        let draft = self.draft.filter(|d| self.doc.graph.index_of(d.path).is_some());
        let path = match draft {
            Some(d) if (d.last - pos).hypot() <= self.settings.snap_tol => return Ok(()),
            Some(d) => {
                self.run_action(Action::NewPath, d.path.as_str(), |ed| {
                    let graph = &mut ed.doc.graph;
                    let idx = graph.index_of(d.path).ok_or(EditError::NoActivePath)?;
                    let NodeKind::Path { data } = &graph.graph[idx].kind else {
                        return Err(EditError::NoActivePath);
                    };
                    let mut data = data.clone();
                    let local = inverse_or_identity(graph.world_transform(idx)) * pos;
                    data.push(PathCmd::LineTo(local.x, local.y));
                    nodes::commit_path(graph, idx, data)
                })?;
                d.path
            }
            None => self.run_action(Action::NewPath, "", |ed| {
                let parent = layers::insertion_parent(&ed.doc, &ed.state);
                let graph = &mut ed.doc.graph;
                let local = inverse_or_identity(graph.world_transform(parent)) * pos;
                let id = graph.assign_unique_id("path");
                graph.insert(parent, tools::new_path(id, local, ed.settings.stroke_width), None);
                Ok(id)
            })?,
        };
        self.draft = Some(PathDraft { path, last: pos });
        self.sprites.lock().set_line_add(None);
        Ok(())
    }

    /// End the path being drawn. A path that never got a second node is
    /// removed.
    fn finish_path(&mut self) -> Result<(), EditError> {
        self.press = None;
        self.sprites.lock().set_line_add(None);
        let Some(draft) = self.draft.take() else {
            return Ok(());
        };
        let points = match self.doc.graph.get_by_id(draft.path).map(|n| &n.kind) {
            Some(NodeKind::Path { data }) => data.point_count(),
            _ => return Ok(()),
        };
        if points < 2 {
            return self.run_action(Action::Edit, draft.path.as_str(), |ed| {
                if let Some(idx) = ed.doc.graph.index_of(draft.path) {
                    ed.doc.graph.remove(idx);
                }
                Ok(())
            });
        }
        self.select(&[draft.path]);
        Ok(())
    }

    // ─── Tools and selection ─────────────────────────────────────────────

    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.state.in_action() != Action::None {
            self.abort();
        }
        if tool != ToolKind::Bezier {
            self.draft = None;
        }
        self.state.tool = tool;
        if tool == ToolKind::Node && self.state.active_path(&self.doc.graph).is_none() {
            let graph = &self.doc.graph;
            let path = self
                .state
                .first_selected_non_group(graph, true)
                .filter(|&id| is_path(graph, id));
            self.state.set_active_path(graph, path);
        }
        self.after_change();
    }

    /// Replace the selection.
    pub fn select(&mut self, ids: &[NodeId]) {
        self.state.clear_selected();
        for &id in ids {
            self.state.add_selected(&self.doc.graph, id);
        }
        self.after_change();
    }

    /// Select everything editable; with the Node tool, every node of the
    /// active path.
    pub fn select_all(&mut self) {
        if self.state.tool == ToolKind::Node {
            self.state.node.selected = (0..self.state.node.records.len()).collect();
            self.after_change();
            return;
        }
        let graph = &self.doc.graph;
        let mut ids = Vec::new();
        graph.walk(graph.root, |idx, node| {
            if idx == graph.root {
                return WalkControl::Continue;
            }
            if node.kind.is_definition() {
                return WalkControl::SkipChildren;
            }
            if node.is_layer() {
                return if graph.is_visible(idx) && !graph.is_locked(idx) {
                    WalkControl::Continue
                } else {
                    WalkControl::SkipChildren
                };
            }
            ids.push(node.id);
            WalkControl::SkipChildren
        });
        self.select(&ids);
    }

    /// Cancel the pending gesture without committing it and go back to the
    /// Select tool.
    pub fn abort(&mut self) {
        let action = self.state.in_action();
        if action.is_undoable() {
            self.rollback();
        }
        if action != Action::None {
            log::debug!("aborted {action}");
            self.state.act_done();
        }
        self.state.drag_reset();
        self.press = None;
        self.draft = None;
        self.state.tool = ToolKind::Select;
        let sprites = self.sprites.nolock();
        sprites.set_rubber_band(None);
        sprites.set_matches(&[]);
        sprites.set_line_add(None);
        self.after_change();
    }

    /// Selected nodes in document order. Layers are never included.
    fn paint_ordered_selection(&self) -> Vec<NodeIndex> {
        let graph = &self.doc.graph;
        let ids = self.state.selected_ids();
        let mut out = Vec::new();
        graph.walk(graph.root, |idx, node| {
            if ids.contains(&node.id) && is_selectable(graph, idx) {
                out.push(idx);
                WalkControl::SkipChildren
            } else {
                WalkControl::Continue
            }
        });
        out
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    /// Step back one action. Returns its label.
    pub fn undo(&mut self) -> Result<String, EditError> {
        self.ensure_idle()?;
        if self.undo.must_save_undo_start() {
            let present = self.doc.lines();
            self.undo.save_undo_start(present);
        }
        let Some(step) = self.undo.undo() else {
            self.status = EditError::UndoEmpty.to_string();
            return Err(EditError::UndoEmpty);
        };
        let (label, state) = (step.label.to_string(), step.state.to_vec());
        self.restore(&state)?;
        self.status = format!("Undo {label}");
        Ok(label)
    }

    pub fn redo(&mut self) -> Result<String, EditError> {
        self.ensure_idle()?;
        let Some(step) = self.undo.redo() else {
            self.status = EditError::RedoEmpty.to_string();
            return Err(EditError::RedoEmpty);
        };
        let (label, state) = (step.label.to_string(), step.state.to_vec());
        self.restore(&state)?;
        self.status = format!("Redo {label}");
        Ok(label)
    }

    fn restore(&mut self, lines: &[String]) -> Result<(), EditError> {
        self.doc.restore_lines(lines)?;
        layers::restore_current_layer(&mut self.doc, &mut self.state);
        self.draft = None;
        self.state.changed = true;
        self.after_change();
        self.notify(Notice::Changed);
        Ok(())
    }

    // ─── Structural edits ────────────────────────────────────────────────

    pub fn delete_selection(&mut self) -> Result<usize, EditError> {
        let result = self.with_selection(Action::Edit, |ed, selected| {
            for &idx in selected {
                ed.doc.graph.remove(idx);
            }
            ed.state.clear_selected();
            Ok(selected.len())
        });
        self.quiet(result)
    }

    /// Copy each selected node next to itself, offset by one grid step.
    /// The copies become the selection.
    pub fn duplicate_selection(&mut self) -> Result<usize, EditError> {
        let step = self.grid().incr;
        let result = self.with_selection(Action::Edit, |ed, selected| {
            let graph = &mut ed.doc.graph;
            let mut copies = Vec::new();
            for &idx in selected {
                let (Some(parent), Some(mut tree)) = (graph.parent(idx), graph.clone_subtree(idx)) else {
                    continue;
                };
                refresh_ids(graph, &mut tree);
                let at = graph.child_position(idx).map(|p| p + 1);
                let copy = graph.insert_subtree(parent, tree, at);
                graph.apply_delta(copy, Affine::translate((step, step)));
                copies.push(graph.graph[copy].id);
            }
            ed.state.clear_selected();
            for &id in &copies {
                ed.state.add_selected(&ed.doc.graph, id);
            }
            Ok(copies.len())
        });
        self.quiet(result)
    }

    /// Move the selection into a new group on top of the current layer.
    pub fn group_selection(&mut self) -> Result<Option<NodeId>, EditError> {
        let result = self.with_selection(Action::Edit, |ed, _| {
            let parent = layers::insertion_parent(&ed.doc, &ed.state);
            let members = ed.paint_ordered_selection();
            let graph = &mut ed.doc.graph;
            let id = graph.assign_unique_id(NodeKind::Group.id_prefix());
            let group = graph.insert(parent, SceneNode::new(id, NodeKind::Group), None);
            let frame = graph.world_transform(group);
            for idx in members {
                if graph.is_ancestor_of(idx, group) {
                    continue;
                }
                // Keep the node where it is on screen under its new parent.
                let from = graph.parent_world_transform(idx);
                if from != frame {
                    let node = &mut graph.graph[idx];
                    node.transform = inverse_or_identity(frame) * from * node.transform;
                }
                graph.move_node(idx, group, None);
            }
            ed.state.clear_selected();
            ed.state.add_selected(&ed.doc.graph, id);
            Ok(Some(id))
        });
        self.quiet(result)
    }

    /// Dissolve selected groups; their children become the selection.
    pub fn ungroup_selection(&mut self) -> Result<usize, EditError> {
        let result = self.with_selection(Action::Edit, |ed, selected| {
            let mut freed = Vec::new();
            for &idx in selected {
                let graph = &mut ed.doc.graph;
                if graph.graph[idx].is_group() && !graph.graph[idx].is_layer() {
                    let children = ungroup(graph, idx);
                    freed.extend(children.into_iter().map(|c| graph.graph[c].id));
                }
            }
            if !freed.is_empty() {
                ed.state.clear_selected();
                for &id in &freed {
                    ed.state.add_selected(&ed.doc.graph, id);
                }
            }
            Ok(freed.len())
        });
        self.quiet(result)
    }

    /// Push group styles down to the leaves and dissolve groups that hold
    /// a single shape. Returns how many groups went away.
    pub fn cleanup_groups(&mut self) -> Result<usize, EditError> {
        self.run_action(Action::Edit, "cleanup", |ed| {
            let graph = &mut ed.doc.graph;
            distribute_all(graph);
            let removed = ungroup_singletons(graph);
            ed.state.sanitize_selected(&ed.doc.graph);
            log::debug!("cleanup removed {removed} singleton groups");
            Ok(removed)
        })
    }

    /// Restack the selection inside each node's parent.
    pub fn z_order(&mut self, order: ZOrder) -> Result<usize, EditError> {
        let result = self.with_selection(Action::Edit, |ed, _| {
            let mut list = ed.paint_ordered_selection();
            // Process so that nodes never leapfrog each other.
            if matches!(order, ZOrder::Raise | ZOrder::LowerToBottom) {
                list.reverse();
            }
            let graph = &mut ed.doc.graph;
            let mut moved = 0;
            for idx in list {
                let changed = match order {
                    ZOrder::Raise => graph.bring_forward(idx),
                    ZOrder::Lower => graph.send_backward(idx),
                    ZOrder::RaiseToTop => graph.bring_to_front(idx),
                    ZOrder::LowerToBottom => graph.send_to_back(idx),
                };
                moved += usize::from(changed);
            }
            Ok(moved)
        });
        self.quiet(result)
    }

    pub fn align(&mut self, kind: AlignKind, anchor: AlignAnchor) -> Result<usize, EditError> {
        let result = self.with_selection(Action::Align, |ed, _| {
            align_selected(&mut ed.doc.graph, &ed.state, kind, anchor)
        });
        self.quiet(result)
    }

    // ─── Style ───────────────────────────────────────────────────────────

    /// Apply a style change to the selection. A run of `intermediate`
    /// changes (a slider being dragged) shares one action and one undo
    /// record; the first non-intermediate change closes it.
    pub fn style_change(
        &mut self,
        action: Action,
        intermediate: bool,
        f: impl FnOnce(&mut SceneGraph, &[NodeIndex]) -> usize,
    ) -> Result<usize, EditError> {
        if !self.state.has_selected() {
            return self.quiet(Err(EditError::NoSelection));
        }
        if self.state.in_action() != action {
            let data = self.state.selected_names(&self.doc.graph).join(",");
            if let Err(e) = self.begin_action(action, &data) {
                return self.quiet(Err(e));
            }
            self.state.act_unlock();
        }
        let roots = self.state.selected_indices(&self.doc.graph);
        let changed = f(&mut self.doc.graph, &roots);
        if !intermediate {
            self.finish_action();
        }
        self.after_change();
        Ok(changed)
    }

    pub fn set_fill(&mut self, kind: PaintKind, color: Color) -> Result<usize, EditError> {
        self.style_change(Action::SetFillColor, false, |g, roots| {
            style::set_paint(g, roots, "fill", kind, color)
        })
    }

    pub fn set_stroke(&mut self, kind: PaintKind, color: Color) -> Result<usize, EditError> {
        self.style_change(Action::SetStrokeColor, false, |g, roots| {
            style::set_paint(g, roots, "stroke", kind, color)
        })
    }

    pub fn set_stroke_width(&mut self, width: f64, intermediate: bool) -> Result<usize, EditError> {
        self.style_change(Action::SetStyle, intermediate, |g, roots| {
            style::set_stroke_width(g, roots, width)
        })
    }

    pub fn set_dashes(&mut self, pattern: &[f64]) -> Result<usize, EditError> {
        self.style_change(Action::SetStyle, false, |g, roots| style::set_dashes(g, roots, pattern))
    }

    pub fn set_marker(&mut self, pos: MarkerPos, name: Option<&str>, color: MarkerColor) -> Result<usize, EditError> {
        self.style_change(Action::SetStyle, false, |g, roots| {
            style::set_marker(g, roots, pos, name, color)
        })
    }

    pub fn set_text_prop(&mut self, key: &str, value: &str) -> Result<usize, EditError> {
        self.style_change(Action::SetStyle, false, |g, roots| {
            style::set_text_prop(g, roots, key, value)
        })
    }

    // ─── Path nodes ──────────────────────────────────────────────────────

    pub fn set_active_path(&mut self, path: Option<NodeId>) {
        self.state.set_active_path(&self.doc.graph, path);
        self.after_change();
    }

    /// Replace the node selection of the active path.
    pub fn select_nodes(&mut self, indices: impl IntoIterator<Item = usize>) {
        self.state.node.selected = indices.into_iter().collect();
        self.after_change();
    }

    fn with_path<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, EditError>) -> Result<T, EditError> {
        let path = self
            .state
            .active_path(&self.doc.graph)
            .map(|idx| self.doc.graph.graph[idx].id)
            .ok_or(EditError::NoActivePath)?;
        self.run_action(Action::NodeEdit, path.as_str(), f)
    }

    pub fn insert_node(&mut self, op: PathOp) -> Result<Option<usize>, EditError> {
        let offset = self.settings.append_offset;
        let result = self.with_path(|ed| nodes::insert_node(&mut ed.doc.graph, &mut ed.state, op, offset));
        self.quiet(result)
    }

    pub fn replace_node(&mut self, op: PathOp) -> Result<usize, EditError> {
        let result = self.with_path(|ed| nodes::replace_node(&mut ed.doc.graph, &mut ed.state, op));
        self.quiet(result)
    }

    pub fn delete_nodes(&mut self) -> Result<usize, EditError> {
        let result = self.with_path(|ed| nodes::delete_nodes(&mut ed.doc.graph, &mut ed.state));
        self.quiet(result)
    }

    // ─── Layers ──────────────────────────────────────────────────────────

    pub fn layers(&self) -> Vec<LayerInfo> {
        layers::sync_layers_from_scene(&self.doc)
    }

    pub fn add_layer(&mut self) -> Result<NodeId, EditError> {
        self.run_action(Action::Edit, "layer", |ed| {
            Ok(layers::add_layer(&mut ed.doc, &mut ed.state))
        })
    }

    pub fn set_current_layer(&mut self, id: NodeId) -> Result<(), EditError> {
        self.run_action(Action::Edit, id.as_str(), |ed| {
            layers::set_current_layer(&mut ed.doc, &mut ed.state, id)
        })
    }

    pub fn set_layers(&mut self, list: &[LayerInfo]) -> Result<(), EditError> {
        self.run_action(Action::Edit, "layers", |ed| {
            layers::sync_layers_to_scene(&mut ed.doc, &mut ed.state, list);
            Ok(())
        })
    }

    // ─── Export ──────────────────────────────────────────────────────────

    pub fn export(&mut self, format: ExportFormat, out: &Path, opts: &ExportOptions) -> Result<(), EditError> {
        let result = export::export(&self.doc, &self.settings.export_command, format, out, opts);
        if result.is_ok() {
            self.status = format!("exported {}", out.display());
        }
        self.quiet(result)
    }
}
