//! Integration tests: snapshot undo/redo through the editor.
//!
//! Every document-changing operation is one undo step; undoing `n` steps
//! and redoing them returns to exactly the serialized states seen on the
//! way.

use pretty_assertions::assert_eq;
use vd_core::model::Color;
use vd_core::{Document, NodeId};
use vd_editor::{AlignAnchor, AlignKind, Editor, PaintKind, Settings, ZOrder};

fn make_editor() -> Editor {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
  <rect id="a" x="0" y="0" width="10" height="10"/>
  <rect id="b" x="30" y="5" width="10" height="10"/>
  <ellipse id="c" cx="80" cy="40" rx="5" ry="5"/>
</svg>"#;
    Editor::new(Document::from_svg(svg).unwrap(), Settings::without_snapping())
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

// ─── Round trip ─────────────────────────────────────────────────────────

#[test]
fn undo_then_redo_replays_every_state() {
    let mut ed = make_editor();
    let mut states = vec![ed.doc().to_svg()];

    ed.select(&[id("a"), id("b")]);
    ed.align(AlignKind::Top, AlignAnchor::FirstSelected).unwrap();
    states.push(ed.doc().to_svg());

    ed.set_fill(PaintKind::Solid, Color::rgba(1.0, 0.0, 0.0, 1.0)).unwrap();
    states.push(ed.doc().to_svg());

    ed.select(&[id("c")]);
    ed.z_order(ZOrder::LowerToBottom).unwrap();
    states.push(ed.doc().to_svg());

    ed.delete_selection().unwrap();
    states.push(ed.doc().to_svg());

    for expected in states.iter().rev().skip(1) {
        ed.undo().unwrap();
        assert_eq!(&ed.doc().to_svg(), expected);
    }
    assert!(!ed.can_undo());

    for expected in states.iter().skip(1) {
        ed.redo().unwrap();
        assert_eq!(&ed.doc().to_svg(), expected);
    }
    assert!(!ed.can_redo());
}

#[test]
fn undo_reports_the_action_label() {
    let mut ed = make_editor();
    ed.select(&[id("a")]);
    ed.duplicate_selection().unwrap();
    ed.set_stroke_width(3.0, false).unwrap();
    assert_eq!(ed.undo().unwrap(), "SetStyle");
    assert_eq!(ed.status(), "Undo SetStyle");
    assert_eq!(ed.undo().unwrap(), "Edit");
    assert_eq!(ed.redo().unwrap(), "Edit");
}

// ─── Redo tail ──────────────────────────────────────────────────────────

#[test]
fn new_action_discards_the_redo_tail() {
    let mut ed = make_editor();
    ed.select(&[id("a")]);
    ed.delete_selection().unwrap();
    ed.undo().unwrap();
    assert!(ed.can_redo());

    ed.select(&[id("b")]);
    ed.delete_selection().unwrap();
    assert!(!ed.can_redo());
    assert!(ed.doc().graph.get_by_id(id("a")).is_some());
    assert!(ed.doc().graph.get_by_id(id("b")).is_none());
}

#[test]
fn no_op_actions_leave_no_undo_step() {
    let mut ed = make_editor();
    ed.select(&[id("a")]);
    // Already at the back: nothing moves.
    assert_eq!(ed.z_order(ZOrder::LowerToBottom).unwrap(), 0);
    assert!(!ed.can_undo());
    assert!(!ed.is_modified());
}

#[test]
fn empty_stack_is_reported_on_the_status_line() {
    let mut ed = make_editor();
    assert!(ed.undo().is_err());
    assert_eq!(ed.status(), "no more to undo");
    assert!(ed.redo().is_err());
    assert_eq!(ed.status(), "no more to redo");
}
