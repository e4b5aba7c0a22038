//! Property-based invariant tests for the editor state machine.
//!
//! Random event streams (presses, slides, releases, scrolls and key
//! chords with random modifiers) are fed to one editor. After every event:
//! 1. No selected node is an ancestor of another selected node
//! 2. Cached bboxes agree with freshly computed world bboxes (to rounding)
//! 3. The action mutex is never left locked, and every acquisition has a
//!    matching release
//! 4. The node display list has one record per path point
//! 5. A drag cancelled with Escape leaves the document untouched

use kurbo::Vec2;
use proptest::prelude::*;
use vd_core::{Document, NodeKind, world_bbox};
use vd_editor::{Action, Editor, InputEvent, Modifiers, Pointer, Settings};

const DOC: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape">
  <g id="layer1" inkscape:groupmode="layer" inkscape:label="Layer 1">
    <rect id="r1" x="10" y="10" width="40" height="30"/>
    <g id="g1" transform="translate(80 20)">
      <ellipse id="e1" cx="20" cy="20" rx="15" ry="10"/>
      <rect id="r2" x="0" y="50" width="20" height="20" transform="rotate(15)"/>
    </g>
    <path id="p1" d="M 20 120 L 60 140 C 80 120 100 160 120 140 Q 140 120 160 150"/>
  </g>
</svg>"#;

const CHORDS: &[&str] = &[
    "Escape",
    "Control+z",
    "Control+Shift+z",
    "Delete",
    "Control+a",
    "Control+d",
    "Control+g",
    "Control+Shift+g",
    "s",
    "n",
    "r",
    "e",
    "b",
    "PageUp",
    "End",
];

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_modifiers() -> impl Strategy<Value = Modifiers> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(shift, ctrl, alt)| Modifiers { shift, ctrl, alt })
}

fn arb_pointer() -> impl Strategy<Value = Pointer> {
    (0.0..200.0f64, 0.0..200.0f64, arb_modifiers(), -6.0..6.0f64, -6.0..6.0f64)
        .prop_map(|(x, y, mods, dx, dy)| Pointer::at(x, y).with_mods(mods).with_delta(Vec2::new(dx, dy)))
}

fn arb_event() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        3 => arb_pointer().prop_map(InputEvent::MouseDown),
        4 => arb_pointer().prop_map(InputEvent::SlideMove),
        2 => arb_pointer().prop_map(InputEvent::SlideStop),
        2 => arb_pointer().prop_map(InputEvent::MouseUp),
        1 => arb_pointer().prop_map(InputEvent::DoubleClick),
        1 => (arb_pointer(), -3.0..3.0f64).prop_map(|(pointer, dy)| InputEvent::Scroll {
            pointer,
            delta: Vec2::new(0.0, dy),
        }),
        2 => prop::sample::select(CHORDS).prop_map(|c| InputEvent::KeyChord(c.to_string())),
    ]
}

fn editor() -> Editor {
    Editor::new(Document::from_svg(DOC).unwrap(), Settings::default())
}

fn check_invariants(ed: &Editor) -> Result<(), TestCaseError> {
    let graph = &ed.doc().graph;
    let state = ed.state();

    let selected = state.selected_indices(graph);
    for &a in &selected {
        for &b in &selected {
            prop_assert!(!graph.is_ancestor_of(a, b), "selected ancestor/descendant pair");
        }
        if let Some(fresh) = world_bbox(graph, a) {
            let cached = graph.graph[a].bbox;
            for (c, f) in [(cached.x0, fresh.x0), (cached.y0, fresh.y0), (cached.x1, fresh.x1), (cached.y1, fresh.y1)] {
                prop_assert!((c - f).abs() <= 0.5 + 1e-6, "stale bbox {cached:?} vs {fresh:?}");
            }
        }
    }

    prop_assert!(!state.mutex.is_locked());
    let (acquired, released) = state.mutex.counts();
    prop_assert_eq!(acquired, released);

    if let Some(idx) = state.active_path(graph)
        && let NodeKind::Path { data } = &graph.graph[idx].kind
    {
        prop_assert_eq!(state.node.records.len(), data.point_count());
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Invariants hold after every event
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_for_random_event_streams(events in prop::collection::vec(arb_event(), 1..40)) {
        let mut ed = editor();
        for event in &events {
            // Errors (busy action, nothing selected) are legitimate outcomes.
            let _ = ed.handle_event(event);
            check_invariants(&ed)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Escape cancels a drag
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn escape_during_a_drag_restores_the_document(
        start in arb_pointer(),
        moves in prop::collection::vec(arb_pointer(), 1..8),
    ) {
        let mut ed = editor();
        let before = ed.doc().to_svg();
        let _ = ed.handle_event(&InputEvent::MouseDown(start));
        for m in &moves {
            let _ = ed.handle_event(&InputEvent::SlideMove(*m));
        }
        ed.handle_event(&InputEvent::KeyChord("Escape".into())).unwrap();
        prop_assert_eq!(ed.state().in_action(), Action::None);
        prop_assert_eq!(ed.doc().to_svg(), before);
        prop_assert!(!ed.can_undo());
    }
}
