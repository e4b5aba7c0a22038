//! Integration tests: whole gestures driven through `Editor::handle_event`.

use kurbo::Vec2;
use pretty_assertions::assert_eq;
use vd_core::{Document, NodeId, NodeKind, PathOp};
use vd_editor::{Editor, InputEvent, Modifiers, Pointer, Settings, ToolKind, ZOrder};

fn editor_with(body: &str, settings: Settings) -> Editor {
    let svg = format!(r#"<svg xmlns="http://www.w3.org/2000/svg">{body}</svg>"#);
    Editor::new(Document::from_svg(&svg).unwrap(), settings)
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn click(ed: &mut Editor, x: f64, y: f64) {
    ed.handle_event(&InputEvent::MouseDown(Pointer::at(x, y))).unwrap();
    ed.handle_event(&InputEvent::MouseUp(Pointer::at(x, y))).unwrap();
}

fn drag(ed: &mut Editor, from: Pointer, to: Pointer) {
    ed.handle_event(&InputEvent::MouseDown(from)).unwrap();
    ed.handle_event(&InputEvent::SlideMove(to)).unwrap();
    ed.handle_event(&InputEvent::SlideStop(to)).unwrap();
}

fn rect_xy(ed: &Editor, name: &str) -> (f64, f64) {
    match ed.doc().graph.get_by_id(id(name)).unwrap().kind {
        NodeKind::Rect { x, y, .. } => (x, y),
        _ => panic!("expected Rect"),
    }
}

fn path_d(ed: &Editor, name: &str) -> String {
    match &ed.doc().graph.get_by_id(id(name)).unwrap().kind {
        NodeKind::Path { data } => data.to_svg_d(),
        _ => panic!("expected Path"),
    }
}

fn selection(ed: &Editor) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = ed.state().selected_ids().into_iter().collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids
}

// ─── Selection ──────────────────────────────────────────────────────────

#[test]
fn repeated_clicks_cycle_through_stacked_nodes() {
    let mut ed = editor_with(
        r#"<rect id="under" width="200" height="200"/>
           <rect id="over" x="20" y="20" width="40" height="40"/>"#,
        Settings::without_snapping(),
    );
    click(&mut ed, 40.0, 40.0);
    assert_eq!(selection(&ed), vec![id("over")]);
    click(&mut ed, 40.0, 40.0);
    assert_eq!(selection(&ed), vec![id("under")]);
    click(&mut ed, 40.0, 40.0);
    assert_eq!(selection(&ed), vec![id("over")]);
}

#[test]
fn shift_click_extends_and_background_click_clears() {
    let mut ed = editor_with(
        r#"<rect id="a" width="10" height="10"/>
           <rect id="b" x="50" width="10" height="10"/>"#,
        Settings::without_snapping(),
    );
    click(&mut ed, 5.0, 5.0);
    let shift = Pointer::at(55.0, 5.0).with_mods(Modifiers::SHIFT);
    ed.handle_event(&InputEvent::MouseDown(shift)).unwrap();
    ed.handle_event(&InputEvent::MouseUp(shift)).unwrap();
    assert_eq!(selection(&ed), vec![id("a"), id("b")]);

    click(&mut ed, 300.0, 300.0);
    assert!(selection(&ed).is_empty());
}

#[test]
fn layers_stay_direct_children_of_the_root() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"
         xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape">
  <g id="L1" inkscape:groupmode="layer"><rect id="a" width="10" height="10"/></g>
  <g id="L2" inkscape:groupmode="layer"><rect id="b" x="20" width="10" height="10"/></g>
</svg>"#;
    let mut ed = Editor::new(Document::from_svg(svg).unwrap(), Settings::without_snapping());
    ed.set_current_layer(id("L2")).unwrap();

    ed.select(&[id("L1")]);
    assert!(selection(&ed).is_empty());
    assert_eq!(ed.group_selection().unwrap(), None);
    assert_eq!(ed.duplicate_selection().unwrap(), 0);
    assert_eq!(ed.z_order(ZOrder::RaiseToTop).unwrap(), 0);

    // A layer mixed into a real selection is ignored as well.
    ed.select(&[id("L1"), id("b")]);
    assert_eq!(selection(&ed), vec![id("b")]);
    ed.group_selection().unwrap();

    let graph = &ed.doc().graph;
    for layer in ["L1", "L2"] {
        let idx = graph.index_of(id(layer)).unwrap();
        assert_eq!(graph.parent(idx), Some(graph.root), "{layer} was reparented");
    }
}

#[test]
fn cleanup_flattens_singleton_groups() {
    let mut ed = editor_with(
        r##"<g id="single" transform="translate(10 0)" style="fill:#ff0000">
             <rect id="r" width="5" height="5"/>
           </g>
           <g id="pair" style="stroke:#000000">
             <rect id="a" width="1" height="1"/>
             <rect id="b" x="3" width="1" height="1"/>
           </g>"##,
        Settings::without_snapping(),
    );
    assert_eq!(ed.cleanup_groups().unwrap(), 1);

    let graph = &ed.doc().graph;
    assert!(graph.get_by_id(id("single")).is_none());
    let r = graph.index_of(id("r")).unwrap();
    assert_eq!(graph.parent(r), Some(graph.root));
    assert_eq!(graph.graph[r].prop("fill"), Some("#ff0000"));
    assert_eq!(rect_xy(&ed, "r"), (10.0, 0.0));

    // The pair stays grouped; only its style moved down.
    let graph = &ed.doc().graph;
    assert_eq!(graph.get_by_id(id("pair")).unwrap().prop("stroke"), None);
    assert_eq!(graph.get_by_id(id("a")).unwrap().prop("stroke"), Some("#000000"));

    // Nothing left to do: no second undo step.
    assert_eq!(ed.cleanup_groups().unwrap(), 0);
    assert_eq!(ed.undo().unwrap(), "Edit");
    assert!(!ed.can_undo());
    assert!(ed.doc().graph.get_by_id(id("single")).is_some());
}

// ─── Move / reshape / rotate ────────────────────────────────────────────

#[test]
fn ctrl_drag_keeps_the_dominant_axis() {
    let mut ed = editor_with(r#"<rect id="r" width="10" height="10"/>"#, Settings::without_snapping());
    ed.select(&[id("r")]);
    drag(
        &mut ed,
        Pointer::at(5.0, 5.0),
        Pointer::at(27.0, 4.0).with_mods(Modifiers::CTRL),
    );
    assert_eq!(rect_xy(&ed, "r"), (22.0, 0.0));
}

#[test]
fn drag_snaps_to_the_document_grid() {
    let settings = Settings {
        snap_guide: false,
        snap_nodes: false,
        snap_zone: 3.0,
        grid_spacing: 10.0,
        ..Settings::default()
    };
    let mut ed = editor_with(r#"<rect id="r" width="10" height="10"/>"#, settings);
    ed.select(&[id("r")]);
    drag(&mut ed, Pointer::at(5.0, 5.0), Pointer::at(13.0, 16.0));
    assert_eq!(rect_xy(&ed, "r"), (10.0, 10.0));
}

#[test]
fn alt_on_a_corner_handle_rotates_in_steps() {
    let mut ed = editor_with(r#"<rect id="r" width="40" height="40"/>"#, Settings::without_snapping());
    ed.select(&[id("r")]);
    let start = Pointer::at(40.0, 40.0);
    let turn = Pointer::at(41.0, 41.7)
        .with_mods(Modifiers::ALT)
        .with_delta(Vec2::new(1.0, 3f64.sqrt()));
    drag(&mut ed, start, turn);

    assert!(ed.status().contains("60"), "status was {:?}", ed.status());
    let node = ed.doc().graph.get_by_id(id("r")).unwrap();
    let [a, b, ..] = node.transform.as_coeffs();
    assert!((a - 0.5).abs() < 1e-9);
    assert!((b - 3f64.sqrt() / 2.0).abs() < 1e-9);
    assert_eq!(ed.undo().unwrap(), "Rotate");
}

#[test]
fn reshape_handle_drag_resizes_about_the_opposite_corner() {
    let mut ed = editor_with(r#"<rect id="r" x="10" y="10" width="20" height="20"/>"#, Settings::without_snapping());
    ed.select(&[id("r")]);
    drag(&mut ed, Pointer::at(30.0, 30.0), Pointer::at(50.0, 40.0));
    match ed.doc().graph.get_by_id(id("r")).unwrap().kind {
        NodeKind::Rect { x, y, width, height } => assert_eq!((x, y, width, height), (10.0, 10.0, 40.0, 30.0)),
        _ => panic!("expected Rect"),
    }
}

// ─── Path nodes ─────────────────────────────────────────────────────────

#[test]
fn insert_node_splits_and_undo_restores() {
    let mut ed = editor_with(r#"<path id="p" d="M 0 0 L 10 0 L 20 0"/>"#, Settings::without_snapping());
    ed.set_active_path(Some(id("p")));
    ed.select_nodes([0]);
    assert_eq!(ed.insert_node(PathOp::CubeTo).unwrap(), Some(1));
    assert_eq!(path_d(&ed, "p"), "M 0 0 C 1.25 0 3.75 0 5 0 L 10 0 L 20 0");

    assert_eq!(ed.undo().unwrap(), "NodeEdit");
    assert_eq!(path_d(&ed, "p"), "M 0 0 L 10 0 L 20 0");
}

#[test]
fn delete_selected_nodes() {
    let mut ed = editor_with(r#"<path id="p" d="M 0 0 L 10 0 L 20 0 L 30 0"/>"#, Settings::without_snapping());
    ed.set_active_path(Some(id("p")));
    ed.select_nodes([1, 2]);
    assert_eq!(ed.delete_nodes().unwrap(), 2);
    assert_eq!(path_d(&ed, "p"), "M 0 0 L 30 0");
}

#[test]
fn node_tool_drags_a_node_handle() {
    let mut ed = editor_with(r#"<path id="p" d="M 0 0 L 50 0 L 100 0"/>"#, Settings::without_snapping());
    ed.select(&[id("p")]);
    ed.set_tool(ToolKind::Node);
    assert_eq!(ed.state().node.path, Some(id("p")));

    drag(&mut ed, Pointer::at(50.0, 0.0), Pointer::at(50.0, 20.0));
    assert_eq!(path_d(&ed, "p"), "M 0 0 L 50 20 L 100 0");
    assert_eq!(ed.undo().unwrap(), "NodeMove");
    assert_eq!(path_d(&ed, "p"), "M 0 0 L 50 0 L 100 0");
}

#[test]
fn insert_without_active_path_is_quiet() {
    let mut ed = editor_with("", Settings::without_snapping());
    assert_eq!(ed.insert_node(PathOp::LineTo).unwrap(), None);
    assert_eq!(ed.status(), "no active path");
}

// ─── Creation ───────────────────────────────────────────────────────────

#[test]
fn ellipse_tool_drag_sizes_the_new_shape() {
    let mut ed = editor_with("", Settings::without_snapping());
    ed.set_tool(ToolKind::Ellipse);
    drag(&mut ed, Pointer::at(10.0, 10.0), Pointer::at(30.0, 50.0));
    let created = selection(&ed);
    assert_eq!(created.len(), 1);
    assert_eq!(
        ed.doc().graph.get_by_id(created[0]).unwrap().kind,
        NodeKind::Ellipse {
            cx: 20.0,
            cy: 30.0,
            rx: 10.0,
            ry: 20.0
        }
    );
    assert_eq!(ed.undo().unwrap(), "NewElement");
    assert!(ed.doc().graph.get_by_id(created[0]).is_none());
}

#[test]
fn rect_tool_drag_up_and_left_keeps_a_positive_size() {
    let mut ed = editor_with("", Settings::without_snapping());
    ed.set_tool(ToolKind::Rect);
    drag(&mut ed, Pointer::at(50.0, 50.0), Pointer::at(20.0, 30.0));
    let created = selection(&ed);
    assert_eq!(
        ed.doc().graph.get_by_id(created[0]).unwrap().kind,
        NodeKind::Rect {
            x: 20.0,
            y: 30.0,
            width: 30.0,
            height: 20.0
        }
    );
}

#[test]
fn new_elements_go_into_the_current_layer() {
    let mut ed = editor_with("", Settings::without_snapping());
    let layer = ed.add_layer().unwrap();
    ed.set_tool(ToolKind::Text);
    click(&mut ed, 5.0, 20.0);
    let text = selection(&ed)[0];
    let graph = &ed.doc().graph;
    let parent = graph.parent(graph.index_of(text).unwrap()).unwrap();
    assert_eq!(graph.graph[parent].id, layer);
}
