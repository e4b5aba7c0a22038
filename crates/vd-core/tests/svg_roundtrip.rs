//! Integration tests: parse → emit → re-parse round-trip.
//!
//! Verifies that no scene data is lost when converting SVG text →
//! SceneGraph → SVG text, and that a second emit is byte-identical.

use pretty_assertions::assert_eq;
use vd_core::id::NodeId;
use vd_core::model::*;
use vd_core::{Document, emit_svg, parse_svg};

const INKSCAPE_HEAD: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
     xmlns:xlink="http://www.w3.org/1999/xlink">"#;

fn doc(body: &str) -> String {
    format!("{INKSCAPE_HEAD}\n{body}\n</svg>")
}

// ─── Helpers ─────────────────────────────────────────────────────────────

/// Parse, emit, re-parse; every id survives and the second emit matches
/// the first.
fn assert_roundtrip_preserves(input: &str) -> (SceneGraph, SceneGraph) {
    let (graph1, view1) = parse_svg(input).expect("first parse failed");
    let emitted = emit_svg(&graph1, view1.as_ref());
    let (graph2, view2) = parse_svg(&emitted).expect("re-parse failed");

    assert_eq!(
        graph1.len(),
        graph2.len(),
        "node count mismatch after round-trip.\nEmitted:\n{emitted}"
    );
    for id in graph1.id_index.keys() {
        assert!(graph2.id_index.contains_key(id), "node id {id:?} lost after round-trip");
    }
    assert_eq!(emit_svg(&graph2, view2.as_ref()), emitted, "emit is not stable");
    (graph1, graph2)
}

fn node<'a>(graph: &'a SceneGraph, id: &str) -> &'a SceneNode {
    graph.get_by_id(NodeId::intern(id)).expect("node missing")
}

// ─── Shapes ──────────────────────────────────────────────────────────────

#[test]
fn roundtrip_basic_shapes() {
    let input = doc(r#"
  <rect id="rt-r" x="1" y="2" width="30" height="40" rx="3"/>
  <ellipse id="rt-e" cx="50" cy="60" rx="7" ry="8"/>
  <circle id="rt-c" cx="5" cy="5" r="2.5"/>
  <line id="rt-l" x1="0" y1="0" x2="10" y2="20"/>
  <text id="rt-t" x="4" y="30" style="font-size:12px">Hello &amp; bye</text>"#);
    let (g1, g2) = assert_roundtrip_preserves(&input);
    for id in ["rt-r", "rt-e", "rt-c", "rt-l", "rt-t"] {
        assert_eq!(node(&g1, id).kind, node(&g2, id).kind, "{id} kind changed");
    }
    assert_eq!(
        node(&g2, "rt-t").kind,
        NodeKind::Text {
            x: 4.0,
            y: 30.0,
            text: "Hello & bye".into()
        }
    );
    // Non-geometry attributes are carried as props.
    assert_eq!(node(&g2, "rt-r").prop("rx"), Some("3"));
}

#[test]
fn roundtrip_path_data() {
    let input = doc(r#"<path id="rt-p" d="M 0 0 L 10 0 C 12 0 18 5 20 10 Q 25 15 30 10 Z"/>"#);
    let (_, g2) = assert_roundtrip_preserves(&input);
    match &node(&g2, "rt-p").kind {
        NodeKind::Path { data } => {
            assert_eq!(data.to_svg_d(), "M 0 0 L 10 0 C 12 0 18 5 20 10 Q 25 15 30 10 Z");
            assert_eq!(data.point_count(), 4);
        }
        other => panic!("expected Path, got {other:?}"),
    }
}

#[test]
fn roundtrip_transforms_and_styles() {
    let input = doc(r#"
  <g id="rt-g" transform="translate(10 20)" style="fill:#ff0000;stroke:#000000">
    <rect id="rt-inner" width="5" height="5" transform="rotate(30)"/>
  </g>"#);
    let (g1, g2) = assert_roundtrip_preserves(&input);
    let (a, b) = (node(&g1, "rt-inner").transform, node(&g2, "rt-inner").transform);
    for (x, y) in a.as_coeffs().into_iter().zip(b.as_coeffs()) {
        assert!((x - y).abs() < 1e-4, "transform drifted: {a:?} vs {b:?}");
    }
    assert_eq!(node(&g2, "rt-g").prop("fill"), Some("#ff0000"));
    let g = g2.index_of(NodeId::intern("rt-g")).unwrap();
    assert_eq!(g2.children(g).len(), 1);
}

// ─── Layers and metadata ─────────────────────────────────────────────────

#[test]
fn roundtrip_layers_keep_flags_and_order() {
    let input = doc(r#"
  <g id="rt-l1" inkscape:groupmode="layer" inkscape:label="Back" sodipodi:insensitive="true">
    <rect id="rt-a" width="1" height="1"/>
  </g>
  <g id="rt-l2" inkscape:groupmode="layer" inkscape:label="Front" style="display:none"/>"#);
    let (g1, g2) = assert_roundtrip_preserves(&input);
    assert_eq!(g1.layers_from_scene(), g2.layers_from_scene());
    let layers = g2.layers_from_scene();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].name, "Back");
    assert!(layers[0].locked);
    assert!(!layers[1].visible);
}

#[test]
fn roundtrip_namedview_and_grid() {
    let input = doc(r#"
  <sodipodi:namedview id="nv" inkscape:cx="5" inkscape:cy="6" inkscape:zoom="1.5"
      inkscape:current-layer="rt-layer">
    <inkscape:grid type="xygrid" spacingx="8"/>
  </sodipodi:namedview>
  <g id="rt-layer" inkscape:groupmode="layer" inkscape:label="Layer1"/>"#);
    let doc1 = Document::from_svg(&input).unwrap();
    let doc2 = Document::from_svg(&doc1.to_svg()).unwrap();
    assert_eq!(doc1.view, doc2.view);
    assert_eq!(doc2.view.zoom, 1.5);
    assert_eq!(doc2.grid_spacing(), Some(8.0));
    assert_eq!(doc2.view.current_layer.as_deref(), Some("rt-layer"));
}

#[test]
fn gradients_survive_in_defs() {
    let input = doc(r##"
  <defs id="rt-defs">
    <linearGradient id="rt-grad">
      <stop offset="0" style="stop-color:#ff0000;stop-opacity:1"/>
      <stop offset="1" style="stop-color:#0000ff;stop-opacity:1"/>
    </linearGradient>
  </defs>
  <rect id="rt-filled" width="10" height="10" style="fill:url(#rt-grad)"/>"##);
    let (_, g2) = assert_roundtrip_preserves(&input);
    assert_eq!(g2.ref_count(NodeId::intern("rt-grad")), 1);
    match &node(&g2, "rt-grad").kind {
        NodeKind::Gradient { radial, stops } => {
            assert!(!radial);
            assert_eq!(stops.len(), 2);
        }
        other => panic!("expected Gradient, got {other:?}"),
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────

#[test]
fn malformed_input_is_rejected() {
    assert!(parse_svg("<svg").is_err());
    assert!(parse_svg(r#"<html xmlns="http://www.w3.org/1999/xhtml"/>"#).is_err());
    assert!(Document::from_svg(&doc(r#"<path id="bad" d="M 0 0 L"/>"#)).is_err());
}
