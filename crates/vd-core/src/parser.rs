//! Parser: SVG text → SceneGraph.
//!
//! XML structure comes from `roxmltree`; the two micro-syntaxes inside
//! attributes (path `d` data and `transform` lists) are parsed with
//! `winnow` 0.7.

use crate::document::{GridSpec, NamedView};
use crate::emitter::{INKSCAPE_NS, SODIPODI_NS, XLINK_NS};
use crate::error::CoreError;
use crate::id::NodeId;
use crate::model::*;
use crate::path::{PathCmd, PathData};
use kurbo::{Affine, Point, Vec2};
use petgraph::graph::NodeIndex;
use winnow::ascii::float;
use winnow::combinator::{preceded, repeat};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

/// Parse an SVG document into a scene graph and the editor metadata, if
/// the document carries any.
#[must_use = "parsing result should be used"]
pub fn parse_svg(input: &str) -> Result<(SceneGraph, Option<NamedView>), CoreError> {
    let xml = roxmltree::Document::parse(input).map_err(|e| CoreError::LoadFailed(e.to_string()))?;
    let svg = xml.root_element();
    if svg.tag_name().name() != "svg" {
        return Err(CoreError::LoadFailed(format!(
            "root element is <{}>, expected <svg>",
            svg.tag_name().name()
        )));
    }

    let mut graph = SceneGraph::new();
    let root = graph.root;
    for attr in svg.attributes() {
        if attr.name() == "id" && attr.namespace().is_none() {
            let id = NodeId::intern(attr.value());
            graph.id_index.remove(&graph.graph[root].id);
            graph.graph[root].id = id;
            graph.id_index.insert(id, root);
        } else if let Some(key) = prop_key(attr.namespace(), attr.name()) {
            graph.graph[root].props.insert(key, attr.value().to_string());
        }
    }

    let mut view = None;
    for child in svg.children().filter(roxmltree::Node::is_element) {
        if child.tag_name().namespace() == Some(SODIPODI_NS) && child.tag_name().name() == "namedview"
        {
            view = Some(parse_namedview(child));
            continue;
        }
        load_element(&mut graph, root, child, false)?;
    }
    Ok((graph, view))
}

fn parse_namedview(node: roxmltree::Node) -> NamedView {
    let ink = |name: &str| node.attribute((INKSCAPE_NS, name));
    let mut view = NamedView::default();
    if let Some(v) = ink("cx") {
        view.cx = parse_length(v);
    }
    if let Some(v) = ink("cy") {
        view.cy = parse_length(v);
    }
    if let Some(v) = ink("zoom").map(parse_length).filter(|z| *z > 0.0) {
        view.zoom = v;
    }
    view.current_layer = ink("current-layer").map(str::to_string);
    if let Some(units) = ink("document-units") {
        view.units = units.to_string();
    }
    view.grid = node
        .children()
        .find(|c| c.tag_name().namespace() == Some(INKSCAPE_NS) && c.tag_name().name() == "grid")
        .map(|grid| GridSpec {
            spacing: grid
                .attribute("spacingx")
                .map(parse_length)
                .filter(|s| *s > 0.0)
                .unwrap_or(GridSpec::default().spacing),
            units: grid.attribute("units").unwrap_or("px").to_string(),
        });
    view
}

// Attributes consumed into `NodeKind` fields, per element.
const NO_ATTRS: &[&str] = &[];
const BOX_ATTRS: &[&str] = &["x", "y", "width", "height"];
const ELLIPSE_ATTRS: &[&str] = &["cx", "cy", "rx", "ry"];
const CIRCLE_ATTRS: &[&str] = &["cx", "cy", "r"];
const LINE_ATTRS: &[&str] = &["x1", "y1", "x2", "y2"];
const PATH_ATTRS: &[&str] = &["d"];
const TEXT_ATTRS: &[&str] = &["x", "y"];

fn load_element(
    graph: &mut SceneGraph,
    parent: NodeIndex,
    el: roxmltree::Node,
    in_text: bool,
) -> Result<(), CoreError> {
    let num = |name: &str| el.attribute(name).map_or(0.0, parse_length);
    let tag = el.tag_name().name();
    let svg_ns = matches!(el.tag_name().namespace(), None | Some(crate::emitter::SVG_NS));

    let (kind, geometry): (NodeKind, &[&str]) = match tag {
        "g" if svg_ns => (NodeKind::Group, NO_ATTRS),
        "defs" if svg_ns => (NodeKind::Defs, NO_ATTRS),
        "rect" if svg_ns => (
            NodeKind::Rect {
                x: num("x"),
                y: num("y"),
                width: num("width"),
                height: num("height"),
            },
            BOX_ATTRS,
        ),
        "image" if svg_ns => (
            NodeKind::Image {
                x: num("x"),
                y: num("y"),
                width: num("width"),
                height: num("height"),
            },
            BOX_ATTRS,
        ),
        "ellipse" if svg_ns => (
            NodeKind::Ellipse {
                cx: num("cx"),
                cy: num("cy"),
                rx: num("rx"),
                ry: num("ry"),
            },
            ELLIPSE_ATTRS,
        ),
        "circle" if svg_ns => (
            NodeKind::Circle {
                cx: num("cx"),
                cy: num("cy"),
                r: num("r"),
            },
            CIRCLE_ATTRS,
        ),
        "line" if svg_ns => (
            NodeKind::Line {
                x1: num("x1"),
                y1: num("y1"),
                x2: num("x2"),
                y2: num("y2"),
            },
            LINE_ATTRS,
        ),
        "path" if svg_ns => (
            NodeKind::Path {
                data: parse_path_data(el.attribute("d").unwrap_or(""))?,
            },
            PATH_ATTRS,
        ),
        "text" | "tspan" if svg_ns => (
            NodeKind::Text {
                x: num("x"),
                y: num("y"),
                text: own_text(el),
            },
            TEXT_ATTRS,
        ),
        "linearGradient" | "radialGradient" if svg_ns => (
            NodeKind::Gradient {
                radial: tag == "radialGradient",
                stops: parse_stops(el),
            },
            NO_ATTRS,
        ),
        _ => (
            NodeKind::MetaData {
                tag: tag.to_string(),
            },
            NO_ATTRS,
        ),
    };

    let id = match el.attribute("id") {
        Some(id) => NodeId::intern(id),
        None => graph.assign_unique_id(kind.id_prefix()),
    };
    let mut node = SceneNode::new(id, kind);

    for attr in el.attributes() {
        let (ns, name) = (attr.namespace(), attr.name());
        if ns.is_none() && (name == "id" || geometry.contains(&name)) {
            continue;
        }
        if ns.is_none() && name == "transform" {
            node.transform = parse_transform(attr.value())?;
        } else if ns == Some(INKSCAPE_NS) && name == "label" {
            node.name = attr.value().to_string();
        } else if let Some(key) = prop_key(ns, name) {
            node.props.insert(key, attr.value().to_string());
        }
    }

    let is_text = matches!(node.kind, NodeKind::Text { .. });
    let is_gradient = matches!(node.kind, NodeKind::Gradient { .. });
    if in_text && !is_text {
        log::trace!("dropping <{tag}> inside text");
        return Ok(());
    }
    let idx = graph.add_node(parent, node);
    if is_gradient {
        return Ok(());
    }
    for child in el.children().filter(roxmltree::Node::is_element) {
        load_element(graph, idx, child, is_text)?;
    }
    Ok(())
}

/// Map a namespaced attribute to its property key. Editor-owned names lose
/// their prefix; unknown namespaces are dropped.
fn prop_key(ns: Option<&str>, name: &str) -> Option<String> {
    match (ns, name) {
        (None, _) => Some(name.to_string()),
        (Some(INKSCAPE_NS), "groupmode") => Some("groupmode".into()),
        (Some(SODIPODI_NS), "insensitive") => Some("insensitive".into()),
        (Some(XLINK_NS), "href") => Some("href".into()),
        (Some(INKSCAPE_NS), other) => Some(format!("inkscape:{other}")),
        (Some(SODIPODI_NS), other) => Some(format!("sodipodi:{other}")),
        (Some(ns), other) => {
            log::trace!("dropping attribute {{{ns}}}{other}");
            None
        }
    }
}

/// Direct character data of an element, trimmed.
fn own_text(el: roxmltree::Node) -> String {
    el.children()
        .filter(roxmltree::Node::is_text)
        .filter_map(|t| t.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_stops(el: roxmltree::Node) -> Vec<GradientStop> {
    el.children()
        .filter(|c| c.is_element() && c.tag_name().name() == "stop")
        .map(|stop| {
            let style = stop.attribute("style").unwrap_or("");
            let get = |key: &str| style_get(style, key).or_else(|| stop.attribute(key));
            let offset = stop.attribute("offset").map_or(0.0, |o| {
                let v = parse_length(o);
                if o.trim_end().ends_with('%') { v / 100.0 } else { v }
            });
            let mut color = get("stop-color").and_then(Color::parse).unwrap_or(Color::BLACK);
            color.a = get("stop-opacity").map_or(1.0, |a| parse_length(a) as f32);
            GradientStop { offset, color }
        })
        .collect()
}

/// Leading number of an SVG length (`10`, `2.5mm`, `50%`); 0 when absent.
pub fn parse_length(s: &str) -> f64 {
    let mut input = s.trim();
    float::<_, f64, ContextError>.parse_next(&mut input).unwrap_or(0.0)
}

// ─── Attribute micro-syntaxes ───────────────────────────────────────────

fn skip_sep(input: &mut &str) {
    let _: Result<&str, winnow::error::ErrMode<ContextError>> =
        take_while(0.., |c: char| c.is_whitespace() || c == ',').parse_next(input);
}

fn number(input: &mut &str) -> ModalResult<f64> {
    preceded(
        take_while(0.., |c: char| c.is_whitespace() || c == ','),
        float,
    )
    .parse_next(input)
}

fn point(input: &mut &str) -> ModalResult<Point> {
    let x = number(input)?;
    let y = number(input)?;
    Ok(Point::new(x, y))
}

fn flag(input: &mut &str) -> ModalResult<f64> {
    skip_sep(input);
    take_while(1, |c: char| c == '0' || c == '1')
        .map(|s: &str| if s == "1" { 1.0 } else { 0.0 })
        .parse_next(input)
}

/// Parse SVG path data into the command buffer. Relative commands,
/// `H`/`V` and the smooth `S`/`T` forms are normalized to absolute
/// `L`/`C`/`Q`; arcs are reduced to a line to their endpoint.
pub fn parse_path_data(d: &str) -> Result<PathData, CoreError> {
    let mut input = d;
    let mut data = PathData::new();
    let mut cur = Point::ZERO;
    let mut start = Point::ZERO;
    let mut last_quad: Option<Point> = None;
    let mut last_cubic: Option<Point> = None;
    let mut prev: Option<char> = None;

    let err = |what: &str, rest: &str| {
        CoreError::LoadFailed(format!("bad path data near {:?}: {what}", rest.chars().take(16).collect::<String>()))
    };

    loop {
        skip_sep(&mut input);
        let Some(c) = input.chars().next() else {
            break;
        };
        let letter = if c.is_ascii_alphabetic() {
            input = &input[1..];
            c
        } else {
            match prev {
                Some('M') => 'L',
                Some('m') => 'l',
                Some(p) if !matches!(p, 'Z' | 'z') => p,
                _ => return Err(err("missing command", input)),
            }
        };
        prev = Some(letter);
        let off = if letter.is_ascii_lowercase() {
            cur.to_vec2()
        } else {
            Vec2::ZERO
        };
        let rest = input;
        let bad = |_| err("missing coordinates", rest);

        let (quad, cubic) = match letter.to_ascii_uppercase() {
            'M' => {
                let p = point(&mut input).map_err(bad)? + off;
                data.push(PathCmd::MoveTo(p.x, p.y));
                (cur, start) = (p, p);
                (None, None)
            }
            'L' => {
                let p = point(&mut input).map_err(bad)? + off;
                data.push(PathCmd::LineTo(p.x, p.y));
                cur = p;
                (None, None)
            }
            'H' => {
                let x = number(&mut input).map_err(bad)? + off.x;
                data.push(PathCmd::LineTo(x, cur.y));
                cur.x = x;
                (None, None)
            }
            'V' => {
                let y = number(&mut input).map_err(bad)? + off.y;
                data.push(PathCmd::LineTo(cur.x, y));
                cur.y = y;
                (None, None)
            }
            'Q' | 'T' => {
                let c1 = if letter.eq_ignore_ascii_case(&'Q') {
                    point(&mut input).map_err(bad)? + off
                } else {
                    last_quad.map_or(cur, |q| cur + (cur - q))
                };
                let p = point(&mut input).map_err(bad)? + off;
                data.push(PathCmd::QuadTo(c1.x, c1.y, p.x, p.y));
                cur = p;
                (Some(c1), None)
            }
            'C' | 'S' => {
                let c1 = if letter.eq_ignore_ascii_case(&'C') {
                    point(&mut input).map_err(bad)? + off
                } else {
                    last_cubic.map_or(cur, |q| cur + (cur - q))
                };
                let c2 = point(&mut input).map_err(bad)? + off;
                let p = point(&mut input).map_err(bad)? + off;
                data.push(PathCmd::CubeTo(c1.x, c1.y, c2.x, c2.y, p.x, p.y));
                cur = p;
                (None, Some(c2))
            }
            'A' => {
                for _ in 0..3 {
                    number(&mut input).map_err(bad)?;
                }
                flag(&mut input).map_err(bad)?;
                flag(&mut input).map_err(bad)?;
                let p = point(&mut input).map_err(bad)? + off;
                log::debug!("arc segment reduced to a line");
                data.push(PathCmd::LineTo(p.x, p.y));
                cur = p;
                (None, None)
            }
            'Z' => {
                data.push(PathCmd::Close);
                cur = start;
                (None, None)
            }
            _ => return Err(err("unknown command", rest)),
        };
        (last_quad, last_cubic) = (quad, cubic);
    }

    data.validate()
        .map_err(|e| CoreError::LoadFailed(e.to_string()))?;
    Ok(data)
}

/// Parse an SVG `transform` list into a single affine.
pub fn parse_transform(s: &str) -> Result<Affine, CoreError> {
    let mut input = s;
    let mut xf = Affine::IDENTITY;
    loop {
        skip_sep(&mut input);
        if input.is_empty() {
            return Ok(xf);
        }
        let item = transform_item
            .parse_next(&mut input)
            .map_err(|e| CoreError::LoadFailed(format!("bad transform {s:?}: {e}")))?;
        xf *= item;
    }
}

fn transform_item(input: &mut &str) -> ModalResult<Affine> {
    let name: &str = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    skip_sep(input);
    '('.parse_next(input)?;
    let args: Vec<f64> = repeat(0.., number).parse_next(input)?;
    skip_sep(input);
    ')'.parse_next(input)?;

    let arg = |i: usize, default: f64| args.get(i).copied().unwrap_or(default);
    let xf = match (name, args.len()) {
        ("matrix", 6) => Affine::new([args[0], args[1], args[2], args[3], args[4], args[5]]),
        ("translate", 1 | 2) => Affine::translate((arg(0, 0.0), arg(1, 0.0))),
        ("scale", 1) => Affine::scale(args[0]),
        ("scale", 2) => Affine::scale_non_uniform(args[0], args[1]),
        ("rotate", 1 | 3) => {
            let about = Vec2::new(arg(1, 0.0), arg(2, 0.0));
            Affine::translate(about) * Affine::rotate(args[0].to_radians()) * Affine::translate(-about)
        }
        ("skewX", 1) => Affine::skew(args[0].to_radians().tan(), 0.0),
        ("skewY", 1) => Affine::skew(0.0, args[0].to_radians().tan()),
        _ => return Err(winnow::error::ErrMode::Cut(ContextError::new())),
    };
    Ok(xf)
}
