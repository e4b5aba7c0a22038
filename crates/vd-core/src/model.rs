//! Core scene-graph data model for VD documents.
//!
//! The document is a tree of `SceneNode`s stored in a petgraph
//! `StableDiGraph`; edges go from parent → child. Child order is paint order
//! and is kept explicitly per parent, since adjacency order in petgraph is
//! not preserved across removals.

use crate::id::NodeId;
use crate::path::PathData;
use crate::shape::NodeGeom;
use kurbo::{Affine, Rect};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
pub fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB` or `#RRGGBB`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let channel = |hi: u8, lo: u8| -> Option<f32> {
            Some((hex_val(hi)? << 4 | hex_val(lo)?) as f32 / 255.0)
        };
        match bytes.len() {
            3 => Some(Self::rgba(
                channel(bytes[0], bytes[0])?,
                channel(bytes[1], bytes[1])?,
                channel(bytes[2], bytes[2])?,
                1.0,
            )),
            6 => Some(Self::rgba(
                channel(bytes[0], bytes[1])?,
                channel(bytes[2], bytes[3])?,
                channel(bytes[4], bytes[5])?,
                1.0,
            )),
            _ => None,
        }
    }

    /// Parse an SVG paint color: hex, `rgb(r,g,b)` or a basic keyword.
    /// Returns `None` for `none`, urls and anything unrecognised.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        if let Some(inner) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            let mut parts = inner.split(',').map(|p| p.trim().parse::<f32>().ok());
            let r = parts.next()??;
            let g = parts.next()??;
            let b = parts.next()??;
            return Some(Self::rgba(r / 255.0, g / 255.0, b / 255.0, 1.0));
        }
        let rgb = match s {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "blue" => (0, 0, 255),
            "yellow" => (255, 255, 0),
            "gray" | "grey" => (128, 128, 128),
            "orange" => (255, 165, 0),
            _ => return None,
        };
        Some(Self::rgba(
            rgb.0 as f32 / 255.0,
            rgb.1 as f32 / 255.0,
            rgb.2 as f32 / 255.0,
            1.0,
        ))
    }

    /// Emit as `#rrggbb`. Alpha is carried separately by `*-opacity`.
    pub fn to_hex(&self) -> String {
        let ch = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", ch(self.r), ch(self.g), ch(self.b))
    }
}

/// A gradient stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f64, // 0.0 .. 1.0
    pub color: Color,
}

// ─── Paint references ────────────────────────────────────────────────────

/// Properties that may hold a `url(#id)` reference to a definition.
pub const PAINT_PROPS: [&str; 2] = ["fill", "stroke"];

/// Extract the id of a `url(#id)` paint value.
pub fn paint_url(value: &str) -> Option<NodeId> {
    let inner = value.trim().strip_prefix("url(")?.strip_suffix(')')?;
    let id = inner.trim().trim_matches(|c| c == '"' || c == '\'');
    let id = id.strip_prefix('#')?;
    (!id.is_empty()).then(|| NodeId::intern(id))
}

pub fn url_of(id: NodeId) -> String {
    format!("url(#{id})")
}

// ─── Style declarations ──────────────────────────────────────────────────

/// Look up `key` in a `style="a:b;c:d"` declaration list.
pub fn style_get<'a>(style: &'a str, key: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// Set `key` in a declaration list, preserving the order of the others.
pub fn style_set(style: &str, key: &str, value: &str) -> String {
    let mut found = false;
    let mut decls: Vec<String> = style
        .split(';')
        .filter(|d| !d.trim().is_empty())
        .map(|decl| match decl.split_once(':') {
            Some((k, _)) if k.trim() == key => {
                found = true;
                format!("{key}:{value}")
            }
            _ => decl.trim().to_string(),
        })
        .collect();
    if !found {
        decls.push(format!("{key}:{value}"));
    }
    decls.join(";")
}

pub fn style_remove(style: &str, key: &str) -> String {
    style
        .split(';')
        .filter(|d| !d.trim().is_empty())
        .filter(|decl| decl.split_once(':').is_none_or(|(k, _)| k.trim() != key))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(";")
}

// ─── Scene Graph Nodes ───────────────────────────────────────────────────

/// The node kinds in the scene tree. Layers are `Group`s with the
/// `groupmode=layer` property.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The document element.
    Root,

    Group,

    /// Definitions container (gradients, markers). Never rendered or hit.
    Defs,

    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },

    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },

    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },

    Path {
        data: PathData,
    },

    /// Text run. Child `Text` nodes are spans.
    Text {
        x: f64,
        y: f64,
        text: String,
    },

    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    /// Editor metadata and any other element carried through untouched.
    MetaData {
        tag: String,
    },

    /// Gradient definition (lives under `Defs`).
    Gradient {
        radial: bool,
        stops: Vec<GradientStop>,
    },
}

impl NodeKind {
    /// Prefix used when generating ids for this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Root => "svg",
            NodeKind::Group => "g",
            NodeKind::Defs => "defs",
            NodeKind::Rect { .. } => "rect",
            NodeKind::Ellipse { .. } => "ellipse",
            NodeKind::Circle { .. } => "circle",
            NodeKind::Line { .. } => "line",
            NodeKind::Path { .. } => "path",
            NodeKind::Text { .. } => "text",
            NodeKind::Image { .. } => "image",
            NodeKind::MetaData { .. } => "meta",
            NodeKind::Gradient { radial: false, .. } => "linearGradient",
            NodeKind::Gradient { radial: true, .. } => "radialGradient",
        }
    }

    /// Drawable leaf geometry (everything hit testing can return).
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            NodeKind::Rect { .. }
                | NodeKind::Ellipse { .. }
                | NodeKind::Circle { .. }
                | NodeKind::Line { .. }
                | NodeKind::Path { .. }
                | NodeKind::Text { .. }
                | NodeKind::Image { .. }
        )
    }

    /// Non-visual kinds that bbox computation and hit testing skip.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            NodeKind::Defs | NodeKind::MetaData { .. } | NodeKind::Gradient { .. }
        )
    }
}

/// A single node in the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// The SVG `id`. Unique across the graph.
    pub id: NodeId,

    /// Human-readable name (`inkscape:label`); empty when unset.
    pub name: String,

    pub kind: NodeKind,

    /// Every other attribute, including the raw `style` declaration list.
    pub props: BTreeMap<String, String>,

    /// Local transform, applied before all ancestor transforms.
    pub transform: Affine,

    /// Cached world-space bounding box in whole screen pixels.
    /// Refreshed by `recompute_bboxes`.
    pub bbox: Rect,
}

impl SceneNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            props: BTreeMap::new(),
            transform: Affine::IDENTITY,
            bbox: Rect::ZERO,
        }
    }

    pub fn with_prop(mut self, key: &str, value: &str) -> Self {
        self.props.insert(key.to_string(), value.to_string());
        self
    }

    /// Effective value of a presentation property: the `style` declaration
    /// wins over a plain attribute of the same name.
    pub fn prop(&self, key: &str) -> Option<&str> {
        if key != "style"
            && let Some(v) = self.props.get("style").and_then(|s| style_get(s, key))
        {
            return Some(v);
        }
        self.props.get(key).map(String::as_str)
    }

    /// Set a property where it currently lives (style declaration or
    /// attribute); new properties become attributes.
    pub fn set_prop(&mut self, key: &str, value: &str) {
        if let Some(style) = self.props.get_mut("style")
            && style_get(style, key).is_some()
        {
            *style = style_set(style, key, value);
            return;
        }
        self.props.insert(key.to_string(), value.to_string());
    }

    /// Remove a property from both the style list and the attributes.
    pub fn remove_prop(&mut self, key: &str) {
        if let Some(style) = self.props.get_mut("style") {
            *style = style_remove(style, key);
            if style.is_empty() {
                self.props.remove("style");
            }
        }
        self.props.remove(key);
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }

    pub fn is_layer(&self) -> bool {
        self.is_group() && self.props.get("groupmode").is_some_and(|m| m == "layer")
    }

    /// Definitions this node refers to through its paint properties or an
    /// `href` to another gradient.
    pub fn paint_refs(&self) -> SmallVec<[NodeId; 2]> {
        let mut refs: SmallVec<[NodeId; 2]> = PAINT_PROPS
            .iter()
            .filter_map(|k| self.prop(k).and_then(paint_url))
            .collect();
        if let Some(href) = self.props.get("href").and_then(|h| h.strip_prefix('#')) {
            refs.push(NodeId::intern(href));
        }
        refs
    }
}

/// Detached copy of a node and its descendants.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    pub node: SceneNode,
    pub children: Vec<Subtree>,
}

/// Visitor result for `SceneGraph::walk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into this node's children.
    SkipChildren,
    /// Stop the walk entirely.
    Break,
}

// ─── Scene Graph ─────────────────────────────────────────────────────────

/// The complete VD document tree.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    /// The underlying directed graph.
    pub graph: StableDiGraph<SceneNode, ()>,

    /// The root node index.
    pub root: NodeIndex,

    /// Index from NodeId → NodeIndex for fast lookup.
    pub id_index: HashMap<NodeId, NodeIndex>,

    /// Document → screen pixel mapping (pan and zoom). The outermost factor
    /// of every world transform.
    pub view: Affine,

    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    next_id: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a new empty scene graph with a root node.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = NodeId::intern("root");
        let root = graph.add_node(SceneNode::new(root_id, NodeKind::Root));

        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);

        Self {
            graph,
            root,
            id_index,
            view: Affine::IDENTITY,
            child_order: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() <= 1
    }

    /// Generate an id `<prefix><n>` not yet used in this graph.
    pub fn assign_unique_id(&mut self, prefix: &str) -> NodeId {
        loop {
            let id = NodeId::intern(&format!("{prefix}{}", self.next_id));
            self.next_id += 1;
            if !self.id_index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Append a node as the last child of `parent`, as a loader does.
    /// A clashing id is replaced by a fresh one.
    pub fn add_node(&mut self, parent: NodeIndex, mut node: SceneNode) -> NodeIndex {
        if self.id_index.contains_key(&node.id) {
            let fresh = self.assign_unique_id(node.kind.id_prefix());
            log::warn!("duplicate id {:?}, renamed to {:?}", node.id, fresh);
            node.id = fresh;
        }
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.attach(parent, idx, None);
        self.id_index.insert(id, idx);
        idx
    }

    /// Insert a node under `parent` at child position `at` (append when
    /// `None` or out of range). Enforces id uniqueness and gives the node
    /// its own copy of any gradient it shares with another node.
    pub fn insert(&mut self, parent: NodeIndex, node: SceneNode, at: Option<usize>) -> NodeIndex {
        let idx = self.add_node(parent, node);
        if let Some(at) = at {
            self.detach(idx);
            self.attach(parent, idx, Some(at));
        }
        self.propagate_gradients(idx);
        idx
    }

    /// Remove a node and its whole subtree. Gradients that are no longer
    /// referenced by anything are removed too. The root cannot be removed.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<SceneNode> {
        if idx == self.root || !self.graph.contains_node(idx) {
            return None;
        }
        self.detach(idx);
        let mut doomed = Vec::new();
        self.walk(idx, |i, _| {
            doomed.push(i);
            WalkControl::Continue
        });

        let mut dropped_refs: SmallVec<[NodeId; 4]> = SmallVec::new();
        let mut top = None;
        for &i in doomed.iter().rev() {
            self.child_order.remove(&i);
            if let Some(node) = self.graph.remove_node(i) {
                self.id_index.remove(&node.id);
                dropped_refs.extend(node.paint_refs());
                if i == idx {
                    top = Some(node);
                }
            }
        }
        for gid in dropped_refs {
            self.drop_gradient_if_unused(gid);
        }
        top
    }

    /// Move a node under `new_parent` at position `at`. Refuses to create a
    /// cycle. Returns true when the tree changed.
    pub fn move_node(&mut self, idx: NodeIndex, new_parent: NodeIndex, at: Option<usize>) -> bool {
        if idx == self.root || idx == new_parent || self.is_ancestor_of(idx, new_parent) {
            return false;
        }
        self.detach(idx);
        self.attach(new_parent, idx, at);
        true
    }

    /// Deep copy of a node and its descendants.
    pub fn clone_subtree(&self, idx: NodeIndex) -> Option<Subtree> {
        let node = self.graph.node_weight(idx)?.clone();
        let children = self
            .children(idx)
            .iter()
            .filter_map(|&c| self.clone_subtree(c))
            .collect();
        Some(Subtree { node, children })
    }

    /// Insert a detached subtree; every node goes through `insert`.
    pub fn insert_subtree(&mut self, parent: NodeIndex, tree: Subtree, at: Option<usize>) -> NodeIndex {
        let idx = self.insert(parent, tree.node, at);
        for child in tree.children {
            self.insert_subtree(idx, child, None);
        }
        idx
    }

    /// Pre-order walk from `start`. Returns false if the visitor broke out.
    pub fn walk<F>(&self, start: NodeIndex, mut visit: F) -> bool
    where
        F: FnMut(NodeIndex, &SceneNode) -> WalkControl,
    {
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.graph.node_weight(idx) else {
                continue;
            };
            match visit(idx, node) {
                WalkControl::Break => return false,
                WalkControl::SkipChildren => {}
                WalkControl::Continue => stack.extend(self.children(idx).iter().rev()),
            }
        }
        true
    }

    /// First node in document order whose name (label) or id matches.
    pub fn find_by_name(&self, name: &str) -> Option<NodeIndex> {
        let mut found = None;
        self.walk(self.root, |idx, node| {
            if node.name == name || node.id.as_str() == name {
                found = Some(idx);
                WalkControl::Break
            } else {
                WalkControl::Continue
            }
        });
        found
    }

    /// Look up a node by its id.
    pub fn get_by_id(&self, id: NodeId) -> Option<&SceneNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Look up a node mutably by its id.
    pub fn get_by_id_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.id_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    /// Get the index for a NodeId.
    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    /// Get the parent index of a node.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Children in paint order (back to front).
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of a node among its siblings.
    pub fn child_position(&self, idx: NodeIndex) -> Option<usize> {
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&c| c == idx)
    }

    /// Ancestors from the parent up to and including the root.
    pub fn ancestors(&self, idx: NodeIndex) -> SmallVec<[NodeIndex; 8]> {
        let mut out = SmallVec::new();
        let mut cur = self.parent(idx);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeIndex, node: NodeIndex) -> bool {
        self.ancestors(node).contains(&ancestor)
    }

    pub fn depth(&self, idx: NodeIndex) -> usize {
        self.ancestors(idx).len()
    }

    /// Composition of the view, every ancestor transform and the node's own.
    pub fn world_transform(&self, idx: NodeIndex) -> Affine {
        self.parent_world_transform(idx) * self.graph[idx].transform
    }

    /// World transform of the node's parent frame (the view for the root).
    pub fn parent_world_transform(&self, idx: NodeIndex) -> Affine {
        self.ancestors(idx)
            .iter()
            .rev()
            .fold(self.view, |acc, &a| acc * self.graph[a].transform)
    }

    /// Apply a world-space delta transform `d` to a node. The delta is
    /// conjugated into the node's geometry space and folded into the
    /// geometry where the kind allows it, else into the local transform.
    pub fn apply_delta(&mut self, idx: NodeIndex, d: Affine) {
        let frame = self.world_transform(idx);
        if frame.determinant().abs() < 1e-12 {
            log::warn!("skipping delta on {:?}: degenerate transform", self.graph[idx].id);
            return;
        }
        let m = frame.inverse() * d * frame;
        let has_children = !self.children(idx).is_empty();
        let node = &mut self.graph[idx];
        if has_children && !node.is_group() {
            node.transform *= m;
        } else {
            node.apply_delta(m);
        }
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    /// Move a node one step toward the back. Returns true if changed.
    pub fn send_backward(&mut self, child: NodeIndex) -> bool {
        self.reorder(child, |pos, _| pos.checked_sub(1))
    }

    /// Move a node one step toward the front. Returns true if changed.
    pub fn bring_forward(&mut self, child: NodeIndex) -> bool {
        self.reorder(child, |pos, len| (pos + 1 < len).then_some(pos + 1))
    }

    /// Move a node behind all of its siblings.
    pub fn send_to_back(&mut self, child: NodeIndex) -> bool {
        self.reorder(child, |pos, _| (pos > 0).then_some(0))
    }

    /// Move a node in front of all of its siblings.
    pub fn bring_to_front(&mut self, child: NodeIndex) -> bool {
        self.reorder(child, |pos, len| (pos + 1 < len).then_some(len - 1))
    }

    fn reorder(&mut self, child: NodeIndex, target: impl Fn(usize, usize) -> Option<usize>) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        let Some(order) = self.child_order.get_mut(&parent) else {
            return false;
        };
        let Some(pos) = order.iter().position(|&c| c == child) else {
            return false;
        };
        let Some(to) = target(pos, order.len()) else {
            return false;
        };
        let c = order.remove(pos);
        order.insert(to, c);
        true
    }

    // ─── Gradients ───────────────────────────────────────────────────────

    /// The `Defs` child of the root, created on demand as the first child.
    pub fn defs(&mut self) -> NodeIndex {
        if let Some(&d) = self
            .children(self.root)
            .iter()
            .find(|&&c| matches!(self.graph[c].kind, NodeKind::Defs))
        {
            return d;
        }
        let id = self.assign_unique_id("defs");
        let idx = self.graph.add_node(SceneNode::new(id, NodeKind::Defs));
        self.id_index.insert(id, idx);
        self.attach(self.root, idx, Some(0));
        idx
    }

    /// Number of nodes referring to definition `id`.
    pub fn ref_count(&self, id: NodeId) -> usize {
        self.graph
            .node_indices()
            .filter(|&i| self.graph[i].paint_refs().contains(&id))
            .count()
    }

    /// Clone gradient `gid` into `Defs` under a fresh id.
    pub fn clone_gradient(&mut self, gid: NodeId) -> Option<NodeId> {
        let src = self.get_by_id(gid)?;
        if !matches!(src.kind, NodeKind::Gradient { .. }) {
            return None;
        }
        let mut copy = src.clone();
        copy.id = self.assign_unique_id(copy.kind.id_prefix());
        let new_id = copy.id;
        let defs = self.defs();
        self.add_node(defs, copy);
        Some(new_id)
    }

    /// Give a freshly inserted node private copies of gradients it shares.
    fn propagate_gradients(&mut self, idx: NodeIndex) {
        for key in PAINT_PROPS {
            let Some(gid) = self.graph[idx].prop(key).and_then(paint_url) else {
                continue;
            };
            if self.ref_count(gid) < 2 {
                continue;
            }
            if let Some(new_id) = self.clone_gradient(gid) {
                log::trace!("{:?}: {key} gradient {gid:?} cloned as {new_id:?}", self.graph[idx].id);
                self.graph[idx].set_prop(key, &url_of(new_id));
            }
        }
    }

    /// Remove gradient `gid` once nothing refers to it.
    pub fn drop_gradient_if_unused(&mut self, gid: NodeId) {
        let Some(gidx) = self.index_of(gid) else {
            return;
        };
        if matches!(self.graph[gidx].kind, NodeKind::Gradient { .. }) && self.ref_count(gid) == 0 {
            log::trace!("dropping unreferenced gradient {gid:?}");
            self.remove(gidx);
        }
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    fn attach(&mut self, parent: NodeIndex, child: NodeIndex, at: Option<usize>) {
        self.graph.add_edge(parent, child, ());
        let order = self.child_order.entry(parent).or_default();
        match at {
            Some(at) if at < order.len() => order.insert(at, child),
            _ => order.push(child),
        }
    }

    fn detach(&mut self, child: NodeIndex) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
        if let Some(order) = self.child_order.get_mut(&parent) {
            order.retain(|&c| c != child);
        }
    }
}
