pub mod bbox;
pub mod document;
pub mod emitter;
pub mod error;
pub mod geom;
pub mod id;
pub mod layers;
pub mod lint;
pub mod model;
pub mod parser;
pub mod path;
pub mod shape;
pub mod transform;

pub use bbox::{recompute_bboxes, union_cached, world_bbox};
pub use document::{Document, GridSpec, NamedView};
pub use emitter::{emit_lines, emit_svg};
pub use error::CoreError;
pub use geom::BBoxPoint;
pub use id::NodeId;
pub use layers::LayerInfo;
pub use lint::{LintDiagnostic, LintSeverity, lint_document, lint_svg};
pub use model::*;
pub use parser::{parse_path_data, parse_svg, parse_transform};
pub use path::{PathCmd, PathData, PathNode, PathOp, path_nodes};
pub use shape::NodeGeom;
pub use transform::{distribute_all, distribute_props, ungroup, ungroup_singletons};

// Re-export petgraph and kurbo types so downstream crates agree on them
pub use kurbo;
pub use petgraph::graph::NodeIndex;
