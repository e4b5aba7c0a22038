//! A loaded document: the scene graph plus the editor's own metadata
//! (`sodipodi:namedview` with its `inkscape:grid` child).

use crate::bbox::recompute_bboxes;
use crate::emitter::{emit_lines, emit_svg};
use crate::error::CoreError;
use crate::model::SceneGraph;
use crate::parser::parse_svg;
use kurbo::Affine;
use std::path::{Path, PathBuf};

/// Grid settings stored in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub spacing: f64,
    pub units: String,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            spacing: 12.0,
            units: "px".to_string(),
        }
    }
}

/// Editor view state persisted as SVG metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedView {
    /// Document point shown at the screen origin.
    pub cx: f64,
    pub cy: f64,
    pub zoom: f64,
    /// Id of the layer new elements go into.
    pub current_layer: Option<String>,
    pub units: String,
    pub grid: Option<GridSpec>,
}

impl Default for NamedView {
    fn default() -> Self {
        Self {
            cx: 0.0,
            cy: 0.0,
            zoom: 1.0,
            current_layer: None,
            units: "px".to_string(),
            grid: None,
        }
    }
}

impl NamedView {
    /// Document → screen mapping: `screen = zoom · (p − (cx, cy))`.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom) * Affine::translate((-self.cx, -self.cy))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub graph: SceneGraph,
    pub view: NamedView,
    /// Where the document was loaded from / last saved to.
    pub path: Option<PathBuf>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse SVG text. On failure nothing is constructed.
    pub fn from_svg(text: &str) -> Result<Self, CoreError> {
        let (graph, view) = parse_svg(text)?;
        let mut doc = Self {
            graph,
            view: view.unwrap_or_default(),
            path: None,
        };
        doc.sync_view();
        Ok(doc)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::LoadFailed(format!("{}: {e}", path.display())))?;
        let mut doc = Self::from_svg(&text)?;
        doc.path = Some(path.to_path_buf());
        log::debug!("loaded {} ({} nodes)", path.display(), doc.graph.len());
        Ok(doc)
    }

    pub fn save(&mut self, path: &Path) -> Result<(), CoreError> {
        std::fs::write(path, self.to_svg()).map_err(|source| CoreError::SaveFailed {
            path: path.to_path_buf(),
            source,
        })?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn to_svg(&self) -> String {
        emit_svg(&self.graph, Some(&self.view))
    }

    /// Line-partitioned serialization used as undo state.
    pub fn lines(&self) -> Vec<String> {
        emit_lines(&self.graph, Some(&self.view))
    }

    /// Replace the scene with a previously serialized state. The view
    /// (pan, zoom) stays as it is. On error the current scene is kept.
    pub fn restore_lines(&mut self, lines: &[String]) -> Result<(), CoreError> {
        let (graph, view) = parse_svg(&lines.join("\n"))?;
        self.graph = graph;
        if let Some(restored) = view {
            self.view.current_layer = restored.current_layer;
        }
        self.sync_view();
        Ok(())
    }

    /// Push the namedview pan/zoom into the graph and refresh bboxes.
    pub fn sync_view(&mut self) {
        self.graph.view = self.view.transform();
        recompute_bboxes(&mut self.graph);
    }

    /// Grid spacing stored in the document, if any.
    pub fn grid_spacing(&self) -> Option<f64> {
        self.view.grid.as_ref().map(|g| g.spacing)
    }
}
