//! Application settings: one read-mostly record, loaded once at startup.

use crate::error::EditError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Editor-wide configuration. Every field has a default, so a settings
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Snap dragged boxes and points to the grid.
    pub snap_grid: bool,
    /// Snap to the edges and centers of other objects.
    pub snap_guide: bool,
    /// Snap path nodes to the other nodes of the path.
    pub snap_nodes: bool,
    /// Pixel distance within which two clicks count as the same spot.
    pub snap_tol: f64,
    /// Pixel distance within which a candidate replaces the raw value.
    pub snap_zone: f64,
    /// Grid spacing in document units, unless the document sets its own.
    pub grid_spacing: f64,
    pub show_grid: bool,
    /// Side of a shape created by a click without drag.
    pub new_shape_size: f64,
    pub stroke_width: f64,
    /// Offset of a path node appended with nothing selected.
    pub append_offset: f64,
    pub undo_depth: usize,
    /// Executable used for PNG and PDF export.
    pub export_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snap_grid: true,
            snap_guide: true,
            snap_nodes: true,
            snap_tol: 3.0,
            snap_zone: 5.0,
            grid_spacing: 12.0,
            show_grid: true,
            new_shape_size: 50.0,
            stroke_width: 1.0,
            append_offset: 20.0,
            undo_depth: 100,
            export_command: "inkscape".to_string(),
        }
    }
}

impl Settings {
    /// Settings with every kind of snapping turned off.
    pub fn without_snapping() -> Self {
        Self {
            snap_grid: false,
            snap_guide: false,
            snap_nodes: false,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, EditError> {
        let settings: Settings =
            serde_json::from_str(text).map_err(|e| EditError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, EditError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EditError::Settings(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), EditError> {
        if self.grid_spacing <= 0.0 {
            return Err(EditError::Settings(format!(
                "grid_spacing must be positive, got {}",
                self.grid_spacing
            )));
        }
        if self.snap_tol < 0.0 || self.snap_zone < 0.0 {
            return Err(EditError::Settings("snap distances must not be negative".into()));
        }
        Ok(())
    }
}
