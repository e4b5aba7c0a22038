//! Error types surfaced by the core.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The document could not be parsed; the caller keeps its previous state.
    #[error("failed to load document: {0}")]
    LoadFailed(String),

    #[error("failed to save {path}: {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path command buffer is malformed.
    #[error("invalid path data: {0}")]
    InvalidPath(String),
}
