use crate::state::Action;
use thiserror::Error;
use vd_core::{CoreError, NodeId};

/// Failures surfaced by editing operations.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("nothing selected")]
    NoSelection,

    #[error("no active path")]
    NoActivePath,

    #[error("`{0}` is already in progress")]
    ActionBusy(Action),

    #[error("no more to undo")]
    UndoEmpty,

    #[error("no more to redo")]
    RedoEmpty,

    #[error("`{0}` is not a layer")]
    NotALayer(NodeId),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EditError {
    /// Conditions that only show on the status line: the operation had
    /// nothing to work on.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            EditError::NoSelection | EditError::NoActivePath | EditError::UndoEmpty | EditError::RedoEmpty
        )
    }
}
