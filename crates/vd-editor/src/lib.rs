//! Interactive editing on top of `vd-core`: the tool/action state machine,
//! manipulators, snapping, sprites and snapshot undo.

pub mod align;
pub mod editor;
pub mod error;
pub mod export;
pub mod input;
pub mod layers;
pub mod manip;
pub mod nodes;
pub mod settings;
pub mod shortcuts;
pub mod snap;
pub mod sprites;
pub mod state;
pub mod style;
pub mod tools;
pub mod undo;

pub use align::{AlignAnchor, AlignKind};
pub use editor::{Editor, Notice, Observer, ZOrder};
pub use error::EditError;
pub use export::{ExportFormat, ExportOptions};
pub use input::{InputEvent, Modifiers, Pointer, SelectMode};
pub use settings::Settings;
pub use shortcuts::{KeyFunction, Keymap};
pub use sprites::{SpriteKind, SpriteSub};
pub use state::{Action, EditState};
pub use style::{MarkerColor, MarkerPos, PaintKind};
pub use tools::ToolKind;
pub use undo::UndoStack;
