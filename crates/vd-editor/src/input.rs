//! Input events.
//!
//! Positions are screen pixels. Modifier flags are captured with every
//! event; the selection mode is derived from them.

use kurbo::{Point, Vec2};

/// Modifier keys held during an event. `ctrl` also covers Cmd.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };
    pub const ALT: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: true,
    };

    /// Selection behavior of a click with these modifiers.
    pub fn select_mode(self) -> SelectMode {
        if self.shift {
            SelectMode::ExtendContinuous
        } else if self.ctrl {
            SelectMode::ExtendOne
        } else {
            SelectMode::SelectOne
        }
    }
}

/// How a click changes the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Replace the selection with the clicked node.
    SelectOne,
    /// Shift-click: toggle the clicked node, keeping the rest.
    ExtendContinuous,
    /// Ctrl-click: same toggle.
    ExtendOne,
    Unselect,
    /// Like `SelectOne` but leaves the recents window alone.
    SelectQuiet,
    /// Like `Unselect` but leaves the recents window alone.
    UnselectQuiet,
}

impl SelectMode {
    pub fn is_quiet(self) -> bool {
        matches!(self, SelectMode::SelectQuiet | SelectMode::UnselectQuiet)
    }

    pub fn is_extend(self) -> bool {
        matches!(self, SelectMode::ExtendContinuous | SelectMode::ExtendOne)
    }
}

/// Pointer state carried by every pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub pos: Point,
    pub mods: Modifiers,
    /// Motion since the previous event of the same gesture.
    pub prev_delta: Vec2,
}

impl Pointer {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            pos: Point::new(x, y),
            mods: Modifiers::NONE,
            prev_delta: Vec2::ZERO,
        }
    }

    pub fn with_mods(mut self, mods: Modifiers) -> Self {
        self.mods = mods;
        self
    }

    pub fn with_delta(mut self, delta: Vec2) -> Self {
        self.prev_delta = delta;
        self
    }

    pub fn select_mode(&self) -> SelectMode {
        self.mods.select_mode()
    }
}

/// An input event routed to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseDown(Pointer),
    MouseUp(Pointer),
    SlideStart(Pointer),
    SlideMove(Pointer),
    SlideStop(Pointer),
    /// Wheel or trackpad scroll; `delta` is in pixels.
    Scroll { pointer: Pointer, delta: Vec2 },
    MouseEnter(Pointer),
    MouseLeave(Pointer),
    DoubleClick(Pointer),
    /// A key chord such as `Control+z` (see `Keymap::chord`).
    KeyChord(String),
}

impl InputEvent {
    pub fn pointer(&self) -> Option<&Pointer> {
        match self {
            InputEvent::MouseDown(p)
            | InputEvent::MouseUp(p)
            | InputEvent::SlideStart(p)
            | InputEvent::SlideMove(p)
            | InputEvent::SlideStop(p)
            | InputEvent::MouseEnter(p)
            | InputEvent::MouseLeave(p)
            | InputEvent::DoubleClick(p) => Some(p),
            InputEvent::Scroll { pointer, .. } => Some(pointer),
            InputEvent::KeyChord(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_pick_select_mode() {
        assert_eq!(Modifiers::NONE.select_mode(), SelectMode::SelectOne);
        assert_eq!(Modifiers::SHIFT.select_mode(), SelectMode::ExtendContinuous);
        assert_eq!(Modifiers::CTRL.select_mode(), SelectMode::ExtendOne);
        assert!(SelectMode::SelectQuiet.is_quiet());
        assert!(!SelectMode::SelectOne.is_extend());
    }
}
