//! Keyboard chord → key function mapping.
//!
//! Chords are written `Control+Shift+z`: modifier names in a fixed order
//! (`Control`, `Alt`, `Shift`), then the key. Letter keys are lowercase.

use crate::input::Modifiers;
use std::collections::HashMap;

/// Editor functions reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFunction {
    /// Cancel the pending gesture and return to the Select tool.
    Abort,
    Undo,
    Redo,
    Delete,
    SelectAll,
    Duplicate,
    Group,
    Ungroup,

    // ── Tools ──
    ToolSelect,
    ToolNode,
    ToolRect,
    ToolEllipse,
    ToolBezier,
    ToolText,

    // ── Z-order ──
    Raise,
    Lower,
    RaiseToTop,
    LowerToBottom,
}

/// Chord table. `Default` carries the standard bindings.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<String, KeyFunction>,
}

impl Default for Keymap {
    fn default() -> Self {
        use KeyFunction::*;
        let table = [
            ("Escape", Abort),
            ("Control+z", Undo),
            ("Control+Shift+z", Redo),
            ("Control+y", Redo),
            ("Delete", Delete),
            ("Backspace", Delete),
            ("Control+a", SelectAll),
            ("Control+d", Duplicate),
            ("Control+g", Group),
            ("Control+Shift+g", Ungroup),
            ("s", ToolSelect),
            ("n", ToolNode),
            ("r", ToolRect),
            ("e", ToolEllipse),
            ("b", ToolBezier),
            ("t", ToolText),
            ("PageUp", Raise),
            ("PageDown", Lower),
            ("Home", RaiseToTop),
            ("End", LowerToBottom),
        ];
        Self {
            bindings: table
                .into_iter()
                .map(|(chord, f)| (chord.to_string(), f))
                .collect(),
        }
    }
}

impl Keymap {
    /// Build the chord string for a key plus modifiers.
    pub fn chord(key: &str, mods: Modifiers) -> String {
        let mut out = String::new();
        if mods.ctrl {
            out.push_str("Control+");
        }
        if mods.alt {
            out.push_str("Alt+");
        }
        if mods.shift {
            out.push_str("Shift+");
        }
        if key.chars().count() == 1 {
            out.push_str(&key.to_lowercase());
        } else {
            out.push_str(key);
        }
        out
    }

    pub fn resolve(&self, chord: &str) -> Option<KeyFunction> {
        self.bindings.get(chord).copied()
    }

    /// Bind `chord`, replacing any previous binding.
    pub fn bind(&mut self, chord: &str, function: KeyFunction) {
        self.bindings.insert(chord.to_string(), function);
    }

    pub fn unbind(&mut self, chord: &str) -> Option<KeyFunction> {
        self.bindings.remove(chord)
    }

    /// All chords bound to `function`, sorted.
    pub fn chords_for(&self, function: KeyFunction) -> Vec<&str> {
        let mut chords: Vec<&str> = self
            .bindings
            .iter()
            .filter(|(_, f)| **f == function)
            .map(|(c, _)| c.as_str())
            .collect();
        chords.sort_unstable();
        chords
    }
}
