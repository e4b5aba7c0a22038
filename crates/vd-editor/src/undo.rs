//! Snapshot undo/redo stack.
//!
//! Each record holds the document state *before* its action ran, as the
//! line-partitioned SVG text. `cursor` counts the actions currently
//! applied. Undoing from the top first needs the present state on the
//! stack so it can be redone; that is what `save_undo_start` records.

/// One saved state.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoRecord {
    /// Action label, e.g. `Move`.
    pub label: String,
    /// Free-form action payload (node names, property values).
    pub data: String,
    pub state: Vec<String>,
}

/// Result of an undo or redo: the action it concerns and the state to
/// restore.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoStep<'a> {
    pub label: &'a str,
    pub data: &'a str,
    pub state: &'a [String],
}

#[derive(Debug, Clone)]
pub struct UndoStack {
    records: Vec<UndoRecord>,
    cursor: usize,
    max_depth: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            records: Vec::new(),
            cursor: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Push the pre-action state of a new action. Any redo tail is dropped.
    pub fn save(&mut self, label: &str, data: &str, state: Vec<String>) {
        self.records.truncate(self.cursor);
        self.records.push(UndoRecord {
            label: label.to_string(),
            data: data.to_string(),
            state,
        });
        self.cursor = self.records.len();
        self.trim();
        log::debug!("undo save {label:?} ({} records)", self.records.len());
    }

    /// Replace the top record, for continuous edits where only one undo
    /// step should result. Pushes when the stack is empty.
    pub fn save_replace(&mut self, label: &str, data: &str, state: Vec<String>) {
        self.records.truncate(self.cursor);
        match self.records.last_mut() {
            Some(top) => {
                *top = UndoRecord {
                    label: label.to_string(),
                    data: data.to_string(),
                    state,
                };
            }
            None => self.save(label, data, state),
        }
    }

    /// Whether the present state must be recorded before the next undo.
    pub fn must_save_undo_start(&self) -> bool {
        self.cursor > 0 && self.cursor == self.records.len()
    }

    /// Record the present state on top without moving the cursor, so a
    /// later redo can return to it.
    pub fn save_undo_start(&mut self, state: Vec<String>) {
        let label = self
            .records
            .last()
            .map(|r| r.label.clone())
            .unwrap_or_default();
        self.records.push(UndoRecord {
            label,
            data: String::new(),
            state,
        });
    }

    /// Step back one action. `None` when there is nothing left to undo.
    pub fn undo(&mut self) -> Option<UndoStep<'_>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let rec = &self.records[self.cursor];
        log::debug!("undo {:?}", rec.label);
        Some(UndoStep {
            label: &rec.label,
            data: &rec.data,
            state: &rec.state,
        })
    }

    /// Step forward one action. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<UndoStep<'_>> {
        if self.cursor + 1 >= self.records.len() {
            return None;
        }
        let done = &self.records[self.cursor];
        self.cursor += 1;
        let rec = &self.records[self.cursor];
        log::debug!("redo {:?}", done.label);
        Some(UndoStep {
            label: &done.label,
            data: &done.data,
            state: &rec.state,
        })
    }

    /// Drop the record of an action that was abandoned before it changed
    /// anything. Only the newest record can be discarded.
    pub fn discard_last(&mut self) -> Option<UndoRecord> {
        if self.cursor == 0 || self.cursor != self.records.len() {
            return None;
        }
        self.cursor -= 1;
        self.records.pop()
    }

    /// State saved by the newest record, if any.
    pub fn last_state(&self) -> Option<&[String]> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
            .map(|r| r.state.as_slice())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.records.len()
    }

    /// Number of actions that can be undone.
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.cursor = 0;
    }

    fn trim(&mut self) {
        if self.records.len() > self.max_depth {
            let excess = self.records.len() - self.max_depth;
            self.records.drain(..excess);
            self.cursor -= excess;
        }
    }
}
