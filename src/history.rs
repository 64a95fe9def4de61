//! Snapshot-based undo/redo
//!
//! A bounded linear stack of full [`OverlayState`] copies with a cursor.
//! Snapshots are shared via `Arc` so restoring hands back a fresh clone and
//! the stored copy can never be mutated through the live state.

use std::sync::Arc;

use crate::model::OverlayState;

/// Default number of retained snapshots
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Arc<OverlayState>>,
    /// Index of the snapshot matching the live state
    cursor: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record `state` as the newest entry, discarding any redo branch.
    ///
    /// A state equal to the current entry is not recorded again. Returns
    /// whether a snapshot was appended.
    pub fn push(&mut self, state: &OverlayState) -> bool {
        if self.current().is_some_and(|c| c == state) {
            return false;
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(Arc::new(state.clone()));
        if self.snapshots.len() > self.limit {
            let excess = self.snapshots.len() - self.limit;
            self.snapshots.drain(..excess);
        }
        self.cursor = self.snapshots.len() - 1;
        tracing::trace!(cursor = self.cursor, depth = self.snapshots.len(), "History snapshot");
        true
    }

    /// Step back one entry and return the state to restore
    pub fn undo(&mut self) -> Option<OverlayState> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        tracing::debug!(cursor = self.cursor, "Undo");
        self.current().cloned()
    }

    /// Step forward one entry and return the state to restore
    pub fn redo(&mut self) -> Option<OverlayState> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        tracing::debug!(cursor = self.cursor, "Redo");
        self.current().cloned()
    }

    /// Step back onto the previous entry when `state` equals it, dropping
    /// the current entry and any redo branch. Returns whether it rewound.
    pub fn rewind_to(&mut self, state: &OverlayState) -> bool {
        if self.cursor == 0 || self.snapshots[self.cursor - 1].as_ref() != state {
            return false;
        }
        self.snapshots.truncate(self.cursor);
        self.cursor -= 1;
        tracing::trace!(cursor = self.cursor, "History rewound");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn current(&self) -> Option<&OverlayState> {
        self.snapshots.get(self.cursor).map(Arc::as_ref)
    }

    /// Restart from a single baseline snapshot
    pub fn reset(&mut self, state: &OverlayState) {
        self.clear();
        self.push(state);
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Point;
    use crate::model::{Color, ElementId, TextStyle};

    fn with_note(state: &OverlayState, text: &str) -> (OverlayState, ElementId) {
        let mut next = state.clone();
        let id = next.add_free_text(1, Point::new(1.0, 1.0), TextStyle::new("Arial", 14.0, Color::BLACK));
        next.set_text(id, text);
        (next, id)
    }

    #[test]
    fn test_undo_redo_inverse() {
        let base = OverlayState::new();
        let mut history = History::default();
        history.push(&base);

        let (applied, _) = with_note(&base, "a");
        history.push(&applied);

        assert_eq!(history.undo().unwrap(), base);
        assert_eq!(history.redo().unwrap(), applied);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_new_edit_truncates_redo() {
        let base = OverlayState::new();
        let mut history = History::default();
        history.push(&base);
        let (first, _) = with_note(&base, "first");
        history.push(&first);

        history.undo();
        let (second, _) = with_note(&base, "second");
        history.push(&second);

        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo().unwrap(), base);
    }

    #[test]
    fn test_identical_state_is_not_recorded() {
        let base = OverlayState::new();
        let mut history = History::default();
        assert!(history.push(&base));
        assert!(!history.push(&base));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(3);
        let mut state = OverlayState::new();
        history.push(&state);
        for i in 0..5 {
            state = with_note(&state, &i.to_string()).0;
            history.push(&state);
        }
        assert_eq!(history.len(), 3);
        assert!(history.undo().is_some());
        assert!(history.undo().is_some());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_rewind_drops_abandoned_entry() {
        let base = OverlayState::new();
        let mut history = History::default();
        history.push(&base);
        let (noted, _) = with_note(&base, "n");
        history.push(&noted);

        assert!(!history.rewind_to(&noted));
        assert!(history.rewind_to(&base));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.rewind_to(&base));
    }

    #[test]
    fn test_restored_state_is_independent() {
        let base = OverlayState::new();
        let mut history = History::default();
        history.push(&base);
        let (applied, id) = with_note(&base, "x");
        history.push(&applied);

        let mut restored = history.undo().unwrap();
        restored.add_free_text(2, Point::default(), TextStyle::new("Arial", 9.0, Color::BLACK));
        let redone = history.redo().unwrap();
        assert_eq!(redone.free_texts().len(), 1);
        assert_eq!(redone.free_texts()[0].id, id);
    }
}
