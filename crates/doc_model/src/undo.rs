//! Undo contract and a snapshot-based implementation

use crate::dociterator::DocIterator;
use crate::document::Document;
use crate::error::{DocModelError, Result};
use math::AtomId;
use tracing::trace;

/// What kind of change is about to happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Atomic,
    Insert,
    Delete,
}

/// What part of the document is about to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoRange {
    /// Paragraphs `from..=to`
    Paragraphs { from: usize, to: usize },
    /// One math node and everything inside it
    Inset(AtomId),
}

/// Receives undo notifications around every mutating dispatch
pub trait UndoRecorder {
    fn begin_undo_group(&mut self);

    fn end_undo_group(&mut self);

    /// Called before a mutation, with the state it is about to change
    fn record_undo(&mut self, kind: UndoKind, range: UndoRange, doc: &Document, cursor: &DocIterator);
}

/// A recorder that keeps nothing
#[derive(Debug, Default)]
pub struct NoUndo;

impl UndoRecorder for NoUndo {
    fn begin_undo_group(&mut self) {}

    fn end_undo_group(&mut self) {}

    fn record_undo(&mut self, _: UndoKind, _: UndoRange, _: &Document, _: &DocIterator) {}
}

/// A saved document state
#[derive(Debug, Clone)]
pub struct UndoStep {
    pub document: Document,
    pub cursor: DocIterator,
}

/// Undo by whole-document snapshots
///
/// The first `record_undo` of a group saves the document; later records in
/// the same group are covered by that snapshot.
#[derive(Debug)]
pub struct SnapshotUndo {
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    /// Maximum number of undo entries
    max_entries: usize,
    depth: usize,
    group_recorded: bool,
}

impl Default for SnapshotUndo {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotUndo {
    pub fn new() -> Self {
        Self::with_limit(100)
    }

    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
            depth: 0,
            group_recorded: false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Step back; `current` is kept for redo
    pub fn undo(&mut self, current: UndoStep) -> Result<UndoStep> {
        let step = self.undo_stack.pop().ok_or(DocModelError::NothingToUndo)?;
        self.redo_stack.push(current);
        trace!(remaining = self.undo_stack.len(), "undo");
        Ok(step)
    }

    /// Step forward again; `current` goes back on the undo stack
    pub fn redo(&mut self, current: UndoStep) -> Result<UndoStep> {
        let step = self.redo_stack.pop().ok_or(DocModelError::NothingToRedo)?;
        self.undo_stack.push(current);
        Ok(step)
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn push(&mut self, step: UndoStep) {
        self.redo_stack.clear();
        self.undo_stack.push(step);
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }
}

impl UndoRecorder for SnapshotUndo {
    fn begin_undo_group(&mut self) {
        if self.depth == 0 {
            self.group_recorded = false;
        }
        self.depth += 1;
        trace!(depth = self.depth, "begin undo group");
    }

    fn end_undo_group(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced undo group");
        self.depth = self.depth.saturating_sub(1);
        trace!(depth = self.depth, "end undo group");
    }

    fn record_undo(&mut self, kind: UndoKind, range: UndoRange, doc: &Document, cursor: &DocIterator) {
        if self.depth > 0 && self.group_recorded {
            return;
        }
        trace!(?kind, ?range, "record undo");
        self.group_recorded = true;
        self.push(UndoStep {
            document: doc.clone(),
            cursor: cursor.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paragraph::Paragraph;

    fn doc(text: &str) -> Document {
        Document::from_paragraphs(vec![Paragraph::from_text(text)])
    }

    fn step(text: &str) -> UndoStep {
        UndoStep {
            document: doc(text),
            cursor: DocIterator::new(),
        }
    }

    #[test]
    fn test_one_snapshot_per_group() {
        let mut undo = SnapshotUndo::new();
        let range = UndoRange::Paragraphs { from: 0, to: 0 };
        undo.begin_undo_group();
        undo.record_undo(UndoKind::Insert, range, &doc("a"), &DocIterator::new());
        undo.record_undo(UndoKind::Insert, range, &doc("ab"), &DocIterator::new());
        undo.end_undo_group();
        assert_eq!(undo.undo_len(), 1);

        let back = undo.undo(step("abc")).unwrap();
        assert_eq!(back.document.paragraph(0).unwrap().text(), "a");
        assert!(undo.can_redo());
        let again = undo.redo(back).unwrap();
        assert_eq!(again.document.paragraph(0).unwrap().text(), "abc");
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut undo = SnapshotUndo::with_limit(2);
        for text in ["a", "b", "c"] {
            undo.begin_undo_group();
            undo.record_undo(UndoKind::Atomic, UndoRange::Paragraphs { from: 0, to: 0 }, &doc(text), &DocIterator::new());
            undo.end_undo_group();
        }
        assert_eq!(undo.undo_len(), 2);
        let first = undo.undo(step("d")).unwrap();
        assert_eq!(first.document.paragraph(0).unwrap().text(), "c");
    }

    #[test]
    fn test_empty_stacks_error() {
        let mut undo = SnapshotUndo::new();
        assert!(matches!(undo.undo(step("")), Err(DocModelError::NothingToUndo)));
        assert!(matches!(undo.redo(step("")), Err(DocModelError::NothingToRedo)));
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut undo = SnapshotUndo::new();
        undo.record_undo(UndoKind::Atomic, UndoRange::Paragraphs { from: 0, to: 0 }, &doc("a"), &DocIterator::new());
        let _ = undo.undo(step("b")).unwrap();
        assert!(undo.can_redo());
        undo.record_undo(UndoKind::Atomic, UndoRange::Paragraphs { from: 0, to: 0 }, &doc("b"), &DocIterator::new());
        assert!(!undo.can_redo());
    }
}
