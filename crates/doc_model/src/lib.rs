//! Document Model - paragraphs with embedded formulas and positions into them
//!
//! This crate provides the document the editor works on: paragraphs of
//! characters and math insets, the nested position model used by cursors,
//! bidi analysis for visual movement, the undo contract, settings and the
//! whole-document update passes.

mod bidi;
mod cursor_slice;
mod dociterator;
mod document;
mod error;
mod paragraph;
pub mod settings;
pub mod undo;
pub mod update;

pub use bidi::*;
pub use cursor_slice::*;
pub use dociterator::*;
pub use document::*;
pub use error::*;
pub use paragraph::*;
pub use settings::{CursorSettings, EditorSettings, MacroEditStyle, MathSettings};
pub use undo::{NoUndo, SnapshotUndo, UndoKind, UndoRange, UndoRecorder, UndoStep};
