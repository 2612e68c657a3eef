//! A document with its cursor, undo history and layout cache

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::{DispatchResult, ScreenUpdate};
use crate::func::{FuncCode, FuncRequest};
use crate::Result;
use doc_model::update;
use doc_model::{
    BufferParams, DocIterator, Document, EditorSettings, SnapshotUndo, UndoKind, UndoRange, UndoRecorder, UndoStep,
};
use math::cas::CasRunner;
use math::{CoordCache, FixedFontMetrics, FontInfo, FontMetrics, Point, RecordingPainter};
use tracing::{debug, info};

/// The editing engine for one buffer
///
/// Every dispatch runs against the cursor. A request that changes the
/// document is recorded as one undo step, and the document is updated and
/// redrawn so that vertical movement sees fresh geometry.
pub struct BufferView {
    document: Document,
    cursor: Cursor,
    coords: CoordCache,
    undo: SnapshotUndo,
    settings: EditorSettings,
    metrics: Box<dyn FontMetrics>,
    font: FontInfo,
    cas: Option<Box<dyn CasRunner>>,
    clipboard: String,
    /// Text primitives of the last draw
    painted: Vec<String>,
}

impl BufferView {
    /// Create a view on an empty document
    pub fn new(settings: EditorSettings) -> Self {
        Self::with_document(Document::new(), settings)
    }

    /// Create a view on `document`, with the cursor at its start
    pub fn with_document(document: Document, settings: EditorSettings) -> Self {
        let mut view = Self {
            document,
            cursor: Cursor::at(DocIterator::at(0, 0)),
            coords: CoordCache::new(),
            undo: SnapshotUndo::with_limit(settings.cursor.undo_limit),
            settings,
            metrics: Box::new(FixedFontMetrics::default()),
            font: FontInfo::default(),
            cas: None,
            clipboard: String::new(),
            painted: Vec::new(),
        };
        view.refresh();
        view
    }

    /// Load a document from LaTeX source; parse problems are logged
    pub fn from_latex(source: &str, settings: EditorSettings) -> Self {
        let (document, errors) = Document::from_latex(source, BufferParams::default());
        if !errors.is_empty() && !settings.math.quiet_parse {
            info!(errors = errors.len(), "document loaded with parse errors");
        }
        Self::with_document(document, settings)
    }

    /// Use other font metrics for layout
    pub fn with_metrics(mut self, metrics: Box<dyn FontMetrics>) -> Self {
        self.metrics = metrics;
        self.refresh();
        self
    }

    /// Configure the computer algebra program behind `math-extern`
    pub fn with_cas(mut self, cas: Box<dyn CasRunner>) -> Self {
        self.cas = Some(cas);
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn coords(&self) -> &CoordCache {
        &self.coords
    }

    pub fn clipboard(&self) -> &str {
        &self.clipboard
    }

    /// Text drawn by the last refresh, in paint order
    pub fn painted_text(&self) -> &[String] {
        &self.painted
    }

    pub fn to_latex(&self) -> String {
        self.document.to_latex()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Run one request
    pub fn dispatch(&mut self, cmd: &FuncRequest) -> DispatchResult {
        match cmd.code {
            FuncCode::Undo => return self.history_result(true),
            FuncCode::Redo => return self.history_result(false),
            _ => {}
        }

        let before = self.document.clone();
        let cursor_before = self.cursor.position().clone();
        let result = {
            let mut ctx = DispatchContext {
                doc: &mut self.document,
                coords: &self.coords,
                settings: &self.settings,
                cas: self.cas.as_deref(),
                clipboard: &mut self.clipboard,
            };
            self.cursor.dispatch(&mut ctx, cmd)
        };

        if !result.handled {
            // a refused request leaves no trace
            self.document = before;
            return result;
        }
        if result.buffer_changed {
            let range = changed_paragraphs(&cursor_before, self.cursor.position());
            self.undo.begin_undo_group();
            self.undo.record_undo(UndoKind::Atomic, range, &before, &cursor_before);
            self.undo.end_undo_group();
            self.document.mark_dirty();
        }
        if result.buffer_changed || result.update == ScreenUpdate::Full {
            self.refresh();
        }
        result
    }

    /// Parse and run a request such as `math-insert \frac`
    pub fn dispatch_str(&mut self, command: &str) -> DispatchResult {
        self.dispatch(&FuncRequest::parse(command))
    }

    /// Type `text` one character at a time, as from the keyboard
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            let mut buf = [0u8; 4];
            self.dispatch(&FuncRequest::with_argument(FuncCode::SelfInsert, c.encode_utf8(&mut buf)));
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Undo the last change
    pub fn undo(&mut self) -> Result<()> {
        let step = self.undo.undo(self.current_step())?;
        self.restore(step);
        Ok(())
    }

    /// Redo the last undone change
    pub fn redo(&mut self) -> Result<()> {
        let step = self.undo.redo(self.current_step())?;
        self.restore(step);
        Ok(())
    }

    fn history_result(&mut self, undo: bool) -> DispatchResult {
        let outcome = if undo { self.undo() } else { self.redo() };
        match outcome {
            Ok(()) => DispatchResult::changed(),
            Err(e) => DispatchResult::handled().with_message(e.to_string()),
        }
    }

    fn current_step(&self) -> UndoStep {
        UndoStep {
            document: self.document.clone(),
            cursor: self.cursor.position().clone(),
        }
    }

    fn restore(&mut self, step: UndoStep) {
        self.document = step.document;
        self.document.mark_dirty();
        let mut it = step.cursor;
        it.fix_if_broken(&self.document);
        self.cursor.set_position(it);
        self.refresh();
    }

    // =========================================================================
    // Update and draw
    // =========================================================================

    /// Re-resolve macros, renumber, measure and draw the whole document
    pub fn refresh(&mut self) {
        update::update_document(&mut self.document, &self.settings.math);
        update::metrics(&mut self.document, self.metrics.as_ref(), &self.font);
        let mut painter = RecordingPainter::new();
        update::draw(
            &self.document,
            &mut painter,
            &mut self.coords,
            self.metrics.as_ref(),
            &self.font,
            Point::new(0.0, 0.0),
        );
        self.painted = painter.texts().into_iter().map(str::to_string).collect();
        debug!(primitives = painter.primitives.len(), "document redrawn");
    }
}

/// Paragraphs touched between two cursor positions
fn changed_paragraphs(before: &DocIterator, after: &DocIterator) -> UndoRange {
    let (a, b) = (before.pit(), after.pit());
    UndoRange::Paragraphs {
        from: a.min(b),
        to: a.max(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(src: &str) -> BufferView {
        BufferView::from_latex(src, EditorSettings::default())
    }

    #[test]
    fn test_typing_records_undo_steps() {
        let mut view = view("");
        view.dispatch_str("math-mode");
        view.type_text("x^2");
        assert_eq!(view.to_latex(), "$x^2$");
        assert!(view.can_undo());

        view.undo().unwrap();
        assert_eq!(view.to_latex(), "$x^{}$");
        view.redo().unwrap();
        assert_eq!(view.to_latex(), "$x^2$");
    }

    #[test]
    fn test_refused_request_keeps_document() {
        let mut view = view("ab");
        let result = view.dispatch_str("char-backward");
        assert!(!result.handled);
        assert_eq!(view.to_latex(), "ab");
        assert!(!view.can_undo());
    }

    #[test]
    fn test_undo_request_without_history_reports() {
        let mut view = view("ab");
        let result = view.dispatch_str("undo");
        assert!(result.handled);
        assert!(!result.buffer_changed);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_refresh_records_text_rows() {
        let view = view("ab\n\ncd");
        assert!(view.coords().row(0).is_some());
        assert!(view.coords().row(1).is_some());
        assert_eq!(view.painted_text().first().map(String::as_str), Some("a"));
    }
}
