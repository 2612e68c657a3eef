//! Document: the root container that owns all paragraphs

use crate::paragraph::{is_template, ParElement, Paragraph};
use crate::dociterator::DocIterator;
use math::{
    collect_atom_templates, collect_templates, parse_cell_in, MacroContext, MacroData, MacroTable, MathAtom,
    ParseError, ParseFlags,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Per-document parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferParams {
    /// Whether edits are recorded as tracked changes
    pub track_changes: bool,
    /// Base direction of paragraphs without an explicit one
    pub rtl_default: bool,
    /// Number given to the first numbered equation
    pub numbering_start: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            track_changes: false,
            rtl_default: false,
            numbering_start: 1,
        }
    }
}

/// The document
///
/// Always holds at least one paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    paragraphs: Vec<Paragraph>,
    params: BufferParams,
    dirty: bool,
    /// Definitions that macro instances resolved against in the last update
    definitions: Vec<Arc<MacroData>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::with_params(BufferParams::default())
    }

    pub fn with_params(params: BufferParams) -> Self {
        Self {
            paragraphs: vec![Paragraph::new()],
            params,
            dirty: false,
            definitions: Vec::new(),
        }
    }

    /// Build a document from paragraphs; an empty list gives one empty paragraph
    pub fn from_paragraphs(paragraphs: Vec<Paragraph>) -> Self {
        let mut doc = Self::new();
        if !paragraphs.is_empty() {
            doc.paragraphs = paragraphs;
        }
        doc
    }

    /// Load LaTeX source; paragraphs are separated by blank lines
    ///
    /// Macro templates become visible to the paragraphs after them. Parse
    /// diagnostics are returned next to the best-effort document.
    pub fn from_latex(source: &str, params: BufferParams) -> (Self, Vec<ParseError>) {
        let mut local = MacroTable::new();
        let mut errors = Vec::new();
        let mut paragraphs = Vec::new();
        let global = math::GlobalMacroRegistry::instance().table();
        for text in split_paragraphs(source) {
            let ctx = MacroContext::with_tables(Some(&local), global);
            let outcome = parse_cell_in(&text, ctx, ParseFlags { quiet: true, text_mode: true });
            errors.extend(outcome.errors);
            for (name, data) in outcome.macros.iter() {
                local.insert_shared(name, data.clone());
            }
            let elements = outcome
                .data
                .into_atoms()
                .into_iter()
                .map(|atom| match atom.as_char() {
                    Some(c) => ParElement::Char(c),
                    None => ParElement::Inset(atom),
                })
                .collect();
            paragraphs.push(Paragraph::from_elements(elements));
        }
        debug!(paragraphs = paragraphs.len(), errors = errors.len(), "document loaded");
        let mut doc = Self::from_paragraphs(paragraphs);
        doc.params = params;
        (doc, errors)
    }

    /// Serialize as LaTeX, paragraphs separated by blank lines
    pub fn to_latex(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::to_latex)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    // =========================================================================
    // Paragraph access
    // =========================================================================

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraphs_mut(&mut self) -> &mut [Paragraph] {
        &mut self.paragraphs
    }

    pub fn paragraph(&self, pit: usize) -> Option<&Paragraph> {
        self.paragraphs.get(pit)
    }

    pub fn paragraph_mut(&mut self, pit: usize) -> Option<&mut Paragraph> {
        self.paragraphs.get_mut(pit)
    }

    /// Number of paragraphs
    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(Paragraph::is_empty)
    }

    pub fn inset(&self, pit: usize, pos: usize) -> Option<&MathAtom> {
        self.paragraph(pit).and_then(|p| p.inset(pos))
    }

    pub fn inset_mut(&mut self, pit: usize, pos: usize) -> Option<&mut MathAtom> {
        self.paragraph_mut(pit).and_then(|p| p.inset_mut(pos))
    }

    /// Split paragraph `pit` at `pos`
    pub fn split_paragraph(&mut self, pit: usize, pos: usize) {
        if let Some(par) = self.paragraphs.get_mut(pit) {
            let tail = par.split_off(pos);
            self.paragraphs.insert(pit + 1, tail);
        }
    }

    /// Insert a paragraph before `pit`, or at the end
    pub fn insert_paragraph(&mut self, pit: usize, par: Paragraph) {
        let at = pit.min(self.paragraphs.len());
        self.paragraphs.insert(at, par);
    }

    /// Remove paragraph `pit`; the last remaining paragraph is emptied instead
    pub fn remove_paragraph(&mut self, pit: usize) -> Option<Paragraph> {
        if pit >= self.paragraphs.len() {
            return None;
        }
        if self.paragraphs.len() == 1 {
            return Some(std::mem::take(&mut self.paragraphs[0]));
        }
        Some(self.paragraphs.remove(pit))
    }

    /// Join paragraph `pit + 1` onto `pit`; false if there is none
    pub fn merge_with_next(&mut self, pit: usize) -> bool {
        if pit + 1 >= self.paragraphs.len() {
            return false;
        }
        let next = self.paragraphs.remove(pit + 1);
        self.paragraphs[pit].append(next);
        true
    }

    /// Base direction of paragraph `pit`
    pub fn is_rtl(&self, pit: usize) -> bool {
        self.paragraph(pit)
            .and_then(|p| p.rtl)
            .unwrap_or(self.params.rtl_default)
    }

    // =========================================================================
    // Parameters and state
    // =========================================================================

    pub fn params(&self) -> &BufferParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut BufferParams {
        &mut self.params
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Keep the definitions used by the last update alive
    pub fn retain_definitions(&mut self, definitions: Vec<Arc<MacroData>>) {
        self.definitions = definitions;
    }

    /// Macros defined by templates before `(pit, pos)`
    ///
    /// Templates inside earlier formulas count as well.
    pub fn macros_before(&self, pit: usize, pos: usize) -> MacroTable {
        let mut table = MacroTable::new();
        for (p, par) in self.paragraphs.iter().enumerate().take(pit + 1) {
            for (offset, atom) in par.insets() {
                if p == pit && offset >= pos {
                    break;
                }
                collect_atom_templates(atom, &mut table);
            }
        }
        table
    }

    /// Macros defined by templates before `it`, down to its innermost cell
    pub fn macros_at(&self, it: &DocIterator) -> MacroTable {
        let mut table = self.macros_before(it.pit(), it.bottom().pos);
        for level in 1..it.depth() {
            let (Some(atom), Some(slice)) = (it.inset(self, level), it.slice(level)) else {
                break;
            };
            let inset = atom.inset();
            for idx in 0..slice.idx {
                if let Some(cell) = inset.cell(idx) {
                    collect_templates(cell, &mut table);
                }
            }
            if let Some(cell) = inset.cell(slice.idx) {
                for atom in cell.iter().take(slice.pos) {
                    collect_atom_templates(atom, &mut table);
                }
            }
        }
        table
    }

    /// Whether the document defines any macro
    pub fn has_templates(&self) -> bool {
        self.paragraphs
            .iter()
            .any(|p| p.insets().any(|(_, a)| is_template(a)))
    }
}

/// Split source text at blank lines
fn split_paragraphs(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for line in source.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                out.push(current.trim().to_string());
            }
            current.clear();
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_one_paragraph() {
        let doc = Document::new();
        assert_eq!(doc.len(), 1);
        assert!(doc.is_empty());
        assert_eq!(doc.params().numbering_start, 1);
    }

    #[test]
    fn test_load_splits_paragraphs() {
        let (doc, errors) = Document::from_latex("one $x$\n\n\ntwo", BufferParams::default());
        assert!(errors.is_empty());
        assert_eq!(doc.len(), 2);
        assert!(doc.inset(0, 4).is_some());
        assert_eq!(doc.paragraph(1).unwrap().text(), "two");
        assert_eq!(doc.to_latex(), "one $x$\n\ntwo");
    }

    #[test]
    fn test_templates_visible_in_later_paragraphs() {
        let src = "\\newcommand{\\sq}[1]{#1^2}\n\n$\\sq{3}$";
        let (doc, errors) = Document::from_latex(src, BufferParams::default());
        assert!(errors.is_empty());
        let hull = doc.inset(1, 0).unwrap().inset().as_hull().unwrap();
        let cell = hull.grid().cell_at(0, 0).unwrap();
        assert_eq!(cell[0].inset().as_macro().unwrap().name(), "sq");
        assert!(doc.has_templates());
        assert!(doc.macros_before(1, 0).has("sq"));
        assert!(!doc.macros_before(0, 0).has("sq"));
    }

    #[test]
    fn test_macros_at_sees_earlier_atoms_of_the_cell() {
        let (doc, errors) = Document::from_latex("$\\newcommand{\\g}{y}z$", BufferParams::default());
        assert!(errors.is_empty());
        let hull = doc.inset(0, 0).unwrap().id();
        let mut it = DocIterator::at(0, 0);
        it.push(hull, 0);
        assert!(!doc.macros_at(&it).has("g"));
        it.set_pos(1);
        assert!(doc.macros_at(&it).has("g"));
        assert!(doc.macros_before(0, 1).has("g"));
    }

    #[test]
    fn test_split_and_merge() {
        let mut doc = Document::from_paragraphs(vec![Paragraph::from_text("abcd")]);
        doc.split_paragraph(0, 2);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.paragraph(1).unwrap().text(), "cd");
        assert!(doc.merge_with_next(0));
        assert!(!doc.merge_with_next(0));
        assert_eq!(doc.paragraph(0).unwrap().text(), "abcd");
    }

    #[test]
    fn test_insert_and_remove_paragraphs() {
        let mut doc = Document::from_paragraphs(vec![Paragraph::from_text("a")]);
        doc.insert_paragraph(5, Paragraph::from_text("c"));
        doc.insert_paragraph(1, Paragraph::from_text("b"));
        let texts: Vec<String> = doc.paragraphs().iter().map(Paragraph::text).collect();
        assert_eq!(texts, ["a", "b", "c"]);

        assert_eq!(doc.remove_paragraph(1).unwrap().text(), "b");
        assert_eq!(doc.remove_paragraph(0).unwrap().text(), "a");
        assert_eq!(doc.remove_paragraph(0).unwrap().text(), "c");
        assert_eq!(doc.len(), 1);
        assert!(doc.paragraph(0).unwrap().is_empty());
        assert!(doc.remove_paragraph(3).is_none());
    }

    #[test]
    fn test_direction_falls_back_to_params() {
        let mut doc = Document::with_params(BufferParams {
            rtl_default: true,
            ..BufferParams::default()
        });
        assert!(doc.is_rtl(0));
        doc.paragraph_mut(0).unwrap().rtl = Some(false);
        assert!(!doc.is_rtl(0));
    }
}
