//! Positions in the nested document
//!
//! A [`DocIterator`] is a stack of [`CursorSlice`]s: the first slice lives in
//! the paragraph list, every further slice in a cell of the math node found
//! at the previous slice's offset. Slices only name their owner by atom id,
//! so a position survives being cloned into a snapshot and is resolved
//! against a document each time it is used.

use crate::cursor_slice::{CursorSlice, SliceOwner};
use crate::document::Document;
use crate::paragraph::Paragraph;
use math::{AtomId, MathAtom, MathData};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// The container a slice points into
#[derive(Debug, Clone, Copy)]
pub enum Container<'d> {
    Text(&'d Paragraph),
    Math(&'d MathData),
}

impl<'d> Container<'d> {
    /// Last valid offset
    pub fn lastpos(&self) -> usize {
        match self {
            Container::Text(par) => par.len(),
            Container::Math(cell) => cell.len(),
        }
    }

    /// The math node at `pos`, if there is one
    pub fn inset_at(&self, pos: usize) -> Option<&'d MathAtom> {
        match self {
            Container::Text(par) => par.inset(pos),
            Container::Math(cell) => cell.get(pos),
        }
    }

    pub fn position_of(&self, id: AtomId) -> Option<usize> {
        match self {
            Container::Text(par) => par.position_of(id),
            Container::Math(cell) => cell.position_of(id),
        }
    }
}

/// A location anywhere in the document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocIterator {
    slices: Vec<CursorSlice>,
}

impl Default for DocIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocIterator {
    /// Start of the document
    pub fn new() -> Self {
        Self::at(0, 0)
    }

    /// Offset `pos` of paragraph `pit`
    pub fn at(pit: usize, pos: usize) -> Self {
        Self {
            slices: vec![CursorSlice::text(pit, pos)],
        }
    }

    /// Build from slices; an empty list is the start of the document
    pub fn from_slices(slices: Vec<CursorSlice>) -> Self {
        if slices.is_empty() {
            return Self::new();
        }
        Self { slices }
    }

    pub fn slices(&self) -> &[CursorSlice] {
        &self.slices
    }

    /// Number of slices; one at the text level
    pub fn depth(&self) -> usize {
        self.slices.len()
    }

    /// The innermost slice
    pub fn top(&self) -> &CursorSlice {
        &self.slices[self.slices.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut CursorSlice {
        let last = self.slices.len() - 1;
        &mut self.slices[last]
    }

    /// The text-level slice
    pub fn bottom(&self) -> &CursorSlice {
        &self.slices[0]
    }

    pub fn slice(&self, level: usize) -> Option<&CursorSlice> {
        self.slices.get(level)
    }

    pub fn slice_mut(&mut self, level: usize) -> Option<&mut CursorSlice> {
        self.slices.get_mut(level)
    }

    /// Paragraph of the position
    pub fn pit(&self) -> usize {
        self.slices[0].idx
    }

    pub fn idx(&self) -> usize {
        self.top().idx
    }

    pub fn pos(&self) -> usize {
        self.top().pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        let top = self.top_mut();
        top.pos = pos;
        top.boundary = false;
    }

    pub fn boundary(&self) -> bool {
        self.top().boundary
    }

    pub fn set_boundary(&mut self, boundary: bool) {
        self.top_mut().boundary = boundary;
    }

    pub fn in_math(&self) -> bool {
        self.top().is_math()
    }

    pub fn in_text(&self) -> bool {
        !self.in_math()
    }

    // =========================================================================
    // Stack operations
    // =========================================================================

    /// Enter cell `idx` of the math node `owner`, at offset 0
    pub fn push(&mut self, owner: AtomId, idx: usize) {
        self.slices.push(CursorSlice::math(owner, idx, 0));
    }

    /// Leave the innermost container
    ///
    /// Popping the text level is a caller bug: it is refused and `None`
    /// is returned.
    pub fn pop(&mut self) -> Option<CursorSlice> {
        debug_assert!(self.slices.len() > 1, "pop at the text level");
        if self.slices.len() > 1 {
            self.slices.pop()
        } else {
            None
        }
    }

    /// Keep only the outer `n` slices; at least one is always kept
    pub fn resize(&mut self, n: usize) {
        self.slices.truncate(n.max(1));
    }

    /// The outer `n` slices as a position of their own
    pub fn prefix(&self, n: usize) -> DocIterator {
        let mut it = self.clone();
        it.resize(n);
        it
    }

    /// Number of levels at which both positions are in the same cell
    pub fn common_depth(&self, other: &DocIterator) -> usize {
        let mut depth = 0;
        for (i, (a, b)) in self.slices.iter().zip(&other.slices).enumerate() {
            if a.owner != b.owner || a.idx != b.idx {
                break;
            }
            if i > 0 && self.slices[i - 1].pos != other.slices[i - 1].pos {
                break;
            }
            depth = i + 1;
        }
        depth
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// The math node owning slice `level`
    pub fn inset<'d>(&self, doc: &'d Document, level: usize) -> Option<&'d MathAtom> {
        if level == 0 || level >= self.slices.len() {
            return None;
        }
        let root = &self.slices[0];
        let mut atom = doc.inset(root.idx, root.pos)?;
        for k in 1..level {
            let s = &self.slices[k];
            if s.owner_id() != Some(atom.id()) {
                return None;
            }
            atom = atom.inset().cell(s.idx)?.get(s.pos)?;
        }
        (self.slices[level].owner_id() == Some(atom.id())).then_some(atom)
    }

    pub fn inset_mut<'d>(&self, doc: &'d mut Document, level: usize) -> Option<&'d mut MathAtom> {
        if level == 0 || level >= self.slices.len() {
            return None;
        }
        let root = &self.slices[0];
        let mut atom = doc.inset_mut(root.idx, root.pos)?;
        for k in 1..level {
            let s = &self.slices[k];
            if s.owner_id() != Some(atom.id()) {
                return None;
            }
            atom = atom.inset_mut().cell_mut(s.idx)?.get_mut(s.pos)?;
        }
        if self.slices[level].owner_id() != Some(atom.id()) {
            return None;
        }
        Some(atom)
    }

    /// The innermost math node, if the position is in math
    pub fn inner_inset<'d>(&self, doc: &'d Document) -> Option<&'d MathAtom> {
        self.inset(doc, self.depth() - 1)
    }

    pub fn inner_inset_mut<'d>(&self, doc: &'d mut Document) -> Option<&'d mut MathAtom> {
        let level = self.depth() - 1;
        self.inset_mut(doc, level)
    }

    /// The container slice `level` points into
    pub fn container<'d>(&self, doc: &'d Document, level: usize) -> Option<Container<'d>> {
        let s = self.slices.get(level)?;
        if level == 0 {
            return doc.paragraph(s.idx).map(Container::Text);
        }
        self.inset(doc, level)?
            .inset()
            .cell(s.idx)
            .map(Container::Math)
    }

    /// The math cell of the innermost slice
    pub fn cell<'d>(&self, doc: &'d Document) -> Option<&'d MathData> {
        match self.container(doc, self.depth() - 1)? {
            Container::Math(cell) => Some(cell),
            Container::Text(_) => None,
        }
    }

    pub fn cell_mut<'d>(&self, doc: &'d mut Document) -> Option<&'d mut MathData> {
        let idx = self.idx();
        self.inner_inset_mut(doc)?.inset_mut().cell_mut(idx)
    }

    /// The cell of slice `level`
    pub fn cell_at_mut<'d>(&self, doc: &'d mut Document, level: usize) -> Option<&'d mut MathData> {
        let idx = self.slices.get(level)?.idx;
        self.inset_mut(doc, level)?.inset_mut().cell_mut(idx)
    }

    pub fn paragraph<'d>(&self, doc: &'d Document) -> Option<&'d Paragraph> {
        doc.paragraph(self.pit())
    }

    /// Last valid offset of the innermost container; 0 if it does not resolve
    pub fn lastpos(&self, doc: &Document) -> usize {
        self.container(doc, self.depth() - 1)
            .map_or(0, |c| c.lastpos())
    }

    /// Atom after the position in math
    pub fn next_atom<'d>(&self, doc: &'d Document) -> Option<&'d MathAtom> {
        self.cell(doc)?.get(self.pos())
    }

    /// Atom before the position in math
    pub fn prev_atom<'d>(&self, doc: &'d Document) -> Option<&'d MathAtom> {
        let pos = self.pos().checked_sub(1)?;
        self.cell(doc)?.get(pos)
    }

    /// Whether every slice resolves and every offset is in range
    pub fn is_valid(&self, doc: &Document) -> bool {
        (0..self.depth()).all(|level| {
            self.container(doc, level)
                .is_some_and(|c| self.slices[level].pos <= c.lastpos())
        })
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// One step forward in the innermost container
    ///
    /// At the end of a cell this moves to the owner's next cell or leaves the
    /// owner to the offset after it. At the end of a paragraph it moves to the
    /// next one. False at the end of the document.
    pub fn forward(&mut self, doc: &Document) -> bool {
        let last = self.lastpos(doc);
        if self.pos() < last {
            let pos = self.pos() + 1;
            self.set_pos(pos);
            return true;
        }
        if self.depth() == 1 {
            let pit = self.pit();
            if pit + 1 >= doc.len() {
                return false;
            }
            self.slices[0] = CursorSlice::text(pit + 1, 0);
            return true;
        }
        let next = self
            .inner_inset(doc)
            .and_then(|a| a.inset().idx_forward(self.idx()));
        if let Some(idx) = next {
            let top = self.top_mut();
            top.idx = idx;
            top.pos = 0;
            top.boundary = false;
            return true;
        }
        self.slices.pop();
        let pos = self.pos() + 1;
        self.set_pos(pos);
        true
    }

    /// One step backward; the mirror of [`DocIterator::forward`]
    ///
    /// Leaving a node puts the position right before it.
    pub fn backward(&mut self, doc: &Document) -> bool {
        if self.pos() > 0 {
            let pos = self.pos() - 1;
            self.set_pos(pos);
            return true;
        }
        if self.depth() == 1 {
            let pit = self.pit();
            if pit == 0 {
                return false;
            }
            let len = doc.paragraph(pit - 1).map_or(0, Paragraph::len);
            self.slices[0] = CursorSlice::text(pit - 1, len);
            return true;
        }
        let prev = self.inner_inset(doc).and_then(|a| {
            let idx = a.inset().idx_backward(self.idx())?;
            Some((idx, a.inset().cell(idx).map_or(0, MathData::len)))
        });
        if let Some((idx, len)) = prev {
            let top = self.top_mut();
            top.idx = idx;
            top.pos = len;
            top.boundary = false;
            return true;
        }
        self.slices.pop();
        self.top_mut().boundary = false;
        true
    }

    // =========================================================================
    // Repair
    // =========================================================================

    /// Clamp the position into the current document
    ///
    /// Cells and offsets are clamped to their ranges. A math slice whose
    /// owner moved is re-found in its parent container; if the owner is gone
    /// the position is cut back to the parent. Returns whether anything
    /// changed.
    pub fn fix_if_broken(&mut self, doc: &Document) -> bool {
        let mut changed = false;
        let npars = doc.len();
        let root = &mut self.slices[0];
        if root.idx >= npars {
            root.idx = npars.saturating_sub(1);
            changed = true;
        }
        let Some(par) = doc.paragraph(self.slices[0].idx) else {
            self.slices.truncate(1);
            self.slices[0] = CursorSlice::text(0, 0);
            debug!("position reset to document start");
            return true;
        };
        if self.slices[0].pos > par.len() {
            self.slices[0].pos = par.len();
            changed = true;
        }

        let mut container = Container::Text(par);
        let mut level = 1;
        while level < self.slices.len() {
            let SliceOwner::Math(owner) = self.slices[level].owner else {
                self.slices.truncate(level);
                changed = true;
                break;
            };
            let parent_pos = self.slices[level - 1].pos;
            let atom = match container.inset_at(parent_pos).filter(|a| a.id() == owner) {
                Some(atom) => atom,
                None => match container.position_of(owner) {
                    Some(pos) => {
                        self.slices[level - 1].pos = pos;
                        changed = true;
                        match container.inset_at(pos) {
                            Some(atom) => atom,
                            None => {
                                self.slices.truncate(level);
                                break;
                            }
                        }
                    }
                    None => {
                        self.slices.truncate(level);
                        changed = true;
                        break;
                    }
                },
            };

            let nargs = atom.inset().nargs();
            if nargs == 0 {
                self.slices.truncate(level);
                changed = true;
                break;
            }
            let slice = &mut self.slices[level];
            if slice.idx >= nargs {
                slice.idx = nargs - 1;
                changed = true;
            }
            let Some(cell) = atom.inset().cell(slice.idx) else {
                self.slices.truncate(level);
                changed = true;
                break;
            };
            if slice.pos > cell.len() {
                slice.pos = cell.len();
                changed = true;
            }
            container = Container::Math(cell);
            level += 1;
        }

        if changed {
            debug!(depth = self.depth(), pos = self.pos(), "repaired broken position");
        }
        changed
    }
}

// Positions compare slice by slice on (cell, offset, boundary). A position
// inside a node sorts after the position right before the node and before
// the one right after it.
impl PartialEq for DocIterator {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DocIterator {}

impl PartialOrd for DocIterator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocIterator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.slices
            .iter()
            .map(CursorSlice::key)
            .cmp(other.slices.iter().map(CursorSlice::key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BufferParams;
    use proptest::prelude::*;

    /// "ab " followed by a formula holding a fraction, then " c"
    fn sample() -> Document {
        let (doc, errors) = Document::from_latex("ab $\\frac{x+y}{z}q$ c", BufferParams::default());
        assert!(errors.is_empty());
        doc
    }

    /// Position inside the numerator, after `x`
    fn in_numerator(doc: &Document) -> DocIterator {
        let hull = doc.inset(0, 3).unwrap();
        let frac = hull.inset().cell(0).unwrap().get(0).unwrap();
        let mut it = DocIterator::at(0, 3);
        it.push(hull.id(), 0);
        it.push(frac.id(), 0);
        it.set_pos(1);
        it
    }

    #[test]
    fn test_resolves_nested_cells() {
        let doc = sample();
        let it = in_numerator(&doc);
        assert_eq!(it.depth(), 3);
        assert!(it.in_math());
        assert!(it.is_valid(&doc));
        assert_eq!(it.lastpos(&doc), 3);
        assert_eq!(it.next_atom(&doc).unwrap().as_char(), Some('+'));
        assert_eq!(it.prev_atom(&doc).unwrap().as_char(), Some('x'));
        assert!(it.inner_inset(&doc).unwrap().inset().as_frac().is_some());
    }

    #[test]
    fn test_pop_refuses_root() {
        let mut it = DocIterator::at(0, 0);
        let popped = std::panic::catch_unwind(move || it.pop());
        // debug builds assert, release builds refuse
        assert!(popped.map_or(true, |p| p.is_none()));
    }

    #[test]
    fn test_forward_leaves_fraction_after_it() {
        let doc = sample();
        let mut it = in_numerator(&doc);
        assert!(it.forward(&doc));
        assert!(it.forward(&doc));
        assert_eq!(it.pos(), 3);
        assert!(it.forward(&doc));
        assert_eq!(it.depth(), 2);
        assert_eq!(it.pos(), 1);
    }

    #[test]
    fn test_forward_walks_grid_cells() {
        let (doc, _) = Document::from_latex(
            "$\\begin{matrix}a&b\\end{matrix}$",
            BufferParams::default(),
        );
        let hull = doc.inset(0, 0).unwrap();
        let matrix = hull.inset().cell(0).unwrap().get(0).unwrap();
        let mut it = DocIterator::at(0, 0);
        it.push(hull.id(), 0);
        it.push(matrix.id(), 0);
        assert!(it.forward(&doc));
        assert!(it.forward(&doc));
        assert_eq!((it.idx(), it.pos()), (1, 0));
        assert!(it.backward(&doc));
        assert_eq!((it.idx(), it.pos()), (0, 1));
    }

    #[test]
    fn test_backward_leaves_before_node() {
        let doc = sample();
        let mut it = in_numerator(&doc);
        assert!(it.backward(&doc));
        assert_eq!(it.pos(), 0);
        assert!(it.backward(&doc));
        assert_eq!(it.depth(), 2);
        assert_eq!(it.pos(), 0);
    }

    #[test]
    fn test_document_edges() {
        let (doc, _) = Document::from_latex("a\n\nb", BufferParams::default());
        let mut it = DocIterator::at(0, 0);
        assert!(!it.backward(&doc));
        assert!(it.forward(&doc));
        assert!(it.forward(&doc));
        assert_eq!((it.pit(), it.pos()), (1, 0));
        assert!(it.forward(&doc));
        assert!(!it.forward(&doc));
        assert!(it.backward(&doc));
        assert!(it.backward(&doc));
        assert_eq!((it.pit(), it.pos()), (0, 1));
    }

    #[test]
    fn test_ordering_nested() {
        let doc = sample();
        let inside = in_numerator(&doc);
        let before = DocIterator::at(0, 3);
        let after = DocIterator::at(0, 4);
        assert!(before < inside);
        assert!(inside < after);
        assert_eq!(inside.common_depth(&inside.clone()), 3);
        assert_eq!(inside.common_depth(&before), 1);
    }

    #[test]
    fn test_fix_after_erasing_owner() {
        let mut doc = sample();
        let mut it = in_numerator(&doc);
        doc.inset_mut(0, 3).unwrap().inset_mut().cell_mut(0).unwrap().erase(0);
        assert!(!it.is_valid(&doc));
        assert!(it.fix_if_broken(&doc));
        assert_eq!(it.depth(), 2);
        assert!(it.is_valid(&doc));
        assert!(!it.fix_if_broken(&doc));
    }

    #[test]
    fn test_fix_follows_moved_owner() {
        let mut doc = sample();
        let mut it = in_numerator(&doc);
        doc.paragraph_mut(0).unwrap().erase(0);
        assert!(it.fix_if_broken(&doc));
        assert_eq!(it.depth(), 3);
        assert_eq!(it.bottom().pos, 2);
        assert!(it.is_valid(&doc));
    }

    #[test]
    fn test_fix_clamps_offsets() {
        let mut doc = sample();
        let mut it = in_numerator(&doc);
        it.set_pos(3);
        let hull = doc.inset_mut(0, 3).unwrap();
        let frac = hull.inset_mut().cell_mut(0).unwrap().get_mut(0).unwrap();
        frac.inset_mut().cell_mut(0).unwrap().erase_range(0, 3);
        assert!(it.fix_if_broken(&doc));
        assert_eq!(it.pos(), 0);
        assert_eq!(it.depth(), 3);
    }

    #[derive(Debug, Clone)]
    enum Edit {
        EraseText(usize),
        EraseMath { level: usize, pos: usize },
        ClearMath { level: usize },
        DropParagraph,
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0usize..8).prop_map(Edit::EraseText),
            (1usize..3, 0usize..5).prop_map(|(level, pos)| Edit::EraseMath { level, pos }),
            (1usize..3).prop_map(|level| Edit::ClearMath { level }),
            Just(Edit::DropParagraph),
        ]
    }

    fn apply(doc: &mut Document, shape: &DocIterator, edit: &Edit) {
        match edit {
            Edit::EraseText(pos) => {
                if let Some(par) = doc.paragraph_mut(0) {
                    par.erase(*pos);
                }
            }
            Edit::EraseMath { level, pos } => {
                if let Some(cell) = shape.cell_at_mut(doc, *level) {
                    if *pos < cell.len() {
                        cell.erase(*pos);
                    }
                }
            }
            Edit::ClearMath { level } => {
                if let Some(cell) = shape.cell_at_mut(doc, *level) {
                    cell.clear();
                }
            }
            Edit::DropParagraph => {
                let paragraphs = doc.paragraphs().to_vec();
                if paragraphs.len() > 1 {
                    *doc = Document::from_paragraphs(paragraphs[1..].to_vec());
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_fix_if_broken_yields_valid_position(
            edits in proptest::collection::vec(edit(), 0..6),
            pos in 0usize..4,
        ) {
            let (mut doc, _) = Document::from_latex(
                "ab $\\frac{x+y}{z}q$ c\n\nlast",
                BufferParams::default(),
            );
            let mut it = in_numerator(&doc);
            it.set_pos(pos.min(3));
            for e in &edits {
                let shape = it.clone();
                apply(&mut doc, &shape, e);
                it.fix_if_broken(&doc);
                prop_assert!(it.is_valid(&doc));
                prop_assert!(it.pos() <= it.lastpos(&doc));
            }
        }
    }
}
