//! The cursor: a position, an anchor and the dispatch machinery
//!
//! Dispatch walks outward from the innermost node. Each level either handles
//! the request, declines it (the next level out is asked), or reports that
//! the cursor left its node. A request nobody handles leaves the cursor
//! exactly as it was.

use crate::dispatch_result::{DispatchResult, Finish, Outcome, ScreenUpdate};
use crate::func::{FuncCode, FuncRequest};
use crate::{clipboard, macro_mode, math_edit, text_edit};
use doc_model::{CursorSlice, DocIterator, Document, EditorSettings, ParElement, Paragraph, VisualLine};
use math::cas::CasRunner;
use math::{AtomId, CoordCache, InsetMath, MathAtom, MathData};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything a dispatch may read or change besides the cursor
pub struct DispatchContext<'a> {
    pub doc: &'a mut Document,
    /// Geometry of the last draw, for vertical movement
    pub coords: &'a CoordCache,
    pub settings: &'a EditorSettings,
    /// Program for `math-extern`; none configured means the request only
    /// reports a message
    pub cas: Option<&'a dyn CasRunner>,
    pub clipboard: &'a mut String,
}

/// A node the cursor entered or left during the last dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Leave(AtomId),
    Enter(AtomId),
}

/// What a selection covers
#[derive(Debug, Clone, PartialEq)]
pub enum Selected {
    Math(MathData),
    Text(Vec<Paragraph>),
}

impl Selected {
    /// The selection as math content; formulas in text are flattened into
    /// their cells
    pub fn into_math(self) -> MathData {
        match self {
            Selected::Math(data) => data,
            Selected::Text(paragraphs) => {
                let mut data = MathData::new();
                for (i, par) in paragraphs.into_iter().enumerate() {
                    if i > 0 {
                        data.push(MathAtom::new(InsetMath::char(' ')));
                    }
                    for element in par.elements() {
                        match element {
                            ParElement::Char(c) => data.push(MathAtom::new(InsetMath::char(*c))),
                            ParElement::Inset(atom) => match atom.inset() {
                                InsetMath::Hull(_) => {
                                    for cell in atom.inset().cells() {
                                        data.append(cell.clone());
                                    }
                                }
                                _ => data.push(atom.clone()),
                            },
                        }
                    }
                }
                data
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    pub(crate) it: DocIterator,
    pub(crate) anchor: DocIterator,
    pub(crate) selection: bool,
    /// Screen x kept across vertical moves
    pub(crate) target_x: Option<f32>,
    /// Selection taken away when macro mode started
    pub(crate) grabbed: Option<MathData>,
    notifications: Vec<Notification>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(it: DocIterator) -> Self {
        Self {
            anchor: it.clone(),
            it,
            ..Self::default()
        }
    }

    pub fn position(&self) -> &DocIterator {
        &self.it
    }

    /// Move to `it`, dropping any selection
    pub fn set_position(&mut self, it: DocIterator) {
        self.anchor = it.clone();
        self.it = it;
        self.selection = false;
        self.target_x = None;
    }

    pub fn anchor(&self) -> &DocIterator {
        &self.anchor
    }

    pub fn has_selection(&self) -> bool {
        self.selection
    }

    /// Select from `anchor` to `it`
    pub fn select(&mut self, anchor: DocIterator, it: DocIterator) {
        self.anchor = anchor;
        self.it = it;
        self.selection = true;
    }

    pub fn clear_selection(&mut self) {
        self.selection = false;
    }

    pub fn target_x(&self) -> Option<f32> {
        self.target_x
    }

    /// Whether a macro name is being typed
    pub fn in_macro_mode(&self, doc: &Document) -> bool {
        macro_mode::in_macro_mode(self, doc)
    }

    /// Nodes left and entered by the last dispatch, leaves first
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Run one request
    ///
    /// A refused request restores the cursor to its state before the call.
    pub fn dispatch(&mut self, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest) -> DispatchResult {
        debug!(code = cmd.code.name(), depth = self.it.depth(), "dispatch");
        let safe = self.clone();
        self.notifications.clear();
        self.it.fix_if_broken(ctx.doc);

        if cmd.code.is_movement() {
            if cmd.select && !self.selection {
                self.anchor = self.it.clone();
                self.selection = true;
            } else if !cmd.select && self.selection {
                if let Some(result) = self.collapse_selection(&cmd.code) {
                    return result;
                }
            }
        }

        let Some(mut result) = self.dispatch_chain(ctx, cmd) else {
            debug!(code = cmd.code.name(), "dispatch refused");
            *self = safe;
            return DispatchResult::refused();
        };

        if !cmd.code.is_vertical() {
            self.target_x = None;
        }
        if self.notify(ctx.doc, &safe.it) {
            result.buffer_changed = true;
            result = result.with_update(ScreenUpdate::Full);
        }
        self.it.fix_if_broken(ctx.doc);
        if self.selection {
            self.anchor.fix_if_broken(ctx.doc);
        } else {
            self.anchor = self.it.clone();
        }
        result
    }

    /// Plain left/right with a selection goes to its edge
    fn collapse_selection(&mut self, code: &FuncCode) -> Option<DispatchResult> {
        let (begin, end) = self.selection_bounds();
        let target = match code {
            FuncCode::CharForward | FuncCode::CharRight => end,
            FuncCode::CharBackward | FuncCode::CharLeft => begin,
            _ => {
                self.selection = false;
                return None;
            }
        };
        self.set_position(target);
        Some(DispatchResult::moved())
    }

    fn dispatch_chain(&mut self, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest) -> Option<DispatchResult> {
        if let Some(result) = macro_mode::dispatch_at_point(self, ctx, cmd) {
            return result.handled.then_some(result);
        }
        if matches!(cmd.code, FuncCode::Copy | FuncCode::Cut | FuncCode::Paste) {
            return clipboard::dispatch(self, ctx, cmd);
        }

        let mut popped = false;
        loop {
            let outcome = if self.it.in_math() {
                math_edit::dispatch(self, ctx, cmd, popped)
            } else {
                text_edit::dispatch(self, ctx, cmd)
            };
            match outcome {
                Outcome::Handled(result) => return Some(result),
                Outcome::Finished(Finish::Up) | Outcome::Finished(Finish::Down) | Outcome::NotHandled => {
                    if self.it.depth() == 1 {
                        return None;
                    }
                    self.it.pop();
                    popped = true;
                }
                Outcome::Finished(finish) => {
                    self.finish(ctx, finish);
                    return Some(DispatchResult::moved());
                }
            }
        }
    }

    /// Leave the innermost node in the given direction
    pub(crate) fn finish(&mut self, ctx: &DispatchContext<'_>, finish: Finish) {
        if self.it.depth() == 1 || self.it.pop().is_none() {
            return;
        }
        let pos = self.it.pos();
        let visual = self.it.in_text() && ctx.settings.cursor.visual_movement;
        match finish {
            Finish::Forward => self.it.set_pos(pos + 1),
            Finish::Backward => self.it.set_pos(pos),
            Finish::Right | Finish::Left if visual => {
                let doc = &*ctx.doc;
                let pit = self.it.pit();
                let Some(par) = doc.paragraph(pit) else {
                    return;
                };
                let line = VisualLine::from_paragraph(par, doc.is_rtl(pit));
                let Some(v) = line.visual_index(pos) else {
                    self.it.set_pos(pos);
                    return;
                };
                let gap = if finish == Finish::Right { v + 1 } else { v };
                match line.position_at_gap(gap, pos) {
                    Some(step) => {
                        self.it.set_pos(step.pos);
                        self.it.set_boundary(step.boundary);
                    }
                    None => self.it.set_pos(pos),
                }
            }
            Finish::Right => self.it.set_pos(pos + 1),
            Finish::Left => self.it.set_pos(pos),
            Finish::Up | Finish::Down => self.it.set_pos(pos),
        }
    }

    // =========================================================================
    // Entering and leaving nodes
    // =========================================================================

    /// Enter the node right after the position; at its start when `front`
    pub(crate) fn enter_next(&mut self, doc: &Document, front: bool) -> bool {
        let Some(atom) = self.it.container(doc, self.it.depth() - 1).and_then(|c| c.inset_at(self.it.pos()))
        else {
            return false;
        };
        let inset = atom.inset();
        if inset.nargs() == 0 {
            return false;
        }
        let (idx, pos) = if front {
            (inset.idx_first(), 0)
        } else {
            let idx = inset.idx_last();
            (idx, inset.cell(idx).map_or(0, MathData::len))
        };
        self.it.push(atom.id(), idx);
        self.it.set_pos(pos);
        true
    }

    /// Enter the node right before the position at its end
    pub(crate) fn enter_prev(&mut self, doc: &Document) -> bool {
        let pos = self.it.pos();
        if pos == 0 {
            return false;
        }
        self.it.set_pos(pos - 1);
        if self.enter_next(doc, false) {
            return true;
        }
        self.it.set_pos(pos);
        false
    }

    /// Pop one level and stand after the node
    pub(crate) fn leave_forward(&mut self) -> bool {
        if self.it.pop().is_none() {
            return false;
        }
        let pos = self.it.pos();
        self.it.set_pos(pos + 1);
        true
    }

    /// Fire leave and enter hooks for the nodes between `old` and the
    /// current position; returns whether a hook changed the document
    fn notify(&mut self, doc: &mut Document, old: &DocIterator) -> bool {
        let common = common_owner_depth(old, &self.it);
        let mut changed = false;
        for level in (common..old.depth()).rev() {
            let Some(owner) = old.slice(level).and_then(CursorSlice::owner_id) else {
                continue;
            };
            self.notifications.push(Notification::Leave(owner));
            changed |= self.leave_hook(doc, old, level, common);
        }
        for level in common..self.it.depth() {
            if let Some(owner) = self.it.slice(level).and_then(CursorSlice::owner_id) {
                self.notifications.push(Notification::Enter(owner));
            }
        }
        changed
    }

    /// Tidy a node the cursor has left
    ///
    /// Unfolded macros fold again. A script node drops its empty scripts and
    /// dissolves into its nucleus when none remain.
    fn leave_hook(&mut self, doc: &mut Document, old: &DocIterator, level: usize, common: usize) -> bool {
        let Some(atom) = old.inset_mut(doc, level) else {
            return false;
        };
        match atom.inset_mut() {
            InsetMath::Macro(m) if m.is_unfolded() => {
                m.fold();
                true
            }
            InsetMath::Script(script) if !self.selection => {
                let mut changed = false;
                for up in [true, false] {
                    let cell = if up { script.up() } else { script.down() };
                    if cell.is_some_and(MathData::is_empty) {
                        script.remove_script(up);
                        changed = true;
                    }
                }
                if !script.has_scripts() {
                    changed |= self.dissolve_script(doc, old, level, common);
                }
                changed
            }
            _ => false,
        }
    }

    /// Replace the script node owning `old` slice `level` by its nucleus
    fn dissolve_script(&mut self, doc: &mut Document, old: &DocIterator, level: usize, common: usize) -> bool {
        if level < 2 {
            return false;
        }
        let at = old.slice(level - 1).map_or(0, |s| s.pos);
        let Some(cell) = old.cell_at_mut(doc, level - 1) else {
            return false;
        };
        if !cell.get(at).is_some_and(|a| a.inset().as_script().is_some()) {
            return false;
        }
        let Some(InsetMath::Script(script)) = cell.erase(at).map(MathAtom::into_inset) else {
            return false;
        };
        let nucleus = script.nuc().clone();
        let len = nucleus.len();
        cell.insert_data(at, nucleus);

        // the cursor may stand behind the node in the same cell
        let same_cell = common >= level
            && self.it.slice(level - 1).map(|s| (s.owner, s.idx)) == old.slice(level - 1).map(|s| (s.owner, s.idx));
        if same_cell && self.it.depth() == level {
            let pos = self.it.pos();
            if pos > at {
                self.it.set_pos(pos + len - 1);
            }
        }
        debug!(at, len, "script dissolved into its nucleus");
        true
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Both ends of the selection cut back to a common container
    ///
    /// An end inside a node of that container extends the selection over the
    /// whole node.
    pub fn selection_bounds(&self) -> (DocIterator, DocIterator) {
        if !self.selection {
            return (self.it.clone(), self.it.clone());
        }
        let k = self.anchor.common_depth(&self.it).max(1);
        let a = self.anchor.prefix(k);
        let b = self.it.prefix(k);
        let a_in = self.anchor.depth() > k;
        let b_in = self.it.depth() > k;
        let (lo, mut hi, hi_in) = match a.cmp(&b) {
            std::cmp::Ordering::Less => (a, b, b_in),
            std::cmp::Ordering::Greater => (b, a, a_in),
            std::cmp::Ordering::Equal => (a.clone(), a, a_in || b_in),
        };
        if hi_in {
            let pos = hi.pos();
            hi.set_pos(pos + 1);
        }
        (lo, hi)
    }

    pub fn selection_begin(&self) -> DocIterator {
        self.selection_bounds().0
    }

    pub fn selection_end(&self) -> DocIterator {
        self.selection_bounds().1
    }

    /// Whether a non-empty range is selected
    pub fn has_nonempty_selection(&self) -> bool {
        let (lo, hi) = self.selection_bounds();
        self.selection && lo != hi
    }

    /// Remove the selection from the document and return it
    pub fn take_selection(&mut self, doc: &mut Document) -> Option<Selected> {
        if !self.has_nonempty_selection() {
            self.selection = false;
            return None;
        }
        let (lo, hi) = self.selection_bounds();
        let taken = if lo.depth() > 1 {
            let cell = lo.cell_mut(doc)?;
            Selected::Math(cell.erase_range(lo.pos(), hi.pos()))
        } else {
            Selected::Text(take_text_range(doc, &lo, &hi))
        };
        self.it = lo;
        self.anchor = self.it.clone();
        self.selection = false;
        Some(taken)
    }

    /// Take the selection when it lies inside one math cell
    ///
    /// A selection reaching out into the text is dropped instead.
    pub(crate) fn take_cell_selection(&mut self, doc: &mut Document) -> Option<MathData> {
        if self.selection && self.selection_begin().depth() == 1 {
            self.selection = false;
            return None;
        }
        self.take_selection(doc).map(Selected::into_math)
    }

    /// Delete the selection; false if there was none
    pub fn erase_selection(&mut self, doc: &mut Document) -> bool {
        self.take_selection(doc).is_some()
    }

    /// The selection written as LaTeX
    pub fn selection_latex(&self, doc: &Document) -> Option<String> {
        if !self.has_nonempty_selection() {
            return None;
        }
        let (lo, hi) = self.selection_bounds();
        if lo.depth() > 1 {
            return Some(lo.cell(doc)?.copy_range(lo.pos()..hi.pos()).to_latex());
        }
        let mut parts = Vec::new();
        for pit in lo.pit()..=hi.pit() {
            let par = doc.paragraph(pit)?;
            let from = if pit == lo.pit() { lo.pos() } else { 0 };
            let to = if pit == hi.pit() { hi.pos() } else { par.len() };
            let elements = par.elements().get(from..to.max(from))?.to_vec();
            parts.push(Paragraph::from_elements(elements).to_latex());
        }
        Some(parts.join("\n\n"))
    }
}

/// Number of leading levels that are inside the same nodes
fn common_owner_depth(a: &DocIterator, b: &DocIterator) -> usize {
    let mut depth = 1;
    for level in 1..a.depth().min(b.depth()) {
        match (a.slice(level), b.slice(level)) {
            (Some(x), Some(y)) if x.owner == y.owner => depth = level + 1,
            _ => break,
        }
    }
    depth
}

/// Cut the text between two text-level positions, joining the ends
fn take_text_range(doc: &mut Document, lo: &DocIterator, hi: &DocIterator) -> Vec<Paragraph> {
    let (first, last) = (lo.pit(), hi.pit());
    if first == last {
        let taken = doc
            .paragraph_mut(first)
            .map(|par| par.erase_range(lo.pos(), hi.pos()))
            .unwrap_or_default();
        return vec![Paragraph::from_elements(taken)];
    }
    let mut out = Vec::new();
    if let Some(par) = doc.paragraph_mut(first) {
        let len = par.len();
        out.push(Paragraph::from_elements(par.erase_range(lo.pos(), len)));
    }
    for _ in first + 1..last {
        if let Some(par) = doc.remove_paragraph(first + 1) {
            out.push(par);
        }
    }
    if let Some(par) = doc.paragraph_mut(first + 1) {
        out.push(Paragraph::from_elements(par.erase_range(0, hi.pos())));
    }
    doc.merge_with_next(first);
    out
}
