//! Request handling in the text between formulas

use crate::cursor::{Cursor, DispatchContext, Selected};
use crate::dispatch_result::Outcome;
use crate::func::{FuncCode, FuncRequest};
use crate::{math_edit, math_nav};
use doc_model::{DocIterator, Document, Paragraph, VisualLine};
use math::{HullInset, HullType, InsetMath, MathAtom};
use tracing::trace;

/// The outermost level of the dispatch chain
pub(crate) fn dispatch(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest) -> Outcome {
    match &cmd.code {
        FuncCode::CharForward => forward(cur, ctx.doc),
        FuncCode::CharBackward => backward(cur, ctx.doc),
        FuncCode::CharRight => right_left(cur, ctx, true),
        FuncCode::CharLeft => right_left(cur, ctx, false),
        FuncCode::Up => up_down(cur, ctx, true),
        FuncCode::Down => up_down(cur, ctx, false),
        FuncCode::LineBegin => math_nav::line_begin(cur),
        FuncCode::LineEnd => math_nav::line_end(cur, ctx),
        FuncCode::SelectAll => select_all(cur, ctx.doc),
        FuncCode::Escape if cur.selection => {
            cur.clear_selection();
            Outcome::moved()
        }
        FuncCode::SelfInsert => self_insert(cur, ctx.doc, &cmd.argument),
        FuncCode::DeleteBackward => delete_backward(cur, ctx.doc),
        FuncCode::DeleteForward => delete_forward(cur, ctx.doc),
        FuncCode::Break => break_paragraph(cur, ctx.doc),
        FuncCode::MathMode => {
            let hull_type = if cmd.argument.trim() == "display" {
                HullType::Equation
            } else {
                HullType::Simple
            };
            open_formula(cur, ctx.doc, hull_type)
        }
        FuncCode::MathInsert => math_insert(cur, ctx, &cmd.argument),
        _ => Outcome::NotHandled,
    }
}

/// Whether the text position has a formula right after it the cursor may enter
fn enterable_at(cur: &Cursor, doc: &Document, pos: usize) -> bool {
    doc.inset(cur.it.pit(), pos)
        .is_some_and(|atom| math_nav::can_enter(cur, atom))
}

fn paragraph_len(doc: &Document, pit: usize) -> usize {
    doc.paragraph(pit).map_or(0, Paragraph::len)
}

// =============================================================================
// Movement
// =============================================================================

fn forward(cur: &mut Cursor, doc: &Document) -> Outcome {
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    if enterable_at(cur, doc, pos) && cur.enter_next(doc, true) {
        return Outcome::moved();
    }
    if pos < paragraph_len(doc, pit) {
        cur.it.set_pos(pos + 1);
        cur.it.set_boundary(false);
        return Outcome::moved();
    }
    if pit + 1 < doc.len() {
        cur.it = DocIterator::at(pit + 1, 0);
        return Outcome::moved();
    }
    Outcome::NotHandled
}

fn backward(cur: &mut Cursor, doc: &Document) -> Outcome {
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    if pos > 0 && enterable_at(cur, doc, pos - 1) && cur.enter_prev(doc) {
        return Outcome::moved();
    }
    if pos > 0 {
        cur.it.set_pos(pos - 1);
        cur.it.set_boundary(false);
        return Outcome::moved();
    }
    if pit > 0 {
        cur.it = DocIterator::at(pit - 1, paragraph_len(doc, pit - 1));
        return Outcome::moved();
    }
    Outcome::NotHandled
}

/// Screen-right or screen-left movement
///
/// With visual movement the caret walks the bidi display order, entering a
/// formula it crosses. Otherwise right means forward in a left-to-right
/// paragraph and backward in a right-to-left one.
fn right_left(cur: &mut Cursor, ctx: &DispatchContext<'_>, right: bool) -> Outcome {
    let doc = &*ctx.doc;
    let pit = cur.it.pit();
    let rtl = doc.is_rtl(pit);
    if !ctx.settings.cursor.visual_movement {
        return if right != rtl { forward(cur, doc) } else { backward(cur, doc) };
    }
    let Some(par) = doc.paragraph(pit) else {
        return Outcome::NotHandled;
    };
    let line = VisualLine::from_paragraph(par, rtl);
    let (pos, boundary) = (cur.it.pos(), cur.it.boundary());
    let step = if right {
        line.step_right(pos, boundary)
    } else {
        line.step_left(pos, boundary)
    };
    let Some(step) = step else {
        // off the screen edge of the row: on to the neighbouring paragraph
        return if right != rtl {
            to_paragraph_start(cur, doc, pit + 1)
        } else {
            to_paragraph_end(cur, doc, pit.checked_sub(1))
        };
    };
    trace!(pos, to = step.pos, crossed = step.crossed, "visual step");

    if doc.inset(pit, step.crossed).is_some_and(|atom| math_nav::can_enter(cur, atom)) {
        cur.it.set_pos(step.crossed);
        cur.it.set_boundary(false);
        // formulas are laid out left to right whatever the text direction
        if cur.enter_next(doc, right) {
            return Outcome::moved();
        }
    }
    cur.it.set_pos(step.pos);
    cur.it.set_boundary(step.boundary);
    Outcome::moved()
}

fn to_paragraph_start(cur: &mut Cursor, doc: &Document, pit: usize) -> Outcome {
    if pit >= doc.len() {
        return Outcome::NotHandled;
    }
    cur.it = DocIterator::at(pit, 0);
    Outcome::moved()
}

fn to_paragraph_end(cur: &mut Cursor, doc: &Document, pit: Option<usize>) -> Outcome {
    let Some(pit) = pit else {
        return Outcome::NotHandled;
    };
    cur.it = DocIterator::at(pit, paragraph_len(doc, pit));
    Outcome::moved()
}

/// Move to the paragraph above or below, keeping the screen x when the rows
/// have been drawn
fn up_down(cur: &mut Cursor, ctx: &DispatchContext<'_>, up: bool) -> Outcome {
    let doc = &*ctx.doc;
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    let target = if up { pit.checked_sub(1) } else { Some(pit + 1) };
    let Some(target) = target.filter(|&t| t < doc.len()) else {
        return Outcome::NotHandled;
    };
    if cur.target_x.is_none() {
        cur.target_x = ctx.coords.row(pit).map(|g| g.x_of(pos));
    }
    let len = paragraph_len(doc, target);
    let new_pos = match (cur.target_x, ctx.coords.row(target)) {
        (Some(x), Some(row)) => row.pos_of(x).min(len),
        _ => pos.min(len),
    };
    cur.it = DocIterator::at(target, new_pos);
    Outcome::moved()
}

fn select_all(cur: &mut Cursor, doc: &Document) -> Outcome {
    let last = doc.len().saturating_sub(1);
    let end = DocIterator::at(last, paragraph_len(doc, last));
    cur.select(DocIterator::at(0, 0), end);
    Outcome::moved()
}

// =============================================================================
// Editing
// =============================================================================

fn self_insert(cur: &mut Cursor, doc: &mut Document, text: &str) -> Outcome {
    cur.erase_selection(doc);
    let pit = cur.it.pit();
    let mut pos = cur.it.pos();
    let Some(par) = doc.paragraph_mut(pit) else {
        return Outcome::NotHandled;
    };
    for c in text.chars() {
        par.insert_char(pos, c);
        pos += 1;
    }
    cur.it.set_pos(pos);
    cur.it.set_boundary(false);
    Outcome::changed()
}

/// Whether a formula is worth selecting before it is deleted
fn has_content(atom: &MathAtom) -> bool {
    atom.inset().cells().any(|c| !c.is_empty())
}

fn delete_backward(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    if cur.erase_selection(doc) {
        return Outcome::changed();
    }
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    if pos > 0 {
        if doc.inset(pit, pos - 1).is_some_and(has_content) {
            let anchor = cur.it.clone();
            cur.select(anchor, DocIterator::at(pit, pos - 1));
            return Outcome::moved();
        }
        if let Some(par) = doc.paragraph_mut(pit) {
            par.erase(pos - 1);
        }
        cur.it.set_pos(pos - 1);
        return Outcome::changed();
    }
    if pit == 0 {
        return Outcome::NotHandled;
    }
    let joint = paragraph_len(doc, pit - 1);
    doc.merge_with_next(pit - 1);
    cur.it = DocIterator::at(pit - 1, joint);
    Outcome::changed()
}

fn delete_forward(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    if cur.erase_selection(doc) {
        return Outcome::changed();
    }
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    if pos < paragraph_len(doc, pit) {
        if doc.inset(pit, pos).is_some_and(has_content) {
            let anchor = cur.it.clone();
            cur.select(anchor, DocIterator::at(pit, pos + 1));
            return Outcome::moved();
        }
        if let Some(par) = doc.paragraph_mut(pit) {
            par.erase(pos);
        }
        return Outcome::changed();
    }
    if doc.merge_with_next(pit) {
        Outcome::changed()
    } else {
        Outcome::NotHandled
    }
}

fn break_paragraph(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    cur.erase_selection(doc);
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    doc.split_paragraph(pit, pos);
    cur.it = DocIterator::at(pit + 1, 0);
    Outcome::changed()
}

/// Insert an empty formula, or wrap the selected text in one, and put the
/// cursor at the end of its content
fn open_formula(cur: &mut Cursor, doc: &mut Document, hull_type: HullType) -> Outcome {
    let content = cur
        .take_selection(doc)
        .map(Selected::into_math)
        .unwrap_or_default();
    let len = content.len();
    let atom = MathAtom::new(InsetMath::Hull(HullInset::with_content(hull_type, content)));
    let id = atom.id();
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    let Some(par) = doc.paragraph_mut(pit) else {
        return Outcome::NotHandled;
    };
    par.insert_inset(pos, atom);
    cur.it.push(id, 0);
    cur.it.set_pos(len);
    Outcome::changed()
}

/// `math-insert` in text opens an inline formula and inserts there
fn math_insert(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, source: &str) -> Outcome {
    let selected = cur.take_selection(ctx.doc).map(Selected::into_math);
    if open_formula(cur, ctx.doc, HullType::Simple) == Outcome::NotHandled {
        return Outcome::NotHandled;
    }
    if let Some(selected) = selected.filter(|s| !s.is_empty()) {
        let len = selected.len();
        if let Some(cell) = cur.it.cell_mut(ctx.doc) {
            cell.insert_data(0, selected);
        }
        // the inserted node wraps what was selected
        let mut anchor = cur.it.clone();
        anchor.set_pos(0);
        let mut it = cur.it.clone();
        it.set_pos(len);
        cur.select(anchor, it);
    }
    math_edit::math_insert(cur, ctx, source);
    Outcome::changed()
}
