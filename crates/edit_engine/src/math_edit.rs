//! Request handling inside a formula cell

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::{Finish, Outcome};
use crate::func::{FuncCode, FuncRequest};
use crate::macro_mode::{self, MacroChar};
use crate::{grid_edit, math_nav};
use doc_model::{DocIterator, Document};
use math::{
    create_inset_math, parse_cell_in, GlobalMacroRegistry, InsetMath, MacroContext, MathAtom, MathData,
    ParseFlags, ScriptInset, SpaceInset, SpaceKind,
};
use tracing::trace;

/// One level of the dispatch chain inside math
///
/// `popped` is set when a node nested in this cell declined the request.
pub(crate) fn dispatch(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest, popped: bool) -> Outcome {
    // any command other than typing finishes a macro name first
    if !matches!(
        cmd.code,
        FuncCode::SelfInsert | FuncCode::DeleteBackward | FuncCode::Unknown(_)
    ) {
        macro_mode::close(cur, ctx);
    }
    match &cmd.code {
        FuncCode::CharForward => math_nav::forward(cur, ctx, Finish::Forward),
        FuncCode::CharBackward => math_nav::backward(cur, ctx, Finish::Backward),
        // formulas are laid out left to right
        FuncCode::CharRight => math_nav::forward(cur, ctx, Finish::Right),
        FuncCode::CharLeft => math_nav::backward(cur, ctx, Finish::Left),
        FuncCode::Up => math_nav::up_down(cur, ctx, true, popped),
        FuncCode::Down => math_nav::up_down(cur, ctx, false, popped),
        FuncCode::LineBegin => math_nav::line_begin(cur),
        FuncCode::LineEnd => math_nav::line_end(cur, ctx),
        FuncCode::CellForward => math_nav::cell_step(cur, ctx, true),
        FuncCode::CellBackward => math_nav::cell_step(cur, ctx, false),
        FuncCode::SelectAll => select_cell(cur, ctx.doc),
        FuncCode::Escape => {
            if cur.selection {
                cur.clear_selection();
                Outcome::moved()
            } else {
                Outcome::Finished(Finish::Forward)
            }
        }
        FuncCode::SelfInsert => self_insert(cur, ctx, &cmd.argument),
        FuncCode::MathInsert => math_insert(cur, ctx, &cmd.argument),
        FuncCode::DeleteBackward => delete_backward(cur, ctx.doc),
        FuncCode::DeleteForward => delete_forward(cur, ctx.doc),
        FuncCode::Break => Outcome::message("paragraph break is not possible in math"),
        FuncCode::MathMode => text_mode(cur, ctx),
        FuncCode::Superscript => script(cur, ctx.doc, true),
        FuncCode::Subscript => script(cur, ctx.doc, false),
        FuncCode::MathMacroFold => macro_mode::fold(cur, ctx, false),
        FuncCode::MathMacroUnfold => macro_mode::fold(cur, ctx, true),
        FuncCode::NewlineInsert
        | FuncCode::TabularFeature
        | FuncCode::MathMutate
        | FuncCode::MathNumber
        | FuncCode::MathNonumber
        | FuncCode::LabelInsert
        | FuncCode::MathExtern => grid_edit::dispatch(cur, ctx, cmd),
        _ => Outcome::NotHandled,
    }
}

/// Owner of the innermost cell and that cell's index
fn owner<'d>(cur: &Cursor, doc: &'d Document) -> Option<(&'d InsetMath, usize)> {
    Some((cur.it.inner_inset(doc)?.inset(), cur.it.idx()))
}

fn in_text_cell(cur: &Cursor, doc: &Document) -> bool {
    owner(cur, doc).is_some_and(|(inset, idx)| inset.cell_is_text(idx))
}

/// Parse `source` with the macros visible at the cursor: the document's
/// definitions before it, then the global ones
pub(crate) fn parse_here(cur: &Cursor, ctx: &DispatchContext<'_>, source: &str) -> MathData {
    let local = ctx.doc.macros_at(&cur.it);
    let macros = MacroContext::with_tables(Some(&local), GlobalMacroRegistry::instance().table());
    let flags = ParseFlags {
        quiet: ctx.settings.math.quiet_parse,
        text_mode: in_text_cell(cur, ctx.doc),
    };
    parse_cell_in(source, macros, flags).data
}

/// Insert `atom` at the cursor, replacing the selection
fn insert_atom(cur: &mut Cursor, doc: &mut Document, atom: MathAtom) {
    cur.take_cell_selection(doc);
    let pos = cur.it.pos();
    if let Some(cell) = cur.it.cell_mut(doc) {
        cell.insert(pos, atom);
        cur.it.set_pos(pos + 1);
    }
}

fn select_cell(cur: &mut Cursor, doc: &Document) -> Outcome {
    let mut anchor = cur.it.clone();
    anchor.set_pos(0);
    let mut it = cur.it.clone();
    it.set_pos(cur.it.lastpos(doc));
    cur.select(anchor, it);
    Outcome::moved()
}

// =============================================================================
// Typing
// =============================================================================

fn self_insert(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, text: &str) -> Outcome {
    for c in text.chars() {
        interpret_char(cur, ctx, c);
    }
    Outcome::changed()
}

/// Apply one typed character
pub(crate) fn interpret_char(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, c: char) {
    trace!(%c, "math char");
    let verbatim = owner(cur, ctx.doc).is_some_and(|(inset, idx)| inset.cell_is_verbatim(idx));
    if verbatim {
        insert_atom(cur, ctx.doc, MathAtom::new(InsetMath::char(c)));
        return;
    }
    match macro_mode::interpret(cur, ctx, c) {
        MacroChar::Consumed => return,
        MacroChar::Newline => {
            grid_edit::newline(cur, ctx);
            return;
        }
        MacroChar::Passed => {}
    }
    if c == '\\' {
        macro_mode::start(cur, ctx.doc);
        return;
    }
    if in_text_cell(cur, ctx.doc) {
        insert_atom(cur, ctx.doc, MathAtom::new(InsetMath::char(c)));
        return;
    }

    let doc = &mut *ctx.doc;
    match c {
        '^' | '_' => {
            script(cur, doc, c == '^');
        }
        '{' => {
            let selected = cur.take_cell_selection(doc).unwrap_or_default();
            let len = selected.len();
            let atom = MathAtom::new(InsetMath::brace(selected));
            let id = atom.id();
            let pos = cur.it.pos();
            if let Some(cell) = cur.it.cell_mut(doc) {
                cell.insert(pos, atom);
                cur.it.push(id, 0);
                cur.it.set_pos(len);
            }
        }
        '}' if owner(cur, doc).is_some_and(|(inset, _)| matches!(inset, InsetMath::Brace(_))) => {
            cur.leave_forward();
        }
        ' ' => {
            let at_end = cur.it.pos() == cur.it.lastpos(doc);
            let leaves = at_end
                && !cur.selection
                && owner(cur, doc).is_some_and(|(inset, _)| !matches!(inset, InsetMath::Hull(_)));
            if leaves {
                cur.leave_forward();
            } else {
                insert_atom(cur, doc, MathAtom::new(InsetMath::Space(SpaceInset::new(SpaceKind::Normal))));
            }
        }
        '&' if owner(cur, doc).is_some_and(|(inset, _)| inset.as_grid().is_some()) => {
            let idx = cur.it.idx();
            if let Some(next) = owner(cur, doc).and_then(|(inset, _)| inset.idx_next(idx)) {
                cur.it.top_mut().idx = next;
                cur.it.set_pos(0);
            }
        }
        _ => insert_atom(cur, doc, MathAtom::new(InsetMath::char(c))),
    }
}

/// Insert parsed LaTeX
///
/// A single inserted node takes the selection into its first empty cell;
/// the cursor then waits in the next empty one.
pub(crate) fn math_insert(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, source: &str) -> Outcome {
    let mut data = parse_here(cur, ctx, source);
    let selected = cur.take_cell_selection(ctx.doc);
    if data.len() == 1 {
        if let (Some(selected), Some(atom)) = (selected, data.get_mut(0)) {
            let inset = atom.inset_mut();
            let first = inset.idx_first();
            let target = (first..inset.nargs())
                .chain(0..first)
                .find(|&i| inset.cell(i).is_some_and(MathData::is_empty));
            if let Some(cell) = target.and_then(|i| inset.cell_mut(i)) {
                *cell = selected;
            }
        }
    }
    let len = data.len();
    let pos = cur.it.pos();
    let Some(cell) = cur.it.cell_mut(ctx.doc) else {
        return Outcome::NotHandled;
    };
    cell.insert_data(pos, data);
    if len == 1 && macro_mode::enter_first_empty(cur, ctx.doc) {
        return Outcome::changed();
    }
    cur.it.set_pos(pos + len);
    Outcome::changed()
}

/// `math-mode` inside math: open a text cell, or leave the one the cursor is in
fn text_mode(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> Outcome {
    if in_text_cell(cur, ctx.doc) {
        return Outcome::Finished(Finish::Forward);
    }
    let selected = cur.take_cell_selection(ctx.doc).unwrap_or_default();
    let len = selected.len();
    let mut inset = create_inset_math("text", &MacroContext::global_only());
    if let Some(cell) = inset.cell_mut(0) {
        *cell = selected;
    }
    let atom = MathAtom::new(inset);
    let id = atom.id();
    let pos = cur.it.pos();
    let Some(cell) = cur.it.cell_mut(ctx.doc) else {
        return Outcome::NotHandled;
    };
    cell.insert(pos, atom);
    cur.it.push(id, 0);
    cur.it.set_pos(len);
    Outcome::changed()
}

/// Attach a superscript (`up`) or subscript to the atom before the cursor
/// and move into it
pub(crate) fn script(cur: &mut Cursor, doc: &mut Document, up: bool) -> Outcome {
    let selected = cur.take_cell_selection(doc).unwrap_or_default();
    let sel_len = selected.len();

    // in the nucleus of a script node: use that node
    if cur.it.idx() == 0 && cur.it.depth() > 2 {
        if let Some(script) = cur.it.inner_inset_mut(doc).and_then(|a| a.inset_mut().as_script_mut()) {
            let idx = script.ensure(up);
            let cell = script.script_mut(up);
            let len = cell.map_or(0, |cell| {
                cell.append(selected);
                cell.len()
            });
            cur.it.top_mut().idx = idx;
            cur.it.set_pos(len);
            return Outcome::changed();
        }
    }

    let pos = cur.it.pos();
    let Some(cell) = cur.it.cell_mut(doc) else {
        return Outcome::NotHandled;
    };
    let prev_is_script = pos > 0 && cell.get(pos - 1).is_some_and(|a| a.inset().as_script().is_some());
    if prev_is_script {
        let Some(atom) = cell.get_mut(pos - 1) else {
            return Outcome::NotHandled;
        };
        let id = atom.id();
        let Some(script) = atom.inset_mut().as_script_mut() else {
            return Outcome::NotHandled;
        };
        let idx = script.ensure(up);
        let len = script.script_mut(up).map_or(0, |cell| {
            cell.append(selected);
            cell.len()
        });
        cur.it.set_pos(pos - 1);
        cur.it.push(id, idx);
        cur.it.set_pos(len);
        return Outcome::changed();
    }

    let (at, nucleus) = match pos.checked_sub(1).and_then(|p| cell.erase(p)) {
        Some(prev) => (pos - 1, MathData::single(prev)),
        None => (pos, MathData::new()),
    };
    let mut script = ScriptInset::with_script(nucleus, up);
    let idx = script.ensure(up);
    if let Some(cell) = script.script_mut(up) {
        *cell = selected;
    }
    let atom = MathAtom::new(InsetMath::Script(script));
    let id = atom.id();
    cell.insert(at, atom);
    cur.it.set_pos(at);
    cur.it.push(id, idx);
    cur.it.set_pos(sel_len);
    Outcome::changed()
}

// =============================================================================
// Deleting
// =============================================================================

/// Whether a node has content worth a confirmation before it goes
fn has_content(atom: &MathAtom) -> bool {
    atom.inset().is_active() && atom.inset().cells().any(|c| !c.is_empty())
}

fn delete_backward(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    if cur.has_nonempty_selection() {
        cur.erase_selection(doc);
        return Outcome::changed();
    }
    if macro_mode::in_macro_mode(cur, doc) {
        macro_mode::backspace(cur, doc);
        return Outcome::changed();
    }
    let pos = cur.it.pos();
    if pos > 0 {
        if cur.it.prev_atom(doc).is_some_and(has_content) {
            // select the node; the next delete removes it
            let anchor = cur.it.clone();
            let mut it = cur.it.clone();
            it.set_pos(pos - 1);
            cur.select(anchor, it);
            return Outcome::moved();
        }
        if let Some(cell) = cur.it.cell_mut(doc) {
            cell.erase(pos - 1);
        }
        cur.it.set_pos(pos - 1);
        return Outcome::changed();
    }
    at_cell_start(cur, doc)
}

/// Backspace at the start of a cell
fn at_cell_start(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    let Some((inset, idx)) = owner(cur, doc) else {
        return Outcome::NotHandled;
    };
    if inset.cells().all(MathData::is_empty) {
        return delete_owner(cur, doc);
    }
    if inset.as_grid().is_some() {
        if let Some(prev) = inset.idx_prev(idx) {
            let len = inset.cell(prev).map_or(0, MathData::len);
            cur.it.top_mut().idx = prev;
            cur.it.set_pos(len);
            return Outcome::moved();
        }
    }
    Outcome::Finished(Finish::Backward)
}

/// Remove the node owning the cursor's cell; the cursor takes its place
fn delete_owner(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    if cur.it.pop().is_none() {
        return Outcome::NotHandled;
    }
    erase_at_cursor(&cur.it, doc);
    Outcome::changed()
}

fn erase_at_cursor(it: &DocIterator, doc: &mut Document) {
    let pos = it.pos();
    if it.depth() == 1 {
        if let Some(par) = doc.paragraph_mut(it.pit()) {
            par.erase(pos);
        }
    } else if let Some(cell) = it.cell_mut(doc) {
        cell.erase(pos);
    }
}

fn delete_forward(cur: &mut Cursor, doc: &mut Document) -> Outcome {
    if cur.has_nonempty_selection() {
        cur.erase_selection(doc);
        return Outcome::changed();
    }
    let pos = cur.it.pos();
    if pos < cur.it.lastpos(doc) {
        if cur.it.next_atom(doc).is_some_and(has_content) {
            let anchor = cur.it.clone();
            let mut it = cur.it.clone();
            it.set_pos(pos + 1);
            cur.select(anchor, it);
            return Outcome::moved();
        }
        if let Some(cell) = cur.it.cell_mut(doc) {
            cell.erase(pos);
        }
        return Outcome::changed();
    }
    match owner(cur, doc) {
        Some((inset, _)) if inset.cells().all(MathData::is_empty) => delete_owner(cur, doc),
        Some(_) => Outcome::Handled(crate::DispatchResult::handled()),
        None => Outcome::NotHandled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{BufferParams, EditorSettings};
    use math::CoordCache;

    struct Fixture {
        doc: Document,
        coords: CoordCache,
        settings: EditorSettings,
        clipboard: String,
    }

    impl Fixture {
        fn new(src: &str) -> Self {
            Self {
                doc: Document::from_latex(src, BufferParams::default()).0,
                coords: CoordCache::new(),
                settings: EditorSettings::default(),
                clipboard: String::new(),
            }
        }

        fn run(&mut self, cur: &mut Cursor, cmd: &str) -> Outcome {
            let mut ctx = DispatchContext {
                doc: &mut self.doc,
                coords: &self.coords,
                settings: &self.settings,
                cas: None,
                clipboard: &mut self.clipboard,
            };
            dispatch(cur, &mut ctx, &FuncRequest::parse(cmd), false)
        }
    }

    fn in_formula(doc: &Document, pos: usize) -> Cursor {
        let hull = doc.inset(0, 0).unwrap().id();
        let mut it = DocIterator::at(0, 0);
        it.push(hull, 0);
        it.set_pos(pos);
        Cursor::at(it)
    }

    #[test]
    fn test_typing_builds_fraction_and_script() {
        let mut fx = Fixture::new("$ $");
        let mut cur = in_formula(&fx.doc, 0);
        fx.run(&mut cur, "self-insert x^2");
        assert_eq!(fx.doc.to_latex(), "$x^2$");
        assert_eq!(cur.it.depth(), 3);

        let mut cur = in_formula(&fx.doc, 1);
        fx.run(&mut cur, "self-insert \\frac 1");
        assert_eq!(fx.doc.to_latex(), "$x^2\\frac{1}{}$");
    }

    #[test]
    fn test_braces_group_and_close() {
        let mut fx = Fixture::new("$ $");
        let mut cur = in_formula(&fx.doc, 0);
        fx.run(&mut cur, "self-insert {ab}c");
        assert_eq!(fx.doc.to_latex(), "${ab}c$");
        assert_eq!(cur.it.depth(), 2);
        assert_eq!(cur.it.pos(), 2);
    }

    #[test]
    fn test_space_leaves_cell_at_end() {
        let mut fx = Fixture::new("$\\sqrt{a}$");
        let sqrt = fx.doc.inset(0, 0).unwrap().inset().cell(0).unwrap()[0].id();
        let mut cur = in_formula(&fx.doc, 0);
        cur.it.push(sqrt, 0);
        cur.it.set_pos(1);
        fx.run(&mut cur, "self-insert  b");
        assert_eq!(fx.doc.to_latex(), "$\\sqrt{a}b$");
    }

    #[test]
    fn test_math_insert_wraps_selection() {
        let mut fx = Fixture::new("$ab$");
        let mut cur = in_formula(&fx.doc, 2);
        let mut anchor = cur.it.clone();
        anchor.set_pos(0);
        cur.select(anchor, cur.it.clone());
        fx.run(&mut cur, "math-insert \\frac");
        assert_eq!(fx.doc.to_latex(), "$\\frac{ab}{}$");
        // the cursor waits in the denominator
        assert_eq!((cur.it.depth(), cur.it.idx()), (3, 1));
    }

    #[test]
    fn test_backspace_selects_then_deletes_filled_node() {
        let mut fx = Fixture::new("$a\\sqrt{b}$");
        let mut cur = in_formula(&fx.doc, 2);
        assert_eq!(fx.run(&mut cur, "char-delete-backward"), Outcome::moved());
        assert!(cur.has_selection());
        assert_eq!(fx.run(&mut cur, "char-delete-backward"), Outcome::changed());
        assert_eq!(fx.doc.to_latex(), "$a$");
        assert_eq!(cur.it.pos(), 1);
    }

    #[test]
    fn test_backspace_in_empty_node_removes_it() {
        let mut fx = Fixture::new("$a\\frac{}{}$");
        let frac = fx.doc.inset(0, 0).unwrap().inset().cell(0).unwrap()[1].id();
        let mut cur = in_formula(&fx.doc, 1);
        cur.it.push(frac, 1);
        assert_eq!(fx.run(&mut cur, "char-delete-backward"), Outcome::changed());
        assert_eq!(fx.doc.to_latex(), "$a$");
        assert_eq!((cur.it.depth(), cur.it.pos()), (2, 1));
    }

    #[test]
    fn test_backspace_at_filled_cell_start_leaves() {
        let mut fx = Fixture::new("$\\frac{a}{b}$");
        let frac = fx.doc.inset(0, 0).unwrap().inset().cell(0).unwrap()[0].id();
        let mut cur = in_formula(&fx.doc, 0);
        cur.it.push(frac, 0);
        assert_eq!(fx.run(&mut cur, "char-delete-backward"), Outcome::Finished(Finish::Backward));
    }

    #[test]
    fn test_delete_forward_at_end_is_noop() {
        let mut fx = Fixture::new("$ab$");
        let mut cur = in_formula(&fx.doc, 2);
        let outcome = fx.run(&mut cur, "char-delete-forward");
        assert!(matches!(outcome, Outcome::Handled(r) if !r.buffer_changed));
        let mut cur = in_formula(&fx.doc, 0);
        fx.run(&mut cur, "char-delete-forward");
        assert_eq!(fx.doc.to_latex(), "$b$");
    }

    #[test]
    fn test_subscript_on_existing_script() {
        let mut fx = Fixture::new("$x^2$");
        let mut cur = in_formula(&fx.doc, 1);
        fx.run(&mut cur, "math-subscript");
        fx.run(&mut cur, "self-insert i");
        assert_eq!(fx.doc.to_latex(), "$x_i^2$");
    }

    #[test]
    fn test_text_cell_takes_characters_literally() {
        let mut fx = Fixture::new("$ $");
        let mut cur = in_formula(&fx.doc, 0);
        fx.run(&mut cur, "math-mode");
        fx.run(&mut cur, "self-insert a^b c");
        assert_eq!(cur.it.depth(), 3);
        let text = fx.doc.inset(0, 0).unwrap().inset().cell(0).unwrap()[0].inset().cell(0).unwrap().len();
        assert_eq!(text, 5);
    }

    #[test]
    fn test_break_reports_message() {
        let mut fx = Fixture::new("$a$");
        let mut cur = in_formula(&fx.doc, 1);
        let Outcome::Handled(result) = fx.run(&mut cur, "break-paragraph") else {
            panic!("expected a message");
        };
        assert!(result.message.is_some());
        assert!(!result.buffer_changed);
    }
}
