//! Macro mode and macro commands
//!
//! Typing `\` inserts an open unknown command right before the cursor.
//! Letters extend its name; anything else closes it, and the name is turned
//! into the node it stands for.

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::{DispatchResult, Outcome};
use crate::func::{FuncCode, FuncRequest};
use doc_model::Document;
use math::{
    attach_arguments, create_inset_math, AttachPolicy, DisplayMode, GlobalMacroRegistry, InsetMath,
    MacroContext, MacroData, MathAtom, MathData,
};
use std::sync::Arc;
use tracing::debug;

/// What a typed character did in macro mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MacroChar {
    /// Part of the name, or the space that ended it
    Consumed,
    /// The name was closed; the character still has to be inserted
    Passed,
    /// `\\` was typed: a line break is wanted
    Newline,
}

pub(crate) fn in_macro_mode(cur: &Cursor, doc: &Document) -> bool {
    current_name(cur, doc).is_some()
}

/// Name typed so far
fn current_name(cur: &Cursor, doc: &Document) -> Option<String> {
    if !cur.it.in_math() {
        return None;
    }
    let unknown = cur.it.prev_atom(doc)?.inset().as_unknown()?;
    (!unknown.is_final).then(|| unknown.name.clone())
}

fn name_mut<'d>(cur: &Cursor, doc: &'d mut Document) -> Option<&'d mut String> {
    let at = cur.it.pos().checked_sub(1)?;
    let unknown = cur.it.cell_mut(doc)?.get_mut(at)?.inset_mut().as_unknown_mut()?;
    (!unknown.is_final).then_some(&mut unknown.name)
}

/// Enter macro mode at the cursor, taking the selection along
pub(crate) fn start(cur: &mut Cursor, doc: &mut Document) {
    cur.grabbed = cur.take_cell_selection(doc);
    let pos = cur.it.pos();
    if let Some(cell) = cur.it.cell_mut(doc) {
        cell.insert(pos, MathAtom::new(InsetMath::unknown("", false)));
        cur.it.set_pos(pos + 1);
    }
}

pub(crate) fn interpret(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, c: char) -> MacroChar {
    let Some(name) = current_name(cur, ctx.doc) else {
        return MacroChar::Passed;
    };
    if c.is_ascii_alphabetic() {
        if let Some(name) = name_mut(cur, ctx.doc) {
            name.push(c);
        }
        return MacroChar::Consumed;
    }
    if name.is_empty() {
        if c == '\\' {
            discard(cur, ctx.doc);
            return MacroChar::Newline;
        }
        // a single non-letter is a complete name: `\,` or `\{`
        if let Some(name) = name_mut(cur, ctx.doc) {
            name.push(c);
        }
        close(cur, ctx);
        return MacroChar::Consumed;
    }
    close(cur, ctx);
    if c == ' ' {
        MacroChar::Consumed
    } else {
        MacroChar::Passed
    }
}

/// Drop the open command and put the grabbed selection back
fn discard(cur: &mut Cursor, doc: &mut Document) {
    let Some(at) = cur.it.pos().checked_sub(1) else {
        return;
    };
    let grabbed = cur.grabbed.take().unwrap_or_default();
    let len = grabbed.len();
    if let Some(cell) = cur.it.cell_mut(doc) {
        cell.erase(at);
        cell.insert_data(at, grabbed);
        cur.it.set_pos(at + len);
    }
}

/// Delete the last typed letter, leaving macro mode when none is left
pub(crate) fn backspace(cur: &mut Cursor, doc: &mut Document) {
    match name_mut(cur, doc) {
        Some(name) if !name.is_empty() => {
            name.pop();
        }
        _ => discard(cur, doc),
    }
}

/// Turn the open command into its node
///
/// Returns false when the cursor was not in macro mode.
pub(crate) fn close(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> bool {
    let Some(name) = current_name(cur, ctx.doc) else {
        return false;
    };
    let at = cur.it.pos() - 1;
    let grabbed = cur.grabbed.take().unwrap_or_default();
    let local = ctx.doc.macros_at(&cur.it);
    let macros = MacroContext::with_tables(Some(&local), GlobalMacroRegistry::instance().table());
    let (inset, definition) = if name.is_empty() {
        (InsetMath::char('\\'), None)
    } else {
        let inset = create_inset_math(&name, &macros);
        let definition = matches!(inset, InsetMath::Macro(_)).then(|| macros.get(&name)).flatten();
        (inset, definition)
    };
    debug!(name = %name, "macro mode closed");

    let Some(cell) = cur.it.cell_mut(ctx.doc) else {
        return false;
    };
    cell.erase(at);
    cell.insert(at, MathAtom::new(inset));
    if let Some(definition) = definition {
        attach_arguments(cell, at, &definition, ctx.settings.math.attach_policy());
        if let Some(m) = cell.get_mut(at).and_then(|a| a.inset_mut().as_macro_mut()) {
            m.set_display(DisplayMode::Normal);
        }
    }

    if !grabbed.is_empty() {
        let target = cell.get_mut(at).and_then(|a| {
            let inset = a.inset_mut();
            let first = inset.idx_first();
            inset.cell_mut(first)
        });
        match target {
            Some(target) => target.insert_data(0, grabbed),
            None => cell.insert_data(at + 1, grabbed),
        }
    }

    cur.it.set_pos(at);
    if !enter_first_empty(cur, ctx.doc) {
        cur.it.set_pos(at + 1);
    }
    true
}

/// Enter the first empty cell of the atom after the cursor
///
/// Cells are tried from the entry cell onward, then the ones before it.
pub(crate) fn enter_first_empty(cur: &mut Cursor, doc: &Document) -> bool {
    let Some(atom) = cur.it.next_atom(doc).or_else(|| {
        (cur.it.depth() == 1)
            .then(|| doc.inset(cur.it.pit(), cur.it.pos()))
            .flatten()
    }) else {
        return false;
    };
    let inset = atom.inset();
    let first = inset.idx_first();
    let Some(idx) = (first..inset.nargs())
        .chain(0..first)
        .find(|&i| inset.cell(i).is_some_and(MathData::is_empty))
    else {
        return false;
    };
    let id = atom.id();
    cur.it.push(id, idx);
    true
}

// =============================================================================
// Folding
// =============================================================================

/// Fold or unfold the macro beside the cursor
pub(crate) fn fold(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, unfold: bool) -> Outcome {
    let pos = cur.it.pos();
    let Some(cell) = cur.it.cell_mut(ctx.doc) else {
        return Outcome::NotHandled;
    };
    let candidates = [pos.checked_sub(1), Some(pos)];
    for at in candidates.into_iter().flatten() {
        let Some(m) = cell.get_mut(at).and_then(|a| a.inset_mut().as_macro_mut()) else {
            continue;
        };
        if m.is_unfolded() == unfold {
            continue;
        }
        if unfold {
            m.unfold();
        } else {
            m.fold();
        }
        return Outcome::changed();
    }
    Outcome::NotHandled
}

// =============================================================================
// Templates
// =============================================================================

/// Template parameter commands, run on a definition at or around the cursor
///
/// Returns `None` for other commands.
pub(crate) fn dispatch_at_point(
    cur: &mut Cursor,
    ctx: &mut DispatchContext<'_>,
    cmd: &FuncRequest,
) -> Option<DispatchResult> {
    if !matches!(
        cmd.code,
        FuncCode::MathMacroAddParam
            | FuncCode::MathMacroRemoveParam
            | FuncCode::MathMacroMakeOptional
            | FuncCode::MathMacroMakeNonOptional
    ) {
        return None;
    }
    let Some((pit, pos)) = locate_template(cur, ctx.doc) else {
        return Some(DispatchResult::refused());
    };
    // arguments are numbered from 1 as in `#1`
    let arg = cmd
        .argument
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1));
    let template = ctx.doc.inset_mut(pit, pos)?.inset_mut().as_template_mut()?;
    let arity = template.arity();
    let done = match cmd.code {
        FuncCode::MathMacroAddParam => template.add_param(arg.unwrap_or(arity)),
        FuncCode::MathMacroRemoveParam => template.remove_param(arg.unwrap_or(arity.saturating_sub(1))),
        FuncCode::MathMacroMakeOptional => template.make_optional(arg.unwrap_or(0)),
        _ => template.make_non_optional(arg.unwrap_or(0)),
    };
    if !done {
        return Some(DispatchResult::handled().with_message(format!(
            "cannot {} for \\{}",
            cmd.code.name().trim_start_matches("math-macro-"),
            template.name()
        )));
    }
    let name = template.name();
    let definition = Arc::new(template.to_macro_data());
    let updated = reattach_instances(ctx.doc, (pit, pos), &name, &definition);
    debug!(name = %name, arity = definition.arity(), updated, "macro template changed");
    Some(DispatchResult::changed())
}

/// Paragraph position of the definition the cursor is in or beside
fn locate_template(cur: &Cursor, doc: &Document) -> Option<(usize, usize)> {
    let root = cur.it.bottom();
    let (pit, pos) = (root.idx, root.pos);
    let is_template = |p: usize| doc.inset(pit, p).is_some_and(|a| a.inset().as_template().is_some());
    if cur.it.depth() > 1 {
        return is_template(pos).then_some((pit, pos));
    }
    [Some(pos), pos.checked_sub(1)]
        .into_iter()
        .flatten()
        .find(|&p| is_template(p))
        .map(|p| (pit, p))
}

/// Re-attach arguments of every use of `name` after the definition at
/// `at`, up to the next definition of the same name
///
/// Arguments are attached greedily so content typed after a use becomes the
/// new argument. Returns the number of instances touched.
fn reattach_instances(doc: &mut Document, at: (usize, usize), name: &str, definition: &Arc<MacroData>) -> usize {
    let mut updated = 0;
    for (pit, par) in doc.paragraphs_mut().iter_mut().enumerate().skip(at.0) {
        for (pos, atom) in par.insets_mut() {
            if (pit, pos) <= at {
                continue;
            }
            if atom.inset().as_template().is_some_and(|t| t.name() == name) {
                return updated;
            }
            updated += reattach_in(atom.inset_mut(), name, definition);
        }
    }
    updated
}

fn reattach_in(inset: &mut InsetMath, name: &str, definition: &Arc<MacroData>) -> usize {
    let mut updated = 0;
    for idx in 0..inset.nargs() {
        let Some(cell) = inset.cell_mut(idx) else {
            continue;
        };
        let mut pos = 0;
        while pos < cell.len() {
            if let Some(m) = cell.get_mut(pos).and_then(|a| a.inset_mut().as_macro_mut()) {
                if m.name() == name {
                    m.invalidate();
                    attach_arguments(cell, pos, definition, AttachPolicy::Greedy);
                    updated += 1;
                }
            }
            if let Some(atom) = cell.get_mut(pos) {
                updated += reattach_in(atom.inset_mut(), name, definition);
            }
            pos += 1;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{BufferParams, DocIterator, EditorSettings};
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

        fn ctx(&mut self) -> DispatchContext<'_> {
            DispatchContext {
                doc: &mut self.doc,
                coords: &self.coords,
                settings: &self.settings,
                cas: None,
                clipboard: &mut self.clipboard,
            }
        }
    }

    fn in_formula(doc: &Document, pit: usize, pos: usize) -> Cursor {
        let hull = doc.inset(pit, 0).unwrap().id();
        let mut it = DocIterator::at(pit, 0);
        it.push(hull, 0);
        it.set_pos(pos);
        Cursor::at(it)
    }

    #[test]
    fn test_typed_name_becomes_fraction() {
        let mut fx = Fixture::new("$x$");
        let mut cur = in_formula(&fx.doc, 0, 1);
        start(&mut cur, &mut fx.doc);
        assert!(in_macro_mode(&cur, &fx.doc));
        let mut ctx = fx.ctx();
        for c in "frac".chars() {
            assert_eq!(interpret(&mut cur, &mut ctx, c), MacroChar::Consumed);
        }
        assert_eq!(interpret(&mut cur, &mut ctx, ' '), MacroChar::Consumed);
        assert!(!in_macro_mode(&cur, &fx.doc));
        // the cursor waits in the empty numerator
        assert_eq!(cur.it.depth(), 3);
        assert_eq!(fx.doc.to_latex(), "$x\\frac{}{}$");
    }

    #[test]
    fn test_non_letter_closes_and_passes() {
        let mut fx = Fixture::new("$x$");
        let mut cur = in_formula(&fx.doc, 0, 1);
        start(&mut cur, &mut fx.doc);
        let mut ctx = fx.ctx();
        for c in "alpha".chars() {
            interpret(&mut cur, &mut ctx, c);
        }
        assert_eq!(interpret(&mut cur, &mut ctx, '+'), MacroChar::Passed);
        assert_eq!(cur.it.pos(), 2);
        assert_eq!(fx.doc.to_latex(), "$x\\alpha$");
    }

    #[test]
    fn test_backspace_leaves_macro_mode() {
        let mut fx = Fixture::new("$x$");
        let mut cur = in_formula(&fx.doc, 0, 1);
        start(&mut cur, &mut fx.doc);
        let mut ctx = fx.ctx();
        interpret(&mut cur, &mut ctx, 'a');
        backspace(&mut cur, ctx.doc);
        assert!(in_macro_mode(&cur, ctx.doc));
        backspace(&mut cur, ctx.doc);
        assert!(!in_macro_mode(&cur, &fx.doc));
        assert_eq!(cur.it.pos(), 1);
        assert_eq!(fx.doc.to_latex(), "$x$");
    }

    #[test]
    fn test_grabbed_selection_fills_first_cell() {
        let mut fx = Fixture::new("$ab$");
        let mut cur = in_formula(&fx.doc, 0, 2);
        let anchor = {
            let mut a = cur.it.clone();
            a.set_pos(0);
            a
        };
        cur.select(anchor, cur.it.clone());
        start(&mut cur, &mut fx.doc);
        let mut ctx = fx.ctx();
        for c in "sqrt".chars() {
            interpret(&mut cur, &mut ctx, c);
        }
        close(&mut cur, &mut ctx);
        assert_eq!(fx.doc.to_latex(), "$\\sqrt{ab}$");
        // the radicand is not empty, so the cursor stays outside
        assert_eq!(cur.it.depth(), 2);
        assert_eq!(cur.it.pos(), 1);
    }

    #[test]
    fn test_user_macro_gets_empty_arguments() {
        let mut fx = Fixture::new("\\newcommand{\\pair}[2]{(#1,#2)}\n\n$y$");
        let mut cur = in_formula(&fx.doc, 1, 0);
        start(&mut cur, &mut fx.doc);
        let mut ctx = fx.ctx();
        for c in "pair".chars() {
            interpret(&mut cur, &mut ctx, c);
        }
        close(&mut cur, &mut ctx);
        let hull = fx.doc.inset(1, 0).unwrap().inset();
        let m = hull.cell(0).unwrap()[0].inset().as_macro().unwrap();
        assert_eq!(m.args().len(), 2);
        // non-greedy: the following y stays outside
        assert_eq!(hull.cell(0).unwrap().len(), 2);
        assert_eq!(cur.it.depth(), 3);
    }

    #[test]
    fn test_template_earlier_in_formula_is_known() {
        let mut fx = Fixture::new("$\\newcommand{\\pair}[2]{(#1,#2)}y$");
        let mut cur = in_formula(&fx.doc, 0, 1);
        start(&mut cur, &mut fx.doc);
        let mut ctx = fx.ctx();
        for c in "pair".chars() {
            interpret(&mut cur, &mut ctx, c);
        }
        close(&mut cur, &mut ctx);
        let cell = fx.doc.inset(0, 0).unwrap().inset().cell(0).unwrap();
        assert_eq!(cell.len(), 3);
        assert_eq!(cell[1].inset().as_macro().unwrap().args().len(), 2);
    }

    #[test]
    fn test_fold_and_unfold_beside_cursor() {
        let mut fx = Fixture::new("\\newcommand{\\sq}[1]{#1^2}\n\n$\\sq{3}$");
        let mut cur = in_formula(&fx.doc, 1, 1);
        let mut ctx = fx.ctx();
        assert_eq!(fold(&mut cur, &mut ctx, true), Outcome::changed());
        assert_eq!(fold(&mut cur, &mut ctx, true), Outcome::NotHandled);
        assert_eq!(fold(&mut cur, &mut ctx, false), Outcome::changed());
    }

    #[test]
    fn test_add_param_reattaches_following_atom() {
        let mut fx = Fixture::new("\\newcommand{\\f}{x}\n\n$\\f y$");
        let mut cur = Cursor::at(DocIterator::at(0, 1));
        let mut ctx = fx.ctx();
        let result = dispatch_at_point(&mut cur, &mut ctx, &FuncRequest::parse("math-macro-add-param")).unwrap();
        assert!(result.buffer_changed);
        let template = fx.doc.inset(0, 0).unwrap().inset().as_template().unwrap();
        assert_eq!(template.arity(), 1);
        let cell = fx.doc.inset(1, 0).unwrap().inset().cell(0).unwrap();
        assert_eq!(cell.len(), 1);
        assert_eq!(cell[0].inset().as_macro().unwrap().args()[0].to_latex(), "y");
    }

    #[test]
    fn test_template_commands_need_a_template() {
        let mut fx = Fixture::new("plain");
        let mut cur = Cursor::at(DocIterator::at(0, 2));
        let mut ctx = fx.ctx();
        let result = dispatch_at_point(&mut cur, &mut ctx, &FuncRequest::parse("math-macro-remove-param 1"));
        assert!(!result.unwrap().handled);
        assert!(dispatch_at_point(&mut cur, &mut ctx, &FuncRequest::parse("char-forward")).is_none());
    }
}
