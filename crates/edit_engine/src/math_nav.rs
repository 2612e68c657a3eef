//! Cursor movement inside formulas

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::{Finish, Outcome};
use math::{InsetMath, MathAtom, MathData};

/// Whether the cursor may enter `atom` from the current level
///
/// While selecting, only the node holding the anchor can be entered, so a
/// selection never ends up spanning cells of an unrelated node.
pub(crate) fn can_enter(cur: &Cursor, atom: &MathAtom) -> bool {
    if !atom.inset().is_active() {
        return false;
    }
    if !cur.selection {
        return true;
    }
    let depth = cur.it.depth();
    cur.anchor.depth() > depth
        && cur.anchor.slice(depth).and_then(|s| s.owner_id()) == Some(atom.id())
}

pub(crate) fn forward(cur: &mut Cursor, ctx: &DispatchContext<'_>, finish: Finish) -> Outcome {
    let doc = &*ctx.doc;
    if cur.it.next_atom(doc).is_some_and(|a| can_enter(cur, a)) && cur.enter_next(doc, true) {
        return Outcome::moved();
    }
    let pos = cur.it.pos();
    if pos < cur.it.lastpos(doc) {
        cur.it.set_pos(pos + 1);
        return Outcome::moved();
    }
    let idx = cur.it.idx();
    if let Some(next) = cur.it.inner_inset(doc).and_then(|a| a.inset().idx_forward(idx)) {
        cur.it.top_mut().idx = next;
        cur.it.set_pos(0);
        return Outcome::moved();
    }
    Outcome::Finished(finish)
}

pub(crate) fn backward(cur: &mut Cursor, ctx: &DispatchContext<'_>, finish: Finish) -> Outcome {
    let doc = &*ctx.doc;
    if cur.it.prev_atom(doc).is_some_and(|a| can_enter(cur, a)) && cur.enter_prev(doc) {
        return Outcome::moved();
    }
    let pos = cur.it.pos();
    if pos > 0 {
        cur.it.set_pos(pos - 1);
        return Outcome::moved();
    }
    let idx = cur.it.idx();
    let inner = cur.it.inner_inset(doc).map(MathAtom::inset);
    if let Some((prev, len)) = inner.and_then(|inset| {
        let prev = inset.idx_backward(idx)?;
        Some((prev, inset.cell(prev).map_or(0, MathData::len)))
    }) {
        cur.it.top_mut().idx = prev;
        cur.it.set_pos(len);
        return Outcome::moved();
    }
    Outcome::Finished(finish)
}

/// Vertical movement
///
/// Scripts right next to the cursor are tried first, then the cell above or
/// below inside the owning node. `popped` is set when a child node already
/// gave up, so the scripts beside it are not re-entered.
pub(crate) fn up_down(cur: &mut Cursor, ctx: &DispatchContext<'_>, up: bool, popped: bool) -> Outcome {
    let doc = &*ctx.doc;
    let Some(owner) = cur.it.top().owner_id() else {
        return Outcome::NotHandled;
    };
    let idx = cur.it.idx();
    let pos = cur.it.pos();
    let here = ctx.coords.cell(owner, idx);
    if cur.target_x.is_none() {
        cur.target_x = here.map(|g| g.x_of(pos));
    }

    if !popped && !cur.selection {
        if let Some(outcome) = enter_adjacent_script(cur, ctx, up) {
            return outcome;
        }
    }

    let Some(inset) = cur.it.inner_inset(doc).map(MathAtom::inset) else {
        return Outcome::NotHandled;
    };
    let Some(target) = inset.idx_up_down(idx, up) else {
        return Outcome::Finished(if up { Finish::Up } else { Finish::Down });
    };
    let len = inset.cell(target).map_or(0, MathData::len);
    let new_pos = match (cur.target_x, ctx.coords.cell(owner, target)) {
        (Some(x), Some(geometry)) => geometry.pos_of(x).min(len),
        _ => pos.min(len),
    };
    cur.it.top_mut().idx = target;
    cur.it.set_pos(new_pos);
    Outcome::moved()
}

/// Step into the script of the node before or after the cursor
fn enter_adjacent_script(cur: &mut Cursor, ctx: &DispatchContext<'_>, up: bool) -> Option<Outcome> {
    let doc = &*ctx.doc;
    let pos = cur.it.pos();
    let screen_ok = |script: &MathAtom, sidx: usize| -> bool {
        let (Some(owner), Some(script_geom)) = (cur.it.top().owner_id(), ctx.coords.cell(script.id(), sidx)) else {
            return true;
        };
        let Some(here) = ctx.coords.cell(owner, cur.it.idx()) else {
            return true;
        };
        // screen y grows downward
        if up {
            script_geom.origin.y < here.origin.y
        } else {
            script_geom.origin.y > here.origin.y
        }
    };

    let script_cell = |atom: &MathAtom| -> Option<(usize, usize)> {
        let InsetMath::Script(script) = atom.inset() else {
            return None;
        };
        let sidx = script.idx_of_script(up)?;
        let len = atom.inset().cell(sidx).map_or(0, MathData::len);
        Some((sidx, len))
    };

    if let Some(prev) = cur.it.prev_atom(doc) {
        if let Some((sidx, len)) = script_cell(prev).filter(|&(sidx, _)| screen_ok(prev, sidx)) {
            let id = prev.id();
            cur.it.set_pos(pos - 1);
            cur.it.push(id, sidx);
            cur.it.set_pos(len);
            return Some(Outcome::moved());
        }
    }
    if let Some(next) = cur.it.next_atom(doc) {
        if let Some((sidx, _)) = script_cell(next).filter(|&(sidx, _)| screen_ok(next, sidx)) {
            let id = next.id();
            cur.it.push(id, sidx);
            return Some(Outcome::moved());
        }
    }
    None
}

pub(crate) fn line_begin(cur: &mut Cursor) -> Outcome {
    if cur.it.pos() == 0 {
        return Outcome::NotHandled;
    }
    cur.it.set_pos(0);
    Outcome::moved()
}

pub(crate) fn line_end(cur: &mut Cursor, ctx: &DispatchContext<'_>) -> Outcome {
    let last = cur.it.lastpos(ctx.doc);
    if cur.it.pos() == last {
        return Outcome::NotHandled;
    }
    cur.it.set_pos(last);
    Outcome::moved()
}

/// Move to the start of the next or previous cell in tab order
pub(crate) fn cell_step(cur: &mut Cursor, ctx: &DispatchContext<'_>, forward: bool) -> Outcome {
    let idx = cur.it.idx();
    let target = cur.it.inner_inset(ctx.doc).and_then(|a| {
        if forward {
            a.inset().idx_next(idx)
        } else {
            a.inset().idx_prev(idx)
        }
    });
    match target {
        Some(target) => {
            cur.it.top_mut().idx = target;
            cur.it.set_pos(0);
            Outcome::moved()
        }
        None => Outcome::NotHandled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{BufferParams, DocIterator, Document, EditorSettings};
    use math::{AtomId, CoordCache};

    fn setup(src: &str) -> (Document, AtomId) {
        let doc = Document::from_latex(src, BufferParams::default()).0;
        let hull = doc.inset(0, 0).unwrap().id();
        (doc, hull)
    }

    fn in_hull(hull: AtomId, idx: usize, pos: usize) -> Cursor {
        let mut it = DocIterator::at(0, 0);
        it.push(hull, idx);
        it.set_pos(pos);
        Cursor::at(it)
    }

    macro_rules! ctx {
        ($doc:expr, $coords:expr, $settings:expr, $clip:expr) => {
            DispatchContext {
                doc: &mut $doc,
                coords: &$coords,
                settings: &$settings,
                cas: None,
                clipboard: &mut $clip,
            }
        };
    }

    #[test]
    fn test_forward_enters_fraction_numerator() {
        let (mut doc, hull) = setup("$a\\frac{b}{c}$");
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 1);

        assert_eq!(forward(&mut cur, &ctx, Finish::Forward), Outcome::moved());
        assert_eq!(cur.it.depth(), 3);
        assert_eq!((cur.it.idx(), cur.it.pos()), (0, 0));

        forward(&mut cur, &ctx, Finish::Forward);
        // the numerator has no cell after it in forward order
        assert_eq!(forward(&mut cur, &ctx, Finish::Forward), Outcome::Finished(Finish::Forward));
    }

    #[test]
    fn test_backward_enters_at_last_cell_end() {
        let (mut doc, hull) = setup("$\\frac{b}{cd}$");
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 1);

        backward(&mut cur, &ctx, Finish::Backward);
        assert_eq!(cur.it.depth(), 3);
        assert_eq!((cur.it.idx(), cur.it.pos()), (1, 2));
    }

    #[test]
    fn test_forward_walks_grid_cells() {
        let (mut doc, hull) = setup("\\begin{align}a&b\\end{align}");
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 1);

        forward(&mut cur, &ctx, Finish::Forward);
        assert_eq!((cur.it.idx(), cur.it.pos()), (1, 0));
        backward(&mut cur, &ctx, Finish::Backward);
        assert_eq!((cur.it.idx(), cur.it.pos()), (0, 1));
    }

    #[test]
    fn test_up_goes_from_denominator_to_numerator() {
        let (mut doc, hull) = setup("$\\frac{ab}{c}$");
        let frac = doc.inset(0, 0).unwrap().inset().cell(0).unwrap()[0].id();
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 0);
        cur.it.push(frac, 1);
        cur.it.set_pos(1);

        assert_eq!(up_down(&mut cur, &ctx, true, false), Outcome::moved());
        assert_eq!((cur.it.idx(), cur.it.pos()), (0, 1));
        assert_eq!(up_down(&mut cur, &ctx, true, false), Outcome::Finished(Finish::Up));
    }

    #[test]
    fn test_up_enters_superscript_before_cursor() {
        let (mut doc, hull) = setup("$x^{23}$");
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 1);

        assert_eq!(up_down(&mut cur, &ctx, true, false), Outcome::moved());
        assert_eq!(cur.it.depth(), 3);
        assert_eq!(cur.it.pos(), 2);
        // no subscript to enter
        let mut cur = in_hull(hull, 0, 1);
        assert_eq!(up_down(&mut cur, &ctx, false, false), Outcome::Finished(Finish::Down));
    }

    #[test]
    fn test_line_edges_and_cell_steps() {
        let (mut doc, hull) = setup("\\begin{align}ab&c\\\\d&e\\end{align}");
        let (coords, settings, mut clip) = (CoordCache::new(), EditorSettings::default(), String::new());
        let ctx = ctx!(doc, coords, settings, clip);
        let mut cur = in_hull(hull, 0, 1);

        assert_eq!(line_end(&mut cur, &ctx), Outcome::moved());
        assert_eq!(cur.it.pos(), 2);
        assert_eq!(line_end(&mut cur, &ctx), Outcome::NotHandled);
        assert_eq!(line_begin(&mut cur), Outcome::moved());

        for expected in [1, 2, 3] {
            cell_step(&mut cur, &ctx, true);
            assert_eq!(cur.it.idx(), expected);
        }
        assert_eq!(cell_step(&mut cur, &ctx, true), Outcome::NotHandled);
        cell_step(&mut cur, &ctx, false);
        assert_eq!(cur.it.idx(), 2);
    }
}
