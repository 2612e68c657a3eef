//! Copy, cut and paste through a LaTeX clipboard

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::DispatchResult;
use crate::func::{FuncCode, FuncRequest};
use crate::math_edit;
use doc_model::{DocIterator, Document};
use tracing::debug;

/// Handle a clipboard request; `None` when there is nothing to copy or paste
pub(crate) fn dispatch(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest) -> Option<DispatchResult> {
    match cmd.code {
        FuncCode::Copy => {
            copy(cur, ctx)?;
            Some(DispatchResult::handled())
        }
        FuncCode::Cut => {
            copy(cur, ctx)?;
            cur.erase_selection(ctx.doc);
            Some(DispatchResult::changed())
        }
        FuncCode::Paste => {
            let source = if cmd.argument.is_empty() {
                ctx.clipboard.clone()
            } else {
                cmd.argument.clone()
            };
            if source.is_empty() {
                return None;
            }
            if cur.it.in_math() {
                paste_math(cur, ctx, &source);
            } else {
                paste_text(cur, ctx.doc, &source);
            }
            Some(DispatchResult::changed())
        }
        _ => None,
    }
}

fn copy(cur: &Cursor, ctx: &mut DispatchContext<'_>) -> Option<()> {
    let latex = cur.selection_latex(ctx.doc)?;
    debug!(len = latex.len(), "copied selection");
    *ctx.clipboard = latex;
    Some(())
}

fn paste_math(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, source: &str) {
    cur.take_cell_selection(ctx.doc);
    let data = math_edit::parse_here(cur, ctx, source);
    let len = data.len();
    let pos = cur.it.pos();
    if let Some(cell) = cur.it.cell_mut(ctx.doc) {
        cell.insert_data(pos, data);
        cur.it.set_pos(pos + len);
    }
}

/// Paste paragraphs into the text
///
/// The first pasted paragraph joins the text before the cursor and the last
/// one joins the text after it.
fn paste_text(cur: &mut Cursor, doc: &mut Document, source: &str) {
    cur.erase_selection(doc);
    let (pasted, errors) = Document::from_latex(source, doc.params().clone());
    if !errors.is_empty() {
        debug!(errors = errors.len(), "pasted text had parse errors");
    }
    let (pit, pos) = (cur.it.pit(), cur.it.pos());
    doc.split_paragraph(pit, pos);

    let mut pars = pasted.paragraphs().to_vec().into_iter();
    if let (Some(first), Some(par)) = (pars.next(), doc.paragraph_mut(pit)) {
        par.append(first);
    }
    let mut last = pit;
    for par in pars {
        last += 1;
        doc.insert_paragraph(last, par);
    }
    let joint = doc.paragraph(last).map_or(0, |p| p.len());
    doc.merge_with_next(last);
    cur.it = DocIterator::at(last, joint);
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

        fn run(&mut self, cur: &mut Cursor, cmd: &str) -> Option<DispatchResult> {
            let mut ctx = DispatchContext {
                doc: &mut self.doc,
                coords: &self.coords,
                settings: &self.settings,
                cas: None,
                clipboard: &mut self.clipboard,
            };
            dispatch(cur, &mut ctx, &FuncRequest::parse(cmd))
        }
    }

    #[test]
    fn test_copy_needs_a_selection() {
        let mut fx = Fixture::new("abc");
        let mut cur = Cursor::at(DocIterator::at(0, 1));
        assert!(fx.run(&mut cur, "copy").is_none());
    }

    #[test]
    fn test_cut_math_and_paste_it_back() {
        let mut fx = Fixture::new("$a+b$");
        let hull = fx.doc.inset(0, 0).unwrap().id();
        let mut anchor = DocIterator::at(0, 0);
        anchor.push(hull, 0);
        let mut it = anchor.clone();
        it.set_pos(2);
        let mut cur = Cursor::new();
        cur.select(anchor, it);

        assert!(fx.run(&mut cur, "cut").unwrap().buffer_changed);
        assert_eq!(fx.clipboard, "a+");
        assert_eq!(fx.doc.to_latex(), "$b$");

        cur.it.set_pos(1);
        fx.run(&mut cur, "paste");
        assert_eq!(fx.doc.to_latex(), "$ba+$");
        assert_eq!(cur.it.pos(), 3);
    }

    #[test]
    fn test_paste_paragraphs_into_text() {
        let mut fx = Fixture::new("ad");
        let mut cur = Cursor::at(DocIterator::at(0, 1));
        fx.run(&mut cur, "paste b\n\nc");
        assert_eq!(fx.doc.to_latex(), "ab\n\ncd");
        assert_eq!(cur.it, DocIterator::at(1, 1));
    }

    #[test]
    fn test_paste_single_paragraph_with_formula() {
        let mut fx = Fixture::new("ab");
        let mut cur = Cursor::at(DocIterator::at(0, 1));
        fx.run(&mut cur, "paste $x$");
        assert_eq!(fx.doc.to_latex(), "a$x$b");
        assert_eq!(cur.it, DocIterator::at(0, 2));
    }
}
