//! End-to-end editing sessions driven through the buffer view
//!
//! Each test builds a document, sends requests the way a key binding layer
//! would, and checks the resulting LaTeX and cursor position.

use doc_model::{DocIterator, EditorSettings};
use edit_engine::{BufferView, FuncCode, FuncRequest, Notification};
use math::cas::{CasReply, CasRunner};
use math::{HullInset, HullType, MathResult};
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn view(src: &str) -> BufferView {
    init_tracing();
    BufferView::from_latex(src, EditorSettings::default())
}

fn run(view: &mut BufferView, commands: &[&str]) {
    for command in commands {
        view.dispatch_str(command);
    }
}

fn hull(view: &BufferView, pit: usize, pos: usize) -> &HullInset {
    view.document()
        .inset(pit, pos)
        .and_then(|atom| atom.inset().as_hull())
        .expect("formula at position")
}

/// Answers from a fixed table, rejecting implicit products
struct TableCas;

impl CasRunner for TableCas {
    fn run(&self, input: &str) -> MathResult<CasReply> {
        Ok(match input {
            "2+2" => CasReply::Output("4".to_string()),
            "2x" => CasReply::SyntaxError { column: 1 },
            "2*x" => CasReply::Output("2 x".to_string()),
            _ => CasReply::Output(String::new()),
        })
    }
}

// =============================================================================
// Typing
// =============================================================================

#[test]
fn test_type_fraction_and_move_to_denominator() {
    let mut view = view("");
    run(&mut view, &["math-mode"]);
    view.type_text("\\frac 1");
    assert_eq!(view.to_latex(), "$\\frac{1}{}$");

    run(&mut view, &["down"]);
    view.type_text("2");
    assert_eq!(view.to_latex(), "$\\frac{1}{2}$");

    // leave the fraction, then the formula
    run(&mut view, &["char-forward", "char-forward"]);
    assert_eq!(view.cursor().position().depth(), 1);
    view.type_text(" done");
    assert_eq!(view.to_latex(), "$\\frac{1}{2}$ done");
}

#[test]
fn test_undo_and_redo_requests() {
    let mut view = view("$x$");
    run(&mut view, &["char-forward", "line-end"]);
    view.type_text("+y");
    assert_eq!(view.to_latex(), "$x+y$");

    assert!(view.dispatch_str("undo").buffer_changed);
    assert_eq!(view.to_latex(), "$x+$");
    run(&mut view, &["undo", "undo"]);
    assert_eq!(view.to_latex(), "$x$");
    assert!(!view.can_undo());

    run(&mut view, &["redo"]);
    assert_eq!(view.to_latex(), "$x+$");
}

#[test]
fn test_selection_then_typing_replaces_it() {
    let mut view = view("abc");
    run(&mut view, &["char-forward", "char-forward-select"]);
    assert_eq!(view.cursor().selection_latex(view.document()).as_deref(), Some("b"));
    view.type_text("X");
    assert_eq!(view.to_latex(), "aXc");
}

#[test]
fn test_cut_and_paste_between_formulas() {
    let mut view = view("$ab$ and $c$");
    run(&mut view, &["char-forward", "char-forward-select", "char-forward-select", "cut"]);
    assert_eq!(view.clipboard(), "ab");
    assert_eq!(view.to_latex(), "$$ and $c$");

    // to the end of the text, then back into the second formula
    run(&mut view, &["line-end", "char-backward", "paste"]);
    assert_eq!(view.to_latex(), "$$ and $cab$");
}

// =============================================================================
// Navigation
// =============================================================================

#[test]
fn test_walk_through_formula_reports_enter_and_leave() {
    let mut view = view("a$x$b");
    let id = view.document().inset(0, 1).map(|a| a.id()).expect("formula");
    run(&mut view, &["char-forward", "char-forward"]);
    assert_eq!(view.cursor().notifications(), &[Notification::Enter(id)]);
    run(&mut view, &["char-forward", "char-forward"]);
    assert_eq!(view.cursor().notifications(), &[Notification::Leave(id)]);
    assert_eq!(view.cursor().position(), &DocIterator::at(0, 2));
}

#[test]
fn test_refused_movement_at_document_start() {
    let mut view = view("ab");
    let result = view.dispatch_str("char-left");
    assert!(!result.handled);
    assert_eq!(view.cursor().position(), &DocIterator::at(0, 0));
}

#[test]
fn test_cell_forward_walks_matrix_cells() {
    let mut view = view("\\begin{align}a&b\\\\c&d\\end{align}");
    run(&mut view, &["char-forward"]);
    for expected in 1..4 {
        run(&mut view, &["cell-forward"]);
        assert_eq!(view.cursor().position().idx(), expected);
    }
    assert!(!view.dispatch_str("cell-forward").handled);
}

// =============================================================================
// Grids and display formulas
// =============================================================================

#[test]
fn test_newline_turns_inline_formula_into_align() {
    let mut view = view("$ab$");
    run(&mut view, &["char-forward", "line-end", "newline-insert"]);
    let formula = hull(&view, 0, 0);
    assert_eq!(formula.hull_type(), HullType::Align);
    assert_eq!(formula.nrows(), 2);
    let idx = view.cursor().position().idx();
    assert_eq!(formula.grid().row_of(idx), 1);
}

#[test]
fn test_tabular_rows_come_and_go() {
    let mut view = view("\\begin{align}a&b\\end{align}");
    run(&mut view, &["char-forward", "tabular-feature append-row"]);
    assert_eq!(hull(&view, 0, 0).nrows(), 2);
    run(&mut view, &["tabular-feature delete-row"]);
    assert_eq!(hull(&view, 0, 0).nrows(), 1);

    let result = view.dispatch_str("tabular-feature frobnicate");
    assert!(result.handled);
    assert!(!result.buffer_changed);
    assert!(result.message.is_some());
}

#[test]
fn test_numbering_and_labels() {
    let mut view = view("$x$");
    run(&mut view, &["char-forward", "math-number-toggle"]);
    let formula = hull(&view, 0, 0);
    assert_eq!(formula.hull_type(), HullType::Equation);
    assert!(formula.numbered(0));
    assert_eq!(formula.number(0), Some("1"));

    run(&mut view, &["label-insert eq:x"]);
    assert_eq!(hull(&view, 0, 0).label(0), Some("eq:x"));
    run(&mut view, &["math-number-line-toggle"]);
    assert!(!hull(&view, 0, 0).numbered(0));
}

#[test]
fn test_math_extern_appends_result() {
    init_tracing();
    let mut view = BufferView::from_latex("$2+2$", EditorSettings::default()).with_cas(Box::new(TableCas));
    run(&mut view, &["char-forward", "math-extern"]);
    assert_eq!(view.to_latex(), "$2+2=4$");
}

#[test]
fn test_math_extern_repairs_implicit_product() {
    init_tracing();
    let mut view = BufferView::from_latex("$2x$", EditorSettings::default()).with_cas(Box::new(TableCas));
    run(&mut view, &["char-forward", "math-extern"]);
    assert_eq!(view.to_latex(), "$2x=2x$");
}

#[test]
fn test_math_extern_without_program_reports() {
    let mut view = view("$2+2$");
    run(&mut view, &["char-forward"]);
    let result = view.dispatch_str("math-extern");
    assert!(result.handled);
    assert!(result.message.is_some());
    assert_eq!(view.to_latex(), "$2+2$");
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_unknown_requests_change_nothing(name in "[a-z]{3,10}-zz", pos in 0usize..4) {
        let mut view = BufferView::from_latex("ab$x^2$c", EditorSettings::default());
        view.cursor_mut().set_position(DocIterator::at(0, pos));
        let before = view.cursor().clone();
        let result = view.dispatch(&FuncRequest::new(FuncCode::Unknown(name)));
        prop_assert!(!result.handled);
        prop_assert_eq!(view.to_latex(), "ab$x^2$c");
        prop_assert_eq!(view.cursor(), &before);
    }

    #[test]
    fn prop_typed_text_lands_verbatim(text in "[a-z ]{0,12}") {
        let mut view = BufferView::from_latex("", EditorSettings::default());
        view.type_text(&text);
        prop_assert_eq!(view.to_latex(), text);
    }
}
