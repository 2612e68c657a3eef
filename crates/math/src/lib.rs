//! Math Crate - the WYSIWYM formula core
//!
//! This crate provides:
//! - The atom tree: [`MathAtom`] handles, [`MathData`] cells and the
//!   [`InsetMath`] node family
//! - A catcode lexer and a recursive-descent LaTeX parser
//! - LaTeX and normalized writers
//! - Macro definitions, tables and expansion
//! - Metrics and paint contracts for an external renderer
//! - A computer-algebra passthrough

pub mod atom;
pub mod cas;
pub mod data;
pub mod error;
pub mod factory;
pub mod inset;
pub mod length;
pub mod lexer;
pub mod macros;
pub mod metrics;
pub mod parser;
pub mod stream;
pub mod symbols;

pub use atom::{AtomId, MathAtom};
pub use data::MathData;
pub use error::*;
pub use factory::{create_inset_math, is_known_name};
pub use inset::*;
pub use length::{Length, LengthUnit};
pub use macros::{
    attach_arguments, collect_atom_templates, collect_templates, update_cell, update_cell_defining, AttachPolicy,
    ExpansionGuard, GlobalMacroRegistry, MacroContext, MacroData, MacroTable,
};
pub use metrics::{
    CellGeometry, CoordCache, Dimension, FixedFontMetrics, FontInfo, FontMetrics, MathStyle, MetricsInfo,
    Painter, PainterInfo, Point, RecordingPainter, StyleContext,
};
pub use parser::{parse_cell, parse_cell_in, parse_quiet, parse_template, ParseFlags, ParseOutcome};
pub use stream::{NormalStream, WriteStream};

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================================
    // Integration Tests
    // =============================================================================

    #[test]
    fn test_frac_end_to_end() {
        let outcome = parse_cell("\\frac{1}{2}", ParseFlags::quiet());
        assert!(outcome.is_clean());
        let frac = outcome.data[0].inset().as_frac().unwrap();
        assert_eq!(frac.cells[0].len(), 1);
        assert_eq!(frac.cells[0][0].as_char(), Some('1'));
        assert_eq!(frac.cells[1][0].as_char(), Some('2'));
        assert_eq!(outcome.data.to_latex(), "\\frac{1}{2}");
    }

    #[test]
    fn test_frac_in_eqnarray_goes_to_first_column() {
        let data = parse_quiet("\\frac{1}{2}");
        let mut hull = HullInset::with_content(HullType::Equation, data.clone());
        hull.mutate(HullType::Eqnarray).unwrap();
        assert_eq!(hull.ncols(), 3);
        assert_eq!(hull.grid().cell_at(0, 0), Some(&data));
        assert!(hull.grid().cell_at(0, 1).unwrap().is_empty());
        assert!(hull.grid().cell_at(0, 2).unwrap().is_empty());
    }

    #[test]
    fn test_macro_expansion_matches_parse() {
        let mut table = MacroTable::new();
        table.insert_def("\\newcommand{\\sq}[1]{#1^2}").unwrap();
        let sq = table.get("sq").unwrap();
        assert_eq!(sq.expand(&[parse_quiet("3")]), parse_quiet("3^2"));
    }

    #[test]
    fn test_metrics_and_draw_pipeline() {
        let mut data = parse_quiet("x^2+\\alpha");
        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let dim = data.metrics(&mi);
        assert!(dim.wid > 0.0);

        let mut painter = RecordingPainter::new();
        let mut coords = CoordCache::new();
        let mut pi = PainterInfo::new(&mut painter, &mut coords, &fm);
        data.draw(&mut pi, &StyleContext::new(FontInfo::default()), 0.0, 0.0);
        assert!(painter.texts().contains(&"x"));
    }
}
