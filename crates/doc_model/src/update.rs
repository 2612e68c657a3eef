//! Whole-document passes: macro resolution, equation numbering, metrics and
//! drawing
//!
//! The metrics pass always runs to completion before a draw pass reads the
//! sizes it cached.

use crate::document::Document;
use crate::paragraph::ParElement;
use crate::settings::MathSettings;
use math::{
    update_cell_defining, CellGeometry, CoordCache, Dimension, FontInfo, FontMetrics, GlobalMacroRegistry,
    InsetMath, MacroTable, MetricsInfo, Painter, PainterInfo, Point, StyleContext,
};
use tracing::debug;

/// Vertical gap between paragraphs, in ems
const PARAGRAPH_SKIP: f32 = 0.5;

/// Resolve macro instances against the templates before them
///
/// Each formula sees the global macros and every template defined earlier
/// in the document, in text or inside a formula.
pub fn update_macros(doc: &mut Document, settings: &MathSettings) {
    let global = GlobalMacroRegistry::instance().table();
    let policy = settings.attach_policy();
    let mut local = MacroTable::new();
    let mut definitions = Vec::new();
    for par in doc.paragraphs_mut() {
        for pos in 0..par.len() {
            let Some(atom) = par.inset_mut(pos) else {
                continue;
            };
            if let Some(template) = atom.inset().as_template() {
                definitions.push(local.insert(&template.name(), template.to_macro_data()));
                continue;
            }
            let inset = atom.inset_mut();
            for idx in 0..inset.nargs() {
                if let Some(cell) = inset.cell_mut(idx) {
                    definitions.extend(update_cell_defining(
                        cell,
                        &mut local,
                        global,
                        settings.max_macro_depth,
                        policy,
                    ));
                }
            }
        }
    }
    debug!(local_macros = local.len(), "macros updated");
    doc.retain_definitions(definitions);
}

/// Number the numbered rows of all formulas in document order
///
/// Returns how many numbers were given out.
pub fn number_equations(doc: &mut Document) -> usize {
    let start = doc.params().numbering_start;
    let mut next = start;
    for par in doc.paragraphs_mut() {
        for (_, atom) in par.insets_mut() {
            let Some(hull) = atom.inset_mut().as_hull_mut() else {
                continue;
            };
            for row in 0..hull.nrows() {
                if hull.numbered(row) {
                    hull.set_number(row, next.to_string());
                    next += 1;
                } else {
                    hull.set_number(row, String::new());
                }
            }
        }
    }
    next - start
}

/// Macro resolution followed by numbering
pub fn update_document(doc: &mut Document, settings: &MathSettings) {
    update_macros(doc, settings);
    let numbered = number_equations(doc);
    debug!(numbered, "document updated");
}

/// Recompute the size of every formula; returns one dimension per paragraph
pub fn metrics(doc: &mut Document, fm: &dyn FontMetrics, font: &FontInfo) -> Vec<Dimension> {
    let mi = MetricsInfo::new(fm, font.clone());
    let text_font = FontInfo {
        text_mode: true,
        ..font.clone()
    };
    let mut dims = Vec::with_capacity(doc.len());
    for par in doc.paragraphs_mut() {
        let mut row = Dimension::new(0.0, 0.7 * fm.em(font), 0.2 * fm.em(font));
        for element in par.elements_mut() {
            let dim = match element {
                ParElement::Char(c) => fm.dimension(&text_font, &c.to_string()),
                ParElement::Inset(atom) => {
                    let dim = atom.inset_mut().metrics(&mi);
                    atom.set_dim(dim);
                    dim
                }
            };
            row.add_horizontal(&dim);
        }
        dims.push(row);
    }
    dims
}

/// Draw the document top to bottom starting at `origin`
///
/// Every paragraph row and every math cell is recorded in `coords`.
pub fn draw(
    doc: &Document,
    painter: &mut dyn Painter,
    coords: &mut CoordCache,
    fm: &dyn FontMetrics,
    font: &FontInfo,
    origin: Point,
) {
    coords.clear();
    let sc = StyleContext::new(font.clone());
    let text_font = FontInfo {
        text_mode: true,
        ..font.clone()
    };
    let mut pi = PainterInfo::new(painter, coords, fm);
    let mut y = origin.y;
    for (pit, par) in doc.paragraphs().iter().enumerate() {
        let dims: Vec<Dimension> = par
            .elements()
            .iter()
            .map(|e| match e {
                ParElement::Char(c) => fm.dimension(&text_font, &c.to_string()),
                ParElement::Inset(atom) => atom.dim(),
            })
            .collect();
        let mut row = Dimension::new(0.0, 0.7 * fm.em(font), 0.2 * fm.em(font));
        for dim in &dims {
            row.add_horizontal(dim);
        }
        y += row.asc;

        let mut stops = Vec::with_capacity(dims.len() + 1);
        let mut x = origin.x;
        stops.push(0.0);
        for (element, dim) in par.elements().iter().zip(&dims) {
            match element {
                ParElement::Char(c) => pi.painter.text(x, y, &c.to_string(), &text_font),
                ParElement::Inset(atom) => {
                    atom.inset().draw(&mut pi, &sc, atom.id(), *dim, x, y);
                    pi.coords.record_inset(atom.id(), Point::new(x, y), *dim);
                }
            }
            x += dim.wid;
            stops.push(x - origin.x);
        }
        pi.coords.record_row(
            pit,
            CellGeometry {
                origin: Point::new(origin.x, y),
                dim: row,
                stops,
            },
        );
        y += row.des + PARAGRAPH_SKIP * fm.em(font);
    }
}

/// Whether any formula in the document still holds an unresolved name
pub fn has_unknown_commands(doc: &Document) -> bool {
    fn cell_has(inset: &InsetMath) -> bool {
        matches!(inset, InsetMath::Unknown(_))
            || inset
                .cells()
                .any(|cell| cell.iter().any(|a| cell_has(a.inset())))
    }
    doc.paragraphs()
        .iter()
        .any(|p| p.insets().any(|(_, a)| cell_has(a.inset())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BufferParams;
    use crate::settings::EditorSettings;
    use math::{FixedFontMetrics, RecordingPainter};

    fn load(src: &str) -> Document {
        Document::from_latex(src, BufferParams::default()).0
    }

    #[test]
    fn test_numbering_in_document_order() {
        let mut doc = load(
            "\\begin{equation}a\\end{equation}\n\n\\begin{align}b&c\\\\d&e\\nonumber\\\\f&g\\end{align}",
        );
        assert_eq!(number_equations(&mut doc), 3);
        let first = doc.inset(0, 0).unwrap().inset().as_hull().unwrap();
        assert_eq!(first.number(0), Some("1"));
        let second = doc.inset(1, 0).unwrap().inset().as_hull().unwrap();
        assert_eq!(second.number(0), Some("2"));
        assert_eq!(second.number(1), Some(""));
        assert_eq!(second.number(2), Some("3"));
    }

    #[test]
    fn test_numbering_start() {
        let mut doc = load("\\begin{equation}a\\end{equation}");
        doc.params_mut().numbering_start = 5;
        number_equations(&mut doc);
        let hull = doc.inset(0, 0).unwrap().inset().as_hull().unwrap();
        assert_eq!(hull.nicelabel(0), "(5)");
    }

    #[test]
    fn test_macros_resolve_after_definition() {
        // the instance is typed before the definition exists
        let mut doc = load("$\\twice{x}$");
        assert!(has_unknown_commands(&doc));
        let (defs, _) = Document::from_latex("\\newcommand{\\twice}[1]{#1#1}", BufferParams::default());
        let template = defs.paragraph(0).unwrap().clone();
        let mut paragraphs = vec![template];
        paragraphs.extend(doc.paragraphs().iter().cloned());
        let mut doc = Document::from_paragraphs(paragraphs);

        update_macros(&mut doc, &EditorSettings::default().math);
        assert!(!has_unknown_commands(&doc));
        let hull = doc.inset(1, 0).unwrap().inset().as_hull().unwrap();
        let cell = hull.grid().cell_at(0, 0).unwrap();
        let instance = cell[0].inset().as_macro().unwrap();
        assert_eq!(instance.name(), "twice");
        assert_eq!(instance.expand().unwrap().to_latex(), "xx");
    }

    #[test]
    fn test_template_inside_formula_stays_visible() {
        let mut doc = load("$\\newcommand{\\f}{x}$\n\n$\\f$");
        update_macros(&mut doc, &EditorSettings::default().math);
        let hull = doc.inset(1, 0).unwrap().inset().as_hull().unwrap();
        let instance = hull.grid().cell_at(0, 0).unwrap()[0].inset().as_macro().unwrap();
        assert!(instance.is_resolved());
        assert_eq!(instance.expand().unwrap().to_latex(), "x");
        assert!(doc.macros_before(1, 0).has("f"));
        assert!(!doc.macros_before(0, 0).has("f"));
    }

    #[test]
    fn test_template_and_use_in_one_formula() {
        let mut doc = load("$\\newcommand{\\g}{y}\\g$");
        update_macros(&mut doc, &EditorSettings::default().math);
        update_macros(&mut doc, &EditorSettings::default().math);
        let hull = doc.inset(0, 0).unwrap().inset().as_hull().unwrap();
        let cell = hull.grid().cell_at(0, 0).unwrap();
        assert!(cell[0].inset().as_template().is_some());
        let instance = cell[1].inset().as_macro().unwrap();
        assert!(instance.is_resolved());
        assert_eq!(instance.expand().unwrap().to_latex(), "y");
    }

    #[test]
    fn test_metrics_then_draw_records_rows_and_cells() {
        let mut doc = load("ab $x^2$\n\nc");
        let fm = FixedFontMetrics::default();
        let font = FontInfo::default();
        let dims = metrics(&mut doc, &fm, &font);
        assert_eq!(dims.len(), 2);
        assert!(dims[0].wid > dims[1].wid);

        let mut painter = RecordingPainter::new();
        let mut coords = CoordCache::new();
        draw(&doc, &mut painter, &mut coords, &fm, &font, Point::new(0.0, 0.0));
        let first = coords.row(0).unwrap();
        let second = coords.row(1).unwrap();
        assert_eq!(first.stops.len(), 5);
        assert!(second.origin.y > first.origin.y);
        let hull = doc.inset(0, 3).unwrap();
        assert!(coords.inset(hull.id()).is_some());
        assert!(painter.texts().contains(&"x"));
    }
}
