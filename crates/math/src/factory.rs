//! Building empty nodes from command names
//!
//! Used when a command is typed interactively: the node comes out with empty
//! cells for the user to fill in.

use crate::data::MathData;
use crate::inset::{
    BigDelimInset, BoxInset, ColorInset, DecorationInset, DelimInset, DisplayMode, FontInset,
    FracInset, FracKind, GridInset, GridKind, HullInset, HullType, InsetMath, MacroInset,
    MacroTemplate, PhantomInset, RefInset, RefKind, RootInset, SpaceInset, SpaceKind, SqrtInset,
    TemplateKind,
};
use crate::macros::MacroContext;
use crate::symbols;

/// The node for `\name`, or an unknown command if nothing knows the name
pub fn create_inset_math(name: &str, ctx: &MacroContext<'_>) -> InsetMath {
    if let Some(inset) = create_builtin(name) {
        return inset;
    }
    if symbols::is_symbol(name) {
        return InsetMath::symbol(name);
    }
    if ctx.has(name) {
        let mut m = MacroInset::new(name);
        m.set_display(DisplayMode::Init);
        return InsetMath::Macro(m);
    }
    InsetMath::unknown(name, true)
}

/// Whether `name` creates something other than an unknown command
pub fn is_known_name(name: &str, ctx: &MacroContext<'_>) -> bool {
    create_builtin(name).is_some() || symbols::is_symbol(name) || ctx.has(name)
}

fn create_builtin(name: &str) -> Option<InsetMath> {
    let empty = MathData::new;
    if let Some(kind) = FracKind::from_name(name) {
        return Some(InsetMath::Frac(FracInset::new(kind, empty(), empty())));
    }
    if let Some(kind) = SpaceKind::from_name(name) {
        return Some(InsetMath::Space(SpaceInset::new(kind)));
    }
    if let Some(kind) = RefKind::from_name(name) {
        return Some(InsetMath::Ref(RefInset {
            kind,
            target: String::new(),
        }));
    }
    if let Some(kind) = TemplateKind::from_name(name) {
        return Some(InsetMath::MacroTemplate(MacroTemplate::new(kind, "")));
    }
    if let Some(c) = symbols::escaped_char(name) {
        return Some(InsetMath::char(c));
    }
    if symbols::is_big_name(name) {
        return Some(InsetMath::BigDelim(BigDelimInset {
            size: name.to_string(),
            delim: "(".to_string(),
        }));
    }
    let named = |name: &str| name.to_string();
    let inset = match name {
        "sqrt" => InsetMath::Sqrt(SqrtInset { cell: empty() }),
        "root" => InsetMath::Root(RootInset::new(empty(), empty())),
        "left" | "right" => InsetMath::Delim(DelimInset {
            left: "(".to_string(),
            right: ")".to_string(),
            cell: empty(),
        }),
        "textcolor" | "color" => InsetMath::Color(ColorInset {
            color: "red".to_string(),
            old_style: false,
            cell: empty(),
        }),
        "backslash" => InsetMath::char('\\'),
        "cases" => InsetMath::Grid(GridInset::new(GridKind::Cases, 1, 2)),
        "substack" => InsetMath::Grid(GridInset::new(GridKind::Substack, 1, 1)),
        "xymatrix" => InsetMath::Grid(GridInset::new(GridKind::Xymatrix, 1, 1)),
        "equation" => InsetMath::Hull(HullInset::new(HullType::Equation)),
        _ if FontInset::is_font_name(name) => InsetMath::Font(FontInset {
            name: named(name),
            cell: empty(),
        }),
        _ if BoxInset::is_box_name(name) => InsetMath::Box(BoxInset {
            name: named(name),
            cell: empty(),
        }),
        _ if DecorationInset::is_decoration_name(name) => InsetMath::Decoration(DecorationInset {
            name: named(name),
            cell: empty(),
        }),
        _ if PhantomInset::is_phantom_name(name) => InsetMath::Phantom(PhantomInset {
            name: named(name),
            cell: empty(),
        }),
        _ => match GridKind::from_env_name(name) {
            Some(kind) => InsetMath::Grid(GridInset::new(kind, 1, 1)),
            None => return None,
        },
    };
    Some(inset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::{MacroData, MacroTable};

    fn global() -> MacroContext<'static> {
        MacroContext::global_only()
    }

    #[test]
    fn test_creates_empty_fraction() {
        let inset = create_inset_math("frac", &global());
        let frac = inset.as_frac().unwrap();
        assert!(frac.cells.iter().all(MathData::is_empty));
    }

    #[test]
    fn test_creates_symbol_and_unknown() {
        assert!(matches!(create_inset_math("alpha", &global()), InsetMath::Symbol(_)));
        assert!(create_inset_math("nope", &global()).as_unknown().is_some());
    }

    #[test]
    fn test_cases_has_two_columns() {
        let inset = create_inset_math("cases", &global());
        let grid = inset.as_grid().unwrap();
        assert_eq!((grid.nrows(), grid.ncols()), (1, 2));
    }

    #[test]
    fn test_macro_starts_in_init() {
        let mut local = MacroTable::new();
        local.insert("foo", MacroData::new("foo", "#1", 1));
        let empty = MacroTable::new();
        let ctx = MacroContext::with_tables(Some(&local), &empty);
        let inset = create_inset_math("foo", &ctx);
        assert_eq!(inset.as_macro().unwrap().display(), DisplayMode::Init);
        assert!(is_known_name("foo", &ctx));
        assert!(!is_known_name("surely_not_defined", &ctx));
    }

    #[test]
    fn test_text_font() {
        let inset = create_inset_math("text", &global());
        assert!(inset.cell_is_text(0));
    }
}
