//! The InsetMath node family
//!
//! Every node of the math tree is one variant of [`InsetMath`]. Shared
//! capabilities (cells, serialization, metrics, drawing) go through the
//! [`MathNode`] trait; kind-specific behavior is reached with the `as_*`
//! accessors, which return `None` when the node is of a different kind.

mod grid;
mod hull;
mod leaf;
mod macro_inset;
mod nest;
mod script;
mod template;

pub use grid::{CellInfo, ColInfo, GridInset, GridKind, MatrixFence, Multicolumn, RowInfo};
pub use hull::{HullInset, HullType};
pub use leaf::{
    ArgumentProxy, CharInset, KernInset, MacroArgument, RefInset, RefKind, SpaceInset, SpaceKind,
    StringInset, SymbolInset, UnknownInset,
};
pub use macro_inset::{DisplayMode, MacroInset};
pub use nest::{
    BigDelimInset, BoxInset, BraceInset, ColorInset, DecorationInset, DelimInset, EnvInset,
    FontInset, FracInset, FracKind, PhantomInset, RootInset, SqrtInset,
};
pub use script::{Limits, ScriptInset};
pub use template::{MacroTemplate, TemplateKind};

use crate::atom::AtomId;
use crate::data::MathData;
use crate::metrics::{Dimension, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use crate::symbols::SymbolClass;

// =============================================================================
// Node capabilities
// =============================================================================

/// Capabilities shared by every node kind
pub trait MathNode {
    /// Number of cells; leaves have none
    fn nargs(&self) -> usize {
        0
    }

    /// Cell `idx`, or `None` past `nargs()`
    fn cell(&self, _idx: usize) -> Option<&MathData> {
        None
    }

    fn cell_mut(&mut self, _idx: usize) -> Option<&mut MathData> {
        None
    }

    /// Serialize as LaTeX
    fn write(&self, ws: &mut WriteStream);

    /// Serialize in the canonical bracketed form
    fn normalize(&self, ns: &mut NormalStream);

    /// Compute the size of the node, caching cell sizes on the way
    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension;

    /// Paint the node with its baseline origin at `(x, y)`
    fn draw(
        &self,
        pi: &mut PainterInfo<'_>,
        sc: &StyleContext<'_>,
        id: AtomId,
        dim: Dimension,
        x: f32,
        y: f32,
    );
}

/// Coarse classification of nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsetKind {
    Char,
    Symbol,
    String,
    Space,
    Kern,
    Unknown,
    MacroArgument,
    ArgumentProxy,
    Ref,
    Brace,
    Font,
    Color,
    Box,
    Decoration,
    Root,
    Sqrt,
    Phantom,
    Frac,
    Delim,
    BigDelim,
    Env,
    Script,
    Grid,
    Hull,
    Macro,
    MacroTemplate,
}

/// One node of the math tree
#[derive(Debug, Clone, PartialEq)]
pub enum InsetMath {
    Char(CharInset),
    Symbol(SymbolInset),
    String(StringInset),
    Space(SpaceInset),
    Kern(KernInset),
    Unknown(UnknownInset),
    MacroArgument(MacroArgument),
    ArgumentProxy(ArgumentProxy),
    Ref(RefInset),
    Brace(BraceInset),
    Font(FontInset),
    Color(ColorInset),
    Box(BoxInset),
    Decoration(DecorationInset),
    Root(RootInset),
    Sqrt(SqrtInset),
    Phantom(PhantomInset),
    Frac(FracInset),
    Delim(DelimInset),
    BigDelim(BigDelimInset),
    Env(EnvInset),
    Script(ScriptInset),
    Grid(GridInset),
    Hull(HullInset),
    Macro(MacroInset),
    MacroTemplate(MacroTemplate),
}

macro_rules! dispatch {
    ($value:expr, $node:ident => $body:expr) => {
        match $value {
            InsetMath::Char($node) => $body,
            InsetMath::Symbol($node) => $body,
            InsetMath::String($node) => $body,
            InsetMath::Space($node) => $body,
            InsetMath::Kern($node) => $body,
            InsetMath::Unknown($node) => $body,
            InsetMath::MacroArgument($node) => $body,
            InsetMath::ArgumentProxy($node) => $body,
            InsetMath::Ref($node) => $body,
            InsetMath::Brace($node) => $body,
            InsetMath::Font($node) => $body,
            InsetMath::Color($node) => $body,
            InsetMath::Box($node) => $body,
            InsetMath::Decoration($node) => $body,
            InsetMath::Root($node) => $body,
            InsetMath::Sqrt($node) => $body,
            InsetMath::Phantom($node) => $body,
            InsetMath::Frac($node) => $body,
            InsetMath::Delim($node) => $body,
            InsetMath::BigDelim($node) => $body,
            InsetMath::Env($node) => $body,
            InsetMath::Script($node) => $body,
            InsetMath::Grid($node) => $body,
            InsetMath::Hull($node) => $body,
            InsetMath::Macro($node) => $body,
            InsetMath::MacroTemplate($node) => $body,
        }
    };
}

impl InsetMath {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn char(ch: char) -> Self {
        InsetMath::Char(CharInset::new(ch))
    }

    pub fn symbol(name: &str) -> Self {
        InsetMath::Symbol(SymbolInset::new(name))
    }

    pub fn unknown(name: &str, is_final: bool) -> Self {
        InsetMath::Unknown(UnknownInset::new(name, is_final))
    }

    /// Wrap `cell` in braces
    pub fn brace(cell: MathData) -> Self {
        InsetMath::Brace(BraceInset { cell })
    }

    // =========================================================================
    // Shared capabilities
    // =========================================================================

    pub fn nargs(&self) -> usize {
        dispatch!(self, n => n.nargs())
    }

    pub fn cell(&self, idx: usize) -> Option<&MathData> {
        dispatch!(self, n => n.cell(idx))
    }

    pub fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
        dispatch!(self, n => n.cell_mut(idx))
    }

    pub fn write(&self, ws: &mut WriteStream) {
        dispatch!(self, n => n.write(ws))
    }

    pub fn normalize(&self, ns: &mut NormalStream) {
        dispatch!(self, n => n.normalize(ns))
    }

    pub fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        dispatch!(self, n => n.metrics(mi))
    }

    pub fn draw(
        &self,
        pi: &mut PainterInfo<'_>,
        sc: &StyleContext<'_>,
        id: AtomId,
        dim: Dimension,
        x: f32,
        y: f32,
    ) {
        dispatch!(self, n => n.draw(pi, sc, id, dim, x, y))
    }

    /// Iterate over all cells
    pub fn cells(&self) -> impl Iterator<Item = &MathData> {
        (0..self.nargs()).filter_map(move |i| self.cell(i))
    }

    pub fn kind(&self) -> InsetKind {
        match self {
            InsetMath::Char(_) => InsetKind::Char,
            InsetMath::Symbol(_) => InsetKind::Symbol,
            InsetMath::String(_) => InsetKind::String,
            InsetMath::Space(_) => InsetKind::Space,
            InsetMath::Kern(_) => InsetKind::Kern,
            InsetMath::Unknown(_) => InsetKind::Unknown,
            InsetMath::MacroArgument(_) => InsetKind::MacroArgument,
            InsetMath::ArgumentProxy(_) => InsetKind::ArgumentProxy,
            InsetMath::Ref(_) => InsetKind::Ref,
            InsetMath::Brace(_) => InsetKind::Brace,
            InsetMath::Font(_) => InsetKind::Font,
            InsetMath::Color(_) => InsetKind::Color,
            InsetMath::Box(_) => InsetKind::Box,
            InsetMath::Decoration(_) => InsetKind::Decoration,
            InsetMath::Root(_) => InsetKind::Root,
            InsetMath::Sqrt(_) => InsetKind::Sqrt,
            InsetMath::Phantom(_) => InsetKind::Phantom,
            InsetMath::Frac(_) => InsetKind::Frac,
            InsetMath::Delim(_) => InsetKind::Delim,
            InsetMath::BigDelim(_) => InsetKind::BigDelim,
            InsetMath::Env(_) => InsetKind::Env,
            InsetMath::Script(_) => InsetKind::Script,
            InsetMath::Grid(_) => InsetKind::Grid,
            InsetMath::Hull(_) => InsetKind::Hull,
            InsetMath::Macro(_) => InsetKind::Macro,
            InsetMath::MacroTemplate(_) => InsetKind::MacroTemplate,
        }
    }

    // =========================================================================
    // Down-casts
    // =========================================================================

    pub fn as_script(&self) -> Option<&ScriptInset> {
        match self {
            InsetMath::Script(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_script_mut(&mut self) -> Option<&mut ScriptInset> {
        match self {
            InsetMath::Script(s) => Some(s),
            _ => None,
        }
    }

    /// Grid view of grids and hulls
    pub fn as_grid(&self) -> Option<&GridInset> {
        match self {
            InsetMath::Grid(g) => Some(g),
            InsetMath::Hull(h) => Some(h.grid()),
            _ => None,
        }
    }

    pub fn as_grid_mut(&mut self) -> Option<&mut GridInset> {
        match self {
            InsetMath::Grid(g) => Some(g),
            InsetMath::Hull(h) => Some(h.grid_mut()),
            _ => None,
        }
    }

    pub fn as_hull(&self) -> Option<&HullInset> {
        match self {
            InsetMath::Hull(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hull_mut(&mut self) -> Option<&mut HullInset> {
        match self {
            InsetMath::Hull(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_macro(&self) -> Option<&MacroInset> {
        match self {
            InsetMath::Macro(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_macro_mut(&mut self) -> Option<&mut MacroInset> {
        match self {
            InsetMath::Macro(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&MacroTemplate> {
        match self {
            InsetMath::MacroTemplate(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_template_mut(&mut self) -> Option<&mut MacroTemplate> {
        match self {
            InsetMath::MacroTemplate(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_unknown(&self) -> Option<&UnknownInset> {
        match self {
            InsetMath::Unknown(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_unknown_mut(&mut self) -> Option<&mut UnknownInset> {
        match self {
            InsetMath::Unknown(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_brace(&self) -> Option<&BraceInset> {
        match self {
            InsetMath::Brace(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_frac(&self) -> Option<&FracInset> {
        match self {
            InsetMath::Frac(f) => Some(f),
            _ => None,
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// TeX class used by splitting heuristics and spacing
    pub fn class(&self) -> SymbolClass {
        match self {
            InsetMath::Char(c) => c.class(),
            InsetMath::Symbol(s) => s.class(),
            InsetMath::Frac(f) if f.kind == FracKind::Stackrel => SymbolClass::Rel,
            InsetMath::Script(s) => s
                .nuc()
                .last()
                .map(|a| a.inset().class())
                .unwrap_or(SymbolClass::Ord),
            _ => SymbolClass::Ord,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.class() == SymbolClass::Rel
    }

    /// Whether the node has cells the cursor can enter
    pub fn is_active(&self) -> bool {
        match self {
            InsetMath::Macro(m) => m.nargs() > 0 && !m.is_locked(),
            _ => self.nargs() > 0,
        }
    }

    /// Whether cell `idx` holds text-mode content
    pub fn cell_is_text(&self, idx: usize) -> bool {
        match self {
            InsetMath::Font(f) => f.is_text_font(),
            InsetMath::Box(b) => b.is_text_box(),
            InsetMath::Grid(g) => g.kind == GridKind::Tabular,
            InsetMath::MacroTemplate(_) => idx == 0,
            _ => false,
        }
    }

    /// Whether typed characters in cell `idx` are taken literally
    pub fn cell_is_verbatim(&self, idx: usize) -> bool {
        matches!(self, InsetMath::MacroTemplate(_)) && idx == 0
    }

    // =========================================================================
    // Cell navigation
    // =========================================================================

    /// Cell entered when moving forward into the node
    pub fn idx_first(&self) -> usize {
        match self {
            InsetMath::Root(_) => 1,
            _ => 0,
        }
    }

    /// Cell entered when moving backward into the node
    pub fn idx_last(&self) -> usize {
        match self {
            InsetMath::Script(_) => 0,
            InsetMath::Root(_) => 1,
            _ => self.nargs().saturating_sub(1),
        }
    }

    /// Cell reached by moving forward off the end of cell `idx`
    pub fn idx_forward(&self, idx: usize) -> Option<usize> {
        match self {
            InsetMath::Script(_) | InsetMath::Frac(_) | InsetMath::Root(_) => None,
            InsetMath::Grid(_) | InsetMath::Hull(_) => self.as_grid().and_then(|g| g.idx_forward(idx)),
            _ if idx + 1 < self.nargs() => Some(idx + 1),
            _ => None,
        }
    }

    /// Cell reached by moving backward off the start of cell `idx`
    pub fn idx_backward(&self, idx: usize) -> Option<usize> {
        match self {
            InsetMath::Script(_) | InsetMath::Frac(_) | InsetMath::Root(_) => None,
            InsetMath::Grid(_) | InsetMath::Hull(_) => self.as_grid().and_then(|g| g.idx_backward(idx)),
            _ if idx > 0 && idx < self.nargs() => Some(idx - 1),
            _ => None,
        }
    }

    /// Next cell in tab order, wrapping nothing
    pub fn idx_next(&self, idx: usize) -> Option<usize> {
        match self {
            InsetMath::Grid(_) | InsetMath::Hull(_) => self.as_grid().and_then(|g| g.idx_next(idx)),
            _ if idx + 1 < self.nargs() => Some(idx + 1),
            _ => None,
        }
    }

    /// Previous cell in tab order
    pub fn idx_prev(&self, idx: usize) -> Option<usize> {
        match self {
            InsetMath::Grid(_) | InsetMath::Hull(_) => self.as_grid().and_then(|g| g.idx_prev(idx)),
            _ if idx > 0 && idx < self.nargs() => Some(idx - 1),
            _ => None,
        }
    }

    /// Cell above (`up`) or below cell `idx` inside this node
    pub fn idx_up_down(&self, idx: usize, up: bool) -> Option<usize> {
        match self {
            InsetMath::Frac(f) => f.idx_up_down(idx, up),
            InsetMath::Script(s) => s.idx_up_down(idx, up),
            InsetMath::Root(_) => match (idx, up) {
                (1, true) => Some(0),
                (0, false) => Some(1),
                _ => None,
            },
            InsetMath::Grid(_) | InsetMath::Hull(_) => {
                self.as_grid().and_then(|g| g.idx_up_down(idx, up))
            }
            _ => None,
        }
    }
}

/// Normalized form of a node with named cells: `[name cell cell]`
pub(crate) fn normalize_cells(ns: &mut NormalStream, name: &str, cells: &[&MathData]) {
    ns.open(name);
    for cell in cells {
        cell.normalize(ns);
    }
    ns.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MathAtom;

    #[test]
    fn test_leaf_has_no_cells() {
        let c = InsetMath::char('x');
        assert_eq!(c.nargs(), 0);
        assert!(c.cell(0).is_none());
        assert!(!c.is_active());
        assert_eq!(c.kind(), InsetKind::Char);
    }

    #[test]
    fn test_downcasts() {
        let s = InsetMath::Script(ScriptInset::new(MathData::from_chars("x")));
        assert!(s.as_script().is_some());
        assert!(s.as_grid().is_none());
        let h = InsetMath::Hull(HullInset::new(HullType::Equation));
        assert!(h.as_grid().is_some());
        assert!(h.as_hull().is_some());
    }

    #[test]
    fn test_relation_classification() {
        assert!(InsetMath::char('=').is_relation());
        assert!(InsetMath::symbol("leq").is_relation());
        assert!(!InsetMath::symbol("alpha").is_relation());
        let stack = InsetMath::Frac(FracInset::new(
            FracKind::Stackrel,
            MathData::from_chars("d"),
            MathData::from_chars("="),
        ));
        assert!(stack.is_relation());
    }

    #[test]
    fn test_brace_navigation() {
        let b = InsetMath::brace(MathData::single(MathAtom::new(InsetMath::char('x'))));
        assert_eq!(b.nargs(), 1);
        assert_eq!(b.idx_forward(0), None);
        assert_eq!(b.idx_first(), 0);
        assert_eq!(b.idx_last(), 0);
    }
}
