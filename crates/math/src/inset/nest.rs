//! Nest nodes: kinds owning a small fixed number of cells

use super::{normalize_cells, MathNode};
use crate::atom::AtomId;
use crate::data::MathData;
use crate::metrics::{
    Color, Dimension, MathStyle, MetricsInfo, PainterInfo, StyleContext,
};
use crate::stream::{NormalStream, WriteStream};
use crate::symbols;

/// Write a delimiter such as `(`, `\{` or `\langle`
pub(crate) fn write_delim(ws: &mut WriteStream, delim: &str) {
    match delim.strip_prefix('\\') {
        Some(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic()) => {
            ws.cs(name)
        }
        _ => ws.text(delim),
    }
}

/// Glyph shown for a delimiter
pub(crate) fn delim_glyph(delim: &str) -> &str {
    match delim {
        "." => "",
        "\\{" => "{",
        "\\}" => "}",
        "\\|" => "\u{2016}",
        other => other
            .strip_prefix('\\')
            .and_then(symbols::lookup)
            .map(|s| s.glyph)
            .unwrap_or(other),
    }
}

macro_rules! single_cell {
    () => {
        fn nargs(&self) -> usize {
            1
        }

        fn cell(&self, idx: usize) -> Option<&MathData> {
            (idx == 0).then_some(&self.cell)
        }

        fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
            (idx == 0).then_some(&mut self.cell)
        }
    };
}

// =============================================================================
// Braces
// =============================================================================

/// `{...}` grouping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BraceInset {
    pub cell: MathData,
}

impl MathNode for BraceInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, "block", &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        self.cell.metrics(mi)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        self.cell.draw_cell(pi, sc, id, 0, x, y);
    }
}

// =============================================================================
// Fonts, colors and boxes
// =============================================================================

const MATH_FONTS: &[&str] = &[
    "mathrm",
    "mathbf",
    "mathit",
    "mathsf",
    "mathtt",
    "mathcal",
    "mathbb",
    "mathfrak",
    "mathscr",
    "mathnormal",
    "boldsymbol",
    "operatorname",
];

const TEXT_FONTS: &[&str] = &[
    "text",
    "textrm",
    "textbf",
    "textit",
    "textsf",
    "texttt",
    "textnormal",
    "textsc",
    "textup",
    "textmd",
    "emph",
];

/// `\mathrm{...}`, `\text{...}` and other font changes
#[derive(Debug, Clone, PartialEq)]
pub struct FontInset {
    pub name: String,
    pub cell: MathData,
}

impl FontInset {
    pub fn is_font_name(name: &str) -> bool {
        MATH_FONTS.contains(&name) || TEXT_FONTS.contains(&name)
    }

    pub fn is_text_font_name(name: &str) -> bool {
        TEXT_FONTS.contains(&name)
    }

    pub fn is_text_font(&self) -> bool {
        Self::is_text_font_name(&self.name)
    }
}

impl MathNode for FontInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, &self.name, &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut font = mi.base.font.with_family(&self.name);
        font.text_mode = self.is_text_font();
        self.cell.metrics(&mi.with_font(font))
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.with_family(&self.name);
        font.text_mode = self.is_text_font();
        self.cell.draw_cell(pi, &sc.with_font(font), id, 0, x, y);
    }
}

/// `\textcolor{c}{...}` or the old-style `\color{c}` spanning the rest of a group
#[derive(Debug, Clone, PartialEq)]
pub struct ColorInset {
    pub color: String,
    pub old_style: bool,
    pub cell: MathData,
}

impl MathNode for ColorInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        if self.old_style {
            ws.cs("color");
            ws.braced(&self.color);
            self.cell.write(ws);
        } else {
            ws.cs("textcolor");
            ws.braced(&self.color);
            ws.ch('{');
            self.cell.write(ws);
            ws.ch('}');
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("color");
        ns.word(&self.color);
        self.cell.normalize(ns);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        self.cell.metrics(mi)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.clone();
        font.color = Color::from_name(&self.color);
        self.cell.draw_cell(pi, &sc.with_font(font), id, 0, x, y);
    }
}

/// `\boxed{...}`, `\fbox{...}`, `\mbox{...}`
#[derive(Debug, Clone, PartialEq)]
pub struct BoxInset {
    pub name: String,
    pub cell: MathData,
}

impl BoxInset {
    pub fn is_box_name(name: &str) -> bool {
        matches!(name, "boxed" | "fbox" | "mbox" | "framebox" | "makebox")
    }

    pub fn is_text_box(&self) -> bool {
        self.name != "boxed"
    }

    fn framed(&self) -> bool {
        matches!(self.name.as_str(), "boxed" | "fbox" | "framebox")
    }
}

impl MathNode for BoxInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, &self.name, &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut font = mi.base.font.clone();
        font.text_mode = self.is_text_box();
        let mut dim = self.cell.metrics(&mi.with_font(font));
        if self.framed() {
            let pad = 0.2 * mi.em();
            dim.wid += 2.0 * pad;
            dim.asc += pad;
            dim.des += pad;
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.clone();
        font.text_mode = self.is_text_box();
        if self.framed() {
            let pad = 0.2 * pi.metrics.em(&sc.font);
            pi.painter
                .rectangle(x, y - dim.asc, dim.wid, dim.height(), sc.font.color);
            self.cell.draw_cell(pi, &sc.with_font(font), id, 0, x + pad, y);
        } else {
            self.cell.draw_cell(pi, &sc.with_font(font), id, 0, x, y);
        }
    }
}

// =============================================================================
// Decorations and phantoms
// =============================================================================

const DECORATIONS: &[&str] = &[
    "hat",
    "widehat",
    "bar",
    "overline",
    "underline",
    "vec",
    "overrightarrow",
    "overleftarrow",
    "dot",
    "ddot",
    "tilde",
    "widetilde",
    "check",
    "breve",
    "acute",
    "grave",
    "mathring",
    "overbrace",
    "underbrace",
];

/// Accents and over/under decorations
#[derive(Debug, Clone, PartialEq)]
pub struct DecorationInset {
    pub name: String,
    pub cell: MathData,
}

impl DecorationInset {
    pub fn is_decoration_name(name: &str) -> bool {
        DECORATIONS.contains(&name)
    }

    fn is_under(&self) -> bool {
        self.name.starts_with("under")
    }
}

impl MathNode for DecorationInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, &self.name, &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut dim = self.cell.metrics(mi);
        let deco = 0.3 * mi.em();
        if self.is_under() {
            dim.des += deco;
        } else {
            dim.asc += deco;
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        self.cell.draw_cell(pi, sc, id, 0, x, y);
        let cell = self.cell.dim();
        let ly = if self.is_under() {
            y + cell.des + 0.1 * (dim.des - cell.des)
        } else {
            y - cell.asc - 0.5 * (dim.asc - cell.asc)
        };
        pi.painter.line(x, ly, x + dim.wid, ly, sc.font.color);
    }
}

/// `\phantom`, `\hphantom`, `\vphantom`
#[derive(Debug, Clone, PartialEq)]
pub struct PhantomInset {
    pub name: String,
    pub cell: MathData,
}

impl PhantomInset {
    pub fn is_phantom_name(name: &str) -> bool {
        matches!(name, "phantom" | "hphantom" | "vphantom")
    }
}

impl MathNode for PhantomInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, &self.name, &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let dim = self.cell.metrics(mi);
        match self.name.as_str() {
            "hphantom" => Dimension::new(dim.wid, 0.0, 0.0),
            "vphantom" => Dimension::new(0.0, dim.asc, dim.des),
            _ => dim,
        }
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, _sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        // content is invisible but still needs a position for the cursor
        pi.coords.record_cell(
            id,
            0,
            crate::metrics::CellGeometry {
                origin: crate::metrics::Point::new(x, y),
                dim,
                stops: (0..=self.cell.len()).map(|p| self.cell.pos2x(p)).collect(),
            },
        );
    }
}

// =============================================================================
// Roots
// =============================================================================

/// `\sqrt{...}`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqrtInset {
    pub cell: MathData,
}

fn draw_radical(pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, x: f32, y: f32, sign: f32, cell: Dimension) {
    let color = sc.font.color;
    let top = y - cell.asc - 0.1 * sign;
    pi.painter.line(x, y - cell.asc * 0.3, x + sign * 0.4, y + cell.des, color);
    pi.painter.line(x + sign * 0.4, y + cell.des, x + sign, top, color);
    pi.painter.line(x + sign, top, x + sign + cell.wid, top, color);
}

impl MathNode for SqrtInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs("sqrt");
        ws.ch('{');
        self.cell.write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, "sqrt", &[&self.cell]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let cell = self.cell.metrics(mi);
        let sign = 0.6 * mi.em();
        Dimension::new(cell.wid + sign, cell.asc + 0.15 * mi.em(), cell.des)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let sign = 0.6 * pi.metrics.em(&sc.font);
        draw_radical(pi, sc, x, y, sign, self.cell.dim());
        self.cell.draw_cell(pi, sc, id, 0, x + sign, y);
    }
}

/// `\sqrt[index]{radicand}`; cell 0 is the index, cell 1 the radicand
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootInset {
    pub cells: [MathData; 2],
}

impl RootInset {
    pub fn new(index: MathData, radicand: MathData) -> Self {
        Self {
            cells: [index, radicand],
        }
    }
}

impl MathNode for RootInset {
    fn nargs(&self) -> usize {
        2
    }

    fn cell(&self, idx: usize) -> Option<&MathData> {
        self.cells.get(idx)
    }

    fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
        self.cells.get_mut(idx)
    }

    fn write(&self, ws: &mut WriteStream) {
        ws.cs("sqrt");
        ws.ch('[');
        self.cells[0].write(ws);
        ws.ch(']');
        ws.ch('{');
        self.cells[1].write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, "root", &[&self.cells[0], &self.cells[1]]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let index = self.cells[0].metrics(&mi.with_style(MathStyle::ScriptScript));
        let cell = self.cells[1].metrics(mi);
        let sign = 0.6 * mi.em();
        let asc = (cell.asc + 0.15 * mi.em()).max(index.height() + 0.3 * cell.asc);
        Dimension::new(cell.wid + sign + index.wid.max(sign * 0.5) - sign * 0.5, asc, cell.des)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let sign = 0.6 * pi.metrics.em(&sc.font);
        let index = self.cells[0].dim();
        let shift = (index.wid - sign * 0.5).max(0.0);
        let cell = self.cells[1].dim();
        self.cells[0].draw_cell(
            pi,
            &sc.with_style(MathStyle::ScriptScript),
            id,
            0,
            x,
            y - cell.asc * 0.3 - index.des,
        );
        draw_radical(pi, sc, x + shift, y, sign, cell);
        self.cells[1].draw_cell(pi, sc, id, 1, x + shift + sign, y);
    }
}

// =============================================================================
// Fractions and stacks
// =============================================================================

/// Flavor of a two-cell vertical stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FracKind {
    Frac,
    DFrac,
    TFrac,
    CFrac,
    Binom,
    DBinom,
    TBinom,
    /// Infix `a \over b`
    Over,
    /// Infix `a \atop b`
    Atop,
    /// Infix `a \choose b`
    Choose,
    /// `\overset{top}{base}`
    Overset,
    /// `\underset{bottom}{base}`
    Underset,
    /// `\stackrel{top}{rel}`
    Stackrel,
}

impl FracKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "frac" => FracKind::Frac,
            "dfrac" => FracKind::DFrac,
            "tfrac" => FracKind::TFrac,
            "cfrac" => FracKind::CFrac,
            "binom" => FracKind::Binom,
            "dbinom" => FracKind::DBinom,
            "tbinom" => FracKind::TBinom,
            "over" => FracKind::Over,
            "atop" => FracKind::Atop,
            "choose" => FracKind::Choose,
            "overset" => FracKind::Overset,
            "underset" => FracKind::Underset,
            "stackrel" => FracKind::Stackrel,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FracKind::Frac => "frac",
            FracKind::DFrac => "dfrac",
            FracKind::TFrac => "tfrac",
            FracKind::CFrac => "cfrac",
            FracKind::Binom => "binom",
            FracKind::DBinom => "dbinom",
            FracKind::TBinom => "tbinom",
            FracKind::Over => "over",
            FracKind::Atop => "atop",
            FracKind::Choose => "choose",
            FracKind::Overset => "overset",
            FracKind::Underset => "underset",
            FracKind::Stackrel => "stackrel",
        }
    }

    /// Written between its operands rather than before them
    pub fn is_infix(self) -> bool {
        matches!(self, FracKind::Over | FracKind::Atop | FracKind::Choose)
    }

    fn is_stack(self) -> bool {
        matches!(self, FracKind::Overset | FracKind::Underset | FracKind::Stackrel)
    }

    fn has_rule(self) -> bool {
        matches!(
            self,
            FracKind::Frac | FracKind::DFrac | FracKind::TFrac | FracKind::CFrac | FracKind::Over
        )
    }

    fn has_parens(self) -> bool {
        matches!(
            self,
            FracKind::Binom | FracKind::DBinom | FracKind::TBinom | FracKind::Choose
        )
    }

    fn child_style(self, style: MathStyle) -> MathStyle {
        match self {
            FracKind::DFrac | FracKind::DBinom | FracKind::CFrac => MathStyle::Text,
            FracKind::TFrac | FracKind::TBinom => MathStyle::Script,
            _ => style.fraction(),
        }
    }
}

/// Two cells stacked vertically: fractions, binomials and over/under sets
#[derive(Debug, Clone, PartialEq)]
pub struct FracInset {
    pub kind: FracKind,
    pub cells: [MathData; 2],
}

impl FracInset {
    pub fn new(kind: FracKind, first: MathData, second: MathData) -> Self {
        Self {
            kind,
            cells: [first, second],
        }
    }

    /// Geometry shared by metrics and draw: (axis, gap)
    fn spacing(em: f32) -> (f32, f32) {
        (0.25 * em, 0.15 * em)
    }

    fn paren_width(&self, em: f32) -> f32 {
        if self.kind.has_parens() {
            0.4 * em
        } else {
            0.0
        }
    }

    pub fn idx_up_down(&self, idx: usize, up: bool) -> Option<usize> {
        // for \underset the first cell is the lower one
        let upper = if self.kind == FracKind::Underset { 1 } else { 0 };
        let lower = 1 - upper;
        match (idx, up) {
            (i, true) if i == lower => Some(upper),
            (i, false) if i == upper => Some(lower),
            _ => None,
        }
    }
}

impl MathNode for FracInset {
    fn nargs(&self) -> usize {
        2
    }

    fn cell(&self, idx: usize) -> Option<&MathData> {
        self.cells.get(idx)
    }

    fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
        self.cells.get_mut(idx)
    }

    fn write(&self, ws: &mut WriteStream) {
        if self.kind.is_infix() {
            self.cells[0].write(ws);
            ws.cs(self.kind.name());
            self.cells[1].write(ws);
        } else {
            ws.cs(self.kind.name());
            for cell in &self.cells {
                ws.ch('{');
                cell.write(ws);
                ws.ch('}');
            }
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        normalize_cells(ns, self.kind.name(), &[&self.cells[0], &self.cells[1]]);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let em = mi.em();
        let (axis, gap) = Self::spacing(em);
        if self.kind.is_stack() {
            let small = mi.with_style(mi.base.font.style.script());
            let (script_idx, base_idx) = (0, 1);
            let script = self.cells[script_idx].metrics(&small);
            let base = self.cells[base_idx].metrics(mi);
            let wid = script.wid.max(base.wid);
            return if self.kind == FracKind::Underset {
                Dimension::new(wid, base.asc, base.des + gap + script.height())
            } else {
                Dimension::new(wid, base.asc + gap + script.height(), base.des)
            };
        }
        let child = mi.with_style(self.kind.child_style(mi.base.font.style));
        let num = self.cells[0].metrics(&child);
        let den = self.cells[1].metrics(&child);
        let wid = num.wid.max(den.wid) + 0.2 * em + 2.0 * self.paren_width(em);
        Dimension::new(wid, axis + gap + num.height(), gap + den.height() - axis)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        let em = pi.metrics.em(&sc.font);
        let (axis, gap) = Self::spacing(em);
        let first = self.cells[0].dim();
        let second = self.cells[1].dim();
        if self.kind.is_stack() {
            let small = sc.with_style(sc.font.style.script());
            let bx = x + (dim.wid - second.wid) / 2.0;
            let sx = x + (dim.wid - first.wid) / 2.0;
            let sy = if self.kind == FracKind::Underset {
                y + second.des + gap + first.asc
            } else {
                y - second.asc - gap - first.des
            };
            self.cells[0].draw_cell(pi, &small, id, 0, sx, sy);
            self.cells[1].draw_cell(pi, sc, id, 1, bx, y);
            return;
        }
        let child = sc.with_style(self.kind.child_style(sc.font.style));
        let paren = self.paren_width(em);
        let inner = dim.wid - 2.0 * paren;
        let nx = x + paren + (inner - first.wid) / 2.0;
        let dx = x + paren + (inner - second.wid) / 2.0;
        self.cells[0].draw_cell(pi, &child, id, 0, nx, y - axis - gap - first.des);
        self.cells[1].draw_cell(pi, &child, id, 1, dx, y - axis + gap + second.asc);
        if self.kind.has_rule() {
            pi.painter
                .line(x + paren, y - axis, x + paren + inner, y - axis, sc.font.color);
        }
        if paren > 0.0 {
            pi.painter.text(x, y, "(", &sc.font);
            pi.painter.text(x + dim.wid - paren, y, ")", &sc.font);
        }
    }
}

// =============================================================================
// Delimiters
// =============================================================================

/// `\left( ... \right)`
#[derive(Debug, Clone, PartialEq)]
pub struct DelimInset {
    pub left: String,
    pub right: String,
    pub cell: MathData,
}

impl MathNode for DelimInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs("left");
        write_delim(ws, &self.left);
        self.cell.write(ws);
        ws.cs("right");
        write_delim(ws, &self.right);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("delim");
        ns.word(&self.left);
        self.cell.normalize(ns);
        ns.word(&self.right);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let cell = self.cell.metrics(mi);
        let dw = 0.4 * mi.em();
        Dimension::new(cell.wid + 2.0 * dw, cell.asc + 0.1 * mi.em(), cell.des + 0.1 * mi.em())
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        let dw = 0.4 * pi.metrics.em(&sc.font);
        let mut font = sc.font.clone();
        font.base_size *= (dim.height() / pi.metrics.em(&sc.font)).max(1.0);
        pi.painter.text(x, y, delim_glyph(&self.left), &font);
        self.cell.draw_cell(pi, sc, id, 0, x + dw, y);
        pi.painter
            .text(x + dim.wid - dw, y, delim_glyph(&self.right), &font);
    }
}

/// `\bigl(` and friends: a delimiter at a fixed larger size
#[derive(Debug, Clone, PartialEq)]
pub struct BigDelimInset {
    /// `big`, `Bigl`, `biggr`, ...
    pub size: String,
    pub delim: String,
}

impl MathNode for BigDelimInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.size);
        write_delim(ws, &self.delim);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open(&self.size);
        ns.word(&self.delim);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let scale = symbols::big_size(&self.size);
        let dim = mi.text_dim(delim_glyph(&self.delim));
        Dimension::new(dim.wid.max(0.3 * mi.em()), dim.asc * scale, dim.des * scale)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.clone();
        font.base_size *= symbols::big_size(&self.size);
        pi.painter.text(x, y, delim_glyph(&self.delim), &font);
    }
}

// =============================================================================
// Unknown environments
// =============================================================================

/// `\begin{name} ... \end{name}` for environments without known semantics
#[derive(Debug, Clone, PartialEq)]
pub struct EnvInset {
    pub name: String,
    pub cell: MathData,
}

impl MathNode for EnvInset {
    single_cell!();

    fn write(&self, ws: &mut WriteStream) {
        ws.cs("begin");
        ws.braced(&self.name);
        self.cell.write(ws);
        ws.cs("end");
        ws.braced(&self.name);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("env");
        ns.word(&self.name);
        self.cell.normalize(ns);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut dim = self.cell.metrics(mi);
        dim.wid += 0.4 * mi.em();
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        pi.painter
            .rectangle(x, y - dim.asc, dim.wid, dim.height(), Color::MACRO_NAME);
        self.cell
            .draw_cell(pi, sc, id, 0, x + 0.2 * pi.metrics.em(&sc.font), y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{FixedFontMetrics, FontInfo};

    fn latex<N: MathNode>(node: &N) -> String {
        let mut ws = WriteStream::new();
        node.write(&mut ws);
        ws.finish()
    }

    #[test]
    fn test_frac_write() {
        let frac = FracInset::new(FracKind::Frac, MathData::from_chars("1"), MathData::from_chars("2"));
        assert_eq!(latex(&frac), "\\frac{1}{2}");
        let over = FracInset::new(FracKind::Over, MathData::from_chars("a"), MathData::from_chars("b"));
        assert_eq!(latex(&over), "a\\over b");
    }

    #[test]
    fn test_frac_up_down() {
        let frac = FracInset::new(FracKind::Frac, MathData::new(), MathData::new());
        assert_eq!(frac.idx_up_down(1, true), Some(0));
        assert_eq!(frac.idx_up_down(0, false), Some(1));
        assert_eq!(frac.idx_up_down(0, true), None);
        let under = FracInset::new(FracKind::Underset, MathData::new(), MathData::new());
        assert_eq!(under.idx_up_down(0, true), Some(1));
        assert_eq!(under.idx_up_down(1, false), Some(0));
    }

    #[test]
    fn test_frac_is_taller_than_cells() {
        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let mut frac = FracInset::new(FracKind::Frac, MathData::from_chars("1"), MathData::from_chars("2"));
        let dim = frac.metrics(&mi);
        assert!(dim.height() > frac.cells[0].dim().height() + frac.cells[1].dim().height());
    }

    #[test]
    fn test_delim_write() {
        let delim = DelimInset {
            left: "\\langle".to_string(),
            right: ".".to_string(),
            cell: MathData::from_chars("x"),
        };
        assert_eq!(latex(&delim), "\\left\\langle x\\right.");
    }

    #[test]
    fn test_root_write() {
        let root = RootInset::new(MathData::from_chars("3"), MathData::from_chars("x"));
        assert_eq!(latex(&root), "\\sqrt[3]{x}");
    }

    #[test]
    fn test_old_style_color_write() {
        let color = ColorInset {
            color: "red".to_string(),
            old_style: true,
            cell: MathData::from_chars("xy"),
        };
        assert_eq!(latex(&color), "\\color{red}xy");
    }

    #[test]
    fn test_name_tables() {
        assert!(FontInset::is_font_name("mathbf"));
        assert!(FontInset::is_text_font_name("text"));
        assert!(!FontInset::is_text_font_name("mathrm"));
        assert!(DecorationInset::is_decoration_name("overline"));
        assert!(BoxInset::is_box_name("boxed"));
        assert!(PhantomInset::is_phantom_name("vphantom"));
    }
}
