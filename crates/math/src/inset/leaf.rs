//! Leaf nodes: characters, symbols, spaces and other childless atoms

use super::MathNode;
use crate::atom::AtomId;
use crate::length::Length;
use crate::metrics::{Color, Dimension, MathStyle, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use crate::symbols::{self, SymbolClass};

/// Horizontal spacing around binary operators and relations
fn class_spacing(class: SymbolClass, style: MathStyle, em: f32) -> f32 {
    if style >= MathStyle::Script {
        return 0.0;
    }
    match class {
        SymbolClass::Rel => em * 5.0 / 18.0,
        SymbolClass::Bin => em * 2.0 / 9.0,
        _ => 0.0,
    }
}

fn draw_glyph(
    pi: &mut PainterInfo<'_>,
    sc: &StyleContext<'_>,
    text: &str,
    class: SymbolClass,
    x: f32,
    y: f32,
) {
    let pad = class_spacing(class, sc.font.style, pi.metrics.em(&sc.font));
    pi.painter.text(x + pad, y, text, &sc.font);
}

// =============================================================================
// Characters
// =============================================================================

/// A single character
#[derive(Debug, Clone, PartialEq)]
pub struct CharInset {
    pub ch: char,
}

impl CharInset {
    pub fn new(ch: char) -> Self {
        Self { ch }
    }

    pub fn class(&self) -> SymbolClass {
        symbols::char_class(self.ch)
    }
}

impl MathNode for CharInset {
    fn write(&self, ws: &mut WriteStream) {
        match self.ch {
            '{' | '}' | '%' | '$' | '&' | '#' | '_' => ws.cs(&self.ch.to_string()),
            '\\' => ws.cs("backslash"),
            c => ws.ch(c),
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("char");
        ns.word(&self.ch.to_string());
        ns.word(self.class().as_str());
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut dim = mi.text_dim(&self.ch.to_string());
        if !mi.base.font.text_mode {
            dim.wid += 2.0 * class_spacing(self.class(), mi.base.font.style, mi.em());
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let class = if sc.font.text_mode { SymbolClass::Ord } else { self.class() };
        draw_glyph(pi, sc, &self.ch.to_string(), class, x, y);
    }
}

// =============================================================================
// Named symbols
// =============================================================================

/// A control word standing for one glyph (`\alpha`, `\leq`, `\sum`)
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInset {
    pub name: String,
}

impl SymbolInset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn info(&self) -> Option<&'static symbols::SymbolInfo> {
        symbols::lookup(&self.name)
    }

    pub fn class(&self) -> SymbolClass {
        self.info().map(|i| i.class).unwrap_or(SymbolClass::Ord)
    }

    /// Whether scripts default to limits position in display style
    pub fn default_limits(&self) -> bool {
        self.info().map(|i| i.limits).unwrap_or(false)
    }

    fn glyph(&self) -> &str {
        self.info().map(|i| i.glyph).unwrap_or(self.name.as_str())
    }
}

impl MathNode for SymbolInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("symbol");
        ns.word(&self.name);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let class = self.class();
        let mut dim = if class == SymbolClass::Op && mi.base.font.style == MathStyle::Display {
            let mut d = mi.text_dim(self.glyph());
            d.wid *= 1.4;
            d.asc *= 1.4;
            d.des *= 1.4;
            d
        } else {
            mi.text_dim(self.glyph())
        };
        dim.wid += 2.0 * class_spacing(class, mi.base.font.style, mi.em());
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        draw_glyph(pi, sc, self.glyph(), self.class(), x, y);
    }
}

// =============================================================================
// Strings
// =============================================================================

/// A run of literal text written verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct StringInset {
    pub text: String,
}

impl StringInset {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl MathNode for StringInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.text(&self.text);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("string");
        ns.word(&self.text);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        mi.text_dim(&self.text)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        pi.painter.text(x, y, &self.text, &sc.font);
    }
}

// =============================================================================
// Spaces and kerns
// =============================================================================

/// Kind of a math space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpaceKind {
    /// `\,`
    Thin,
    /// `\:`
    Medium,
    /// `\;`
    Thick,
    /// `\!`
    NegThin,
    /// `\ `
    Normal,
    /// `~`
    Protected,
    Quad,
    QQuad,
    Enspace,
    /// `\hspace{len}`
    Custom(Length),
}

impl SpaceKind {
    /// Recognize a control sequence name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "," | "thinspace" => SpaceKind::Thin,
            ":" | ">" | "medspace" => SpaceKind::Medium,
            ";" | "thickspace" => SpaceKind::Thick,
            "!" | "negthinspace" => SpaceKind::NegThin,
            " " => SpaceKind::Normal,
            "quad" => SpaceKind::Quad,
            "qquad" => SpaceKind::QQuad,
            "enspace" => SpaceKind::Enspace,
            _ => return None,
        })
    }

    fn width_em(&self) -> f32 {
        match self {
            SpaceKind::Thin => 1.0 / 6.0,
            SpaceKind::Medium => 2.0 / 9.0,
            SpaceKind::Thick => 5.0 / 18.0,
            SpaceKind::NegThin => -1.0 / 6.0,
            SpaceKind::Normal | SpaceKind::Protected => 1.0 / 3.0,
            SpaceKind::Quad => 1.0,
            SpaceKind::QQuad => 2.0,
            SpaceKind::Enspace => 0.5,
            SpaceKind::Custom(_) => 0.0,
        }
    }
}

/// Horizontal space
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInset {
    pub kind: SpaceKind,
}

impl SpaceInset {
    pub fn new(kind: SpaceKind) -> Self {
        Self { kind }
    }
}

impl MathNode for SpaceInset {
    fn write(&self, ws: &mut WriteStream) {
        match self.kind {
            SpaceKind::Thin => ws.cs(","),
            SpaceKind::Medium => ws.cs(":"),
            SpaceKind::Thick => ws.cs(";"),
            SpaceKind::NegThin => ws.cs("!"),
            SpaceKind::Normal => ws.cs(" "),
            SpaceKind::Protected => ws.ch('~'),
            SpaceKind::Quad => ws.cs("quad"),
            SpaceKind::QQuad => ws.cs("qquad"),
            SpaceKind::Enspace => ws.cs("enspace"),
            SpaceKind::Custom(len) => {
                ws.cs("hspace");
                ws.braced(&len.to_string());
            }
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("space");
        match self.kind {
            SpaceKind::Custom(len) => ns.word(&len.to_string()),
            other => ns.word(&format!("{:?}", other).to_lowercase()),
        }
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let em = mi.em();
        let wid = match self.kind {
            SpaceKind::Custom(len) => len.to_pixels(em),
            other => other.width_em() * em,
        };
        Dimension::new(wid, 0.0, 0.0)
    }

    fn draw(&self, _pi: &mut PainterInfo<'_>, _sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, _x: f32, _y: f32) {}
}

/// `\kern<length>`
#[derive(Debug, Clone, PartialEq)]
pub struct KernInset {
    pub length: Length,
}

impl MathNode for KernInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.cs("kern");
        ws.word(&self.length.to_string());
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("kern");
        ns.word(&self.length.to_string());
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        Dimension::new(self.length.to_pixels(mi.em()), 0.0, 0.0)
    }

    fn draw(&self, _pi: &mut PainterInfo<'_>, _sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, _x: f32, _y: f32) {}
}

// =============================================================================
// Unknown commands
// =============================================================================

/// A control word with no known meaning, kept for round-tripping
///
/// While `is_final` is false the node is the name being typed in macro mode.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownInset {
    pub name: String,
    pub is_final: bool,
}

impl UnknownInset {
    pub fn new(name: &str, is_final: bool) -> Self {
        Self {
            name: name.to_string(),
            is_final,
        }
    }
}

impl MathNode for UnknownInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.cs(&self.name);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("unknown");
        ns.word(&self.name);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        mi.text_dim(&format!("\\{}", self.name))
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.clone();
        font.color = if self.is_final { Color::RED } else { Color::MACRO_NAME };
        pi.painter.text(x, y, &format!("\\{}", self.name), &font);
    }
}

// =============================================================================
// Macro arguments
// =============================================================================

/// `#n` inside a macro definition body
#[derive(Debug, Clone, PartialEq)]
pub struct MacroArgument {
    /// One-based argument number
    pub number: usize,
}

impl MathNode for MacroArgument {
    fn write(&self, ws: &mut WriteStream) {
        ws.ch('#');
        ws.text(&self.number.to_string());
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("macroarg");
        ns.word(&self.number.to_string());
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        mi.text_dim(&format!("#{}", self.number))
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        pi.painter.text(x, y, &format!("#{}", self.number), &sc.font);
    }
}

/// Stand-in for argument `idx` of the macro instance `owner`
///
/// Only appears in the cached expansion of an instance. It refers to the
/// instance by identity and never owns the argument content.
#[derive(Debug, Clone)]
pub struct ArgumentProxy {
    pub owner: AtomId,
    pub idx: usize,
}

impl PartialEq for ArgumentProxy {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl MathNode for ArgumentProxy {
    fn write(&self, ws: &mut WriteStream) {
        ws.ch('#');
        ws.text(&(self.idx + 1).to_string());
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open("argproxy");
        ns.word(&(self.idx + 1).to_string());
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        mi.base
            .args
            .and_then(|args| args.lookup(self.owner, self.idx))
            .map(|(cell, _)| cell.dim())
            .unwrap_or_else(|| mi.text_dim("#"))
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        match sc.args.and_then(|args| args.lookup(self.owner, self.idx)) {
            Some((cell, outer)) => {
                let inner = StyleContext {
                    font: sc.font.clone(),
                    args: outer,
                };
                cell.draw_cell(pi, &inner, self.owner, self.idx, x, y);
            }
            None => pi.painter.text(x, y, "#", &sc.font),
        }
    }
}

// =============================================================================
// Labels and references
// =============================================================================

/// Kind of a cross-reference command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Label,
    Ref,
    EqRef,
    PageRef,
}

impl RefKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "label" => RefKind::Label,
            "ref" => RefKind::Ref,
            "eqref" => RefKind::EqRef,
            "pageref" => RefKind::PageRef,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            RefKind::Label => "label",
            RefKind::Ref => "ref",
            RefKind::EqRef => "eqref",
            RefKind::PageRef => "pageref",
        }
    }
}

/// `\label{x}`, `\ref{x}` and friends; the argument is verbatim text
#[derive(Debug, Clone, PartialEq)]
pub struct RefInset {
    pub kind: RefKind,
    pub target: String,
}

impl RefInset {
    fn display(&self) -> String {
        match self.kind {
            RefKind::Label => format!("[{}]", self.target),
            RefKind::EqRef => format!("({})", self.target),
            _ => format!("[{}]", self.target),
        }
    }
}

impl MathNode for RefInset {
    fn write(&self, ws: &mut WriteStream) {
        ws.cs(self.kind.name());
        ws.braced(&self.target);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open(self.kind.name());
        ns.word(&self.target);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        mi.text_dim(&self.display())
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, _id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut font = sc.font.clone();
        font.color = Color::BLUE;
        pi.painter.text(x, y, &self.display(), &font);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::length::LengthUnit;
    use crate::metrics::{FixedFontMetrics, FontInfo};

    fn latex<N: MathNode>(node: &N) -> String {
        let mut ws = WriteStream::new();
        node.write(&mut ws);
        ws.finish()
    }

    #[test]
    fn test_char_escapes() {
        assert_eq!(latex(&CharInset::new('x')), "x");
        assert_eq!(latex(&CharInset::new('{')), "\\{");
        assert_eq!(latex(&CharInset::new('%')), "\\%");
        assert_eq!(latex(&CharInset::new('\\')), "\\backslash");
    }

    #[test]
    fn test_relation_gets_spacing() {
        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let plain = CharInset::new('x').metrics(&mi).wid;
        let rel = CharInset::new('=').metrics(&mi).wid;
        assert!(rel > plain);
        let script = mi.with_style(MathStyle::Script);
        let small = CharInset::new('=').metrics(&script).wid;
        assert_eq!(small, CharInset::new('x').metrics(&script).wid);
    }

    #[test]
    fn test_space_write() {
        assert_eq!(latex(&SpaceInset::new(SpaceKind::Thin)), "\\,");
        assert_eq!(latex(&SpaceInset::new(SpaceKind::Protected)), "~");
        let custom = SpaceInset::new(SpaceKind::Custom(Length::new(2.0, LengthUnit::Em)));
        assert_eq!(latex(&custom), "\\hspace{2em}");
    }

    #[test]
    fn test_kern_write() {
        let kern = KernInset {
            length: Length::new(-1.5, LengthUnit::Mu),
        };
        assert_eq!(latex(&kern), "\\kern-1.5mu");
    }

    #[test]
    fn test_ref_write() {
        let r = RefInset {
            kind: RefKind::EqRef,
            target: "eq:a".to_string(),
        };
        assert_eq!(latex(&r), "\\eqref{eq:a}");
    }

    #[test]
    fn test_macro_argument_write() {
        assert_eq!(latex(&MacroArgument { number: 2 }), "#2");
    }
}
