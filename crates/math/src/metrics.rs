//! Metrics and paint contracts
//!
//! The math tree does not own pixels. A metrics pass asks a [`FontMetrics`]
//! oracle for the size of every glyph run and caches the results on atoms and
//! cells; a later draw pass hands primitives to a [`Painter`] and records
//! where every cell ended up in a [`CoordCache`]. Cursor code uses the cache
//! as its position oracle for vertical movement.

use crate::atom::AtomId;
use crate::data::MathData;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

// =============================================================================
// Geometry
// =============================================================================

/// Width, ascent and descent of a laid out box
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Horizontal extent
    pub wid: f32,
    /// Extent above the baseline
    pub asc: f32,
    /// Extent below the baseline
    pub des: f32,
}

impl Dimension {
    pub fn new(wid: f32, asc: f32, des: f32) -> Self {
        Self { wid, asc, des }
    }

    /// Total height
    pub fn height(&self) -> f32 {
        self.asc + self.des
    }

    /// Place `other` to the right of this box
    pub fn add_horizontal(&mut self, other: &Dimension) {
        self.wid += other.wid;
        self.asc = self.asc.max(other.asc);
        self.des = self.des.max(other.des);
    }
}

/// A point on screen (y grows downwards)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    /// Frame drawn around empty cells
    pub const PLACEHOLDER: Color = Color::rgb(0, 0, 200);
    /// Macro names shown while unfolded
    pub const MACRO_NAME: Color = Color::rgb(140, 0, 140);

    /// Resolve a LaTeX color name, falling back to black
    pub fn from_name(name: &str) -> Self {
        match name {
            "red" => Self::RED,
            "blue" => Self::BLUE,
            "green" => Self::rgb(0, 160, 0),
            "magenta" => Self::rgb(255, 0, 255),
            "cyan" => Self::rgb(0, 255, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "white" => Self::rgb(255, 255, 255),
            "gray" => Self::rgb(128, 128, 128),
            _ => Self::BLACK,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

// =============================================================================
// Fonts
// =============================================================================

/// TeX math style, controlling script sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MathStyle {
    Display,
    Text,
    Script,
    ScriptScript,
}

impl MathStyle {
    /// Style used for sub- and superscripts
    pub fn script(self) -> Self {
        match self {
            MathStyle::Display | MathStyle::Text => MathStyle::Script,
            MathStyle::Script | MathStyle::ScriptScript => MathStyle::ScriptScript,
        }
    }

    /// Style used for fraction numerators and denominators
    pub fn fraction(self) -> Self {
        match self {
            MathStyle::Display => MathStyle::Text,
            other => other.script(),
        }
    }

    /// Size multiplier relative to the base font size
    pub fn scale(self) -> f32 {
        match self {
            MathStyle::Display | MathStyle::Text => 1.0,
            MathStyle::Script => 0.7,
            MathStyle::ScriptScript => 0.5,
        }
    }
}

/// Font descriptor handed to the metrics oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    /// Font family name, e.g. `mathnormal` or `mathrm`
    pub family: String,
    /// Base size in points
    pub base_size: f32,
    pub style: MathStyle,
    pub color: Color,
    /// Text mode content
    pub text_mode: bool,
}

impl FontInfo {
    /// Effective size after applying the math style
    pub fn size(&self) -> f32 {
        self.base_size * self.style.scale()
    }

    pub fn with_style(&self, style: MathStyle) -> Self {
        Self {
            style,
            ..self.clone()
        }
    }

    pub fn with_family(&self, family: &str) -> Self {
        Self {
            family: family.to_string(),
            ..self.clone()
        }
    }
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            family: "mathnormal".to_string(),
            base_size: 12.0,
            style: MathStyle::Text,
            color: Color::BLACK,
            text_mode: false,
        }
    }
}

/// Font metrics oracle
pub trait FontMetrics {
    /// Size of `text` set in `font`
    fn dimension(&self, font: &FontInfo, text: &str) -> Dimension;

    /// Width of one em in `font`
    fn em(&self, font: &FontInfo) -> f32 {
        font.size()
    }
}

/// Metrics with a fixed advance per grapheme
#[derive(Debug, Clone, Copy)]
pub struct FixedFontMetrics {
    /// Advance per grapheme in em
    pub advance: f32,
    /// Ascent in em
    pub ascent: f32,
    /// Descent in em
    pub descent: f32,
}

impl Default for FixedFontMetrics {
    fn default() -> Self {
        Self {
            advance: 0.5,
            ascent: 0.8,
            descent: 0.2,
        }
    }
}

impl FontMetrics for FixedFontMetrics {
    fn dimension(&self, font: &FontInfo, text: &str) -> Dimension {
        let em = font.size();
        let count = text.graphemes(true).count() as f32;
        Dimension::new(count * self.advance * em, self.ascent * em, self.descent * em)
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// Argument cells of a macro instance visible to its expansion
///
/// Argument proxies in an expanded macro body look up their cell here by
/// owner identity. The chain follows nested expansions outwards.
#[derive(Debug, Clone, Copy)]
pub struct MacroArgs<'a> {
    pub owner: AtomId,
    pub cells: &'a [MathData],
    pub parent: Option<&'a MacroArgs<'a>>,
}

impl<'a> MacroArgs<'a> {
    /// Find the argument cell `idx` of `owner` and the context it lives in
    pub fn lookup(&self, owner: AtomId, idx: usize) -> Option<(&'a MathData, Option<&'a MacroArgs<'a>>)> {
        if self.owner == owner {
            return self.cells.get(idx).map(|cell| (cell, self.parent));
        }
        self.parent.and_then(|p| p.lookup(owner, idx))
    }
}

/// Style context shared by the metrics and draw passes
#[derive(Debug, Clone)]
pub struct StyleContext<'a> {
    pub font: FontInfo,
    pub args: Option<&'a MacroArgs<'a>>,
}

impl<'a> StyleContext<'a> {
    pub fn new(font: FontInfo) -> Self {
        Self { font, args: None }
    }

    pub fn with_font(&self, font: FontInfo) -> Self {
        Self {
            font,
            args: self.args,
        }
    }

    pub fn with_style(&self, style: MathStyle) -> Self {
        self.with_font(self.font.with_style(style))
    }

    pub fn with_args<'b>(&self, args: &'b MacroArgs<'b>) -> StyleContext<'b>
    where
        'a: 'b,
    {
        StyleContext {
            font: self.font.clone(),
            args: Some(args),
        }
    }
}

/// Input to the metrics pass
pub struct MetricsInfo<'a> {
    pub metrics: &'a dyn FontMetrics,
    pub base: StyleContext<'a>,
}

impl<'a> MetricsInfo<'a> {
    pub fn new(metrics: &'a dyn FontMetrics, font: FontInfo) -> Self {
        Self {
            metrics,
            base: StyleContext::new(font),
        }
    }

    /// Same oracle, different style context
    pub fn derive<'b>(&self, base: StyleContext<'b>) -> MetricsInfo<'b>
    where
        'a: 'b,
    {
        MetricsInfo {
            metrics: self.metrics,
            base,
        }
    }

    pub fn with_style(&self, style: MathStyle) -> MetricsInfo<'a> {
        self.derive(self.base.with_style(style))
    }

    pub fn with_font(&self, font: FontInfo) -> MetricsInfo<'a> {
        self.derive(self.base.with_font(font))
    }

    /// Dimension of `text` in the current font
    pub fn text_dim(&self, text: &str) -> Dimension {
        self.metrics.dimension(&self.base.font, text)
    }

    pub fn em(&self) -> f32 {
        self.metrics.em(&self.base.font)
    }
}

// =============================================================================
// Painting
// =============================================================================

/// Primitive paint operations
pub trait Painter {
    fn text(&mut self, x: f32, y: f32, text: &str, font: &FontInfo);
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color);
    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color);
}

/// A primitive recorded by [`RecordingPainter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderPrimitive {
    Text {
        text: String,
        position: Point,
        size: f32,
        color: Color,
    },
    Line {
        start: Point,
        end: Point,
        color: Color,
    },
    Rectangle {
        origin: Point,
        width: f32,
        height: f32,
        color: Color,
    },
}

/// Painter that records primitives instead of drawing them
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub primitives: Vec<RenderPrimitive>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All text runs in paint order
    pub fn texts(&self) -> Vec<&str> {
        self.primitives
            .iter()
            .filter_map(|p| match p {
                RenderPrimitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Painter for RecordingPainter {
    fn text(&mut self, x: f32, y: f32, text: &str, font: &FontInfo) {
        self.primitives.push(RenderPrimitive::Text {
            text: text.to_string(),
            position: Point::new(x, y),
            size: font.size(),
            color: font.color,
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color) {
        self.primitives.push(RenderPrimitive::Line {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
            color,
        });
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.primitives.push(RenderPrimitive::Rectangle {
            origin: Point::new(x, y),
            width: w,
            height: h,
            color,
        });
    }
}

/// Input to the draw pass
pub struct PainterInfo<'a> {
    pub painter: &'a mut dyn Painter,
    pub coords: &'a mut CoordCache,
    pub metrics: &'a dyn FontMetrics,
}

impl<'a> PainterInfo<'a> {
    pub fn new(
        painter: &'a mut dyn Painter,
        coords: &'a mut CoordCache,
        metrics: &'a dyn FontMetrics,
    ) -> Self {
        Self {
            painter,
            coords,
            metrics,
        }
    }
}

// =============================================================================
// Coordinate cache
// =============================================================================

/// Where a cell was drawn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGeometry {
    /// Baseline origin of the cell
    pub origin: Point,
    pub dim: Dimension,
    /// x offset of every cursor position, `len + 1` entries
    pub stops: Vec<f32>,
}

impl CellGeometry {
    /// Screen x of cursor position `pos`
    pub fn x_of(&self, pos: usize) -> f32 {
        let offset = self
            .stops
            .get(pos)
            .or_else(|| self.stops.last())
            .copied()
            .unwrap_or(0.0);
        self.origin.x + offset
    }

    /// Cursor position closest to screen x
    pub fn pos_of(&self, x: f32) -> usize {
        let rel = x - self.origin.x;
        let mut best = 0;
        let mut best_dist = f32::MAX;
        for (i, stop) in self.stops.iter().enumerate() {
            let dist = (stop - rel).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

/// Where an inset was drawn
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InsetGeometry {
    pub origin: Point,
    pub dim: Dimension,
}

/// Position cache filled by the draw pass
#[derive(Debug, Default)]
pub struct CoordCache {
    cells: HashMap<(AtomId, usize), CellGeometry>,
    insets: HashMap<AtomId, InsetGeometry>,
    rows: HashMap<usize, CellGeometry>,
}

impl CoordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.insets.clear();
        self.rows.clear();
    }

    pub fn record_cell(&mut self, owner: AtomId, idx: usize, geometry: CellGeometry) {
        self.cells.insert((owner, idx), geometry);
    }

    pub fn record_inset(&mut self, id: AtomId, origin: Point, dim: Dimension) {
        self.insets.insert(id, InsetGeometry { origin, dim });
    }

    /// Record a text row (one paragraph of the document)
    pub fn record_row(&mut self, pit: usize, geometry: CellGeometry) {
        self.rows.insert(pit, geometry);
    }

    pub fn cell(&self, owner: AtomId, idx: usize) -> Option<&CellGeometry> {
        self.cells.get(&(owner, idx))
    }

    pub fn inset(&self, id: AtomId) -> Option<&InsetGeometry> {
        self.insets.get(&id)
    }

    pub fn row(&self, pit: usize) -> Option<&CellGeometry> {
        self.rows.get(&pit)
    }

    pub fn has_cell(&self, owner: AtomId, idx: usize) -> bool {
        self.cells.contains_key(&(owner, idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_script_chain() {
        assert_eq!(MathStyle::Display.script(), MathStyle::Script);
        assert_eq!(MathStyle::Script.script(), MathStyle::ScriptScript);
        assert_eq!(MathStyle::Display.fraction(), MathStyle::Text);
        assert_eq!(MathStyle::Text.fraction(), MathStyle::Script);
    }

    #[test]
    fn test_fixed_metrics_graphemes() {
        let fm = FixedFontMetrics::default();
        let font = FontInfo::default();
        let dim = fm.dimension(&font, "ab");
        assert_eq!(dim.wid, 12.0);
        // combining accent counts as one grapheme with its base
        let accented = fm.dimension(&font, "e\u{0301}");
        assert_eq!(accented.wid, 6.0);
    }

    #[test]
    fn test_script_font_smaller() {
        let font = FontInfo::default();
        let script = font.with_style(MathStyle::Script);
        assert!(script.size() < font.size());
    }

    #[test]
    fn test_cell_geometry_lookup() {
        let geom = CellGeometry {
            origin: Point::new(10.0, 20.0),
            dim: Dimension::new(12.0, 8.0, 2.0),
            stops: vec![0.0, 6.0, 12.0],
        };
        assert_eq!(geom.x_of(1), 16.0);
        assert_eq!(geom.pos_of(21.0), 2);
        assert_eq!(geom.pos_of(9.0), 0);
        assert_eq!(geom.x_of(9), 22.0);
    }

    #[test]
    fn test_recording_painter() {
        let mut painter = RecordingPainter::new();
        painter.text(0.0, 0.0, "x", &FontInfo::default());
        painter.line(0.0, 0.0, 1.0, 0.0, Color::BLACK);
        assert_eq!(painter.primitives.len(), 2);
        assert_eq!(painter.texts(), vec!["x"]);
    }
}
