//! Sub- and superscripts
//!
//! A script node always owns its nucleus as cell 0. With a single script the
//! script lives in cell 1 and `cell_1_is_up` says which one it is. With both
//! scripts cell 1 is the subscript and cell 2 the superscript.

use super::{InsetMath, MathNode};
use crate::atom::AtomId;
use crate::data::MathData;
use crate::metrics::{Dimension, MathStyle, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use serde::{Deserialize, Serialize};

/// Placement of scripts relative to the nucleus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Limits {
    /// Above and below for large operators in display style, beside otherwise
    #[default]
    Auto,
    /// Always above and below (`\limits`)
    Limits,
    /// Always beside (`\nolimits`)
    NoLimits,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInset {
    cells: Vec<MathData>,
    cell_1_is_up: bool,
    pub limits: Limits,
}

struct ScriptLayout {
    nuc_x: f32,
    up_x: f32,
    down_x: f32,
    /// Baseline of the superscript above the nucleus baseline
    up_shift: f32,
    /// Baseline of the subscript below the nucleus baseline
    down_shift: f32,
    dim: Dimension,
}

impl ScriptInset {
    /// A script node with the given nucleus and no scripts yet
    pub fn new(nucleus: MathData) -> Self {
        Self {
            cells: vec![nucleus],
            cell_1_is_up: false,
            limits: Limits::Auto,
        }
    }

    /// A script node with one (empty) script
    pub fn with_script(nucleus: MathData, up: bool) -> Self {
        let mut script = Self::new(nucleus);
        script.ensure(up);
        script
    }

    pub fn nuc(&self) -> &MathData {
        &self.cells[0]
    }

    pub fn nuc_mut(&mut self) -> &mut MathData {
        &mut self.cells[0]
    }

    pub fn has_up(&self) -> bool {
        self.cells.len() == 3 || (self.cells.len() == 2 && self.cell_1_is_up)
    }

    pub fn has_down(&self) -> bool {
        self.cells.len() == 3 || (self.cells.len() == 2 && !self.cell_1_is_up)
    }

    /// Whether any script is present
    pub fn has_scripts(&self) -> bool {
        self.cells.len() > 1
    }

    /// Cell index of the requested script, if present
    pub fn idx_of_script(&self, up: bool) -> Option<usize> {
        match self.cells.len() {
            3 => Some(if up { 2 } else { 1 }),
            2 if self.cell_1_is_up == up => Some(1),
            _ => None,
        }
    }

    /// Whether `idx` holds the superscript
    pub fn is_up_idx(&self, idx: usize) -> bool {
        self.idx_of_script(true) == Some(idx)
    }

    pub fn up(&self) -> Option<&MathData> {
        self.idx_of_script(true).map(|i| &self.cells[i])
    }

    pub fn down(&self) -> Option<&MathData> {
        self.idx_of_script(false).map(|i| &self.cells[i])
    }

    pub fn script_mut(&mut self, up: bool) -> Option<&mut MathData> {
        self.idx_of_script(up).map(move |i| &mut self.cells[i])
    }

    /// Create the requested script if absent and return its cell index
    pub fn ensure(&mut self, up: bool) -> usize {
        if let Some(idx) = self.idx_of_script(up) {
            return idx;
        }
        match self.cells.len() {
            1 => {
                self.cells.push(MathData::new());
                self.cell_1_is_up = up;
                1
            }
            _ => {
                // the other script already sits in cell 1
                if up {
                    self.cells.push(MathData::new());
                    self.cell_1_is_up = false;
                    2
                } else {
                    self.cells.insert(1, MathData::new());
                    self.cell_1_is_up = false;
                    1
                }
            }
        }
    }

    /// Drop the requested script, returning its content
    pub fn remove_script(&mut self, up: bool) -> Option<MathData> {
        let idx = self.idx_of_script(up)?;
        let removed = self.cells.remove(idx);
        if self.cells.len() == 2 {
            self.cell_1_is_up = !up;
        }
        Some(removed)
    }

    /// Whether scripts are set above and below the nucleus in `style`
    pub fn has_limits(&self, style: MathStyle) -> bool {
        match self.limits {
            Limits::Limits => true,
            Limits::NoLimits => false,
            Limits::Auto => {
                style == MathStyle::Display
                    && self.nuc().len() == 1
                    && matches!(self.nuc()[0].inset(), InsetMath::Symbol(s) if s.default_limits())
            }
        }
    }

    pub fn idx_up_down(&self, idx: usize, up: bool) -> Option<usize> {
        if idx == 0 {
            return self.idx_of_script(up);
        }
        // leaving a script towards the nucleus
        if self.is_up_idx(idx) != up {
            Some(0)
        } else {
            None
        }
    }

    fn write_script(ws: &mut WriteStream, marker: char, cell: &MathData) {
        ws.ch(marker);
        match cell.first() {
            Some(atom) if cell.len() == 1 && atom.as_char().is_some_and(|c| c.is_ascii_alphanumeric()) => {
                cell.write(ws)
            }
            _ => {
                ws.ch('{');
                cell.write(ws);
                ws.ch('}');
            }
        }
    }

    fn layout(&self, em: f32, style: MathStyle) -> ScriptLayout {
        let nuc = self.nuc().dim();
        let up = self.up().map(MathData::dim).unwrap_or_default();
        let down = self.down().map(MathData::dim).unwrap_or_default();
        let gap = 0.1 * em;
        if self.has_limits(style) {
            let wid = nuc.wid.max(up.wid).max(down.wid);
            let mut dim = Dimension::new(wid, nuc.asc, nuc.des);
            if self.has_up() {
                dim.asc += gap + up.height();
            }
            if self.has_down() {
                dim.des += gap + down.height();
            }
            return ScriptLayout {
                nuc_x: (wid - nuc.wid) / 2.0,
                up_x: (wid - up.wid) / 2.0,
                down_x: (wid - down.wid) / 2.0,
                up_shift: nuc.asc + gap + up.des,
                down_shift: nuc.des + gap + down.asc,
                dim,
            };
        }
        let up_shift = (nuc.asc - 0.5 * up.asc).max(0.35 * em);
        let down_shift = (nuc.des + 0.5 * down.asc).max(0.2 * em);
        let mut dim = nuc;
        let mut script_wid: f32 = 0.0;
        if self.has_up() {
            dim.asc = dim.asc.max(up_shift + up.asc);
            script_wid = script_wid.max(up.wid);
        }
        if self.has_down() {
            dim.des = dim.des.max(down_shift + down.des);
            script_wid = script_wid.max(down.wid);
        }
        dim.wid = nuc.wid + script_wid;
        ScriptLayout {
            nuc_x: 0.0,
            up_x: nuc.wid,
            down_x: nuc.wid,
            up_shift,
            down_shift,
            dim,
        }
    }
}

impl MathNode for ScriptInset {
    fn nargs(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, idx: usize) -> Option<&MathData> {
        self.cells.get(idx)
    }

    fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
        self.cells.get_mut(idx)
    }

    fn write(&self, ws: &mut WriteStream) {
        let nuc = self.nuc();
        if nuc.is_empty() {
            ws.text("{}");
        } else if nuc.len() == 1 && nuc[0].inset().as_script().is_none() {
            nuc.write(ws);
        } else {
            ws.ch('{');
            nuc.write(ws);
            ws.ch('}');
        }
        match self.limits {
            Limits::Auto => {}
            Limits::Limits => ws.cs("limits"),
            Limits::NoLimits => ws.cs("nolimits"),
        }
        if let Some(down) = self.down() {
            Self::write_script(ws, '_', down);
        }
        if let Some(up) = self.up() {
            Self::write_script(ws, '^', up);
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        let name = match (self.has_down(), self.has_up()) {
            (true, true) => "subsup",
            (true, false) => "sub",
            (false, true) => "sup",
            (false, false) => "nucleus",
        };
        ns.open(name);
        self.nuc().normalize(ns);
        if let Some(down) = self.down() {
            down.normalize(ns);
        }
        if let Some(up) = self.up() {
            up.normalize(ns);
        }
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let style = mi.base.font.style;
        self.cells[0].metrics(mi);
        let small = mi.with_style(style.script());
        for cell in self.cells.iter_mut().skip(1) {
            cell.metrics(&small);
        }
        self.layout(mi.em(), style).dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let layout = self.layout(pi.metrics.em(&sc.font), sc.font.style);
        self.nuc().draw_cell(pi, sc, id, 0, x + layout.nuc_x, y);
        let small = sc.with_style(sc.font.style.script());
        if let (Some(idx), Some(up)) = (self.idx_of_script(true), self.up()) {
            up.draw_cell(pi, &small, id, idx, x + layout.up_x, y - layout.up_shift);
        }
        if let (Some(idx), Some(down)) = (self.idx_of_script(false), self.down()) {
            down.draw_cell(pi, &small, id, idx, x + layout.down_x, y + layout.down_shift);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MathAtom;

    fn latex(s: &ScriptInset) -> String {
        let mut ws = WriteStream::new();
        s.write(&mut ws);
        ws.finish()
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut s = ScriptInset::new(MathData::from_chars("x"));
        assert_eq!(s.ensure(true), 1);
        assert_eq!(s.ensure(true), 1);
        assert_eq!(s.nargs(), 2);
        assert!(s.has_up());
        assert!(!s.has_down());
    }

    #[test]
    fn test_both_scripts_layout() {
        let mut s = ScriptInset::new(MathData::from_chars("x"));
        s.ensure(true);
        s.script_mut(true).unwrap().push(MathAtom::new(InsetMath::char('2')));
        assert_eq!(s.ensure(false), 1);
        assert_eq!(s.idx_of_script(true), Some(2));
        assert_eq!(s.up().map(|c| c.to_latex()), Some("2".to_string()));
        assert!(s.down().is_some_and(|c| c.is_empty()));
    }

    #[test]
    fn test_remove_script() {
        let mut s = ScriptInset::new(MathData::from_chars("x"));
        s.ensure(false);
        s.ensure(true);
        assert!(s.remove_script(false).is_some());
        assert!(s.has_up());
        assert!(!s.has_down());
        assert_eq!(s.idx_of_script(true), Some(1));
        assert!(s.remove_script(false).is_none());
        s.remove_script(true);
        assert!(!s.has_scripts());
    }

    #[test]
    fn test_write_order() {
        let mut s = ScriptInset::new(MathData::from_chars("a"));
        s.ensure(true);
        s.script_mut(true).unwrap().append(MathData::from_chars("x"));
        s.ensure(false);
        s.script_mut(false).unwrap().append(MathData::from_chars("yz"));
        assert_eq!(latex(&s), "a_{yz}^x");
    }

    #[test]
    fn test_write_empty_nucleus() {
        let mut s = ScriptInset::new(MathData::new());
        s.ensure(true);
        s.script_mut(true).unwrap().append(MathData::from_chars("2"));
        assert_eq!(latex(&s), "{}^2");
    }

    #[test]
    fn test_up_down_between_cells() {
        let mut s = ScriptInset::new(MathData::from_chars("x"));
        s.ensure(true);
        s.ensure(false);
        assert_eq!(s.idx_up_down(0, true), Some(2));
        assert_eq!(s.idx_up_down(0, false), Some(1));
        assert_eq!(s.idx_up_down(2, false), Some(0));
        assert_eq!(s.idx_up_down(1, true), Some(0));
        assert_eq!(s.idx_up_down(2, true), None);
    }

    #[test]
    fn test_limits_auto() {
        let mut s = ScriptInset::new(MathData::single(MathAtom::new(InsetMath::symbol("sum"))));
        s.ensure(false);
        assert!(s.has_limits(MathStyle::Display));
        assert!(!s.has_limits(MathStyle::Text));
        s.limits = Limits::NoLimits;
        assert!(!s.has_limits(MathStyle::Display));
    }
}
