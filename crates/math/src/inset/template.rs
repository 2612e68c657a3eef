//! Macro definitions as editable nodes

use super::{InsetMath, MathNode};
use crate::atom::{AtomId, MathAtom};
use crate::data::MathData;
use crate::macros::MacroData;
use crate::metrics::{Color, Dimension, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use serde::{Deserialize, Serialize};

/// Highest argument number LaTeX accepts
pub const MAX_ARGS: usize = 9;

/// Which command introduced the definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateKind {
    Def,
    NewCommand,
    RenewCommand,
    /// `\newcommandx` from xargs, optional arguments anywhere
    NewCommandX,
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "def" => TemplateKind::Def,
            "newcommand" => TemplateKind::NewCommand,
            "renewcommand" => TemplateKind::RenewCommand,
            "newcommandx" => TemplateKind::NewCommandX,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            TemplateKind::Def => "def",
            TemplateKind::NewCommand => "newcommand",
            TemplateKind::RenewCommand => "renewcommand",
            TemplateKind::NewCommandX => "newcommandx",
        }
    }
}

/// `\newcommand{\name}[n][default]{definition}` and friends
///
/// Cells: the name, one default per optional argument in argument order,
/// the definition and the display override.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroTemplate {
    pub kind: TemplateKind,
    optional_at: Vec<bool>,
    cells: Vec<MathData>,
}

impl MacroTemplate {
    pub fn new(kind: TemplateKind, name: &str) -> Self {
        Self {
            kind,
            optional_at: Vec::new(),
            cells: vec![MathData::from_chars(name), MathData::new(), MathData::new()],
        }
    }

    /// Assemble a template; `defaults` holds one cell per optional argument
    pub fn from_parts(
        kind: TemplateKind,
        name: &str,
        optional_at: Vec<bool>,
        defaults: Vec<MathData>,
        definition: MathData,
        display: MathData,
    ) -> Self {
        let optionals = optional_at.iter().filter(|&&o| o).count();
        let mut defaults = defaults;
        defaults.resize_with(optionals, MathData::new);
        let mut cells = Vec::with_capacity(optionals + 3);
        cells.push(MathData::from_chars(name));
        cells.extend(defaults);
        cells.push(definition);
        cells.push(display);
        Self {
            kind,
            optional_at,
            cells,
        }
    }

    pub fn name(&self) -> String {
        self.cells[0]
            .iter()
            .map(|a| a.as_char().map(String::from).unwrap_or_else(|| a.to_latex()))
            .collect()
    }

    pub fn arity(&self) -> usize {
        self.optional_at.len()
    }

    pub fn optionals(&self) -> usize {
        self.optional_at.iter().filter(|&&o| o).count()
    }

    pub fn is_optional(&self, arg: usize) -> bool {
        self.optional_at.get(arg).copied().unwrap_or(false)
    }

    /// Cell index of the default of optional argument `arg`
    pub fn default_idx(&self, arg: usize) -> Option<usize> {
        self.is_optional(arg)
            .then(|| 1 + self.optional_at[..arg].iter().filter(|&&o| o).count())
    }

    pub fn definition_idx(&self) -> usize {
        1 + self.optionals()
    }

    pub fn display_idx(&self) -> usize {
        self.definition_idx() + 1
    }

    pub fn definition(&self) -> &MathData {
        &self.cells[self.definition_idx()]
    }

    pub fn display(&self) -> &MathData {
        &self.cells[self.display_idx()]
    }

    /// The definition for the macro table
    pub fn to_macro_data(&self) -> MacroData {
        let mut data = MacroData::new(&self.name(), &self.definition().to_latex(), self.arity());
        for arg in 0..self.arity() {
            if let Some(idx) = self.default_idx(arg) {
                data = data.with_optional(arg, &self.cells[idx].to_latex());
            }
        }
        data.with_display(&self.display().to_latex())
    }

    // =========================================================================
    // Parameter editing
    // =========================================================================

    /// Insert a mandatory parameter before argument `pos`
    ///
    /// `#n` references at or after `pos` are shifted up by one.
    pub fn add_param(&mut self, pos: usize) -> bool {
        if self.arity() >= MAX_ARGS || pos > self.arity() {
            return false;
        }
        self.optional_at.insert(pos, false);
        self.renumber(&mut |n| Some(if n > pos { n + 1 } else { n }));
        true
    }

    /// Remove parameter `pos` and every `#n` reference to it
    pub fn remove_param(&mut self, pos: usize) -> bool {
        if pos >= self.arity() {
            return false;
        }
        if let Some(idx) = self.default_idx(pos) {
            self.cells.remove(idx);
        }
        self.optional_at.remove(pos);
        let number = pos + 1;
        self.renumber(&mut |n| match n.cmp(&number) {
            std::cmp::Ordering::Less => Some(n),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(n - 1),
        });
        true
    }

    /// Give argument `arg` an (empty) default
    ///
    /// `\newcommand` only supports a leading optional argument; anything
    /// else turns the template into `\newcommandx`.
    pub fn make_optional(&mut self, arg: usize) -> bool {
        if arg >= self.arity() || self.is_optional(arg) {
            return false;
        }
        match self.kind {
            TemplateKind::Def => return false,
            TemplateKind::NewCommand | TemplateKind::RenewCommand if arg != 0 => {
                self.kind = TemplateKind::NewCommandX;
            }
            _ => {}
        }
        self.optional_at[arg] = true;
        let idx = self.default_idx(arg).unwrap_or(1);
        self.cells.insert(idx, MathData::new());
        true
    }

    /// Turn optional argument `arg` back into a mandatory one, dropping its default
    pub fn make_non_optional(&mut self, arg: usize) -> bool {
        let Some(idx) = self.default_idx(arg) else {
            return false;
        };
        self.cells.remove(idx);
        self.optional_at[arg] = false;
        true
    }

    fn renumber(&mut self, map: &mut dyn FnMut(usize) -> Option<usize>) {
        let (def, display) = (self.definition_idx(), self.display_idx());
        for idx in [def, display] {
            renumber_cell(&mut self.cells[idx], map);
        }
    }

    fn write_name(&self, ws: &mut WriteStream) {
        ws.text("\\");
        ws.text(&self.name());
    }
}

fn renumber_cell(cell: &mut MathData, map: &mut dyn FnMut(usize) -> Option<usize>) {
    let mut pos = 0;
    while pos < cell.len() {
        let number = match cell[pos].inset() {
            InsetMath::MacroArgument(arg) => Some(arg.number),
            _ => None,
        };
        match number.map(&mut *map) {
            Some(None) => {
                cell.erase(pos);
                continue;
            }
            Some(Some(n)) => {
                if let Some(InsetMath::MacroArgument(arg)) = cell.get_mut(pos).map(MathAtom::inset_mut) {
                    arg.number = n;
                }
            }
            None => {
                if let Some(atom) = cell.get_mut(pos) {
                    let inset = atom.inset_mut();
                    for idx in 0..inset.nargs() {
                        if let Some(child) = inset.cell_mut(idx) {
                            renumber_cell(child, map);
                        }
                    }
                }
            }
        }
        pos += 1;
    }
}

impl MathNode for MacroTemplate {
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
        match self.kind {
            TemplateKind::Def => {
                ws.cs("def");
                self.write_name(ws);
                for n in 1..=self.arity() {
                    ws.text(&format!("#{n}"));
                }
            }
            TemplateKind::NewCommand | TemplateKind::RenewCommand => {
                ws.cs(self.kind.name());
                ws.ch('{');
                self.write_name(ws);
                ws.ch('}');
                if self.arity() > 0 {
                    ws.text(&format!("[{}]", self.arity()));
                }
                if let Some(idx) = self.default_idx(0) {
                    ws.ch('[');
                    self.cells[idx].write(ws);
                    ws.ch(']');
                }
            }
            TemplateKind::NewCommandX => {
                ws.cs(self.kind.name());
                ws.ch('{');
                self.write_name(ws);
                ws.ch('}');
                if self.arity() > 0 {
                    ws.text(&format!("[{}]", self.arity()));
                }
                if self.optionals() > 0 {
                    ws.ch('[');
                    let mut first = true;
                    for arg in 0..self.arity() {
                        if let Some(idx) = self.default_idx(arg) {
                            if !first {
                                ws.ch(',');
                            }
                            first = false;
                            ws.text(&format!("{}=", arg + 1));
                            self.cells[idx].write(ws);
                        }
                    }
                    ws.ch(']');
                }
            }
        }
        ws.ch('{');
        self.definition().write(ws);
        ws.ch('}');
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open(self.kind.name());
        ns.word(&self.name());
        ns.word(&self.arity().to_string());
        for cell in &self.cells[1..] {
            cell.normalize(ns);
        }
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let mut text_font = mi.base.font.clone();
        text_font.text_mode = true;
        let mut dim = mi.text_dim("\\");
        dim.add_horizontal(&self.cells[0].metrics(&mi.with_font(text_font)));
        let def = self.definition_idx();
        for idx in 1..self.cells.len() {
            let d = self.cells[idx].metrics(mi);
            if idx == def + 1 && self.cells[idx].is_empty() {
                continue;
            }
            let (open, close) = frame(idx, def);
            dim.add_horizontal(&mi.text_dim(open));
            dim.add_horizontal(&d);
            dim.add_horizontal(&mi.text_dim(close));
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        let mut label_font = sc.font.clone();
        label_font.color = Color::MACRO_NAME;
        let mut text_font = label_font.clone();
        text_font.text_mode = true;

        pi.painter.text(x, y, "\\", &label_font);
        let mut cx = x + pi.metrics.dimension(&sc.font, "\\").wid;
        self.cells[0].draw_cell(pi, &sc.with_font(text_font), id, 0, cx, y);
        cx += self.cells[0].dim().wid;

        let def = self.definition_idx();
        for idx in 1..self.cells.len() {
            if idx == def + 1 && self.cells[idx].is_empty() {
                continue;
            }
            let (open, close) = frame(idx, def);
            pi.painter.text(cx, y, open, &label_font);
            cx += pi.metrics.dimension(&sc.font, open).wid;
            self.cells[idx].draw_cell(pi, sc, id, idx, cx, y);
            cx += self.cells[idx].dim().wid;
            pi.painter.text(cx, y, close, &label_font);
            cx += pi.metrics.dimension(&sc.font, close).wid;
        }
    }
}

/// Decoration drawn around template cell `idx`
fn frame(idx: usize, def: usize) -> (&'static str, &'static str) {
    if idx < def {
        ("[", "]")
    } else if idx == def {
        (" := ", "")
    } else {
        (" \u{21d2} ", "")
    }
}

impl From<MacroTemplate> for InsetMath {
    fn from(t: MacroTemplate) -> Self {
        InsetMath::MacroTemplate(t)
    }
}

impl From<MacroTemplate> for MathAtom {
    fn from(t: MacroTemplate) -> Self {
        MathAtom::new(InsetMath::MacroTemplate(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inset::MacroArgument;

    fn arg(n: usize) -> MathAtom {
        MathAtom::new(InsetMath::MacroArgument(MacroArgument { number: n }))
    }

    fn body(args: &[usize]) -> MathData {
        args.iter().map(|&n| arg(n)).collect()
    }

    #[test]
    fn test_write_newcommand() {
        let t = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "sq",
            vec![false],
            vec![],
            body(&[1]),
            MathData::new(),
        );
        assert_eq!(MathAtom::from(t).to_latex(), "\\newcommand{\\sq}[1]{#1}");
    }

    #[test]
    fn test_write_def_and_optional() {
        let def = MacroTemplate::from_parts(
            TemplateKind::Def,
            "f",
            vec![false, false],
            vec![],
            body(&[2, 1]),
            MathData::new(),
        );
        assert_eq!(MathAtom::from(def).to_latex(), "\\def\\f#1#2{#2#1}");

        let opt = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "g",
            vec![true, false],
            vec![MathData::from_chars("k")],
            body(&[1, 2]),
            MathData::new(),
        );
        assert_eq!(MathAtom::from(opt).to_latex(), "\\newcommand{\\g}[2][k]{#1#2}");
    }

    #[test]
    fn test_write_newcommandx() {
        let t = MacroTemplate::from_parts(
            TemplateKind::NewCommandX,
            "h",
            vec![false, true, true],
            vec![MathData::from_chars("a"), MathData::from_chars("b")],
            body(&[1]),
            MathData::new(),
        );
        assert_eq!(MathAtom::from(t).to_latex(), "\\newcommandx{\\h}[3][2=a,3=b]{#1}");
    }

    #[test]
    fn test_to_macro_data() {
        let t = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "g",
            vec![true, false],
            vec![MathData::from_chars("k")],
            body(&[1, 2]),
            MathData::from_chars("G"),
        );
        let data = t.to_macro_data();
        assert_eq!(data.name(), "g");
        assert_eq!(data.arity(), 2);
        assert_eq!(data.default_of(0), Some("k"));
        assert_eq!(data.definition(), "#1#2");
        assert_eq!(data.display(), Some("G"));
    }

    #[test]
    fn test_add_param_shifts_references() {
        let mut t = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "f",
            vec![false, false],
            vec![],
            body(&[1, 2]),
            MathData::new(),
        );
        assert!(t.add_param(1));
        assert_eq!(t.arity(), 3);
        assert_eq!(t.definition().to_latex(), "#1#3");
    }

    #[test]
    fn test_remove_param_drops_references() {
        let mut t = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "f",
            vec![false, false, false],
            vec![],
            body(&[1, 2, 3, 2]),
            MathData::new(),
        );
        assert!(t.remove_param(1));
        assert_eq!(t.arity(), 2);
        assert_eq!(t.definition().to_latex(), "#1#2");
        assert!(!t.remove_param(5));
    }

    #[test]
    fn test_make_optional() {
        let mut t = MacroTemplate::from_parts(
            TemplateKind::NewCommand,
            "f",
            vec![false, false],
            vec![],
            body(&[1, 2]),
            MathData::new(),
        );
        assert!(t.make_optional(0));
        assert_eq!(t.kind, TemplateKind::NewCommand);
        assert_eq!(t.optionals(), 1);
        assert_eq!(t.definition_idx(), 2);
        assert!(t.make_optional(1));
        assert_eq!(t.kind, TemplateKind::NewCommandX);
        assert!(t.make_non_optional(0));
        assert_eq!(t.optionals(), 1);
        assert_eq!(t.default_idx(1), Some(1));
        assert_eq!(t.definition().to_latex(), "#1#2");
    }

    #[test]
    fn test_def_has_no_optionals() {
        let mut t = MacroTemplate::from_parts(
            TemplateKind::Def,
            "f",
            vec![false],
            vec![],
            body(&[1]),
            MathData::new(),
        );
        assert!(!t.make_optional(0));
        assert_eq!(t.name(), "f");
    }
}
