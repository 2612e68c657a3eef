//! Macro instances

use super::{normalize_cells, MathNode};
use crate::atom::AtomId;
use crate::data::MathData;
use crate::macros::{update_cell, AttachPolicy, ExpansionGuard, MacroContext, MacroData};
use crate::metrics::{Color, Dimension, MacroArgs, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use std::sync::{Arc, Weak};
use tracing::trace;

/// How a macro instance is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Just created; arguments are attached on the next update
    Init,
    /// Shown as `\name{arg}...` for editing
    Unfolded,
    /// Shown through its expansion
    #[default]
    Normal,
}

/// One use of a user or global macro
///
/// The instance owns its argument cells. The definition is held weakly and
/// re-resolved by every update pass; the cached expansion refers back to the
/// argument cells through proxies.
#[derive(Debug, Clone)]
pub struct MacroInset {
    name: String,
    cells: Vec<MathData>,
    optional: Vec<bool>,
    display: DisplayMode,
    definition: Weak<MacroData>,
    expanded: MathData,
    used_defaults: Vec<bool>,
    needs_update: bool,
    locked: bool,
    own_id: Option<AtomId>,
}

impl PartialEq for MacroInset {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.cells == other.cells
    }
}

impl MacroInset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
            optional: Vec::new(),
            display: DisplayMode::Normal,
            definition: Weak::new(),
            expanded: MathData::new(),
            used_defaults: Vec::new(),
            needs_update: true,
            locked: false,
            own_id: None,
        }
    }

    /// An instance with its arguments already collected
    pub fn with_args(name: &str, cells: Vec<MathData>, optional: Vec<bool>) -> Self {
        let mut m = Self::new(name);
        m.optional = optional;
        m.optional.resize(cells.len(), false);
        m.cells = cells;
        m
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the instance; the definition is looked up again
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.definition = Weak::new();
        self.needs_update = true;
    }

    pub fn display(&self) -> DisplayMode {
        self.display
    }

    pub fn set_display(&mut self, display: DisplayMode) {
        if self.display != display {
            self.display = display;
            self.needs_update = true;
        }
    }

    /// Leave the unfolded presentation; arguments are re-attached
    pub fn fold(&mut self) {
        if self.display == DisplayMode::Unfolded {
            self.set_display(DisplayMode::Init);
        }
    }

    pub fn unfold(&mut self) {
        self.set_display(DisplayMode::Unfolded);
    }

    pub fn is_unfolded(&self) -> bool {
        self.display == DisplayMode::Unfolded
    }

    /// The definition found by the last update, if it is still alive
    pub fn definition(&self) -> Option<Arc<MacroData>> {
        self.definition.upgrade()
    }

    pub fn is_resolved(&self) -> bool {
        self.definition.strong_count() > 0
    }

    /// Whether expansion was stopped by the recursion guard
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Force re-expansion on the next update
    pub fn invalidate(&mut self) {
        self.needs_update = true;
    }

    /// The cached display expansion
    pub fn expanded(&self) -> &MathData {
        &self.expanded
    }

    pub fn args(&self) -> &[MathData] {
        &self.cells
    }

    pub fn is_optional_arg(&self, idx: usize) -> bool {
        self.optional.get(idx).copied().unwrap_or(false)
    }

    /// Append an argument cell
    pub fn push_arg(&mut self, cell: MathData, optional: bool) {
        self.cells.push(cell);
        self.optional.push(optional);
        self.needs_update = true;
    }

    /// Remove and return the argument cells from `idx` on
    pub fn split_off_args(&mut self, idx: usize) -> Vec<MathData> {
        if idx >= self.cells.len() {
            return Vec::new();
        }
        self.optional.truncate(idx);
        self.needs_update = true;
        self.cells.split_off(idx)
    }

    /// Expand the argument through the definition, without proxies
    pub fn expand(&self) -> Option<MathData> {
        self.definition().map(|def| def.expand(&self.cells))
    }

    /// Package the resolved definition depends on
    pub fn required_package(&self) -> Option<String> {
        self.definition()
            .and_then(|def| def.required_package().map(str::to_string))
    }

    fn shows_expansion(&self) -> bool {
        self.display == DisplayMode::Normal && !self.locked && self.is_resolved() && self.own_id.is_some()
    }

    /// Resolve the definition in `ctx` and refresh the cached expansion
    ///
    /// `own_id` is the id of the atom holding this instance; expansion
    /// proxies refer to it.
    pub fn update_representation(
        &mut self,
        own_id: AtomId,
        ctx: &MacroContext<'_>,
        guard: &mut ExpansionGuard,
        policy: AttachPolicy,
    ) {
        if self.own_id != Some(own_id) {
            self.own_id = Some(own_id);
            self.needs_update = true;
        }
        for cell in &mut self.cells {
            update_cell(cell, ctx, guard, policy);
        }

        let Some(def) = ctx.get(&self.name) else {
            self.definition = Weak::new();
            self.expanded.clear();
            self.locked = false;
            self.needs_update = false;
            return;
        };
        let changed = self.definition().map_or(true, |old| *old != *def);
        self.definition = Arc::downgrade(&def);
        if self.display == DisplayMode::Unfolded {
            return;
        }

        if !guard.enter(&self.name) {
            trace!(name = %self.name, depth = guard.depth(), "macro expansion locked");
            self.locked = true;
            self.expanded.clear();
            return;
        }
        self.locked = false;

        let used_defaults: Vec<bool> = (0..def.arity())
            .map(|i| {
                self.cells
                    .get(i)
                    .map_or(true, |c| def.is_optional(i) && c.is_empty())
            })
            .collect();
        if changed || self.needs_update || used_defaults != self.used_defaults {
            self.expanded = def.expand_display(own_id, &self.cells);
            self.used_defaults = used_defaults;
            self.needs_update = false;
        }
        update_cell(&mut self.expanded, ctx, guard, AttachPolicy::Greedy);
        guard.leave();
    }

    fn bracket(&self, idx: usize) -> (&'static str, &'static str) {
        if self.is_optional_arg(idx) {
            ("[", "]")
        } else {
            ("{", "}")
        }
    }
}

impl MathNode for MacroInset {
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
        ws.cs(&self.name);
        for (idx, cell) in self.cells.iter().enumerate() {
            if self.is_optional_arg(idx) {
                if !cell.is_empty() {
                    ws.ch('[');
                    cell.write(ws);
                    ws.ch(']');
                }
            } else {
                ws.ch('{');
                cell.write(ws);
                ws.ch('}');
            }
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        let cells: Vec<&MathData> = self.cells.iter().collect();
        normalize_cells(ns, &format!("macro {}", self.name), &cells);
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        for cell in &mut self.cells {
            cell.metrics(mi);
        }
        if let (true, Some(owner)) = (self.shows_expansion(), self.own_id) {
            let args = MacroArgs {
                owner,
                cells: &self.cells,
                parent: mi.base.args,
            };
            let inner = mi.derive(mi.base.with_args(&args));
            return self.expanded.metrics(&inner);
        }

        let mut dim = mi.text_dim(&format!("\\{}", self.name));
        for (idx, cell) in self.cells.iter().enumerate() {
            let (open, close) = self.bracket(idx);
            dim.add_horizontal(&mi.text_dim(open));
            dim.add_horizontal(&cell.dim());
            dim.add_horizontal(&mi.text_dim(close));
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        if self.shows_expansion() {
            let args = MacroArgs {
                owner: id,
                cells: &self.cells,
                parent: sc.args,
            };
            self.expanded.draw(pi, &sc.with_args(&args), x, y);
            return;
        }

        let mut font = sc.font.clone();
        font.color = if self.is_resolved() { Color::MACRO_NAME } else { Color::RED };
        let label = format!("\\{}", self.name);
        pi.painter.text(x, y, &label, &font);
        let mut cx = x + pi.metrics.dimension(&sc.font, &label).wid;
        for (idx, cell) in self.cells.iter().enumerate() {
            let (open, close) = self.bracket(idx);
            pi.painter.text(cx, y, open, &font);
            cx += pi.metrics.dimension(&sc.font, open).wid;
            cell.draw_cell(pi, sc, id, idx, cx, y);
            cx += cell.dim().wid;
            pi.painter.text(cx, y, close, &font);
            cx += pi.metrics.dimension(&sc.font, close).wid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MathAtom;
    use crate::inset::InsetMath;
    use crate::macros::MacroTable;
    use crate::metrics::{CoordCache, FixedFontMetrics, FontInfo, RecordingPainter};

    fn table() -> MacroTable {
        let mut table = MacroTable::new();
        table.insert("sq", MacroData::new("sq", "#1^2", 1));
        table.insert("loop", MacroData::new("loop", "\\loop", 0));
        table
    }

    fn update(atom: &mut MathAtom, local: &MacroTable) {
        let global = MacroTable::new();
        let ctx = MacroContext::with_tables(Some(local), &global);
        let mut guard = ExpansionGuard::default();
        let id = atom.id();
        if let Some(m) = atom.inset_mut().as_macro_mut() {
            m.update_representation(id, &ctx, &mut guard, AttachPolicy::Greedy);
        }
    }

    #[test]
    fn test_resolved_macro_expands_through_proxies() {
        let local = table();
        let mut atom = MathAtom::new(InsetMath::Macro(MacroInset::with_args(
            "sq",
            vec![MathData::from_chars("3")],
            vec![false],
        )));
        update(&mut atom, &local);
        let m = atom.inset().as_macro().unwrap();
        assert!(m.is_resolved());
        assert!(!m.is_locked());
        let script = m.expanded()[0].inset().as_script().unwrap();
        assert!(matches!(script.nuc()[0].inset(), InsetMath::ArgumentProxy(p) if p.owner == atom.id()));
        assert_eq!(atom.to_latex(), "\\sq{3}");
        assert_eq!(m.expand().unwrap().to_latex(), "3^2");
    }

    #[test]
    fn test_self_reference_is_locked() {
        let local = table();
        let mut atom = MathAtom::new(InsetMath::Macro(MacroInset::new("loop")));
        update(&mut atom, &local);
        let m = atom.inset().as_macro().unwrap();
        assert!(!m.is_locked());
        let inner = m.expanded()[0].inset().as_macro().unwrap();
        assert!(inner.is_locked());
        assert!(inner.expanded().is_empty());
    }

    #[test]
    fn test_unresolved_macro_keeps_source() {
        let local = MacroTable::new();
        let mut atom = MathAtom::new(InsetMath::Macro(MacroInset::with_args(
            "foo",
            vec![MathData::from_chars("x")],
            vec![false],
        )));
        update(&mut atom, &local);
        let m = atom.inset().as_macro().unwrap();
        assert!(!m.is_resolved());
        assert!(m.expanded().is_empty());
        assert_eq!(atom.to_latex(), "\\foo{x}");
    }

    #[test]
    fn test_draw_expanded_records_argument_cell() {
        let local = table();
        let mut atom = MathAtom::new(InsetMath::Macro(MacroInset::with_args(
            "sq",
            vec![MathData::from_chars("3")],
            vec![false],
        )));
        update(&mut atom, &local);

        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let dim = atom.inset_mut().metrics(&mi);
        atom.set_dim(dim);
        assert!(dim.wid > 0.0);

        let mut painter = RecordingPainter::new();
        let mut coords = CoordCache::new();
        let mut pi = PainterInfo::new(&mut painter, &mut coords, &fm);
        let sc = StyleContext::new(FontInfo::default());
        atom.inset().draw(&mut pi, &sc, atom.id(), dim, 0.0, 20.0);
        assert!(coords.has_cell(atom.id(), 0));
        let texts = painter.texts();
        assert!(texts.contains(&"3"));
        assert!(texts.contains(&"2"));
        assert!(!texts.iter().any(|t| t.starts_with('\\')));
    }

    #[test]
    fn test_unfolded_draws_name() {
        let local = table();
        let mut m = MacroInset::with_args("sq", vec![MathData::from_chars("3")], vec![false]);
        m.unfold();
        let mut atom = MathAtom::new(InsetMath::Macro(m));
        update(&mut atom, &local);

        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let dim = atom.inset_mut().metrics(&mi);
        let mut painter = RecordingPainter::new();
        let mut coords = CoordCache::new();
        let mut pi = PainterInfo::new(&mut painter, &mut coords, &fm);
        atom.inset().draw(&mut pi, &StyleContext::new(FontInfo::default()), atom.id(), dim, 0.0, 20.0);
        assert_eq!(painter.texts().first(), Some(&"\\sq"));
    }

    #[test]
    fn test_empty_optional_not_written() {
        let m = MacroInset::with_args(
            "eval",
            vec![MathData::new(), MathData::from_chars("f")],
            vec![true, false],
        );
        let atom = MathAtom::new(InsetMath::Macro(m));
        assert_eq!(atom.to_latex(), "\\eval{f}");
    }

    #[test]
    fn test_fold_requests_attach() {
        let mut m = MacroInset::new("sq");
        m.unfold();
        m.fold();
        assert_eq!(m.display(), DisplayMode::Init);
    }
}
