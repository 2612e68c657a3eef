//! Hulls: the outermost node of every formula
//!
//! A hull is a grid plus an environment type and per-row numbering. Types
//! are connected by the mutation chain
//! `none - simple - equation - eqnarray - align family - {multline, gather}`;
//! [`HullInset::mutate`] walks it one step at a time, splitting or merging
//! columns on the way.

use super::{GridInset, GridKind, InsetMath, MathNode};
use crate::atom::AtomId;
use crate::data::MathData;
use crate::error::MutationRefused;
use crate::metrics::{Dimension, MathStyle, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment type of a hull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HullType {
    /// Math without delimiters
    None,
    /// Inline math, `$...$`
    Simple,
    Equation,
    Eqnarray,
    Align,
    AlignAt,
    XAlignAt,
    XXAlignAt,
    Flalign,
    Multline,
    Gather,
    /// An environment kept verbatim for round trip
    Unknown,
}

impl HullType {
    /// Type for an environment name, starred or not
    pub fn from_env_name(name: &str) -> Option<Self> {
        Some(match name.trim_end_matches('*') {
            "equation" => HullType::Equation,
            "eqnarray" => HullType::Eqnarray,
            "align" => HullType::Align,
            "alignat" => HullType::AlignAt,
            "xalignat" => HullType::XAlignAt,
            "xxalignat" => HullType::XXAlignAt,
            "flalign" => HullType::Flalign,
            "multline" => HullType::Multline,
            "gather" => HullType::Gather,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            HullType::None => "none",
            HullType::Simple => "simple",
            HullType::Equation => "equation",
            HullType::Eqnarray => "eqnarray",
            HullType::Align => "align",
            HullType::AlignAt => "alignat",
            HullType::XAlignAt => "xalignat",
            HullType::XXAlignAt => "xxalignat",
            HullType::Flalign => "flalign",
            HullType::Multline => "multline",
            HullType::Gather => "gather",
            HullType::Unknown => "unknown",
        }
    }

    /// Position on the mutation chain; `None` for unknown environments
    pub fn rank(self) -> Option<u8> {
        Some(match self {
            HullType::None => 0,
            HullType::Simple => 1,
            HullType::Equation => 2,
            HullType::Eqnarray => 3,
            HullType::Align
            | HullType::AlignAt
            | HullType::XAlignAt
            | HullType::XXAlignAt
            | HullType::Flalign => 4,
            HullType::Multline | HullType::Gather => 5,
            HullType::Unknown => return None,
        })
    }

    /// Whether the type may hold several rows
    pub fn is_multi_row(self) -> bool {
        !matches!(self, HullType::None | HullType::Simple | HullType::Equation)
    }

    /// Whether rows are numbered unless marked otherwise
    pub fn is_numbered_by_default(self) -> bool {
        !matches!(self, HullType::None | HullType::Simple | HullType::Unknown)
    }

    /// Whether the column count may change
    pub fn col_change_ok(self) -> bool {
        matches!(
            self,
            HullType::Align
                | HullType::AlignAt
                | HullType::XAlignAt
                | HullType::XXAlignAt
                | HullType::Flalign
                | HullType::Unknown
        )
    }

    fn has_at_argument(self) -> bool {
        matches!(self, HullType::AlignAt | HullType::XAlignAt | HullType::XXAlignAt)
    }

    fn has_star(self) -> bool {
        self.is_multi_row() && !matches!(self, HullType::XXAlignAt | HullType::Unknown)
    }

    fn default_align(self, col: usize) -> char {
        match self {
            HullType::Eqnarray => ['r', 'c', 'l'][col.min(2)],
            HullType::Align
            | HullType::AlignAt
            | HullType::XAlignAt
            | HullType::XXAlignAt
            | HullType::Flalign => {
                if col % 2 == 0 {
                    'r'
                } else {
                    'l'
                }
            }
            HullType::Multline => 'l',
            _ => 'c',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HullInset {
    grid: GridInset,
    hull_type: HullType,
    /// Environment name of an unknown hull
    unknown_name: Option<String>,
    numbered: Vec<bool>,
    labels: Vec<Option<String>>,
    /// Number strings assigned by the document update pass
    numbers: Vec<String>,
}

impl HullInset {
    pub fn new(hull_type: HullType) -> Self {
        let ncols = match hull_type {
            HullType::Eqnarray => 3,
            HullType::Align
            | HullType::AlignAt
            | HullType::XAlignAt
            | HullType::XXAlignAt
            | HullType::Flalign => 2,
            _ => 1,
        };
        Self::from_grid(hull_type, GridInset::new(GridKind::HullBody, 1, ncols))
    }

    /// A hull around the single cell `content`
    pub fn with_content(hull_type: HullType, content: MathData) -> Self {
        let mut hull = Self::new(hull_type);
        if let Some(cell) = hull.grid.cell_mut(0) {
            *cell = content;
        }
        hull
    }

    /// A hull around an already parsed body
    pub fn from_grid(hull_type: HullType, mut grid: GridInset) -> Self {
        grid.kind = GridKind::HullBody;
        let rows = grid.nrows();
        let mut hull = Self {
            grid,
            hull_type,
            unknown_name: None,
            numbered: vec![hull_type.is_numbered_by_default(); rows],
            labels: vec![None; rows],
            numbers: vec![String::new(); rows],
        };
        hull.reset_aligns();
        hull
    }

    /// An unknown environment kept for round trip
    pub fn unknown(name: &str, grid: GridInset) -> Self {
        let mut hull = Self::from_grid(HullType::Unknown, grid);
        hull.unknown_name = Some(name.to_string());
        hull
    }

    pub fn grid(&self) -> &GridInset {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut GridInset {
        &mut self.grid
    }

    pub fn hull_type(&self) -> HullType {
        self.hull_type
    }

    pub fn nrows(&self) -> usize {
        self.grid.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.grid.ncols()
    }

    /// Environment name as written, including a star when unnumbered
    pub fn env_name(&self) -> String {
        match self.hull_type {
            HullType::Unknown => self.unknown_name.clone().unwrap_or_default(),
            t if t.has_star() && !self.any_numbered() => format!("{}*", t.name()),
            t => t.name().to_string(),
        }
    }

    // =========================================================================
    // Numbering
    // =========================================================================

    pub fn numbered(&self, row: usize) -> bool {
        self.numbered.get(row).copied().unwrap_or(false)
    }

    pub fn set_numbered(&mut self, row: usize, numbered: bool) {
        if let Some(n) = self.numbered.get_mut(row) {
            *n = numbered;
        }
    }

    /// Number or unnumber every row
    pub fn set_all_numbered(&mut self, numbered: bool) {
        self.numbered.iter_mut().for_each(|n| *n = numbered);
    }

    pub fn any_numbered(&self) -> bool {
        self.numbered.iter().any(|&n| n)
    }

    pub fn label(&self, row: usize) -> Option<&str> {
        self.labels.get(row).and_then(|l| l.as_deref())
    }

    pub fn set_label(&mut self, row: usize, label: Option<String>) {
        if let Some(l) = self.labels.get_mut(row) {
            *l = label;
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().filter_map(|l| l.as_deref())
    }

    pub fn number(&self, row: usize) -> Option<&str> {
        self.numbers.get(row).map(String::as_str)
    }

    pub fn set_number(&mut self, row: usize, number: String) {
        if let Some(n) = self.numbers.get_mut(row) {
            *n = number;
        }
    }

    /// `(number)` or `(number,label)` for a numbered row, empty otherwise
    pub fn nicelabel(&self, row: usize) -> String {
        if !self.numbered(row) {
            return String::new();
        }
        let number = self.number(row).unwrap_or_default();
        match self.label(row) {
            Some(label) => format!("({number},{label})"),
            None => format!("({number})"),
        }
    }

    /// Move `\label{...}`, `\nonumber` and `\notag` atoms of the body into
    /// row metadata
    pub fn extract_row_metadata(&mut self) {
        for row in 0..self.nrows() {
            for col in 0..self.ncols() {
                let Some(cell) = self.grid.cell_at_mut(row, col) else {
                    continue;
                };
                let mut pos = 0;
                while pos < cell.len() {
                    match cell[pos].inset() {
                        InsetMath::Ref(r) if r.kind == super::RefKind::Label => {
                            self.labels[row] = Some(r.target.clone());
                            cell.erase(pos);
                        }
                        InsetMath::Unknown(u) if matches!(u.name.as_str(), "nonumber" | "notag") => {
                            self.numbered[row] = false;
                            cell.erase(pos);
                        }
                        _ => pos += 1,
                    }
                }
            }
        }
    }

    // =========================================================================
    // Rows and columns
    // =========================================================================

    fn sync_rows(&mut self) {
        let rows = self.nrows();
        let default = self.any_numbered() || (self.numbered.is_empty() && self.hull_type.is_numbered_by_default());
        self.numbered.resize(rows, default);
        self.labels.resize(rows, None);
        self.numbers.resize(rows, String::new());
    }

    pub fn add_row(&mut self, row: usize) -> Result<(), MutationRefused> {
        if !self.hull_type.is_multi_row() {
            return Err(MutationRefused::FixedRows(self.hull_type.name().to_string()));
        }
        let numbered = self.numbered(row);
        self.grid.add_row(row);
        let at = (row + 1).min(self.numbered.len());
        self.numbered.insert(at, numbered);
        self.labels.insert(at, None);
        self.numbers.insert(at, String::new());
        Ok(())
    }

    pub fn del_row(&mut self, row: usize) -> Result<(), MutationRefused> {
        if !self.hull_type.is_multi_row() {
            return Err(MutationRefused::FixedRows(self.hull_type.name().to_string()));
        }
        self.grid.del_row(row)?;
        self.numbered.remove(row);
        self.labels.remove(row);
        self.numbers.remove(row);
        Ok(())
    }

    pub fn add_col(&mut self, col: usize) -> Result<(), MutationRefused> {
        if !self.hull_type.col_change_ok() {
            return Err(MutationRefused::FixedColumns(self.hull_type.name().to_string()));
        }
        self.grid.add_col(col)?;
        self.reset_aligns();
        Ok(())
    }

    pub fn del_col(&mut self, col: usize) -> Result<(), MutationRefused> {
        if !self.hull_type.col_change_ok() {
            return Err(MutationRefused::FixedColumns(self.hull_type.name().to_string()));
        }
        self.grid.del_col(col)?;
        self.reset_aligns();
        Ok(())
    }

    fn reset_aligns(&mut self) {
        if self.hull_type == HullType::Unknown {
            return;
        }
        for col in 0..self.grid.ncols() {
            self.grid.set_col_align(col, self.hull_type.default_align(col));
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Convert to another environment type along the mutation chain
    pub fn mutate(&mut self, target: HullType) -> Result<(), MutationRefused> {
        if target == self.hull_type {
            return Ok(());
        }
        let (Some(mut rank), Some(to)) = (self.hull_type.rank(), target.rank()) else {
            return Err(MutationRefused::HullType {
                from: self.hull_type.name().to_string(),
                to: target.name().to_string(),
            });
        };
        debug!(from = self.hull_type.name(), to = target.name(), "mutating hull");
        while rank != to {
            if rank < to {
                self.step_up(rank);
                rank += 1;
            } else {
                self.step_down(rank);
                rank -= 1;
            }
        }
        self.hull_type = target;
        self.sync_rows();
        self.reset_aligns();
        Ok(())
    }

    /// One step from `rank` to `rank + 1`
    fn step_up(&mut self, rank: u8) {
        match rank {
            0 => self.hull_type = HullType::Simple,
            1 => {
                self.hull_type = HullType::Equation;
                let labelled = self.label(0).is_some();
                self.set_numbered(0, labelled);
            }
            2 => {
                self.hull_type = HullType::Eqnarray;
                self.grid.change_cols(3);
                for row in 0..self.nrows() {
                    self.split_to_3_cols(row);
                }
            }
            3 => {
                self.hull_type = HullType::Align;
                self.grid.change_cols(2);
            }
            _ => {
                self.hull_type = HullType::Gather;
                self.grid.change_cols(1);
            }
        }
    }

    /// One step from `rank` to `rank - 1`
    fn step_down(&mut self, rank: u8) {
        match rank {
            5 => {
                self.hull_type = HullType::Align;
                self.grid.change_cols(2);
                for row in 0..self.nrows() {
                    self.split_to_2_cols(row);
                }
            }
            4 => {
                self.hull_type = HullType::Eqnarray;
                self.grid.change_cols(2);
                self.grid.change_cols(3);
                for row in 0..self.nrows() {
                    self.split_col1_at_relation(row);
                }
            }
            3 => {
                self.hull_type = HullType::Equation;
                self.glue_all();
            }
            2 => {
                self.hull_type = HullType::Simple;
                self.set_all_numbered(false);
            }
            _ => self.hull_type = HullType::None,
        }
    }

    /// Cut col 0 at its first relation into `before | relation | after`
    fn split_to_3_cols(&mut self, row: usize) {
        let Some(cell) = self.grid.cell_at_mut(row, 0) else {
            return;
        };
        let Some(rel) = cell.first_relation() else {
            return;
        };
        let mut after = cell.split_off(rel);
        let rest = after.split_off(1);
        self.put(row, 1, after);
        self.put(row, 2, rest);
    }

    /// Cut col 0 at its first relation into `before | relation and after`
    fn split_to_2_cols(&mut self, row: usize) {
        let Some(cell) = self.grid.cell_at_mut(row, 0) else {
            return;
        };
        let Some(rel) = cell.first_relation() else {
            return;
        };
        let rest = cell.split_off(rel);
        self.put(row, 1, rest);
    }

    /// Keep col 1 up to and including its first relation; the remainder
    /// goes to col 2
    fn split_col1_at_relation(&mut self, row: usize) {
        let Some(cell) = self.grid.cell_at_mut(row, 1) else {
            return;
        };
        let rest = match cell.first_relation() {
            Some(rel) => cell.split_off(rel + 1),
            None => cell.take(),
        };
        self.put(row, 2, rest);
    }

    /// Append `data` to the cell at `(row, col)`
    fn put(&mut self, row: usize, col: usize, data: MathData) {
        if let Some(cell) = self.grid.cell_at_mut(row, col) {
            cell.append(data);
        }
    }

    /// Merge every cell into a single one
    fn glue_all(&mut self) {
        let mut all = MathData::new();
        for idx in 0..self.grid.nargs() {
            if let Some(cell) = self.grid.cell_mut(idx) {
                all.append(cell.take());
            }
        }
        let numbered = self.any_numbered();
        let label = self.labels.iter().flatten().next().cloned();
        self.grid = GridInset::new(GridKind::HullBody, 1, 1);
        if let Some(cell) = self.grid.cell_mut(0) {
            *cell = all;
        }
        self.numbered = vec![numbered];
        self.labels = vec![label];
        self.numbers = vec![String::new()];
    }

    fn write_row_suffix(&self, ws: &mut WriteStream, row: usize) {
        if let Some(label) = self.label(row) {
            ws.cs("label");
            ws.braced(label);
        }
        if self.hull_type.is_numbered_by_default() && self.any_numbered() && !self.numbered(row) {
            ws.cs("nonumber");
        }
    }
}

impl MathNode for HullInset {
    fn nargs(&self) -> usize {
        self.grid.nargs()
    }

    fn cell(&self, idx: usize) -> Option<&MathData> {
        self.grid.cell(idx)
    }

    fn cell_mut(&mut self, idx: usize) -> Option<&mut MathData> {
        self.grid.cell_mut(idx)
    }

    fn write(&self, ws: &mut WriteStream) {
        match self.hull_type {
            HullType::None => self.grid.write_body(ws),
            HullType::Simple => {
                ws.ch('$');
                self.grid.write_body(ws);
                ws.ch('$');
            }
            HullType::Equation if !self.numbered(0) => {
                ws.text("\\[");
                self.grid.write_rows(ws, |ws, row| self.write_row_suffix(ws, row));
                ws.text("\\]");
            }
            _ => {
                let name = self.env_name();
                ws.cs("begin");
                ws.braced(&name);
                if self.hull_type.has_at_argument() {
                    ws.braced(&(self.ncols() / 2).max(1).to_string());
                }
                ws.newline();
                self.grid.write_rows(ws, |ws, row| self.write_row_suffix(ws, row));
                ws.newline();
                ws.cs("end");
                ws.braced(&name);
            }
        }
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open(self.hull_type.name());
        self.grid.normalize_rows(ns);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let display = !matches!(self.hull_type, HullType::None | HullType::Simple);
        let mut dim = if display {
            self.grid.grid_metrics(&mi.with_style(MathStyle::Display))
        } else {
            self.grid.grid_metrics(mi)
        };
        let widest = (0..self.nrows())
            .map(|r| mi.text_dim(&self.nicelabel(r)).wid)
            .fold(0.0f32, f32::max);
        if widest > 0.0 {
            dim.wid += widest + mi.em();
        }
        dim
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, dim: Dimension, x: f32, y: f32) {
        let display = !matches!(self.hull_type, HullType::None | HullType::Simple);
        let inner = if display {
            sc.with_style(MathStyle::Display)
        } else {
            sc.clone()
        };
        self.grid.draw_grid(pi, &inner, id, x, y);
        for row in 0..self.nrows() {
            let label = self.nicelabel(row);
            if label.is_empty() {
                continue;
            }
            let idx = self.grid.index(row, 0);
            let row_y = pi.coords.cell(id, idx).map(|g| g.origin.y).unwrap_or(y);
            let wid = pi.metrics.dimension(&sc.font, &label).wid;
            pi.painter.text(x + dim.wid - wid, row_y, &label, &sc.font);
        }
    }
}

impl From<HullInset> for InsetMath {
    fn from(hull: HullInset) -> Self {
        InsetMath::Hull(hull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MathAtom;
    use crate::inset::{FracInset, FracKind};
    use proptest::prelude::*;

    fn latex(hull: &HullInset) -> String {
        let mut ws = WriteStream::new();
        hull.write(&mut ws);
        ws.finish()
    }

    fn all_text(hull: &HullInset) -> String {
        (0..hull.nargs())
            .filter_map(|i| hull.cell(i))
            .map(MathData::to_latex)
            .collect()
    }

    #[test]
    fn test_equation_to_eqnarray_without_relation() {
        let frac = FracInset::new(FracKind::Frac, MathData::from_chars("1"), MathData::from_chars("2"));
        let content = MathData::single(MathAtom::new(InsetMath::Frac(frac)));
        let mut hull = HullInset::with_content(HullType::Equation, content);
        hull.mutate(HullType::Eqnarray).unwrap();
        assert_eq!(hull.ncols(), 3);
        assert_eq!(hull.cell(0).unwrap().to_latex(), "\\frac{1}{2}");
        assert!(hull.cell(1).unwrap().is_empty());
        assert!(hull.cell(2).unwrap().is_empty());
    }

    #[test]
    fn test_equation_to_eqnarray_splits_at_relation() {
        let mut hull = HullInset::with_content(HullType::Equation, MathData::from_chars("x=y+1"));
        hull.mutate(HullType::Eqnarray).unwrap();
        let cells: Vec<String> = (0..3).map(|i| hull.cell(i).unwrap().to_latex()).collect();
        assert_eq!(cells, vec!["x", "=", "y+1"]);
        hull.mutate(HullType::Align).unwrap();
        let cells: Vec<String> = (0..2).map(|i| hull.cell(i).unwrap().to_latex()).collect();
        assert_eq!(cells, vec!["x", "=y+1"]);
        hull.mutate(HullType::Eqnarray).unwrap();
        let cells: Vec<String> = (0..3).map(|i| hull.cell(i).unwrap().to_latex()).collect();
        assert_eq!(cells, vec!["x", "=", "y+1"]);
    }

    #[test]
    fn test_unknown_refuses_mutation() {
        let mut hull = HullInset::unknown("weird", GridInset::new(GridKind::HullBody, 1, 1));
        assert!(matches!(
            hull.mutate(HullType::Equation),
            Err(MutationRefused::HullType { .. })
        ));
        assert_eq!(hull.hull_type(), HullType::Unknown);
    }

    #[test]
    fn test_equation_rows_fixed() {
        let mut hull = HullInset::new(HullType::Equation);
        assert!(hull.add_row(0).is_err());
        let mut align = HullInset::new(HullType::Align);
        align.add_row(0).unwrap();
        assert_eq!(align.nrows(), 2);
        assert!(align.numbered(1));
    }

    #[test]
    fn test_write_forms() {
        let simple = HullInset::with_content(HullType::Simple, MathData::from_chars("x"));
        assert_eq!(latex(&simple), "$x$");
        let mut eq = HullInset::with_content(HullType::Equation, MathData::from_chars("x"));
        assert_eq!(latex(&eq), "\\begin{equation}\nx\n\\end{equation}");
        eq.set_numbered(0, false);
        assert_eq!(latex(&eq), "\\[x\\]");
    }

    #[test]
    fn test_write_starred_and_nonumber() {
        let mut align = HullInset::new(HullType::Align);
        align.add_row(0).unwrap();
        align.set_all_numbered(false);
        assert!(latex(&align).starts_with("\\begin{align*}"));
        align.set_numbered(0, true);
        align.set_label(0, Some("eq:a".to_string()));
        let text = latex(&align);
        assert!(text.starts_with("\\begin{align}"));
        assert!(text.contains("\\label{eq:a}"));
        assert!(text.contains("\\nonumber"));
    }

    #[test]
    fn test_nicelabel() {
        let mut eq = HullInset::new(HullType::Equation);
        eq.set_number(0, "3".to_string());
        assert_eq!(eq.nicelabel(0), "(3)");
        eq.set_label(0, Some("eq:x".to_string()));
        assert_eq!(eq.nicelabel(0), "(3,eq:x)");
        eq.set_numbered(0, false);
        assert_eq!(eq.nicelabel(0), "");
    }

    fn chain_type() -> impl Strategy<Value = HullType> {
        prop_oneof![
            Just(HullType::None),
            Just(HullType::Simple),
            Just(HullType::Equation),
            Just(HullType::Eqnarray),
            Just(HullType::Align),
            Just(HullType::AlignAt),
            Just(HullType::Flalign),
            Just(HullType::Multline),
            Just(HullType::Gather),
        ]
    }

    proptest! {
        #[test]
        fn test_mutation_round_trip_keeps_content(
            a in chain_type(),
            b in chain_type(),
            text in "[a-c=+<]{0,8}",
        ) {
            let mut hull = HullInset::with_content(HullType::Equation, MathData::from_chars(&text));
            hull.mutate(a).unwrap();
            let before = all_text(&hull);
            hull.mutate(b).unwrap();
            hull.mutate(a).unwrap();
            prop_assert_eq!(all_text(&hull), before);
            prop_assert_eq!(hull.hull_type(), a);
        }
    }
}
