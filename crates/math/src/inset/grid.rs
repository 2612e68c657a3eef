//! Grids: arrays, matrices, cases and the bodies of display hulls
//!
//! Cells are stored row-major; `index(row, col) == row * ncols + col`. Row,
//! column and cell metadata vectors always move in lock-step with the cell
//! vector.

use super::{InsetMath, MathNode};
use crate::atom::AtomId;
use crate::data::MathData;
use crate::error::MutationRefused;
use crate::length::Length;
use crate::metrics::{Dimension, MathStyle, MetricsInfo, PainterInfo, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use serde::{Deserialize, Serialize};

// =============================================================================
// Kinds and metadata
// =============================================================================

/// Fence drawn around a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixFence {
    Plain,
    Paren,
    Bracket,
    Brace,
    Vert,
    DoubleVert,
}

impl MatrixFence {
    fn glyphs(self) -> Option<(&'static str, &'static str)> {
        match self {
            MatrixFence::Plain => None,
            MatrixFence::Paren => Some(("(", ")")),
            MatrixFence::Bracket => Some(("[", "]")),
            MatrixFence::Brace => Some(("{", "}")),
            MatrixFence::Vert => Some(("|", "|")),
            MatrixFence::DoubleVert => Some(("\u{2016}", "\u{2016}")),
        }
    }
}

/// Which environment a grid stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridKind {
    Array,
    /// Cells hold text-mode content
    Tabular,
    Matrix(MatrixFence),
    Cases,
    Aligned,
    Gathered,
    Split,
    AlignedAt(usize),
    Substack,
    Xymatrix,
    /// Body of a display hull; the hull writes the environment around it
    HullBody,
}

impl GridKind {
    /// Grid kind for an environment name; `alignedat` gets its column pair
    /// count from the parser
    pub fn from_env_name(name: &str) -> Option<Self> {
        Some(match name {
            "array" => GridKind::Array,
            "tabular" => GridKind::Tabular,
            "matrix" => GridKind::Matrix(MatrixFence::Plain),
            "pmatrix" => GridKind::Matrix(MatrixFence::Paren),
            "bmatrix" => GridKind::Matrix(MatrixFence::Bracket),
            "Bmatrix" => GridKind::Matrix(MatrixFence::Brace),
            "vmatrix" => GridKind::Matrix(MatrixFence::Vert),
            "Vmatrix" => GridKind::Matrix(MatrixFence::DoubleVert),
            "cases" => GridKind::Cases,
            "aligned" => GridKind::Aligned,
            "gathered" => GridKind::Gathered,
            "split" => GridKind::Split,
            "alignedat" => GridKind::AlignedAt(1),
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            GridKind::Array => "array",
            GridKind::Tabular => "tabular",
            GridKind::Matrix(MatrixFence::Plain) => "matrix",
            GridKind::Matrix(MatrixFence::Paren) => "pmatrix",
            GridKind::Matrix(MatrixFence::Bracket) => "bmatrix",
            GridKind::Matrix(MatrixFence::Brace) => "Bmatrix",
            GridKind::Matrix(MatrixFence::Vert) => "vmatrix",
            GridKind::Matrix(MatrixFence::DoubleVert) => "Vmatrix",
            GridKind::Cases => "cases",
            GridKind::Aligned => "aligned",
            GridKind::Gathered => "gathered",
            GridKind::Split => "split",
            GridKind::AlignedAt(_) => "alignedat",
            GridKind::Substack => "substack",
            GridKind::Xymatrix => "xymatrix",
            GridKind::HullBody => "hull",
        }
    }

    /// Written as `\name{...}` instead of an environment
    fn is_command(self) -> bool {
        matches!(self, GridKind::Substack | GridKind::Xymatrix)
    }

    fn has_col_spec(self) -> bool {
        matches!(self, GridKind::Array | GridKind::Tabular)
    }

    /// Default alignment of column `col`
    fn default_align(self, col: usize) -> char {
        match self {
            GridKind::Cases | GridKind::Tabular => 'l',
            GridKind::Aligned | GridKind::Split | GridKind::AlignedAt(_) => {
                if col % 2 == 0 {
                    'r'
                } else {
                    'l'
                }
            }
            _ => 'c',
        }
    }

    /// Whether the column count may change
    pub fn col_change_ok(self) -> bool {
        !matches!(
            self,
            GridKind::Cases | GridKind::Gathered | GridKind::Substack | GridKind::Split
        )
    }

    fn cell_style(self, style: MathStyle) -> MathStyle {
        match self {
            GridKind::Substack => style.script(),
            GridKind::Aligned | GridKind::Gathered | GridKind::Split | GridKind::AlignedAt(_) => {
                MathStyle::Display
            }
            GridKind::Matrix(_) | GridKind::Cases => MathStyle::Text.max(style),
            _ => style,
        }
    }
}

/// Multi-column span state of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Multicolumn {
    #[default]
    Normal,
    /// First cell of a `\multicolumn`; holds the content
    BeginOfMulticolumn,
    /// Covered by the multicolumn starting to its left
    PartOfMulticolumn,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellInfo {
    pub multi: Multicolumn,
    /// Column specification of a multicolumn cell, e.g. `|c`
    pub align: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowInfo {
    /// Horizontal rules above the row
    pub lines: usize,
    /// Extra vertical space after the row, from `\\[skip]`
    pub skip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColInfo {
    pub align: char,
    /// Vertical rules left of the column
    pub lines: usize,
    /// Verbatim column spec such as `p{2cm}`
    pub special: Option<String>,
}

impl ColInfo {
    fn new(align: char) -> Self {
        Self {
            align,
            lines: 0,
            special: None,
        }
    }
}

// =============================================================================
// Grid
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GridInset {
    pub kind: GridKind,
    rows: Vec<RowInfo>,
    cols: Vec<ColInfo>,
    cells: Vec<MathData>,
    cellinfo: Vec<CellInfo>,
    /// Vertical alignment option of `array`, `[t]` or `[b]`
    v_align: Option<char>,
    bottom_lines: usize,
    lines_right: usize,
}

struct GridLayout {
    col_x: Vec<f32>,
    col_wid: Vec<f32>,
    /// Baseline of every row, relative to the grid baseline
    row_y: Vec<f32>,
    /// Top of every row plus the bottom edge, relative to the grid baseline
    row_top: Vec<f32>,
    fence: f32,
    dim: Dimension,
}

impl GridInset {
    pub fn new(kind: GridKind, nrows: usize, ncols: usize) -> Self {
        let nrows = nrows.max(1);
        let ncols = ncols.max(1);
        Self {
            kind,
            rows: vec![RowInfo::default(); nrows],
            cols: (0..ncols).map(|c| ColInfo::new(kind.default_align(c))).collect(),
            cells: vec![MathData::new(); nrows * ncols],
            cellinfo: vec![CellInfo::default(); nrows * ncols],
            v_align: None,
            bottom_lines: 0,
            lines_right: 0,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Flat cell index of `(row, col)`
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.nrows() && col < self.ncols());
        row * self.ncols() + col
    }

    pub fn row_of(&self, idx: usize) -> usize {
        idx / self.ncols()
    }

    pub fn col_of(&self, idx: usize) -> usize {
        idx % self.ncols()
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&MathData> {
        (row < self.nrows() && col < self.ncols()).then(|| &self.cells[row * self.ncols() + col])
    }

    pub fn cell_at_mut(&mut self, row: usize, col: usize) -> Option<&mut MathData> {
        let ncols = self.ncols();
        (row < self.nrows() && col < ncols).then(move || &mut self.cells[row * ncols + col])
    }

    pub fn row_info(&self, row: usize) -> Option<&RowInfo> {
        self.rows.get(row)
    }

    pub fn row_info_mut(&mut self, row: usize) -> Option<&mut RowInfo> {
        self.rows.get_mut(row)
    }

    pub fn col_info(&self, col: usize) -> Option<&ColInfo> {
        self.cols.get(col)
    }

    pub fn cell_info(&self, idx: usize) -> Option<&CellInfo> {
        self.cellinfo.get(idx)
    }

    pub fn set_col_align(&mut self, col: usize, align: char) {
        if let Some(info) = self.cols.get_mut(col) {
            info.align = align;
        }
    }

    pub fn set_v_align(&mut self, v_align: Option<char>) {
        self.v_align = v_align;
    }

    pub fn v_align(&self) -> Option<char> {
        self.v_align
    }

    pub fn set_bottom_lines(&mut self, lines: usize) {
        self.bottom_lines = lines;
    }

    pub fn bottom_lines(&self) -> usize {
        self.bottom_lines
    }

    /// Whether every cell of `row` is empty
    pub fn row_is_empty(&self, row: usize) -> bool {
        (0..self.ncols()).all(|c| self.cell_at(row, c).map_or(true, MathData::is_empty))
    }

    // =========================================================================
    // Column specs
    // =========================================================================

    /// Apply an `array`/`tabular` column spec such as `|l|c|r|` or `lp{2cm}`
    pub fn set_col_spec(&mut self, spec: &str) {
        let mut infos: Vec<ColInfo> = Vec::new();
        let mut pending_lines = 0;
        let mut chars = spec.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '|' => pending_lines += 1,
                'l' | 'c' | 'r' => {
                    let mut info = ColInfo::new(c);
                    info.lines = pending_lines;
                    pending_lines = 0;
                    infos.push(info);
                }
                'p' | 'm' | 'b' | '@' | '>' | '<' | '!' => {
                    let mut arg = String::new();
                    if chars.peek() == Some(&'{') {
                        let mut depth = 0;
                        for a in chars.by_ref() {
                            arg.push(a);
                            match a {
                                '{' => depth += 1,
                                '}' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    if matches!(c, 'p' | 'm' | 'b') {
                        let mut info = ColInfo::new('l');
                        info.lines = pending_lines;
                        info.special = Some(format!("{c}{arg}"));
                        pending_lines = 0;
                        infos.push(info);
                    } else if let Some(last) = infos.last_mut() {
                        let align = last.align;
                        let special = last.special.get_or_insert_with(|| align.to_string());
                        special.push(c);
                        special.push_str(&arg);
                    }
                }
                _ => {}
            }
        }
        if infos.is_empty() {
            return;
        }
        self.lines_right = pending_lines;
        let target = infos.len();
        self.change_cols(target);
        self.cols = infos;
    }

    /// The column spec in LaTeX form
    pub fn col_spec(&self) -> String {
        let mut out = String::new();
        for info in &self.cols {
            out.push_str(&"|".repeat(info.lines));
            match &info.special {
                Some(special) => out.push_str(special),
                None => out.push(info.align),
            }
        }
        out.push_str(&"|".repeat(self.lines_right));
        out
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    /// Insert an empty row after `row`
    pub fn add_row(&mut self, row: usize) {
        let at = (row + 1).min(self.nrows());
        let ncols = self.ncols();
        self.rows.insert(at, RowInfo::default());
        let start = at * ncols;
        for _ in 0..ncols {
            self.cells.insert(start, MathData::new());
            self.cellinfo.insert(start, CellInfo::default());
        }
    }

    /// Append an empty row at the bottom
    pub fn append_row(&mut self) {
        self.add_row(self.nrows().saturating_sub(1));
    }

    pub fn del_row(&mut self, row: usize) -> Result<(), MutationRefused> {
        if row >= self.nrows() {
            return Err(MutationRefused::OutOfRange(row));
        }
        if self.nrows() == 1 {
            return Err(MutationRefused::LastOne("row"));
        }
        let ncols = self.ncols();
        self.rows.remove(row);
        self.cells.drain(row * ncols..(row + 1) * ncols);
        self.cellinfo.drain(row * ncols..(row + 1) * ncols);
        Ok(())
    }

    /// Insert a copy of `row` below it
    pub fn copy_row(&mut self, row: usize) -> Result<(), MutationRefused> {
        if row >= self.nrows() {
            return Err(MutationRefused::OutOfRange(row));
        }
        self.add_row(row);
        for col in 0..self.ncols() {
            let from = self.index(row, col);
            let to = self.index(row + 1, col);
            self.cells[to] = self.cells[from].fresh_copy();
            self.cellinfo[to] = self.cellinfo[from].clone();
        }
        Ok(())
    }

    /// Exchange `row` with the row below it
    pub fn swap_row(&mut self, row: usize) -> Result<(), MutationRefused> {
        if row + 1 >= self.nrows() {
            return Err(MutationRefused::OutOfRange(row + 1));
        }
        for col in 0..self.ncols() {
            let a = self.index(row, col);
            let b = self.index(row + 1, col);
            self.cells.swap(a, b);
            self.cellinfo.swap(a, b);
        }
        self.rows.swap(row, row + 1);
        Ok(())
    }

    fn insert_col(&mut self, at: usize) {
        let old = self.ncols();
        let at = at.min(old);
        let mut cells = Vec::with_capacity(self.nrows() * (old + 1));
        let mut cellinfo = Vec::with_capacity(cells.capacity());
        for (i, (cell, info)) in self.cells.drain(..).zip(self.cellinfo.drain(..)).enumerate() {
            if i % old == at {
                cells.push(MathData::new());
                cellinfo.push(CellInfo::default());
            }
            cells.push(cell);
            cellinfo.push(info);
            if at == old && i % old == old - 1 {
                cells.push(MathData::new());
                cellinfo.push(CellInfo::default());
            }
        }
        self.cells = cells;
        self.cellinfo = cellinfo;
        self.cols.insert(at, ColInfo::new(self.kind.default_align(at)));
    }

    /// Insert an empty column after `col`
    pub fn add_col(&mut self, col: usize) -> Result<(), MutationRefused> {
        if !self.kind.col_change_ok() {
            return Err(MutationRefused::FixedColumns(self.kind.name().to_string()));
        }
        self.insert_col(col + 1);
        Ok(())
    }

    pub fn del_col(&mut self, col: usize) -> Result<(), MutationRefused> {
        if !self.kind.col_change_ok() {
            return Err(MutationRefused::FixedColumns(self.kind.name().to_string()));
        }
        if col >= self.ncols() {
            return Err(MutationRefused::OutOfRange(col));
        }
        if self.ncols() == 1 {
            return Err(MutationRefused::LastOne("column"));
        }
        self.remove_col(col);
        Ok(())
    }

    fn remove_col(&mut self, col: usize) {
        let ncols = self.ncols();
        let keep = |i: &usize| i % ncols != col;
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, c)| c)
            .collect();
        self.cellinfo = std::mem::take(&mut self.cellinfo)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, c)| c)
            .collect();
        self.cols.remove(col);
    }

    /// Grow or shrink to `n` columns; content of dropped columns is appended
    /// to the last kept column of its row
    pub fn change_cols(&mut self, n: usize) {
        let n = n.max(1);
        while self.ncols() < n {
            self.insert_col(self.ncols());
        }
        while self.ncols() > n {
            let last = self.ncols() - 1;
            for row in 0..self.nrows() {
                let from = self.index(row, last);
                let moved = self.cells[from].take();
                let to = self.index(row, last - 1);
                self.cells[to].append(moved);
            }
            self.remove_col(last);
        }
    }

    /// Let the cell at `(row, col)` span `span` columns
    pub fn set_multicolumn(&mut self, row: usize, col: usize, span: usize, align: &str) {
        if row >= self.nrows() || col >= self.ncols() {
            return;
        }
        let span = span.clamp(1, self.ncols() - col);
        let begin = self.index(row, col);
        self.cellinfo[begin] = CellInfo {
            multi: Multicolumn::BeginOfMulticolumn,
            align: align.to_string(),
        };
        for c in col + 1..col + span {
            let idx = self.index(row, c);
            let moved = self.cells[idx].take();
            self.cells[begin].append(moved);
            self.cellinfo[idx] = CellInfo {
                multi: Multicolumn::PartOfMulticolumn,
                align: String::new(),
            };
        }
    }

    /// Number of columns covered by the cell at `idx`
    pub fn ncells_in_multicolumn(&self, idx: usize) -> usize {
        match self.cellinfo.get(idx).map(|i| i.multi) {
            Some(Multicolumn::BeginOfMulticolumn) => {
                let row_end = (self.row_of(idx) + 1) * self.ncols();
                1 + (idx + 1..row_end)
                    .take_while(|&i| self.cellinfo[i].multi == Multicolumn::PartOfMulticolumn)
                    .count()
            }
            _ => 1,
        }
    }

    fn is_part(&self, idx: usize) -> bool {
        self.cellinfo
            .get(idx)
            .is_some_and(|i| i.multi == Multicolumn::PartOfMulticolumn)
    }

    /// The cell holding the content shown at `idx`
    fn owning_cell(&self, idx: usize) -> usize {
        let row_start = self.row_of(idx) * self.ncols();
        let mut i = idx;
        while i > row_start && self.is_part(i) {
            i -= 1;
        }
        i
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Next cell to the right within the row
    pub fn idx_forward(&self, idx: usize) -> Option<usize> {
        let next = idx + self.ncells_in_multicolumn(idx);
        (next < self.cells.len() && self.row_of(next) == self.row_of(idx)).then_some(next)
    }

    /// Next cell to the left within the row
    pub fn idx_backward(&self, idx: usize) -> Option<usize> {
        if idx >= self.cells.len() || self.col_of(idx) == 0 {
            return None;
        }
        Some(self.owning_cell(idx - 1))
    }

    /// Next cell in reading order
    pub fn idx_next(&self, idx: usize) -> Option<usize> {
        let mut next = idx + self.ncells_in_multicolumn(idx);
        while next < self.cells.len() && self.is_part(next) {
            next += 1;
        }
        (next < self.cells.len()).then_some(next)
    }

    /// Previous cell in reading order
    pub fn idx_prev(&self, idx: usize) -> Option<usize> {
        if idx == 0 || idx > self.cells.len() {
            return None;
        }
        Some(self.owning_cell(idx - 1))
    }

    /// Same column, previous or next row
    pub fn idx_up_down(&self, idx: usize, up: bool) -> Option<usize> {
        let row = self.row_of(idx);
        let col = self.col_of(idx);
        let target = if up {
            row.checked_sub(1)?
        } else if row + 1 < self.nrows() {
            row + 1
        } else {
            return None;
        };
        Some(self.owning_cell(self.index(target, col)))
    }

    // =========================================================================
    // Serialization helpers
    // =========================================================================

    /// Write the rows without the surrounding environment
    pub fn write_body(&self, ws: &mut WriteStream) {
        self.write_rows(ws, |_, _| {});
    }

    /// Write the rows, letting `row_suffix` add per-row trailers such as
    /// labels before the row separator
    pub(crate) fn write_rows(&self, ws: &mut WriteStream, mut row_suffix: impl FnMut(&mut WriteStream, usize)) {
        let text_mode = self.kind == GridKind::Tabular;
        for row in 0..self.nrows() {
            for _ in 0..self.rows[row].lines {
                ws.cs("hline");
            }
            for col in 0..self.ncols() {
                let idx = self.index(row, col);
                if self.is_part(idx) {
                    continue;
                }
                if col > 0 {
                    ws.ch('&');
                }
                if self.cellinfo[idx].multi == Multicolumn::BeginOfMulticolumn {
                    ws.cs("multicolumn");
                    ws.braced(&self.ncells_in_multicolumn(idx).to_string());
                    ws.braced(&self.cellinfo[idx].align);
                    ws.ch('{');
                    self.cells[idx].write(ws);
                    ws.ch('}');
                } else {
                    self.cells[idx].write(ws);
                }
            }
            row_suffix(ws, row);
            let last = row + 1 == self.nrows();
            if !last || self.bottom_lines > 0 {
                ws.text("\\\\");
                if let Some(skip) = &self.rows[row].skip {
                    ws.ch('[');
                    ws.text(skip);
                    ws.ch(']');
                }
                if !text_mode && !last {
                    ws.newline();
                }
            }
        }
        for _ in 0..self.bottom_lines {
            ws.cs("hline");
        }
    }

    pub(crate) fn normalize_rows(&self, ns: &mut NormalStream) {
        for row in 0..self.nrows() {
            ns.open("row");
            for col in 0..self.ncols() {
                let idx = self.index(row, col);
                if !self.is_part(idx) {
                    self.cells[idx].normalize(ns);
                }
            }
            ns.close();
        }
    }

    // =========================================================================
    // Layout
    // =========================================================================

    fn layout(&self, em: f32) -> GridLayout {
        let colsep = if self.kind.has_col_spec() { 0.4 * em } else { 0.8 * em };
        let rowsep = 0.3 * em;
        let ncols = self.ncols();
        let mut col_wid = vec![0.0f32; ncols];
        for (idx, cell) in self.cells.iter().enumerate() {
            if self.cellinfo[idx].multi == Multicolumn::Normal {
                let c = idx % ncols;
                col_wid[c] = col_wid[c].max(cell.dim().wid);
            }
        }
        let fence = match self.kind {
            GridKind::Matrix(f) if f.glyphs().is_some() => 0.5 * em,
            GridKind::Cases => 0.6 * em,
            _ => 0.0,
        };
        let mut col_x = Vec::with_capacity(ncols);
        let mut x = fence + 0.1 * em;
        for (c, wid) in col_wid.iter().enumerate() {
            if c > 0 {
                x += colsep;
            }
            col_x.push(x);
            x += wid;
        }
        let wid = x + 0.1 * em + if self.kind == GridKind::Cases { 0.0 } else { fence };

        let mut row_y = Vec::with_capacity(self.nrows());
        let mut row_top = Vec::with_capacity(self.nrows() + 1);
        let mut y = 0.0;
        for row in 0..self.nrows() {
            let (asc, des) = (0..ncols).fold((0.0f32, 0.0f32), |(a, d), c| {
                let dim = self.cells[row * ncols + c].dim();
                (a.max(dim.asc), d.max(dim.des))
            });
            if row > 0 {
                y += rowsep;
            }
            row_top.push(y);
            row_y.push(y + asc);
            y += asc + des;
            if let Some(skip) = self.rows[row].skip.as_deref().and_then(Length::parse) {
                y += skip.to_pixels(em);
            }
        }
        row_top.push(y);
        // vertically center on the math axis
        let axis = 0.25 * em;
        let shift = match self.v_align {
            Some('t') => row_y.first().copied().unwrap_or(0.0),
            Some('b') => row_y.last().copied().unwrap_or(0.0),
            _ => y / 2.0 + axis,
        };
        for v in row_y.iter_mut().chain(row_top.iter_mut()) {
            *v -= shift;
        }
        GridLayout {
            col_x,
            col_wid,
            row_y,
            row_top,
            fence,
            dim: Dimension::new(wid, shift, y - shift),
        }
    }

    fn cell_style_context<'a>(&self, sc: &StyleContext<'a>) -> StyleContext<'a> {
        let mut font = sc.font.with_style(self.kind.cell_style(sc.font.style));
        if self.kind == GridKind::Tabular {
            font.text_mode = true;
        }
        sc.with_font(font)
    }

    /// Metrics of all cells and of the grid as a whole
    pub fn grid_metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        let inner = mi.derive(self.cell_style_context(&mi.base));
        for cell in &mut self.cells {
            cell.metrics(&inner);
        }
        self.layout(mi.em()).dim
    }

    /// Draw cells and rules, recording cell `idx` under `id`
    pub fn draw_grid(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, x: f32, y: f32) {
        let layout = self.layout(pi.metrics.em(&sc.font));
        let inner = self.cell_style_context(sc);
        let ncols = self.ncols();
        for (idx, cell) in self.cells.iter().enumerate() {
            if self.is_part(idx) {
                continue;
            }
            let (row, col) = (idx / ncols, idx % ncols);
            let span = self.ncells_in_multicolumn(idx);
            let last = (col + span - 1).min(ncols - 1);
            let avail = layout.col_x[last] + layout.col_wid[last] - layout.col_x[col];
            let align = match self.cellinfo[idx].multi {
                Multicolumn::BeginOfMulticolumn => self.cellinfo[idx]
                    .align
                    .chars()
                    .find(|c| matches!(c, 'l' | 'c' | 'r'))
                    .unwrap_or('c'),
                _ => self.cols[col].align,
            };
            let offset = match align {
                'l' => 0.0,
                'r' => avail - cell.dim().wid,
                _ => (avail - cell.dim().wid) / 2.0,
            };
            cell.draw_cell(pi, &inner, id, idx, x + layout.col_x[col] + offset, y + layout.row_y[row]);
        }

        let color = sc.font.color;
        let (top, bottom) = (y - layout.dim.asc, y + layout.dim.des);
        for (row, info) in self.rows.iter().enumerate() {
            let ly = y + layout.row_top[row];
            for k in 0..info.lines {
                let ly = ly + k as f32 * 2.0;
                pi.painter.line(x, ly, x + layout.dim.wid, ly, color);
            }
        }
        for k in 0..self.bottom_lines {
            let ly = bottom - k as f32 * 2.0;
            pi.painter.line(x, ly, x + layout.dim.wid, ly, color);
        }
        for (col, info) in self.cols.iter().enumerate() {
            let lx = x + layout.col_x[col] - 0.1 * pi.metrics.em(&sc.font);
            for k in 0..info.lines {
                let lx = lx + k as f32 * 2.0;
                pi.painter.line(lx, top, lx, bottom, color);
            }
        }
        for k in 0..self.lines_right {
            let lx = x + layout.dim.wid - k as f32 * 2.0;
            pi.painter.line(lx, top, lx, bottom, color);
        }

        let mut fence_font = sc.font.clone();
        fence_font.base_size *= (layout.dim.height() / pi.metrics.em(&sc.font)).max(1.0);
        match self.kind {
            GridKind::Matrix(fence) => {
                if let Some((open, close)) = fence.glyphs() {
                    pi.painter.text(x, y, open, &fence_font);
                    pi.painter
                        .text(x + layout.dim.wid - layout.fence, y, close, &fence_font);
                }
            }
            GridKind::Cases => pi.painter.text(x, y, "{", &fence_font),
            _ => {}
        }
    }
}

impl MathNode for GridInset {
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
        let name = self.kind.name();
        if self.kind.is_command() {
            ws.cs(name);
            ws.ch('{');
            self.write_body(ws);
            ws.ch('}');
            return;
        }
        if self.kind == GridKind::HullBody {
            self.write_body(ws);
            return;
        }
        ws.cs("begin");
        ws.braced(name);
        if let Some(v) = self.v_align {
            ws.ch('[');
            ws.ch(v);
            ws.ch(']');
        }
        if self.kind.has_col_spec() {
            ws.braced(&self.col_spec());
        }
        if let GridKind::AlignedAt(n) = self.kind {
            ws.braced(&n.to_string());
        }
        if !matches!(self.kind, GridKind::Tabular) {
            ws.newline();
        }
        self.write_body(ws);
        if !matches!(self.kind, GridKind::Tabular) {
            ws.newline();
        }
        ws.cs("end");
        ws.braced(name);
    }

    fn normalize(&self, ns: &mut NormalStream) {
        ns.open(self.kind.name());
        if self.kind.has_col_spec() {
            ns.word(&self.col_spec());
        }
        self.normalize_rows(ns);
        ns.close();
    }

    fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        self.grid_metrics(mi)
    }

    fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, id: AtomId, _dim: Dimension, x: f32, y: f32) {
        self.draw_grid(pi, sc, id, x, y);
    }
}

impl From<GridInset> for InsetMath {
    fn from(grid: GridInset) -> Self {
        InsetMath::Grid(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MathAtom;

    fn filled(kind: GridKind, nrows: usize, ncols: usize) -> GridInset {
        let mut grid = GridInset::new(kind, nrows, ncols);
        for idx in 0..grid.nargs() {
            let ch = char::from(b'a' + idx as u8);
            grid.cell_mut(idx).unwrap().push(MathAtom::new(InsetMath::char(ch)));
        }
        grid
    }

    fn latex(grid: &GridInset) -> String {
        let mut ws = WriteStream::new();
        grid.write(&mut ws);
        ws.finish()
    }

    #[test]
    fn test_grid_resize() {
        let mut grid = GridInset::new(GridKind::Array, 1, 1);
        grid.add_col(0).unwrap();
        grid.add_row(0);
        assert_eq!(grid.ncols(), 2);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.nargs(), 4);
        assert!((0..4).all(|i| grid.cell_info(i).unwrap().multi == Multicolumn::Normal));
        grid.del_col(1).unwrap();
        assert_eq!(grid.ncols(), 1);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.del_col(0), Err(MutationRefused::LastOne("column")));
        assert_eq!(grid.ncols(), 1);
    }

    #[test]
    fn test_add_col_keeps_content_in_place() {
        let mut grid = filled(GridKind::Array, 2, 2);
        grid.add_col(0).unwrap();
        assert_eq!(grid.ncols(), 3);
        let row0: Vec<String> = (0..3).map(|c| grid.cell_at(0, c).unwrap().to_latex()).collect();
        assert_eq!(row0, vec!["a", "", "b"]);
        assert_eq!(grid.cell_at(1, 2).unwrap().to_latex(), "d");
    }

    #[test]
    fn test_del_row() {
        let mut grid = filled(GridKind::Array, 3, 1);
        grid.del_row(1).unwrap();
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.cell_at(1, 0).unwrap().to_latex(), "c");
        assert_eq!(grid.del_row(5), Err(MutationRefused::OutOfRange(5)));
    }

    #[test]
    fn test_cases_columns_fixed() {
        let mut grid = GridInset::new(GridKind::Cases, 1, 2);
        assert!(grid.add_col(0).is_err());
        assert_eq!(grid.ncols(), 2);
    }

    #[test]
    fn test_change_cols_merges() {
        let mut grid = filled(GridKind::HullBody, 1, 3);
        grid.change_cols(1);
        assert_eq!(grid.ncols(), 1);
        assert_eq!(grid.cell(0).unwrap().to_latex(), "abc");
        grid.change_cols(3);
        assert_eq!(grid.nargs(), 3);
    }

    #[test]
    fn test_navigation() {
        let grid = GridInset::new(GridKind::Array, 2, 2);
        assert_eq!(grid.idx_forward(0), Some(1));
        assert_eq!(grid.idx_forward(1), None);
        assert_eq!(grid.idx_next(1), Some(2));
        assert_eq!(grid.idx_prev(2), Some(1));
        assert_eq!(grid.idx_up_down(3, true), Some(1));
        assert_eq!(grid.idx_up_down(1, true), None);
        assert_eq!(grid.idx_backward(2), None);
    }

    #[test]
    fn test_multicolumn_navigation() {
        let mut grid = filled(GridKind::Tabular, 1, 3);
        grid.set_multicolumn(0, 0, 2, "c");
        assert_eq!(grid.ncells_in_multicolumn(0), 2);
        assert_eq!(grid.cell(0).unwrap().to_latex(), "ab");
        assert_eq!(grid.idx_forward(0), Some(2));
        assert_eq!(grid.idx_backward(2), Some(0));
    }

    #[test]
    fn test_write_array() {
        let mut grid = filled(GridKind::Array, 2, 2);
        grid.set_col_spec("|cc|");
        assert_eq!(
            latex(&grid),
            "\\begin{array}{|cc|}\na&b\\\\\nc&d\n\\end{array}"
        );
    }

    #[test]
    fn test_write_substack() {
        let grid = filled(GridKind::Substack, 2, 1);
        assert_eq!(latex(&grid), "\\substack{a\\\\\nb}");
    }

    #[test]
    fn test_col_spec_round_trip() {
        let mut grid = GridInset::new(GridKind::Tabular, 1, 1);
        grid.set_col_spec("|l|p{2cm}r|");
        assert_eq!(grid.ncols(), 3);
        assert_eq!(grid.col_spec(), "|l|p{2cm}r|");
    }
}
