//! Grid and display-formula commands
//!
//! Row and column edits work on the innermost grid around the cursor. On a
//! display formula they go through the formula so numbering and labels stay
//! attached to their rows.

use crate::cursor::{Cursor, DispatchContext};
use crate::dispatch_result::Outcome;
use crate::func::{FuncCode, FuncRequest};
use crate::math_edit;
use math::cas;
use math::{GridInset, HullInset, HullType, InsetMath, MathAtom, MathData, MutationRefused};
use tracing::{debug, warn};

pub(crate) fn dispatch(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, cmd: &FuncRequest) -> Outcome {
    match cmd.code {
        FuncCode::NewlineInsert => newline(cur, ctx),
        FuncCode::TabularFeature => tabular_feature(cur, ctx, cmd.argument.trim()),
        FuncCode::MathMutate => mutate(cur, ctx, cmd.argument.trim()),
        FuncCode::MathNumber => number_all(cur, ctx),
        FuncCode::MathNonumber => number_row(cur, ctx),
        FuncCode::LabelInsert => label(cur, ctx, cmd.argument.trim()),
        FuncCode::MathExtern => extern_eval(cur, ctx),
        _ => Outcome::NotHandled,
    }
}

/// The grid-like node owning the cursor's cell
fn owner_mut<'d>(cur: &Cursor, ctx: &'d mut DispatchContext<'_>) -> Option<&'d mut InsetMath> {
    let inset = cur.it.inner_inset_mut(ctx.doc)?.inset_mut();
    inset.as_grid().is_some().then_some(inset)
}

fn hull_mut<'d>(cur: &Cursor, ctx: &'d mut DispatchContext<'_>) -> Option<&'d mut HullInset> {
    cur.it.inner_inset_mut(ctx.doc)?.inset_mut().as_hull_mut()
}

/// Put the cursor back into a valid cell after the grid changed shape
fn place(cur: &mut Cursor, grid: &GridInset, row: usize, col: usize) {
    let row = row.min(grid.nrows().saturating_sub(1));
    let col = col.min(grid.ncols().saturating_sub(1));
    let idx = grid.index(row, col);
    let len = grid.cell_at(row, col).map_or(0, MathData::len);
    let pos = cur.it.pos().min(len);
    cur.it.top_mut().idx = idx;
    cur.it.set_pos(pos);
}

fn refused(err: MutationRefused) -> Outcome {
    debug!(%err, "grid edit refused");
    Outcome::message(err.to_string())
}

// =============================================================================
// Rows and columns
// =============================================================================

fn add_row(inset: &mut InsetMath, row: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => hull.add_row(row),
        InsetMath::Grid(grid) => {
            grid.add_row(row);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn del_row(inset: &mut InsetMath, row: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => hull.del_row(row),
        InsetMath::Grid(grid) => grid.del_row(row),
        _ => Ok(()),
    }
}

fn copy_row(inset: &mut InsetMath, row: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => {
            hull.add_row(row)?;
            let numbered = hull.numbered(row);
            hull.set_numbered(row + 1, numbered);
            let grid = hull.grid_mut();
            for col in 0..grid.ncols() {
                let copy = grid.cell_at(row, col).map(MathData::fresh_copy).unwrap_or_default();
                if let Some(cell) = grid.cell_at_mut(row + 1, col) {
                    *cell = copy;
                }
            }
            Ok(())
        }
        InsetMath::Grid(grid) => grid.copy_row(row),
        _ => Ok(()),
    }
}

fn swap_row(inset: &mut InsetMath, row: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => {
            hull.grid_mut().swap_row(row)?;
            let (a, b) = (hull.numbered(row), hull.numbered(row + 1));
            hull.set_numbered(row, b);
            hull.set_numbered(row + 1, a);
            let (la, lb) = (hull.label(row).map(String::from), hull.label(row + 1).map(String::from));
            hull.set_label(row, lb);
            hull.set_label(row + 1, la);
            Ok(())
        }
        InsetMath::Grid(grid) => grid.swap_row(row),
        _ => Ok(()),
    }
}

fn add_col(inset: &mut InsetMath, col: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => hull.add_col(col),
        InsetMath::Grid(grid) => grid.add_col(col),
        _ => Ok(()),
    }
}

fn del_col(inset: &mut InsetMath, col: usize) -> Result<(), MutationRefused> {
    match inset {
        InsetMath::Hull(hull) => hull.del_col(col),
        InsetMath::Grid(grid) => grid.del_col(col),
        _ => Ok(()),
    }
}

/// `tabular-feature <action>`
fn tabular_feature(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, action: &str) -> Outcome {
    let idx = cur.it.idx();
    let Some(inset) = owner_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    let Some(grid) = inset.as_grid() else {
        return Outcome::NotHandled;
    };
    let (row, col) = (grid.row_of(idx), grid.col_of(idx));
    let nrows = grid.nrows();

    let result = match action {
        "append-row" => add_row(inset, row),
        "delete-row" => del_row(inset, row),
        "copy-row" => copy_row(inset, row),
        "swap-row" => swap_row(inset, row),
        "append-column" => add_col(inset, col),
        "delete-column" => del_col(inset, col),
        "add-hline-above" | "delete-hline-above" | "add-hline-below" | "delete-hline-below" => {
            let Some(grid) = inset.as_grid_mut() else {
                return Outcome::NotHandled;
            };
            let below = action.ends_with("below");
            let delta: isize = if action.starts_with("add") { 1 } else { -1 };
            change_rule(grid, if below { row + 1 } else { row }, nrows, delta);
            Ok(())
        }
        "valign-top" | "valign-middle" | "valign-bottom" => {
            let v = match action {
                "valign-top" => 't',
                "valign-bottom" => 'b',
                _ => 'c',
            };
            if let Some(grid) = inset.as_grid_mut() {
                grid.set_v_align(Some(v));
            }
            Ok(())
        }
        "align-left" | "align-center" | "align-right" => {
            let a = match action {
                "align-left" => 'l',
                "align-right" => 'r',
                _ => 'c',
            };
            if let Some(grid) = inset.as_grid_mut() {
                grid.set_col_align(col, a);
            }
            Ok(())
        }
        other => return Outcome::message(format!("unknown tabular feature `{other}`")),
    };
    if let Err(err) = result {
        return refused(err);
    }
    let row = if action == "delete-row" {
        row.min(nrows.saturating_sub(2))
    } else {
        row
    };
    if let Some(grid) = inset.as_grid() {
        place(cur, grid, row, col);
    }
    debug!(action, row, col, "tabular feature applied");
    Outcome::changed()
}

/// Add or remove one horizontal rule above `row`; `row == nrows` is the
/// bottom edge
fn change_rule(grid: &mut GridInset, row: usize, nrows: usize, delta: isize) {
    if row >= nrows {
        let lines = grid.bottom_lines().saturating_add_signed(delta);
        grid.set_bottom_lines(lines);
    } else if let Some(info) = grid.row_info_mut(row) {
        info.lines = info.lines.saturating_add_signed(delta);
    }
}

// =============================================================================
// Line breaks
// =============================================================================

/// Break the row at the cursor
///
/// The rest of the cell and the cells right of it move to a new row below.
/// A one-line formula becomes an `align` first.
pub(crate) fn newline(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> Outcome {
    let Some(inset) = owner_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    if let InsetMath::Hull(hull) = &mut *inset {
        if !hull.hull_type().is_multi_row() {
            if let Err(err) = hull.mutate(HullType::Align) {
                return refused(err);
            }
            // the content was regrouped; break after all of it
            let grid = hull.grid();
            let last = grid.index(0, grid.ncols().saturating_sub(1));
            let len = grid.cell_at(0, grid.ncols().saturating_sub(1)).map_or(0, MathData::len);
            cur.it.top_mut().idx = last;
            cur.it.set_pos(len);
        }
    }
    let idx = cur.it.idx();
    let pos = cur.it.pos();
    let Some(grid) = inset.as_grid() else {
        return Outcome::NotHandled;
    };
    let (row, col) = (grid.row_of(idx), grid.col_of(idx));
    if let Err(err) = add_row(inset, row) {
        return refused(err);
    }
    let Some(grid) = inset.as_grid_mut() else {
        return Outcome::NotHandled;
    };
    let tail = grid.cell_at_mut(row, col).map(|c| c.split_off(pos)).unwrap_or_default();
    if let Some(cell) = grid.cell_at_mut(row + 1, col) {
        *cell = tail;
    }
    for c in col + 1..grid.ncols() {
        let moved = grid.cell_at_mut(row, c).map(MathData::take).unwrap_or_default();
        if let Some(cell) = grid.cell_at_mut(row + 1, c) {
            *cell = moved;
        }
    }
    cur.it.top_mut().idx = grid.index(row + 1, col);
    cur.it.set_pos(0);
    Outcome::changed()
}

// =============================================================================
// Display formulas
// =============================================================================

/// Formula type for a `math-mutate` argument
fn hull_type_named(name: &str) -> Option<HullType> {
    match name {
        "none" => Some(HullType::None),
        "simple" => Some(HullType::Simple),
        _ => HullType::from_env_name(name),
    }
}

fn mutate(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, name: &str) -> Outcome {
    let Some(target) = hull_type_named(name) else {
        return Outcome::message(format!("unknown formula type `{name}`"));
    };
    let Some(hull) = hull_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    if let Err(err) = hull.mutate(target) {
        return refused(err);
    }
    let grid = hull.grid();
    let idx = cur.it.idx().min((grid.nrows() * grid.ncols()).saturating_sub(1));
    place(cur, grid, grid.row_of(idx), grid.col_of(idx));
    Outcome::changed()
}

/// Whether rows of this formula type can carry numbers
fn numberable(hull: &HullInset) -> bool {
    !matches!(hull.hull_type(), HullType::None | HullType::Simple | HullType::Unknown)
}

/// Toggle numbering of the whole formula
fn number_all(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> Outcome {
    let Some(hull) = hull_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    if matches!(hull.hull_type(), HullType::None | HullType::Simple) {
        if let Err(err) = hull.mutate(HullType::Equation) {
            return refused(err);
        }
        cur.it.top_mut().idx = 0;
    }
    if !numberable(hull) {
        return Outcome::message("this formula cannot be numbered");
    }
    let on = !hull.any_numbered();
    hull.set_all_numbered(on);
    Outcome::changed()
}

/// Toggle numbering of the row holding the cursor
fn number_row(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> Outcome {
    let idx = cur.it.idx();
    let Some(hull) = hull_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    if !numberable(hull) {
        return Outcome::message("this formula cannot be numbered");
    }
    let row = hull.grid().row_of(idx);
    let numbered = hull.numbered(row);
    hull.set_numbered(row, !numbered);
    Outcome::changed()
}

/// Label the row holding the cursor; an empty label removes it
fn label(cur: &mut Cursor, ctx: &mut DispatchContext<'_>, text: &str) -> Outcome {
    let idx = cur.it.idx();
    let Some(hull) = hull_mut(cur, ctx) else {
        return Outcome::NotHandled;
    };
    if !numberable(hull) {
        return Outcome::message("labels need a numbered formula");
    }
    let row = hull.grid().row_of(idx);
    if text.is_empty() {
        hull.set_label(row, None);
    } else {
        hull.set_label(row, Some(text.to_string()));
        hull.set_numbered(row, true);
    }
    Outcome::changed()
}

/// Run the cell through the computer algebra program and append
/// `= result`
fn extern_eval(cur: &mut Cursor, ctx: &mut DispatchContext<'_>) -> Outcome {
    if cur.it.inner_inset(ctx.doc).and_then(|a| a.inset().as_hull()).is_none() {
        return Outcome::NotHandled;
    }
    let Some(runner) = ctx.cas else {
        return Outcome::message("no computer algebra program configured");
    };
    let Some(input) = cur.it.cell(ctx.doc).map(MathData::to_latex) else {
        return Outcome::NotHandled;
    };
    let output = cas::evaluate(runner, &input);
    if output.is_empty() {
        warn!(%input, "computer algebra program gave no result");
        return Outcome::message("computer algebra program gave no result");
    }
    let result = math_edit::parse_here(cur, ctx, &output);
    let Some(cell) = cur.it.cell_mut(ctx.doc) else {
        return Outcome::NotHandled;
    };
    cell.push(MathAtom::new(InsetMath::char('=')));
    cell.append(result);
    let len = cell.len();
    cur.it.set_pos(len);
    Outcome::changed()
}
