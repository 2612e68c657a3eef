//! Resolving macro instances against their context
//!
//! The update pass walks a cell, turns names that have become defined into
//! macro instances, fits every instance's argument cells to the arity of its
//! definition and refreshes the cached expansions.

use super::{MacroContext, MacroData, MacroTable};
use crate::atom::MathAtom;
use crate::data::MathData;
use crate::inset::{DisplayMode, InsetMath, MacroInset};
use std::sync::Arc;
use tracing::debug;

/// Default bound on nested expansion
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// What happens to the atoms following an instance that lacks arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachPolicy {
    /// Pull following atoms in as arguments
    #[default]
    Greedy,
    /// Add empty arguments and leave the surroundings alone
    NonGreedy,
}

/// Stack of the macros being expanded
///
/// Refuses a macro that is already being expanded, or any expansion deeper
/// than `max_depth`, so self-referential definitions terminate.
#[derive(Debug, Clone)]
pub struct ExpansionGuard {
    stack: Vec<String>,
    max_depth: usize,
}

impl Default for ExpansionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ExpansionGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            max_depth,
        }
    }

    /// Start expanding `name`; false if that is refused
    pub fn enter(&mut self, name: &str) -> bool {
        if self.stack.len() >= self.max_depth || self.stack.iter().any(|n| n == name) {
            return false;
        }
        self.stack.push(name.to_string());
        true
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Bring every macro instance in `cell`, recursively, up to date with `ctx`
///
/// `policy` applies to instances in [`DisplayMode::Init`], the ones created
/// interactively. Instances whose definition changed arity and names that
/// became defined always attach greedily.
pub fn update_cell(
    cell: &mut MathData,
    ctx: &MacroContext<'_>,
    guard: &mut ExpansionGuard,
    policy: AttachPolicy,
) {
    let mut pos = 0;
    while pos < cell.len() {
        promote_unknown(cell, pos, ctx);
        fit_arguments(cell, pos, ctx, policy);

        if let Some(atom) = cell.get_mut(pos) {
            let id = atom.id();
            match atom.inset_mut() {
                InsetMath::Macro(m) => m.update_representation(id, ctx, guard, policy),
                inset => {
                    for idx in 0..inset.nargs() {
                        if let Some(child) = inset.cell_mut(idx) {
                            update_cell(child, ctx, guard, policy);
                        }
                    }
                }
            }
        }
        pos += 1;
    }
}

/// Like [`update_cell`], registering the templates met on the way
///
/// A template joins `local` when it is passed, so only the atoms after it
/// see the definition. Returns the new definitions in document order.
pub fn update_cell_defining(
    cell: &mut MathData,
    local: &mut MacroTable,
    global: &MacroTable,
    max_depth: usize,
    policy: AttachPolicy,
) -> Vec<Arc<MacroData>> {
    let mut definitions = Vec::new();
    let mut pos = 0;
    while pos < cell.len() {
        if let Some(template) = cell.get(pos).and_then(|a| a.inset().as_template()) {
            definitions.push(local.insert(&template.name(), template.to_macro_data()));
            pos += 1;
            continue;
        }
        {
            let ctx = MacroContext::with_tables(Some(&*local), global);
            promote_unknown(cell, pos, &ctx);
            fit_arguments(cell, pos, &ctx, policy);
        }

        if let Some(atom) = cell.get_mut(pos) {
            let id = atom.id();
            match atom.inset_mut() {
                InsetMath::Macro(m) => {
                    let ctx = MacroContext::with_tables(Some(&*local), global);
                    let mut guard = ExpansionGuard::new(max_depth);
                    m.update_representation(id, &ctx, &mut guard, policy);
                }
                inset => {
                    for idx in 0..inset.nargs() {
                        if let Some(child) = inset.cell_mut(idx) {
                            definitions.extend(update_cell_defining(child, local, global, max_depth, policy));
                        }
                    }
                }
            }
        }
        pos += 1;
    }
    definitions
}

/// Register the templates in `cell` and its nested cells into `table`
pub fn collect_templates(cell: &MathData, table: &mut MacroTable) {
    for atom in cell.iter() {
        collect_atom_templates(atom, table);
    }
}

/// Register `atom` if it is a template, or the templates nested in it
pub fn collect_atom_templates(atom: &MathAtom, table: &mut MacroTable) {
    let inset = atom.inset();
    if let Some(template) = inset.as_template() {
        table.insert(&template.name(), template.to_macro_data());
        return;
    }
    for idx in 0..inset.nargs() {
        if let Some(cell) = inset.cell(idx) {
            collect_templates(cell, table);
        }
    }
}

/// Turn a finished unknown command whose name resolves into a macro instance
fn promote_unknown(cell: &mut MathData, pos: usize, ctx: &MacroContext<'_>) {
    let Some(atom) = cell.get_mut(pos) else {
        return;
    };
    let name = match atom.inset() {
        InsetMath::Unknown(u) if u.is_final && ctx.has(&u.name) => u.name.clone(),
        _ => return,
    };
    debug!(%name, "unknown command became a macro");
    atom.set_inset(InsetMath::Macro(MacroInset::new(&name)));
}

/// Match the argument count of the instance at `pos` to its definition
fn fit_arguments(cell: &mut MathData, pos: usize, ctx: &MacroContext<'_>, policy: AttachPolicy) {
    let (name, display, nargs) = match cell.get(pos).map(MathAtom::inset) {
        Some(InsetMath::Macro(m)) => (m.name().to_string(), m.display(), m.args().len()),
        _ => return,
    };
    let Some(def) = ctx.get(&name) else {
        if display == DisplayMode::Init {
            set_display(cell, pos, DisplayMode::Normal);
        }
        return;
    };
    match display {
        DisplayMode::Unfolded => {}
        DisplayMode::Init => {
            attach_arguments(cell, pos, &def, policy);
            set_display(cell, pos, DisplayMode::Normal);
        }
        DisplayMode::Normal if nargs != def.arity() => {
            attach_arguments(cell, pos, &def, AttachPolicy::Greedy);
        }
        DisplayMode::Normal => {}
    }
}

fn set_display(cell: &mut MathData, pos: usize, display: DisplayMode) {
    if let Some(m) = cell.get_mut(pos).and_then(|a| a.inset_mut().as_macro_mut()) {
        m.set_display(display);
    }
}

/// Grow or shrink the argument list of the instance at `pos`
///
/// Surplus arguments are pushed out behind the instance as braces. Missing
/// ones are taken from the atoms behind it according to `policy`; a
/// following `[...]` always fills an optional argument.
pub fn attach_arguments(cell: &mut MathData, pos: usize, def: &Arc<MacroData>, policy: AttachPolicy) {
    let arity = def.arity();
    let have = match cell.get(pos).map(MathAtom::inset) {
        Some(InsetMath::Macro(m)) => m.args().len(),
        _ => return,
    };

    if have > arity {
        let surplus = match cell.get_mut(pos).and_then(|a| a.inset_mut().as_macro_mut()) {
            Some(m) => m.split_off_args(arity),
            None => return,
        };
        let mut at = pos + 1;
        for arg in surplus.into_iter().filter(|a| !a.is_empty()) {
            cell.insert(at, MathAtom::new(InsetMath::brace(arg)));
            at += 1;
        }
        return;
    }

    for idx in have..arity {
        let next = pos + 1;
        let (arg, optional) = if def.is_optional(idx) {
            (take_bracket_group(cell, next).unwrap_or_default(), true)
        } else {
            let arg = match policy {
                AttachPolicy::Greedy if next < cell.len() => take_argument(cell, next),
                _ => MathData::new(),
            };
            (arg, false)
        };
        if let Some(m) = cell.get_mut(pos).and_then(|a| a.inset_mut().as_macro_mut()) {
            m.push_arg(arg, optional);
        }
    }
}

/// Remove the atom at `pos` and turn it into argument content
fn take_argument(cell: &mut MathData, pos: usize) -> MathData {
    match cell.erase(pos).map(MathAtom::into_inset) {
        Some(InsetMath::Brace(b)) => b.cell,
        Some(inset) => MathData::single(MathAtom::new(inset)),
        None => MathData::new(),
    }
}

/// Remove a `[...]` run of character atoms starting at `pos`, returning its content
fn take_bracket_group(cell: &mut MathData, pos: usize) -> Option<MathData> {
    if cell.get(pos)?.as_char() != Some('[') {
        return None;
    }
    let mut depth = 0usize;
    let mut end = None;
    for (i, atom) in cell.atoms().iter().enumerate().skip(pos) {
        match atom.as_char() {
            Some('[') => depth += 1,
            Some(']') => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let mut group = cell.erase_range(pos, end + 1);
    group.pop();
    group.erase(0);
    Some(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroTable;

    fn tables() -> (MacroTable, MacroTable) {
        let mut local = MacroTable::new();
        local.insert("sq", MacroData::new("sq", "#1^2", 1));
        local.insert("pair", MacroData::new("pair", "(#1,#2)", 2));
        local.insert("opt", MacroData::new("opt", "#1+#2", 2).with_optional(0, "k"));
        (local, MacroTable::new())
    }

    fn unknown(name: &str) -> MathAtom {
        MathAtom::new(InsetMath::unknown(name, true))
    }

    fn run(cell: &mut MathData, local: &MacroTable, global: &MacroTable, policy: AttachPolicy) {
        let ctx = MacroContext::with_tables(Some(local), global);
        let mut guard = ExpansionGuard::default();
        update_cell(cell, &ctx, &mut guard, policy);
    }

    #[test]
    fn test_guard_refuses_reentry_and_depth() {
        let mut guard = ExpansionGuard::new(2);
        assert!(guard.enter("a"));
        assert!(!guard.enter("a"));
        assert!(guard.enter("b"));
        assert!(!guard.enter("c"));
        guard.leave();
        assert!(guard.enter("c"));
        assert_eq!(guard.depth(), 2);
    }

    #[test]
    fn test_unknown_becomes_macro_and_takes_brace() {
        let (local, global) = tables();
        let mut cell = MathData::single(unknown("sq"));
        cell.push(MathAtom::new(InsetMath::brace(MathData::from_chars("x"))));
        cell.push(MathAtom::new(InsetMath::char('+')));
        run(&mut cell, &local, &global, AttachPolicy::Greedy);
        assert_eq!(cell.len(), 2);
        let m = cell[0].inset().as_macro().unwrap();
        assert_eq!(m.args()[0].to_latex(), "x");
        assert_eq!(cell.to_latex(), "\\sq{x}+");
    }

    #[test]
    fn test_greedy_takes_single_atoms() {
        let (local, global) = tables();
        let mut cell = MathData::single(unknown("pair"));
        cell.append(MathData::from_chars("ab"));
        run(&mut cell, &local, &global, AttachPolicy::Greedy);
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.to_latex(), "\\pair{a}{b}");
    }

    #[test]
    fn test_interactive_non_greedy_leaves_neighbours() {
        let (local, global) = tables();
        let mut m = MacroInset::new("pair");
        m.set_display(DisplayMode::Init);
        let mut cell = MathData::single(MathAtom::new(InsetMath::Macro(m)));
        cell.append(MathData::from_chars("ab"));
        run(&mut cell, &local, &global, AttachPolicy::NonGreedy);
        assert_eq!(cell.len(), 3);
        let m = cell[0].inset().as_macro().unwrap();
        assert_eq!(m.args().len(), 2);
        assert!(m.args().iter().all(MathData::is_empty));
        assert_eq!(m.display(), DisplayMode::Normal);
    }

    #[test]
    fn test_optional_bracket_absorbed() {
        let (local, global) = tables();
        let mut m = MacroInset::new("opt");
        m.set_display(DisplayMode::Init);
        let mut cell = MathData::single(MathAtom::new(InsetMath::Macro(m)));
        cell.append(MathData::from_chars("[z]y"));
        run(&mut cell, &local, &global, AttachPolicy::NonGreedy);
        assert_eq!(cell.to_latex(), "\\opt[z]{}y");
    }

    #[test]
    fn test_surplus_arguments_pushed_out() {
        let (local, global) = tables();
        let m = MacroInset::with_args(
            "sq",
            vec![MathData::from_chars("a"), MathData::from_chars("b")],
            vec![false, false],
        );
        let mut cell = MathData::single(MathAtom::new(InsetMath::Macro(m)));
        run(&mut cell, &local, &global, AttachPolicy::Greedy);
        assert_eq!(cell.len(), 2);
        assert_eq!(cell.to_latex(), "\\sq{a}{b}");
        assert!(cell[1].inset().as_brace().is_some());
    }

    #[test]
    fn test_unknown_not_defined_stays() {
        let (local, global) = tables();
        let mut cell = MathData::single(unknown("nothere"));
        run(&mut cell, &local, &global, AttachPolicy::Greedy);
        assert!(cell[0].inset().as_unknown().is_some());
    }

    #[test]
    fn test_nested_cells_updated() {
        let (local, global) = tables();
        let mut inner = MathData::single(unknown("sq"));
        inner.push(MathAtom::new(InsetMath::char('2')));
        let mut cell = MathData::single(MathAtom::new(InsetMath::brace(inner)));
        run(&mut cell, &local, &global, AttachPolicy::Greedy);
        let brace = cell[0].inset().as_brace().unwrap();
        assert!(brace.cell[0].inset().as_macro().unwrap().is_resolved());
    }
}
