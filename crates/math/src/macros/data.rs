//! Macro definitions and argument substitution

use crate::atom::{AtomId, MathAtom};
use crate::data::MathData;
use crate::inset::{ArgumentProxy, InsetMath};
use crate::parser;
use std::sync::OnceLock;

/// One macro definition
///
/// The textual fields are the identity of a definition; the parsed bodies
/// are caches filled on first use.
#[derive(Debug, Clone)]
pub struct MacroData {
    name: String,
    definition: String,
    display: Option<String>,
    optional_at: Vec<bool>,
    defaults: Vec<String>,
    required_package: Option<String>,
    body: OnceLock<MathData>,
    display_body: OnceLock<MathData>,
}

impl PartialEq for MacroData {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.definition == other.definition
            && self.display == other.display
            && self.optional_at == other.optional_at
            && self.defaults == other.defaults
            && self.required_package == other.required_package
    }
}

impl MacroData {
    /// A macro with `arity` mandatory arguments
    pub fn new(name: &str, definition: &str, arity: usize) -> Self {
        Self {
            name: name.to_string(),
            definition: definition.to_string(),
            display: None,
            optional_at: vec![false; arity],
            defaults: vec![String::new(); arity],
            required_package: None,
            body: OnceLock::new(),
            display_body: OnceLock::new(),
        }
    }

    /// Mark argument `idx` (zero-based) optional with the given default
    pub fn with_optional(mut self, idx: usize, default: &str) -> Self {
        if idx < self.optional_at.len() {
            self.optional_at[idx] = true;
            self.defaults[idx] = default.to_string();
        }
        self
    }

    pub fn with_display(mut self, display: &str) -> Self {
        self.display = (!display.is_empty()).then(|| display.to_string());
        self
    }

    pub fn with_required_package(mut self, package: &str) -> Self {
        self.required_package = Some(package.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn arity(&self) -> usize {
        self.optional_at.len()
    }

    /// Number of optional arguments
    pub fn optionals(&self) -> usize {
        self.optional_at.iter().filter(|&&o| o).count()
    }

    pub fn is_optional(&self, idx: usize) -> bool {
        self.optional_at.get(idx).copied().unwrap_or(false)
    }

    pub fn optional_at(&self) -> &[bool] {
        &self.optional_at
    }

    pub fn default_of(&self, idx: usize) -> Option<&str> {
        self.is_optional(idx).then(|| self.defaults[idx].as_str())
    }

    pub fn required_package(&self) -> Option<&str> {
        self.required_package.as_deref()
    }

    /// The definition body parsed once
    pub fn body(&self) -> &MathData {
        self.body.get_or_init(|| parser::parse_quiet(&self.definition))
    }

    /// The body used for display, the display override if there is one
    pub fn display_body(&self) -> &MathData {
        match &self.display {
            Some(display) => self.display_body.get_or_init(|| parser::parse_quiet(display)),
            None => self.body(),
        }
    }

    /// Whether argument `idx` falls back to its default given `args`
    fn uses_default(&self, idx: usize, args: &[MathData]) -> bool {
        match args.get(idx) {
            None => true,
            Some(arg) => self.is_optional(idx) && arg.is_empty(),
        }
    }

    fn default_cell(&self, idx: usize) -> MathData {
        match self.defaults.get(idx) {
            Some(default) if !default.is_empty() => parser::parse_quiet(default),
            _ => MathData::new(),
        }
    }

    /// Substitute the actual arguments into the definition
    ///
    /// Missing arguments, and empty optional ones, use their defaults.
    pub fn expand(&self, args: &[MathData]) -> MathData {
        let mut out = self.body().fresh_copy();
        substitute(&mut out, &mut |number| {
            let idx = number.checked_sub(1)?;
            if idx >= self.arity() {
                return None;
            }
            Some(if self.uses_default(idx, args) {
                self.default_cell(idx)
            } else {
                args[idx].fresh_copy()
            })
        });
        out
    }

    /// Expansion for display: arguments become proxies to the cells of
    /// the instance `owner`
    pub fn expand_display(&self, owner: AtomId, args: &[MathData]) -> MathData {
        let mut out = self.display_body().fresh_copy();
        substitute(&mut out, &mut |number| {
            let idx = number.checked_sub(1)?;
            if idx >= self.arity() {
                return None;
            }
            Some(if self.uses_default(idx, args) {
                self.default_cell(idx)
            } else {
                MathData::single(MathAtom::new(InsetMath::ArgumentProxy(ArgumentProxy {
                    owner,
                    idx,
                })))
            })
        });
        out
    }
}

/// Replace every `#n` atom in `cell`, recursively, with `replacement(n)`;
/// arguments without a replacement are kept
fn substitute(cell: &mut MathData, replacement: &mut dyn FnMut(usize) -> Option<MathData>) {
    let mut pos = 0;
    while pos < cell.len() {
        let number = match cell[pos].inset() {
            InsetMath::MacroArgument(arg) => Some(arg.number),
            _ => None,
        };
        if let Some(data) = number.and_then(&mut *replacement) {
            cell.erase(pos);
            let len = data.len();
            cell.insert_data(pos, data);
            pos += len;
            continue;
        }
        if let Some(atom) = cell.get_mut(pos) {
            let inset = atom.inset_mut();
            for idx in 0..inset.nargs() {
                if let Some(child) = inset.cell_mut(idx) {
                    substitute(child, replacement);
                }
            }
        }
        pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_square() {
        let sq = MacroData::new("sq", "#1^2", 1);
        let expanded = sq.expand(&[MathData::from_chars("3")]);
        assert_eq!(expanded, parser::parse_quiet("3^2"));
    }

    #[test]
    fn test_expand_twice_used_argument() {
        let dbl = MacroData::new("dbl", "#1#1", 1);
        let expanded = dbl.expand(&[MathData::from_chars("xy")]);
        assert_eq!(expanded.to_latex(), "xyxy");
    }

    #[test]
    fn test_expand_nested_argument() {
        let f = MacroData::new("f", "\\frac{#1}{#2}", 2);
        let expanded = f.expand(&[MathData::from_chars("a"), MathData::from_chars("b")]);
        assert_eq!(expanded.to_latex(), "\\frac{a}{b}");
    }

    #[test]
    fn test_optional_default() {
        let m = MacroData::new("m", "#1+#2", 2).with_optional(0, "k");
        assert_eq!(m.optionals(), 1);
        let expanded = m.expand(&[MathData::new(), MathData::from_chars("x")]);
        assert_eq!(expanded.to_latex(), "k+x");
        let missing = m.expand(&[]);
        assert_eq!(missing.to_latex(), "k+");
    }

    #[test]
    fn test_display_expansion_uses_proxies() {
        let sq = MacroData::new("sq", "#1^2", 1);
        let owner = AtomId::new();
        let shown = sq.expand_display(owner, &[MathData::from_chars("3")]);
        let script = shown[0].inset().as_script().unwrap();
        assert!(matches!(
            script.nuc()[0].inset(),
            InsetMath::ArgumentProxy(p) if p.owner == owner && p.idx == 0
        ));
    }

    #[test]
    fn test_equality_ignores_caches() {
        let a = MacroData::new("a", "x", 0);
        let b = MacroData::new("a", "x", 0);
        let _ = a.body();
        assert_eq!(a, b);
        assert_ne!(a, MacroData::new("a", "y", 0));
    }
}
