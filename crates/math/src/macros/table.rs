//! Macro tables and the process-wide registry

use super::MacroData;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Name to definition map
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: BTreeMap<String, Arc<MacroData>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<MacroData>> {
        self.macros.get(name).cloned()
    }

    pub fn insert(&mut self, name: &str, data: MacroData) -> Arc<MacroData> {
        let data = Arc::new(data);
        self.macros.insert(name.to_string(), Arc::clone(&data));
        data
    }

    /// Insert an already shared definition
    pub fn insert_shared(&mut self, name: &str, data: Arc<MacroData>) {
        self.macros.insert(name.to_string(), data);
    }

    /// Parse a `\newcommand`/`\def` string and insert it, returning the name
    pub fn insert_def(&mut self, def: &str) -> Result<String, ParseError> {
        let template = parser::parse_template(def)?;
        let name = template.name();
        if name.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::MalformedDefinition,
                0,
                "macro definition without a name",
            ));
        }
        self.insert(&name, template.to_macro_data());
        Ok(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<MacroData>> {
        self.macros.remove(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<MacroData>)> {
        self.macros.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// Global registry
// =============================================================================

const GLOBAL_MACROS: &str = include_str!("../../resources/global_macros.tex");

/// Built-in macros shared by every document; immutable after construction
#[derive(Debug)]
pub struct GlobalMacroRegistry {
    table: MacroTable,
}

impl GlobalMacroRegistry {
    pub fn instance() -> &'static GlobalMacroRegistry {
        static REGISTRY: OnceLock<GlobalMacroRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| Self::from_source(GLOBAL_MACROS))
    }

    /// Build a registry from definition lines
    ///
    /// Each line holds one definition, optionally followed by
    /// `% requires <package>`.
    pub fn from_source(source: &str) -> Self {
        let mut table = MacroTable::new();
        for (lineno, line) in source.lines().enumerate() {
            let (def, package) = split_comment(line);
            let def = def.trim();
            if def.is_empty() {
                continue;
            }
            let template = match parser::parse_template(def) {
                Ok(t) => t,
                Err(err) => {
                    warn!(line = lineno + 1, %err, "skipping global macro");
                    continue;
                }
            };
            let mut data = template.to_macro_data();
            if let Some(package) = package.and_then(|c| c.trim().strip_prefix("requires")) {
                data = data.with_required_package(package.trim());
            }
            table.insert(&template.name(), data);
        }
        debug!(count = table.len(), "global macros loaded");
        Self { table }
    }

    pub fn table(&self) -> &MacroTable {
        &self.table
    }

    pub fn get(&self, name: &str) -> Option<Arc<MacroData>> {
        self.table.get(name)
    }
}

/// Split a line at its first unescaped `%`
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut prev = '\0';
    for (i, c) in line.char_indices() {
        if c == '%' && prev != '\\' {
            return (&line[..i], Some(&line[i + 1..]));
        }
        prev = c;
    }
    (line, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_def() {
        let mut table = MacroTable::new();
        let name = table.insert_def("\\newcommand{\\sq}[1]{#1^2}").unwrap();
        assert_eq!(name, "sq");
        assert!(table.has("sq"));
        assert_eq!(table.get("sq").unwrap().arity(), 1);
    }

    #[test]
    fn test_insert_def_rejects_garbage() {
        let mut table = MacroTable::new();
        assert!(table.insert_def("x+y").is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_global_registry() {
        let registry = GlobalMacroRegistry::instance();
        let abs = registry.get("abs").unwrap();
        assert_eq!(abs.arity(), 1);
        let tr = registry.get("Tr").unwrap();
        assert_eq!(tr.required_package(), Some("amsmath"));
        assert!(registry.get("R").unwrap().required_package().is_none());
    }

    #[test]
    fn test_registry_from_source_skips_comments() {
        let registry = GlobalMacroRegistry::from_source(
            "% a comment\n\n\\newcommand{\\two}{2} % requires foo\n\\def\\three{3}\n",
        );
        assert_eq!(registry.table().len(), 2);
        assert_eq!(registry.get("two").unwrap().required_package(), Some("foo"));
    }

    #[test]
    fn test_split_comment_keeps_escaped_percent() {
        assert_eq!(split_comment("a\\%b % c"), ("a\\%b ", Some(" c")));
        assert_eq!(split_comment("abc"), ("abc", None));
    }
}
