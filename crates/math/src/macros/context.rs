//! Positional macro lookup

use super::{GlobalMacroRegistry, MacroData, MacroTable};
use std::sync::Arc;

/// The macros visible at one point of a document
///
/// `local` holds the definitions that precede the point; lookups fall back
/// to the global table.
#[derive(Debug, Clone, Copy)]
pub struct MacroContext<'a> {
    local: Option<&'a MacroTable>,
    global: &'a MacroTable,
}

impl<'a> MacroContext<'a> {
    pub fn new(local: &'a MacroTable) -> Self {
        Self {
            local: Some(local),
            global: GlobalMacroRegistry::instance().table(),
        }
    }

    /// Only the global macros
    pub fn global_only() -> MacroContext<'static> {
        MacroContext {
            local: None,
            global: GlobalMacroRegistry::instance().table(),
        }
    }

    /// Explicit local and global tables
    pub fn with_tables(local: Option<&'a MacroTable>, global: &'a MacroTable) -> Self {
        Self { local, global }
    }

    pub fn get(&self, name: &str) -> Option<Arc<MacroData>> {
        self.local
            .and_then(|t| t.get(name))
            .or_else(|| self.global.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.local.is_some_and(|t| t.has(name)) || self.global.has(name)
    }

    /// Whether `name` is defined by the document rather than globally
    pub fn is_local(&self, name: &str) -> bool {
        self.local.is_some_and(|t| t.has(name))
    }
}
