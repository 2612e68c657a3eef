//! The macro system: definitions, tables, positional lookup and expansion

mod context;
mod data;
mod table;
mod update;

pub use context::MacroContext;
pub use data::MacroData;
pub use table::{GlobalMacroRegistry, MacroTable};
pub use update::{
    attach_arguments, collect_atom_templates, collect_templates, update_cell, update_cell_defining, AttachPolicy,
    ExpansionGuard, DEFAULT_MAX_DEPTH,
};
