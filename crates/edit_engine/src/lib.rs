//! Edit Engine - cursor, dispatch and editing inside formulas
//!
//! This crate implements the interactive side of the editor: the cursor with
//! its selection, the request dispatch chain that walks from the innermost
//! math cell out to the text, macro mode, grid and display-formula editing,
//! and a buffer view bundling a document with undo and layout.

mod buffer_view;
mod clipboard;
mod cursor;
mod dispatch_result;
mod error;
mod func;
mod grid_edit;
mod macro_mode;
mod math_edit;
mod math_nav;
mod text_edit;

pub use buffer_view::BufferView;
pub use cursor::{Cursor, DispatchContext, Notification, Selected};
pub use dispatch_result::{DispatchResult, ScreenUpdate};
pub use error::*;
pub use func::{FuncCode, FuncRequest};
