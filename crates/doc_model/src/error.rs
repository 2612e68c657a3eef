//! Error types for document model operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocModelError {
    #[error("Invalid position: paragraph {pit}, offset {pos}")]
    InvalidPosition { pit: usize, pos: usize },

    #[error("No math inset at paragraph {pit}, offset {pos}")]
    NotAnInset { pit: usize, pos: usize },

    #[error("Math error: {0}")]
    Math(#[from] math::MathError),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Undo history is empty")]
    NothingToUndo,

    #[error("Redo history is empty")]
    NothingToRedo,
}

pub type Result<T> = std::result::Result<T, DocModelError>;
