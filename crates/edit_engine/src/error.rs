//! Error types for editing operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command needs an argument: {0}")]
    MissingArgument(&'static str),

    #[error("Document model error: {0}")]
    DocModel(#[from] doc_model::DocModelError),

    #[error("Math error: {0}")]
    Math(#[from] math::MathError),
}

pub type Result<T> = std::result::Result<T, EditError>;
