//! Error types for the math crate

use thiserror::Error;

/// Errors that can occur in math operations
#[derive(Error, Debug)]
pub enum MathError {
    /// Input could not be parsed; carries the first diagnostic
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A structural edit was refused by the node kind
    #[error("mutation refused: {0}")]
    Refused(#[from] MutationRefused),

    /// A macro name has no visible definition
    #[error("undefined macro: \\{0}")]
    MacroUnresolved(String),

    /// The computer-algebra passthrough failed
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    /// I/O error while talking to an external program
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for math operations
pub type MathResult<T> = Result<T, MathError>;

// =============================================================================
// Parse diagnostics
// =============================================================================

/// What went wrong while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A `{` without matching `}` or a stray `}`
    UnmatchedBrace,
    /// `\begin{x}` closed by `\end{y}` or never closed
    MismatchedEnvironment,
    /// `$`, `\(` or `\[` without its closing delimiter
    UnmatchedMathShift,
    /// `\left` without `\right` or the reverse
    UnmatchedDelimiter,
    /// A length or count argument that is not a number
    MalformedNumber,
    /// An alignment tab or row break outside of a grid
    UnexpectedAlignment,
    /// Input ended while a construct still needed tokens
    UnexpectedEnd,
    /// A macro definition that could not be understood
    MalformedDefinition,
    /// Anything else
    Unexpected,
}

/// A recoverable parse diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct ParseError {
    /// Classification of the error
    pub kind: ParseErrorKind,
    /// Byte offset into the source text
    pub position: usize,
    /// Human readable description
    pub message: String,
}

impl ParseError {
    /// Create a new diagnostic
    pub fn new(kind: ParseErrorKind, position: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }
}

// =============================================================================
// Refused structural edits
// =============================================================================

/// A structural change the node kind does not support
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationRefused {
    /// Hull type changes into or out of an unknown environment
    #[error("cannot change environment `{from}` into `{to}`")]
    HullType { from: String, to: String },

    /// Row count is fixed for this node kind
    #[error("rows cannot be changed in `{0}`")]
    FixedRows(String),

    /// Column count is fixed for this node kind
    #[error("columns cannot be changed in `{0}`")]
    FixedColumns(String),

    /// Deleting the only remaining row or column
    #[error("cannot delete the last {0}")]
    LastOne(&'static str),

    /// The row or column index does not exist
    #[error("index {0} out of range")]
    OutOfRange(usize),

    /// The node is not a grid
    #[error("not a grid")]
    NotAGrid,
}
