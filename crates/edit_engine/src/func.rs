//! Function requests: the commands the cursor dispatches

use serde::{Deserialize, Serialize};

/// What a request asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncCode {
    // Movement
    CharForward,
    CharBackward,
    /// Screen-left, following the visual order of mixed-direction text
    CharLeft,
    CharRight,
    Up,
    Down,
    LineBegin,
    LineEnd,
    /// Next cell in tab order
    CellForward,
    CellBackward,

    // Selection
    SelectAll,
    Escape,

    // Editing
    SelfInsert,
    /// Insert LaTeX given as the argument
    MathInsert,
    DeleteBackward,
    DeleteForward,
    Break,
    NewlineInsert,
    MathMode,
    Superscript,
    Subscript,

    // Macros
    MathMacroFold,
    MathMacroUnfold,
    MathMacroAddParam,
    MathMacroRemoveParam,
    MathMacroMakeOptional,
    MathMacroMakeNonOptional,

    // Grids and formulas
    TabularFeature,
    MathMutate,
    MathNumber,
    MathNonumber,
    LabelInsert,
    MathExtern,

    // Clipboard and history
    Copy,
    Cut,
    Paste,
    Undo,
    Redo,

    /// A name nothing knows
    Unknown(String),
}

const NAMES: &[(&str, FuncCode)] = &[
    ("char-forward", FuncCode::CharForward),
    ("char-backward", FuncCode::CharBackward),
    ("char-left", FuncCode::CharLeft),
    ("char-right", FuncCode::CharRight),
    ("up", FuncCode::Up),
    ("down", FuncCode::Down),
    ("line-begin", FuncCode::LineBegin),
    ("line-end", FuncCode::LineEnd),
    ("cell-forward", FuncCode::CellForward),
    ("cell-backward", FuncCode::CellBackward),
    ("select-all", FuncCode::SelectAll),
    ("escape", FuncCode::Escape),
    ("self-insert", FuncCode::SelfInsert),
    ("math-insert", FuncCode::MathInsert),
    ("char-delete-backward", FuncCode::DeleteBackward),
    ("char-delete-forward", FuncCode::DeleteForward),
    ("break-paragraph", FuncCode::Break),
    ("newline-insert", FuncCode::NewlineInsert),
    ("math-mode", FuncCode::MathMode),
    ("math-superscript", FuncCode::Superscript),
    ("math-subscript", FuncCode::Subscript),
    ("math-macro-fold", FuncCode::MathMacroFold),
    ("math-macro-unfold", FuncCode::MathMacroUnfold),
    ("math-macro-add-param", FuncCode::MathMacroAddParam),
    ("math-macro-remove-param", FuncCode::MathMacroRemoveParam),
    ("math-macro-make-optional", FuncCode::MathMacroMakeOptional),
    ("math-macro-make-nonoptional", FuncCode::MathMacroMakeNonOptional),
    ("tabular-feature", FuncCode::TabularFeature),
    ("math-mutate", FuncCode::MathMutate),
    ("math-number-toggle", FuncCode::MathNumber),
    ("math-number-line-toggle", FuncCode::MathNonumber),
    ("label-insert", FuncCode::LabelInsert),
    ("math-extern", FuncCode::MathExtern),
    ("copy", FuncCode::Copy),
    ("cut", FuncCode::Cut),
    ("paste", FuncCode::Paste),
    ("undo", FuncCode::Undo),
    ("redo", FuncCode::Redo),
];

impl FuncCode {
    /// Code for a command name; unrecognized names give [`FuncCode::Unknown`]
    pub fn from_name(name: &str) -> Self {
        NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, code)| code.clone())
            .unwrap_or_else(|| FuncCode::Unknown(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            FuncCode::Unknown(name) => name,
            code => NAMES
                .iter()
                .find(|(_, c)| c == code)
                .map_or("", |(n, _)| n),
        }
    }

    /// Whether the code only moves the cursor
    pub fn is_movement(&self) -> bool {
        matches!(
            self,
            FuncCode::CharForward
                | FuncCode::CharBackward
                | FuncCode::CharLeft
                | FuncCode::CharRight
                | FuncCode::Up
                | FuncCode::Down
                | FuncCode::LineBegin
                | FuncCode::LineEnd
                | FuncCode::CellForward
                | FuncCode::CellBackward
        )
    }

    /// Vertical movement keeps the remembered x position
    pub fn is_vertical(&self) -> bool {
        matches!(self, FuncCode::Up | FuncCode::Down)
    }
}

/// A command with its argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncRequest {
    pub code: FuncCode,
    pub argument: String,
    /// Movement extends the selection
    pub select: bool,
}

impl FuncRequest {
    pub fn new(code: FuncCode) -> Self {
        Self {
            code,
            argument: String::new(),
            select: false,
        }
    }

    pub fn with_argument(code: FuncCode, argument: &str) -> Self {
        Self {
            code,
            argument: argument.to_string(),
            select: false,
        }
    }

    /// The same request, extending the selection
    pub fn selecting(mut self) -> Self {
        self.select = true;
        self
    }

    /// Parse `name argument`; a `-select` suffix on the name extends the selection
    ///
    /// ```
    /// use edit_engine::{FuncCode, FuncRequest};
    /// let req = FuncRequest::parse("math-insert \\frac");
    /// assert_eq!(req.code, FuncCode::MathInsert);
    /// assert_eq!(req.argument, "\\frac");
    /// ```
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start();
        let (name, argument) = match text.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest),
            None => (text, ""),
        };
        let (name, select) = match name.strip_suffix("-select") {
            Some(base) => (base, true),
            None => (name, false),
        };
        Self {
            code: FuncCode::from_name(name),
            argument: argument.to_string(),
            select,
        }
    }
}
