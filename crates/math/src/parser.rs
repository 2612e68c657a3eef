//! Recursive-descent LaTeX parser
//!
//! Builds a [`MathData`] from source text. Errors never abort the parse: each
//! one is recorded in the [`ParseOutcome`] and parsing continues with a best
//! effort tree. Macro definitions met on the way are registered at once, so
//! later uses in the same input see them.

use crate::atom::MathAtom;
use crate::data::MathData;
use crate::error::{ParseError, ParseErrorKind};
use crate::inset::{
    BigDelimInset, BoxInset, ColorInset, DecorationInset, DelimInset, EnvInset, FontInset,
    FracInset, FracKind, GridInset, GridKind, HullInset, HullType, InsetMath, KernInset, Limits,
    MacroArgument, MacroInset, MacroTemplate, PhantomInset, RefInset, RefKind, RootInset,
    ScriptInset, SpaceInset, SpaceKind, SqrtInset, TemplateKind,
};
use crate::length::Length;
use crate::lexer::{tokenize, CatCode, Token, TokenKind};
use crate::macros::{MacroContext, MacroData, MacroTable};
use crate::symbols;
use std::sync::Arc;
use tracing::warn;

const MAX_ARGS: usize = 9;

/// Options for one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseFlags {
    /// Do not log diagnostics
    pub quiet: bool,
    /// Start in text mode, as for paragraph content
    pub text_mode: bool,
}

impl ParseFlags {
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            text_mode: false,
        }
    }

    pub fn text() -> Self {
        Self {
            quiet: false,
            text_mode: true,
        }
    }
}

/// Result of a parse: the tree, the diagnostics and the macros it defined
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub data: MathData,
    pub errors: Vec<ParseError>,
    pub macros: MacroTable,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse math content with the global macros in scope
pub fn parse_cell(input: &str, flags: ParseFlags) -> ParseOutcome {
    Parser::new(input, MacroContext::global_only(), flags).parse()
}

/// Parse math content with the macros visible at some document position
pub fn parse_cell_in(input: &str, ctx: MacroContext<'_>, flags: ParseFlags) -> ParseOutcome {
    Parser::new(input, ctx, flags).parse()
}

/// Parse, dropping diagnostics
pub fn parse_quiet(input: &str) -> MathData {
    parse_cell(input, ParseFlags::quiet()).data
}

/// Parse a single `\newcommand`/`\def` definition
///
/// No macros are in scope while the definition is read.
pub fn parse_template(def: &str) -> Result<MacroTemplate, ParseError> {
    let empty = MacroTable::new();
    let outcome = Parser::new(def, MacroContext::with_tables(None, &empty), ParseFlags::quiet()).parse();
    if let Some(err) = outcome.errors.into_iter().next() {
        return Err(err);
    }
    let mut atoms = outcome.data.into_atoms().into_iter();
    match (atoms.next().map(MathAtom::into_inset), atoms.next()) {
        (Some(InsetMath::MacroTemplate(t)), None) => Ok(t),
        _ => Err(ParseError::new(
            ParseErrorKind::MalformedDefinition,
            0,
            "not a macro definition",
        )),
    }
}

// =============================================================================
// Parser state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Math,
    Text,
}

/// How a math shift was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Dollar,
    DoubleDollar,
    Paren,
    Bracket,
}

/// The innermost construct being read; decides which tokens end a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Top,
    Group,
    Optional,
    Grid,
    LeftRight,
    Shift(Shift),
    /// A single-token argument
    Arg,
}

/// What ended a sequence
#[derive(Debug, Clone, PartialEq)]
enum End {
    Eof,
    CloseBrace,
    CloseBracket,
    Amp,
    RowBreak(Option<String>),
    EndEnv(String),
    Right(String),
    Shift,
}

pub struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    flags: ParseFlags,
    outer: MacroContext<'a>,
    defined: MacroTable,
    errors: Vec<ParseError>,
    pending_hlines: usize,
    pending_multicolumn: Option<(usize, String)>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, outer: MacroContext<'a>, flags: ParseFlags) -> Self {
        Self {
            input,
            tokens: tokenize(input),
            pos: 0,
            flags,
            outer,
            defined: MacroTable::new(),
            errors: Vec::new(),
            pending_hlines: 0,
            pending_multicolumn: None,
        }
    }

    pub fn parse(mut self) -> ParseOutcome {
        let mode = if self.flags.text_mode { Mode::Text } else { Mode::Math };
        let mut data = MathData::new();
        loop {
            let (part, end) = self.parse_seq(mode, Ctx::Top);
            data.append(part);
            if end == End::Eof {
                break;
            }
        }
        if !self.flags.quiet {
            for err in &self.errors {
                warn!(kind = ?err.kind, position = err.position, "{}", err.message);
            }
        }
        ParseOutcome {
            data,
            errors: self.errors,
            macros: self.defined,
        }
    }

    // =========================================================================
    // Token access
    // =========================================================================

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_char(&self) -> Option<char> {
        self.peek().and_then(Token::as_char)
    }

    fn peek_is_char(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_char(c))
    }

    fn peek_cat(&self, cat: CatCode) -> bool {
        self.peek().is_some_and(|t| !t.is_space() && t.cat() == Some(cat))
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(Token::is_space) {
            self.pos += 1;
        }
    }

    fn eof_pos(&self) -> usize {
        self.input.len()
    }

    fn error(&mut self, kind: ParseErrorKind, position: usize, message: impl Into<String>) {
        self.errors.push(ParseError::new(kind, position, message));
    }

    fn lookup_macro(&self, name: &str) -> Option<Arc<MacroData>> {
        self.defined.get(name).or_else(|| self.outer.get(name))
    }

    /// Source text of a `{...}` group, consumed verbatim
    fn read_braced_text(&mut self) -> Option<String> {
        self.skip_spaces();
        let open = self.peek()?.clone();
        if open.cat() != Some(CatCode::BeginGroup) || open.is_space() {
            return None;
        }
        self.pos += 1;
        let mut depth = 1usize;
        while let Some(tok) = self.next() {
            match tok.cat() {
                Some(CatCode::BeginGroup) if !tok.is_space() => depth += 1,
                Some(CatCode::EndGroup) => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(self.input[open.pos + 1..tok.pos].to_string());
                    }
                }
                _ => {}
            }
        }
        self.error(ParseErrorKind::UnmatchedBrace, open.pos, "missing `}`");
        Some(self.input[open.pos + 1..].to_string())
    }

    /// Source text of a `[...]` group, if one follows
    fn read_optional_text(&mut self) -> Option<String> {
        self.skip_spaces();
        if !self.peek_is_char('[') {
            return None;
        }
        let open = self.next()?;
        let mut depth = 0usize;
        while let Some(tok) = self.next() {
            match tok.cat() {
                Some(CatCode::BeginGroup) if !tok.is_space() => depth += 1,
                Some(CatCode::EndGroup) => depth = depth.saturating_sub(1),
                _ if depth == 0 && tok.is_char(']') => {
                    return Some(self.input[open.pos + 1..tok.pos].to_string());
                }
                _ => {}
            }
        }
        self.error(ParseErrorKind::UnexpectedEnd, open.pos, "missing `]`");
        Some(self.input[open.pos + 1..].to_string())
    }

    /// A delimiter after `\left`, `\right` or `\big`
    fn read_delim(&mut self, pos: usize) -> String {
        self.skip_spaces();
        let delim = match self.next().map(|t| t.kind) {
            Some(TokenKind::Char(c, _)) => c.to_string(),
            Some(TokenKind::ControlSeq(name)) => format!("\\{name}"),
            _ => {
                self.error(ParseErrorKind::UnexpectedEnd, pos, "missing delimiter");
                return ".".to_string();
            }
        };
        if !symbols::is_delimiter(&delim) {
            self.error(ParseErrorKind::UnmatchedDelimiter, pos, format!("`{delim}` is not a delimiter"));
        }
        delim
    }

    /// A length such as `-3mu` written without braces
    fn read_length(&mut self) -> Option<Length> {
        self.skip_spaces();
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || matches!(c, '.' | '-' | '+') {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        for _ in 0..2 {
            match self.peek_char() {
                Some(c) if c.is_ascii_alphabetic() => {
                    text.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        Length::parse(&text)
    }

    // =========================================================================
    // Sequences
    // =========================================================================

    fn parse_seq(&mut self, mode: Mode, ctx: Ctx) -> (MathData, End) {
        let mut cell = MathData::new();
        loop {
            if let Some(end) = self.parse_token(&mut cell, mode, ctx) {
                return (cell, end);
            }
        }
    }

    /// Parse one token into `cell`; returns the terminator if it was one
    fn parse_token(&mut self, cell: &mut MathData, mode: Mode, ctx: Ctx) -> Option<End> {
        let Some(tok) = self.next() else {
            return Some(End::Eof);
        };
        match tok.kind {
            TokenKind::Space | TokenKind::Par => {
                if mode == Mode::Text && cell.last().and_then(MathAtom::as_char) != Some(' ') {
                    cell.push(MathAtom::new(InsetMath::char(' ')));
                }
                None
            }
            TokenKind::ControlSeq(name) => self.parse_command(&name, tok.pos, cell, mode, ctx),
            TokenKind::Char(c, cat) => self.parse_char(c, cat, tok.pos, cell, mode, ctx),
        }
    }

    fn parse_char(
        &mut self,
        c: char,
        cat: CatCode,
        pos: usize,
        cell: &mut MathData,
        mode: Mode,
        ctx: Ctx,
    ) -> Option<End> {
        match cat {
            CatCode::BeginGroup => {
                let (inner, end) = self.parse_seq(mode, Ctx::Group);
                if end != End::CloseBrace {
                    self.error(ParseErrorKind::UnmatchedBrace, pos, "missing `}`");
                }
                cell.push(MathAtom::new(InsetMath::brace(inner)));
            }
            CatCode::EndGroup => match ctx {
                Ctx::Group | Ctx::Grid => return Some(End::CloseBrace),
                _ => self.error(ParseErrorKind::UnmatchedBrace, pos, "unexpected `}`"),
            },
            CatCode::MathShift => return self.parse_math_shift(pos, cell, ctx),
            CatCode::AlignTab => {
                if ctx == Ctx::Grid {
                    return Some(End::Amp);
                }
                self.error(ParseErrorKind::UnexpectedAlignment, pos, "`&` outside of a grid");
            }
            CatCode::Superscript | CatCode::Subscript if mode == Mode::Math => {
                self.parse_script(cell, cat == CatCode::Superscript);
            }
            CatCode::Param => self.parse_param(cell, pos),
            CatCode::Active => cell.push(MathAtom::new(InsetMath::Space(SpaceInset::new(SpaceKind::Protected)))),
            _ => {
                if c == ']' && ctx == Ctx::Optional {
                    return Some(End::CloseBracket);
                }
                cell.push(MathAtom::new(InsetMath::char(c)));
            }
        }
        None
    }

    fn parse_math_shift(&mut self, pos: usize, cell: &mut MathData, ctx: Ctx) -> Option<End> {
        let double = self.peek_is_char('$');
        match ctx {
            Ctx::Shift(Shift::Dollar) => return Some(End::Shift),
            Ctx::Shift(Shift::DoubleDollar) if double => {
                self.pos += 1;
                return Some(End::Shift);
            }
            _ => {}
        }
        if double {
            self.pos += 1;
        }
        let shift = if double { Shift::DoubleDollar } else { Shift::Dollar };
        cell.push(self.parse_shifted(shift, pos));
        None
    }

    /// Math between shift delimiters becomes a hull
    fn parse_shifted(&mut self, shift: Shift, pos: usize) -> MathAtom {
        let (inner, end) = self.parse_seq(Mode::Math, Ctx::Shift(shift));
        if end != End::Shift {
            self.error(ParseErrorKind::UnmatchedMathShift, pos, "math shift not closed");
        }
        let hull = match shift {
            Shift::Dollar | Shift::Paren => HullInset::with_content(HullType::Simple, inner),
            Shift::DoubleDollar | Shift::Bracket => {
                let mut hull = HullInset::with_content(HullType::Equation, inner);
                hull.set_numbered(0, false);
                hull
            }
        };
        MathAtom::new(InsetMath::Hull(hull))
    }

    // =========================================================================
    // Arguments and scripts
    // =========================================================================

    /// A braced group or a single token
    fn parse_arg(&mut self, mode: Mode) -> MathData {
        self.skip_spaces();
        let Some(tok) = self.peek() else {
            self.error(ParseErrorKind::UnexpectedEnd, self.eof_pos(), "missing argument");
            return MathData::new();
        };
        let pos = tok.pos;
        match tok.cat() {
            Some(CatCode::BeginGroup) => {
                self.pos += 1;
                let (inner, end) = self.parse_seq(mode, Ctx::Group);
                if end != End::CloseBrace {
                    self.error(ParseErrorKind::UnmatchedBrace, pos, "missing `}`");
                }
                inner
            }
            Some(CatCode::EndGroup) | Some(CatCode::AlignTab) => {
                self.error(ParseErrorKind::UnexpectedEnd, pos, "missing argument");
                MathData::new()
            }
            _ => {
                let mut cell = MathData::new();
                self.parse_token(&mut cell, mode, Ctx::Arg);
                cell
            }
        }
    }

    /// `[...]` parsed as content, if one follows
    fn parse_optional(&mut self, mode: Mode) -> Option<MathData> {
        self.skip_spaces();
        if !self.peek_is_char('[') {
            return None;
        }
        let pos = self.next()?.pos;
        let (inner, end) = self.parse_seq(mode, Ctx::Optional);
        if end != End::CloseBracket {
            self.error(ParseErrorKind::UnexpectedEnd, pos, "missing `]`");
        }
        Some(inner)
    }

    /// The rest of the enclosing sequence, for `\over` and `\color`
    ///
    /// A single-token argument has no rest; parsing goes on after it.
    fn parse_rest(&mut self, mode: Mode, ctx: Ctx) -> (MathData, Option<End>) {
        if ctx == Ctx::Arg {
            return (MathData::new(), None);
        }
        let (rest, end) = self.parse_seq(mode, ctx);
        (rest, Some(end))
    }

    /// Attach `^x` or `_x` to the end of `cell`
    ///
    /// The last atom becomes the nucleus; an empty `{}` stands for an empty
    /// nucleus. A script atom without that script yet takes it, one that
    /// already has it becomes the nucleus of a new script atom.
    fn parse_script(&mut self, cell: &mut MathData, up: bool) {
        let arg = self.parse_arg(Mode::Math);
        let wants_new = match cell.last().map(MathAtom::inset) {
            Some(InsetMath::Script(s)) => s.idx_of_script(up).is_some(),
            _ => true,
        };
        if wants_new {
            let nucleus = match cell.pop() {
                Some(atom) if atom.inset().as_brace().is_some_and(|b| b.cell.is_empty()) => MathData::new(),
                Some(atom) => MathData::single(atom),
                None => MathData::new(),
            };
            cell.push(MathAtom::new(InsetMath::Script(ScriptInset::new(nucleus))));
        }
        if let Some(script) = cell.last_mut().and_then(|a| a.inset_mut().as_script_mut()) {
            script.ensure(up);
            if let Some(target) = script.script_mut(up) {
                *target = arg;
            }
        }
    }

    fn parse_param(&mut self, cell: &mut MathData, pos: usize) {
        match self.peek_char().and_then(|c| c.to_digit(10)) {
            Some(n) if n >= 1 => {
                self.pos += 1;
                cell.push(MathAtom::new(InsetMath::MacroArgument(MacroArgument {
                    number: n as usize,
                })));
            }
            _ => self.error(ParseErrorKind::Unexpected, pos, "`#` without argument number"),
        }
    }

    fn apply_limits(&mut self, cell: &mut MathData, name: &str, pos: usize) {
        let limits = if name == "limits" { Limits::Limits } else { Limits::NoLimits };
        let is_script = matches!(cell.last().map(MathAtom::inset), Some(InsetMath::Script(_)));
        if !is_script {
            let Some(atom) = cell.pop() else {
                self.error(ParseErrorKind::Unexpected, pos, format!("`\\{name}` without operator"));
                return;
            };
            cell.push(MathAtom::new(InsetMath::Script(ScriptInset::new(MathData::single(atom)))));
        }
        if let Some(script) = cell.last_mut().and_then(|a| a.inset_mut().as_script_mut()) {
            script.limits = limits;
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn parse_command(
        &mut self,
        name: &str,
        pos: usize,
        cell: &mut MathData,
        mode: Mode,
        ctx: Ctx,
    ) -> Option<End> {
        match name {
            "\\" => {
                let skip = self.read_optional_text();
                if ctx == Ctx::Grid {
                    return Some(End::RowBreak(skip));
                }
                self.error(ParseErrorKind::UnexpectedAlignment, pos, "row break outside of a grid");
            }
            "end" => {
                let env = self.read_braced_text().unwrap_or_default();
                if ctx == Ctx::Grid {
                    return Some(End::EndEnv(env));
                }
                self.error(
                    ParseErrorKind::MismatchedEnvironment,
                    pos,
                    format!("`\\end{{{env}}}` without `\\begin`"),
                );
            }
            "begin" => self.parse_env(pos, cell, mode),
            "right" => {
                let delim = self.read_delim(pos);
                if ctx == Ctx::LeftRight {
                    return Some(End::Right(delim));
                }
                self.error(ParseErrorKind::UnmatchedDelimiter, pos, "`\\right` without `\\left`");
            }
            "left" => {
                let left = self.read_delim(pos);
                let (inner, end) = self.parse_seq(mode, Ctx::LeftRight);
                let right = match end {
                    End::Right(delim) => delim,
                    _ => {
                        self.error(ParseErrorKind::UnmatchedDelimiter, pos, "`\\left` without `\\right`");
                        ".".to_string()
                    }
                };
                cell.push(MathAtom::new(InsetMath::Delim(DelimInset {
                    left,
                    right,
                    cell: inner,
                })));
            }
            "[" => cell.push(self.parse_shifted(Shift::Bracket, pos)),
            "(" => cell.push(self.parse_shifted(Shift::Paren, pos)),
            "]" | ")" => {
                let expected = if name == "]" { Shift::Bracket } else { Shift::Paren };
                if ctx == Ctx::Shift(expected) {
                    return Some(End::Shift);
                }
                self.error(ParseErrorKind::UnmatchedMathShift, pos, format!("unexpected `\\{name}`"));
            }
            "limits" | "nolimits" => self.apply_limits(cell, name, pos),
            "kern" => match self.read_length() {
                Some(length) => cell.push(MathAtom::new(InsetMath::Kern(KernInset { length }))),
                None => self.error(ParseErrorKind::MalformedNumber, pos, "bad `\\kern` length"),
            },
            "hspace" => {
                if self.peek_is_char('*') {
                    self.pos += 1;
                }
                let text = self.read_braced_text().unwrap_or_default();
                match Length::parse(text.trim()) {
                    Some(len) => cell.push(MathAtom::new(InsetMath::Space(SpaceInset::new(
                        SpaceKind::Custom(len),
                    )))),
                    None => self.error(ParseErrorKind::MalformedNumber, pos, format!("bad length `{text}`")),
                }
            }
            "color" => {
                let color = self.read_braced_text().unwrap_or_default();
                let (rest, end) = self.parse_rest(mode, ctx);
                cell.push(MathAtom::new(InsetMath::Color(ColorInset {
                    color,
                    old_style: true,
                    cell: rest,
                })));
                return end;
            }
            "textcolor" => {
                let color = self.read_braced_text().unwrap_or_default();
                let content = self.parse_arg(mode);
                cell.push(MathAtom::new(InsetMath::Color(ColorInset {
                    color,
                    old_style: false,
                    cell: content,
                })));
            }
            "sqrt" => {
                let inset = match self.parse_optional(Mode::Math) {
                    Some(index) => InsetMath::Root(RootInset::new(index, self.parse_arg(Mode::Math))),
                    None => InsetMath::Sqrt(SqrtInset {
                        cell: self.parse_arg(Mode::Math),
                    }),
                };
                cell.push(MathAtom::new(inset));
            }
            "multicolumn" => {
                let span = self.read_braced_text().unwrap_or_default();
                let align = self.read_braced_text().unwrap_or_default();
                let content = self.parse_arg(mode);
                cell.append(content);
                match span.trim().parse::<usize>() {
                    Ok(n) if ctx == Ctx::Grid => self.pending_multicolumn = Some((n, align)),
                    Ok(_) => self.error(ParseErrorKind::UnexpectedAlignment, pos, "`\\multicolumn` outside of a grid"),
                    Err(_) => self.error(ParseErrorKind::MalformedNumber, pos, format!("bad column count `{span}`")),
                }
            }
            "hline" => {
                if ctx == Ctx::Grid {
                    self.pending_hlines += 1;
                } else {
                    self.error(ParseErrorKind::UnexpectedAlignment, pos, "`\\hline` outside of a grid");
                }
            }
            "substack" | "xymatrix" => {
                let kind = if name == "substack" { GridKind::Substack } else { GridKind::Xymatrix };
                self.skip_spaces();
                if self.peek_cat(CatCode::BeginGroup) {
                    self.pos += 1;
                    let grid = self.parse_grid(kind, Mode::Math, None, pos);
                    cell.push(MathAtom::new(InsetMath::Grid(grid)));
                } else {
                    self.error(ParseErrorKind::UnexpectedEnd, pos, format!("`\\{name}` needs a group"));
                }
            }
            "backslash" => cell.push(MathAtom::new(InsetMath::char('\\'))),
            _ => return self.parse_named(name, pos, cell, mode, ctx),
        }
        None
    }

    /// Commands recognized through the node and symbol tables
    ///
    /// Returns `Some(Some(end))` when the command consumed the rest of the
    /// sequence.
    fn parse_named(
        &mut self,
        name: &str,
        pos: usize,
        cell: &mut MathData,
        mode: Mode,
        ctx: Ctx,
    ) -> Option<End> {
        if let Some(c) = symbols::escaped_char(name) {
            cell.push(MathAtom::new(InsetMath::char(c)));
        } else if let Some(kind) = SpaceKind::from_name(name) {
            cell.push(MathAtom::new(InsetMath::Space(SpaceInset::new(kind))));
        } else if let Some(kind) = TemplateKind::from_name(name) {
            self.parse_macro_template(kind, pos, cell);
        } else if let Some(kind) = RefKind::from_name(name) {
            let target = self.read_braced_text().unwrap_or_default();
            cell.push(MathAtom::new(InsetMath::Ref(RefInset { kind, target })));
        } else if let Some(kind) = FracKind::from_name(name) {
            if kind.is_infix() {
                let num = cell.take();
                let (den, end) = self.parse_rest(mode, ctx);
                cell.push(MathAtom::new(InsetMath::Frac(FracInset::new(kind, num, den))));
                return end;
            }
            let first = self.parse_arg(Mode::Math);
            let second = self.parse_arg(Mode::Math);
            cell.push(MathAtom::new(InsetMath::Frac(FracInset::new(kind, first, second))));
        } else if symbols::is_big_name(name) {
            let delim = self.read_delim(pos);
            cell.push(MathAtom::new(InsetMath::BigDelim(BigDelimInset {
                size: name.to_string(),
                delim,
            })));
        } else if FontInset::is_font_name(name) {
            let inner = if FontInset::is_text_font_name(name) { Mode::Text } else { Mode::Math };
            let content = self.parse_arg(inner);
            cell.push(MathAtom::new(InsetMath::Font(FontInset {
                name: name.to_string(),
                cell: content,
            })));
        } else if BoxInset::is_box_name(name) {
            while self.read_optional_text().is_some() {}
            let inner = if name == "boxed" { Mode::Math } else { Mode::Text };
            let content = self.parse_arg(inner);
            cell.push(MathAtom::new(InsetMath::Box(BoxInset {
                name: name.to_string(),
                cell: content,
            })));
        } else if DecorationInset::is_decoration_name(name) {
            let content = self.parse_arg(Mode::Math);
            cell.push(MathAtom::new(InsetMath::Decoration(DecorationInset {
                name: name.to_string(),
                cell: content,
            })));
        } else if PhantomInset::is_phantom_name(name) {
            let content = self.parse_arg(mode);
            cell.push(MathAtom::new(InsetMath::Phantom(PhantomInset {
                name: name.to_string(),
                cell: content,
            })));
        } else if symbols::is_symbol(name) {
            cell.push(MathAtom::new(InsetMath::symbol(name)));
        } else if let Some(def) = self.lookup_macro(name) {
            self.parse_macro_instance(name, &def, mode, cell);
        } else {
            cell.push(MathAtom::new(InsetMath::unknown(name, true)));
        }
        None
    }

    fn parse_macro_instance(&mut self, name: &str, def: &MacroData, mode: Mode, cell: &mut MathData) {
        let mut args = Vec::with_capacity(def.arity());
        let mut optional = Vec::with_capacity(def.arity());
        for idx in 0..def.arity() {
            if def.is_optional(idx) {
                args.push(self.parse_optional(mode).unwrap_or_default());
                optional.push(true);
            } else {
                args.push(self.parse_arg(mode));
                optional.push(false);
            }
        }
        cell.push(MathAtom::new(InsetMath::Macro(MacroInset::with_args(name, args, optional))));
    }

    // =========================================================================
    // Macro definitions
    // =========================================================================

    fn read_defined_name(&mut self, kind: TemplateKind, pos: usize) -> Option<String> {
        self.skip_spaces();
        let braced = kind != TemplateKind::Def && self.peek_cat(CatCode::BeginGroup);
        if braced {
            self.pos += 1;
            self.skip_spaces();
        }
        let name = match self.next().map(|t| t.kind) {
            Some(TokenKind::ControlSeq(name)) if !name.is_empty() => name,
            _ => {
                self.error(ParseErrorKind::MalformedDefinition, pos, "macro name expected");
                return None;
            }
        };
        if braced {
            self.skip_spaces();
            if self.peek_cat(CatCode::EndGroup) {
                self.pos += 1;
            } else {
                self.error(ParseErrorKind::MalformedDefinition, pos, "missing `}` after macro name");
            }
        }
        Some(name)
    }

    fn parse_macro_template(&mut self, kind: TemplateKind, pos: usize, cell: &mut MathData) {
        let Some(name) = self.read_defined_name(kind, pos) else {
            return;
        };
        let mut optional_at = Vec::new();
        let mut defaults: Vec<(usize, MathData)> = Vec::new();

        if kind == TemplateKind::Def {
            loop {
                self.skip_spaces();
                if !self.peek_cat(CatCode::Param) {
                    break;
                }
                self.pos += 1;
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                optional_at.push(false);
            }
        } else {
            let arity = match self.read_optional_text() {
                Some(text) => text.trim().parse::<usize>().unwrap_or_else(|_| {
                    self.error(ParseErrorKind::MalformedNumber, pos, format!("bad argument count `{text}`"));
                    0
                }),
                None => 0,
            };
            optional_at = vec![false; arity.min(MAX_ARGS)];
            if kind == TemplateKind::NewCommandX {
                if let Some(spec) = self.read_optional_text() {
                    for part in split_top_level(&spec, ',') {
                        let Some((key, value)) = part.split_once('=') else {
                            continue;
                        };
                        match key.trim().parse::<usize>() {
                            Ok(n) if (1..=optional_at.len()).contains(&n) => {
                                optional_at[n - 1] = true;
                                let value = Parser::new(value, self.outer, ParseFlags::quiet()).parse().data;
                                defaults.push((n - 1, value));
                            }
                            _ => {}
                        }
                    }
                }
            } else if !optional_at.is_empty() {
                if let Some(default) = self.parse_optional(Mode::Math) {
                    optional_at[0] = true;
                    defaults.push((0, default));
                }
            }
        }

        let body = self.parse_arg(Mode::Math);
        defaults.sort_by_key(|(idx, _)| *idx);
        let template = MacroTemplate::from_parts(
            kind,
            &name,
            optional_at,
            defaults.into_iter().map(|(_, d)| d).collect(),
            body,
            MathData::new(),
        );
        self.defined.insert(&name, template.to_macro_data());
        cell.push(MathAtom::new(InsetMath::MacroTemplate(template)));
    }

    // =========================================================================
    // Environments and grids
    // =========================================================================

    fn parse_env(&mut self, pos: usize, cell: &mut MathData, mode: Mode) {
        let Some(name) = self.read_braced_text() else {
            self.error(ParseErrorKind::MismatchedEnvironment, pos, "`\\begin` without name");
            return;
        };

        if let Some(hull_type) = HullType::from_env_name(&name) {
            if matches!(hull_type, HullType::AlignAt | HullType::XAlignAt | HullType::XXAlignAt) {
                self.read_braced_text();
            }
            let grid = self.parse_grid(GridKind::HullBody, Mode::Math, Some(&name), pos);
            let mut hull = HullInset::from_grid(hull_type, grid);
            if name.ends_with('*') {
                hull.set_all_numbered(false);
            }
            hull.extract_row_metadata();
            cell.push(MathAtom::new(InsetMath::Hull(hull)));
            return;
        }

        if let Some(mut kind) = GridKind::from_env_name(&name) {
            let mut v_align = None;
            let mut spec = None;
            match kind {
                GridKind::Array | GridKind::Tabular => {
                    v_align = self.read_optional_text().and_then(|t| t.trim().chars().next());
                    spec = self.read_braced_text();
                }
                GridKind::AlignedAt(_) => {
                    let n = self
                        .read_braced_text()
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or(1);
                    kind = GridKind::AlignedAt(n);
                }
                _ => {}
            }
            let cell_mode = if kind == GridKind::Tabular { Mode::Text } else { Mode::Math };
            let mut grid = self.parse_grid(kind, cell_mode, Some(&name), pos);
            if let Some(spec) = spec {
                grid.set_col_spec(&spec);
            }
            grid.set_v_align(v_align);
            cell.push(MathAtom::new(InsetMath::Grid(grid)));
            return;
        }

        let mut grid = self.parse_grid(GridKind::HullBody, mode, Some(&name), pos);
        if grid.nrows() == 1 && grid.ncols() == 1 {
            let content = grid.cell_at_mut(0, 0).map(MathData::take).unwrap_or_default();
            cell.push(MathAtom::new(InsetMath::Env(EnvInset { name, cell: content })));
        } else {
            cell.push(MathAtom::new(InsetMath::Hull(HullInset::unknown(&name, grid))));
        }
    }

    /// Read rows of `&`-separated cells up to `\end{env}`, or up to `}` for
    /// the command forms
    fn parse_grid(&mut self, kind: GridKind, mode: Mode, env: Option<&str>, pos: usize) -> GridInset {
        let saved_lines = std::mem::take(&mut self.pending_hlines);
        let saved_multi = self.pending_multicolumn.take();

        let mut rows: Vec<Vec<(MathData, Option<(usize, String)>)>> = vec![Vec::new()];
        let mut lines = vec![0usize];
        let mut skips: Vec<Option<String>> = vec![None];
        loop {
            let (content, end) = self.parse_seq(mode, Ctx::Grid);
            let row = rows.len() - 1;
            let hlines = std::mem::take(&mut self.pending_hlines);
            if rows[row].is_empty() {
                lines[row] += hlines;
            }
            let multi = self.pending_multicolumn.take();
            rows[row].push((content, multi));
            match end {
                End::Amp => {}
                End::RowBreak(skip) => {
                    skips[row] = skip;
                    rows.push(Vec::new());
                    lines.push(0);
                    skips.push(None);
                }
                End::EndEnv(name) => {
                    if Some(name.as_str()) != env {
                        self.error(
                            ParseErrorKind::MismatchedEnvironment,
                            pos,
                            format!("`\\end{{{name}}}` closes `{}`", env.unwrap_or("group")),
                        );
                    }
                    break;
                }
                End::CloseBrace if env.is_none() => break,
                End::Eof => {
                    let kind = if env.is_some() {
                        ParseErrorKind::MismatchedEnvironment
                    } else {
                        ParseErrorKind::UnmatchedBrace
                    };
                    self.error(kind, pos, format!("`{}` not closed", env.unwrap_or(kind_name(kind))));
                    break;
                }
                _ => {
                    self.error(ParseErrorKind::Unexpected, pos, "unexpected token in grid");
                    break;
                }
            }
        }

        // a final `\\` opens a row that only carries rules
        let mut bottom = 0;
        if rows.len() > 1 {
            let last = &rows[rows.len() - 1];
            if last.len() == 1 && last[0].0.is_empty() && last[0].1.is_none() {
                rows.pop();
                skips.pop();
                bottom = lines.pop().unwrap_or(0);
            }
        }

        let span = |m: &Option<(usize, String)>| m.as_ref().map_or(1, |(n, _)| (*n).max(1));
        let ncols = rows
            .iter()
            .map(|r| r.iter().map(|(_, m)| span(m)).sum::<usize>())
            .max()
            .unwrap_or(1);
        let mut grid = GridInset::new(kind, rows.len(), ncols);
        for (r, row) in rows.into_iter().enumerate() {
            let mut col = 0;
            for (content, multi) in row {
                if col >= ncols {
                    break;
                }
                if let Some(target) = grid.cell_at_mut(r, col) {
                    *target = content;
                }
                match multi {
                    Some((n, align)) => {
                        grid.set_multicolumn(r, col, n, &align);
                        col += n.max(1);
                    }
                    None => col += 1,
                }
            }
            if let Some(info) = grid.row_info_mut(r) {
                info.lines = lines[r];
                info.skip = skips[r].take();
            }
        }
        grid.set_bottom_lines(bottom);

        self.pending_hlines = saved_lines;
        self.pending_multicolumn = saved_multi;
        grid
    }
}

fn kind_name(kind: ParseErrorKind) -> &'static str {
    match kind {
        ParseErrorKind::UnmatchedBrace => "{",
        _ => "environment",
    }
}

/// Split `text` at `sep` outside of braces
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
