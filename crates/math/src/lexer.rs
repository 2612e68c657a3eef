//! Catcode lexer
//!
//! Splits LaTeX source into control sequences and categorized characters the
//! way TeX's eyes do: comments are dropped, runs of spaces collapse and the
//! spaces after a control word are skipped.

use serde::{Deserialize, Serialize};

// =============================================================================
// Category codes
// =============================================================================

/// TeX category of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatCode {
    /// `\`
    Escape,
    /// `{`
    BeginGroup,
    /// `}`
    EndGroup,
    /// `$`
    MathShift,
    /// `&`
    AlignTab,
    /// End of a line
    EndLine,
    /// `#`
    Param,
    /// `^`
    Superscript,
    /// `_`
    Subscript,
    /// Control characters that are dropped
    Ignore,
    Space,
    Letter,
    Other,
    /// `~`
    Active,
    /// `%`
    Comment,
}

/// Category of `c`
pub fn catcode(c: char) -> CatCode {
    match c {
        '\\' => CatCode::Escape,
        '{' => CatCode::BeginGroup,
        '}' => CatCode::EndGroup,
        '$' => CatCode::MathShift,
        '&' => CatCode::AlignTab,
        '\n' | '\r' => CatCode::EndLine,
        '#' => CatCode::Param,
        '^' => CatCode::Superscript,
        '_' => CatCode::Subscript,
        ' ' | '\t' => CatCode::Space,
        '~' => CatCode::Active,
        '%' => CatCode::Comment,
        c if c.is_ascii_alphabetic() => CatCode::Letter,
        c if c.is_control() => CatCode::Ignore,
        _ => CatCode::Other,
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// What a token is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `\name` or a control symbol such as `\,`; the name has no backslash
    ControlSeq(String),
    /// A character with its category
    Char(char, CatCode),
    /// A run of blanks, or one line end
    Space,
    /// An empty line
    Par,
}

/// One token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

impl Token {
    pub fn cat(&self) -> Option<CatCode> {
        match self.kind {
            TokenKind::Char(_, cat) => Some(cat),
            TokenKind::Space | TokenKind::Par => Some(CatCode::Space),
            TokenKind::ControlSeq(_) => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self.kind {
            TokenKind::Char(c, _) => Some(c),
            _ => None,
        }
    }

    pub fn is_char(&self, c: char) -> bool {
        self.as_char() == Some(c)
    }

    pub fn is_cs(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::ControlSeq(n) if n == name)
    }

    pub fn is_space(&self) -> bool {
        matches!(self.kind, TokenKind::Space | TokenKind::Par)
    }
}

/// Tokenizer over one source string
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// A control word was just read; following blanks are swallowed
    skip_blanks: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            skip_blanks: false,
        }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            self.chars.next();
            if catcode(c) == CatCode::EndLine {
                // the line end after a comment vanishes with it, as do the
                // leading blanks of the next line
                while matches!(self.chars.peek(), Some(&(_, c)) if catcode(c) == CatCode::Space) {
                    self.chars.next();
                }
                break;
            }
        }
    }

    /// Consume blanks and line ends; returns the number of line ends seen
    fn skip_white(&mut self) -> usize {
        let mut lines = 0;
        while let Some(&(_, c)) = self.chars.peek() {
            match catcode(c) {
                CatCode::Space => {}
                CatCode::EndLine => {
                    // \r\n counts once
                    if c == '\n' || !matches!(self.peek_second(), Some('\n')) {
                        lines += 1;
                    }
                }
                _ => break,
            }
            self.chars.next();
        }
        lines
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next().map(|(_, c)| c)
    }

    fn read_control(&mut self, start: usize) -> Token {
        let Some(&(i, c)) = self.chars.peek() else {
            return Token {
                kind: TokenKind::ControlSeq(String::new()),
                pos: start,
            };
        };
        self.chars.next();
        if catcode(c) != CatCode::Letter {
            self.skip_blanks = catcode(c) == CatCode::Space;
            let name = if catcode(c) == CatCode::EndLine { ' ' } else { c };
            return Token {
                kind: TokenKind::ControlSeq(name.to_string()),
                pos: start,
            };
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, d)) = self.chars.peek() {
            if catcode(d) != CatCode::Letter {
                break;
            }
            end = j + d.len_utf8();
            self.chars.next();
        }
        self.skip_blanks = true;
        Token {
            kind: TokenKind::ControlSeq(self.input[i..end].to_string()),
            pos: start,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let &(pos, c) = self.chars.peek()?;
            let cat = catcode(c);
            if self.skip_blanks {
                self.skip_blanks = false;
                if matches!(cat, CatCode::Space | CatCode::EndLine) {
                    let lines = self.skip_white();
                    if lines >= 2 {
                        return Some(Token { kind: TokenKind::Par, pos });
                    }
                    continue;
                }
            }
            match cat {
                CatCode::Comment => {
                    self.chars.next();
                    self.skip_comment();
                }
                CatCode::Ignore => {
                    self.chars.next();
                }
                CatCode::Space | CatCode::EndLine => {
                    let lines = self.skip_white();
                    let kind = if lines >= 2 { TokenKind::Par } else { TokenKind::Space };
                    return Some(Token { kind, pos });
                }
                CatCode::Escape => {
                    self.chars.next();
                    return Some(self.read_control(pos));
                }
                _ => {
                    self.chars.next();
                    return Some(Token {
                        kind: TokenKind::Char(c, cat),
                        pos,
                    });
                }
            }
        }
    }
}

/// Tokenize all of `input`
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    fn cs(name: &str) -> TokenKind {
        TokenKind::ControlSeq(name.to_string())
    }

    #[test]
    fn test_catcodes() {
        assert_eq!(catcode('\\'), CatCode::Escape);
        assert_eq!(catcode('a'), CatCode::Letter);
        assert_eq!(catcode('1'), CatCode::Other);
        assert_eq!(catcode('~'), CatCode::Active);
        assert_eq!(catcode('\u{3b1}'), CatCode::Other);
    }

    #[test]
    fn test_control_word_swallows_spaces() {
        assert_eq!(
            kinds("\\alpha  b"),
            vec![cs("alpha"), TokenKind::Char('b', CatCode::Letter)]
        );
    }

    #[test]
    fn test_control_symbol_keeps_spaces() {
        assert_eq!(
            kinds("\\, b"),
            vec![cs(","), TokenKind::Space, TokenKind::Char('b', CatCode::Letter)]
        );
        assert_eq!(kinds("\\ x")[0], cs(" "));
    }

    #[test]
    fn test_spaces_collapse() {
        assert_eq!(
            kinds("a   b"),
            vec![
                TokenKind::Char('a', CatCode::Letter),
                TokenKind::Space,
                TokenKind::Char('b', CatCode::Letter),
            ]
        );
    }

    #[test]
    fn test_comment_dropped() {
        assert_eq!(
            kinds("a% note\n  b"),
            vec![
                TokenKind::Char('a', CatCode::Letter),
                TokenKind::Char('b', CatCode::Letter),
            ]
        );
    }

    #[test]
    fn test_blank_line_is_par() {
        assert_eq!(kinds("a\n\nb")[1], TokenKind::Par);
        assert_eq!(kinds("a\r\nb")[1], TokenKind::Space);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("x^{\\beta}");
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 8]);
        assert!(tokens[3].is_cs("beta"));
        assert_eq!(tokens[1].cat(), Some(CatCode::Superscript));
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(kinds("a\\"), vec![TokenKind::Char('a', CatCode::Letter), cs("")]);
    }
}
