//! Built-in symbol table
//!
//! Names that stand for a single glyph: Greek letters, operators, relations,
//! arrows, large operators, delimiters and named functions.

use std::collections::HashMap;
use std::sync::OnceLock;

/// TeX atom class of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    /// Ordinary symbol or variable
    Ord,
    /// Binary operator
    Bin,
    /// Relation
    Rel,
    /// Large operator (`\sum`, `\int`)
    Op,
    /// Named function set upright (`\sin`, `\lim`)
    Fun,
    /// Opening delimiter
    Open,
    /// Closing delimiter
    Close,
    /// Punctuation
    Punct,
}

impl SymbolClass {
    /// Name used in the normalized form
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolClass::Ord => "mathord",
            SymbolClass::Bin => "mathbin",
            SymbolClass::Rel => "mathrel",
            SymbolClass::Op => "mathop",
            SymbolClass::Fun => "mathfun",
            SymbolClass::Open => "mathopen",
            SymbolClass::Close => "mathclose",
            SymbolClass::Punct => "mathpunct",
        }
    }
}

/// One entry of the symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: &'static str,
    /// Glyph shown on screen
    pub glyph: &'static str,
    pub class: SymbolClass,
    /// Scripts go above and below in display style
    pub limits: bool,
    /// Usable as a `\left`/`\right`/`\big` delimiter
    pub delimiter: bool,
}

const fn sym(name: &'static str, glyph: &'static str, class: SymbolClass) -> SymbolInfo {
    SymbolInfo {
        name,
        glyph,
        class,
        limits: false,
        delimiter: false,
    }
}

const fn op(name: &'static str, glyph: &'static str, limits: bool) -> SymbolInfo {
    SymbolInfo {
        name,
        glyph,
        class: SymbolClass::Op,
        limits,
        delimiter: false,
    }
}

const fn fun(name: &'static str, limits: bool) -> SymbolInfo {
    SymbolInfo {
        name,
        glyph: name,
        class: SymbolClass::Fun,
        limits,
        delimiter: false,
    }
}

const fn delim(name: &'static str, glyph: &'static str, class: SymbolClass) -> SymbolInfo {
    SymbolInfo {
        name,
        glyph,
        class,
        limits: false,
        delimiter: true,
    }
}

use SymbolClass::*;

static SYMBOLS: &[SymbolInfo] = &[
    // Greek lowercase
    sym("alpha", "\u{03B1}", Ord),
    sym("beta", "\u{03B2}", Ord),
    sym("gamma", "\u{03B3}", Ord),
    sym("delta", "\u{03B4}", Ord),
    sym("epsilon", "\u{03F5}", Ord),
    sym("varepsilon", "\u{03B5}", Ord),
    sym("zeta", "\u{03B6}", Ord),
    sym("eta", "\u{03B7}", Ord),
    sym("theta", "\u{03B8}", Ord),
    sym("vartheta", "\u{03D1}", Ord),
    sym("iota", "\u{03B9}", Ord),
    sym("kappa", "\u{03BA}", Ord),
    sym("lambda", "\u{03BB}", Ord),
    sym("mu", "\u{03BC}", Ord),
    sym("nu", "\u{03BD}", Ord),
    sym("xi", "\u{03BE}", Ord),
    sym("pi", "\u{03C0}", Ord),
    sym("varpi", "\u{03D6}", Ord),
    sym("rho", "\u{03C1}", Ord),
    sym("varrho", "\u{03F1}", Ord),
    sym("sigma", "\u{03C3}", Ord),
    sym("varsigma", "\u{03C2}", Ord),
    sym("tau", "\u{03C4}", Ord),
    sym("upsilon", "\u{03C5}", Ord),
    sym("phi", "\u{03D5}", Ord),
    sym("varphi", "\u{03C6}", Ord),
    sym("chi", "\u{03C7}", Ord),
    sym("psi", "\u{03C8}", Ord),
    sym("omega", "\u{03C9}", Ord),
    // Greek uppercase
    sym("Gamma", "\u{0393}", Ord),
    sym("Delta", "\u{0394}", Ord),
    sym("Theta", "\u{0398}", Ord),
    sym("Lambda", "\u{039B}", Ord),
    sym("Xi", "\u{039E}", Ord),
    sym("Pi", "\u{03A0}", Ord),
    sym("Sigma", "\u{03A3}", Ord),
    sym("Upsilon", "\u{03A5}", Ord),
    sym("Phi", "\u{03A6}", Ord),
    sym("Psi", "\u{03A8}", Ord),
    sym("Omega", "\u{03A9}", Ord),
    // Miscellaneous ordinary symbols
    sym("infty", "\u{221E}", Ord),
    sym("partial", "\u{2202}", Ord),
    sym("nabla", "\u{2207}", Ord),
    sym("forall", "\u{2200}", Ord),
    sym("exists", "\u{2203}", Ord),
    sym("emptyset", "\u{2205}", Ord),
    sym("ell", "\u{2113}", Ord),
    sym("hbar", "\u{210F}", Ord),
    sym("aleph", "\u{2135}", Ord),
    sym("prime", "\u{2032}", Ord),
    sym("neg", "\u{00AC}", Ord),
    sym("ldots", "\u{2026}", Ord),
    sym("cdots", "\u{22EF}", Ord),
    sym("vdots", "\u{22EE}", Ord),
    sym("ddots", "\u{22F1}", Ord),
    // Binary operators
    sym("pm", "\u{00B1}", Bin),
    sym("mp", "\u{2213}", Bin),
    sym("times", "\u{00D7}", Bin),
    sym("div", "\u{00F7}", Bin),
    sym("cdot", "\u{22C5}", Bin),
    sym("ast", "\u{2217}", Bin),
    sym("star", "\u{22C6}", Bin),
    sym("circ", "\u{2218}", Bin),
    sym("bullet", "\u{2219}", Bin),
    sym("cap", "\u{2229}", Bin),
    sym("cup", "\u{222A}", Bin),
    sym("wedge", "\u{2227}", Bin),
    sym("vee", "\u{2228}", Bin),
    sym("oplus", "\u{2295}", Bin),
    sym("otimes", "\u{2297}", Bin),
    sym("setminus", "\u{2216}", Bin),
    // Relations
    sym("leq", "\u{2264}", Rel),
    sym("le", "\u{2264}", Rel),
    sym("geq", "\u{2265}", Rel),
    sym("ge", "\u{2265}", Rel),
    sym("neq", "\u{2260}", Rel),
    sym("ne", "\u{2260}", Rel),
    sym("equiv", "\u{2261}", Rel),
    sym("approx", "\u{2248}", Rel),
    sym("sim", "\u{223C}", Rel),
    sym("simeq", "\u{2243}", Rel),
    sym("cong", "\u{2245}", Rel),
    sym("propto", "\u{221D}", Rel),
    sym("ll", "\u{226A}", Rel),
    sym("gg", "\u{226B}", Rel),
    sym("in", "\u{2208}", Rel),
    sym("notin", "\u{2209}", Rel),
    sym("ni", "\u{220B}", Rel),
    sym("subset", "\u{2282}", Rel),
    sym("supset", "\u{2283}", Rel),
    sym("subseteq", "\u{2286}", Rel),
    sym("supseteq", "\u{2287}", Rel),
    sym("perp", "\u{22A5}", Rel),
    sym("mid", "\u{2223}", Rel),
    sym("parallel", "\u{2225}", Rel),
    sym("to", "\u{2192}", Rel),
    sym("rightarrow", "\u{2192}", Rel),
    sym("leftarrow", "\u{2190}", Rel),
    sym("gets", "\u{2190}", Rel),
    sym("leftrightarrow", "\u{2194}", Rel),
    sym("Rightarrow", "\u{21D2}", Rel),
    sym("Leftarrow", "\u{21D0}", Rel),
    sym("Leftrightarrow", "\u{21D4}", Rel),
    sym("implies", "\u{27F9}", Rel),
    sym("iff", "\u{27FA}", Rel),
    sym("mapsto", "\u{21A6}", Rel),
    sym("longrightarrow", "\u{27F6}", Rel),
    sym("longleftarrow", "\u{27F5}", Rel),
    // Punctuation
    sym("colon", ":", Punct),
    // Large operators
    op("sum", "\u{2211}", true),
    op("prod", "\u{220F}", true),
    op("coprod", "\u{2210}", true),
    op("bigcup", "\u{22C3}", true),
    op("bigcap", "\u{22C2}", true),
    op("bigoplus", "\u{2A01}", true),
    op("bigotimes", "\u{2A02}", true),
    op("int", "\u{222B}", false),
    op("iint", "\u{222C}", false),
    op("iiint", "\u{222D}", false),
    op("oint", "\u{222E}", false),
    // Named functions
    fun("sin", false),
    fun("cos", false),
    fun("tan", false),
    fun("cot", false),
    fun("sec", false),
    fun("csc", false),
    fun("arcsin", false),
    fun("arccos", false),
    fun("arctan", false),
    fun("sinh", false),
    fun("cosh", false),
    fun("tanh", false),
    fun("log", false),
    fun("ln", false),
    fun("lg", false),
    fun("exp", false),
    fun("det", true),
    fun("dim", false),
    fun("ker", false),
    fun("deg", false),
    fun("arg", false),
    fun("gcd", true),
    fun("lim", true),
    fun("liminf", true),
    fun("limsup", true),
    fun("max", true),
    fun("min", true),
    fun("sup", true),
    fun("inf", true),
    fun("Pr", true),
    // Delimiters
    delim("langle", "\u{27E8}", Open),
    delim("rangle", "\u{27E9}", Close),
    delim("lfloor", "\u{230A}", Open),
    delim("rfloor", "\u{230B}", Close),
    delim("lceil", "\u{2308}", Open),
    delim("rceil", "\u{2309}", Close),
    delim("lvert", "|", Open),
    delim("rvert", "|", Close),
    delim("lVert", "\u{2016}", Open),
    delim("rVert", "\u{2016}", Close),
    delim("vert", "|", Ord),
    delim("Vert", "\u{2016}", Ord),
    delim("uparrow", "\u{2191}", Rel),
    delim("downarrow", "\u{2193}", Rel),
    delim("updownarrow", "\u{2195}", Rel),
    delim("backslash", "\\", Ord),
];

fn table() -> &'static HashMap<&'static str, &'static SymbolInfo> {
    static TABLE: OnceLock<HashMap<&'static str, &'static SymbolInfo>> = OnceLock::new();
    TABLE.get_or_init(|| SYMBOLS.iter().map(|s| (s.name, s)).collect())
}

/// Look up a symbol by control-word name (without backslash)
pub fn lookup(name: &str) -> Option<&'static SymbolInfo> {
    table().get(name).copied()
}

/// Whether `name` is a known symbol
pub fn is_symbol(name: &str) -> bool {
    table().contains_key(name)
}

/// Class of a single character in math mode
pub fn char_class(c: char) -> SymbolClass {
    match c {
        '+' | '-' | '*' => SymbolClass::Bin,
        '=' | '<' | '>' => SymbolClass::Rel,
        '(' | '[' => SymbolClass::Open,
        ')' | ']' => SymbolClass::Close,
        ',' | ';' => SymbolClass::Punct,
        _ => SymbolClass::Ord,
    }
}

/// Escaped control symbols that stand for a literal character
pub fn escaped_char(name: &str) -> Option<char> {
    match name {
        "{" => Some('{'),
        "}" => Some('}'),
        "%" => Some('%'),
        "$" => Some('$'),
        "&" => Some('&'),
        "#" => Some('#'),
        "_" => Some('_'),
        _ => None,
    }
}

/// Whether `text` can follow `\left`, `\right` or `\bigl`
///
/// Accepts single delimiter characters, `.` for the null delimiter, the
/// escaped braces and the named delimiters of the table.
pub fn is_delimiter(text: &str) -> bool {
    match text {
        "(" | ")" | "[" | "]" | "|" | "/" | "." | "<" | ">" => true,
        "\\{" | "\\}" | "\\|" => true,
        _ => text
            .strip_prefix('\\')
            .and_then(lookup)
            .map(|s| s.delimiter)
            .unwrap_or(false),
    }
}

/// Sized delimiter prefixes: `\big`, `\Bigl`, `\biggr`, ...
pub fn is_big_name(name: &str) -> bool {
    let stem = name
        .strip_suffix('l')
        .or_else(|| name.strip_suffix('r'))
        .or_else(|| name.strip_suffix('m'))
        .unwrap_or(name);
    matches!(stem, "big" | "Big" | "bigg" | "Bigg")
}

/// Screen size factor of a sized delimiter
pub fn big_size(name: &str) -> f32 {
    if name.starts_with("Bigg") {
        2.9
    } else if name.starts_with("bigg") {
        2.35
    } else if name.starts_with("Big") {
        1.8
    } else {
        1.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        let alpha = lookup("alpha").unwrap();
        assert_eq!(alpha.glyph, "\u{03B1}");
        assert_eq!(alpha.class, SymbolClass::Ord);
        assert!(lookup("sum").unwrap().limits);
        assert!(!lookup("int").unwrap().limits);
        assert!(lookup("frac").is_none());
    }

    #[test]
    fn test_relations() {
        assert_eq!(lookup("leq").unwrap().class, SymbolClass::Rel);
        assert_eq!(char_class('='), SymbolClass::Rel);
        assert_eq!(char_class('+'), SymbolClass::Bin);
        assert_eq!(char_class('x'), SymbolClass::Ord);
    }

    #[test]
    fn test_delimiters() {
        assert!(is_delimiter("("));
        assert!(is_delimiter("."));
        assert!(is_delimiter("\\{"));
        assert!(is_delimiter("\\langle"));
        assert!(!is_delimiter("\\alpha"));
        assert!(!is_delimiter("x"));
    }

    #[test]
    fn test_big_names() {
        assert!(is_big_name("big"));
        assert!(is_big_name("Bigl"));
        assert!(is_big_name("biggr"));
        assert!(is_big_name("Biggm"));
        assert!(!is_big_name("bigcup"));
        assert!(!is_big_name("bigl2"));
        assert!(big_size("Bigg") > big_size("big"));
    }
}
