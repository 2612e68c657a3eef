//! Output streams for serializing the math tree
//!
//! [`WriteStream`] produces LaTeX that the parser reads back. [`NormalStream`]
//! produces a bracketed canonical form used to compare trees in tests and
//! diagnostics.

/// LaTeX writer
///
/// Tracks whether the last thing written was a control word so that a
/// following letter gets a separating space (`\alpha b`, not `\alphab`).
#[derive(Debug, Default)]
pub struct WriteStream {
    out: String,
    pending_space: bool,
    line_start: bool,
}

impl WriteStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_space(&mut self, next: char) {
        if self.pending_space && (next.is_ascii_alphabetic() || next == '@') {
            self.out.push(' ');
        }
        self.pending_space = false;
    }

    /// Write a control sequence `\name`
    pub fn cs(&mut self, name: &str) {
        self.flush_space('\\');
        self.out.push('\\');
        self.out.push_str(name);
        self.pending_space = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic());
        self.line_start = false;
    }

    /// Write literal text
    pub fn text(&mut self, text: &str) {
        if let Some(first) = text.chars().next() {
            self.flush_space(first);
            self.out.push_str(text);
            self.line_start = false;
        }
    }

    /// Write text that a following letter must not run into, like a unit
    pub fn word(&mut self, text: &str) {
        self.text(text);
        self.pending_space = text.ends_with(|c: char| c.is_ascii_alphabetic());
    }

    /// Write one character
    pub fn ch(&mut self, c: char) {
        self.flush_space(c);
        self.out.push(c);
        self.line_start = false;
    }

    /// Write `{text}`
    pub fn braced(&mut self, text: &str) {
        self.ch('{');
        self.text(text);
        self.ch('}');
    }

    /// Start a new line unless already at the start of one
    pub fn newline(&mut self) {
        if !self.line_start && !self.out.is_empty() {
            self.out.push('\n');
        }
        self.pending_space = false;
        self.line_start = true;
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Canonical bracketed writer
#[derive(Debug, Default)]
pub struct NormalStream {
    out: String,
    need_sep: bool,
}

impl NormalStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn sep(&mut self) {
        if self.need_sep {
            self.out.push(' ');
        }
    }

    /// Open a group `[name`
    pub fn open(&mut self, name: &str) {
        self.sep();
        self.out.push('[');
        self.out.push_str(name);
        self.need_sep = true;
    }

    /// Close the innermost group
    pub fn close(&mut self) {
        self.out.push(']');
        self.need_sep = true;
    }

    /// Write a bare word inside the current group
    pub fn word(&mut self, word: &str) {
        self.sep();
        self.out.push_str(word);
        self.need_sep = true;
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_after_control_word() {
        let mut ws = WriteStream::new();
        ws.cs("alpha");
        ws.ch('b');
        ws.cs("beta");
        ws.ch('2');
        ws.cs(",");
        ws.ch('x');
        assert_eq!(ws.finish(), "\\alpha b\\beta2\\,x");
    }

    #[test]
    fn test_braced() {
        let mut ws = WriteStream::new();
        ws.cs("label");
        ws.braced("eq:1");
        assert_eq!(ws.finish(), "\\label{eq:1}");
    }

    #[test]
    fn test_newline_not_doubled() {
        let mut ws = WriteStream::new();
        ws.text("a");
        ws.newline();
        ws.newline();
        ws.text("b");
        assert_eq!(ws.finish(), "a\nb");
    }

    #[test]
    fn test_normal_stream_nesting() {
        let mut ns = NormalStream::new();
        ns.open("frac");
        ns.open("par");
        ns.word("1");
        ns.close();
        ns.close();
        assert_eq!(ns.finish(), "[frac [par 1]]");
    }
}
