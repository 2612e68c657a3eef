//! Computer-algebra passthrough
//!
//! Sends a formula to an external program and reads the answer back. When
//! the program reports a syntax error at some column, a `*` is inserted
//! there (the usual culprit is an implicit product such as `2x`) and the
//! call is retried a few times before giving up.

use crate::error::{MathError, MathResult};
use regex_lite::Regex;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Attempts before the passthrough gives up
pub const MAX_ATTEMPTS: usize = 3;

/// One answer from the external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasReply {
    /// The computed result
    Output(String),
    /// The input was rejected at this character column (zero-based)
    SyntaxError { column: usize },
}

/// Something that evaluates formulas
pub trait CasRunner {
    fn run(&self, input: &str) -> MathResult<CasReply>;
}

/// An external program fed on stdin
#[derive(Debug, Clone)]
pub struct Subprocess {
    pub program: String,
    pub args: Vec<String>,
}

impl Subprocess {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl CasRunner for Subprocess {
    fn run(&self, input: &str) -> MathResult<CasReply> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Some(column) = error_column(&stdout).or_else(|| error_column(&stderr)) {
            return Ok(CasReply::SyntaxError { column });
        }
        if !output.status.success() {
            return Err(MathError::ExternalTool(format!(
                "`{}` exited with {}",
                self.program, output.status
            )));
        }
        Ok(CasReply::Output(stdout.trim().to_string()))
    }
}

/// Find the column of a reported syntax error
///
/// Understands `... column N` messages and the caret line printed under an
/// echoed input.
pub fn error_column(report: &str) -> Option<usize> {
    static COLUMN: OnceLock<Option<Regex>> = OnceLock::new();
    let lower = report.to_lowercase();
    if !lower.contains("syntax") {
        return None;
    }
    let column = COLUMN.get_or_init(|| Regex::new(r"column\s+(\d+)").ok());
    if let Some(caps) = column.as_ref().and_then(|re| re.captures(&lower)) {
        return caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    report.lines().find_map(|line| {
        let trimmed = line.trim_end();
        (trimmed.ends_with('^') && trimmed.trim_start() == "^").then(|| trimmed.len() - 1)
    })
}

/// Evaluate `input`, repairing syntax errors by inserting `*`
///
/// Returns an empty string on any failure; callers insert nothing then.
pub fn evaluate(runner: &dyn CasRunner, input: &str) -> String {
    match try_evaluate(runner, input) {
        Ok(out) => out,
        Err(err) => {
            warn!(%err, "computer algebra passthrough failed");
            String::new()
        }
    }
}

/// Like [`evaluate`], reporting why it failed
pub fn try_evaluate(runner: &dyn CasRunner, input: &str) -> MathResult<String> {
    let mut text = input.to_string();
    for attempt in 1..=MAX_ATTEMPTS {
        match runner.run(&text)? {
            CasReply::Output(out) => return Ok(out),
            CasReply::SyntaxError { column } => {
                let at = text
                    .char_indices()
                    .nth(column)
                    .map_or(text.len(), |(i, _)| i);
                if at == 0 {
                    break;
                }
                text.insert(at, '*');
                debug!(attempt, column, %text, "retrying with inserted product");
            }
        }
    }
    Err(MathError::ExternalTool(format!("could not repair `{input}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Rejects any input where a digit is directly followed by a letter
    struct Strict {
        seen: RefCell<Vec<String>>,
    }

    impl Strict {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CasRunner for Strict {
        fn run(&self, input: &str) -> MathResult<CasReply> {
            self.seen.borrow_mut().push(input.to_string());
            let chars: Vec<char> = input.chars().collect();
            for i in 1..chars.len() {
                if chars[i - 1].is_ascii_digit() && chars[i].is_ascii_alphabetic() {
                    return Ok(CasReply::SyntaxError { column: i });
                }
            }
            Ok(CasReply::Output(format!("ok:{input}")))
        }
    }

    #[test]
    fn test_repairs_implicit_product() {
        let runner = Strict::new();
        assert_eq!(evaluate(&runner, "2x+3y"), "ok:2*x+3*y");
        assert_eq!(runner.seen.borrow().len(), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let runner = Strict::new();
        assert_eq!(evaluate(&runner, "1a2b3c4d"), "");
        assert_eq!(runner.seen.borrow().len(), MAX_ATTEMPTS);
    }

    #[test]
    fn test_error_column_forms() {
        assert_eq!(error_column("incorrect syntax: column 4"), Some(4));
        assert_eq!(error_column("2x+1\n ^\nincorrect syntax"), Some(1));
        assert_eq!(error_column("all fine"), None);
    }

    #[test]
    fn test_missing_program_is_empty_result() {
        let runner = Subprocess::new("this-program-does-not-exist-anywhere", &[]);
        assert_eq!(evaluate(&runner, "1+1"), "");
    }
}
