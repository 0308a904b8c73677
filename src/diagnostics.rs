use std::fmt;

use thiserror::Error;

/// Phase-level failure reported by the driver once a pass has collected
/// errors. The individual diagnostics have already been printed by then.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lexical analysis failed with {0} error(s)")]
    Lex(usize),
    #[error("syntax analysis failed with {0} error(s)")]
    Parse(usize),
    #[error("semantic analysis failed with {0} error(s)")]
    Semantic(usize),
    #[error("code generation failed with {0} error(s)")]
    Codegen(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single message tied to a source line. `line` 0 means the message has no
/// useful position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
    phase: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "{} error", self.phase)?,
            Severity::Warning => write!(f, "Warning")?,
        }
        if self.line > 0 {
            write!(f, " at line {}", self.line)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Append-only sink owned by one pass. Diagnostics keep the order in which
/// the pass discovered them, which for every pass matches source order.
#[derive(Debug)]
pub struct Diagnostics {
    phase: &'static str,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            items: Vec::new(),
        }
    }

    pub fn error(&mut self, line: u32, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            line,
            message: message.into(),
            phase: self.phase,
        });
    }

    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            line,
            message: message.into(),
            phase: self.phase,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.severity == Severity::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn eprint_all(&self) {
        for item in &self.items {
            eprintln!("{item}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_and_warnings_are_kept_in_order() {
        let mut diagnostics = Diagnostics::new("Semantic");
        diagnostics.warning(1, "first");
        diagnostics.error(2, "second");
        diagnostics.error(4, "third");

        let rendered: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "Warning at line 1: first",
                "Semantic error at line 2: second",
                "Semantic error at line 4: third",
            ]
        );
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 2);
    }

    #[test]
    fn warnings_alone_do_not_count_as_errors() {
        let mut diagnostics = Diagnostics::new("Semantic");
        diagnostics.warning(3, "only a warning");
        assert!(!diagnostics.has_errors());
        assert!(!diagnostics.is_empty());
    }
}
