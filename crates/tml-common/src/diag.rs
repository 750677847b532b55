//! Diagnostics with stable short codes.
//!
//! Every user-visible failure in the compiler carries a short code (`T057`,
//! `C019`, `L003`, ...) that stays stable across releases so that
//! `tml explain <code>` and external tooling can key on it. Diagnostics are
//! accumulated per phase in a [`DiagnosticBag`]; a phase that ends with a
//! non-empty error count aborts the pipeline before the next phase starts.

use std::fmt;
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::span::{LineIndex, Span};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic: severity, stable short code, message, and span.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    /// Stable short code, e.g. `T057`. Codes are never reused or renumbered.
    pub code: String,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            level: Level::Error,
            code: code.into(),
            message: message.into(),
            span,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            level: Level::Warning,
            code: code.into(),
            message: message.into(),
            span,
        }
    }

    /// Render as `level: code: message` with the offending line and a caret.
    ///
    /// This is the plain-text form used in tests and non-tty output. The CLI
    /// boundary uses [`render_report`] for the ariadne version.
    pub fn render_plain(&self, source: &str, file_name: &str) -> String {
        let mut out = format!("{}: {}: {}\n", self.level, self.code, self.message);
        let index = LineIndex::new(source);
        let (line, col) = index.line_col(self.span.start);
        out.push_str(&format!("  --> {}:{}:{}\n", file_name, line, col));
        if let Some((start, end)) = index.line_range(line) {
            let end = (end as usize).min(source.len());
            let text = &source[start as usize..end];
            out.push_str(&format!("   | {}\n", text));
            let caret_len = (self.span.len().max(1) as usize).min(text.len().max(1));
            out.push_str(&format!(
                "   | {}{}\n",
                " ".repeat(col as usize - 1),
                "^".repeat(caret_len)
            ));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.level, self.code, self.message)
    }
}

/// Render a diagnostic as an ariadne report to stderr.
pub fn render_report(diag: &Diagnostic, source: &str, _file_name: &str) {
    let kind = match diag.level {
        Level::Error => ReportKind::Error,
        Level::Warning => ReportKind::Warning,
        Level::Note => ReportKind::Advice,
    };
    let start = diag.span.start as usize;
    let end = (diag.span.end as usize).max(start + 1).min(source.len().max(start + 1));
    let range: Range<usize> = start..end;
    let _ = Report::<Range<usize>>::build(kind, range.clone())
        .with_code(diag.code.clone())
        .with_message(&diag.message)
        .with_label(Label::new(range).with_message(&diag.message))
        .with_config(Config::default())
        .finish()
        .eprint(Source::from(source));
}

/// Accumulates diagnostics for one phase.
///
/// The checker does not stop at the first error; it records everything it
/// finds and the driver decides, per phase, whether to continue.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error(&mut self, code: impl Into<String>, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::error(code, message, span));
    }

    pub fn warning(&mut self, code: impl Into<String>, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::warning(code, message, span));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Move all diagnostics out of another bag into this one.
    pub fn absorb(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rendering_has_code_and_caret() {
        let source = "let x: I8 = foo()\n";
        let diag = Diagnostic::error("T057", "type mismatch: expected I8, found Str", Span::new(12, 17));
        let rendered = diag.render_plain(source, "main.tml");
        assert!(rendered.starts_with("error: T057: type mismatch"));
        assert!(rendered.contains("main.tml:1:13"));
        assert!(rendered.contains("^^^^^"));
    }

    #[test]
    fn bag_counts_only_errors() {
        let mut bag = DiagnosticBag::new();
        bag.error("T057", "mismatch", Span::dummy());
        bag.warning("W001", "unused", Span::dummy());
        assert_eq!(bag.error_count(), 1);
        assert!(bag.has_errors());
    }
}
