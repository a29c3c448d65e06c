//! Diagnostics: severities, source spans, and the append-only sink.
//!
//! Grounded on the teacher's `lint::Severity` (LSP-compatible severity enum)
//! generalized into the full diagnostic shape spec.md §6/§7 requires: a
//! severity, a primary span, zero or more secondary spans with labels, a
//! stable identifier, and a human message.

use std::fmt;

/// Byte-offset span into a single source file.
///
/// Mirrors the input artifact's span format from spec.md §6:
/// `(file-id, byte-offset-begin, byte-offset-end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file_id: u32,
    pub begin: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(file_id: u32, begin: u32, end: u32) -> Self {
        debug_assert!(begin <= end);
        Span { file_id, begin, end }
    }

    /// A span with no real source location (synthesized nodes, e.g. generated
    /// constructors or the shared revert stub).
    pub const fn synthetic() -> Self {
        Span { file_id: u32::MAX, begin: 0, end: 0 }
    }

    pub fn is_synthetic(&self) -> bool {
        self.file_id == u32::MAX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl Severity {
    pub fn to_lsp_severity(self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Hint => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

/// A secondary span attached to a diagnostic, with an explanatory label
/// (e.g. "slot first assigned here").
#[derive(Debug, Clone, serde::Serialize)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Label { span, message: message.into() }
    }
}

/// A single compiler diagnostic.
///
/// `code` is a stable identifier (e.g. `"E0231"`) so tooling downstream of
/// this crate (an LSP, a CI annotator) can key behavior off diagnostic
/// identity rather than message text. `is_ice` distinguishes an internal
/// invariant violation (spec.md §6: "a distinguished internal compiler error
/// diagnostic") without adding a fourth `Severity` variant, since ICEs are
/// always `Severity::Error` — the taxonomy only needs a marker, not a new
/// ordering level.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub primary: Span,
    pub secondary: Vec<Label>,
    pub is_ice: bool,
}

impl Diagnostic {
    pub fn error(code: &'static str, primary: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            primary,
            secondary: Vec::new(),
            is_ice: false,
        }
    }

    pub fn warning(code: &'static str, primary: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            primary,
            secondary: Vec::new(),
            is_ice: false,
        }
    }

    pub fn hint(code: &'static str, primary: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Hint,
            code,
            message: message.into(),
            primary,
            secondary: Vec::new(),
            is_ice: false,
        }
    }

    /// Construct an internal-compiler-error diagnostic: always an error,
    /// always flagged `is_ice`, and always anchored at the closest known
    /// source location per spec.md §7.
    pub fn ice(code: &'static str, primary: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            primary,
            secondary: Vec::new(),
            is_ice: true,
        }
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.secondary.push(Label::new(span, message));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// Append-only collector of diagnostics for one compilation (spec.md §5: the
/// diagnostic sink is append-only and serializable after the run).
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.entries.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Diagnostics sorted by file then by primary span start, for
    /// terminal/grouped rendering (spec.md §7 user-visible behavior).
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut v: Vec<&Diagnostic> = self.entries.iter().collect();
        v.sort_by_key(|d| (d.primary.file_id, d.primary.begin, d.primary.end));
        v
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_respects_severity() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::warning("W0001", Span::synthetic(), "unused variable"));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::error("E0001", Span::synthetic(), "undefined name"));
        assert!(sink.has_errors());
    }

    #[test]
    fn sorted_orders_by_span() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::error("E0001", Span::new(0, 50, 60), "b"));
        sink.push(Diagnostic::error("E0002", Span::new(0, 10, 20), "a"));
        let sorted = sink.sorted();
        assert_eq!(sorted[0].message, "a");
        assert_eq!(sorted[1].message, "b");
    }

    #[test]
    fn ice_is_always_error_severity_and_flagged() {
        let d = Diagnostic::ice("ICE0001", Span::synthetic(), "stack shape mismatch at join");
        assert_eq!(d.severity, Severity::Error);
        assert!(d.is_ice);
    }
}
