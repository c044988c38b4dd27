//! Error handling for the entry-point generator
//!
//! Two families live here. `CompilerError` is the fatal channel: anything
//! that reaches it aborts lowering of the current compilation unit.
//! `Diagnostic` and `ErrorReporter` carry user-facing findings that do not
//! stop lowering.

use crate::source_loc::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal errors raised while generating IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("IR verification failed for '{function}': {message}")]
    VerificationFailed {
        function: String,
        message: String,
    },

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Invalid source description: {message}")]
    InvalidInput { message: String },
}

impl CompilerError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::InternalError {
            message: message.into(),
        }
    }

    /// Internal errors are defects of the compiler itself, never user errors
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CompilerError::InternalError { .. } | CompilerError::VerificationFailed { .. }
        )
    }
}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// Diagnostics the IR generator can raise against user code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A top-level statement follows an unconditional exit
    UnreachableCode,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnreachableCode => Severity::Warning,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DiagnosticKind::UnreachableCode => "will never be executed",
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: Option<DiagnosticKind>,
    pub message: String,
    pub span: SourceSpan,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn from_kind(kind: DiagnosticKind, span: SourceSpan) -> Self {
        Self {
            kind: Some(kind),
            ..Self::with_severity(kind.severity(), kind.message().to_string(), span)
        }
    }

    fn with_severity(severity: Severity, message: String, span: SourceSpan) -> Self {
        Self {
            severity,
            kind: None,
            message,
            span,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.span, self.severity, self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

/// Collects diagnostics reported during lowering
#[derive(Debug, Default)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a diagnostic of a known kind at `span`
    pub fn diagnose(&mut self, span: SourceSpan, kind: DiagnosticKind) -> &mut Diagnostic {
        self.push(Diagnostic::from_kind(kind, span))
    }

    fn push(&mut self, diagnostic: Diagnostic) -> &mut Diagnostic {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
        let last = self.diagnostics.len() - 1;
        &mut self.diagnostics[last]
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of reported diagnostics of the given kind
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == Some(kind))
            .count()
    }

    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}
