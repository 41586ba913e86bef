//! Uniform diagnostic records for every pipeline stage.
//!
//! All stages append to one shared sink in production order, which
//! equals source order within a stage and stage order across stages.
//! No stage raises to the caller; every failure becomes a diagnostic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// The pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Classify,
    Lex,
    Parse,
    Check,
    Run,
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Error — the construct is wrong; execution may abort.
    Error,
    /// Warning — suspicious but not fatal.
    Warning,
    /// Informational — worth noting, not a problem.
    Info,
}

/// Closed taxonomy of diagnostic kinds across all stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagKind {
    // classify
    LowConfidence,
    EmptyInput,
    // lex
    UnrecognizedCharacter,
    UnterminatedString,
    UnterminatedComment,
    UnterminatedDirective,
    IndentationInconsistent,
    InvalidNumberLiteral,
    // parse
    Unexpected,
    UnexpectedEof,
    BlockClosureMissing,
    // check
    NameNotFound,
    Redeclaration,
    ArityMismatch,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnOutsideFunction,
    UnreachableCode,
    ReservedName,
    UnknownColumn,
    UnknownTable,
    // run
    NameNotDefined,
    TypeError,
    DivisionByZero,
    IndexOutOfRange,
    KeyNotFound,
    UncallableValue,
    RunArityMismatch,
    AssertionFailed,
    UserException,
    Cancelled,
}

/// A diagnostic message from any pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stage that produced this diagnostic.
    pub stage: Stage,
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// Which entry of the closed taxonomy this is.
    pub kind: DiagKind,
    /// Human-readable message.
    pub message: String,
    /// Source location where the issue was found.
    pub span: Span,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(stage: Stage, kind: DiagKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(stage: Stage, kind: DiagKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            stage,
            severity: Severity::Warning,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Create an info diagnostic.
    pub fn info(stage: Stage, kind: DiagKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            stage,
            severity: Severity::Info,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Returns `true` if this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Classify => "classify",
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Check => "check",
            Stage::Run => "run",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:?} {} at {}:{}: {}",
            self.stage, self.kind, self.severity, self.span.line, self.span.col, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructor() {
        let d = Diagnostic::error(
            Stage::Lex,
            DiagKind::UnterminatedString,
            "string is not terminated",
            Span::new(3, 5, 20, 7),
        );
        assert!(d.is_error());
        assert_eq!(d.stage, Stage::Lex);
        assert_eq!(d.kind, DiagKind::UnterminatedString);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::warning(
            Stage::Check,
            DiagKind::UnreachableCode,
            "statement is never reached",
            Span::new(4, 1, 30, 6),
        );
        assert_eq!(
            format!("{d}"),
            "check:UnreachableCode warning at 4:1: statement is never reached"
        );
    }

    #[test]
    fn test_stage_order_matches_pipeline() {
        assert!(Stage::Classify < Stage::Lex);
        assert!(Stage::Lex < Stage::Parse);
        assert!(Stage::Parse < Stage::Check);
        assert!(Stage::Check < Stage::Run);
    }
}
