//! Runtime errors shared by all interpreters.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

/// An error raised during interpretation. Aborts the current script
/// unless the language itself handles it (PL/SQL exception sections).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("name '{name}' is not defined")]
    NameNotDefined { name: String, span: Span },
    #[error("{message}")]
    TypeError { message: String, span: Span },
    #[error("division by zero")]
    DivisionByZero { span: Span },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize, span: Span },
    #[error("key '{key}' not found")]
    KeyNotFound { key: String, span: Span },
    #[error("value of type {type_name} is not callable")]
    UncallableValue { type_name: String, span: Span },
    #[error("{name} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },
    #[error("assertion failed{}", fmt_assert_detail(.detail))]
    AssertionFailed { detail: Option<String>, span: Span },
    #[error("unhandled exception {name}: {message}")]
    UserException {
        name: String,
        message: String,
        span: Span,
    },
    #[error("cancelled")]
    Cancelled { span: Span },
}

fn fmt_assert_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl RuntimeError {
    /// The span where the error originated.
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::NameNotDefined { span, .. }
            | RuntimeError::TypeError { span, .. }
            | RuntimeError::DivisionByZero { span }
            | RuntimeError::IndexOutOfRange { span, .. }
            | RuntimeError::KeyNotFound { span, .. }
            | RuntimeError::UncallableValue { span, .. }
            | RuntimeError::ArityMismatch { span, .. }
            | RuntimeError::AssertionFailed { span, .. }
            | RuntimeError::UserException { span, .. }
            | RuntimeError::Cancelled { span } => *span,
        }
    }

    /// Map onto the shared diagnostic taxonomy.
    pub fn kind(&self) -> DiagKind {
        match self {
            RuntimeError::NameNotDefined { .. } => DiagKind::NameNotDefined,
            RuntimeError::TypeError { .. } => DiagKind::TypeError,
            RuntimeError::DivisionByZero { .. } => DiagKind::DivisionByZero,
            RuntimeError::IndexOutOfRange { .. } => DiagKind::IndexOutOfRange,
            RuntimeError::KeyNotFound { .. } => DiagKind::KeyNotFound,
            RuntimeError::UncallableValue { .. } => DiagKind::UncallableValue,
            RuntimeError::ArityMismatch { .. } => DiagKind::RunArityMismatch,
            RuntimeError::AssertionFailed { .. } => DiagKind::AssertionFailed,
            RuntimeError::UserException { .. } => DiagKind::UserException,
            RuntimeError::Cancelled { .. } => DiagKind::Cancelled,
        }
    }

    /// Convert into a run-stage diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(Stage::Run, self.kind(), self.to_string(), self.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_mapping() {
        let err = RuntimeError::DivisionByZero {
            span: Span::new(2, 3, 8, 1),
        };
        let d = err.to_diagnostic();
        assert_eq!(d.stage, Stage::Run);
        assert_eq!(d.kind, DiagKind::DivisionByZero);
        assert_eq!(d.span.line, 2);
        assert_eq!(d.message, "division by zero");
    }

    #[test]
    fn test_assertion_message() {
        let err = RuntimeError::AssertionFailed {
            detail: Some("x > 0".into()),
            span: Span::dummy(),
        };
        assert_eq!(err.to_string(), "assertion failed: x > 0");
        let bare = RuntimeError::AssertionFailed {
            detail: None,
            span: Span::dummy(),
        };
        assert_eq!(bare.to_string(), "assertion failed");
    }
}
