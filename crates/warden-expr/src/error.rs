// error.rs — Error types for condition parsing and evaluation.

use thiserror::Error;

/// Errors that can occur while parsing or evaluating a condition.
///
/// These are deliberately `Clone + PartialEq`: the decision engine stores
/// per-rule evaluation errors inside its result, and tests compare them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// The condition string is not valid grammar.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Expression nesting exceeds the fixed cap.
    #[error("expression nesting exceeds maximum depth {max}")]
    TooDeep { max: usize },

    /// A variable path is not present in the namespace.
    ///
    /// The decision engine treats this as fail-closed: the referencing
    /// rule does not trigger. It is still surfaced as an error here so
    /// the caller can record the diagnostic.
    #[error("unknown variable '{path}'")]
    UnknownVariable { path: String },

    /// Operands of a comparison (or a boolean position) have incompatible types.
    #[error("type mismatch in {operation}: {left} vs {right}")]
    TypeMismatch {
        operation: String,
        left: String,
        right: String,
    },
}

impl ExprError {
    /// Shorthand for a parse error at a byte offset.
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        ExprError::Parse {
            offset,
            message: message.into(),
        }
    }
}
