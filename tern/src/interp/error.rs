//! Runtime errors

use crate::ast::Span;
use std::fmt;

/// Result type for evaluation
pub type InterpResult<T> = Result<T, RuntimeError>;

/// Failure raised during evaluation
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Source location of the failing construct, when known
    pub span: Option<Span>,
}

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic runtime failure (undefined names, bad control flow, ...)
    Runtime,
    /// Operand or argument type mismatch
    Type,
    /// Allocation or pointer failure
    Memory,
    /// Module load failure
    Import,
    /// Out-of-bounds access
    Index,
    /// Malformed construct discovered at evaluation time
    Syntax,
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: String) -> Self {
        RuntimeError {
            kind,
            message,
            span: None,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message.into())
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::Type,
            format!("type error: expected {expected}, got {got}"),
        )
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::Runtime, format!("undefined variable: {name}"))
    }

    pub fn undefined_function(name: &str) -> Self {
        Self::new(ErrorKind::Runtime, format!("undefined function: {name}"))
    }

    pub fn undefined_type(name: &str) -> Self {
        Self::new(ErrorKind::Runtime, format!("undefined struct type: {name}"))
    }

    pub fn undefined_field(ty: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::Runtime,
            format!("struct {ty} has no field named {field}"),
        )
    }

    pub fn const_assignment(name: &str) -> Self {
        Self::new(
            ErrorKind::Runtime,
            format!("cannot assign to const binding: {name}"),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::Runtime, "division by zero".to_string())
    }

    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::Type,
            format!("function {name} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::Index,
            format!("index {index} out of bounds for length {len}"),
        )
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Memory, message.into())
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message.into())
    }

    pub fn stack_overflow() -> Self {
        Self::new(
            ErrorKind::Runtime,
            "stack overflow: recursion too deep".to_string(),
        )
    }

    pub fn loose_control(which: &str) -> Self {
        Self::new(
            ErrorKind::Runtime,
            format!("{which} outside of a loop"),
        )
    }

    /// Attach a source span, keeping an already-present one
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RuntimeError::division_by_zero().kind, ErrorKind::Runtime);
        assert_eq!(RuntimeError::type_error("int", "bool").kind, ErrorKind::Type);
        assert_eq!(
            RuntimeError::arity_mismatch("f", 2, 1).kind,
            ErrorKind::Type
        );
        assert_eq!(
            RuntimeError::index_out_of_bounds(4, 3).kind,
            ErrorKind::Index
        );
        assert_eq!(RuntimeError::import("no such file").kind, ErrorKind::Import);
        assert_eq!(RuntimeError::syntax("bad construct").kind, ErrorKind::Syntax);
        assert_eq!(RuntimeError::memory("oom").kind, ErrorKind::Memory);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RuntimeError::undefined_variable("x").message,
            "undefined variable: x"
        );
        assert_eq!(
            RuntimeError::arity_mismatch("add", 2, 3).message,
            "function add expects 2 argument(s), got 3"
        );
    }

    #[test]
    fn test_or_span_keeps_existing() {
        let err = RuntimeError::runtime("boom").or_span(Span::new(1, 2));
        assert_eq!(err.span, Some(Span::new(1, 2)));
        let err = err.or_span(Span::new(9, 10));
        assert_eq!(err.span, Some(Span::new(1, 2)));
    }
}
