//! Declared type annotations

use serde::{Deserialize, Serialize};

/// Type annotation on a variable, parameter, field or return slot.
///
/// Tern is dynamically typed at runtime; annotations are recorded on the
/// binding and checked when a declaration is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclType {
    Int,
    Float,
    Bool,
    Char,
    Str,
    Array,
    Pointer,
    Void,
    /// No annotation; the type is whatever the initializer produces
    Unknown,
}

impl std::fmt::Display for DeclType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeclType::Int => "int",
            DeclType::Float => "float",
            DeclType::Bool => "bool",
            DeclType::Char => "char",
            DeclType::Str => "string",
            DeclType::Array => "array",
            DeclType::Pointer => "pointer",
            DeclType::Void => "void",
            DeclType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_type_display() {
        assert_eq!(DeclType::Int.to_string(), "int");
        assert_eq!(DeclType::Str.to_string(), "string");
        assert_eq!(DeclType::Unknown.to_string(), "unknown");
    }
}
