//! Control-flow signals
//!
//! Every statement evaluation produces a `Flow`. Loops absorb `Break` and
//! `Continue`, function calls absorb `Return`; failures travel separately as
//! the `Err` arm of `InterpResult` and are never absorbed by the core. The
//! signal is threaded explicitly through every recursive call; control flow
//! never rides on panics or host exceptions, and the interpreter keeps no
//! free-standing break/return flags.

use super::Value;

/// Outcome of a statement evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Normal completion with a result value
    Normal(Value),
    /// `return` unwinding to the enclosing call frame
    Return(Value),
    /// `break` unwinding to the nearest loop or switch
    Break,
    /// `continue` unwinding to the nearest loop
    Continue,
}

impl Flow {
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal(_))
    }

    /// The carried value of a `Normal` flow, null otherwise
    pub fn into_value(self) -> Value {
        match self {
            Flow::Normal(v) | Flow::Return(v) => v,
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_is_normal() {
        assert!(Flow::Normal(Value::Null).is_normal());
        assert!(!Flow::Break.is_normal());
        assert!(!Flow::Return(Value::Int(1)).is_normal());
    }

    #[test]
    fn test_flow_into_value() {
        assert_eq!(Flow::Normal(Value::Int(3)).into_value(), Value::Int(3));
        assert_eq!(Flow::Return(Value::Int(4)).into_value(), Value::Int(4));
        assert_eq!(Flow::Break.into_value(), Value::Null);
        assert_eq!(Flow::Continue.into_value(), Value::Null);
    }
}
