//! Tree-walking interpreter
//!
//! The runtime core: values, environments, the statement/expression
//! evaluators, the function-call protocol and the struct model.

mod builtins;
mod control;
mod env;
mod error;
mod eval;
mod output;
mod value;

pub use builtins::{BuiltinFn, Builtins};
pub use control::Flow;
pub use env::{Binding, EnvRef, Environment, SetError, child_env};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::Interpreter;
pub use output::PrintSink;
pub use value::{FieldInfo, Function, StructInstance, StructType, Value};
