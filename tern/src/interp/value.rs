//! Runtime values
//!
//! Heap-backed variants (strings, arrays, collections, functions, struct
//! instances, errors, macros) are reference counted through `Rc`: cloning a
//! `Value` retains the payload, dropping it releases, and the payload is
//! freed exactly once when the last owner drops. Dropping a heap-backed
//! value recursively releases everything it owns: array elements, struct
//! fields, a function's captured environment. Value-type variants (`Int`,
//! `Float`, `Bool`, `Char`, `Null`, `Pointer`) are copied freely.

use crate::ast::{DeclType, FnDecl, MacroDecl};
use crate::interp::env::EnvRef;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// The null value
    Null,
    /// Opaque heap address produced by address-of, for low-level interop
    Pointer(usize),
    /// String
    Str(Rc<String>),
    /// Resizable sequence of values
    Array(Rc<RefCell<Vec<Value>>>),
    /// List collection ADT
    List(Rc<RefCell<Vec<Value>>>),
    /// Map collection ADT, keyed by string
    Map(Rc<RefCell<BTreeMap<String, Value>>>),
    /// Set collection ADT of strings
    Set(Rc<RefCell<BTreeSet<String>>>),
    /// Callable function
    Function(Rc<Function>),
    /// Struct instance
    Struct(Rc<StructInstance>),
    /// Error value carrying a message
    Error(Rc<String>),
    /// Deferred statement template
    Macro(Rc<MacroDecl>),
}

impl Value {
    /// Runtime type name, as reported by `typeof`
    pub fn type_name(&self) -> &str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Null => "null",
            Value::Pointer(_) => "pointer",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Struct(inst) => &inst.ty.name,
            Value::Error(_) => "error",
            Value::Macro(_) => "macro",
        }
    }

    /// Interpret as a condition: bool, or int with non-zero meaning true
    pub fn as_condition(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Reference count of the heap payload, `None` for value types.
    ///
    /// Exposed so the memory-model invariants are observable in tests.
    pub fn ref_count(&self) -> Option<usize> {
        match self {
            Value::Str(rc) => Some(Rc::strong_count(rc)),
            Value::Array(rc) | Value::List(rc) => Some(Rc::strong_count(rc)),
            Value::Map(rc) => Some(Rc::strong_count(rc)),
            Value::Set(rc) => Some(Rc::strong_count(rc)),
            Value::Function(rc) => Some(Rc::strong_count(rc)),
            Value::Struct(rc) => Some(Rc::strong_count(rc)),
            Value::Error(rc) => Some(Rc::strong_count(rc)),
            Value::Macro(rc) => Some(Rc::strong_count(rc)),
            _ => None,
        }
    }

    /// Payload size in bytes of the dynamic type, for `sizeof`
    pub fn byte_size(&self) -> i64 {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Pointer(_) => 8,
            Value::Bool(_) => 1,
            Value::Char(_) => 4,
            Value::Null => 0,
            Value::Struct(inst) => inst.ty.byte_size(),
            // Heap-backed values are held by reference
            _ => 8,
        }
    }

    /// Payload alignment in bytes of the dynamic type, for `alignof`
    pub fn byte_align(&self) -> i64 {
        match self {
            Value::Bool(_) => 1,
            Value::Char(_) => 4,
            Value::Null => 1,
            Value::Struct(inst) => inst.ty.byte_align(),
            _ => 8,
        }
    }
}

/// Equality follows the language's `==` for comparable types: operands of
/// the same scalar/string type compare by content, `null == null` holds,
/// and everything else is unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

/// The rendering used by `print` and string coercion. Floats always carry
/// six fractional digits; heap aggregates render as fixed placeholders.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:.6}"),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Char(c) => write!(f, "{c}"),
            Value::Null => write!(f, "null"),
            Value::Pointer(_) => write!(f, "pointer"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(_) => write!(f, "[array]"),
            Value::List(_) => write!(f, "[list]"),
            Value::Map(_) => write!(f, "[map]"),
            Value::Set(_) => write!(f, "[set]"),
            Value::Function(func) => write!(f, "<fn {}>", func.name()),
            Value::Struct(inst) => write!(f, "<{} instance>", inst.ty.name),
            Value::Error(msg) => write!(f, "error: {msg}"),
            Value::Macro(m) => write!(f, "<macro {}>", m.name.node),
        }
    }
}

/// A callable: either a builtin reached through the library dispatch
/// boundary, or a user-defined function with its captured environment.
pub enum Function {
    Builtin {
        name: String,
    },
    User {
        decl: Rc<FnDecl>,
        /// Environment active at the declaration site, the parent of every
        /// call activation, which is what gives closures lexical scoping
        closure: EnvRef,
    },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Builtin { name } => name,
            Function::User { decl, .. } => &decl.name.node,
        }
    }

    pub fn param_count(&self) -> Option<usize> {
        match self {
            // Builtins validate their own arity
            Function::Builtin { .. } => None,
            Function::User { decl, .. } => Some(decl.params.len()),
        }
    }
}

// Manual Debug: printing the captured environment would recurse through the
// closure cycle.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin { name } => f.debug_struct("Builtin").field("name", name).finish(),
            Function::User { decl, .. } => {
                f.debug_struct("User").field("name", &decl.name.node).finish()
            }
        }
    }
}

/// Struct type descriptor, registered once per declaration
pub struct StructType {
    pub name: String,
    /// Parent type for field/method lookup fallback
    pub parent: Option<Rc<StructType>>,
    /// Fields declared on this type
    pub fields: Vec<FieldInfo>,
    /// Flattened instance layout: parent fields first, declaration order
    pub all_fields: Vec<FieldInfo>,
    pub methods: Vec<Rc<FnDecl>>,
    /// Method named `constructor`, run by `new` after field initializers
    pub constructor: Option<Rc<FnDecl>>,
    /// Environment active at the struct declaration; method bodies run in a
    /// child of this environment
    pub env: EnvRef,
}

/// A declared struct field
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: DeclType,
}

impl StructType {
    /// Slot index of a field in the flattened instance layout
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.all_fields.iter().position(|f| f.name == name)
    }

    /// Resolve a method on this type, falling back to the parent chain
    pub fn find_method(&self, name: &str) -> Option<Rc<FnDecl>> {
        if let Some(method) = self.methods.iter().find(|m| m.name.node == name) {
            return Some(Rc::clone(method));
        }
        self.parent.as_ref().and_then(|p| p.find_method(name))
    }

    /// Instance payload size: sum of field payload sizes
    pub fn byte_size(&self) -> i64 {
        self.all_fields.iter().map(|f| decl_byte_size(f.ty)).sum()
    }

    /// Instance alignment: largest field alignment
    pub fn byte_align(&self) -> i64 {
        self.all_fields
            .iter()
            .map(|f| decl_byte_align(f.ty))
            .max()
            .unwrap_or(1)
    }
}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructType")
            .field("name", &self.name)
            .field("fields", &self.all_fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Payload size in bytes of a declared type
pub fn decl_byte_size(ty: DeclType) -> i64 {
    match ty {
        DeclType::Int | DeclType::Float | DeclType::Pointer => 8,
        DeclType::Bool => 1,
        DeclType::Char => 4,
        DeclType::Str | DeclType::Array => 8,
        DeclType::Void => 0,
        DeclType::Unknown => 8,
    }
}

/// Payload alignment in bytes of a declared type
pub fn decl_byte_align(ty: DeclType) -> i64 {
    match ty {
        DeclType::Bool => 1,
        DeclType::Char => 4,
        DeclType::Void => 1,
        _ => 8,
    }
}

/// A struct instance: its type plus one value slot per declared field
#[derive(Debug)]
pub struct StructInstance {
    pub ty: Rc<StructType>,
    /// Flat field storage, one slot per entry of `ty.all_fields`
    pub fields: RefCell<Vec<Value>>,
}

impl StructInstance {
    /// Allocate an instance with every field set to null
    pub fn new(ty: Rc<StructType>) -> Self {
        let fields = vec![Value::Null; ty.all_fields.len()];
        StructInstance {
            ty,
            fields: RefCell::new(fields),
        }
    }

    /// Read a field, returning a retained copy
    pub fn get_field(&self, name: &str) -> Option<Value> {
        let offset = self.ty.field_offset(name)?;
        Some(self.fields.borrow()[offset].clone())
    }

    /// Overwrite a field, releasing the old occupant
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.ty.field_offset(name) {
            Some(offset) => {
                self.fields.borrow_mut()[offset] = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::env::Environment;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.500000");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Char('x').to_string(), "x");
        assert_eq!(Value::Pointer(0xbeef).to_string(), "pointer");
        assert_eq!(Value::Str(Rc::new("hi".to_string())).to_string(), "hi");
        assert_eq!(
            Value::Array(Rc::new(RefCell::new(vec![]))).to_string(),
            "[array]"
        );
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Int(2));
        assert_eq!(Value::Null, Value::Null);
        // Differing types never compare equal
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bool(true), Value::Int(1));
        // Aggregates are not comparable by value
        let a = Value::Array(Rc::new(RefCell::new(vec![Value::Int(1)])));
        assert_ne!(a.clone(), a);
    }

    #[test]
    fn test_value_condition() {
        assert_eq!(Value::Bool(true).as_condition(), Some(true));
        assert_eq!(Value::Int(0).as_condition(), Some(false));
        assert_eq!(Value::Int(-3).as_condition(), Some(true));
        assert_eq!(Value::Null.as_condition(), None);
        assert_eq!(Value::Str(Rc::new(String::new())).as_condition(), None);
    }

    #[test]
    fn test_ref_count_tracks_clones() {
        let v = Value::Str(Rc::new("shared".to_string()));
        assert_eq!(v.ref_count(), Some(1));
        let copy = v.clone();
        assert_eq!(v.ref_count(), Some(2));
        drop(copy);
        assert_eq!(v.ref_count(), Some(1));
        assert_eq!(Value::Int(1).ref_count(), None);
    }

    #[test]
    fn test_struct_field_roundtrip() {
        let ty = Rc::new(StructType {
            name: "P".to_string(),
            parent: None,
            fields: vec![
                FieldInfo {
                    name: "x".to_string(),
                    ty: DeclType::Int,
                },
                FieldInfo {
                    name: "y".to_string(),
                    ty: DeclType::Int,
                },
            ],
            all_fields: vec![
                FieldInfo {
                    name: "x".to_string(),
                    ty: DeclType::Int,
                },
                FieldInfo {
                    name: "y".to_string(),
                    ty: DeclType::Int,
                },
            ],
            methods: Vec::new(),
            constructor: None,
            env: Environment::new().into_ref(),
        });
        let inst = StructInstance::new(Rc::clone(&ty));
        assert_eq!(inst.get_field("x"), Some(Value::Null));
        assert!(inst.set_field("x", Value::Int(7)));
        assert_eq!(inst.get_field("x"), Some(Value::Int(7)));
        assert!(!inst.set_field("z", Value::Int(0)));
        assert_eq!(inst.get_field("z"), None);
        assert_eq!(ty.byte_size(), 16);
        assert_eq!(ty.byte_align(), 8);
    }

    #[test]
    fn test_struct_field_release_on_overwrite() {
        let ty = Rc::new(StructType {
            name: "Holder".to_string(),
            parent: None,
            fields: vec![FieldInfo {
                name: "v".to_string(),
                ty: DeclType::Str,
            }],
            all_fields: vec![FieldInfo {
                name: "v".to_string(),
                ty: DeclType::Str,
            }],
            methods: Vec::new(),
            constructor: None,
            env: Environment::new().into_ref(),
        });
        let inst = StructInstance::new(ty);
        let s = Rc::new("payload".to_string());
        inst.set_field("v", Value::Str(Rc::clone(&s)));
        assert_eq!(Rc::strong_count(&s), 2);
        // Overwriting the slot releases the previous occupant
        inst.set_field("v", Value::Int(0));
        assert_eq!(Rc::strong_count(&s), 1);
    }

    #[test]
    fn test_sizeof_values() {
        assert_eq!(Value::Int(1).byte_size(), 8);
        assert_eq!(Value::Bool(true).byte_size(), 1);
        assert_eq!(Value::Char('a').byte_size(), 4);
        assert_eq!(Value::Null.byte_size(), 0);
        assert_eq!(Value::Bool(true).byte_align(), 1);
        assert_eq!(Value::Int(1).byte_align(), 8);
    }
}
