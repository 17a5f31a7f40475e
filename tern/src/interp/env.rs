//! Environments: chained, reference-counted scopes
//!
//! An environment owns a variable table and a separate function table and
//! points at its lexical parent. Environments are shared through
//! `Rc<RefCell<...>>` because closures co-own the scope they captured; a
//! scope is released when the last frame or closure holding it drops.

use super::Value;
use crate::ast::DeclType;
use crate::interp::value::Function;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared reference to an environment
pub type EnvRef = Rc<RefCell<Environment>>;

/// A variable slot: the value plus its declared type and const flag
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub ty: DeclType,
    pub is_const: bool,
}

/// Why a `set` failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetError {
    /// No scope in the chain declares the name
    Undefined,
    /// The nearest declaration is a const binding
    ReadOnly,
}

/// Environment holding variable and function bindings
#[derive(Debug)]
pub struct Environment {
    vars: HashMap<String, Binding>,
    funcs: HashMap<String, Rc<Function>>,
    /// Parent environment for lexical scoping
    parent: Option<EnvRef>,
}

impl Environment {
    /// Create a new root environment
    pub fn new() -> Self {
        Environment {
            vars: HashMap::new(),
            funcs: HashMap::new(),
            parent: None,
        }
    }

    /// Create a new environment chained to a parent
    pub fn with_parent(parent: EnvRef) -> Self {
        Environment {
            vars: HashMap::new(),
            funcs: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Wrap in `Rc<RefCell<>>`
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Declare a variable in this scope, shadowing any outer binding of the
    /// same name. Redeclaring locally releases the previous occupant.
    pub fn declare(&mut self, name: String, value: Value, ty: DeclType, is_const: bool) {
        self.vars.insert(
            name,
            Binding {
                value,
                ty,
                is_const,
            },
        );
    }

    /// Look a variable up through the scope chain, returning a retained copy
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.get(name) {
            Some(binding.value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Declared type of the nearest binding of `name`
    pub fn declared_type(&self, name: &str) -> Option<DeclType> {
        if let Some(binding) = self.vars.get(name) {
            Some(binding.ty)
        } else if let Some(parent) = &self.parent {
            parent.borrow().declared_type(name)
        } else {
            None
        }
    }

    /// Update the nearest scope that declares `name`, releasing the old
    /// value. Fails when no scope declares the name; assignment never
    /// declares implicitly.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), SetError> {
        if let Some(binding) = self.vars.get_mut(name) {
            if binding.is_const {
                return Err(SetError::ReadOnly);
            }
            binding.value = value;
            Ok(())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().set(name, value)
        } else {
            Err(SetError::Undefined)
        }
    }

    /// Check whether a variable exists anywhere in the chain
    pub fn contains(&self, name: &str) -> bool {
        if self.vars.contains_key(name) {
            true
        } else if let Some(parent) = &self.parent {
            parent.borrow().contains(name)
        } else {
            false
        }
    }

    /// Register a function in this scope's function table
    pub fn declare_function(&mut self, name: String, func: Rc<Function>) {
        self.funcs.insert(name, func);
    }

    /// Look a function up through the chain; a separate namespace from
    /// variables
    pub fn lookup_function(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(func) = self.funcs.get(name) {
            Some(Rc::clone(func))
        } else if let Some(parent) = &self.parent {
            parent.borrow().lookup_function(name)
        } else {
            None
        }
    }

    /// Local variable bindings (for debugging and tests)
    pub fn bindings(&self) -> &HashMap<String, Binding> {
        &self.vars
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a child environment from a parent reference
pub fn child_env(parent: &EnvRef) -> EnvRef {
    Environment::with_parent(Rc::clone(parent)).into_ref()
}
