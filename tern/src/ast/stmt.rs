//! Statement AST nodes

use super::{DeclType, Expr, Span, Spanned};
use serde::{Deserialize, Serialize};

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// Variable declaration: `let x: int = 10;` / `const y = 2.0;`
    VarDecl {
        name: Spanned<String>,
        ty: DeclType,
        init: Option<Spanned<Expr>>,
        is_const: bool,
    },

    /// Function declaration
    FnDecl(FnDecl),

    /// Struct declaration
    StructDecl(StructDecl),

    /// Macro declaration: `macro name(a, b) { ... }`
    MacroDecl(MacroDecl),

    /// Brace-delimited statement sequence with its own scope
    Block(Vec<Spanned<Stmt>>),

    /// Conditional; `else_branch` is a Block or another If (else-if chain)
    If {
        cond: Spanned<Expr>,
        then_branch: Box<Spanned<Stmt>>,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },

    /// While loop
    While {
        cond: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },

    /// C-style for loop: `for (init; cond; update) { ... }`
    For {
        init: Option<Box<Spanned<Stmt>>>,
        cond: Option<Spanned<Expr>>,
        update: Option<Spanned<Expr>>,
        body: Box<Spanned<Stmt>>,
    },

    /// `loop { }`, `loop i from a to b { }`, `loop x in collection { }`
    Loop {
        header: LoopHeader,
        body: Box<Spanned<Stmt>>,
    },

    /// Switch on an integer discriminant with C-style fallthrough
    Switch {
        scrutinee: Spanned<Expr>,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Spanned<Stmt>>>,
    },

    Break,
    Continue,

    /// Return from the enclosing function (value defaults to null)
    Return(Option<Spanned<Expr>>),

    /// Print a rendered value followed by a newline
    Print(Spanned<Expr>),

    /// Load and execute another source file: `import "path";`
    Import(Spanned<String>),

    /// Expression used as a statement
    Expr(Spanned<Expr>),
}

/// Loop statement header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopHeader {
    Infinite,
    /// `loop i from start to end`, an inclusive integer range
    Range {
        var: Spanned<String>,
        start: Spanned<Expr>,
        end: Spanned<Expr>,
    },
    /// `loop x in collection`: array/list elements, set members, map keys
    In {
        var: Spanned<String>,
        iterable: Spanned<Expr>,
    },
}

/// One `case value: statements` arm of a switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Spanned<Expr>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

/// Function declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub ret_ty: DeclType,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: DeclType,
}

/// Struct declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: Spanned<String>,
    /// Parent type for field/method lookup fallback: `struct Child : Parent`
    pub parent: Option<Spanned<String>>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FnDecl>,
    pub span: Span,
}

/// Struct field declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Spanned<String>,
    pub ty: DeclType,
}

/// Macro declaration: a deferred statement template expanded at the call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroDecl {
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}
