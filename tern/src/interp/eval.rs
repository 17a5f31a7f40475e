//! Tree-walking evaluator
//!
//! Statements produce a `Flow` signal, expressions produce a `Value`. Both
//! evaluators share one `Interpreter`, which owns the global environment,
//! the struct type registry, the builtin dispatch table, the pointer heap
//! and the print sink. Evaluation is single-threaded and deterministic:
//! left to right, eager.

use super::builtins::Builtins;
use super::control::Flow;
use super::env::{EnvRef, Environment, SetError, child_env};
use super::error::{InterpResult, RuntimeError};
use super::output::PrintSink;
use super::value::{Function, StructInstance, StructType, Value};
use crate::ast::{
    AssignOp, BinOp, DeclType, Expr, FnDecl, LoopHeader, Program, Span, Spanned, Stmt, StructDecl,
    UnOp,
};
use crate::lexer::tokenize;
use crate::parser::parse;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

/// Maximum call depth before a runaway recursion is reported
const MAX_RECURSION_DEPTH: usize = 10_000;

/// Stack growth parameters for deep evaluation
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Resolved call target
enum Callee {
    Builtin(String),
    User(Rc<FnDecl>, EnvRef),
    Macro(Rc<crate::ast::MacroDecl>),
}

/// The interpreter
pub struct Interpreter {
    /// Global environment
    global_env: EnvRef,
    /// Struct type registry, keyed by name
    structs: HashMap<String, Rc<StructType>>,
    /// Builtin dispatch table
    builtins: Builtins,
    /// Slots backing address-of/dereference
    heap: HashMap<usize, Value>,
    next_addr: usize,
    /// Current call depth
    depth: usize,
    /// Destination for print output
    sink: PrintSink,
    /// Directory import paths resolve against
    base_dir: PathBuf,
    /// Canonical paths already imported
    imported: HashSet<PathBuf>,
}

impl Interpreter {
    /// Create a new interpreter with an empty global environment
    pub fn new() -> Self {
        Interpreter {
            global_env: Environment::new().into_ref(),
            structs: HashMap::new(),
            builtins: Builtins::new(),
            heap: HashMap::new(),
            next_addr: 1,
            depth: 0,
            sink: PrintSink::Stdout,
            base_dir: PathBuf::from("."),
            imported: HashSet::new(),
        }
    }

    /// Redirect print output into a buffer and return it
    pub fn capture_output(&mut self) -> Rc<RefCell<String>> {
        let (sink, buf) = PrintSink::buffer();
        self.sink = sink;
        buf
    }

    /// Directory that `import` paths resolve against
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    /// The global environment (for the REPL and embedding)
    pub fn global_env(&self) -> &EnvRef {
        &self.global_env
    }

    /// Execute all top-level statements. A top-level `return` stops
    /// execution early; the result is the last statement's value.
    pub fn run_program(&mut self, program: &Program) -> InterpResult<Value> {
        let global = Rc::clone(&self.global_env);
        let mut last = Value::Null;
        for stmt in &program.statements {
            match self.exec(stmt, &global)? {
                Flow::Normal(v) => last = v,
                Flow::Return(v) => return Ok(v),
                Flow::Break => return Err(RuntimeError::loose_control("break")),
                Flow::Continue => return Err(RuntimeError::loose_control("continue")),
            }
        }
        Ok(last)
    }

    /// Call `main` with no arguments if the program declares it
    pub fn run_main(&mut self) -> InterpResult<Option<Value>> {
        let main_fn = self.global_env.borrow().lookup_function("main");
        match main_fn {
            Some(func) => match &*func {
                Function::User { decl, closure } => {
                    if !decl.params.is_empty() {
                        return Err(RuntimeError::arity_mismatch(
                            "main",
                            decl.params.len(),
                            0,
                        ));
                    }
                    let decl = Rc::clone(decl);
                    let closure = Rc::clone(closure);
                    let result = self.invoke_user(&decl, &closure, None, Vec::new())?;
                    Ok(Some(result))
                }
                Function::Builtin { .. } => Ok(None),
            },
            None => Ok(None),
        }
    }

    // ---- statements ----

    /// Execute a statement with automatic stack growth
    pub fn exec(&mut self, stmt: &Spanned<Stmt>, env: &EnvRef) -> InterpResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_inner(stmt, env)
                .map_err(|e| e.or_span(stmt.span))
        })
    }

    /// Execute a statement sequence in the given environment, stopping at
    /// the first non-normal flow
    fn run_seq(&mut self, stmts: &[Spanned<Stmt>], env: &EnvRef) -> InterpResult<Flow> {
        let mut last = Value::Null;
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal(v) => last = v,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_inner(&mut self, stmt: &Spanned<Stmt>, env: &EnvRef) -> InterpResult<Flow> {
        match &stmt.node {
            Stmt::VarDecl {
                name,
                ty,
                init,
                is_const,
            } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                if !type_conforms(*ty, &value) {
                    return Err(RuntimeError::type_error(
                        &ty.to_string(),
                        value.type_name(),
                    )
                    .or_span(name.span));
                }
                env.borrow_mut()
                    .declare(name.node.clone(), value, *ty, *is_const);
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::FnDecl(decl) => {
                let func = Function::User {
                    decl: Rc::new(decl.clone()),
                    closure: Rc::clone(env),
                };
                env.borrow_mut()
                    .declare_function(decl.name.node.clone(), Rc::new(func));
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::StructDecl(decl) => {
                let ty = self.build_struct_type(decl, env)?;
                self.structs.insert(decl.name.node.clone(), ty);
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::MacroDecl(decl) => {
                env.borrow_mut().declare(
                    decl.name.node.clone(),
                    Value::Macro(Rc::new(decl.clone())),
                    DeclType::Unknown,
                    false,
                );
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::Block(stmts) => {
                // Fresh scope; released on every exit path when it drops
                let block_env = child_env(env);
                self.run_seq(stmts, &block_env)
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.condition(cond, env)? {
                    self.exec(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch, env)
                } else {
                    Ok(Flow::Normal(Value::Null))
                }
            }

            Stmt::While { cond, body } => {
                while self.condition(cond, env)? {
                    match self.exec(body, env)? {
                        Flow::Normal(_) => {}
                        Flow::Continue => continue,
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_env = child_env(env);
                if let Some(init) = init {
                    match self.exec(init, &loop_env)? {
                        Flow::Normal(_) => {}
                        other => return Ok(other),
                    }
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.condition(cond, &loop_env)? {
                            break;
                        }
                    }
                    match self.exec(body, &loop_env)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    // Continue runs the update expression first
                    if let Some(update) = update {
                        self.eval(update, &loop_env)?;
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::Loop { header, body } => self.exec_loop(header, body, env),

            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = self.eval(scrutinee, env)?;
                let scrutinee_int = match value {
                    Value::Int(n) => n,
                    other => {
                        return Err(RuntimeError::type_error("int", other.type_name())
                            .or_span(scrutinee.span));
                    }
                };

                // Case values evaluate in order only until the first match
                let mut matched = None;
                for (i, case) in cases.iter().enumerate() {
                    let case_value = self.eval(&case.value, env)?;
                    match case_value {
                        Value::Int(n) if n == scrutinee_int => {
                            matched = Some(i);
                            break;
                        }
                        Value::Int(_) => {}
                        other => {
                            return Err(RuntimeError::type_error("int", other.type_name())
                                .or_span(case.value.span));
                        }
                    }
                }

                match matched {
                    Some(start) => {
                        // Fall through subsequent case bodies (and finally
                        // the default) until a break
                        for case in &cases[start..] {
                            match self.run_seq(&case.body, env)? {
                                Flow::Normal(_) => {}
                                Flow::Break => return Ok(Flow::Normal(Value::Null)),
                                other => return Ok(other),
                            }
                        }
                        if let Some(default) = default {
                            match self.run_seq(default, env)? {
                                Flow::Normal(_) | Flow::Break => {}
                                other => return Ok(other),
                            }
                        }
                        Ok(Flow::Normal(Value::Null))
                    }
                    None => {
                        if let Some(default) = default {
                            match self.run_seq(default, env)? {
                                Flow::Normal(_) | Flow::Break => {}
                                other => return Ok(other),
                            }
                        }
                        Ok(Flow::Normal(Value::Null))
                    }
                }
            }

            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),

            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Print(expr) => {
                let value = self.eval(expr, env)?;
                self.sink.println(&value.to_string());
                Ok(Flow::Normal(Value::Null))
            }

            Stmt::Import(path) => self.exec_import(&path.node, path.span),

            Stmt::Expr(expr) => Ok(Flow::Normal(self.eval(expr, env)?)),
        }
    }

    fn exec_loop(
        &mut self,
        header: &LoopHeader,
        body: &Spanned<Stmt>,
        env: &EnvRef,
    ) -> InterpResult<Flow> {
        match header {
            LoopHeader::Infinite => loop {
                match self.exec(body, env)? {
                    Flow::Normal(_) | Flow::Continue => {}
                    Flow::Break => return Ok(Flow::Normal(Value::Null)),
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            },
            LoopHeader::Range { var, start, end } => {
                let start_val = self.eval(start, env)?;
                let end_val = self.eval(end, env)?;
                let (from, to) = match (start_val, end_val) {
                    (Value::Int(a), Value::Int(b)) => (a, b),
                    (a, b) => {
                        return Err(RuntimeError::type_error(
                            "int range bounds",
                            &format!("{} to {}", a.type_name(), b.type_name()),
                        ));
                    }
                };
                for i in from..=to {
                    // The iterator lives in a fresh scope each pass
                    let iter_env = child_env(env);
                    iter_env.borrow_mut().declare(
                        var.node.clone(),
                        Value::Int(i),
                        DeclType::Int,
                        false,
                    );
                    match self.exec(body, &iter_env)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => return Ok(Flow::Normal(Value::Null)),
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            LoopHeader::In { var, iterable } => {
                let iterable_val = self.eval(iterable, env)?;
                let items: Vec<Value> = match &iterable_val {
                    Value::Array(a) | Value::List(a) => a.borrow().clone(),
                    Value::Set(s) => s
                        .borrow()
                        .iter()
                        .map(|m| Value::Str(Rc::new(m.clone())))
                        .collect(),
                    Value::Map(m) => m
                        .borrow()
                        .keys()
                        .map(|k| Value::Str(Rc::new(k.clone())))
                        .collect(),
                    Value::Str(s) => s.chars().map(Value::Char).collect(),
                    other => {
                        return Err(RuntimeError::type_error(
                            "iterable collection",
                            other.type_name(),
                        ));
                    }
                };
                for item in items {
                    let iter_env = child_env(env);
                    iter_env.borrow_mut().declare(
                        var.node.clone(),
                        item,
                        DeclType::Unknown,
                        false,
                    );
                    match self.exec(body, &iter_env)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => return Ok(Flow::Normal(Value::Null)),
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
        }
    }

    fn exec_import(&mut self, path: &str, span: Span) -> InterpResult<Flow> {
        let full = self.base_dir.join(path);
        let canonical = full.canonicalize().map_err(|e| {
            RuntimeError::import(format!("cannot resolve {}: {e}", full.display())).or_span(span)
        })?;
        // Each module executes at most once
        if !self.imported.insert(canonical.clone()) {
            return Ok(Flow::Normal(Value::Null));
        }
        let source = std::fs::read_to_string(&canonical).map_err(|e| {
            RuntimeError::import(format!("cannot read {}: {e}", canonical.display())).or_span(span)
        })?;
        let tokens = tokenize(&source)
            .map_err(|e| RuntimeError::import(format!("in {path}: {e}")).or_span(span))?;
        let program = parse(tokens)
            .map_err(|e| RuntimeError::import(format!("in {path}: {e}")).or_span(span))?;

        // Imported top-level statements run against the global environment
        let global = Rc::clone(&self.global_env);
        for stmt in &program.statements {
            match self.exec(stmt, &global)? {
                Flow::Normal(_) => {}
                Flow::Return(_) => break,
                Flow::Break => return Err(RuntimeError::loose_control("break")),
                Flow::Continue => return Err(RuntimeError::loose_control("continue")),
            }
        }
        Ok(Flow::Normal(Value::Null))
    }

    fn build_struct_type(
        &mut self,
        decl: &StructDecl,
        env: &EnvRef,
    ) -> InterpResult<Rc<StructType>> {
        let parent = match &decl.parent {
            Some(parent_name) => Some(
                self.structs
                    .get(&parent_name.node)
                    .cloned()
                    .ok_or_else(|| {
                        RuntimeError::undefined_type(&parent_name.node).or_span(parent_name.span)
                    })?,
            ),
            None => None,
        };

        let fields: Vec<_> = decl
            .fields
            .iter()
            .map(|f| super::value::FieldInfo {
                name: f.name.node.clone(),
                ty: f.ty,
            })
            .collect();

        // Flattened layout: parent fields first, then own fields
        let mut all_fields = parent
            .as_ref()
            .map(|p| p.all_fields.clone())
            .unwrap_or_default();
        all_fields.extend(fields.iter().cloned());

        let methods: Vec<Rc<FnDecl>> = decl.methods.iter().map(|m| Rc::new(m.clone())).collect();
        let constructor = methods
            .iter()
            .find(|m| m.name.node == "constructor")
            .cloned();

        Ok(Rc::new(StructType {
            name: decl.name.node.clone(),
            parent,
            fields,
            all_fields,
            methods,
            constructor,
            env: Rc::clone(env),
        }))
    }

    /// Evaluate a loop/if condition: bool, or int with non-zero = true
    fn condition(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> InterpResult<bool> {
        let value = self.eval(expr, env)?;
        value.as_condition().ok_or_else(|| {
            RuntimeError::type_error("bool or int condition", value.type_name())
                .or_span(expr.span)
        })
    }

    // ---- expressions ----

    /// Evaluate an expression with automatic stack growth
    pub fn eval(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_inner(expr, env)
                .map_err(|e| e.or_span(expr.span))
        })
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        match &expr.node {
            Expr::IntLit(n) => Ok(Value::Int(*n)),
            Expr::FloatLit(f) => Ok(Value::Float(*f)),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::CharLit(c) => Ok(Value::Char(*c)),
            Expr::StrLit(s) => Ok(Value::Str(Rc::new(s.clone()))),
            Expr::NullLit => Ok(Value::Null),

            Expr::ArrayLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element, env)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }

            Expr::Ident(name) => self.eval_ident(name, env),

            Expr::Assign { target, op, value } => self.eval_assign(target, *op, value, env),

            Expr::Binary { left, op, right } => {
                // Both operands always evaluate, left to right; logical
                // operators do not short-circuit
                let lval = self.eval(left, env)?;
                let rval = self.eval(right, env)?;
                self.eval_binary(*op, lval, rval)
            }

            Expr::Unary { op, operand } => self.eval_unary(*op, operand, env),

            Expr::IncDec {
                target,
                dec,
                postfix,
            } => self.eval_incdec(target, *dec, *postfix, env),

            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                // Only the chosen arm evaluates
                if self.condition(cond, env)? {
                    self.eval(then_expr, env)
                } else {
                    self.eval(else_expr, env)
                }
            }

            Expr::Call { callee, args } => self.eval_call(callee, args, env),

            Expr::MethodCall {
                object,
                method,
                args,
            } => self.eval_method_call(object, method, args, env),

            Expr::Member { object, field } => {
                let obj = self.eval(object, env)?;
                match obj {
                    Value::Struct(inst) => inst.get_field(&field.node).ok_or_else(|| {
                        RuntimeError::undefined_field(&inst.ty.name, &field.node)
                            .or_span(field.span)
                    }),
                    other => {
                        Err(RuntimeError::type_error("struct", other.type_name())
                            .or_span(object.span))
                    }
                }
            }

            Expr::Index { object, index } => {
                let obj = self.eval(object, env)?;
                let idx = self.eval(index, env)?;
                self.index_get(&obj, &idx).map_err(|e| e.or_span(index.span))
            }

            Expr::New { type_name, inits } => self.eval_new(type_name, inits, env),

            Expr::Typeof(operand) => {
                let value = self.eval(operand, env)?;
                Ok(Value::Str(Rc::new(value.type_name().to_string())))
            }

            Expr::Sizeof(operand) => {
                let value = self.eval(operand, env)?;
                Ok(Value::Int(value.byte_size()))
            }

            Expr::Alignof(operand) => {
                let value = self.eval(operand, env)?;
                Ok(Value::Int(value.byte_align()))
            }
        }
    }

    /// Identifier resolution: variable, then user function, then builtin
    fn eval_ident(&mut self, name: &str, env: &EnvRef) -> InterpResult<Value> {
        if let Some(value) = env.borrow().get(name) {
            return Ok(value);
        }
        if let Some(func) = env.borrow().lookup_function(name) {
            return Ok(Value::Function(func));
        }
        if self.builtins.contains(name) {
            return Ok(Value::Function(Rc::new(Function::Builtin {
                name: name.to_string(),
            })));
        }
        Err(RuntimeError::undefined_variable(name))
    }

    fn eval_assign(
        &mut self,
        target: &Spanned<Expr>,
        op: AssignOp,
        value: &Spanned<Expr>,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let new_value = match op.binary_op() {
            None => self.eval(value, env)?,
            Some(bin) => {
                // Read-modify-write with binary operator type rules
                let current = self.read_target(target, env)?;
                let rhs = self.eval(value, env)?;
                self.eval_binary(bin, current, rhs)?
            }
        };
        self.write_target(target, new_value.clone(), env)?;
        Ok(new_value)
    }

    fn read_target(&mut self, target: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        match &target.node {
            Expr::Ident(name) => env
                .borrow()
                .get(name)
                .ok_or_else(|| RuntimeError::undefined_variable(name).or_span(target.span)),
            Expr::Member { .. } | Expr::Index { .. } => self.eval(target, env),
            _ => Err(RuntimeError::syntax("invalid assignment target").or_span(target.span)),
        }
    }

    fn write_target(
        &mut self,
        target: &Spanned<Expr>,
        value: Value,
        env: &EnvRef,
    ) -> InterpResult<()> {
        match &target.node {
            Expr::Ident(name) => {
                let result = env.borrow_mut().set(name, value);
                match result {
                    Ok(()) => Ok(()),
                    Err(SetError::Undefined) => {
                        Err(RuntimeError::undefined_variable(name).or_span(target.span))
                    }
                    Err(SetError::ReadOnly) => {
                        Err(RuntimeError::const_assignment(name).or_span(target.span))
                    }
                }
            }
            Expr::Member { object, field } => {
                let obj = self.eval(object, env)?;
                match obj {
                    Value::Struct(inst) => {
                        if !inst.set_field(&field.node, value) {
                            return Err(RuntimeError::undefined_field(
                                &inst.ty.name,
                                &field.node,
                            )
                            .or_span(field.span));
                        }
                        Ok(())
                    }
                    other => Err(RuntimeError::type_error("struct", other.type_name())
                        .or_span(object.span)),
                }
            }
            Expr::Index { object, index } => {
                let obj = self.eval(object, env)?;
                let idx = self.eval(index, env)?;
                self.index_set(&obj, &idx, value)
                    .map_err(|e| e.or_span(index.span))
            }
            _ => Err(RuntimeError::syntax("invalid assignment target").or_span(target.span)),
        }
    }

    fn index_get(&self, obj: &Value, idx: &Value) -> InterpResult<Value> {
        match (obj, idx) {
            (Value::Array(items), Value::Int(i)) | (Value::List(items), Value::Int(i)) => {
                let items = items.borrow();
                if *i < 0 || *i as usize >= items.len() {
                    return Err(RuntimeError::index_out_of_bounds(*i, items.len()));
                }
                Ok(items[*i as usize].clone())
            }
            (Value::Str(s), Value::Int(i)) => {
                if *i < 0 {
                    return Err(RuntimeError::index_out_of_bounds(*i, s.chars().count()));
                }
                s.chars()
                    .nth(*i as usize)
                    .map(Value::Char)
                    .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, s.chars().count()))
            }
            // Map misses read as null
            (Value::Map(map), Value::Str(key)) => Ok(map
                .borrow()
                .get(key.as_str())
                .cloned()
                .unwrap_or(Value::Null)),
            (Value::Array(_), other) | (Value::List(_), other) | (Value::Str(_), other) => Err(
                RuntimeError::type_error("int index", other.type_name()),
            ),
            (Value::Map(_), other) => {
                Err(RuntimeError::type_error("string key", other.type_name()))
            }
            (other, _) => Err(RuntimeError::type_error(
                "indexable value",
                other.type_name(),
            )),
        }
    }

    fn index_set(&self, obj: &Value, idx: &Value, value: Value) -> InterpResult<()> {
        match (obj, idx) {
            (Value::Array(items), Value::Int(i)) | (Value::List(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                if *i < 0 || *i as usize >= items.len() {
                    return Err(RuntimeError::index_out_of_bounds(*i, items.len()));
                }
                // Releases the previous occupant of the slot
                items[*i as usize] = value;
                Ok(())
            }
            (Value::Map(map), Value::Str(key)) => {
                map.borrow_mut().insert(key.as_str().to_string(), value);
                Ok(())
            }
            (Value::Array(_), other) | (Value::List(_), other) => Err(
                RuntimeError::type_error("int index", other.type_name()),
            ),
            (Value::Map(_), other) => {
                Err(RuntimeError::type_error("string key", other.type_name()))
            }
            (other, _) => Err(RuntimeError::type_error(
                "indexable value",
                other.type_name(),
            )),
        }
    }

    fn eval_unary(
        &mut self,
        op: UnOp,
        operand: &Spanned<Expr>,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        match op {
            UnOp::Neg => {
                let value = self.eval(operand, env)?;
                match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(RuntimeError::type_error("numeric", other.type_name())),
                }
            }
            UnOp::Not => {
                let value = self.eval(operand, env)?;
                match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(RuntimeError::type_error("bool", other.type_name())),
                }
            }
            UnOp::Deref => {
                let value = self.eval(operand, env)?;
                match value {
                    Value::Pointer(addr) => self
                        .heap
                        .get(&addr)
                        .cloned()
                        .ok_or_else(|| RuntimeError::memory("dereference of invalid pointer")),
                    other => Err(RuntimeError::type_error("pointer", other.type_name())),
                }
            }
            UnOp::AddrOf => {
                // Address-of snapshots the variable's current value into a
                // heap slot and hands back its address
                let name = match &operand.node {
                    Expr::Ident(name) => name,
                    _ => {
                        return Err(RuntimeError::type_error(
                            "variable operand for &",
                            "expression",
                        )
                        .or_span(operand.span));
                    }
                };
                let value = env
                    .borrow()
                    .get(name)
                    .ok_or_else(|| RuntimeError::undefined_variable(name))?;
                let addr = self.next_addr;
                self.next_addr += 1;
                self.heap.insert(addr, value);
                Ok(Value::Pointer(addr))
            }
        }
    }

    fn eval_incdec(
        &mut self,
        target: &Spanned<Expr>,
        dec: bool,
        postfix: bool,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let name = match &target.node {
            Expr::Ident(name) => name.clone(),
            _ => {
                return Err(
                    RuntimeError::syntax("increment/decrement target must be a variable")
                        .or_span(target.span),
                );
            }
        };
        let old = env
            .borrow()
            .get(&name)
            .ok_or_else(|| RuntimeError::undefined_variable(&name).or_span(target.span))?;
        let new = match old {
            Value::Int(n) => Value::Int(if dec { n - 1 } else { n + 1 }),
            Value::Float(f) => Value::Float(if dec { f - 1.0 } else { f + 1.0 }),
            other => {
                return Err(RuntimeError::type_error("numeric", other.type_name())
                    .or_span(target.span));
            }
        };
        let result = env.borrow_mut().set(&name, new.clone());
        match result {
            Ok(()) => {}
            Err(SetError::ReadOnly) => {
                return Err(RuntimeError::const_assignment(&name).or_span(target.span));
            }
            Err(SetError::Undefined) => {
                return Err(RuntimeError::undefined_variable(&name).or_span(target.span));
            }
        }
        // Postfix yields the pre-mutation value, prefix the new one
        Ok(if postfix { old } else { new })
    }

    fn eval_binary(&self, op: BinOp, left: Value, right: Value) -> InterpResult<Value> {
        match op {
            BinOp::Add => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                (Value::Str(a), Value::Str(b)) => {
                    Ok(Value::Str(Rc::new(format!("{a}{b}"))))
                }
                // A string operand stringifies the other side
                (Value::Str(a), b) => Ok(Value::Str(Rc::new(format!("{a}{b}")))),
                (a, Value::Str(b)) => Ok(Value::Str(Rc::new(format!("{a}{b}")))),
                _ => Err(RuntimeError::type_error(
                    "matching numeric or string operands",
                    &format!("{} + {}", left.type_name(), right.type_name()),
                )),
            },
            BinOp::Sub => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
                _ => Err(RuntimeError::type_error(
                    "matching numeric operands",
                    &format!("{} - {}", left.type_name(), right.type_name()),
                )),
            },
            BinOp::Mul => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
                _ => Err(RuntimeError::type_error(
                    "matching numeric operands",
                    &format!("{} * {}", left.type_name(), right.type_name()),
                )),
            },
            BinOp::Div => match (&left, &right) {
                (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero()),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
                (Value::Float(a), Value::Float(b)) => {
                    if *b == 0.0 {
                        Err(RuntimeError::division_by_zero())
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                _ => Err(RuntimeError::type_error(
                    "matching numeric operands",
                    &format!("{} / {}", left.type_name(), right.type_name()),
                )),
            },
            BinOp::Mod => match (&left, &right) {
                (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero()),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
                _ => Err(RuntimeError::type_error(
                    "int operands",
                    &format!("{} % {}", left.type_name(), right.type_name()),
                )),
            },

            BinOp::Eq => self.eval_equality(false, &left, &right),
            BinOp::Ne => self.eval_equality(true, &left, &right),

            BinOp::Lt => self.compare_values(&left, &right, |o| o == std::cmp::Ordering::Less),
            BinOp::Gt => self.compare_values(&left, &right, |o| o == std::cmp::Ordering::Greater),
            BinOp::Le => self.compare_values(&left, &right, |o| o != std::cmp::Ordering::Greater),
            BinOp::Ge => self.compare_values(&left, &right, |o| o != std::cmp::Ordering::Less),

            BinOp::And | BinOp::Or => match (&left, &right) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinOp::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(RuntimeError::type_error(
                    "bool operands",
                    &format!("{} {} {}", left.type_name(), op, right.type_name()),
                )),
            },
        }
    }

    /// `==`/`!=`: differing types short-circuit to unequal; same-typed
    /// scalars and strings compare by content; aggregates are not comparable
    fn eval_equality(&self, negate: bool, left: &Value, right: &Value) -> InterpResult<Value> {
        if std::mem::discriminant(left) != std::mem::discriminant(right) {
            return Ok(Value::Bool(negate));
        }
        let equal = match (left, right) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => {
                return Err(RuntimeError::type_error(
                    "comparable operands",
                    left.type_name(),
                ));
            }
        };
        Ok(Value::Bool(equal != negate))
    }

    /// Ordering comparisons require same-typed numeric or char operands
    fn compare_values<F>(&self, left: &Value, right: &Value, f: F) -> InterpResult<Value>
    where
        F: Fn(std::cmp::Ordering) -> bool,
    {
        let ordering = match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            _ => {
                return Err(RuntimeError::type_error(
                    "matching comparable operands",
                    &format!("{} and {}", left.type_name(), right.type_name()),
                ));
            }
        };
        Ok(Value::Bool(f(ordering)))
    }

    // ---- calls ----

    fn eval_call(
        &mut self,
        callee: &Spanned<Expr>,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let target = self.resolve_callee(callee, env)?;

        match target {
            Callee::User(decl, closure) => {
                // Arity is checked before any argument evaluates or binds
                if decl.params.len() != args.len() {
                    return Err(RuntimeError::arity_mismatch(
                        &decl.name.node,
                        decl.params.len(),
                        args.len(),
                    )
                    .or_span(callee.span));
                }
                let arg_values = self.eval_args(args, env)?;
                self.invoke_user(&decl, &closure, None, arg_values)
            }
            Callee::Builtin(name) => {
                let arg_values = self.eval_args(args, env)?;
                let result = self.builtins.dispatch(&name, &arg_values)?;
                // An error value from the library is a failed call
                match result {
                    Value::Error(message) => {
                        Err(RuntimeError::runtime(message.as_str().to_string()))
                    }
                    other => Ok(other),
                }
            }
            Callee::Macro(decl) => {
                if decl.params.len() != args.len() {
                    return Err(RuntimeError::arity_mismatch(
                        &decl.name.node,
                        decl.params.len(),
                        args.len(),
                    )
                    .or_span(callee.span));
                }
                let arg_values = self.eval_args(args, env)?;
                self.expand_macro(&decl, arg_values, env)
            }
        }
    }

    fn resolve_callee(&mut self, callee: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Callee> {
        if let Expr::Ident(name) = &callee.node {
            if let Some(value) = env.borrow().get(name) {
                return self.callable_from_value(value, callee.span);
            }
            if let Some(func) = env.borrow().lookup_function(name) {
                return self.callable_from_value(Value::Function(func), callee.span);
            }
            if self.builtins.contains(name) {
                return Ok(Callee::Builtin(name.clone()));
            }
            return Err(RuntimeError::undefined_function(name).or_span(callee.span));
        }
        let value = self.eval(callee, env)?;
        self.callable_from_value(value, callee.span)
    }

    fn callable_from_value(&self, value: Value, span: Span) -> InterpResult<Callee> {
        match value {
            Value::Function(func) => match &*func {
                Function::Builtin { name } => Ok(Callee::Builtin(name.clone())),
                Function::User { decl, closure } => {
                    Ok(Callee::User(Rc::clone(decl), Rc::clone(closure)))
                }
            },
            Value::Macro(decl) => Ok(Callee::Macro(decl)),
            other => {
                Err(RuntimeError::type_error("function", other.type_name()).or_span(span))
            }
        }
    }

    /// Evaluate call arguments in the caller's environment, left to right
    fn eval_args(
        &mut self,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> InterpResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    /// Run a user-defined function or method body.
    ///
    /// The activation environment's parent is the function's captured
    /// closure environment, not the call site; `Return` is absorbed here and
    /// fall-through yields null.
    fn invoke_user(
        &mut self,
        decl: &Rc<FnDecl>,
        closure: &EnvRef,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> InterpResult<Value> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            self.depth -= 1;
            return Err(RuntimeError::stack_overflow());
        }

        let call_env = child_env(closure);
        if let Some(this) = this {
            call_env
                .borrow_mut()
                .declare("this".to_string(), this, DeclType::Unknown, false);
        }
        for (param, arg) in decl.params.iter().zip(args.into_iter()) {
            call_env
                .borrow_mut()
                .declare(param.name.node.clone(), arg, param.ty, false);
        }

        let flow = self.run_seq(&decl.body, &call_env);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Value::Null),
            Flow::Break => Err(RuntimeError::loose_control("break")),
            Flow::Continue => Err(RuntimeError::loose_control("continue")),
        }
    }

    /// Expand a macro at its call site: parameters bind to the evaluated
    /// arguments in a child of the caller's scope and the template body runs
    /// there, so free names resolve dynamically at the expansion site.
    fn expand_macro(
        &mut self,
        decl: &Rc<crate::ast::MacroDecl>,
        args: Vec<Value>,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let expansion_env = child_env(env);
        for (param, arg) in decl.params.iter().zip(args.into_iter()) {
            expansion_env
                .borrow_mut()
                .declare(param.node.clone(), arg, DeclType::Unknown, false);
        }
        match self.run_seq(&decl.body, &expansion_env)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
            Flow::Break => Err(RuntimeError::loose_control("break")),
            Flow::Continue => Err(RuntimeError::loose_control("continue")),
        }
    }

    fn eval_method_call(
        &mut self,
        object: &Spanned<Expr>,
        method: &Spanned<String>,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let obj = self.eval(object, env)?;
        let inst = match obj {
            Value::Struct(inst) => inst,
            other => {
                return Err(RuntimeError::type_error("struct", other.type_name())
                    .or_span(object.span));
            }
        };
        let decl = inst.ty.find_method(&method.node).ok_or_else(|| {
            RuntimeError::runtime(format!(
                "struct {} has no method named {}",
                inst.ty.name, method.node
            ))
            .or_span(method.span)
        })?;
        if decl.params.len() != args.len() {
            return Err(RuntimeError::arity_mismatch(
                &format!("{}.{}", inst.ty.name, method.node),
                decl.params.len(),
                args.len(),
            )
            .or_span(method.span));
        }
        let arg_values = self.eval_args(args, env)?;
        let method_env = Rc::clone(&inst.ty.env);
        self.invoke_user(&decl, &method_env, Some(Value::Struct(inst)), arg_values)
    }

    fn eval_new(
        &mut self,
        type_name: &Spanned<String>,
        inits: &[(Spanned<String>, Spanned<Expr>)],
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let ty = self
            .structs
            .get(&type_name.node)
            .cloned()
            .ok_or_else(|| {
                RuntimeError::undefined_type(&type_name.node).or_span(type_name.span)
            })?;

        // Fields start null, then named initializers store in order
        let inst = Rc::new(StructInstance::new(Rc::clone(&ty)));
        for (field, init) in inits {
            let value = self.eval(init, env)?;
            if !inst.set_field(&field.node, value) {
                return Err(
                    RuntimeError::undefined_field(&ty.name, &field.node).or_span(field.span)
                );
            }
        }

        if let Some(ctor) = &ty.constructor {
            if !ctor.params.is_empty() {
                return Err(RuntimeError::arity_mismatch(
                    &format!("{}.constructor", ty.name),
                    ctor.params.len(),
                    0,
                )
                .or_span(type_name.span));
            }
            let ctor = Rc::clone(ctor);
            let ctor_env = Rc::clone(&ty.env);
            self.invoke_user(&ctor, &ctor_env, Some(Value::Struct(Rc::clone(&inst))), Vec::new())?;
        }

        Ok(Value::Struct(inst))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a runtime value satisfies a declared type annotation. Null is
/// accepted everywhere, like an uninitialized slot.
fn type_conforms(ty: DeclType, value: &Value) -> bool {
    match (ty, value) {
        (DeclType::Unknown, _) => true,
        (_, Value::Null) => true,
        (DeclType::Int, Value::Int(_)) => true,
        (DeclType::Float, Value::Float(_)) => true,
        (DeclType::Bool, Value::Bool(_)) => true,
        (DeclType::Char, Value::Char(_)) => true,
        (DeclType::Str, Value::Str(_)) => true,
        (DeclType::Array, Value::Array(_)) => true,
        (DeclType::Pointer, Value::Pointer(_)) => true,
        (DeclType::Void, _) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;

    /// Run a source program, returning the captured print output
    fn run(source: &str) -> String {
        let mut interp = Interpreter::new();
        let out = interp.capture_output();
        let program = parse(tokenize(source).expect("lex")).expect("parse");
        interp.run_program(&program).expect("run");
        let captured = out.borrow().clone();
        captured
    }

    /// Run a source program expected to fail, returning the error
    fn run_err(source: &str) -> RuntimeError {
        let mut interp = Interpreter::new();
        interp.capture_output();
        let program = parse(tokenize(source).expect("lex")).expect("parse");
        interp.run_program(&program).expect_err("expected failure")
    }

    #[test]
    fn test_print_int() {
        assert_eq!(run("print 42;"), "42\n");
    }

    #[test]
    fn test_print_float_has_six_digits() {
        assert_eq!(run("print 1.5;"), "1.500000\n");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("print 2 + 3 * 4;"), "14\n");
        assert_eq!(run("print (2 + 3) * 4;"), "20\n");
        assert_eq!(run("print 7 / 2;"), "3\n");
        assert_eq!(run("print 7 % 3;"), "1\n");
        assert_eq!(run("print 1.5 + 2.5;"), "4.000000\n");
    }

    #[test]
    fn test_mixed_numeric_arithmetic_is_type_error() {
        assert_eq!(run_err("print 1 + 2.0;").kind, ErrorKind::Type);
        assert_eq!(run_err("print 1.0 * 2;").kind, ErrorKind::Type);
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(run(r#"print "a" + "b";"#), "ab\n");
        assert_eq!(run(r#"print "a" + 1;"#), "a1\n");
        assert_eq!(run(r#"print 2 + "b";"#), "2b\n");
        assert_eq!(run(r#"print "x=" + 1.5;"#), "x=1.500000\n");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run_err("print 1 / 0;").kind, ErrorKind::Runtime);
        assert_eq!(run_err("print 1 % 0;").kind, ErrorKind::Runtime);
        assert!(run_err("print 1 / 0;").message.contains("division by zero"));
        assert_eq!(run_err("print 1.0 / 0.0;").kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_equality_across_types_is_false() {
        assert_eq!(run(r#"print 1 == "1";"#), "false\n");
        assert_eq!(run(r#"print 1 != "1";"#), "true\n");
        assert_eq!(run("print 1 == 1.0;"), "false\n");
        assert_eq!(run("print null == null;"), "true\n");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("print 1 < 2;"), "true\n");
        assert_eq!(run("print 'a' < 'b';"), "true\n");
        assert_eq!(run_err("print 1 < 2.0;").kind, ErrorKind::Type);
        assert_eq!(run_err(r#"print "a" < "b";"#).kind, ErrorKind::Type);
    }

    #[test]
    fn test_logical_operators_require_bools() {
        assert_eq!(run("print true && false;"), "false\n");
        assert_eq!(run("print true || false;"), "true\n");
        assert_eq!(run_err("print true && 1;").kind, ErrorKind::Type);
    }

    #[test]
    fn test_logical_operators_do_not_short_circuit() {
        // The right operand always evaluates, so its failure surfaces even
        // when the left side already decides the result
        assert_eq!(run_err("print false && (1 / 0 == 0);").kind, ErrorKind::Runtime);
        assert_eq!(run_err("print true || (1 / 0 == 0);").kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_variables_and_assignment() {
        assert_eq!(run("let x = 1; x = 2; print x;"), "2\n");
        assert_eq!(run("let x = 10; x += 5; print x;"), "15\n");
        assert_eq!(run("let x = 10; x -= 3; x *= 2; print x;"), "14\n");
        assert_eq!(run("let x = 10; x /= 4; print x;"), "2\n");
        assert_eq!(run("let x = 10; x %= 4; print x;"), "2\n");
    }

    #[test]
    fn test_assignment_yields_value() {
        assert_eq!(run("let a = 0; let b = 0; a = b = 7; print a;"), "7\n");
    }

    #[test]
    fn test_assignment_to_undeclared_fails() {
        let err = run_err("x = 1;");
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert!(err.message.contains("undefined variable"));
    }

    #[test]
    fn test_const_assignment_fails() {
        let err = run_err("const x = 1; x = 2;");
        assert!(err.message.contains("const"));
    }

    #[test]
    fn test_declared_type_mismatch() {
        assert_eq!(run_err("let x: int = 1.5;").kind, ErrorKind::Type);
        assert_eq!(run("let x: int = 1; print x;"), "1\n");
        // Uninitialized slots hold null regardless of annotation
        assert_eq!(run("let x: string; print x;"), "null\n");
    }

    #[test]
    fn test_shadowing_preserves_outer_binding() {
        assert_eq!(run("let x = 1; { let x = 2; } print x;"), "1\n");
        assert_eq!(run("let x = 1; { let x = 2; print x; } print x;"), "2\n1\n");
    }

    #[test]
    fn test_inner_scope_can_mutate_outer() {
        assert_eq!(run("let x = 1; { x = 5; } print x;"), "5\n");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(run("if (1 < 2) { print 1; } else { print 2; }"), "1\n");
        assert_eq!(run("if (false) { print 1; } else { print 2; }"), "2\n");
        // Non-zero ints are truthy conditions
        assert_eq!(run("if (3) { print 1; }"), "1\n");
        assert_eq!(run("if (0) { print 1; } else { print 2; }"), "2\n");
        assert_eq!(run_err(r#"if ("s") { print 1; }"#).kind, ErrorKind::Type);
    }

    #[test]
    fn test_ternary_evaluates_one_arm() {
        assert_eq!(run("print 1 < 2 ? 10 : 20;"), "10\n");
        // The unchosen arm must not evaluate
        assert_eq!(run("print true ? 1 : 1 / 0;"), "1\n");
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run("let i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            run("for (let i = 0; i < 3; i = i + 1) { print i; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop_continue_runs_update() {
        let src = "for (let i = 0; i < 5; i = i + 1) { if (i % 2 == 0) { continue; } print i; }";
        assert_eq!(run(src), "1\n3\n");
    }

    #[test]
    fn test_break_exits_nearest_loop() {
        let src = "
            let i = 0;
            while (true) {
                let j = 0;
                while (true) {
                    j = j + 1;
                    if (j == 2) { break; }
                }
                print j;
                i = i + 1;
                if (i == 2) { break; }
            }
            print i;
        ";
        assert_eq!(run(src), "2\n2\n2\n");
    }

    #[test]
    fn test_loop_infinite_with_break() {
        assert_eq!(
            run("let n = 0; loop { n = n + 1; if (n == 3) { break; } } print n;"),
            "3\n"
        );
    }

    #[test]
    fn test_loop_range_inclusive() {
        assert_eq!(run("loop i from 1 to 3 { print i; }"), "1\n2\n3\n");
    }

    #[test]
    fn test_loop_in_array() {
        assert_eq!(run("loop x in [10, 20] { print x; }"), "10\n20\n");
    }

    #[test]
    fn test_loop_in_string() {
        assert_eq!(run(r#"loop c in "ab" { print c; }"#), "a\nb\n");
    }

    #[test]
    fn test_switch_fallthrough_until_break() {
        let src = "
            switch (1) {
                case 1:
                    print 1;
                case 2:
                    print 2;
                    break;
                case 3:
                    print 3;
            }
        ";
        assert_eq!(run(src), "1\n2\n");
    }

    #[test]
    fn test_switch_default() {
        let src = "switch (9) { case 1: print 1; default: print 0; }";
        assert_eq!(run(src), "0\n");
    }

    #[test]
    fn test_switch_requires_int() {
        assert_eq!(run_err(r#"switch ("x") { case 1: break; }"#).kind, ErrorKind::Type);
    }

    #[test]
    fn test_break_in_switch_stays_in_loop() {
        let src = "
            let i = 0;
            while (i < 3) {
                switch (i) {
                    case 1:
                        print 100;
                        break;
                    default:
                        print i;
                        break;
                }
                i = i + 1;
            }
        ";
        assert_eq!(run(src), "0\n100\n2\n");
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            run("fn add(a: int, b: int): int { return a + b; } print add(2, 3);"),
            "5\n"
        );
    }

    #[test]
    fn test_function_fall_through_returns_null() {
        assert_eq!(run("fn f() { } print f();"), "null\n");
    }

    #[test]
    fn test_return_unwinds_nested_loops() {
        let src = "
            fn find(): int {
                for (let i = 0; i < 10; i = i + 1) {
                    while (true) {
                        if (i == 3) { return i; }
                        break;
                    }
                }
                return -1;
            }
            print find();
        ";
        assert_eq!(run(src), "3\n");
    }

    #[test]
    fn test_arity_mismatch_is_type_error() {
        let err = run_err("fn f(a: int) { } f(1, 2);");
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(err.message.contains("expects 1 argument"));
    }

    #[test]
    fn test_arity_check_happens_before_argument_evaluation() {
        // The failing argument expression must never run
        let err = run_err("fn f(a: int) { } f(1 / 0, 2);");
        assert!(err.message.contains("expects 1 argument"));
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            run("fn fib(n: int): int { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } print fib(10);"),
            "55\n"
        );
    }

    #[test]
    fn test_functions_are_first_class() {
        let src = "
            fn double(x: int): int { return x * 2; }
            let f = double;
            print f(21);
        ";
        assert_eq!(run(src), "42\n");
    }

    #[test]
    fn test_closure_captures_declaration_site() {
        let src = "
            let counter = 0;
            fn bump() { counter = counter + 1; }
            bump();
            bump();
            print counter;
        ";
        assert_eq!(run(src), "2\n");
    }

    #[test]
    fn test_closure_sees_updates_after_declaration() {
        let src = "
            let x = 1;
            fn read(): int { return x; }
            x = 99;
            print read();
        ";
        assert_eq!(run(src), "99\n");
    }

    #[test]
    fn test_closure_parent_is_declaration_not_call_site() {
        let src = "
            let x = 1;
            fn read(): int { return x; }
            fn shadowed(): int {
                let x = 500;
                return read();
            }
            print shadowed();
        ";
        assert_eq!(run(src), "1\n");
    }

    #[test]
    fn test_calling_non_function_fails() {
        assert_eq!(run_err("let x = 1; x();").kind, ErrorKind::Type);
    }

    #[test]
    fn test_undefined_call_fails() {
        let err = run_err("missing();");
        assert!(err.message.contains("undefined function"));
    }

    #[test]
    fn test_builtin_dispatch() {
        assert_eq!(run("print abs(-3);"), "3\n");
        assert_eq!(run(r#"print len("abcd");"#), "4\n");
    }

    #[test]
    fn test_builtins_are_first_class() {
        assert_eq!(run("let f = abs; print f(-7);"), "7\n");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(run("print -3;"), "-3\n");
        assert_eq!(run("print !false;"), "true\n");
        assert_eq!(run_err("print -true;").kind, ErrorKind::Type);
        assert_eq!(run_err("print !1;").kind, ErrorKind::Type);
    }

    #[test]
    fn test_increment_decrement() {
        assert_eq!(run("let i = 5; print i++; print i;"), "5\n6\n");
        assert_eq!(run("let i = 5; print ++i; print i;"), "6\n6\n");
        assert_eq!(run("let i = 5; print i--; print --i;"), "5\n3\n");
        assert_eq!(run_err("let s = \"x\"; s++;").kind, ErrorKind::Type);
    }

    #[test]
    fn test_pointers_roundtrip() {
        assert_eq!(run("let x = 41; let p = &x; print *p;"), "41\n");
        assert_eq!(run("let x = 1; print typeof(&x);"), "pointer\n");
        assert_eq!(run_err("print *1;").kind, ErrorKind::Type);
    }

    #[test]
    fn test_pointer_snapshot_semantics() {
        // Address-of captures the value at that moment
        assert_eq!(run("let x = 1; let p = &x; x = 2; print *p;"), "1\n");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(run("let a = [1, 2, 3]; print a[0]; print a[2];"), "1\n3\n");
        assert_eq!(run("let a = [1, 2]; a[1] = 9; print a[1];"), "9\n");
        assert_eq!(run("print [1][0] + 1;"), "2\n");
        assert_eq!(run("print typeof([1]);"), "array\n");
        assert_eq!(run("print [1, 2];"), "[array]\n");
    }

    #[test]
    fn test_array_out_of_bounds_is_index_error() {
        assert_eq!(run_err("let a = [1]; print a[3];").kind, ErrorKind::Index);
        assert_eq!(run_err("let a = [1]; print a[-1];").kind, ErrorKind::Index);
        assert_eq!(run_err("let a = [1]; a[3] = 0;").kind, ErrorKind::Index);
    }

    #[test]
    fn test_string_indexing() {
        assert_eq!(run(r#"let s = "abc"; print s[1];"#), "b\n");
        assert_eq!(run_err(r#"let s = "abc"; print s[5];"#).kind, ErrorKind::Index);
    }

    #[test]
    fn test_typeof() {
        assert_eq!(run("print typeof(1);"), "int\n");
        assert_eq!(run("print typeof(1.0);"), "float\n");
        assert_eq!(run(r#"print typeof("s");"#), "string\n");
        assert_eq!(run("print typeof(null);"), "null\n");
        assert_eq!(run("print typeof(abs);"), "function\n");
    }

    #[test]
    fn test_sizeof_alignof() {
        assert_eq!(run("print sizeof(1);"), "8\n");
        assert_eq!(run("print sizeof(true);"), "1\n");
        assert_eq!(run("print sizeof('c');"), "4\n");
        assert_eq!(run("print alignof(true);"), "1\n");
        assert_eq!(run("print alignof(1.0);"), "8\n");
    }

    #[test]
    fn test_struct_declaration_and_new() {
        let src = "struct P { x: int, y: int } let p = new P(x: 1, y: 2); print p.x; print p.y;";
        assert_eq!(run(src), "1\n2\n");
    }

    #[test]
    fn test_struct_fields_default_to_null() {
        assert_eq!(
            run("struct P { x: int, y: int } let p = new P(x: 1); print p.y;"),
            "null\n"
        );
    }

    #[test]
    fn test_new_unknown_type_fails() {
        let err = run_err("let p = new Ghost();");
        assert!(err.message.contains("undefined struct type"));
    }

    #[test]
    fn test_new_unknown_field_fails() {
        let err = run_err("struct P { x: int } let p = new P(z: 1);");
        assert!(err.message.contains("no field named z"));
    }

    #[test]
    fn test_struct_field_assignment() {
        assert_eq!(
            run("struct P { x: int } let p = new P(x: 1); p.x = 5; print p.x;"),
            "5\n"
        );
        assert_eq!(
            run("struct P { x: int } let p = new P(x: 1); p.x += 2; print p.x;"),
            "3\n"
        );
    }

    #[test]
    fn test_struct_methods() {
        let src = "
            struct Counter {
                n: int,
                fn bump() { this.n = this.n + 1; }
                fn get(): int { return this.n; }
            }
            let c = new Counter(n: 0);
            c.bump();
            c.bump();
            print c.get();
        ";
        assert_eq!(run(src), "2\n");
    }

    #[test]
    fn test_struct_method_with_args() {
        let src = "
            struct Acc { total: int, fn add(v: int) { this.total = this.total + v; } }
            let a = new Acc(total: 0);
            a.add(4);
            a.add(5);
            print a.total;
        ";
        assert_eq!(run(src), "9\n");
    }

    #[test]
    fn test_struct_constructor_runs_after_initializers() {
        let src = "
            struct P {
                x: int,
                fn constructor() { this.x = this.x * 10; }
            }
            let p = new P(x: 4);
            print p.x;
        ";
        assert_eq!(run(src), "40\n");
    }

    #[test]
    fn test_struct_parent_fallback() {
        let src = "
            struct Animal {
                name: string,
                fn describe(): string { return this.name; }
            }
            struct Dog : Animal {
                breed: string,
            }
            let d = new Dog(name: \"rex\", breed: \"lab\");
            print d.describe();
            print d.breed;
        ";
        assert_eq!(run(src), "rex\nlab\n");
    }

    #[test]
    fn test_method_on_non_struct_fails() {
        assert_eq!(run_err("let x = 1; x.frob();").kind, ErrorKind::Type);
    }

    #[test]
    fn test_unknown_method_fails() {
        let err = run_err("struct P { x: int } let p = new P(x: 1); p.frob();");
        assert!(err.message.contains("no method named frob"));
    }

    #[test]
    fn test_method_arity_mismatch() {
        let err = run_err(
            "struct P { x: int, fn set(v: int) { this.x = v; } } let p = new P(x: 1); p.set();",
        );
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_macro_expansion() {
        let src = "
            macro twice(v) { print v; print v; }
            twice(7);
        ";
        assert_eq!(run(src), "7\n7\n");
    }

    #[test]
    fn test_macro_sees_call_site_bindings() {
        let src = "
            macro show() { print local; }
            let local = 3;
            show();
        ";
        assert_eq!(run(src), "3\n");
    }

    #[test]
    fn test_break_outside_loop_is_runtime_error() {
        let err = run_err("fn f() { break; } f();");
        assert!(err.message.contains("break outside"));
    }

    #[test]
    fn test_error_carries_span() {
        let err = run_err("let x = missing;");
        assert!(err.span.is_some());
    }

    #[test]
    fn test_import_missing_file_is_import_error() {
        assert_eq!(run_err(r#"import "no_such_module.tn";"#).kind, ErrorKind::Import);
    }

    #[test]
    fn test_run_main_exit_value() {
        let mut interp = Interpreter::new();
        interp.capture_output();
        let program =
            parse(tokenize("fn main(): int { return 7; }").unwrap()).unwrap();
        interp.run_program(&program).unwrap();
        assert_eq!(interp.run_main().unwrap(), Some(Value::Int(7)));
    }

    #[test]
    fn test_run_main_absent() {
        let mut interp = Interpreter::new();
        interp.capture_output();
        let program = parse(tokenize("print 1;").unwrap()).unwrap();
        interp.run_program(&program).unwrap();
        assert_eq!(interp.run_main().unwrap(), None);
    }

    #[test]
    fn test_value_released_when_scope_exits() {
        let mut interp = Interpreter::new();
        interp.capture_output();
        let program = parse(
            tokenize("let keep = \"outer\"; { let tmp = \"inner\" + \"x\"; } print keep;")
                .unwrap(),
        )
        .unwrap();
        interp.run_program(&program).unwrap();
        // The inner binding is gone from the global scope entirely
        assert!(!interp.global_env().borrow().contains("tmp"));
        assert!(interp.global_env().borrow().contains("keep"));
    }

    #[test]
    fn test_reading_variable_retains_copy() {
        let mut interp = Interpreter::new();
        interp.capture_output();
        let program = parse(tokenize("let s = \"shared\";").unwrap()).unwrap();
        interp.run_program(&program).unwrap();

        let first = interp.global_env().borrow().get("s").unwrap();
        assert_eq!(first.ref_count(), Some(2));
        let second = interp.global_env().borrow().get("s").unwrap();
        assert_eq!(first.ref_count(), Some(3));
        drop(second);
        assert_eq!(first.ref_count(), Some(2));
    }
}
