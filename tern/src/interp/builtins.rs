//! Builtin library functions
//!
//! Builtins live outside the evaluator core and are reached through a single
//! name-based dispatch boundary. The evaluator only resolves the name and
//! evaluates arguments; argument count and type validation happen here.

use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::BufRead;
use std::rc::Rc;

/// Builtin function type
pub type BuiltinFn = fn(&[Value]) -> InterpResult<Value>;

/// Registry mapping builtin names to implementations
pub struct Builtins {
    table: HashMap<String, BuiltinFn>,
}

impl Builtins {
    pub fn new() -> Self {
        let mut b = Builtins {
            table: HashMap::new(),
        };
        b.register();
        b
    }

    fn register(&mut self) {
        // I/O
        self.insert("read_line", builtin_read_line);
        self.insert("read_file", builtin_read_file);
        self.insert("write_file", builtin_write_file);

        // Math
        self.insert("abs", builtin_abs);
        self.insert("min", builtin_min);
        self.insert("max", builtin_max);
        self.insert("sqrt", builtin_sqrt);
        self.insert("pow", builtin_pow);
        self.insert("floor", builtin_floor);
        self.insert("ceil", builtin_ceil);

        // Strings and characters
        self.insert("len", builtin_len);
        self.insert("str", builtin_str);
        self.insert("chr", builtin_chr);
        self.insert("ord", builtin_ord);
        self.insert("char_at", builtin_char_at);
        self.insert("substr", builtin_substr);

        // Conversions
        self.insert("int", builtin_int);
        self.insert("float", builtin_float);

        // Arrays
        self.insert("push", builtin_push);
        self.insert("pop", builtin_pop);

        // Bit operations
        self.insert("bit_and", builtin_bit_and);
        self.insert("bit_or", builtin_bit_or);
        self.insert("bit_xor", builtin_bit_xor);
        self.insert("bit_not", builtin_bit_not);
        self.insert("bit_shl", builtin_bit_shl);
        self.insert("bit_shr", builtin_bit_shr);

        // List ADT
        self.insert("list_new", builtin_list_new);
        self.insert("list_push", builtin_list_push);
        self.insert("list_pop", builtin_list_pop);
        self.insert("list_get", builtin_list_get);
        self.insert("list_set", builtin_list_set);
        self.insert("list_len", builtin_list_len);

        // Map ADT
        self.insert("map_new", builtin_map_new);
        self.insert("map_put", builtin_map_put);
        self.insert("map_get", builtin_map_get);
        self.insert("map_has", builtin_map_has);
        self.insert("map_remove", builtin_map_remove);
        self.insert("map_len", builtin_map_len);
        self.insert("map_keys", builtin_map_keys);

        // Set ADT
        self.insert("set_new", builtin_set_new);
        self.insert("set_add", builtin_set_add);
        self.insert("set_has", builtin_set_has);
        self.insert("set_remove", builtin_set_remove);
        self.insert("set_len", builtin_set_len);

        self.insert("assert", builtin_assert);
    }

    fn insert(&mut self, name: &str, f: BuiltinFn) {
        self.table.insert(name.to_string(), f);
    }

    /// Whether `name` resolves to a builtin
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Dispatch a builtin call by name
    pub fn dispatch(&self, name: &str, args: &[Value]) -> InterpResult<Value> {
        match self.table.get(name) {
            Some(f) => f(args),
            None => Err(RuntimeError::undefined_function(name)),
        }
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

// ---- argument helpers ----

fn expect_arity(name: &str, args: &[Value], count: usize) -> InterpResult<()> {
    if args.len() != count {
        return Err(RuntimeError::arity_mismatch(name, count, args.len()));
    }
    Ok(())
}

fn expect_int(name: &str, v: &Value) -> InterpResult<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::type_error(
            &format!("int argument for {name}"),
            other.type_name(),
        )),
    }
}

fn expect_str(name: &str, v: &Value) -> InterpResult<Rc<String>> {
    match v {
        Value::Str(s) => Ok(Rc::clone(s)),
        other => Err(RuntimeError::type_error(
            &format!("string argument for {name}"),
            other.type_name(),
        )),
    }
}

fn expect_numeric(name: &str, v: &Value) -> InterpResult<f64> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(RuntimeError::type_error(
            &format!("numeric argument for {name}"),
            other.type_name(),
        )),
    }
}

// ---- I/O ----

fn builtin_read_line(args: &[Value]) -> InterpResult<Value> {
    expect_arity("read_line", args, 0)?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RuntimeError::runtime(format!("read_line failed: {e}")))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::Str(Rc::new(line)))
}

fn builtin_read_file(args: &[Value]) -> InterpResult<Value> {
    expect_arity("read_file", args, 1)?;
    let path = expect_str("read_file", &args[0])?;
    match std::fs::read_to_string(path.as_str()) {
        Ok(contents) => Ok(Value::Str(Rc::new(contents))),
        // Reported as an error value; the caller turns it into a failure
        Err(e) => Ok(Value::Error(Rc::new(format!("read_file {path}: {e}")))),
    }
}

fn builtin_write_file(args: &[Value]) -> InterpResult<Value> {
    expect_arity("write_file", args, 2)?;
    let path = expect_str("write_file", &args[0])?;
    let contents = expect_str("write_file", &args[1])?;
    match std::fs::write(path.as_str(), contents.as_bytes()) {
        Ok(()) => Ok(Value::Bool(true)),
        Err(e) => Ok(Value::Error(Rc::new(format!("write_file {path}: {e}")))),
    }
}

// ---- math ----

fn builtin_abs(args: &[Value]) -> InterpResult<Value> {
    expect_arity("abs", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(RuntimeError::type_error("numeric", other.type_name())),
    }
}

fn builtin_min(args: &[Value]) -> InterpResult<Value> {
    expect_arity("min", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(*a.min(b))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a.min(*b))),
        (a, b) => Err(RuntimeError::type_error(
            "matching numeric operands",
            &format!("{} and {}", a.type_name(), b.type_name()),
        )),
    }
}

fn builtin_max(args: &[Value]) -> InterpResult<Value> {
    expect_arity("max", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(*a.max(b))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a.max(*b))),
        (a, b) => Err(RuntimeError::type_error(
            "matching numeric operands",
            &format!("{} and {}", a.type_name(), b.type_name()),
        )),
    }
}

fn builtin_sqrt(args: &[Value]) -> InterpResult<Value> {
    expect_arity("sqrt", args, 1)?;
    let x = expect_numeric("sqrt", &args[0])?;
    Ok(Value::Float(x.sqrt()))
}

fn builtin_pow(args: &[Value]) -> InterpResult<Value> {
    expect_arity("pow", args, 2)?;
    let base = expect_numeric("pow", &args[0])?;
    let exp = expect_numeric("pow", &args[1])?;
    Ok(Value::Float(base.powf(exp)))
}

fn builtin_floor(args: &[Value]) -> InterpResult<Value> {
    expect_arity("floor", args, 1)?;
    let x = expect_numeric("floor", &args[0])?;
    Ok(Value::Float(x.floor()))
}

fn builtin_ceil(args: &[Value]) -> InterpResult<Value> {
    expect_arity("ceil", args, 1)?;
    let x = expect_numeric("ceil", &args[0])?;
    Ok(Value::Float(x.ceil()))
}

// ---- strings and characters ----

fn builtin_len(args: &[Value]) -> InterpResult<Value> {
    expect_arity("len", args, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Array(a) | Value::List(a) => a.borrow().len(),
        Value::Map(m) => m.borrow().len(),
        Value::Set(s) => s.borrow().len(),
        other => {
            return Err(RuntimeError::type_error(
                "string or collection",
                other.type_name(),
            ));
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_str(args: &[Value]) -> InterpResult<Value> {
    expect_arity("str", args, 1)?;
    Ok(Value::Str(Rc::new(args[0].to_string())))
}

fn builtin_chr(args: &[Value]) -> InterpResult<Value> {
    expect_arity("chr", args, 1)?;
    let code = expect_int("chr", &args[0])?;
    let ch = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RuntimeError::runtime(format!("chr: invalid code point {code}")))?;
    Ok(Value::Char(ch))
}

fn builtin_ord(args: &[Value]) -> InterpResult<Value> {
    expect_arity("ord", args, 1)?;
    match &args[0] {
        Value::Char(c) => Ok(Value::Int(*c as i64)),
        other => Err(RuntimeError::type_error("char", other.type_name())),
    }
}

fn builtin_char_at(args: &[Value]) -> InterpResult<Value> {
    expect_arity("char_at", args, 2)?;
    let s = expect_str("char_at", &args[0])?;
    let idx = expect_int("char_at", &args[1])?;
    if idx < 0 {
        return Err(RuntimeError::index_out_of_bounds(idx, s.chars().count()));
    }
    s.chars()
        .nth(idx as usize)
        .map(Value::Char)
        .ok_or_else(|| RuntimeError::index_out_of_bounds(idx, s.chars().count()))
}

fn builtin_substr(args: &[Value]) -> InterpResult<Value> {
    expect_arity("substr", args, 3)?;
    let s = expect_str("substr", &args[0])?;
    let start = expect_int("substr", &args[1])?;
    let count = expect_int("substr", &args[2])?;
    if start < 0 || count < 0 {
        return Err(RuntimeError::index_out_of_bounds(start.min(count), s.len()));
    }
    let out: String = s.chars().skip(start as usize).take(count as usize).collect();
    Ok(Value::Str(Rc::new(out)))
}

// ---- conversions ----

fn builtin_int(args: &[Value]) -> InterpResult<Value> {
    expect_arity("int", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Char(c) => Ok(Value::Int(*c as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| RuntimeError::runtime(format!("int: cannot parse {s:?}"))),
        other => Err(RuntimeError::type_error("convertible value", other.type_name())),
    }
}

fn builtin_float(args: &[Value]) -> InterpResult<Value> {
    expect_arity("float", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| RuntimeError::runtime(format!("float: cannot parse {s:?}"))),
        other => Err(RuntimeError::type_error("convertible value", other.type_name())),
    }
}

// ---- arrays ----

fn array_arg<'a>(name: &str, v: &'a Value) -> InterpResult<&'a Rc<RefCell<Vec<Value>>>> {
    match v {
        Value::Array(a) => Ok(a),
        other => Err(RuntimeError::type_error(
            &format!("array argument for {name}"),
            other.type_name(),
        )),
    }
}

fn builtin_push(args: &[Value]) -> InterpResult<Value> {
    expect_arity("push", args, 2)?;
    let arr = array_arg("push", &args[0])?;
    arr.borrow_mut().push(args[1].clone());
    Ok(Value::Null)
}

fn builtin_pop(args: &[Value]) -> InterpResult<Value> {
    expect_arity("pop", args, 1)?;
    let arr = array_arg("pop", &args[0])?;
    let popped = arr.borrow_mut().pop();
    popped.ok_or_else(|| RuntimeError::index_out_of_bounds(0, 0))
}

// ---- bit operations ----

fn builtin_bit_and(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_and", args, 2)?;
    Ok(Value::Int(
        expect_int("bit_and", &args[0])? & expect_int("bit_and", &args[1])?,
    ))
}

fn builtin_bit_or(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_or", args, 2)?;
    Ok(Value::Int(
        expect_int("bit_or", &args[0])? | expect_int("bit_or", &args[1])?,
    ))
}

fn builtin_bit_xor(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_xor", args, 2)?;
    Ok(Value::Int(
        expect_int("bit_xor", &args[0])? ^ expect_int("bit_xor", &args[1])?,
    ))
}

fn builtin_bit_not(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_not", args, 1)?;
    Ok(Value::Int(!expect_int("bit_not", &args[0])?))
}

fn builtin_bit_shl(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_shl", args, 2)?;
    let value = expect_int("bit_shl", &args[0])?;
    let by = expect_int("bit_shl", &args[1])?;
    Ok(Value::Int(value.wrapping_shl(by as u32)))
}

fn builtin_bit_shr(args: &[Value]) -> InterpResult<Value> {
    expect_arity("bit_shr", args, 2)?;
    let value = expect_int("bit_shr", &args[0])?;
    let by = expect_int("bit_shr", &args[1])?;
    Ok(Value::Int(value.wrapping_shr(by as u32)))
}

// ---- list ADT ----

fn list_arg<'a>(name: &str, v: &'a Value) -> InterpResult<&'a Rc<RefCell<Vec<Value>>>> {
    match v {
        Value::List(l) => Ok(l),
        other => Err(RuntimeError::type_error(
            &format!("list argument for {name}"),
            other.type_name(),
        )),
    }
}

fn builtin_list_new(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_new", args, 0)?;
    Ok(Value::List(Rc::new(RefCell::new(Vec::new()))))
}

fn builtin_list_push(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_push", args, 2)?;
    let list = list_arg("list_push", &args[0])?;
    list.borrow_mut().push(args[1].clone());
    Ok(Value::Null)
}

fn builtin_list_pop(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_pop", args, 1)?;
    let list = list_arg("list_pop", &args[0])?;
    let popped = list.borrow_mut().pop();
    popped.ok_or_else(|| RuntimeError::index_out_of_bounds(0, 0))
}

fn builtin_list_get(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_get", args, 2)?;
    let list = list_arg("list_get", &args[0])?;
    let idx = expect_int("list_get", &args[1])?;
    let list = list.borrow();
    if idx < 0 || idx as usize >= list.len() {
        return Err(RuntimeError::index_out_of_bounds(idx, list.len()));
    }
    Ok(list[idx as usize].clone())
}

fn builtin_list_set(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_set", args, 3)?;
    let list = list_arg("list_set", &args[0])?;
    let idx = expect_int("list_set", &args[1])?;
    let mut list = list.borrow_mut();
    if idx < 0 || idx as usize >= list.len() {
        return Err(RuntimeError::index_out_of_bounds(idx, list.len()));
    }
    list[idx as usize] = args[2].clone();
    Ok(Value::Null)
}

fn builtin_list_len(args: &[Value]) -> InterpResult<Value> {
    expect_arity("list_len", args, 1)?;
    let list = list_arg("list_len", &args[0])?;
    let len = list.borrow().len();
    Ok(Value::Int(len as i64))
}

// ---- map ADT ----

fn map_arg<'a>(name: &str, v: &'a Value) -> InterpResult<&'a Rc<RefCell<BTreeMap<String, Value>>>> {
    match v {
        Value::Map(m) => Ok(m),
        other => Err(RuntimeError::type_error(
            &format!("map argument for {name}"),
            other.type_name(),
        )),
    }
}

fn builtin_map_new(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_new", args, 0)?;
    Ok(Value::Map(Rc::new(RefCell::new(BTreeMap::new()))))
}

fn builtin_map_put(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_put", args, 3)?;
    let map = map_arg("map_put", &args[0])?;
    let key = expect_str("map_put", &args[1])?;
    map.borrow_mut().insert(key.as_str().to_string(), args[2].clone());
    Ok(Value::Null)
}

fn builtin_map_get(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_get", args, 2)?;
    let map = map_arg("map_get", &args[0])?;
    let key = expect_str("map_get", &args[1])?;
    Ok(map.borrow().get(key.as_str()).cloned().unwrap_or(Value::Null))
}

fn builtin_map_has(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_has", args, 2)?;
    let map = map_arg("map_has", &args[0])?;
    let key = expect_str("map_has", &args[1])?;
    Ok(Value::Bool(map.borrow().contains_key(key.as_str())))
}

fn builtin_map_remove(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_remove", args, 2)?;
    let map = map_arg("map_remove", &args[0])?;
    let key = expect_str("map_remove", &args[1])?;
    Ok(Value::Bool(map.borrow_mut().remove(key.as_str()).is_some()))
}

fn builtin_map_len(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_len", args, 1)?;
    let map = map_arg("map_len", &args[0])?;
    let len = map.borrow().len();
    Ok(Value::Int(len as i64))
}

fn builtin_map_keys(args: &[Value]) -> InterpResult<Value> {
    expect_arity("map_keys", args, 1)?;
    let map = map_arg("map_keys", &args[0])?;
    let keys: Vec<Value> = map
        .borrow()
        .keys()
        .map(|k| Value::Str(Rc::new(k.clone())))
        .collect();
    Ok(Value::List(Rc::new(RefCell::new(keys))))
}

// ---- set ADT ----

fn set_arg<'a>(name: &str, v: &'a Value) -> InterpResult<&'a Rc<RefCell<BTreeSet<String>>>> {
    match v {
        Value::Set(s) => Ok(s),
        other => Err(RuntimeError::type_error(
            &format!("set argument for {name}"),
            other.type_name(),
        )),
    }
}

fn builtin_set_new(args: &[Value]) -> InterpResult<Value> {
    expect_arity("set_new", args, 0)?;
    Ok(Value::Set(Rc::new(RefCell::new(BTreeSet::new()))))
}

fn builtin_set_add(args: &[Value]) -> InterpResult<Value> {
    expect_arity("set_add", args, 2)?;
    let set = set_arg("set_add", &args[0])?;
    let member = expect_str("set_add", &args[1])?;
    Ok(Value::Bool(set.borrow_mut().insert(member.as_str().to_string())))
}

fn builtin_set_has(args: &[Value]) -> InterpResult<Value> {
    expect_arity("set_has", args, 2)?;
    let set = set_arg("set_has", &args[0])?;
    let member = expect_str("set_has", &args[1])?;
    Ok(Value::Bool(set.borrow().contains(member.as_str())))
}

fn builtin_set_remove(args: &[Value]) -> InterpResult<Value> {
    expect_arity("set_remove", args, 2)?;
    let set = set_arg("set_remove", &args[0])?;
    let member = expect_str("set_remove", &args[1])?;
    Ok(Value::Bool(set.borrow_mut().remove(member.as_str())))
}

fn builtin_set_len(args: &[Value]) -> InterpResult<Value> {
    expect_arity("set_len", args, 1)?;
    let set = set_arg("set_len", &args[0])?;
    let len = set.borrow().len();
    Ok(Value::Int(len as i64))
}

fn builtin_assert(args: &[Value]) -> InterpResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(RuntimeError::arity_mismatch("assert", 1, args.len()));
    }
    let ok = match &args[0] {
        Value::Bool(b) => *b,
        other => {
            return Err(RuntimeError::type_error("bool", other.type_name()));
        }
    };
    if !ok {
        let message = match args.get(1) {
            Some(Value::Str(s)) => format!("assertion failed: {s}"),
            _ => "assertion failed".to_string(),
        };
        return Err(RuntimeError::runtime(message));
    }
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;

    fn dispatch(name: &str, args: &[Value]) -> InterpResult<Value> {
        Builtins::new().dispatch(name, args)
    }

    #[test]
    fn test_dispatch_unknown_name() {
        let err = dispatch("nope", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_abs() {
        assert_eq!(dispatch("abs", &[Value::Int(-4)]).unwrap(), Value::Int(4));
        assert_eq!(
            dispatch("abs", &[Value::Float(-1.5)]).unwrap(),
            Value::Float(1.5)
        );
        assert!(dispatch("abs", &[Value::Null]).is_err());
    }

    #[test]
    fn test_min_max_require_matching_types() {
        assert_eq!(
            dispatch("min", &[Value::Int(3), Value::Int(5)]).unwrap(),
            Value::Int(3)
        );
        assert!(dispatch("min", &[Value::Int(3), Value::Float(5.0)]).is_err());
        assert_eq!(
            dispatch("max", &[Value::Float(3.0), Value::Float(5.0)]).unwrap(),
            Value::Float(5.0)
        );
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(dispatch("sqrt", &[Value::Int(4)]).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_len() {
        assert_eq!(
            dispatch("len", &[Value::Str(Rc::new("hello".to_string()))]).unwrap(),
            Value::Int(5)
        );
        let arr = Value::Array(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(dispatch("len", &[arr]).unwrap(), Value::Int(2));
        assert!(dispatch("len", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_str_renders_like_print() {
        assert_eq!(
            dispatch("str", &[Value::Float(1.5)]).unwrap(),
            Value::Str(Rc::new("1.500000".to_string()))
        );
        assert_eq!(
            dispatch("str", &[Value::Null]).unwrap(),
            Value::Str(Rc::new("null".to_string()))
        );
    }

    #[test]
    fn test_chr_ord_roundtrip() {
        assert_eq!(dispatch("chr", &[Value::Int(65)]).unwrap(), Value::Char('A'));
        assert_eq!(dispatch("ord", &[Value::Char('A')]).unwrap(), Value::Int(65));
        assert!(dispatch("chr", &[Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_char_at_bounds() {
        let s = Value::Str(Rc::new("abc".to_string()));
        assert_eq!(
            dispatch("char_at", &[s.clone(), Value::Int(1)]).unwrap(),
            Value::Char('b')
        );
        let err = dispatch("char_at", &[s, Value::Int(3)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Index);
    }

    #[test]
    fn test_substr() {
        let s = Value::Str(Rc::new("hello".to_string()));
        assert_eq!(
            dispatch("substr", &[s, Value::Int(1), Value::Int(3)]).unwrap(),
            Value::Str(Rc::new("ell".to_string()))
        );
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(dispatch("int", &[Value::Float(3.9)]).unwrap(), Value::Int(3));
        assert_eq!(
            dispatch("int", &[Value::Str(Rc::new("42".to_string()))]).unwrap(),
            Value::Int(42)
        );
        assert!(dispatch("int", &[Value::Str(Rc::new("nan".to_string()))]).is_err());
    }

    #[test]
    fn test_push_pop() {
        let arr = Value::Array(Rc::new(RefCell::new(Vec::new())));
        dispatch("push", &[arr.clone(), Value::Int(1)]).unwrap();
        dispatch("push", &[arr.clone(), Value::Int(2)]).unwrap();
        assert_eq!(dispatch("pop", &[arr.clone()]).unwrap(), Value::Int(2));
        assert_eq!(dispatch("len", &[arr]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_pop_empty_is_index_error() {
        let arr = Value::Array(Rc::new(RefCell::new(Vec::new())));
        assert_eq!(dispatch("pop", &[arr]).unwrap_err().kind, ErrorKind::Index);
    }

    #[test]
    fn test_bit_ops() {
        assert_eq!(
            dispatch("bit_and", &[Value::Int(0b1100), Value::Int(0b1010)]).unwrap(),
            Value::Int(0b1000)
        );
        assert_eq!(
            dispatch("bit_or", &[Value::Int(0b1100), Value::Int(0b1010)]).unwrap(),
            Value::Int(0b1110)
        );
        assert_eq!(
            dispatch("bit_shl", &[Value::Int(1), Value::Int(4)]).unwrap(),
            Value::Int(16)
        );
        assert_eq!(dispatch("bit_not", &[Value::Int(0)]).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_list_adt() {
        let list = dispatch("list_new", &[]).unwrap();
        dispatch("list_push", &[list.clone(), Value::Int(10)]).unwrap();
        dispatch("list_push", &[list.clone(), Value::Int(20)]).unwrap();
        assert_eq!(dispatch("list_len", &[list.clone()]).unwrap(), Value::Int(2));
        assert_eq!(
            dispatch("list_get", &[list.clone(), Value::Int(1)]).unwrap(),
            Value::Int(20)
        );
        dispatch("list_set", &[list.clone(), Value::Int(0), Value::Int(99)]).unwrap();
        assert_eq!(
            dispatch("list_get", &[list.clone(), Value::Int(0)]).unwrap(),
            Value::Int(99)
        );
        assert_eq!(
            dispatch("list_get", &[list, Value::Int(5)]).unwrap_err().kind,
            ErrorKind::Index
        );
    }

    #[test]
    fn test_map_adt() {
        let map = dispatch("map_new", &[]).unwrap();
        let key = Value::Str(Rc::new("a".to_string()));
        dispatch("map_put", &[map.clone(), key.clone(), Value::Int(1)]).unwrap();
        assert_eq!(
            dispatch("map_get", &[map.clone(), key.clone()]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            dispatch("map_has", &[map.clone(), key.clone()]).unwrap(),
            Value::Bool(true)
        );
        // Missing keys read as null
        assert_eq!(
            dispatch("map_get", &[map.clone(), Value::Str(Rc::new("b".to_string()))]).unwrap(),
            Value::Null
        );
        assert_eq!(
            dispatch("map_remove", &[map.clone(), key]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(dispatch("map_len", &[map]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_map_keys_sorted() {
        let map = dispatch("map_new", &[]).unwrap();
        for k in ["b", "a", "c"] {
            dispatch(
                "map_put",
                &[map.clone(), Value::Str(Rc::new(k.to_string())), Value::Int(0)],
            )
            .unwrap();
        }
        let keys = dispatch("map_keys", &[map]).unwrap();
        match keys {
            Value::List(l) => {
                let names: Vec<String> = l.borrow().iter().map(|v| v.to_string()).collect();
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_set_adt() {
        let set = dispatch("set_new", &[]).unwrap();
        let m = Value::Str(Rc::new("x".to_string()));
        assert_eq!(
            dispatch("set_add", &[set.clone(), m.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dispatch("set_add", &[set.clone(), m.clone()]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            dispatch("set_has", &[set.clone(), m.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dispatch("set_remove", &[set.clone(), m]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(dispatch("set_len", &[set]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_assert() {
        assert!(dispatch("assert", &[Value::Bool(true)]).is_ok());
        assert!(dispatch("assert", &[Value::Bool(false)]).is_err());
        let err = dispatch(
            "assert",
            &[
                Value::Bool(false),
                Value::Str(Rc::new("broken invariant".to_string())),
            ],
        )
        .unwrap_err();
        assert!(err.message.contains("broken invariant"));
    }

    #[test]
    fn test_read_file_missing_returns_error_value() {
        let result = dispatch(
            "read_file",
            &[Value::Str(Rc::new("/no/such/file/tern".to_string()))],
        )
        .unwrap();
        assert!(matches!(result, Value::Error(_)));
    }

    #[test]
    fn test_arity_errors_are_type_kind() {
        let err = dispatch("abs", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }
}
