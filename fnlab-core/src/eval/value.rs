//! Runtime values of the interpreter.
//!
//! Mutable containers are shared through `Rc<RefCell<..>>` so aliasing
//! behaves like Python (`b = a; b.append(1)` is visible through `a`).
//! Values never cross threads; results leave the interpreter as JSON.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;

use super::builtins::Builtin;
use super::context::ScopeId;
use super::exception::{ExceptionKind, PyException};
use super::format::float_repr;
use super::math::MathFunction;
use crate::ast::{FunctionDef, Lambda, Parameter};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<Dict>>;
pub type SetRef = Rc<RefCell<Set>>;

/// Insertion-ordered mapping; the original key value is kept next to the
/// value so `keys()` returns what was stored.
pub type Dict = IndexMap<HashKey, (Value, Value)>;
pub type Set = IndexMap<HashKey, Value>;

/// Nesting beyond this is treated as a cycle by repr and equality.
const MAX_NESTING: usize = 200;

/// Bound of the plain `repr()`/`str()` text; longer output ends in `...`.
pub const MAX_RENDER_LEN: usize = 1 << 20;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(ListRef),
    Tuple(Rc<[Value]>),
    Dict(DictRef),
    Set(SetRef),
    Range(RangeValue),
    Function(Rc<Function>),
    Builtin(Builtin),
    BoundMethod(Rc<BoundMethod>),
    Module(Rc<Module>),
    MathFunction(MathFunction),
    ExceptionClass(ExceptionKind),
    Exception(Rc<PyException>),
    Iterator(Rc<RefCell<PyIterator>>),
    /// Classes without a constructor in the builtin namespace (`NoneType`,
    /// `function`, ...). Produced by `type()`.
    Type(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            (self.stop as i128 - self.start as i128 + self.step as i128 - 1) / self.step as i128
        } else {
            (self.start as i128 - self.stop as i128 - self.step as i128 - 1) / -(self.step as i128)
        };
        span.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index < self.len() {
            Some(self.start + self.step * index as i64)
        } else {
            None
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (value - self.start) % self.step == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let RangeValue { start, step, .. } = *self;
        (0..self.len() as i64).map(move |i| start + step * i)
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Def(Arc<FunctionDef>),
    Lambda(Arc<Lambda>),
}

/// A user-defined function: its code, the defaults evaluated when the `def`
/// ran, and the scope it closes over.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub body: FunctionBody,
    pub defaults: Vec<Option<Value>>,
    pub closure: Option<ScopeId>,
    pub is_generator: bool,
}

impl Function {
    pub fn params(&self) -> &[Parameter] {
        match &self.body {
            FunctionBody::Def(def) => &def.params,
            FunctionBody::Lambda(lambda) => &lambda.params,
        }
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub members: IndexMap<String, Value>,
}

/// Iterators are materialized when created; `next()` pops from the front.
#[derive(Debug, Clone)]
pub struct PyIterator {
    pub type_name: &'static str,
    pub items: VecDeque<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    /// bools, ints and integral floats share one key space (`1 == 1.0 == True`)
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Builtin(Builtin),
    ExceptionClass(ExceptionKind),
    MathFunction(MathFunction),
    Identity(usize),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn dict(entries: Dict) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn set(items: Set) -> Value {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    pub fn iterator(type_name: &'static str, items: impl IntoIterator<Item = Value>) -> Value {
        Value::Iterator(Rc::new(RefCell::new(PyIterator {
            type_name,
            items: items.into_iter().collect(),
        })))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(b) if b.is_type() => "type",
            Value::Builtin(_) | Value::MathFunction(_) => "builtin_function_or_method",
            Value::BoundMethod(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::ExceptionClass(_) | Value::Type(_) => "type",
            Value::Exception(e) => e.kind.name(),
            Value::Iterator(it) => it.borrow().type_name,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_)
                | Value::Builtin(_)
                | Value::BoundMethod(_)
                | Value::MathFunction(_)
                | Value::ExceptionClass(_)
        )
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Set(items) => !items.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view of any number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    pub fn hash_key(&self) -> Result<HashKey, PyException> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.2e18 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(Value::hash_key)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Builtin(b) => HashKey::Builtin(*b),
            Value::ExceptionClass(k) => HashKey::ExceptionClass(*k),
            Value::MathFunction(m) => HashKey::MathFunction(*m),
            Value::Function(f) => HashKey::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Module(m) => HashKey::Identity(Rc::as_ptr(m) as *const () as usize),
            Value::Exception(e) => HashKey::Identity(Rc::as_ptr(e) as *const () as usize),
            Value::Range(r) => HashKey::Tuple(vec![
                HashKey::Str(Rc::from("range")),
                HashKey::Int(r.start),
                HashKey::Int(r.stop),
                HashKey::Int(r.step),
            ]),
            Value::Type(name) => HashKey::Str(Rc::from(format!("<class '{name}'>"))),
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::BoundMethod(_) | Value::Iterator(_) => {
                return Err(PyException::new(
                    ExceptionKind::TypeError,
                    format!("unhashable type: '{}'", self.type_name()),
                ));
            }
        })
    }

    /// `==`
    pub fn py_eq(&self, other: &Value) -> bool {
        self.eq_at(other, 0)
    }

    fn eq_at(&self, other: &Value, depth: usize) -> bool {
        if depth > MAX_NESTING {
            return false;
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => {
                matches!(compare_numbers(a, b), Some(Ordering::Equal))
            }
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow(), depth)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b, depth),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(key, (_, value))| {
                        b.get(key)
                            .is_some_and(|(_, other)| value.eq_at(other, depth + 1))
                    })
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.keys().all(|key| b.contains_key(key))
            }
            (Value::Range(a), Value::Range(b)) => {
                let (la, lb) = (a.len(), b.len());
                la == lb && (la == 0 || (a.start == b.start && (la == 1 || a.step == b.step)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::MathFunction(a), Value::MathFunction(b)) => a == b,
            (Value::ExceptionClass(a), Value::ExceptionClass(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                a.name == b.name && a.receiver.is_same(&b.receiver)
            }
            _ => false,
        }
    }

    /// `is`
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // small ints and interned strings behave as singletons in practice
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            _ => self.py_eq(other),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=` and sorting.
    ///
    /// `None` means the types cannot be ordered (a `TypeError`);
    /// `Some(None)` means they are unordered values such as NaN.
    pub fn compare(&self, other: &Value) -> Option<Option<Ordering>> {
        self.compare_at(other, 0)
    }

    fn compare_at(&self, other: &Value, depth: usize) -> Option<Option<Ordering>> {
        if depth > MAX_NESTING {
            return None;
        }
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => Some(compare_numbers(a, b)),
            (Value::Str(a), Value::Str(b)) => Some(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(Some(Ordering::Equal));
                }
                compare_sequences(&a.borrow(), &b.borrow(), depth)
            }
            (Value::Tuple(a), Value::Tuple(b)) => compare_sequences(a, b, depth),
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                let a_in_b = a.keys().all(|k| b.contains_key(k));
                let b_in_a = b.keys().all(|k| a.contains_key(k));
                Some(match (a_in_b, b_in_a) {
                    (true, true) => Some(Ordering::Equal),
                    (true, false) => Some(Ordering::Less),
                    (false, true) => Some(Ordering::Greater),
                    (false, false) => None,
                })
            }
            _ => None,
        }
    }

    pub fn repr(&self) -> String {
        let mut renderer = Renderer::new(MAX_RENDER_LEN);
        if self.write_repr(&mut renderer, 0).is_err() {
            renderer.out.push_str("...");
        }
        renderer.out
    }

    /// `str(value)`
    pub fn str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(e) => e.message(),
            _ => self.repr(),
        }
    }

    /// `repr(value)`, failing once the text grows past `limit` bytes.
    pub fn try_repr(&self, limit: usize) -> Result<String, RenderOverflow> {
        let mut renderer = Renderer::new(limit);
        self.write_repr(&mut renderer, 0)?;
        Ok(renderer.out)
    }

    /// `str(value)` with the same bound as [`Value::try_repr`].
    pub fn try_str(&self, limit: usize) -> Result<String, RenderOverflow> {
        match self {
            Value::Str(s) if s.len() > limit => Err(RenderOverflow),
            Value::Str(s) => Ok(s.to_string()),
            Value::Exception(e) => Ok(e.message()),
            _ => self.try_repr(limit),
        }
    }

    fn write_repr(&self, r: &mut Renderer, depth: usize) -> Result<(), RenderOverflow> {
        if depth > MAX_NESTING {
            return r.push("...");
        }
        match self {
            Value::None => r.push("None"),
            Value::Bool(true) => r.push("True"),
            Value::Bool(false) => r.push("False"),
            Value::Int(i) => r.push(&i.to_string()),
            Value::Float(f) => r.push(&float_repr(*f)),
            Value::Str(s) => r.push(&repr_str(s)),
            Value::List(items) => {
                let Ok(borrowed) = items.try_borrow() else {
                    return r.push("[...]");
                };
                if !r.enter(Rc::as_ptr(items) as *const ()) {
                    return r.push("[...]");
                }
                r.push("[")?;
                write_items(r, borrowed.iter(), depth)?;
                r.leave();
                r.push("]")
            }
            Value::Tuple(items) => {
                r.push("(")?;
                write_items(r, items.iter(), depth)?;
                if items.len() == 1 {
                    r.push(",")?;
                }
                r.push(")")
            }
            Value::Dict(entries) => {
                let Ok(borrowed) = entries.try_borrow() else {
                    return r.push("{...}");
                };
                if !r.enter(Rc::as_ptr(entries) as *const ()) {
                    return r.push("{...}");
                }
                r.push("{")?;
                for (i, (key, value)) in borrowed.values().enumerate() {
                    if i > 0 {
                        r.push(", ")?;
                    }
                    key.write_repr(r, depth + 1)?;
                    r.push(": ")?;
                    value.write_repr(r, depth + 1)?;
                }
                r.leave();
                r.push("}")
            }
            Value::Set(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    return r.push("set()");
                }
                r.push("{")?;
                write_items(r, items.values(), depth)?;
                r.push("}")
            }
            Value::Range(range) if range.step == 1 => {
                r.push(&format!("range({}, {})", range.start, range.stop))
            }
            Value::Range(range) => r.push(&format!(
                "range({}, {}, {})",
                range.start, range.stop, range.step
            )),
            Value::Function(f) => {
                r.push(&format!("<function {} at {:#x}>", f.name, Rc::as_ptr(f) as usize))
            }
            Value::Builtin(b) if b.is_type() => r.push(&format!("<class '{}'>", b.name())),
            Value::Builtin(b) => r.push(&format!("<built-in function {}>", b.name())),
            Value::MathFunction(m) => r.push(&format!("<built-in function {}>", m.name())),
            Value::BoundMethod(m) => r.push(&format!(
                "<built-in method {} of {} object>",
                m.name,
                m.receiver.type_name()
            )),
            Value::Module(m) => r.push(&format!("<module '{}' (built-in)>", m.name)),
            Value::ExceptionClass(k) => r.push(&format!("<class '{}'>", k)),
            Value::Exception(e) => r.push(&e.repr()),
            Value::Iterator(it) => r.push(&format!(
                "<{} object at {:#x}>",
                it.borrow().type_name,
                Rc::as_ptr(it) as *const () as usize
            )),
            Value::Type(name) => r.push(&format!("<class '{}'>", name)),
        }
    }

    /// JSON rendering of a function result. Containers are converted
    /// recursively; values without a JSON counterpart become their repr,
    /// and a container that contains itself becomes `[...]`/`{...}`.
    ///
    /// Every rendered value counts against `limit`, as does the text of
    /// strings and reprs.
    pub fn to_json(&self, limit: usize) -> Result<serde_json::Value, RenderOverflow> {
        let mut renderer = Renderer::new(limit);
        self.to_json_at(&mut renderer, 0)
    }

    fn to_json_at(&self, r: &mut Renderer, depth: usize) -> Result<serde_json::Value, RenderOverflow> {
        r.reserve(1)?;
        if depth > MAX_NESTING {
            return Ok(json!("..."));
        }
        Ok(match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) if f.is_finite() => json!(f),
            Value::Str(s) => {
                r.reserve(s.len())?;
                json!(s.as_ref())
            }
            Value::List(items) => {
                let Ok(borrowed) = items.try_borrow() else {
                    return Ok(json!("[...]"));
                };
                if !r.enter(Rc::as_ptr(items) as *const ()) {
                    return Ok(json!("[...]"));
                }
                let array = json_items(r, borrowed.iter(), depth)?;
                r.leave();
                array
            }
            Value::Tuple(items) => json_items(r, items.iter(), depth)?,
            Value::Dict(entries) => {
                let Ok(borrowed) = entries.try_borrow() else {
                    return Ok(json!("{...}"));
                };
                if !r.enter(Rc::as_ptr(entries) as *const ()) {
                    return Ok(json!("{...}"));
                }
                let mut object = serde_json::Map::with_capacity(borrowed.len());
                for (key, value) in borrowed.values() {
                    let key = key.try_str(r.remaining())?;
                    r.reserve(key.len())?;
                    object.insert(key, value.to_json_at(r, depth + 1)?);
                }
                r.leave();
                serde_json::Value::Object(object)
            }
            other => {
                let text = other.try_repr(r.remaining())?;
                r.reserve(text.len())?;
                json!(text)
            }
        })
    }
}

/// Rendering stopped because the output outgrew its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOverflow;

/// Output buffer of `repr`/`to_json` with a byte budget and the containers
/// currently open, for cycle detection.
struct Renderer {
    out: String,
    used: usize,
    limit: usize,
    open: Vec<*const ()>,
}

impl Renderer {
    fn new(limit: usize) -> Self {
        Self {
            out: String::new(),
            used: 0,
            limit,
            open: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.limit - self.used
    }

    /// Accounts `n` bytes without writing them.
    fn reserve(&mut self, n: usize) -> Result<(), RenderOverflow> {
        if n > self.remaining() {
            self.used = self.limit;
            return Err(RenderOverflow);
        }
        self.used += n;
        Ok(())
    }

    /// Appends `text`; on overflow the part that fits is kept.
    fn push(&mut self, text: &str) -> Result<(), RenderOverflow> {
        let room = self.remaining();
        if text.len() > room {
            let cut = (0..=room)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            self.out.push_str(&text[..cut]);
            self.used = self.limit;
            return Err(RenderOverflow);
        }
        self.out.push_str(text);
        self.used += text.len();
        Ok(())
    }

    /// Returns false when `ptr` is already being rendered.
    fn enter(&mut self, ptr: *const ()) -> bool {
        if self.open.contains(&ptr) {
            return false;
        }
        self.open.push(ptr);
        true
    }

    fn leave(&mut self) {
        self.open.pop();
    }
}

fn write_items<'a>(
    r: &mut Renderer,
    items: impl Iterator<Item = &'a Value>,
    depth: usize,
) -> Result<(), RenderOverflow> {
    for (i, item) in items.enumerate() {
        if i > 0 {
            r.push(", ")?;
        }
        item.write_repr(r, depth + 1)?;
    }
    Ok(())
}

fn json_items<'a>(
    r: &mut Renderer,
    items: impl Iterator<Item = &'a Value>,
    depth: usize,
) -> Result<serde_json::Value, RenderOverflow> {
    items
        .map(|item| item.to_json_at(r, depth + 1))
        .collect::<Result<Vec<_>, _>>()
        .map(serde_json::Value::Array)
}

fn seq_eq(a: &[Value], b: &[Value], depth: usize) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_at(y, depth + 1))
}

fn compare_sequences(a: &[Value], b: &[Value], depth: usize) -> Option<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if !x.eq_at(y, depth + 1) {
            return x.compare_at(y, depth + 1);
        }
    }
    Some(Some(a.len().cmp(&b.len())))
}

/// Exact comparison between any two numbers (bool, int, float).
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => compare_int_float(x, b.as_float()?),
        (None, Some(y)) => compare_int_float(y, a.as_float()?).map(Ordering::reverse),
        (None, None) => a.as_float()?.partial_cmp(&b.as_float()?),
    }
}

fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= 9.3e18 {
        return Some(Ordering::Less);
    }
    if f <= -9.3e18 {
        return Some(Ordering::Greater);
    }
    let whole = f.floor();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if f > whole => Some(Ordering::Less),
        ordering => Some(ordering),
    }
}

/// Python `repr()` of a string: single quotes unless the text contains a
/// single quote and no double quote.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(items: Vec<Value>) -> Value {
        Value::list(items)
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
        assert_eq!(Value::from("a\nb").repr(), "'a\\nb'");
        assert_eq!(
            Value::tuple(vec![Value::Int(1)]).repr(),
            "(1,)"
        );
        assert_eq!(
            list(vec![Value::Int(1), Value::from("x"), Value::None, Value::Float(2.0)]).repr(),
            "[1, 'x', None, 2.0]"
        );
        let mut entries = Dict::new();
        entries.insert(
            HashKey::Str(Rc::from("a")),
            (Value::from("a"), Value::Bool(true)),
        );
        assert_eq!(Value::dict(entries).repr(), "{'a': True}");
        assert_eq!(Value::set(Set::new()).repr(), "set()");
    }

    #[test]
    fn test_self_referencing_list_repr() {
        let items = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let value = Value::List(items.clone());
        items.borrow_mut().push(value.clone());
        assert_eq!(value.repr(), "[1, [...]]");
        assert_eq!(value.to_json(1_000).unwrap(), json!([1, "[...]"]));

        let entries = Rc::new(RefCell::new(Dict::new()));
        let dict = Value::Dict(entries.clone());
        entries
            .borrow_mut()
            .insert(HashKey::Str("me".into()), (Value::from("me"), dict.clone()));
        assert_eq!(dict.repr(), "{'me': {...}}");
    }

    #[test]
    fn test_shared_list_is_not_a_cycle() {
        let inner = list(vec![Value::Int(1)]);
        let outer = list(vec![inner.clone(), inner]);
        assert_eq!(outer.repr(), "[[1], [1]]");
        assert_eq!(outer.to_json(1_000).unwrap(), json!([[1], [1]]));
    }

    #[test]
    fn test_rendering_budget() {
        let inner = list(vec![Value::Int(1); 1_000]);
        let outer = list(vec![inner; 1_000]);
        assert_eq!(outer.try_repr(10_000), Err(RenderOverflow));
        assert_eq!(outer.to_json(10_000), Err(RenderOverflow));
        assert!(outer.try_repr(4_000_000).is_ok());

        let text = list(vec![Value::from("abcdef"); 3]).try_str(12);
        assert_eq!(text, Err(RenderOverflow));
        assert_eq!(Value::from("héllo").try_str(3), Err(RenderOverflow));
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::Int(1).py_eq(&Value::from("1")));
        assert!(!Value::Float(f64::NAN).py_eq(&Value::Float(f64::NAN)));
        assert_eq!(
            Value::Int(1).hash_key().unwrap(),
            Value::Float(1.0).hash_key().unwrap()
        );
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)),
            Some(Some(Ordering::Less))
        );
        assert_eq!(
            list(vec![Value::Int(1), Value::Int(2)]).compare(&list(vec![Value::Int(1)])),
            Some(Some(Ordering::Greater))
        );
        assert_eq!(Value::Int(1).compare(&Value::from("a")), None);
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Int(1)), Some(None));
    }

    #[test]
    fn test_unhashable() {
        let err = list(vec![]).hash_key().unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn test_range() {
        let r = RangeValue {
            start: 10,
            stop: 0,
            step: -3,
        };
        assert_eq!(r.len(), 4);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![10, 7, 4, 1]);
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert_eq!(
            RangeValue {
                start: 0,
                stop: 0,
                step: 1
            }
            .len(),
            0
        );
    }

    #[test]
    fn test_to_json() {
        let mut entries = Dict::new();
        entries.insert(HashKey::Int(1), (Value::Int(1), Value::tuple(vec![Value::Float(0.5)])));
        let value = list(vec![Value::dict(entries), Value::None, Value::Float(f64::INFINITY)]);
        assert_eq!(
            value.to_json(1_000).unwrap(),
            json!([{ "1": [0.5] }, null, "inf"])
        );
    }
}
