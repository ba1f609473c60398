//! Runtime values.
//!
//! Values are Python-shaped. Lists and dicts are shared, mutable containers
//! so that `items.append(x)` inside generated code is visible through every
//! alias, including the caller's own argument.

use super::ast::FunctionDef;
use super::error::{exception_type, Exception};
use super::re::{Match, Pattern};
use super::stack::ensure_sufficient_stack;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Deepest container nesting that `==` and ordering will walk.
const MAX_COMPARE_DEPTH: usize = 1000;

/// Signature of functions supplied by the host (e.g. `chat`).
pub type HostFn = dyn Fn(&[Value], &[(String, Value)]) -> Result<Value, Exception> + Send + Sync;

/// Builtin names that denote classes rather than plain functions.
const TYPE_NAMES: &[&str] = &[
    "int",
    "float",
    "str",
    "bool",
    "list",
    "tuple",
    "dict",
    "set",
    "frozenset",
    "range",
    "type",
    "object",
    "NoneType",
    "function",
    "builtin_function_or_method",
    "module",
];

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Arc<RwLock<Vec<Value>>>),
    Tuple(Arc<Vec<Value>>),
    Dict(Arc<RwLock<Dict>>),
    Range { start: i64, stop: i64, step: i64 },
    Function(Arc<Function>),
    Builtin(&'static str),
    Method(Arc<BoundMethod>),
    Host(Arc<HostFunction>),
    Module(&'static str),
    Exception(Arc<Exception>),
    Pattern(Arc<Pattern>),
    Match(Arc<Match>),
}

/// A variable scope shared between a running frame and the closures it creates.
pub type Scope = Arc<RwLock<HashMap<String, Value>>>;

/// A user-defined function or lambda.
pub struct Function {
    pub def: Arc<FunctionDef>,
    /// Evaluated defaults, aligned with `def.params`.
    pub defaults: Vec<Option<Value>>,
    /// Enclosing function scopes, outermost first. Empty for module-level functions.
    pub closure: Vec<Scope>,
}

/// `receiver.name`, or the unbound `str.upper` form when `receiver` is absent.
pub struct BoundMethod {
    pub receiver: Option<Value>,
    pub owner: &'static str,
    pub name: String,
}

pub struct HostFunction {
    pub name: String,
    pub func: Box<HostFn>,
}

/// Hashable projection of a value used as a dict key.
///
/// `1`, `1.0` and `True` collapse to the same key, as they do in Python.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(String),
    Tuple(Vec<HashKey>),
    Builtin(&'static str),
}

/// Insertion-ordered mapping. Keeps the original key value next to its hash
/// projection so iteration yields what the program inserted.
#[derive(Clone, Default)]
pub struct Dict {
    entries: IndexMap<HashKey, (Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Exception> {
        let hk = key.hash_key()?;
        Ok(self.entries.get(&hk).map(|(_, v)| v.clone()))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, Exception> {
        Ok(self.entries.contains_key(&key.hash_key()?))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), Exception> {
        let hk = key.hash_key()?;
        match self.entries.get_mut(&hk) {
            Some(slot) => slot.1 = value,
            None => {
                self.entries.insert(hk, (key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, Exception> {
        let hk = key.hash_key()?;
        Ok(self.entries.shift_remove(&hk).map(|(_, v)| v))
    }

    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        self.entries.pop().map(|(_, pair)| pair)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.values().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.values().cloned().collect()
    }
}

/// Lazy iteration over a value; ranges never materialize.
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(items) => items.next(),
            ValueIter::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                *next = current.checked_add(*step).unwrap_or(*stop);
                Some(Value::Int(current))
            }
        }
    }
}

pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> usize {
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    };
    usize::try_from(len).unwrap_or(usize::MAX)
}

pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(&self) -> f64 {
        match self {
            Num::Int(i) => *i as f64,
            Num::Float(f) => *f,
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Arc::new(items))
    }

    pub fn from_dict(dict: Dict) -> Value {
        Value::Dict(Arc::new(RwLock::new(dict)))
    }

    /// Build a dict from key/value pairs; fails on unhashable keys.
    pub fn dict(entries: Vec<(Value, Value)>) -> Result<Value, Exception> {
        let mut dict = Dict::new();
        for (k, v) in entries {
            dict.insert(k, v)?;
        }
        Ok(Value::from_dict(dict))
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Python's `type(value).__name__`.
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
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Builtin(name) => {
                if is_class_name(name) {
                    "type"
                } else {
                    "builtin_function_or_method"
                }
            }
            Value::Method(_) | Value::Host(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Exception(exc) => exc.kind,
            Value::Pattern(_) => "re.Pattern",
            Value::Match(_) => "re.Match",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.read().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(d) => !d.read().is_empty(),
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Builtin(_) | Value::Method(_) | Value::Host(_)
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        self.as_num().map(|n| n.as_f64())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Snapshot of a list or tuple's elements.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.read().clone()),
            Value::Tuple(items) => Some(items.as_ref().clone()),
            _ => None,
        }
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(*b as i64)),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    pub fn hash_key(&self) -> Result<HashKey, Exception> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= -9.2e18 && *f <= 9.2e18 {
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
            Value::Builtin(name) => HashKey::Builtin(*name),
            other => {
                return Err(Exception::type_error(format!(
                    "unhashable type: '{}'",
                    other.type_name()
                )))
            }
        })
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.read().len()),
            Value::Tuple(items) => Some(items.len()),
            Value::Dict(d) => Some(d.read().len()),
            Value::Range { start, stop, step } => Some(range_len(*start, *stop, *step)),
            _ => None,
        }
    }

    pub fn iter_values(&self) -> Result<ValueIter, Exception> {
        let items = match self {
            Value::List(items) => items.read().clone(),
            Value::Tuple(items) => items.as_ref().clone(),
            Value::Dict(d) => d.read().keys(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Range { start, stop, step } => {
                return Ok(ValueIter::Range {
                    next: *start,
                    stop: *stop,
                    step: *step,
                })
            }
            other => {
                return Err(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        };
        Ok(ValueIter::Items(items.into_iter()))
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. `None` means unordered (NaN).
    pub fn compare(&self, other: &Value, op: &str) -> Result<Option<Ordering>, Exception> {
        self.compare_at(other, op, 0)
    }

    fn compare_at(
        &self,
        other: &Value,
        op: &str,
        depth: usize,
    ) -> Result<Option<Ordering>, Exception> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return Ok(match (a, b) {
                (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            });
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(_), Value::List(_)) | (Value::Tuple(_), Value::Tuple(_)) => {
                if depth > MAX_COMPARE_DEPTH {
                    return Err(comparison_too_deep());
                }
                let a = self.to_vec().unwrap_or_default();
                let b = other.to_vec().unwrap_or_default();
                ensure_sufficient_stack(|| {
                    for (x, y) in a.iter().zip(b.iter()) {
                        if !x.equals_at(y, depth + 1)? {
                            return x.compare_at(y, op, depth + 1);
                        }
                    }
                    Ok(Some(a.len().cmp(&b.len())))
                })
            }
            _ => Err(Exception::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op,
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// `==`. Fails with `RecursionError` on self-referencing containers.
    pub fn equals(&self, other: &Value) -> Result<bool, Exception> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> Result<bool, Exception> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return Ok(match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                (a, b) => a.as_f64() == b.as_f64(),
            });
        }
        let all_equal = |x: &[Value], y: &[Value]| -> Result<bool, Exception> {
            if depth > MAX_COMPARE_DEPTH {
                return Err(comparison_too_deep());
            }
            if x.len() != y.len() {
                return Ok(false);
            }
            ensure_sufficient_stack(|| {
                for (a, b) in x.iter().zip(y) {
                    if !a.equals_at(b, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })
        };
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (x, y) = (a.read().clone(), b.read().clone());
                all_equal(&x, &y)?
            }
            (Value::Tuple(a), Value::Tuple(b)) => Arc::ptr_eq(a, b) || all_equal(a, b)?,
            (Value::Dict(a), Value::Dict(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.read().clone(), b.read().clone());
                if a.len() != b.len() {
                    return Ok(false);
                }
                let mut left = Vec::with_capacity(a.len());
                let mut right = Vec::with_capacity(a.len());
                for (k, v) in a.items() {
                    match b.get(&k) {
                        Ok(Some(w)) => {
                            left.push(v);
                            right.push(w);
                        }
                        _ => return Ok(false),
                    }
                }
                all_equal(&left, &right)?
            }
            (
                Value::Range { start, stop, step },
                Value::Range {
                    start: s2,
                    stop: e2,
                    step: st2,
                },
            ) => start == s2 && stop == e2 && step == st2,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Arc::ptr_eq(a, b),
            (Value::Pattern(a), Value::Pattern(b)) => a.source == b.source && a.flags == b.flags,
            (Value::Match(a), Value::Match(b)) => Arc::ptr_eq(a, b),
            _ => false,
        })
    }

    /// `is` identity: scalars by value, containers by allocation.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Arc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Arc::ptr_eq(a, b),
            (Value::Pattern(a), Value::Pattern(b)) => Arc::ptr_eq(a, b),
            (Value::Match(a), Value::Match(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Exception(exc) => exc.message.clone(),
            other => other.repr(),
        }
    }

    /// `repr(value)`. A container met again inside itself prints as
    /// `[...]` or `{...}`.
    pub fn repr(&self) -> String {
        self.repr_in(&mut Vec::new())
    }

    fn repr_in(&self, open: &mut Vec<usize>) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_str(s),
            Value::List(items) => {
                let id = Arc::as_ptr(items) as *const () as usize;
                if open.contains(&id) {
                    return "[...]".to_string();
                }
                let items = items.read().clone();
                open.push(id);
                let body = ensure_sufficient_stack(|| join_repr(&items, open));
                open.pop();
                format!("[{}]", body)
            }
            Value::Tuple(items) => ensure_sufficient_stack(|| {
                if items.len() == 1 {
                    format!("({},)", items[0].repr_in(open))
                } else {
                    format!("({})", join_repr(items, open))
                }
            }),
            Value::Dict(d) => {
                let id = Arc::as_ptr(d) as *const () as usize;
                if open.contains(&id) {
                    return "{...}".to_string();
                }
                let items = d.read().items();
                open.push(id);
                let body: Vec<String> = ensure_sufficient_stack(|| {
                    items
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k.repr_in(open), v.repr_in(open)))
                        .collect()
                });
                open.pop();
                format!("{{{}}}", body.join(", "))
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    format!("range({}, {})", start, stop)
                } else {
                    format!("range({}, {}, {})", start, stop, step)
                }
            }
            Value::Function(f) => format!("<function {}>", f.def.name),
            Value::Builtin(name) => {
                if is_class_name(name) {
                    format!("<class '{}'>", name)
                } else {
                    format!("<built-in function {}>", name)
                }
            }
            Value::Method(m) => format!("<built-in method {} of {} object>", m.name, m.owner),
            Value::Host(h) => format!("<built-in function {}>", h.name),
            Value::Module(name) => format!("<module '{}'>", name),
            Value::Exception(exc) => format!("{}({})", exc.kind, quote_str(&exc.message)),
            Value::Pattern(p) => p.repr(),
            Value::Match(m) => m.repr(),
        }
    }

    /// Convert to JSON. Values without a JSON shape become their `repr`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_in(&mut Vec::new())
    }

    fn to_json_in(&self, open: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::Value as Json;
        let id = match self {
            Value::List(items) => Some(Arc::as_ptr(items) as *const () as usize),
            Value::Dict(d) => Some(Arc::as_ptr(d) as *const () as usize),
            _ => None,
        };
        if let Some(id) = id {
            if open.contains(&id) {
                return Json::String(self.repr());
            }
            open.push(id);
        }
        let json = ensure_sufficient_stack(|| match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(_) | Value::Tuple(_) | Value::Range { .. } => Json::Array(
                self.iter_values()
                    .map(|it| it.map(|v| v.to_json_in(open)).collect())
                    .unwrap_or_default(),
            ),
            Value::Dict(d) => {
                let items = d.read().items();
                Json::Object(
                    items
                        .into_iter()
                        .map(|(k, v)| (k.to_str(), v.to_json_in(open)))
                        .collect(),
                )
            }
            other => Json::String(other.repr()),
        });
        if id.is_some() {
            open.pop();
        }
        json
    }
}

pub(crate) fn is_class_name(name: &str) -> bool {
    TYPE_NAMES.contains(&name) || exception_type(name).is_some()
}

fn join_repr(items: &[Value], open: &mut Vec<usize>) -> String {
    items
        .iter()
        .map(|v| v.repr_in(open))
        .collect::<Vec<_>>()
        .join(", ")
}

fn comparison_too_deep() -> Exception {
    Exception::new(
        "RecursionError",
        "maximum recursion depth exceeded in comparison",
    )
}

/// Python float repr: `1.0`, `0.1`, `1e-05`, `1e+20`, `inf`, `nan`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{:e}", f);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote_str(s: &str) -> String {
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
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl PartialEq for Value {
    /// Structural equality; containers nested too deeply compare unequal.
    fn eq(&self, other: &Value) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::None)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::list(items.iter().map(Value::from).collect()),
            Json::Object(map) => {
                let mut dict = Dict::new();
                for (k, v) in map {
                    // String keys are always hashable.
                    let _ = dict.insert(Value::Str(k.clone()), Value::from(v));
                }
                Value::from_dict(dict)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::Float(1.0).repr(), "1.0");
        assert_eq!(Value::Float(0.1).repr(), "0.1");
        assert_eq!(Value::Float(1e-5).repr(), "1e-05");
        assert_eq!(Value::Float(1e20).repr(), "1e+20");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        let d = Value::dict(vec![(Value::str("a"), Value::Int(1))]).unwrap();
        assert_eq!(d.repr(), "{'a': 1}");
    }

    #[test]
    fn test_dict_keys_collapse_numeric_types() {
        let mut d = Dict::new();
        d.insert(Value::Int(1), Value::str("int")).unwrap();
        d.insert(Value::Float(1.0), Value::str("float")).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&Value::Bool(true)).unwrap(), Some(Value::str("float")));
        assert!(d.insert(Value::list(vec![]), Value::None).is_err());
    }

    #[test]
    fn test_range_iteration() {
        let r = Value::Range {
            start: 10,
            stop: 0,
            step: -3,
        };
        let items: Vec<Value> = r.iter_values().unwrap().collect();
        assert_eq!(items, vec![Value::Int(10), Value::Int(7), Value::Int(4), Value::Int(1)]);
        assert_eq!(r.len(), Some(4));
    }

    fn self_containing_list() -> Value {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.write().push(list.clone());
        }
        list
    }

    #[test]
    fn test_self_referencing_containers() {
        let a = self_containing_list();
        let b = self_containing_list();
        assert_eq!(a.repr(), "[1, [...]]");
        assert_eq!(a.to_str(), "[1, [...]]");
        assert_eq!(a.to_json(), serde_json::json!([1, "[1, [...]]"]));
        let err = a.equals(&b).unwrap_err();
        assert_eq!(err.kind, "RecursionError");
        assert_ne!(a, b);
        assert!(a.equals(&a).unwrap());
        assert_eq!(a.compare(&b, "<").unwrap_err().kind, "RecursionError");

        let d = Value::dict(vec![]).unwrap();
        if let Value::Dict(inner) = &d {
            inner.write().insert(Value::str("me"), d.clone()).unwrap();
        }
        assert_eq!(d.repr(), "{'me': {...}}");
    }

    #[test]
    fn test_deeply_nested_values() {
        let nest = |depth: usize| {
            let mut v = Value::list(vec![]);
            for _ in 0..depth {
                v = Value::list(vec![v]);
            }
            v
        };
        let shallow = nest(500);
        assert!(shallow.repr().starts_with("[[[["));
        assert!(shallow.equals(&nest(500)).unwrap());
        let deep = nest(1_500);
        assert_eq!(deep.equals(&nest(1_500)).unwrap_err().kind, "RecursionError");
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"xs": [1, 2.5, "a", null]});
        let value = Value::from(&json);
        assert_eq!(value.to_json(), json);
    }
}
