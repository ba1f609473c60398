//! Builtin functions and the small standard library available to generated
//! code (`math`, `string`, `json`, `re`, `functools`, `collections`, `typing`).

use super::ast::BinOp;
use super::error::{exception_type, Exception};
use super::eval::Interpreter;
use super::format::format_value;
use super::ops::{binary, guard_len};
use super::re;
use super::stack::ensure_sufficient_stack;
use super::value::{format_float, is_class_name, Dict, Value};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Longest sequence a builtin will materialize.
const MAX_MATERIALIZE: usize = 10_000_000;

const BUILTINS: &[&str] = &[
    "abs",
    "all",
    "any",
    "bin",
    "bool",
    "callable",
    "chr",
    "dict",
    "divmod",
    "enumerate",
    "filter",
    "float",
    "format",
    "frozenset",
    "hash",
    "hex",
    "int",
    "isinstance",
    "len",
    "list",
    "map",
    "max",
    "min",
    "oct",
    "ord",
    "pow",
    "print",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "sorted",
    "str",
    "sum",
    "tuple",
    "type",
    "zip",
];

const MODULES: &[&str] = &[
    "math",
    "string",
    "json",
    "re",
    "functools",
    "collections",
    "typing",
];

const MODULE_FUNCTIONS: &[&str] = &[
    "math.sqrt",
    "math.isqrt",
    "math.floor",
    "math.ceil",
    "math.trunc",
    "math.pow",
    "math.exp",
    "math.log",
    "math.log2",
    "math.log10",
    "math.sin",
    "math.cos",
    "math.tan",
    "math.asin",
    "math.acos",
    "math.atan",
    "math.atan2",
    "math.hypot",
    "math.fabs",
    "math.copysign",
    "math.degrees",
    "math.radians",
    "math.factorial",
    "math.gcd",
    "math.lcm",
    "math.comb",
    "math.perm",
    "math.prod",
    "math.fsum",
    "math.isclose",
    "math.isnan",
    "math.isinf",
    "math.isfinite",
    "json.dumps",
    "json.loads",
    "re.compile",
    "re.match",
    "re.search",
    "re.fullmatch",
    "re.findall",
    "re.finditer",
    "re.sub",
    "re.subn",
    "re.split",
    "re.escape",
    "functools.reduce",
    "collections.Counter",
];

/// Resolve a builtin name, including exception classes.
pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS
        .iter()
        .copied()
        .find(|b| *b == name)
        .map(Value::Builtin)
        .or_else(|| exception_type(name).map(Value::Builtin))
}

/// `import name`.
pub fn import(name: &str) -> Result<Value, Exception> {
    MODULES
        .iter()
        .copied()
        .find(|m| *m == name)
        .map(Value::Module)
        .ok_or_else(|| {
            Exception::new(
                "ModuleNotFoundError",
                format!("No module named '{}'", name),
            )
        })
}

/// `module.attr`.
pub fn module_attr(module: &str, attr: &str) -> Result<Value, Exception> {
    let constant = match (module, attr) {
        ("math", "pi") => Some(Value::Float(std::f64::consts::PI)),
        ("math", "e") => Some(Value::Float(std::f64::consts::E)),
        ("math", "tau") => Some(Value::Float(std::f64::consts::TAU)),
        ("math", "inf") => Some(Value::Float(f64::INFINITY)),
        ("math", "nan") => Some(Value::Float(f64::NAN)),
        ("string", "ascii_lowercase") => Some(Value::str("abcdefghijklmnopqrstuvwxyz")),
        ("string", "ascii_uppercase") => Some(Value::str("ABCDEFGHIJKLMNOPQRSTUVWXYZ")),
        ("string", "ascii_letters") => Some(Value::str(
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
        )),
        ("string", "digits") => Some(Value::str("0123456789")),
        ("string", "hexdigits") => Some(Value::str("0123456789abcdefABCDEF")),
        ("string", "octdigits") => Some(Value::str("01234567")),
        ("string", "punctuation") => Some(Value::str("!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~")),
        ("string", "whitespace") => Some(Value::str(" \t\n\r\x0b\x0c")),
        ("re", "I" | "IGNORECASE") => Some(Value::Int(re::IGNORECASE)),
        ("re", "M" | "MULTILINE") => Some(Value::Int(re::MULTILINE)),
        ("re", "S" | "DOTALL") => Some(Value::Int(re::DOTALL)),
        ("re", "X" | "VERBOSE") => Some(Value::Int(re::VERBOSE)),
        ("re", "A" | "ASCII" | "U" | "UNICODE") => Some(Value::Int(0)),
        ("re", "error") => Some(Value::Builtin(re::ERROR)),
        ("collections", "OrderedDict") => Some(Value::Builtin("dict")),
        ("typing", "List") => Some(Value::Builtin("list")),
        ("typing", "Dict") => Some(Value::Builtin("dict")),
        ("typing", "Tuple") => Some(Value::Builtin("tuple")),
        ("typing", "Set" | "FrozenSet") => Some(Value::Builtin("set")),
        // Other typing names only appear in annotations, which are not evaluated.
        ("typing", _) => Some(Value::None),
        _ => None,
    };
    if let Some(value) = constant {
        return Ok(value);
    }
    let qualified = format!("{}.{}", module, attr);
    MODULE_FUNCTIONS
        .iter()
        .copied()
        .find(|f| *f == qualified)
        .map(Value::Builtin)
        .ok_or_else(|| {
            Exception::attribute_error(format!(
                "module '{}' has no attribute '{}'",
                module, attr
            ))
        })
}

/// Positional and keyword arguments of a builtin call, with Python-style
/// arity errors.
pub(crate) struct CallArgs {
    name: String,
    pub args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub(crate) fn new(name: &str, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        CallArgs {
            name: name.rsplit('.').next().unwrap_or(name).to_string(),
            args,
            kwargs,
        }
    }

    pub(crate) fn expect(&self, min: usize, max: usize) -> Result<(), Exception> {
        let given = self.args.len();
        if given >= min && given <= max {
            return Ok(());
        }
        Err(Exception::type_error(if min == max {
            format!(
                "{}() takes exactly {} argument{} ({} given)",
                self.name,
                min,
                if min == 1 { "" } else { "s" },
                given
            )
        } else if given < min {
            format!(
                "{}() takes at least {} argument{} ({} given)",
                self.name,
                min,
                if min == 1 { "" } else { "s" },
                given
            )
        } else {
            format!(
                "{}() takes at most {} argument{} ({} given)",
                self.name,
                max,
                if max == 1 { "" } else { "s" },
                given
            )
        }))
    }

    pub(crate) fn take_kw(&mut self, key: &str) -> Option<Value> {
        let pos = self.kwargs.iter().position(|(k, _)| k == key)?;
        Some(self.kwargs.remove(pos).1)
    }

    /// Positional argument `index`, or keyword `key` as a fallback.
    pub(crate) fn take(&mut self, index: usize, key: &str) -> Option<Value> {
        match self.args.get(index) {
            Some(v) => Some(v.clone()),
            None => self.take_kw(key),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Vec<(String, Value)>) {
        (self.args, self.kwargs)
    }

    pub(crate) fn finish(&self) -> Result<(), Exception> {
        match self.kwargs.first() {
            Some((k, _)) => Err(Exception::type_error(format!(
                "'{}' is an invalid keyword argument for {}()",
                k, self.name
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn int(&self, index: usize) -> Result<i64, Exception> {
        let value = &self.args[index];
        value.as_int().ok_or_else(|| {
            Exception::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })
    }

    fn float(&self, index: usize) -> Result<f64, Exception> {
        let value = &self.args[index];
        value.as_float().ok_or_else(|| {
            Exception::type_error(format!(
                "must be real number, not {}",
                value.type_name()
            ))
        })
    }

    pub(crate) fn str(&self, index: usize) -> Result<&str, Exception> {
        let value = &self.args[index];
        value.as_str().ok_or_else(|| {
            Exception::type_error(format!(
                "{}() argument {} must be str, not {}",
                self.name,
                index + 1,
                value.type_name()
            ))
        })
    }
}

/// Materialize an iterable, refusing absurd sizes.
pub(crate) fn collect(value: &Value) -> Result<Vec<Value>, Exception> {
    if value.len().is_some_and(|n| n > MAX_MATERIALIZE) {
        return Err(Exception::new("MemoryError", "sequence too large"));
    }
    Ok(value.iter_values()?.collect())
}

/// Stable sort with optional key function, as `sorted` and `list.sort` do.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> Result<Vec<Value>, Exception> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let k = match &key {
            Some(f) if !f.is_none() => interp.call(f, vec![item.clone()], Vec::new())?,
            _ => item.clone(),
        };
        keyed.push((k, item));
    }
    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = match a.compare(b, "<") {
            Ok(o) => o.unwrap_or(Ordering::Equal),
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        };
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(keyed.into_iter().map(|(_, v)| v).collect()),
    }
}

/// `isinstance(value, class)`; `class` may be a tuple of classes.
pub(crate) fn is_instance(value: &Value, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if is_instance(value, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(name) if is_class_name(name) => Ok(match *name {
            "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
            "set" | "frozenset" => matches!(value, Value::List(_)),
            "object" => true,
            "type" => matches!(value, Value::Builtin(n) if is_class_name(n)),
            other => match value {
                Value::Exception(exc) => exc.is_instance_of(other),
                _ => value.type_name() == other,
            },
        }),
        _ => Err(Exception::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

/// Does `except <class>` catch `exc`?
pub(crate) fn exception_matches(exc: &Exception, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if exception_matches(exc, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(name) if exception_type(name).is_some() => Ok(exc.is_instance_of(name)),
        _ => Err(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

fn make_exception(kind: &'static str, args: &[Value]) -> Value {
    let message = match args {
        [] => String::new(),
        [single] => single.to_str(),
        many => Value::tuple(many.to_vec()).repr(),
    };
    Value::Exception(Arc::new(Exception::new(kind, message)))
}

pub fn call(
    interp: &mut Interpreter,
    name: &'static str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    if let Some(kind) = exception_type(name) {
        return Ok(make_exception(kind, &args));
    }
    let mut a = CallArgs::new(name, args, kwargs);
    if let Some((module, func)) = name.split_once('.') {
        return call_module_function(interp, module, func, a);
    }
    match name {
        "len" => {
            a.expect(1, 1)?;
            let n = a.args[0].len().ok_or_else(|| {
                Exception::type_error(format!(
                    "object of type '{}' has no len()",
                    a.args[0].type_name()
                ))
            })?;
            i64::try_from(n).map(Value::Int).map_err(|_| {
                Exception::new("OverflowError", "Python int too large to convert to C ssize_t")
            })
        }
        "abs" => {
            a.expect(1, 1)?;
            match &a.args[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => match v.as_int() {
                    Some(i) => i.checked_abs().map(Value::Int).ok_or_else(Exception::overflow),
                    None => Err(Exception::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        v.type_name()
                    ))),
                },
            }
        }
        "min" | "max" => extremum(interp, name, a),
        "sum" => {
            let start = a.take_kw("start");
            a.finish()?;
            a.expect(1, 2)?;
            let mut total = a.args.get(1).cloned().or(start).unwrap_or(Value::Int(0));
            if let Value::Str(_) = total {
                return Err(Exception::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in collect(&a.args[0])? {
                total = binary(BinOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        "sorted" => {
            let key = a.take_kw("key");
            let reverse = a.take_kw("reverse").is_some_and(|v| v.truthy());
            a.finish()?;
            a.expect(1, 1)?;
            let items = collect(&a.args[0])?;
            Ok(Value::list(sort_values(interp, items, key, reverse)?))
        }
        "reversed" => {
            a.expect(1, 1)?;
            if let Value::Dict(_) = a.args[0] {
                return Err(Exception::type_error("'dict' object is not reversible"));
            }
            let mut items = collect(&a.args[0])?;
            items.reverse();
            Ok(Value::list(items))
        }
        "range" => {
            a.finish()?;
            a.expect(1, 3)?;
            let nums = (0..a.args.len())
                .map(|i| a.int(i))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match nums.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => return Err(Exception::type_error("range expected at most 3 arguments")),
            };
            if step == 0 {
                return Err(Exception::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range { start, stop, step })
        }
        "enumerate" => {
            let start = a.take(1, "start");
            a.expect(1, 2)?;
            let mut index = match start {
                Some(v) => v.as_int().ok_or_else(|| {
                    Exception::type_error("'start' must be an integer")
                })?,
                None => 0,
            };
            let mut out = Vec::new();
            for item in collect(&a.args[0])? {
                out.push(Value::tuple(vec![Value::Int(index), item]));
                index += 1;
            }
            Ok(Value::list(out))
        }
        "zip" => {
            a.take_kw("strict");
            a.finish()?;
            let columns = a.args.iter().map(collect).collect::<Result<Vec<_>, _>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            let rows = (0..len)
                .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
                .collect();
            Ok(Value::list(rows))
        }
        "map" => {
            a.finish()?;
            if a.args.len() < 2 {
                return Err(Exception::type_error("map() must have at least two arguments."));
            }
            let func = a.args[0].clone();
            let columns = a.args[1..]
                .iter()
                .map(collect)
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                let row = columns.iter().map(|c| c[i].clone()).collect();
                out.push(interp.call(&func, row, Vec::new())?);
            }
            Ok(Value::list(out))
        }
        "filter" => {
            a.finish()?;
            a.expect(2, 2)?;
            let func = a.args[0].clone();
            let mut out = Vec::new();
            for item in collect(&a.args[1])? {
                let keep = if func.is_none() {
                    item.truthy()
                } else {
                    interp.call(&func, vec![item.clone()], Vec::new())?.truthy()
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        "any" => {
            a.expect(1, 1)?;
            Ok(Value::Bool(collect(&a.args[0])?.iter().any(Value::truthy)))
        }
        "all" => {
            a.expect(1, 1)?;
            Ok(Value::Bool(collect(&a.args[0])?.iter().all(Value::truthy)))
        }
        "round" => {
            let ndigits = a.take(1, "ndigits");
            a.expect(1, 2)?;
            round(&a.args[0], ndigits)
        }
        "divmod" => {
            a.expect(2, 2)?;
            let q = binary(BinOp::FloorDiv, &a.args[0], &a.args[1])?;
            let r = binary(BinOp::Mod, &a.args[0], &a.args[1])?;
            Ok(Value::tuple(vec![q, r]))
        }
        "pow" => {
            let modulus = a.take(2, "mod");
            a.expect(2, 3)?;
            match modulus {
                Some(m) if !m.is_none() => {
                    let (base, exp) = (a.int(0)?, a.int(1)?);
                    let m = m.as_int().ok_or_else(|| {
                        Exception::type_error("pow() 3rd argument must be an integer")
                    })?;
                    mod_pow(base, exp, m)
                }
                _ => binary(BinOp::Pow, &a.args[0], &a.args[1]),
            }
        }
        "int" => {
            let base = a.take(1, "base");
            a.finish()?;
            a.expect(0, 2)?;
            match a.args.first() {
                None => Ok(Value::Int(0)),
                Some(v) => to_int(v, base),
            }
        }
        "float" => {
            a.expect(0, 1)?;
            match a.args.first() {
                None => Ok(Value::Float(0.0)),
                Some(v) => to_float(v),
            }
        }
        "str" => {
            a.expect(0, 1)?;
            Ok(Value::Str(a.args.first().map(Value::to_str).unwrap_or_default()))
        }
        "repr" => {
            a.expect(1, 1)?;
            Ok(Value::Str(a.args[0].repr()))
        }
        "bool" => {
            a.expect(0, 1)?;
            Ok(Value::Bool(a.args.first().is_some_and(Value::truthy)))
        }
        "list" => {
            a.expect(0, 1)?;
            match a.args.first() {
                None => Ok(Value::list(Vec::new())),
                Some(v) => Ok(Value::list(collect(v)?)),
            }
        }
        "tuple" => {
            a.expect(0, 1)?;
            match a.args.first() {
                None => Ok(Value::tuple(Vec::new())),
                Some(v) => Ok(Value::tuple(collect(v)?)),
            }
        }
        "set" | "frozenset" => {
            a.expect(0, 1)?;
            let items = match a.args.first() {
                None => Vec::new(),
                Some(v) => collect(v)?,
            };
            make_set(items)
        }
        "dict" => {
            a.expect(0, 1)?;
            let mut dict = match a.args.first() {
                None => Dict::new(),
                Some(Value::Dict(d)) => d.read().clone(),
                Some(v) => {
                    let mut dict = Dict::new();
                    for pair in collect(v)? {
                        let items = pair.to_vec().ok_or_else(|| {
                            Exception::type_error(
                                "cannot convert dictionary update sequence element to a sequence",
                            )
                        })?;
                        let [k, v] = <[Value; 2]>::try_from(items).map_err(|items| {
                            Exception::value_error(format!(
                                "dictionary update sequence element has length {}; 2 is required",
                                items.len()
                            ))
                        })?;
                        dict.insert(k, v)?;
                    }
                    dict
                }
            };
            for (k, v) in std::mem::take(&mut a.kwargs) {
                dict.insert(Value::Str(k), v)?;
            }
            Ok(Value::from_dict(dict))
        }
        "isinstance" => {
            a.expect(2, 2)?;
            Ok(Value::Bool(is_instance(&a.args[0], &a.args[1])?))
        }
        "callable" => {
            a.expect(1, 1)?;
            Ok(Value::Bool(a.args[0].is_callable()))
        }
        "hash" => {
            a.expect(1, 1)?;
            let key = a.args[0].hash_key()?;
            if let Some(i) = a.args[0].as_int() {
                return Ok(Value::Int(i));
            }
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            Ok(Value::Int(hasher.finish() as i64))
        }
        "type" => {
            a.expect(1, 1)?;
            Ok(Value::Builtin(a.args[0].type_name()))
        }
        "print" => {
            let sep = a.take_kw("sep").map(|v| v.to_str()).unwrap_or_else(|| " ".into());
            let end = a.take_kw("end").map(|v| v.to_str()).unwrap_or_else(|| "\n".into());
            a.take_kw("flush");
            a.take_kw("file");
            a.finish()?;
            let text: Vec<String> = a.args.iter().map(Value::to_str).collect();
            let line = format!("{}{}", text.join(&sep), end);
            debug!("🖨️ [Interpreter] {}", line.trim_end());
            interp.print(line);
            Ok(Value::None)
        }
        "chr" => {
            a.expect(1, 1)?;
            let code = a.int(0)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| Exception::value_error("chr() arg not in range(0x110000)"))
        }
        "ord" => {
            a.expect(1, 1)?;
            let s = a.str(0)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(c as i64)),
                _ => Err(Exception::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
            }
        }
        "hex" | "oct" | "bin" => {
            a.expect(1, 1)?;
            let i = a.int(0)?;
            let digits = match name {
                "hex" => format!("0x{:x}", i.unsigned_abs()),
                "oct" => format!("0o{:o}", i.unsigned_abs()),
                _ => format!("0b{:b}", i.unsigned_abs()),
            };
            Ok(Value::Str(if i < 0 {
                format!("-{}", digits)
            } else {
                digits
            }))
        }
        "format" => {
            a.expect(1, 2)?;
            let spec = match a.args.get(1) {
                Some(v) => v.as_str().map(str::to_string).ok_or_else(|| {
                    Exception::type_error("format() argument 2 must be str")
                })?,
                None => String::new(),
            };
            Ok(Value::Str(format_value(&a.args[0], &spec)?))
        }
        other => Err(Exception::type_error(format!(
            "cannot create '{}' instances",
            other
        ))),
    }
}

/// Deduplicate, keeping first occurrences; sets are lists of unique members.
pub(crate) fn make_set(items: Vec<Value>) -> Result<Value, Exception> {
    let mut seen = Dict::new();
    let mut out = Vec::new();
    for item in items {
        if !seen.contains(&item)? {
            seen.insert(item.clone(), Value::None)?;
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

fn extremum(interp: &mut Interpreter, name: &str, mut a: CallArgs) -> Result<Value, Exception> {
    let key = a.take_kw("key");
    let default = a.take_kw("default");
    a.finish()?;
    let items = match a.args.len() {
        0 => {
            return Err(Exception::type_error(format!(
                "{} expected at least 1 argument, got 0",
                name
            )))
        }
        1 => collect(&a.args[0])?,
        _ => a.args.clone(),
    };
    if items.is_empty() {
        return default.ok_or_else(|| {
            Exception::value_error(format!("{}() arg is an empty sequence", name))
        });
    }
    let wanted = if name == "min" {
        Ordering::Less
    } else {
        Ordering::Greater
    };
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let k = match &key {
            Some(f) if !f.is_none() => interp.call(f, vec![item.clone()], Vec::new())?,
            _ => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) => k.compare(best_key, if name == "min" { "<" } else { ">" })? == Some(wanted),
        };
        if replace {
            best = Some((k, item));
        }
    }
    Ok(best.map(|(_, v)| v).unwrap_or(Value::None))
}

fn round(value: &Value, ndigits: Option<Value>) -> Result<Value, Exception> {
    let ndigits = match ndigits {
        None | Some(Value::None) => None,
        Some(v) => Some(v.as_int().ok_or_else(|| {
            Exception::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                v.type_name()
            ))
        })?),
    };
    match (value, ndigits) {
        (Value::Float(f), None) => {
            if !f.is_finite() {
                return Err(if f.is_nan() {
                    Exception::value_error("cannot convert float NaN to integer")
                } else {
                    Exception::new("OverflowError", "cannot convert float infinity to integer")
                });
            }
            Ok(Value::Int(f.round_ties_even() as i64))
        }
        (Value::Float(f), Some(n)) if n >= 0 => {
            let text = format!("{:.*}", n.min(300) as usize, f);
            Ok(Value::Float(text.parse().unwrap_or(*f)))
        }
        (Value::Float(f), Some(n)) => {
            let scale = 10f64.powi((-n).min(308) as i32);
            Ok(Value::Float((f / scale).round_ties_even() * scale))
        }
        (v, n) => {
            let i = v.as_int().ok_or_else(|| {
                Exception::type_error(format!(
                    "type {} doesn't define __round__ method",
                    v.type_name()
                ))
            })?;
            match n {
                Some(n) if n < 0 => {
                    let Some(p) = 10i64.checked_pow((-n) as u32) else {
                        return Ok(Value::Int(0));
                    };
                    let q = i.div_euclid(p);
                    let r = i.rem_euclid(p);
                    let up = match (2 * r).cmp(&p) {
                        Ordering::Greater => true,
                        Ordering::Equal => q % 2 != 0,
                        Ordering::Less => false,
                    };
                    let q = if up { q + 1 } else { q };
                    q.checked_mul(p).map(Value::Int).ok_or_else(Exception::overflow)
                }
                _ => Ok(Value::Int(i)),
            }
        }
    }
}

fn mod_pow(base: i64, exp: i64, modulus: i64) -> Result<Value, Exception> {
    if modulus == 0 {
        return Err(Exception::value_error("pow() 3rd argument cannot be 0"));
    }
    if exp < 0 {
        return Err(Exception::value_error(
            "pow() 2nd argument cannot be negative when 3rd argument specified",
        ));
    }
    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m);
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        e >>= 1;
    }
    let result = result.rem_euclid(m) as i64;
    // Python's result takes the sign of the modulus.
    Ok(Value::Int(if modulus < 0 && result > 0 {
        result + modulus
    } else {
        result
    }))
}

fn to_int(value: &Value, base: Option<Value>) -> Result<Value, Exception> {
    let base = match base {
        None => None,
        Some(b) => Some(b.as_int().ok_or_else(|| {
            Exception::type_error("'base' must be an integer")
        })?),
    };
    match value {
        Value::Str(s) => parse_int(s, base.unwrap_or(10)),
        _ if base.is_some() => Err(Exception::type_error(
            "int() can't convert non-string with explicit base",
        )),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(Exception::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() || f.abs() >= 9.223372036854775e18 {
                return Err(Exception::new(
                    "OverflowError",
                    "cannot convert float infinity to integer",
                ));
            }
            Ok(Value::Int(f.trunc() as i64))
        }
        v => v.as_int().map(Value::Int).ok_or_else(|| {
            Exception::type_error(format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                v.type_name()
            ))
        }),
    }
}

fn parse_int(text: &str, base: i64) -> Result<Value, Exception> {
    let invalid = || {
        Exception::value_error(format!(
            "invalid literal for int() with base {}: {}",
            base,
            Value::str(text).repr()
        ))
    };
    if base != 0 && !(2..=36).contains(&base) {
        return Err(Exception::value_error("int() base must be >= 2 and <= 36, or 0"));
    }
    let trimmed = text.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = match (base, lower.get(..2)) {
        (16 | 0, Some("0x")) => (16, &body[2..]),
        (8 | 0, Some("0o")) => (8, &body[2..]),
        (2 | 0, Some("0b")) => (2, &body[2..]),
        (0, _) => (10, body),
        (b, _) => (b as u32, body),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let cleaned = digits.replace('_', "");
    let magnitude = u64::from_str_radix(&cleaned, radix).map_err(|e| {
        if matches!(e.kind(), std::num::IntErrorKind::PosOverflow) {
            Exception::overflow()
        } else {
            invalid()
        }
    })?;
    let value = if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    };
    value.map(Value::Int).ok_or_else(Exception::overflow)
}

fn to_float(value: &Value) -> Result<Value, Exception> {
    match value {
        Value::Str(s) => {
            let cleaned = s.trim().replace('_', "");
            cleaned.parse::<f64>().map(Value::Float).map_err(|_| {
                Exception::value_error(format!(
                    "could not convert string to float: {}",
                    value.repr()
                ))
            })
        }
        v => v.as_float().map(Value::Float).ok_or_else(|| {
            Exception::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                v.type_name()
            ))
        }),
    }
}

fn math_domain() -> Exception {
    Exception::value_error("math domain error")
}

fn call_module_function(
    interp: &mut Interpreter,
    module: &str,
    func: &str,
    mut a: CallArgs,
) -> Result<Value, Exception> {
    match (module, func) {
        ("math", "floor" | "ceil" | "trunc") => {
            a.expect(1, 1)?;
            if let Some(i) = a.args[0].as_int() {
                return Ok(Value::Int(i));
            }
            let f = a.float(0)?;
            let r = match func {
                "floor" => f.floor(),
                "ceil" => f.ceil(),
                _ => f.trunc(),
            };
            if !r.is_finite() || r.abs() >= 9.223372036854775e18 {
                return Err(Exception::new(
                    "OverflowError",
                    "cannot convert float infinity to integer",
                ));
            }
            Ok(Value::Int(r as i64))
        }
        ("math", "sqrt") => {
            a.expect(1, 1)?;
            let f = a.float(0)?;
            if f < 0.0 {
                return Err(math_domain());
            }
            Ok(Value::Float(f.sqrt()))
        }
        ("math", "isqrt") => {
            a.expect(1, 1)?;
            let n = a.int(0)?;
            if n < 0 {
                return Err(Exception::value_error(
                    "isqrt() argument must be nonnegative",
                ));
            }
            let mut r = (n as f64).sqrt() as i64;
            while r.checked_mul(r).map_or(true, |sq| sq > n) {
                r -= 1;
            }
            while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
                r += 1;
            }
            Ok(Value::Int(r))
        }
        ("math", "log") => {
            a.expect(1, 2)?;
            let x = a.float(0)?;
            if x <= 0.0 {
                return Err(math_domain());
            }
            match a.args.len() {
                2 => {
                    let b = a.float(1)?;
                    if b <= 0.0 || b == 1.0 {
                        return Err(math_domain());
                    }
                    Ok(Value::Float(x.ln() / b.ln()))
                }
                _ => Ok(Value::Float(x.ln())),
            }
        }
        ("math", "log2" | "log10") => {
            a.expect(1, 1)?;
            let x = a.float(0)?;
            if x <= 0.0 {
                return Err(math_domain());
            }
            Ok(Value::Float(if func == "log2" { x.log2() } else { x.log10() }))
        }
        ("math", "asin" | "acos") => {
            a.expect(1, 1)?;
            let x = a.float(0)?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(math_domain());
            }
            Ok(Value::Float(if func == "asin" { x.asin() } else { x.acos() }))
        }
        ("math", "exp" | "sin" | "cos" | "tan" | "atan" | "fabs" | "degrees" | "radians") => {
            a.expect(1, 1)?;
            let x = a.float(0)?;
            let r = match func {
                "exp" => x.exp(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "atan" => x.atan(),
                "fabs" => x.abs(),
                "degrees" => x.to_degrees(),
                _ => x.to_radians(),
            };
            if r.is_infinite() && x.is_finite() {
                return Err(Exception::new("OverflowError", "math range error"));
            }
            Ok(Value::Float(r))
        }
        ("math", "pow" | "atan2" | "copysign") => {
            a.expect(2, 2)?;
            let (x, y) = (a.float(0)?, a.float(1)?);
            Ok(Value::Float(match func {
                "pow" => {
                    if x < 0.0 && y.fract() != 0.0 {
                        return Err(math_domain());
                    }
                    x.powf(y)
                }
                "atan2" => x.atan2(y),
                _ => x.copysign(y),
            }))
        }
        ("math", "hypot") => {
            let mut total = 0.0f64;
            for i in 0..a.args.len() {
                let x = a.float(i)?;
                total += x * x;
            }
            Ok(Value::Float(total.sqrt()))
        }
        ("math", "isnan" | "isinf" | "isfinite") => {
            a.expect(1, 1)?;
            let x = a.float(0)?;
            Ok(Value::Bool(match func {
                "isnan" => x.is_nan(),
                "isinf" => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        ("math", "isclose") => {
            let rel = a.take_kw("rel_tol").and_then(|v| v.as_float()).unwrap_or(1e-9);
            let abs = a.take_kw("abs_tol").and_then(|v| v.as_float()).unwrap_or(0.0);
            a.finish()?;
            a.expect(2, 2)?;
            let (x, y) = (a.float(0)?, a.float(1)?);
            let close = x == y || (x - y).abs() <= (rel * x.abs().max(y.abs())).max(abs);
            Ok(Value::Bool(close))
        }
        ("math", "factorial") => {
            a.expect(1, 1)?;
            let n = a.int(0)?;
            if n < 0 {
                return Err(Exception::value_error(
                    "factorial() not defined for negative values",
                ));
            }
            let mut acc: i64 = 1;
            for k in 2..=n {
                acc = acc.checked_mul(k).ok_or_else(Exception::overflow)?;
            }
            Ok(Value::Int(acc))
        }
        ("math", "gcd" | "lcm") => {
            let mut acc = if func == "gcd" { 0i64 } else { 1i64 };
            for i in 0..a.args.len() {
                let n = a.int(i)?.checked_abs().ok_or_else(Exception::overflow)?;
                acc = if func == "gcd" {
                    gcd(acc, n)
                } else if acc == 0 || n == 0 {
                    0
                } else {
                    (acc / gcd(acc, n))
                        .checked_mul(n)
                        .ok_or_else(Exception::overflow)?
                };
            }
            Ok(Value::Int(acc))
        }
        ("math", "comb" | "perm") => {
            a.expect(1, 2)?;
            let n = a.int(0)?;
            let k = if a.args.len() == 2 { a.int(1)? } else { n };
            if n < 0 || k < 0 {
                return Err(Exception::value_error(format!(
                    "{} must be a non-negative integer",
                    if n < 0 { "n" } else { "k" }
                )));
            }
            if k > n {
                return Ok(Value::Int(0));
            }
            let mut acc: i128 = 1;
            if func == "perm" {
                for i in 0..k {
                    acc = acc.checked_mul((n - i) as i128).ok_or_else(Exception::overflow)?;
                }
            } else {
                let k = k.min(n - k);
                for i in 0..k {
                    acc = acc.checked_mul((n - i) as i128).ok_or_else(Exception::overflow)? / (i as i128 + 1);
                }
            }
            i64::try_from(acc).map(Value::Int).map_err(|_| Exception::overflow())
        }
        ("math", "prod") => {
            let start = a.take_kw("start").unwrap_or(Value::Int(1));
            a.finish()?;
            a.expect(1, 1)?;
            let mut acc = start;
            for item in collect(&a.args[0])? {
                acc = binary(BinOp::Mul, &acc, &item)?;
            }
            Ok(acc)
        }
        ("math", "fsum") => {
            a.expect(1, 1)?;
            let mut total = 0.0;
            for item in collect(&a.args[0])? {
                total += item.as_float().ok_or_else(|| {
                    Exception::type_error(format!(
                        "must be real number, not {}",
                        item.type_name()
                    ))
                })?;
            }
            Ok(Value::Float(total))
        }
        ("json", "dumps") => {
            let indent = a.take_kw("indent").and_then(|v| v.as_int());
            let sort_keys = a.take_kw("sort_keys").is_some_and(|v| v.truthy());
            a.take_kw("ensure_ascii");
            a.take_kw("default");
            a.finish()?;
            a.expect(1, 1)?;
            let indent = indent.map(|n| n.max(0) as usize);
            if let Some(width) = indent {
                guard_len(width)?;
            }
            let mut out = String::new();
            let mut open = Vec::new();
            dump_json(&a.args[0], indent, sort_keys, 0, &mut open, &mut out)?;
            Ok(Value::Str(out))
        }
        ("json", "loads") => {
            a.expect(1, 1)?;
            let text = a.str(0)?;
            let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                Exception::value_error(format!("Expecting value: {}", e))
            })?;
            Ok(Value::from(parsed))
        }
        ("re", _) if re::FUNCTIONS.contains(&func) => re::call_function(interp, func, a),
        ("functools", "reduce") => {
            a.expect(2, 3)?;
            let func = a.args[0].clone();
            let mut items = collect(&a.args[1])?.into_iter();
            let mut acc = match a.args.get(2) {
                Some(initial) => initial.clone(),
                None => items.next().ok_or_else(|| {
                    Exception::type_error("reduce() of empty iterable with no initial value")
                })?,
            };
            for item in items {
                acc = interp.call(&func, vec![acc, item], Vec::new())?;
            }
            Ok(acc)
        }
        ("collections", "Counter") => {
            a.expect(0, 1)?;
            let mut counts = Dict::new();
            if let Some(source) = a.args.first() {
                for item in collect(source)? {
                    let current = counts.get(&item)?.and_then(|v| v.as_int()).unwrap_or(0);
                    counts.insert(item, Value::Int(current + 1))?;
                }
            }
            Ok(Value::from_dict(counts))
        }
        _ => Err(Exception::attribute_error(format!(
            "module '{}' has no attribute '{}'",
            module, func
        ))),
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

/// `json.dumps` with Python's default separators.
fn dump_json(
    value: &Value,
    indent: Option<usize>,
    sort_keys: bool,
    level: usize,
    open: &mut Vec<usize>,
    out: &mut String,
) -> Result<(), Exception> {
    let id = match value {
        Value::List(items) => Some(Arc::as_ptr(items) as *const () as usize),
        Value::Dict(d) => Some(Arc::as_ptr(d) as *const () as usize),
        _ => None,
    };
    if let Some(id) = id {
        if open.contains(&id) {
            return Err(Exception::value_error("Circular reference detected"));
        }
        open.push(id);
    }
    ensure_sufficient_stack(|| dump_json_value(value, indent, sort_keys, level, open, out))?;
    if id.is_some() {
        open.pop();
    }
    Ok(())
}

fn dump_json_value(
    value: &Value,
    indent: Option<usize>,
    sort_keys: bool,
    level: usize,
    open: &mut Vec<usize>,
    out: &mut String,
) -> Result<(), Exception> {
    let newline = |out: &mut String, level: usize| -> Result<(), Exception> {
        if let Some(width) = indent {
            let pad = width.saturating_mul(level);
            guard_len(out.len().saturating_add(pad))?;
            out.push('\n');
            out.push_str(&" ".repeat(pad));
        }
        Ok(())
    };
    let item_sep = if indent.is_some() { "," } else { ", " };
    match value {
        Value::None => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&if f.is_nan() {
            "NaN".to_string()
        } else if f.is_infinite() {
            (if *f > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
        } else {
            format_float(*f)
        }),
        Value::Str(s) => out.push_str(&serde_json::Value::String(s.clone()).to_string()),
        Value::List(_) | Value::Tuple(_) => {
            let items = value.to_vec().unwrap_or_default();
            if items.is_empty() {
                out.push_str("[]");
                return Ok(());
            }
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1)?;
                dump_json(item, indent, sort_keys, level + 1, open, out)?;
            }
            newline(out, level)?;
            out.push(']');
        }
        Value::Dict(d) => {
            let mut items = d.read().items();
            if items.is_empty() {
                out.push_str("{}");
                return Ok(());
            }
            let mut keyed = Vec::with_capacity(items.len());
            for (k, v) in items.drain(..) {
                let key = match &k {
                    Value::Str(s) => s.clone(),
                    Value::None => "null".to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Int(_) | Value::Float(_) => k.repr(),
                    other => {
                        return Err(Exception::type_error(format!(
                            "keys must be str, int, float, bool or None, not {}",
                            other.type_name()
                        )))
                    }
                };
                keyed.push((key, v));
            }
            if sort_keys {
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
            }
            out.push('{');
            for (idx, (k, v)) in keyed.iter().enumerate() {
                if idx > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1)?;
                out.push_str(&serde_json::Value::String(k.clone()).to_string());
                out.push_str(": ");
                dump_json(v, indent, sort_keys, level + 1, open, out)?;
            }
            newline(out, level)?;
            out.push('}');
        }
        other => {
            return Err(Exception::type_error(format!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &'static str, args: Vec<Value>) -> Result<Value, Exception> {
        let mut interp = Interpreter::new();
        call(&mut interp, name, args, Vec::new())
    }

    #[test]
    fn test_conversions() {
        assert_eq!(run("int", vec![Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(run("int", vec![Value::Float(-3.9)]).unwrap(), Value::Int(-3));
        let err = run("int", vec![Value::str("abc")]).unwrap_err();
        assert_eq!(err.message, "invalid literal for int() with base 10: 'abc'");
        assert_eq!(run("float", vec![Value::str("1.5")]).unwrap(), Value::Float(1.5));
        assert_eq!(run("str", vec![Value::Float(2.0)]).unwrap(), Value::str("2.0"));
    }

    #[test]
    fn test_round_is_bankers() {
        assert_eq!(run("round", vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(run("round", vec![Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            run("round", vec![Value::Float(3.14159), Value::Int(2)]).unwrap(),
            Value::Float(3.14)
        );
        assert_eq!(
            run("round", vec![Value::Int(1250), Value::Int(-2)]).unwrap(),
            Value::Int(1200)
        );
    }

    #[test]
    fn test_aggregates() {
        let nums = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(run("sum", vec![nums.clone()]).unwrap(), Value::Int(6));
        assert_eq!(run("max", vec![nums.clone()]).unwrap(), Value::Int(3));
        assert_eq!(
            run("sorted", vec![nums]).unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        let err = run("min", vec![Value::list(vec![])]).unwrap_err();
        assert_eq!(err.message, "min() arg is an empty sequence");
    }

    #[test]
    fn test_set_deduplicates_in_order() {
        let items = Value::list(vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(
            run("set", vec![items]).unwrap(),
            Value::list(vec![Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn test_isinstance() {
        let int = Value::Builtin("int");
        assert!(is_instance(&Value::Bool(true), &int).unwrap());
        assert!(!is_instance(&Value::Float(1.0), &int).unwrap());
        let either = Value::tuple(vec![Value::Builtin("int"), Value::Builtin("float")]);
        assert!(is_instance(&Value::Float(1.0), &either).unwrap());
    }

    #[test]
    fn test_modules() {
        assert!(import("math").is_ok());
        let err = import("numpy").unwrap_err();
        assert_eq!(err.to_string(), "ModuleNotFoundError: No module named 'numpy'");
        assert_eq!(
            run("math.sqrt", vec![Value::Int(16)]).unwrap(),
            Value::Float(4.0)
        );
        assert!(run("math.sqrt", vec![Value::Int(-1)]).is_err());
        assert_eq!(run("math.factorial", vec![Value::Int(5)]).unwrap(), Value::Int(120));
    }

    #[test]
    fn test_json_roundtrip_uses_python_separators() {
        let d = Value::dict(vec![
            (Value::str("a"), Value::Int(1)),
            (Value::str("b"), Value::list(vec![Value::Bool(true), Value::None])),
        ])
        .unwrap();
        let dumped = run("json.dumps", vec![d]).unwrap();
        assert_eq!(dumped, Value::str(r#"{"a": 1, "b": [true, null]}"#));
        let loaded = run("json.loads", vec![dumped]).unwrap();
        assert_eq!(loaded.repr(), "{'a': 1, 'b': [True, None]}");
    }

    #[test]
    fn test_len_of_huge_range_overflows() {
        let huge = Value::Range {
            start: i64::MIN,
            stop: i64::MAX,
            step: 1,
        };
        assert_eq!(run("len", vec![huge]).unwrap_err().kind, "OverflowError");
        let small = Value::Range {
            start: 0,
            stop: 10,
            step: 3,
        };
        assert_eq!(run("len", vec![small]).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_json_dumps_indent_and_cycles() {
        let mut interp = Interpreter::new();
        let nested = Value::dict(vec![(
            Value::str("k"),
            Value::tuple(vec![Value::Int(1), Value::list(vec![])]),
        )])
        .unwrap();
        let out = call(
            &mut interp,
            "json.dumps",
            vec![nested.clone()],
            vec![("indent".to_string(), Value::Int(2))],
        )
        .unwrap();
        assert_eq!(out, Value::str("{\n  \"k\": [\n    1,\n    []\n  ]\n}"));

        let err = call(
            &mut interp,
            "json.dumps",
            vec![nested],
            vec![("indent".to_string(), Value::Int(1 << 40))],
        )
        .unwrap_err();
        assert_eq!(err.kind, "MemoryError");

        let cyclic = Value::list(vec![]);
        if let Value::List(items) = &cyclic {
            items.write().push(cyclic.clone());
        }
        let err = run("json.dumps", vec![cyclic]).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: Circular reference detected");
    }

    #[test]
    fn test_regex_helpers() {
        let found = run(
            "re.findall",
            vec![Value::str(r"\d+"), Value::str("a1b22c333")],
        )
        .unwrap();
        assert_eq!(found.repr(), "['1', '22', '333']");
        let replaced = run(
            "re.sub",
            vec![
                Value::str(r"(\w+)@(\w+)"),
                Value::str(r"\2 at \1"),
                Value::str("me@host"),
            ],
        )
        .unwrap();
        assert_eq!(replaced, Value::str("host at me"));
    }
}
