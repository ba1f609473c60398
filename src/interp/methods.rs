//! Methods on builtin types: `str`, `list`, `dict`, `tuple`, `int`, `float`.
//!
//! Sets are represented as lists of unique members, so the set methods
//! (`add`, `union`, `issubset`, ...) are available on lists as well.

use super::builtins::{collect, make_set, sort_values, CallArgs};
use super::error::Exception;
use super::eval::Interpreter;
use super::format::str_format;
use super::ops::guard_len;
use super::re;
use super::value::{BoundMethod, Dict, Value};
use std::sync::Arc;

const STR_METHODS: &[&str] = &[
    "capitalize",
    "casefold",
    "center",
    "count",
    "endswith",
    "find",
    "format",
    "index",
    "isalnum",
    "isalpha",
    "isdecimal",
    "isdigit",
    "islower",
    "isnumeric",
    "isspace",
    "istitle",
    "isupper",
    "join",
    "ljust",
    "lower",
    "lstrip",
    "partition",
    "removeprefix",
    "removesuffix",
    "replace",
    "rfind",
    "rindex",
    "rjust",
    "rpartition",
    "rsplit",
    "rstrip",
    "split",
    "splitlines",
    "startswith",
    "strip",
    "swapcase",
    "title",
    "upper",
    "zfill",
];

const LIST_METHODS: &[&str] = &[
    "append",
    "clear",
    "copy",
    "count",
    "extend",
    "index",
    "insert",
    "pop",
    "remove",
    "reverse",
    "sort",
    "add",
    "discard",
    "update",
    "union",
    "intersection",
    "difference",
    "symmetric_difference",
    "issubset",
    "issuperset",
    "isdisjoint",
];

const DICT_METHODS: &[&str] = &[
    "clear",
    "copy",
    "get",
    "items",
    "keys",
    "most_common",
    "pop",
    "popitem",
    "setdefault",
    "update",
    "values",
];

const TUPLE_METHODS: &[&str] = &["count", "index"];
const INT_METHODS: &[&str] = &["bit_length"];
const FLOAT_METHODS: &[&str] = &["is_integer"];

fn methods_of(owner: &str) -> &'static [&'static str] {
    match owner {
        "str" => STR_METHODS,
        "list" | "set" | "frozenset" => LIST_METHODS,
        "dict" => DICT_METHODS,
        "tuple" => TUPLE_METHODS,
        "int" | "bool" => INT_METHODS,
        "float" => FLOAT_METHODS,
        "re.Pattern" => re::PATTERN_METHODS,
        "re.Match" => re::MATCH_METHODS,
        _ => &[],
    }
}

/// `receiver.name`, when `name` is a method of the receiver's type.
pub fn bind(receiver: &Value, name: &str) -> Option<Value> {
    let owner = receiver.type_name();
    methods_of(owner).contains(&name).then(|| {
        Value::Method(Arc::new(BoundMethod {
            receiver: Some(receiver.clone()),
            owner,
            name: name.to_string(),
        }))
    })
}

/// `str.upper` and friends accessed on the class itself.
pub fn unbound(owner: &'static str, name: &str) -> Option<Value> {
    let owner = if matches!(owner, "set" | "frozenset") {
        "list"
    } else {
        owner
    };
    methods_of(owner).contains(&name).then(|| {
        Value::Method(Arc::new(BoundMethod {
            receiver: None,
            owner,
            name: name.to_string(),
        }))
    })
}

pub fn call(
    interp: &mut Interpreter,
    method: &BoundMethod,
    mut args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let receiver = match &method.receiver {
        Some(r) => r.clone(),
        None => {
            if args.is_empty() {
                return Err(Exception::type_error(format!(
                    "unbound method {}.{}() needs an argument",
                    method.owner, method.name
                )));
            }
            args.remove(0)
        }
    };
    let name = method.name.as_str();
    let a = CallArgs::new(name, args, kwargs);
    match &receiver {
        Value::Str(s) => str_method(s, name, a),
        Value::List(_) => list_method(interp, &receiver, name, a),
        Value::Dict(_) => dict_method(&receiver, name, a),
        Value::Tuple(items) => sequence_method(items, name, a, "tuple"),
        Value::Pattern(p) => re::pattern_method(interp, p, name, a),
        Value::Match(m) => re::match_method(m, name, a),
        Value::Int(_) | Value::Bool(_) if name == "bit_length" => {
            a.expect(0, 0)?;
            let i = receiver.as_int().unwrap_or(0);
            Ok(Value::Int(64 - i.unsigned_abs().leading_zeros() as i64))
        }
        Value::Float(f) if name == "is_integer" => {
            a.expect(0, 0)?;
            Ok(Value::Bool(f.is_finite() && f.fract() == 0.0))
        }
        other => Err(Exception::type_error(format!(
            "descriptor '{}' for '{}' objects doesn't apply to a '{}' object",
            name,
            method.owner,
            other.type_name()
        ))),
    }
}

fn char_index(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn arg_str<'a>(a: &'a CallArgs, index: usize, method: &str) -> Result<&'a str, Exception> {
    a.args[index].as_str().ok_or_else(|| {
        Exception::type_error(format!(
            "{}() argument must be str, not {}",
            method,
            a.args[index].type_name()
        ))
    })
}

fn optional_chars(a: &CallArgs, method: &str) -> Result<Option<Vec<char>>, Exception> {
    match a.args.first() {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(chars)) => Ok(Some(chars.chars().collect())),
        Some(other) => Err(Exception::type_error(format!(
            "{} arg must be None or str, not {}",
            method,
            other.type_name()
        ))),
    }
}

fn str_method(s: &str, name: &str, mut a: CallArgs) -> Result<Value, Exception> {
    match name {
        "upper" => {
            a.expect(0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" | "casefold" => {
            a.expect(0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "swapcase" => {
            a.expect(0, 0)?;
            Ok(Value::str(
                s.chars()
                    .map(|c| {
                        if c.is_uppercase() {
                            c.to_lowercase().collect::<String>()
                        } else {
                            c.to_uppercase().collect::<String>()
                        }
                    })
                    .collect::<String>(),
            ))
        }
        "title" => {
            a.expect(0, 0)?;
            let mut out = String::with_capacity(s.len());
            let mut previous_cased = false;
            for c in s.chars() {
                if previous_cased {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                previous_cased = c.is_alphabetic();
            }
            Ok(Value::str(out))
        }
        "capitalize" => {
            a.expect(0, 0)?;
            let mut chars = s.chars();
            Ok(Value::str(match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }))
        }
        "strip" | "lstrip" | "rstrip" => {
            a.expect(0, 1)?;
            let chars = optional_chars(&a, name)?;
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::str(match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            }))
        }
        "split" | "rsplit" => {
            let sep = a.take(0, "sep");
            let maxsplit = a.take(1, "maxsplit").and_then(|v| v.as_int()).unwrap_or(-1);
            a.finish()?;
            a.expect(0, 2)?;
            let parts = match sep {
                None | Some(Value::None) => split_whitespace(s, maxsplit, name == "rsplit"),
                Some(Value::Str(sep)) => {
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    match (maxsplit < 0, name == "rsplit") {
                        (true, _) => s.split(sep.as_str()).map(str::to_string).collect(),
                        (false, false) => s
                            .splitn(maxsplit as usize + 1, sep.as_str())
                            .map(str::to_string)
                            .collect(),
                        (false, true) => {
                            let mut parts: Vec<String> = s
                                .rsplitn(maxsplit as usize + 1, sep.as_str())
                                .map(str::to_string)
                                .collect();
                            parts.reverse();
                            parts
                        }
                    }
                }
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::list(parts.into_iter().map(Value::Str).collect()))
        }
        "splitlines" => {
            let keepends = a.take(0, "keepends").is_some_and(|v| v.truthy());
            let mut lines = Vec::new();
            let mut current = String::new();
            let mut chars = s.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\n' || c == '\r' {
                    if keepends {
                        current.push(c);
                    }
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                        if keepends {
                            current.push('\n');
                        }
                    }
                    lines.push(Value::str(std::mem::take(&mut current)));
                } else {
                    current.push(c);
                }
            }
            if !current.is_empty() {
                lines.push(Value::str(current));
            }
            Ok(Value::list(lines))
        }
        "join" => {
            a.expect(1, 1)?;
            let items = collect(&a.args[0])?;
            let mut pieces = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece.as_str()),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            idx,
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::str(pieces.join(s)))
        }
        "replace" => {
            a.expect(2, 3)?;
            let old = arg_str(&a, 0, name)?;
            let new = arg_str(&a, 1, name)?;
            let count = match a.args.get(2) {
                Some(v) => v.as_int().unwrap_or(-1),
                None => -1,
            };
            Ok(Value::str(if count < 0 {
                s.replace(old, new)
            } else {
                s.replacen(old, new, count as usize)
            }))
        }
        "startswith" | "endswith" => {
            a.expect(1, 1)?;
            let candidates = match &a.args[0] {
                Value::Str(p) => vec![p.clone()],
                Value::Tuple(items) => items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            Exception::type_error(format!(
                                "tuple for {} must only contain str, not {}",
                                name,
                                v.type_name()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(Exception::type_error(format!(
                        "{} first arg must be str or a tuple of str, not {}",
                        name,
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Bool(candidates.iter().any(|p| {
                if name == "startswith" {
                    s.starts_with(p.as_str())
                } else {
                    s.ends_with(p.as_str())
                }
            })))
        }
        "find" | "rfind" | "index" | "rindex" => {
            a.expect(1, 1)?;
            let sub = arg_str(&a, 0, name)?;
            let found = if name.starts_with('r') {
                s.rfind(sub)
            } else {
                s.find(sub)
            };
            match found {
                Some(byte) => Ok(Value::Int(char_index(s, byte))),
                None if name.ends_with("find") => Ok(Value::Int(-1)),
                None => Err(Exception::value_error("substring not found")),
            }
        }
        "count" => {
            a.expect(1, 1)?;
            let sub = arg_str(&a, 0, name)?;
            Ok(Value::Int(if sub.is_empty() {
                s.chars().count() as i64 + 1
            } else {
                s.matches(sub).count() as i64
            }))
        }
        "isdigit" | "isdecimal" | "isnumeric" => {
            a.expect(0, 0)?;
            Ok(Value::Bool(
                !s.is_empty()
                    && s.chars().all(|c| {
                        if name == "isnumeric" {
                            c.is_numeric()
                        } else {
                            c.is_ascii_digit() || (c.is_numeric() && c.to_digit(10).is_some())
                        }
                    }),
            ))
        }
        "isalpha" => {
            a.expect(0, 0)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
        }
        "isalnum" => {
            a.expect(0, 0)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric)))
        }
        "isspace" => {
            a.expect(0, 0)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)))
        }
        "isupper" | "islower" => {
            a.expect(0, 0)?;
            let cased: Vec<char> = s
                .chars()
                .filter(|c| c.is_uppercase() || c.is_lowercase())
                .collect();
            Ok(Value::Bool(
                !cased.is_empty()
                    && cased.iter().all(|c| {
                        if name == "isupper" {
                            c.is_uppercase()
                        } else {
                            c.is_lowercase()
                        }
                    }),
            ))
        }
        "istitle" => {
            a.expect(0, 0)?;
            let titled = str_method(s, "title", CallArgs::new("title", Vec::new(), Vec::new()))?;
            Ok(Value::Bool(
                s.chars().any(char::is_alphabetic) && titled.as_str() == Some(s),
            ))
        }
        "zfill" => {
            a.expect(1, 1)?;
            let width = a.int(0)?.max(0) as usize;
            let len = s.chars().count();
            if len >= width {
                return Ok(Value::str(s));
            }
            guard_len(width)?;
            let (sign, digits) = match s.chars().next() {
                Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                _ => (String::new(), s),
            };
            Ok(Value::str(format!(
                "{}{}{}",
                sign,
                "0".repeat(width - len),
                digits
            )))
        }
        "center" | "ljust" | "rjust" => {
            a.expect(1, 2)?;
            let width = a.int(0)?.max(0) as usize;
            let fill = match a.args.get(1) {
                Some(Value::Str(f)) if f.chars().count() == 1 => f.clone(),
                Some(_) => {
                    return Err(Exception::type_error(
                        "The fill character must be exactly one character long",
                    ))
                }
                None => " ".to_string(),
            };
            let len = s.chars().count();
            if len >= width {
                return Ok(Value::str(s));
            }
            guard_len(width)?;
            let total = width - len;
            let (left, right) = match name {
                "ljust" => (0, total),
                "rjust" => (total, 0),
                // Odd padding goes left only when the target width is odd.
                _ => {
                    let left = total / 2 + (total & width & 1);
                    (left, total - left)
                }
            };
            Ok(Value::str(format!(
                "{}{}{}",
                fill.repeat(left),
                s,
                fill.repeat(right)
            )))
        }
        "partition" | "rpartition" => {
            a.expect(1, 1)?;
            let sep = arg_str(&a, 0, name)?;
            if sep.is_empty() {
                return Err(Exception::value_error("empty separator"));
            }
            let split = if name == "partition" {
                s.split_once(sep)
            } else {
                s.rsplit_once(sep)
            };
            Ok(Value::tuple(match split {
                Some((head, tail)) => vec![Value::str(head), Value::str(sep), Value::str(tail)],
                None if name == "partition" => {
                    vec![Value::str(s), Value::str(""), Value::str("")]
                }
                None => vec![Value::str(""), Value::str(""), Value::str(s)],
            }))
        }
        "removeprefix" => {
            a.expect(1, 1)?;
            let prefix = arg_str(&a, 0, name)?;
            Ok(Value::str(s.strip_prefix(prefix).unwrap_or(s)))
        }
        "removesuffix" => {
            a.expect(1, 1)?;
            let suffix = arg_str(&a, 0, name)?;
            Ok(Value::str(s.strip_suffix(suffix).unwrap_or(s)))
        }
        "format" => {
            let (args, kwargs) = a.into_parts();
            Ok(Value::str(str_format(s, &args, &kwargs)?))
        }
        _ => Err(Exception::attribute_error(format!(
            "'str' object has no attribute '{}'",
            name
        ))),
    }
}

fn split_whitespace(s: &str, maxsplit: i64, from_right: bool) -> Vec<String> {
    if maxsplit < 0 {
        return s.split_whitespace().map(str::to_string).collect();
    }
    let mut parts = Vec::new();
    let mut rest = if from_right { s.trim_end() } else { s.trim_start() };
    while (parts.len() as i64) < maxsplit && !rest.is_empty() {
        let cut = if from_right {
            rest.rfind(char::is_whitespace)
        } else {
            rest.find(char::is_whitespace)
        };
        let Some(at) = cut else {
            break;
        };
        if from_right {
            let ws_len = rest[at..].chars().next().map(char::len_utf8).unwrap_or(1);
            parts.push(rest[at + ws_len..].to_string());
            rest = rest[..at].trim_end();
        } else {
            parts.push(rest[..at].to_string());
            rest = rest[at..].trim_start();
        }
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    if from_right {
        parts.reverse();
    }
    parts
}

fn sequence_method(items: &[Value], name: &str, a: CallArgs, kind: &str) -> Result<Value, Exception> {
    match name {
        "count" => {
            a.expect(1, 1)?;
            Ok(Value::Int(
                items.iter().filter(|x| **x == a.args[0]).count() as i64,
            ))
        }
        "index" => {
            a.expect(1, 1)?;
            items
                .iter()
                .position(|x| *x == a.args[0])
                .map(|p| Value::Int(p as i64))
                .ok_or_else(|| {
                    Exception::value_error(if kind == "list" {
                        format!("{} is not in list", a.args[0].repr())
                    } else {
                        "tuple.index(x): x not in tuple".to_string()
                    })
                })
        }
        _ => Err(Exception::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            kind, name
        ))),
    }
}

fn list_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    mut a: CallArgs,
) -> Result<Value, Exception> {
    let Value::List(cell) = receiver else {
        return Err(Exception::type_error("expected a list"));
    };
    match name {
        "append" => {
            a.expect(1, 1)?;
            cell.write().push(a.args[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            a.expect(1, 1)?;
            // Collect before locking: `xs.extend(xs)` reads the same list.
            let items = collect(&a.args[0])?;
            cell.write().extend(items);
            Ok(Value::None)
        }
        "insert" => {
            a.expect(2, 2)?;
            let index = a.int(0)?;
            let mut items = cell.write();
            let len = items.len() as i64;
            let pos = if index < 0 {
                (index + len).max(0)
            } else {
                index.min(len)
            };
            items.insert(pos as usize, a.args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            a.expect(0, 1)?;
            let index = if a.args.is_empty() { -1 } else { a.int(0)? };
            let mut items = cell.write();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let len = items.len() as i64;
            let pos = if index < 0 { index + len } else { index };
            if pos < 0 || pos >= len {
                return Err(Exception::index_error("pop index out of range"));
            }
            Ok(items.remove(pos as usize))
        }
        "remove" | "discard" => {
            a.expect(1, 1)?;
            let snapshot = cell.read().clone();
            match snapshot.iter().position(|x| *x == a.args[0]) {
                Some(pos) => {
                    cell.write().remove(pos);
                    Ok(Value::None)
                }
                None if name == "discard" => Ok(Value::None),
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        "add" => {
            a.expect(1, 1)?;
            a.args[0].hash_key()?;
            let present = cell.read().iter().any(|x| *x == a.args[0]);
            if !present {
                cell.write().push(a.args[0].clone());
            }
            Ok(Value::None)
        }
        "update" => {
            let mut merged = cell.read().clone();
            for source in &a.args {
                merged.extend(collect(source)?);
            }
            let Value::List(unique) = make_set(merged)? else {
                return Ok(Value::None);
            };
            let unique = unique.read().clone();
            *cell.write() = unique;
            Ok(Value::None)
        }
        "union" | "intersection" | "difference" | "symmetric_difference" => {
            let mut result = Value::list(cell.read().clone());
            let op = match name {
                "union" => super::ast::BinOp::BitOr,
                "intersection" => super::ast::BinOp::BitAnd,
                "difference" => super::ast::BinOp::Sub,
                _ => super::ast::BinOp::BitXor,
            };
            for other in &a.args {
                let other = Value::list(collect(other)?);
                result = super::ops::binary(op, &result, &other)?;
            }
            if a.args.is_empty() {
                result = make_set(collect(&result)?)?;
            }
            Ok(result)
        }
        "issubset" | "issuperset" | "isdisjoint" => {
            a.expect(1, 1)?;
            let mine = cell.read().clone();
            let theirs = collect(&a.args[0])?;
            let within = |xs: &[Value], ys: &[Value]| xs.iter().all(|x| ys.contains(x));
            Ok(Value::Bool(match name {
                "issubset" => within(&mine, &theirs),
                "issuperset" => within(&theirs, &mine),
                _ => !mine.iter().any(|x| theirs.contains(x)),
            }))
        }
        "reverse" => {
            a.expect(0, 0)?;
            cell.write().reverse();
            Ok(Value::None)
        }
        "sort" => {
            let key = a.take_kw("key");
            let reverse = a.take_kw("reverse").is_some_and(|v| v.truthy());
            a.finish()?;
            a.expect(0, 0)?;
            let snapshot = cell.read().clone();
            let sorted = sort_values(interp, snapshot, key, reverse)?;
            *cell.write() = sorted;
            Ok(Value::None)
        }
        "copy" => {
            a.expect(0, 0)?;
            Ok(Value::list(cell.read().clone()))
        }
        "clear" => {
            a.expect(0, 0)?;
            cell.write().clear();
            Ok(Value::None)
        }
        "count" | "index" => {
            let snapshot = cell.read().clone();
            sequence_method(&snapshot, name, a, "list")
        }
        _ => Err(Exception::attribute_error(format!(
            "'list' object has no attribute '{}'",
            name
        ))),
    }
}

fn dict_method(receiver: &Value, name: &str, mut a: CallArgs) -> Result<Value, Exception> {
    let Value::Dict(cell) = receiver else {
        return Err(Exception::type_error("expected a dict"));
    };
    match name {
        "get" => {
            a.expect(1, 2)?;
            let found = cell.read().get(&a.args[0])?;
            Ok(found.unwrap_or_else(|| a.args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => {
            a.expect(0, 0)?;
            Ok(Value::list(cell.read().keys()))
        }
        "values" => {
            a.expect(0, 0)?;
            Ok(Value::list(cell.read().values()))
        }
        "items" => {
            a.expect(0, 0)?;
            let items = cell.read().items();
            Ok(Value::list(
                items
                    .into_iter()
                    .map(|(k, v)| Value::tuple(vec![k, v]))
                    .collect(),
            ))
        }
        "update" => {
            a.expect(0, 1)?;
            let mut incoming = Dict::new();
            if let Some(source) = a.args.first() {
                match source {
                    Value::Dict(other) => {
                        for (k, v) in other.read().items() {
                            incoming.insert(k, v)?;
                        }
                    }
                    pairs => {
                        for pair in collect(pairs)? {
                            let items = pair.to_vec().unwrap_or_default();
                            if items.len() != 2 {
                                return Err(Exception::value_error(format!(
                                    "dictionary update sequence element has length {}; 2 is required",
                                    items.len()
                                )));
                            }
                            incoming.insert(items[0].clone(), items[1].clone())?;
                        }
                    }
                }
            }
            let (_, kwargs) = a.into_parts();
            for (k, v) in kwargs {
                incoming.insert(Value::Str(k), v)?;
            }
            let mut target = cell.write();
            for (k, v) in incoming.items() {
                target.insert(k, v)?;
            }
            Ok(Value::None)
        }
        "pop" => {
            a.expect(1, 2)?;
            let removed = cell.write().remove(&a.args[0])?;
            match (removed, a.args.get(1)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Exception::key_error(a.args[0].repr())),
            }
        }
        "setdefault" => {
            a.expect(1, 2)?;
            let existing = cell.read().get(&a.args[0])?;
            match existing {
                Some(v) => Ok(v),
                None => {
                    let default = a.args.get(1).cloned().unwrap_or(Value::None);
                    cell.write().insert(a.args[0].clone(), default.clone())?;
                    Ok(default)
                }
            }
        }
        "popitem" => {
            a.expect(0, 0)?;
            cell.write()
                .pop_last()
                .map(|(k, v)| Value::tuple(vec![k, v]))
                .ok_or_else(|| Exception::key_error("'popitem(): dictionary is empty'"))
        }
        "copy" => {
            a.expect(0, 0)?;
            Ok(Value::from_dict(cell.read().clone()))
        }
        "clear" => {
            a.expect(0, 0)?;
            cell.write().clear();
            Ok(Value::None)
        }
        "most_common" => {
            a.expect(0, 1)?;
            let mut items = cell.read().items();
            // Stable sort keeps insertion order among equal counts.
            items.sort_by(|(_, x), (_, y)| {
                y.compare(x, "<")
                    .ok()
                    .flatten()
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if let Some(n) = a.args.first().and_then(Value::as_int) {
                items.truncate(n.max(0) as usize);
            }
            Ok(Value::list(
                items
                    .into_iter()
                    .map(|(k, v)| Value::tuple(vec![k, v]))
                    .collect(),
            ))
        }
        _ => Err(Exception::attribute_error(format!(
            "'dict' object has no attribute '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_on(receiver: Value, name: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let mut interp = Interpreter::new();
        let method = bind(&receiver, name).expect("method exists");
        let Value::Method(m) = method else {
            panic!("expected a bound method");
        };
        call(&mut interp, &m, args, Vec::new())
    }

    #[test]
    fn test_string_methods() {
        let s = Value::str("  Hello World  ");
        assert_eq!(call_on(s.clone(), "strip", vec![]).unwrap(), Value::str("Hello World"));
        assert_eq!(
            call_on(s, "split", vec![]).unwrap(),
            Value::list(vec![Value::str("Hello"), Value::str("World")])
        );
        assert_eq!(
            call_on(Value::str("a,b,,c"), "split", vec![Value::str(",")])
                .unwrap()
                .repr(),
            "['a', 'b', '', 'c']"
        );
        assert_eq!(
            call_on(Value::str("hello world"), "title", vec![]).unwrap(),
            Value::str("Hello World")
        );
        assert_eq!(
            call_on(Value::str("-"), "join", vec![Value::list(vec![Value::str("a"), Value::str("b")])])
                .unwrap(),
            Value::str("a-b")
        );
        assert_eq!(
            call_on(Value::str("42"), "zfill", vec![Value::Int(5)]).unwrap(),
            Value::str("00042")
        );
        assert!(call_on(Value::str("-"), "join", vec![Value::list(vec![Value::Int(1)])]).is_err());
    }

    #[test]
    fn test_list_methods_mutate_shared_list() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1)]);
        call_on(list.clone(), "append", vec![Value::Int(2)]).unwrap();
        call_on(list.clone(), "sort", vec![]).unwrap();
        assert_eq!(list.repr(), "[1, 2, 3]");
        assert_eq!(call_on(list.clone(), "pop", vec![]).unwrap(), Value::Int(3));
        let err = call_on(Value::list(vec![]), "pop", vec![]).unwrap_err();
        assert_eq!(err.message, "pop from empty list");
    }

    #[test]
    fn test_dict_methods() {
        let d = Value::dict(vec![(Value::str("a"), Value::Int(1))]).unwrap();
        assert_eq!(
            call_on(d.clone(), "get", vec![Value::str("z"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        call_on(d.clone(), "setdefault", vec![Value::str("b"), Value::Int(2)]).unwrap();
        assert_eq!(d.repr(), "{'a': 1, 'b': 2}");
        assert_eq!(
            call_on(d.clone(), "items", vec![]).unwrap().repr(),
            "[('a', 1), ('b', 2)]"
        );
        assert!(call_on(d, "pop", vec![Value::str("missing")]).is_err());
    }

    #[test]
    fn test_unbound_method_takes_receiver_first() {
        let mut interp = Interpreter::new();
        let Some(Value::Method(m)) = unbound("str", "upper") else {
            panic!("expected str.upper");
        };
        let out = call(&mut interp, &m, vec![Value::str("abc")], Vec::new()).unwrap();
        assert_eq!(out, Value::str("ABC"));
    }
}
