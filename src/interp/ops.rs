//! Operator semantics: arithmetic, comparison, membership and item access.
//!
//! Integers are 64-bit. Anything that would need a big integer raises
//! `OverflowError` instead of wrapping.

use super::ast::{BinOp, CmpOp, UnaryOp};
use super::error::Exception;
use super::format::percent_format;
use super::value::{range_len, Num, Value};
use std::cmp::Ordering;

/// Upper bound on the length of a sequence built by `*` or `+`.
const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// A subscript: `x[i]` or `x[a:b:c]`.
#[derive(Debug, Clone)]
pub enum Index {
    Item(Value),
    Slice(Option<i64>, Option<i64>, Option<i64>),
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (left.as_num(), right.as_num()) {
        let both_bool = matches!((left, right), (Value::Bool(_), Value::Bool(_)));
        return numeric(op, a, b, both_bool).unwrap_or_else(|| Err(unsupported(op, left, right)));
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            guard_len(a.len() + b.len())?;
            Ok(Value::Str(format!("{}{}", a, b)))
        }
        (BinOp::Add, Value::Str(_), other) => Err(Exception::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinOp::Add, Value::List(_), Value::List(_)) => {
            let mut items = left.to_vec().unwrap_or_default();
            let rest = right.to_vec().unwrap_or_default();
            guard_len(items.len() + rest.len())?;
            items.extend(rest);
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::List(_), other) => Err(Exception::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            guard_len(a.len() + b.len())?;
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        (BinOp::Mul, seq, Value::Int(_) | Value::Bool(_)) if is_sequence(seq) => {
            repeat(seq, right.as_int().unwrap_or(0))
        }
        (BinOp::Mul, Value::Int(_) | Value::Bool(_), seq) if is_sequence(seq) => {
            repeat(seq, left.as_int().unwrap_or(0))
        }
        (BinOp::Mod, Value::Str(fmt), args) => Ok(Value::Str(percent_format(fmt, args)?)),
        (BinOp::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.read().clone();
            let other = b.read().clone();
            for (k, v) in other.items() {
                merged.insert(k, v)?;
            }
            Ok(Value::from_dict(merged))
        }
        // Sets are lists with unique members, so list operands get set algebra.
        (BinOp::BitOr | BinOp::BitAnd | BinOp::Sub | BinOp::BitXor, Value::List(_), Value::List(_)) => {
            set_algebra(op, left, right)
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn numeric(op: BinOp, a: Num, b: Num, both_bool: bool) -> Option<Result<Value, Exception>> {
    if op == BinOp::MatMul {
        return None;
    }
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(int_op(op, x, y, both_bool)),
        (a, b) => float_op(op, a.as_f64(), b.as_f64()),
    }
}

fn int_op(op: BinOp, x: i64, y: i64, both_bool: bool) -> Result<Value, Exception> {
    let checked = |r: Option<i64>| r.map(Value::Int).ok_or_else(Exception::overflow);
    match op {
        BinOp::Add => checked(x.checked_add(y)),
        BinOp::Sub => checked(x.checked_sub(y)),
        BinOp::Mul => checked(x.checked_mul(y)),
        BinOp::Div => {
            if y == 0 {
                return Err(Exception::zero_division("division by zero"));
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(Exception::overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(Exception::zero_division("integer modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            let adjust = r != 0 && ((r < 0) != (y < 0));
            Ok(Value::Int(if adjust { r + y } else { r }))
        }
        BinOp::Pow => int_pow(x, y),
        BinOp::BitAnd if both_bool => Ok(Value::Bool(x & y != 0)),
        BinOp::BitOr if both_bool => Ok(Value::Bool(x | y != 0)),
        BinOp::BitXor if both_bool => Ok(Value::Bool(x ^ y != 0)),
        BinOp::BitAnd => Ok(Value::Int(x & y)),
        BinOp::BitOr => Ok(Value::Int(x | y)),
        BinOp::BitXor => Ok(Value::Int(x ^ y)),
        BinOp::LShift => {
            if y < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            if x == 0 {
                return Ok(Value::Int(0));
            }
            if y >= 63 {
                return Err(Exception::overflow());
            }
            let shifted = x << y;
            if shifted >> y != x {
                return Err(Exception::overflow());
            }
            Ok(Value::Int(shifted))
        }
        BinOp::RShift => {
            if y < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            Ok(Value::Int(if y >= 64 {
                if x < 0 {
                    -1
                } else {
                    0
                }
            } else {
                x >> y
            }))
        }
        BinOp::MatMul => Err(Exception::type_error(
            "unsupported operand type(s) for @: 'int' and 'int'",
        )),
    }
}

fn int_pow(base: i64, exp: i64) -> Result<Value, Exception> {
    if exp < 0 {
        if base == 0 {
            return Err(Exception::zero_division(
                "0.0 cannot be raised to a negative power",
            ));
        }
        return Ok(Value::Float((base as f64).powf(exp as f64)));
    }
    match base {
        0 | 1 => return Ok(Value::Int(if exp == 0 { 1 } else { base })),
        -1 => return Ok(Value::Int(if exp % 2 == 0 { 1 } else { -1 })),
        _ => {}
    }
    let exp = u32::try_from(exp).map_err(|_| Exception::overflow())?;
    base.checked_pow(exp)
        .map(Value::Int)
        .ok_or_else(Exception::overflow)
}

fn float_op(op: BinOp, x: f64, y: f64) -> Option<Result<Value, Exception>> {
    let result = match op {
        BinOp::Add => Ok(x + y),
        BinOp::Sub => Ok(x - y),
        BinOp::Mul => Ok(x * y),
        BinOp::Div => {
            if y == 0.0 {
                Err(Exception::zero_division("float division by zero"))
            } else {
                Ok(x / y)
            }
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                Err(Exception::zero_division("float floor division by zero"))
            } else {
                Ok((x / y).floor())
            }
        }
        BinOp::Mod => {
            if y == 0.0 {
                Err(Exception::zero_division("float modulo"))
            } else {
                let r = x % y;
                Ok(if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                    r + y
                } else {
                    r
                })
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                Err(Exception::zero_division(
                    "0.0 cannot be raised to a negative power",
                ))
            } else if x < 0.0 && y.fract() != 0.0 {
                Err(Exception::value_error("math domain error"))
            } else {
                let r = x.powf(y);
                if r.is_infinite() && x.is_finite() && y.is_finite() {
                    Err(Exception::new("OverflowError", "(34, 'Numerical result out of range')"))
                } else {
                    Ok(r)
                }
            }
        }
        _ => return None,
    };
    Some(result.map(Value::Float))
}

fn is_sequence(v: &Value) -> bool {
    matches!(v, Value::Str(_) | Value::List(_) | Value::Tuple(_))
}

pub(crate) fn guard_len(len: usize) -> Result<(), Exception> {
    if len > MAX_SEQUENCE_LEN {
        return Err(Exception::new("MemoryError", "sequence too large"));
    }
    Ok(())
}

fn repeat(seq: &Value, times: i64) -> Result<Value, Exception> {
    let times = usize::try_from(times.max(0)).unwrap_or(0);
    let unit = seq.len().unwrap_or(0);
    guard_len(unit.saturating_mul(times))?;
    Ok(match seq {
        Value::Str(s) => Value::Str(s.repeat(times)),
        Value::List(items) => Value::list(cycled(&items.read(), times)),
        Value::Tuple(items) => Value::tuple(cycled(items, times)),
        other => {
            return Err(Exception::type_error(format!(
                "can't multiply sequence of type '{}'",
                other.type_name()
            )))
        }
    })
}

fn cycled(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

fn set_algebra(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    let a = left.to_vec().unwrap_or_default();
    let b = right.to_vec().unwrap_or_default();
    let in_b = |x: &Value| b.iter().any(|y| y == x);
    let in_a = |x: &Value| a.iter().any(|y| y == x);
    let mut out: Vec<Value> = Vec::new();
    let mut push = |x: &Value| {
        if !out.iter().any(|y| y == x) {
            out.push(x.clone());
        }
    };
    match op {
        BinOp::BitOr => a.iter().chain(b.iter()).for_each(&mut push),
        BinOp::BitAnd => a.iter().filter(|x| in_b(x)).for_each(&mut push),
        BinOp::Sub => a.iter().filter(|x| !in_b(x)).for_each(&mut push),
        _ => {
            a.iter().filter(|x| !in_b(x)).for_each(&mut push);
            b.iter().filter(|x| !in_a(x)).for_each(&mut push);
        }
    }
    Ok(Value::list(out))
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, Exception> {
    let bad = || {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        };
        Exception::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            value.type_name()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => match value.as_num() {
            Some(Num::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(Exception::overflow),
            Some(Num::Float(f)) => Ok(Value::Float(-f)),
            None => Err(bad()),
        },
        UnaryOp::Pos => match value.as_num() {
            Some(Num::Int(i)) => Ok(Value::Int(i)),
            Some(Num::Float(f)) => Ok(Value::Float(f)),
            None => Err(bad()),
        },
        UnaryOp::Invert => match value.as_num() {
            Some(Num::Int(i)) => Ok(Value::Int(!i)),
            _ => Err(bad()),
        },
    }
}

pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, Exception> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool, Exception> {
        Ok(left.compare(right, op.symbol())?.is_some_and(accept))
    };
    match op {
        CmpOp::Eq => left.equals(right),
        CmpOp::NotEq => left.equals(right).map(|eq| !eq),
        CmpOp::Lt => ordered(|o| o == Ordering::Less),
        CmpOp::LtE => ordered(|o| o != Ordering::Greater),
        CmpOp::Gt => ordered(|o| o == Ordering::Greater),
        CmpOp::GtE => ordered(|o| o != Ordering::Less),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(left.identical(right)),
        CmpOp::IsNot => Ok(!left.identical(right)),
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool, Exception> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => {
            let items = items.read().clone();
            any_equal(&items, item)
        }
        Value::Tuple(items) => any_equal(items, item),
        Value::Dict(d) => d.read().contains(item),
        Value::Range { start, stop, step } => {
            let Some(n) = integral(item) else {
                return Ok(false);
            };
            let (start, stop, step) = (*start, *stop, *step);
            let inside = if step > 0 {
                n >= start && n < stop
            } else {
                n <= start && n > stop
            };
            Ok(inside && (n - start) % step == 0)
        }
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn any_equal(items: &[Value], item: &Value) -> Result<bool, Exception> {
    for x in items {
        if x.identical(item) || x.equals(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn integral(v: &Value) -> Option<i64> {
    match v.as_num()? {
        Num::Int(i) => Some(i),
        Num::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(f as i64),
        Num::Float(_) => None,
    }
}

/// Positions selected by a slice over a sequence of `len` items.
pub fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, Exception> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Exception::value_error("slice step cannot be zero"));
    }
    let len = len as i64;
    let adjust = |v: i64| -> i64 {
        if v < 0 {
            let v = v + len;
            if v < 0 {
                if step < 0 {
                    -1
                } else {
                    0
                }
            } else {
                v
            }
        } else if v >= len {
            if step < 0 {
                len - 1
            } else {
                len
            }
        } else {
            v
        }
    };
    let (start, stop) = if step > 0 {
        (lower.map(adjust).unwrap_or(0), upper.map(adjust).unwrap_or(len))
    } else {
        (
            lower.map(adjust).unwrap_or(len - 1),
            upper.map(adjust).unwrap_or(-1),
        )
    };
    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        positions.push(i as usize);
        i += step;
    }
    Ok(positions)
}

fn normalize_index(len: usize, index: &Value, kind: &str, action: &str) -> Result<usize, Exception> {
    let Some(i) = index.as_int() else {
        return Err(Exception::type_error(format!(
            "{} indices must be integers or slices, not {}",
            kind,
            index.type_name()
        )));
    };
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(Exception::index_error(format!("{} {} out of range", kind, action)));
    }
    Ok(resolved as usize)
}

pub fn get_item(container: &Value, index: &Index) -> Result<Value, Exception> {
    match (container, index) {
        (Value::List(items), Index::Item(i)) => {
            let items = items.read();
            let pos = normalize_index(items.len(), i, "list", "index")?;
            Ok(items[pos].clone())
        }
        (Value::Tuple(items), Index::Item(i)) => {
            let pos = normalize_index(items.len(), i, "tuple", "index")?;
            Ok(items[pos].clone())
        }
        (Value::Str(s), Index::Item(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let pos = normalize_index(chars.len(), i, "string", "index")?;
            Ok(Value::Str(chars[pos].to_string()))
        }
        (Value::Range { start, stop, step }, Index::Item(i)) => {
            let pos = normalize_index(range_len(*start, *stop, *step), i, "range object", "index")?;
            Ok(Value::Int(start + pos as i64 * step))
        }
        (Value::Match(m), Index::Item(group)) => m.item(group),
        (Value::List(items), Index::Slice(a, b, c)) => {
            let items = items.read();
            let picked = slice_positions(items.len(), *a, *b, *c)?
                .into_iter()
                .map(|p| items[p].clone())
                .collect();
            Ok(Value::list(picked))
        }
        (Value::Tuple(items), Index::Slice(a, b, c)) => {
            let picked = slice_positions(items.len(), *a, *b, *c)?
                .into_iter()
                .map(|p| items[p].clone())
                .collect();
            Ok(Value::tuple(picked))
        }
        (Value::Str(s), Index::Slice(a, b, c)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                slice_positions(chars.len(), *a, *b, *c)?
                    .into_iter()
                    .map(|p| chars[p])
                    .collect(),
            ))
        }
        (Value::Range { start, stop, step }, Index::Slice(a, b, c)) => {
            let positions = slice_positions(range_len(*start, *stop, *step), *a, *b, *c)?;
            let new_step = step * c.unwrap_or(1);
            let new_start = positions.first().map(|p| start + *p as i64 * step).unwrap_or(*start);
            Ok(Value::Range {
                start: new_start,
                stop: new_start + positions.len() as i64 * new_step,
                step: new_step,
            })
        }
        (Value::Dict(d), Index::Item(key)) => d
            .read()
            .get(key)?
            .ok_or_else(|| Exception::key_error(key.repr())),
        (Value::Dict(_), Index::Slice(..)) => {
            Err(Exception::type_error("unhashable type: 'slice'"))
        }
        (other, _) => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn set_item(container: &Value, index: &Index, value: Value) -> Result<(), Exception> {
    match (container, index) {
        (Value::List(items), Index::Item(i)) => {
            let mut items = items.write();
            let pos = normalize_index(items.len(), i, "list", "assignment index")?;
            items[pos] = value;
            Ok(())
        }
        (Value::List(items), Index::Slice(a, b, c)) => {
            // Collect first: the right-hand side may alias the target.
            let replacement: Vec<Value> = value.iter_values()?.collect();
            let mut items = items.write();
            let len = items.len();
            if c.unwrap_or(1) == 1 {
                let positions = slice_positions(len, *a, *b, Some(1))?;
                let start = match positions.first() {
                    Some(p) => *p,
                    None => slice_positions(len, *a, None, Some(1))?
                        .first()
                        .copied()
                        .unwrap_or(len),
                };
                let end = start + positions.len();
                items.splice(start..end, replacement);
                return Ok(());
            }
            let positions = slice_positions(len, *a, *b, *c)?;
            if positions.len() != replacement.len() {
                return Err(Exception::value_error(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    replacement.len(),
                    positions.len()
                )));
            }
            for (p, v) in positions.into_iter().zip(replacement) {
                items[p] = v;
            }
            Ok(())
        }
        (Value::Dict(d), Index::Item(key)) => d.write().insert(key.clone(), value),
        (other, _) => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn del_item(container: &Value, index: &Index) -> Result<(), Exception> {
    match (container, index) {
        (Value::List(items), Index::Item(i)) => {
            let mut items = items.write();
            let pos = normalize_index(items.len(), i, "list", "assignment index")?;
            items.remove(pos);
            Ok(())
        }
        (Value::List(items), Index::Slice(a, b, c)) => {
            let mut items = items.write();
            let mut positions = slice_positions(items.len(), *a, *b, *c)?;
            positions.sort_unstable_by(|x, y| y.cmp(x));
            for p in positions {
                items.remove(p);
            }
            Ok(())
        }
        (Value::Dict(d), Index::Item(key)) => d
            .write()
            .remove(key)?
            .map(|_| ())
            .ok_or_else(|| Exception::key_error(key.repr())),
        (other, _) => Err(Exception::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn test_floor_division_and_modulo_follow_python() {
        assert_eq!(binary(BinOp::FloorDiv, &int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(binary(BinOp::Mod, &int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(binary(BinOp::Mod, &int(7), &int(-2)).unwrap(), int(-1));
        assert_eq!(
            binary(BinOp::Div, &int(7), &int(2)).unwrap(),
            Value::Float(3.5)
        );
        let err = binary(BinOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_overflow_is_raised_not_wrapped() {
        let err = binary(BinOp::Mul, &int(i64::MAX), &int(2)).unwrap_err();
        assert_eq!(err.kind, "OverflowError");
        assert_eq!(binary(BinOp::Pow, &int(2), &int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_mixed_type_errors() {
        let err = binary(BinOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.message,
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
        let err = binary(BinOp::Add, &Value::str("a"), &int(1)).unwrap_err();
        assert!(err.message.contains("can only concatenate str"));
    }

    #[test]
    fn test_sequence_ops() {
        assert_eq!(
            binary(BinOp::Mul, &Value::str("ab"), &int(3)).unwrap(),
            Value::str("ababab")
        );
        let joined = binary(
            BinOp::Add,
            &Value::list(vec![int(1)]),
            &Value::list(vec![int(2)]),
        )
        .unwrap();
        assert_eq!(joined, Value::list(vec![int(1), int(2)]));
    }

    #[test]
    fn test_list_and_tuple_repetition() {
        let list = Value::list(vec![int(1), Value::str("x")]);
        assert_eq!(
            binary(BinOp::Mul, &list, &int(2)).unwrap().repr(),
            "[1, 'x', 1, 'x']"
        );
        let tuple = Value::tuple(vec![int(7)]);
        assert_eq!(binary(BinOp::Mul, &int(3), &tuple).unwrap().repr(), "(7, 7, 7)");
        assert_eq!(binary(BinOp::Mul, &list, &int(-1)).unwrap().repr(), "[]");
        let err = binary(BinOp::Mul, &list, &int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, "MemoryError");
    }

    #[test]
    fn test_slices() {
        let s = Value::str("hello");
        assert_eq!(
            get_item(&s, &Index::Slice(None, None, Some(-1))).unwrap(),
            Value::str("olleh")
        );
        assert_eq!(
            get_item(&s, &Index::Slice(Some(1), Some(-1), None)).unwrap(),
            Value::str("ell")
        );
        assert_eq!(slice_positions(5, Some(-100), Some(100), None).unwrap().len(), 5);
        assert!(slice_positions(5, None, None, Some(0)).is_err());
    }

    #[test]
    fn test_item_errors() {
        let list = Value::list(vec![int(1)]);
        let err = get_item(&list, &Index::Item(int(3))).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: list index out of range");
        let d = Value::dict(vec![(Value::str("a"), int(1))]).unwrap();
        let err = get_item(&d, &Index::Item(Value::str("b"))).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'b'");
    }

    #[test]
    fn test_slice_assignment_and_delete() {
        let list = Value::list(vec![int(1), int(2), int(3), int(4)]);
        set_item(
            &list,
            &Index::Slice(Some(1), Some(3), None),
            Value::list(vec![int(9)]),
        )
        .unwrap();
        assert_eq!(list, Value::list(vec![int(1), int(9), int(4)]));
        del_item(&list, &Index::Item(int(0))).unwrap();
        assert_eq!(list, Value::list(vec![int(9), int(4)]));
    }

    #[test]
    fn test_membership() {
        assert!(contains(&Value::str("hello"), &Value::str("ell")).unwrap());
        assert!(contains(&Value::Range { start: 0, stop: 10, step: 2 }, &int(4)).unwrap());
        assert!(!contains(&Value::Range { start: 0, stop: 10, step: 2 }, &int(5)).unwrap());
        assert!(contains(&int(1), &int(1)).is_err());
    }
}
