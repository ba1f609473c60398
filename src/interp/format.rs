//! Text formatting: the format-spec mini-language used by f-strings,
//! `format()` and `str.format`, plus printf-style `%` formatting.

use super::error::Exception;
use super::ops::{get_item, guard_len, Index};
use super::value::{format_float, Value};

#[derive(Debug, Clone, PartialEq)]
struct Spec {
    fill: char,
    align: Option<char>,
    sign: char,
    alternate: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    ty: Option<char>,
}

impl Default for Spec {
    fn default() -> Self {
        Spec {
            fill: ' ',
            align: None,
            sign: '-',
            alternate: false,
            width: 0,
            grouping: None,
            precision: None,
            ty: None,
        }
    }
}

fn invalid_spec() -> Exception {
    Exception::value_error("Invalid format specifier")
}

/// Largest precision the float formatter accepts.
const MAX_PRECISION: usize = u16::MAX as usize;

fn parse_width(digits: &str) -> Result<usize, Exception> {
    let width = digits
        .parse()
        .map_err(|_| Exception::value_error("Too many decimal digits in format string"))?;
    guard_len(width)?;
    Ok(width)
}

fn parse_precision(digits: &str) -> Result<usize, Exception> {
    match digits.parse::<usize>() {
        Ok(p) if p <= MAX_PRECISION => Ok(p),
        Ok(_) => Err(Exception::value_error("precision too big")),
        Err(_) => Err(Exception::value_error("Too many decimal digits in format string")),
    }
}

fn parse_spec(spec: &str) -> Result<Spec, Exception> {
    let chars: Vec<char> = spec.chars().collect();
    let mut out = Spec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

    if chars.len() >= 2 && is_align(chars[1]) {
        out.fill = chars[0];
        out.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        out.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
        out.sign = c;
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        out.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if out.align.is_none() {
            out.fill = '0';
            out.align = Some('=');
        }
        i += 1;
    }
    let width_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > width_start {
        let digits: String = chars[width_start..i].iter().collect();
        out.width = parse_width(&digits)?;
    }
    if let Some(&c @ (',' | '_')) = chars.get(i) {
        out.grouping = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err(Exception::value_error("Format specifier missing precision"));
        }
        let digits: String = chars[start..i].iter().collect();
        out.precision = Some(parse_precision(&digits)?);
    }
    if let Some(&c) = chars.get(i) {
        out.ty = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid_spec());
    }
    Ok(out)
}

/// `format(value, spec)`.
pub fn format_value(value: &Value, spec: &str) -> Result<String, Exception> {
    if spec.is_empty() {
        return Ok(value.to_str());
    }
    let spec = parse_spec(spec)?;
    match value {
        Value::Str(s) => format_str(s, &spec),
        Value::Int(_) | Value::Bool(_) => {
            let i = value.as_int().unwrap_or(0);
            match spec.ty {
                None | Some('d' | 'n' | 'x' | 'X' | 'o' | 'b' | 'c') => format_int(i, &spec),
                Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => format_float_spec(i as f64, &spec),
                Some(t) => Err(unknown_code(t, "int")),
            }
        }
        Value::Float(f) => match spec.ty {
            None | Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%' | 'n') => format_float_spec(*f, &spec),
            Some(t) => Err(unknown_code(t, "float")),
        },
        other => Err(Exception::type_error(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        ))),
    }
}

fn unknown_code(code: char, type_name: &str) -> Exception {
    Exception::value_error(format!(
        "Unknown format code '{}' for object of type '{}'",
        code, type_name
    ))
}

fn format_str(s: &str, spec: &Spec) -> Result<String, Exception> {
    if !matches!(spec.ty, None | Some('s')) {
        return Err(unknown_code(spec.ty.unwrap_or('s'), "str"));
    }
    if spec.align == Some('=') {
        return Err(Exception::value_error(
            "'=' alignment not allowed in string format specifier",
        ));
    }
    let body: String = match spec.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    };
    Ok(pad("", &body, spec, '<'))
}

fn format_int(i: i64, spec: &Spec) -> Result<String, Exception> {
    if spec.precision.is_some() {
        return Err(Exception::value_error(
            "Precision not allowed in integer format specifier",
        ));
    }
    if spec.ty == Some('c') {
        let c = u32::try_from(i)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Exception::new("OverflowError", "%c arg not in range(0x110000)"))?;
        return Ok(pad("", &c.to_string(), spec, '<'));
    }
    let magnitude = i.unsigned_abs();
    let (digits, prefix, group) = match spec.ty {
        Some('x') => (format!("{:x}", magnitude), "0x", 4),
        Some('X') => (format!("{:X}", magnitude), "0X", 4),
        Some('o') => (format!("{:o}", magnitude), "0o", 4),
        Some('b') => (format!("{:b}", magnitude), "0b", 4),
        _ => (magnitude.to_string(), "", 3),
    };
    let digits = match spec.grouping {
        Some(sep) => group_digits(&digits, sep, group),
        None => digits,
    };
    let mut sign = sign_prefix(i < 0, spec.sign).to_string();
    if spec.alternate {
        sign.push_str(prefix);
    }
    Ok(pad(&sign, &digits, spec, '>'))
}

fn sign_prefix(negative: bool, sign: char) -> &'static str {
    match (negative, sign) {
        (true, _) => "-",
        (false, '+') => "+",
        (false, ' ') => " ",
        _ => "",
    }
}

fn group_digits(digits: &str, sep: char, group: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / group);
    for (idx, c) in chars.iter().enumerate() {
        if idx > 0 && (chars.len() - idx) % group == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn format_float_spec(f: f64, spec: &Spec) -> Result<String, Exception> {
    let negative = f.is_sign_negative() && !f.is_nan();
    let magnitude = f.abs();
    let mut body = if !magnitude.is_finite() {
        let text = if magnitude.is_nan() { "nan" } else { "inf" };
        if matches!(spec.ty, Some('E' | 'F' | 'G')) {
            text.to_uppercase()
        } else {
            text.to_string()
        }
    } else {
        match spec.ty {
            Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
            Some('e' | 'E') => {
                let text = scientific(magnitude, spec.precision.unwrap_or(6));
                if spec.ty == Some('E') {
                    text.to_uppercase()
                } else {
                    text
                }
            }
            Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
            Some('g' | 'G' | 'n') => {
                let text = general(magnitude, spec.precision.unwrap_or(6), spec.alternate);
                if spec.ty == Some('G') {
                    text.to_uppercase()
                } else {
                    text
                }
            }
            _ => match spec.precision {
                Some(p) => {
                    let text = general(magnitude, p, spec.alternate);
                    if text.contains(&['.', 'e', 'n', 'i'][..]) {
                        text
                    } else {
                        format!("{}.0", text)
                    }
                }
                None => format_float(magnitude),
            },
        }
    };
    if let Some(sep) = spec.grouping {
        let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        let (int_part, rest) = body.split_at(split);
        body = format!("{}{}", group_digits(int_part, sep, 3), rest);
    }
    Ok(pad(sign_prefix(negative, spec.sign), &body, spec, '>'))
}

/// `{:.Ne}` with a Python-style exponent (`1.5e+03`).
fn scientific(f: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, f);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!(
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            )
        }
        None => text,
    }
}

/// The `g` presentation: fixed or scientific depending on the exponent.
fn general(f: f64, precision: usize, keep_zeros: bool) -> String {
    let p = precision.max(1);
    if f == 0.0 {
        return if keep_zeros {
            format!("{:.*}", p - 1, 0.0)
        } else {
            "0".to_string()
        };
    }
    let sci = format!("{:.*e}", p - 1, f);
    let exp: i32 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let text = if exp >= -4 && exp < p as i32 {
        format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, f)
    } else {
        scientific(f, p - 1)
    };
    if keep_zeros {
        return text;
    }
    strip_fraction_zeros(&text)
}

fn strip_fraction_zeros(text: &str) -> String {
    let (mantissa, exp) = match text.find('e') {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exp)
}

fn pad(sign: &str, body: &str, spec: &Spec, default_align: char) -> String {
    let len = sign.chars().count() + body.chars().count();
    if spec.width <= len {
        return format!("{}{}", sign, body);
    }
    let fill_len = spec.width - len;
    let fill = |n: usize| spec.fill.to_string().repeat(n);
    match spec.align.unwrap_or(default_align) {
        '<' => format!("{}{}{}", sign, body, fill(fill_len)),
        '^' => format!(
            "{}{}{}{}",
            fill(fill_len / 2),
            sign,
            body,
            fill(fill_len - fill_len / 2)
        ),
        '=' => format!("{}{}{}", sign, fill(fill_len), body),
        _ => format!("{}{}{}", fill(fill_len), sign, body),
    }
}

/// printf-style `fmt % args`.
pub fn percent_format(fmt: &str, args: &Value) -> Result<String, Exception> {
    let mapping = matches!(args, Value::Dict(_)).then(|| args.clone());
    let mut positional: Vec<Value> = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        Value::Dict(_) => Vec::new(),
        other => vec![other.clone()],
    }
    .into_iter()
    .rev()
    .collect();

    let chars: Vec<char> = fmt.chars().collect();
    let mut out = String::with_capacity(fmt.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        let mut key = None;
        if chars.get(i) == Some(&'(') {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|c| *c == ')')
                .map(|p| start + p)
                .ok_or_else(|| Exception::value_error("incomplete format key"))?;
            key = Some(chars[start..end].iter().collect::<String>());
            i = end + 1;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.get(i) {
            match flag {
                '-' => spec.align = Some('<'),
                '+' | ' ' => spec.sign = flag,
                '0' => {
                    if spec.align.is_none() {
                        spec.fill = '0';
                        spec.align = Some('=');
                    }
                }
                '#' => spec.alternate = true,
                _ => break,
            }
            i += 1;
        }
        if spec.align == Some('<') {
            spec.fill = ' ';
        }
        let width_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > width_start {
            let digits: String = chars[width_start..i].iter().collect();
            spec.width = parse_width(&digits)?;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            spec.precision = Some(if digits.is_empty() {
                0
            } else {
                parse_precision(&digits)?
            });
        }
        let Some(&conversion) = chars.get(i) else {
            return Err(Exception::value_error("incomplete format"));
        };
        i += 1;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = match (&key, &mapping) {
            (Some(k), Some(map)) => get_item(map, &Index::Item(Value::str(k.clone())))?,
            (Some(_), None) => return Err(Exception::type_error("format requires a mapping")),
            (None, _) => positional.pop().ok_or_else(|| {
                Exception::type_error("not enough arguments for format string")
            })?,
        };

        // `%5s` right-aligns and ignores the zero flag.
        let text_spec = Spec {
            fill: ' ',
            align: Some(if spec.align == Some('<') { '<' } else { '>' }),
            ..spec
        };
        let text = match conversion {
            's' => format_str(&arg.to_str(), &text_spec)?,
            'r' | 'a' => format_str(&arg.repr(), &text_spec)?,
            'd' | 'i' | 'u' => {
                let n = match arg {
                    Value::Float(f) => f.trunc() as i64,
                    ref other => other.as_int().ok_or_else(|| {
                        Exception::type_error(format!(
                            "%{} format: a real number is required, not {}",
                            conversion,
                            other.type_name()
                        ))
                    })?,
                };
                format_int(n, &Spec { precision: None, ..spec })?
            }
            'x' | 'X' | 'o' | 'c' => {
                let n = arg.as_int().ok_or_else(|| {
                    Exception::type_error(format!(
                        "%{} format: an integer is required, not {}",
                        conversion,
                        arg.type_name()
                    ))
                })?;
                format_int(
                    n,
                    &Spec {
                        precision: None,
                        ty: Some(conversion),
                        ..spec
                    },
                )?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let f = arg.as_float().ok_or_else(|| {
                    Exception::type_error(format!(
                        "must be real number, not {}",
                        arg.type_name()
                    ))
                })?;
                format_float_spec(
                    f,
                    &Spec {
                        ty: Some(conversion),
                        ..spec
                    },
                )?
            }
            other => {
                return Err(Exception::value_error(format!(
                    "unsupported format character '{}'",
                    other
                )))
            }
        };
        out.push_str(&text);
    }
    if mapping.is_none() && !positional.is_empty() {
        return Err(Exception::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

/// `template.format(*args, **kwargs)`.
pub fn str_format(
    template: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<String, Exception> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut auto_index = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '}' {
            if chars.get(i + 1) == Some(&'}') {
                out.push('}');
                i += 2;
                continue;
            }
            return Err(Exception::value_error(
                "Single '}' encountered in format string",
            ));
        }
        if c != '{' {
            out.push(c);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'{') {
            out.push('{');
            i += 2;
            continue;
        }

        let mut depth = 1;
        let mut j = i + 1;
        while j < chars.len() {
            match chars[j] {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        if j >= chars.len() {
            return Err(Exception::value_error(
                "expected '}' before end of string",
            ));
        }
        let field: String = chars[i + 1..j].iter().collect();
        i = j + 1;

        let (head, spec) = match field.split_once(':') {
            Some((h, s)) => (h.to_string(), Some(s.to_string())),
            None => (field.clone(), None),
        };
        let (name, conversion) = match head.split_once('!') {
            Some((n, c)) => (n.to_string(), c.chars().next()),
            None => (head, None),
        };

        let value = resolve_field(&name, args, kwargs, &mut auto_index)?;
        let value = match conversion {
            Some('r') | Some('a') => Value::Str(value.repr()),
            Some('s') => Value::Str(value.to_str()),
            Some(other) => {
                return Err(Exception::value_error(format!(
                    "Unknown conversion specifier {}",
                    other
                )))
            }
            None => value,
        };
        let spec = match spec {
            Some(s) if s.contains('{') => str_format(&s, args, kwargs)?,
            Some(s) => s,
            None => String::new(),
        };
        out.push_str(&format_value(&value, &spec)?);
    }
    Ok(out)
}

fn resolve_field(
    name: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
    auto_index: &mut usize,
) -> Result<Value, Exception> {
    let (base, rest) = match name.find('[') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    };
    let mut value = if base.is_empty() {
        let idx = *auto_index;
        *auto_index += 1;
        args.get(idx).cloned().ok_or_else(|| {
            Exception::index_error(format!(
                "Replacement index {} out of range for positional args tuple",
                idx
            ))
        })?
    } else if let Ok(idx) = base.parse::<usize>() {
        args.get(idx).cloned().ok_or_else(|| {
            Exception::index_error(format!(
                "Replacement index {} out of range for positional args tuple",
                idx
            ))
        })?
    } else {
        kwargs
            .iter()
            .find(|(k, _)| k == base)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Exception::key_error(format!("'{}'", base)))?
    };

    let mut rest = rest;
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| Exception::value_error("Missing ']' in format string"))?;
        let key = &stripped[..end];
        let index = match key.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::str(key),
        };
        value = get_item(&value, &Index::Item(index))?;
        rest = &stripped[end + 1..];
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_spec_numbers() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int(42), "05d").unwrap(), "00042");
        assert_eq!(format_value(&Value::Int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::Int(-5), "+d").unwrap(), "-5");
        assert_eq!(format_value(&Value::Int(255), "#x").unwrap(), "0xff");
        assert_eq!(format_value(&Value::Float(0.25), ".1%").unwrap(), "25.0%");
        assert_eq!(format_value(&Value::Float(12345.678), ".2e").unwrap(), "1.23e+04");
        assert_eq!(format_value(&Value::Float(0.0001), "g").unwrap(), "0.0001");
        assert_eq!(format_value(&Value::Float(1234567.0), "g").unwrap(), "1.23457e+06");
    }

    #[test]
    fn test_format_spec_alignment() {
        assert_eq!(format_value(&Value::str("ab"), ">5").unwrap(), "   ab");
        assert_eq!(format_value(&Value::str("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Int(7), "<3").unwrap(), "7  ");
        assert!(format_value(&Value::str("ab"), "d").is_err());
        assert!(format_value(&Value::None, ">3").is_err());
    }

    #[test]
    fn test_percent_format() {
        let args = Value::tuple(vec![Value::str("x"), Value::Int(3), Value::Float(1.5)]);
        assert_eq!(
            percent_format("%s=%03d (%.2f) 100%%", &args).unwrap(),
            "x=003 (1.50) 100%"
        );
        assert!(percent_format("%s %s", &Value::str("a")).is_err());
        assert!(percent_format("%s", &Value::tuple(vec![Value::Int(1), Value::Int(2)])).is_err());
    }

    #[test]
    fn test_str_format() {
        let out = str_format(
            "{0} + {0} = {total:>4}!",
            &[Value::Int(2)],
            &[("total".to_string(), Value::Int(4))],
        )
        .unwrap();
        assert_eq!(out, "2 + 2 =    4!");
        assert_eq!(str_format("{{}}", &[], &[]).unwrap(), "{}");
    }

    #[test]
    fn test_oversized_width_and_precision_raise() {
        let err = str_format("{:>99999999999}", &[Value::Int(1)], &[]).unwrap_err();
        assert_eq!(err.kind, "MemoryError");
        let err = format_value(&Value::Int(1), ".99999999999f").unwrap_err();
        assert_eq!(err.message, "precision too big");
        let err = format_value(&Value::Float(1.0), "99999999999999999999999").unwrap_err();
        assert_eq!(err.message, "Too many decimal digits in format string");
        let err = percent_format("%99999999999d", &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, "MemoryError");
        assert!(percent_format("%.99999999999f", &Value::Float(1.0)).is_err());
        assert_eq!(format_value(&Value::Float(0.5), ">8.3f").unwrap(), "   0.500");
    }
}
