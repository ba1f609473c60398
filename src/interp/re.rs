//! The `re` module, backed by the `regex` crate.
//!
//! The engine has no backtracking, so look-around and backreferences in a
//! pattern raise `re.error` at compile time. Everything else (groups, named
//! groups, flags, `match`/`search`/`fullmatch`, `sub` with templates or a
//! callable) follows Python. Spans are reported in characters, not bytes.

use super::builtins::CallArgs;
use super::error::Exception;
use super::eval::Interpreter;
use super::value::{Dict, Value};
use regex::Regex;
use std::sync::Arc;

/// Exception class raised for bad patterns and replacement templates.
pub const ERROR: &str = "re.error";

pub const IGNORECASE: i64 = 2;
pub const MULTILINE: i64 = 8;
pub const DOTALL: i64 = 16;
pub const VERBOSE: i64 = 64;

pub const FUNCTIONS: &[&str] = &[
    "compile",
    "match",
    "search",
    "fullmatch",
    "findall",
    "finditer",
    "sub",
    "subn",
    "split",
    "escape",
];

pub const PATTERN_METHODS: &[&str] = &[
    "match",
    "search",
    "fullmatch",
    "findall",
    "finditer",
    "sub",
    "subn",
    "split",
];

pub const MATCH_METHODS: &[&str] = &["group", "groups", "groupdict", "start", "end", "span"];

fn error(message: impl Into<String>) -> Exception {
    Exception::new(ERROR, message)
}

/// A compiled pattern (`re.compile`).
pub struct Pattern {
    pub source: String,
    pub flags: i64,
    regex: Regex,
    full: Regex,
}

impl Pattern {
    pub fn compile(source: &str, flags: i64) -> Result<Pattern, Exception> {
        let mut inline = String::new();
        for (bit, letter) in [(IGNORECASE, 'i'), (MULTILINE, 'm'), (DOTALL, 's'), (VERBOSE, 'x')] {
            if flags & bit != 0 {
                inline.push(letter);
            }
        }
        let body = translate_pattern(source);
        let prefix = if inline.is_empty() {
            String::new()
        } else {
            format!("(?{})", inline)
        };
        let build = |text: String| {
            Regex::new(&text).map_err(|e| {
                let reason = e
                    .to_string()
                    .lines()
                    .find_map(|l| l.trim().strip_prefix("error: ").map(str::to_string))
                    .unwrap_or_else(|| "invalid pattern".to_string());
                error(format!("{} in pattern {:?}", reason, source))
            })
        };
        // A verbose pattern may end inside a comment.
        let close = if flags & VERBOSE != 0 { "\n)" } else { ")" };
        Ok(Pattern {
            source: source.to_string(),
            flags,
            regex: build(format!("{}{}", prefix, body))?,
            full: build(format!(r"{}\A(?:{}{}\z", prefix, body, close))?,
        })
    }

    /// Number of capturing groups, not counting the whole match.
    pub fn groups(&self) -> usize {
        self.regex.captures_len() - 1
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.regex
            .capture_names()
            .position(|n| n == Some(name))
    }

    pub fn repr(&self) -> String {
        let source = Value::str(self.source.clone()).repr();
        if self.flags == 0 {
            format!("re.compile({})", source)
        } else {
            format!("re.compile({}, {})", source, self.flags)
        }
    }
}

/// A successful match (`re.Match`). Spans are byte offsets into `text`.
pub struct Match {
    pattern: Arc<Pattern>,
    text: String,
    spans: Vec<Option<(usize, usize)>>,
}

impl Match {
    fn new(pattern: &Arc<Pattern>, text: &str, caps: &regex::Captures<'_>) -> Match {
        Match {
            pattern: pattern.clone(),
            text: text.to_string(),
            spans: (0..caps.len())
                .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                .collect(),
        }
    }

    fn chars_before(&self, byte: usize) -> i64 {
        self.text[..byte].chars().count() as i64
    }

    fn index_of(&self, group: &Value) -> Result<usize, Exception> {
        let index = match group {
            Value::Str(name) => self.pattern.group_index(name),
            other => other
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < self.spans.len()),
        };
        index.ok_or_else(|| Exception::index_error("no such group"))
    }

    fn group(&self, index: usize) -> Option<&str> {
        self.spans[index].map(|(s, e)| &self.text[s..e])
    }

    fn group_value(&self, index: usize, default: &Value) -> Value {
        self.group(index).map(Value::str).unwrap_or_else(|| default.clone())
    }

    fn span(&self, index: usize) -> (i64, i64) {
        match self.spans[index] {
            Some((s, e)) => (self.chars_before(s), self.chars_before(e)),
            None => (-1, -1),
        }
    }

    /// `m[0]`, `m['name']`.
    pub fn item(&self, group: &Value) -> Result<Value, Exception> {
        Ok(self.group_value(self.index_of(group)?, &Value::None))
    }

    pub fn attr(&self, attr: &str) -> Option<Value> {
        match attr {
            "string" => Some(Value::str(self.text.clone())),
            "re" => Some(Value::Pattern(self.pattern.clone())),
            "pos" => Some(Value::Int(0)),
            "endpos" => Some(Value::Int(self.text.chars().count() as i64)),
            "lastindex" => Some(
                (1..self.spans.len())
                    .filter(|i| self.spans[*i].is_some())
                    .max_by_key(|i| self.spans[*i].map(|(_, e)| e))
                    .map(|i| Value::Int(i as i64))
                    .unwrap_or(Value::None),
            ),
            _ => None,
        }
    }

    pub fn repr(&self) -> String {
        let (start, end) = self.span(0);
        format!(
            "<re.Match object; span=({}, {}), match={}>",
            start,
            end,
            Value::str(self.group(0).unwrap_or("")).repr()
        )
    }
}

/// Python pattern syntax the engine spells differently.
fn translate_pattern(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Z') => out.push_str(r"\z"),
            Some(next) if next.is_whitespace() || !next.is_ascii() => {
                out.push_str(&format!("\\x{{{:X}}}", next as u32));
            }
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Python's `re.escape`: backslash before every character that is special
/// in a pattern.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "()[]{}?*+-|^$\\.&~# \t\n\r\x0b\x0c".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A replacement template split into literal text and group references.
enum Piece {
    Text(String),
    Group(usize),
}

fn parse_template(template: &str, pattern: &Pattern) -> Result<Vec<Piece>, Exception> {
    let chars: Vec<char> = template.chars().collect();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let flush = |text: &mut String, pieces: &mut Vec<Piece>| {
        if !text.is_empty() {
            pieces.push(Piece::Text(std::mem::take(text)));
        }
    };
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            text.push(c);
            i += 1;
            continue;
        }
        let position = i;
        match chars.get(i + 1).copied() {
            Some(d @ '1'..='9') => {
                let mut number = d.to_digit(10).unwrap_or(0) as usize;
                i += 2;
                if let Some(e) = chars.get(i).and_then(|c| c.to_digit(10)) {
                    number = number * 10 + e as usize;
                    i += 1;
                }
                if number > pattern.groups() {
                    return Err(error(format!(
                        "invalid group reference {} at position {}",
                        number,
                        position + 1
                    )));
                }
                flush(&mut text, &mut pieces);
                pieces.push(Piece::Group(number));
            }
            Some('g') => {
                let close = match chars.get(i + 2) {
                    Some('<') => chars[i + 3..].iter().position(|c| *c == '>'),
                    _ => None,
                };
                let Some(close) = close else {
                    return Err(error(format!("missing group name at position {}", i + 2)));
                };
                let name: String = chars[i + 3..i + 3 + close].iter().collect();
                let index = match name.parse::<usize>() {
                    Ok(n) if n <= pattern.groups() => n,
                    Ok(n) => {
                        return Err(error(format!(
                            "invalid group reference {} at position {}",
                            n,
                            i + 3
                        )))
                    }
                    Err(_) => pattern.group_index(&name).ok_or_else(|| {
                        Exception::index_error(format!("unknown group name '{}'", name))
                    })?,
                };
                flush(&mut text, &mut pieces);
                pieces.push(Piece::Group(index));
                i += 4 + close;
            }
            Some(e) => {
                match e {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    'f' => text.push('\x0c'),
                    'v' => text.push('\x0b'),
                    'a' => text.push('\x07'),
                    '0' => text.push('\0'),
                    '\\' => text.push('\\'),
                    e if e.is_ascii_alphabetic() => {
                        return Err(error(format!("bad escape \\{} at position {}", e, position)))
                    }
                    e => {
                        text.push('\\');
                        text.push(e);
                    }
                }
                i += 2;
            }
            None => return Err(error(format!("bad escape (end of pattern) at position {}", i))),
        }
    }
    flush(&mut text, &mut pieces);
    Ok(pieces)
}

/// How `sub` produces each replacement.
enum Replacement {
    Template(Vec<Piece>),
    Call(Value),
}

fn pattern_arg(value: &Value, flags: Option<Value>) -> Result<Arc<Pattern>, Exception> {
    let flags = flags.and_then(|f| f.as_int()).unwrap_or(0);
    match value {
        Value::Pattern(p) if flags == 0 => Ok(p.clone()),
        Value::Pattern(_) => Err(Exception::value_error(
            "cannot process flags argument with a compiled pattern",
        )),
        Value::Str(source) => Ok(Arc::new(Pattern::compile(source, flags)?)),
        other => Err(Exception::type_error(format!(
            "first argument must be string or compiled pattern, not {}",
            other.type_name()
        ))),
    }
}

/// `re.<func>(...)`.
pub(crate) fn call_function(
    interp: &mut Interpreter,
    func: &str,
    mut a: CallArgs,
) -> Result<Value, Exception> {
    if func == "escape" {
        a.expect(1, 1)?;
        return Ok(Value::Str(escape(a.str(0)?)));
    }
    // Every other function takes the pattern first and flags last.
    let flags_at = match func {
        "compile" => 1,
        "sub" | "subn" => 4,
        "split" => 3,
        _ => 2,
    };
    let flags = a.take(flags_at, "flags");
    if a.args.len() > flags_at {
        a.args.truncate(flags_at);
    }
    if a.args.is_empty() {
        return Err(Exception::type_error(format!(
            "{}() missing required argument 'pattern' (pos 1)",
            func
        )));
    }
    let pattern = pattern_arg(&a.args.remove(0), flags)?;
    if func == "compile" {
        a.expect(0, 0)?;
        return Ok(Value::Pattern(pattern));
    }
    pattern_method(interp, &pattern, func, a)
}

/// `pattern.<name>(...)`, also used by the module-level functions.
pub(crate) fn pattern_method(
    interp: &mut Interpreter,
    pattern: &Arc<Pattern>,
    name: &str,
    mut a: CallArgs,
) -> Result<Value, Exception> {
    match name {
        "match" | "search" | "fullmatch" => {
            a.finish()?;
            a.expect(1, 1)?;
            let text = a.str(0)?;
            let regex = if name == "fullmatch" {
                &pattern.full
            } else {
                &pattern.regex
            };
            Ok(match regex.captures(text) {
                Some(caps) if name != "match" || caps.get(0).is_some_and(|m| m.start() == 0) => {
                    Value::Match(Arc::new(Match::new(pattern, text, &caps)))
                }
                _ => Value::None,
            })
        }
        "findall" => {
            a.finish()?;
            a.expect(1, 1)?;
            let text = a.str(0)?;
            let group = |caps: &regex::Captures<'_>, i: usize| {
                Value::str(caps.get(i).map(|m| m.as_str()).unwrap_or(""))
            };
            let found = pattern
                .regex
                .captures_iter(text)
                .map(|caps| match caps.len() {
                    1 => group(&caps, 0),
                    2 => group(&caps, 1),
                    n => Value::tuple((1..n).map(|i| group(&caps, i)).collect()),
                })
                .collect();
            Ok(Value::list(found))
        }
        "finditer" => {
            a.finish()?;
            a.expect(1, 1)?;
            let text = a.str(0)?;
            let found = pattern
                .regex
                .captures_iter(text)
                .map(|caps| Value::Match(Arc::new(Match::new(pattern, text, &caps))))
                .collect();
            Ok(Value::list(found))
        }
        "sub" | "subn" => {
            let count = a.take(2, "count").and_then(|v| v.as_int()).unwrap_or(0);
            a.finish()?;
            a.expect(2, 3)?;
            let replacement = match &a.args[0] {
                Value::Str(template) => Replacement::Template(parse_template(template, pattern)?),
                f if f.is_callable() => Replacement::Call(f.clone()),
                other => {
                    return Err(Exception::type_error(format!(
                        "expected str instance, {} found",
                        other.type_name()
                    )))
                }
            };
            let text = a.str(1)?;
            let (out, made) = substitute(interp, pattern, &replacement, text, count)?;
            Ok(if name == "subn" {
                Value::tuple(vec![Value::Str(out), Value::Int(made)])
            } else {
                Value::Str(out)
            })
        }
        "split" => {
            let maxsplit = a.take(1, "maxsplit").and_then(|v| v.as_int()).unwrap_or(0);
            a.finish()?;
            a.expect(1, 2)?;
            let text = a.str(0)?;
            let mut parts = Vec::new();
            let mut last = 0;
            for (n, caps) in pattern.regex.captures_iter(text).enumerate() {
                if maxsplit > 0 && n as i64 >= maxsplit {
                    break;
                }
                let Some(whole) = caps.get(0) else { continue };
                parts.push(Value::str(&text[last..whole.start()]));
                for i in 1..caps.len() {
                    parts.push(caps.get(i).map(|m| Value::str(m.as_str())).unwrap_or(Value::None));
                }
                last = whole.end();
            }
            parts.push(Value::str(&text[last..]));
            Ok(Value::list(parts))
        }
        _ => Err(Exception::attribute_error(format!(
            "'re.Pattern' object has no attribute '{}'",
            name
        ))),
    }
}

fn substitute(
    interp: &mut Interpreter,
    pattern: &Arc<Pattern>,
    replacement: &Replacement,
    text: &str,
    count: i64,
) -> Result<(String, i64), Exception> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut made = 0;
    for caps in pattern.regex.captures_iter(text) {
        if count > 0 && made >= count {
            break;
        }
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        match replacement {
            Replacement::Template(pieces) => {
                for piece in pieces {
                    match piece {
                        Piece::Text(s) => out.push_str(s),
                        Piece::Group(i) => {
                            out.push_str(caps.get(*i).map(|m| m.as_str()).unwrap_or(""))
                        }
                    }
                }
            }
            Replacement::Call(func) => {
                let found = Value::Match(Arc::new(Match::new(pattern, text, &caps)));
                match interp.call(func, vec![found], Vec::new())? {
                    Value::Str(s) => out.push_str(&s),
                    other => {
                        return Err(Exception::type_error(format!(
                            "expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
        }
        last = whole.end();
        made += 1;
    }
    out.push_str(&text[last..]);
    Ok((out, made))
}

pub fn pattern_attr(pattern: &Pattern, attr: &str) -> Option<Value> {
    match attr {
        "pattern" => Some(Value::str(pattern.source.clone())),
        "flags" => Some(Value::Int(pattern.flags)),
        "groups" => Some(Value::Int(pattern.groups() as i64)),
        "groupindex" => {
            let mut index = Dict::new();
            for (i, name) in pattern.regex.capture_names().enumerate() {
                if let Some(name) = name {
                    index.insert(Value::str(name), Value::Int(i as i64)).ok()?;
                }
            }
            Some(Value::from_dict(index))
        }
        _ => None,
    }
}

/// `match.<name>(...)`.
pub(crate) fn match_method(m: &Match, name: &str, mut a: CallArgs) -> Result<Value, Exception> {
    match name {
        "group" => {
            a.finish()?;
            match a.args.len() {
                0 => Ok(m.group_value(0, &Value::None)),
                1 => m.item(&a.args[0]),
                _ => a
                    .args
                    .iter()
                    .map(|g| m.item(g))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::tuple),
            }
        }
        "groups" | "groupdict" => {
            let default = a.take(0, "default").unwrap_or(Value::None);
            a.finish()?;
            a.expect(0, 1)?;
            if name == "groups" {
                return Ok(Value::tuple(
                    (1..m.spans.len()).map(|i| m.group_value(i, &default)).collect(),
                ));
            }
            let mut out = Dict::new();
            for (i, group) in m.pattern.regex.capture_names().enumerate() {
                if let Some(group) = group {
                    out.insert(Value::str(group), m.group_value(i, &default))?;
                }
            }
            Ok(Value::from_dict(out))
        }
        "start" | "end" | "span" => {
            a.finish()?;
            a.expect(0, 1)?;
            let index = match a.args.first() {
                Some(g) => m.index_of(g)?,
                None => 0,
            };
            let (start, end) = m.span(index);
            Ok(match name {
                "start" => Value::Int(start),
                "end" => Value::Int(end),
                _ => Value::tuple(vec![Value::Int(start), Value::Int(end)]),
            })
        }
        _ => Err(Exception::attribute_error(format!(
            "'re.Match' object has no attribute '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(func: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let mut interp = Interpreter::new();
        call_function(&mut interp, func, CallArgs::new(func, args, Vec::new()))
    }

    fn method(target: &Value, name: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let a = CallArgs::new(name, args, Vec::new());
        match target {
            Value::Match(m) => match_method(m, name, a),
            Value::Pattern(p) => pattern_method(&mut Interpreter::new(), p, name, a),
            other => panic!("not a regex value: {:?}", other),
        }
    }

    #[test]
    fn test_match_is_anchored_and_search_is_not() {
        let text = Value::str("say 2024-05-01");
        let date = Value::str(r"(\d{4})-(\d{2})-(\d{2})");
        assert!(re("match", vec![date.clone(), text.clone()]).unwrap().is_none());

        let found = re("search", vec![date, text]).unwrap();
        assert_eq!(found.repr(), "<re.Match object; span=(4, 14), match='2024-05-01'>");
        assert_eq!(method(&found, "group", vec![]).unwrap(), Value::str("2024-05-01"));
        assert_eq!(method(&found, "group", vec![Value::Int(1)]).unwrap(), Value::str("2024"));
        assert_eq!(
            method(&found, "groups", vec![]).unwrap().repr(),
            "('2024', '05', '01')"
        );
        assert_eq!(method(&found, "span", vec![Value::Int(2)]).unwrap().repr(), "(9, 11)");
        let err = method(&found, "group", vec![Value::Int(4)]).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: no such group");
    }

    #[test]
    fn test_fullmatch_tries_every_alternative() {
        let hit = re("fullmatch", vec![Value::str("a|ab"), Value::str("ab")]).unwrap();
        assert_eq!(method(&hit, "group", vec![]).unwrap(), Value::str("ab"));
        assert!(re("fullmatch", vec![Value::str("a"), Value::str("ab")]).unwrap().is_none());
    }

    #[test]
    fn test_named_groups_and_char_offsets() {
        let m = re(
            "search",
            vec![Value::str(r"(?P<word>\w+)!(?P<tail>x)?"), Value::str("¡héllo!")],
        )
        .unwrap();
        assert_eq!(method(&m, "start", vec![]).unwrap(), Value::Int(1));
        assert_eq!(method(&m, "end", vec![Value::str("word")]).unwrap(), Value::Int(6));
        assert_eq!(
            method(&m, "groupdict", vec![]).unwrap().repr(),
            "{'word': 'héllo', 'tail': None}"
        );
        assert_eq!(method(&m, "start", vec![Value::str("tail")]).unwrap(), Value::Int(-1));
        let Value::Match(m) = &m else { panic!("expected a match") };
        assert_eq!(m.item(&Value::str("word")).unwrap(), Value::str("héllo"));
    }

    #[test]
    fn test_compiled_pattern_and_flags() {
        let p = re("compile", vec![Value::str("^b\\w+"), Value::Int(IGNORECASE | MULTILINE)])
            .unwrap();
        assert_eq!(p.repr(), "re.compile('^b\\\\w+', 10)");
        let found = method(&p, "findall", vec![Value::str("Bat\ncat\nbee")]).unwrap();
        assert_eq!(found.repr(), "['Bat', 'bee']");
        let iter = method(&p, "finditer", vec![Value::str("ball")]).unwrap();
        assert_eq!(iter.len(), Some(1));
        let err = re("search", vec![p, Value::str("x"), Value::Int(DOTALL)]).unwrap_err();
        assert_eq!(err.kind, "ValueError");
    }

    #[test]
    fn test_unsupported_syntax_raises_re_error() {
        let err = re("match", vec![Value::str("(?<=a)b"), Value::str("ab")]).unwrap_err();
        assert_eq!(err.kind, ERROR);
        assert!(err.is_instance_of("Exception"));
        assert!(re("search", vec![Value::str(r"end\Z"), Value::str("the end")])
            .unwrap()
            .truthy());
    }

    #[test]
    fn test_sub_templates() {
        let out = re(
            "sub",
            vec![
                Value::str(r"(\w+)@(?P<host>\w+)"),
                Value::str(r"\g<host> at \1\n"),
                Value::str("me@home"),
            ],
        )
        .unwrap();
        assert_eq!(out, Value::str("home at me\n"));

        let err = re("sub", vec![Value::str("a"), Value::str(r"\1"), Value::str("a")]).unwrap_err();
        assert_eq!(err.to_string(), "re.error: invalid group reference 1 at position 1");
        let err = re("sub", vec![Value::str("a"), Value::str(r"\g<x>"), Value::str("a")])
            .unwrap_err();
        assert_eq!(err.kind, "IndexError");
        let err = re("sub", vec![Value::str("a"), Value::str(r"\d"), Value::str("a")]).unwrap_err();
        assert_eq!(err.kind, ERROR);

        let counted = re(
            "subn",
            vec![Value::str("o"), Value::str("0"), Value::str("foo boo"), Value::Int(3)],
        )
        .unwrap();
        assert_eq!(counted.repr(), "('f00 b0o', 3)");
    }

    #[test]
    fn test_split_keeps_captured_separators() {
        let out = re("split", vec![Value::str(r"\s*(,)\s*"), Value::str("a , b,c")]).unwrap();
        assert_eq!(out.repr(), "['a', ',', 'b', ',', 'c']");
        let out = re(
            "split",
            vec![Value::str(r"\W+"), Value::str("one two three"), Value::Int(1)],
        )
        .unwrap();
        assert_eq!(out.repr(), "['one', 'two three']");
    }

    #[test]
    fn test_escape_matches_python() {
        assert_eq!(escape("a.b c-d"), r"a\.b\ c\-d");
        let literal = "1+1=2? (yes)\tok";
        let p = Pattern::compile(&escape(literal), 0).unwrap();
        assert!(p.full.is_match(literal));
    }
}
