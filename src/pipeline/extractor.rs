//! Pull one function definition out of free-form model output.
//!
//! Models wrap code in fences, add narration, or emit several snippets.
//! Candidate blocks are the fenced blocks in order (or the whole text when
//! nothing is fenced), and the first block with a top-level `def <name>(`
//! wins. Top-level imports and assignments above the definition in the same
//! block are kept with it, so module constants the function reads survive.
//! Other definitions, statements with side effects and prose are dropped.

use crate::error::ErinError;
use regex::Regex;
use tracing::{debug, error};

const FENCES: [&str; 2] = ["```", "~~~"];

/// `NAME = ...`, `a, b = ...`, `NAME: T = ...` and augmented forms.
const ASSIGNMENT: &str = r#"^[A-Za-z_][\w.\[\]'", ]*(:[^=]+)?[-+*/%&|^@]?=([^=]|$)"#;

struct Patterns {
    header: Regex,
    assignment: Regex,
}

/// Return the source of `name`'s definition found in `raw`.
pub fn extract_function(raw: &str, name: &str) -> Result<String, ErinError> {
    let compiled = Regex::new(&format!(r"^def\s+{}\s*\(", regex::escape(name)))
        .and_then(|header| Ok((header, Regex::new(ASSIGNMENT)?)));
    let patterns = match compiled {
        Ok((header, assignment)) => Patterns { header, assignment },
        Err(e) => {
            error!("❌ [Extractor] Bad pattern for '{}': {}", name, e);
            return Err(ErinError::Extraction {
                name: name.to_string(),
                raw_text: raw.to_string(),
            });
        }
    };

    let mut blocks = fenced_blocks(raw);
    let fenced = !blocks.is_empty();
    blocks.push(strip_fence_lines(raw));
    debug!(
        "✂️ [Extractor] {} candidate block(s) for '{}' (fenced: {})",
        blocks.len(),
        name,
        fenced
    );

    for block in &blocks {
        if let Some(source) = definition_in(block, &patterns) {
            debug!("✂️ [Extractor] Found '{}' ({} lines)", name, source.lines().count());
            return Ok(source);
        }
    }

    error!("❌ [Extractor] No definition of '{}' in generated text", name);
    Err(ErinError::Extraction {
        name: name.to_string(),
        raw_text: raw.to_string(),
    })
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    FENCES.iter().copied().find(|f| trimmed.starts_with(f))
}

/// Contents of each fenced block; an unclosed fence runs to the end.
fn fenced_blocks(raw: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<(&'static str, Vec<&str>)> = None;
    for line in raw.lines() {
        let marker = fence_marker(line);
        current = match current.take() {
            None => marker.map(|m| (m, Vec::new())),
            Some((open, lines)) if marker == Some(open) => {
                blocks.push(lines.join("\n"));
                None
            }
            Some((open, mut lines)) => {
                lines.push(line);
                Some((open, lines))
            }
        };
    }
    if let Some((_, lines)) = current {
        blocks.push(lines.join("\n"));
    }
    blocks
}

fn strip_fence_lines(raw: &str) -> String {
    raw.lines()
        .filter(|line| fence_marker(line).is_none())
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Remove the indentation shared by every non-blank line.
fn dedent(block: &str) -> Vec<String> {
    let common = block
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(indent_of)
        .min()
        .unwrap_or(0);
    block
        .lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.get(common..).unwrap_or(l).trim_end().to_string()
            }
        })
        .collect()
}

/// Net bracket depth change of a line, skipping strings and comments.
fn bracket_delta(line: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => break,
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn is_import(line: &str) -> bool {
    line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
}

/// Index one past the last line of the top-level statement starting at
/// `start`: bracket continuations, backslash continuations and any
/// indented body all belong to it.
fn statement_end(lines: &[String], start: usize) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i < lines.len() {
        depth += bracket_delta(&lines[i]);
        let continued = lines[i].ends_with('\\');
        i += 1;
        if depth <= 0 && !continued {
            break;
        }
    }
    while i < lines.len() && (lines[i].is_empty() || indent_of(&lines[i]) > 0) {
        i += 1;
    }
    i
}

/// Imports and assignments that precede the definition, in order.
fn preamble<'a>(lines: &'a [String], patterns: &Patterns) -> Vec<&'a str> {
    let mut kept = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if line.is_empty() || indent_of(line) > 0 {
            i += 1;
            continue;
        }
        let end = statement_end(lines, i);
        if is_import(line) || patterns.assignment.is_match(line) {
            let mut statement = &lines[i..end];
            while let Some((last, rest)) = statement.split_last() {
                if !last.is_empty() {
                    break;
                }
                statement = rest;
            }
            kept.extend(statement.iter().map(String::as_str));
        }
        i = end;
    }
    kept
}

fn definition_in(block: &str, patterns: &Patterns) -> Option<String> {
    let lines = dedent(block);
    let start = lines.iter().position(|l| patterns.header.is_match(l))?;

    let mut end = start;
    let mut depth = 0;
    for (i, line) in lines.iter().enumerate().skip(start) {
        end = i;
        depth += bracket_delta(line);
        if depth <= 0 {
            break;
        }
    }
    for (i, line) in lines.iter().enumerate().skip(end + 1) {
        if line.is_empty() {
            continue;
        }
        if indent_of(line) == 0 {
            break;
        }
        end = i;
    }

    let mut out = preamble(&lines[..start], patterns);
    if !out.is_empty() {
        out.push("");
    }
    out.extend(lines[start..=end].iter().map(String::as_str));
    Some(out.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwraps_fenced_definition() {
        let raw = "Here you go:\n```python\ndef f(x):\n    return x * 2\n```\nEnjoy!";
        assert_eq!(extract_function(raw, "f").unwrap(), "def f(x):\n    return x * 2\n");
    }

    #[test]
    fn test_plain_text_and_trailing_narration() {
        let raw = "def add(a, b):\n    total = a + b\n\n    return total\n\n\nprint(add(1, 2))\nThis adds numbers.";
        assert_eq!(
            extract_function(raw, "add").unwrap(),
            "def add(a, b):\n    total = a + b\n\n    return total\n"
        );
    }

    #[test]
    fn test_picks_first_block_with_the_name() {
        let raw = "```\nimport math\n```\n~~~py\nimport math\nfrom typing import List\n\ndef helper(): pass\n\ndef area(r):\n    return math.pi * r ** 2\n~~~";
        assert_eq!(
            extract_function(raw, "area").unwrap(),
            "import math\nfrom typing import List\n\ndef area(r):\n    return math.pi * r ** 2\n"
        );
    }

    #[test]
    fn test_keeps_module_constants_above_the_definition() {
        let raw = "Sure! Here is the code:\n\nVOWELS = 'aeiou'\nWEIGHTS = {\n    'a': 1,\n    'e': 2,\n}\nprint('loaded')\n\ndef helper(c):\n    LOCAL = 1\n    return c\n\n@cache\ndef other():\n    pass\n\ndef count_vowels(s):\n    return sum(1 for c in s.lower() if c in VOWELS)\n";
        assert_eq!(
            extract_function(raw, "count_vowels").unwrap(),
            "VOWELS = 'aeiou'\nWEIGHTS = {\n    'a': 1,\n    'e': 2,\n}\n\ndef count_vowels(s):\n    return sum(1 for c in s.lower() if c in VOWELS)\n"
        );
    }

    #[test]
    fn test_preamble_statement_forms() {
        let raw = "```python\nLIMIT: int = 10 // 0\nx, y = 1, 2\ntotal += 1\nimport math\nif x == 1:\n    z = 3\nx == 2\nNAMES = ['a',\\\n         'b']\ndef f(n):\n    return n\n```";
        assert_eq!(
            extract_function(raw, "f").unwrap(),
            "LIMIT: int = 10 // 0\nx, y = 1, 2\ntotal += 1\nimport math\nNAMES = ['a',\\\n         'b']\n\ndef f(n):\n    return n\n"
        );
    }

    #[test]
    fn test_multiline_header() {
        let raw = "def clamp(\n    value,\n    low=0,\n):\n    return max(low, value)\nx = 1";
        assert_eq!(
            extract_function(raw, "clamp").unwrap(),
            "def clamp(\n    value,\n    low=0,\n):\n    return max(low, value)\n"
        );
    }

    #[test]
    fn test_missing_definition() {
        let raw = "```python\ndef g(x):\n    return x\n```";
        match extract_function(raw, "f") {
            Err(ErinError::Extraction { name, raw_text }) => {
                assert_eq!(name, "f");
                assert_eq!(raw_text, raw);
            }
            other => panic!("unexpected: {:?}", other),
        }
        // `def fx(` must not satisfy a search for `f`.
        assert!(extract_function("def fx(a):\n    return a\n", "f").is_err());
    }
}
