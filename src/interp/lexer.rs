//! Tokenizer.
//!
//! Produces a flat token stream with explicit `Newline`, `Indent` and
//! `Dedent` markers so the parser never looks at whitespace. Newlines inside
//! brackets are joined, as are lines ending in a backslash.

use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Kw(&'static str),
    Int(i64),
    Float(f64),
    Str(String),
    FStr(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

// Longest first so that `**=` wins over `**` and `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "@=", "->", ":=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=",
    "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@", "&", "|", "^", "~",
];

const STRING_PREFIXES: &[&str] = &["r", "u", "f", "b", "rf", "fr", "br", "rb"];

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut at_line_start = true;
        while self.pos < self.chars.len() {
            if at_line_start && self.depth == 0 {
                at_line_start = false;
                self.indentation()?;
                continue;
            }
            let c = self.chars[self.pos];
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push_newline();
                        at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\\' if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') => {
                    self.pos += 3;
                    self.line += 1;
                }
                '"' | '\'' => self.string("")?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                c if c == '_' || c.is_alphabetic() => self.name()?,
                _ => self.operator()?,
            }
        }
        self.push_newline();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn push_newline(&mut self) {
        if self.tokens.last().is_some_and(|t| t.tok != Tok::Newline) {
            self.push(Tok::Newline);
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line)
    }

    /// Measure leading whitespace and emit `Indent`/`Dedent` as needed.
    /// Blank and comment-only lines do not affect indentation.
    fn indentation(&mut self) -> Result<(), SyntaxError> {
        let mut width = 0;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.pos += 1;
        }
        match self.peek(0) {
            None | Some('\n') | Some('\r') | Some('#') => return Ok(()),
            _ => {}
        }
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent);
        } else if width < current {
            while self.indents.last().is_some_and(|&top| width < top) {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn name(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c == '_' || c.is_alphanumeric())
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        if matches!(self.peek(0), Some('"') | Some('\''))
            && STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str())
        {
            return self.string(&word);
        }
        match KEYWORDS.iter().find(|kw| **kw == word) {
            Some(kw) => self.push(Tok::Kw(*kw)),
            None => self.push(Tok::Name(word)),
        }
        Ok(())
    }

    fn string(&mut self, prefix: &str) -> Result<(), SyntaxError> {
        let prefix = prefix.to_ascii_lowercase();
        let raw = prefix.contains('r');
        let formatted = prefix.contains('f');
        let start_line = self.line;
        let quote = self.chars[self.pos];
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(SyntaxError::new("unterminated string literal", start_line));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return Err(SyntaxError::new("unterminated string literal", start_line));
                }
                self.line += 1;
            }
            if c == '\\' {
                if raw {
                    out.push('\\');
                    if let Some(next) = self.peek(1) {
                        out.push(next);
                        if next == '\n' {
                            self.line += 1;
                        }
                    }
                    self.pos += 2;
                } else {
                    self.escape(&mut out)?;
                }
                continue;
            }
            out.push(c);
            self.pos += 1;
        }

        let tok = if formatted { Tok::FStr(out) } else { Tok::Str(out) };
        self.tokens.push(Token {
            tok,
            line: start_line,
        });
        Ok(())
    }

    fn escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let Some(next) = self.peek(1) else {
            return Err(self.error("unterminated string literal"));
        };
        self.pos += 2;
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' | '\'' | '"' => out.push(next),
            '\n' => self.line += 1,
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, SyntaxError> {
        let end = self.pos + digits;
        if end > self.chars.len() {
            return Err(self.error("truncated escape sequence"));
        }
        let text: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        u32::from_str_radix(&text, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid escape sequence '{}'", text)))
    }

    fn number(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        if self.peek(0) == Some('0') {
            let radix = match self.peek(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self.peek(0).is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                let digits: String = self.chars[digits_start..self.pos]
                    .iter()
                    .filter(|c| **c != '_')
                    .collect();
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("invalid integer literal"))?;
                self.push(Tok::Int(value));
                return Ok(());
            }
        }

        let mut is_float = false;
        self.digits();
        if self.peek(0) == Some('.') && self.peek(1) != Some('.') {
            is_float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign = matches!(self.peek(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += digit_at;
                self.digits();
            }
        }
        if matches!(self.peek(0), Some('j' | 'J')) {
            return Err(self.error("complex literals are not supported"));
        }
        if self.peek(0).is_some_and(|c| c == '_' || c.is_alphabetic()) {
            return Err(self.error("invalid decimal literal"));
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error("invalid float literal"))?;
            self.push(Tok::Float(value));
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| self.error("integer literal too large"))?;
            self.push(Tok::Int(value));
        }
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let found = OPERATORS.iter().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, c)| self.peek(i) == Some(c))
        });
        let Some(op) = found else {
            let c = self.chars[self.pos];
            return Err(self.error(format!("invalid character '{}'", c)));
        };
        match *op {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.pos += op.len();
        self.push(Tok::Op(*op));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_indentation_tokens() {
        let tokens = toks("def f(x):\n    return x\n");
        assert_eq!(
            tokens,
            vec![
                Tok::Kw("def"),
                Tok::Name("f".into()),
                Tok::Op("("),
                Tok::Name("x".into()),
                Tok::Op(")"),
                Tok::Op(":"),
                Tok::Newline,
                Tok::Indent,
                Tok::Kw("return"),
                Tok::Name("x".into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = toks("x = [1,\n     2]\n");
        assert!(!tokens[..tokens.len() - 2].contains(&Tok::Newline));
    }

    #[test]
    fn test_literals() {
        assert_eq!(toks("1_000")[0], Tok::Int(1000));
        assert_eq!(toks("0xff")[0], Tok::Int(255));
        assert_eq!(toks("2.5e1")[0], Tok::Float(25.0));
        assert_eq!(toks("'a\\nb'")[0], Tok::Str("a\nb".into()));
        assert_eq!(toks("r'a\\nb'")[0], Tok::Str("a\\nb".into()));
        assert_eq!(toks("f'{x}'")[0], Tok::FStr("{x}".into()));
        assert_eq!(toks("'''a\nb'''")[0], Tok::Str("a\nb".into()));
    }

    #[test]
    fn test_bad_dedent_is_rejected() {
        let err = tokenize("if x:\n        a\n    b\n").unwrap_err();
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("x = 'abc\n").is_err());
    }
}
