//! Interpreter failures: syntax errors raised while compiling, and
//! Python-style exceptions raised while running.

use thiserror::Error;

/// Every exception class the interpreter knows about.
pub const EXCEPTION_TYPES: &[&str] = &[
    "BaseException",
    "Exception",
    "ArithmeticError",
    "AssertionError",
    "AttributeError",
    "ImportError",
    "IndexError",
    "KeyError",
    "LookupError",
    "MemoryError",
    "ModuleNotFoundError",
    "NameError",
    "NotImplementedError",
    "OverflowError",
    "RecursionError",
    "RuntimeError",
    "StopIteration",
    "TimeoutError",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
    "re.error",
];

/// Malformed source. Carries the 1-based line the problem was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        SyntaxError {
            message: message.into(),
            line,
        }
    }
}

/// A raised exception, e.g. `ValueError: empty input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub kind: &'static str,
    pub message: String,
}

impl Exception {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Exception {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new("KeyError", message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new("IndexError", message)
    }

    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new("NameError", message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new("AttributeError", message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new("ZeroDivisionError", message)
    }

    pub fn overflow() -> Self {
        Self::new("OverflowError", "integer overflow")
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    /// True when this exception would be caught by `except <class>`.
    pub fn is_instance_of(&self, class: &str) -> bool {
        let mut current = Some(self.kind);
        while let Some(kind) = current {
            if kind == class {
                return true;
            }
            current = parent_class(kind);
        }
        false
    }
}

fn parent_class(kind: &str) -> Option<&'static str> {
    match kind {
        "BaseException" => None,
        "Exception" => Some("BaseException"),
        "ZeroDivisionError" | "OverflowError" => Some("ArithmeticError"),
        "KeyError" | "IndexError" => Some("LookupError"),
        "RecursionError" | "NotImplementedError" => Some("RuntimeError"),
        "ModuleNotFoundError" => Some("ImportError"),
        _ => Some("Exception"),
    }
}

/// Resolve a class name to its static spelling, if it is an exception class.
pub fn exception_type(name: &str) -> Option<&'static str> {
    EXCEPTION_TYPES.iter().copied().find(|t| *t == name)
}

impl std::fmt::Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_hierarchy() {
        let exc = Exception::zero_division("division by zero");
        assert!(exc.is_instance_of("ZeroDivisionError"));
        assert!(exc.is_instance_of("ArithmeticError"));
        assert!(exc.is_instance_of("Exception"));
        assert!(!exc.is_instance_of("ValueError"));
        assert!(Exception::key_error("'a'").is_instance_of("LookupError"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Exception::value_error("bad").to_string(), "ValueError: bad");
        assert_eq!(Exception::new("StopIteration", "").to_string(), "StopIteration");
    }
}
