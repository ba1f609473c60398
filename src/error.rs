//! Error types for the call pipeline.

use crate::interp::{Exception, Value};
use thiserror::Error;

/// Failures talking to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("service returned an empty completion")]
    EmptyResponse,

    #[error("malformed service response: {0}")]
    InvalidResponse(String),

    #[error("client misconfigured: {0}")]
    Configuration(String),
}

/// Why a single invocation failed.
#[derive(Debug, Error)]
pub enum ErinError {
    #[error("generation failed for '{name}': {source}")]
    Generation {
        name: String,
        #[source]
        source: GenerationError,
    },

    #[error("no definition of '{name}' found in generated text")]
    Extraction { name: String, raw_text: String },

    #[error("generated code for '{name}' does not compile (line {line}): {message}")]
    Compilation {
        name: String,
        source_code: String,
        message: String,
        line: usize,
    },

    #[error("'{name}' raised {source}")]
    Execution {
        name: String,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        #[source]
        source: Exception,
    },
}

impl ErinError {
    /// Name of the function whose invocation failed.
    pub fn function_name(&self) -> &str {
        match self {
            ErinError::Generation { name, .. }
            | ErinError::Extraction { name, .. }
            | ErinError::Compilation { name, .. }
            | ErinError::Execution { name, .. } => name,
        }
    }
}

pub type ErinResult<T> = Result<T, ErinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_function() {
        let err = ErinError::Execution {
            name: "divide".into(),
            args: vec![Value::Int(1), Value::Int(0)],
            kwargs: vec![],
            source: Exception::zero_division("division by zero"),
        };
        assert_eq!(err.to_string(), "'divide' raised ZeroDivisionError: division by zero");
        assert_eq!(err.function_name(), "divide");

        let err = ErinError::Generation {
            name: "f".into(),
            source: GenerationError::Service {
                status: 500,
                body: "oops".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "generation failed for 'f': service returned HTTP 500: oops"
        );
    }
}
