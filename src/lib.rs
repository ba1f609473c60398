//! Erin Core - call functions that do not exist yet
//!
//! Calling an unknown function by name sends its name, the inferred types of
//! its arguments, and an optional docstring to a language model. The model
//! writes the function, and the result of running it on the original
//! arguments is returned. Generated code runs in an embedded interpreter
//! (see [`interp`]), never in the host process.
//!
//! ```no_run
//! use erin_core::{Erin, FunctionDecl, Value};
//!
//! let erin = Erin::from_env()?;
//! let total = erin.call("calculate_sum", vec![Value::Int(1), Value::Int(2), Value::Int(3)])?;
//!
//! let reverse = erin.decorate(FunctionDecl::new("reverse_string").doc("Reverse a string"));
//! let out = reverse.call(vec![Value::from("hello")])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod interp;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use error::{ErinError, ErinResult, GenerationError};
pub use interp::{Exception, Interpreter, Limits, Value};
pub use pipeline::{
    ErinConfig, Erin, FnClient, FunctionDecl, GenerationClient, Invocation, LlmFunction,
    OpenAiClient, StaticClient,
};

/// Install a stderr subscriber. An explicit filter wins, then `RUST_LOG`,
/// then `info`. A second call is a no-op.
pub fn setup_logging(level: Option<String>) {
    let filter = match level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_tolerates_repeat_calls() {
        setup_logging(Some("erin_core=debug".to_string()));
        setup_logging(None);
        tracing::debug!("🧪 [Logging] subscriber installed");
    }
}
