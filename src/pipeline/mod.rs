//! The call pipeline.
//!
//! ```text
//! Erin::invoke(name, args, kwargs)
//!   -> Signature::infer      (argument type labels)
//!   -> build_prompt          (template + optional context)
//!   -> GenerationClient      (raw model text)
//!   -> extract_function      (one `def name(...)`)
//!   -> Executor::compile     (fresh interpreter namespace)
//!   -> CompiledFunction::invoke -> Value
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod extractor;
pub mod invocation;
pub mod prompt;
pub mod signature;

pub use client::{FnClient, GenerationClient, OpenAiClient, StaticClient};
pub use config::ErinConfig;
pub use dispatcher::{Erin, FunctionDecl, GeneratedArtifact, LlmFunction};
pub use executor::{compile, CompiledFunction, Executor};
pub use extractor::extract_function;
pub use invocation::{Invocation, Stage};
pub use prompt::{build_prompt, Prompt};
pub use signature::{infer_type, Signature};
