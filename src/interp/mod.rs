//! Embedded interpreter for generated code.
//!
//! Generated functions are written in a Python subset. The source is
//! tokenized, parsed into an [`ast`], and evaluated by an [`Interpreter`]
//! that carries its own step and recursion limits. Nothing here touches
//! the filesystem, network, or process environment. The only way out is
//! a host function registered with [`Interpreter::define_host`].

pub mod ast;
pub mod builtins;
pub mod error;
pub mod eval;
pub mod format;
pub mod lexer;
pub mod methods;
pub mod ops;
pub mod parser;
pub mod re;
pub mod stack;
pub mod value;

pub use error::{Exception, SyntaxError};
pub use eval::{Interpreter, Limits};
pub use parser::{parse_expression, parse_module};
pub use value::{Dict, HostFn, Value};
