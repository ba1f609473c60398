//! Compile generated source and run it in a private namespace.
//!
//! Each compile gets a fresh [`Interpreter`]: only builtins and the `chat`
//! host helper are visible, and nothing survives past the call.

use super::client::GenerationClient;
use crate::error::ErinError;
use crate::interp::{parse_module, Exception, Interpreter, Limits, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// A generated function ready to be called.
pub struct CompiledFunction {
    name: String,
    source: String,
    function: Value,
    interp: Interpreter,
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("name", &self.name)
            .field("source_len", &self.source.len())
            .finish()
    }
}

impl CompiledFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Text printed by the generated code so far.
    pub fn output(&self) -> &str {
        self.interp.output()
    }

    /// Call the function with the original arguments.
    pub fn invoke(
        &mut self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ErinError> {
        debug!(
            "⚙️ [Executor] Invoking {} with {} positional / {} keyword argument(s)",
            self.name,
            args.len(),
            kwargs.len()
        );
        match self.interp.call(&self.function, args.clone(), kwargs.clone()) {
            Ok(value) => {
                debug!(
                    "⚙️ [Executor] {} returned after {} steps",
                    self.name,
                    self.interp.steps()
                );
                Ok(value)
            }
            Err(exc) => {
                error!("❌ [Executor] {} raised {}", self.name, exc);
                Err(ErinError::Execution {
                    name: self.name.clone(),
                    args,
                    kwargs,
                    source: exc,
                })
            }
        }
    }
}

/// Builds interpreters for generated code.
#[derive(Clone, Default)]
pub struct Executor {
    chat: Option<Arc<dyn GenerationClient>>,
    limits: Limits,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `chat(prompt, system_prompt=None)` backed by `client`.
    pub fn with_chat(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.chat = Some(client);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Parse `source`, run its top-level statements, and locate `name`.
    ///
    /// A failure while running top-level statements is reported as
    /// [`ErinError::Execution`] with no arguments attached.
    pub fn compile(&self, source: &str, name: &str) -> Result<CompiledFunction, ErinError> {
        let compilation = |message: String, line: usize| ErinError::Compilation {
            name: name.to_string(),
            source_code: source.to_string(),
            message,
            line,
        };

        let module = parse_module(source).map_err(|e| {
            error!("❌ [Executor] Syntax error in {} (line {}): {}", name, e.line, e.message);
            compilation(e.message, e.line)
        })?;

        let mut interp = Interpreter::with_limits(self.limits);
        if let Some(client) = &self.chat {
            install_chat(&mut interp, client.clone());
        }
        interp.run_module(&module).map_err(|exc| {
            error!("❌ [Executor] Top-level code of {} raised {}", name, exc);
            ErinError::Execution {
                name: name.to_string(),
                args: Vec::new(),
                kwargs: Vec::new(),
                source: exc,
            }
        })?;

        let function = match interp.global(name) {
            Some(value) if value.is_callable() => value,
            Some(other) => {
                error!("❌ [Executor] {} is a {}, not a function", name, other.type_name());
                return Err(compilation(
                    format!("'{}' is not callable ({})", name, other.type_name()),
                    0,
                ));
            }
            None => {
                error!("❌ [Executor] {} is not defined by the generated code", name);
                return Err(compilation(format!("'{}' is not defined", name), 0));
            }
        };
        debug!("⚙️ [Executor] Compiled {} ({} statements)", name, module.len());

        Ok(CompiledFunction {
            name: name.to_string(),
            source: source.to_string(),
            function,
            interp,
        })
    }
}

/// Compile with default limits and no `chat` helper.
pub fn compile(source: &str, name: &str) -> Result<CompiledFunction, ErinError> {
    Executor::new().compile(source, name)
}

fn install_chat(interp: &mut Interpreter, client: Arc<dyn GenerationClient>) {
    interp.define_host("chat", move |args, kwargs| {
        let mut prompt = args.first().cloned();
        let mut system = args.get(1).cloned();
        if args.len() > 2 {
            return Err(Exception::type_error(format!(
                "chat() takes from 1 to 2 positional arguments but {} were given",
                args.len()
            )));
        }
        for (key, value) in kwargs {
            match key.as_str() {
                "prompt" if prompt.is_none() => prompt = Some(value.clone()),
                "system_prompt" if system.is_none() => system = Some(value.clone()),
                _ => {
                    return Err(Exception::type_error(format!(
                        "chat() got an unexpected keyword argument '{}'",
                        key
                    )))
                }
            }
        }
        let prompt = match prompt {
            Some(Value::Str(p)) => p,
            Some(other) => {
                return Err(Exception::type_error(format!(
                    "chat() prompt must be str, not {}",
                    other.type_name()
                )))
            }
            None => {
                return Err(Exception::type_error(
                    "chat() missing 1 required positional argument: 'prompt'",
                ))
            }
        };
        let system = match system {
            None | Some(Value::None) => None,
            Some(Value::Str(s)) => Some(s),
            Some(other) => {
                return Err(Exception::type_error(format!(
                    "chat() system_prompt must be str or None, not {}",
                    other.type_name()
                )))
            }
        };
        debug!("💬 [Executor] chat() with {} chars", prompt.len());
        client
            .complete(&prompt, system.as_deref())
            .map(Value::Str)
            .map_err(|e| Exception::runtime_error(format!("chat failed: {}", e)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::pipeline::client::FnClient;

    #[test]
    fn test_add() {
        let mut f = compile("def add(a, b):\n    return a + b\n", "add").unwrap();
        assert_eq!(f.invoke(vec![Value::Int(2), Value::Int(3)], vec![]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_runtime_failure_carries_arguments() {
        let src = "def explode(x, scale=1):\n    raise ValueError('bad input')\n";
        let mut f = compile(src, "explode").unwrap();
        let err = f
            .invoke(vec![Value::Int(7)], vec![("scale".into(), Value::Int(2))])
            .unwrap_err();
        match err {
            ErinError::Execution {
                name,
                args,
                kwargs,
                source,
            } => {
                assert_eq!(name, "explode");
                assert_eq!(args, vec![Value::Int(7)]);
                assert_eq!(kwargs, vec![("scale".to_string(), Value::Int(2))]);
                assert_eq!(source.kind, "ValueError");
                assert_eq!(source.message, "bad input");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_compilation_errors() {
        match compile("def f(x)\n    return x\n", "f") {
            Err(ErinError::Compilation { line, source_code, .. }) => {
                assert_eq!(line, 1);
                assert!(source_code.starts_with("def f"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            compile("def g():\n    return 1\n", "f"),
            Err(ErinError::Compilation { .. })
        ));
        assert!(matches!(compile("f = 3\n", "f"), Err(ErinError::Compilation { .. })));
    }

    #[test]
    fn test_top_level_failure_is_execution_error() {
        let err = compile("x = 1 / 0\ndef f():\n    return x\n", "f").unwrap_err();
        assert!(matches!(err, ErinError::Execution { ref source, .. } if source.kind == "ZeroDivisionError"));
    }

    #[test]
    fn test_chat_helper() {
        let client = Arc::new(FnClient::new(|prompt: &str, system: Option<&str>| {
            Ok(format!("[{}] {}", system.unwrap_or("-"), prompt.to_uppercase()))
        }));
        let src = "\
def summarize(text):
    return chat('summarize: ' + text, system_prompt='be brief')
";
        let mut f = Executor::new().with_chat(client).compile(src, "summarize").unwrap();
        assert_eq!(
            f.invoke(vec![Value::str("hi")], vec![]).unwrap(),
            Value::str("[be brief] SUMMARIZE: HI")
        );

        let failing = Arc::new(FnClient::new(|_: &str, _: Option<&str>| {
            Err(GenerationError::Network("down".into()))
        }));
        let src = "\
def ask(q):
    try:
        return chat(q)
    except RuntimeError as e:
        return 'fallback'
";
        let mut f = Executor::new().with_chat(failing).compile(src, "ask").unwrap();
        assert_eq!(f.invoke(vec![Value::str("q")], vec![]).unwrap(), Value::str("fallback"));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let first = compile("counter = [0]\ndef bump():\n    counter.append(1)\n    return len(counter)\n", "bump");
        let mut first = first.unwrap();
        assert_eq!(first.invoke(vec![], vec![]).unwrap(), Value::Int(2));
        let mut second = compile("def bump():\n    return counter\n", "bump").unwrap();
        let err = second.invoke(vec![], vec![]).unwrap_err();
        assert!(matches!(err, ErinError::Execution { ref source, .. } if source.kind == "NameError"));
    }
}
