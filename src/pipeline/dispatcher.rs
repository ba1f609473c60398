//! Public entry points: call a function by name and get it written for you.
//!
//! Every call runs the whole pipeline again. Nothing generated is kept
//! between calls, so two identical calls hit the generation service twice.

use super::client::{complete_non_empty, GenerationClient, OpenAiClient};
use super::executor::{CompiledFunction, Executor};
use super::extractor::extract_function;
use super::invocation::{Invocation, Stage};
use super::prompt::build_prompt;
use super::signature::Signature;
use crate::error::{ErinError, ErinResult, GenerationError};
use crate::interp::{Limits, Value};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Output of one synthesis round.
#[derive(Debug)]
pub struct GeneratedArtifact {
    pub raw_text: String,
    pub source: String,
    pub function: CompiledFunction,
    pub generated_at: DateTime<Utc>,
}

/// The dispatcher. Cheap to clone; clones share the generation client.
#[derive(Clone)]
pub struct Erin {
    client: Arc<dyn GenerationClient>,
    executor: Executor,
}

impl Erin {
    /// Generated code can call `chat` through the same client.
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        let executor = Executor::new().with_chat(client.clone());
        Erin { client, executor }
    }

    /// Dispatcher backed by [`OpenAiClient`] configured from the environment.
    pub fn from_env() -> Result<Self, GenerationError> {
        Ok(Self::new(Arc::new(OpenAiClient::from_env()?)))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.executor = self.executor.with_limits(limits);
        self
    }

    pub fn client(&self) -> &Arc<dyn GenerationClient> {
        &self.client
    }

    /// A callable handle for `name`, like attribute access on the module.
    pub fn function(&self, name: &str) -> LlmFunction {
        self.decorate(FunctionDecl::new(name))
    }

    pub fn call(&self, name: &str, args: Vec<Value>) -> ErinResult<Value> {
        self.invoke(name, args, Vec::new())
    }

    pub fn invoke(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> ErinResult<Value> {
        self.run(Invocation::new(name, args).with_kwargs(kwargs))
    }

    /// Bind a declaration; the result regenerates on every call.
    pub fn decorate(&self, decl: FunctionDecl) -> LlmFunction {
        LlmFunction {
            erin: self.clone(),
            decl,
        }
    }

    /// Run one invocation through the pipeline.
    pub fn run(&self, invocation: Invocation) -> ErinResult<Value> {
        info!("📞 [Erin] Calling {}", invocation.call_repr());
        let result = self.synthesize(&invocation).and_then(|mut artifact| {
            info!("🚀 [Erin] Executing generated {}", invocation.name);
            let value = artifact
                .function
                .invoke(invocation.args.clone(), invocation.kwargs.clone());
            transition(&invocation.name, Stage::Executed);
            value
        });
        match &result {
            Ok(value) => {
                transition(&invocation.name, Stage::Returned);
                info!("✅ [Erin] {} returned {}", invocation.name, value.repr());
            }
            Err(e) => {
                transition(&invocation.name, Stage::Failed);
                error!("❌ [Erin] {} failed: {}", invocation.name, e);
            }
        }
        result
    }

    /// Generate, extract, and compile an implementation without calling it.
    pub fn synthesize(&self, invocation: &Invocation) -> ErinResult<GeneratedArtifact> {
        let name = invocation.name.as_str();
        transition(name, Stage::Received);

        let signature = Signature::infer(&invocation.args, &invocation.kwargs);
        debug!("🔎 [Erin] Signature of {}: {:?}", name, signature.entries());
        transition(name, Stage::TypeInferred);

        let prompt = build_prompt(name, &signature, invocation.context.as_deref());
        debug!("📝 [Erin] Prompt ({} chars):\n{}", prompt.len(), prompt);
        transition(name, Stage::PromptBuilt);

        info!("🤖 [Erin] Generating code for {}", name);
        let raw_text = complete_non_empty(self.client.as_ref(), prompt.as_str(), None).map_err(
            |source| {
                error!("❌ [Erin] Generation failed for {}: {}", name, source);
                ErinError::Generation {
                    name: name.to_string(),
                    source,
                }
            },
        )?;
        let generated_at = Utc::now();
        info!("🤖 [Erin] Generated {} chars of code for {}", raw_text.len(), name);
        debug!("🤖 [Erin] Raw generation:\n{}", raw_text);
        transition(name, Stage::Generated);

        let source = extract_function(&raw_text, name)?;
        debug!("✂️ [Erin] Extracted source:\n{}", source);
        transition(name, Stage::Extracted);

        let function = self.executor.compile(&source, name).map_err(|e| match e {
            ErinError::Execution { name, source, .. } => ErinError::Execution {
                name,
                args: invocation.args.clone(),
                kwargs: invocation.kwargs.clone(),
                source,
            },
            other => other,
        })?;

        Ok(GeneratedArtifact {
            raw_text,
            source,
            function,
            generated_at,
        })
    }
}

fn transition(name: &str, stage: Stage) {
    debug!("🧭 [Erin] {} -> {}", name, stage);
}

/// A function declared by name with an optional docstring and rename,
/// the explicit counterpart of decorating a stub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    name: String,
    doc: Option<String>,
    rename: Option<String>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDecl {
            name: name.into(),
            doc: None,
            rename: None,
        }
    }

    /// Docstring passed to the model as context.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Ask the model for a function with a different name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }
}

/// A declared function whose body is generated on every call.
#[derive(Clone)]
pub struct LlmFunction {
    erin: Erin,
    decl: FunctionDecl,
}

impl std::fmt::Debug for LlmFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmFunction").field("decl", &self.decl).finish()
    }
}

impl LlmFunction {
    /// The declared name.
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.decl.doc.as_deref()
    }

    /// The name the model is asked to implement.
    pub fn target_name(&self) -> &str {
        self.decl.rename.as_deref().unwrap_or(&self.decl.name)
    }

    pub fn call(&self, args: Vec<Value>) -> ErinResult<Value> {
        self.call_with(args, Vec::new())
    }

    pub fn call_with(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> ErinResult<Value> {
        self.erin.run(self.invocation(args, kwargs))
    }

    pub fn invocation(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Invocation {
        Invocation::new(self.target_name(), args)
            .with_kwargs(kwargs)
            .with_context(self.decl.doc.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::client::StaticClient;

    fn erin_with(client: &Arc<StaticClient>) -> Erin {
        Erin::new(client.clone())
    }

    #[test]
    fn test_calculate_sum_end_to_end() {
        let client = Arc::new(StaticClient::new(
            "```python\ndef calculate_sum(*numbers):\n    return sum(numbers)\n```",
        ));
        let erin = erin_with(&client);
        let out = erin
            .call("calculate_sum", vec![Value::Int(1), Value::Int(2), Value::Int(3)])
            .unwrap();
        assert_eq!(out, Value::Int(6));
        let prompt = &client.prompts()[0];
        assert!(prompt.contains("function_name: calculate_sum"));
        assert!(prompt.contains("    arg0: int\n    arg1: int\n    arg2: int\n"));
    }

    #[test]
    fn test_module_constants_reach_the_function() {
        let client = Arc::new(StaticClient::new(
            "Here is the code:\n\nVOWELS = 'aeiou'\n\ndef count_vowels(s):\n    return sum(1 for c in s.lower() if c in VOWELS)\n\nprint(count_vowels('hi'))",
        ));
        let out = erin_with(&client)
            .call("count_vowels", vec![Value::str("Education")])
            .unwrap();
        assert_eq!(out, Value::Int(5));
    }

    #[test]
    fn test_decorated_function_uses_docstring() {
        let client = Arc::new(StaticClient::new(
            "def reverse_string(s: str) -> str:\n    return s[::-1]\n",
        ));
        let erin = erin_with(&client);
        let reverse = erin.decorate(FunctionDecl::new("reverse_string").doc("Reverse a string"));
        assert_eq!(reverse.name(), "reverse_string");
        assert_eq!(reverse.doc(), Some("Reverse a string"));
        assert_eq!(
            reverse.call(vec![Value::str("hello")]).unwrap(),
            Value::str("olleh")
        );
        assert!(client.prompts()[0].contains("optional_context: Reverse a string"));
    }

    #[test]
    fn test_rename_targets_new_name() {
        let client = Arc::new(StaticClient::new("def shout(s):\n    return s.upper()\n"));
        let erin = erin_with(&client);
        let f = erin.decorate(FunctionDecl::new("loud").rename("shout"));
        assert_eq!(f.name(), "loud");
        assert_eq!(f.target_name(), "shout");
        assert_eq!(f.call(vec![Value::str("hey")]).unwrap(), Value::str("HEY"));
        assert!(client.prompts()[0].contains("function_name: shout"));
    }

    #[test]
    fn test_every_call_regenerates() {
        let client = Arc::new(StaticClient::sequence(vec![
            "def pick(x):\n    return 1\n".into(),
            "def pick(x):\n    return 2\n".into(),
        ]));
        let pick = erin_with(&client).function("pick");
        assert_eq!(pick.call(vec![Value::Int(0)]).unwrap(), Value::Int(1));
        assert_eq!(pick.call(vec![Value::Int(0)]).unwrap(), Value::Int(2));
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_failures_by_stage() {
        let erin = Erin::new(Arc::new(StaticClient::failing(GenerationError::Authentication(
            "bad key".into(),
        ))));
        assert!(matches!(
            erin.call("f", vec![]),
            Err(ErinError::Generation {
                source: GenerationError::Authentication(_),
                ..
            })
        ));

        let erin = Erin::new(Arc::new(StaticClient::new("  \n")));
        assert!(matches!(
            erin.call("f", vec![]),
            Err(ErinError::Generation {
                source: GenerationError::EmptyResponse,
                ..
            })
        ));

        let erin = Erin::new(Arc::new(StaticClient::new("I cannot help with that.")));
        assert!(matches!(erin.call("f", vec![]), Err(ErinError::Extraction { .. })));

        let erin = Erin::new(Arc::new(StaticClient::new(
            "LIMIT = 10 // 0\ndef f(n):\n    return n\n",
        )));
        match erin.invoke("f", vec![Value::Int(4)], vec![("k".into(), Value::None)]) {
            Err(ErinError::Execution { args, kwargs, source, .. }) => {
                assert_eq!(args, vec![Value::Int(4)]);
                assert_eq!(kwargs.len(), 1);
                assert_eq!(source.kind, "ZeroDivisionError");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_keyword_arguments_reach_the_function() {
        let client = Arc::new(StaticClient::new(
            "def scale(values, factor=1):\n    return [v * factor for v in values]\n",
        ));
        let out = erin_with(&client)
            .invoke(
                "scale",
                vec![Value::list(vec![Value::Int(1), Value::Int(2)])],
                vec![("factor".into(), Value::Int(3))],
            )
            .unwrap();
        assert_eq!(out.repr(), "[3, 6]");
        assert!(client.prompts()[0].contains("    factor: int\n"));
    }
}
