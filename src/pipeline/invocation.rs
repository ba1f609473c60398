use crate::interp::Value;
use std::fmt;

/// One request to produce and run an implementation of `name`.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
    pub context: Option<String>,
}

impl Invocation {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Invocation {
            name: name.into(),
            args,
            kwargs: Vec::new(),
            context: None,
        }
    }

    pub fn with_kwargs(mut self, kwargs: Vec<(String, Value)>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Attach a natural-language hint; blank hints are dropped.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// `name(1, 'a', key=2)`, for logs.
    pub fn call_repr(&self) -> String {
        let mut parts: Vec<String> = self.args.iter().map(Value::repr).collect();
        parts.extend(self.kwargs.iter().map(|(k, v)| format!("{}={}", k, v.repr())));
        format!("{}({})", self.name, parts.join(", "))
    }
}

/// Where an invocation is in the pipeline. Each transition is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    TypeInferred,
    PromptBuilt,
    Generated,
    Extracted,
    Executed,
    Returned,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Received => "received",
            Stage::TypeInferred => "type-inferred",
            Stage::PromptBuilt => "prompt-built",
            Stage::Generated => "generated",
            Stage::Extracted => "extracted",
            Stage::Executed => "executed",
            Stage::Returned => "returned",
            Stage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_repr_and_blank_context() {
        let inv = Invocation::new("greet", vec![Value::str("bob"), Value::Int(2)])
            .with_kwargs(vec![("loud".into(), Value::Bool(true))])
            .with_context(Some("   ".into()));
        assert_eq!(inv.call_repr(), "greet('bob', 2, loud=True)");
        assert!(inv.context.is_none());
    }
}
