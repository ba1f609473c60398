//! Type labels for call arguments.
//!
//! Labels use the names the generated language knows (`int`, `str`, `list`,
//! ...) so the model sees familiar types. Element types of collections are
//! not inspected: `[1, 2]` and `["a"]` are both `list`.

use crate::interp::Value;

/// Label for one argument value. Never fails.
pub fn infer_type(value: &Value) -> &'static str {
    value.type_name()
}

/// Ordered argument-key to type-label mapping for one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    entries: Vec<(String, &'static str)>,
    positional: usize,
}

impl Signature {
    /// Positional arguments are keyed `arg0`, `arg1`, ...; keyword arguments
    /// by their keyword.
    pub fn infer(args: &[Value], kwargs: &[(String, Value)]) -> Self {
        let mut entries = Vec::with_capacity(args.len() + kwargs.len());
        for (i, arg) in args.iter().enumerate() {
            entries.push((format!("arg{}", i), infer_type(arg)));
        }
        for (key, value) in kwargs {
            entries.push((key.clone(), infer_type(value)));
        }
        Signature {
            entries,
            positional: args.len(),
        }
    }

    pub fn entries(&self) -> &[(String, &'static str)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positional_count(&self) -> usize {
        self.positional
    }

    pub fn keyword_names(&self) -> impl Iterator<Item = &str> {
        self.entries[self.positional..].iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, label)| *label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_category_same_label() {
        for v in [Value::Int(1), Value::Int(42), Value::Int(-7)] {
            assert_eq!(infer_type(&v), "int");
        }
        for v in [Value::str("a"), Value::str("")] {
            assert_eq!(infer_type(&v), "str");
        }
        let lists = [Value::list(vec![Value::Int(1), Value::Int(2)]), Value::list(vec![])];
        for v in &lists {
            assert_eq!(infer_type(v), "list");
        }
        assert_eq!(infer_type(&Value::Bool(true)), "bool");
        assert_eq!(infer_type(&Value::Float(0.5)), "float");
        assert_eq!(infer_type(&Value::None), "NoneType");
        assert_eq!(infer_type(&Value::tuple(vec![])), "tuple");
    }

    #[test]
    fn test_one_entry_per_argument() {
        let sig = Signature::infer(
            &[Value::Int(1), Value::str("x")],
            &[("scale".to_string(), Value::Float(2.0))],
        );
        assert_eq!(sig.len(), 3);
        assert_eq!(sig.positional_count(), 2);
        assert_eq!(sig.get("arg0"), Some("int"));
        assert_eq!(sig.get("arg1"), Some("str"));
        assert_eq!(sig.get("scale"), Some("float"));
        assert_eq!(sig.keyword_names().collect::<Vec<_>>(), vec!["scale"]);
        assert!(Signature::infer(&[], &[]).is_empty());
    }
}
