//! Prompt template for function synthesis.
//!
//! The model only sees a name, the inferred argument types and an optional
//! one-line hint, so the template spells out the naming conventions used to
//! guess intent and the language the answer must be written in.

use super::signature::Signature;
use std::fmt;

const PREAMBLE: &str = "\
You are a Python function synthesizer. You will receive a function name and parameter types, \
and you must infer the most plausible behavior from the name and types, then implement the \
function in Python.

Input you will receive:

    function_name: the name the caller used
    parameters: a list of (param_name: type) pairs, e.g. arg0: int, arg1: list
    optional_context (may be absent): a one-line hint about intent

Your task:

    Infer the function's purpose from its name and parameter types (and optional_context if provided). Use common conventions:
        Names like sum, average, mean, count, min, max imply aggregations.
        Prefixes like is_/has_/can_ imply boolean predicates.
        Words like merge/join/concat/combine imply combining inputs.
        unique/distinct/deduplicate imply removing duplicates while preserving order if sensible.
        sort/ordered/ranked imply returning a sorted result without mutating inputs unless the name includes \"inplace\".
        normalize/standardize/trim/clean imply data cleaning or scaling with safe defaults.
        find/search/index/contains imply lookup logic and clear failure behavior.
    Choose an appropriate return type. If it is not obvious, pick the most common-sense type.
    Validate inputs where reasonable (types, value ranges, emptiness). Raise ValueError or TypeError with clear messages rather than failing silently.
    Do not mutate inputs unless the name includes \"inplace\" or \"mutate\".
    Prefer deterministic behavior. Avoid randomness unless the name clearly implies it.

Runtime:

    The code runs in a restricted Python interpreter. Available: functions, lambdas, closures, \
if/for/while, try/except/finally, raise, comprehensions, f-strings, slicing, the common builtins \
(len, range, enumerate, zip, map, filter, sorted, sum, min, max, abs, round, isinstance, ...), \
methods of str, list and dict, and the modules math, string, json, re, functools, collections and typing.
    The re module supports compile, match, search, fullmatch, findall, finditer, sub, subn, split and \
escape, with match objects (group, groups, groupdict, start, end, span). Its patterns cannot use \
look-ahead, look-behind or backreferences.
    Not available: classes, generators (yield), with-statements, async code, file or network access, \
and any other module.
    For tasks that need reasoning or natural language processing, call the `chat` function, which is \
already defined: `chat(prompt: str, system_prompt: str = None) -> str`. It sends the prompt to a large \
language model and returns its text reply. Pass system_prompt to set the role of the model.

Output format:

    Output only the Python code for the function (and at most tiny inner helpers if absolutely necessary).
    Do not include explanations, backticks, quotes or extra text. Just the function definition.
    Do not include docstrings, code only.
";

/// The rendered instruction sent to the generation service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    text: String,
}

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render the prompt for one call. Pure: equal inputs give equal prompts.
pub fn build_prompt(name: &str, signature: &Signature, context: Option<&str>) -> Prompt {
    let mut text = String::with_capacity(PREAMBLE.len() + 256);
    text.push_str(PREAMBLE);
    text.push_str("\nHere is the specification:\n\n");
    text.push_str(&format!("function_name: {}\n\nparameters:\n", name));
    for (key, label) in signature.entries() {
        text.push_str(&format!("    {}: {}\n", key, label));
    }
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        text.push_str(&format!("    optional_context: {}\n", context));
    }

    let positional = signature.positional_count();
    text.push_str(&format!(
        "\nThe function is called with {} positional argument{}",
        positional,
        if positional == 1 { "" } else { "s" }
    ));
    let keywords: Vec<&str> = signature.keyword_names().collect();
    if keywords.is_empty() {
        text.push_str(" and no keyword arguments.\n");
    } else {
        text.push_str(&format!(
            " and the keyword argument{} {}, which must be accepted by name.\n",
            if keywords.len() == 1 { "" } else { "s" },
            keywords.join(", ")
        ));
    }
    text.push_str(&format!(
        "Return only a single definition `def {}(...)`, with no surrounding explanation.\n",
        name
    ));
    Prompt { text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Value;

    #[test]
    fn test_lists_parameters_and_context() {
        let sig = Signature::infer(&[Value::Int(1), Value::str("s")], &[]);
        let prompt = build_prompt("repeat_text", &sig, Some("Repeat the text n times"));
        let text = prompt.as_str();
        assert!(text.contains("function_name: repeat_text"));
        assert!(text.contains("    arg0: int\n    arg1: str\n"));
        assert!(text.contains("optional_context: Repeat the text n times"));
        assert!(text.contains("called with 2 positional arguments and no keyword arguments"));
        assert!(text.contains("`chat`"));
        assert!(text.contains("fullmatch"));
        assert!(text.contains("look-behind"));
    }

    #[test]
    fn test_context_segment_only_when_present() {
        let sig = Signature::infer(&[], &[("limit".to_string(), Value::Int(3))]);
        let bare = build_prompt("top_items", &sig, None);
        let blank = build_prompt("top_items", &sig, Some("  "));
        assert!(!bare.as_str().contains("optional_context: "));
        assert_eq!(bare, blank);
        assert!(bare.as_str().contains("keyword argument limit"));
    }

    #[test]
    fn test_pure() {
        let sig = Signature::infer(&[Value::Float(1.5)], &[]);
        assert_eq!(
            build_prompt("halve", &sig, Some("divide by two")),
            build_prompt("halve", &sig, Some("divide by two"))
        );
    }
}
