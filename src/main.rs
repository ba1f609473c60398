//! Erin CLI: call a function that does not exist yet.
//!
//! ```text
//! erin calculate_sum 1 2 3
//! erin reverse_string '"hello"' --context "Reverse a string"
//! erin scale '[1, 2]' --kw factor=3
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use erin_core::{Erin, Invocation, Value};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "erin",
    version,
    about = "Call any function by name; a language model writes it on the fly"
)]
struct Cli {
    /// Name of the function to call
    name: String,

    /// Positional arguments, parsed as JSON (plain text if not valid JSON)
    args: Vec<String>,

    /// Keyword argument as key=value (repeatable)
    #[arg(long = "kw", value_name = "KEY=VALUE")]
    kwargs: Vec<String>,

    /// Natural-language hint about what the function should do
    #[arg(long)]
    context: Option<String>,

    /// Log filter, e.g. info, debug, erin_core=trace (default: RUST_LOG, else warn)
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::str(raw))
}

fn parse_kwarg(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("keyword argument '{}' is not KEY=VALUE", raw))?;
    Ok((key.trim().to_string(), parse_value(value)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").is_err().then(|| "warn".to_string()));
    erin_core::setup_logging(level);

    let args: Vec<Value> = cli.args.iter().map(|a| parse_value(a)).collect();
    let kwargs = cli
        .kwargs
        .iter()
        .map(|kw| parse_kwarg(kw))
        .collect::<Result<Vec<_>>>()?;

    let erin = Erin::from_env().context("failed to set up the generation client")?;
    let invocation = Invocation::new(cli.name.clone(), args)
        .with_kwargs(kwargs)
        .with_context(cli.context);
    info!("📞 [CLI] {}", invocation.call_repr());

    let value = erin
        .run(invocation)
        .with_context(|| format!("calling {} failed", cli.name))?;
    println!("{}", value.repr());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_parsing() {
        assert_eq!(parse_value("3"), Value::Int(3));
        assert_eq!(parse_value("\"hi\""), Value::str("hi"));
        assert_eq!(parse_value("hello world"), Value::str("hello world"));
        assert_eq!(parse_value("[1, 2]").repr(), "[1, 2]");
        let (key, value) = parse_kwarg("factor=2.5").unwrap();
        assert_eq!(key, "factor");
        assert_eq!(value, Value::Float(2.5));
        assert!(parse_kwarg("nokey").is_err());
    }
}
