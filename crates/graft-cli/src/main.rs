//! graft CLI - inspect and run coercions from the standard catalog.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use graft_core::{TypeCoercer, TypeKey};
use graft_rules::standard_catalog;
use serde::Serialize;

/// Scalar types addressable by name on the command line.
const KNOWN_TYPES: &[&str] = &["String", "i64", "u64", "i32", "u32", "f64", "bool", "char"];

#[derive(Parser)]
#[command(name = "graft", version, about = "Type coercion engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every coercion rule in the standard catalog.
    Rules {
        /// Emit the list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the coercion path from one type to another.
    Explain {
        /// Source type name (e.g. "String").
        from: String,
        /// Target type name (e.g. "i32").
        to: String,
        /// Emit the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Coerce a string value to a target type and print the result.
    Coerce {
        /// Target type name (e.g. "f64").
        to: String,
        /// The input value.
        value: String,
    },
}

#[derive(Serialize)]
struct RuleReport {
    source: String,
    target: String,
    description: String,
}

#[derive(Serialize)]
struct ExplainReport {
    from: String,
    to: String,
    /// Empty when no coercion is needed.
    path: String,
}

/// Resolve a command-line type name to its key.
fn type_key(name: &str) -> Result<TypeKey> {
    match name {
        "String" => Ok(TypeKey::of::<String>()),
        "i64" => Ok(TypeKey::of::<i64>()),
        "u64" => Ok(TypeKey::of::<u64>()),
        "i32" => Ok(TypeKey::of::<i32>()),
        "u32" => Ok(TypeKey::of::<u32>()),
        "f64" => Ok(TypeKey::of::<f64>()),
        "bool" => Ok(TypeKey::of::<bool>()),
        "char" => Ok(TypeKey::of::<char>()),
        other => bail!(
            "unknown type '{}'. Known types: {}",
            other,
            KNOWN_TYPES.join(", ")
        ),
    }
}

fn coerce_and_print<T: std::fmt::Debug + 'static>(
    coercer: &TypeCoercer,
    value: String,
) -> Result<()> {
    match coercer.coerce::<T>(Box::new(value))? {
        Some(v) => println!("{v:?}"),
        None => println!("null"),
    }
    Ok(())
}

fn run_rules(coercer: &TypeCoercer, json: bool) -> Result<()> {
    if json {
        let reports: Vec<RuleReport> = coercer
            .catalog()
            .iter()
            .map(|rule| RuleReport {
                source: rule.source().to_string(),
                target: rule.target().to_string(),
                description: rule.description().to_string(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("serializing rule list")?
        );
    } else {
        for rule in coercer.catalog().iter() {
            println!("{}", rule.description());
        }
    }
    Ok(())
}

fn run_explain(coercer: &TypeCoercer, from: &str, to: &str, json: bool) -> Result<()> {
    let path = coercer
        .explain(type_key(from)?, type_key(to)?)
        .with_context(|| format!("explaining {from} -> {to}"))?;

    if json {
        let report = ExplainReport {
            from: from.to_string(),
            to: to.to_string(),
            path,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serializing explanation")?
        );
    } else if path.is_empty() {
        println!("no coercion needed");
    } else {
        println!("{path}");
    }
    Ok(())
}

fn run_coerce(coercer: &TypeCoercer, to: &str, value: String) -> Result<()> {
    match to {
        "String" => coerce_and_print::<String>(coercer, value),
        "i64" => coerce_and_print::<i64>(coercer, value),
        "u64" => coerce_and_print::<u64>(coercer, value),
        "i32" => coerce_and_print::<i32>(coercer, value),
        "u32" => coerce_and_print::<u32>(coercer, value),
        "f64" => coerce_and_print::<f64>(coercer, value),
        "bool" => coerce_and_print::<bool>(coercer, value),
        "char" => coerce_and_print::<char>(coercer, value),
        other => bail!(
            "unknown type '{}'. Known types: {}",
            other,
            KNOWN_TYPES.join(", ")
        ),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let coercer = TypeCoercer::new(standard_catalog());

    match cli.command {
        Commands::Rules { json } => run_rules(&coercer, json),
        Commands::Explain { from, to, json } => run_explain(&coercer, &from, &to, json),
        Commands::Coerce { to, value } => run_coerce(&coercer, to.as_str(), value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_known_names() {
        for name in KNOWN_TYPES {
            assert!(type_key(name).is_ok(), "should resolve {name}");
        }
    }

    #[test]
    fn test_type_key_unknown_name() {
        let err = type_key("Duration").unwrap_err();
        assert!(err.to_string().contains("Known types"));
    }

    #[test]
    fn test_explain_over_standard_catalog() {
        let coercer = TypeCoercer::new(standard_catalog());
        let path = coercer
            .explain(type_key("String").unwrap(), type_key("i32").unwrap())
            .unwrap();
        assert_eq!(path, "String --> i64, i64 --> i32");
    }
}
