//! Command-line front end: runs a program and shows the values each line saw.
//!
//! ```bash
//! livesource program.py
//! livesource --format json --max-depth 3 program.py
//! livesource --rewrite < program.py
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use livesource::{Config, Entry, History, LiveSource};

/// Show the values every line of a program produced.
#[derive(Parser, Debug)]
#[command(name = "livesource", version)]
struct Cli {
    /// Program to run (default: stdin).
    file: Option<PathBuf>,

    /// Values kept per line; older ones are dropped.
    #[arg(long, env = "LIVESOURCE_MAX_DEPTH", default_value = "10")]
    max_depth: NonZeroUsize,

    /// Maximum nesting of function calls.
    #[arg(long, default_value_t = livesource::interpreter::DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Print the instrumented program instead of running it.
    #[arg(long)]
    rewrite: bool,

    /// Log level for tracing output (`RUST_LOG` takes precedence).
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Source listing annotated with recorded values.
    #[default]
    Text,
    /// History and output as a JSON document.
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    label: Option<&'a str>,
    value: String,
}

#[derive(Serialize)]
struct JsonRun<'a> {
    output: &'a str,
    /// Keyed by line; serialized as string keys in line order.
    history: BTreeMap<usize, Vec<JsonEntry<'a>>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let source = read_source(cli.file.as_ref())?;
    let config = Config::default()
        .with_max_depth(cli.max_depth)
        .with_recursion_limit(cli.recursion_limit);
    let mut live = LiveSource::with_config(source, config);

    if cli.rewrite {
        let program = live.instrumented().context("Instrumenting program")?;
        print!("{program}");
        return Ok(());
    }

    let run = live.run().context("Running program")?;
    match cli.format {
        Format::Text => {
            print!("{}", annotate(live.code(), &run.history));
            if !run.output.is_empty() {
                println!("--- output ---");
                println!("{}", run.output);
            }
        }
        Format::Json => {
            let document = JsonRun {
                history: run
                    .history
                    .iter()
                    .map(|(&line, entries)| (line, entries.iter().map(json_entry).collect()))
                    .collect(),
                output: &run.output,
            };
            let rendered =
                serde_json::to_string_pretty(&document).context("Serializing history")?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn read_source(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            Ok(buffer)
        }
    }
}

fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn json_entry(entry: &Entry) -> JsonEntry<'_> {
    JsonEntry {
        label: entry.label.as_deref(),
        value: entry.value.repr(),
    }
}

fn describe(entry: &Entry) -> String {
    match &entry.label {
        Some(label) => format!("{label} = {}", entry.value.repr()),
        None => entry.value.repr(),
    }
}

/// Source listing with each line's recorded values appended as a comment.
fn annotate(source: &str, history: &History) -> String {
    let mut listing = String::new();
    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        listing.push_str(&format!("{line:>4} | {text}"));
        if let Some(entries) = history.get(&line).filter(|entries| !entries.is_empty()) {
            let values = entries.iter().map(describe).collect::<Vec<_>>();
            listing.push_str(&format!("  # {}", values.join(", ")));
        }
        listing.push('\n');
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesource::Value;

    #[test]
    fn annotates_lines_with_recorded_values() {
        let mut history = History::new();
        history.insert(
            1,
            vec![
                Entry::new(Some("a".to_string()), Value::Integer(1)),
                Entry::new(None, Value::from("x")),
            ],
        );
        assert_eq!(
            annotate("a = 1\npass\n", &history),
            "   1 | a = 1  # a = 1, 'x'\n   2 | pass\n"
        );
    }

    #[test]
    fn parses_arguments() {
        let cli = Cli::try_parse_from(["livesource", "--format", "json", "--max-depth", "3", "p.py"])
            .expect("arguments should parse");
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.max_depth.get(), 3);
        assert_eq!(cli.file, Some(PathBuf::from("p.py")));
        assert!(Cli::try_parse_from(["livesource", "--max-depth", "0"]).is_err());
    }
}
