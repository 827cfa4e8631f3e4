use std::fmt;

use tracing::debug;

use crate::ast::Program;
use crate::backend::Backend;
use crate::config::Config;
use crate::error::Result;
use crate::history::{History, HistoryStore};
use crate::interpreter::{Interpreter, Value};
use crate::parser::parse;
use crate::synthesizer::synthesize;

/// Returned by operations that are reserved but not supported yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotImplemented;

impl fmt::Display for NotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not implemented")
    }
}

/// Result of one instrumented run.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub history: History,
    /// Everything the program printed, one line per `print` call.
    pub output: String,
}

/// Live view over a piece of source text.
///
/// Nothing is parsed until values are requested. The instrumented program is
/// cached until the source changes; every run gets a fresh history.
pub struct LiveSource<B: Backend = Interpreter> {
    code: String,
    config: Config,
    backend: B,
    cached: Option<Program>,
}

impl LiveSource<Interpreter> {
    pub fn new(code: impl Into<String>) -> Self {
        Self::with_config(code, Config::default())
    }

    pub fn with_config(code: impl Into<String>, config: Config) -> Self {
        let backend = Interpreter::with_recursion_limit(config.recursion_limit);
        Self::with_backend(code, config, backend)
    }
}

impl<B: Backend> LiveSource<B> {
    pub fn with_backend(code: impl Into<String>, config: Config, backend: B) -> Self {
        Self {
            code: code.into(),
            config,
            backend,
            cached: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the source text and drops the cached rewrite.
    pub fn update(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.cached = None;
        debug!(bytes = self.code.len(), "source updated");
    }

    /// The instrumented program for the current source.
    pub fn instrumented(&mut self) -> Result<&Program> {
        instrument(&mut self.cached, &self.code)
    }

    /// Runs the instrumented program and returns its history and output.
    pub fn run(&mut self) -> Result<Run> {
        let program = instrument(&mut self.cached, &self.code)?;
        let mut store = HistoryStore::new(self.config.max_depth);
        let output = self.backend.execute(program, &mut store)?;
        let history = store.into_history();
        debug!(
            backend = self.backend.name(),
            lines = history.len(),
            "instrumented run finished"
        );
        Ok(Run { history, output })
    }

    /// Runs the program and returns the recorded values per line.
    pub fn get_values(&mut self) -> Result<History> {
        Ok(self.run()?.history)
    }

    /// Reserved for injecting a value into a running program.
    pub fn set_variable(&mut self, line: usize, name: &str, _value: Value) -> NotImplemented {
        debug!(line, name, "set_variable is not implemented");
        NotImplemented
    }
}

fn instrument<'a>(cached: &'a mut Option<Program>, code: &str) -> Result<&'a Program> {
    let program = match cached.take() {
        Some(program) => program,
        None => synthesize(parse(code)?),
    };
    Ok(cached.insert(program))
}
