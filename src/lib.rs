//! Live values for small Python-style programs.
//!
//! A [`LiveSource`] parses its source, [`synthesize`]s recorder calls after
//! every observable assignment, branch condition and `print`, runs the result
//! on a [`Backend`] and hands back the bounded per-line [`History`].

pub mod ast;
pub mod backend;
pub mod builtins;
pub mod config;
pub mod error;
pub mod history;
pub mod interpreter;
pub mod lexer;
pub mod livesource;
pub mod parser;
pub mod synthesizer;
pub mod token;

pub use backend::Backend;
pub use config::Config;
pub use error::{Error, Result};
pub use history::{Entry, History, HistoryStore};
pub use interpreter::{Interpreter, Value};
pub use livesource::{LiveSource, NotImplemented, Run};
pub use parser::parse;
pub use synthesizer::synthesize;
