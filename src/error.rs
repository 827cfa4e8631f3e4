use thiserror::Error;

use crate::interpreter::RuntimeError;
use crate::lexer::LexError;
use crate::parser::ParseError;

/// Any failure of a parse-synthesize-run cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type Result<T> = std::result::Result<T, Error>;
