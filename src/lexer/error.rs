use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Invalid dedent to {indent_level} spaces at line {line}")]
    InvalidDedent { indent_level: usize, line: usize },
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Tabs are not supported for indentation at line {line}")]
    TabIndentation { line: usize },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid float literal '{literal}' at line {line}, column {column}")]
    InvalidFloatLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unknown escape sequence '\\{escape}' at line {line}, column {column}")]
    UnknownEscape {
        escape: char,
        line: usize,
        column: usize,
    },
    #[error("Unmatched '{delimiter}' at line {line}, column {column}")]
    UnmatchedDelimiter {
        delimiter: char,
        line: usize,
        column: usize,
    },
}

pub type LexResult<T> = Result<T, LexError>;
