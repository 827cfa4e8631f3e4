use thiserror::Error;

/// Typed errors raised while executing a program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Unknown attribute '{attribute}' for type {type_name}")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },
    #[error("Operation '{operation}' is not supported for type {type_name}")]
    UnsupportedOperation {
        operation: String,
        type_name: String,
    },
    #[error("Unsupported operand types for {operation}: {left} and {right}")]
    UnsupportedOperands {
        operation: String,
        left: String,
        right: String,
    },
    #[error(
        "Invalid argument type for operation '{operation}': '{argument}' expected {expected}, got {got}"
    )]
    InvalidArgumentType {
        operation: String,
        argument: String,
        expected: String,
        got: String,
    },
    #[error("Invalid literal for {type_name}(): {literal}")]
    InvalidLiteral { type_name: String, literal: String },
    #[error("Index out of range: index {index}, len {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },
    #[error("Object of type {type_name} is not subscriptable")]
    NotSubscriptable { type_name: String },
    #[error("Object of type {type_name} is not iterable")]
    NotIterable { type_name: String },
    #[error("Object of type {type_name} is not callable")]
    ObjectNotCallable { type_name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("Unknown method '{method}' for type {type_name}")]
    UnknownMethod { method: String, type_name: String },
    #[error("Cannot unpack {found} values into {expected} targets")]
    UnpackMismatch { expected: usize, found: usize },
    #[error("{operation} of an empty sequence")]
    EmptySequence { operation: String },
    #[error("Division by zero")]
    ZeroDivision,
    #[error("Integer overflow")]
    IntegerOverflow,
    #[error("Cannot allocate a sequence of {len} items")]
    OutOfMemory { len: usize },
    #[error("Nested function definitions are not supported")]
    NestedFunctionDefinitionsUnsupported,
    #[error("Return outside of function")]
    ReturnOutsideFunction,
    #[error("'{keyword}' outside of loop")]
    LoopControlOutsideLoop { keyword: &'static str },
    #[error("Maximum recursion depth of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },
}

impl RuntimeError {
    pub(crate) fn expect_arity(
        name: &str,
        expected: usize,
        found: usize,
    ) -> Result<(), RuntimeError> {
        if expected == found {
            Ok(())
        } else {
            Err(RuntimeError::FunctionArityMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                found,
            })
        }
    }

    pub(crate) fn expect_arity_range(
        name: &str,
        min: usize,
        max: usize,
        found: usize,
    ) -> Result<(), RuntimeError> {
        if (min..=max).contains(&found) {
            Ok(())
        } else {
            Err(RuntimeError::FunctionArityMismatch {
                name: name.to_string(),
                expected: format!("{min} to {max}"),
                found,
            })
        }
    }

    pub(crate) fn invalid_argument(
        operation: &str,
        argument: &str,
        expected: &str,
        got: &str,
    ) -> Self {
        RuntimeError::InvalidArgumentType {
            operation: operation.to_string(),
            argument: argument.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
