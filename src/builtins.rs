use std::cmp::Ordering;

use crate::ast::BinaryOperator;
use crate::interpreter::ops::{binary, compare_values};
use crate::interpreter::{RuntimeError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Print,
    Len,
    Range,
    Str,
    Int,
    Float,
    Bool,
    Abs,
    Min,
    Max,
    Sum,
    List,
    Tuple,
    Sorted,
}

impl BuiltinFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "print" => Self::Print,
            "len" => Self::Len,
            "range" => Self::Range,
            "str" => Self::Str,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "sum" => Self::Sum,
            "list" => Self::List,
            "tuple" => Self::Tuple,
            "sorted" => Self::Sorted,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Range => "range",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Sorted => "sorted",
        }
    }

    /// Calls the builtin; `print` appends one line to `output`.
    pub fn call(self, args: Vec<Value>, output: &mut Vec<String>) -> Result<Value, RuntimeError> {
        let name = self.name();
        match self {
            Self::Print => {
                output.push(join_output(&args, " "));
                Ok(Value::None)
            }
            Self::Len => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                let len = match &args[0] {
                    Value::String(text) => text.chars().count(),
                    Value::List(values) => values.borrow().len(),
                    Value::Tuple(values) => values.len(),
                    Value::Dict(entries) => entries.borrow().len(),
                    range @ Value::Range { .. } => range.range_len(),
                    other => {
                        return Err(RuntimeError::UnsupportedOperation {
                            operation: name.to_string(),
                            type_name: other.describe_type(),
                        });
                    }
                };
                Ok(Value::Integer(
                    i64::try_from(len).map_err(|_| RuntimeError::IntegerOverflow)?,
                ))
            }
            Self::Range => {
                RuntimeError::expect_arity_range(name, 1, 3, args.len())?;
                let bounds = args
                    .iter()
                    .map(|arg| arg.expect_int(name, "bound"))
                    .collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!("arity checked above"),
                };
                if step == 0 {
                    return Err(RuntimeError::invalid_argument(name, "step", "non-zero int", "0"));
                }
                Ok(Value::Range { start, stop, step })
            }
            Self::Str => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                Ok(Value::String(
                    args.first().map(Value::to_output).unwrap_or_default(),
                ))
            }
            Self::Int => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let Some(arg) = args.first() else {
                    return Ok(Value::Integer(0));
                };
                match arg {
                    Value::Float(value) if value.is_finite() => Ok(Value::Integer(value.trunc() as i64)),
                    Value::String(text) => text.trim().parse::<i64>().map(Value::Integer).map_err(
                        |_| RuntimeError::InvalidLiteral {
                            type_name: name.to_string(),
                            literal: arg.repr(),
                        },
                    ),
                    other => other.as_int().map(Value::Integer).ok_or_else(|| {
                        RuntimeError::invalid_argument(name, "x", "number or str", &other.describe_type())
                    }),
                }
            }
            Self::Float => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let Some(arg) = args.first() else {
                    return Ok(Value::Float(0.0));
                };
                match arg {
                    Value::String(text) => text.trim().parse::<f64>().map(Value::Float).map_err(
                        |_| RuntimeError::InvalidLiteral {
                            type_name: name.to_string(),
                            literal: arg.repr(),
                        },
                    ),
                    other => other.as_float().map(Value::Float).ok_or_else(|| {
                        RuntimeError::invalid_argument(name, "x", "number or str", &other.describe_type())
                    }),
                }
            }
            Self::Bool => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                Ok(Value::Boolean(args.first().is_some_and(Value::is_truthy)))
            }
            Self::Abs => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                match &args[0] {
                    Value::Float(value) => Ok(Value::Float(value.abs())),
                    other => match other.as_int() {
                        Some(value) => value
                            .checked_abs()
                            .map(Value::Integer)
                            .ok_or(RuntimeError::IntegerOverflow),
                        None => Err(RuntimeError::UnsupportedOperation {
                            operation: name.to_string(),
                            type_name: other.describe_type(),
                        }),
                    },
                }
            }
            Self::Min | Self::Max => {
                let candidates = match args.len() {
                    0 => {
                        return Err(RuntimeError::FunctionArityMismatch {
                            name: name.to_string(),
                            expected: "at least 1".to_string(),
                            found: 0,
                        });
                    }
                    1 => args[0].iterate()?,
                    _ => args,
                };
                let wanted = if self == Self::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut candidates = candidates.into_iter();
                let mut best = candidates.next().ok_or_else(|| RuntimeError::EmptySequence {
                    operation: name.to_string(),
                })?;
                for candidate in candidates {
                    if compare_values(&candidate, &best)? == wanted {
                        best = candidate;
                    }
                }
                Ok(best)
            }
            Self::Sum => {
                RuntimeError::expect_arity_range(name, 1, 2, args.len())?;
                let start = args.get(1).cloned().unwrap_or(Value::Integer(0));
                args[0]
                    .iterate()?
                    .iter()
                    .try_fold(start, |total, item| binary(BinaryOperator::Add, &total, item))
            }
            Self::List => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let items = match args.first() {
                    Some(iterable) => iterable.iterate()?,
                    None => Vec::new(),
                };
                Ok(Value::list(items))
            }
            Self::Tuple => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let items = match args.first() {
                    Some(iterable) => iterable.iterate()?,
                    None => Vec::new(),
                };
                Ok(Value::Tuple(items))
            }
            Self::Sorted => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                let mut items = args[0].iterate()?;
                let mut failure = None;
                items.sort_by(|a, b| {
                    compare_values(a, b).unwrap_or_else(|error| {
                        failure.get_or_insert(error);
                        Ordering::Equal
                    })
                });
                match failure {
                    Some(error) => Err(error),
                    None => Ok(Value::list(items)),
                }
            }
        }
    }
}

/// Renders values the way `print` does.
pub(crate) fn join_output(values: &[Value], separator: &str) -> String {
    values
        .iter()
        .map(Value::to_output)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Methods of the builtin container and string types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMethod {
    ListAppend,
    ListPop,
    ListExtend,
    StrUpper,
    StrLower,
    StrJoin,
    StrFormat,
    StrSplit,
    StrStrip,
    DictGet,
    DictKeys,
    DictValues,
    DictItems,
}

impl BuiltinMethod {
    pub fn lookup(receiver: &Value, name: &str) -> Option<Self> {
        let method = match (receiver, name) {
            (Value::List(_), "append") => Self::ListAppend,
            (Value::List(_), "pop") => Self::ListPop,
            (Value::List(_), "extend") => Self::ListExtend,
            (Value::String(_), "upper") => Self::StrUpper,
            (Value::String(_), "lower") => Self::StrLower,
            (Value::String(_), "join") => Self::StrJoin,
            (Value::String(_), "format") => Self::StrFormat,
            (Value::String(_), "split") => Self::StrSplit,
            (Value::String(_), "strip") => Self::StrStrip,
            (Value::Dict(_), "get") => Self::DictGet,
            (Value::Dict(_), "keys") => Self::DictKeys,
            (Value::Dict(_), "values") => Self::DictValues,
            (Value::Dict(_), "items") => Self::DictItems,
            _ => return None,
        };
        Some(method)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ListAppend => "append",
            Self::ListPop => "pop",
            Self::ListExtend => "extend",
            Self::StrUpper => "upper",
            Self::StrLower => "lower",
            Self::StrJoin => "join",
            Self::StrFormat => "format",
            Self::StrSplit => "split",
            Self::StrStrip => "strip",
            Self::DictGet => "get",
            Self::DictKeys => "keys",
            Self::DictValues => "values",
            Self::DictItems => "items",
        }
    }

    pub fn call(self, receiver: &Value, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
        let name = self.name();
        match (self, receiver) {
            (Self::ListAppend, Value::List(values)) => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                values.borrow_mut().extend(args.pop());
                Ok(Value::None)
            }
            (Self::ListPop, Value::List(values)) => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let mut values = values.borrow_mut();
                if values.is_empty() {
                    return Err(RuntimeError::EmptySequence {
                        operation: name.to_string(),
                    });
                }
                let len = values.len();
                let index = match args.first() {
                    Some(index) => index.expect_int(name, "index")?,
                    None => -1,
                };
                let signed_len = i64::try_from(len).map_err(|_| RuntimeError::IntegerOverflow)?;
                let resolved = if index < 0 { index + signed_len } else { index };
                if !(0..signed_len).contains(&resolved) {
                    return Err(RuntimeError::IndexOutOfRange { index, len });
                }
                Ok(values.remove(resolved as usize))
            }
            (Self::ListExtend, Value::List(values)) => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                let items = args[0].iterate()?;
                values.borrow_mut().extend(items);
                Ok(Value::None)
            }
            (Self::StrUpper, Value::String(text)) => {
                RuntimeError::expect_arity(name, 0, args.len())?;
                Ok(Value::String(text.to_uppercase()))
            }
            (Self::StrLower, Value::String(text)) => {
                RuntimeError::expect_arity(name, 0, args.len())?;
                Ok(Value::String(text.to_lowercase()))
            }
            (Self::StrJoin, Value::String(separator)) => {
                RuntimeError::expect_arity(name, 1, args.len())?;
                let parts = args[0]
                    .iterate()?
                    .into_iter()
                    .map(|part| match part {
                        Value::String(text) => Ok(text),
                        other => Err(RuntimeError::invalid_argument(
                            name,
                            "item",
                            "str",
                            &other.describe_type(),
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::String(parts.join(separator)))
            }
            (Self::StrFormat, Value::String(template)) => format_template(template, &args),
            (Self::StrSplit, Value::String(text)) => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::None) => text.split_whitespace().map(Value::from).collect(),
                    Some(Value::String(separator)) if !separator.is_empty() => {
                        text.split(separator.as_str()).map(Value::from).collect()
                    }
                    Some(other) => {
                        return Err(RuntimeError::invalid_argument(
                            name,
                            "sep",
                            "non-empty str",
                            &other.repr(),
                        ));
                    }
                };
                Ok(Value::list(parts))
            }
            (Self::StrStrip, Value::String(text)) => {
                RuntimeError::expect_arity_range(name, 0, 1, args.len())?;
                match args.first() {
                    None | Some(Value::None) => Ok(Value::from(text.trim())),
                    Some(Value::String(chars)) => {
                        Ok(Value::from(text.trim_matches(|c: char| chars.contains(c))))
                    }
                    Some(other) => Err(RuntimeError::invalid_argument(
                        name,
                        "chars",
                        "str",
                        &other.describe_type(),
                    )),
                }
            }
            (Self::DictGet, Value::Dict(entries)) => {
                RuntimeError::expect_arity_range(name, 1, 2, args.len())?;
                let found = entries
                    .borrow()
                    .iter()
                    .find(|(key, _)| *key == args[0])
                    .map(|(_, value)| value.clone());
                Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
            }
            (Self::DictKeys, Value::Dict(entries)) => {
                RuntimeError::expect_arity(name, 0, args.len())?;
                Ok(Value::list(
                    entries.borrow().iter().map(|(key, _)| key.clone()).collect(),
                ))
            }
            (Self::DictValues, Value::Dict(entries)) => {
                RuntimeError::expect_arity(name, 0, args.len())?;
                Ok(Value::list(
                    entries.borrow().iter().map(|(_, value)| value.clone()).collect(),
                ))
            }
            (Self::DictItems, Value::Dict(entries)) => {
                RuntimeError::expect_arity(name, 0, args.len())?;
                Ok(Value::list(
                    entries
                        .borrow()
                        .iter()
                        .map(|(key, value)| Value::Tuple(vec![key.clone(), value.clone()]))
                        .collect(),
                ))
            }
            (method, other) => Err(RuntimeError::UnknownMethod {
                method: method.name().to_string(),
                type_name: other.describe_type(),
            }),
        }
    }
}

/// `str.format` with `{}` (auto-numbered) and `{N}` fields.
fn format_template(template: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(RuntimeError::invalid_argument(
                                "format",
                                "template",
                                "closed '{' field",
                                template,
                            ));
                        }
                    }
                }
                let index = if field.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    field.parse::<usize>().map_err(|_| {
                        RuntimeError::invalid_argument("format", "field", "index", &field)
                    })?
                };
                let value = args.get(index).ok_or(RuntimeError::IndexOutOfRange {
                    index: i64::try_from(index).unwrap_or(i64::MAX),
                    len: args.len(),
                })?;
                out.push_str(&value.to_output());
            }
            c => out.push(c),
        }
    }
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: BuiltinFunction, args: Vec<Value>) -> Result<Value, RuntimeError> {
        builtin.call(args, &mut Vec::new())
    }

    #[test]
    fn print_joins_arguments_with_spaces() {
        let mut output = Vec::new();
        BuiltinFunction::Print
            .call(vec![Value::from("a"), Value::Integer(1), Value::None], &mut output)
            .expect("print failed");
        assert_eq!(output, vec!["a 1 None".to_string()]);
    }

    #[test]
    fn converts_between_types() {
        assert_eq!(
            call(BuiltinFunction::Int, vec![Value::from(" 42 ")]).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            call(BuiltinFunction::Int, vec![Value::Float(-2.7)]).unwrap(),
            Value::Integer(-2)
        );
        assert_eq!(
            call(BuiltinFunction::Str, vec![Value::Float(1.0)]).unwrap(),
            Value::from("1.0")
        );
        let err = call(BuiltinFunction::Float, vec![Value::from("abc")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid literal for float(): 'abc'");
    }

    #[test]
    fn aggregates_iterables() {
        let list = Value::list(vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]);
        assert_eq!(call(BuiltinFunction::Sum, vec![list.clone()]).unwrap(), Value::Integer(6));
        assert_eq!(call(BuiltinFunction::Min, vec![list.clone()]).unwrap(), Value::Integer(1));
        assert_eq!(
            call(BuiltinFunction::Max, vec![Value::Integer(4), Value::Integer(9)]).unwrap(),
            Value::Integer(9)
        );
        assert_eq!(
            call(BuiltinFunction::Sorted, vec![list]).unwrap().repr(),
            "[1, 2, 3]"
        );
        assert_eq!(
            call(BuiltinFunction::Max, vec![Value::list(Vec::new())]),
            Err(RuntimeError::EmptySequence {
                operation: "max".to_string()
            })
        );
    }

    #[test]
    fn rejects_wrong_arity_and_zero_step() {
        let err = call(BuiltinFunction::Len, Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "Function 'len' expected 1 arguments, got 0");
        let err = call(
            BuiltinFunction::Range,
            vec![Value::Integer(0), Value::Integer(5), Value::Integer(0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'step' expected non-zero int"));
    }

    #[test]
    fn list_methods_mutate_in_place() {
        let list = Value::list(vec![Value::Integer(1)]);
        BuiltinMethod::ListAppend
            .call(&list, vec![Value::Integer(2)])
            .unwrap();
        BuiltinMethod::ListExtend
            .call(&list, vec![Value::Tuple(vec![Value::Integer(3)])])
            .unwrap();
        assert_eq!(list.repr(), "[1, 2, 3]");
        assert_eq!(
            BuiltinMethod::ListPop.call(&list, Vec::new()).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            BuiltinMethod::ListPop.call(&list, vec![Value::Integer(0)]).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(list.repr(), "[2]");
    }

    #[test]
    fn string_methods_follow_python() {
        let text = Value::from("  a b  ");
        assert_eq!(
            BuiltinMethod::StrSplit.call(&text, Vec::new()).unwrap().repr(),
            "['a', 'b']"
        );
        assert_eq!(
            BuiltinMethod::StrStrip.call(&text, Vec::new()).unwrap(),
            Value::from("a b")
        );
        let template = Value::from("{} + {} = {0}{{}}");
        assert_eq!(
            BuiltinMethod::StrFormat
                .call(&template, vec![Value::Integer(1), Value::Integer(2)])
                .unwrap(),
            Value::from("1 + 2 = 1{}")
        );
        assert_eq!(
            BuiltinMethod::StrJoin
                .call(&Value::from("-"), vec![Value::list(vec![Value::from("x"), Value::from("y")])])
                .unwrap(),
            Value::from("x-y")
        );
    }

    #[test]
    fn dict_methods_return_lists() {
        let dict = Value::dict(vec![(Value::from("k"), Value::Integer(1))]);
        assert_eq!(
            BuiltinMethod::DictGet.call(&dict, vec![Value::from("k")]).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            BuiltinMethod::DictGet
                .call(&dict, vec![Value::from("x"), Value::Integer(0)])
                .unwrap(),
            Value::Integer(0)
        );
        assert_eq!(
            BuiltinMethod::DictItems.call(&dict, Vec::new()).unwrap().repr(),
            "[('k', 1)]"
        );
    }
}
