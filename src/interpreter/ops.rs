use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{BinaryOperator, CompareOperator, UnaryOperator};

use super::{RuntimeError, Value};

fn unsupported(op: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperands {
        operation: op.symbol().to_string(),
        left: left.describe_type(),
        right: right.describe_type(),
    }
}

fn checked(result: Option<i64>) -> Result<Value, RuntimeError> {
    result.map(Value::Integer).ok_or(RuntimeError::IntegerOverflow)
}

/// Length of `len` items repeated `count` times; negative counts repeat zero times.
fn repeated_len(len: usize, count: i64) -> Result<(usize, usize), RuntimeError> {
    let count = usize::try_from(count).unwrap_or(0);
    let total = len.checked_mul(count).ok_or(RuntimeError::IntegerOverflow)?;
    Ok((count, total))
}

fn repeat(items: &[Value], count: i64) -> Result<Vec<Value>, RuntimeError> {
    let (count, total) = repeated_len(items.len(), count)?;
    let mut repeated = Vec::new();
    repeated
        .try_reserve_exact(total)
        .map_err(|_| RuntimeError::OutOfMemory { len: total })?;
    for _ in 0..count {
        repeated.extend(items.iter().cloned());
    }
    Ok(repeated)
}

fn repeat_text(text: &str, count: i64) -> Result<String, RuntimeError> {
    let (count, total) = repeated_len(text.len(), count)?;
    let mut repeated = String::new();
    repeated
        .try_reserve_exact(total)
        .map_err(|_| RuntimeError::OutOfMemory { len: total })?;
    for _ in 0..count {
        repeated.push_str(text);
    }
    Ok(repeated)
}

pub(crate) fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_binary(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return float_binary(op, a, b);
    }

    match (op, left, right) {
        (BinaryOperator::Add, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (BinaryOperator::Add, Value::List(a), Value::List(b)) => {
            let mut joined = a.borrow().clone();
            joined.extend(b.borrow().iter().cloned());
            Ok(Value::list(joined))
        }
        (BinaryOperator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOperator::Mul, Value::String(text), count)
        | (BinaryOperator::Mul, count, Value::String(text))
            if count.as_int().is_some() =>
        {
            Ok(Value::String(repeat_text(text, count.as_int().unwrap_or(0))?))
        }
        (BinaryOperator::Mul, Value::List(items), count)
        | (BinaryOperator::Mul, count, Value::List(items))
            if count.as_int().is_some() =>
        {
            let items = items.borrow();
            Ok(Value::list(repeat(&items, count.as_int().unwrap_or(0))?))
        }
        (BinaryOperator::Mul, Value::Tuple(items), count)
        | (BinaryOperator::Mul, count, Value::Tuple(items))
            if count.as_int().is_some() =>
        {
            Ok(Value::Tuple(repeat(items, count.as_int().unwrap_or(0))?))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn int_binary(op: BinaryOperator, a: i64, b: i64) -> Result<Value, RuntimeError> {
    match op {
        BinaryOperator::Add => checked(a.checked_add(b)),
        BinaryOperator::Sub => checked(a.checked_sub(b)),
        BinaryOperator::Mul => checked(a.checked_mul(b)),
        BinaryOperator::Div => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivision);
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinaryOperator::FloorDiv => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivision);
            }
            let quotient = a.checked_div(b).ok_or(RuntimeError::IntegerOverflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                checked(quotient.checked_sub(1))
            } else {
                Ok(Value::Integer(quotient))
            }
        }
        BinaryOperator::Mod => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivision);
            }
            let remainder = a.checked_rem(b).unwrap_or(0);
            if remainder != 0 && ((remainder < 0) != (b < 0)) {
                checked(remainder.checked_add(b))
            } else {
                Ok(Value::Integer(remainder))
            }
        }
    }
}

fn float_binary(op: BinaryOperator, a: f64, b: f64) -> Result<Value, RuntimeError> {
    let value = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div | BinaryOperator::FloorDiv | BinaryOperator::Mod if b == 0.0 => {
            return Err(RuntimeError::ZeroDivision);
        }
        BinaryOperator::Div => a / b,
        BinaryOperator::FloorDiv => (a / b).floor(),
        BinaryOperator::Mod => {
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                remainder + b
            } else {
                remainder
            }
        }
    };
    Ok(Value::Float(value))
}

pub(crate) fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOperator::Neg => match operand {
            Value::Float(value) => Ok(Value::Float(-value)),
            other => match other.as_int() {
                Some(value) => checked(value.checked_neg()),
                None => Err(RuntimeError::UnsupportedOperation {
                    operation: "unary -".to_string(),
                    type_name: other.describe_type(),
                }),
            },
        },
        UnaryOperator::Pos => match operand {
            Value::Float(value) => Ok(Value::Float(*value)),
            other => other.as_int().map(Value::Integer).ok_or_else(|| {
                RuntimeError::UnsupportedOperation {
                    operation: "unary +".to_string(),
                    type_name: other.describe_type(),
                }
            }),
        },
    }
}

/// Ordering used by `<`, `sorted`, `min` and `max`.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Result<Ordering, RuntimeError> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal));
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => compare_sequences(&a.borrow(), &b.borrow()),
        (Value::Tuple(a), Value::Tuple(b)) => compare_sequences(a, b),
        _ => Err(RuntimeError::UnsupportedOperands {
            operation: "<".to_string(),
            left: left.describe_type(),
            right: right.describe_type(),
        }),
    }
}

fn compare_sequences(left: &[Value], right: &[Value]) -> Result<Ordering, RuntimeError> {
    for (a, b) in left.iter().zip(right) {
        if a == b {
            continue;
        }
        return compare_values(a, b);
    }
    Ok(left.len().cmp(&right.len()))
}

pub(crate) fn compare(
    op: CompareOperator,
    left: &Value,
    right: &Value,
) -> Result<bool, RuntimeError> {
    Ok(match op {
        CompareOperator::Equal => left == right,
        CompareOperator::NotEqual => left != right,
        CompareOperator::Less => compare_values(left, right)?.is_lt(),
        CompareOperator::LessEqual => compare_values(left, right)?.is_le(),
        CompareOperator::Greater => compare_values(left, right)?.is_gt(),
        CompareOperator::GreaterEqual => compare_values(left, right)?.is_ge(),
        CompareOperator::In => contains(right, left)?,
        CompareOperator::NotIn => !contains(right, left)?,
        CompareOperator::Is => is_same(left, right),
        CompareOperator::IsNot => !is_same(left, right),
    })
}

/// Identity for reference values; equality of same-typed scalars otherwise.
pub(crate) fn is_same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, RuntimeError> {
    match container {
        Value::List(values) => Ok(values.borrow().iter().any(|value| value == item)),
        Value::Tuple(values) => Ok(values.iter().any(|value| value == item)),
        Value::Dict(entries) => Ok(entries.borrow().iter().any(|(key, _)| key == item)),
        Value::String(text) => match item {
            Value::String(needle) => Ok(text.contains(needle.as_str())),
            other => Err(RuntimeError::invalid_argument(
                "in",
                "left operand",
                "str",
                &other.describe_type(),
            )),
        },
        Value::Range { .. } => Ok(container.iterate()?.iter().any(|value| value == item)),
        other => Err(RuntimeError::NotIterable {
            type_name: other.describe_type(),
        }),
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + signed_len } else { index };
    if (0..signed_len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(RuntimeError::IndexOutOfRange { index, len })
    }
}

pub(crate) fn get_item(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(values) => {
            let values = values.borrow();
            let position = normalize_index(index.expect_int("list index", "index")?, values.len())?;
            Ok(values[position].clone())
        }
        Value::Tuple(values) => {
            let position = normalize_index(index.expect_int("tuple index", "index")?, values.len())?;
            Ok(values[position].clone())
        }
        Value::String(text) => {
            let chars = text.chars().collect::<Vec<_>>();
            let position = normalize_index(index.expect_int("str index", "index")?, chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        Value::Range { start, step, .. } => {
            let position =
                normalize_index(index.expect_int("range index", "index")?, object.range_len())?;
            let offset = i64::try_from(position).map_err(|_| RuntimeError::IntegerOverflow)?;
            checked(offset.checked_mul(*step).and_then(|delta| start.checked_add(delta)))
        }
        Value::Dict(entries) => entries
            .borrow()
            .iter()
            .find(|(key, _)| key == index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| RuntimeError::KeyNotFound { key: index.repr() }),
        other => Err(RuntimeError::NotSubscriptable {
            type_name: other.describe_type(),
        }),
    }
}

pub(crate) fn set_item(object: &Value, index: Value, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::List(values) => {
            let mut values = values.borrow_mut();
            let position = normalize_index(index.expect_int("list index", "index")?, values.len())?;
            values[position] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            let mut entries = entries.borrow_mut();
            if let Some(entry) = entries.iter_mut().find(|(key, _)| *key == index) {
                entry.1 = value;
            } else {
                entries.push((index, value));
            }
            Ok(())
        }
        other => Err(RuntimeError::UnsupportedOperation {
            operation: "item assignment".to_string(),
            type_name: other.describe_type(),
        }),
    }
}
