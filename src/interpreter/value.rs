use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{Statement, format_float, quote_string};
use crate::builtins::{BuiltinFunction, BuiltinMethod};

use super::RuntimeError;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<Vec<(Value, Value)>>>;

/// A user-defined function or method.
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

pub struct Class {
    pub name: String,
    pub attributes: RefCell<FxHashMap<String, Value>>,
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attributes: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    /// Instance attributes shadow class attributes; class functions bind to
    /// the instance.
    pub fn get_attribute(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }
        match self.class.attributes.borrow().get(name)? {
            Value::Function(function) => Some(Value::BoundMethod {
                receiver: Rc::clone(self),
                function: Rc::clone(function),
            }),
            other => Some(other.clone()),
        }
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(ListRef),
    Tuple(Vec<Value>),
    Dict(DictRef),
    Range { start: i64, stop: i64, step: i64 },
    Function(Rc<Function>),
    Builtin(BuiltinFunction),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    BoundMethod {
        receiver: Rc<Instance>,
        function: Rc<Function>,
    },
    BuiltinMethod {
        receiver: Box<Value>,
        method: BuiltinMethod,
    },
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn dict(entries: Vec<(Value, Value)>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) | Value::BuiltinMethod { .. } => "builtin_function_or_method",
            Value::Class(_) => "type",
            Value::Instance(_) => "object",
            Value::BoundMethod { .. } => "method",
        }
    }

    /// The name used in error messages; instances report their class.
    pub fn describe_type(&self) -> String {
        match self {
            Value::Instance(instance) => instance.class.name.clone(),
            other => other.type_name().to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(value) => *value,
            Value::Integer(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::List(values) => !values.borrow().is_empty(),
            Value::Tuple(values) => !values.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Range { .. } => self.range_len() > 0,
            Value::Function(_)
            | Value::Builtin(_)
            | Value::Class(_)
            | Value::Instance(_)
            | Value::BoundMethod { .. }
            | Value::BuiltinMethod { .. } => true,
        }
    }

    /// Integer view of ints and bools, used for indexing and arithmetic.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Boolean(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            other => other.as_int().map(|value| value as f64),
        }
    }

    pub fn expect_int(&self, operation: &str, argument: &str) -> Result<i64, RuntimeError> {
        self.as_int().ok_or_else(|| {
            RuntimeError::invalid_argument(operation, argument, "int", &self.describe_type())
        })
    }

    pub(crate) fn range_len(&self) -> usize {
        let Value::Range { start, stop, step } = *self else {
            return 0;
        };
        let span = if step > 0 {
            i128::from(stop) - i128::from(start)
        } else {
            i128::from(start) - i128::from(stop)
        };
        let step = i128::from(step).abs();
        if span <= 0 {
            0
        } else {
            usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
        }
    }

    /// Materializes the elements of any iterable value.
    pub fn iterate(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Value::List(values) => Ok(values.borrow().clone()),
            Value::Tuple(values) => Ok(values.clone()),
            Value::String(value) => Ok(value.chars().map(|c| Value::String(c.into())).collect()),
            Value::Dict(entries) => Ok(entries.borrow().iter().map(|(k, _)| k.clone()).collect()),
            Value::Range { start, step, .. } => {
                let mut items = Vec::with_capacity(self.range_len());
                let mut current = *start;
                for _ in 0..self.range_len() {
                    items.push(Value::Integer(current));
                    current = current.wrapping_add(*step);
                }
                Ok(items)
            }
            other => Err(RuntimeError::NotIterable {
                type_name: other.describe_type(),
            }),
        }
    }

    /// The text `print` and `str()` produce.
    pub fn to_output(&self) -> String {
        match self {
            Value::String(value) => value.clone(),
            other => other.repr(),
        }
    }

    /// The text `repr()` produces; also used for recorded values.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, active: &mut Vec<*const ()>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Boolean(true) => out.push_str("True"),
            Value::Boolean(false) => out.push_str("False"),
            Value::Integer(value) => out.push_str(&value.to_string()),
            Value::Float(value) => out.push_str(&format_float(*value)),
            Value::String(value) => out.push_str(&quote_string(value)),
            Value::List(values) => {
                let id = Rc::as_ptr(values).cast::<()>();
                if active.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                active.push(id);
                out.push('[');
                write_items(out, &values.borrow(), active);
                out.push(']');
                active.pop();
            }
            Value::Tuple(values) => {
                out.push('(');
                write_items(out, values, active);
                if values.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(entries) => {
                let id = Rc::as_ptr(entries).cast::<()>();
                if active.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                active.push(id);
                out.push('{');
                for (index, (key, value)) in entries.borrow().iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, active);
                    out.push_str(": ");
                    value.write_repr(out, active);
                }
                out.push('}');
                active.pop();
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    out.push_str(&format!("range({start}, {stop})"));
                } else {
                    out.push_str(&format!("range({start}, {stop}, {step})"));
                }
            }
            Value::Function(function) => out.push_str(&format!("<function {}>", function.name)),
            Value::Builtin(builtin) => {
                out.push_str(&format!("<built-in function {}>", builtin.name()));
            }
            Value::Class(class) => out.push_str(&format!("<class '{}'>", class.name)),
            Value::Instance(instance) => {
                out.push_str(&format!("<{} object>", instance.class.name));
            }
            Value::BoundMethod { receiver, function } => out.push_str(&format!(
                "<bound method {}.{}>",
                receiver.class.name, function.name
            )),
            Value::BuiltinMethod { receiver, method } => out.push_str(&format!(
                "<built-in method {} of {} object>",
                method.name(),
                receiver.type_name()
            )),
        }
    }

    /// Copies mutable containers so later mutation does not rewrite history.
    /// Instances, functions and classes keep their identity.
    pub fn detach(&self) -> Value {
        self.detach_inner(&mut Vec::new())
    }

    fn detach_inner(&self, active: &mut Vec<*const ()>) -> Value {
        match self {
            Value::List(values) => {
                let id = Rc::as_ptr(values).cast::<()>();
                if active.contains(&id) {
                    return self.clone();
                }
                active.push(id);
                let copied = values
                    .borrow()
                    .iter()
                    .map(|value| value.detach_inner(active))
                    .collect();
                active.pop();
                Value::list(copied)
            }
            Value::Dict(entries) => {
                let id = Rc::as_ptr(entries).cast::<()>();
                if active.contains(&id) {
                    return self.clone();
                }
                active.push(id);
                let copied = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.detach_inner(active), value.detach_inner(active)))
                    .collect();
                active.pop();
                Value::dict(copied)
            }
            Value::Tuple(values) => {
                Value::Tuple(values.iter().map(|value| value.detach_inner(active)).collect())
            }
            other => other.clone(),
        }
    }
}

fn write_items(out: &mut String, values: &[Value], active: &mut Vec<*const ()>) {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        value.write_repr(out, active);
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter()
                            .any(|(other_key, other_value)| key == other_key && value == other_value)
                    })
            }
            (
                Value::Range {
                    start: a_start,
                    stop: a_stop,
                    step: a_step,
                },
                Value::Range {
                    start: b_start,
                    stop: b_stop,
                    step: b_step,
                },
            ) => (a_start, a_stop, a_step) == (b_start, b_stop, b_step),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (
                Value::BoundMethod {
                    receiver: a_receiver,
                    function: a_function,
                },
                Value::BoundMethod {
                    receiver: b_receiver,
                    function: b_function,
                },
            ) => Rc::ptr_eq(a_receiver, b_receiver) && Rc::ptr_eq(a_function, b_function),
            (
                Value::BuiltinMethod {
                    receiver: a_receiver,
                    method: a_method,
                },
                Value::BuiltinMethod {
                    receiver: b_receiver,
                    method: b_method,
                },
            ) => a_method == b_method && a_receiver == b_receiver,
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => match (a.as_float(), b.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_like_python_repr() {
        let nested = Value::list(vec![
            Value::Integer(1),
            Value::Tuple(vec![Value::from("a")]),
            Value::dict(vec![(Value::from("k"), Value::Float(2.0))]),
            Value::None,
        ]);
        assert_eq!(nested.repr(), "[1, ('a',), {'k': 2.0}, None]");
        assert_eq!(Value::from("a b").to_output(), "a b");
        assert_eq!(Value::from("a b").repr(), "'a b'");
    }

    #[test]
    fn renders_self_referencing_list() {
        let list = Value::list(vec![Value::Integer(1)]);
        if let Value::List(values) = &list {
            values.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr(), "[1, [...]]");
    }

    #[test]
    fn compares_numbers_across_types() {
        assert_eq!(Value::Integer(1), Value::Float(1.0));
        assert_eq!(Value::Boolean(true), Value::Integer(1));
        assert_ne!(Value::from("1"), Value::Integer(1));
    }

    #[test]
    fn detach_copies_containers() {
        let inner = Value::list(vec![Value::Integer(1)]);
        let outer = Value::Tuple(vec![inner.clone()]);
        let detached = outer.detach();
        if let Value::List(values) = &inner {
            values.borrow_mut().push(Value::Integer(2));
        }
        assert_eq!(detached.repr(), "([1],)");
        assert_eq!(outer.repr(), "([1, 2],)");
    }

    #[test]
    fn range_length_handles_steps() {
        let range = |start, stop, step| Value::Range { start, stop, step };
        assert_eq!(range(0, 5, 1).range_len(), 5);
        assert_eq!(range(0, 5, 2).range_len(), 3);
        assert_eq!(range(5, 0, -2).range_len(), 3);
        assert_eq!(range(3, 3, 1).range_len(), 0);
        assert!(!range(3, 1, 1).is_truthy());
    }
}
