use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{
    BinaryOperator, BoolOperator, Capture, Expression, ExpressionKind, Position, RecorderCall,
    Statement, StatementKind,
};
use crate::builtins::{BuiltinFunction, BuiltinMethod, join_output};
use crate::history::HistoryStore;

use super::ops;
use super::value::{Class, Function, Instance};
use super::{RuntimeError, Value};

/// Callee and arguments of a `print(...)` expression statement.
fn print_call(expr: &Expression) -> Option<(&Expression, &[Expression])> {
    match &expr.kind {
        ExpressionKind::Call { callee, args }
            if matches!(&callee.kind, ExpressionKind::Identifier(name) if name == "print") =>
        {
            Some((callee.as_ref(), args.as_slice()))
        }
        _ => None,
    }
}

/// Control-flow marker for statement execution.
pub(super) enum ExecResult {
    Continue,
    Return(Value),
    Break,
    LoopContinue,
}

impl ExecResult {
    /// Converts control flow that escaped its construct into an error.
    pub(super) fn outside_loop(self) -> Result<Option<Value>, RuntimeError> {
        match self {
            ExecResult::Continue => Ok(None),
            ExecResult::Return(value) => Ok(Some(value)),
            ExecResult::Break => Err(RuntimeError::LoopControlOutsideLoop { keyword: "break" }),
            ExecResult::LoopContinue => Err(RuntimeError::LoopControlOutsideLoop {
                keyword: "continue",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScopeKind {
    Module,
    Class,
    Function,
}

/// Scoped variable environment with shared globals and optional local namespace.
pub(super) struct Environment<'a> {
    globals: &'a mut FxHashMap<String, Value>,
    locals: Option<&'a mut FxHashMap<String, Value>>,
    kind: ScopeKind,
}

impl<'a> Environment<'a> {
    pub(super) fn top_level(globals: &'a mut FxHashMap<String, Value>) -> Self {
        Self {
            globals,
            locals: None,
            kind: ScopeKind::Module,
        }
    }

    fn load(&self, name: &str) -> Option<Value> {
        if let Some(locals) = self.locals.as_deref()
            && let Some(value) = locals.get(name)
        {
            return Some(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Some(value.clone());
        }
        BuiltinFunction::from_name(name).map(Value::Builtin)
    }

    fn store(&mut self, name: String, value: Value) {
        if let Some(locals) = self.locals.as_deref_mut() {
            locals.insert(name, value);
        } else {
            self.globals.insert(name, value);
        }
    }

    fn child<'b>(
        &'b mut self,
        locals: &'b mut FxHashMap<String, Value>,
        kind: ScopeKind,
    ) -> Environment<'b> {
        Environment {
            globals: self.globals,
            locals: Some(locals),
            kind,
        }
    }
}

/// Runtime executor for statements and expressions, recording into `store`.
pub(super) struct InterpreterRuntime<'a> {
    pub(super) store: &'a mut HistoryStore,
    pub(super) output: Vec<String>,
    pub(super) recursion_limit: usize,
    pub(super) depth: usize,
    /// Last value tested by the `if`/`while` condition at each position.
    pub(super) conditions: FxHashMap<Position, Value>,
    /// Last arguments written by the `print` statement at each position.
    pub(super) printed: FxHashMap<Position, Vec<Value>>,
}

impl InterpreterRuntime<'_> {
    pub(super) fn exec_block(
        &mut self,
        body: &[Statement],
        environment: &mut Environment<'_>,
    ) -> Result<ExecResult, RuntimeError> {
        for statement in body {
            match self.exec_statement(statement, environment)? {
                ExecResult::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(ExecResult::Continue)
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        environment: &mut Environment<'_>,
    ) -> Result<ExecResult, RuntimeError> {
        match &statement.kind {
            StatementKind::ClassDef { name, body } => {
                let mut namespace = FxHashMap::default();
                {
                    let mut class_environment = environment.child(&mut namespace, ScopeKind::Class);
                    if self.exec_block(body, &mut class_environment)?.outside_loop()?.is_some() {
                        return Err(RuntimeError::ReturnOutsideFunction);
                    }
                }
                let class = Class {
                    name: name.clone(),
                    attributes: RefCell::new(namespace),
                };
                environment.store(name.clone(), Value::Class(Rc::new(class)));
                Ok(ExecResult::Continue)
            }
            StatementKind::FunctionDef { name, params, body } => {
                if environment.kind == ScopeKind::Function {
                    return Err(RuntimeError::NestedFunctionDefinitionsUnsupported);
                }
                let function = Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                };
                environment.store(name.clone(), Value::Function(Rc::new(function)));
                Ok(ExecResult::Continue)
            }
            StatementKind::Assign { targets, value } => {
                let value = self.eval_expression(value, environment)?;
                for target in targets {
                    self.assign(target, value.clone(), environment)?;
                }
                Ok(ExecResult::Continue)
            }
            StatementKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value, environment)?;
                Ok(ExecResult::Continue)
            }
            StatementKind::While { condition, body } => {
                while self.test_condition(condition, environment)? {
                    match self.exec_block(body, environment)? {
                        ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                        ExecResult::Break => break,
                        ExecResult::Continue | ExecResult::LoopContinue => {}
                    }
                }
                Ok(ExecResult::Continue)
            }
            StatementKind::For {
                target,
                iterable,
                body,
            } => {
                let items = self.eval_expression(iterable, environment)?.iterate()?;
                for item in items {
                    self.assign(target, item, environment)?;
                    match self.exec_block(body, environment)? {
                        ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                        ExecResult::Break => break,
                        ExecResult::Continue | ExecResult::LoopContinue => {}
                    }
                }
                Ok(ExecResult::Continue)
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let body = if self.test_condition(condition, environment)? {
                    then_body
                } else {
                    else_body
                };
                self.exec_block(body, environment)
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expression(value, environment)?,
                    None => Value::None,
                };
                Ok(ExecResult::Return(value))
            }
            StatementKind::Pass => Ok(ExecResult::Continue),
            StatementKind::Break => Ok(ExecResult::Break),
            StatementKind::Continue => Ok(ExecResult::LoopContinue),
            StatementKind::Expr(expr) => {
                match print_call(expr) {
                    Some((callee, args)) => {
                        let callee = self.eval_expression(callee, environment)?;
                        let args = self.eval_all(args, environment)?;
                        self.printed
                            .insert(expr.position, args.iter().map(Value::detach).collect());
                        self.call_value(callee, args, environment)?;
                    }
                    None => {
                        self.eval_expression(expr, environment)?;
                    }
                }
                Ok(ExecResult::Continue)
            }
            StatementKind::Record(call) => {
                let value = self.recorded_value(call, environment)?;
                self.store
                    .record(call.line, call.label.as_str().map(str::to_string), value.detach());
                Ok(ExecResult::Continue)
            }
        }
    }

    fn test_condition(
        &mut self,
        condition: &Expression,
        environment: &mut Environment<'_>,
    ) -> Result<bool, RuntimeError> {
        let value = self.eval_expression(condition, environment)?;
        let truthy = value.is_truthy();
        self.conditions.insert(condition.position, value);
        Ok(truthy)
    }

    /// Value of a recorder call. Conditions and `print` arguments are taken
    /// from the statement that already evaluated them; a missing capture
    /// falls back to evaluating the expression.
    fn recorded_value(
        &mut self,
        call: &RecorderCall,
        environment: &mut Environment<'_>,
    ) -> Result<Value, RuntimeError> {
        let position = call.value.position;
        match (call.capture, &call.value.kind) {
            (Capture::Condition, _) => {
                if let Some(value) = self.conditions.remove(&position) {
                    return Ok(value);
                }
            }
            (Capture::Output, ExpressionKind::Join { separator, .. }) => {
                if let Some(values) = self.printed.remove(&position) {
                    return Ok(Value::String(join_output(&values, separator)));
                }
            }
            _ => {}
        }
        self.eval_expression(&call.value, environment)
    }

    fn exec_aug_assign(
        &mut self,
        target: &Expression,
        op: BinaryOperator,
        value: &Expression,
        environment: &mut Environment<'_>,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExpressionKind::Identifier(name) => {
                let current = environment
                    .load(name)
                    .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() })?;
                let operand = self.eval_expression(value, environment)?;
                let updated = augmented(op, current, &operand)?;
                environment.store(name.clone(), updated);
            }
            ExpressionKind::Attribute { object, name } => {
                let object = self.eval_expression(object, environment)?;
                let current = get_attribute(&object, name)?;
                let operand = self.eval_expression(value, environment)?;
                let updated = augmented(op, current, &operand)?;
                set_attribute(&object, name, updated)?;
            }
            ExpressionKind::Index { object, index } => {
                let object = self.eval_expression(object, environment)?;
                let index = self.eval_expression(index, environment)?;
                let current = ops::get_item(&object, &index)?;
                let operand = self.eval_expression(value, environment)?;
                let updated = augmented(op, current, &operand)?;
                ops::set_item(&object, index, updated)?;
            }
            _ => {
                return Err(RuntimeError::UnsupportedOperation {
                    operation: "augmented assignment".to_string(),
                    type_name: "expression".to_string(),
                });
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        target: &Expression,
        value: Value,
        environment: &mut Environment<'_>,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExpressionKind::Identifier(name) => {
                environment.store(name.clone(), value);
                Ok(())
            }
            ExpressionKind::Attribute { object, name } => {
                let object = self.eval_expression(object, environment)?;
                set_attribute(&object, name, value)
            }
            ExpressionKind::Index { object, index } => {
                let object = self.eval_expression(object, environment)?;
                let index = self.eval_expression(index, environment)?;
                ops::set_item(&object, index, value)
            }
            ExpressionKind::Tuple(targets) | ExpressionKind::List(targets) => {
                let values = value.iterate()?;
                if values.len() != targets.len() {
                    return Err(RuntimeError::UnpackMismatch {
                        expected: targets.len(),
                        found: values.len(),
                    });
                }
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, environment)?;
                }
                Ok(())
            }
            _ => Err(RuntimeError::UnsupportedOperation {
                operation: "assignment".to_string(),
                type_name: "expression".to_string(),
            }),
        }
    }

    fn eval_expression(
        &mut self,
        expr: &Expression,
        environment: &mut Environment<'_>,
    ) -> Result<Value, RuntimeError> {
        // Expression evaluation can recurse into calls, which may execute statements.
        match &expr.kind {
            ExpressionKind::Integer(value) => Ok(Value::Integer(*value)),
            ExpressionKind::Float(value) => Ok(Value::Float(*value)),
            ExpressionKind::String(value) => Ok(Value::String(value.clone())),
            ExpressionKind::Boolean(value) => Ok(Value::Boolean(*value)),
            ExpressionKind::None => Ok(Value::None),
            ExpressionKind::Identifier(name) => environment
                .load(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() }),
            ExpressionKind::List(items) => Ok(Value::list(self.eval_all(items, environment)?)),
            ExpressionKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items, environment)?)),
            ExpressionKind::Dict(entries) => {
                let dict = Value::dict(Vec::with_capacity(entries.len()));
                for (key, value) in entries {
                    let key = self.eval_expression(key, environment)?;
                    let value = self.eval_expression(value, environment)?;
                    ops::set_item(&dict, key, value)?;
                }
                Ok(dict)
            }
            ExpressionKind::Attribute { object, name } => {
                let object = self.eval_expression(object, environment)?;
                get_attribute(&object, name)
            }
            ExpressionKind::Index { object, index } => {
                let object = self.eval_expression(object, environment)?;
                let index = self.eval_expression(index, environment)?;
                ops::get_item(&object, &index)
            }
            ExpressionKind::Call { callee, args } => {
                let callee = self.eval_expression(callee, environment)?;
                let args = self.eval_all(args, environment)?;
                self.call_value(callee, args, environment)
            }
            ExpressionKind::BinaryOp { left, op, right } => {
                let left = self.eval_expression(left, environment)?;
                let right = self.eval_expression(right, environment)?;
                ops::binary(*op, &left, &right)
            }
            ExpressionKind::UnaryOp { op, operand } => {
                let operand = self.eval_expression(operand, environment)?;
                ops::unary(*op, &operand)
            }
            ExpressionKind::BoolOp { op, left, right } => {
                let left = self.eval_expression(left, environment)?;
                let short_circuits = match op {
                    BoolOperator::And => !left.is_truthy(),
                    BoolOperator::Or => left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval_expression(right, environment)
                }
            }
            ExpressionKind::Compare { left, comparisons } => {
                let mut left = self.eval_expression(left, environment)?;
                for (op, right) in comparisons {
                    let right = self.eval_expression(right, environment)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Boolean(false));
                    }
                    left = right;
                }
                Ok(Value::Boolean(true))
            }
            ExpressionKind::Join { separator, values } => {
                let values = self.eval_all(values, environment)?;
                Ok(Value::String(join_output(&values, separator)))
            }
        }
    }

    fn eval_all(
        &mut self,
        exprs: &[Expression],
        environment: &mut Environment<'_>,
    ) -> Result<Vec<Value>, RuntimeError> {
        exprs
            .iter()
            .map(|expr| self.eval_expression(expr, environment))
            .collect()
    }

    fn call_value(
        &mut self,
        callee: Value,
        mut args: Vec<Value>,
        environment: &mut Environment<'_>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Builtin(builtin) => builtin.call(args, &mut self.output),
            Value::BuiltinMethod { receiver, method } => method.call(&receiver, args),
            Value::Function(function) => self.call_function(&function, args, environment),
            Value::BoundMethod { receiver, function } => {
                args.insert(0, Value::Instance(receiver));
                self.call_function(&function, args, environment)
            }
            Value::Class(class) => {
                let initializer = class.attributes.borrow().get("__init__").cloned();
                let instance = Rc::new(Instance {
                    class,
                    attributes: RefCell::new(FxHashMap::default()),
                });
                match initializer {
                    Some(Value::Function(function)) => {
                        args.insert(0, Value::Instance(Rc::clone(&instance)));
                        self.call_function(&function, args, environment)?;
                    }
                    _ => RuntimeError::expect_arity(&instance.class.name, 0, args.len())?,
                }
                Ok(Value::Instance(instance))
            }
            other => Err(RuntimeError::ObjectNotCallable {
                type_name: other.describe_type(),
            }),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        environment: &mut Environment<'_>,
    ) -> Result<Value, RuntimeError> {
        RuntimeError::expect_arity(&function.name, function.params.len(), args.len())?;
        if self.depth >= self.recursion_limit {
            return Err(RuntimeError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }

        let mut local_scope = function
            .params
            .iter()
            .cloned()
            .zip(args)
            .collect::<FxHashMap<_, _>>();
        let mut local_environment = environment.child(&mut local_scope, ScopeKind::Function);

        self.depth += 1;
        let result = self.exec_block(&function.body, &mut local_environment);
        self.depth -= 1;

        Ok(result?.outside_loop()?.unwrap_or(Value::None))
    }
}

/// `+=` on a list extends it in place; every other operator rebinds.
fn augmented(op: BinaryOperator, current: Value, operand: &Value) -> Result<Value, RuntimeError> {
    if op == BinaryOperator::Add
        && let Value::List(values) = &current
    {
        let items = operand.iterate()?;
        values.borrow_mut().extend(items);
        return Ok(current);
    }
    ops::binary(op, &current, operand)
}

fn get_attribute(object: &Value, name: &str) -> Result<Value, RuntimeError> {
    let found = match object {
        Value::Instance(instance) => instance.get_attribute(name),
        Value::Class(class) => class.attributes.borrow().get(name).cloned(),
        other => BuiltinMethod::lookup(other, name).map(|method| Value::BuiltinMethod {
            receiver: Box::new(other.clone()),
            method,
        }),
    };
    found.ok_or_else(|| RuntimeError::UnknownAttribute {
        attribute: name.to_string(),
        type_name: object.describe_type(),
    })
}

fn set_attribute(object: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Instance(instance) => {
            instance.attributes.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Class(class) => {
            class.attributes.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::UnsupportedOperation {
            operation: "attribute assignment".to_string(),
            type_name: other.describe_type(),
        }),
    }
}
