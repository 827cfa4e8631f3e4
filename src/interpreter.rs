use rustc_hash::FxHashMap;

use crate::ast::Program;
use crate::backend::Backend;
use crate::history::HistoryStore;

mod error;
pub(crate) mod ops;
mod runtime;
mod value;

pub use error::RuntimeError;
use runtime::{Environment, InterpreterRuntime};
pub use value::{Class, Function, Instance, Value};

pub const DEFAULT_RECURSION_LIMIT: usize = 200;

/// AST-walking backend that executes programs directly.
#[derive(Debug, Clone)]
pub struct Interpreter {
    recursion_limit: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_recursion_limit(DEFAULT_RECURSION_LIMIT)
    }

    pub fn with_recursion_limit(recursion_limit: usize) -> Self {
        Self { recursion_limit }
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn execute(&self, program: &Program, store: &mut HistoryStore) -> Result<String, RuntimeError> {
        // Execution pipeline:
        // execute -> exec_block (top-level statements) -> exec_statement
        // -> eval_expression -> call_value -> exec_block (function body).
        let mut globals = FxHashMap::default();
        let mut environment = Environment::top_level(&mut globals);
        let mut runtime = InterpreterRuntime {
            store,
            output: Vec::new(),
            recursion_limit: self.recursion_limit(),
            depth: 0,
            conditions: FxHashMap::default(),
            printed: FxHashMap::default(),
        };
        let result = runtime.exec_block(&program.statements, &mut environment)?;
        if result.outside_loop()?.is_some() {
            return Err(RuntimeError::ReturnOutsideFunction);
        }
        Ok(runtime.output.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        BinaryOperator, Capture, CompareOperator, Expression, ExpressionKind, Label, Position,
        RecorderCall, Statement, StatementKind,
    };
    use crate::parser::parse;
    use indoc::indoc;
    use std::num::NonZeroUsize;

    fn expr(kind: ExpressionKind) -> Expression {
        Expression::new(kind, Position::default())
    }

    fn identifier(name: &str) -> Expression {
        Expression::identifier(name, Position::default())
    }

    fn int(value: i64) -> Expression {
        expr(ExpressionKind::Integer(value))
    }

    fn string(value: &str) -> Expression {
        expr(ExpressionKind::String(value.to_string()))
    }

    fn call(name: &str, args: Vec<Expression>) -> Expression {
        expr(ExpressionKind::Call {
            callee: Box::new(identifier(name)),
            args,
        })
    }

    fn statement(kind: StatementKind) -> Statement {
        Statement::unpositioned(kind)
    }

    fn assign(name: &str, value: Expression) -> Statement {
        statement(StatementKind::Assign {
            targets: vec![identifier(name)],
            value,
        })
    }

    fn print(args: Vec<Expression>) -> Statement {
        statement(StatementKind::Expr(call("print", args)))
    }

    fn store() -> HistoryStore {
        HistoryStore::new(NonZeroUsize::new(10).expect("non-zero"))
    }

    fn run_program(program: &Program) -> Result<String, RuntimeError> {
        Interpreter::new().execute(program, &mut store())
    }

    fn run_source(source: &str) -> Result<String, RuntimeError> {
        let program = parse(source).expect("parse failed");
        run_program(&program)
    }

    #[test]
    fn evaluates_assignment_and_call() {
        let program = Program {
            statements: vec![
                assign(
                    "n",
                    expr(ExpressionKind::BinaryOp {
                        left: Box::new(int(1)),
                        op: BinaryOperator::Add,
                        right: Box::new(int(2)),
                    }),
                ),
                print(vec![identifier("n")]),
            ],
        };

        let output = run_program(&program).expect("run failed");
        assert_eq!(output, "3");
    }

    #[test]
    fn executes_if_else_branches() {
        let branch = |condition: bool| {
            statement(StatementKind::If {
                condition: expr(ExpressionKind::Boolean(condition)),
                then_body: vec![print(vec![string("then")])],
                else_body: vec![print(vec![string("else")])],
            })
        };
        let program = Program {
            statements: vec![branch(true), branch(false)],
        };

        let output = run_program(&program).expect("run failed");
        assert_eq!(output, "then\nelse");
    }

    #[test]
    fn executes_while_loop_until_condition_is_false() {
        let program = Program {
            statements: vec![
                assign("n", int(0)),
                statement(StatementKind::While {
                    condition: expr(ExpressionKind::Compare {
                        left: Box::new(identifier("n")),
                        comparisons: vec![(CompareOperator::Less, int(3))],
                    }),
                    body: vec![statement(StatementKind::AugAssign {
                        target: identifier("n"),
                        op: BinaryOperator::Add,
                        value: int(1),
                    })],
                }),
                print(vec![identifier("n")]),
            ],
        };

        let output = run_program(&program).expect("run failed");
        assert_eq!(output, "3");
    }

    #[test]
    fn records_values_into_bound_store() {
        let program = Program {
            statements: vec![
                assign("a", int(5)),
                Statement::record(RecorderCall {
                    line: 1,
                    label: Label::Name("a".to_string()),
                    value: identifier("a"),
                    capture: Capture::Read,
                }),
                Statement::record(RecorderCall {
                    line: 2,
                    label: Label::Unlabeled,
                    value: expr(ExpressionKind::Join {
                        separator: " ".to_string(),
                        values: vec![string("a ="), identifier("a")],
                    }),
                    capture: Capture::Read,
                }),
            ],
        };

        let mut store = store();
        Interpreter::new()
            .execute(&program, &mut store)
            .expect("run failed");
        let history = store.into_history();
        assert_eq!(history[&1][0].label.as_deref(), Some("a"));
        assert_eq!(history[&1][0].value, Value::Integer(5));
        assert_eq!(history[&2][0].label, None);
        assert_eq!(history[&2][0].value, Value::from("a = 5"));
    }

    #[test]
    fn recorded_containers_are_not_changed_by_later_mutation() {
        let program = parse(indoc! {"
            values = [1]
            values.append(2)
        "})
        .expect("parse failed");
        let mut statements = program.statements;
        statements.insert(
            1,
            Statement::record(RecorderCall {
                line: 1,
                label: Label::Name("values".to_string()),
                value: identifier("values"),
                capture: Capture::Read,
            }),
        );

        let mut store = store();
        Interpreter::new()
            .execute(&Program { statements }, &mut store)
            .expect("run failed");
        assert_eq!(store.snapshot()[&1][0].value.repr(), "[1]");
    }

    #[test]
    fn returns_from_function_without_executing_remaining_body() {
        let output = run_source(indoc! {"
            def f():
                return 7
                print('unreachable')
            print(f())
        "})
        .expect("run failed");
        assert_eq!(output, "7");
    }

    #[test]
    fn function_locals_do_not_leak_into_globals() {
        let error = run_source(indoc! {"
            def f():
                x = 42
                return
            f()
            print(x)
        "})
        .expect_err("expected undefined variable");
        assert_eq!(
            error,
            RuntimeError::UndefinedVariable {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn errors_on_control_flow_outside_its_construct() {
        assert_eq!(
            run_source("return 1\n").expect_err("expected return outside function"),
            RuntimeError::ReturnOutsideFunction
        );
        assert_eq!(
            run_source("break\n").expect_err("expected break outside loop"),
            RuntimeError::LoopControlOutsideLoop { keyword: "break" }
        );
        assert_eq!(
            run_source("def f():\n    continue\nf()\n").expect_err("expected continue outside loop"),
            RuntimeError::LoopControlOutsideLoop {
                keyword: "continue"
            }
        );
    }

    #[test]
    fn errors_on_invalid_call_and_undefined_name() {
        let program = Program {
            statements: vec![statement(StatementKind::Expr(expr(ExpressionKind::Call {
                callee: Box::new(int(1)),
                args: vec![],
            })))],
        };
        assert_eq!(
            run_program(&program).expect_err("expected call target error"),
            RuntimeError::ObjectNotCallable {
                type_name: "int".to_string()
            }
        );

        assert_eq!(
            run_source("missing()\n").expect_err("expected undefined name error"),
            RuntimeError::UndefinedVariable {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn local_names_shadow_builtins_and_functions() {
        let error = run_source(indoc! {"
            def f():
                return 7
            print = 1
            print()
        "})
        .expect_err("expected object not callable error");
        assert_eq!(
            error,
            RuntimeError::ObjectNotCallable {
                type_name: "int".to_string()
            }
        );
    }

    #[test]
    fn errors_when_function_called_with_wrong_arity() {
        let error = run_source("def f(x):\n    pass\nf()\n").expect_err("expected argument mismatch");
        assert_eq!(
            error,
            RuntimeError::FunctionArityMismatch {
                name: "f".to_string(),
                expected: "1".to_string(),
                found: 0,
            }
        );
    }

    #[test]
    fn rejects_nested_function_definitions() {
        let error = run_source(indoc! {"
            def outer():
                def inner():
                    pass
            outer()
        "})
        .expect_err("expected nested def error");
        assert_eq!(error, RuntimeError::NestedFunctionDefinitionsUnsupported);
    }

    #[test]
    fn stops_runaway_recursion_at_the_limit() {
        let program = parse("def f(n):\n    return f(n + 1)\nf(0)\n").expect("parse failed");
        let error = Interpreter::with_recursion_limit(20)
            .execute(&program, &mut store())
            .expect_err("expected recursion limit");
        assert_eq!(error, RuntimeError::RecursionLimitExceeded { limit: 20 });
    }

    #[test]
    fn formats_print_output_for_boolean_string_and_none() {
        let output = run_source("def f():\n    pass\nprint(True, 'hello', f(), 2.0, (1,))\n")
            .expect("run failed");
        assert_eq!(output, "True hello None 2.0 (1,)");
    }

    #[test]
    fn clears_state_between_runs() {
        let interpreter = Interpreter::new();
        let first = parse("x = 1\nprint(x)\n").expect("parse failed");
        let second = parse("print(x)\n").expect("parse failed");

        let output = interpreter.execute(&first, &mut store()).expect("first run failed");
        assert_eq!(output, "1");
        let error = interpreter
            .execute(&second, &mut store())
            .expect_err("expected globals to be cleared between runs");
        assert_eq!(
            error,
            RuntimeError::UndefinedVariable {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn recursion_and_multiple_arguments() {
        let output = run_source(indoc! {"
            def fact(n):
                if n <= 1:
                    return 1
                return n * fact(n - 1)
            def add(a, b):
                return a + b
            print(fact(5), add(4, 5))
        "})
        .expect("run failed");
        assert_eq!(output, "120 9");
    }

    #[test]
    fn supports_containers_indexing_and_unpacking() {
        let output = run_source(indoc! {"
            values = [1, 2]
            values[1] = 7
            alias = values
            values += [8]
            first, (second, third) = values[0], (values[1], values[-1])
            table = {'a': 1}
            table['b'] = first + third
            print(values, alias is values, second, table)
            print(len(values), 'b' in table, table.get('z', 0))
        "})
        .expect("run failed");
        assert_eq!(output, "[1, 7, 8] True 7 {'a': 1, 'b': 9}\n3 True 0");
    }

    #[test]
    fn iterates_with_for_break_and_continue() {
        let output = run_source(indoc! {"
            total = 0
            for i in range(10):
                if i % 2 == 0:
                    continue
                if i > 7:
                    break
                total += i
            print(total)
        "})
        .expect("run failed");
        assert_eq!(output, "16");
    }

    #[test]
    fn supports_classes_methods_and_attributes() {
        let output = run_source(indoc! {"
            class Counter:
                start = 10
                def __init__(self, step):
                    self.value = Counter.start
                    self.step = step
                def tick(self):
                    self.value += self.step
                    return self.value
            c = Counter(5)
            c.tick()
            print(c.tick(), c.value, Counter.start)
        "})
        .expect("run failed");
        assert_eq!(output, "20 20 10");
    }

    #[test]
    fn reports_unpack_mismatch() {
        let error = run_source("a, b = 1, 2, 3\n").expect_err("expected unpack error");
        assert_eq!(
            error,
            RuntimeError::UnpackMismatch {
                expected: 2,
                found: 3
            }
        );
    }
}
