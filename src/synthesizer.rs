//! Rewrites a program so that running it records observed values.
//!
//! Statements are visited block by block. Recorder calls discovered inside a
//! block are merged back into that block and sorted by source position, so
//! each one runs right after the line that produced its value. Branch and loop
//! conditions (and loop targets) are recorded at the top of their body instead.

use tracing::{debug, warn};

use crate::ast::{
    Capture, Expression, ExpressionKind, Label, Program, RecorderCall, Statement, StatementKind,
};

mod nodes;
mod pending;

pub use nodes::{PRINT_SEPARATOR, make_aggregate_expr, make_dotted_label, make_recorder_call};
use pending::PendingStack;

/// Returns `program` with recorder calls inserted after the statements whose
/// values they observe.
pub fn synthesize(program: Program) -> Program {
    let mut pending = PendingStack::default();
    let statements = block_visit(program.statements, &mut pending);
    debug!(
        statements = statements.len(),
        recorders = pending.emitted(),
        "synthesized instrumented program"
    );
    Program { statements }
}

fn block_visit(statements: Vec<Statement>, pending: &mut PendingStack) -> Vec<Statement> {
    pending.push_frame();
    let mut visited = Vec::with_capacity(statements.len());
    let mut boundaries = Vec::with_capacity(statements.len());
    for statement in statements {
        visited.push(visit_statement(statement, pending));
        boundaries.push(pending.current_len());
    }
    let calls = pending.pop_frame();
    merge(visited, &boundaries, calls)
}

/// Sorts recorder calls in among the statements by `(line, column)`.
///
/// A block with an unpositioned statement cannot be ordered that way; it keeps
/// its order and each statement is followed by its own calls.
fn merge(
    statements: Vec<Statement>,
    boundaries: &[usize],
    calls: Vec<RecorderCall>,
) -> Vec<Statement> {
    if calls.is_empty() {
        return statements;
    }

    if statements.iter().all(|statement| statement.sort_key().is_some()) {
        let mut merged = statements;
        merged.extend(calls.into_iter().map(Statement::record));
        merged.sort_by_key(|statement| statement.sort_key());
        return merged;
    }

    warn!(
        statements = statements.len(),
        "block has statements without a source position; keeping statement order"
    );
    let mut merged = Vec::with_capacity(statements.len() + calls.len());
    let mut calls = calls.into_iter();
    let mut start = 0;
    for (statement, &end) in statements.into_iter().zip(boundaries) {
        merged.push(statement);
        merged.extend(calls.by_ref().take(end - start).map(Statement::record));
        start = end;
    }
    merged
}

fn visit_statement(statement: Statement, pending: &mut PendingStack) -> Statement {
    let Statement { kind, position } = statement;
    let kind = match kind {
        StatementKind::Assign { targets, value } => {
            for target in &targets {
                visit_field(target, pending);
            }
            StatementKind::Assign { targets, value }
        }
        StatementKind::AugAssign { target, op, value } => {
            visit_field(&target, pending);
            StatementKind::AugAssign { target, op, value }
        }
        StatementKind::If {
            condition,
            then_body,
            else_body,
        } => {
            let then_body = block_visit(then_body, pending);
            let else_body = block_visit(else_body, pending);
            let line = position.map_or(condition.line(), |position| position.line);
            let then_body = prepend_condition(line, &condition, then_body, pending);
            StatementKind::If {
                condition,
                then_body,
                else_body,
            }
        }
        StatementKind::While { condition, body } => {
            let body = block_visit(body, pending);
            let line = position.map_or(condition.line(), |position| position.line);
            let body = prepend_condition(line, &condition, body, pending);
            StatementKind::While { condition, body }
        }
        StatementKind::For {
            target,
            iterable,
            body,
        } => {
            let body = block_visit(body, pending);
            pending.push_frame();
            visit_field(&target, pending);
            let body = prepend_calls(pending.pop_frame(), body);
            StatementKind::For {
                target,
                iterable,
                body,
            }
        }
        StatementKind::FunctionDef { name, params, body } => StatementKind::FunctionDef {
            name,
            params,
            body: block_visit(body, pending),
        },
        StatementKind::ClassDef { name, body } => StatementKind::ClassDef {
            name,
            body: block_visit(body, pending),
        },
        StatementKind::Return(Some(value)) => {
            visit_field(&value, pending);
            StatementKind::Return(Some(value))
        }
        StatementKind::Expr(expr) => {
            if let Some(args) = print_arguments(&expr) {
                let line = position.map_or(expr.line(), |position| position.line);
                let joined = make_aggregate_expr(args.to_vec(), expr.position);
                pending.push(
                    make_recorder_call(line, Label::Unlabeled, joined).reusing(Capture::Output),
                );
            }
            StatementKind::Expr(expr)
        }
        other => other,
    };
    Statement { kind, position }
}

fn prepend_condition(
    line: usize,
    condition: &Expression,
    body: Vec<Statement>,
    pending: &mut PendingStack,
) -> Vec<Statement> {
    pending.push_frame();
    pending.push(
        make_recorder_call(line, Label::Unlabeled, condition.clone()).reusing(Capture::Condition),
    );
    prepend_calls(pending.pop_frame(), body)
}

fn prepend_calls(calls: Vec<RecorderCall>, body: Vec<Statement>) -> Vec<Statement> {
    calls.into_iter().map(Statement::record).chain(body).collect()
}

/// Arguments of a `print(...)` call.
fn print_arguments(expr: &Expression) -> Option<&[Expression]> {
    match &expr.kind {
        ExpressionKind::Call { callee, args }
            if matches!(&callee.kind, ExpressionKind::Identifier(name) if name == "print") =>
        {
            Some(args)
        }
        _ => None,
    }
}

/// Pushes a recorder call for every observable expression reachable from `expr`.
fn visit_field(expr: &Expression, pending: &mut PendingStack) {
    match &expr.kind {
        ExpressionKind::Identifier(name) => {
            pending.push(make_recorder_call(
                expr.line(),
                Label::Name(name.clone()),
                expr.clone(),
            ));
        }
        ExpressionKind::Attribute { object, .. } => match make_dotted_label(expr) {
            Some(path) => {
                pending.push(make_recorder_call(expr.line(), Label::Path(path), expr.clone()));
            }
            None => visit_field(object, pending),
        },
        // Captured whole; operands are not recorded separately.
        ExpressionKind::Compare { .. } => {
            pending.push(make_recorder_call(expr.line(), Label::Unlabeled, expr.clone()));
        }
        ExpressionKind::Tuple(items) | ExpressionKind::List(items) => {
            for item in items {
                visit_field(item, pending);
            }
        }
        ExpressionKind::Dict(entries) => {
            for (key, value) in entries {
                visit_field(key, pending);
                visit_field(value, pending);
            }
        }
        ExpressionKind::Index { object, index } => {
            visit_field(object, pending);
            visit_field(index, pending);
        }
        ExpressionKind::Call { args, .. } => {
            for arg in args {
                visit_field(arg, pending);
            }
        }
        ExpressionKind::BinaryOp { left, right, .. } | ExpressionKind::BoolOp { left, right, .. } => {
            visit_field(left, pending);
            visit_field(right, pending);
        }
        ExpressionKind::UnaryOp { operand, .. } => visit_field(operand, pending),
        ExpressionKind::Join { values, .. } => {
            for value in values {
                visit_field(value, pending);
            }
        }
        ExpressionKind::Integer(_)
        | ExpressionKind::Float(_)
        | ExpressionKind::String(_)
        | ExpressionKind::Boolean(_)
        | ExpressionKind::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;
    use crate::parser::parse;
    use indoc::indoc;

    fn rewrite(source: &str) -> String {
        synthesize(parse(source).expect("parse failed")).to_string()
    }

    #[test]
    fn records_single_assignment() {
        assert_eq!(
            rewrite("a = 1\n"),
            indoc! {"
                a = 1
                __livesource_listing[1].append(('a', a))
            "}
        );
    }

    #[test]
    fn records_each_line_after_its_statement() {
        assert_eq!(
            rewrite("a = 1\nb = 2\nc = 3\n"),
            indoc! {"
                a = 1
                __livesource_listing[1].append(('a', a))
                b = 2
                __livesource_listing[2].append(('b', b))
                c = 3
                __livesource_listing[3].append(('c', c))
            "}
        );
    }

    #[test]
    fn records_tuple_chained_and_swap_targets_in_order() {
        assert_eq!(
            rewrite("a, b, c = 1, 2, 3\n"),
            indoc! {"
                a, b, c = 1, 2, 3
                __livesource_listing[1].append(('a', a))
                __livesource_listing[1].append(('b', b))
                __livesource_listing[1].append(('c', c))
            "}
        );
        assert_eq!(
            rewrite("a = b = 1\n"),
            indoc! {"
                a = b = 1
                __livesource_listing[1].append(('a', a))
                __livesource_listing[1].append(('b', b))
            "}
        );
        assert_eq!(
            rewrite("a, b = b, a\n"),
            indoc! {"
                a, b = b, a
                __livesource_listing[1].append(('a', a))
                __livesource_listing[1].append(('b', b))
            "}
        );
    }

    #[test]
    fn nested_unpacking_records_each_leaf() {
        assert_eq!(
            rewrite("a, (b, [c, d]) = x\n"),
            indoc! {"
                a, (b, [c, d]) = x
                __livesource_listing[1].append(('a', a))
                __livesource_listing[1].append(('b', b))
                __livesource_listing[1].append(('c', c))
                __livesource_listing[1].append(('d', d))
            "}
        );
    }

    #[test]
    fn records_attribute_paths() {
        assert_eq!(
            rewrite("a.x = (2,)\na.x.y = [1, 2]\n"),
            indoc! {"
                a.x = (2,)
                __livesource_listing[1].append(('a.x', a.x))
                a.x.y = [1, 2]
                __livesource_listing[2].append(('a.x.y', a.x.y))
            "}
        );
    }

    #[test]
    fn unrooted_attribute_chains_record_their_operands() {
        assert_eq!(
            rewrite("f(y).x = 1\nitems[i].name = 2\n"),
            indoc! {"
                f(y).x = 1
                __livesource_listing[1].append(('y', y))
                items[i].name = 2
                __livesource_listing[2].append(('items', items))
                __livesource_listing[2].append(('i', i))
            "}
        );
    }

    #[test]
    fn records_augmented_assignment() {
        assert_eq!(
            rewrite("a += 1\nb -= 2\na.x *= 2\n"),
            indoc! {"
                a += 1
                __livesource_listing[1].append(('a', a))
                b -= 2
                __livesource_listing[2].append(('b', b))
                a.x *= 2
                __livesource_listing[3].append(('a.x', a.x))
            "}
        );
    }

    #[test]
    fn prepends_branch_and_loop_conditions() {
        assert_eq!(
            rewrite("if x:\n    pass\n"),
            indoc! {"
                if x:
                    __livesource_listing[1].append((None, x))
                    pass
            "}
        );
        assert_eq!(
            rewrite("while x < 3:\n    x += 1\n"),
            indoc! {"
                while x < 3:
                    __livesource_listing[1].append((None, x < 3))
                    x += 1
                    __livesource_listing[2].append(('x', x))
            "}
        );
    }

    #[test]
    fn nested_blocks_keep_their_calls() {
        assert_eq!(
            rewrite(indoc! {"
                a = 0
                if a:
                    b = 1
                elif c:
                    d = 2
                else:
                    e = 3
                f = 4
            "}),
            indoc! {"
                a = 0
                __livesource_listing[1].append(('a', a))
                if a:
                    __livesource_listing[2].append((None, a))
                    b = 1
                    __livesource_listing[3].append(('b', b))
                else:
                    if c:
                        __livesource_listing[4].append((None, c))
                        d = 2
                        __livesource_listing[5].append(('d', d))
                    else:
                        e = 3
                        __livesource_listing[7].append(('e', e))
                f = 4
                __livesource_listing[8].append(('f', f))
            "}
        );
    }

    #[test]
    fn records_print_output_as_one_joined_value() {
        assert_eq!(
            rewrite("print(a, 'b')\n"),
            indoc! {"
                print(a, 'b')
                __livesource_listing[1].append((None, ' '.join(map(str, (a, 'b')))))
            "}
        );
        assert_eq!(
            rewrite("log(a)\n"),
            "log(a)\n",
            "other calls are not observed"
        );
    }

    #[test]
    fn return_surfaces_nested_observables() {
        assert_eq!(
            rewrite(indoc! {"
                def f(a, b):
                    return a.x + g(b == 1)
            "}),
            indoc! {"
                def f(a, b):
                    return a.x + g(b == 1)
                    __livesource_listing[2].append(('a.x', a.x))
                    __livesource_listing[2].append((None, b == 1))
            "}
        );
    }

    #[test]
    fn records_loop_targets_and_class_bodies() {
        assert_eq!(
            rewrite(indoc! {"
                class Point:
                    origin = 0
                for i, p in pairs:
                    pass
            "}),
            indoc! {"
                class Point:
                    origin = 0
                    __livesource_listing[2].append(('origin', origin))
                for i, p in pairs:
                    __livesource_listing[3].append(('i', i))
                    __livesource_listing[3].append(('p', p))
                    pass
            "}
        );
    }

    #[test]
    fn same_line_statements_run_before_their_calls() {
        assert_eq!(
            rewrite("a = 1; b = 2\nc = a\n"),
            indoc! {"
                a = 1
                b = 2
                __livesource_listing[1].append(('a', a))
                __livesource_listing[1].append(('b', b))
                c = a
                __livesource_listing[2].append(('c', c))
            "}
        );
    }

    #[test]
    fn unpositioned_statements_keep_block_order() {
        let mut program = parse("a = 1\nb = 2\n").expect("parse failed");
        program.statements.insert(
            0,
            Statement::unpositioned(StatementKind::Assign {
                targets: vec![Expression::identifier("z", Position::new(9, 0))],
                value: Expression::new(ExpressionKind::Integer(0), Position::new(9, 4)),
            }),
        );

        let rewritten = synthesize(program);
        assert_eq!(
            rewritten.to_string(),
            indoc! {"
                z = 0
                __livesource_listing[9].append(('z', z))
                a = 1
                __livesource_listing[1].append(('a', a))
                b = 2
                __livesource_listing[2].append(('b', b))
            "}
        );
    }

    #[test]
    fn synthesis_is_deterministic_and_preserves_original_statements() {
        let source = indoc! {"
            x = [1, 2]
            while len(x) < 4:
                x.append(x[-1] * 2)
            print(x)
        "};
        let original = parse(source).expect("parse failed");
        let first = synthesize(original.clone());
        let second = synthesize(original.clone());
        assert_eq!(first, second);

        let without_recorders = first
            .statements
            .iter()
            .filter(|statement| !matches!(statement.kind, StatementKind::Record(_)))
            .count();
        assert_eq!(without_recorders, original.statements.len());

        let records = first
            .statements
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::Record(call) => Some(call),
                _ => None,
            })
            .collect::<Vec<&RecorderCall>>();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, Label::Name("x".to_string()));
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn conditions_and_output_reuse_evaluated_values() {
        let program = synthesize(
            parse("if x:\n    print(x)\n    y = x\n").expect("parse failed"),
        );
        let StatementKind::If { then_body, .. } = &program.statements[0].kind else {
            panic!("expected if statement");
        };
        let captures = then_body
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::Record(call) => Some(call.capture),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            captures,
            vec![Capture::Condition, Capture::Output, Capture::Read]
        );
    }
}
