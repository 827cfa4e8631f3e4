//! Python-like source rendering of the syntax tree.
//!
//! Recorder calls render as the listing append they stand for, so an
//! instrumented program reads like the code a user could have written by hand.

use std::fmt::{self, Display, Formatter, Write};

use super::{
    BinaryOperator, BoolOperator, Expression, ExpressionKind, Label, Program, RecorderCall,
    Statement, StatementKind, UnaryOperator,
};

const INDENT: &str = "    ";
const LISTING: &str = "__livesource_listing";

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write_statement(f, statement, 0)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expression(f, self, 0)
    }
}

impl Display for RecorderCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{LISTING}[{}].append((", self.line)?;
        match &self.label {
            Label::Name(label) | Label::Path(label) => f.write_str(&quote_string(label))?,
            Label::Unlabeled => f.write_str("None")?,
        }
        write!(f, ", {}))", self.value)
    }
}

/// Renders a statement-level expression, dropping the parentheses of tuples
/// with two or more elements (`a, b = b, a`).
struct Bare<'a>(&'a Expression);

impl Display for Bare<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExpressionKind::Tuple(items) if items.len() > 1 => write_list(f, items),
            _ => write_expression(f, self.0, 0),
        }
    }
}

fn write_block(f: &mut Formatter<'_>, statements: &[Statement], depth: usize) -> fmt::Result {
    if statements.is_empty() {
        return writeln!(f, "{}pass", INDENT.repeat(depth));
    }
    for statement in statements {
        write_statement(f, statement, depth)?;
    }
    Ok(())
}

fn write_statement(f: &mut Formatter<'_>, statement: &Statement, depth: usize) -> fmt::Result {
    let indent = INDENT.repeat(depth);
    match &statement.kind {
        StatementKind::ClassDef { name, body } => {
            writeln!(f, "{indent}class {name}:")?;
            write_block(f, body, depth + 1)
        }
        StatementKind::FunctionDef { name, params, body } => {
            writeln!(f, "{indent}def {name}({}):", params.join(", "))?;
            write_block(f, body, depth + 1)
        }
        StatementKind::Assign { targets, value } => {
            f.write_str(&indent)?;
            for target in targets {
                write!(f, "{} = ", Bare(target))?;
            }
            writeln!(f, "{}", Bare(value))
        }
        StatementKind::AugAssign { target, op, value } => {
            writeln!(f, "{indent}{target} {}= {}", op.symbol(), Bare(value))
        }
        StatementKind::While { condition, body } => {
            writeln!(f, "{indent}while {condition}:")?;
            write_block(f, body, depth + 1)
        }
        StatementKind::For {
            target,
            iterable,
            body,
        } => {
            writeln!(f, "{indent}for {} in {}:", Bare(target), Bare(iterable))?;
            write_block(f, body, depth + 1)
        }
        StatementKind::If {
            condition,
            then_body,
            else_body,
        } => {
            writeln!(f, "{indent}if {condition}:")?;
            write_block(f, then_body, depth + 1)?;
            if !else_body.is_empty() {
                writeln!(f, "{indent}else:")?;
                write_block(f, else_body, depth + 1)?;
            }
            Ok(())
        }
        StatementKind::Return(Some(value)) => writeln!(f, "{indent}return {}", Bare(value)),
        StatementKind::Return(None) => writeln!(f, "{indent}return"),
        StatementKind::Pass => writeln!(f, "{indent}pass"),
        StatementKind::Break => writeln!(f, "{indent}break"),
        StatementKind::Continue => writeln!(f, "{indent}continue"),
        StatementKind::Expr(expr) => writeln!(f, "{indent}{expr}"),
        StatementKind::Record(call) => writeln!(f, "{indent}{call}"),
    }
}

fn precedence(kind: &ExpressionKind) -> u8 {
    match kind {
        ExpressionKind::BoolOp {
            op: BoolOperator::Or,
            ..
        } => 1,
        ExpressionKind::BoolOp {
            op: BoolOperator::And,
            ..
        } => 2,
        ExpressionKind::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => 3,
        ExpressionKind::Compare { .. } => 4,
        ExpressionKind::BinaryOp {
            op: BinaryOperator::Add | BinaryOperator::Sub,
            ..
        } => 5,
        ExpressionKind::BinaryOp { .. } => 6,
        ExpressionKind::UnaryOp { .. } => 7,
        ExpressionKind::Attribute { .. }
        | ExpressionKind::Index { .. }
        | ExpressionKind::Call { .. }
        | ExpressionKind::Join { .. } => 8,
        _ => 9,
    }
}

fn write_expression(f: &mut Formatter<'_>, expr: &Expression, min_precedence: u8) -> fmt::Result {
    if precedence(&expr.kind) < min_precedence {
        f.write_char('(')?;
        write_unparenthesized(f, expr)?;
        f.write_char(')')
    } else {
        write_unparenthesized(f, expr)
    }
}

fn write_unparenthesized(f: &mut Formatter<'_>, expr: &Expression) -> fmt::Result {
    let own = precedence(&expr.kind);
    match &expr.kind {
        ExpressionKind::Integer(value) => write!(f, "{value}"),
        ExpressionKind::Float(value) => f.write_str(&format_float(*value)),
        ExpressionKind::String(value) => f.write_str(&quote_string(value)),
        ExpressionKind::Boolean(true) => f.write_str("True"),
        ExpressionKind::Boolean(false) => f.write_str("False"),
        ExpressionKind::None => f.write_str("None"),
        ExpressionKind::Identifier(name) => f.write_str(name),
        ExpressionKind::List(items) => {
            f.write_char('[')?;
            write_list(f, items)?;
            f.write_char(']')
        }
        ExpressionKind::Tuple(items) => write_tuple(f, items),
        ExpressionKind::Dict(entries) => {
            f.write_char('{')?;
            for (index, (key, value)) in entries.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            f.write_char('}')
        }
        ExpressionKind::Attribute { object, name } => {
            write_expression(f, object, own)?;
            write!(f, ".{name}")
        }
        ExpressionKind::Index { object, index } => {
            write_expression(f, object, own)?;
            write!(f, "[{index}]")
        }
        ExpressionKind::Call { callee, args } => {
            write_expression(f, callee, own)?;
            f.write_char('(')?;
            write_list(f, args)?;
            f.write_char(')')
        }
        ExpressionKind::BinaryOp { left, op, right } => {
            write_expression(f, left, own)?;
            write!(f, " {} ", op.symbol())?;
            write_expression(f, right, own + 1)
        }
        ExpressionKind::UnaryOp { op, operand } => {
            match op {
                UnaryOperator::Not => f.write_str("not ")?,
                UnaryOperator::Neg => f.write_char('-')?,
                UnaryOperator::Pos => f.write_char('+')?,
            }
            write_expression(f, operand, own)
        }
        ExpressionKind::BoolOp { op, left, right } => {
            write_expression(f, left, own)?;
            f.write_str(match op {
                BoolOperator::And => " and ",
                BoolOperator::Or => " or ",
            })?;
            write_expression(f, right, own + 1)
        }
        ExpressionKind::Compare { left, comparisons } => {
            write_expression(f, left, own + 1)?;
            for (op, right) in comparisons {
                write!(f, " {} ", op.symbol())?;
                write_expression(f, right, own + 1)?;
            }
            Ok(())
        }
        ExpressionKind::Join { separator, values } => {
            write!(f, "{}.join(map(str, ", quote_string(separator))?;
            write_tuple(f, values)?;
            f.write_str("))")
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write_expression(f, item, 0)?;
    }
    Ok(())
}

fn write_tuple(f: &mut Formatter<'_>, items: &[Expression]) -> fmt::Result {
    f.write_char('(')?;
    write_list(f, items)?;
    if items.len() == 1 {
        f.write_char(',')?;
    }
    f.write_char(')')
}

/// Formats a float the way Python's `repr` does for common values.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        (if value > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Quotes a string the way Python's `repr` does.
pub(crate) fn quote_string(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push(quote);
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_floats_like_python_repr() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn quotes_strings_like_python_repr() {
        assert_eq!(quote_string("abc"), "'abc'");
        assert_eq!(quote_string("it's"), "\"it's\"");
        assert_eq!(quote_string("a\nb"), "'a\\nb'");
        assert_eq!(quote_string("'\""), "'\\'\"'");
    }
}
