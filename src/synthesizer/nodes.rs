//! Constructors for the nodes the synthesizer inserts.

use crate::ast::{Capture, Expression, ExpressionKind, Label, Position, RecorderCall};

pub const PRINT_SEPARATOR: &str = " ";

pub fn make_recorder_call(line: usize, label: Label, value: Expression) -> RecorderCall {
    RecorderCall {
        line,
        label,
        value,
        capture: Capture::Read,
    }
}

/// `a.b.c` for an attribute chain rooted at an identifier, `None` otherwise.
pub fn make_dotted_label(expr: &Expression) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = expr;
    loop {
        match &current.kind {
            ExpressionKind::Attribute { object, name } => {
                parts.push(name.as_str());
                current = object.as_ref();
            }
            ExpressionKind::Identifier(root) => {
                parts.push(root.as_str());
                break;
            }
            _ => return None,
        }
    }
    parts.reverse();
    Some(parts.join("."))
}

/// The values joined as `print` would write them.
pub fn make_aggregate_expr(values: Vec<Expression>, position: Position) -> Expression {
    Expression::new(
        ExpressionKind::Join {
            separator: PRINT_SEPARATOR.to_string(),
            values,
        },
        position,
    )
}
