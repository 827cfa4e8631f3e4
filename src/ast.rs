//! Shared syntax tree for the synthesizer and the interpreter.
//!
//! The parser builds these nodes once, the synthesizer rewrites statement
//! lists (inserting [`StatementKind::Record`] nodes), and the interpreter walks
//! the result directly.

mod render;

pub(crate) use render::{format_float, quote_string};

/// 1-based line and 0-based column of the first token of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Ordering key used when merging recorder calls into a block.
pub type SortKey = (usize, i64);

#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn identifier(name: impl Into<String>, position: Position) -> Self {
        Self::new(ExpressionKind::Identifier(name.into()), position)
    }

    pub fn line(&self) -> usize {
        self.position.line
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExpressionKind {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    None,
    Identifier(String),
    List(Vec<Expression>),
    Tuple(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    BoolOp {
        op: BoolOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `left op1 right1 op2 right2 ...`, evaluated pairwise with short-circuit.
    Compare {
        left: Box<Expression>,
        comparisons: Vec<(CompareOperator, Expression)>,
    },
    /// Synthesized only: the values rendered as `print` would, joined by
    /// `separator`.
    Join {
        separator: String,
        values: Vec<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompareOperator {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Less => "<",
            CompareOperator::LessEqual => "<=",
            CompareOperator::Greater => ">",
            CompareOperator::GreaterEqual => ">=",
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
        }
    }
}

/// Label stored next to a recorded value.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Label {
    /// A bare identifier read.
    Name(String),
    /// A dotted attribute path such as `a.b.c`.
    Path(String),
    /// Conditions, comparisons and aggregate output.
    Unlabeled,
}

impl Label {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Label::Name(name) | Label::Path(name) => Some(name),
            Label::Unlabeled => None,
        }
    }
}

/// Where a recorder call takes its value from when it runs.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Capture {
    /// Evaluates `value` in the current environment.
    #[default]
    Read,
    /// The value the enclosing `if` or `while` just tested.
    Condition,
    /// The arguments the `print` statement at the same position just wrote.
    Output,
}

/// Appends `(label, value)` to the history of `line` when executed.
#[derive(Debug, PartialEq, Clone)]
pub struct RecorderCall {
    pub line: usize,
    pub label: Label,
    pub value: Expression,
    pub capture: Capture,
}

impl RecorderCall {
    pub fn reusing(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    /// Sorts after every node of `line` and before every node of the next line.
    pub fn sort_key(&self) -> SortKey {
        (self.line + 1, -1)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    /// `None` for statements built without source text.
    pub position: Option<Position>,
}

impl Statement {
    pub fn new(kind: StatementKind, position: Position) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    pub fn unpositioned(kind: StatementKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn record(call: RecorderCall) -> Self {
        Self::unpositioned(StatementKind::Record(call))
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        match &self.kind {
            StatementKind::Record(call) => Some(call.sort_key()),
            _ => self.position.map(|position| {
                (
                    position.line,
                    i64::try_from(position.column).unwrap_or(i64::MAX),
                )
            }),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    ClassDef {
        name: String,
        body: Vec<Statement>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Statement>,
    },
    /// `t1 = t2 = ... = value`; targets are assigned left to right.
    Assign {
        targets: Vec<Expression>,
        value: Expression,
    },
    AugAssign {
        target: Expression,
        op: BinaryOperator,
        value: Expression,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        target: Expression,
        iterable: Expression,
        body: Vec<Statement>,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    Return(Option<Expression>),
    Pass,
    Break,
    Continue,
    Expr(Expression),
    /// Synthesized only.
    Record(RecorderCall),
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}
