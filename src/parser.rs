use crate::ast::{
    BinaryOperator, BoolOperator, CompareOperator, Expression, ExpressionKind, Position,
    Program, Statement, StatementKind, UnaryOperator,
};
use crate::lexer::tokenize;
use crate::token::{Span, Token, TokenKind};

mod error;

pub use error::{ParseError, ParseResult};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::EOF) {
            let span = tokens.last().map(|token| token.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            statements.extend(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    /// Parses one compound statement or one line of simple statements.
    fn parse_statement(&mut self) -> ParseResult<Vec<Statement>> {
        match self.current().kind {
            TokenKind::If => Ok(vec![self.parse_if()?]),
            TokenKind::While => Ok(vec![self.parse_while()?]),
            TokenKind::For => Ok(vec![self.parse_for()?]),
            TokenKind::Def => Ok(vec![self.parse_function_def()?]),
            TokenKind::Class => Ok(vec![self.parse_class_def()?]),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = vec![self.parse_small_statement()?];
        while self.eat(&TokenKind::Semicolon) {
            if self.at(&TokenKind::Newline) || self.at(&TokenKind::EOF) {
                break;
            }
            statements.push(self.parse_small_statement()?);
        }
        self.expect_newline()?;
        Ok(statements)
    }

    fn parse_small_statement(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        match self.current().kind {
            TokenKind::Pass => {
                self.advance();
                Ok(Statement::new(StatementKind::Pass, position))
            }
            TokenKind::Break => {
                self.advance();
                Ok(Statement::new(StatementKind::Break, position))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Statement::new(StatementKind::Continue, position))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.starts_expression() {
                    Some(self.parse_expression_list()?)
                } else {
                    None
                };
                Ok(Statement::new(StatementKind::Return(value), position))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        let first = self.parse_expression_list()?;

        if let Some(op) = augmented_operator(&self.current().kind) {
            self.advance();
            validate_augmented_target(&first)?;
            let value = self.parse_expression_list()?;
            return Ok(Statement::new(
                StatementKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                position,
            ));
        }

        if !self.at(&TokenKind::Equal) {
            return Ok(Statement::new(StatementKind::Expr(first), position));
        }

        let mut targets = vec![first];
        let value = loop {
            self.expect_equal()?;
            let next = self.parse_expression_list()?;
            if self.at(&TokenKind::Equal) {
                targets.push(next);
            } else {
                break next;
            }
        };
        for target in &targets {
            validate_target(target)?;
        }
        Ok(Statement::new(StatementKind::Assign { targets, value }, position))
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        self.advance(); // `if` or `elif`
        let condition = self.parse_expression()?;
        self.expect_colon()?;
        let then_body = self.parse_suite()?;

        let else_body = if self.at(&TokenKind::Elif) {
            vec![self.parse_if()?]
        } else if self.eat(&TokenKind::Else) {
            self.expect_colon()?;
            self.parse_suite()?
        } else {
            Vec::new()
        };

        Ok(Statement::new(
            StatementKind::If {
                condition,
                then_body,
                else_body,
            },
            position,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        self.advance();
        let condition = self.parse_expression()?;
        self.expect_colon()?;
        let body = self.parse_suite()?;
        Ok(Statement::new(
            StatementKind::While { condition, body },
            position,
        ))
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        self.advance();
        let target = self.parse_target_list()?;
        validate_target(&target)?;
        self.expect(&TokenKind::In, "'in'")?;
        let iterable = self.parse_expression_list()?;
        self.expect_colon()?;
        let body = self.parse_suite()?;
        Ok(Statement::new(
            StatementKind::For {
                target,
                iterable,
                body,
            },
            position,
        ))
    }

    fn parse_function_def(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect_colon()?;
        let body = self.parse_suite()?;
        Ok(Statement::new(
            StatementKind::FunctionDef { name, params, body },
            position,
        ))
    }

    fn parse_class_def(&mut self) -> ParseResult<Statement> {
        let position = self.current_position();
        self.advance();
        let name = self.expect_identifier()?;
        if self.eat(&TokenKind::LParen) {
            self.expect(&TokenKind::RParen, "')'")?;
        }
        self.expect_colon()?;
        let body = self.parse_suite()?;
        Ok(Statement::new(StatementKind::ClassDef { name, body }, position))
    }

    /// An indented block, or simple statements on the header line.
    fn parse_suite(&mut self) -> ParseResult<Vec<Statement>> {
        if !self.eat(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        self.expect(&TokenKind::Indent, "indented block")?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        self.expect(&TokenKind::Dedent, "dedent")?;
        Ok(body)
    }

    /// Comma-separated expressions; more than one (or a trailing comma) makes a tuple.
    fn parse_expression_list(&mut self) -> ParseResult<Expression> {
        let position = self.current_position();
        let first = self.parse_expression()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(Expression::new(ExpressionKind::Tuple(items), position))
    }

    /// Loop targets stop before `in`, so they are parsed at postfix level.
    fn parse_target_list(&mut self) -> ParseResult<Expression> {
        let position = self.current_position();
        let first = self.parse_postfix()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at(&TokenKind::In) {
                break;
            }
            items.push(self.parse_postfix()?);
        }
        Ok(Expression::new(ExpressionKind::Tuple(items), position))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            let position = expr.position;
            expr = Expression::new(
                ExpressionKind::BoolOp {
                    op: BoolOperator::Or,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            let position = expr.position;
            expr = Expression::new(
                ExpressionKind::BoolOp {
                    op: BoolOperator::And,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> ParseResult<Expression> {
        if !self.at(&TokenKind::Not) {
            return self.parse_comparison();
        }
        let position = self.current_position();
        self.advance();
        let operand = self.parse_not()?;
        Ok(Expression::new(
            ExpressionKind::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let left = self.parse_arithmetic()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.comparison_operator() {
            let right = self.parse_arithmetic()?;
            comparisons.push((op, right));
        }
        if comparisons.is_empty() {
            return Ok(left);
        }
        let position = left.position;
        Ok(Expression::new(
            ExpressionKind::Compare {
                left: Box::new(left),
                comparisons,
            },
            position,
        ))
    }

    /// Consumes a comparison operator, including the two-token `not in` and `is not`.
    fn comparison_operator(&mut self) -> Option<CompareOperator> {
        let op = match self.current().kind {
            TokenKind::Less => CompareOperator::Less,
            TokenKind::LessEqual => CompareOperator::LessEqual,
            TokenKind::Greater => CompareOperator::Greater,
            TokenKind::GreaterEqual => CompareOperator::GreaterEqual,
            TokenKind::EqualEqual => CompareOperator::Equal,
            TokenKind::NotEqual => CompareOperator::NotEqual,
            TokenKind::In => CompareOperator::In,
            TokenKind::Not if self.peek_kind() == &TokenKind::In => {
                self.advance();
                CompareOperator::NotIn
            }
            TokenKind::Is if self.peek_kind() == &TokenKind::Not => {
                self.advance();
                CompareOperator::IsNot
            }
            TokenKind::Is => CompareOperator::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_arithmetic(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::DoubleSlash => BinaryOperator::FloorDiv,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> ParseResult<Expression> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Neg,
            TokenKind::Plus => UnaryOperator::Pos,
            _ => return self.parse_postfix(),
        };
        let position = self.current_position();
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expression::new(
            ExpressionKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_atom()?;
        loop {
            let position = expr.position;
            if self.eat(&TokenKind::LParen) {
                let mut args = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    args.push(self.parse_expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                expr = Expression::new(
                    ExpressionKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    position,
                );
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_identifier()?;
                expr = Expression::new(
                    ExpressionKind::Attribute {
                        object: Box::new(expr),
                        name,
                    },
                    position,
                );
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expression_list()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expression::new(
                    ExpressionKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    position,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_atom(&mut self) -> ParseResult<Expression> {
        let token = self.advance();
        let position = position_of(token.span);
        let kind = match token.kind {
            TokenKind::Integer(value) => ExpressionKind::Integer(value),
            TokenKind::Float(value) => ExpressionKind::Float(value),
            TokenKind::String(value) => ExpressionKind::String(value.into_owned()),
            TokenKind::True => ExpressionKind::Boolean(true),
            TokenKind::False => ExpressionKind::Boolean(false),
            TokenKind::None => ExpressionKind::None,
            TokenKind::Identifier(name) => ExpressionKind::Identifier(name.to_string()),
            TokenKind::LParen => {
                if self.eat(&TokenKind::RParen) {
                    ExpressionKind::Tuple(Vec::new())
                } else {
                    let first = self.parse_expression()?;
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(&TokenKind::RParen, "')'")?;
                        return Ok(first);
                    }
                    let mut items = vec![first];
                    while !self.at(&TokenKind::RParen) {
                        items.push(self.parse_expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    ExpressionKind::Tuple(items)
                }
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while !self.at(&TokenKind::RBracket) {
                    items.push(self.parse_expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                ExpressionKind::List(items)
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    let key = self.parse_expression()?;
                    self.expect_colon()?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                ExpressionKind::Dict(entries)
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: other.to_string(),
                    line: token.span.line,
                    column: token.span.column,
                });
            }
        };
        Ok(Expression::new(kind, position))
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
        )
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.at(&TokenKind::Newline) {
            consumed = true;
            self.advance();
        }
        consumed
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current().kind {
            let name = name.to_string();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect_equal(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Equal, "'='").map(drop)
    }

    fn expect_colon(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Colon, "':'").map(drop)
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        if self.at(&TokenKind::EOF) {
            return Ok(());
        }
        self.expect(&TokenKind::Newline, "newline").map(drop)
    }

    fn expect(&mut self, kind: &TokenKind<'_>, expected: &str) -> ParseResult<Token<'a>> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn eat(&mut self, kind: &TokenKind<'_>) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at(&self, kind: &TokenKind<'_>) -> bool {
        self.current().kind == *kind
    }

    fn current(&self) -> &Token<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + 1).min(last)].kind
    }

    fn current_position(&self) -> Position {
        position_of(self.current().span)
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.to_string(),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

fn position_of(span: Span) -> Position {
    Position::new(span.line, span.column)
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    let position = left.position;
    Expression::new(
        ExpressionKind::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        position,
    )
}

fn augmented_operator(kind: &TokenKind<'_>) -> Option<BinaryOperator> {
    match kind {
        TokenKind::PlusEqual => Some(BinaryOperator::Add),
        TokenKind::MinusEqual => Some(BinaryOperator::Sub),
        TokenKind::StarEqual => Some(BinaryOperator::Mul),
        TokenKind::SlashEqual => Some(BinaryOperator::Div),
        TokenKind::DoubleSlashEqual => Some(BinaryOperator::FloorDiv),
        TokenKind::PercentEqual => Some(BinaryOperator::Mod),
        _ => None,
    }
}

fn describe_target(kind: &ExpressionKind) -> &'static str {
    match kind {
        ExpressionKind::Integer(_)
        | ExpressionKind::Float(_)
        | ExpressionKind::String(_)
        | ExpressionKind::Boolean(_)
        | ExpressionKind::None => "literal",
        ExpressionKind::Dict(_) => "dict literal",
        ExpressionKind::Call { .. } => "function call",
        ExpressionKind::Compare { .. } => "comparison",
        ExpressionKind::Tuple(_) => "tuple",
        ExpressionKind::List(_) => "list",
        _ => "expression",
    }
}

fn invalid_target(expr: &Expression) -> ParseError {
    ParseError::InvalidAssignmentTarget {
        target: describe_target(&expr.kind),
        line: expr.position.line,
        column: expr.position.column,
    }
}

fn validate_target(expr: &Expression) -> ParseResult<()> {
    match &expr.kind {
        ExpressionKind::Identifier(_)
        | ExpressionKind::Attribute { .. }
        | ExpressionKind::Index { .. } => Ok(()),
        ExpressionKind::Tuple(items) | ExpressionKind::List(items) => {
            items.iter().try_for_each(validate_target)
        }
        _ => Err(invalid_target(expr)),
    }
}

fn validate_augmented_target(expr: &Expression) -> ParseResult<()> {
    match &expr.kind {
        ExpressionKind::Identifier(_)
        | ExpressionKind::Attribute { .. }
        | ExpressionKind::Index { .. } => Ok(()),
        _ => Err(invalid_target(expr)),
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

/// Tokenizes and parses `input` in one step.
pub fn parse(input: &str) -> Result<Program, crate::Error> {
    let tokens = tokenize(input)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn at(line: usize, column: usize) -> Position {
        Position::new(line, column)
    }

    fn identifier(name: &str, line: usize, column: usize) -> Expression {
        Expression::identifier(name, at(line, column))
    }

    fn int(value: i64, line: usize, column: usize) -> Expression {
        Expression::new(ExpressionKind::Integer(value), at(line, column))
    }

    fn parse_ok(input: &str) -> Program {
        parse(input).expect("parse failed")
    }

    #[test]
    fn parses_simple_program() {
        let input = indoc! {"
            def fn():
                n = 4 + 4
                print(n)
            fn()
        "};
        let program = parse_ok(input);

        let expected = Program {
            statements: vec![
                Statement::new(
                    StatementKind::FunctionDef {
                        name: "fn".to_string(),
                        params: vec![],
                        body: vec![
                            Statement::new(
                                StatementKind::Assign {
                                    targets: vec![identifier("n", 2, 4)],
                                    value: binary(int(4, 2, 8), BinaryOperator::Add, int(4, 2, 12)),
                                },
                                at(2, 4),
                            ),
                            Statement::new(
                                StatementKind::Expr(Expression::new(
                                    ExpressionKind::Call {
                                        callee: Box::new(identifier("print", 3, 4)),
                                        args: vec![identifier("n", 3, 10)],
                                    },
                                    at(3, 4),
                                )),
                                at(3, 4),
                            ),
                        ],
                    },
                    at(1, 0),
                ),
                Statement::new(
                    StatementKind::Expr(Expression::new(
                        ExpressionKind::Call {
                            callee: Box::new(identifier("fn", 4, 0)),
                            args: vec![],
                        },
                        at(4, 0),
                    )),
                    at(4, 0),
                ),
            ],
        };

        assert_eq!(program, expected);
    }

    #[test]
    fn parses_chained_and_tuple_assignment_targets() {
        let program = parse_ok("a = b = 1\nx, (y, z) = 1, (2, 3)\n");
        let StatementKind::Assign { targets, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(
            targets,
            &vec![identifier("a", 1, 0), identifier("b", 1, 4)]
        );

        let StatementKind::Assign { targets, value } = &program.statements[1].kind else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 1);
        let ExpressionKind::Tuple(items) = &targets[0].kind else {
            panic!("expected tuple target");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1].kind, ExpressionKind::Tuple(_)));
        assert!(matches!(value.kind, ExpressionKind::Tuple(ref values) if values.len() == 2));
    }

    #[test]
    fn separates_simple_statements_on_one_line() {
        let program = parse_ok("a = 1; b = 2;\n");
        let positions = program
            .statements
            .iter()
            .map(|statement| statement.position)
            .collect::<Vec<_>>();
        assert_eq!(positions, vec![Some(at(1, 0)), Some(at(1, 7))]);
    }

    #[test]
    fn parses_inline_suites_and_elif_chains() {
        let program = parse_ok(indoc! {"
            if x: pass
            elif y:
                z = 1
            else: z = 2
        "});
        assert_eq!(program.statements.len(), 1);
        let StatementKind::If {
            then_body,
            else_body,
            ..
        } = &program.statements[0].kind
        else {
            panic!("expected if");
        };
        assert_eq!(then_body, &vec![Statement::new(StatementKind::Pass, at(1, 6))]);
        let [elif] = else_body.as_slice() else {
            panic!("expected a single elif");
        };
        assert_eq!(elif.position, Some(at(2, 0)));
        let StatementKind::If { else_body, .. } = &elif.kind else {
            panic!("expected nested if");
        };
        assert_eq!(else_body[0].position, Some(at(4, 6)));
    }

    #[test]
    fn respects_operator_precedence() {
        let program = parse_ok("r = not a + b * -c < d or e and f\n");
        let rendered = program.to_string();
        assert_eq!(rendered, "r = not a + b * -c < d or e and f\n");

        let StatementKind::Assign { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(
            value.kind,
            ExpressionKind::BoolOp {
                op: BoolOperator::Or,
                ..
            }
        ));
    }

    #[test]
    fn parses_chained_and_negated_comparisons() {
        let program = parse_ok("ok = 0 < x <= 10\nmissing = k not in d\nsame = a is not None\n");
        let operators = program
            .statements
            .iter()
            .map(|statement| match &statement.kind {
                StatementKind::Assign { value, .. } => match &value.kind {
                    ExpressionKind::Compare { comparisons, .. } => comparisons
                        .iter()
                        .map(|(op, _)| *op)
                        .collect::<Vec<_>>(),
                    other => panic!("expected comparison, got {other:?}"),
                },
                other => panic!("expected assignment, got {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            operators,
            vec![
                vec![CompareOperator::Less, CompareOperator::LessEqual],
                vec![CompareOperator::NotIn],
                vec![CompareOperator::IsNot],
            ]
        );
    }

    #[test]
    fn parses_containers_and_postfix_chains() {
        let program = parse_ok("v = ((), (1,), [1, 2], {'k': 3}, a.b[0](x).c)\n");
        assert_eq!(
            program.to_string(),
            "v = (), (1,), [1, 2], {'k': 3}, a.b[0](x).c\n"
        );
    }

    #[test]
    fn parses_class_and_for_loop() {
        let program = parse_ok(indoc! {"
            class Point():
                def __init__(self, x, y):
                    self.x = x
            for i, p in pairs:
                total += p.x
        "});
        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::ClassDef { name, body } if name == "Point" && body.len() == 1
        ));
        let StatementKind::For { target, .. } = &program.statements[1].kind else {
            panic!("expected for loop");
        };
        assert!(matches!(&target.kind, ExpressionKind::Tuple(items) if items.len() == 2));
    }

    #[test]
    fn errors_on_invalid_assignment_target() {
        let err = parse("f() = 1\n").expect_err("expected invalid target");
        assert_eq!(
            err,
            crate::Error::Parse(ParseError::InvalidAssignmentTarget {
                target: "function call",
                line: 1,
                column: 0,
            })
        );

        let err = parse("a, b += 1\n").expect_err("expected invalid augmented target");
        assert!(err.to_string().contains("Cannot assign to tuple"));
    }

    #[test]
    fn errors_on_unexpected_token() {
        let err = parse("x = )\n").expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected expression, got ')'"));

        let err = parse("if x\n    pass\n").expect_err("expected missing colon");
        assert!(err.to_string().contains("Expected ':', got newline"));
    }

    #[test]
    fn surfaces_lexer_errors() {
        let err = parse("x = 1 $ 2\n").expect_err("expected lexing failure");
        assert!(matches!(err, crate::Error::Lex(_)));
    }
}
