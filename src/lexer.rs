use std::borrow::Cow;
use std::{iter::Peekable, str::CharIndices};

mod error;

pub use error::{LexError, LexResult};

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: Vec<Token<'a>>,
    brackets: Vec<(char, usize, usize)>,
    at_line_start: bool,
    line_has_tokens: bool,
    eof_reached: bool,
    eof_emitted: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: Vec::new(),
            brackets: Vec::new(),
            at_line_start: true,
            line_has_tokens: false,
            eof_reached: false,
            eof_emitted: false,
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        if let Some(token) = self.pending_tokens.pop() {
            return Ok(token);
        }

        if self.eof_reached {
            return Ok(self.structural(TokenKind::EOF));
        }

        if self.at_line_start && self.brackets.is_empty() {
            self.at_line_start = false;
            if let Some(indent_level) = self.measure_indentation()? {
                let current_indent = self.current_indent();
                if indent_level > current_indent {
                    self.indent_stack.push(indent_level);
                    return Ok(self.structural(TokenKind::Indent));
                }
                if indent_level < current_indent {
                    while self.indent_stack.len() > 1 && self.current_indent() > indent_level {
                        self.indent_stack.pop();
                        let dedent = self.structural(TokenKind::Dedent);
                        self.pending_tokens.push(dedent);
                    }
                    if self.current_indent() != indent_level {
                        return Err(LexError::InvalidDedent {
                            indent_level,
                            line: self.line,
                        });
                    }
                    if let Some(token) = self.pending_tokens.pop() {
                        return Ok(token);
                    }
                }
            }
        }

        self.skip_whitespace();

        let Some(&(start_idx, ch)) = self.chars.peek() else {
            return self.finish();
        };

        let start_line = self.line;
        let start_column = self.column;
        match ch {
            '\n' => {
                self.advance_char();
                if !self.brackets.is_empty() {
                    // Implicit line joining inside brackets.
                    return self.next_token();
                }
                self.at_line_start = true;
                self.line_has_tokens = false;
                Ok(Token::new(
                    TokenKind::Newline,
                    Span {
                        start: start_idx,
                        end: start_idx + 1,
                        line: start_line,
                        column: start_column,
                    },
                ))
            }
            '"' | '\'' => self.read_string(ch, start_idx, start_line, start_column),
            c if c.is_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start_idx, start_line, start_column))
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => {
                let Some((kind, len)) = operator(&self.input[start_idx..]) else {
                    return Err(LexError::UnexpectedCharacter {
                        character: ch,
                        line: start_line,
                        column: start_column,
                    });
                };
                for _ in 0..len {
                    self.advance_char();
                }
                self.track_bracket(&kind, start_line, start_column)?;
                Ok(self.emit(kind, start_idx, start_idx + len, start_line, start_column))
            }
        }
    }

    /// Consumes blank and comment-only lines, then the leading spaces of the
    /// next logical line. Returns `None` when the input ends first.
    fn measure_indentation(&mut self) -> LexResult<Option<usize>> {
        loop {
            let mut lookahead = self.chars.clone();
            let mut width = 0;
            while let Some(&(_, ' ')) = lookahead.peek() {
                lookahead.next();
                width += 1;
            }
            match lookahead.peek() {
                Some(&(_, '\t')) => return Err(LexError::TabIndentation { line: self.line }),
                Some(&(_, '\n' | '\r' | '#')) => self.skip_line(),
                None => {
                    self.skip_line();
                    return Ok(None);
                }
                Some(_) => {
                    for _ in 0..width {
                        self.advance_char();
                    }
                    return Ok(Some(width));
                }
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some((_, c)) = self.advance_char() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance_char();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                '\\' => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if !matches!(lookahead.peek(), Some(&(_, '\n'))) {
                        break;
                    }
                    // Explicit line continuation.
                    self.advance_char();
                    self.advance_char();
                }
                _ => break,
            }
        }
    }

    fn finish(&mut self) -> LexResult<Token<'a>> {
        if let Some(&(delimiter, line, column)) = self.brackets.last() {
            return Err(LexError::UnmatchedDelimiter {
                delimiter,
                line,
                column,
            });
        }
        self.eof_reached = true;

        let mut trailing = Vec::new();
        if self.line_has_tokens {
            self.line_has_tokens = false;
            trailing.push(self.structural(TokenKind::Newline));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            trailing.push(self.structural(TokenKind::Dedent));
        }
        trailing.reverse();
        self.pending_tokens = trailing;

        match self.pending_tokens.pop() {
            Some(token) => Ok(token),
            None => Ok(self.structural(TokenKind::EOF)),
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Identifier(ident));
        self.emit(kind, start, end_idx, line, column)
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();

        let mut is_float = false;
        let mut lookahead = self.chars.clone();
        if let Some((_, '.')) = lookahead.next()
            && matches!(lookahead.peek(), Some(&(_, c)) if c.is_ascii_digit())
        {
            self.advance_char(); // Consume '.'
            self.consume_digits();
            is_float = true;
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let kind = if is_float {
            let value = literal
                .parse::<f64>()
                .map_err(|_| LexError::InvalidFloatLiteral {
                    literal: literal.to_string(),
                    line,
                    column,
                })?;
            TokenKind::Float(value)
        } else {
            let value = literal
                .parse::<i64>()
                .map_err(|_| LexError::InvalidIntegerLiteral {
                    literal: literal.to_string(),
                    line,
                    column,
                })?;
            TokenKind::Integer(value)
        };
        Ok(self.emit(kind, start, end_idx, line, column))
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_string(
        &mut self,
        quote: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        let input = self.input;
        self.advance_char(); // Consume opening quote
        let content_start = start + 1;
        // Stays borrowed from the input until the first escape sequence.
        let mut unescaped: Option<String> = None;

        loop {
            let Some((idx, c)) = self.advance_char() else {
                return Err(LexError::UnterminatedString { line, column });
            };
            if c == quote {
                let value = match unescaped {
                    Some(value) => Cow::Owned(value),
                    None => Cow::Borrowed(&input[content_start..idx]),
                };
                return Ok(self.emit(TokenKind::String(value), start, idx + 1, line, column));
            }
            match c {
                '\n' => return Err(LexError::UnterminatedString { line, column }),
                '\\' => {
                    let buffer =
                        unescaped.get_or_insert_with(|| input[content_start..idx].to_string());
                    let Some((_, escape)) = self.advance_char() else {
                        return Err(LexError::UnterminatedString { line, column });
                    };
                    let resolved = match escape {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => {
                            return Err(LexError::UnknownEscape {
                                escape: other,
                                line: self.line,
                                column: self.column.saturating_sub(2),
                            });
                        }
                    };
                    buffer.push(resolved);
                }
                other => {
                    if let Some(buffer) = unescaped.as_mut() {
                        buffer.push(other);
                    }
                }
            }
        }
    }

    fn track_bracket(&mut self, kind: &TokenKind<'_>, line: usize, column: usize) -> LexResult<()> {
        match kind {
            TokenKind::LParen => self.brackets.push(('(', line, column)),
            TokenKind::LBracket => self.brackets.push(('[', line, column)),
            TokenKind::LBrace => self.brackets.push(('{', line, column)),
            TokenKind::RParen => return self.close_bracket('(', ')', line, column),
            TokenKind::RBracket => return self.close_bracket('[', ']', line, column),
            TokenKind::RBrace => return self.close_bracket('{', '}', line, column),
            _ => {}
        }
        Ok(())
    }

    fn close_bracket(&mut self, open: char, close: char, line: usize, column: usize) -> LexResult<()> {
        match self.brackets.pop() {
            Some((found, _, _)) if found == open => Ok(()),
            _ => Err(LexError::UnmatchedDelimiter {
                delimiter: close,
                line,
                column,
            }),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_emitted {
            return None;
        }
        let token = self.next_token();
        match &token {
            Ok(token) if token.kind == TokenKind::EOF => self.eof_emitted = true,
            Err(_) => self.eof_emitted = true,
            Ok(_) => {}
        }
        Some(token)
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn emit(
        &mut self,
        kind: TokenKind<'a>,
        start: usize,
        end: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        self.line_has_tokens = true;
        Token::new(
            kind,
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn structural(&mut self, kind: TokenKind<'a>) -> Token<'a> {
        let index = self.current_index();
        Token::new(
            kind,
            Span {
                start: index,
                end: index,
                line: self.line,
                column: self.column,
            },
        )
    }
}

/// Longest-match operator and delimiter lookup.
fn operator(rest: &str) -> Option<(TokenKind<'static>, usize)> {
    let mut chars = rest.chars();
    let first = chars.next()?;
    let second = chars.next();
    let third = chars.next();
    let matched = match (first, second, third) {
        ('/', Some('/'), Some('=')) => (TokenKind::DoubleSlashEqual, 3),
        ('/', Some('/'), _) => (TokenKind::DoubleSlash, 2),
        ('+', Some('='), _) => (TokenKind::PlusEqual, 2),
        ('-', Some('='), _) => (TokenKind::MinusEqual, 2),
        ('*', Some('='), _) => (TokenKind::StarEqual, 2),
        ('/', Some('='), _) => (TokenKind::SlashEqual, 2),
        ('%', Some('='), _) => (TokenKind::PercentEqual, 2),
        ('=', Some('='), _) => (TokenKind::EqualEqual, 2),
        ('!', Some('='), _) => (TokenKind::NotEqual, 2),
        ('<', Some('='), _) => (TokenKind::LessEqual, 2),
        ('>', Some('='), _) => (TokenKind::GreaterEqual, 2),
        ('=', _, _) => (TokenKind::Equal, 1),
        ('+', _, _) => (TokenKind::Plus, 1),
        ('-', _, _) => (TokenKind::Minus, 1),
        ('*', _, _) => (TokenKind::Star, 1),
        ('/', _, _) => (TokenKind::Slash, 1),
        ('%', _, _) => (TokenKind::Percent, 1),
        ('<', _, _) => (TokenKind::Less, 1),
        ('>', _, _) => (TokenKind::Greater, 1),
        (':', _, _) => (TokenKind::Colon, 1),
        (',', _, _) => (TokenKind::Comma, 1),
        ('.', _, _) => (TokenKind::Dot, 1),
        (';', _, _) => (TokenKind::Semicolon, 1),
        ('(', _, _) => (TokenKind::LParen, 1),
        (')', _, _) => (TokenKind::RParen, 1),
        ('[', _, _) => (TokenKind::LBracket, 1),
        (']', _, _) => (TokenKind::RBracket, 1),
        ('{', _, _) => (TokenKind::LBrace, 1),
        ('}', _, _) => (TokenKind::RBrace, 1),
        _ => return None,
    };
    Some(matched)
}

pub fn tokenize<'a>(input: &'a str) -> LexResult<Vec<Token<'a>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
