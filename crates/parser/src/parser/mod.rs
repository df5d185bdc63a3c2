//! Precedence-climbing parser for Breeze.
//!
//! Statements are line oriented; blocks are `:` `NEWLINE` `INDENT` ..
//! `DEDENT`. A malformed block records a diagnostic and yields nothing,
//! and parsing continues with the next statement, so one bad block does
//! not hide later errors.

use crate::ast::{Block, Expr, NodeIdGenerator, Param, Program, Stmt};
use crate::error::Diagnostic;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::types::Type;

/// Binding strength tiers, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Channel,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
    Selector,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::Arrow => Precedence::Channel,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
            Precedence::LessGreater
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::LParen => Precedence::Call,
        TokenKind::LBracket => Precedence::Index,
        TokenKind::Dot => Precedence::Selector,
        _ => Precedence::Lowest,
    }
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    cur: Token,
    peek: Token,
    pub errors: Vec<Diagnostic>,
    ids: NodeIdGenerator,
}

impl<'src> Parser<'src> {
    pub fn new(mut lexer: Lexer<'src>) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
            ids: NodeIdGenerator::new(),
        }
    }

    pub fn from_source(source: &'src str) -> Self {
        Parser::new(Lexer::new(source))
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while self.cur.kind != TokenKind::Eof {
            if matches!(self.cur.kind, TokenKind::Newline | TokenKind::Dedent) {
                self.next_token();
                continue;
            }
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.next_token();
        }
        program
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// Advance past `kind` in the peek slot, or record a mismatch.
    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.next_token();
            true
        } else {
            self.peek_error(kind);
            false
        }
    }

    fn peek_error(&mut self, expected: TokenKind) {
        let message = format!(
            "expected {expected}, got {} instead",
            self.peek.kind
        );
        self.errors
            .push(Diagnostic::new(message, self.peek.line, self.peek.column));
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Import => self.parse_import_statement(),
            TokenKind::Defer => self.parse_verbatim_statement(TokenKind::Defer),
            TokenKind::Go => self.parse_verbatim_statement(TokenKind::Go),
            TokenKind::Ident if self.line_contains_assignment() => {
                self.parse_assignment_statement()
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Scan the rest of the physical line for a top-level `=` to decide
    /// between an assignment and an expression statement.
    fn line_contains_assignment(&self) -> bool {
        if self.peek_is(TokenKind::Assign) {
            return true;
        }
        if matches!(self.peek.kind, TokenKind::Newline | TokenKind::Eof) {
            return false;
        }
        let mut n = 0usize;
        loop {
            let tok = self.lexer.peek_ahead(n);
            match tok.kind {
                TokenKind::Assign => return true,
                TokenKind::Newline | TokenKind::Eof => return false,
                _ => n += 1,
            }
        }
    }

    fn parse_assignment_statement(&mut self) -> Option<Stmt> {
        let line = self.cur.line;
        let mut targets = vec![self.parse_expression(Precedence::Lowest)?];
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            targets.push(self.parse_expression(Precedence::Lowest)?);
        }
        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.next_token();
        let mut value = self.parse_expression(Precedence::Lowest)?;

        // A bound function literal takes its binding as its scope name.
        if let (Expr::Function { name, .. }, Some(target)) =
            (&mut value, targets.first())
        {
            if let Some(bound) = target.ident_name() {
                *name = bound.to_string();
            }
        }
        Some(Stmt::Assignment {
            targets,
            value,
            line,
        })
    }

    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        Some(Stmt::Expression(expr))
    }

    fn parse_return_statement(&mut self) -> Option<Stmt> {
        let line = self.cur.line;
        if matches!(self.peek.kind, TokenKind::Newline | TokenKind::Eof) {
            return Some(Stmt::Return {
                values: Vec::new(),
                line,
            });
        }
        self.next_token();
        let mut values = vec![self.parse_expression(Precedence::Lowest)?];
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            values.push(self.parse_expression(Precedence::Lowest)?);
        }
        Some(Stmt::Return { values, line })
    }

    fn parse_if_statement(&mut self) -> Option<Stmt> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let consequence = self.parse_block()?;
        let alternative = self.parse_alternative();
        Some(Stmt::If {
            condition,
            consequence,
            alternative,
        })
    }

    /// `elif` desugars to an `else` holding a single nested `if`.
    fn parse_alternative(&mut self) -> Option<Block> {
        if self.peek_is(TokenKind::Elif) {
            self.next_token();
            let nested = self.parse_if_statement()?;
            return Some(Block {
                statements: vec![nested],
            });
        }
        if self.peek_is(TokenKind::Else) {
            self.next_token();
            return self.parse_block();
        }
        None
    }

    fn parse_while_statement(&mut self) -> Option<Stmt> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        Some(Stmt::While { condition, body })
    }

    fn parse_for_statement(&mut self) -> Option<Stmt> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let binding = self.cur.literal.clone();
        if !self.expect_peek(TokenKind::In) {
            return None;
        }
        self.next_token();
        let iterable = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        Some(Stmt::For {
            binding,
            iterable,
            body,
        })
    }

    fn parse_import_statement(&mut self) -> Option<Stmt> {
        let line = self.cur.line;
        if !self.expect_peek(TokenKind::Str) {
            return None;
        }
        Some(Stmt::Import {
            path: self.cur.literal.clone(),
            line,
        })
    }

    /// `defer` and `go` keep their operand as raw host syntax, sliced
    /// straight out of the source line.
    fn parse_verbatim_statement(&mut self, keyword: TokenKind) -> Option<Stmt> {
        let source = self.lexer.source();
        let start = self.peek.offset.min(source.len());
        let end = source[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(source.len());
        let text = source[start..end].trim().to_string();

        while !matches!(self.peek.kind, TokenKind::Newline | TokenKind::Eof) {
            self.next_token();
        }
        if text.is_empty() {
            self.errors.push(Diagnostic::new(
                format!("{} requires an expression", self.cur_keyword_name(keyword)),
                self.cur.line,
                self.cur.column,
            ));
            return None;
        }
        Some(match keyword {
            TokenKind::Go => Stmt::Go { text },
            _ => Stmt::Defer { text },
        })
    }

    fn cur_keyword_name(&self, keyword: TokenKind) -> &'static str {
        if keyword == TokenKind::Go {
            "go"
        } else {
            "defer"
        }
    }

    /// Block grammar: `:` NEWLINE INDENT statements DEDENT. On a grammar
    /// miss the diagnostic is recorded and the whole block is dropped.
    fn parse_block(&mut self) -> Option<Block> {
        if !self.expect_peek(TokenKind::Colon) {
            return None;
        }
        if !self.expect_peek(TokenKind::Newline) {
            return None;
        }
        while self.peek_is(TokenKind::Newline) {
            self.next_token();
        }
        if !self.expect_peek(TokenKind::Indent) {
            return None;
        }
        self.next_token();

        let mut block = Block::default();
        while !self.cur_is(TokenKind::Dedent) && !self.cur_is(TokenKind::Eof) {
            if self.cur_is(TokenKind::Newline) {
                self.next_token();
                continue;
            }
            if let Some(stmt) = self.parse_statement() {
                block.statements.push(stmt);
            }
            self.next_token();
        }
        Some(block)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;
        while !self.peek_is(TokenKind::Newline) && precedence < precedence_of(self.peek.kind) {
            left = match self.peek.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::And
                | TokenKind::Or => {
                    self.next_token();
                    self.parse_infix_expression(left)?
                }
                TokenKind::Arrow => {
                    self.next_token();
                    self.parse_send_expression(left)?
                }
                TokenKind::LParen => {
                    self.next_token();
                    self.parse_call_expression(left)?
                }
                TokenKind::LBracket => {
                    self.next_token();
                    self.parse_index_expression(left)?
                }
                TokenKind::Dot => {
                    self.next_token();
                    self.parse_selector_expression(left)?
                }
                _ => return Some(left),
            };
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::Ident => Some(Expr::Ident {
                name: self.cur.literal.clone(),
                line: self.cur.line,
                column: self.cur.column,
            }),
            // `print` and `len` parse as plain callables.
            TokenKind::Print => Some(Expr::Ident {
                name: "print".to_string(),
                line: self.cur.line,
                column: self.cur.column,
            }),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Float => self.parse_float_literal(),
            TokenKind::Str => Some(Expr::Str {
                value: self.cur.literal.clone(),
            }),
            TokenKind::True => Some(Expr::Bool { value: true }),
            TokenKind::False => Some(Expr::Bool { value: false }),
            TokenKind::None => Some(Expr::None),
            TokenKind::Bang | TokenKind::Minus | TokenKind::Not => self.parse_prefix_expression(),
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_map_literal(),
            TokenKind::Def => self.parse_function_literal(),
            TokenKind::Arrow => self.parse_receive_expression(),
            _ => {
                self.errors.push(Diagnostic::new(
                    format!("no prefix parse rule for {}", self.cur.kind),
                    self.cur.line,
                    self.cur.column,
                ));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expr> {
        match self.cur.literal.parse::<i64>() {
            Ok(value) => Some(Expr::Int { value }),
            Err(_) => {
                self.errors.push(Diagnostic::new(
                    format!("could not parse {:?} as an integer", self.cur.literal),
                    self.cur.line,
                    self.cur.column,
                ));
                None
            }
        }
    }

    fn parse_float_literal(&mut self) -> Option<Expr> {
        match self.cur.literal.parse::<f64>() {
            Ok(value) => Some(Expr::Float { value }),
            Err(_) => {
                self.errors.push(Diagnostic::new(
                    format!("could not parse {:?} as a float", self.cur.literal),
                    self.cur.line,
                    self.cur.column,
                ));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expr> {
        let op = if self.cur.kind == TokenKind::Not {
            "!".to_string()
        } else {
            self.cur.literal.clone()
        };
        self.next_token();
        let operand = self.parse_expression(Precedence::Prefix)?;
        Some(Expr::Prefix {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_infix_expression(&mut self, left: Expr) -> Option<Expr> {
        let op = match self.cur.kind {
            TokenKind::And => "&&".to_string(),
            TokenKind::Or => "||".to_string(),
            _ => self.cur.literal.clone(),
        };
        let precedence = precedence_of(self.cur.kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expr::Infix {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_send_expression(&mut self, channel: Expr) -> Option<Expr> {
        self.next_token();
        let value = self.parse_expression(Precedence::Channel)?;
        Some(Expr::Send {
            channel: Box::new(channel),
            value: Box::new(value),
        })
    }

    fn parse_receive_expression(&mut self) -> Option<Expr> {
        self.next_token();
        let channel = self.parse_expression(Precedence::Prefix)?;
        Some(Expr::Receive {
            channel: Box::new(channel),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expr> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(expr)
    }

    fn parse_call_expression(&mut self, function: Expr) -> Option<Expr> {
        let line = self.cur.line;
        let args = self.parse_call_arguments()?;
        Some(Expr::Call {
            id: self.ids.next(),
            function: Box::new(function),
            args,
            line,
        })
    }

    fn parse_call_arguments(&mut self) -> Option<Vec<Option<Expr>>> {
        let mut args = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(args);
        }
        self.next_token();
        args.push(Some(self.parse_expression(Precedence::Lowest)?));
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            args.push(Some(self.parse_expression(Precedence::Lowest)?));
        }
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(args)
    }

    fn parse_index_expression(&mut self, object: Expr) -> Option<Expr> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RBracket) {
            return None;
        }
        Some(Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    fn parse_selector_expression(&mut self, object: Expr) -> Option<Expr> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        Some(Expr::Selector {
            object: Box::new(object),
            field: self.cur.literal.clone(),
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expr> {
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        let params = self.parse_function_params()?;
        let body = self.parse_block()?;
        Some(Expr::Function {
            id: self.ids.next(),
            name: String::new(),
            params,
            body,
        })
    }

    fn parse_function_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(params);
        }
        self.next_token();
        params.push(Param {
            name: self.cur.literal.clone(),
        });
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            params.push(Param {
                name: self.cur.literal.clone(),
            });
        }
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(params)
    }

    /// Members that agree on a literal type fix the element type; mixed
    /// or empty collections fall back to `any`.
    fn parse_array_literal(&mut self) -> Option<Expr> {
        let mut elements = Vec::new();
        if self.peek_is(TokenKind::RBracket) {
            self.next_token();
            return Some(Expr::Array {
                elements,
                elem_type: Type::Any,
            });
        }
        self.next_token();
        elements.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            elements.push(self.parse_expression(Precedence::Lowest)?);
        }
        if !self.expect_peek(TokenKind::RBracket) {
            return None;
        }
        let elem_type = Type::unify(elements.iter().map(literal_type));
        Some(Expr::Array {
            elements,
            elem_type,
        })
    }

    fn parse_map_literal(&mut self) -> Option<Expr> {
        let mut pairs = Vec::new();
        while !self.peek_is(TokenKind::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            if !self.expect_peek(TokenKind::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !self.peek_is(TokenKind::RBrace) && !self.expect_peek(TokenKind::Comma) {
                return None;
            }
        }
        self.next_token();
        let key_type = Type::unify(pairs.iter().map(|(k, _)| literal_type(k)));
        let value_type = Type::unify(pairs.iter().map(|(_, v)| literal_type(v)));
        Some(Expr::MapLit {
            pairs,
            key_type,
            value_type,
        })
    }
}

/// The type a literal wears on its face; everything else is `any` until
/// the analyzer runs.
fn literal_type(expr: &Expr) -> Type {
    match expr {
        Expr::Int { .. } => Type::int(),
        Expr::Float { .. } => Type::float(),
        Expr::Str { .. } => Type::string(),
        Expr::Bool { .. } => Type::bool(),
        _ => Type::Any,
    }
}
