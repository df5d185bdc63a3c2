//! Indentation-sensitive scanner for Breeze source.
//!
//! Block structure is expressed through leading whitespace, so the scanner
//! keeps a stack of open indentation widths and synthesizes `Indent` and
//! `Dedent` tokens as lines move between levels. Synthetic tokens queue up
//! and drain before real scanning resumes. A tab counts as four spaces.

mod token;

pub use token::{Token, TokenKind};

use std::collections::VecDeque;

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    chars: Vec<(usize, char)>,
    position: usize,
    line: u32,
    column: u32,
    indent_stack: Vec<usize>,
    pending: VecDeque<Token>,
    at_line_start: bool,
    eof_emitted: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            position: 0,
            line: 1,
            column: 0,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            eof_emitted: false,
        }
    }

    /// The full source text, for statements that capture lines verbatim.
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Produce the next token, draining queued synthetic tokens first.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.pending.pop_front() {
            return tok;
        }

        if self.at_line_start {
            self.at_line_start = false;
            self.handle_indentation();
            if let Some(tok) = self.pending.pop_front() {
                return tok;
            }
        }

        self.skip_inline_whitespace();
        self.skip_comment();

        let (offset, ch) = match self.current() {
            Some(pair) => pair,
            None => return self.finish(),
        };
        let line = self.line;
        let column = self.column;

        let tok = match ch {
            '\n' => {
                self.advance();
                self.line += 1;
                self.column = 0;
                self.at_line_start = true;
                Token::synthetic(TokenKind::Newline, line, column, offset)
            }
            '=' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::Eq, "==", line, column, offset)
                } else {
                    Token::new(TokenKind::Assign, "=", line, column, offset)
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::NotEq, "!=", line, column, offset)
                } else {
                    Token::new(TokenKind::Bang, "!", line, column, offset)
                }
            }
            '<' => {
                self.advance();
                match self.current_char() {
                    Some('-') => {
                        self.advance();
                        Token::new(TokenKind::Arrow, "<-", line, column, offset)
                    }
                    Some('=') => {
                        self.advance();
                        Token::new(TokenKind::LtEq, "<=", line, column, offset)
                    }
                    _ => Token::new(TokenKind::Lt, "<", line, column, offset),
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::GtEq, ">=", line, column, offset)
                } else {
                    Token::new(TokenKind::Gt, ">", line, column, offset)
                }
            }
            '+' => self.single(TokenKind::Plus, "+"),
            '-' => self.single(TokenKind::Minus, "-"),
            '*' => self.single(TokenKind::Star, "*"),
            '/' => self.single(TokenKind::Slash, "/"),
            '%' => self.single(TokenKind::Percent, "%"),
            ',' => self.single(TokenKind::Comma, ","),
            ':' => self.single(TokenKind::Colon, ":"),
            '.' => self.single(TokenKind::Dot, "."),
            '(' => self.single(TokenKind::LParen, "("),
            ')' => self.single(TokenKind::RParen, ")"),
            '[' => self.single(TokenKind::LBracket, "["),
            ']' => self.single(TokenKind::RBracket, "]"),
            '{' => self.single(TokenKind::LBrace, "{"),
            '}' => self.single(TokenKind::RBrace, "}"),
            '\'' | '"' | '`' => self.read_string(ch, line, column, offset),
            c if c.is_ascii_digit() => self.read_number(line, column, offset),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(line, column, offset),
            other => {
                self.advance();
                Token::new(TokenKind::Illegal, other.to_string(), line, column, offset)
            }
        };
        tok
    }

    /// Look `n` tokens ahead without observable state change. `peek_ahead(0)`
    /// is the token the next `next_token` call would return.
    pub fn peek_ahead(&self, n: usize) -> Token {
        let mut probe = self.clone();
        let mut tok = probe.next_token();
        for _ in 0..n {
            tok = probe.next_token();
        }
        tok
    }

    fn single(&mut self, kind: TokenKind, literal: &str) -> Token {
        let (offset, _) = self.current().unwrap_or((self.source.len(), '\0'));
        let tok = Token::new(kind, literal, self.line, self.column, offset);
        self.advance();
        tok
    }

    fn current(&self) -> Option<(usize, char)> {
        self.chars.get(self.position).copied()
    }

    fn current_char(&self) -> Option<char> {
        self.current().map(|(_, c)| c)
    }

    fn peek_char(&self, n: usize) -> Option<char> {
        self.chars.get(self.position + n).map(|&(_, c)| c)
    }

    fn advance(&mut self) {
        self.position += 1;
        self.column += 1;
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.current_char(), Some(' ') | Some('\t') | Some('\r')) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        if self.current_char() == Some('#') {
            while let Some(c) = self.current_char() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
        }
    }

    /// Measure the leading whitespace of the line just entered and queue the
    /// synthetic tokens that move between indentation levels.
    fn handle_indentation(&mut self) {
        let mut width = 0usize;
        while let Some(c) = self.current_char() {
            match c {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                _ => break,
            }
            self.advance();
        }

        // Blank and comment-only lines never open or close blocks.
        match self.current_char() {
            None | Some('\n') | Some('#') => return,
            _ => {}
        }

        let offset = self.current().map(|(o, _)| o).unwrap_or(self.source.len());
        let top = *self.indent_stack.last().unwrap_or(&0);
        if width > top {
            self.indent_stack.push(width);
            self.pending
                .push_back(Token::synthetic(TokenKind::Indent, self.line, self.column, offset));
        } else if width < top {
            while self.indent_stack.len() > 1 && *self.indent_stack.last().unwrap_or(&0) > width {
                self.indent_stack.pop();
                self.pending
                    .push_back(Token::synthetic(TokenKind::Dedent, self.line, self.column, offset));
            }
            if *self.indent_stack.last().unwrap_or(&0) != width {
                // Dedent landed between known levels.
                self.pending.push_back(Token::new(
                    TokenKind::Illegal,
                    width.to_string(),
                    self.line,
                    self.column,
                    offset,
                ));
            }
        }
    }

    /// Close any open blocks, then report end of input.
    fn finish(&mut self) -> Token {
        let offset = self.source.len();
        if !self.eof_emitted {
            while self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                self.pending
                    .push_back(Token::synthetic(TokenKind::Dedent, self.line, self.column, offset));
            }
            self.eof_emitted = true;
            if let Some(tok) = self.pending.pop_front() {
                self.pending
                    .push_back(Token::synthetic(TokenKind::Eof, self.line, self.column, offset));
                return tok;
            }
        }
        if let Some(tok) = self.pending.pop_front() {
            return tok;
        }
        Token::synthetic(TokenKind::Eof, self.line, self.column, offset)
    }

    fn read_identifier(&mut self, line: u32, column: u32, offset: usize) -> Token {
        let start = self.position;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.position].iter().map(|&(_, c)| c).collect();
        let kind = TokenKind::from_keyword(&word).unwrap_or(TokenKind::Ident);
        Token::new(kind, word, line, column, offset)
    }

    /// Decimal integers and floats; a second dot ends the number.
    fn read_number(&mut self, line: u32, column: u32, offset: usize) -> Token {
        let start = self.position;
        let mut seen_dot = false;
        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot && self.peek_char(1).is_some_and(|d| d.is_ascii_digit()) {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.position].iter().map(|&(_, c)| c).collect();
        let kind = if seen_dot { TokenKind::Float } else { TokenKind::Int };
        Token::new(kind, text, line, column, offset)
    }

    /// Strings delimited by `'`, `"`, or a backtick. Tripled quotes span
    /// multiple lines; backtick strings are raw.
    fn read_string(&mut self, quote: char, line: u32, column: u32, offset: usize) -> Token {
        let triple = quote != '`'
            && self.peek_char(1) == Some(quote)
            && self.peek_char(2) == Some(quote);
        let quotes = if triple { 3 } else { 1 };
        for _ in 0..quotes {
            self.advance();
        }

        let mut value = String::new();
        loop {
            // Unterminated strings truncate at end of input, and
            // single-line strings truncate at the end of their line.
            let Some(c) = self.current_char() else {
                return Token::new(TokenKind::Str, value, line, column, offset);
            };
            if c == '\n' {
                if !triple {
                    return Token::new(TokenKind::Str, value, line, column, offset);
                }
                value.push('\n');
                self.advance();
                self.line += 1;
                self.column = 0;
                continue;
            }
            if c == '\\' && quote != '`' {
                self.advance();
                let escaped = match self.current_char() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('\\') => '\\',
                    Some('\'') => '\'',
                    Some('"') => '"',
                    // Unknown escapes pass through backslash and all.
                    Some(other) => {
                        value.push('\\');
                        other
                    }
                    None => break,
                };
                value.push(escaped);
                self.advance();
                continue;
            }
            if c == quote {
                if triple {
                    if self.peek_char(1) == Some(quote) && self.peek_char(2) == Some(quote) {
                        for _ in 0..3 {
                            self.advance();
                        }
                        break;
                    }
                    value.push(c);
                    self.advance();
                    continue;
                }
                self.advance();
                break;
            }
            value.push(c);
            self.advance();
        }
        Token::new(TokenKind::Str, value, line, column, offset)
    }
}
