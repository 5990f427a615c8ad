//! Lexer for the rule expression language.

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Real(f64),
    Str(String),
    True,
    False,
    Null,
    Not,
    Operator(BinaryOp),
    Minus,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    End,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Int(value) => format!("number {value}"),
            Self::Real(value) => format!("number {value}"),
            Self::Str(_) => "string literal".to_string(),
            Self::True => "'true'".to_string(),
            Self::False => "'false'".to_string(),
            Self::Null => "'null'".to_string(),
            Self::Not => "'not'".to_string(),
            Self::Operator(op) => format!("'{}'", op.symbol()),
            Self::Minus => "'-'".to_string(),
            Self::Dot => "'.'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::End => "end of expression".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Character offset of the token start.
    pub offset: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

/// Split an expression into tokens, ending with [`TokenKind::End`].
pub fn lex(input: &str) -> Result<Vec<Token>, CompileError> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
        let offset = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::End,
                offset,
            });
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' if !matches!(self.peek(), Some(d) if d.is_ascii_digit()) => TokenKind::Dot,
            '+' => TokenKind::Operator(BinaryOp::Add),
            '-' => TokenKind::Minus,
            '*' => TokenKind::Operator(BinaryOp::Mul),
            '/' => TokenKind::Operator(BinaryOp::Div),
            '%' => TokenKind::Operator(BinaryOp::Mod),
            '=' => {
                self.eat('=');
                TokenKind::Operator(BinaryOp::Eq)
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::Operator(BinaryOp::Ne)
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Operator(BinaryOp::Le)
                } else if self.eat('>') {
                    TokenKind::Operator(BinaryOp::Ne)
                } else {
                    TokenKind::Operator(BinaryOp::Lt)
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Operator(BinaryOp::Ge)
                } else {
                    TokenKind::Operator(BinaryOp::Gt)
                }
            }
            '&' if self.eat('&') => TokenKind::Operator(BinaryOp::And),
            '|' if self.eat('|') => TokenKind::Operator(BinaryOp::Or),
            '"' | '\'' => TokenKind::Str(self.read_string(ch, offset)?),
            ch if ch.is_ascii_digit() || ch == '.' => self.read_number(ch, offset)?,
            ch if ch.is_alphabetic() || ch == '_' || ch == '@' => self.read_word(ch),
            other => {
                return Err(CompileError::syntax(
                    offset,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        Ok(Token { kind, offset })
    }

    fn read_word(&mut self, first: char) -> TokenKind {
        let mut word = String::new();
        if first != '@' {
            word.push(first);
        }
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match word.to_ascii_lowercase().as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "not" => TokenKind::Not,
            "and" => TokenKind::Operator(BinaryOp::And),
            "or" => TokenKind::Operator(BinaryOp::Or),
            _ => TokenKind::Ident(word),
        }
    }

    fn read_number(&mut self, first: char, offset: usize) -> Result<TokenKind, CompileError> {
        let mut text = String::from(first);
        let mut real = first == '.';
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
            } else if ch == '.'
                && !real
                && matches!(self.peek_next(), Some(d) if d.is_ascii_digit())
            {
                real = true;
                text.push(ch);
            } else {
                break;
            }
            self.advance();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            real = true;
            text.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.advance();
            }
            while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                text.push(d);
                self.advance();
            }
        }

        let invalid = || CompileError::syntax(offset, format!("invalid number literal '{text}'"));
        if real {
            text.parse::<f64>().map(TokenKind::Real).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| invalid())
        }
    }

    /// Strings accept backslash escapes and a doubled delimiter.
    fn read_string(&mut self, delimiter: char, offset: usize) -> Result<String, CompileError> {
        let mut text = String::new();
        while let Some(ch) = self.advance() {
            if ch == delimiter {
                if self.eat(delimiter) {
                    text.push(delimiter);
                    continue;
                }
                return Ok(text);
            }
            if ch == '\\' {
                match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    Some('0') => text.push('\0'),
                    Some(escaped @ ('\\' | '"' | '\'')) => text.push(escaped),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                }
                continue;
            }
            text.push(ch);
        }
        Err(CompileError::syntax(offset, "unterminated string literal"))
    }
}
