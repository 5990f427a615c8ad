//! Precedence-climbing parser for predicates and fix statements.

use crate::ast::{Expr, Literal, Statement, UnaryOp};
use crate::error::CompileError;
use crate::lexer::{BinaryOp, Token, TokenKind, lex};

/// Binding power of `not` and unary minus: tighter than any binary operator.
const UNARY_BP: u8 = 6;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a predicate expression.
pub fn parse_expression(input: &str) -> Result<Expr, CompileError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_expr_bp(0)?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a fix expression: statements separated by `;`.
pub fn parse_statements(input: &str) -> Result<Vec<Statement>, CompileError> {
    let mut parser = Parser::new(input)?;
    let mut statements = Vec::new();
    loop {
        while parser.peek() == &TokenKind::Semicolon {
            parser.next();
        }
        if parser.peek() == &TokenKind::End {
            break;
        }
        statements.push(parser.parse_statement()?);
        match parser.peek() {
            TokenKind::Semicolon | TokenKind::End => {}
            other => {
                return Err(CompileError::syntax(
                    parser.offset(),
                    format!("expected ';' between actions, found {}", other.describe()),
                ));
            }
        }
    }
    if statements.is_empty() {
        return Err(CompileError::Empty);
    }
    Ok(statements)
}

impl Parser {
    fn new(input: &str) -> Result<Self, CompileError> {
        let tokens = lex(input)?;
        if tokens.len() == 1 {
            return Err(CompileError::Empty);
        }
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)].kind
    }

    fn offset(&self) -> usize {
        let last = self.tokens.len() - 1;
        self.tokens[self.pos.min(last)].offset
    }

    fn next(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        self.pos = self.pos.saturating_add(1);
        kind
    }

    fn consume(&mut self, expected: &TokenKind, context: &str) -> Result<(), CompileError> {
        if self.peek() == expected {
            self.next();
            Ok(())
        } else {
            Err(CompileError::syntax(
                self.offset(),
                format!(
                    "expected {} {context}, found {}",
                    expected.describe(),
                    self.peek().describe()
                ),
            ))
        }
    }

    fn expect_end(&self) -> Result<(), CompileError> {
        match self.peek() {
            TokenKind::End => Ok(()),
            TokenKind::RParen => Err(CompileError::syntax(self.offset(), "unbalanced ')'")),
            other => Err(CompileError::syntax(
                self.offset(),
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, CompileError> {
        let target = self.parse_postfix()?;
        if self.peek() == &TokenKind::Operator(BinaryOp::Eq) {
            self.next();
            let value = self.parse_expr_bp(0)?;
            return Ok(Statement::Assign { target, value });
        }
        match target {
            Expr::Call { .. } => Ok(Statement::Call(target)),
            other => Err(CompileError::syntax(
                self.offset(),
                format!(
                    "'{}' is not an action; expected an assignment or a call",
                    other.path()
                ),
            )),
        }
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let op = match self.peek() {
                TokenKind::Operator(op) => *op,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let prec = op.precedence();
            if prec < min_bp {
                break;
            }
            self.next();
            let rhs = self.parse_expr_bp(prec + 1)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.next();
        let expr = self.parse_expr_bp(UNARY_BP)?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        while self.peek() == &TokenKind::Dot {
            self.next();
            let offset = self.offset();
            let TokenKind::Ident(name) = self.next() else {
                return Err(CompileError::syntax(offset, "expected a member name after '.'"));
            };
            expr = if self.peek() == &TokenKind::LParen {
                let args = self.parse_args()?;
                Expr::Call {
                    target: Some(Box::new(expr)),
                    name,
                    args,
                    offset,
                }
            } else {
                Expr::Member {
                    target: Box::new(expr),
                    name,
                    offset,
                }
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let offset = self.offset();
        match self.next() {
            TokenKind::True => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Literal::Null)),
            TokenKind::Int(value) => Ok(Expr::Literal(Literal::Int(value))),
            TokenKind::Real(value) => Ok(Expr::Literal(Literal::Real(value))),
            TokenKind::Str(text) => Ok(Expr::Literal(Literal::Str(text))),
            TokenKind::Ident(name) => {
                if self.peek() == &TokenKind::LParen {
                    let args = self.parse_args()?;
                    Ok(Expr::Call {
                        target: None,
                        name,
                        args,
                        offset,
                    })
                } else {
                    Ok(Expr::Ident { name, offset })
                }
            }
            TokenKind::LParen => {
                let expr = self.parse_expr_bp(0)?;
                self.consume(&TokenKind::RParen, "to close '('")?;
                Ok(expr)
            }
            TokenKind::End => Err(CompileError::syntax(offset, "unexpected end of expression")),
            other => Err(CompileError::syntax(
                offset,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.consume(&TokenKind::LParen, "before arguments")?;
        let mut args = Vec::new();
        if self.peek() == &TokenKind::RParen {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr_bp(0)?);
            match self.next() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                other => {
                    return Err(CompileError::syntax(
                        self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].offset,
                        format!("expected ',' or ')' in argument list, found {}", other.describe()),
                    ));
                }
            }
        }
    }
}
