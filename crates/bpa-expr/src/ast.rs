//! Syntax tree produced by the parser.

use crate::lexer::BinaryOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident {
        name: String,
        offset: usize,
    },
    Member {
        target: Box<Expr>,
        name: String,
        offset: usize,
    },
    Call {
        target: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
        offset: usize,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Dotted rendering of identifier paths, used in error messages.
    pub fn path(&self) -> String {
        match self {
            Self::Ident { name, .. } => name.clone(),
            Self::Member { target, name, .. } => format!("{}.{name}", target.path()),
            Self::Call { target, name, .. } => match target {
                Some(target) => format!("{}.{name}()", target.path()),
                None => format!("{name}()"),
            },
            Self::Literal(_) => "literal".to_string(),
            Self::Unary { .. } | Self::Binary { .. } => "expression".to_string(),
        }
    }
}

/// One `;`-separated step of a fix expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign { target: Expr, value: Expr },
    Call(Expr),
}
