use bpa_model::GraphError;
use thiserror::Error;

/// An expression failed to compile; the rule is excluded from the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown identifier '{name}' for scope {scope}")]
    UnknownIdentifier { name: String, scope: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("invalid regular expression \"{pattern}\": {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("unknown member '{member}' of enum {namespace}")]
    UnknownEnumMember { namespace: String, member: String },

    #[error("'{target}' cannot be assigned")]
    NotAssignable { target: String },

    #[error("expression is empty")]
    Empty,
}

impl CompileError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }
}

/// Evaluation of one (rule, object) pair failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("'{member}' accessed on a null value")]
    NullReference { member: String },

    #[error("'{member}' is not a member of {kind}")]
    UnknownMember { member: String, kind: &'static str },

    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    Operands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("expected a {expected} value, got {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer overflow in '{op}'")]
    Overflow { op: &'static str },

    #[error("division by zero")]
    DivideByZero,

    #[error("invalid regular expression \"{pattern}\": {message}")]
    Regex { pattern: String, message: String },

    #[error("evaluation timed out")]
    Timeout,
}

/// A fix stopped at a failing step. The first `applied` steps were already
/// written to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fix stopped after {applied} step(s): {error}")]
pub struct ActionError {
    pub applied: usize,
    pub error: EvalError,
}
