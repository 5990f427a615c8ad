//! Expression language of Best Practice Analyzer rules.
//!
//! Rule predicates compile once per rule scope into a [`CompiledPredicate`]
//! and are evaluated per candidate object against a [`bpa_model::ModelGraph`].
//! Fix expressions compile into a [`CompiledAction`] applied through
//! [`bpa_model::ModelGraphMut`]. The [`dax`] module provides the structural
//! DAX tokenizer behind `Tokenize()`.

mod action;
mod ast;
mod compile;
pub mod dax;
mod error;
mod eval;
mod lexer;
mod parser;
mod value;

pub use action::CompiledAction;
pub use compile::{CompiledPredicate, Compiler};
pub use dax::{DaxToken, TokenCursor, TokenList, TokenTag, tokenize};
pub use error::{ActionError, CompileError, EvalError};
pub use eval::Deadline;
pub use value::{DependencyGroup, Val};
