//! Data model for the Best Practice Analyzer rule engine.
//!
//! Rules, scope tags, diagnostics and violations live here together with the
//! [`ModelGraph`] interface through which the engine reads (and, during fix
//! application, mutates) a tabular model.

pub mod capabilities;
pub mod diagnostic;
pub mod error;
pub mod graph;
pub mod rule;
pub mod scope;
pub mod snapshot;
pub mod violation;

pub use capabilities::{PropertyKind, PropertySpec};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLevel};
pub use error::{GraphError, ScopeError, SnapshotError};
pub use graph::{
    Dependency, DependencyKind, ModelGraph, ModelGraphMut, ObjectRef, ReferencedBy, Value,
};
pub use rule::{DEFAULT_COMPATIBILITY_LEVEL, Rule, Severity};
pub use scope::{Scope, ScopeTag, ScopeToken, resolve_scope, resolve_tokens};
pub use snapshot::ModelSnapshot;
pub use violation::Violation;
