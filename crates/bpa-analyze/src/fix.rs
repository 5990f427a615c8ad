//! Fix applier.
//!
//! Fixes run strictly one after another. After every fix that reached the
//! model, successful or not, the provider recomputes its dependency data:
//! a fix that fails partway may already have changed the edges later fixes
//! read.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use bpa_expr::{ActionError, CompileError, CompiledAction, Compiler, EvalError};
use bpa_model::{Diagnostic, DiagnosticKind, ModelGraphMut, ObjectRef, Violation};
use tracing::{debug, info, info_span, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixError {
    #[error("fix expression does not compile: {0}")]
    Compile(#[from] CompileError),

    #[error("fix failed: {0}")]
    Apply(EvalError),

    /// The first `applied_steps` steps were written before `error`.
    #[error("fix stopped after {applied_steps} step(s): {error}")]
    Partial {
        applied_steps: usize,
        error: EvalError,
    },

    #[error("object {object} was removed by an earlier fix")]
    Removed { object: ObjectRef },
}

#[derive(Debug, Clone)]
pub struct FixFailure {
    pub violation: Violation,
    pub error: FixError,
}

#[derive(Debug, Clone, Default)]
pub struct FixOutcome {
    pub applied: Vec<Violation>,
    pub failures: Vec<FixFailure>,
    /// Violations whose rule has no fix expression.
    pub unfixable: Vec<Violation>,
}

impl FixOutcome {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.failures
            .iter()
            .map(|failure| {
                Diagnostic::new(DiagnosticKind::FixApplication, failure.error.to_string())
                    .with_rule(failure.violation.rule_id())
                    .with_object(failure.violation.object_name.clone())
            })
            .collect()
    }
}

impl From<ActionError> for FixError {
    fn from(err: ActionError) -> Self {
        match err.applied {
            0 => Self::Apply(err.error),
            applied_steps => Self::Partial {
                applied_steps,
                error: err.error,
            },
        }
    }
}

/// Apply the fix of every violation, in order.
pub fn apply_fixes<G: ModelGraphMut + ?Sized>(graph: &mut G, violations: &[Violation]) -> FixOutcome {
    let span = info_span!("fix", violations = violations.len());
    let _guard = span.enter();
    let start = Instant::now();

    let mut actions: BTreeMap<&str, Result<Arc<CompiledAction>, CompileError>> = BTreeMap::new();
    let mut outcome = FixOutcome::default();
    for violation in violations {
        let rule = &violation.rule;
        let Some(fix) = &rule.fix_expression else {
            outcome.unfixable.push(violation.clone());
            continue;
        };
        let action = actions
            .entry(rule.id.as_str())
            .or_insert_with(|| {
                Compiler::for_scope(rule.scope.resolve())
                    .action(fix)
                    .map(Arc::new)
            })
            .clone();

        let result = action.map_err(FixError::from).and_then(|action| {
            if !graph.contains(violation.object) {
                return Err(FixError::Removed {
                    object: violation.object,
                });
            }
            let result = action.apply(graph, violation.object);
            graph.refresh_dependencies();
            result.map_err(FixError::from)
        });
        match result {
            Ok(steps) => {
                debug!(rule_id = %rule.id, object = %violation.object_name, steps, "fix applied");
                outcome.applied.push(violation.clone());
            }
            Err(error) => {
                warn!(
                    rule_id = %rule.id,
                    object = %violation.object_name,
                    error = %error,
                    "fix failed"
                );
                outcome.failures.push(FixFailure {
                    violation: violation.clone(),
                    error,
                });
            }
        }
    }

    info!(
        applied = outcome.applied.len(),
        failed = outcome.failures.len(),
        unfixable = outcome.unfixable.len(),
        duration_ms = start.elapsed().as_millis(),
        "fixes applied"
    );
    outcome
}
