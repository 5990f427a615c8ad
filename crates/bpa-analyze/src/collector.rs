//! Violation collector.
//!
//! Runs every applicable rule over the candidate objects of its scope. The
//! pass only reads the model: candidates of one rule may be evaluated in
//! parallel, and every per-rule or per-object failure becomes a diagnostic
//! instead of stopping the run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bpa_expr::{CompiledPredicate, Compiler, Deadline, EvalError};
use bpa_model::{
    Diagnostic, DiagnosticKind, GraphError, ModelGraph, ObjectRef, Rule, ScopeTag, Severity,
    Violation,
};
use bpa_rules::MergedRuleSet;
use rayon::prelude::*;
use tracing::{debug, info, info_span, trace, warn};

use crate::ignore::IgnoreSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Evaluate the candidates of a rule on the rayon pool.
    pub parallel: bool,
    /// Upper bound for one rule over all of its candidates.
    pub rule_timeout: Option<Duration>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            rule_timeout: None,
        }
    }
}

impl AnalyzerOptions {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_rule_timeout(mut self, timeout: Duration) -> Self {
        self.rule_timeout = Some(timeout);
        self
    }
}

/// Result of one collector pass.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Sorted by object type, object name and rule ID.
    pub violations: Vec<Violation>,
    /// Violations suppressed by the ignore set, in the same order.
    pub ignored: Vec<Violation>,
    pub diagnostics: Vec<Diagnostic>,
    /// Rules whose predicate ran over their candidates.
    pub rules_evaluated: usize,
    /// Rules skipped because they need a newer compatibility level.
    pub rules_skipped: usize,
}

impl Analysis {
    pub fn has_high_severity(&self) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.rule.severity == Severity::High)
    }
}

enum Outcome {
    Pass,
    Match(Violation),
    Failed(ObjectRef, EvalError),
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Evaluate `rules` against `graph`.
    pub fn run<G: ModelGraph + ?Sized>(
        &self,
        rules: &MergedRuleSet,
        graph: &G,
        ignore: &IgnoreSet,
    ) -> Analysis {
        let span = info_span!("analyze", rules = rules.len());
        let _guard = span.enter();
        let start = Instant::now();

        let model_level = graph.compatibility_level();
        let mut analysis = Analysis::default();
        for rule in rules.rules() {
            if rule.effective_compatibility_level() > model_level {
                debug!(
                    rule_id = %rule.id,
                    required = rule.effective_compatibility_level(),
                    model = model_level,
                    "rule skipped for compatibility level"
                );
                analysis.rules_skipped += 1;
                continue;
            }
            let source = rules
                .sources()
                .iter()
                .find(|source| source.rank == rule.origin_rank)
                .map(|source| source.id.as_str());
            self.run_rule(rule, source, graph, ignore, &mut analysis);
        }

        analysis
            .violations
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        analysis
            .ignored
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        info!(
            evaluated = analysis.rules_evaluated,
            skipped = analysis.rules_skipped,
            violations = analysis.violations.len(),
            ignored = analysis.ignored.len(),
            diagnostics = analysis.diagnostics.len(),
            duration_ms = start.elapsed().as_millis(),
            "analysis complete"
        );
        analysis
    }

    /// `source` is the id of the rule source the rule was taken from.
    fn run_rule<G: ModelGraph + ?Sized>(
        &self,
        rule: &Arc<Rule>,
        source: Option<&str>,
        graph: &G,
        ignore: &IgnoreSet,
        analysis: &mut Analysis,
    ) {
        let diagnostic = |kind: DiagnosticKind, message: String| {
            let diagnostic = Diagnostic::new(kind, message).with_rule(rule.id.clone());
            match source {
                Some(id) => diagnostic.with_source(id),
                None => diagnostic,
            }
        };
        let tags = rule.scope.resolve();
        let predicate = match Compiler::for_scope(tags.iter().copied()).predicate(&rule.expression) {
            Ok(predicate) => predicate,
            Err(err) => {
                warn!(rule_id = %rule.id, error = %err, "rule expression does not compile");
                analysis
                    .diagnostics
                    .push(diagnostic(DiagnosticKind::Compile, err.to_string()));
                return;
            }
        };

        let start = Instant::now();
        let deadline = self
            .options
            .rule_timeout
            .map_or_else(Deadline::none, Deadline::after);
        let candidates = candidates(graph, &tags);
        let check = |object: &ObjectRef| evaluate(rule, &predicate, graph, *object, deadline);
        let outcomes: Vec<Outcome> = if self.options.parallel {
            candidates.par_iter().map(check).collect()
        } else {
            candidates.iter().map(check).collect()
        };
        analysis.rules_evaluated += 1;

        if outcomes
            .iter()
            .any(|outcome| matches!(outcome, Outcome::Failed(_, EvalError::Timeout)))
        {
            warn!(rule_id = %rule.id, candidates = candidates.len(), "rule timed out");
            analysis.diagnostics.push(diagnostic(
                DiagnosticKind::Timeout,
                format!(
                    "evaluation exceeded {} ms; results of this rule are discarded",
                    self.options.rule_timeout.unwrap_or_default().as_millis()
                ),
            ));
            return;
        }

        let mut matched = 0;
        for outcome in outcomes {
            match outcome {
                Outcome::Pass => {}
                Outcome::Match(violation) => {
                    matched += 1;
                    if ignore.is_ignored(&rule.id, violation.object) {
                        analysis.ignored.push(violation);
                    } else {
                        analysis.violations.push(violation);
                    }
                }
                Outcome::Failed(object, err) => {
                    let name = graph
                        .display_name(object)
                        .unwrap_or_else(|_| object.to_string());
                    warn!(rule_id = %rule.id, object = %name, error = %err, "evaluation failed");
                    analysis.diagnostics.push(
                        diagnostic(DiagnosticKind::Evaluation, err.to_string()).with_object(name),
                    );
                }
            }
        }
        debug!(
            rule_id = %rule.id,
            candidates = candidates.len(),
            count = matched,
            duration_ms = start.elapsed().as_millis(),
            "rule evaluated"
        );
    }
}

/// Objects of every resolved tag, in tag order.
fn candidates<G: ModelGraph + ?Sized>(graph: &G, tags: &BTreeSet<ScopeTag>) -> Vec<ObjectRef> {
    tags.iter()
        .flat_map(|tag| graph.objects_of_type(*tag))
        .collect()
}

fn evaluate<G: ModelGraph + ?Sized>(
    rule: &Arc<Rule>,
    predicate: &CompiledPredicate,
    graph: &G,
    object: ObjectRef,
    deadline: Deadline,
) -> Outcome {
    let result = predicate
        .evaluate(graph, object, None, deadline)
        .and_then(|matched| {
            if matched {
                violation(rule, graph, object).map(Some).map_err(EvalError::from)
            } else {
                Ok(None)
            }
        });
    trace!(rule_id = %rule.id, object = %object, matched = matches!(result, Ok(Some(_))));
    match result {
        Ok(Some(violation)) => Outcome::Match(violation),
        Ok(None) => Outcome::Pass,
        Err(err) => Outcome::Failed(object, err),
    }
}

fn violation<G: ModelGraph + ?Sized>(
    rule: &Arc<Rule>,
    graph: &G,
    object: ObjectRef,
) -> Result<Violation, GraphError> {
    let object_type = graph.object_type(object)?;
    let object_name = graph.display_name(object)?;
    let message = rule.message_for(&object_name, &graph.name(object)?, object_type.object_type());
    Ok(Violation {
        rule: Arc::clone(rule),
        object,
        object_type,
        object_name,
        message,
    })
}
