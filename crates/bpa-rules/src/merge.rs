//! Rule store and merger.
//!
//! Sources are fetched and parsed independently, ordered by precedence and
//! folded into one rule set keyed by rule ID. A later source's rule replaces
//! an earlier rule with the same ID as a whole; fields are never combined.

use std::collections::BTreeMap;
use std::sync::Arc;

use bpa_model::{Diagnostic, DiagnosticKind, DiagnosticLevel, Rule};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::builtin::{BuiltInRulesConfig, BuiltInStatus};
use crate::document::parse_rules;
use crate::hash::sha256_hex;
use crate::source::{RuleSourceKind, RuleSourceProvider};

/// Which of the two local files wins when both define a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrecedenceOrder {
    /// Built-in, URL, model, user, machine: the machine file wins.
    #[default]
    Listed,
    /// As listed, but the user file overrides the machine file.
    LocalFirst,
}

impl PrecedenceOrder {
    /// Position of a source kind in the merge order; higher overrides lower.
    pub fn rank(self, kind: RuleSourceKind) -> u32 {
        match (self, kind) {
            (_, RuleSourceKind::BuiltIn) => 0,
            (_, RuleSourceKind::Url) => 1,
            (_, RuleSourceKind::ModelEmbedded) => 2,
            (Self::Listed, RuleSourceKind::UserFile)
            | (Self::LocalFirst, RuleSourceKind::MachineFile) => 3,
            (Self::Listed, RuleSourceKind::MachineFile)
            | (Self::LocalFirst, RuleSourceKind::UserFile) => 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub precedence: PrecedenceOrder,
    pub builtin: BuiltInRulesConfig,
}

impl LoadOptions {
    pub fn with_precedence(mut self, precedence: PrecedenceOrder) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_builtin(mut self, builtin: BuiltInRulesConfig) -> Self {
        self.builtin = builtin;
        self
    }
}

/// Parsed rules of one source, ready to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource {
    pub kind: RuleSourceKind,
    pub id: String,
    pub rank: u32,
    pub rules: Vec<Rule>,
}

/// A rule ID defined by more than one source (or twice in one source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCollision {
    pub rule_id: String,
    pub replaced: (RuleSourceKind, String),
    pub winner: (RuleSourceKind, String),
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub rules: BTreeMap<String, Arc<Rule>>,
    pub collisions: Vec<IdCollision>,
}

/// Fold sources in ascending rank, last writer wins.
///
/// Sources sharing a rank keep their relative order.
pub fn merge(sources: &[RuleSource]) -> MergeOutcome {
    let mut ordered: Vec<&RuleSource> = sources.iter().collect();
    ordered.sort_by_key(|source| source.rank);

    let mut outcome = MergeOutcome::default();
    let mut owners: BTreeMap<String, (RuleSourceKind, String)> = BTreeMap::new();
    for source in ordered {
        let owner = (source.kind, source.id.clone());
        for rule in &source.rules {
            let rule = rule.clone().with_origin_rank(source.rank);
            if let Some(replaced) = owners.insert(rule.id.clone(), owner.clone()) {
                outcome.collisions.push(IdCollision {
                    rule_id: rule.id.clone(),
                    replaced,
                    winner: owner.clone(),
                });
            }
            outcome.rules.insert(rule.id.clone(), Arc::new(rule));
        }
    }
    outcome
}

/// What happened to one source during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub kind: RuleSourceKind,
    pub id: String,
    pub rank: u32,
    /// SHA-256 of the fetched document.
    pub fingerprint: Option<String>,
    /// IDs of the valid rules the source defined, in document order.
    pub rule_ids: Vec<String>,
    pub rejected: usize,
    /// Built-in rules switched off by preferences.
    pub disabled: usize,
    pub error: Option<String>,
}

impl SourceSummary {
    fn new(kind: RuleSourceKind, id: String, rank: u32) -> Self {
        Self {
            kind,
            id,
            rank,
            fingerprint: None,
            rule_ids: Vec::new(),
            rejected: 0,
            disabled: 0,
            error: None,
        }
    }

    pub fn loaded(&self) -> bool {
        self.error.is_none()
    }
}

/// The de-duplicated rule set plus everything learned while loading it.
#[derive(Debug, Clone, Default)]
pub struct MergedRuleSet {
    rules: BTreeMap<String, Arc<Rule>>,
    sources: Vec<SourceSummary>,
    diagnostics: Vec<Diagnostic>,
}

impl MergedRuleSet {
    /// A rule set built directly from rules, without sources.
    ///
    /// Later rules replace earlier ones with the same ID.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| (rule.id.clone(), Arc::new(rule)))
            .collect();
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Rules ordered by ID.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Rule>> {
        self.rules.get(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Sources in merge order.
    pub fn sources(&self) -> &[SourceSummary] {
        &self.sources
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Ordered collection of rule source providers.
pub struct RuleStore {
    providers: Vec<Box<dyn RuleSourceProvider>>,
    options: LoadOptions,
}

impl RuleStore {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            providers: Vec::new(),
            options,
        }
    }

    pub fn with_source(mut self, provider: impl RuleSourceProvider + 'static) -> Self {
        self.add_source(Box::new(provider));
        self
    }

    pub fn add_source(&mut self, provider: Box<dyn RuleSourceProvider>) {
        self.providers.push(provider);
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Fetch, parse and merge every source.
    ///
    /// Never fails as a whole: unreadable sources and invalid rules are
    /// reported in the returned set's diagnostics.
    pub fn load(&self) -> MergedRuleSet {
        let span = info_span!("load", sources = self.providers.len());
        let _guard = span.enter();

        let precedence = self.options.precedence;
        let mut ordered: Vec<&dyn RuleSourceProvider> =
            self.providers.iter().map(Box::as_ref).collect();
        ordered.sort_by_key(|provider| precedence.rank(provider.kind()));

        let mut diagnostics = Vec::new();
        let mut summaries = Vec::new();
        let mut parsed_sources = Vec::new();
        for (rank, provider) in (0u32..).zip(ordered) {
            let (summary, source) = self.load_source(provider, rank, &mut diagnostics);
            summaries.push(summary);
            parsed_sources.extend(source);
        }

        let outcome = merge(&parsed_sources);
        for collision in &outcome.collisions {
            info!(
                rule_id = %collision.rule_id,
                replaced = %collision.replaced.1,
                winner = %collision.winner.1,
                "rule overridden by a later source"
            );
            let level = if collision.replaced.0 == RuleSourceKind::BuiltIn
                && self.options.builtin.status == BuiltInStatus::EnableWithWarnings
            {
                DiagnosticLevel::Warning
            } else {
                DiagnosticLevel::Info
            };
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::IdCollision,
                    format!(
                        "{} rule replaced by {} source {}",
                        collision.replaced.0, collision.winner.0, collision.winner.1
                    ),
                )
                .with_level(level)
                .with_source(collision.replaced.1.clone())
                .with_rule(collision.rule_id.clone()),
            );
        }

        info!(
            rules = outcome.rules.len(),
            sources = summaries.len(),
            diagnostics = diagnostics.len(),
            "rule sources merged"
        );
        MergedRuleSet {
            rules: outcome.rules,
            sources: summaries,
            diagnostics,
        }
    }

    fn load_source(
        &self,
        provider: &dyn RuleSourceProvider,
        rank: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (SourceSummary, Option<RuleSource>) {
        let kind = provider.kind();
        let id = provider.id();
        let mut summary = SourceSummary::new(kind, id.clone(), rank);

        if kind == RuleSourceKind::BuiltIn && !self.options.builtin.status.is_enabled() {
            debug!(source = %id, "built-in rules disabled");
            summary.error = Some("built-in rules are disabled".to_string());
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::SourceLoad, "built-in rules are disabled")
                    .with_level(DiagnosticLevel::Info)
                    .with_source(id),
            );
            return (summary, None);
        }

        let parsed = provider.fetch().and_then(|bytes| {
            summary.fingerprint = Some(sha256_hex(&bytes));
            parse_rules(&bytes)
        });
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(source = %id, error = %err, "failed to load rule source");
                summary.error = Some(err.to_string());
                diagnostics.push(
                    Diagnostic::new(DiagnosticKind::SourceLoad, err.to_string()).with_source(id),
                );
                return (summary, None);
            }
        };

        summary.rejected = parsed.rejected.len();
        for rejected in &parsed.rejected {
            warn!(
                source = %id,
                index = rejected.index,
                error = %rejected.error,
                "invalid rule excluded"
            );
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::RuleValidation,
                format!("rule #{}: {}", rejected.index, rejected.error),
            )
            .with_source(id.clone());
            if let Some(rule_id) = &rejected.id {
                diagnostic = diagnostic.with_rule(rule_id.clone());
            }
            diagnostics.push(diagnostic);
        }

        let mut rules = parsed.rules;
        if kind == RuleSourceKind::BuiltIn {
            let before = rules.len();
            rules.retain(|rule| self.options.builtin.is_rule_enabled(&rule.id));
            summary.disabled = before - rules.len();
        }
        summary.rule_ids = rules.iter().map(|rule| rule.id.clone()).collect();
        debug!(source = %id, %kind, rank, count = rules.len(), "rule source loaded");

        let source = RuleSource {
            kind,
            id,
            rank,
            rules,
        };
        (summary, Some(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InlineSource, UnavailableSource};

    fn doc(id: &str, name: &str) -> String {
        format!(
            r#"[{{"ID": "{id}", "Name": "{name}", "Severity": 2, "Scope": "Measure", "Expression": "true"}}]"#
        )
    }

    #[test]
    fn machine_file_wins_by_default() {
        let store = RuleStore::new(LoadOptions::default())
            .with_source(InlineSource::new(RuleSourceKind::MachineFile, "machine", doc("X", "machine")))
            .with_source(InlineSource::new(RuleSourceKind::UserFile, "user", doc("X", "user")));
        let merged = store.load();
        assert_eq!(merged.get("X").expect("X").name, "machine");
        assert_eq!(merged.diagnostics().len(), 1);
        assert_eq!(merged.diagnostics()[0].kind, DiagnosticKind::IdCollision);
        assert_eq!(merged.diagnostics()[0].level, DiagnosticLevel::Info);
    }

    #[test]
    fn local_first_lets_the_user_file_win() {
        let options = LoadOptions::default().with_precedence(PrecedenceOrder::LocalFirst);
        let store = RuleStore::new(options)
            .with_source(InlineSource::new(RuleSourceKind::UserFile, "user", doc("X", "user")))
            .with_source(InlineSource::new(RuleSourceKind::MachineFile, "machine", doc("X", "machine")));
        assert_eq!(store.load().get("X").expect("X").name, "user");
    }

    #[test]
    fn failing_source_does_not_stop_others() {
        let store = RuleStore::new(LoadOptions::default())
            .with_source(UnavailableSource::new(RuleSourceKind::Url, "https://x", "not fetched"))
            .with_source(InlineSource::new(RuleSourceKind::UserFile, "user", "{ not json"))
            .with_source(InlineSource::new(RuleSourceKind::MachineFile, "machine", doc("M", "m")));
        let merged = store.load();
        assert_eq!(merged.len(), 1);
        let load_errors = merged
            .diagnostics()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::SourceLoad)
            .count();
        assert_eq!(load_errors, 2);
        assert!(merged.sources()[0].error.is_some());
        assert!(merged.sources()[2].loaded());
    }

    #[test]
    fn origin_rank_records_the_winning_source() {
        let store = RuleStore::new(LoadOptions::default())
            .with_source(InlineSource::new(RuleSourceKind::UserFile, "user", doc("U", "u")))
            .with_source(InlineSource::new(RuleSourceKind::Url, "url", doc("R", "r")));
        let merged = store.load();
        assert_eq!(merged.get("R").expect("R").origin_rank, 0);
        assert_eq!(merged.get("U").expect("U").origin_rank, 1);
    }
}
