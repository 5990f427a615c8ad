//! Ignore filter.
//!
//! Ignoring never skips evaluation: violations of ignored rules are still
//! computed and reported separately, so audits and fix dry-runs keep
//! working.

use std::collections::{BTreeMap, BTreeSet};

use bpa_model::{Diagnostic, DiagnosticKind, ModelGraph, ObjectRef, ScopeTag};
use bpa_rules::{ModelRuleConfig, OBJECT_IGNORE_ANNOTATION, object_ignores};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    global: BTreeSet<String>,
    per_object: BTreeMap<ObjectRef, BTreeSet<String>>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the model-wide ignore list and every object's own ignore
    /// annotation.
    ///
    /// Unreadable object annotations become diagnostics.
    pub fn read<G: ModelGraph + ?Sized>(graph: &G, config: &ModelRuleConfig) -> (Self, Vec<Diagnostic>) {
        let mut set = Self {
            global: config.ignored_rules.clone(),
            per_object: BTreeMap::new(),
        };
        let mut diagnostics = Vec::new();
        for tag in ScopeTag::ALL {
            for object in graph.objects_of_type(tag) {
                match object_ignores(graph, object) {
                    Ok(ids) if ids.is_empty() => {}
                    Ok(ids) => {
                        set.per_object.entry(object).or_default().extend(ids);
                    }
                    Err(err) => {
                        let name = graph
                            .display_name(object)
                            .unwrap_or_else(|_| object.to_string());
                        diagnostics.push(
                            Diagnostic::new(DiagnosticKind::Annotation, err.to_string())
                                .with_source(format!("annotation:{OBJECT_IGNORE_ANNOTATION}"))
                                .with_object(name),
                        );
                    }
                }
            }
        }
        (set, diagnostics)
    }

    /// Re-read the model's current ignore annotations, e.g. after fixes
    /// rewrote them.
    pub fn from_model<G: ModelGraph + ?Sized>(graph: &G) -> (Self, Vec<Diagnostic>) {
        Self::read(graph, &ModelRuleConfig::read(graph))
    }

    pub fn ignore_globally(mut self, rule_id: impl Into<String>) -> Self {
        self.global.insert(rule_id.into());
        self
    }

    pub fn ignore_on(mut self, object: ObjectRef, rule_id: impl Into<String>) -> Self {
        self.per_object.entry(object).or_default().insert(rule_id.into());
        self
    }

    pub fn is_ignored(&self, rule_id: &str, object: ObjectRef) -> bool {
        self.global.contains(rule_id)
            || self
                .per_object
                .get(&object)
                .is_some_and(|ids| ids.contains(rule_id))
    }

    pub fn is_globally_ignored(&self, rule_id: &str) -> bool {
        self.global.contains(rule_id)
    }

    pub fn global(&self) -> &BTreeSet<String> {
        &self.global
    }
}
