//! Rule configuration embedded in the model through reserved annotations.

use std::collections::BTreeSet;

use bpa_model::{Diagnostic, DiagnosticKind, ModelGraph, ObjectRef};
use serde::Deserialize;

use crate::error::AnnotationError;
use crate::source::{InlineSource, RuleSourceKind};

/// Inline rule array on the model root.
pub const RULES_ANNOTATION: &str = "BestPracticeAnalyzer";
/// `{"RuleIDs": [...]}` on the model root.
pub const IGNORE_RULES_ANNOTATION: &str = "BestPracticeAnalyzer_IgnoreRules";
/// `[url, ...]` on the model root.
pub const EXTERNAL_RULE_FILES_ANNOTATION: &str = "BestPracticeAnalyzer_ExternalRuleFiles";
/// `{"RuleIDs": [...]}` on any object.
pub const OBJECT_IGNORE_ANNOTATION: &str = "BestPracticeAnalyzer_Ignore";

#[derive(Debug, Deserialize)]
struct RuleIdList {
    #[serde(rename = "RuleIDs", default)]
    rule_ids: Vec<String>,
}

/// Parse a `{"RuleIDs": [...]}` annotation value.
pub fn parse_rule_ids(key: &'static str, text: &str) -> Result<BTreeSet<String>, AnnotationError> {
    let list: RuleIdList =
        serde_json::from_str(text).map_err(|source| AnnotationError::Json { key, source })?;
    Ok(list.rule_ids.into_iter().collect())
}

/// Rule IDs ignored on one object.
pub fn object_ignores<G: ModelGraph + ?Sized>(
    graph: &G,
    object: ObjectRef,
) -> Result<BTreeSet<String>, AnnotationError> {
    match graph.annotation(object, OBJECT_IGNORE_ANNOTATION)? {
        Some(text) => parse_rule_ids(OBJECT_IGNORE_ANNOTATION, &text),
        None => Ok(BTreeSet::new()),
    }
}

/// Everything the model root says about rules.
#[derive(Debug, Clone, Default)]
pub struct ModelRuleConfig {
    /// Raw inline rule document, parsed later as the model-embedded source.
    pub embedded_rules: Option<String>,
    pub ignored_rules: BTreeSet<String>,
    pub external_rule_files: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModelRuleConfig {
    /// Read the reserved annotations from the model root.
    ///
    /// Malformed values are reported as diagnostics and otherwise ignored.
    pub fn read<G: ModelGraph + ?Sized>(graph: &G) -> Self {
        let mut config = Self::default();
        let root = graph.model();

        let mut annotation = |key: &'static str| match graph.annotation(root, key) {
            Ok(value) => value,
            Err(err) => {
                config.diagnostics.push(annotation_diagnostic(key, &err.to_string()));
                None
            }
        };
        let embedded = annotation(RULES_ANNOTATION);
        let ignored = annotation(IGNORE_RULES_ANNOTATION);
        let external = annotation(EXTERNAL_RULE_FILES_ANNOTATION);

        config.embedded_rules = embedded.filter(|text| !text.trim().is_empty());

        if let Some(text) = ignored {
            match parse_rule_ids(IGNORE_RULES_ANNOTATION, &text) {
                Ok(ids) => config.ignored_rules = ids,
                Err(err) => config
                    .diagnostics
                    .push(annotation_diagnostic(IGNORE_RULES_ANNOTATION, &err.to_string())),
            }
        }

        if let Some(text) = external {
            match serde_json::from_str::<Vec<String>>(&text) {
                Ok(urls) => config.external_rule_files = urls,
                Err(err) => config.diagnostics.push(annotation_diagnostic(
                    EXTERNAL_RULE_FILES_ANNOTATION,
                    &format!("expected a JSON array of URLs: {err}"),
                )),
            }
        }

        config
    }

    /// The inline rule array as a model-embedded source.
    pub fn embedded_source(&self) -> Option<InlineSource> {
        self.embedded_rules.as_ref().map(|text| {
            InlineSource::new(
                RuleSourceKind::ModelEmbedded,
                format!("annotation:{RULES_ANNOTATION}"),
                text.as_bytes(),
            )
        })
    }
}

fn annotation_diagnostic(key: &str, message: &str) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Annotation, message).with_source(format!("annotation:{key}"))
}
