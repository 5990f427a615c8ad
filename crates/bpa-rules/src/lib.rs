//! Best Practice Analyzer rule documents.
//!
//! Rule sources ([`RuleSourceProvider`]) are fetched, parsed and merged by a
//! [`RuleStore`] into one [`MergedRuleSet`]. The [`lint`] module checks rule
//! files before they are published.

mod annotations;
mod builtin;
mod document;
mod error;
mod hash;
pub mod lint;
mod merge;
mod source;

pub use annotations::{
    EXTERNAL_RULE_FILES_ANNOTATION, IGNORE_RULES_ANNOTATION, ModelRuleConfig,
    OBJECT_IGNORE_ANNOTATION, RULES_ANNOTATION, object_ignores, parse_rule_ids,
};
pub use builtin::{BUILTIN_RULES, BuiltInRulesConfig, BuiltInSource, BuiltInStatus};
pub use document::{
    OPTIONAL_FIELDS, ParsedDocument, REQUIRED_FIELDS, RUNTIME_FIELDS, RejectedRule, RuleRecord,
    parse_rules, rule_from_object, to_host_json, write_rules,
};
pub use error::{AnnotationError, RuleSourceError, RuleValidationError};
pub use hash::sha256_hex;
pub use lint::{FixedDocument, LintFinding, LintLevel, LintReport};
pub use merge::{
    IdCollision, LoadOptions, MergeOutcome, MergedRuleSet, PrecedenceOrder, RuleSource,
    RuleStore, SourceSummary, merge,
};
pub use source::{InlineSource, RuleSourceKind, RuleSourceProvider, UnavailableSource};
