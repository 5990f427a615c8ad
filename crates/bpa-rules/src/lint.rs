//! Rule-file linter.
//!
//! Checks a rule document against what the host accepts on load (CRLF line
//! endings, no runtime or comment fields) and against the authoring
//! conventions (ID prefixes, standard categories). Expressions are compiled
//! for the rule's scope so authoring mistakes surface before analysis.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use bpa_expr::Compiler;
use bpa_model::{Rule, Severity};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::{
    OPTIONAL_FIELDS, REQUIRED_FIELDS, RUNTIME_FIELDS, rule_from_object, to_host_json,
};
use crate::error::RuleSourceError;

pub const COMMENT_FIELD: &str = "_comment";

pub const STANDARD_PREFIXES: [&str; 10] = [
    "DAX_", "META_", "PERF_", "NAME_", "LAYOUT_", "FORMAT_", "GOV_", "MAINT_", "ERR_", "PQ_",
];

pub const STANDARD_CATEGORIES: [&str; 10] = [
    "DAX Expressions",
    "Metadata",
    "Performance",
    "Naming Conventions",
    "Model Layout",
    "Formatting",
    "Governance",
    "Maintenance",
    "Error Prevention",
    "Data Quality",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Warning,
    Error,
}

impl LintLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One problem found in a rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    pub level: LintLevel,
    /// Position of the entry in the document; `None` for document-level findings.
    pub index: Option<usize>,
    pub rule_id: Option<String>,
    pub message: String,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match (&self.rule_id, self.index) {
            (Some(id), _) => format!("[{id}]"),
            (None, Some(index)) => format!("#{index}"),
            (None, None) => "document".to_string(),
        };
        write!(f, "{:<7} {location}: {}", self.level.label(), self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    /// Number of array entries inspected.
    pub rule_count: usize,
    pub findings: Vec<LintFinding>,
}

impl LintReport {
    pub fn errors(&self) -> impl Iterator<Item = &LintFinding> {
        self.findings
            .iter()
            .filter(|finding| finding.level == LintLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LintFinding> {
        self.findings
            .iter()
            .filter(|finding| finding.level == LintLevel::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// No errors; warnings are allowed.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    /// One line per finding followed by a totals line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for finding in &self.findings {
            let _ = writeln!(out, "{finding}");
        }
        let _ = write!(
            out,
            "{} rule(s): {} error(s), {} warning(s)",
            self.rule_count,
            self.error_count(),
            self.warning_count()
        );
        out
    }

    fn document(&mut self, level: LintLevel, message: impl Into<String>) {
        self.findings.push(LintFinding {
            level,
            index: None,
            rule_id: None,
            message: message.into(),
        });
    }
}

/// Collects the findings of a single entry.
struct EntryLint<'r> {
    report: &'r mut LintReport,
    index: usize,
    rule_id: Option<String>,
}

impl EntryLint<'_> {
    fn push(&mut self, level: LintLevel, message: impl Into<String>) {
        self.report.findings.push(LintFinding {
            level,
            index: Some(self.index),
            rule_id: self.rule_id.clone(),
            message: message.into(),
        });
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(LintLevel::Error, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(LintLevel::Warning, message);
    }
}

/// Lint a rule document.
pub fn lint(bytes: &[u8]) -> LintReport {
    let mut report = LintReport::default();
    let bytes = strip_bom(bytes);
    if has_bare_line_feed(bytes) {
        report.document(LintLevel::Error, "rule files must use CRLF line endings");
    }

    let document: Value = match serde_json::from_slice(bytes) {
        Ok(document) => document,
        Err(err) => {
            report.document(LintLevel::Error, format!("invalid JSON: {err}"));
            return report;
        }
    };
    let Value::Array(entries) = document else {
        report.document(LintLevel::Error, "top level must be a JSON array of rules");
        return report;
    };

    report.rule_count = entries.len();
    let mut seen = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let rule_id = entry.get("ID").and_then(Value::as_str).map(str::to_string);
        let mut entry_lint = EntryLint {
            report: &mut report,
            index,
            rule_id: rule_id.clone(),
        };
        let Some(object) = entry.as_object() else {
            entry_lint.error("entry is not a JSON object");
            continue;
        };
        lint_entry(&mut entry_lint, object);

        if let Some(id) = rule_id
            && !seen.insert(id)
        {
            entry_lint.error("duplicate rule ID");
        }
        lint_conventions(&mut entry_lint, object);
    }
    report
}

fn lint_entry(entry: &mut EntryLint<'_>, object: &Map<String, Value>) {
    let mut known = object.clone();
    for field in object.keys() {
        if field == COMMENT_FIELD {
            entry.error(format!("contains a '{COMMENT_FIELD}' field"));
        } else if RUNTIME_FIELDS.contains(&field.as_str()) {
            entry.error(format!("contains runtime field '{field}'"));
        } else if !REQUIRED_FIELDS.contains(&field.as_str())
            && !OPTIONAL_FIELDS.contains(&field.as_str())
        {
            entry.error(format!("unknown field '{field}'"));
        } else {
            continue;
        }
        known.remove(field);
    }

    match rule_from_object(&known) {
        Ok(rule) => lint_expressions(entry, &rule),
        Err(err) => entry.error(err.to_string()),
    }
}

fn lint_expressions(entry: &mut EntryLint<'_>, rule: &Rule) {
    let compiler = Compiler::for_scope(rule.scope.resolve());
    if let Err(err) = compiler.predicate(&rule.expression) {
        entry.error(format!("expression does not compile: {err}"));
    }
    let Some(fix) = &rule.fix_expression else {
        return;
    };
    match compiler.action(fix) {
        Ok(action) if action.is_destructive() && rule.severity < Severity::High => {
            entry.error(format!(
                "Delete() fix on a severity {} rule; destructive fixes require severity 3",
                rule.severity.level()
            ));
        }
        Ok(_) => {}
        Err(err) => entry.error(format!("fix expression does not compile: {err}")),
    }
}

fn lint_conventions(entry: &mut EntryLint<'_>, object: &Map<String, Value>) {
    if let Some(id) = object.get("ID").and_then(Value::as_str)
        && !STANDARD_PREFIXES.iter().any(|prefix| id.starts_with(prefix))
    {
        entry.warning(format!(
            "ID does not use a standard prefix ({})",
            STANDARD_PREFIXES.join(", ")
        ));
    }
    if let Some(category) = object.get("Category").and_then(Value::as_str)
        && !STANDARD_CATEGORIES.contains(&category)
    {
        entry.warning(format!("non-standard category '{category}'"));
    }
    if let Some(expression) = object.get("Expression").and_then(Value::as_str)
        && may_compare_case_sensitively(expression)
    {
        entry.warning("string comparison may be case-sensitive");
    }
}

/// `= "` without any case folding in sight.
fn may_compare_case_sensitively(expression: &str) -> bool {
    (expression.contains("= \"") || expression.contains("=\""))
        && !["StringComparison", "ToLower", "ToUpper"]
            .iter()
            .any(|folding| expression.contains(folding))
}

/// A document rewritten into a form the host accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDocument {
    pub text: String,
    /// Fields removed (`_comment`, runtime fields, null `FixExpression`).
    pub removed_fields: usize,
    pub converted_line_endings: bool,
}

impl FixedDocument {
    pub fn fixes(&self) -> usize {
        self.removed_fields + usize::from(self.converted_line_endings)
    }
}

/// Strip fields the host rejects and rewrite with CRLF line endings.
///
/// Entries are otherwise kept as written, invalid ones included; field
/// order is preserved.
pub fn fix(bytes: &[u8]) -> Result<FixedDocument, RuleSourceError> {
    let bytes = strip_bom(bytes);
    let converted_line_endings = has_bare_line_feed(bytes);
    let mut document: Value = serde_json::from_slice(bytes)?;
    let Value::Array(entries) = &mut document else {
        return Err(RuleSourceError::NotAnArray);
    };

    let mut removed_fields = 0;
    for object in entries.iter_mut().filter_map(Value::as_object_mut) {
        object.retain(|field, value| {
            let strip = field == COMMENT_FIELD
                || RUNTIME_FIELDS.contains(&field.as_str())
                || (field == "FixExpression" && value.is_null());
            removed_fields += usize::from(strip);
            !strip
        });
    }

    Ok(FixedDocument {
        text: to_host_json(&document)?,
        removed_fields,
        converted_line_endings,
    })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

fn has_bare_line_feed(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .any(|(index, byte)| *byte == b'\n' && (index == 0 || bytes[index - 1] != b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf(text: &str) -> Vec<u8> {
        text.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn clean_document() {
        let doc = crlf(
            r#"[
    {"ID": "PERF_BIDI", "Name": "Avoid bi-directional filters", "Category": "Performance",
     "Severity": 2, "Scope": "Relationship",
     "Expression": "CrossFilteringBehavior = CrossFilteringBehavior.BothDirections"}
]"#,
        );
        let report = lint(&doc);
        assert!(report.findings.is_empty(), "{}", report.render());
        assert_eq!(report.rule_count, 1);
    }

    #[test]
    fn single_line_document_has_no_line_ending_issue() {
        let report = lint(b"[]");
        assert!(report.is_valid());
    }

    #[test]
    fn structural_errors_stop_early() {
        let report = lint(b"{\"ID\": \"A\"}");
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.rule_count, 0);
        assert!(lint(b"[1,").findings[0].message.starts_with("invalid JSON"));
    }

    #[test]
    fn case_folding_silences_the_case_warning() {
        assert!(may_compare_case_sensitively("Name = \"Sales\""));
        assert!(!may_compare_case_sensitively("Name.ToLower() = \"sales\""));
        assert!(!may_compare_case_sensitively("IsHidden"));
    }

    #[test]
    fn report_rendering() {
        let doc = br#"[
    {"ID": "DAX_DIVISION", "Name": "Use DIVIDE", "Category": "DAX Expressions", "Severity": 2,
     "Scope": "Measure", "Expression": "Expression.Tokenize().Any(Type = TokenType.DIV)"},
    {"ID": "DAX_DIVISION", "Name": "Duplicate", "Severity": 2, "Scope": "Measure",
     "Expression": "IsHidden", "_comment": "draft"},
    {"ID": "hidden_cols", "Name": "Hidden", "Category": "Misc", "Severity": 1, "Scope": "Column",
     "Expression": "Name = \"x\"", "FixExpression": "Delete()"},
    {"ID": "META_BAD", "Name": "Bad", "Severity": 2, "Scope": "Measure", "Expression": "(IsHidden"}
]"#;
        let report = lint(doc);
        insta::assert_snapshot!(report.render(), @r"
        error   document: rule files must use CRLF line endings
        error   [DAX_DIVISION]: contains a '_comment' field
        error   [DAX_DIVISION]: duplicate rule ID
        error   [hidden_cols]: Delete() fix on a severity 1 rule; destructive fixes require severity 3
        warning [hidden_cols]: ID does not use a standard prefix (DAX_, META_, PERF_, NAME_, LAYOUT_, FORMAT_, GOV_, MAINT_, ERR_, PQ_)
        warning [hidden_cols]: non-standard category 'Misc'
        warning [hidden_cols]: string comparison may be case-sensitive
        error   [META_BAD]: expression does not compile: syntax error at offset 9: expected ')' to close '(', found end of expression
        4 rule(s): 5 error(s), 3 warning(s)
        ");
    }

    #[test]
    fn validation_errors_are_reported_once() {
        let doc = br#"[{"ID": "DAX_X", "Name": "X", "Severity": 5, "Scope": "Measure", "Expression": "true", "ObjectCount": 2}]"#;
        let report = lint(doc);
        let messages: Vec<&str> = report.errors().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "contains runtime field 'ObjectCount'",
                "severity must be 1, 2 or 3, got 5"
            ]
        );
    }

    #[test]
    fn fix_strips_rejected_fields_and_keeps_order() {
        let doc = br#"[
  {"ID": "DAX_A", "_comment": "why", "Name": "A", "Severity": 2, "Scope": "Measure",
   "Expression": "true", "FixExpression": null, "ObjectCount": 4},
  "not a rule"
]"#;
        let fixed = fix(doc).expect("fixable");
        assert_eq!(fixed.removed_fields, 3);
        assert!(fixed.converted_line_endings);
        assert_eq!(fixed.fixes(), 4);
        assert!(fixed.text.find("\"ID\"") < fixed.text.find("\"Name\""));
        assert!(fixed.text.contains("\"not a rule\""));

        let relinted = lint(fixed.text.as_bytes());
        let messages: Vec<&str> = relinted.errors().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["entry is not a JSON object"]);
    }

    #[test]
    fn fix_requires_an_array() {
        assert!(matches!(fix(b"{}"), Err(RuleSourceError::NotAnArray)));
    }
}
