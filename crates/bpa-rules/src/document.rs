//! Rule document codec.
//!
//! A rule document is a JSON array of rule objects using the host's
//! PascalCase field names (`ID`, `Name`, `Severity`, `Scope`, ...). Parsing
//! validates each entry on its own: an invalid rule is rejected with a
//! [`RuleValidationError`] while the remaining rules still load. Only a
//! malformed document as a whole is a [`RuleSourceError`].

use bpa_model::{Rule, Scope, Severity};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RuleSourceError, RuleValidationError};

pub const REQUIRED_FIELDS: [&str; 5] = ["ID", "Name", "Severity", "Scope", "Expression"];

pub const OPTIONAL_FIELDS: [&str; 6] = [
    "Category",
    "Description",
    "FixExpression",
    "CompatibilityLevel",
    "Source",
    "Remarks",
];

/// Fields the host adds at runtime; never valid in a persisted document.
pub const RUNTIME_FIELDS: [&str; 2] = ["ErrorMessage", "ObjectCount"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Wire representation of a rule, in the host's field order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: u8,
    pub scope: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            category: rule.category.clone(),
            description: rule.description.clone(),
            severity: rule.severity.level(),
            scope: rule.scope.to_string(),
            expression: rule.expression.clone(),
            fix_expression: rule.fix_expression.clone(),
            compatibility_level: rule.compatibility_level,
            source: rule.source.clone(),
            remarks: rule.remarks.clone(),
        }
    }
}

/// A rule entry that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRule {
    /// Position in the document array.
    pub index: usize,
    /// The entry's `ID`, when it had a readable one.
    pub id: Option<String>,
    pub error: RuleValidationError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub rules: Vec<Rule>,
    pub rejected: Vec<RejectedRule>,
}

/// Parse a rule document, validating every entry independently.
pub fn parse_rules(bytes: &[u8]) -> Result<ParsedDocument, RuleSourceError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let document: Value = serde_json::from_slice(bytes)?;
    let Value::Array(entries) = document else {
        return Err(RuleSourceError::NotAnArray);
    };

    let mut parsed = ParsedDocument::default();
    for (index, entry) in entries.iter().enumerate() {
        let id = entry
            .get("ID")
            .and_then(Value::as_str)
            .map(str::to_string);
        match entry.as_object() {
            Some(object) => match rule_from_object(object) {
                Ok(rule) => parsed.rules.push(rule),
                Err(error) => parsed.rejected.push(RejectedRule { index, id, error }),
            },
            None => parsed.rejected.push(RejectedRule {
                index,
                id,
                error: RuleValidationError::NotAnObject,
            }),
        }
    }
    Ok(parsed)
}

/// Validate a single rule object.
pub fn rule_from_object(object: &Map<String, Value>) -> Result<Rule, RuleValidationError> {
    if let Some(field) = object.keys().find(|key| !is_known_field(key)) {
        return Err(RuleValidationError::UnknownField {
            field: field.clone(),
        });
    }

    let id = required_text(object, "ID")?;
    let name = required_text(object, "Name")?;
    let severity_value = integer(object, "Severity")?
        .ok_or(RuleValidationError::MissingField { field: "Severity" })?;
    let severity = u8::try_from(severity_value)
        .ok()
        .and_then(|level| Severity::try_from(level).ok())
        .ok_or(RuleValidationError::InvalidSeverity {
            value: severity_value,
        })?;
    let scope = Scope::parse(&required_text(object, "Scope")?)?;
    let expression = required_text(object, "Expression")?;

    let compatibility_level = match integer(object, "CompatibilityLevel")? {
        Some(value) => Some(
            u32::try_from(value)
                .ok()
                .filter(|level| *level > 0)
                .ok_or(RuleValidationError::InvalidCompatibilityLevel { value })?,
        ),
        None => None,
    };

    let mut rule = Rule::new(id, name, severity, scope, expression);
    rule.category = optional_text(object, "Category")?;
    rule.description = optional_text(object, "Description")?;
    rule.fix_expression = optional_text(object, "FixExpression")?;
    rule.compatibility_level = compatibility_level;
    rule.source = optional_text(object, "Source")?;
    rule.remarks = optional_text(object, "Remarks")?;
    Ok(rule)
}

fn is_known_field(key: &str) -> bool {
    REQUIRED_FIELDS.contains(&key) || OPTIONAL_FIELDS.contains(&key)
}

fn optional_text(
    object: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, RuleValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(RuleValidationError::InvalidField {
            field: field.to_string(),
            message: format!("expected a string, got {}", json_type(other)),
        }),
    }
}

fn required_text(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, RuleValidationError> {
    let text = optional_text(object, field)?.ok_or(RuleValidationError::MissingField { field })?;
    if text.trim().is_empty() {
        return Err(RuleValidationError::Empty { field });
    }
    Ok(text)
}

fn integer(object: &Map<String, Value>, field: &str) -> Result<Option<i64>, RuleValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| {
            RuleValidationError::InvalidField {
                field: field.to_string(),
                message: format!("expected an integer, got {number}"),
            }
        }),
        Some(other) => Err(RuleValidationError::InvalidField {
            field: field.to_string(),
            message: format!("expected an integer, got {}", json_type(other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serialise rules as a host-compatible document.
pub fn write_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Result<String, serde_json::Error> {
    let records: Vec<RuleRecord> = rules.into_iter().map(RuleRecord::from).collect();
    to_host_json(&records)
}

/// Pretty-print with a 4-space indent and CRLF line endings.
pub fn to_host_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    let text = String::from_utf8_lossy(&buffer);
    let mut crlf = text.replace('\n', "\r\n");
    crlf.push_str("\r\n");
    Ok(crlf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpa_model::ScopeTag;

    #[test]
    fn invalid_entries_do_not_stop_the_document() {
        let doc = br#"[
            {"ID": "A", "Name": "A", "Severity": 2, "Scope": "Measure", "Expression": "true"},
            {"ID": "B", "Name": "B", "Severity": 7, "Scope": "Measure", "Expression": "true"},
            {"ID": "C", "Name": "C", "Severity": 1, "Scope": "Widget", "Expression": "true"},
            42
        ]"#;
        let parsed = parse_rules(doc).expect("document parses");
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].id, "A");
        assert_eq!(parsed.rejected.len(), 3);
        assert_eq!(
            parsed.rejected[0].error,
            RuleValidationError::InvalidSeverity { value: 7 }
        );
        assert_eq!(parsed.rejected[1].id.as_deref(), Some("C"));
        assert_eq!(parsed.rejected[2].error, RuleValidationError::NotAnObject);
    }

    #[test]
    fn runtime_fields_are_rejected() {
        let doc = br#"[{"ID": "A", "Name": "A", "Severity": 2, "Scope": "Table",
            "Expression": "true", "ObjectCount": 3}]"#;
        let parsed = parse_rules(doc).expect("document parses");
        assert_eq!(
            parsed.rejected[0].error,
            RuleValidationError::UnknownField {
                field: "ObjectCount".to_string()
            }
        );
    }

    #[test]
    fn explicit_null_fix_means_no_fix() {
        let doc = br#"[{"ID": "A", "Name": "A", "Severity": 2, "Scope": "Table",
            "Expression": "true", "FixExpression": null}]"#;
        let parsed = parse_rules(doc).expect("document parses");
        assert_eq!(parsed.rules[0].fix_expression, None);
        assert_eq!(parsed.rules[0].effective_compatibility_level(), 1200);
    }

    #[test]
    fn top_level_object_is_a_document_error() {
        let err = parse_rules(br#"{"ID": "A"}"#).expect_err("not an array");
        assert!(matches!(err, RuleSourceError::NotAnArray));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let mut doc = UTF8_BOM.to_vec();
        doc.extend_from_slice(b"[]");
        assert!(parse_rules(&doc).expect("bom").rules.is_empty());
    }

    #[test]
    fn rules_survive_a_write_and_parse() {
        let bare = Rule::new(
            "META_BARE",
            "Bare",
            Severity::Medium,
            Scope::from(ScopeTag::Measure),
            "IsHidden",
        );
        let mut full = Rule::new(
            "MAINT_FULL",
            "Full",
            Severity::High,
            Scope::parse("Column, Table").expect("scope"),
            "Name.StartsWith(\"_\")",
        )
        .with_category("Maintenance")
        .with_description("%objecttype% %object% is hidden")
        .with_fix("IsHidden = true")
        .with_compatibility_level(1500);
        full.source = Some("tests".to_string());
        full.remarks = Some("both optional blocks".to_string());

        let text = write_rules([&bare, &full]).expect("serialize");
        let parsed = parse_rules(text.as_bytes()).expect("parse");
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.rules, vec![bare, full]);
    }

    #[test]
    fn writes_crlf_with_four_space_indent() {
        let rule = Rule::new(
            "META_X",
            "X",
            Severity::Low,
            Scope::from(ScopeTag::Table),
            "true",
        );
        let text = write_rules([&rule]).expect("serialize");
        assert!(text.starts_with("[\r\n    {\r\n        \"ID\": \"META_X\""));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }
}
