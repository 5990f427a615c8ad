//! JSON and CSV reports of an analysis run.

use std::io;

use bpa_model::{Diagnostic, Violation};
use chrono::Utc;
use serde::Serialize;

use crate::collector::Analysis;
use crate::fix::FixOutcome;

const REPORT_SCHEMA: &str = "bpa.analysis-report";
const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationRecord {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: u8,
    pub category: Option<String>,
    pub object_type: String,
    pub object: String,
    pub message: String,
}

impl From<&Violation> for ViolationRecord {
    fn from(violation: &Violation) -> Self {
        Self {
            rule_id: violation.rule.id.clone(),
            rule_name: violation.rule.name.clone(),
            severity: violation.rule.severity.level(),
            category: violation.rule.category.clone(),
            object_type: violation.object_type.as_str().to_string(),
            object: violation.object_name.clone(),
            message: violation.message.clone(),
        }
    }
}

/// A violation whose fix could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub rule_id: String,
    pub object: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub schema: &'static str,
    pub schema_version: u32,
    pub generated_at: String,
    pub model_compatibility_level: u32,
    pub rules_evaluated: usize,
    pub rules_skipped: usize,
    pub violations: Vec<ViolationRecord>,
    pub failures: Vec<FailureRecord>,
    pub fixed: Vec<ViolationRecord>,
    pub ignored: Vec<ViolationRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn new(analysis: &Analysis, model_compatibility_level: u32, fixes: Option<&FixOutcome>) -> Self {
        let mut diagnostics = analysis.diagnostics.clone();
        if let Some(fixes) = fixes {
            diagnostics.extend(fixes.diagnostics());
        }
        diagnostics.sort();
        Self {
            schema: REPORT_SCHEMA,
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            model_compatibility_level,
            rules_evaluated: analysis.rules_evaluated,
            rules_skipped: analysis.rules_skipped,
            violations: analysis.violations.iter().map(ViolationRecord::from).collect(),
            failures: fixes
                .map(|fixes| {
                    fixes
                        .failures
                        .iter()
                        .map(|failure| FailureRecord {
                            rule_id: failure.violation.rule.id.clone(),
                            object: failure.violation.object_name.clone(),
                            error: failure.error.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            fixed: fixes
                .map(|fixes| fixes.applied.iter().map(ViolationRecord::from).collect())
                .unwrap_or_default(),
            ignored: analysis.ignored.iter().map(ViolationRecord::from).collect(),
            diagnostics,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(format!("{json}\n"))
    }
}

/// Flat CSV export: one row per violation.
pub fn write_violations_csv<W: io::Write>(
    writer: W,
    violations: &[Violation],
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for violation in violations {
        csv.serialize(ViolationRecord::from(violation))?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bpa_model::{ObjectRef, Rule, Scope, ScopeTag, Severity};

    use super::*;

    fn sample() -> Violation {
        Violation {
            rule: Arc::new(
                Rule::new(
                    "META_DESC",
                    "Describe measures",
                    Severity::Medium,
                    Scope::from(ScopeTag::Measure),
                    "true",
                )
                .with_category("Metadata"),
            ),
            object: ObjectRef(4),
            object_type: ScopeTag::Measure,
            object_name: "[Total, net]".to_string(),
            message: "needs a description".to_string(),
        }
    }

    #[test]
    fn csv_has_a_header_and_quotes_fields() {
        let mut buffer = Vec::new();
        write_violations_csv(&mut buffer, &[sample()]).expect("csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("rule_id,rule_name,severity,category,object_type,object,message")
        );
        assert_eq!(
            lines.next(),
            Some("META_DESC,Describe measures,2,Metadata,Measure,\"[Total, net]\",needs a description")
        );
    }

    #[test]
    fn json_report_lists_violations() {
        let analysis = Analysis {
            violations: vec![sample()],
            rules_evaluated: 1,
            ..Analysis::default()
        };
        let report = AnalysisReport::new(&analysis, 1600, None);
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse");
        assert_eq!(value["schema"], REPORT_SCHEMA);
        assert_eq!(value["model_compatibility_level"], 1600);
        assert_eq!(value["violations"][0]["rule_id"], "META_DESC");
        assert_eq!(value["violations"][0]["severity"], 2);
        assert!(value["failures"].as_array().expect("array").is_empty());
    }
}
