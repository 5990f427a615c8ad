//! Best Practice Analyzer rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Compatibility level assumed when a rule does not declare one.
pub const DEFAULT_COMPATIBILITY_LEVEL: u32 = 1200;

/// Rule severity: 1 informational, 2 warning, 3 error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl Severity {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Info",
            Self::Medium => "Warning",
            Self::High => "Error",
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(format!("severity must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// A validated rule definition.
///
/// `origin_rank` records which source the rule came from after merging; it
/// is provenance only and never written to rule documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    /// May contain `%object%`, `%objectname%` and `%objecttype%`.
    pub description: Option<String>,
    pub severity: Severity,
    pub scope: Scope,
    pub expression: String,
    pub fix_expression: Option<String>,
    pub compatibility_level: Option<u32>,
    pub source: Option<String>,
    pub remarks: Option<String>,
    pub origin_rank: u32,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        scope: Scope,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            description: None,
            severity,
            scope,
            expression: expression.into(),
            fix_expression: None,
            compatibility_level: None,
            source: None,
            remarks: None,
            origin_rank: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fix(mut self, fix_expression: impl Into<String>) -> Self {
        self.fix_expression = Some(fix_expression.into());
        self
    }

    pub fn with_compatibility_level(mut self, level: u32) -> Self {
        self.compatibility_level = Some(level);
        self
    }

    pub fn with_origin_rank(mut self, rank: u32) -> Self {
        self.origin_rank = rank;
        self
    }

    pub fn effective_compatibility_level(&self) -> u32 {
        self.compatibility_level
            .unwrap_or(DEFAULT_COMPATIBILITY_LEVEL)
    }

    /// A blank fix expression counts as no fix.
    pub fn has_fix(&self) -> bool {
        self.fix_expression
            .as_deref()
            .is_some_and(|fix| !fix.trim().is_empty())
    }

    /// Violation message for an object: the description (or the name when no
    /// description is set) with placeholders substituted.
    pub fn message_for(&self, object: &str, object_name: &str, object_type: &str) -> String {
        let template = self
            .description
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&self.name);
        template
            .replace("%objectname%", object_name)
            .replace("%objecttype%", object_type)
            .replace("%object%", object)
    }
}
