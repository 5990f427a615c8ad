//! Built-in rules bundled with the analyzer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::RuleSourceError;
use crate::source::{RuleSourceKind, RuleSourceProvider};

/// The bundled rule document.
pub const BUILTIN_RULES: &str = include_str!("../rules/builtin.json");

/// How the host treats its built-in rules (`BuiltInBpaRules` preference).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltInStatus {
    #[default]
    Enable,
    Disable,
    /// Enabled; overriding a built-in rule is reported as a warning.
    EnableWithWarnings,
}

impl BuiltInStatus {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disable)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltInRulesConfig {
    pub status: BuiltInStatus,
    pub disabled_ids: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct Preferences {
    #[serde(rename = "BuiltInBpaRules", default)]
    built_in_bpa_rules: BuiltInStatus,
    #[serde(rename = "DisabledBuiltInRuleIds", default)]
    disabled_built_in_rule_ids: Vec<String>,
}

impl BuiltInRulesConfig {
    pub fn disabled() -> Self {
        Self {
            status: BuiltInStatus::Disable,
            disabled_ids: BTreeSet::new(),
        }
    }

    pub fn with_disabled_id(mut self, id: impl Into<String>) -> Self {
        self.disabled_ids.insert(id.into());
        self
    }

    /// Read the relevant keys of the host preferences document.
    ///
    /// Other preference keys are ignored.
    pub fn from_preferences(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let preferences: Preferences = serde_json::from_slice(bytes)?;
        Ok(Self {
            status: preferences.built_in_bpa_rules,
            disabled_ids: preferences.disabled_built_in_rule_ids.into_iter().collect(),
        })
    }

    pub fn is_rule_enabled(&self, id: &str) -> bool {
        self.status.is_enabled() && !self.disabled_ids.contains(id)
    }
}

/// The bundled rules as a rule source.
///
/// Filtering by [`BuiltInRulesConfig`] happens in the rule store.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltInSource;

impl RuleSourceProvider for BuiltInSource {
    fn kind(&self) -> RuleSourceKind {
        RuleSourceKind::BuiltIn
    }

    fn id(&self) -> String {
        "built-in".to_string()
    }

    fn fetch(&self) -> Result<Vec<u8>, RuleSourceError> {
        Ok(BUILTIN_RULES.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_rules;

    #[test]
    fn bundled_rules_are_valid() {
        let parsed = parse_rules(BUILTIN_RULES.as_bytes()).expect("bundled document");
        assert!(parsed.rejected.is_empty(), "{:?}", parsed.rejected);
        assert!(parsed.rules.len() > 15);
        assert!(parsed.rules.iter().all(|rule| rule.id.starts_with("TE3_BUILT_IN_")));
    }

    #[test]
    fn bundled_rules_use_crlf() {
        assert!(BUILTIN_RULES.contains("\r\n"));
        assert!(!BUILTIN_RULES.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn parses_preferences() {
        let prefs = br#"{
            "AppVersion": "3.25.0",
            "BuiltInBpaRules": "EnableWithWarnings",
            "DisabledBuiltInRuleIds": ["TE3_BUILT_IN_DATE_TABLE_EXISTS"]
        }"#;
        let config = BuiltInRulesConfig::from_preferences(prefs).expect("preferences");
        assert_eq!(config.status, BuiltInStatus::EnableWithWarnings);
        assert!(!config.is_rule_enabled("TE3_BUILT_IN_DATE_TABLE_EXISTS"));
        assert!(config.is_rule_enabled("TE3_BUILT_IN_TRIM_OBJECT_NAMES"));
    }

    #[test]
    fn missing_preference_keys_default_to_enabled() {
        let config = BuiltInRulesConfig::from_preferences(b"{}").expect("preferences");
        assert_eq!(config, BuiltInRulesConfig::default());
    }
}
