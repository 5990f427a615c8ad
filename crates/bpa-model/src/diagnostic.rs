use std::fmt;

use serde::{Deserialize, Serialize};

/// What stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SourceLoad,
    RuleValidation,
    Annotation,
    Compile,
    Evaluation,
    Timeout,
    FixApplication,
    IdCollision,
}

impl DiagnosticKind {
    pub fn default_level(self) -> DiagnosticLevel {
        match self {
            Self::IdCollision => DiagnosticLevel::Info,
            Self::Annotation | Self::Evaluation | Self::FixApplication => DiagnosticLevel::Warning,
            Self::SourceLoad | Self::RuleValidation | Self::Compile | Self::Timeout => {
                DiagnosticLevel::Error
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SourceLoad => "source-load",
            Self::RuleValidation => "rule-validation",
            Self::Annotation => "annotation",
            Self::Compile => "compile",
            Self::Evaluation => "evaluation",
            Self::Timeout => "timeout",
            Self::FixApplication => "fix",
            Self::IdCollision => "id-collision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// A non-fatal problem collected during loading, evaluation or fixing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: DiagnosticLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: kind.default_level(),
            source: None,
            rule_id: None,
            object: None,
            message: message.into(),
        }
    }

    pub fn with_level(mut self, level: DiagnosticLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind.label())?;
        if let Some(source) = &self.source {
            write!(f, " {source}")?;
        }
        if let Some(rule_id) = &self.rule_id {
            write!(f, " rule {rule_id}")?;
        }
        if let Some(object) = &self.object {
            write!(f, " on {object}")?;
        }
        write!(f, ": {}", self.message)
    }
}
