use std::path::PathBuf;

use bpa_model::ScopeError;

/// A whole rule document could not be read.
#[derive(Debug, thiserror::Error)]
pub enum RuleSourceError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    #[error("rule document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule document must be a JSON array of rules")]
    NotAnArray,
}

impl RuleSourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fetch(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}

/// One rule inside a document is invalid; the rest of the document loads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule entry is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' has the wrong type: {message}")]
    InvalidField { field: String, message: String },

    #[error("severity must be 1, 2 or 3, got {value}")]
    InvalidSeverity { value: i64 },

    #[error("compatibility level must be a positive integer, got {value}")]
    InvalidCompatibilityLevel { value: i64 },

    #[error("invalid scope: {0}")]
    Scope(#[from] ScopeError),

    #[error("field '{field}' must not be empty")]
    Empty { field: &'static str },
}

/// A reserved annotation holds something other than the expected JSON.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation '{key}' is not valid JSON: {source}")]
    Json {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Graph(#[from] bpa_model::GraphError),
}
