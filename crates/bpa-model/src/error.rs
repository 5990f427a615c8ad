use thiserror::Error;

use crate::graph::ObjectRef;
use crate::scope::ScopeTag;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("scope is empty")]
    Empty,
    #[error("unknown scope token '{token}'")]
    UnknownToken { token: String },
}

/// Errors raised by a model graph provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("object {0} does not exist")]
    UnknownObject(ObjectRef),

    #[error("property '{property}' not found for {object_type}")]
    PropertyNotFound {
        property: String,
        object_type: ScopeTag,
    },

    #[error("property '{property}' of {object_type} is read-only")]
    ReadOnly {
        property: String,
        object_type: ScopeTag,
    },

    #[error("property '{property}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{message}")]
    Rejected { message: String },
}

impl GraphError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Errors loading a JSON model snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate object key '{key}'")]
    DuplicateKey { key: String },

    #[error("object '{object}' references unknown key '{key}'")]
    UnknownKey { object: String, key: String },

    #[error("object '{object}' has unknown type '{object_type}'")]
    UnknownType { object: String, object_type: String },

    #[error("object '{object}' property '{property}': {message}")]
    InvalidValue {
        object: String,
        property: String,
        message: String,
    },

    #[error("object '{object}': {source}")]
    Graph {
        object: String,
        #[source]
        source: GraphError,
    },
}
