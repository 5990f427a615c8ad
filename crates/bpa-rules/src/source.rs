//! Rule source providers.
//!
//! The engine never touches the filesystem or the network itself: every
//! rule location is a [`RuleSourceProvider`] that hands back raw bytes.

use std::fmt;

use serde::Serialize;

use crate::error::RuleSourceError;

/// Where a rule document comes from.
///
/// Variant order is the default precedence: later kinds override earlier
/// ones when rule IDs collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RuleSourceKind {
    BuiltIn,
    Url,
    ModelEmbedded,
    UserFile,
    MachineFile,
}

impl RuleSourceKind {
    pub const ALL: [RuleSourceKind; 5] = [
        Self::BuiltIn,
        Self::Url,
        Self::ModelEmbedded,
        Self::UserFile,
        Self::MachineFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuiltIn => "built-in",
            Self::Url => "url",
            Self::ModelEmbedded => "model",
            Self::UserFile => "user",
            Self::MachineFile => "machine",
        }
    }
}

impl fmt::Display for RuleSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule location that can be fetched as a byte stream.
pub trait RuleSourceProvider: Send + Sync {
    fn kind(&self) -> RuleSourceKind;

    /// Identifier used in diagnostics and audits (path, URL, annotation key).
    fn id(&self) -> String;

    fn fetch(&self) -> Result<Vec<u8>, RuleSourceError>;
}

/// A source whose document is already in memory.
#[derive(Debug, Clone)]
pub struct InlineSource {
    kind: RuleSourceKind,
    id: String,
    bytes: Vec<u8>,
}

impl InlineSource {
    pub fn new(kind: RuleSourceKind, id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

impl RuleSourceProvider for InlineSource {
    fn kind(&self) -> RuleSourceKind {
        self.kind
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn fetch(&self) -> Result<Vec<u8>, RuleSourceError> {
        Ok(self.bytes.clone())
    }
}

/// A source that could not be located; fetching it reports why.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    kind: RuleSourceKind,
    id: String,
    reason: String,
}

impl UnavailableSource {
    pub fn new(kind: RuleSourceKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl RuleSourceProvider for UnavailableSource {
    fn kind(&self) -> RuleSourceKind {
        self.kind
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn fetch(&self) -> Result<Vec<u8>, RuleSourceError> {
        Err(RuleSourceError::fetch(self.id.clone(), self.reason.clone()))
    }
}
