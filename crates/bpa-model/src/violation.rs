use std::sync::Arc;

use crate::graph::ObjectRef;
use crate::rule::Rule;
use crate::scope::ScopeTag;

/// A rule matched by an object during one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub rule: Arc<Rule>,
    pub object: ObjectRef,
    pub object_type: ScopeTag,
    /// Display name (`'Sales'[Amount]`, `[Total]`, ...).
    pub object_name: String,
    pub message: String,
}

impl Violation {
    pub fn rule_id(&self) -> &str {
        &self.rule.id
    }

    /// Ordering key used for deterministic output.
    pub fn sort_key(&self) -> (ScopeTag, &str, &str) {
        (self.object_type, &self.object_name, &self.rule.id)
    }
}
