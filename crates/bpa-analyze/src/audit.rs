//! Rule audit: what each source contributed to the merged rule set.

use std::collections::BTreeSet;

use bpa_rules::{MergedRuleSet, RuleSourceKind};
use serde::Serialize;

use crate::ignore::IgnoreSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAudit {
    pub kind: RuleSourceKind,
    pub id: String,
    pub rank: u32,
    pub fingerprint: Option<String>,
    /// Distinct IDs among the valid rules the source defined.
    pub rule_count: usize,
    /// Rules that survived the merge with this source as their origin.
    pub active: Vec<String>,
    /// Rules replaced by a later source.
    pub overridden: Vec<String>,
    /// Surviving rules that the model ignores globally.
    pub ignored: Vec<String>,
    pub rejected: usize,
    pub disabled: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleAudit {
    pub sources: Vec<SourceAudit>,
    pub total: usize,
    /// Merged rules that are not globally ignored.
    pub active: usize,
    pub ignored: usize,
}

pub fn audit(merged: &MergedRuleSet, ignore: &IgnoreSet) -> RuleAudit {
    let sources = merged
        .sources()
        .iter()
        .map(|summary| {
            // A source may repeat an ID; its last definition is the one merged.
            let mut seen = BTreeSet::new();
            let distinct: Vec<String> = summary
                .rule_ids
                .iter()
                .filter(|id| seen.insert(*id))
                .cloned()
                .collect();
            let rule_count = distinct.len();
            let (survivors, overridden): (Vec<String>, Vec<String>) =
                distinct.into_iter().partition(|id| {
                    merged
                        .get(id)
                        .is_some_and(|rule| rule.origin_rank == summary.rank)
                });
            let ignored = survivors
                .iter()
                .filter(|id| ignore.is_globally_ignored(id))
                .cloned()
                .collect();
            SourceAudit {
                kind: summary.kind,
                id: summary.id.clone(),
                rank: summary.rank,
                fingerprint: summary.fingerprint.clone(),
                rule_count,
                active: survivors,
                overridden,
                ignored,
                rejected: summary.rejected,
                disabled: summary.disabled,
                error: summary.error.clone(),
            }
        })
        .collect();

    let total = merged.len();
    let ignored = merged
        .rules()
        .filter(|rule| ignore.is_globally_ignored(&rule.id))
        .count();
    RuleAudit {
        sources,
        total,
        active: total - ignored,
        ignored,
    }
}
