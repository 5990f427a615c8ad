use std::path::PathBuf;

use bpa_analyze::{Analysis, FixOutcome, RuleAudit};
use bpa_model::Diagnostic;
use bpa_rules::LintReport;

#[derive(Debug)]
pub struct LintResult {
    pub path: PathBuf,
    pub report: LintReport,
    /// Number of fixes written back, when `--fix` was given.
    pub fixes_written: Option<usize>,
}

#[derive(Debug)]
pub struct AuditResult {
    pub audit: RuleAudit,
    /// Loading and annotation diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct AnalyzeResult {
    pub model: PathBuf,
    /// Final analysis (after fixes, when fixes were applied).
    pub analysis: Analysis,
    pub fixes: Option<FixOutcome>,
    /// Loading and annotation diagnostics.
    pub load_diagnostics: Vec<Diagnostic>,
    pub rule_count: usize,
    pub written_model: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl AnalyzeResult {
    /// A severity 3 violation is still present.
    pub fn has_errors(&self) -> bool {
        self.analysis.has_high_severity()
    }
}
