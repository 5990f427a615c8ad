//! Best Practice Analyzer run: evaluate merged rules against a model, filter
//! ignored violations, optionally apply fixes and report the outcome.

mod audit;
mod collector;
mod fix;
mod ignore;
mod report;

pub use audit::{RuleAudit, SourceAudit, audit};
pub use collector::{Analysis, Analyzer, AnalyzerOptions};
pub use fix::{FixError, FixFailure, FixOutcome, apply_fixes};
pub use ignore::IgnoreSet;
pub use report::{AnalysisReport, FailureRecord, ViolationRecord, write_violations_csv};
