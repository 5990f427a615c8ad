use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bpa_analyze::{
    AnalysisReport, Analyzer, AnalyzerOptions, IgnoreSet, apply_fixes, audit, write_violations_csv,
};
use bpa_cli::sources::{RuleLocations, SourcePlan};
use bpa_model::{Diagnostic, ModelGraph, ModelSnapshot};
use bpa_rules::{ModelRuleConfig, MergedRuleSet, PrecedenceOrder, lint};
use tracing::{info, info_span};

use crate::cli::{AnalyzeArgs, AuditArgs, LintArgs, SourceArgs};
use crate::types::{AnalyzeResult, AuditResult, LintResult};

pub fn run_lint(args: &LintArgs) -> Result<LintResult> {
    let span = info_span!("lint", path = %args.rules.display());
    let _guard = span.enter();

    let bytes = fs::read(&args.rules)
        .with_context(|| format!("read rule file {}", args.rules.display()))?;
    if !args.fix {
        return Ok(LintResult {
            path: args.rules.clone(),
            report: lint::lint(&bytes),
            fixes_written: None,
        });
    }

    let fixed = lint::fix(&bytes)
        .with_context(|| format!("fix rule file {}", args.rules.display()))?;
    let fixes = fixed.fixes();
    if fixes > 0 {
        fs::write(&args.rules, &fixed.text)
            .with_context(|| format!("write rule file {}", args.rules.display()))?;
        info!(fixes, "rule file rewritten");
    }
    Ok(LintResult {
        path: args.rules.clone(),
        report: lint::lint(fixed.text.as_bytes()),
        fixes_written: Some(fixes),
    })
}

pub fn run_audit(args: &AuditArgs) -> Result<AuditResult> {
    let span = info_span!("audit", model = %args.model.display());
    let _guard = span.enter();

    let model = load_model(&args.model)?;
    let (merged, ignore, diagnostics) = load_rules(&model, &args.model, &args.sources)?;
    Ok(AuditResult {
        audit: audit(&merged, &ignore),
        diagnostics,
    })
}

pub fn run_analyze(args: &AnalyzeArgs) -> Result<AnalyzeResult> {
    let span = info_span!("analyze_model", model = %args.model.display());
    let _guard = span.enter();
    let start = Instant::now();

    let mut model = load_model(&args.model)?;
    let (merged, ignore, load_diagnostics) = load_rules(&model, &args.model, &args.sources)?;

    let mut options = AnalyzerOptions::default().with_parallel(!args.no_parallel);
    if let Some(ms) = args.timeout_ms {
        options = options.with_rule_timeout(Duration::from_millis(ms));
    }
    let analyzer = Analyzer::new(options);
    let mut analysis = analyzer.run(&merged, &model, &ignore);

    let mut fixes = None;
    if args.fix {
        let outcome = apply_fixes(&mut model, &analysis.violations);
        let (ignore, _) = IgnoreSet::from_model(&model);
        analysis = analyzer.run(&merged, &model, &ignore);
        fixes = Some(outcome);
    }

    if let Some(path) = &args.write_model {
        let json = model.to_json().context("serialize model snapshot")?;
        fs::write(path, json).with_context(|| format!("write model {}", path.display()))?;
    }

    if let Some(path) = &args.report {
        let mut report =
            AnalysisReport::new(&analysis, model.compatibility_level(), fixes.as_ref());
        report.diagnostics.extend(load_diagnostics.iter().cloned());
        report.diagnostics.sort();
        let json = report.to_json().context("serialize analysis report")?;
        fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    }

    if let Some(path) = &args.csv {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        write_violations_csv(BufWriter::new(file), &analysis.violations)
            .with_context(|| format!("write violations {}", path.display()))?;
    }

    info!(
        violations = analysis.violations.len(),
        duration_ms = start.elapsed().as_millis(),
        "model analyzed"
    );
    Ok(AnalyzeResult {
        model: args.model.clone(),
        analysis,
        fixes,
        load_diagnostics,
        rule_count: merged.len(),
        written_model: args.write_model.clone(),
        report: args.report.clone(),
        csv: args.csv.clone(),
    })
}

fn load_model(path: &Path) -> Result<ModelSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("read model {}", path.display()))?;
    ModelSnapshot::from_json(&bytes).with_context(|| format!("parse model {}", path.display()))
}

/// Read the model's rule annotations and merge every configured source.
fn load_rules(
    model: &ModelSnapshot,
    model_path: &Path,
    args: &SourceArgs,
) -> Result<(MergedRuleSet, IgnoreSet, Vec<Diagnostic>)> {
    let config = ModelRuleConfig::read(model);
    let (ignore, ignore_diagnostics) = IgnoreSet::read(model, &config);
    let plan = source_plan(args);
    let merged = plan.store(&config, model_path.parent())?.load();

    let mut diagnostics = config.diagnostics.clone();
    diagnostics.extend(ignore_diagnostics);
    diagnostics.extend(merged.diagnostics().iter().cloned());
    Ok((merged, ignore, diagnostics))
}

/// Command-line paths override the environment.
fn source_plan(args: &SourceArgs) -> SourcePlan {
    let mut locations = RuleLocations::from_env();
    if let Some(path) = &args.user_rules {
        locations.user = Some(path.clone());
    }
    if let Some(path) = &args.machine_rules {
        locations.machine = Some(path.clone());
    }
    if let Some(path) = &args.preferences {
        locations.preferences = Some(path.clone());
    }
    SourcePlan {
        locations,
        urls: args.rules_urls.clone(),
        include_builtin: !args.no_builtin,
        precedence: if args.local_first {
            PrecedenceOrder::LocalFirst
        } else {
            PrecedenceOrder::Listed
        },
    }
}
