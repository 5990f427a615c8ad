//! End-to-end collector and fix applier behaviour on an in-memory model.

use bpa_analyze::{Analyzer, AnalyzerOptions, FixError, IgnoreSet, apply_fixes};
use bpa_model::{
    DiagnosticKind, ModelGraph, ModelSnapshot, ObjectRef, Rule, Scope, ScopeTag, Severity,
};
use bpa_rules::{InlineSource, LoadOptions, MergedRuleSet, RuleSourceKind, RuleStore};

struct Fixture {
    model: ModelSnapshot,
    m1: ObjectRef,
    m2: ObjectRef,
    share: ObjectRef,
    key: ObjectRef,
    amount: ObjectRef,
}

fn fixture() -> Fixture {
    let mut model = ModelSnapshot::new(1600);
    let root = model.root();
    let sales = model.add(ScopeTag::Table, "Sales", root);
    model.add(ScopeTag::Partition, "Sales", sales);
    let key = model.add(ScopeTag::DataColumn, "Key", sales);
    let amount = model.add(ScopeTag::DataColumn, "Amount", sales);
    model.set(amount, "SortByColumn", key);
    let m1 = model.add(ScopeTag::Measure, "M1", sales);
    model.set(m1, "Description", "").set(m1, "Expression", "1");
    let m2 = model.add(ScopeTag::Measure, "M2", sales);
    model
        .set(m2, "Description", "Total sales")
        .set(m2, "Expression", "SUM('Sales'[Amount])");
    let share = model.add(ScopeTag::Measure, "Share", sales);
    model
        .set(share, "Description", "Share of total")
        .set(share, "Expression", "[M2] / 2");
    model.add_dependency(m2, amount, true).expect("dependency");
    model.add_dependency(share, m2, false).expect("dependency");
    Fixture {
        model,
        m1,
        m2,
        share,
        key,
        amount,
    }
}

fn rule(id: &str, tag: ScopeTag, expression: &str) -> Rule {
    Rule::new(id, id, Severity::Medium, Scope::from(tag), expression)
}

fn no_description() -> Rule {
    rule(
        "META_NO_DESC",
        ScopeTag::Measure,
        "IsNullOrWhitespace(Description)",
    )
}

fn pairs(violations: &[bpa_model::Violation]) -> Vec<(String, ObjectRef)> {
    violations
        .iter()
        .map(|violation| (violation.rule_id().to_string(), violation.object))
        .collect()
}

// ============================================================================
// Collector
// ============================================================================

#[test]
fn blank_description_yields_exactly_one_violation() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([no_description()]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(pairs(&analysis.violations), vec![("META_NO_DESC".to_string(), fx.m1)]);
    assert!(analysis.diagnostics.is_empty());
    assert_eq!(analysis.rules_evaluated, 1);
}

#[test]
fn running_twice_gives_the_same_violations() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([
        no_description(),
        Rule::new(
            "META_VISIBLE",
            "Visible columns",
            Severity::Low,
            Scope::parse("Column").expect("scope"),
            "not IsHidden",
        ),
    ]);
    let analyzer = Analyzer::default();
    let first = analyzer.run(&rules, &fx.model, &IgnoreSet::new());
    let second = analyzer.run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(pairs(&first.violations), pairs(&second.violations));
    assert!(!first.violations.is_empty());
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([
        no_description(),
        rule("REF_UNUSED", ScopeTag::Measure, "ReferencedBy.Count = 0"),
    ]);
    let parallel = Analyzer::new(AnalyzerOptions::default().with_parallel(true));
    let sequential = Analyzer::new(AnalyzerOptions::default().with_parallel(false));
    assert_eq!(
        pairs(&parallel.run(&rules, &fx.model, &IgnoreSet::new()).violations),
        pairs(&sequential.run(&rules, &fx.model, &IgnoreSet::new()).violations)
    );
}

#[test]
fn violations_are_sorted_by_type_name_and_rule() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([
        rule("Z_ALL", ScopeTag::Measure, "true"),
        rule("A_ALL", ScopeTag::Measure, "true"),
        rule("T_ALL", ScopeTag::Table, "true"),
    ]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    let keys: Vec<(ScopeTag, String, String)> = analysis
        .violations
        .iter()
        .map(|v| (v.object_type, v.object_name.clone(), v.rule_id().to_string()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(analysis.violations.len(), 7);
}

#[test]
fn ignore_is_global_or_per_object() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([no_description()]);
    let analyzer = Analyzer::default();

    let global = IgnoreSet::new().ignore_globally("META_NO_DESC");
    let analysis = analyzer.run(&rules, &fx.model, &global);
    assert!(analysis.violations.is_empty());
    assert_eq!(pairs(&analysis.ignored), vec![("META_NO_DESC".to_string(), fx.m1)]);

    let elsewhere = IgnoreSet::new().ignore_on(fx.m2, "META_NO_DESC");
    let analysis = analyzer.run(&rules, &fx.model, &elsewhere);
    assert_eq!(pairs(&analysis.violations), vec![("META_NO_DESC".to_string(), fx.m1)]);
    assert!(analysis.ignored.is_empty());
}

#[test]
fn compile_error_excludes_only_that_rule() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([
        no_description(),
        rule("BROKEN", ScopeTag::Measure, "(IsHidden and not (IsHidden)"),
    ]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(analysis.violations.len(), 1);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].kind, DiagnosticKind::Compile);
    assert_eq!(analysis.diagnostics[0].rule_id.as_deref(), Some("BROKEN"));
    assert_eq!(analysis.rules_evaluated, 1);
}

#[test]
fn compile_error_names_the_file_the_rule_came_from() {
    let fx = fixture();
    let document = r#"[
        {"ID": "BROKEN", "Name": "Broken", "Severity": 2, "Scope": "Measure",
         "Expression": "(IsHidden and not (IsHidden"}
    ]"#;
    let rules = RuleStore::new(LoadOptions::default())
        .with_source(InlineSource::new(
            RuleSourceKind::UserFile,
            "C:/rules/user.json",
            document,
        ))
        .load();
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].kind, DiagnosticKind::Compile);
    assert_eq!(analysis.diagnostics[0].rule_id.as_deref(), Some("BROKEN"));
    assert_eq!(analysis.diagnostics[0].source.as_deref(), Some("C:/rules/user.json"));
}

#[test]
fn newer_compatibility_level_skips_the_rule_entirely() {
    let fx = fixture();
    let mut future = rule("FUTURE", ScopeTag::Measure, "((( not even valid");
    future.compatibility_level = Some(1700);
    let rules = MergedRuleSet::from_rules([future, no_description()]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(analysis.rules_skipped, 1);
    assert_eq!(analysis.rules_evaluated, 1);
    assert!(analysis.diagnostics.is_empty());
    assert!(analysis.violations.iter().all(|v| v.rule_id() != "FUTURE"));
}

#[test]
fn runtime_error_on_one_object_does_not_stop_the_rule() {
    let fx = fixture();
    let rules = MergedRuleSet::from_rules([rule(
        "SORT_BY_KEY",
        ScopeTag::DataColumn,
        "SortByColumn.Name = \"Key\"",
    )]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(pairs(&analysis.violations), vec![("SORT_BY_KEY".to_string(), fx.amount)]);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(analysis.diagnostics[0].object.as_deref(), Some("'Sales'[Key]"));
}

// ============================================================================
// Fixes
// ============================================================================

#[test]
fn fixed_objects_no_longer_violate() {
    let mut fx = fixture();
    let hide = rule(
        "LAYOUT_HIDE_UNUSED",
        ScopeTag::DataColumn,
        "not IsHidden and ReferencedBy.Count = 0",
    )
    .with_fix("IsHidden = true");
    let rules = MergedRuleSet::from_rules([hide]);
    let analyzer = Analyzer::default();

    let before = analyzer.run(&rules, &fx.model, &IgnoreSet::new());
    assert_eq!(
        pairs(&before.violations),
        vec![("LAYOUT_HIDE_UNUSED".to_string(), fx.key)]
    );

    let outcome = apply_fixes(&mut fx.model, &before.violations);
    assert_eq!(outcome.applied.len(), 1);
    assert!(outcome.failures.is_empty());

    let after = analyzer.run(&rules, &fx.model, &IgnoreSet::new());
    assert!(after.violations.is_empty());
}

#[test]
fn dependencies_are_refreshed_between_fixes() {
    let mut fx = fixture();
    let delete = Rule::new(
        "MAINT_DROP_SHARE",
        "Drop share",
        Severity::High,
        Scope::from(ScopeTag::Measure),
        "Name = \"Share\"",
    )
    .with_fix("Delete()");
    let rules = MergedRuleSet::from_rules([delete]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    assert!(analysis.has_high_severity());

    let outcome = apply_fixes(&mut fx.model, &analysis.violations);
    assert_eq!(outcome.applied.len(), 1);
    assert!(!fx.model.contains(fx.share));

    let unused = MergedRuleSet::from_rules([rule(
        "REF_UNUSED",
        ScopeTag::Measure,
        "ReferencedBy.Count = 0",
    )]);
    let analysis = Analyzer::default().run(&unused, &fx.model, &IgnoreSet::new());
    let flagged: Vec<ObjectRef> = analysis.violations.iter().map(|v| v.object).collect();
    assert!(flagged.contains(&fx.m2));
    assert!(flagged.contains(&fx.m1));
}

#[test]
fn only_partition_cannot_be_deleted() {
    let mut fx = fixture();
    let drop = Rule::new(
        "MAINT_DROP_PARTITIONS",
        "Drop partitions",
        Severity::High,
        Scope::from(ScopeTag::Partition),
        "true",
    )
    .with_fix("Delete()");
    let rules = MergedRuleSet::from_rules([drop]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());
    let outcome = apply_fixes(&mut fx.model, &analysis.violations);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.diagnostics()[0].kind, DiagnosticKind::FixApplication);
}

#[test]
fn failed_fix_still_refreshes_dependencies() {
    let mut fx = fixture();
    let drop_then_hide = Rule::new(
        "MAINT_DROP_SHARE",
        "Drop share",
        Severity::High,
        Scope::from(ScopeTag::Measure),
        "Name = \"Share\"",
    )
    .with_fix("Delete(); IsHidden = true");
    let rules = MergedRuleSet::from_rules([drop_then_hide]);
    let analysis = Analyzer::default().run(&rules, &fx.model, &IgnoreSet::new());

    let outcome = apply_fixes(&mut fx.model, &analysis.violations);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].error,
        FixError::Partial { applied_steps: 1, .. }
    ));
    assert!(outcome.diagnostics()[0].message.starts_with("fix stopped after 1 step(s)"));
    assert!(!fx.model.contains(fx.share));

    let unused = MergedRuleSet::from_rules([rule(
        "REF_UNUSED",
        ScopeTag::Measure,
        "ReferencedBy.Count = 0",
    )]);
    let analysis = Analyzer::default().run(&unused, &fx.model, &IgnoreSet::new());
    assert!(analysis.violations.iter().any(|v| v.object == fx.m2));
}

#[test]
fn ignore_annotations_written_by_fixes_are_honoured_on_rerun() {
    let mut fx = fixture();
    let acknowledge = no_description()
        .with_fix("SetAnnotation(\"BestPracticeAnalyzer_Ignore\", '{\"RuleIDs\": [\"META_NO_DESC\"]}')");
    let rules = MergedRuleSet::from_rules([acknowledge]);
    let analyzer = Analyzer::default();
    let (ignore, _) = IgnoreSet::from_model(&fx.model);
    let before = analyzer.run(&rules, &fx.model, &ignore);
    assert_eq!(pairs(&before.violations), vec![("META_NO_DESC".to_string(), fx.m1)]);

    let outcome = apply_fixes(&mut fx.model, &before.violations);
    assert_eq!(outcome.applied.len(), 1);

    let stale = analyzer.run(&rules, &fx.model, &ignore);
    assert_eq!(stale.violations.len(), 1);

    let (ignore, diagnostics) = IgnoreSet::from_model(&fx.model);
    assert!(diagnostics.is_empty());
    let after = analyzer.run(&rules, &fx.model, &ignore);
    assert!(after.violations.is_empty());
    assert_eq!(pairs(&after.ignored), vec![("META_NO_DESC".to_string(), fx.m1)]);
}
