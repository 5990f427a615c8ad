use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use bpa_model::{Diagnostic, DiagnosticLevel, Severity, Violation};

use crate::types::{AnalyzeResult, AuditResult, LintResult};

pub fn print_lint(result: &LintResult) {
    println!("Rule file: {}", result.path.display());
    if let Some(fixes) = result.fixes_written {
        println!("Fixes written: {fixes}");
    }
    println!("{}", result.report.render());
}

pub fn print_audit(result: &AuditResult) {
    let audit = &result.audit;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rank"),
        header_cell("Kind"),
        header_cell("Source"),
        header_cell("Rules"),
        header_cell("Active"),
        header_cell("Overridden"),
        header_cell("Ignored"),
        header_cell("Rejected"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    for index in [0, 3, 4, 5, 6, 7] {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for source in &audit.sources {
        let status = match &source.error {
            Some(error) => Cell::new(error).fg(Color::Red),
            None if source.disabled > 0 => {
                Cell::new(format!("{} disabled", source.disabled)).fg(Color::Yellow)
            }
            None => Cell::new("loaded").fg(Color::Green),
        };
        table.add_row(vec![
            dim_cell(source.rank),
            Cell::new(source.kind.as_str())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&source.id),
            Cell::new(source.rule_count),
            count_cell(source.active.len(), Color::Green),
            count_cell(source.overridden.len(), Color::Yellow),
            count_cell(source.ignored.len(), Color::Yellow),
            count_cell(source.rejected, Color::Red),
            status,
        ]);
    }
    table.add_row(vec![
        dim_cell("-"),
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new("Merged rule set")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(audit.total).add_attribute(Attribute::Bold),
        count_cell(audit.active, Color::Green).add_attribute(Attribute::Bold),
        dim_cell("-"),
        count_cell(audit.ignored, Color::Yellow).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    println!("{table}");
    print_diagnostics(&result.diagnostics);
}

pub fn print_analysis(result: &AnalyzeResult) {
    let analysis = &result.analysis;
    println!("Model: {}", result.model.display());
    println!(
        "Rules: {} merged, {} evaluated, {} skipped",
        result.rule_count, analysis.rules_evaluated, analysis.rules_skipped
    );
    if let Some(fixes) = &result.fixes {
        println!(
            "Fixes: {} applied, {} failed, {} without fix",
            fixes.applied.len(),
            fixes.failures.len(),
            fixes.unfixable.len()
        );
    }
    if let Some(path) = &result.written_model {
        println!("Model written: {}", path.display());
    }
    if let Some(path) = &result.report {
        println!("Report: {}", path.display());
    }
    if let Some(path) = &result.csv {
        println!("CSV: {}", path.display());
    }

    if analysis.violations.is_empty() {
        println!("No violations.");
    } else {
        print_violation_table(&analysis.violations);
    }
    if !analysis.ignored.is_empty() {
        println!("{} violation(s) ignored by model annotations.", analysis.ignored.len());
    }

    let mut diagnostics = result.load_diagnostics.clone();
    diagnostics.extend(analysis.diagnostics.iter().cloned());
    if let Some(fixes) = &result.fixes {
        diagnostics.extend(fixes.diagnostics());
    }
    diagnostics.sort();
    print_diagnostics(&diagnostics);
}

fn print_violation_table(violations: &[Violation]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Rule"),
        header_cell("Type"),
        header_cell("Object"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    table.set_constraints(vec![
        ColumnConstraint::UpperBoundary(Width::Fixed(9)),
        ColumnConstraint::UpperBoundary(Width::Percentage(25)),
        ColumnConstraint::UpperBoundary(Width::Fixed(16)),
        ColumnConstraint::UpperBoundary(Width::Percentage(25)),
        ColumnConstraint::UpperBoundary(Width::Percentage(40)),
    ]);
    for violation in violations {
        table.add_row(vec![
            severity_cell(violation.rule.severity),
            Cell::new(violation.rule_id()),
            dim_cell(violation.object_type.as_str()),
            Cell::new(&violation.object_name),
            Cell::new(&violation.message),
        ]);
    }
    println!();
    println!("Violations:");
    println!("{table}");
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Level"),
        header_cell("Kind"),
        header_cell("Source"),
        header_cell("Rule"),
        header_cell("Object"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    for diagnostic in diagnostics {
        table.add_row(vec![
            level_cell(diagnostic.level),
            Cell::new(diagnostic.kind.label()),
            optional_cell(diagnostic.source.as_deref()),
            optional_cell(diagnostic.rule_id.as_deref()),
            optional_cell(diagnostic.object.as_deref()),
            Cell::new(&diagnostic.message),
        ]);
    }
    println!();
    println!("Diagnostics:");
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::High => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        Severity::Medium => Cell::new("WARN").fg(Color::Yellow),
        Severity::Low => Cell::new("INFO").fg(Color::Blue),
    }
}

fn level_cell(level: DiagnosticLevel) -> Cell {
    match level {
        DiagnosticLevel::Error => Cell::new("ERROR").fg(Color::Red),
        DiagnosticLevel::Warning => Cell::new("WARN").fg(Color::Yellow),
        DiagnosticLevel::Info => dim_cell("INFO"),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
