//! Predicate and fix evaluation against an in-memory model.

use std::time::Instant;

use bpa_expr::{ActionError, CompileError, Compiler, Deadline, EvalError};
use bpa_model::{
    GraphError, ModelGraph, ModelGraphMut, ModelSnapshot, ObjectRef, ScopeTag, Value,
};

struct Fixture {
    model: ModelSnapshot,
    sales: ObjectRef,
    amount: ObjectRef,
    key: ObjectRef,
    total: ObjectRef,
    share: ObjectRef,
    relationship: ObjectRef,
}

fn fixture() -> Fixture {
    let mut model = ModelSnapshot::new(1600);
    let root = model.root();
    let sales = model.add(ScopeTag::Table, "Sales", root);
    model.add(ScopeTag::Partition, "Sales", sales);
    let key = model.add(ScopeTag::DataColumn, "Key", sales);
    model.set(key, "IsHidden", true);
    let amount = model.add(ScopeTag::DataColumn, "Amount", sales);
    model
        .set(amount, "DataType", Value::enum_value("Double"))
        .set(amount, "SourceColumn", "amount")
        .set(amount, "SortByColumn", key);
    let total = model.add(ScopeTag::Measure, "Total", sales);
    model
        .set(total, "Expression", "SUM('Sales'[Amount])")
        .set(total, "Description", "Total sales")
        .annotate(total, "Owner", "finance");
    let share = model.add(ScopeTag::Measure, "Share", sales);
    model.set(share, "Expression", "[Total] / SUM(Amount) // \"a/b\"");
    model.add_dependency(total, amount, true).expect("dependency");
    model.add_dependency(share, total, false).expect("dependency");
    model.add_dependency(share, amount, false).expect("dependency");
    let relationship = model.add(ScopeTag::Relationship, "Sales-Key", root);
    model
        .set(relationship, "FromColumn", amount)
        .set(relationship, "ToColumn", key)
        .set(
            relationship,
            "CrossFilteringBehavior",
            Value::enum_value("BothDirections"),
        );
    Fixture {
        model,
        sales,
        amount,
        key,
        total,
        share,
        relationship,
    }
}

fn check(scope: &[ScopeTag], expression: &str, model: &ModelSnapshot, object: ObjectRef) -> bool {
    Compiler::for_scope(scope.iter().copied())
        .predicate(expression)
        .expect("predicate compiles")
        .evaluate(model, object, None, Deadline::none())
        .expect("predicate evaluates")
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn missing_description_matches_only_blank_measures() {
    let fx = fixture();
    let expression = "string.IsNullOrWhitespace(Description)";
    assert!(!check(&[ScopeTag::Measure], expression, &fx.model, fx.total));
    assert!(check(&[ScopeTag::Measure], expression, &fx.model, fx.share));
}

#[test]
fn enum_properties_compare_with_literals_and_strings() {
    let fx = fixture();
    let scope = [ScopeTag::DataColumn];
    assert!(check(&scope, "DataType = DataType.Double", &fx.model, fx.amount));
    assert!(check(&scope, "DataType = \"Double\"", &fx.model, fx.amount));
    assert!(!check(&scope, "DataType = DataType.Int64", &fx.model, fx.amount));
    assert!(check(
        &[ScopeTag::Relationship],
        "CrossFilteringBehavior = CrossFilteringBehavior.BothDirections and FromColumn.DataType != ToColumn.DataType",
        &fx.model,
        fx.relationship,
    ));
}

#[test]
fn outer_it_refers_to_the_enclosing_scope() {
    let fx = fixture();
    let expression = "Table.Columns.Any(SortByColumn = outerIt)";
    assert!(check(&[ScopeTag::DataColumn], expression, &fx.model, fx.key));
    assert!(!check(&[ScopeTag::DataColumn], expression, &fx.model, fx.amount));

    let nested = "Model.Tables.Any(Measures.Any(Table = outerIt and Name = \"Share\"))";
    assert!(check(&[ScopeTag::Measure], nested, &fx.model, fx.total));
}

#[test]
fn top_level_outer_binding_is_supplied_by_the_caller() {
    let fx = fixture();
    let predicate = Compiler::for_scope([ScopeTag::Measure])
        .predicate("Table = outerIt")
        .expect("compiles");
    let inside = predicate
        .evaluate(&fx.model, fx.total, Some(fx.sales), Deadline::none())
        .expect("evaluates");
    let outside = predicate
        .evaluate(&fx.model, fx.total, None, Deadline::none())
        .expect("evaluates");
    assert!(inside);
    assert!(!outside);
}

#[test]
fn depends_on_groups_expose_qualification() {
    let fx = fixture();
    let unqualified_column =
        "DependsOn.Any(Key.ObjectType = ObjectType.Column and Value.Any(not FullyQualified))";
    assert!(check(&[ScopeTag::Measure], unqualified_column, &fx.model, fx.share));
    assert!(!check(&[ScopeTag::Measure], unqualified_column, &fx.model, fx.total));
    assert!(check(
        &[ScopeTag::Measure],
        "DependsOn.Count = 2 and DependsOn.Measures.Count = 1 and DependsOn.Columns.Any(Name = \"Amount\")",
        &fx.model,
        fx.share,
    ));
}

#[test]
fn referenced_by_counts_distinct_referrers() {
    let fx = fixture();
    let unused = "ReferencedBy.Count = 0";
    assert!(check(&[ScopeTag::Measure], unused, &fx.model, fx.share));
    assert!(!check(&[ScopeTag::Measure], unused, &fx.model, fx.total));
    assert!(check(
        &[ScopeTag::DataColumn],
        "ReferencedBy.Count = 2 and ReferencedBy.AllMeasures.Count(Name = \"Share\") = 1",
        &fx.model,
        fx.amount,
    ));
}

#[test]
fn tokenize_ignores_division_inside_comments_and_strings() {
    let fx = fixture();
    let unsafe_division = "Expression.Tokenize().Any(Type = TokenType.DIV)";
    assert!(check(&[ScopeTag::Measure], unsafe_division, &fx.model, fx.share));
    assert!(!check(&[ScopeTag::Measure], unsafe_division, &fx.model, fx.total));
    assert!(check(
        &[ScopeTag::Measure],
        "Expression.Tokenize().Any(Type = TokenType.DIV and Previous.Type = TokenType.COLUMN_OR_MEASURE and Next.Text = \"SUM\")",
        &fx.model,
        fx.share,
    ));
}

#[test]
fn string_functions_and_regex() {
    let fx = fixture();
    let scope = [ScopeTag::Measure];
    assert!(check(&scope, "Name.StartsWith(\"To\") and Name.Length = 5", &fx.model, fx.total));
    assert!(check(&scope, "RegEx.IsMatch(Name, \"(?i)^total$\")", &fx.model, fx.total));
    assert!(check(&scope, "Expression.IndexOf(\"sum\", StringComparison.OrdinalIgnoreCase) = 0", &fx.model, fx.total));
    assert!(check(&scope, "Name + \"!\" = \"Total!\"", &fx.model, fx.total));
    assert!(check(&scope, "HasAnnotation(\"Owner\") and GetAnnotation(\"Owner\") = \"finance\"", &fx.model, fx.total));
    assert!(check(&scope, "GetAnnotation(\"Missing\") = null", &fx.model, fx.total));
}

#[test]
fn combinators_filter_and_count() {
    let fx = fixture();
    let scope = [ScopeTag::Table];
    assert!(check(&scope, "Columns.Count(IsHidden) = 1", &fx.model, fx.sales));
    assert!(check(&scope, "Columns.Where(not IsHidden).Count = 1", &fx.model, fx.sales));
    assert!(check(&scope, "Measures.First(Name = \"Share\").Name = \"Share\"", &fx.model, fx.sales));
    assert!(check(&scope, "Columns.All(Table = outerIt)", &fx.model, fx.sales));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn null_navigation_is_a_runtime_error() {
    let fx = fixture();
    let predicate = Compiler::for_scope([ScopeTag::DataColumn])
        .predicate("SortByColumn.Name = \"Key\"")
        .expect("compiles");
    assert!(
        predicate
            .evaluate(&fx.model, fx.amount, None, Deadline::none())
            .expect("evaluates")
    );
    assert_eq!(
        predicate
            .evaluate(&fx.model, fx.key, None, Deadline::none())
            .expect_err("null sort column"),
        EvalError::NullReference {
            member: "Name".into()
        }
    );
}

#[test]
fn property_missing_on_one_scope_member_fails_at_runtime() {
    let fx = fixture();
    let predicate = Compiler::for_scope([ScopeTag::Measure, ScopeTag::DataColumn])
        .predicate("string.IsNullOrEmpty(SourceColumn)")
        .expect("declared on DataColumn");
    assert!(matches!(
        predicate.evaluate(&fx.model, fx.total, None, Deadline::none()),
        Err(EvalError::Graph(GraphError::PropertyNotFound { .. }))
    ));
}

#[test]
fn unbalanced_parentheses_do_not_compile() {
    assert!(matches!(
        Compiler::for_scope([ScopeTag::Measure]).predicate("(IsHidden and not IsHidden"),
        Err(CompileError::Syntax { .. })
    ));
}

#[test]
fn expired_deadline_times_out() {
    let fx = fixture();
    let predicate = Compiler::for_scope([ScopeTag::Table])
        .predicate("Columns.Any(IsHidden)")
        .expect("compiles");
    assert_eq!(
        predicate.evaluate(&fx.model, fx.sales, None, Deadline::at(Instant::now())),
        Err(EvalError::Timeout)
    );
}

// ============================================================================
// Fixes
// ============================================================================

#[test]
fn assignment_fix_updates_the_object() {
    let mut fx = fixture();
    let fix = Compiler::for_scope([ScopeTag::DataColumn])
        .action("IsHidden = true; Table.IsHidden = true")
        .expect("compiles");
    assert_eq!(fix.apply(&mut fx.model, fx.amount).expect("applies"), 2);
    assert_eq!(
        fx.model.property(fx.amount, "IsHidden").expect("property"),
        Value::Bool(true)
    );
    assert_eq!(
        fx.model.property(fx.sales, "IsHidden").expect("property"),
        Value::Bool(true)
    );
}

#[test]
fn trim_fix_renames() {
    let mut fx = fixture();
    fx.model.set(fx.total, "Name", " Total ");
    let fix = Compiler::for_scope([ScopeTag::Measure])
        .action("Name = Name.Trim()")
        .expect("compiles");
    fix.apply(&mut fx.model, fx.total).expect("applies");
    assert_eq!(fx.model.name(fx.total).expect("name"), "Total");
}

#[test]
fn enum_fix_and_annotations() {
    let mut fx = fixture();
    fx.model.annotate(fx.relationship, "Old", "1");
    let fix = Compiler::for_scope([ScopeTag::Relationship])
        .action(
            "CrossFilteringBehavior = CrossFilteringBehavior.OneDirection; \
             SetAnnotation(\"Reviewed\", \"yes\"); RemoveAnnotation(\"Old\")",
        )
        .expect("compiles");
    assert_eq!(fix.apply(&mut fx.model, fx.relationship).expect("applies"), 3);
    assert_eq!(
        fx.model
            .property(fx.relationship, "CrossFilteringBehavior")
            .expect("property"),
        Value::enum_value("OneDirection")
    );
    assert_eq!(
        fx.model.annotation(fx.relationship, "Reviewed").expect("annotation"),
        Some("yes".to_string())
    );
    assert_eq!(fx.model.annotation(fx.relationship, "Old").expect("annotation"), None);
}

#[test]
fn rejected_mutations_surface_as_errors() {
    let mut fx = fixture();
    let partition = fx.model.find(ScopeTag::Partition, "Sales").expect("partition");
    let delete = Compiler::for_scope([ScopeTag::Partition])
        .action("Delete()")
        .expect("compiles");
    assert!(matches!(
        delete.apply(&mut fx.model, partition),
        Err(ActionError {
            applied: 0,
            error: EvalError::Graph(GraphError::Rejected { .. })
        })
    ));

    let wrong_type = Compiler::for_scope([ScopeTag::Measure])
        .action("IsHidden = \"yes\"")
        .expect("compiles");
    assert!(matches!(
        wrong_type.apply(&mut fx.model, fx.total),
        Err(ActionError {
            applied: 0,
            error: EvalError::Graph(GraphError::TypeMismatch { .. })
        })
    ));
}

#[test]
fn failing_step_reports_the_steps_already_written() {
    let mut fx = fixture();
    let action = Compiler::for_scope([ScopeTag::Measure])
        .action("SetAnnotation(\"Reviewed\", \"yes\"); IsHidden = \"yes\"; Delete()")
        .expect("compiles");
    let err = action.apply(&mut fx.model, fx.total).expect_err("second step fails");
    assert_eq!(err.applied, 1);
    assert!(matches!(err.error, EvalError::Graph(GraphError::TypeMismatch { .. })));
    assert_eq!(
        fx.model.annotation(fx.total, "Reviewed").expect("annotation"),
        Some("yes".to_string())
    );
    assert!(fx.model.contains(fx.total));
}

#[test]
fn delete_fix_removes_the_object_and_its_edges() {
    let mut fx = fixture();
    let delete = Compiler::for_scope([ScopeTag::Measure])
        .action("Delete()")
        .expect("compiles");
    delete.apply(&mut fx.model, fx.share).expect("applies");
    fx.model.refresh_dependencies();
    assert!(!fx.model.contains(fx.share));
    assert!(check(&[ScopeTag::Measure], "ReferencedBy.Count = 0", &fx.model, fx.total));
}
