//! Lowering of parsed expressions into executable trees.
//!
//! Root identifiers of a predicate are checked against the properties the
//! rule's scope exposes. Identifiers inside combinator predicates refer to
//! collection elements whose type is only known at run time and are
//! resolved lazily.

use std::collections::BTreeSet;
use std::fmt;

use bpa_model::capabilities::UNIVERSAL;
use bpa_model::{PropertyKind, ScopeTag};
use regex::Regex;

use crate::ast::{Expr, Literal, UnaryOp};
use crate::dax::TokenTag;
use crate::error::CompileError;
use crate::lexer::BinaryOp;
use crate::parser::parse_expression;
use crate::value::Val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringTest {
    IsNullOrEmpty,
    IsNullOrWhitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Any,
    All,
    Count,
    Where,
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Contains,
    StartsWith,
    EndsWith,
    IndexOf,
    Equals,
    ToUpper,
    ToLower,
    Trim,
    Replace,
    Tokenize,
}

impl Method {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Contains => "Contains",
            Self::StartsWith => "StartsWith",
            Self::EndsWith => "EndsWith",
            Self::IndexOf => "IndexOf",
            Self::Equals => "Equals",
            Self::ToUpper => "ToUpper",
            Self::ToLower => "ToLower",
            Self::Trim => "Trim",
            Self::Replace => "Replace",
            Self::Tokenize => "Tokenize",
        }
    }
}

impl Combinator {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::All => "All",
            Self::Count => "Count",
            Self::Where => "Where",
            Self::First => "First",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Pattern {
    Static(Regex),
    Dynamic(Box<Node>),
}

#[derive(Debug)]
pub(crate) enum Node {
    Const(Val),
    It,
    OuterIt,
    Model,
    Member {
        target: Box<Node>,
        name: String,
    },
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    StringTest {
        test: StringTest,
        arg: Box<Node>,
    },
    IsMatch {
        input: Box<Node>,
        pattern: Pattern,
    },
    Annotation {
        target: Box<Node>,
        key: Box<Node>,
        has: bool,
    },
    Method {
        target: Box<Node>,
        method: Method,
        args: Vec<Node>,
    },
    Combinator {
        target: Box<Node>,
        kind: Combinator,
        predicate: Option<Box<Node>>,
    },
}

/// Statically known shape of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaticType {
    Bool,
    Number,
    Text,
    Enum,
    Object,
    Collection,
    Null,
    Unknown,
}

impl StaticType {
    fn from_kind(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Text => Self::Text,
            PropertyKind::Flag => Self::Bool,
            PropertyKind::Integer | PropertyKind::Real => Self::Number,
            PropertyKind::Enum => Self::Enum,
            PropertyKind::Object => Self::Object,
            PropertyKind::Objects => Self::Collection,
        }
    }

    fn is_open(self) -> bool {
        matches!(self, Self::Unknown | Self::Null)
    }

    fn comparable_with(self, other: StaticType) -> bool {
        self.is_open()
            || other.is_open()
            || self == other
            || matches!(
                (self, other),
                (Self::Text, Self::Enum) | (Self::Enum, Self::Text)
            )
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Text => "string",
            Self::Enum => "enum",
            Self::Object => "object",
            Self::Collection => "collection",
            Self::Null => "null",
            Self::Unknown => "unknown",
        })
    }
}

/// Where identifiers are being resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Context<'a> {
    /// The rule candidate, typed by the rule's scope.
    Candidate(&'a BTreeSet<ScopeTag>),
    /// A collection element, or a compiler without a scope.
    Element,
}

type Typed = (Node, StaticType);

/// A compiled rule predicate.
#[derive(Debug)]
pub struct CompiledPredicate {
    source: String,
    pub(crate) root: Node,
}

impl CompiledPredicate {
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compiles predicate and fix expressions for one rule scope.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    tags: Option<BTreeSet<ScopeTag>>,
}

impl Compiler {
    /// A compiler that does not check identifiers against any scope.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_scope(tags: impl IntoIterator<Item = ScopeTag>) -> Self {
        Self {
            tags: Some(tags.into_iter().collect()),
        }
    }

    pub fn predicate(&self, text: &str) -> Result<CompiledPredicate, CompileError> {
        let expr = parse_expression(text)?;
        let (root, ty) = self.expr(&expr, self.root_context())?;
        require_bool(ty, "a rule expression")?;
        Ok(CompiledPredicate {
            source: text.to_string(),
            root,
        })
    }

    pub(crate) fn root_context(&self) -> Context<'_> {
        match &self.tags {
            Some(tags) => Context::Candidate(tags),
            None => Context::Element,
        }
    }

    pub(crate) fn expr(&self, expr: &Expr, ctx: Context<'_>) -> Result<Typed, CompileError> {
        match expr {
            Expr::Literal(literal) => Ok(literal_node(literal)),
            Expr::Ident { name, .. } => self.ident(name, ctx),
            Expr::Member { target, name, .. } => self.member(target, name, ctx),
            Expr::Call {
                target, name, args, ..
            } => self.call(target.as_deref(), name, args, ctx),
            Expr::Unary { op, expr } => {
                let (node, ty) = self.expr(expr, ctx)?;
                match op {
                    UnaryOp::Not => {
                        require_bool(ty, "the operand of 'not'")?;
                        Ok((Node::Not(Box::new(node)), StaticType::Bool))
                    }
                    UnaryOp::Neg => {
                        if !(ty.is_open() || ty == StaticType::Number) {
                            return Err(CompileError::mismatch(format!(
                                "cannot negate a {ty} value"
                            )));
                        }
                        Ok((Node::Neg(Box::new(node)), ty))
                    }
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, ctx),
        }
    }

    fn ident(&self, name: &str, ctx: Context<'_>) -> Result<Typed, CompileError> {
        if name.eq_ignore_ascii_case("it") {
            return Ok((Node::It, StaticType::Unknown));
        }
        if name.eq_ignore_ascii_case("outerIt") {
            return Ok((Node::OuterIt, StaticType::Unknown));
        }
        if name == "Model" {
            return Ok((Node::Model, StaticType::Object));
        }
        match ctx {
            Context::Candidate(tags) => {
                let (canonical, ty) = resolve_property(tags, name)?;
                Ok((
                    Node::Member {
                        target: Box::new(Node::It),
                        name: canonical.to_string(),
                    },
                    ty,
                ))
            }
            Context::Element => Ok((
                Node::Member {
                    target: Box::new(Node::It),
                    name: name.to_string(),
                },
                StaticType::Unknown,
            )),
        }
    }

    fn member(&self, target: &Expr, name: &str, ctx: Context<'_>) -> Result<Typed, CompileError> {
        if let Expr::Ident { name: namespace, .. } = target {
            match enum_literal(namespace, name) {
                Some(Ok(member)) => return Ok((Node::Const(Val::Enum(member)), StaticType::Enum)),
                Some(Err(err)) if !names_property(namespace, ctx) => return Err(err),
                _ => {}
            }
        }
        let (target, _) = self.expr(target, ctx)?;
        let ty = if name.eq_ignore_ascii_case("Count") || name.eq_ignore_ascii_case("Length") {
            StaticType::Number
        } else {
            StaticType::Unknown
        };
        Ok((
            Node::Member {
                target: Box::new(target),
                name: name.to_string(),
            },
            ty,
        ))
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: Context<'_>,
    ) -> Result<Typed, CompileError> {
        let (left, lt) = self.expr(left, ctx)?;
        let (right, rt) = self.expr(right, ctx)?;
        let ty = if op.is_logical() {
            require_bool(lt, &format!("the left operand of '{}'", op.symbol()))?;
            require_bool(rt, &format!("the right operand of '{}'", op.symbol()))?;
            StaticType::Bool
        } else if op.is_comparison() {
            if !lt.comparable_with(rt) {
                return Err(CompileError::mismatch(format!(
                    "cannot compare {lt} with {rt} using '{}'",
                    op.symbol()
                )));
            }
            StaticType::Bool
        } else if op == BinaryOp::Add && (lt == StaticType::Text || rt == StaticType::Text) {
            StaticType::Text
        } else if lt == StaticType::Number && rt == StaticType::Number {
            StaticType::Number
        } else {
            StaticType::Unknown
        };
        Ok((
            Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        ))
    }

    fn call(
        &self,
        target: Option<&Expr>,
        name: &str,
        args: &[Expr],
        ctx: Context<'_>,
    ) -> Result<Typed, CompileError> {
        match target {
            None => self.function(name, args, ctx),
            Some(Expr::Ident { name: namespace, .. }) if namespace.eq_ignore_ascii_case("string") => {
                self.string_test(namespace, name, args, ctx)
            }
            Some(Expr::Ident { name: namespace, .. }) if namespace.eq_ignore_ascii_case("regex") => {
                self.regex(namespace, name, args, ctx)
            }
            Some(target) => {
                let (target, _) = self.expr(target, ctx)?;
                self.method(target, name, args, ctx)
            }
        }
    }

    /// Calls without a receiver apply to the current object.
    fn function(&self, name: &str, args: &[Expr], ctx: Context<'_>) -> Result<Typed, CompileError> {
        if name.eq_ignore_ascii_case("IsNullOrEmpty") || name.eq_ignore_ascii_case("IsNullOrWhitespace") {
            return self.string_test("string", name, args, ctx);
        }
        self.method(Node::It, name, args, ctx)
    }

    fn string_test(
        &self,
        namespace: &str,
        name: &str,
        args: &[Expr],
        ctx: Context<'_>,
    ) -> Result<Typed, CompileError> {
        let test = if name.eq_ignore_ascii_case("IsNullOrEmpty") {
            StringTest::IsNullOrEmpty
        } else if name.eq_ignore_ascii_case("IsNullOrWhitespace") {
            StringTest::IsNullOrWhitespace
        } else {
            return Err(CompileError::UnknownFunction {
                name: format!("{namespace}.{name}"),
            });
        };
        arity(name, args, 1, 1, "1")?;
        let (arg, ty) = self.expr(&args[0], ctx)?;
        require_text(ty, name)?;
        Ok((
            Node::StringTest {
                test,
                arg: Box::new(arg),
            },
            StaticType::Bool,
        ))
    }

    fn regex(
        &self,
        namespace: &str,
        name: &str,
        args: &[Expr],
        ctx: Context<'_>,
    ) -> Result<Typed, CompileError> {
        let qualified = format!("{namespace}.{name}");
        if !name.eq_ignore_ascii_case("IsMatch") {
            return Err(CompileError::UnknownFunction { name: qualified });
        }
        arity(&qualified, args, 2, 2, "exactly 2")?;
        let (input, ty) = self.expr(&args[0], ctx)?;
        require_text(ty, &qualified)?;
        let pattern = match &args[1] {
            Expr::Literal(Literal::Str(pattern)) => {
                let regex = Regex::new(pattern).map_err(|err| CompileError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })?;
                Pattern::Static(regex)
            }
            other => {
                let (pattern, ty) = self.expr(other, ctx)?;
                require_text(ty, &qualified)?;
                Pattern::Dynamic(Box::new(pattern))
            }
        };
        Ok((
            Node::IsMatch {
                input: Box::new(input),
                pattern,
            },
            StaticType::Bool,
        ))
    }

    fn method(
        &self,
        target: Node,
        name: &str,
        args: &[Expr],
        ctx: Context<'_>,
    ) -> Result<Typed, CompileError> {
        if let Some(kind) = combinator(name) {
            let (min, max, expected) = match kind {
                Combinator::All | Combinator::Where => (1, 1, "1"),
                Combinator::Any | Combinator::Count | Combinator::First => (0, 1, "0 or 1"),
            };
            arity(name, args, min, max, expected)?;
            let predicate = match args.first() {
                Some(arg) => {
                    let (node, ty) = self.expr(arg, Context::Element)?;
                    require_bool(ty, &format!("the predicate of {name}()"))?;
                    Some(Box::new(node))
                }
                None => None,
            };
            let ty = match kind {
                Combinator::Any | Combinator::All => StaticType::Bool,
                Combinator::Count => StaticType::Number,
                Combinator::Where => StaticType::Collection,
                Combinator::First => StaticType::Unknown,
            };
            return Ok((
                Node::Combinator {
                    target: Box::new(target),
                    kind,
                    predicate,
                },
                ty,
            ));
        }

        let has = name.eq_ignore_ascii_case("HasAnnotation");
        if has || name.eq_ignore_ascii_case("GetAnnotation") {
            arity(name, args, 1, 1, "1")?;
            let (key, ty) = self.expr(&args[0], ctx)?;
            require_text(ty, name)?;
            let ty = if has { StaticType::Bool } else { StaticType::Text };
            return Ok((
                Node::Annotation {
                    target: Box::new(target),
                    key: Box::new(key),
                    has,
                },
                ty,
            ));
        }

        let Some(method) = method(name) else {
            return Err(CompileError::UnknownFunction {
                name: name.to_string(),
            });
        };
        let (min, max, expected, ty) = match method {
            Method::Contains | Method::StartsWith | Method::EndsWith | Method::Equals => {
                (1, 2, "1 or 2", StaticType::Bool)
            }
            Method::IndexOf => (1, 2, "1 or 2", StaticType::Number),
            Method::ToUpper | Method::ToLower | Method::Trim => (0, 0, "0", StaticType::Text),
            Method::Replace => (2, 2, "2", StaticType::Text),
            Method::Tokenize => (0, 0, "0", StaticType::Collection),
        };
        arity(name, args, min, max, expected)?;
        let args = args
            .iter()
            .map(|arg| self.expr(arg, ctx).map(|(node, _)| node))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((
            Node::Method {
                target: Box::new(target),
                method,
                args,
            },
            ty,
        ))
    }

    /// Canonical name of a property a fix may assign.
    pub(crate) fn assignable(&self, name: &str) -> Result<String, CompileError> {
        let Some(tags) = &self.tags else {
            return Ok(name.to_string());
        };
        let mut canonical = None;
        let mut stored = false;
        for tag in tags {
            if let Some(spec) = find_property(*tag, name) {
                canonical.get_or_insert(spec.name);
                stored |= !spec.derived;
            }
        }
        match canonical {
            None => Err(CompileError::UnknownIdentifier {
                name: name.to_string(),
                scope: scope_label(tags),
            }),
            Some(canonical) if !stored => Err(CompileError::NotAssignable {
                target: canonical.to_string(),
            }),
            Some(canonical) => Ok(canonical.to_string()),
        }
    }
}

fn literal_node(literal: &Literal) -> Typed {
    match literal {
        Literal::Bool(value) => (Node::Const(Val::Bool(*value)), StaticType::Bool),
        Literal::Int(value) => (Node::Const(Val::Int(*value)), StaticType::Number),
        Literal::Real(value) => (Node::Const(Val::Real(*value)), StaticType::Number),
        Literal::Str(text) => (Node::Const(Val::Str(text.clone())), StaticType::Text),
        Literal::Null => (Node::Const(Val::Null), StaticType::Null),
    }
}

fn require_bool(ty: StaticType, what: &str) -> Result<(), CompileError> {
    if ty == StaticType::Bool || ty == StaticType::Unknown {
        Ok(())
    } else {
        Err(CompileError::mismatch(format!(
            "{what} must be a boolean, found {ty}"
        )))
    }
}

fn require_text(ty: StaticType, function: &str) -> Result<(), CompileError> {
    if ty.is_open() || matches!(ty, StaticType::Text | StaticType::Enum) {
        Ok(())
    } else {
        Err(CompileError::mismatch(format!(
            "{function} expects a string, found {ty}"
        )))
    }
}

fn arity(
    name: &str,
    args: &[Expr],
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), CompileError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(CompileError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn find_property(tag: ScopeTag, name: &str) -> Option<&'static bpa_model::PropertySpec> {
    UNIVERSAL
        .iter()
        .chain(tag.properties())
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Canonical spelling of a property on a runtime object type.
pub(crate) fn canonical_property(tag: ScopeTag, name: &str) -> Option<&'static str> {
    find_property(tag, name).map(|spec| spec.name)
}

fn scope_label(tags: &BTreeSet<ScopeTag>) -> String {
    tags.iter()
        .map(|tag| tag.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve a root identifier against every tag of the scope.
///
/// The identifier must exist on at least one tag; the static type is only
/// known when every tag declaring it agrees on the kind.
fn resolve_property(
    tags: &BTreeSet<ScopeTag>,
    name: &str,
) -> Result<(&'static str, StaticType), CompileError> {
    let mut found: Option<(&'static str, PropertyKind)> = None;
    let mut uniform = true;
    for tag in tags {
        if let Some(spec) = find_property(*tag, name) {
            match found {
                None => found = Some((spec.name, spec.kind)),
                Some((_, kind)) => uniform &= kind == spec.kind,
            }
        }
    }
    match found {
        Some((canonical, kind)) => {
            let ty = if uniform {
                StaticType::from_kind(kind)
            } else {
                StaticType::Unknown
            };
            Ok((canonical, ty))
        }
        None => Err(CompileError::UnknownIdentifier {
            name: name.to_string(),
            scope: scope_label(tags),
        }),
    }
}

fn names_property(name: &str, ctx: Context<'_>) -> bool {
    match ctx {
        Context::Candidate(tags) => tags.iter().any(|tag| find_property(*tag, name).is_some()),
        Context::Element => true,
    }
}

fn combinator(name: &str) -> Option<Combinator> {
    [
        ("Any", Combinator::Any),
        ("All", Combinator::All),
        ("Count", Combinator::Count),
        ("Where", Combinator::Where),
        ("First", Combinator::First),
    ]
    .into_iter()
    .find(|(label, _)| label.eq_ignore_ascii_case(name))
    .map(|(_, kind)| kind)
}

fn method(name: &str) -> Option<Method> {
    [
        ("Contains", Method::Contains),
        ("StartsWith", Method::StartsWith),
        ("EndsWith", Method::EndsWith),
        ("IndexOf", Method::IndexOf),
        ("Equals", Method::Equals),
        ("ToUpper", Method::ToUpper),
        ("ToLower", Method::ToLower),
        ("Trim", Method::Trim),
        ("Replace", Method::Replace),
        ("Tokenize", Method::Tokenize),
    ]
    .into_iter()
    .find(|(label, _)| label.eq_ignore_ascii_case(name))
    .map(|(_, method)| method)
}

const STRING_COMPARISON: &[&str] = &[
    "CurrentCulture",
    "CurrentCultureIgnoreCase",
    "InvariantCulture",
    "InvariantCultureIgnoreCase",
    "Ordinal",
    "OrdinalIgnoreCase",
];
const DATA_TYPE: &[&str] = &[
    "Automatic", "String", "Int64", "Double", "DateTime", "Decimal", "Boolean", "Binary",
    "Unknown", "Variant",
];
const CROSS_FILTERING: &[&str] = &["OneDirection", "BothDirections", "Automatic"];
const SECURITY_FILTERING: &[&str] = &["OneDirection", "BothDirections", "None"];
const CARDINALITY: &[&str] = &["None", "One", "Many"];
const MODE_TYPE: &[&str] = &["Import", "DirectQuery", "Default", "Push", "Dual", "DirectLake"];
const PARTITION_SOURCE: &[&str] = &[
    "None",
    "Query",
    "Calculated",
    "M",
    "Entity",
    "PolicyRange",
    "CalculationGroup",
    "Inferred",
    "Parquet",
];
const AGGREGATE: &[&str] = &[
    "Default",
    "None",
    "Sum",
    "Min",
    "Max",
    "Count",
    "Average",
    "DistinctCount",
];

/// Resolve `Namespace.Member` as an enum literal.
///
/// `None` when `namespace` is not an enum type; otherwise the canonical
/// member spelling or an unknown-member error.
pub(crate) fn enum_literal(namespace: &str, member: &str) -> Option<Result<String, CompileError>> {
    let unknown = || CompileError::UnknownEnumMember {
        namespace: namespace.to_string(),
        member: member.to_string(),
    };
    let fixed = |members: &[&str]| {
        members
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(member))
            .map(|candidate| candidate.to_string())
            .ok_or_else(unknown)
    };
    let resolved = match namespace {
        "StringComparison" => fixed(STRING_COMPARISON),
        "TokenType" | "DAXToken" => TokenTag::parse(member)
            .map(|tag| tag.as_str().to_string())
            .ok_or_else(unknown),
        "DataType" => fixed(DATA_TYPE),
        "CrossFilteringBehavior" => fixed(CROSS_FILTERING),
        "SecurityFilteringBehavior" => fixed(SECURITY_FILTERING),
        "RelationshipEndCardinality" => fixed(CARDINALITY),
        "ModeType" => fixed(MODE_TYPE),
        "PartitionSourceType" => fixed(PARTITION_SOURCE),
        "AggregateFunction" => fixed(AGGREGATE),
        "ObjectType" => ScopeTag::ALL
            .iter()
            .map(|tag| tag.object_type())
            .find(|candidate| candidate.eq_ignore_ascii_case(member))
            .map(str::to_string)
            .ok_or_else(unknown),
        _ => return None,
    };
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure() -> Compiler {
        Compiler::for_scope([ScopeTag::Measure])
    }

    #[test]
    fn unknown_identifier_names_the_scope() {
        let err = measure().predicate("SourceColumn = \"x\"").expect_err("unknown");
        assert_eq!(
            err,
            CompileError::UnknownIdentifier {
                name: "SourceColumn".into(),
                scope: "Measure".into(),
            }
        );
    }

    #[test]
    fn identifiers_resolve_case_insensitively() {
        assert!(measure().predicate("ishidden and not string.isnullorwhitespace(description)").is_ok());
    }

    #[test]
    fn flag_compared_with_string_is_a_type_mismatch() {
        assert!(matches!(
            measure().predicate("IsHidden = \"yes\""),
            Err(CompileError::TypeMismatch { .. })
        ));
        assert!(matches!(
            measure().predicate("not Description"),
            Err(CompileError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn predicate_must_be_boolean() {
        assert!(matches!(
            measure().predicate("Description"),
            Err(CompileError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn enum_literals_share_names_with_properties() {
        let columns = Compiler::for_scope([ScopeTag::DataColumn]);
        assert!(columns.predicate("DataType = DataType.Int64").is_ok());
        assert!(matches!(
            measure().predicate("FormatString = StringComparison.Bogus"),
            Err(CompileError::UnknownEnumMember { .. })
        ));
    }

    #[test]
    fn regex_needs_exactly_two_arguments_and_a_valid_pattern() {
        assert!(matches!(
            measure().predicate("RegEx.IsMatch(Name, \"a\", 1)"),
            Err(CompileError::Arity { found: 3, .. })
        ));
        assert!(matches!(
            measure().predicate("RegEx.IsMatch(Name, \"(\")"),
            Err(CompileError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn combinator_predicates_are_not_scope_checked() {
        assert!(measure()
            .predicate("DependsOn.Any(Key.ObjectType = ObjectType.Column and Value.Any(not FullyQualified))")
            .is_ok());
    }

    #[test]
    fn unknown_function() {
        assert_eq!(
            measure().predicate("Name.Frobnicate()").expect_err("unknown"),
            CompileError::UnknownFunction {
                name: "Frobnicate".into()
            }
        );
    }

    #[test]
    fn derived_properties_are_not_assignable() {
        assert_eq!(
            measure().assignable("ObjectType"),
            Err(CompileError::NotAssignable {
                target: "ObjectType".into()
            })
        );
        assert_eq!(measure().assignable("ishidden"), Ok("IsHidden".to_string()));
    }
}
