//! Evaluation of compiled expressions against a model graph.
//!
//! Nested combinator scopes are threaded through an explicit [`Frame`]
//! chain on the stack: each frame holds the current element and a link to
//! the enclosing frame, which `outerIt` reads. Nothing is shared between
//! evaluations, so independent objects can be evaluated concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bpa_model::{DependencyKind, ModelGraph, ObjectRef};
use regex::Regex;

use crate::compile::{
    Combinator, CompiledPredicate, Method, Node, Pattern, StringTest, canonical_property,
};
use crate::dax::TokenList;
use crate::error::EvalError;
use crate::lexer::BinaryOp;
use crate::value::{DependencyGroup, Val};

/// Point in time after which evaluation fails with [`EvalError::Timeout`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(budget: Duration) -> Self {
        Self(Instant::now().checked_add(budget))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn check(&self) -> Result<(), EvalError> {
        match self.0 {
            Some(at) if Instant::now() >= at => Err(EvalError::Timeout),
            _ => Ok(()),
        }
    }
}

pub(crate) struct Frame<'a> {
    pub(crate) current: Val,
    pub(crate) outer: Option<&'a Frame<'a>>,
}

impl Frame<'static> {
    pub(crate) fn root(object: ObjectRef) -> Self {
        Frame {
            current: Val::Object(object),
            outer: None,
        }
    }
}

impl CompiledPredicate {
    /// Evaluate the predicate for `candidate`.
    ///
    /// `outer` is the binding `outerIt` sees at the top level; nested
    /// combinators rebind it to their enclosing element.
    pub fn evaluate<G: ModelGraph + ?Sized>(
        &self,
        graph: &G,
        candidate: ObjectRef,
        outer: Option<ObjectRef>,
        deadline: Deadline,
    ) -> Result<bool, EvalError> {
        deadline.check()?;
        let base = outer.map(Frame::root);
        let frame = Frame {
            current: Val::Object(candidate),
            outer: base.as_ref(),
        };
        Evaluator::new(graph, deadline)
            .eval(&self.root, &frame)?
            .as_bool()
    }
}

pub(crate) struct Evaluator<'g, G: ?Sized> {
    graph: &'g G,
    deadline: Deadline,
}

impl<'g, G: ModelGraph + ?Sized> Evaluator<'g, G> {
    pub(crate) fn new(graph: &'g G, deadline: Deadline) -> Self {
        Self { graph, deadline }
    }

    pub(crate) fn eval(&self, node: &Node, frame: &Frame<'_>) -> Result<Val, EvalError> {
        match node {
            Node::Const(value) => Ok(value.clone()),
            Node::It => Ok(frame.current.clone()),
            Node::OuterIt => Ok(frame
                .outer
                .map(|outer| outer.current.clone())
                .unwrap_or(Val::Null)),
            Node::Model => Ok(Val::Object(self.graph.model())),
            Node::Member { target, name } => {
                let target = self.eval(target, frame)?;
                self.member(&target, name)
            }
            Node::Not(expr) => Ok(Val::Bool(!self.eval(expr, frame)?.as_bool()?)),
            Node::Neg(expr) => match self.eval(expr, frame)? {
                Val::Int(value) => value
                    .checked_neg()
                    .map(Val::Int)
                    .ok_or(EvalError::Overflow { op: "-" }),
                Val::Real(value) => Ok(Val::Real(-value)),
                other => Err(EvalError::Type {
                    expected: "number",
                    found: other.kind(),
                }),
            },
            Node::Binary { op, left, right } => self.binary(*op, left, right, frame),
            Node::StringTest { test, arg } => {
                let value = self.eval(arg, frame)?;
                let result = match &value {
                    Val::Null => true,
                    other => {
                        let text = other.as_text().ok_or(EvalError::Type {
                            expected: "string",
                            found: other.kind(),
                        })?;
                        match test {
                            StringTest::IsNullOrEmpty => text.is_empty(),
                            StringTest::IsNullOrWhitespace => text.trim().is_empty(),
                        }
                    }
                };
                Ok(Val::Bool(result))
            }
            Node::IsMatch { input, pattern } => {
                let input = self.eval(input, frame)?;
                let text = text_of(&input, "RegEx.IsMatch")?;
                let matched = match pattern {
                    Pattern::Static(regex) => regex.is_match(text),
                    Pattern::Dynamic(pattern) => {
                        let pattern = self.eval(pattern, frame)?;
                        let pattern = text_of(&pattern, "RegEx.IsMatch")?;
                        Regex::new(pattern)
                            .map_err(|err| EvalError::Regex {
                                pattern: pattern.to_string(),
                                message: err.to_string(),
                            })?
                            .is_match(text)
                    }
                };
                Ok(Val::Bool(matched))
            }
            Node::Annotation { target, key, has } => {
                let member = if *has { "HasAnnotation" } else { "GetAnnotation" };
                let target = self.eval(target, frame)?;
                let object = object_of(&target, member)?;
                let key = self.eval(key, frame)?;
                let annotation = self.graph.annotation(object, text_of(&key, member)?)?;
                Ok(if *has {
                    Val::Bool(annotation.is_some())
                } else {
                    annotation.map(Val::Str).unwrap_or(Val::Null)
                })
            }
            Node::Method {
                target,
                method,
                args,
            } => {
                let target = self.eval(target, frame)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                call_method(&target, *method, &args)
            }
            Node::Combinator {
                target,
                kind,
                predicate,
            } => {
                let target = self.eval(target, frame)?;
                self.combinator(&target, *kind, predicate.as_deref(), frame)
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        frame: &Frame<'_>,
    ) -> Result<Val, EvalError> {
        match op {
            BinaryOp::And => {
                let result = self.eval(left, frame)?.as_bool()? && self.eval(right, frame)?.as_bool()?;
                return Ok(Val::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval(left, frame)?.as_bool()? || self.eval(right, frame)?.as_bool()?;
                return Ok(Val::Bool(result));
            }
            _ => {}
        }
        let left = self.eval(left, frame)?;
        let right = self.eval(right, frame)?;
        let symbol = op.symbol();
        Ok(match op {
            BinaryOp::Eq => Val::Bool(left.loose_eq(&right)?),
            BinaryOp::Ne => Val::Bool(!left.loose_eq(&right)?),
            BinaryOp::Lt => Val::Bool(left.compare(&right, symbol)?.is_lt()),
            BinaryOp::Le => Val::Bool(left.compare(&right, symbol)?.is_le()),
            BinaryOp::Gt => Val::Bool(left.compare(&right, symbol)?.is_gt()),
            BinaryOp::Ge => Val::Bool(left.compare(&right, symbol)?.is_ge()),
            _ => arithmetic(op, &left, &right)?,
        })
    }

    fn combinator(
        &self,
        target: &Val,
        kind: Combinator,
        predicate: Option<&Node>,
        frame: &Frame<'_>,
    ) -> Result<Val, EvalError> {
        let items = collection_of(target, kind.name())?;
        let test = |item: &Val| -> Result<bool, EvalError> {
            self.deadline.check()?;
            match predicate {
                None => Ok(true),
                Some(predicate) => {
                    let inner = Frame {
                        current: item.clone(),
                        outer: Some(frame),
                    };
                    self.eval(predicate, &inner)?.as_bool()
                }
            }
        };
        Ok(match kind {
            Combinator::Any => {
                for item in &items {
                    if test(item)? {
                        return Ok(Val::Bool(true));
                    }
                }
                Val::Bool(false)
            }
            Combinator::All => {
                for item in &items {
                    if !test(item)? {
                        return Ok(Val::Bool(false));
                    }
                }
                Val::Bool(true)
            }
            Combinator::Count => {
                let mut count = 0_i64;
                for item in &items {
                    if test(item)? {
                        count += 1;
                    }
                }
                Val::Int(count)
            }
            Combinator::Where => {
                let mut kept = Vec::new();
                for item in items {
                    if test(&item)? {
                        kept.push(item);
                    }
                }
                Val::List(kept)
            }
            Combinator::First => {
                for item in items {
                    if test(&item)? {
                        return Ok(item);
                    }
                }
                Val::Null
            }
        })
    }

    pub(crate) fn member(&self, target: &Val, name: &str) -> Result<Val, EvalError> {
        let unknown = || EvalError::UnknownMember {
            member: name.to_string(),
            kind: target.kind(),
        };
        match target {
            Val::Null => Err(EvalError::NullReference {
                member: name.to_string(),
            }),
            Val::Object(object) => self.object_member(*object, name),
            Val::Str(text) if is(name, "Length") => Ok(count(text.chars().count())),
            Val::List(items) if is(name, "Count") => Ok(count(items.len())),
            Val::DependsOn(groups) => {
                if is(name, "Count") {
                    return Ok(count(groups.len()));
                }
                let kind = [
                    ("Measures", DependencyKind::Measure),
                    ("Columns", DependencyKind::Column),
                    ("Tables", DependencyKind::Table),
                ]
                .into_iter()
                .find(|(label, _)| is(name, label))
                .map(|(_, kind)| kind)
                .ok_or_else(unknown)?;
                Ok(Val::objects(
                    groups
                        .iter()
                        .filter(|group| group.kind() == Some(kind))
                        .map(|group| group.key),
                ))
            }
            Val::Group(group) => {
                if is(name, "Key") {
                    Ok(Val::Object(group.key))
                } else if is(name, "Value") {
                    Ok(Val::List(
                        group.references.iter().copied().map(Val::Reference).collect(),
                    ))
                } else if is(name, "Count") {
                    Ok(count(group.references.len()))
                } else {
                    Err(unknown())
                }
            }
            Val::Reference(dependency) => {
                if is(name, "FullyQualified") {
                    Ok(Val::Bool(dependency.fully_qualified))
                } else if is(name, "ObjectType") {
                    Ok(Val::Enum(dependency.kind.as_str().to_string()))
                } else if is(name, "Object") {
                    Ok(Val::Object(dependency.target))
                } else {
                    Err(unknown())
                }
            }
            Val::ReferencedBy(referrers) => {
                if is(name, "Count") {
                    Ok(count(referrers.count()))
                } else if is(name, "AllMeasures") {
                    Ok(Val::objects(referrers.measures.iter().copied()))
                } else if is(name, "AllColumns") {
                    Ok(Val::objects(referrers.columns.iter().copied()))
                } else if is(name, "AllTables") {
                    Ok(Val::objects(referrers.tables.iter().copied()))
                } else if is(name, "Roles") {
                    Ok(Val::objects(referrers.roles.iter().copied()))
                } else {
                    Err(unknown())
                }
            }
            Val::Token(token) => {
                if is(name, "Type") {
                    Ok(Val::Enum(token.tag().as_str().to_string()))
                } else if is(name, "Text") {
                    Ok(Val::Str(token.text().to_string()))
                } else if is(name, "Next") {
                    Ok(token.next().map(Val::Token).unwrap_or(Val::Null))
                } else if is(name, "Previous") {
                    Ok(token.previous().map(Val::Token).unwrap_or(Val::Null))
                } else if is(name, "Index") {
                    Ok(count(token.index()))
                } else {
                    Err(unknown())
                }
            }
            _ => Err(unknown()),
        }
    }

    fn object_member(&self, object: ObjectRef, name: &str) -> Result<Val, EvalError> {
        let tag = self.graph.object_type(object)?;
        let property = canonical_property(tag, name).unwrap_or(name);
        match property {
            "DependsOn" => {
                let dependencies = self.graph.depends_on(object)?;
                Ok(Val::DependsOn(DependencyGroup::group(&dependencies).into()))
            }
            "ReferencedBy" => Ok(Val::ReferencedBy(Arc::new(
                self.graph.referenced_by(object)?,
            ))),
            _ => Ok(Val::from(self.graph.property(object, property)?)),
        }
    }
}

fn is(name: &str, member: &str) -> bool {
    name.eq_ignore_ascii_case(member)
}

fn count(len: usize) -> Val {
    Val::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

pub(crate) fn text_of<'v>(value: &'v Val, member: &str) -> Result<&'v str, EvalError> {
    match value {
        Val::Null => Err(EvalError::NullReference {
            member: member.to_string(),
        }),
        other => other.as_text().ok_or(EvalError::Type {
            expected: "string",
            found: other.kind(),
        }),
    }
}

pub(crate) fn object_of(value: &Val, member: &str) -> Result<ObjectRef, EvalError> {
    match value {
        Val::Object(object) => Ok(*object),
        Val::Null => Err(EvalError::NullReference {
            member: member.to_string(),
        }),
        other => Err(EvalError::Type {
            expected: "object",
            found: other.kind(),
        }),
    }
}

fn collection_of(value: &Val, member: &str) -> Result<Vec<Val>, EvalError> {
    if value.is_null() {
        return Err(EvalError::NullReference {
            member: member.to_string(),
        });
    }
    value.items().ok_or(EvalError::Type {
        expected: "collection",
        found: value.kind(),
    })
}

/// Whether a `StringComparison` argument asks for a case-insensitive match.
fn ignores_case(comparison: Option<&Val>) -> Result<bool, EvalError> {
    match comparison {
        None => Ok(false),
        Some(value) => value
            .as_text()
            .map(|member| member.ends_with("IgnoreCase"))
            .ok_or(EvalError::Type {
                expected: "StringComparison",
                found: value.kind(),
            }),
    }
}

/// Char index into the original `hay`. Lowercasing can change the char
/// count (`İ` folds to two chars), so positions are taken before folding.
fn index_of_ignore_case(hay: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    hay.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(hay.len()))
        .position(|start| {
            let mut folded = hay[start..].chars().flat_map(char::to_lowercase);
            needle.iter().all(|expected| folded.next() == Some(*expected))
        })
}

fn call_method(target: &Val, method: Method, args: &[Val]) -> Result<Val, EvalError> {
    let name = method.name();
    if target.is_null() {
        return Err(EvalError::NullReference {
            member: name.to_string(),
        });
    }
    if method == Method::Contains {
        if let Some(items) = target.items() {
            let needle = args.first().unwrap_or(&Val::Null);
            for item in &items {
                if item.loose_eq(needle)? {
                    return Ok(Val::Bool(true));
                }
            }
            return Ok(Val::Bool(false));
        }
    }
    if method == Method::Equals && target.as_text().is_none() {
        let other = args.first().unwrap_or(&Val::Null);
        return Ok(Val::Bool(target.loose_eq(other)?));
    }

    let text = text_of(target, name)?;
    let fold = |s: &str, ignore: bool| {
        if ignore {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    };
    let arg = |index: usize| text_of(args.get(index).unwrap_or(&Val::Null), name);

    Ok(match method {
        Method::Contains | Method::StartsWith | Method::EndsWith | Method::Equals => {
            let ignore = ignores_case(args.get(1))?;
            let hay = fold(text, ignore);
            let needle = fold(arg(0)?, ignore);
            Val::Bool(match method {
                Method::Contains => hay.contains(&needle),
                Method::StartsWith => hay.starts_with(&needle),
                Method::EndsWith => hay.ends_with(&needle),
                _ => hay == needle,
            })
        }
        Method::IndexOf => {
            let needle = arg(0)?;
            let found = if ignores_case(args.get(1))? {
                index_of_ignore_case(text, needle)
            } else {
                text.find(needle).map(|byte| text[..byte].chars().count())
            };
            found.map_or(Val::Int(-1), count)
        }
        Method::ToUpper => Val::Str(text.to_uppercase()),
        Method::ToLower => Val::Str(text.to_lowercase()),
        Method::Trim => Val::Str(text.trim().to_string()),
        Method::Replace => {
            let from = arg(0)?;
            if from.is_empty() {
                return Err(EvalError::Type {
                    expected: "non-empty string",
                    found: "empty string",
                });
            }
            Val::Str(text.replace(from, arg(1)?))
        }
        Method::Tokenize => Val::List(TokenList::new(text).cursors().map(Val::Token).collect()),
    })
}

fn arithmetic(op: BinaryOp, left: &Val, right: &Val) -> Result<Val, EvalError> {
    let symbol = op.symbol();
    if op == BinaryOp::Add && (matches!(left, Val::Str(_)) || matches!(right, Val::Str(_))) {
        return Ok(Val::Str(format!("{left}{right}")));
    }
    if let (Val::Int(a), Val::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0 {
            return Err(EvalError::DivideByZero);
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result.map(Val::Int).ok_or(EvalError::Overflow { op: symbol });
    }
    let operands = || EvalError::Operands {
        op: symbol,
        left: left.kind(),
        right: right.kind(),
    };
    let (Some(a), Some(b)) = (number(left), number(right)) else {
        return Err(operands());
    };
    Ok(Val::Real(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }))
}

fn number(value: &Val) -> Option<f64> {
    match value {
        Val::Int(value) => Some(*value as f64),
        Val::Real(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(
            arithmetic(BinaryOp::Div, &Val::Int(1), &Val::Int(0)).expect_err("zero"),
            EvalError::DivideByZero
        );
        assert_eq!(
            arithmetic(BinaryOp::Add, &Val::Int(i64::MAX), &Val::Int(1)).expect_err("overflow"),
            EvalError::Overflow { op: "+" }
        );
    }

    #[test]
    fn plus_concatenates_strings() {
        let Val::Str(text) = arithmetic(BinaryOp::Add, &Val::Str("n=".into()), &Val::Int(3))
            .expect("concat")
        else {
            panic!("expected a string");
        };
        assert_eq!(text, "n=3");
    }

    #[test]
    fn index_of_honours_string_comparison() {
        let target = Val::Str("Data Source=x;Application Name=y".into());
        let Val::Int(index) = call_method(
            &target,
            Method::IndexOf,
            &[Val::Str("application name".into())],
        )
        .expect("index")
        else {
            panic!("expected an int");
        };
        assert_eq!(index, -1);
        let Val::Int(index) = call_method(
            &target,
            Method::IndexOf,
            &[
                Val::Str("application name".into()),
                Val::Enum("OrdinalIgnoreCase".into()),
            ],
        )
        .expect("index")
        else {
            panic!("expected an int");
        };
        assert_eq!(index, 14);
    }

    #[test]
    fn ignore_case_index_counts_chars_of_the_original_text() {
        let index_of = |hay: &str, needle: &str| {
            let found = call_method(
                &Val::Str(hay.into()),
                Method::IndexOf,
                &[
                    Val::Str(needle.into()),
                    Val::Enum("OrdinalIgnoreCase".into()),
                ],
            );
            match found {
                Ok(Val::Int(index)) => index,
                other => panic!("expected an int, got {other:?}"),
            }
        };
        assert_eq!(index_of("\u{130}x", "x"), 1);
        assert_eq!(index_of("\u{130}STANBUL", "stan"), 1);
        assert_eq!(index_of("abc", ""), 0);
        assert_eq!(index_of("abc", "D"), -1);
    }

    #[test]
    fn method_on_null_is_a_null_reference() {
        assert_eq!(
            call_method(&Val::Null, Method::Trim, &[]).expect_err("null"),
            EvalError::NullReference {
                member: "Trim".into()
            }
        );
    }

    #[test]
    fn expired_deadline_times_out() {
        let deadline = Deadline::at(Instant::now());
        assert_eq!(deadline.check(), Err(EvalError::Timeout));
        assert_eq!(Deadline::none().check(), Ok(()));
    }
}
