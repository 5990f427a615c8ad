//! Runtime values of the expression language.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bpa_model::{Dependency, DependencyKind, ObjectRef, ReferencedBy, Value};

use crate::dax::TokenCursor;
use crate::error::EvalError;

/// All references from one object to a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub key: ObjectRef,
    pub references: Vec<Dependency>,
}

impl DependencyGroup {
    /// Group forward edges by target, keeping first-seen order.
    pub fn group(dependencies: &[Dependency]) -> Vec<DependencyGroup> {
        let mut groups: Vec<DependencyGroup> = Vec::new();
        for dependency in dependencies {
            match groups.iter_mut().find(|group| group.key == dependency.target) {
                Some(group) => group.references.push(*dependency),
                None => groups.push(DependencyGroup {
                    key: dependency.target,
                    references: vec![*dependency],
                }),
            }
        }
        groups
    }

    pub fn kind(&self) -> Option<DependencyKind> {
        self.references.first().map(|dependency| dependency.kind)
    }
}

#[derive(Debug, Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    /// Enum member name.
    Enum(String),
    Object(ObjectRef),
    List(Vec<Val>),
    DependsOn(Arc<[DependencyGroup]>),
    Group(Arc<DependencyGroup>),
    Reference(Dependency),
    ReferencedBy(Arc<ReferencedBy>),
    Token(TokenCursor),
}

impl Val {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "double",
            Self::Str(_) => "string",
            Self::Enum(_) => "enum",
            Self::Object(_) => "object",
            Self::List(_) => "collection",
            Self::DependsOn(_) => "dependency collection",
            Self::Group(_) => "dependency group",
            Self::Reference(_) => "dependency reference",
            Self::ReferencedBy(_) => "referrer collection",
            Self::Token(_) => "token",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(EvalError::Type {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }

    /// String view of strings and enum members.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Str(text) | Self::Enum(text) => Some(text),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Elements of a collection value, or `None` for scalars.
    pub fn items(&self) -> Option<Vec<Val>> {
        match self {
            Self::List(items) => Some(items.clone()),
            Self::DependsOn(groups) => Some(
                groups
                    .iter()
                    .map(|group| Self::Group(Arc::new(group.clone())))
                    .collect(),
            ),
            Self::Group(group) => Some(group.references.iter().copied().map(Self::Reference).collect()),
            Self::ReferencedBy(referrers) => {
                Some(referrers.all().into_iter().map(Self::Object).collect())
            }
            _ => None,
        }
    }

    pub fn objects(objects: impl IntoIterator<Item = ObjectRef>) -> Self {
        Self::List(objects.into_iter().map(Self::Object).collect())
    }

    /// Equality used by `=` and `!=`.
    ///
    /// Null equals only null; numbers compare numerically; enum members
    /// compare with strings by name.
    pub fn loose_eq(&self, other: &Val) -> Result<bool, EvalError> {
        Ok(match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Reference(a), Self::Reference(b)) => a == b,
            (Self::Group(a), Self::Group(b)) => a == b,
            (Self::Token(a), Self::Token(b)) => a == b,
            (a, b) => {
                if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
                    x == y
                } else if let (Some(x), Some(y)) = (a.as_text(), b.as_text()) {
                    x == y
                } else {
                    return Err(EvalError::Operands {
                        op: "=",
                        left: a.kind(),
                        right: b.kind(),
                    });
                }
            }
        })
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`.
    pub fn compare(&self, other: &Val, op: &'static str) -> Result<Ordering, EvalError> {
        let ordering = match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => match (a.as_text(), b.as_text()) {
                    (Some(x), Some(y)) => Some(x.cmp(y)),
                    _ => None,
                },
            },
        };
        ordering.ok_or(EvalError::Operands {
            op,
            left: self.kind(),
            right: other.kind(),
        })
    }

    /// Convert to a property value for assignment.
    pub fn to_value(&self) -> Result<Value, EvalError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::Int(*value),
            Self::Real(value) => Value::Double(*value),
            Self::Str(text) => Value::String(text.clone()),
            Self::Enum(member) => Value::Enum(member.clone()),
            Self::Object(object) => Value::Object(*object),
            Self::List(items) => {
                let mut objects = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Self::Object(object) => objects.push(*object),
                        other => {
                            return Err(EvalError::Type {
                                expected: "object",
                                found: other.kind(),
                            });
                        }
                    }
                }
                Value::Objects(objects)
            }
            other => {
                return Err(EvalError::Type {
                    expected: "assignable value",
                    found: other.kind(),
                });
            }
        })
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Int(value) => Self::Int(value),
            Value::Double(value) => Self::Real(value),
            Value::String(text) => Self::Str(text),
            Value::Enum(member) => Self::Enum(member),
            Value::Object(object) => Self::Object(object),
            Value::Objects(objects) => Self::objects(objects),
        }
    }
}

/// Text used when a value is concatenated with a string.
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Str(text) | Self::Enum(text) => f.write_str(text),
            Self::Object(object) => write!(f, "{object}"),
            Self::Reference(dependency) => write!(f, "{}", dependency.target),
            Self::Group(group) => write!(f, "{}", group.key),
            Self::Token(token) => f.write_str(token.text()),
            Self::List(_) | Self::DependsOn(_) | Self::ReferencedBy(_) => f.write_str(self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependency(target: u32, fully_qualified: bool) -> Dependency {
        Dependency {
            target: ObjectRef(target),
            fully_qualified,
            kind: DependencyKind::Column,
        }
    }

    #[test]
    fn groups_by_target() {
        let groups = DependencyGroup::group(&[
            dependency(1, true),
            dependency(2, false),
            dependency(1, false),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, ObjectRef(1));
        assert_eq!(groups[0].references.len(), 2);
    }

    #[test]
    fn enum_equals_string_by_name() {
        let member = Val::Enum("Int64".into());
        assert!(member.loose_eq(&Val::Str("Int64".into())).expect("comparable"));
        assert!(!member.loose_eq(&Val::Null).expect("comparable"));
    }

    #[test]
    fn numbers_compare_across_int_and_real() {
        assert!(Val::Int(2).loose_eq(&Val::Real(2.0)).expect("comparable"));
        assert_eq!(
            Val::Int(1).compare(&Val::Real(1.5), "<").expect("ordered"),
            Ordering::Less
        );
    }

    #[test]
    fn incompatible_operands_are_an_error() {
        assert!(Val::Bool(true).loose_eq(&Val::Str("true".into())).is_err());
        assert!(Val::Bool(true).compare(&Val::Int(1), "<").is_err());
    }
}
