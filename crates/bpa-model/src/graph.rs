//! Model graph provider interface.
//!
//! The engine never owns model objects. It reads them through [`ModelGraph`]
//! and only mutates them through [`ModelGraphMut`] while applying fixes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::scope::ScopeTag;

/// Opaque handle to an object owned by the graph provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef(pub u32);

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A property value as exposed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Enum(String),
    Object(ObjectRef),
    Objects(Vec<ObjectRef>),
}

impl Value {
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Enum(_) => "enum",
            Self::Object(_) => "object",
            Self::Objects(_) => "collection",
        }
    }

    pub fn enum_value(member: impl Into<String>) -> Self {
        Self::Enum(member.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

/// Kind of object a DAX reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    Column,
    Measure,
    Table,
}

impl DependencyKind {
    pub fn for_tag(tag: ScopeTag) -> Option<Self> {
        if tag.is_column() {
            Some(Self::Column)
        } else if tag.is_table() {
            Some(Self::Table)
        } else if tag == ScopeTag::Measure {
            Some(Self::Measure)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Column => "Column",
            Self::Measure => "Measure",
            Self::Table => "Table",
        }
    }
}

/// One reference from an expression to another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub target: ObjectRef,
    /// Whether the reference was written table-qualified (`'T'[C]`).
    pub fully_qualified: bool,
    pub kind: DependencyKind,
}

/// Backward edges: every object whose expression references a given object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencedBy {
    pub measures: Vec<ObjectRef>,
    pub columns: Vec<ObjectRef>,
    pub tables: Vec<ObjectRef>,
    pub roles: Vec<ObjectRef>,
}

impl ReferencedBy {
    /// All distinct referrers.
    pub fn all(&self) -> Vec<ObjectRef> {
        let distinct: BTreeSet<ObjectRef> = self
            .measures
            .iter()
            .chain(&self.columns)
            .chain(&self.tables)
            .chain(&self.roles)
            .copied()
            .collect();
        distinct.into_iter().collect()
    }

    pub fn count(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
            && self.columns.is_empty()
            && self.tables.is_empty()
            && self.roles.is_empty()
    }
}

/// Read access to a tabular model.
///
/// Implementations must be safe for concurrent reads; the collector may
/// evaluate many objects in parallel against one shared graph.
pub trait ModelGraph: Sync {
    /// Compatibility level of the model itself.
    fn compatibility_level(&self) -> u32;

    /// The model root object.
    fn model(&self) -> ObjectRef;

    fn contains(&self, object: ObjectRef) -> bool;

    /// All objects of exactly this type, in a stable order.
    fn objects_of_type(&self, tag: ScopeTag) -> Vec<ObjectRef>;

    fn object_type(&self, object: ObjectRef) -> Result<ScopeTag, GraphError>;

    fn name(&self, object: ObjectRef) -> Result<String, GraphError>;

    fn parent(&self, object: ObjectRef) -> Result<Option<ObjectRef>, GraphError>;

    /// Read a property by name.
    ///
    /// Returns [`GraphError::PropertyNotFound`] when the object type does not
    /// expose the property, never a silent null.
    fn property(&self, object: ObjectRef, name: &str) -> Result<Value, GraphError>;

    fn depends_on(&self, object: ObjectRef) -> Result<Vec<Dependency>, GraphError>;

    fn referenced_by(&self, object: ObjectRef) -> Result<ReferencedBy, GraphError>;

    fn annotation(&self, object: ObjectRef, key: &str) -> Result<Option<String>, GraphError>;

    /// Name used in violation messages: `'Table'[Column]`, `[Measure]`,
    /// `'Table'` and the plain name for everything else.
    fn display_name(&self, object: ObjectRef) -> Result<String, GraphError> {
        let tag = self.object_type(object)?;
        let name = self.name(object)?;
        if tag.is_table() {
            return Ok(quote_table(&name));
        }
        if tag == ScopeTag::Measure {
            return Ok(format!("[{}]", name.replace(']', "]]")));
        }
        if tag.is_column() {
            if let Some(table) = self.parent(object)? {
                let table_name = self.name(table)?;
                return Ok(format!(
                    "{}[{}]",
                    quote_table(&table_name),
                    name.replace(']', "]]")
                ));
            }
        }
        Ok(name)
    }
}

/// Mutations available to fix expressions.
pub trait ModelGraphMut: ModelGraph {
    fn set_property(
        &mut self,
        object: ObjectRef,
        name: &str,
        value: Value,
    ) -> Result<(), GraphError>;

    /// Delete an object and everything it owns.
    fn delete(&mut self, object: ObjectRef) -> Result<(), GraphError>;

    /// Set (`Some`) or remove (`None`) an annotation.
    fn set_annotation(
        &mut self,
        object: ObjectRef,
        key: &str,
        value: Option<String>,
    ) -> Result<(), GraphError>;

    /// Recompute dependency caches after a mutation.
    fn refresh_dependencies(&mut self);
}

fn quote_table(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}
