//! In-memory model graph.
//!
//! `ModelSnapshot` is a complete [`ModelGraph`] provider used by the CLI and
//! by tests. Child collections (`Columns`, `Measures`, ...) and `Table`
//! navigation are derived from parent links. Backward dependency edges are
//! cached: mutations made through [`ModelGraphMut`] leave the cache stale
//! until [`ModelGraphMut::refresh_dependencies`] is called.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "compatibilityLevel": 1600,
//!   "annotations": { "BestPracticeAnalyzer_IgnoreRules": "{\"RuleIDs\":[]}" },
//!   "objects": [
//!     { "key": "sales", "type": "Table", "name": "Sales" },
//!     { "key": "amount", "type": "DataColumn", "name": "Amount", "parent": "sales",
//!       "properties": { "DataType": { "enum": "Double" }, "IsHidden": false } },
//!     { "key": "total", "type": "Measure", "name": "Total", "parent": "sales",
//!       "properties": { "Expression": "SUM('Sales'[Amount])" },
//!       "dependsOn": [ { "target": "amount", "fullyQualified": true } ] }
//!   ]
//! }
//! ```
//!
//! Enum values are written as `{ "enum": "Member" }`, object references as
//! `{ "ref": "key" }` and collections as arrays of references.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::capabilities::PropertyKind;
use crate::error::{GraphError, SnapshotError};
use crate::graph::{
    Dependency, DependencyKind, ModelGraph, ModelGraphMut, ObjectRef, ReferencedBy, Value,
};
use crate::scope::ScopeTag;

const ROOT_KEY: &str = "model";

#[derive(Debug, Clone)]
struct Node {
    key: String,
    tag: ScopeTag,
    name: String,
    parent: Option<ObjectRef>,
    properties: BTreeMap<String, Value>,
    annotations: BTreeMap<String, String>,
    depends_on: Vec<Dependency>,
}

#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    compatibility_level: u32,
    root: ObjectRef,
    nodes: BTreeMap<ObjectRef, Node>,
    next_id: u32,
    reverse: BTreeMap<ObjectRef, ReferencedBy>,
    stale: bool,
}

impl ModelSnapshot {
    /// Create an empty model with the given compatibility level.
    pub fn new(compatibility_level: u32) -> Self {
        let root = ObjectRef(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                key: ROOT_KEY.to_string(),
                tag: ScopeTag::Model,
                name: "Model".to_string(),
                parent: None,
                properties: BTreeMap::new(),
                annotations: BTreeMap::new(),
                depends_on: Vec::new(),
            },
        );
        Self {
            compatibility_level,
            root,
            nodes,
            next_id: 1,
            reverse: BTreeMap::new(),
            stale: false,
        }
    }

    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Add an object under `parent`.
    pub fn add(&mut self, tag: ScopeTag, name: impl Into<String>, parent: ObjectRef) -> ObjectRef {
        let key = format!("obj{}", self.next_id);
        self.add_keyed(key, tag, name.into(), Some(parent))
    }

    fn add_keyed(
        &mut self,
        key: String,
        tag: ScopeTag,
        name: String,
        parent: Option<ObjectRef>,
    ) -> ObjectRef {
        let id = ObjectRef(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                key,
                tag,
                name,
                parent,
                properties: BTreeMap::new(),
                annotations: BTreeMap::new(),
                depends_on: Vec::new(),
            },
        );
        id
    }

    /// Set a stored property without capability checks.
    pub fn set(&mut self, object: ObjectRef, name: &str, value: impl Into<Value>) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&object) {
            let value = value.into();
            match (name, value) {
                ("Name", Value::String(text)) => node.name = text,
                (_, value) => {
                    node.properties.insert(name.to_string(), value);
                }
            }
        }
        self
    }

    pub fn annotate(&mut self, object: ObjectRef, key: &str, value: impl Into<String>) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&object) {
            node.annotations.insert(key.to_string(), value.into());
        }
        self
    }

    /// Record that `from`'s expression references `to`.
    ///
    /// Backward edges are rebuilt immediately.
    pub fn add_dependency(
        &mut self,
        from: ObjectRef,
        to: ObjectRef,
        fully_qualified: bool,
    ) -> Result<(), GraphError> {
        let target_tag = self.node(to)?.tag;
        let kind = DependencyKind::for_tag(target_tag).ok_or_else(|| {
            GraphError::rejected(format!("objects of type {target_tag} cannot be referenced"))
        })?;
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or(GraphError::UnknownObject(from))?;
        node.depends_on.push(Dependency {
            target: to,
            fully_qualified,
            kind,
        });
        self.rebuild_reverse();
        Ok(())
    }

    /// Whether backward edges are out of date.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Find an object by type and name.
    pub fn find(&self, tag: ScopeTag, name: &str) -> Option<ObjectRef> {
        self.nodes
            .iter()
            .find(|(_, node)| node.tag == tag && node.name == name)
            .map(|(id, _)| *id)
    }

    fn node(&self, object: ObjectRef) -> Result<&Node, GraphError> {
        self.nodes
            .get(&object)
            .ok_or(GraphError::UnknownObject(object))
    }

    fn children(&self, object: ObjectRef, tags: &[ScopeTag]) -> Vec<ObjectRef> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent == Some(object) && tags.contains(&node.tag))
            .map(|(id, _)| *id)
            .collect()
    }

    fn table_of(&self, object: ObjectRef) -> Option<ObjectRef> {
        let mut current = self.nodes.get(&object)?.parent;
        while let Some(id) = current {
            let node = self.nodes.get(&id)?;
            if node.tag.is_table() {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    fn derived_property(&self, object: ObjectRef, node: &Node, name: &str) -> Value {
        if let Some(tags) = child_collection(name) {
            return Value::Objects(self.children(object, tags));
        }
        let found = match name {
            "Table" => self.table_of(object),
            "KPI" => self.children(object, &[ScopeTag::Kpi]).first().copied(),
            "DependsOn" => {
                let targets: BTreeSet<ObjectRef> =
                    node.depends_on.iter().map(|dep| dep.target).collect();
                return Value::Objects(targets.into_iter().collect());
            }
            "ReferencedBy" => {
                let all = self
                    .reverse
                    .get(&object)
                    .map(ReferencedBy::all)
                    .unwrap_or_default();
                return Value::Objects(all);
            }
            "CompatibilityLevel" => {
                return Value::Int(i64::from(self.compatibility_level));
            }
            _ => node.parent,
        };
        found.map_or(Value::Null, Value::Object)
    }

    fn rebuild_reverse(&mut self) {
        let mut reverse: BTreeMap<ObjectRef, ReferencedBy> = BTreeMap::new();
        for (id, node) in &self.nodes {
            let referrer = match node.tag {
                ScopeTag::Kpi | ScopeTag::CalculationItem | ScopeTag::TablePermission => {
                    node.parent
                }
                _ => Some(*id),
            };
            let Some(referrer) = referrer else {
                continue;
            };
            let targets: BTreeSet<ObjectRef> =
                node.depends_on.iter().map(|dep| dep.target).collect();
            for target in targets {
                let entry = reverse.entry(target).or_default();
                let bucket = match node.tag {
                    ScopeTag::Measure | ScopeTag::Kpi => &mut entry.measures,
                    tag if tag.is_column() => &mut entry.columns,
                    tag if tag.is_table() => &mut entry.tables,
                    ScopeTag::CalculationItem => &mut entry.tables,
                    ScopeTag::TablePermission => &mut entry.roles,
                    _ => continue,
                };
                if !bucket.contains(&referrer) {
                    bucket.push(referrer);
                }
            }
        }
        self.reverse = reverse;
        self.stale = false;
    }

    fn subtree(&self, object: ObjectRef) -> BTreeSet<ObjectRef> {
        let mut removed = BTreeSet::from([object]);
        loop {
            let before = removed.len();
            for (id, node) in &self.nodes {
                if node.parent.is_some_and(|parent| removed.contains(&parent)) {
                    removed.insert(*id);
                }
            }
            if removed.len() == before {
                return removed;
            }
        }
    }

    /// Load a snapshot from its JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let document: SnapshotDocument = serde_json::from_slice(bytes)?;
        let mut snapshot = Self::new(document.compatibility_level);
        if let Some(name) = document.name {
            snapshot.set(snapshot.root, "Name", name);
        }

        let mut keys: HashMap<String, ObjectRef> = HashMap::new();
        keys.insert(ROOT_KEY.to_string(), snapshot.root);
        for object in &document.objects {
            let tag = ScopeTag::parse(&object.object_type)
                .filter(|tag| *tag != ScopeTag::Model)
                .ok_or_else(|| SnapshotError::UnknownType {
                    object: object.key.clone(),
                    object_type: object.object_type.clone(),
                })?;
            if keys.contains_key(&object.key) {
                return Err(SnapshotError::DuplicateKey {
                    key: object.key.clone(),
                });
            }
            let id = snapshot.add_keyed(object.key.clone(), tag, object.name.clone(), None);
            keys.insert(object.key.clone(), id);
        }

        let lookup = |object: &str, key: &str| {
            keys.get(key)
                .copied()
                .ok_or_else(|| SnapshotError::UnknownKey {
                    object: object.to_string(),
                    key: key.to_string(),
                })
        };

        let root = snapshot.root;
        load_members(
            &mut snapshot,
            root,
            ROOT_KEY,
            &document.properties,
            &document.annotations,
            &lookup,
        )?;
        for object in &document.objects {
            let id = lookup(&object.key, &object.key)?;
            let parent = match &object.parent {
                Some(parent) => lookup(&object.key, parent)?,
                None => root,
            };
            if let Some(node) = snapshot.nodes.get_mut(&id) {
                node.parent = Some(parent);
            }
            load_members(
                &mut snapshot,
                id,
                &object.key,
                &object.properties,
                &object.annotations,
                &lookup,
            )?;
        }
        for object in &document.objects {
            let id = lookup(&object.key, &object.key)?;
            for dependency in &object.depends_on {
                let target = lookup(&object.key, &dependency.target)?;
                snapshot
                    .add_dependency(id, target, dependency.fully_qualified)
                    .map_err(|source| SnapshotError::Graph {
                        object: object.key.clone(),
                        source,
                    })?;
            }
        }
        snapshot.rebuild_reverse();
        Ok(snapshot)
    }

    /// Serialise the snapshot back to its JSON document.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let key_of = |id: ObjectRef| {
            self.nodes
                .get(&id)
                .map_or_else(|| id.to_string(), |node| node.key.clone())
        };
        let root = &self.nodes[&self.root];
        let mut objects = Vec::new();
        for (id, node) in &self.nodes {
            if *id == self.root {
                continue;
            }
            objects.push(ObjectDocument {
                key: node.key.clone(),
                object_type: node.tag.as_str().to_string(),
                name: node.name.clone(),
                parent: node.parent.filter(|p| *p != self.root).map(key_of),
                properties: properties_to_json(&node.properties, &key_of),
                annotations: node.annotations.clone(),
                depends_on: node
                    .depends_on
                    .iter()
                    .map(|dep| DependencyDocument {
                        target: key_of(dep.target),
                        fully_qualified: dep.fully_qualified,
                    })
                    .collect(),
            });
        }
        let document = SnapshotDocument {
            compatibility_level: self.compatibility_level,
            name: Some(root.name.clone()),
            properties: properties_to_json(&root.properties, &key_of),
            annotations: root.annotations.clone(),
            objects,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

fn child_collection(name: &str) -> Option<&'static [ScopeTag]> {
    let tags: &'static [ScopeTag] = match name {
        "Tables" => &[
            ScopeTag::Table,
            ScopeTag::CalculatedTable,
            ScopeTag::CalculationGroup,
        ],
        "Columns" => &[
            ScopeTag::DataColumn,
            ScopeTag::CalculatedColumn,
            ScopeTag::CalculatedTableColumn,
        ],
        "Measures" => &[ScopeTag::Measure],
        "Partitions" => &[ScopeTag::Partition],
        "Hierarchies" => &[ScopeTag::Hierarchy],
        "Levels" => &[ScopeTag::Level],
        "Calendars" => &[ScopeTag::Calendar],
        "CalculationItems" => &[ScopeTag::CalculationItem],
        "Relationships" => &[ScopeTag::Relationship],
        "Perspectives" => &[ScopeTag::Perspective],
        "Cultures" => &[ScopeTag::Culture],
        "Roles" => &[ScopeTag::ModelRole],
        "DataSources" => &[ScopeTag::ProviderDataSource, ScopeTag::StructuredDataSource],
        "Expressions" => &[ScopeTag::NamedExpression],
        "Functions" => &[ScopeTag::UserDefinedFunction],
        "Members" => &[ScopeTag::ModelRoleMember],
        "TablePermissions" => &[ScopeTag::TablePermission],
        "Variations" => &[ScopeTag::Variation],
        _ => return None,
    };
    Some(tags)
}

impl ModelGraph for ModelSnapshot {
    fn compatibility_level(&self) -> u32 {
        self.compatibility_level
    }

    fn model(&self) -> ObjectRef {
        self.root
    }

    fn contains(&self, object: ObjectRef) -> bool {
        self.nodes.contains_key(&object)
    }

    fn objects_of_type(&self, tag: ScopeTag) -> Vec<ObjectRef> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.tag == tag)
            .map(|(id, _)| *id)
            .collect()
    }

    fn object_type(&self, object: ObjectRef) -> Result<ScopeTag, GraphError> {
        Ok(self.node(object)?.tag)
    }

    fn name(&self, object: ObjectRef) -> Result<String, GraphError> {
        Ok(self.node(object)?.name.clone())
    }

    fn parent(&self, object: ObjectRef) -> Result<Option<ObjectRef>, GraphError> {
        Ok(self.node(object)?.parent)
    }

    fn property(&self, object: ObjectRef, name: &str) -> Result<Value, GraphError> {
        let node = self.node(object)?;
        match name {
            "Name" => return Ok(Value::String(node.name.clone())),
            "ObjectType" => return Ok(Value::Enum(node.tag.object_type().to_string())),
            "ObjectTypeName" => return Ok(Value::String(node.tag.as_str().to_string())),
            "Parent" => return Ok(node.parent.map_or(Value::Null, Value::Object)),
            _ => {}
        }
        if let Some(value) = node.properties.get(name) {
            return Ok(value.clone());
        }
        let spec = node
            .tag
            .property(name)
            .ok_or_else(|| GraphError::PropertyNotFound {
                property: name.to_string(),
                object_type: node.tag,
            })?;
        if spec.derived {
            return Ok(self.derived_property(object, node, name));
        }
        Ok(spec.kind.default_value())
    }

    fn depends_on(&self, object: ObjectRef) -> Result<Vec<Dependency>, GraphError> {
        Ok(self.node(object)?.depends_on.clone())
    }

    fn referenced_by(&self, object: ObjectRef) -> Result<ReferencedBy, GraphError> {
        self.node(object)?;
        Ok(self.reverse.get(&object).cloned().unwrap_or_default())
    }

    fn annotation(&self, object: ObjectRef, key: &str) -> Result<Option<String>, GraphError> {
        Ok(self.node(object)?.annotations.get(key).cloned())
    }
}

impl ModelGraphMut for ModelSnapshot {
    fn set_property(
        &mut self,
        object: ObjectRef,
        name: &str,
        value: Value,
    ) -> Result<(), GraphError> {
        let tag = self.node(object)?.tag;
        let spec = tag
            .property(name)
            .ok_or_else(|| GraphError::PropertyNotFound {
                property: name.to_string(),
                object_type: tag,
            })?;
        if spec.derived {
            return Err(GraphError::ReadOnly {
                property: name.to_string(),
                object_type: tag,
            });
        }
        if !spec.kind.accepts(&value) {
            return Err(GraphError::TypeMismatch {
                property: name.to_string(),
                expected: spec.kind.label(),
                actual: value.kind_label(),
            });
        }
        let value = match (spec.kind, value) {
            (PropertyKind::Enum, Value::String(member)) => Value::Enum(member),
            (PropertyKind::Real, Value::Int(number)) => Value::Double(number as f64),
            (_, value) => value,
        };
        let node = self
            .nodes
            .get_mut(&object)
            .ok_or(GraphError::UnknownObject(object))?;
        if name == "Name" {
            let Value::String(text) = value else {
                return Err(GraphError::TypeMismatch {
                    property: name.to_string(),
                    expected: "string",
                    actual: value.kind_label(),
                });
            };
            node.name = text;
        } else {
            node.properties.insert(name.to_string(), value);
        }
        self.stale = true;
        Ok(())
    }

    fn delete(&mut self, object: ObjectRef) -> Result<(), GraphError> {
        let node = self.node(object)?;
        if object == self.root {
            return Err(GraphError::rejected("the model root cannot be deleted"));
        }
        if node.tag == ScopeTag::Partition {
            if let Some(table) = node.parent {
                if self.children(table, &[ScopeTag::Partition]).len() <= 1 {
                    let table_name = self.node(table)?.name.clone();
                    return Err(GraphError::rejected(format!(
                        "cannot delete the only partition of table '{table_name}'"
                    )));
                }
            }
        }
        let removed = self.subtree(object);
        self.nodes.retain(|id, _| !removed.contains(id));
        for node in self.nodes.values_mut() {
            node.depends_on
                .retain(|dep| !removed.contains(&dep.target));
        }
        self.stale = true;
        Ok(())
    }

    fn set_annotation(
        &mut self,
        object: ObjectRef,
        key: &str,
        value: Option<String>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&object)
            .ok_or(GraphError::UnknownObject(object))?;
        match value {
            Some(value) => {
                node.annotations.insert(key.to_string(), value);
            }
            None => {
                node.annotations.remove(key);
            }
        }
        Ok(())
    }

    fn refresh_dependencies(&mut self) {
        self.rebuild_reverse();
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocument {
    compatibility_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
    #[serde(default)]
    objects: Vec<ObjectDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDocument {
    key: String,
    #[serde(rename = "type")]
    object_type: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<DependencyDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyDocument {
    target: String,
    #[serde(default = "default_true")]
    fully_qualified: bool,
}

fn default_true() -> bool {
    true
}

fn load_members(
    snapshot: &mut ModelSnapshot,
    id: ObjectRef,
    key: &str,
    properties: &BTreeMap<String, serde_json::Value>,
    annotations: &BTreeMap<String, String>,
    lookup: &dyn Fn(&str, &str) -> Result<ObjectRef, SnapshotError>,
) -> Result<(), SnapshotError> {
    for (property, raw) in properties {
        let value = value_from_json(raw, &|target| lookup(key, target)).map_err(|message| {
            SnapshotError::InvalidValue {
                object: key.to_string(),
                property: property.clone(),
                message,
            }
        })?;
        snapshot
            .set_property(id, property, value)
            .map_err(|source| SnapshotError::Graph {
                object: key.to_string(),
                source,
            })?;
    }
    for (annotation, value) in annotations {
        snapshot.annotate(id, annotation, value.clone());
    }
    Ok(())
}

fn value_from_json(
    raw: &serde_json::Value,
    lookup: &dyn Fn(&str) -> Result<ObjectRef, SnapshotError>,
) -> Result<Value, String> {
    use serde_json::Value as Json;

    let reference = |map: &serde_json::Map<String, Json>| -> Result<ObjectRef, String> {
        let key = map
            .get("ref")
            .and_then(Json::as_str)
            .ok_or_else(|| "expected {\"ref\": key}".to_string())?;
        lookup(key).map_err(|err| err.to_string())
    };

    match raw {
        Json::Null => Ok(Value::Null),
        Json::Bool(flag) => Ok(Value::Bool(*flag)),
        Json::Number(number) => match number.as_i64() {
            Some(int) => Ok(Value::Int(int)),
            None => number
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| format!("unsupported number {number}")),
        },
        Json::String(text) => Ok(Value::String(text.clone())),
        Json::Object(map) => {
            if let Some(member) = map.get("enum").and_then(Json::as_str) {
                return Ok(Value::Enum(member.to_string()));
            }
            reference(map).map(Value::Object)
        }
        Json::Array(items) => items
            .iter()
            .map(|item| match item {
                Json::Object(map) => reference(map),
                other => Err(format!("expected object reference, got {other}")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Objects),
    }
}

fn properties_to_json(
    properties: &BTreeMap<String, Value>,
    key_of: &dyn Fn(ObjectRef) -> String,
) -> BTreeMap<String, serde_json::Value> {
    use serde_json::{Value as Json, json};

    properties
        .iter()
        .map(|(name, value)| {
            let json = match value {
                Value::Null => Json::Null,
                Value::Bool(flag) => Json::Bool(*flag),
                Value::Int(int) => json!(int),
                Value::Double(real) => json!(real),
                Value::String(text) => Json::String(text.clone()),
                Value::Enum(member) => json!({ "enum": member }),
                Value::Object(id) => json!({ "ref": key_of(*id) }),
                Value::Objects(ids) => Json::Array(
                    ids.iter()
                        .map(|id| json!({ "ref": key_of(*id) }))
                        .collect(),
                ),
            };
            (name.clone(), json)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_model() -> (ModelSnapshot, ObjectRef, ObjectRef, ObjectRef) {
        let mut model = ModelSnapshot::new(1600);
        let sales = model.add(ScopeTag::Table, "Sales", model.root());
        let amount = model.add(ScopeTag::DataColumn, "Amount", sales);
        let total = model.add(ScopeTag::Measure, "Total", sales);
        model.add_dependency(total, amount, true).expect("dependency");
        (model, sales, amount, total)
    }

    #[test]
    fn derived_collections_follow_parent_links() {
        let (model, sales, amount, total) = sales_model();
        assert_eq!(
            model.property(sales, "Columns").expect("columns"),
            Value::Objects(vec![amount])
        );
        assert_eq!(
            model.property(sales, "Measures").expect("measures"),
            Value::Objects(vec![total])
        );
        assert_eq!(
            model.property(amount, "Table").expect("table"),
            Value::Object(sales)
        );
    }

    #[test]
    fn unset_declared_properties_report_defaults() {
        let (model, _, amount, total) = sales_model();
        assert_eq!(
            model.property(total, "Description").expect("description"),
            Value::String(String::new())
        );
        assert_eq!(
            model.property(amount, "IsHidden").expect("hidden"),
            Value::Bool(false)
        );
    }

    #[test]
    fn undeclared_property_is_an_error() {
        let (model, _, _, total) = sales_model();
        let err = model.property(total, "SourceColumn").expect_err("missing");
        assert!(matches!(err, GraphError::PropertyNotFound { .. }));
    }

    #[test]
    fn referenced_by_tracks_measures() {
        let (model, _, amount, total) = sales_model();
        let referenced = model.referenced_by(amount).expect("referenced by");
        assert_eq!(referenced.measures, vec![total]);
        assert_eq!(referenced.count(), 1);
    }

    #[test]
    fn delete_leaves_reverse_edges_stale_until_refresh() {
        let (mut model, _, amount, total) = sales_model();
        model.delete(total).expect("delete");
        assert!(model.is_stale());
        assert_eq!(model.referenced_by(amount).expect("stale").count(), 1);
        model.refresh_dependencies();
        assert!(model.referenced_by(amount).expect("fresh").is_empty());
    }

    #[test]
    fn only_partition_cannot_be_deleted() {
        let (mut model, sales, _, _) = sales_model();
        let partition = model.add(ScopeTag::Partition, "Sales-P1", sales);
        let err = model.delete(partition).expect_err("rejected");
        assert_eq!(
            err.to_string(),
            "cannot delete the only partition of table 'Sales'"
        );
    }

    #[test]
    fn set_property_checks_kinds() {
        let (mut model, _, amount, _) = sales_model();
        model
            .set_property(amount, "IsHidden", Value::Bool(true))
            .expect("set hidden");
        let err = model
            .set_property(amount, "IsHidden", Value::from("yes"))
            .expect_err("mismatch");
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        let err = model
            .set_property(amount, "Table", Value::Null)
            .expect_err("read-only");
        assert!(matches!(err, GraphError::ReadOnly { .. }));
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let (mut model, _, amount, _) = sales_model();
        model.set(amount, "DataType", Value::enum_value("Double"));
        model.annotate(model.root(), "BestPracticeAnalyzer_IgnoreRules", "{}");
        let json = model.to_json().expect("serialize");
        let reloaded = ModelSnapshot::from_json(json.as_bytes()).expect("reload");
        let amount = reloaded
            .find(ScopeTag::DataColumn, "Amount")
            .expect("amount");
        assert_eq!(
            reloaded.property(amount, "DataType").expect("data type"),
            Value::Enum("Double".to_string())
        );
        assert_eq!(reloaded.referenced_by(amount).expect("refs").count(), 1);
        assert_eq!(
            reloaded
                .annotation(reloaded.root(), "BestPracticeAnalyzer_IgnoreRules")
                .expect("annotation")
                .as_deref(),
            Some("{}")
        );
    }
}
