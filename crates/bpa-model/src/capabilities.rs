//! Properties exposed by each object type.
//!
//! The expression compiler checks identifiers against this table, and the
//! in-memory snapshot uses the declared kinds for defaults and type checks on
//! assignment.

use crate::graph::Value;
use crate::scope::ScopeTag;

/// Value shape of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Flag,
    Integer,
    Real,
    Enum,
    Object,
    Objects,
}

impl PropertyKind {
    /// Value reported for a declared property that has never been set.
    pub fn default_value(self) -> Value {
        match self {
            Self::Text => Value::String(String::new()),
            Self::Flag => Value::Bool(false),
            Self::Integer => Value::Int(0),
            Self::Real => Value::Double(0.0),
            Self::Enum | Self::Object => Value::Null,
            Self::Objects => Value::Objects(Vec::new()),
        }
    }

    /// Whether `value` may be stored in a property of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, Value::String(_)) => true,
            (Self::Flag, Value::Bool(_)) => true,
            (Self::Integer, Value::Int(_)) => true,
            (Self::Real, Value::Double(_) | Value::Int(_)) => true,
            (Self::Enum, Value::Enum(_) | Value::String(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Objects, Value::Objects(_)) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Flag => "bool",
            Self::Integer => "int",
            Self::Real => "double",
            Self::Enum => "enum",
            Self::Object => "object",
            Self::Objects => "collection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    /// Derived from the object graph; never assignable.
    pub derived: bool,
}

const fn stored(name: &'static str, kind: PropertyKind) -> PropertySpec {
    PropertySpec {
        name,
        kind,
        derived: false,
    }
}

const fn derived(name: &'static str, kind: PropertyKind) -> PropertySpec {
    PropertySpec {
        name,
        kind,
        derived: true,
    }
}

use PropertyKind::{Enum, Flag, Integer, Object, Objects, Real, Text};

/// Members every object exposes regardless of type.
pub const UNIVERSAL: &[PropertySpec] = &[
    stored("Name", Text),
    derived("ObjectType", Enum),
    derived("ObjectTypeName", Text),
    derived("Parent", Object),
    derived("DependsOn", Objects),
    derived("ReferencedBy", Objects),
];

const MODEL: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Culture", Text),
    derived("CompatibilityLevel", Integer),
    stored("DiscourageImplicitMeasures", Flag),
    stored("DefaultPowerBIDataSourceVersion", Enum),
    derived("Tables", Objects),
    derived("Relationships", Objects),
    derived("Perspectives", Objects),
    derived("Cultures", Objects),
    derived("Roles", Objects),
    derived("DataSources", Objects),
    derived("Expressions", Objects),
    derived("Functions", Objects),
];

const TABLE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("IsHidden", Flag),
    stored("IsPrivate", Flag),
    stored("DataCategory", Text),
    stored("ShowAsVariationsOnly", Flag),
    derived("Columns", Objects),
    derived("Measures", Objects),
    derived("Partitions", Objects),
    derived("Hierarchies", Objects),
    derived("Calendars", Objects),
];

const CALCULATED_TABLE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("IsHidden", Flag),
    stored("IsPrivate", Flag),
    stored("DataCategory", Text),
    stored("Expression", Text),
    derived("Columns", Objects),
    derived("Measures", Objects),
    derived("Partitions", Objects),
    derived("Hierarchies", Objects),
    derived("Calendars", Objects),
];

const MEASURE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Expression", Text),
    stored("FormatString", Text),
    stored("FormatStringExpression", Text),
    stored("DetailRowsExpression", Text),
    stored("DisplayFolder", Text),
    stored("IsHidden", Flag),
    stored("DataType", Enum),
    derived("Table", Object),
    derived("KPI", Object),
];

const DATA_COLUMN: &[PropertySpec] = &[
    stored("Description", Text),
    stored("DataType", Enum),
    stored("SourceColumn", Text),
    stored("FormatString", Text),
    stored("DisplayFolder", Text),
    stored("IsHidden", Flag),
    stored("IsKey", Flag),
    stored("IsNullable", Flag),
    stored("IsAvailableInMDX", Flag),
    stored("SummarizeBy", Enum),
    stored("DataCategory", Text),
    stored("EncodingHint", Enum),
    stored("SortByColumn", Object),
    stored("UsedInRelationships", Objects),
    stored("UsedInHierarchies", Objects),
    derived("Table", Object),
    derived("Variations", Objects),
];

const CALCULATED_COLUMN: &[PropertySpec] = &[
    stored("Description", Text),
    stored("DataType", Enum),
    stored("Expression", Text),
    stored("FormatString", Text),
    stored("DisplayFolder", Text),
    stored("IsHidden", Flag),
    stored("IsKey", Flag),
    stored("IsAvailableInMDX", Flag),
    stored("SummarizeBy", Enum),
    stored("DataCategory", Text),
    stored("SortByColumn", Object),
    stored("UsedInRelationships", Objects),
    stored("UsedInHierarchies", Objects),
    derived("Table", Object),
    derived("Variations", Objects),
];

const CALCULATED_TABLE_COLUMN: &[PropertySpec] = &[
    stored("Description", Text),
    stored("DataType", Enum),
    stored("SourceColumn", Text),
    stored("FormatString", Text),
    stored("DisplayFolder", Text),
    stored("IsHidden", Flag),
    stored("IsAvailableInMDX", Flag),
    stored("SummarizeBy", Enum),
    stored("DataCategory", Text),
    stored("SortByColumn", Object),
    stored("UsedInRelationships", Objects),
    stored("UsedInHierarchies", Objects),
    derived("Table", Object),
    derived("Variations", Objects),
];

const HIERARCHY: &[PropertySpec] = &[
    stored("Description", Text),
    stored("DisplayFolder", Text),
    stored("IsHidden", Flag),
    derived("Table", Object),
    derived("Levels", Objects),
];

const LEVEL: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Ordinal", Integer),
    stored("Column", Object),
    derived("Table", Object),
    derived("Hierarchy", Object),
];

const RELATIONSHIP: &[PropertySpec] = &[
    stored("FromColumn", Object),
    stored("ToColumn", Object),
    stored("FromTable", Object),
    stored("ToTable", Object),
    stored("IsActive", Flag),
    stored("CrossFilteringBehavior", Enum),
    stored("SecurityFilteringBehavior", Enum),
    stored("FromCardinality", Enum),
    stored("ToCardinality", Enum),
    stored("RelyOnReferentialIntegrity", Flag),
];

const PARTITION: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Expression", Text),
    stored("Query", Text),
    stored("Mode", Enum),
    stored("SourceType", Enum),
    stored("DataSource", Object),
    derived("Table", Object),
];

const PERSPECTIVE: &[PropertySpec] = &[stored("Description", Text)];

const CULTURE: &[PropertySpec] = &[stored("ContentType", Enum)];

const KPI: &[PropertySpec] = &[
    stored("Description", Text),
    stored("TargetExpression", Text),
    stored("StatusExpression", Text),
    stored("TrendExpression", Text),
    stored("TargetFormatString", Text),
    derived("Measure", Object),
];

const CALCULATION_GROUP: &[PropertySpec] = &[
    stored("Description", Text),
    stored("IsHidden", Flag),
    stored("Precedence", Integer),
    derived("Columns", Objects),
    derived("Measures", Objects),
    derived("Partitions", Objects),
    derived("CalculationItems", Objects),
];

const CALCULATION_ITEM: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Expression", Text),
    stored("FormatStringExpression", Text),
    stored("Ordinal", Integer),
    derived("CalculationGroup", Object),
];

const PROVIDER_DATA_SOURCE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("ConnectionString", Text),
    stored("Provider", Text),
    stored("Timeout", Integer),
];

const STRUCTURED_DATA_SOURCE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Protocol", Text),
    stored("Server", Text),
    stored("Database", Text),
];

const NAMED_EXPRESSION: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Expression", Text),
    stored("Kind", Enum),
];

const MODEL_ROLE: &[PropertySpec] = &[
    stored("Description", Text),
    stored("ModelPermission", Enum),
    derived("Members", Objects),
    derived("TablePermissions", Objects),
];

const MODEL_ROLE_MEMBER: &[PropertySpec] = &[
    stored("MemberName", Text),
    stored("MemberType", Enum),
    stored("IdentityProvider", Text),
    derived("Role", Object),
];

const TABLE_PERMISSION: &[PropertySpec] = &[
    stored("FilterExpression", Text),
    stored("MetadataPermission", Enum),
    stored("Table", Object),
    derived("Role", Object),
];

const VARIATION: &[PropertySpec] = &[
    stored("Description", Text),
    stored("IsDefault", Flag),
    stored("Relationship", Object),
    stored("DefaultHierarchy", Object),
    derived("Column", Object),
];

const CALENDAR: &[PropertySpec] = &[stored("Description", Text), derived("Table", Object)];

const USER_DEFINED_FUNCTION: &[PropertySpec] = &[
    stored("Description", Text),
    stored("Expression", Text),
    stored("IsHidden", Flag),
];

impl ScopeTag {
    /// Type-specific properties (universal members excluded).
    pub fn properties(self) -> &'static [PropertySpec] {
        match self {
            Self::Model => MODEL,
            Self::Table => TABLE,
            Self::CalculatedTable => CALCULATED_TABLE,
            Self::Measure => MEASURE,
            Self::DataColumn => DATA_COLUMN,
            Self::CalculatedColumn => CALCULATED_COLUMN,
            Self::CalculatedTableColumn => CALCULATED_TABLE_COLUMN,
            Self::Hierarchy => HIERARCHY,
            Self::Level => LEVEL,
            Self::Relationship => RELATIONSHIP,
            Self::Partition => PARTITION,
            Self::Perspective => PERSPECTIVE,
            Self::Culture => CULTURE,
            Self::Kpi => KPI,
            Self::CalculationGroup => CALCULATION_GROUP,
            Self::CalculationItem => CALCULATION_ITEM,
            Self::ProviderDataSource => PROVIDER_DATA_SOURCE,
            Self::StructuredDataSource => STRUCTURED_DATA_SOURCE,
            Self::NamedExpression => NAMED_EXPRESSION,
            Self::ModelRole => MODEL_ROLE,
            Self::ModelRoleMember => MODEL_ROLE_MEMBER,
            Self::TablePermission => TABLE_PERMISSION,
            Self::Variation => VARIATION,
            Self::Calendar => CALENDAR,
            Self::UserDefinedFunction => USER_DEFINED_FUNCTION,
        }
    }

    /// Look up a property (universal or type-specific) by exact name.
    pub fn property(self, name: &str) -> Option<&'static PropertySpec> {
        UNIVERSAL
            .iter()
            .chain(self.properties())
            .find(|spec| spec.name == name)
    }

    pub fn has_property(self, name: &str) -> bool {
        self.property(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_exposes_universal_members() {
        for tag in ScopeTag::ALL {
            assert!(tag.has_property("Name"), "{tag} lacks Name");
            assert!(tag.has_property("DependsOn"), "{tag} lacks DependsOn");
        }
    }

    #[test]
    fn measure_capabilities() {
        let spec = ScopeTag::Measure.property("IsHidden").expect("IsHidden");
        assert_eq!(spec.kind, PropertyKind::Flag);
        assert!(!ScopeTag::Measure.has_property("SourceColumn"));
    }

    #[test]
    fn kinds_accept_matching_values() {
        assert!(PropertyKind::Flag.accepts(&Value::Bool(true)));
        assert!(!PropertyKind::Flag.accepts(&Value::String("true".into())));
        assert!(PropertyKind::Real.accepts(&Value::Int(3)));
        assert!(PropertyKind::Text.accepts(&Value::Null));
    }
}
