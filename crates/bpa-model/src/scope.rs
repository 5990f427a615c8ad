//! Rule scopes.
//!
//! A rule declares its scope as a comma-separated list of tokens. Most tokens
//! name a concrete object type ([`ScopeTag`]); two legacy aliases expand at
//! resolution time:
//!
//! - `Column` → `DataColumn`, `CalculatedColumn`, `CalculatedTableColumn`
//! - `DataSource` → `ProviderDataSource`

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ScopeError;

static TAGS: [ScopeTag; 25] = ScopeTag::ALL;

/// Concrete object type a rule can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeTag {
    Model,
    Table,
    CalculatedTable,
    Measure,
    DataColumn,
    CalculatedColumn,
    CalculatedTableColumn,
    Hierarchy,
    Level,
    Relationship,
    Partition,
    Perspective,
    Culture,
    Kpi,
    CalculationGroup,
    CalculationItem,
    ProviderDataSource,
    StructuredDataSource,
    NamedExpression,
    ModelRole,
    ModelRoleMember,
    TablePermission,
    Variation,
    Calendar,
    UserDefinedFunction,
}

impl ScopeTag {
    pub const ALL: [ScopeTag; 25] = [
        ScopeTag::Model,
        ScopeTag::Table,
        ScopeTag::CalculatedTable,
        ScopeTag::Measure,
        ScopeTag::DataColumn,
        ScopeTag::CalculatedColumn,
        ScopeTag::CalculatedTableColumn,
        ScopeTag::Hierarchy,
        ScopeTag::Level,
        ScopeTag::Relationship,
        ScopeTag::Partition,
        ScopeTag::Perspective,
        ScopeTag::Culture,
        ScopeTag::Kpi,
        ScopeTag::CalculationGroup,
        ScopeTag::CalculationItem,
        ScopeTag::ProviderDataSource,
        ScopeTag::StructuredDataSource,
        ScopeTag::NamedExpression,
        ScopeTag::ModelRole,
        ScopeTag::ModelRoleMember,
        ScopeTag::TablePermission,
        ScopeTag::Variation,
        ScopeTag::Calendar,
        ScopeTag::UserDefinedFunction,
    ];

    /// Token used in rule documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "Model",
            Self::Table => "Table",
            Self::CalculatedTable => "CalculatedTable",
            Self::Measure => "Measure",
            Self::DataColumn => "DataColumn",
            Self::CalculatedColumn => "CalculatedColumn",
            Self::CalculatedTableColumn => "CalculatedTableColumn",
            Self::Hierarchy => "Hierarchy",
            Self::Level => "Level",
            Self::Relationship => "Relationship",
            Self::Partition => "Partition",
            Self::Perspective => "Perspective",
            Self::Culture => "Culture",
            Self::Kpi => "KPI",
            Self::CalculationGroup => "CalculationGroup",
            Self::CalculationItem => "CalculationItem",
            Self::ProviderDataSource => "ProviderDataSource",
            Self::StructuredDataSource => "StructuredDataSource",
            Self::NamedExpression => "NamedExpression",
            Self::ModelRole => "ModelRole",
            Self::ModelRoleMember => "ModelRoleMember",
            Self::TablePermission => "TablePermission",
            Self::Variation => "Variation",
            Self::Calendar => "Calendar",
            Self::UserDefinedFunction => "UserDefinedFunction",
        }
    }

    /// Parse a concrete tag (case-insensitive). Aliases are not accepted here.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(token))
    }

    /// Coarse object type exposed to expressions as `ObjectType`.
    ///
    /// All column flavours report `Column`, table flavours report `Table` and
    /// data source flavours report `DataSource`.
    pub fn object_type(self) -> &'static str {
        match self {
            Self::DataColumn | Self::CalculatedColumn | Self::CalculatedTableColumn => "Column",
            Self::Table | Self::CalculatedTable | Self::CalculationGroup => "Table",
            Self::ProviderDataSource | Self::StructuredDataSource => "DataSource",
            other => other.as_str(),
        }
    }

    pub fn is_column(self) -> bool {
        matches!(
            self,
            Self::DataColumn | Self::CalculatedColumn | Self::CalculatedTableColumn
        )
    }

    pub fn is_table(self) -> bool {
        matches!(
            self,
            Self::Table | Self::CalculatedTable | Self::CalculationGroup
        )
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scope token as written in a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeToken {
    Tag(ScopeTag),
    /// Alias for every column flavour.
    Column,
    /// Alias for provider data sources.
    DataSource,
}

impl ScopeToken {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("Column") {
            return Some(Self::Column);
        }
        if token.eq_ignore_ascii_case("DataSource") {
            return Some(Self::DataSource);
        }
        ScopeTag::parse(token).map(Self::Tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tag(tag) => tag.as_str(),
            Self::Column => "Column",
            Self::DataSource => "DataSource",
        }
    }

    /// Concrete tags this token stands for.
    pub fn expand(self) -> &'static [ScopeTag] {
        match self {
            Self::Column => &[
                ScopeTag::DataColumn,
                ScopeTag::CalculatedColumn,
                ScopeTag::CalculatedTableColumn,
            ],
            Self::DataSource => &[ScopeTag::ProviderDataSource],
            Self::Tag(tag) => std::slice::from_ref(&TAGS[tag as usize]),
        }
    }
}

/// The validated, non-empty set of scope tokens of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(BTreeSet<ScopeToken>);

impl Scope {
    /// Parse a comma-separated scope string, rejecting unknown tokens.
    pub fn parse(text: &str) -> Result<Self, ScopeError> {
        let mut tokens = BTreeSet::new();
        for raw in text.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let token = ScopeToken::parse(raw).ok_or_else(|| ScopeError::UnknownToken {
                token: raw.to_string(),
            })?;
            tokens.insert(token);
        }
        if tokens.is_empty() {
            return Err(ScopeError::Empty);
        }
        Ok(Self(tokens))
    }

    pub fn from_tokens(tokens: impl IntoIterator<Item = ScopeToken>) -> Result<Self, ScopeError> {
        let tokens: BTreeSet<ScopeToken> = tokens.into_iter().collect();
        if tokens.is_empty() {
            return Err(ScopeError::Empty);
        }
        Ok(Self(tokens))
    }

    pub fn tokens(&self) -> impl Iterator<Item = ScopeToken> + '_ {
        self.0.iter().copied()
    }

    /// Concrete tags after alias expansion.
    pub fn resolve(&self) -> BTreeSet<ScopeTag> {
        resolve_scope(self)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(token.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl From<ScopeTag> for Scope {
    fn from(tag: ScopeTag) -> Self {
        Self(BTreeSet::from([ScopeToken::Tag(tag)]))
    }
}

/// Expand aliases of a parsed scope into concrete tags.
pub fn resolve_scope(scope: &Scope) -> BTreeSet<ScopeTag> {
    scope
        .tokens()
        .flat_map(|token| token.expand().iter().copied())
        .collect()
}

/// Resolve raw scope tokens into concrete tags.
///
/// Fails on the first unrecognised token; unknown tokens are never dropped.
pub fn resolve_tokens<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeSet<ScopeTag>, ScopeError> {
    let mut resolved = BTreeSet::new();
    for raw in tokens {
        let token = ScopeToken::parse(raw).ok_or_else(|| ScopeError::UnknownToken {
            token: raw.trim().to_string(),
        })?;
        resolved.extend(token.expand().iter().copied());
    }
    if resolved.is_empty() {
        return Err(ScopeError::Empty);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_alias_expands_to_all_column_flavours() {
        let scope = Scope::parse("Column").expect("scope");
        assert_eq!(
            scope.resolve(),
            BTreeSet::from([
                ScopeTag::DataColumn,
                ScopeTag::CalculatedColumn,
                ScopeTag::CalculatedTableColumn,
            ])
        );
    }

    #[test]
    fn data_source_alias_expands_to_provider_sources() {
        let resolved = resolve_tokens(["DataSource"]).expect("resolve");
        assert_eq!(resolved, BTreeSet::from([ScopeTag::ProviderDataSource]));
    }

    #[test]
    fn concrete_tags_pass_through() {
        let resolved = resolve_tokens(["Measure", " KPI "]).expect("resolve");
        assert_eq!(resolved, BTreeSet::from([ScopeTag::Measure, ScopeTag::Kpi]));
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = Scope::parse("Measure, Colum").expect_err("unknown token");
        assert_eq!(
            err,
            ScopeError::UnknownToken {
                token: "Colum".to_string()
            }
        );
    }

    #[test]
    fn empty_scope_is_rejected() {
        assert_eq!(Scope::parse(" , ").expect_err("empty"), ScopeError::Empty);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let scope = Scope::parse("Table,Column,DataColumn").expect("scope");
        let reparsed = Scope::parse(&scope.to_string()).expect("reparse");
        assert_eq!(scope, reparsed);
    }
}
