//! Transformation rule definitions.
//!
//! Each destination table names exactly one rule. Rules are declarative:
//! they say which staging relations to read, which rows to keep and how
//! to resolve duplicates. The transformer crate executes them.

use serde::{Deserialize, Serialize};

/// Output columns produced by [`TimeParts`] after the timestamp itself.
pub const TIME_PART_COLUMNS: [&str; 6] = ["hour", "day", "week", "month", "year", "weekday"];

/// Keep only rows where `column` equals `equals` (text comparison).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub equals: String,
}

/// A source column copied to the output, optionally renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
        }
    }

    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name of the column in the output relation.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    Event,
    Catalog,
}

/// A column taken from one side of an event/catalog join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinProjection {
    pub from: JoinSide,
    #[serde(flatten)]
    pub projection: Projection,
}

/// One equality in the join condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub event: String,
    pub catalog: String,
}

/// Fact rows: events joined to a catalog on an exact identifying tuple.
///
/// The join is a filter. Events with no exact catalog match are dropped
/// on purpose: they lack the catalog attributes downstream analytics
/// require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCatalogJoin {
    pub events: String,
    pub catalog: String,
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
    pub match_columns: Vec<MatchPair>,
    /// Epoch-millisecond column on the event side.
    pub time_column: String,
    /// Output name of the rendered event time.
    pub time_alias: String,
    pub key_column: String,
    /// Output columns hashed into the key, in order.
    pub key_fields: Vec<String>,
    pub columns: Vec<JoinProjection>,
}

/// Keep the top-ranked row per natural key, ranking by `order_by` descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDedup {
    pub source: String,
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
    /// Epoch-millisecond column used when the table is run-date scoped.
    #[serde(default)]
    pub time_column: Option<String>,
    pub partition_by: String,
    pub order_by: String,
    pub columns: Vec<Projection>,
}

/// One row per distinct (natural id, display name) pair under a content-hash surrogate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurrogateIdentity {
    pub source: String,
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
    #[serde(default)]
    pub time_column: Option<String>,
    pub natural_key: Projection,
    pub display_name: Projection,
    pub surrogate_column: String,
    /// Non-conflicting attributes reduced with "most complete wins".
    #[serde(default)]
    pub aggregates: Vec<Projection>,
}

/// Calendar decomposition of distinct event timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub source: String,
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
    pub time_column: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformRule {
    EventCatalogJoin(EventCatalogJoin),
    /// Latest known attributes per entity (rank by recency).
    CurrentState(RankedDedup),
    /// Most complete record per entity (rank by a completeness field).
    MostComplete(RankedDedup),
    SurrogateIdentity(SurrogateIdentity),
    TimeParts(TimeParts),
}

impl TransformRule {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransformRule::EventCatalogJoin(_) => "event_catalog_join",
            TransformRule::CurrentState(_) => "current_state",
            TransformRule::MostComplete(_) => "most_complete",
            TransformRule::SurrogateIdentity(_) => "surrogate_identity",
            TransformRule::TimeParts(_) => "time_parts",
        }
    }

    /// Staging relations the rule reads.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            TransformRule::EventCatalogJoin(rule) => vec![&rule.events, &rule.catalog],
            TransformRule::CurrentState(rule) | TransformRule::MostComplete(rule) => {
                vec![&rule.source]
            }
            TransformRule::SurrogateIdentity(rule) => vec![&rule.source],
            TransformRule::TimeParts(rule) => vec![&rule.source],
        }
    }

    /// Epoch-millisecond column that scopes the primary source to a run date.
    pub fn time_column(&self) -> Option<&str> {
        match self {
            TransformRule::EventCatalogJoin(rule) => Some(&rule.time_column),
            TransformRule::CurrentState(rule) | TransformRule::MostComplete(rule) => {
                rule.time_column.as_deref()
            }
            TransformRule::SurrogateIdentity(rule) => rule.time_column.as_deref(),
            TransformRule::TimeParts(rule) => Some(&rule.time_column),
        }
    }

    /// Columns of the audit relation this rule writes, in order.
    pub fn output_columns(&self, run_date_column: &str) -> Vec<String> {
        let mut columns: Vec<String> = match self {
            TransformRule::EventCatalogJoin(rule) => {
                let mut out = vec![rule.key_column.clone(), rule.time_alias.clone()];
                out.extend(
                    rule.columns
                        .iter()
                        .map(|c| c.projection.output_name().to_string()),
                );
                out
            }
            TransformRule::CurrentState(rule) | TransformRule::MostComplete(rule) => rule
                .columns
                .iter()
                .map(|c| c.output_name().to_string())
                .collect(),
            TransformRule::SurrogateIdentity(rule) => {
                let mut out = vec![
                    rule.surrogate_column.clone(),
                    rule.natural_key.output_name().to_string(),
                    rule.display_name.output_name().to_string(),
                ];
                out.extend(rule.aggregates.iter().map(|c| c.output_name().to_string()));
                out
            }
            TransformRule::TimeParts(rule) => {
                let mut out = vec![rule.alias.clone()];
                out.extend(TIME_PART_COLUMNS.iter().map(|c| (*c).to_string()));
                out
            }
        };
        columns.push(run_date_column.to_string());
        columns
    }
}
