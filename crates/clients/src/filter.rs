//! Filter and sort model for experiment run queries
//!
//! Conditions combine with `&` and `|`. Combining with the operator a
//! compound filter already uses extends that compound instead of nesting
//! it, so `a & b & c` serializes as a single `and` over three conditions.

use std::ops::{BitAnd, BitOr};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use platform_core::ExperimentId;

/// How a condition compares a run attribute with its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    /// Whether the attribute is set at all; the value is a boolean
    Defined,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Id(Uuid),
    Time(DateTime<Utc>),
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Id(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Time(value)
    }
}

/// A single comparison against one run attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Condition {
    ProjectId {
        operator: ComparisonOperator,
        value: FilterValue,
    },
    ExperimentId {
        operator: ComparisonOperator,
        value: FilterValue,
    },
    RunId {
        operator: ComparisonOperator,
        value: FilterValue,
    },
    DeletedAt {
        operator: ComparisonOperator,
        value: FilterValue,
    },
    Tag {
        key: String,
        operator: ComparisonOperator,
        value: FilterValue,
    },
    Param {
        key: String,
        operator: ComparisonOperator,
        value: FilterValue,
    },
    Metric {
        key: String,
        operator: ComparisonOperator,
        value: FilterValue,
    },
}

/// A condition, or a logical combination of filters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Filter {
    Compound {
        operator: LogicalOperator,
        conditions: Vec<Filter>,
    },
    Condition(Condition),
}

impl Filter {
    pub fn project_id(operator: ComparisonOperator, value: impl Into<FilterValue>) -> Self {
        Filter::Condition(Condition::ProjectId {
            operator,
            value: value.into(),
        })
    }

    pub fn experiment_id(operator: ComparisonOperator, value: ExperimentId) -> Self {
        Filter::Condition(Condition::ExperimentId {
            operator,
            value: value.into(),
        })
    }

    pub fn run_id(operator: ComparisonOperator, value: impl Into<FilterValue>) -> Self {
        Filter::Condition(Condition::RunId {
            operator,
            value: value.into(),
        })
    }

    pub fn deleted_at(operator: ComparisonOperator, value: impl Into<FilterValue>) -> Self {
        Filter::Condition(Condition::DeletedAt {
            operator,
            value: value.into(),
        })
    }

    pub fn tag(
        key: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Condition(Condition::Tag {
            key: key.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn param(
        key: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Condition(Condition::Param {
            key: key.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn metric(
        key: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Condition(Condition::Metric {
            key: key.into(),
            operator,
            value: value.into(),
        })
    }

    /// Runs belonging to any of the given experiments
    ///
    /// Returns `None` for an empty set, which would otherwise match nothing.
    pub fn experiment_id_one_of(ids: &[ExperimentId]) -> Option<Self> {
        ids.iter()
            .map(|&id| Filter::experiment_id(ComparisonOperator::Eq, id))
            .reduce(|acc, filter| acc | filter)
    }

    pub fn and(self, other: Filter) -> Self {
        combine(self, other, LogicalOperator::And)
    }

    pub fn or(self, other: Filter) -> Self {
        combine(self, other, LogicalOperator::Or)
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Filter::Condition(condition)
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

/// Join two filters, splicing in the conditions of either side that is
/// already a compound over `operator`
fn combine(first: Filter, second: Filter, operator: LogicalOperator) -> Filter {
    let mut conditions = Vec::new();
    for filter in [first, second] {
        match filter {
            Filter::Compound {
                operator: inner,
                conditions: nested,
            } if inner == operator => conditions.extend(nested),
            other => conditions.push(other),
        }
    }
    Filter::Compound {
        operator,
        conditions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort key of a run query; earlier keys take precedence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Sort {
    StartedAt { order: SortOrder },
    RunNumber { order: SortOrder },
    Duration { order: SortOrder },
    Tag { key: String, order: SortOrder },
    Param { key: String, order: SortOrder },
    Metric { key: String, order: SortOrder },
}
