//! Entity filter queries
//!
//! A filter clause is a map of dotted entity paths to expected values; all
//! entries of a clause must match (AND). A query is one clause or a list of
//! clauses, any of which may match (OR).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::FilterError;

/// Sentinel used in configuration for "the field exists"
pub const CATALOG_FILTER_EXISTS: &str = "CATALOG_FILTER_EXISTS";

/// Expected value of a single filter key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Field equals the value
    Equals(String),
    /// Field equals any of the values
    AnyOf(Vec<String>),
    /// Field is present, whatever its value
    Exists,
}

impl FilterValue {
    /// Turn the configuration sentinel into the existence predicate
    pub fn resolve_exists(self) -> Self {
        match self {
            FilterValue::Equals(value) if value == CATALOG_FILTER_EXISTS => FilterValue::Exists,
            other => other,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Equals(value.to_string())
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterValue::Equals(value) => serializer.serialize_str(value),
            FilterValue::AnyOf(values) => values.serialize(serializer),
            FilterValue::Exists => serializer.serialize_str(CATALOG_FILTER_EXISTS),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFilterValue {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawFilterValue::deserialize(deserializer)? {
            RawFilterValue::One(value) => FilterValue::Equals(value),
            RawFilterValue::Many(values) => FilterValue::AnyOf(values),
        })
    }
}

/// A conjunction of key/value constraints
pub type FilterClause = BTreeMap<String, FilterValue>;

/// One clause or a disjunction of clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityFilterQuery {
    Any(Vec<FilterClause>),
    Single(FilterClause),
}

impl Default for EntityFilterQuery {
    /// All components
    fn default() -> Self {
        let mut clause = FilterClause::new();
        clause.insert("kind".to_string(), FilterValue::from("Component"));
        EntityFilterQuery::Single(clause)
    }
}

impl EntityFilterQuery {
    pub fn clauses(&self) -> Vec<FilterClause> {
        match self {
            EntityFilterQuery::Any(clauses) => clauses.clone(),
            EntityFilterQuery::Single(clause) => vec![clause.clone()],
        }
    }
}

fn resolve_clause(clause: &FilterClause) -> FilterClause {
    clause
        .iter()
        .map(|(key, value)| (key.clone(), value.clone().resolve_exists()))
        .collect()
}

/// Narrow every configured clause with the caller's override
///
/// The configured clause wins on a key conflict, so an override can only
/// add constraints. Sentinel values become [`FilterValue::Exists`].
pub fn merge_entity_filters(
    filter_override: &FilterClause,
    configured: &EntityFilterQuery,
) -> Vec<FilterClause> {
    let filter_override = resolve_clause(filter_override);
    configured
        .clauses()
        .iter()
        .map(|clause| {
            let mut merged = filter_override.clone();
            merged.extend(resolve_clause(clause));
            merged
        })
        .collect()
}

/// Parse `key=value,key2=value2` into a filter clause
///
/// Segments are trimmed and empty ones skipped. A segment without a value
/// (`key` or `key=`) matches the empty string; a segment without a key is an
/// error. The empty string parses to the empty clause.
pub fn parse_entity_filter_string(input: &str) -> Result<FilterClause, FilterError> {
    let mut clause = FilterClause::new();

    for segment in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = segment.split('=').map(str::trim);
        let key = parts.next().unwrap_or_default();
        if key.is_empty() {
            return Err(FilterError::InvalidFormat(segment.to_string()));
        }
        let value = parts.next().unwrap_or_default();
        clause.insert(key.to_string(), FilterValue::from(value));
    }

    Ok(clause)
}
