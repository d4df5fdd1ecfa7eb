//! # Filter Expressions
//!
//! Conjunctive filters used for the initial fetch and as the extra,
//! last-applied refinement of every join lookup.
//!
//! Fields are dotted paths with array fan-out; when a path resolves to an
//! array, the expression holds if any element satisfies it. No type
//! coercion: `1` never equals `"1"`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::join::accessor::lookup_path;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Equals
    #[serde(rename = "eq")]
    Eq,

    /// Not equals
    #[serde(rename = "neq")]
    Neq,

    /// Greater than
    #[serde(rename = "gt")]
    Gt,

    /// Greater than or equal
    #[serde(rename = "gte")]
    Gte,

    /// Less than
    #[serde(rename = "lt")]
    Lt,

    /// Less than or equal
    #[serde(rename = "lte")]
    Lte,

    /// Value in list
    #[serde(rename = "in")]
    In,

    /// Is null/not null
    #[serde(rename = "is")]
    Is,
}

impl FilterOperator {
    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Is => "is",
        }
    }

    /// Document-store operator used when rendering a batch
    fn store_operator(&self) -> &'static str {
        match self {
            FilterOperator::Eq | FilterOperator::Is => "$eq",
            FilterOperator::Neq => "$ne",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::In => "$in",
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field path to filter on
    pub field: String,

    /// Comparison operator
    #[serde(rename = "op", alias = "operator")]
    pub operator: FilterOperator,

    /// Value to compare against
    #[serde(default)]
    pub value: Value,
}

impl FilterExpr {
    /// Create a new filter expression
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Create a not-equals filter
    pub fn neq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Neq, value)
    }

    /// Create a greater than filter
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Gt, value)
    }

    /// Create a greater than or equal filter
    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    /// Create a less than filter
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Lt, value)
    }

    /// Create a less than or equal filter
    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Lte, value)
    }

    /// Create an "in list" filter
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Create a null / not-null check. `Value::Null` means "is null".
    pub fn is(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Is, value)
    }

    /// Check if a document matches this filter
    pub fn matches(&self, doc: &Value) -> bool {
        let field_value = match lookup_path(doc, &self.field) {
            Some(v) => v,
            None => {
                return match self.operator {
                    FilterOperator::Is => self.value.is_null(),
                    FilterOperator::Neq => true,
                    _ => false,
                }
            }
        };

        // a fan-out that found the field on no element is absent
        if self.operator == FilterOperator::Is && self.is_empty_fan_out(doc, &field_value) {
            return self.value.is_null();
        }

        // neq holds only when no element equals the value
        if self.operator == FilterOperator::Neq {
            return !Self::equals(&field_value, &self.value);
        }

        match &field_value {
            Value::Array(items) if self.operator != FilterOperator::Is => {
                self.matches_value(&field_value) || items.iter().any(|item| self.matches_value(item))
            }
            other => self.matches_value(other),
        }
    }

    fn is_empty_fan_out(&self, doc: &Value, field_value: &Value) -> bool {
        let empty = field_value.as_array().is_some_and(Vec::is_empty);
        empty
            && self
                .field
                .rsplit_once('.')
                .and_then(|(parent, _)| lookup_path(doc, parent))
                .is_some_and(|parent| parent.is_array())
    }

    fn equals(field_value: &Value, expected: &Value) -> bool {
        field_value == expected
            || field_value
                .as_array()
                .is_some_and(|items| items.contains(expected))
    }

    fn matches_value(&self, field_value: &Value) -> bool {
        match self.operator {
            FilterOperator::Eq => field_value == &self.value,
            FilterOperator::Neq => field_value != &self.value,
            FilterOperator::Gt => compare_json_values(field_value, &self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                compare_json_values(field_value, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => compare_json_values(field_value, &self.value) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                compare_json_values(field_value, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => self
                .value
                .as_array()
                .map(|arr| arr.contains(field_value))
                .unwrap_or(false),
            FilterOperator::Is => {
                if self.value.is_null() {
                    field_value.is_null()
                } else {
                    !field_value.is_null()
                }
            }
        }
    }

    fn to_store_clause(&self) -> Value {
        let value = match self.operator {
            FilterOperator::Is if !self.value.is_null() => {
                return json!({ &self.field: { "$ne": Value::Null } });
            }
            _ => self.value.clone(),
        };
        json!({ &self.field: { self.operator.store_operator(): value } })
    }
}

/// A conjunction of filter expressions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    clauses: Vec<FilterExpr>,
}

impl Filter {
    /// Filter that matches every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a clause (AND)
    pub fn and(mut self, expr: FilterExpr) -> Self {
        self.clauses.push(expr);
        self
    }

    /// Clauses in evaluation order
    pub fn clauses(&self) -> &[FilterExpr] {
        &self.clauses
    }

    /// Returns true if the filter has no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check a document against every clause
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| clause.matches(doc))
    }

    /// Render as a document-store `$and` match expression
    pub fn to_store_query(&self) -> Value {
        match self.clauses.as_slice() {
            [] => Value::Object(Map::new()),
            [single] => single.to_store_clause(),
            many => json!({ "$and": many.iter().map(FilterExpr::to_store_clause).collect::<Vec<_>>() }),
        }
    }
}

impl From<Vec<FilterExpr>> for Filter {
    fn from(clauses: Vec<FilterExpr>) -> Self {
        Self { clauses }
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Self {
            clauses: vec![expr],
        }
    }
}

/// Compare two JSON values for ordering. Mixed types are unordered.
fn compare_json_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_match() {
        let doc = json!({"name": "Alice", "age": 30});

        assert!(FilterExpr::eq("name", json!("Alice")).matches(&doc));
        assert!(!FilterExpr::eq("name", json!("Bob")).matches(&doc));
    }

    #[test]
    fn test_no_type_coercion() {
        let doc = json!({"value": 123});

        assert!(!FilterExpr::eq("value", json!("123")).matches(&doc));
        assert!(FilterExpr::eq("value", json!(123)).matches(&doc));
    }

    #[test]
    fn test_range_operators() {
        let doc = json!({"age": 25});

        assert!(FilterExpr::gte("age", json!(18)).matches(&doc));
        assert!(FilterExpr::lte("age", json!(25)).matches(&doc));
        assert!(!FilterExpr::gt("age", json!(25)).matches(&doc));
        assert!(!FilterExpr::lt("age", json!(25)).matches(&doc));
        assert!(FilterExpr::lt("age", json!(25.5)).matches(&doc));
    }

    #[test]
    fn test_mixed_types_never_compare() {
        let doc = json!({"age": "25"});
        assert!(!FilterExpr::gt("age", json!(1)).matches(&doc));
        assert!(!FilterExpr::lte("age", json!(100)).matches(&doc));
    }

    #[test]
    fn test_nested_path_and_array_fan_out() {
        let doc = json!({"tags": [{"name": "a"}, {"name": "b"}]});

        assert!(FilterExpr::eq("tags.name", json!("b")).matches(&doc));
        assert!(!FilterExpr::eq("tags.name", json!("c")).matches(&doc));
    }

    #[test]
    fn test_neq_over_arrays_and_missing_fields() {
        let doc = json!({"tags": ["a", "b"]});

        assert!(!FilterExpr::neq("tags", json!("a")).matches(&doc));
        assert!(FilterExpr::neq("tags", json!("c")).matches(&doc));
        assert!(FilterExpr::neq("missing", json!(1)).matches(&doc));
    }

    #[test]
    fn test_in_list() {
        let doc = json!({"status": "open"});
        assert!(FilterExpr::in_list("status", vec![json!("open"), json!("held")]).matches(&doc));
        assert!(!FilterExpr::in_list("status", vec![json!("closed")]).matches(&doc));
    }

    #[test]
    fn test_is_null() {
        let doc = json!({"a": 1});
        assert!(FilterExpr::is("missing", Value::Null).matches(&doc));
        assert!(!FilterExpr::is("a", Value::Null).matches(&doc));
        assert!(FilterExpr::is("a", json!(true)).matches(&doc));
    }

    #[test]
    fn test_is_null_when_no_element_has_field() {
        let doc = json!({"tags": [{"other": 1}, {"other": 2}], "meta": {"labels": []}});
        assert!(FilterExpr::is("tags.name", Value::Null).matches(&doc));
        assert!(!FilterExpr::is("tags.name", json!(true)).matches(&doc));

        // an empty array stored in a subdocument is still a value
        assert!(!FilterExpr::is("meta.labels", Value::Null).matches(&doc));

        let named = json!({"tags": [{"other": 1}, {"name": "x"}]});
        assert!(!FilterExpr::is("tags.name", Value::Null).matches(&named));
    }

    #[test]
    fn test_conjunction() {
        let doc = json!({"age": 25, "active": true});
        let filter = Filter::all()
            .and(FilterExpr::gte("age", json!(18)))
            .and(FilterExpr::eq("active", json!(true)));
        assert!(filter.matches(&doc));

        let filter = filter.and(FilterExpr::eq("active", json!(false)));
        assert!(!filter.matches(&doc));
        assert!(Filter::all().matches(&doc));
    }

    #[test]
    fn test_deserialize_from_array() {
        let filter: Filter = serde_json::from_value(json!([
            {"field": "status", "op": "eq", "value": "open"},
            {"field": "total", "operator": "gt", "value": 10}
        ]))
        .unwrap();

        assert_eq!(filter.clauses().len(), 2);
        assert_eq!(filter.clauses()[1].operator, FilterOperator::Gt);
    }

    #[test]
    fn test_store_query_rendering() {
        let filter = Filter::from(FilterExpr::eq("status", json!("open")));
        assert_eq!(filter.to_store_query(), json!({"status": {"$eq": "open"}}));

        let filter = filter.and(FilterExpr::gt("total", json!(5)));
        assert_eq!(
            filter.to_store_query(),
            json!({"$and": [{"status": {"$eq": "open"}}, {"total": {"$gt": 5}}]})
        );
    }
}
