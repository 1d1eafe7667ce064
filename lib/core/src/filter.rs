// Field filters over documents
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::value::{get_path, parse_datetime, Document, Value};

pub trait Filter {
    fn matches(&self, doc: &Document) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCondition {
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: Value },
    LessThan { field: String, value: Value },
    GreaterEqual { field: String, value: Value },
    LessEqual { field: String, value: Value },
    Contains { field: String, value: String },
    Exists { field: String },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl FilterCondition {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterCondition::Equals { field: field.into(), value: value.into() }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterCondition::GreaterThan { field: field.into(), value: value.into() }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterCondition::LessThan { field: field.into(), value: value.into() }
    }

    fn compare_field(doc: &Document, field: &str, value: &Value, accept: fn(Ordering) -> bool) -> bool {
        get_path(doc, field)
            .and_then(|v| compare(v, value))
            .map(accept)
            .unwrap_or(false)
    }

    pub fn evaluate(&self, doc: &Document) -> bool {
        match self {
            FilterCondition::Equals { field, value } => get_path(doc, field)
                .map(|v| v.loosely_equals(value))
                .unwrap_or(false),
            FilterCondition::NotEquals { field, value } => get_path(doc, field)
                .map(|v| !v.loosely_equals(value))
                .unwrap_or(true),
            FilterCondition::GreaterThan { field, value } => {
                Self::compare_field(doc, field, value, Ordering::is_gt)
            }
            FilterCondition::LessThan { field, value } => {
                Self::compare_field(doc, field, value, Ordering::is_lt)
            }
            FilterCondition::GreaterEqual { field, value } => {
                Self::compare_field(doc, field, value, Ordering::is_ge)
            }
            FilterCondition::LessEqual { field, value } => {
                Self::compare_field(doc, field, value, Ordering::is_le)
            }
            FilterCondition::Contains { field, value } => get_path(doc, field)
                .and_then(Value::as_text)
                .map(|v| v.contains(value.as_str()))
                .unwrap_or(false),
            FilterCondition::Exists { field } => get_path(doc, field).is_some(),
            FilterCondition::And(conditions) => conditions.iter().all(|c| c.evaluate(doc)),
            FilterCondition::Or(conditions) => conditions.iter().any(|c| c.evaluate(doc)),
            FilterCondition::Not(condition) => !condition.evaluate(doc),
        }
    }
}

impl Filter for FilterCondition {
    fn matches(&self, doc: &Document) -> bool {
        self.evaluate(doc)
    }
}

/// Order two values of compatible kinds. Temporal values compare with their
/// RFC 3339 string form.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::String(b)) => parse_datetime(b).map(|b| a.cmp(&b)),
        (Value::String(a), Value::DateTime(b)) => parse_datetime(a).map(|a| a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn doc() -> Document {
        let mut address = Document::new();
        address.insert("city".into(), Value::from("Lisbon"));
        let mut doc = Document::new();
        doc.insert("name".into(), Value::from("Ada"));
        doc.insert("age".into(), Value::Int(36));
        doc.insert("score".into(), Value::Float(0.75));
        doc.insert("address".into(), Value::Map(address));
        doc.insert(
            "createdAt".into(),
            Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        );
        doc
    }

    #[test]
    fn test_equality_and_nested_paths() {
        let doc = doc();
        assert!(FilterCondition::equals("name", "Ada").matches(&doc));
        assert!(FilterCondition::equals("age", 36.0).matches(&doc));
        assert!(FilterCondition::equals("address.city", "Lisbon").matches(&doc));
        assert!(FilterCondition::equals("/address/city", "Lisbon").matches(&doc));
        assert!(!FilterCondition::equals("missing", "x").matches(&doc));
        assert!(FilterCondition::NotEquals { field: "missing".into(), value: Value::Null }
            .matches(&doc));
    }

    #[test]
    fn test_range_comparisons() {
        let doc = doc();
        assert!(FilterCondition::gt("age", 30i64).matches(&doc));
        assert!(FilterCondition::lt("score", 1.0).matches(&doc));
        assert!(FilterCondition::gt("createdAt", "2024-01-01T00:00:00Z").matches(&doc));
        assert!(!FilterCondition::gt("name", 3i64).matches(&doc));
    }

    #[test]
    fn test_boolean_combinators() {
        let doc = doc();
        let condition = FilterCondition::And(vec![
            FilterCondition::equals("name", "Ada"),
            FilterCondition::Or(vec![
                FilterCondition::lt("age", 18i64),
                FilterCondition::Contains { field: "address.city".into(), value: "Lis".into() },
            ]),
        ]);
        assert!(condition.matches(&doc));
        assert!(!FilterCondition::Not(Box::new(condition)).matches(&doc));
    }

    #[test]
    fn test_deserialize_condition() {
        let condition: FilterCondition =
            serde_json::from_str(r#"{"greaterEqual": {"field": "age", "value": 36}}"#).unwrap();
        assert!(condition.matches(&doc()));
    }
}
