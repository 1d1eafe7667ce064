use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{EdmType, Error, Result};

/// A stored item: field name to typed value.
pub type Document = BTreeMap<String, Value>;

/// Fields the backend adds around a stored item. Never returned to callers.
pub const ENVELOPE_FIELDS: &[&str] = &[
    "_rid",
    "_self",
    "_etag",
    "_attachments",
    "_ts",
    "_lsn",
    ".metadata",
    "odata.etag",
    "odata.metadata",
];

/// Typed field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Temporal value, stored as an RFC 3339 string on the wire
    DateTime(DateTime<Utc>),
    /// Dense embedding
    Vector(Vec<f32>),
    Array(Vec<Value>),
    Map(Document),
}

impl Value {
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            // 2^63 rounds to i64::MAX as f64, hence the strict upper bound
            Value::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Numeric array view, used for embeddings that arrive untyped
    pub fn as_vector(&self) -> Option<Vec<f32>> {
        match self {
            Value::Vector(v) => Some(v.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_f64().map(|f| f as f32))
                .collect(),
            _ => None,
        }
    }

    /// Text view used by full-text matching: strings as-is, temporal values
    /// in wire form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::DateTime(dt) => Some(format_datetime(dt)),
            _ => None,
        }
    }

    /// Entity data model type tag of this value
    pub fn edm_type(&self) -> Option<EdmType> {
        match self {
            Value::Null | Value::Array(_) | Value::Map(_) | Value::Vector(_) => None,
            Value::Bool(_) => Some(EdmType::Boolean),
            Value::Int(i) if i32::try_from(*i).is_ok() => Some(EdmType::Int32),
            Value::Int(_) => Some(EdmType::Int64),
            Value::Float(_) => Some(EdmType::Double),
            Value::String(_) => Some(EdmType::String),
            Value::DateTime(_) => Some(EdmType::DateTime),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Vector(_) => "vector",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Loose equality used by filters and uniqueness checks: numbers compare
    /// by value across int/float, vectors compare with numeric arrays.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Vector(_), Value::Array(_)) | (Value::Array(_), Value::Vector(_)) => {
                self.as_vector() == other.as_vector()
            }
            (Value::DateTime(a), Value::String(b)) | (Value::String(b), Value::DateTime(a)) => {
                parse_datetime(b).map(|b| b == *a).unwrap_or(false)
            }
            _ => self == other,
        }
    }
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::DateTime(dt) => serde_json::Value::String(format_datetime(&dt)),
            Value::Vector(v) => serde_json::Value::Array(
                v.into_iter()
                    .map(|x| {
                        serde_json::Number::from_f64(f64::from(x))
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(doc) => serde_json::Value::Object(
                doc.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Partition key value of one item: one component per partition key path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionValue {
    /// No partition key (unpartitioned container, or the item has none)
    None,
    Single(Value),
    Hierarchical(Vec<Value>),
}

impl PartitionValue {
    /// Stable string key, used to address logical partitions
    pub fn key(&self) -> String {
        let json = match self {
            PartitionValue::None => serde_json::Value::Null,
            PartitionValue::Single(v) => serde_json::Value::from(v.clone()),
            PartitionValue::Hierarchical(vs) => serde_json::Value::Array(
                vs.iter().cloned().map(serde_json::Value::from).collect(),
            ),
        };
        json.to_string()
    }
}

impl From<&str> for PartitionValue {
    fn from(s: &str) -> Self {
        PartitionValue::Single(Value::from(s))
    }
}

impl From<String> for PartitionValue {
    fn from(s: String) -> Self {
        PartitionValue::Single(Value::String(s))
    }
}

impl From<Value> for PartitionValue {
    fn from(v: Value) -> Self {
        PartitionValue::Single(v)
    }
}

/// Split a `/a/b` or `a.b` field path into its segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(|c| c == '/' || c == '.')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Look up a (possibly nested) field path in a document
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let segments = path_segments(path);
    let (first, rest) = segments.split_first()?;
    let mut current = doc.get(*first)?;
    for segment in rest {
        current = match current {
            Value::Map(map) => map.get(*segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Remove backend envelope fields from a document
pub fn strip_envelope(doc: &mut Document) {
    for field in ENVELOPE_FIELDS {
        doc.remove(*field);
    }
    doc.retain(|key, _| !key.starts_with("odata."));
}

/// Serialize an entity into a document
pub fn to_document<T: Serialize>(item: &T) -> Result<Document> {
    match serde_json::to_value(item)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()),
        other => Err(Error::Serialization(format!(
            "entity must serialize to an object, got {}",
            json_type(&other)
        ))),
    }
}

/// Deserialize a document into an entity
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    let json = serde_json::Value::from(Value::Map(doc));
    Ok(serde_json::from_value(json)?)
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_i64_rejects_fractions_and_out_of_range() {
        assert_eq!(Value::Float(4.0).as_i64(), Some(4));
        assert_eq!(Value::Float(-9.0e15).as_i64(), Some(-9_000_000_000_000_000));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert_eq!(Value::Float(1e30).as_i64(), None);
        assert_eq!(Value::Float(-1e30).as_i64(), None);
        assert_eq!(Value::Float(9_223_372_036_854_775_808.0).as_i64(), None);
        assert_eq!(Value::Float(f64::NAN).as_i64(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_i64(), None);
    }

    #[test]
    fn test_nested_path_lookup() {
        let doc = to_document(&json!({"address": {"city": "Paris"}, "id": "1"})).unwrap();
        assert_eq!(get_path(&doc, "/address/city"), Some(&Value::from("Paris")));
        assert_eq!(get_path(&doc, "address.city"), Some(&Value::from("Paris")));
        assert_eq!(get_path(&doc, "/address/zip"), None);
        assert_eq!(get_path(&doc, "/id/nested"), None);
    }

    #[test]
    fn test_strip_envelope() {
        let mut doc = to_document(&json!({
            "id": "1", "_etag": "x", "_ts": 1, "_rid": "r", "odata.type": "t", "name": "a"
        }))
        .unwrap();
        strip_envelope(&mut doc);
        let keys: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(keys, vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_datetime_wire_form() {
        let dt = parse_datetime("2024-03-01T10:00:00Z").unwrap();
        let json = serde_json::Value::from(Value::DateTime(dt));
        assert_eq!(json, json!("2024-03-01T10:00:00Z"));
        assert!(Value::DateTime(dt).loosely_equals(&Value::from("2024-03-01T10:00:00+00:00")));
    }

    #[test]
    fn test_edm_type_tags() {
        assert_eq!(Value::Int(5).edm_type(), Some(EdmType::Int32));
        assert_eq!(Value::Int(i64::MAX).edm_type(), Some(EdmType::Int64));
        assert_eq!(Value::Float(1.5).edm_type(), Some(EdmType::Double));
        assert_eq!(Value::Null.edm_type(), None);
    }

    #[test]
    fn test_partition_value_key_is_stable() {
        let a = PartitionValue::Hierarchical(vec![Value::from("t1"), Value::from("eu")]);
        let b = PartitionValue::Hierarchical(vec![Value::from("t1"), Value::from("eu")]);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), PartitionValue::from("t1").key());
    }
}
