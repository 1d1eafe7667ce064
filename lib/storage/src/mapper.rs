//! Entity mapping
//!
//! Before a write, declared fields are coerced to their declared types and
//! the item gets an `id`. After a read, backend envelope fields are removed.

use docmap_core::value::parse_datetime;
use docmap_core::{
    strip_envelope, AttributeConfig, Document, EdmType, EntityDescriptor, Error, Result, Value,
};

/// Field holding the item identity
pub const ID_FIELD: &str = "id";

/// Identity of a document, if it has a non-empty one
pub fn item_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Prepare a document for writing.
///
/// With `assign_id`, a missing, null or empty `id` is replaced by a fresh
/// UUID v4.
pub fn to_stored(descriptor: &EntityDescriptor, mut doc: Document, assign_id: bool) -> Result<Document> {
    if assign_id && item_id(&doc).is_none() {
        doc.insert(ID_FIELD.to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
    }

    for attribute in &descriptor.attributes {
        let Some(field) = attribute.field.as_deref() else {
            continue;
        };
        let Some(value) = doc.get_mut(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        if let AttributeConfig::VectorEmbedding(config) = &attribute.config {
            let vector = value.as_vector().ok_or_else(|| {
                Error::configuration(
                    &descriptor.entity,
                    Some(field),
                    format!("expected a numeric vector, got {}", value.type_name()),
                )
            })?;
            if vector.len() != config.dimensions {
                return Err(Error::configuration(
                    &descriptor.entity,
                    Some(field),
                    format!(
                        "expected {} dimensions, got {}",
                        config.dimensions,
                        vector.len()
                    ),
                ));
            }
            *value = Value::Vector(vector);
            continue;
        }

        if let Some(edm_type) = attribute.edm_type {
            let coerced = coerce(edm_type, value).map_err(|message| {
                Error::configuration(&descriptor.entity, Some(field), message)
            })?;
            *value = coerced;
        }
    }

    Ok(doc)
}

/// Turn a stored document back into caller data
pub fn from_stored(mut doc: Document) -> Document {
    strip_envelope(&mut doc);
    doc
}

fn coerce(edm_type: EdmType, value: &Value) -> std::result::Result<Value, String> {
    let mismatch = || format!("expected {}, got {}", edm_type.as_str(), value.type_name());
    match edm_type {
        EdmType::DateTime => match value {
            Value::DateTime(_) => Ok(value.clone()),
            // validated, stored as written
            Value::String(s) => parse_datetime(s)
                .map(|_| value.clone())
                .ok_or_else(|| format!("'{}' is not an RFC 3339 date-time", s)),
            _ => Err(mismatch()),
        },
        EdmType::Int32 => {
            let i = value.as_i64().ok_or_else(mismatch)?;
            i32::try_from(i)
                .map(|_| Value::Int(i))
                .map_err(|_| format!("{} is out of range for {}", i, edm_type.as_str()))
        }
        EdmType::Int64 => value.as_i64().map(Value::Int).ok_or_else(mismatch),
        EdmType::Double => value.as_f64().map(Value::Float).ok_or_else(mismatch),
        EdmType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        EdmType::Guid => match value {
            Value::String(s) => uuid::Uuid::parse_str(s)
                .map(|_| value.clone())
                .map_err(|_| format!("'{}' is not a GUID", s)),
            _ => Err(mismatch()),
        },
        EdmType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::DateTime(_) => Ok(Value::String(value.as_text().unwrap_or_default())),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(mismatch()),
        },
        EdmType::Binary => match value {
            Value::String(_) | Value::Array(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_core::{to_document, Declarations, MetadataRegistry, VectorEmbeddingConfig};
    use serde_json::json;

    fn descriptor() -> EntityDescriptor {
        let registry = MetadataRegistry::new();
        let mut decls = Declarations::new("Event");
        decls
            .temporal("createdAt")
            .typed("count", EdmType::Int32)
            .typed("total", EdmType::Int64)
            .typed("ratio", EdmType::Double)
            .typed("owner", EdmType::Guid)
            .vector_embedding("embedding", VectorEmbeddingConfig::new(3));
        registry.apply(decls).unwrap();
        registry.resolve("Event")
    }

    fn doc(value: serde_json::Value) -> Document {
        to_document(&value).unwrap()
    }

    #[test]
    fn test_assigns_id_when_missing_or_empty() {
        let descriptor = EntityDescriptor::new("Note");

        let stored = to_stored(&descriptor, doc(json!({"text": "a"})), true).unwrap();
        let id = item_id(&stored).unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());

        let stored = to_stored(&descriptor, doc(json!({"id": ""})), true).unwrap();
        assert!(item_id(&stored).is_some());

        let stored = to_stored(&descriptor, doc(json!({"id": "n1"})), true).unwrap();
        assert_eq!(item_id(&stored), Some("n1"));

        let stored = to_stored(&descriptor, doc(json!({"text": "a"})), false).unwrap();
        assert!(item_id(&stored).is_none());
    }

    #[test]
    fn test_coerces_declared_types() {
        let stored = to_stored(
            &descriptor(),
            doc(json!({
                "id": "e1",
                "createdAt": "2024-03-01T10:00:00Z",
                "count": 4.0,
                "ratio": 2,
                "owner": "67E55044-10B1-426F-9247-BB680E5FE0C8",
                "embedding": [0.1, 0.2, 0.3],
            })),
            true,
        )
        .unwrap();

        assert_eq!(stored.get("createdAt"), Some(&Value::from("2024-03-01T10:00:00Z")));
        assert_eq!(stored.get("count"), Some(&Value::Int(4)));
        assert_eq!(stored.get("ratio"), Some(&Value::Float(2.0)));
        assert_eq!(
            stored.get("owner"),
            Some(&Value::from("67E55044-10B1-426F-9247-BB680E5FE0C8"))
        );
        assert!(matches!(stored.get("embedding"), Some(Value::Vector(v)) if v.len() == 3));
    }

    #[test]
    fn test_integer_fields_reject_unrepresentable_floats() {
        let stored =
            to_stored(&descriptor(), doc(json!({"total": 1.5e15})), true).unwrap();
        assert_eq!(stored.get("total"), Some(&Value::Int(1_500_000_000_000_000)));

        for total in [1e30, -1e30, 2.5] {
            let err = to_stored(&descriptor(), doc(json!({"total": total})), true).unwrap_err();
            assert!(err.to_string().contains("total"), "{}", err);
        }
        assert!(to_stored(&descriptor(), doc(json!({"count": 1e10})), true).is_err());
    }

    #[test]
    fn test_temporal_strings_keep_their_written_form() {
        for written in [
            "2024-05-01T08:30:00.000Z",
            "2024-05-01T10:30:00+02:00",
            "2024-05-01T08:30:00.123456Z",
        ] {
            let stored =
                to_stored(&descriptor(), doc(json!({"createdAt": written})), true).unwrap();
            assert_eq!(stored.get("createdAt"), Some(&Value::from(written)));
        }

        let typed = parse_datetime("2024-05-01T08:30:00Z").unwrap();
        let mut input = Document::new();
        input.insert("createdAt".into(), Value::DateTime(typed));
        let stored = to_stored(&descriptor(), input, true).unwrap();
        assert_eq!(stored.get("createdAt"), Some(&Value::DateTime(typed)));
    }

    #[test]
    fn test_rejects_values_naming_entity_and_field() {
        let err = to_stored(&descriptor(), doc(json!({"createdAt": "yesterday"})), true).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration { ref entity, field: Some(ref field), .. }
                if entity == "Event" && field == "createdAt"
        ));

        let err = to_stored(&descriptor(), doc(json!({"count": 5_000_000_000i64})), true).unwrap_err();
        assert!(err.to_string().contains("'count'"));

        let err = to_stored(&descriptor(), doc(json!({"embedding": [1.0, 2.0]})), true).unwrap_err();
        assert!(err.to_string().contains("expected 3 dimensions"));
    }

    #[test]
    fn test_nulls_and_undeclared_fields_pass_through() {
        let stored = to_stored(
            &descriptor(),
            doc(json!({"createdAt": null, "free": "text"})),
            false,
        )
        .unwrap();
        assert_eq!(stored.get("createdAt"), Some(&Value::Null));
        assert_eq!(stored.get("free"), Some(&Value::from("text")));
    }

    #[test]
    fn test_from_stored_strips_envelope() {
        let stored = doc(json!({"id": "a", "_rid": "x", "_etag": "\"1\"", "_ts": 1, "name": "n"}));
        let item = from_stored(stored);
        assert_eq!(item.len(), 2);
        assert!(item.contains_key("name"));
    }
}
