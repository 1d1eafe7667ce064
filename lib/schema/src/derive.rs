//! Schema derivation from entity descriptors

use serde_json::{Map, Value};

use docmap_core::{pluralize, AttributeConfig, EntityDescriptor, Role};

use crate::schema::{
    ContainerSchema, PartitionKeyKind, PartitionKeySpec, RangeIndexRule, SchemaError,
    VectorEmbeddingSpec, VectorIndexSpec, MAX_PARTITION_KEY_PATHS,
};

/// Backend path of a field name: `email` becomes `/email`, paths that are
/// already absolute are kept.
pub fn field_path(field: &str) -> String {
    if field.starts_with('/') {
        field.to_string()
    } else {
        format!("/{}", field)
    }
}

/// Derive the container schema of an entity.
///
/// The container id is `container` when given, else the pluralized entity
/// name. Derivation is deterministic: the same descriptor always yields the
/// same schema.
pub fn derive(
    descriptor: &EntityDescriptor,
    container: Option<&str>,
) -> Result<ContainerSchema, SchemaError> {
    let entity = descriptor.entity.as_str();
    let id = match container {
        Some(name) if name.trim().is_empty() => {
            return Err(SchemaError::EmptyContainerName { entity: entity.to_string() })
        }
        Some(name) => name.to_string(),
        None => pluralize(entity),
    };

    let mut schema = ContainerSchema::new(id);

    if let Some(attribute) = descriptor.partition_key() {
        let value = match &attribute.config {
            AttributeConfig::PartitionKey { value } => value.as_ref(),
            _ => None,
        };
        schema.partition_key = Some(partition_key(entity, attribute.field.as_deref(), value)?);
    }

    for attribute in descriptor.with_role(Role::UniqueKey) {
        let declared = match &attribute.config {
            AttributeConfig::UniqueKey { value } => value.as_deref(),
            _ => None,
        };
        let path = attribute
            .field
            .as_deref()
            .or(declared)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SchemaError::EmptyUniqueKey { entity: entity.to_string() })?;
        schema.unique_keys.insert(field_path(path));
    }

    if descriptor.has_temporal() {
        schema.index_policy = Some(RangeIndexRule::default());
    }

    for attribute in &descriptor.attributes {
        let Some(field) = attribute.field.as_deref() else {
            continue;
        };
        match &attribute.config {
            AttributeConfig::VectorEmbedding(config) => {
                schema.vector_embeddings.push(VectorEmbeddingSpec {
                    path: field_path(field),
                    data_type: config.data_type,
                    dimensions: config.dimensions,
                    distance_function: config.distance_function,
                });
                schema.vector_indexes.push(VectorIndexSpec {
                    path: field_path(field),
                    index_type: config.index_type,
                });
            }
            AttributeConfig::FullTextField(config) if config.searchable => {
                schema.full_text_paths.push(field_path(field));
            }
            _ => {}
        }
    }

    tracing::debug!(
        "Derived schema for {}: container={}, partitioned={}, unique_keys={}, range_index={}",
        entity,
        schema.id,
        schema.is_partitioned(),
        schema.unique_keys.len(),
        schema.index_policy.is_some()
    );

    Ok(schema)
}

fn partition_key(
    entity: &str,
    field: Option<&str>,
    value: Option<&Value>,
) -> Result<PartitionKeySpec, SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidPartitionKey {
        entity: entity.to_string(),
        reason: reason.to_string(),
    };

    match value {
        Some(Value::Object(spec)) if spec.contains_key("paths") => hierarchical(entity, spec),
        Some(Value::String(path)) if !path.trim().is_empty() => {
            Ok(PartitionKeySpec::Simple { path: field_path(path.trim()) })
        }
        None | Some(Value::Null) | Some(Value::String(_)) => match field {
            Some(field) => Ok(PartitionKeySpec::Simple { path: field_path(field) }),
            None => Err(invalid("no value and no field to fall back to")),
        },
        Some(Value::Object(_)) => Err(invalid("object value must contain a `paths` array")),
        Some(_) => Err(invalid("value must be a string or a hierarchical key object")),
    }
}

fn hierarchical(entity: &str, spec: &Map<String, Value>) -> Result<PartitionKeySpec, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidPartitionKey {
        entity: entity.to_string(),
        reason,
    };

    let paths = spec
        .get("paths")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("`paths` must be an array".into()))?;
    if paths.is_empty() || paths.len() > MAX_PARTITION_KEY_PATHS {
        return Err(SchemaError::PartitionKeyPathCount {
            entity: entity.to_string(),
            count: paths.len(),
        });
    }
    let paths = paths
        .iter()
        .map(|path| match path.as_str() {
            Some(p) if !p.trim().is_empty() => Ok(field_path(p.trim())),
            _ => Err(invalid(format!("invalid path {}", path))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let version = match spec.get("version") {
        None | Some(Value::Null) => 2,
        Some(v) => match v.as_u64() {
            Some(n @ (1 | 2)) => n as u8,
            _ => return Err(invalid(format!("unsupported version {}", v))),
        },
    };
    let kind = match spec.get("kind").and_then(Value::as_str) {
        None | Some("MultiHash") => PartitionKeyKind::MultiHash,
        Some("Hash") => PartitionKeyKind::Hash,
        Some(other) => return Err(invalid(format!("unsupported kind {}", other))),
    };

    Ok(PartitionKeySpec::Hierarchical { paths, version, kind })
}
