//! Container schema definitions
//!
//! A [`ContainerSchema`] is derived from one entity descriptor and is what
//! the backend receives when the container is provisioned.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use docmap_core::{get_path, Document, PartitionValue, Value as FieldValue};
use docmap_core::{VectorDataType, VectorDistance, VectorIndexType};

/// Default language of full-text paths
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Maximum number of paths in a hierarchical partition key
pub const MAX_PARTITION_KEY_PATHS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionKeyKind {
    Hash,
    MultiHash,
}

/// Partition key of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartitionKeySpec {
    /// One path, `Hash` kind, version 1
    Simple { path: String },
    /// One to three paths
    Hierarchical {
        paths: Vec<String>,
        version: u8,
        kind: PartitionKeyKind,
    },
}

impl PartitionKeySpec {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            PartitionKeySpec::Simple { path } => vec![path.as_str()],
            PartitionKeySpec::Hierarchical { paths, .. } => {
                paths.iter().map(String::as_str).collect()
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, PartitionKeySpec::Hierarchical { .. })
    }

    pub fn kind(&self) -> PartitionKeyKind {
        match self {
            PartitionKeySpec::Simple { .. } => PartitionKeyKind::Hash,
            PartitionKeySpec::Hierarchical { kind, .. } => *kind,
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            PartitionKeySpec::Simple { .. } => 1,
            PartitionKeySpec::Hierarchical { version, .. } => *version,
        }
    }

    pub fn to_definition(&self) -> Value {
        json!({
            "paths": self.paths(),
            "kind": self.kind(),
            "version": self.version(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Range,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDataType {
    String,
    Number,
}

/// Range index over string paths, added when the entity has temporal fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeIndexRule {
    pub path: String,
    pub kind: IndexKind,
    pub data_type: IndexDataType,
    /// -1 means maximum precision
    pub precision: i32,
}

impl Default for RangeIndexRule {
    fn default() -> Self {
        Self {
            path: "/*".to_string(),
            kind: IndexKind::Range,
            data_type: IndexDataType::String,
            precision: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorEmbeddingSpec {
    pub path: String,
    pub data_type: VectorDataType,
    pub dimensions: usize,
    pub distance_function: VectorDistance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexSpec {
    pub path: String,
    #[serde(rename = "type")]
    pub index_type: VectorIndexType,
}

/// Everything needed to provision one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSchema {
    pub id: String,
    /// `None` means the container is unpartitioned
    #[serde(default)]
    pub partition_key: Option<PartitionKeySpec>,
    #[serde(default)]
    pub unique_keys: BTreeSet<String>,
    #[serde(default)]
    pub index_policy: Option<RangeIndexRule>,
    #[serde(default)]
    pub vector_embeddings: Vec<VectorEmbeddingSpec>,
    #[serde(default)]
    pub vector_indexes: Vec<VectorIndexSpec>,
    #[serde(default)]
    pub full_text_paths: Vec<String>,
}

impl ContainerSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: None,
            unique_keys: BTreeSet::new(),
            index_policy: None,
            vector_embeddings: Vec::new(),
            vector_indexes: Vec::new(),
            full_text_paths: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.partition_key.is_some()
    }

    /// Partition key value of a document under this schema. Missing
    /// components are null.
    pub fn partition_value(&self, doc: &Document) -> PartitionValue {
        let component = |path: &str| get_path(doc, path).cloned().unwrap_or(FieldValue::Null);
        match &self.partition_key {
            None => PartitionValue::None,
            Some(PartitionKeySpec::Simple { path }) => PartitionValue::Single(component(path)),
            Some(PartitionKeySpec::Hierarchical { paths, .. }) => {
                PartitionValue::Hierarchical(paths.iter().map(|p| component(p)).collect())
            }
        }
    }

    /// Container definition in the backend's wire format
    pub fn to_definition(&self) -> Value {
        let mut definition = Map::new();
        definition.insert("id".into(), json!(self.id));

        if let Some(partition_key) = &self.partition_key {
            definition.insert("partitionKey".into(), partition_key.to_definition());
        }

        let unique_keys: Vec<Value> = self
            .unique_keys
            .iter()
            .map(|path| json!({ "paths": [path] }))
            .collect();
        definition.insert("uniqueKeyPolicy".into(), json!({ "uniqueKeys": unique_keys }));

        let mut indexing = Map::new();
        if let Some(rule) = &self.index_policy {
            indexing.insert(
                "includedPaths".into(),
                json!([{
                    "path": rule.path,
                    "indexes": [{
                        "kind": rule.kind,
                        "dataType": rule.data_type,
                        "precision": rule.precision,
                    }],
                }]),
            );
        }
        if !self.vector_indexes.is_empty() {
            let excluded: Vec<Value> = self
                .vector_indexes
                .iter()
                .map(|index| json!({ "path": format!("{}/*", index.path) }))
                .collect();
            indexing.insert("excludedPaths".into(), Value::Array(excluded));
            indexing.insert("vectorIndexes".into(), json!(self.vector_indexes));
        }
        if !self.full_text_paths.is_empty() {
            let indexes: Vec<Value> = self
                .full_text_paths
                .iter()
                .map(|path| json!({ "path": path }))
                .collect();
            indexing.insert("fullTextIndexes".into(), Value::Array(indexes));
        }
        if !indexing.is_empty() {
            definition.insert("indexingPolicy".into(), Value::Object(indexing));
        }

        if !self.vector_embeddings.is_empty() {
            definition.insert(
                "vectorEmbeddingPolicy".into(),
                json!({ "vectorEmbeddings": self.vector_embeddings }),
            );
        }

        if !self.full_text_paths.is_empty() {
            let paths: Vec<Value> = self
                .full_text_paths
                .iter()
                .map(|path| json!({ "path": path, "language": DEFAULT_LANGUAGE }))
                .collect();
            definition.insert(
                "fullTextPolicy".into(),
                json!({ "defaultLanguage": DEFAULT_LANGUAGE, "fullTextPaths": paths }),
            );
        }

        Value::Object(definition)
    }
}

/// Errors that can occur during schema derivation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Entity '{entity}' has an invalid partition key: {reason}")]
    InvalidPartitionKey { entity: String, reason: String },

    #[error("Entity '{entity}' declares {count} hierarchical partition key paths (expected 1 to 3)")]
    PartitionKeyPathCount { entity: String, count: usize },

    #[error("Entity '{entity}' has a unique key with an empty path")]
    EmptyUniqueKey { entity: String },

    #[error("Container name for entity '{entity}' cannot be empty")]
    EmptyContainerName { entity: String },
}

impl SchemaError {
    /// Entity type the error is about
    pub fn entity(&self) -> &str {
        match self {
            SchemaError::InvalidPartitionKey { entity, .. }
            | SchemaError::PartitionKeyPathCount { entity, .. }
            | SchemaError::EmptyUniqueKey { entity }
            | SchemaError::EmptyContainerName { entity } => entity,
        }
    }
}

impl From<SchemaError> for docmap_core::Error {
    fn from(err: SchemaError) -> Self {
        docmap_core::Error::Schema {
            entity: err.entity().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_accessors() {
        let simple = PartitionKeySpec::Simple { path: "/tenantId".into() };
        assert_eq!(simple.paths(), vec!["/tenantId"]);
        assert_eq!(simple.kind(), PartitionKeyKind::Hash);
        assert_eq!(simple.version(), 1);

        let hierarchical = PartitionKeySpec::Hierarchical {
            paths: vec!["/tenantId".into(), "/region".into()],
            version: 2,
            kind: PartitionKeyKind::MultiHash,
        };
        assert!(hierarchical.is_hierarchical());
        assert_eq!(
            hierarchical.to_definition(),
            json!({"paths": ["/tenantId", "/region"], "kind": "MultiHash", "version": 2})
        );
    }

    #[test]
    fn test_definition_of_plain_container() {
        let schema = ContainerSchema::new("contacts");
        assert_eq!(
            schema.to_definition(),
            json!({"id": "contacts", "uniqueKeyPolicy": {"uniqueKeys": []}})
        );
    }

    #[test]
    fn test_definition_with_range_index_and_unique_keys() {
        let mut schema = ContainerSchema::new("events");
        schema.unique_keys.insert("/email".into());
        schema.index_policy = Some(RangeIndexRule::default());

        let definition = schema.to_definition();
        assert_eq!(definition["uniqueKeyPolicy"]["uniqueKeys"][0]["paths"][0], "/email");
        assert_eq!(
            definition["indexingPolicy"]["includedPaths"][0],
            json!({"path": "/*", "indexes": [{"kind": "Range", "dataType": "String", "precision": -1}]})
        );
    }

    #[test]
    fn test_partition_value_of_document() {
        let doc: Document = docmap_core::to_document(&json!({
            "tenantId": "t1", "address": {"region": "eu"}
        }))
        .unwrap();

        let mut schema = ContainerSchema::new("orders");
        assert_eq!(schema.partition_value(&doc), PartitionValue::None);

        schema.partition_key = Some(PartitionKeySpec::Simple { path: "/tenantId".into() });
        assert_eq!(schema.partition_value(&doc), PartitionValue::from("t1"));

        schema.partition_key = Some(PartitionKeySpec::Hierarchical {
            paths: vec!["/tenantId".into(), "/address/region".into(), "/missing".into()],
            version: 2,
            kind: PartitionKeyKind::MultiHash,
        });
        assert_eq!(
            schema.partition_value(&doc),
            PartitionValue::Hierarchical(vec![
                FieldValue::from("t1"),
                FieldValue::from("eu"),
                FieldValue::Null
            ])
        );
    }

    #[test]
    fn test_schema_error_converts_to_core_error() {
        let err: docmap_core::Error = SchemaError::PartitionKeyPathCount {
            entity: "Order".into(),
            count: 4,
        }
        .into();
        assert!(matches!(err, docmap_core::Error::Schema { ref entity, .. } if entity == "Order"));
    }
}
