//! Declaration manifests
//!
//! A manifest is a JSON file listing entity declarations and, optionally,
//! search requests. The CLI derives container definitions and statements
//! from it without touching a backend.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use docmap_core::{AttributeDescriptor, MetadataRegistry};
use docmap_schema::{derive, ContainerSchema, SchemaError};
use docmap_search::statement::build;
use docmap_search::{QuerySpec, SearchRequest};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Docmap(#[from] docmap_core::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Declarations of one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityManifest {
    pub entity: String,
    /// Container name; the pluralized entity name when absent
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub entities: Vec<EntityManifest>,
    #[serde(default)]
    pub searches: Vec<SearchRequest>,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Registry holding every declaration of the manifest
    pub fn registry(&self) -> Result<MetadataRegistry, ManifestError> {
        let registry = MetadataRegistry::new();
        for entity in &self.entities {
            for attribute in &entity.attributes {
                registry.declare(&entity.entity, attribute.clone())?;
            }
        }
        Ok(registry)
    }

    /// Container schema of every entity, in manifest order
    pub fn schemas(&self) -> Result<Vec<ContainerSchema>, ManifestError> {
        let registry = self.registry()?;
        self.entities
            .iter()
            .map(|entity| -> Result<ContainerSchema, ManifestError> {
                let descriptor = registry.resolve(&entity.entity);
                Ok(derive(&descriptor, entity.container.as_deref())?)
            })
            .collect()
    }

    /// Statement of every search request, in manifest order
    pub fn statements(&self) -> Result<Vec<QuerySpec>, ManifestError> {
        self.searches
            .iter()
            .map(|request| build(request).map_err(ManifestError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_schema::PartitionKeySpec;

    const MANIFEST: &str = r#"{
        "entities": [
            {
                "entity": "Contact",
                "attributes": [
                    {"field": "tenantId", "role": "partitionKey"},
                    {"field": "email", "role": "uniqueKey"},
                    {"field": "createdAt", "role": "temporal"}
                ]
            },
            {"entity": "Sheep", "container": "flock"}
        ],
        "searches": [
            {"kind": "vector", "path": "/embedding", "vector": [0.1, 0.2]},
            {"kind": "text", "text": "rust", "fields": ["title"]}
        ]
    }"#;

    #[test]
    fn test_schemas_from_manifest() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let schemas = manifest.schemas().unwrap();

        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].id, "contacts");
        assert_eq!(
            schemas[0].partition_key,
            Some(PartitionKeySpec::Simple { path: "/tenantId".into() })
        );
        assert!(schemas[0].unique_keys.contains("/email"));
        assert!(schemas[0].index_policy.is_some());

        assert_eq!(schemas[1].id, "flock");
        assert!(schemas[1].partition_key.is_none());
        assert!(schemas[1].index_policy.is_none());
    }

    #[test]
    fn test_statements_from_manifest() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let statements = manifest.statements().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].query.contains("VectorDistance(c.embedding"));
        assert!(statements[1].query.contains("FullTextContains(c.title"));
    }

    #[test]
    fn test_invalid_declarations_are_reported() {
        let manifest = Manifest::from_json(
            r#"{"entities": [{"entity": "Bad", "attributes": [{"role": "partitionKey"}]}]}"#,
        )
        .unwrap();
        let err = manifest.schemas().unwrap_err();
        assert!(err.to_string().contains("'Bad'"));

        assert!(matches!(Manifest::from_json("{"), Err(ManifestError::Parse(_))));
        assert!(matches!(
            Manifest::load("/nonexistent/manifest.json"),
            Err(ManifestError::Io { .. })
        ));
    }
}
