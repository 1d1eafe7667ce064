//! Entity metadata registry
//!
//! Entities declare facts about their fields (partition key, unique keys,
//! temporal fields, vector embeddings, full-text fields) once, at startup.
//! Schema derivation and the repository mapper read the resulting
//! [`EntityDescriptor`] many times afterwards.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Entity data model type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Edm.Int64")]
    Int64,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    #[serde(rename = "Edm.DateTime")]
    DateTime,
    #[serde(rename = "Edm.Guid")]
    Guid,
    #[serde(rename = "Edm.Binary")]
    Binary,
}

impl EdmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdmType::String => "Edm.String",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
            EdmType::Double => "Edm.Double",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Guid => "Edm.Guid",
            EdmType::Binary => "Edm.Binary",
        }
    }
}

/// What a declaration says about its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    PartitionKey,
    UniqueKey,
    Temporal,
    VectorEmbedding,
    FullTextField,
    /// Only carries an EDM type tag
    Typed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDataType {
    #[default]
    Float32,
    Uint8,
    Int8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDistance {
    #[default]
    Cosine,
    DotProduct,
    Euclidean,
}

impl VectorDistance {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorDistance::Cosine => "cosine",
            VectorDistance::DotProduct => "dotproduct",
            VectorDistance::Euclidean => "euclidean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorIndexType {
    #[default]
    Flat,
    QuantizedFlat,
    #[serde(rename = "diskANN")]
    DiskAnn,
}

impl VectorIndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorIndexType::Flat => "flat",
            VectorIndexType::QuantizedFlat => "quantizedFlat",
            VectorIndexType::DiskAnn => "diskANN",
        }
    }
}

/// Configuration of a vector embedding field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorEmbeddingConfig {
    #[serde(default)]
    pub data_type: VectorDataType,
    pub dimensions: usize,
    #[serde(default)]
    pub distance_function: VectorDistance,
    #[serde(default)]
    pub index_type: VectorIndexType,
}

impl VectorEmbeddingConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            data_type: VectorDataType::default(),
            dimensions,
            distance_function: VectorDistance::default(),
            index_type: VectorIndexType::default(),
        }
    }

    #[must_use]
    pub fn with_distance(mut self, distance: VectorDistance) -> Self {
        self.distance_function = distance;
        self
    }

    #[must_use]
    pub fn with_index(mut self, index_type: VectorIndexType) -> Self {
        self.index_type = index_type;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    #[default]
    Standard,
    Keyword,
    Simple,
}

/// Configuration of a full-text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullTextConfig {
    #[serde(default = "default_searchable")]
    pub searchable: bool,
    #[serde(default)]
    pub highlightable: bool,
    #[serde(default)]
    pub analyzer: Analyzer,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_searchable() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

impl Default for FullTextConfig {
    fn default() -> Self {
        Self {
            searchable: true,
            highlightable: false,
            analyzer: Analyzer::default(),
            weight: 1.0,
        }
    }
}

impl FullTextConfig {
    #[must_use]
    pub fn highlightable(mut self) -> Self {
        self.highlightable = true;
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// Role-specific payload of a declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum AttributeConfig {
    /// `value` is a field name, a literal path, or a hierarchical spec
    /// object with a `paths` array. Absent means "the annotated field".
    PartitionKey {
        #[serde(default)]
        value: Option<serde_json::Value>,
    },
    UniqueKey {
        #[serde(default)]
        value: Option<String>,
    },
    Temporal,
    VectorEmbedding(VectorEmbeddingConfig),
    FullTextField(FullTextConfig),
    Typed,
}

impl AttributeConfig {
    pub fn role(&self) -> Role {
        match self {
            AttributeConfig::PartitionKey { .. } => Role::PartitionKey,
            AttributeConfig::UniqueKey { .. } => Role::UniqueKey,
            AttributeConfig::Temporal => Role::Temporal,
            AttributeConfig::VectorEmbedding(_) => Role::VectorEmbedding,
            AttributeConfig::FullTextField(_) => Role::FullTextField,
            AttributeConfig::Typed => Role::Typed,
        }
    }
}

/// One declared fact about a field, or about the entity type itself when
/// `field` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub edm_type: Option<EdmType>,
    #[serde(flatten)]
    pub config: AttributeConfig,
}

impl AttributeDescriptor {
    pub fn on_field(field: impl Into<String>, config: AttributeConfig) -> Self {
        let edm_type = match config {
            AttributeConfig::Temporal => Some(EdmType::DateTime),
            _ => None,
        };
        Self {
            field: Some(field.into()),
            edm_type,
            config,
        }
    }

    pub fn on_type(config: AttributeConfig) -> Self {
        Self {
            field: None,
            edm_type: None,
            config,
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.config.role()
    }

    /// What the declaration applies to: the field, or for type-level unique
    /// keys the declared path.
    fn target(&self) -> Option<&str> {
        match (&self.field, &self.config) {
            (Some(field), _) => Some(field),
            (None, AttributeConfig::UniqueKey { value }) => value.as_deref(),
            _ => None,
        }
    }

    fn same_slot(&self, other: &AttributeDescriptor) -> bool {
        if self.role() != other.role() {
            return false;
        }
        // at most one partition key per entity
        self.role() == Role::PartitionKey || self.target() == other.target()
    }
}

/// All declarations of one entity type, in declaration order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

impl EntityDescriptor {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: Vec::new(),
        }
    }

    /// Merge one declaration: a declaration for an existing (role, field)
    /// slot replaces it in place, anything else is appended.
    pub fn merge(&mut self, attribute: AttributeDescriptor) {
        match self.attributes.iter_mut().find(|a| a.same_slot(&attribute)) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(move |a| a.role() == role)
    }

    pub fn partition_key(&self) -> Option<&AttributeDescriptor> {
        self.with_role(Role::PartitionKey).next()
    }

    pub fn has_temporal(&self) -> bool {
        self.with_role(Role::Temporal).next().is_some()
    }

    /// All declarations made on one field
    pub fn field_attributes<'a, 'f>(
        &'a self,
        field: &'f str,
    ) -> impl Iterator<Item = &'a AttributeDescriptor> + 'f
    where
        'a: 'f,
    {
        self.attributes
            .iter()
            .filter(move |a| a.field.as_deref() == Some(field))
    }

    /// EDM type declared for a field, if any
    pub fn edm_type(&self, field: &str) -> Option<EdmType> {
        self.field_attributes(field).find_map(|a| a.edm_type)
    }

    pub fn vector_fields(&self) -> Vec<&str> {
        self.with_role(Role::VectorEmbedding)
            .filter_map(|a| a.field.as_deref())
            .collect()
    }

    pub fn vector_config(&self, field: &str) -> Option<&VectorEmbeddingConfig> {
        self.field_attributes(field).find_map(|a| match &a.config {
            AttributeConfig::VectorEmbedding(config) => Some(config),
            _ => None,
        })
    }

    pub fn full_text_config(&self, field: &str) -> Option<&FullTextConfig> {
        self.field_attributes(field).find_map(|a| match &a.config {
            AttributeConfig::FullTextField(config) => Some(config),
            _ => None,
        })
    }

    fn full_text_fields(&self, keep: impl Fn(&FullTextConfig) -> bool) -> Vec<&str> {
        self.attributes
            .iter()
            .filter_map(|a| match (&a.field, &a.config) {
                (Some(field), AttributeConfig::FullTextField(config)) if keep(config) => {
                    Some(field.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn searchable_fields(&self) -> Vec<&str> {
        self.full_text_fields(|c| c.searchable)
    }

    pub fn highlightable_fields(&self) -> Vec<&str> {
        self.full_text_fields(|c| c.highlightable)
    }
}

/// Builder collecting the declarations of one entity type
#[derive(Debug, Clone)]
pub struct Declarations {
    entity: String,
    attributes: Vec<AttributeDescriptor>,
}

impl Declarations {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: Vec::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Partition by the named field
    pub fn partition_key(&mut self, field: &str) -> &mut Self {
        self.push(AttributeDescriptor::on_field(
            field,
            AttributeConfig::PartitionKey { value: None },
        ))
    }

    /// Type-level partition key given as a field name or literal path
    pub fn partition_key_path(&mut self, path: &str) -> &mut Self {
        self.push(AttributeDescriptor::on_type(AttributeConfig::PartitionKey {
            value: Some(serde_json::Value::String(path.to_string())),
        }))
    }

    /// Type-level hierarchical partition key (1 to 3 paths)
    pub fn hierarchical_partition_key<S: AsRef<str>>(&mut self, paths: &[S]) -> &mut Self {
        let paths: Vec<&str> = paths.iter().map(|p| p.as_ref()).collect();
        self.push(AttributeDescriptor::on_type(AttributeConfig::PartitionKey {
            value: Some(serde_json::json!({ "paths": paths })),
        }))
    }

    pub fn unique_key(&mut self, field: &str) -> &mut Self {
        self.push(AttributeDescriptor::on_field(
            field,
            AttributeConfig::UniqueKey { value: None },
        ))
    }

    /// Type-level unique key on a literal path
    pub fn unique_key_path(&mut self, path: &str) -> &mut Self {
        self.push(AttributeDescriptor::on_type(AttributeConfig::UniqueKey {
            value: Some(path.to_string()),
        }))
    }

    pub fn temporal(&mut self, field: &str) -> &mut Self {
        self.push(AttributeDescriptor::on_field(field, AttributeConfig::Temporal))
    }

    pub fn typed(&mut self, field: &str, edm_type: EdmType) -> &mut Self {
        if edm_type == EdmType::DateTime {
            return self.temporal(field);
        }
        let mut attribute = AttributeDescriptor::on_field(field, AttributeConfig::Typed);
        attribute.edm_type = Some(edm_type);
        self.push(attribute)
    }

    pub fn vector_embedding(&mut self, field: &str, config: VectorEmbeddingConfig) -> &mut Self {
        self.push(AttributeDescriptor::on_field(
            field,
            AttributeConfig::VectorEmbedding(config),
        ))
    }

    pub fn full_text(&mut self, field: &str, config: FullTextConfig) -> &mut Self {
        self.push(AttributeDescriptor::on_field(
            field,
            AttributeConfig::FullTextField(config),
        ))
    }

    pub fn push(&mut self, attribute: AttributeDescriptor) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn into_attributes(self) -> Vec<AttributeDescriptor> {
        self.attributes
    }
}

/// An application type stored as documents.
///
/// `declare` is the static counterpart of field annotations: it runs once,
/// when the type is registered.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name, used for the registry key and the default container name
    const NAME: &'static str;

    fn declare(_declarations: &mut Declarations) {}
}

/// Process-scoped store of entity descriptors, keyed by entity type name
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entities: RwLock<HashMap<String, EntityDescriptor>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one declaration for `entity`
    pub fn declare(&self, entity: &str, attribute: AttributeDescriptor) -> Result<()> {
        validate(entity, &attribute)?;
        let mut entities = self.entities.write();
        entities
            .entry(entity.to_string())
            .or_insert_with(|| EntityDescriptor::new(entity))
            .merge(attribute);
        Ok(())
    }

    /// Record a batch of declarations. Nothing is recorded if any is invalid.
    pub fn apply(&self, declarations: Declarations) -> Result<()> {
        let entity = declarations.entity.clone();
        let attributes = declarations.into_attributes();
        for attribute in &attributes {
            validate(&entity, attribute)?;
        }
        let mut entities = self.entities.write();
        let descriptor = entities
            .entry(entity.clone())
            .or_insert_with(|| EntityDescriptor::new(entity.as_str()));
        for attribute in attributes {
            descriptor.merge(attribute);
        }
        tracing::debug!(
            "Registered entity {} ({} attributes)",
            entity,
            descriptor.attributes.len()
        );
        Ok(())
    }

    /// Run the entity's declarations and record them
    pub fn register<T: Entity>(&self) -> Result<()> {
        let mut declarations = Declarations::new(T::NAME);
        T::declare(&mut declarations);
        self.apply(declarations)
    }

    /// Register the entity unless it already has a descriptor
    pub fn ensure_registered<T: Entity>(&self) -> Result<()> {
        if self.is_registered(T::NAME) {
            return Ok(());
        }
        self.register::<T>()
    }

    #[inline]
    pub fn is_registered(&self, entity: &str) -> bool {
        self.entities.read().contains_key(entity)
    }

    /// Descriptor of `entity`. An entity without declarations is legal and
    /// resolves to an empty descriptor.
    pub fn resolve(&self, entity: &str) -> EntityDescriptor {
        self.entities
            .read()
            .get(entity)
            .cloned()
            .unwrap_or_else(|| EntityDescriptor::new(entity))
    }

    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate(entity: &str, attribute: &AttributeDescriptor) -> Result<()> {
    if let Some(field) = &attribute.field {
        if field.trim().is_empty() {
            return Err(Error::configuration(entity, None, "field name cannot be empty"));
        }
        if let AttributeConfig::VectorEmbedding(config) = &attribute.config {
            if config.dimensions == 0 {
                return Err(Error::configuration(
                    entity,
                    Some(field),
                    "vector embedding must have at least one dimension",
                ));
            }
        }
        return Ok(());
    }

    match &attribute.config {
        AttributeConfig::PartitionKey { value } => {
            let empty = match value {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if empty {
                return Err(Error::configuration(
                    entity,
                    None,
                    "type-level partition key requires a value",
                ));
            }
        }
        AttributeConfig::UniqueKey { value } => {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(Error::configuration(
                    entity,
                    None,
                    "type-level unique key requires a path",
                ));
            }
        }
        other => {
            return Err(Error::configuration(
                entity,
                None,
                format!("{:?} can only be declared on a field", other.role()),
            ));
        }
    }
    Ok(())
}
