//! # docmap Core
//!
//! Core library for docmap, an entity mapping layer over document stores.
//!
//! This crate provides the shared data model:
//!
//! - [`Value`] / [`Document`] - Typed field values and stored items
//! - [`MetadataRegistry`] - Per-entity declarations (partition key, unique
//!   keys, temporal fields, vector embeddings, full-text fields)
//! - [`FilterCondition`] - Field filters over documents
//! - [`pluralize`] - Default container naming
//!
//! ## Example
//!
//! ```rust
//! use docmap_core::{Declarations, MetadataRegistry, Role};
//!
//! let registry = MetadataRegistry::new();
//! let mut decls = Declarations::new("Contact");
//! decls.partition_key("tenantId").unique_key("email").temporal("createdAt");
//! registry.apply(decls).unwrap();
//!
//! let descriptor = registry.resolve("Contact");
//! assert!(descriptor.has_temporal());
//! assert_eq!(descriptor.with_role(Role::UniqueKey).count(), 1);
//! ```

pub mod error;
pub mod filter;
pub mod metadata;
pub mod pluralize;
pub mod value;
pub mod vector;

pub use error::{BackendError, Error, Result, SearchKind};
pub use filter::{Filter, FilterCondition};
pub use metadata::{
    Analyzer, AttributeConfig, AttributeDescriptor, Declarations, EdmType, Entity,
    EntityDescriptor, FullTextConfig, MetadataRegistry, Role, VectorDataType, VectorDistance,
    VectorEmbeddingConfig, VectorIndexType,
};
pub use pluralize::pluralize;
pub use value::{
    from_document, get_path, strip_envelope, to_document, Document, PartitionValue, Value,
    ENVELOPE_FIELDS,
};
