//! # docmap Schema
//!
//! Derives the container definition of an entity from its metadata.
//!
//! ## Overview
//!
//! - **Container id**: an explicit name, else the pluralized entity name
//! - **Partition key**: `Simple` (one path) or `Hierarchical` (1 to 3 paths)
//! - **Unique keys**: one path per unique-key field, as a set
//! - **Index policy**: a max-precision range index on string paths whenever
//!   the entity has a temporal field
//! - **Vector / full-text policies**: embedding paths with their dimensions
//!   and distance function, searchable text paths
//!
//! ## Example
//!
//! ```rust
//! use docmap_core::{Declarations, MetadataRegistry};
//! use docmap_schema::{derive, PartitionKeySpec};
//!
//! let registry = MetadataRegistry::new();
//! let mut decls = Declarations::new("Event");
//! decls.partition_key("type").temporal("createdAt");
//! registry.apply(decls).unwrap();
//!
//! let schema = derive(&registry.resolve("Event"), None).unwrap();
//! assert_eq!(schema.id, "events");
//! assert_eq!(schema.partition_key, Some(PartitionKeySpec::Simple { path: "/type".into() }));
//! assert!(schema.index_policy.is_some());
//! ```

pub mod derive;
pub mod schema;

pub use derive::{derive, field_path};
pub use schema::{
    ContainerSchema, IndexDataType, IndexKind, PartitionKeyKind, PartitionKeySpec,
    RangeIndexRule, SchemaError, VectorEmbeddingSpec, VectorIndexSpec, DEFAULT_LANGUAGE,
    MAX_PARTITION_KEY_PATHS,
};
