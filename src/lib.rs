//! # docmap
//!
//! A mapping and query layer between application entities and a document
//! store.
//!
//! docmap derives the physical container definition of an entity from
//! declarations made once at startup, bootstraps the backend connection with
//! a bounded retry, gives typed repositories over containers, and
//! synthesizes vector, full-text and hybrid search statements whose results
//! it normalizes into one ranked sequence.
//!
//! ## Quick Start
//!
//! The example runs against the in-process backend, which ships behind the
//! `memory` feature.
//!
//! ```rust
//! use docmap::prelude::*;
//! use docmap_storage::MemoryClient;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Article {
//!     id: Option<String>,
//!     category: String,
//!     content: String,
//!     embedding: Vec<f32>,
//! }
//!
//! impl Entity for Article {
//!     const NAME: &'static str = "Article";
//!     fn declare(d: &mut Declarations) {
//!         d.partition_key("category")
//!             .full_text("content", FullTextConfig::default())
//!             .vector_embedding("embedding", VectorEmbeddingConfig::new(2));
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let connection = Connection::new(
//!     ConnectionConfig::new("memory://local", "news"),
//!     Arc::new(MemoryClient::new()),
//!     Arc::new(MetadataRegistry::new()),
//! );
//! let articles = connection.repository::<Article>(None).await.unwrap();
//! articles
//!     .create(&Article {
//!         id: None,
//!         category: "tech".into(),
//!         content: "rust ships a new release".into(),
//!         embedding: vec![1.0, 0.0],
//!     })
//!     .await
//!     .unwrap();
//!
//! let results = articles
//!     .search()
//!     .vector_search(VectorRequest::new("/embedding", vec![1.0, 0.0]), None)
//!     .await
//!     .unwrap();
//! assert_eq!(results[0].rank, 1);
//! # });
//! ```
//!
//! ## Crate Structure
//!
//! - [`docmap-core`](https://docs.rs/docmap-core) - Document values, metadata registry, filters, errors
//! - [`docmap-schema`](https://docs.rs/docmap-schema) - Container schema derivation
//! - [`docmap-search`](https://docs.rs/docmap-search) - Search statement synthesis and result fusion
//! - [`docmap-storage`](https://docs.rs/docmap-storage) - Connection bootstrap, repositories, in-memory backend

pub mod manifest;

// Re-export core types
pub use docmap_core::{
    pluralize, AttributeConfig, AttributeDescriptor, BackendError, Declarations, Document,
    EdmType, Entity, EntityDescriptor, Error, FilterCondition, FullTextConfig, MetadataRegistry,
    PartitionValue, Result, Role, SearchKind, Value, VectorDistance, VectorEmbeddingConfig,
    VectorIndexType,
};

// Re-export schema derivation
pub use docmap_schema::{derive, ContainerSchema, PartitionKeySpec, SchemaError};

// Re-export search
pub use docmap_search::{
    FeedOptions, FusionMethod, HybridRequest, QuerySpec, SearchDetails, SearchRequest,
    SearchResult, SearchService, TextMode, TextRequest, VectorRequest,
};

// Re-export storage
pub use docmap_storage::{
    Connection, ConnectionConfig, ConnectionState, FindOptions, Repository,
};

#[cfg(feature = "memory")]
pub use docmap_storage::MemoryClient;

pub use manifest::{Manifest, ManifestError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Connection, ConnectionConfig, Declarations, Entity, Error, FilterCondition, FindOptions,
        FullTextConfig, FusionMethod, HybridRequest, MetadataRegistry, PartitionValue,
        Repository, Result, SearchRequest, SearchResult, TextMode, TextRequest, VectorDistance,
        VectorEmbeddingConfig, VectorRequest,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryClient;
}
