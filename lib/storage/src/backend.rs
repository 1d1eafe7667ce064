//! Backend collaborator interfaces
//!
//! A backend client exposes a chain of handles: client, database, container.
//! Provisioning calls are create-if-not-exists and must be idempotent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use docmap_core::{BackendError, Document, FilterCondition, PartitionValue};
use docmap_schema::ContainerSchema;
use docmap_search::{FeedOptions, QueryExecutor, QueryResponse, QuerySpec};

use crate::config::ConnectionConfig;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Entry point of a backend client library
#[async_trait]
pub trait Client: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> BackendResult<Arc<dyn ClientHandle>>;
}

#[async_trait]
pub trait ClientHandle: Send + Sync {
    async fn provision_database(&self, name: &str) -> BackendResult<Arc<dyn DatabaseHandle>>;
}

#[async_trait]
pub trait DatabaseHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn provision_container(
        &self,
        schema: &ContainerSchema,
    ) -> BackendResult<Arc<dyn ContainerHandle>>;
}

/// Item primitives of one container
#[async_trait]
pub trait ContainerHandle: Send + Sync {
    fn id(&self) -> &str;

    /// Store a new item. Fails with `Conflict` when the id or a unique key is
    /// already taken within the partition.
    async fn create_item(&self, item: Document) -> BackendResult<Document>;

    async fn upsert_item(&self, item: Document) -> BackendResult<Document>;

    /// Replace an existing item. Fails with `NotFound` when absent.
    async fn replace_item(&self, item: Document) -> BackendResult<Document>;

    async fn read_item(&self, id: &str, partition: &PartitionValue) -> BackendResult<Document>;

    async fn delete_item(&self, id: &str, partition: &PartitionValue) -> BackendResult<()>;

    async fn list_items(&self, options: &ListOptions) -> BackendResult<Page>;

    async fn query(&self, spec: &QuerySpec, options: &FeedOptions) -> BackendResult<QueryResponse>;
}

/// Options of one listing request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default)]
    pub filter: Option<FilterCondition>,
    #[serde(default)]
    pub max_item_count: Option<usize>,
    /// Token returned with the previous page
    #[serde(default)]
    pub continuation: Option<String>,
    #[serde(default)]
    pub partition_key: Option<PartitionValue>,
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Document>,
    /// `None` once the listing is exhausted
    pub continuation: Option<String>,
}

/// Runs search statements against a container handle
#[derive(Clone)]
pub struct ContainerExecutor(pub Arc<dyn ContainerHandle>);

#[async_trait]
impl QueryExecutor for ContainerExecutor {
    async fn execute(&self, spec: &QuerySpec, options: &FeedOptions) -> BackendResult<QueryResponse> {
        self.0.query(spec, options).await
    }
}
