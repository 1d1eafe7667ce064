//! In-memory backend
//!
//! Implements every collaborator trait so the repository and search layers
//! can run without a remote service: idempotent provisioning, partitioned
//! item storage with unique keys, envelope fields, paged listing and search
//! plan evaluation.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docmap_core::{Declarations, Entity, MetadataRegistry};
//! use docmap_storage::{Connection, ConnectionConfig, MemoryClient};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Note {
//!     id: Option<String>,
//!     author: String,
//! }
//!
//! impl Entity for Note {
//!     const NAME: &'static str = "Note";
//!     fn declare(d: &mut Declarations) {
//!         d.partition_key("author");
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let connection = Connection::new(
//!     ConnectionConfig::new("memory://local", "app"),
//!     Arc::new(MemoryClient::new()),
//!     Arc::new(MetadataRegistry::new()),
//! );
//! let notes = connection.repository::<Note>(None).await.unwrap();
//! let note = notes.create(&Note { id: None, author: "ada".into() }).await.unwrap();
//! let id = note.id.unwrap();
//! assert!(notes.find(&id, "ada").await.unwrap().is_some());
//! # });
//! ```

mod bm25;
mod eval;

pub use bm25::Bm25Index;
pub use eval::evaluate;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use docmap_core::{get_path, BackendError, Document, PartitionValue, Value};
use docmap_schema::ContainerSchema;
use docmap_search::{FeedOptions, QueryResponse, QuerySpec};

use crate::backend::{
    BackendResult, Client, ClientHandle, ContainerHandle, DatabaseHandle, ListOptions, Page,
};
use crate::config::ConnectionConfig;
use crate::mapper::item_id;

/// Listing page size when the caller sets none
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory backend client
pub struct MemoryClient {
    account: Arc<MemoryAccount>,
    fail_connects: AtomicU32,
    connects: AtomicU32,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            account: Arc::new(MemoryAccount::default()),
            fail_connects: AtomicU32::new(0),
            connects: AtomicU32::new(0),
        }
    }

    /// Make the next `n` connects fail as unavailable
    pub fn fail_connects(&self, n: u32) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Connect calls received so far, failed ones included
    #[inline]
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn database(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.account.databases.read().get(name).cloned()
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Client for MemoryClient {
    async fn connect(&self, config: &ConnectionConfig) -> BackendResult<Arc<dyn ClientHandle>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BackendError::Unavailable(format!(
                "connection refused by {}",
                config.endpoint
            )));
        }
        let handle: Arc<dyn ClientHandle> = self.account.clone();
        Ok(handle)
    }
}

#[derive(Default)]
struct MemoryAccount {
    databases: RwLock<HashMap<String, Arc<MemoryDatabase>>>,
}

#[async_trait]
impl ClientHandle for MemoryAccount {
    async fn provision_database(&self, name: &str) -> BackendResult<Arc<dyn DatabaseHandle>> {
        if name.trim().is_empty() {
            return Err(BackendError::BadRequest("database name cannot be empty".into()));
        }
        let mut databases = self.databases.write();
        let database: Arc<dyn DatabaseHandle> = databases
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating database '{}'", name);
                Arc::new(MemoryDatabase {
                    name: name.to_string(),
                    containers: RwLock::new(HashMap::new()),
                })
            })
            .clone();
        Ok(database)
    }
}

pub struct MemoryDatabase {
    name: String,
    containers: RwLock<HashMap<String, Arc<MemoryContainer>>>,
}

impl MemoryDatabase {
    pub fn container(&self, id: &str) -> Option<Arc<MemoryContainer>> {
        self.containers.read().get(id).cloned()
    }
}

#[async_trait]
impl DatabaseHandle for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    /// An existing container is returned as is, whatever schema is passed.
    async fn provision_container(
        &self,
        schema: &ContainerSchema,
    ) -> BackendResult<Arc<dyn ContainerHandle>> {
        let mut containers = self.containers.write();
        let container: Arc<dyn ContainerHandle> = containers
            .entry(schema.id.clone())
            .or_insert_with(|| {
                tracing::debug!("Creating container '{}' in '{}'", schema.id, self.name);
                Arc::new(MemoryContainer::new(&self.name, schema.clone()))
            })
            .clone();
        Ok(container)
    }
}

type ItemKey = (String, String);

/// One container's items, keyed by (partition key, id)
pub struct MemoryContainer {
    database: String,
    schema: ContainerSchema,
    items: RwLock<BTreeMap<ItemKey, Document>>,
    seq: AtomicU64,
}

impl MemoryContainer {
    fn new(database: &str, schema: ContainerSchema) -> Self {
        Self {
            database: database.to_string(),
            schema,
            items: RwLock::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn schema(&self) -> &ContainerSchema {
        &self.schema
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Partition an item is addressed by; always empty when unpartitioned
    fn partition_of(&self, partition: &PartitionValue) -> String {
        if self.schema.is_partitioned() {
            partition.key()
        } else {
            PartitionValue::None.key()
        }
    }

    fn key_of(&self, doc: &Document) -> BackendResult<ItemKey> {
        let id = item_id(doc)
            .ok_or_else(|| BackendError::BadRequest("item must have a non-empty id".into()))?;
        let partition = self.schema.partition_value(doc);
        Ok((partition.key(), id.to_string()))
    }

    fn in_partition<'a>(
        items: &'a BTreeMap<ItemKey, Document>,
        partition: Option<&str>,
    ) -> impl Iterator<Item = &'a Document> + 'a {
        let partition = partition.map(str::to_string);
        items
            .iter()
            .filter(move |(key, _)| partition.as_deref().map_or(true, |want| key.0 == want))
            .map(|(_, doc)| doc)
    }

    fn check_unique(
        &self,
        items: &BTreeMap<ItemKey, Document>,
        key: &ItemKey,
        doc: &Document,
    ) -> BackendResult<()> {
        for path in &self.schema.unique_keys {
            let value = match get_path(doc, path) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let taken = items.iter().any(|((partition, id), other)| {
                partition == &key.0
                    && id != &key.1
                    && get_path(other, path).map_or(false, |v| v.loosely_equals(value))
            });
            if taken {
                return Err(BackendError::Conflict(format!(
                    "unique key {} already exists in container '{}'",
                    path, self.schema.id
                )));
            }
        }
        Ok(())
    }

    fn stamp(&self, doc: &mut Document) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let rid = format!("{:016x}", seq);
        let link = format!("dbs/{}/colls/{}/docs/{}/", self.database, self.schema.id, rid);
        doc.insert("_self".into(), Value::String(link));
        doc.insert("_rid".into(), Value::String(rid));
        doc.insert("_etag".into(), Value::String(format!("\"{}\"", uuid::Uuid::new_v4())));
        doc.insert("_ts".into(), Value::Int(chrono::Utc::now().timestamp()));
        doc.insert("_attachments".into(), Value::String("attachments/".into()));
    }

    fn write(&self, mut doc: Document, mode: WriteMode) -> BackendResult<Document> {
        let key = self.key_of(&doc)?;
        let mut items = self.items.write();
        let exists = items.contains_key(&key);
        match mode {
            WriteMode::Create if exists => {
                return Err(BackendError::Conflict(format!(
                    "item {} already exists in container '{}'",
                    key.1, self.schema.id
                )))
            }
            WriteMode::Replace if !exists => return Err(BackendError::NotFound(key.1)),
            _ => {}
        }
        self.check_unique(&items, &key, &doc)?;
        self.stamp(&mut doc);
        items.insert(key, doc.clone());
        Ok(doc)
    }

    fn charge(scanned: usize) -> f64 {
        2.0 + scanned as f64 * 0.05
    }
}

#[derive(Clone, Copy)]
enum WriteMode {
    Create,
    Upsert,
    Replace,
}

#[async_trait]
impl ContainerHandle for MemoryContainer {
    fn id(&self) -> &str {
        &self.schema.id
    }

    async fn create_item(&self, item: Document) -> BackendResult<Document> {
        self.write(item, WriteMode::Create)
    }

    async fn upsert_item(&self, item: Document) -> BackendResult<Document> {
        self.write(item, WriteMode::Upsert)
    }

    async fn replace_item(&self, item: Document) -> BackendResult<Document> {
        self.write(item, WriteMode::Replace)
    }

    async fn read_item(&self, id: &str, partition: &PartitionValue) -> BackendResult<Document> {
        let key = (self.partition_of(partition), id.to_string());
        self.items
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn delete_item(&self, id: &str, partition: &PartitionValue) -> BackendResult<()> {
        let key = (self.partition_of(partition), id.to_string());
        self.items
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn list_items(&self, options: &ListOptions) -> BackendResult<Page> {
        let offset = match &options.continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| BackendError::BadRequest(format!("invalid continuation '{}'", token)))?,
            None => 0,
        };
        let page_size = options.max_item_count.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let partition = options.partition_key.as_ref().map(|p| self.partition_of(p));

        let items = self.items.read();
        let mut matching = Self::in_partition(&items, partition.as_deref())
            .filter(|doc| options.filter.as_ref().map_or(true, |f| f.evaluate(doc)))
            .skip(offset);
        let page: Vec<Document> = matching.by_ref().take(page_size).cloned().collect();
        let continuation = matching
            .next()
            .map(|_| (offset + page.len()).to_string());

        Ok(Page {
            items: page,
            continuation,
        })
    }

    async fn query(&self, spec: &QuerySpec, options: &FeedOptions) -> BackendResult<QueryResponse> {
        let plan = spec.plan.as_ref().ok_or_else(|| {
            BackendError::BadRequest(format!(
                "the in-memory backend only evaluates search plans: {}",
                spec.query
            ))
        })?;
        let partition = options.partition_key.as_ref().map(|p| self.partition_of(p));

        let candidates: Vec<Document> = {
            let items = self.items.read();
            Self::in_partition(&items, partition.as_deref())
                .cloned()
                .collect()
        };
        let mut resources = evaluate(plan, &candidates);
        if let Some(max) = options.max_item_count {
            resources.truncate(max);
        }

        Ok(QueryResponse {
            resources,
            request_charge: Self::charge(candidates.len()),
        })
    }
}
