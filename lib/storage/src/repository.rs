//! Typed repository over one container

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use docmap_core::{
    from_document, to_document, Entity, EntityDescriptor, Error, FilterCondition, PartitionValue,
    Result,
};
use docmap_schema::ContainerSchema;
use docmap_search::SearchService;

use crate::backend::{ContainerExecutor, ContainerHandle, ListOptions};
use crate::mapper::{self, item_id};

/// Options of [`Repository::find_all`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    #[serde(default)]
    pub filter: Option<FilterCondition>,
    /// Items fetched per backend round trip
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub partition_key: Option<PartitionValue>,
}

impl FindOptions {
    pub fn filter(filter: FilterCondition) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn in_partition(mut self, partition: impl Into<PartitionValue>) -> Self {
        self.partition_key = Some(partition.into());
        self
    }
}

/// CRUD over the container of entity `T`
pub struct Repository<T> {
    container: Arc<dyn ContainerHandle>,
    descriptor: Arc<EntityDescriptor>,
    schema: Arc<ContainerSchema>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            descriptor: self.descriptor.clone(),
            schema: self.schema.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.descriptor.entity)
            .field("container", &self.schema.id)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(
        container: Arc<dyn ContainerHandle>,
        descriptor: EntityDescriptor,
        schema: ContainerSchema,
    ) -> Self {
        Self {
            container,
            descriptor: Arc::new(descriptor),
            schema: Arc::new(schema),
            _entity: PhantomData,
        }
    }

    #[inline]
    pub fn container_id(&self) -> &str {
        &self.schema.id
    }

    #[inline]
    pub fn schema(&self) -> &ContainerSchema {
        &self.schema
    }

    #[inline]
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Store a new item and return the stored form. An `id` is generated
    /// when the item has none.
    pub async fn create(&self, item: &T) -> Result<T> {
        let doc = mapper::to_stored(&self.descriptor, to_document(item)?, true)?;
        let stored = self
            .container
            .create_item(doc)
            .await
            .map_err(|err| Error::backend("create", err))?;
        from_document(mapper::from_stored(stored))
    }

    /// Create or replace the item with the same id and partition
    pub async fn upsert(&self, item: &T) -> Result<T> {
        let doc = mapper::to_stored(&self.descriptor, to_document(item)?, true)?;
        let stored = self
            .container
            .upsert_item(doc)
            .await
            .map_err(|err| Error::backend("upsert", err))?;
        from_document(mapper::from_stored(stored))
    }

    /// Replace an existing item; fails with [`Error::NotFound`] when absent
    pub async fn update(&self, item: &T) -> Result<T> {
        let doc = mapper::to_stored(&self.descriptor, to_document(item)?, false)?;
        let id = item_id(&doc).map(str::to_string).ok_or_else(|| {
            Error::configuration(
                &self.descriptor.entity,
                Some(mapper::ID_FIELD),
                "update requires an id",
            )
        })?;
        let stored = self.container.replace_item(doc).await.map_err(|err| {
            if err.is_not_found() {
                Error::NotFound { id: id.clone() }
            } else {
                Error::backend("update", err)
            }
        })?;
        from_document(mapper::from_stored(stored))
    }

    /// Point lookup. An absent item is `Ok(None)`.
    pub async fn find(&self, id: &str, partition: impl Into<PartitionValue>) -> Result<Option<T>> {
        let partition = partition.into();
        match self.container.read_item(id, &partition).await {
            Ok(stored) => from_document(mapper::from_stored(stored)).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(Error::backend("read", err)),
        }
    }

    /// Delete an item. Deleting an absent item succeeds.
    pub async fn remove(&self, id: &str, partition: impl Into<PartitionValue>) -> Result<()> {
        let partition = partition.into();
        match self.container.delete_item(id, &partition).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                tracing::debug!("Item {} already absent from '{}'", id, self.schema.id);
                Ok(())
            }
            Err(err) => Err(Error::backend("delete", err)),
        }
    }

    /// Lazily page through the container.
    ///
    /// Each call starts a fresh scan; items come in backend order.
    pub fn find_all(&self, options: FindOptions) -> BoxStream<'static, Result<T>> {
        struct Scan {
            container: Arc<dyn ContainerHandle>,
            options: ListOptions,
            buffer: VecDeque<docmap_core::Document>,
            done: bool,
        }

        let scan = Scan {
            container: self.container.clone(),
            options: ListOptions {
                filter: options.filter,
                max_item_count: options.page_size,
                continuation: None,
                partition_key: options.partition_key,
            },
            buffer: VecDeque::new(),
            done: false,
        };

        stream::unfold(scan, |mut scan| async move {
            loop {
                if let Some(doc) = scan.buffer.pop_front() {
                    let item = from_document::<T>(mapper::from_stored(doc));
                    return Some((item, scan));
                }
                if scan.done {
                    return None;
                }
                match scan.container.list_items(&scan.options).await {
                    Ok(page) => {
                        scan.buffer.extend(page.items);
                        scan.done = page.continuation.is_none();
                        scan.options.continuation = page.continuation;
                    }
                    Err(err) => {
                        scan.done = true;
                        return Some((Err(Error::backend("list", err)), scan));
                    }
                }
            }
        })
        .boxed()
    }

    /// Collect every item matching `options`
    pub async fn collect_all(&self, options: FindOptions) -> Result<Vec<T>> {
        self.find_all(options).try_collect().await
    }

    /// Search service bound to this container
    pub fn search(&self) -> SearchService {
        SearchService::new(Arc::new(ContainerExecutor(self.container.clone())))
    }
}
