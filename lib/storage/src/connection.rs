//! Connection bootstrap
//!
//! A [`Connection`] builds the client and provisions the database once, with
//! a fixed-delay retry. Concurrent callers share the in-flight attempt and
//! all receive the same [`Handle`]; the outcome is cached until
//! [`Connection::reset`].

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docmap_core::{BackendError, Entity, Error, MetadataRegistry, Result};
use docmap_schema::derive;
use docmap_search::SearchService;

use crate::backend::{BackendResult, Client, ClientHandle, DatabaseHandle};
use crate::config::ConnectionConfig;
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Retrying,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Connected and Failed end a bootstrap
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Failed)
    }
}

struct HandleInner {
    client: Arc<dyn ClientHandle>,
    database: Arc<dyn DatabaseHandle>,
    name: String,
}

/// Established connection: client plus provisioned database
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    #[inline]
    pub fn client(&self) -> &Arc<dyn ClientHandle> {
        &self.inner.client
    }

    #[inline]
    pub fn database(&self) -> &Arc<dyn DatabaseHandle> {
        &self.inner.database
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when both handles come from the same bootstrap
    #[inline]
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.inner.name)
            .field("database", &self.inner.database.name())
            .finish()
    }
}

type Bootstrap = Shared<BoxFuture<'static, Result<Handle>>>;

struct Inner {
    config: ConnectionConfig,
    client: Arc<dyn Client>,
    registry: Arc<MetadataRegistry>,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    /// Bumped by reset; bootstraps of an older generation stop reporting
    generation: AtomicU64,
    inflight: Mutex<Option<Bootstrap>>,
}

/// One logical connection to a backend
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.inner.config.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    pub fn new(
        config: ConnectionConfig,
        client: Arc<dyn Client>,
        registry: Arc<MetadataRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                registry,
                state: RwLock::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                inflight: Mutex::new(None),
            }),
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Connect attempts made since creation or the last reset
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    #[inline]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    #[inline]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.inner.registry
    }

    pub fn user_agent(&self) -> String {
        self.inner.config.user_agent_suffix()
    }

    /// Establish the connection, or join the attempt already in flight.
    ///
    /// Once the bootstrap has finished every call returns its outcome: the
    /// same handle on success, the same error after the last failed attempt.
    pub async fn bootstrap(&self) -> Result<Handle> {
        let bootstrap = {
            let mut inflight = self.inner.inflight.lock();
            match inflight.as_ref() {
                Some(bootstrap) => bootstrap.clone(),
                None => {
                    let inner = self.inner.clone();
                    let generation = inner.generation.load(Ordering::SeqCst);
                    let bootstrap = async move { inner.establish(generation).await }
                        .boxed()
                        .shared();
                    *inflight = Some(bootstrap.clone());
                    bootstrap
                }
            }
        };
        bootstrap.await
    }

    /// Drop the cached outcome; the next bootstrap starts over.
    ///
    /// A bootstrap still in flight keeps serving the callers already waiting
    /// on it but no longer touches the state or the attempt count.
    pub fn reset(&self) {
        let mut inflight = self.inner.inflight.lock();
        *inflight = None;
        {
            let mut state = self.inner.state.write();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.inner.attempts.store(0, Ordering::SeqCst);
            *state = ConnectionState::Disconnected;
        }
        drop(inflight);
        tracing::debug!("Connection '{}' reset", self.name());
    }

    /// Typed repository for `T`, provisioning its container first.
    ///
    /// The entity is registered on first use. `container` overrides the
    /// pluralized entity name.
    pub async fn repository<T: Entity>(&self, container: Option<&str>) -> Result<Repository<T>> {
        let registry = &self.inner.registry;
        registry.ensure_registered::<T>()?;
        let descriptor = registry.resolve(T::NAME);
        let schema = derive(&descriptor, container)?;

        let handle = self.bootstrap().await?;
        let provisioned = handle
            .database()
            .provision_container(&schema)
            .await
            .map_err(|err| Error::backend("provision container", err))?;
        tracing::info!(
            "Container '{}' ready for entity {} in database '{}'",
            schema.id,
            T::NAME,
            handle.database().name()
        );

        Ok(Repository::new(provisioned, descriptor, schema))
    }

    /// Search service over the container of `T`
    pub async fn search<T: Entity>(&self, container: Option<&str>) -> Result<SearchService> {
        Ok(self.repository::<T>(container).await?.search())
    }
}

impl Inner {
    /// Update the state unless a reset superseded `generation`
    fn set_state(&self, generation: u64, state: ConnectionState) {
        let mut current = self.state.write();
        if self.generation.load(Ordering::SeqCst) == generation {
            *current = state;
        }
    }

    fn count_attempt(&self, generation: u64) {
        let _state = self.state.write();
        if self.generation.load(Ordering::SeqCst) == generation {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn establish(&self, generation: u64) -> Result<Handle> {
        let max_attempts = self.config.max_attempts();
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let deadline = Duration::from_millis(self.config.connect_timeout_ms);

        let mut attempt = 0;
        loop {
            self.set_state(generation, ConnectionState::Connecting);
            attempt += 1;
            self.count_attempt(generation);

            let outcome = match tokio::time::timeout(deadline, self.connect_once()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Unavailable(format!(
                    "connect attempt timed out after {} ms",
                    self.config.connect_timeout_ms
                ))),
            };

            match outcome {
                Ok(handle) => {
                    self.set_state(generation, ConnectionState::Connected);
                    tracing::info!(
                        "Connected to database '{}' ({}) after {} attempt(s)",
                        self.config.database,
                        self.config.name(),
                        attempt
                    );
                    return Ok(handle);
                }
                Err(err) => {
                    tracing::warn!(
                        "Unable to connect to the database. Retrying ({})...: {}",
                        attempt,
                        err
                    );
                    if attempt >= max_attempts {
                        self.set_state(generation, ConnectionState::Failed);
                        tracing::error!(
                            "Giving up on connection '{}' after {} attempt(s)",
                            self.config.name(),
                            attempt
                        );
                        return Err(Error::Connection {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    self.set_state(generation, ConnectionState::Retrying);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect_once(&self) -> BackendResult<Handle> {
        let client = self.client.connect(&self.config).await?;
        let database = client.provision_database(&self.config.database).await?;
        Ok(Handle {
            inner: Arc::new(HandleInner {
                client,
                database,
                name: self.config.name().to_string(),
            }),
        })
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;

    fn config(attempts: u32) -> ConnectionConfig {
        ConnectionConfig::new("memory://local", "app").with_retry(attempts, 5)
    }

    fn connection(client: Arc<MemoryClient>, attempts: u32) -> Connection {
        Connection::new(config(attempts), client, Arc::new(MetadataRegistry::new()))
    }

    #[tokio::test]
    async fn test_connects_after_transient_failures() {
        let client = Arc::new(MemoryClient::new());
        client.fail_connects(2);
        let connection = connection(client.clone(), 9);
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        let handle = connection.bootstrap().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert_eq!(connection.attempts(), 3);
        assert_eq!(handle.database().name(), "app");

        let again = connection.bootstrap().await.unwrap();
        assert!(handle.ptr_eq(&again));
        assert_eq!(client.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_fails_after_retry_attempts() {
        let client = Arc::new(MemoryClient::new());
        client.fail_connects(u32::MAX);
        let connection = connection(client.clone(), 3);

        let err = connection.bootstrap().await.unwrap_err();
        assert!(matches!(err, Error::Connection { attempts: 3, .. }));
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert_eq!(client.connect_count(), 3);

        // the failure is cached until reset
        assert!(connection.bootstrap().await.is_err());
        assert_eq!(client.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_reset_allows_new_bootstrap() {
        let client = Arc::new(MemoryClient::new());
        client.fail_connects(1);
        let connection = connection(client.clone(), 1);

        assert!(connection.bootstrap().await.is_err());
        connection.reset();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.attempts(), 0);

        assert!(connection.bootstrap().await.is_ok());
        assert_eq!(connection.attempts(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_tries_once() {
        let client = Arc::new(MemoryClient::new());
        client.fail_connects(u32::MAX);
        let connection = connection(client.clone(), 0);

        let err = connection.bootstrap().await.unwrap_err();
        assert!(matches!(err, Error::Connection { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_reset_during_bootstrap_discards_stale_outcome() {
        let client = Arc::new(MemoryClient::new());
        client.fail_connects(u32::MAX);
        let connection = Connection::new(
            ConnectionConfig::new("memory://local", "app").with_retry(3, 40),
            client.clone(),
            Arc::new(MetadataRegistry::new()),
        );

        let stale = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.bootstrap().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(connection.state(), ConnectionState::Retrying);

        connection.reset();
        let outcome = stale.await.unwrap();
        assert!(matches!(outcome, Err(Error::Connection { attempts: 3, .. })));
        assert_eq!(client.connect_count(), 3);

        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.attempts(), 0);
    }
}
