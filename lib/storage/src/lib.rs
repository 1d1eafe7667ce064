//! # docmap Storage
//!
//! Runtime side of docmap: the backend collaborator traits, the connection
//! bootstrap, typed repositories and an in-memory backend.
//!
//! - [`Connection`] - single-flight bootstrap with fixed-delay retry
//! - [`Repository`] - create, upsert, update, find, find_all, remove
//! - `MemoryClient` - backend that keeps everything in process, compiled
//!   with the `memory` feature

pub mod backend;
pub mod config;
pub mod connection;
pub mod mapper;
#[cfg(feature = "memory")]
pub mod memory;
pub mod repository;

pub use backend::{
    BackendResult, Client, ClientHandle, ContainerExecutor, ContainerHandle, DatabaseHandle,
    ListOptions, Page,
};
pub use config::{ConnectionConfig, DEFAULT_CONNECTION};
pub use connection::{Connection, ConnectionState, Handle};
#[cfg(feature = "memory")]
pub use memory::{MemoryClient, MemoryContainer, MemoryDatabase};
pub use repository::{FindOptions, Repository};
