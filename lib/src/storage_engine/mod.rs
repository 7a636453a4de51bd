// lib/src/storage_engine/mod.rs

pub mod batch;
pub mod collections;
pub mod document;
pub mod errors;
pub mod inmemory_storage;
pub mod sled_storage;
pub mod storage_engine;

pub use batch::{Condition, Delta, QueryFilter, WriteBatch, WriteOp};
pub use collections::{Collection, CollectionPath};
pub use document::{decimal_value, from_document, get_path, to_document};
pub use errors::{StoreError, StoreResult};
pub use inmemory_storage::InMemoryStore;
pub use sled_storage::{open_sled_db, SledStore};
pub use storage_engine::{fetch, list_typed, query_typed, DocumentStore, SequenceBuilder};

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageEngineType};

/// Creates the document store selected by `config`.
///
/// Sled is the default engine; the in-memory engine keeps nothing across
/// restarts and is meant for tests and demos.
pub fn create_store(config: &StorageConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.engine {
        StorageEngineType::Sled => Arc::new(SledStore::new(open_sled_db(config)?)?),
        StorageEngineType::InMemory => Arc::new(InMemoryStore::new()),
    };
    info!(engine = store.engine_name(), "Document store ready");
    Ok(store)
}
