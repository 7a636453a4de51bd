// lib/src/storage_engine/storage_engine.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::batch::{QueryFilter, WriteBatch};
use super::collections::CollectionPath;
use super::document::from_document;
use super::errors::StoreResult;

/// Builds the batch that depends on a freshly issued sequence value.
pub type SequenceBuilder = Arc<dyn Fn(u64) -> StoreResult<WriteBatch> + Send + Sync>;

/// A collection/document store with atomic multi-document batches.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    fn engine_name(&self) -> &'static str;

    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>>;

    /// Every document directly in `path`, ordered by id.
    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<Value>>;

    async fn query(&self, path: &CollectionPath, filters: &[QueryFilter]) -> StoreResult<Vec<Value>> {
        let documents = self.list(path).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| filters.iter().all(|filter| filter.matches(doc)))
            .collect())
    }

    /// Applies every op of `batch` or none of them.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Increments `counters/{counter_id}.{field}` and commits the batch built
    /// from the new value in the same transaction, returning that value.
    async fn commit_with_sequence(&self, counter_id: &str, field: &str, build: SequenceBuilder) -> StoreResult<u64>;

    async fn flush(&self) -> StoreResult<()>;
}

pub async fn fetch<T: DeserializeOwned>(store: &dyn DocumentStore, path: &CollectionPath, id: &str) -> StoreResult<Option<T>> {
    match store.get(path, id).await? {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}

pub async fn list_typed<T: DeserializeOwned>(store: &dyn DocumentStore, path: &CollectionPath) -> StoreResult<Vec<T>> {
    store.list(path).await?.into_iter().map(from_document).collect()
}

pub async fn query_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &CollectionPath,
    filters: &[QueryFilter],
) -> StoreResult<Vec<T>> {
    store.query(path, filters).await?.into_iter().map(from_document).collect()
}
