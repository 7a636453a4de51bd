// lib/src/storage_engine/sled_storage.rs

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};
use sled::{Db, Tree};
use tracing::{debug, info};

use super::batch::WriteBatch;
use super::collections::CollectionPath;
use super::document::{plan_batch, plan_sequence, Planned, StagedWrite};
use super::errors::{StoreError, StoreResult};
use super::storage_engine::{DocumentStore, SequenceBuilder};
use crate::config::StorageConfig;

const DOCUMENTS_TREE: &str = "documents";

/// Opens the sled database described by `config`.
pub fn open_sled_db(config: &StorageConfig) -> StoreResult<Db> {
    let path: &Path = config.data_directory.as_path();
    std::fs::create_dir_all(path)
        .map_err(|e| StoreError::Engine(format!("Failed to create data directory {:?}: {}", path, e)))?;
    info!("Opening Sled database at {:?}", path);
    let db = sled::Config::new()
        .path(path)
        .use_compression(config.use_compression)
        .cache_capacity(config.cache_capacity)
        .open()?;
    Ok(db)
}

/// Sled engine: every collection lives in one tree under `path \0 id` keys so
/// a batch spanning collections is a single-tree transaction.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    pub fn new(db: Db) -> StoreResult<Self> {
        let tree = db.open_tree(DOCUMENTS_TREE)?;
        Ok(SledStore { db, tree })
    }

    /// A throwaway database, removed when dropped.
    pub fn temporary() -> StoreResult<Self> {
        Self::new(sled::Config::new().temporary(true).open()?)
    }

    /// Runs sled work on the blocking pool; sled calls block on I/O.
    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Tree) -> StoreResult<T> + Send + 'static,
    {
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || work(tree))
            .await
            .map_err(|e| StoreError::Engine(format!("sled task failed: {}", e)))?
    }

    /// Plans and applies writes in one transaction. `plan` may run more than
    /// once when sled retries on conflict.
    async fn run<T, P>(&self, plan: P) -> StoreResult<T>
    where
        T: Send + 'static,
        P: Fn(&TransactionalTree) -> Planned<(T, Vec<StagedWrite>), UnabortableTransactionError> + Send + 'static,
    {
        self.blocking(move |tree| {
            let result = tree.transaction(|tx| {
                let (value, writes) = plan(tx)?.map_err(ConflictableTransactionError::Abort)?;
                for write in writes {
                    match write.value {
                        Some(bytes) => tx.insert(write.key, bytes)?,
                        None => tx.remove(write.key)?,
                    };
                }
                Ok(value)
            });
            match result {
                Ok(value) => Ok(value),
                Err(TransactionError::Abort(e)) => Err(e),
                Err(TransactionError::Storage(e)) => Err(StoreError::Engine(e.to_string())),
            }
        })
        .await
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    fn engine_name(&self) -> &'static str {
        "sled"
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        let key = path.document_key(id);
        self.blocking(move |tree| match tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        })
        .await
    }

    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<Value>> {
        let prefix = path.key_prefix();
        self.blocking(move |tree| {
            tree.scan_prefix(prefix)
                .map(|entry| -> StoreResult<Value> {
                    let (_, bytes) = entry?;
                    Ok(serde_json::from_slice(&bytes)?)
                })
                .collect()
        })
        .await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        debug!(ops = batch.len(), "Committing batch to sled");
        self.run(move |tx| {
            let mut read = |key: &[u8]| tx.get(key).map(|found| found.map(|bytes| bytes.to_vec()));
            Ok(plan_batch(batch.ops(), &mut read)?.map(|writes| ((), writes)))
        })
        .await
    }

    async fn commit_with_sequence(&self, counter_id: &str, field: &str, build: SequenceBuilder) -> StoreResult<u64> {
        let counter_id = counter_id.to_string();
        let field = field.to_string();
        self.run(move |tx| {
            let mut read = |key: &[u8]| tx.get(key).map(|found| found.map(|bytes| bytes.to_vec()));
            plan_sequence(&counter_id, &field, build.as_ref(), &mut read)
        })
        .await
    }

    async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
