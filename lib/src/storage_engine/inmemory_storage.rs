// lib/src/storage_engine/inmemory_storage.rs

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::batch::WriteBatch;
use super::collections::CollectionPath;
use super::document::{plan_batch, plan_sequence, Planned, StagedWrite};
use super::errors::StoreResult;
use super::storage_engine::{DocumentStore, SequenceBuilder};

/// Process-local engine. One lock serializes every commit, which makes each
/// batch trivially atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn settle<T>(planned: Planned<T, Infallible>) -> StoreResult<T> {
    match planned {
        Ok(result) => result,
        Err(never) => match never {},
    }
}

fn apply(documents: &mut BTreeMap<Vec<u8>, Vec<u8>>, writes: Vec<StagedWrite>) {
    for write in writes {
        match write.value {
            Some(value) => documents.insert(write.key, value),
            None => documents.remove(&write.key),
        };
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn engine_name(&self) -> &'static str {
        "in_memory"
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        let documents = self.documents.lock().await;
        match documents.get(&path.document_key(id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<Value>> {
        let prefix = path.key_prefix();
        let documents = self.documents.lock().await;
        documents
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, bytes)| -> StoreResult<Value> { Ok(serde_json::from_slice(bytes)?) })
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut documents = self.documents.lock().await;
        let writes = {
            let snapshot = &*documents;
            let mut read = |key: &[u8]| Ok::<_, Infallible>(snapshot.get(key).cloned());
            settle(plan_batch(batch.ops(), &mut read))?
        };
        apply(&mut documents, writes);
        Ok(())
    }

    async fn commit_with_sequence(&self, counter_id: &str, field: &str, build: SequenceBuilder) -> StoreResult<u64> {
        let mut documents = self.documents.lock().await;
        let (next, writes) = {
            let snapshot = &*documents;
            let mut read = |key: &[u8]| Ok::<_, Infallible>(snapshot.get(key).cloned());
            settle(plan_sequence(counter_id, field, build.as_ref(), &mut read))?
        };
        apply(&mut documents, writes);
        Ok(next)
    }

    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
