use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tidemark_shared::kv::{KVError, KVStore};

use super::error::KVOp;
use super::error_injector::KVErrorInjector;

#[derive(Debug, Default)]
struct KVState {
    data: BTreeMap<String, Bytes>,
    /// Successful mutations so far.
    revision: u64,
}

/// In-memory [KVStore] for tests. Clones share their data and their [KVErrorInjector].
#[derive(Clone)]
pub struct SimpleKVStore {
    name: &'static str,
    state: Arc<RwLock<KVState>>,
    injector: Arc<KVErrorInjector>,
}

impl std::fmt::Debug for SimpleKVStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleKVStore")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

impl SimpleKVStore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::default(),
            injector: Arc::default(),
        }
    }

    pub fn error_injector(&self) -> &Arc<KVErrorInjector> {
        &self.injector
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn len(&self) -> usize {
        self.state.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().data.is_empty()
    }

    /// Copy of the current content, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Bytes> {
        self.state.read().data.clone()
    }

    async fn intercept(&self, op: KVOp) -> Result<(), KVError> {
        self.injector.intercept(op, self.name).await?;
        Ok(())
    }
}

#[async_trait]
impl KVStore for SimpleKVStore {
    async fn keys(&self) -> Result<Vec<String>, KVError> {
        self.intercept(KVOp::Keys).await?;
        Ok(self.state.read().data.keys().cloned().collect())
    }

    async fn delete(&self, key: &str) -> Result<(), KVError> {
        self.intercept(KVOp::Delete).await?;
        let mut state = self.state.write();
        if state.data.remove(key).is_some() {
            state.revision += 1;
        }
        Ok(())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), KVError> {
        self.intercept(KVOp::Put).await?;
        let mut state = self.state.write();
        state.data.insert(key.to_string(), value);
        state.revision += 1;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, KVError> {
        self.intercept(KVOp::Get).await?;
        Ok(self.state.read().data.get(key).cloned())
    }

    fn name(&self) -> &str {
        self.name
    }
}
