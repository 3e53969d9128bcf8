//! In-process `HashStore`. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::HashStore;

/// Hash store held in memory.
#[derive(Default)]
pub struct MemoryHashStore {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HashStore for MemoryHashStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self
            .hashes
            .read()
            .await
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hashes
            .write()
            .await
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }
}
