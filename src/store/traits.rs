//! `HashStore` trait — the external key-value hash service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

/// Named hashes of string fields, like a remote hash-map service.
///
/// Writes are atomic per field. There are no transactions across calls.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// All fields of a hash. A missing hash is an empty map.
    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Set one field of a hash, replacing any previous value.
    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError>;
}
