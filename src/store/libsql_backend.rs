//! libSQL implementation of the async `HashStore`.
//!
//! Hashes live in one `hash_fields` table keyed by `(hash, field)`.
//! Supports local file, remote server, and in-memory databases.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::StoreLocation;
use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::HashStore;

/// libSQL hash store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlHashStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlHashStore {
    /// Open the store described by a configured location.
    pub async fn open(location: &StoreLocation) -> Result<Self, StoreError> {
        match location {
            StoreLocation::Local(path) => Self::new_local(path).await,
            StoreLocation::Remote { url, auth_token } => {
                Self::new_remote(url, auth_token.expose_secret()).await
            }
            StoreLocation::Memory => Self::new_memory().await,
        }
    }

    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create store directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Session store opened");
        Ok(store)
    }

    /// Connect to a remote libSQL server.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to {url}: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(url, "Session store connected");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl HashStore for LibSqlHashStore {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT field, value FROM hash_fields WHERE hash = ?1",
                params![hash],
            )
            .await
            .map_err(|e| StoreError::Query(format!("hgetall {hash}: {e}")))?;

        let mut fields = HashMap::new();
        loop {
            let row = rows
                .next()
                .await
                .map_err(|e| StoreError::Query(format!("hgetall {hash}: {e}")))?;
            let Some(row) = row else {
                break;
            };
            match (row.get::<String>(0), row.get::<String>(1)) {
                (Ok(field), Ok(value)) => {
                    fields.insert(field, value);
                }
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(hash, "Skipping hash row: {e}");
                }
            }
        }
        Ok(fields)
    }

    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO hash_fields (hash, field, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(hash, field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![hash, field, value, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("hset {hash}.{field}: {e}")))?;
        Ok(())
    }
}
