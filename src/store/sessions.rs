//! Session store: conversation key → NLU session id, persisted in a hash.
//!
//! Reads fail soft: an unreachable store looks like an empty map, so a turn
//! is never blocked on it. Writes run as background tasks whose outcome is
//! logged. Turns do not wait for them; `flush` does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::traits::HashStore;

/// Conversation key → session id, as loaded at the start of a turn.
pub type SessionMap = HashMap<String, String>;

/// Session id chosen for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub id: String,
    /// True when this call minted the id.
    pub created: bool,
}

/// Session store over an injected `HashStore`.
///
/// Ids minted by this instance are remembered until their write lands, so two
/// concurrent first turns for the same key in one process agree on a single
/// id. After that the store itself is authoritative. Separate processes can
/// still race; the last write wins.
pub struct SessionStore {
    backend: Arc<dyn HashStore>,
    hash: String,
    minted: Arc<Mutex<HashMap<String, String>>>,
    writes: Mutex<JoinSet<()>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn HashStore>, hash: impl Into<String>) -> Self {
        Self {
            backend,
            hash: hash.into(),
            minted: Arc::default(),
            writes: Mutex::new(JoinSet::new()),
        }
    }

    /// Fetch the whole map. Any store fault yields an empty map.
    pub async fn load_all(&self) -> SessionMap {
        match self.backend.hgetall(&self.hash).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(
                    store = self.backend.name(),
                    hash = %self.hash,
                    error = %e,
                    "Session map fetch failed; treating as empty"
                );
                SessionMap::new()
            }
        }
    }

    /// Persist one entry in the background. `flush` waits for it.
    pub fn set(&self, key: &str, session_id: &str) {
        let backend = Arc::clone(&self.backend);
        let minted = Arc::clone(&self.minted);
        let hash = self.hash.clone();
        let key = key.to_string();
        let session_id = session_id.to_string();

        let mut writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(done) = writes.try_join_next() {
            log_join_failure(done);
        }

        writes.spawn(async move {
            match backend.hset(&hash, &key, &session_id).await {
                Ok(()) => {
                    let mut minted = minted.lock().unwrap_or_else(|e| e.into_inner());
                    if minted.get(&key) == Some(&session_id) {
                        minted.remove(&key);
                    }
                    debug!(key = %key, session_id = %session_id, "Session persisted");
                }
                Err(e) => error!(
                    store = backend.name(),
                    key = %key,
                    session_id = %session_id,
                    error = %e,
                    "Failed to persist session"
                ),
            }
        });
    }

    /// Wait for every pending write to finish.
    pub async fn flush(&self) {
        let mut pending = {
            let mut writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *writes)
        };
        if !pending.is_empty() {
            debug!(pending = pending.len(), "Flushing session writes");
        }
        while let Some(done) = pending.join_next().await {
            log_join_failure(done);
        }
    }

    /// Number of ids minted here whose write has not landed yet.
    pub fn unconfirmed(&self) -> usize {
        self.minted.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Session id for `key`, minting and persisting one if `sessions` lacks it.
    ///
    /// The loaded map wins over ids minted locally. `sessions` is updated in place.
    pub fn ensure(&self, sessions: &mut SessionMap, key: &str) -> ResolvedSession {
        if let Some(id) = sessions.get(key) {
            return ResolvedSession {
                id: id.clone(),
                created: false,
            };
        }

        let id = {
            let mut minted = self.minted.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(id) = minted.get(key) {
                let id = id.clone();
                sessions.insert(key.to_string(), id.clone());
                return ResolvedSession { id, created: false };
            }
            let id = Uuid::new_v4().to_string();
            minted.insert(key.to_string(), id.clone());
            id
        };

        sessions.insert(key.to_string(), id.clone());
        info!(key, session_id = %id, "New session");
        self.set(key, &id);

        ResolvedSession { id, created: true }
    }
}

fn log_join_failure(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!(error = %e, "Session write task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryHashStore;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl HashStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn hgetall(&self, _hash: &str) -> Result<HashMap<String, String>, StoreError> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn hset(&self, _hash: &str, _field: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("refused".into()))
        }
    }

    /// Memory store whose writes take a while to land.
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryHashStore,
    }

    #[async_trait]
    impl HashStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }
        async fn hgetall(&self, hash: &str) -> Result<HashMap<String, String>, StoreError> {
            self.inner.hgetall(hash).await
        }
        async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            self.inner.hset(hash, field, value).await
        }
    }

    fn memory_sessions() -> (Arc<MemoryHashStore>, SessionStore) {
        let backend = Arc::new(MemoryHashStore::new());
        let store = SessionStore::new(backend.clone(), "sessionIds");
        (backend, store)
    }

    #[tokio::test]
    async fn load_all_fails_soft() {
        let store = SessionStore::new(Arc::new(BrokenStore), "sessionIds");
        assert!(store.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn ensure_mints_and_persists_once() {
        let (backend, store) = memory_sessions();
        let mut sessions = store.load_all().await;

        let resolved = store.ensure(&mut sessions, "U1");
        assert!(resolved.created);
        assert!(Uuid::parse_str(&resolved.id).is_ok());
        assert_eq!(sessions["U1"], resolved.id);
        store.flush().await;

        let persisted = backend.hgetall("sessionIds").await.unwrap();
        assert_eq!(persisted["U1"], resolved.id);
    }

    #[tokio::test]
    async fn confirmed_write_releases_minted_id() {
        let (_backend, store) = memory_sessions();
        let mut sessions = SessionMap::new();

        store.ensure(&mut sessions, "U1");
        store.ensure(&mut sessions, "U2");
        assert_eq!(store.unconfirmed(), 2);

        store.flush().await;
        assert_eq!(store.unconfirmed(), 0);

        // Later turns find the id in the store instead.
        let mut later = store.load_all().await;
        let again = store.ensure(&mut later, "U1");
        assert!(!again.created);
        assert_eq!(again.id, sessions["U1"]);
    }

    #[tokio::test]
    async fn flush_waits_for_slow_writes() {
        let backend = Arc::new(SlowStore::default());
        let store = SessionStore::new(backend.clone(), "sessionIds");
        let mut sessions = SessionMap::new();

        let resolved = store.ensure(&mut sessions, "U1");
        assert!(backend.inner.hgetall("sessionIds").await.unwrap().is_empty());

        store.flush().await;
        let persisted = backend.inner.hgetall("sessionIds").await.unwrap();
        assert_eq!(persisted["U1"], resolved.id);
    }

    #[tokio::test]
    async fn ensure_reuses_loaded_id() {
        let (backend, store) = memory_sessions();
        backend.hset("sessionIds", "U1", "existing").await.unwrap();

        let mut sessions = store.load_all().await;
        let resolved = store.ensure(&mut sessions, "U1");
        assert_eq!(resolved.id, "existing");
        assert!(!resolved.created);
        store.flush().await;
        assert_eq!(store.unconfirmed(), 0);
    }

    #[tokio::test]
    async fn concurrent_first_turns_share_one_id() {
        let (_backend, store) = memory_sessions();

        // Both turns loaded before either write landed.
        let mut first = SessionMap::new();
        let mut second = SessionMap::new();

        let a = store.ensure(&mut first, "C1");
        let b = store.ensure(&mut second, "C1");
        assert!(a.created);
        assert!(!b.created);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn write_failure_is_contained() {
        let store = SessionStore::new(Arc::new(BrokenStore), "sessionIds");
        let mut sessions = store.load_all().await;
        let resolved = store.ensure(&mut sessions, "U1");

        // The task logs the failure and completes normally.
        store.flush().await;
        assert_eq!(store.unconfirmed(), 1);

        // The id stays stable for later turns in this process.
        let mut later = store.load_all().await;
        assert_eq!(store.ensure(&mut later, "U1").id, resolved.id);
    }
}
