//! Persistence layer — the external hash store and the session map on top of it.

pub mod libsql_backend;
pub mod memory;
pub(crate) mod migrations;
pub mod sessions;
pub mod traits;

pub use libsql_backend::LibSqlHashStore;
pub use memory::MemoryHashStore;
pub use sessions::{ResolvedSession, SessionMap, SessionStore};
pub use traits::HashStore;
