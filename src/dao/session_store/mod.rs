pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::SessionEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemorySessionStore;

/// Abstraction over the persistence layer for game sessions.
///
/// Implementations must make a successful `put` visible to every later `get`
/// for the lifetime of the game, and must never expose a partially written
/// session.
pub trait SessionRepository: Send + Sync {
    /// Upsert a session keyed by its identifier.
    fn put(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a session, `None` when it does not exist (or expired).
    fn get(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Remove a session, returning whether something was deleted.
    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Number of live sessions.
    fn count(&self) -> BoxFuture<'static, StorageResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
