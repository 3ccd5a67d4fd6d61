//! In-process session cache with a sliding time-to-live.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{models::SessionEntity, session_store::SessionRepository, storage::StorageResult};

/// Default lifetime of an untouched session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    sessions: DashMap<Uuid, CachedSession>,
    ttl: Duration,
}

#[derive(Clone)]
struct CachedSession {
    entity: SessionEntity,
    expires_at: Instant,
}

impl CachedSession {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl MemorySessionStore {
    /// Build an empty store whose entries expire `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                sessions: DashMap::new(),
                ttl,
            }),
        }
    }

    /// Periodically drop expired sessions. The task stops once the store is dropped.
    pub fn spawn_eviction_task(&self, every: Duration) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };

                let evicted = inner.purge_expired();
                if evicted > 0 {
                    debug!(evicted, "evicted expired sessions from memory store");
                }
            }
        });
    }

    fn put_session(&self, session: SessionEntity) {
        let expires_at = Instant::now() + self.inner.ttl;
        self.inner.sessions.insert(
            session.id,
            CachedSession {
                entity: session,
                expires_at,
            },
        );
    }

    fn get_session(&self, id: Uuid) -> Option<SessionEntity> {
        let now = Instant::now();
        // Clone out before touching the map again: removing while holding a
        // shard reference would deadlock.
        let cached = self.inner.sessions.get(&id).map(|entry| entry.clone())?;
        if cached.is_expired(now) {
            self.inner
                .sessions
                .remove_if(&id, |_, entry| entry.is_expired(now));
            return None;
        }
        Some(cached.entity)
    }

    fn delete_session(&self, id: Uuid) -> bool {
        let now = Instant::now();
        self.inner
            .sessions
            .remove(&id)
            .is_some_and(|(_, entry)| !entry.is_expired(now))
    }

    fn count_sessions(&self) -> u64 {
        self.inner.purge_expired();
        self.inner.sessions.len() as u64
    }
}

impl MemoryInner {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }
}

impl SessionRepository for MemorySessionStore {
    fn put(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.put_session(session);
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.get_session(id)) })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_session(id)) })
    }

    fn exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.get_session(id).is_some()) })
    }

    fn count(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.count_sessions()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
