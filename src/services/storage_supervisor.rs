use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{session_store::SessionRepository, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the session store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionRepository>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_session_store(store.clone()).await;
                info!("session store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !watch_health(&state, store.as_ref()).await {
                    warn!("exhausted session store reconnect attempts; reconnecting from scratch");
                    state.clear_session_store().await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "session store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be revived. Returns `false` once
/// reconnection gave up.
async fn watch_health(state: &SharedState, store: &dyn SessionRepository) -> bool {
    loop {
        match state.storage_call("health_check", store.health_check()).await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("session store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "session store health check failed");
                if !reconnect(state, store).await {
                    return false;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn SessionRepository) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "session store reconnection succeeded");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "session store reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "session store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        dao::session_store::MemorySessionStore,
        state::{AppState, DEFAULT_STORAGE_TIMEOUT, rules::GameRules},
    };

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[tokio::test]
    async fn retries_until_the_store_connects() {
        let state = AppState::new(GameRules::default(), DEFAULT_STORAGE_TIMEOUT);
        let attempts = Arc::new(AtomicU32::new(0));
        let mut watcher = state.degraded_watcher();

        let counter = Arc::clone(&attempts);
        tokio::spawn(run(state.clone(), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(StorageError::unavailable("refused".into(), Refused));
                }
                Ok(Arc::new(MemorySessionStore::default()) as Arc<dyn SessionRepository>)
            }
        }));

        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(state.session_store().await.is_some());
    }
}
