pub mod game;
pub mod rules;
pub mod state_machine;
pub mod votes;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        session_store::SessionRepository,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
};

use self::{rules::GameRules, state_machine::GameStateMachine, votes::VoteLedger};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: the session repository, the vote ledger and
/// the per-session gates serializing actions on a game.
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionRepository>>>,
    votes: VoteLedger,
    rules: GameRules,
    session_gates: DashMap<Uuid, Arc<RwLock<()>>>,
    degraded: watch::Sender<bool>,
    storage_timeout: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(rules: GameRules, storage_timeout: Duration) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            session_store: RwLock::new(None),
            votes: VoteLedger::new(),
            rules,
            session_gates: DashMap::new(),
            degraded: degraded_tx,
            storage_timeout,
        })
    }

    /// Construct a state with `store` already installed.
    pub fn with_session_store(
        store: Arc<dyn SessionRepository>,
        rules: GameRules,
        storage_timeout: Duration,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            session_store: RwLock::new(Some(store)),
            votes: VoteLedger::new(),
            rules,
            session_gates: DashMap::new(),
            degraded: degraded_tx,
            storage_timeout,
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionRepository>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Session store handle or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionRepository>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionRepository>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn state_machine(&self) -> GameStateMachine<'_> {
        GameStateMachine::new(&self.rules)
    }

    /// Run `work` while holding the exclusive gate of session `id`.
    ///
    /// Every action that may change a session or its ballots goes through
    /// here, so two actions on the same game never interleave.
    pub async fn with_session_write<F, Fut, T>(&self, id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.session_gate(id);
        let outcome = {
            let _guard = gate.write().await;
            work().await
        };
        drop(gate);
        self.release_session_gate(id);
        outcome
    }

    /// Run `work` while holding the shared gate of session `id`.
    pub async fn with_session_read<F, Fut, T>(&self, id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.session_gate(id);
        let outcome = {
            let _guard = gate.read().await;
            work().await
        };
        drop(gate);
        self.release_session_gate(id);
        outcome
    }

    /// Await a repository call, bounded by the configured storage timeout.
    pub async fn storage_call<T, Fut>(
        &self,
        operation: &'static str,
        call: Fut,
    ) -> Result<T, ServiceError>
    where
        Fut: Future<Output = StorageResult<T>>,
    {
        match timeout(self.storage_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, error = %err, "storage operation failed");
                Err(ServiceError::Storage(err))
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.storage_timeout.as_millis() as u64,
                    "storage operation timed out"
                );
                Err(ServiceError::Storage(StorageError::timeout(
                    operation,
                    self.storage_timeout,
                )))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn active_session_gates(&self) -> usize {
        self.session_gates.len()
    }

    fn session_gate(&self, id: Uuid) -> Arc<RwLock<()>> {
        self.session_gates.entry(id).or_default().clone()
    }

    /// Drop the gate once no other task holds a handle to it.
    fn release_session_gate(&self, id: Uuid) {
        self.session_gates
            .remove_if(&id, |_, gate| Arc::strong_count(gate) == 1);
    }
}
