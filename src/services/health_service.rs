use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a session store is installed and answering.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = match state.require_session_store().await {
        Ok(store) => store,
        Err(_) => {
            warn!("session store unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    };

    if let Err(err) = state.storage_call("health_check", store.health_check()).await {
        warn!(error = %err, "session store health check failed");
        return HealthResponse::degraded();
    }

    if state.is_degraded() {
        return HealthResponse::degraded();
    }

    let sessions = state.storage_call("count", store.count()).await.ok();
    HealthResponse::ok(sessions)
}
