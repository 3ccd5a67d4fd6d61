//! Avalon Back binary entrypoint wiring the REST API to the configured session store.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avalon_back::{
    config::{AppConfig, StorageBackend},
    dao::session_store::MemorySessionStore,
    routes,
    services::game_service,
    state::{AppState, SharedState},
};

/// How often the in-memory store sweeps expired sessions.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);
/// How often ballots of expired sessions are dropped from the vote ledger.
const BALLOT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config.rules.clone(), config.storage_timeout);

    match StorageBackend::from_env() {
        StorageBackend::Memory => {
            let store = MemorySessionStore::new(config.session_ttl);
            store.spawn_eviction_task(EVICTION_INTERVAL);
            app_state.install_session_store(Arc::new(store)).await;
            info!(
                ttl_secs = config.session_ttl.as_secs(),
                "using in-memory session store"
            );
        }
        StorageBackend::Mongo => {
            spawn_mongo_supervisor(app_state.clone(), config.session_ttl).await?
        }
    }
    game_service::spawn_ballot_sweep(&app_state, BALLOT_SWEEP_INTERVAL);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to MongoDB in the background; requests answer 503 until the store is installed.
#[cfg(feature = "mongo-store")]
async fn spawn_mongo_supervisor(state: SharedState, session_ttl: Duration) -> anyhow::Result<()> {
    use avalon_back::{
        dao::{
            session_store::{
                SessionRepository,
                mongodb::{MongoConfig, MongoSessionStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let mongo_config = MongoConfig::from_env(session_ttl)
        .await
        .context("reading MongoDB settings")?;
    info!(db = %mongo_config.database_name, "using MongoDB session store");

    tokio::spawn(storage_supervisor::run(state, move || {
        let mongo_config = mongo_config.clone();
        async move {
            let store = MongoSessionStore::connect(mongo_config).await?;
            Ok::<Arc<dyn SessionRepository>, StorageError>(Arc::new(store))
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
async fn spawn_mongo_supervisor(_state: SharedState, _session_ttl: Duration) -> anyhow::Result<()> {
    anyhow::bail!("STORAGE_BACKEND=mongo requires the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
