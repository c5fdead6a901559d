//! Buzzer Beater Back binary entrypoint wiring REST, WebSocket, SSE and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buzzer_beater_back::{
    config::AppConfig,
    dao::document_store::memory::MemoryStore,
    routes,
    services::{storage_supervisor, store_watcher, timer_service},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    start_storage(&app_state).await?;

    tokio::spawn(timer_service::run(app_state.clone()));
    tokio::spawn(store_watcher::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Attach CouchDB under supervision when `COUCH_BASE_URL` is set, the
/// in-process store otherwise.
#[cfg(feature = "couch-store")]
async fn start_storage(state: &SharedState) -> anyhow::Result<()> {
    use buzzer_beater_back::dao::{
        document_store::{
            DocumentStore,
            couchdb::{CouchConfig, CouchDocumentStore},
        },
        storage::StorageError,
    };

    if env::var_os("COUCH_BASE_URL").is_none() {
        return start_memory_storage(state).await;
    }

    let config = CouchConfig::from_env().context("reading CouchDB settings")?;
    info!(base_url = %config.base_url, database = %config.database, "using CouchDB store");
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let config = config.clone();
        async move {
            let store = CouchDocumentStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn DocumentStore>)
        }
    }));
    Ok(())
}

#[cfg(not(feature = "couch-store"))]
async fn start_storage(state: &SharedState) -> anyhow::Result<()> {
    start_memory_storage(state).await
}

async fn start_memory_storage(state: &SharedState) -> anyhow::Result<()> {
    warn!("COUCH_BASE_URL not set; game state lives in memory only");
    storage_supervisor::attach(state, Arc::new(MemoryStore::new()), true)
        .await
        .context("bootstrapping memory store")
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
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
