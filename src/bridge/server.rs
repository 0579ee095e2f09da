use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::api::{self, AppState};
use super::db::{BridgeDb, DbHandle};
use super::reconcile::ReconcileRegistry;
use super::tracker::JiraClient;
use crate::config::BridgeConfig;

/// Build the full application router: API routes, request tracing, and
/// permissive CORS.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open storage, wire up the tracker client and job registry, then serve
/// until Ctrl+C. Running reconciliation jobs are cancelled before returning.
pub async fn start_server(config: BridgeConfig) -> Result<()> {
    for warning in config.validate() {
        warn!("{}", warning);
    }

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = BridgeDb::new(&config.database.path)
        .context("Failed to initialize bridge database")?;
    let db = DbHandle::new(db);

    let tracker =
        Arc::new(JiraClient::new(&config.tracker).context("Failed to build tracker client")?);
    let jobs = ReconcileRegistry::new(
        db.clone(),
        tracker.clone(),
        config.reconcile.interval(),
        config.step_log.clone(),
    );

    let addr = config.listen_addr();
    let state = Arc::new(AppState {
        db,
        tracker,
        jobs: jobs.clone(),
        config,
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "issue bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    jobs.shutdown().await;
    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
