use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use leaseq_core::{MemoryStore, QueueConfig, QueueService};
use leaseq_db::{Database, DatabaseConfig};
use leaseq_server::backend::StoreBackend;
use leaseq_server::config::{ServerConfig, StoreKind};
use leaseq_server::routes;
use leaseq_server::state::AppState;

/// Upper bound on request bodies; a full submit batch stays well below this.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leaseq=info".parse()?))
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env()?;
    let queue_config = QueueConfig::from_env()?;
    let addr = format!("0.0.0.0:{}", server_config.port);

    let store = match server_config.store {
        StoreKind::Postgres => {
            let db = Database::connect(&DatabaseConfig::from_env()?).await?;
            db.migrate().await?;
            StoreBackend::Postgres(db.item_store())
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; items are lost on restart");
            StoreBackend::Memory(MemoryStore::new())
        }
    };

    if server_config.api_key.is_none() {
        tracing::warn!("LEASEQ_API_KEY not set; /v1 endpoints are unauthenticated");
    }

    tracing::info!(
        backend = store.name(),
        lease_secs = queue_config.lease_duration.num_seconds(),
        default_batch_size = queue_config.default_batch_size,
        max_batch_size = queue_config.max_batch_size,
        "Queue configured"
    );

    let state = Arc::new(AppState {
        queue: QueueService::new(store, queue_config),
        api_key: server_config.api_key,
    });

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
