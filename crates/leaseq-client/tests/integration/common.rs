use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use leaseq_core::{MemoryStore, QueueConfig, QueueService};
use leaseq_server::backend::StoreBackend;
use leaseq_server::routes;
use leaseq_server::state::AppState;

pub const TEST_API_KEY: &str = "client-test-key";

/// A real leaseq server on an ephemeral port, backed by an in-memory store.
/// Stops when dropped.
pub struct TestServer {
    pub base_url: String,
    pub store: MemoryStore,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub async fn spawn_server() -> TestServer {
    let store = MemoryStore::new();
    let state = Arc::new(AppState {
        queue: QueueService::new(StoreBackend::Memory(store.clone()), QueueConfig::default()),
        api_key: Some(TEST_API_KEY.to_string()),
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");

    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, routes::router(state))
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
            .expect("Test server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        store,
        shutdown,
    }
}
