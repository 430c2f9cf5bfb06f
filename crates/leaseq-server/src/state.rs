use leaseq_core::QueueService;

use crate::backend::StoreBackend;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub queue: QueueService<StoreBackend>,
    /// API key for `/v1/*` (None = open access).
    pub api_key: Option<String>,
}
