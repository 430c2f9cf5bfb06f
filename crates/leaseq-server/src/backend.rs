use chrono::{DateTime, Utc};

use leaseq_core::error::AppError;
use leaseq_core::memory::MemoryStore;
use leaseq_core::models::{
    ClaimedItem, ItemId, ItemPayload, ItemResult, QueueStats, RowOutcome, WorkItem,
};
use leaseq_core::store::ItemStore;
use leaseq_db::PgItemStore;

/// The store the server was started with, chosen at runtime.
#[derive(Clone)]
pub enum StoreBackend {
    Postgres(PgItemStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Postgres(_) => "postgres",
            StoreBackend::Memory(_) => "memory",
        }
    }
}

impl ItemStore for StoreBackend {
    async fn now(&self) -> Result<DateTime<Utc>, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.now().await,
            StoreBackend::Memory(store) => store.now().await,
        }
    }

    async fn insert_items(&self, payloads: Vec<ItemPayload>) -> Result<Vec<WorkItem>, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.insert_items(payloads).await,
            StoreBackend::Memory(store) => store.insert_items(payloads).await,
        }
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<WorkItem>, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.get_item(id).await,
            StoreBackend::Memory(store) => store.get_item(id).await,
        }
    }

    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.expire_leases(now).await,
            StoreBackend::Memory(store) => store.expire_leases(now).await,
        }
    }

    async fn claim_eligible(
        &self,
        limit: u32,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimedItem>, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.claim_eligible(limit, expiry, now).await,
            StoreBackend::Memory(store) => store.claim_eligible(limit, expiry, now).await,
        }
    }

    async fn apply_results(
        &self,
        results: &[ItemResult],
    ) -> Result<Vec<(ItemId, RowOutcome)>, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.apply_results(results).await,
            StoreBackend::Memory(store) => store.apply_results(results).await,
        }
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<QueueStats, AppError> {
        match self {
            StoreBackend::Postgres(store) => store.stats(now).await,
            StoreBackend::Memory(store) => store.stats(now).await,
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        match self {
            StoreBackend::Postgres(store) => store.health_check().await,
            StoreBackend::Memory(store) => store.health_check().await,
        }
    }
}
