use std::collections::HashSet;

use crate::config::QueueConfig;
use crate::error::AppError;
use crate::lease::LeaseManager;
use crate::models::{ClaimedItem, ItemId, ItemPayload, ItemResult, QueueStats, SubmitReport, WorkItem};
use crate::reconcile::ResultReconciler;
use crate::store::ItemStore;
use crate::traits::QueueApi;

/// The externally visible queue: request validation in front of the lease
/// manager and the result reconciler.
#[derive(Clone)]
pub struct QueueService<S: ItemStore> {
    store: S,
    leases: LeaseManager<S>,
    reconciler: ResultReconciler<S>,
    config: QueueConfig,
}

impl<S: ItemStore> QueueService<S> {
    pub fn new(store: S, config: QueueConfig) -> Self {
        Self {
            leases: LeaseManager::new(store.clone()),
            reconciler: ResultReconciler::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reclaim expired leases, then lease the next batch.
    ///
    /// `now` is read once from the store and used for both steps.
    pub async fn claim_batch(&self, batch_size: Option<i64>) -> Result<Vec<ClaimedItem>, AppError> {
        let size = self.resolve_batch_size(batch_size)?;
        let now = self.store.now().await?;
        self.leases.expire_stale_leases(now).await?;
        self.leases
            .claim(size, self.config.lease_duration, now)
            .await
    }

    /// Validate a worker submission and reconcile it as one batch.
    pub async fn submit_results(&self, results: Vec<ItemResult>) -> Result<SubmitReport, AppError> {
        validate_submission(&results)?;
        self.reconciler.submit(&results).await
    }

    /// Add new items to the queue. Returns their ids in input order.
    pub async fn enqueue(&self, payloads: Vec<ItemPayload>) -> Result<Vec<ItemId>, AppError> {
        if payloads.is_empty() {
            return Err(AppError::InvalidRequest(
                "items must contain at least one entry".into(),
            ));
        }
        if let Some(pos) = payloads.iter().position(|p| p.image_url.trim().is_empty()) {
            return Err(AppError::InvalidRequest(format!(
                "items[{pos}].image_url must not be blank"
            )));
        }

        let inserted = self.store.insert_items(payloads).await?;
        let ids: Vec<ItemId> = inserted.iter().map(|item| item.id).collect();
        tracing::info!(count = ids.len(), "Enqueued items");
        Ok(ids)
    }

    pub async fn get_item(&self, id: ItemId) -> Result<WorkItem, AppError> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("work item {id}")))
    }

    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        let now = self.store.now().await?;
        self.store.stats(now).await
    }

    /// Run an expiry pass outside of a claim.
    pub async fn expire_now(&self) -> Result<u64, AppError> {
        let now = self.store.now().await?;
        self.leases.expire_stale_leases(now).await
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.store.health_check().await
    }

    fn resolve_batch_size(&self, requested: Option<i64>) -> Result<u32, AppError> {
        let size = requested.unwrap_or(i64::from(self.config.default_batch_size));
        let max = self.config.max_batch_size;
        if size < 1 || size > i64::from(max) {
            return Err(AppError::InvalidRequest(format!(
                "batch_size must be between 1 and {max}, got {size}"
            )));
        }
        // Bounded by `max` above.
        Ok(size as u32)
    }
}

fn validate_submission(results: &[ItemResult]) -> Result<(), AppError> {
    if results.is_empty() {
        return Err(AppError::InvalidRequest(
            "items must contain at least one result".into(),
        ));
    }

    let mut seen = HashSet::with_capacity(results.len());
    for row in results {
        if row.id.0 <= 0 {
            return Err(AppError::InvalidRequest(format!(
                "id must be a positive integer, got {}",
                row.id
            )));
        }
        if row.lease_epoch.is_some_and(|epoch| epoch < 0) {
            return Err(AppError::InvalidRequest(format!(
                "lease_epoch for item {} must not be negative",
                row.id
            )));
        }
        if !seen.insert(row.id) {
            return Err(AppError::InvalidRequest(format!(
                "item {} appears more than once in the batch",
                row.id
            )));
        }
    }
    Ok(())
}

impl<S: ItemStore> QueueApi for QueueService<S> {
    async fn claim_batch(&self, batch_size: Option<i64>) -> Result<Vec<ClaimedItem>, AppError> {
        QueueService::claim_batch(self, batch_size).await
    }

    async fn submit_results(&self, results: Vec<ItemResult>) -> Result<SubmitReport, AppError> {
        QueueService::submit_results(self, results).await
    }
}
