use std::future::Future;

use crate::error::AppError;
use crate::models::{ClaimedItem, ItemResult, ItemResults, SubmitReport};

/// The two calls a worker makes against the queue, in-process or over HTTP.
pub trait QueueApi: Send + Sync + Clone {
    /// Lease the next batch. `None` uses the queue's default batch size.
    fn claim_batch(
        &self,
        batch_size: Option<i64>,
    ) -> impl Future<Output = Result<Vec<ClaimedItem>, AppError>> + Send;

    fn submit_results(
        &self,
        results: Vec<ItemResult>,
    ) -> impl Future<Output = Result<SubmitReport, AppError>> + Send;
}

/// Produces result fields for one claimed item (captioning, detection, ...).
pub trait Analyzer: Send + Sync + Clone {
    fn analyze(
        &self,
        item: &ClaimedItem,
    ) -> impl Future<Output = Result<ItemResults, AppError>> + Send;
}
