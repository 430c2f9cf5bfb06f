use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{
    ClaimedItem, ItemId, ItemPayload, ItemResult, QueueStats, RowOutcome, WorkItem,
};

/// Durable keyed storage of work items.
///
/// Implementations must make `claim_eligible` a single atomic unit (e.g.
/// `SELECT FOR UPDATE SKIP LOCKED`) so that two concurrent callers never lock
/// the same row, and must apply `apply_results` as one transaction. Failures
/// surface as [`AppError::StorageUnavailable`] or, for a submit batch that
/// could not commit, [`AppError::ReconcileFailed`]. No internal retries.
pub trait ItemStore: Send + Sync + Clone {
    /// The store's own clock. All lease arithmetic uses this reference.
    fn now(&self) -> impl Future<Output = Result<DateTime<Utc>, AppError>> + Send;

    /// Insert new unlocked items with empty results. Ids are assigned in
    /// ascending order of the input.
    fn insert_items(
        &self,
        payloads: Vec<ItemPayload>,
    ) -> impl Future<Output = Result<Vec<WorkItem>, AppError>> + Send;

    fn get_item(
        &self,
        id: ItemId,
    ) -> impl Future<Output = Result<Option<WorkItem>, AppError>> + Send;

    /// Unlock every locked row whose `lease_expiry <= now`. Returns the count.
    fn expire_leases(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Atomically lock up to `limit` eligible rows, lowest id first, with
    /// the given expiry. Returned items are ordered by ascending id.
    fn claim_eligible(
        &self,
        limit: u32,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ClaimedItem>, AppError>> + Send;

    /// Write results and release leases for the whole batch in one
    /// transaction. Returns one outcome per input row, in input order.
    fn apply_results(
        &self,
        results: &[ItemResult],
    ) -> impl Future<Output = Result<Vec<(ItemId, RowOutcome)>, AppError>> + Send;

    fn stats(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<QueueStats, AppError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
