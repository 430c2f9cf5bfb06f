use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;
use crate::models::ClaimedItem;
use crate::store::ItemStore;

/// Owns the LOCKED/UNLOCKED lifecycle of work items.
#[derive(Clone)]
pub struct LeaseManager<S: ItemStore> {
    store: S,
}

impl<S: ItemStore> LeaseManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Release every lease whose expiry is at or before `now`.
    ///
    /// Must run before each claim, otherwise items held by a crashed worker
    /// are never offered again.
    pub async fn expire_stale_leases(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let expired = self.store.expire_leases(now).await?;
        if expired > 0 {
            tracing::info!(expired, "Reclaimed stale leases");
        }
        Ok(expired)
    }

    /// Lock up to `batch_size` eligible items until `now + lease_duration`.
    ///
    /// A zero duration is accepted: the lease is expired on the next pass.
    pub async fn claim(
        &self,
        batch_size: u32,
        lease_duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimedItem>, AppError> {
        if batch_size == 0 {
            return Err(AppError::InvalidRequest(
                "batch_size must be a positive integer".into(),
            ));
        }
        if lease_duration < TimeDelta::zero() {
            return Err(AppError::InvalidRequest(
                "lease_duration must not be negative".into(),
            ));
        }

        let expiry = now.checked_add_signed(lease_duration).ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "lease_duration of {}s overflows the lease expiry",
                lease_duration.num_seconds()
            ))
        })?;
        let claimed = self.store.claim_eligible(batch_size, expiry, now).await?;

        match (claimed.first(), claimed.last()) {
            (Some(first), Some(last)) => tracing::info!(
                count = claimed.len(),
                first_id = %first.id,
                last_id = %last.id,
                %expiry,
                "Claimed batch"
            ),
            _ => tracing::debug!(batch_size, "No eligible items to claim"),
        }

        Ok(claimed)
    }
}
