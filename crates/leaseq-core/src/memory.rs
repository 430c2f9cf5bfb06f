//! In-process [`ItemStore`] for tests, local development, and the server's
//! `memory` backend.
//!
//! Items live in an append-only arena indexed by `id - 1`. Two ordered
//! indexes sit beside it: the eligible set (ascending id, which is claim
//! order) and the lease set keyed by `(expiry, id)` for expiry scans. Every
//! operation runs under a single mutex, which makes claim and batch-apply
//! atomic with respect to each other.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::models::{
    ClaimedItem, ItemId, ItemPayload, ItemResult, ItemResults, LeaseState, QueueStats,
    RowOutcome, WorkItem,
};
use crate::store::ItemStore;

#[derive(Clone)]
pub struct MemoryStore {
    arena: Arc<Mutex<Arena>>,
    clock: Arc<dyn Clock>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_next_write: AtomicBool,
}

#[derive(Default)]
struct Arena {
    items: Vec<WorkItem>,
    eligible: BTreeSet<ItemId>,
    leases: BTreeSet<(DateTime<Utc>, ItemId)>,
    last_now: Option<DateTime<Utc>>,
}

impl MemoryStore {
    /// Empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            arena: Arc::new(Mutex::new(Arena::default())),
            clock: Arc::new(clock),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Make every operation fail with `StorageUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reject the next `apply_results` batch as if its commit failed.
    pub fn fail_next_write(&self) {
        self.faults.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Arena>, AppError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StorageUnavailable(
                "memory store marked unavailable".into(),
            ));
        }
        self.arena
            .lock()
            .map_err(|_| AppError::StorageUnavailable("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    fn slot(&self, id: ItemId) -> Option<usize> {
        let idx = usize::try_from(id.0).ok()?.checked_sub(1)?;
        (idx < self.items.len()).then_some(idx)
    }

    fn now(&mut self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let now = match self.last_now {
            Some(last) if last > wall => last,
            _ => wall,
        };
        self.last_now = Some(now);
        now
    }

    fn insert(&mut self, payload: ItemPayload, now: DateTime<Utc>) -> WorkItem {
        let id = ItemId(self.items.len() as i64 + 1);
        let item = WorkItem {
            id,
            payload,
            results: ItemResults::default(),
            lease_state: LeaseState::Unlocked,
            lease_expiry: None,
            lease_epoch: 0,
            created_at: now,
            updated_at: now,
        };
        self.items.push(item.clone());
        self.eligible.insert(id);
        item
    }

    fn expire(&mut self, now: DateTime<Utc>) -> u64 {
        let expired: Vec<(DateTime<Utc>, ItemId)> = self
            .leases
            .range(..=(now, ItemId(i64::MAX)))
            .copied()
            .collect();

        for key in &expired {
            self.leases.remove(key);
            let Some(idx) = self.slot(key.1) else {
                continue;
            };
            let item = &mut self.items[idx];
            item.lease_state = LeaseState::Unlocked;
            item.lease_expiry = None;
            item.updated_at = now;
            if item.results.is_empty() {
                self.eligible.insert(item.id);
            }
        }

        expired.len() as u64
    }

    fn claim(&mut self, limit: u32, expiry: DateTime<Utc>, now: DateTime<Utc>) -> Vec<ClaimedItem> {
        let ids: Vec<ItemId> = self.eligible.iter().take(limit as usize).copied().collect();
        let mut claimed = Vec::with_capacity(ids.len());

        for id in ids {
            self.eligible.remove(&id);
            let Some(idx) = self.slot(id) else {
                continue;
            };
            let item = &mut self.items[idx];
            item.lease_state = LeaseState::Locked;
            item.lease_expiry = Some(expiry);
            item.lease_epoch += 1;
            item.updated_at = now;
            self.leases.insert((expiry, id));

            claimed.push(ClaimedItem {
                id,
                lease_epoch: item.lease_epoch,
                lease_expires_at: expiry,
                payload: item.payload.clone(),
            });
        }

        claimed
    }

    /// Stage every row against copies, then commit all copies at once.
    fn apply(
        &mut self,
        results: &[ItemResult],
        now: DateTime<Utc>,
        fail: bool,
    ) -> Result<Vec<(ItemId, RowOutcome)>, AppError> {
        let mut staged: BTreeMap<ItemId, WorkItem> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(results.len());

        for row in results {
            let current = match staged.get(&row.id) {
                Some(item) => Some(item.clone()),
                None => self.slot(row.id).map(|idx| self.items[idx].clone()),
            };
            let Some(mut item) = current else {
                outcomes.push((row.id, RowOutcome::NotFound));
                continue;
            };
            if row.lease_epoch.is_some_and(|epoch| epoch != item.lease_epoch) {
                outcomes.push((row.id, RowOutcome::StaleLease));
                continue;
            }

            item.results = row.results.clone();
            item.lease_state = LeaseState::Unlocked;
            item.lease_expiry = None;
            item.updated_at = now;
            staged.insert(row.id, item);
            outcomes.push((row.id, RowOutcome::Applied));
        }

        if fail {
            return Err(AppError::ReconcileFailed(
                "injected write failure; batch rolled back".into(),
            ));
        }

        for (id, item) in staged {
            let Some(idx) = self.slot(id) else {
                continue;
            };
            if let Some(expiry) = self.items[idx].lease_expiry {
                self.leases.remove(&(expiry, id));
            }
            if item.is_eligible() {
                self.eligible.insert(id);
            } else {
                self.eligible.remove(&id);
            }
            self.items[idx] = item;
        }

        Ok(outcomes)
    }

    fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let expired = self
            .leases
            .range(..=(now, ItemId(i64::MAX)))
            .count() as i64;
        let leased = self.leases.len() as i64 - expired;
        let pending = self.eligible.len() as i64;
        QueueStats {
            pending,
            leased,
            expired,
            completed: self.items.len() as i64 - pending - leased - expired,
        }
    }
}

impl ItemStore for MemoryStore {
    async fn now(&self) -> Result<DateTime<Utc>, AppError> {
        let wall = self.clock.now();
        let mut arena = self.lock()?;
        Ok(arena.now(wall))
    }

    async fn insert_items(&self, payloads: Vec<ItemPayload>) -> Result<Vec<WorkItem>, AppError> {
        let wall = self.clock.now();
        let mut arena = self.lock()?;
        let now = arena.now(wall);
        Ok(payloads
            .into_iter()
            .map(|payload| arena.insert(payload, now))
            .collect())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<WorkItem>, AppError> {
        let arena = self.lock()?;
        Ok(arena.slot(id).map(|idx| arena.items[idx].clone()))
    }

    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut arena = self.lock()?;
        Ok(arena.expire(now))
    }

    async fn claim_eligible(
        &self,
        limit: u32,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimedItem>, AppError> {
        let mut arena = self.lock()?;
        Ok(arena.claim(limit, expiry, now))
    }

    async fn apply_results(
        &self,
        results: &[ItemResult],
    ) -> Result<Vec<(ItemId, RowOutcome)>, AppError> {
        let wall = self.clock.now();
        let mut arena = self.lock()?;
        let now = arena.now(wall);
        let fail = self.faults.fail_next_write.swap(false, Ordering::SeqCst);
        arena.apply(results, now, fail)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<QueueStats, AppError> {
        let arena = self.lock()?;
        Ok(arena.stats(now))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}
