use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a work item. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lease state stored on the item row. The row is the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    Unlocked,
    Locked,
}

impl LeaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseState::Unlocked => "unlocked",
            LeaseState::Locked => "locked",
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeaseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unlocked" => Ok(LeaseState::Unlocked),
            "locked" => Ok(LeaseState::Locked),
            _ => Err(format!("Unknown lease state: {}", s)),
        }
    }
}

/// Producer-supplied fields. The queue stores and returns them, never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub image_url: String,
    #[serde(default)]
    pub url_key: Option<String>,
    #[serde(default)]
    pub article_title: Option<String>,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub article_url: Option<String>,
    /// Black/white pixel ratio computed by the image extractor.
    #[serde(default)]
    pub bw_ratio: Option<f64>,
}

impl ItemPayload {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            ..Self::default()
        }
    }

    pub fn with_article(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.article_title = Some(title.into());
        self.article_url = Some(url.into());
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.image_alt = Some(alt.into());
        self
    }

    pub fn with_bw_ratio(mut self, ratio: f64) -> Self {
        self.bw_ratio = Some(ratio);
        self
    }
}

/// Worker-produced output slots. Every slot is independently nullable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemResults {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub detailed_caption: Option<String>,
    #[serde(default)]
    pub more_detailed_caption: Option<String>,
    #[serde(default)]
    pub logo_detection: Option<String>,
    /// Detector output (labels and bounding boxes), stored as a JSON document.
    #[serde(default)]
    pub objects_detected: Option<serde_json::Value>,
    #[serde(default)]
    pub human_detected: Option<String>,
}

impl ItemResults {
    /// True when no slot has been filled. Only empty items are eligible for claim.
    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.detailed_caption.is_none()
            && self.more_detailed_caption.is_none()
            && self.logo_detection.is_none()
            && self.objects_detected.is_none()
            && self.human_detected.is_none()
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// A work item as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub payload: ItemPayload,
    pub results: ItemResults,
    pub lease_state: LeaseState,
    /// Set iff `lease_state` is `Locked`.
    pub lease_expiry: Option<DateTime<Utc>>,
    /// Incremented on every claim; identifies the current lease holder.
    pub lease_epoch: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn is_eligible(&self) -> bool {
        self.lease_state == LeaseState::Unlocked && self.results.is_empty()
    }

    /// Locked with an expiry at or before `now`.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_state == LeaseState::Locked && self.lease_expiry.is_some_and(|exp| exp <= now)
    }
}

/// What a worker receives for each item of a claimed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedItem {
    pub id: ItemId,
    pub lease_epoch: i64,
    pub lease_expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: ItemPayload,
}

/// One row of a worker submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub id: ItemId,
    /// Epoch from the claim. When present, the write only applies if the
    /// row still carries this epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_epoch: Option<i64>,
    #[serde(flatten)]
    pub results: ItemResults,
}

impl ItemResult {
    pub fn new(id: ItemId, results: ItemResults) -> Self {
        Self {
            id,
            lease_epoch: None,
            results,
        }
    }

    /// Build a submission row that carries the claim's lease token.
    pub fn for_claim(claim: &ClaimedItem, results: ItemResults) -> Self {
        Self {
            id: claim.id,
            lease_epoch: Some(claim.lease_epoch),
            results,
        }
    }
}

/// Per-row result of applying a submit batch to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Applied,
    NotFound,
    StaleLease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorReason {
    NotFound,
    StaleLease,
}

impl fmt::Display for ItemErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemErrorReason::NotFound => write!(f, "not_found"),
            ItemErrorReason::StaleLease => write!(f, "stale_lease"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub id: ItemId,
    pub reason: ItemErrorReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// Every row was applied.
    Ok,
    /// At least one row was reported in `per_item_errors`.
    Partial,
}

/// Outcome of SubmitResults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub status: SubmitStatus,
    pub applied: Vec<ItemId>,
    pub per_item_errors: Vec<ItemError>,
}

impl SubmitReport {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = (ItemId, RowOutcome)>) -> Self {
        let mut applied = Vec::new();
        let mut per_item_errors = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                RowOutcome::Applied => applied.push(id),
                RowOutcome::NotFound => per_item_errors.push(ItemError {
                    id,
                    reason: ItemErrorReason::NotFound,
                }),
                RowOutcome::StaleLease => per_item_errors.push(ItemError {
                    id,
                    reason: ItemErrorReason::StaleLease,
                }),
            }
        }
        let status = if per_item_errors.is_empty() {
            SubmitStatus::Ok
        } else {
            SubmitStatus::Partial
        };
        Self {
            status,
            applied,
            per_item_errors,
        }
    }
}

/// Item counts by lifecycle position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Eligible for claim right now.
    pub pending: i64,
    /// Locked with a lease that has not yet expired.
    pub leased: i64,
    /// Locked with an expired lease, waiting for the next expiry pass.
    pub expired: i64,
    /// Unlocked with results populated.
    pub completed: i64,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.pending + self.leased + self.expired + self.completed
    }
}
