use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leaseq_core::models::{
    ClaimedItem, ItemError, ItemId, ItemPayload, ItemResult, ItemResults, QueueStats,
    SubmitReport, WorkItem,
};

// ---------------------------------------------------------------------------
// Shared item fields
// ---------------------------------------------------------------------------

/// Producer-supplied fields of a work item.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PayloadDto {
    pub image_url: String,
    #[serde(default)]
    pub url_key: Option<String>,
    #[serde(default)]
    pub article_title: Option<String>,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub article_url: Option<String>,
    #[serde(default)]
    pub bw_ratio: Option<f64>,
}

impl From<PayloadDto> for ItemPayload {
    fn from(dto: PayloadDto) -> Self {
        Self {
            image_url: dto.image_url,
            url_key: dto.url_key,
            article_title: dto.article_title,
            image_alt: dto.image_alt,
            article_url: dto.article_url,
            bw_ratio: dto.bw_ratio,
        }
    }
}

impl From<ItemPayload> for PayloadDto {
    fn from(payload: ItemPayload) -> Self {
        Self {
            image_url: payload.image_url,
            url_key: payload.url_key,
            article_title: payload.article_title,
            image_alt: payload.image_alt,
            article_url: payload.article_url,
            bw_ratio: payload.bw_ratio,
        }
    }
}

/// Worker-produced result slots. Omitted slots are stored as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResultFieldsDto {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub detailed_caption: Option<String>,
    #[serde(default)]
    pub more_detailed_caption: Option<String>,
    #[serde(default)]
    pub logo_detection: Option<String>,
    #[serde(default)]
    pub objects_detected: Option<serde_json::Value>,
    #[serde(default)]
    pub human_detected: Option<String>,
}

impl From<ResultFieldsDto> for ItemResults {
    fn from(dto: ResultFieldsDto) -> Self {
        Self {
            caption: dto.caption,
            detailed_caption: dto.detailed_caption,
            more_detailed_caption: dto.more_detailed_caption,
            logo_detection: dto.logo_detection,
            objects_detected: dto.objects_detected,
            human_detected: dto.human_detected,
        }
    }
}

impl From<ItemResults> for ResultFieldsDto {
    fn from(results: ItemResults) -> Self {
        Self {
            caption: results.caption,
            detailed_caption: results.detailed_caption,
            more_detailed_caption: results.more_detailed_caption,
            logo_detection: results.logo_detection,
            objects_detected: results.objects_detected,
            human_detected: results.human_detected,
        }
    }
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ClaimRequest {
    /// Items to lease. Defaults to the server's configured batch size.
    #[serde(default)]
    pub batch_size: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClaimedItemResponse {
    pub id: i64,
    /// Pass back on submit to reject the write if the lease was reclaimed.
    pub lease_epoch: i64,
    pub lease_expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: PayloadDto,
}

impl From<ClaimedItem> for ClaimedItemResponse {
    fn from(item: ClaimedItem) -> Self {
        Self {
            id: item.id.0,
            lease_epoch: item.lease_epoch,
            lease_expires_at: item.lease_expires_at,
            payload: item.payload.into(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClaimResponse {
    pub items: Vec<ClaimedItemResponse>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ResultRow {
    pub id: i64,
    #[serde(default)]
    pub lease_epoch: Option<i64>,
    #[serde(flatten)]
    pub results: ResultFieldsDto,
}

impl From<ResultRow> for ItemResult {
    fn from(row: ResultRow) -> Self {
        Self {
            id: ItemId(row.id),
            lease_epoch: row.lease_epoch,
            results: row.results.into(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitRequest {
    pub items: Vec<ResultRow>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ItemErrorResponse {
    pub id: i64,
    /// `not_found` or `stale_lease`.
    pub reason: String,
}

impl From<ItemError> for ItemErrorResponse {
    fn from(err: ItemError) -> Self {
        Self {
            id: err.id.0,
            reason: err.reason.to_string(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    /// `ok` when every row applied, `partial` otherwise.
    pub status: String,
    pub applied: Vec<i64>,
    pub per_item_errors: Vec<ItemErrorResponse>,
}

impl From<SubmitReport> for SubmitResponse {
    fn from(report: SubmitReport) -> Self {
        let status = match report.status {
            leaseq_core::SubmitStatus::Ok => "ok",
            leaseq_core::SubmitStatus::Partial => "partial",
        };
        Self {
            status: status.to_string(),
            applied: report.applied.into_iter().map(|id| id.0).collect(),
            per_item_errors: report.per_item_errors.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EnqueueRequest {
    pub items: Vec<PayloadDto>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnqueueResponse {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ItemResponse {
    pub id: i64,
    pub payload: PayloadDto,
    pub results: ResultFieldsDto,
    pub lease_state: String,
    pub lease_expiry: Option<DateTime<Utc>>,
    pub lease_epoch: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkItem> for ItemResponse {
    fn from(item: WorkItem) -> Self {
        Self {
            id: item.id.0,
            payload: item.payload.into(),
            results: item.results.into(),
            lease_state: item.lease_state.to_string(),
            lease_expiry: item.lease_expiry,
            lease_epoch: item.lease_epoch,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub pending: i64,
    pub leased: i64,
    /// Locked past expiry, reclaimed on the next claim.
    pub expired: i64,
    pub completed: i64,
    pub total: i64,
}

impl From<QueueStats> for StatsResponse {
    fn from(stats: QueueStats) -> Self {
        Self {
            pending: stats.pending,
            leased: stats.leased,
            expired: stats.expired,
            completed: stats.completed,
            total: stats.total(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub backend: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
