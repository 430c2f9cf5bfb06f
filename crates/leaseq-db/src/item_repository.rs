use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};

use leaseq_core::error::AppError;
use leaseq_core::models::{
    ClaimedItem, ItemId, ItemPayload, ItemResult, ItemResults, LeaseState, QueueStats, RowOutcome,
    WorkItem,
};
use leaseq_core::store::ItemStore;

/// PostgreSQL-backed item store using `SELECT FOR UPDATE SKIP LOCKED` for claims.
#[derive(Clone)]
pub struct PgItemStore {
    pool: Pool<Postgres>,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: i64,
    image_url: String,
    url_key: Option<String>,
    article_title: Option<String>,
    image_alt: Option<String>,
    article_url: Option<String>,
    bw_ratio: Option<f64>,
    caption: Option<String>,
    detailed_caption: Option<String>,
    more_detailed_caption: Option<String>,
    logo_detection: Option<String>,
    objects_detected: Option<serde_json::Value>,
    human_detected: Option<String>,
    lease_state: String,
    lease_expiry: Option<DateTime<Utc>>,
    lease_epoch: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WorkItemRow> for WorkItem {
    fn from(row: WorkItemRow) -> Self {
        WorkItem {
            id: ItemId(row.id),
            payload: ItemPayload {
                image_url: row.image_url,
                url_key: row.url_key,
                article_title: row.article_title,
                image_alt: row.image_alt,
                article_url: row.article_url,
                bw_ratio: row.bw_ratio,
            },
            results: ItemResults {
                caption: row.caption,
                detailed_caption: row.detailed_caption,
                more_detailed_caption: row.more_detailed_caption,
                logo_detection: row.logo_detection,
                objects_detected: row.objects_detected,
                human_detected: row.human_detected,
            },
            lease_state: row.lease_state.parse().unwrap_or(LeaseState::Unlocked),
            lease_expiry: row.lease_expiry,
            lease_epoch: row.lease_epoch,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClaimedRow {
    id: i64,
    image_url: String,
    url_key: Option<String>,
    article_title: Option<String>,
    image_alt: Option<String>,
    article_url: Option<String>,
    bw_ratio: Option<f64>,
    lease_epoch: i64,
    lease_expiry: DateTime<Utc>,
}

impl From<ClaimedRow> for ClaimedItem {
    fn from(row: ClaimedRow) -> Self {
        ClaimedItem {
            id: ItemId(row.id),
            lease_epoch: row.lease_epoch,
            lease_expires_at: row.lease_expiry,
            payload: ItemPayload {
                image_url: row.image_url,
                url_key: row.url_key,
                article_title: row.article_title,
                image_alt: row.image_alt,
                article_url: row.article_url,
                bw_ratio: row.bw_ratio,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    pending: i64,
    leased: i64,
    expired: i64,
    completed: i64,
}

impl ItemStore for PgItemStore {
    async fn now(&self) -> Result<DateTime<Utc>, AppError> {
        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))
    }

    async fn insert_items(&self, payloads: Vec<ItemPayload>) -> Result<Vec<WorkItem>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        let mut items = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            let row = sqlx::query_as::<_, WorkItemRow>(
                r#"
                INSERT INTO work_items (image_url, url_key, article_title, image_alt, article_url, bw_ratio)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(&payload.image_url)
            .bind(&payload.url_key)
            .bind(&payload.article_title)
            .bind(&payload.image_alt)
            .bind(&payload.article_url)
            .bind(payload.bw_ratio)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
            items.push(row.into());
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        Ok(items)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<WorkItem>, AppError> {
        let row = sqlx::query_as::<_, WorkItemRow>(r#"SELECT * FROM work_items WHERE id = $1"#)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn expire_leases(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE work_items
            SET lease_state = 'unlocked', lease_expiry = NULL, updated_at = $1
            WHERE lease_state = 'locked' AND lease_expiry <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn claim_eligible(
        &self,
        limit: u32,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimedItem>, AppError> {
        let rows = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE work_items
            SET lease_state = 'locked', lease_expiry = $2, lease_epoch = lease_epoch + 1, updated_at = $3
            WHERE id IN (
                SELECT id FROM work_items
                WHERE lease_state = 'unlocked' AND NOT has_results
                ORDER BY id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $1
            )
            RETURNING *
            "#,
        )
        .bind(i64::from(limit))
        .bind(expiry)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        // RETURNING carries no ordering guarantee.
        let mut claimed: Vec<ClaimedItem> = rows.into_iter().map(Into::into).collect();
        claimed.sort_by_key(|item| item.id);
        Ok(claimed)
    }

    async fn apply_results(
        &self,
        results: &[ItemResult],
    ) -> Result<Vec<(ItemId, RowOutcome)>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(results.len());
        for row in results {
            let updated = sqlx::query(
                r#"
                UPDATE work_items
                SET caption = $2, detailed_caption = $3, more_detailed_caption = $4,
                    logo_detection = $5, objects_detected = $6, human_detected = $7,
                    lease_state = 'unlocked', lease_expiry = NULL, updated_at = NOW()
                WHERE id = $1 AND ($8::BIGINT IS NULL OR lease_epoch = $8)
                "#,
            )
            .bind(row.id.0)
            .bind(&row.results.caption)
            .bind(&row.results.detailed_caption)
            .bind(&row.results.more_detailed_caption)
            .bind(&row.results.logo_detection)
            .bind(&row.results.objects_detected)
            .bind(&row.results.human_detected)
            .bind(row.lease_epoch)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::ReconcileFailed(e.to_string()))?;

            if updated.rows_affected() > 0 {
                outcomes.push((row.id, RowOutcome::Applied));
                continue;
            }

            let exists = sqlx::query_scalar::<_, i64>(r#"SELECT id FROM work_items WHERE id = $1"#)
                .bind(row.id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::ReconcileFailed(e.to_string()))?;
            let outcome = if exists.is_some() {
                RowOutcome::StaleLease
            } else {
                RowOutcome::NotFound
            };
            outcomes.push((row.id, outcome));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::ReconcileFailed(e.to_string()))?;

        Ok(outcomes)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<QueueStats, AppError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE lease_state = 'unlocked' AND NOT has_results) AS pending,
                COUNT(*) FILTER (WHERE lease_state = 'locked' AND lease_expiry > $1) AS leased,
                COUNT(*) FILTER (WHERE lease_state = 'locked' AND lease_expiry <= $1) AS expired,
                COUNT(*) FILTER (WHERE lease_state = 'unlocked' AND has_results) AS completed
            FROM work_items
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        Ok(QueueStats {
            pending: row.pending,
            leased: row.leased,
            expired: row.expired,
            completed: row.completed,
        })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}
