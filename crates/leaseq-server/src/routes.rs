use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use leaseq_core::models::{ItemId, ItemPayload, ItemResult};

use crate::auth::require_api_key;
use crate::dto::{
    ClaimRequest, ClaimResponse, EnqueueRequest, EnqueueResponse, HealthResponse, ItemResponse,
    StatsResponse, SubmitRequest, SubmitResponse,
};
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/leases", post(claim_batch))
        .route("/v1/results", post(submit_results))
        .route("/v1/items", post(enqueue_items))
        .route("/v1/items/{id}", get(get_item))
        .route("/v1/stats", get(stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/leases",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Leased batch, possibly empty", body = ClaimResponse),
        (status = 400, description = "Invalid batch size", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Store unavailable", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "leases"
)]
pub async fn claim_batch(
    State(state): State<Arc<AppState>>,
    body: Option<ApiJson<ClaimRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let batch_size = body.and_then(|ApiJson(request)| request.batch_size);
    let items = state.queue.claim_batch(batch_size).await?;

    let response = ClaimResponse {
        items: items.into_iter().map(Into::into).collect(),
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/results",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Batch reconciled", body = SubmitResponse),
        (status = 400, description = "Malformed submission", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Batch write failed; nothing applied", body = crate::dto::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "results"
)]
pub async fn submit_results(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rows: Vec<ItemResult> = body.items.into_iter().map(Into::into).collect();
    let report = state.queue.submit_results(rows).await?;

    Ok(axum::Json(SubmitResponse::from(report)))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/items",
    request_body = EnqueueRequest,
    responses(
        (status = 201, description = "Items enqueued", body = EnqueueResponse),
        (status = 400, description = "Invalid payload", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn enqueue_items(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<EnqueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payloads: Vec<ItemPayload> = body.items.into_iter().map(Into::into).collect();
    let ids = state.queue.enqueue(payloads).await?;

    let response = EnqueueResponse {
        ids: ids.into_iter().map(|id| id.0).collect(),
    };

    Ok((StatusCode::CREATED, axum::Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/items/{id}",
    params(
        ("id" = i64, Path, description = "Work item ID")
    ),
    responses(
        (status = 200, description = "Work item", body = ItemResponse),
        (status = 400, description = "Malformed item ID", body = crate::dto::ErrorResponse),
        (status = 404, description = "No such item", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.queue.get_item(ItemId(id)).await?;
    Ok(axum::Json(ItemResponse::from(item)))
}

#[utoipa::path(
    get,
    path = "/v1/stats",
    responses(
        (status = 200, description = "Item counts by lifecycle position", body = StatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "items"
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.queue.stats().await?;
    Ok(axum::Json(StatsResponse::from(stats)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_status = match state.queue.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if store_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if store_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        store: store_status,
        backend: state.queue.store().name(),
    };

    (status, axum::Json(response))
}
