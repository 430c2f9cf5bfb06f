use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use leaseq_core::error::AppError;
use leaseq_core::models::{
    ClaimedItem, ItemId, ItemPayload, ItemResult, QueueStats, SubmitReport, WorkItem,
};
use leaseq_core::traits::QueueApi;

/// Queue client speaking the leaseq HTTP API.
///
/// Server error bodies (`{error, message}`) are mapped back to the matching
/// [`AppError`] variant, so callers see the same errors as in-process users
/// of the queue service.
#[derive(Clone)]
pub struct HttpQueueClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpQueueClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid queue URL '{base_url}': {e}")))?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "Queue URL scheme '{scheme}' is not supported (only http/https)"
                )));
            }
        }
        // Relative joins replace the last path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("leaseq/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Send `Authorization: Bearer <key>` on every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Add new items to the queue.
    pub async fn enqueue(&self, payloads: &[ItemPayload]) -> Result<Vec<ItemId>, AppError> {
        let response: EnqueueEnvelope = self
            .send(
                self.client
                    .post(self.endpoint("v1/items")?)
                    .json(&ItemsBody { items: payloads }),
            )
            .await?;
        Ok(response.ids)
    }

    pub async fn get_item(&self, id: ItemId) -> Result<WorkItem, AppError> {
        self.send(self.client.get(self.endpoint(&format!("v1/items/{id}"))?))
            .await
    }

    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        self.send(self.client.get(self.endpoint("v1/stats")?)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::ConfigError(format!("Invalid endpoint '{path}': {e}")))
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, AppError> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse queue response: {e}")))
    }
}

impl QueueApi for HttpQueueClient {
    async fn claim_batch(&self, batch_size: Option<i64>) -> Result<Vec<ClaimedItem>, AppError> {
        let response: ClaimEnvelope = self
            .send(
                self.client
                    .post(self.endpoint("v1/leases")?)
                    .json(&ClaimBody { batch_size }),
            )
            .await?;
        tracing::debug!(count = response.items.len(), "Claimed batch over HTTP");
        Ok(response.items)
    }

    async fn submit_results(&self, results: Vec<ItemResult>) -> Result<SubmitReport, AppError> {
        self.send(
            self.client
                .post(self.endpoint("v1/results")?)
                .json(&ItemsBody {
                    items: results.as_slice(),
                }),
        )
        .await
    }
}

// -- Wire types --

#[derive(Serialize)]
struct ClaimBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<i64>,
}

#[derive(Serialize)]
struct ItemsBody<'a, T> {
    items: &'a [T],
}

#[derive(Deserialize)]
struct ClaimEnvelope {
    items: Vec<ClaimedItem>,
}

#[derive(Deserialize)]
struct EnqueueEnvelope {
    ids: Vec<ItemId>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Rebuild the server-side error from a non-2xx response.
fn error_from_response(status: u16, body: &str) -> AppError {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        // No API error body: a proxy or a crashed server. Worth retrying if 5xx.
        let message = format!("HTTP {status}: {body}");
        return if status >= 500 {
            AppError::NetworkError(message)
        } else {
            AppError::HttpError(message)
        };
    };

    match parsed.error.as_str() {
        "invalid_request" => AppError::InvalidRequest(parsed.message),
        "not_found" => AppError::NotFound(parsed.message),
        "storage_unavailable" => AppError::StorageUnavailable(parsed.message),
        "reconcile_failed" => AppError::ReconcileFailed(parsed.message),
        "config_error" => AppError::ConfigError(parsed.message),
        other => AppError::HttpError(format!("HTTP {status} ({other}): {}", parsed.message)),
    }
}
