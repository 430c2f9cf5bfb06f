use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use leaseq_core::{MemoryStore, QueueConfig, QueueService};
use leaseq_server::backend::StoreBackend;
use leaseq_server::routes;
use leaseq_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

/// Router over a fresh in-memory store, plus a handle on that store.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

impl TestApp {
    /// Send a request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn setup_test_app() -> TestApp {
    build(Some(TEST_API_KEY.to_string()), QueueConfig::default())
}

pub fn setup_test_app_no_auth() -> TestApp {
    build(None, QueueConfig::default())
}

pub fn setup_test_app_with(config: QueueConfig) -> TestApp {
    build(Some(TEST_API_KEY.to_string()), config)
}

fn build(api_key: Option<String>, config: QueueConfig) -> TestApp {
    let store = MemoryStore::new();
    let state = Arc::new(AppState {
        queue: QueueService::new(StoreBackend::Memory(store.clone()), config),
        api_key,
    });

    TestApp {
        router: routes::router(state),
        store,
    }
}

/// Authenticated JSON POST.
pub fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(path)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// Authenticated GET.
pub fn get(path: &str) -> Request<Body> {
    Request::get(path)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub fn images(n: usize) -> serde_json::Value {
    let items: Vec<serde_json::Value> = (1..=n)
        .map(|i| {
            serde_json::json!({
                "image_url": format!("https://cdn.example.com/{i}.jpg"),
                "article_title": format!("Story {i}"),
            })
        })
        .collect();
    serde_json::json!({ "items": items })
}
