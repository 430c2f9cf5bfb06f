//! Test utilities: mock analyzer, recording reporter, and payload fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{ClaimedItem, ItemId, ItemPayload, ItemResults};
use crate::traits::Analyzer;
use crate::worker::{WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `n` payloads with distinct image URLs and article metadata.
pub fn sample_payloads(n: usize) -> Vec<ItemPayload> {
    (1..=n)
        .map(|i| {
            ItemPayload::new(format!("https://cdn.example.com/images/{i}.jpg"))
                .with_article(
                    format!("Article {i}"),
                    format!("https://news.example.com/articles/{i}"),
                )
                .with_alt(format!("photo {i}"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Mock analyzer that captions every item it sees, except the ones it is
/// told to fail on.
#[derive(Clone, Default)]
pub struct MockAnalyzer {
    failing: Arc<Mutex<HashSet<ItemId>>>,
    calls: Arc<Mutex<Vec<ItemId>>>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error for each of these ids.
    pub fn failing_on(self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(ids);
        self
    }

    /// Ids analyzed so far, in call order.
    pub fn calls(&self) -> Vec<ItemId> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Analyzer for MockAnalyzer {
    async fn analyze(&self, item: &ClaimedItem) -> Result<ItemResults, AppError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(item.id);

        let fails = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&item.id);
        if fails {
            return Err(AppError::HttpError(format!(
                "analyzer rejected {}",
                item.payload.image_url
            )));
        }

        Ok(ItemResults {
            caption: Some(format!("caption for {}", item.payload.image_url)),
            objects_detected: Some(serde_json::json!({"labels": [], "bboxes": []})),
            human_detected: Some("no".into()),
            ..ItemResults::default()
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Worker reporter that remembers the name of every event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl WorkerReporter for RecordingReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.name().to_string());
    }
}
