use leaseq_client::HttpQueueClient;
use leaseq_core::error::AppError;
use leaseq_core::models::{ItemId, ItemPayload, ItemResult, ItemResults, LeaseState, SubmitStatus};
use leaseq_core::testutil::{MockAnalyzer, sample_payloads};
use leaseq_core::traits::QueueApi;
use leaseq_core::worker::{TracingWorkerReporter, WorkerService};
use leaseq_core::WorkerConfig;

use crate::integration::common::{TEST_API_KEY, spawn_server};

fn client_for(base_url: &str) -> HttpQueueClient {
    HttpQueueClient::new(base_url)
        .unwrap()
        .with_api_key(TEST_API_KEY)
}

#[tokio::test]
async fn claim_and_submit_over_http() {
    let server = spawn_server().await;
    let client = client_for(&server.base_url);

    let ids = client.enqueue(&sample_payloads(3)).await.unwrap();
    assert_eq!(ids, vec![ItemId(1), ItemId(2), ItemId(3)]);

    let batch = client.claim_batch(Some(2)).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].id, ItemId(1));
    assert_eq!(batch[0].lease_epoch, 1);
    assert_eq!(batch[0].payload.image_url, "https://cdn.example.com/images/1.jpg");

    let rows = batch
        .iter()
        .map(|c| ItemResult::for_claim(c, ItemResults::default().with_caption("a ferry")))
        .collect();
    let report = client.submit_results(rows).await.unwrap();
    assert_eq!(report.status, SubmitStatus::Ok);
    assert_eq!(report.applied, vec![ItemId(1), ItemId(2)]);

    let item = client.get_item(ItemId(1)).await.unwrap();
    assert_eq!(item.lease_state, LeaseState::Unlocked);
    assert_eq!(item.results.caption.as_deref(), Some("a ferry"));

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn server_errors_come_back_typed() {
    let server = spawn_server().await;
    let client = client_for(&server.base_url);

    assert!(matches!(
        client.claim_batch(Some(0)).await,
        Err(AppError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.get_item(ItemId(99)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        client.enqueue(&[ItemPayload::new(" ")]).await,
        Err(AppError::InvalidRequest(_))
    ));

    server.store.set_unavailable(true);
    let err = client.claim_batch(None).await.unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn per_item_errors_survive_the_wire() {
    let server = spawn_server().await;
    let client = client_for(&server.base_url);
    client.enqueue(&sample_payloads(1)).await.unwrap();

    let report = client
        .submit_results(vec![
            ItemResult::new(ItemId(1), ItemResults::default().with_caption("kept")),
            ItemResult::new(ItemId(50), ItemResults::default().with_caption("lost")),
        ])
        .await
        .unwrap();

    assert_eq!(report.status, SubmitStatus::Partial);
    assert_eq!(report.per_item_errors.len(), 1);
    assert_eq!(report.per_item_errors[0].id, ItemId(50));
}

#[tokio::test]
async fn wrong_api_key_is_not_retryable() {
    let server = spawn_server().await;
    let client = HttpQueueClient::new(&server.base_url)
        .unwrap()
        .with_api_key("nope");

    let err = client.claim_batch(None).await.unwrap_err();
    assert!(matches!(err, AppError::HttpError(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(&format!("http://{addr}"));

    let err = client.claim_batch(None).await.unwrap_err();
    assert!(matches!(err, AppError::NetworkError(_)), "got {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn worker_runs_against_remote_queue() {
    let server = spawn_server().await;
    let client = client_for(&server.base_url);
    client.enqueue(&sample_payloads(5)).await.unwrap();

    let analyzer = MockAnalyzer::new().failing_on([ItemId(3)]);
    let config = WorkerConfig::default().with_batch_size(5).with_concurrency(2);
    let worker = WorkerService::new(client.clone(), analyzer, config);

    let claimed = worker.process_next_batch(&TracingWorkerReporter).await.unwrap();
    assert_eq!(claimed, 5);

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.leased, 1);
}
