use std::collections::HashSet;

use chrono::TimeDelta;
use leaseq_core::error::AppError;
use leaseq_core::models::{
    ItemId, ItemPayload, ItemResult, ItemResults, LeaseState, RowOutcome, SubmitStatus,
};
use leaseq_core::store::ItemStore;
use leaseq_core::testutil::sample_payloads;
use leaseq_core::{QueueConfig, QueueService};
use leaseq_db::PgItemStore;

use crate::integration::common::setup_test_db;

fn captioned(text: &str) -> ItemResults {
    ItemResults {
        caption: Some(text.to_string()),
        objects_detected: Some(serde_json::json!({"labels": ["boat"], "bboxes": [[1, 2, 3, 4]]})),
        ..ItemResults::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn insert_assigns_ascending_ids_and_keeps_payload() {
    let (pool, _container) = setup_test_db().await;
    let store = PgItemStore::new(pool);

    let payload = ItemPayload::new("https://cdn.example.com/a.jpg")
        .with_article("Harbour opens", "https://news.example.com/harbour")
        .with_bw_ratio(0.25);
    let inserted = store
        .insert_items(vec![payload.clone(), ItemPayload::new("https://cdn.example.com/b.jpg")])
        .await
        .unwrap();

    assert_eq!(inserted.len(), 2);
    assert!(inserted[0].id < inserted[1].id);

    let item = store.get_item(inserted[0].id).await.unwrap().unwrap();
    assert_eq!(item.payload, payload);
    assert_eq!(item.lease_state, LeaseState::Unlocked);
    assert!(item.lease_expiry.is_none());
    assert!(item.results.is_empty());
    assert_eq!(item.lease_epoch, 0);

    assert!(store.get_item(ItemId(9999)).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn batches_drain_lowest_id_first() {
    let (pool, _container) = setup_test_db().await;
    let service = QueueService::new(PgItemStore::new(pool), QueueConfig::default());
    service.enqueue(sample_payloads(25)).await.unwrap();

    let sizes: Vec<usize> = {
        let mut sizes = Vec::new();
        let mut last_id = 0;
        for _ in 0..4 {
            let batch = service.claim_batch(Some(10)).await.unwrap();
            for item in &batch {
                assert!(item.id.0 > last_id, "ids must ascend across batches");
                last_id = item.id.0;
            }
            sizes.push(batch.len());
        }
        sizes
    };
    assert_eq!(sizes, vec![10, 10, 5, 0]);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.leased, 25);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn concurrent_claims_are_disjoint() {
    let (pool, _container) = setup_test_db().await;
    let store = PgItemStore::new(pool);
    store.insert_items(sample_payloads(100)).await.unwrap();
    let now = store.now().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .claim_eligible(7, now + TimeDelta::hours(1), now)
                .await
                .unwrap()
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let batch = handle.await.unwrap();
        assert_eq!(batch.len(), 7);
        for item in batch {
            assert!(seen.insert(item.id), "item {} delivered twice", item.id);
        }
    }
    assert_eq!(seen.len(), 56);
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn expiry_is_inclusive_of_the_deadline() {
    let (pool, _container) = setup_test_db().await;
    let store = PgItemStore::new(pool);
    store.insert_items(sample_payloads(2)).await.unwrap();
    let now = store.now().await.unwrap();

    let deadline = now + TimeDelta::minutes(5);
    let claimed = store.claim_eligible(2, deadline, now).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|c| c.lease_expires_at == deadline));

    assert_eq!(
        store
            .expire_leases(deadline - TimeDelta::seconds(1))
            .await
            .unwrap(),
        0
    );
    assert_eq!(store.stats(deadline).await.unwrap().expired, 2);
    assert_eq!(store.expire_leases(deadline).await.unwrap(), 2);

    let again = store
        .claim_eligible(2, deadline + TimeDelta::minutes(5), deadline)
        .await
        .unwrap();
    assert!(again.iter().all(|c| c.lease_epoch == 2));
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn apply_results_reports_each_row() {
    let (pool, _container) = setup_test_db().await;
    let store = PgItemStore::new(pool);
    store.insert_items(sample_payloads(3)).await.unwrap();
    let now = store.now().await.unwrap();
    let claimed = store
        .claim_eligible(3, now + TimeDelta::hours(3), now)
        .await
        .unwrap();

    let stale = ItemResult {
        lease_epoch: Some(claimed[2].lease_epoch + 1),
        ..ItemResult::new(claimed[2].id, captioned("stale"))
    };
    let rows = vec![
        ItemResult::for_claim(&claimed[0], captioned("fresh")),
        ItemResult::new(ItemId(4242), captioned("ghost")),
        ItemResult::new(claimed[1].id, captioned("no token")),
        stale,
    ];
    let outcomes = store.apply_results(&rows).await.unwrap();
    assert_eq!(
        outcomes,
        vec![
            (claimed[0].id, RowOutcome::Applied),
            (ItemId(4242), RowOutcome::NotFound),
            (claimed[1].id, RowOutcome::Applied),
            (claimed[2].id, RowOutcome::StaleLease),
        ]
    );

    let done = store.get_item(claimed[0].id).await.unwrap().unwrap();
    assert_eq!(done.lease_state, LeaseState::Unlocked);
    assert!(done.lease_expiry.is_none());
    assert_eq!(done.results, captioned("fresh"));

    let untouched = store.get_item(claimed[2].id).await.unwrap().unwrap();
    assert_eq!(untouched.lease_state, LeaseState::Locked);
    assert!(untouched.results.is_empty());

    let stats = store.stats(now).await.unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.leased, 1);
    assert!(store
        .claim_eligible(10, now + TimeDelta::hours(1), now)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn failed_batch_rolls_back_every_row() {
    let (pool, _container) = setup_test_db().await;
    let service = QueueService::new(PgItemStore::new(pool), QueueConfig::default());
    service.enqueue(sample_payloads(2)).await.unwrap();
    let claimed = service.claim_batch(Some(2)).await.unwrap();

    // Postgres text cannot hold NUL; the second row fails inside the transaction.
    let rows = vec![
        ItemResult::for_claim(&claimed[0], captioned("would apply")),
        ItemResult::for_claim(&claimed[1], captioned("nul\0byte")),
    ];
    let err = service.submit_results(rows).await.unwrap_err();
    assert!(matches!(err, AppError::ReconcileFailed(_)));

    for claim in &claimed {
        let item = service.get_item(claim.id).await.unwrap();
        assert_eq!(item.lease_state, LeaseState::Locked);
        assert!(item.results.is_empty());
    }
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn free_text_answers_are_stored_whole() {
    let (pool, _container) = setup_test_db().await;
    let service = QueueService::new(PgItemStore::new(pool), QueueConfig::default());
    service.enqueue(sample_payloads(1)).await.unwrap();
    let claimed = service.claim_batch(None).await.unwrap();

    let answer = "Yes, there are two people standing on the pier next to the boat.".repeat(4);
    let results = ItemResults {
        human_detected: Some(answer.clone()),
        ..captioned("pier")
    };
    let report = service
        .submit_results(vec![ItemResult::for_claim(&claimed[0], results)])
        .await
        .unwrap();
    assert_eq!(report.status, SubmitStatus::Ok);

    let item = service.get_item(claimed[0].id).await.unwrap();
    assert_eq!(item.results.human_detected.as_deref(), Some(answer.as_str()));
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn resubmit_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let service = QueueService::new(PgItemStore::new(pool), QueueConfig::default());
    service.enqueue(sample_payloads(1)).await.unwrap();
    let claimed = service.claim_batch(None).await.unwrap();

    let rows = vec![ItemResult::new(claimed[0].id, captioned("same"))];
    let first = service.submit_results(rows.clone()).await.unwrap();
    let once = service.get_item(claimed[0].id).await.unwrap();
    let second = service.submit_results(rows).await.unwrap();
    let twice = service.get_item(claimed[0].id).await.unwrap();

    assert_eq!(first.status, SubmitStatus::Ok);
    assert_eq!(second.status, SubmitStatus::Ok);
    assert_eq!(once.results, twice.results);
    assert_eq!(once.lease_state, twice.lease_state);
    assert_eq!(once.lease_epoch, twice.lease_epoch);
}

#[tokio::test]
#[ignore = "requires Docker for the postgres container"]
async fn health_check_and_clock() {
    let (pool, _container) = setup_test_db().await;
    let store = PgItemStore::new(pool);

    store.health_check().await.unwrap();
    let a = store.now().await.unwrap();
    let b = store.now().await.unwrap();
    assert!(b >= a);
}
