//! End-to-end event propagation: issuer publish through verifier apply.

use attesta_broker::Broker;
use attesta_core::store::RecordStore;
use attesta_integration_tests::{sample_credential, Pipeline};
use attesta_pipeline::{keys, ApplyOutcome};

#[tokio::test]
async fn test_published_event_applies_on_the_other_side() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    pipeline.publisher.publish(sample_credential("cred-1")).await;

    let raw = rx.recv().await.unwrap();
    let outcome = pipeline.subscriber.handle_message(&raw).await;
    assert_eq!(outcome, ApplyOutcome::Applied);

    let stored = pipeline.store.get_by_id("cred-1").await.unwrap();
    assert_eq!(stored.unwrap().holder_name, "Alice Santos");

    let syncs = pipeline.subscriber.recent_syncs(10).await.unwrap();
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0].credential_id, "cred-1");
}

#[tokio::test]
async fn test_duplicate_delivery_applies_once() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let raw = rx.recv().await.unwrap();

    assert_eq!(
        pipeline.subscriber.handle_message(&raw).await,
        ApplyOutcome::Applied
    );
    // At-least-once delivery: the same message arrives again.
    assert_eq!(
        pipeline.subscriber.handle_message(&raw).await,
        ApplyOutcome::Duplicate
    );

    let metrics = pipeline.subscriber.metrics().await;
    assert_eq!(metrics.processed_success, 1);
    assert_eq!(pipeline.subscriber.recent_syncs(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_backstop_catches_fresh_event_id() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    // Two publications of the same credential get distinct event ids, so the
    // dedup cache cannot catch the second one.
    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let first = rx.recv().await.unwrap();
    assert_eq!(
        pipeline.subscriber.handle_message(&first).await,
        ApplyOutcome::Applied
    );

    pipeline.clock.advance(std::time::Duration::from_secs(1));
    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let second = rx.recv().await.unwrap();
    assert_ne!(first, second);
    assert_eq!(
        pipeline.subscriber.handle_message(&second).await,
        ApplyOutcome::AlreadySynced
    );

    // Both deliveries count as processed, but only one sync record exists.
    assert_eq!(pipeline.subscriber.metrics().await.processed_success, 2);
    assert_eq!(pipeline.subscriber.recent_syncs(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_counters_on_both_sides() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    for i in 0..3 {
        pipeline
            .publisher
            .publish(sample_credential(&format!("cred-{}", i)))
            .await;
        let raw = rx.recv().await.unwrap();
        pipeline.subscriber.handle_message(&raw).await;
    }

    assert_eq!(pipeline.publisher.metrics().await.published, 3);
    assert_eq!(pipeline.subscriber.metrics().await.processed_success, 3);

    // Counters are mirrored per-day in the broker.
    assert_eq!(
        pipeline
            .broker
            .get("metrics:events:published:2026-08-27")
            .await
            .unwrap(),
        Some("3".to_string())
    );
    assert_eq!(
        pipeline.broker.get("metrics:events:total").await.unwrap(),
        Some("3".to_string())
    );
}
