//! Subscriber-side failure capture and replay.

use attesta_broker::Broker;
use attesta_core::store::RecordStore;
use attesta_integration_tests::{sample_credential, Pipeline};
use attesta_pipeline::{keys, ApplyOutcome};

#[tokio::test]
async fn test_store_outage_captures_then_replays() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let raw = rx.recv().await.unwrap();

    // The verifier's store is down when the event arrives.
    pipeline.store.fail_writes(true);
    assert_eq!(
        pipeline.subscriber.handle_message(&raw).await,
        ApplyOutcome::Failed
    );

    let failed = pipeline.subscriber.failed_events().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].message, raw);
    assert_eq!(failed[0].error.name, "StoreError");
    assert_eq!(pipeline.subscriber.metrics().await.processed_failed, 1);
    assert!(pipeline.store.get_by_id("cred-1").await.unwrap().is_none());

    // Store recovers; replay drains the list and applies the event.
    pipeline.store.fail_writes(false);
    assert_eq!(pipeline.subscriber.reprocess_failed_events().await, 1);
    assert!(pipeline.store.get_by_id("cred-1").await.unwrap().is_some());
    assert!(pipeline.subscriber.failed_events().await.unwrap().is_empty());
    assert_eq!(pipeline.subscriber.metrics().await.processed_success, 1);
}

#[tokio::test]
async fn test_unparseable_message_kept_verbatim() {
    let pipeline = Pipeline::new();

    assert_eq!(
        pipeline.subscriber.handle_message("{broken json").await,
        ApplyOutcome::Failed
    );

    let failed = pipeline.subscriber.failed_events().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].message, "{broken json");
    assert_eq!(failed[0].error.name, "ParseError");
    assert_eq!(
        failed[0].retry_at - failed[0].timestamp,
        chrono::Duration::seconds(30)
    );
}

#[tokio::test]
async fn test_replay_of_still_failing_event_is_recaptured() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let raw = rx.recv().await.unwrap();

    pipeline.store.fail_writes(true);
    pipeline.subscriber.handle_message(&raw).await;

    // Store is still down during the replay: nothing consumed, the event is
    // captured again instead of being lost.
    assert_eq!(pipeline.subscriber.reprocess_failed_events().await, 0);
    let failed = pipeline.subscriber.failed_events().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].message, raw);
}

#[tokio::test]
async fn test_mixed_replay_consumes_good_and_recaptures_bad() {
    let pipeline = Pipeline::new();
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    let good = rx.recv().await.unwrap();

    pipeline.store.fail_writes(true);
    pipeline.subscriber.handle_message(&good).await;
    pipeline.subscriber.handle_message("{never parses").await;
    assert_eq!(pipeline.subscriber.failed_events().await.unwrap().len(), 2);

    pipeline.store.fail_writes(false);
    // The stored event applies; the garbage message fails again.
    assert_eq!(pipeline.subscriber.reprocess_failed_events().await, 1);
    assert!(pipeline.store.get_by_id("cred-1").await.unwrap().is_some());

    let failed = pipeline.subscriber.failed_events().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].message, "{never parses");
}
