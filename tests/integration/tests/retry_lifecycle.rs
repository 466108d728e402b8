//! Publisher retry, dead-letter, and reprocess behavior under broker outages.

use std::time::Duration;

use attesta_broker::Broker;
use attesta_core::store::RecordStore;
use attesta_core::{CredentialEvent, DeadLetterEntry};
use attesta_integration_tests::{sample_credential, Pipeline};
use attesta_pipeline::{keys, ApplyOutcome, Clock};

#[tokio::test]
async fn test_event_survives_transient_outage() {
    let pipeline = Pipeline::new();
    pipeline.broker.fail_publishes(true);

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    assert_eq!(pipeline.publisher.metrics().await.failed, 1);
    assert_eq!(
        pipeline.broker.scored_len(keys::RETRY_QUEUE).await.unwrap(),
        1
    );

    // One more failed attempt while the broker is still down.
    pipeline.clock.advance(Duration::from_secs(1));
    pipeline.publisher.scan_once().await.unwrap();
    assert_eq!(
        pipeline.broker.scored_len(keys::RETRY_QUEUE).await.unwrap(),
        1
    );

    // Broker recovers; the next due scan delivers the event.
    pipeline.broker.fail_publishes(false);
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();
    pipeline.clock.advance(Duration::from_secs(2));
    pipeline.publisher.scan_once().await.unwrap();

    let raw = rx.recv().await.unwrap();
    let event: CredentialEvent = serde_json::from_str(&raw).unwrap();
    assert_eq!(event.retry_count, 2);
    assert_eq!(event.credential.id, "cred-1");

    assert_eq!(
        pipeline.subscriber.handle_message(&raw).await,
        ApplyOutcome::Applied
    );
    assert!(pipeline.store.get_by_id("cred-1").await.unwrap().is_some());

    assert_eq!(
        pipeline.broker.scored_len(keys::RETRY_QUEUE).await.unwrap(),
        0
    );
    assert_eq!(pipeline.publisher.metrics().await.retried, 1);
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let pipeline = Pipeline::new();
    pipeline.broker.fail_publishes(true);

    pipeline.publisher.publish(sample_credential("cred-1")).await;

    // First retry entry is due one second after the initial failure.
    let t0 = pipeline.clock.now_millis();
    assert!(pipeline
        .broker
        .range_by_score(keys::RETRY_QUEUE, t0 + 999, 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        pipeline
            .broker
            .range_by_score(keys::RETRY_QUEUE, t0 + 1_000, 10)
            .await
            .unwrap()
            .len(),
        1
    );

    // After the failed retry, the successor waits two seconds.
    pipeline.clock.advance(Duration::from_secs(1));
    pipeline.publisher.scan_once().await.unwrap();
    let t1 = pipeline.clock.now_millis();
    assert!(pipeline
        .broker
        .range_by_score(keys::RETRY_QUEUE, t1 + 1_999, 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        pipeline
            .broker
            .range_by_score(keys::RETRY_QUEUE, t1 + 2_000, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_exhausted_event_dead_letters_then_reprocesses() {
    let pipeline = Pipeline::new();
    pipeline.broker.fail_publishes(true);

    pipeline.publisher.publish(sample_credential("cred-1")).await;
    for _ in 0..5 {
        pipeline.clock.advance(Duration::from_secs(60));
        pipeline.publisher.scan_once().await.unwrap();
    }

    assert_eq!(
        pipeline.broker.scored_len(keys::RETRY_QUEUE).await.unwrap(),
        0
    );
    let entries = pipeline.broker.list_range(keys::DEAD_LETTER).await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry: DeadLetterEntry = serde_json::from_str(&entries[0]).unwrap();
    assert_eq!(entry.reason, "MAX_RETRIES_EXCEEDED");
    assert_eq!(entry.event.retry_count, 5);
    assert_eq!(pipeline.publisher.metrics().await.dead_lettered, 1);

    // Operator fixes the broker and replays the dead letter.
    pipeline.broker.fail_publishes(false);
    let mut rx = pipeline.broker.subscribe(keys::EVENT_CHANNEL).await.unwrap();
    assert_eq!(pipeline.publisher.reprocess_dead_letter().await, 1);

    let raw = rx.recv().await.unwrap();
    let event: CredentialEvent = serde_json::from_str(&raw).unwrap();
    assert_eq!(event.retry_count, 0);

    assert_eq!(
        pipeline.subscriber.handle_message(&raw).await,
        ApplyOutcome::Applied
    );
    assert!(pipeline.store.get_by_id("cred-1").await.unwrap().is_some());
    assert_eq!(pipeline.broker.list_len(keys::DEAD_LETTER).await.unwrap(), 0);
}
