//! Scenario-level integration tests, driving a real `Broker` over a real
//! tokio runtime exactly as an external caller would.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use ubroker::{Broker, BrokerConfig, BrokerError};

fn broker_with_ttl(ttl: Duration) -> Broker {
    Broker::new(BrokerConfig::new(ttl))
}

fn no_cancel() -> CancellationToken {
    CancellationToken::new()
}

/// S1: publish, deliver, acknowledge settles the delivery for good.
#[tokio::test]
async fn s1_publish_deliver_ack() {
    let broker = broker_with_ttl(Duration::from_millis(100));
    broker.publish(b"payload".to_vec(), no_cancel()).await.unwrap();

    let stream = broker.delivery(no_cancel()).await.unwrap();
    let delivery = stream.recv().await.unwrap();
    assert_eq!(delivery.message, b"payload");

    broker.acknowledge(delivery.id, no_cancel()).await.unwrap();

    // Acknowledging twice fails: the id has already settled.
    let err = broker.acknowledge(delivery.id, no_cancel()).await.unwrap_err();
    assert_eq!(err, BrokerError::InvalidId { id: delivery.id });
}

/// S2: a delivery nobody settles reappears automatically once its TTL elapses.
#[tokio::test(start_paused = true)]
async fn s2_ttl_auto_requeue() {
    let broker = broker_with_ttl(Duration::from_millis(100));
    broker.publish(b"slow".to_vec(), no_cancel()).await.unwrap();

    let stream = broker.delivery(no_cancel()).await.unwrap();
    let first = stream.recv().await.unwrap();

    tokio::time::advance(Duration::from_millis(150)).await;

    let second = stream.recv().await.unwrap();
    assert_eq!(second.message, first.message);
    assert!(second.id > first.id, "re-queue must assign a fresh, larger id");

    // The original id is gone: it is neither in-flight nor requeueable.
    let err = broker.acknowledge(first.id, no_cancel()).await.unwrap_err();
    assert_eq!(err, BrokerError::InvalidId { id: first.id });
}

/// S3: a caller can re-queue a delivery explicitly, ahead of its TTL.
#[tokio::test]
async fn s3_manual_requeue() {
    let broker = broker_with_ttl(Duration::from_secs(60));
    broker.publish(b"retry-me".to_vec(), no_cancel()).await.unwrap();

    let stream = broker.delivery(no_cancel()).await.unwrap();
    let first = stream.recv().await.unwrap();

    broker.requeue(first.id, no_cancel()).await.unwrap();

    let second = stream.recv().await.unwrap();
    assert_eq!(second.message, first.message);
    assert!(second.id > first.id);
}

/// S4: deliveries are handed out in FIFO order of publish.
#[tokio::test]
async fn s4_ordering() {
    let broker = broker_with_ttl(Duration::from_secs(60));
    for payload in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
        broker.publish(payload, no_cancel()).await.unwrap();
    }

    let stream = broker.delivery(no_cancel()).await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(stream.recv().await.unwrap().message);
    }
    assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

/// S5: after close, every non-close operation fails with `Closed`, and the
/// outbound stream observes end-of-stream. Close is idempotent.
#[tokio::test]
async fn s5_close_semantics() {
    let broker = broker_with_ttl(Duration::from_secs(60));
    broker.publish(b"orphan".to_vec(), no_cancel()).await.unwrap();
    let stream = broker.delivery(no_cancel()).await.unwrap();

    broker.close(no_cancel()).await.unwrap();
    // Closing again is a no-op success, not an error.
    broker.close(no_cancel()).await.unwrap();

    assert_eq!(
        broker.publish(b"too-late".to_vec(), no_cancel()).await.unwrap_err(),
        BrokerError::Closed
    );
    assert_eq!(broker.acknowledge(0, no_cancel()).await.unwrap_err(), BrokerError::Closed);
    assert_eq!(broker.requeue(0, no_cancel()).await.unwrap_err(), BrokerError::Closed);
    assert_eq!(broker.delivery(no_cancel()).await.unwrap_err(), BrokerError::Closed);

    assert!(stream.recv().await.is_none(), "consumer must observe end-of-stream");
}

/// S6: acknowledging a delivery right as its TTL-driven re-queue fires is a
/// race the broker resolves without double-counting: whichever settles first
/// wins, and the loser sees `InvalidId`.
#[tokio::test(start_paused = true)]
async fn s6_requeue_after_ack_race() {
    let broker = broker_with_ttl(Duration::from_millis(50));
    broker.publish(b"contested".to_vec(), no_cancel()).await.unwrap();

    let stream = broker.delivery(no_cancel()).await.unwrap();
    let delivery = stream.recv().await.unwrap();

    broker.acknowledge(delivery.id, no_cancel()).await.unwrap();

    tokio::time::advance(Duration::from_millis(100)).await;
    tokio::task::yield_now().await;

    // The delivery settled before its TTL fired: nothing reappears.
    assert_eq!(
        broker.acknowledge(delivery.id, no_cancel()).await.unwrap_err(),
        BrokerError::InvalidId { id: delivery.id }
    );
}

/// Invariant 7: a pre-cancelled token fails fast and touches no state.
#[tokio::test]
async fn cancelled_token_short_circuits() {
    let broker = broker_with_ttl(Duration::from_secs(60));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = broker.publish(b"never".to_vec(), cancel).await.unwrap_err();
    assert_eq!(err, BrokerError::Cancelled);

    // State is untouched: a fresh publish still gets id 0.
    let delivery_id_zero = broker.publish(b"first".to_vec(), no_cancel()).await;
    assert!(delivery_id_zero.is_ok());
    let stream = broker.delivery(no_cancel()).await.unwrap();
    assert_eq!(stream.recv().await.unwrap().id, 0);
}

/// Invariant 6: acknowledge/re-queue on an unknown id is rejected, not a panic.
#[tokio::test]
async fn unknown_id_is_invalid() {
    let broker = broker_with_ttl(Duration::from_secs(60));
    assert_eq!(
        broker.acknowledge(42, no_cancel()).await.unwrap_err(),
        BrokerError::InvalidId { id: 42 }
    );
    assert_eq!(
        broker.requeue(42, no_cancel()).await.unwrap_err(),
        BrokerError::InvalidId { id: 42 }
    );
}
