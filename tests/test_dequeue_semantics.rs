//! Receive-then-acknowledge behaviour of `QueueService::dequeue`

mod common;

use common::InMemoryQueue;
use queue_worker::storage::QueueService;
use queue_worker::WorkerError;
use tokio_test::assert_ok;

const QUEUE: &str = "demo1";

#[tokio::test]
async fn test_dequeue_returns_message_and_removes_it() {
    let queue = InMemoryQueue::starting_at(42);
    queue.enqueue(QUEUE, "{}").await.unwrap();

    let message = assert_ok!(queue.dequeue(QUEUE).await).expect("a message");
    assert_eq!(message.id, "42");
    assert_eq!(message.body, "{}");
    assert_eq!(message.dequeue_count, 1);

    assert_eq!(queue.len(QUEUE), 0);
    assert!(queue.peek(QUEUE, 32).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_queue_is_none_without_acknowledge() {
    let queue = InMemoryQueue::new();

    assert!(assert_ok!(queue.dequeue(QUEUE).await).is_none());
    assert_eq!(queue.acknowledgements(), 0);
}

#[tokio::test]
async fn test_acknowledged_message_is_never_redelivered() {
    let queue = InMemoryQueue::new();
    queue.enqueue(QUEUE, "only once").await.unwrap();

    assert!(queue.dequeue(QUEUE).await.unwrap().is_some());
    queue.expire_leases();

    assert!(queue.dequeue(QUEUE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refused_acknowledge_is_delivery_conflict() {
    let queue = InMemoryQueue::starting_at(7);
    queue.enqueue(QUEUE, "payload").await.unwrap();
    queue.refuse_acknowledgements(true);

    match queue.dequeue(QUEUE).await {
        Err(WorkerError::DeliveryConflict {
            message_id, status, ..
        }) => {
            assert_eq!(message_id, "7");
            assert_eq!(status, 500);
        }
        other => panic!("expected a delivery conflict, got {:?}", other),
    }

    // Still stored, hidden only until the lease lapses
    assert_eq!(queue.len(QUEUE), 1);
    assert!(queue.peek(QUEUE, 32).await.unwrap().is_empty());

    queue.expire_leases();
    queue.refuse_acknowledgements(false);

    let peeked = queue.peek(QUEUE, 32).await.unwrap();
    assert_eq!(peeked.len(), 1);
    assert_eq!(peeked[0].id, "7");

    let redelivered = queue.dequeue(QUEUE).await.unwrap().expect("redelivered");
    assert_eq!(redelivered.id, "7");
    assert_eq!(redelivered.dequeue_count, 2);
}

#[tokio::test]
async fn test_stale_receipt_is_rejected() {
    let queue = InMemoryQueue::new();
    queue.enqueue(QUEUE, "payload").await.unwrap();

    let first = queue.receive_one(QUEUE).await.unwrap().expect("leased");
    queue.expire_leases();
    let second = queue.receive_one(QUEUE).await.unwrap().expect("leased again");
    assert_ne!(first.pop_receipt, second.pop_receipt);

    let stale = queue
        .acknowledge(QUEUE, &first.id, &first.pop_receipt)
        .await
        .unwrap();
    assert_eq!(stale.status.as_u16(), 404);

    let fresh = queue
        .acknowledge(QUEUE, &second.id, &second.pop_receipt)
        .await
        .unwrap();
    assert_eq!(fresh.status.as_u16(), 204);
    assert_eq!(queue.len(QUEUE), 0);
}

#[tokio::test]
async fn test_peek_takes_no_lease() {
    let queue = InMemoryQueue::new();
    for text in ["a", "b", "c"] {
        queue.enqueue(QUEUE, text).await.unwrap();
    }

    let peeked = queue.peek(QUEUE, 2).await.unwrap();
    assert_eq!(peeked.len(), 2);
    assert_eq!(peeked[0].body, "a");

    let message = queue.dequeue(QUEUE).await.unwrap().expect("message");
    assert_eq!(message.body, "a");
    assert_eq!(message.dequeue_count, 1);
}
