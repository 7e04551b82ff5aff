//! Integration tests for request deduplication
//!
//! These tests verify:
//! - One execution per burst of identical requests
//! - Shared success and shared failure
//! - Fresh attempt after a settled request
//! - Cancellation by request and by endpoint
//! - Statistics

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_test::{assert_pending, assert_ready_eq, task};
use zantara_cache::{RequestDeduplicator, RequestParams, TransportError};

type Dedup = RequestDeduplicator<Value, TransportError>;

#[tokio::test]
async fn test_burst_shares_one_success() {
    let dedup = Dedup::default();
    let count = Arc::new(AtomicUsize::new(0));
    let params = RequestParams::new().with("x", 1);

    let calls: Vec<_> = (0..10)
        .map(|_| {
            let count = count.clone();
            dedup.deduplicate("team.list", &params, move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(json!({"members": 4}))
            })
        })
        .collect();

    let results = futures::future::join_all(calls).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| r == &Ok(json!({"members": 4}))));
    assert_eq!(dedup.pending_count(), 0);
}

#[tokio::test]
async fn test_burst_shares_one_failure_then_retries() {
    let dedup = Dedup::default();
    let count = Arc::new(AtomicUsize::new(0));
    let params = RequestParams::new();
    let failure = TransportError::Status {
        status: 503,
        message: "Service Unavailable".to_string(),
    };

    let make = |count: Arc<AtomicUsize>, result: Result<Value, TransportError>| {
        move || async move {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            result
        }
    };

    let first = dedup.deduplicate("team.list", &params, make(count.clone(), Err(failure.clone())));
    let second = dedup.deduplicate("team.list", &params, make(count.clone(), Ok(json!("unused"))));
    let (a, b) = tokio::join!(first, second);

    assert_eq!(a, Err(failure.clone()));
    assert_eq!(b, Err(failure));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!dedup.is_pending("team.list", &params));

    // Settled, so the next call is a fresh attempt
    let retry = dedup
        .deduplicate("team.list", &params, make(count.clone(), Ok(json!("fresh"))))
        .await;
    assert_eq!(retry, Ok(json!("fresh")));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_waiters_see_result_in_order_of_release() {
    let dedup = Dedup::default();
    let params = RequestParams::new();
    let (tx, rx) = oneshot::channel::<Value>();

    let mut first = task::spawn(dedup.deduplicate("team.get", &params, move || async move {
        rx.await.map_err(|e| TransportError::Network(e.to_string()))
    }));
    let mut second = task::spawn(dedup.deduplicate("team.get", &params, || async {
        Ok(json!("never runs"))
    }));

    assert_pending!(first.poll());
    assert_pending!(second.poll());
    assert!(dedup.is_pending("team.get", &params));

    tx.send(json!({"id": 1})).unwrap();

    assert!(first.is_woken());
    assert_ready_eq!(first.poll(), Ok(json!({"id": 1})));
    assert_ready_eq!(second.poll(), Ok(json!({"id": 1})));
    assert!(!dedup.is_pending("team.get", &params));
}

#[tokio::test]
async fn test_cancel_single_request() {
    let dedup = Dedup::default();
    let first = RequestParams::new().with("id", 1);
    let second = RequestParams::new().with("id", 2);
    let (_tx, rx) = oneshot::channel::<()>();
    let (_tx2, rx2) = oneshot::channel::<()>();

    let _a = dedup.deduplicate("team.get", &first, move || async move {
        let _ = rx.await;
        Ok(json!(1))
    });
    let _b = dedup.deduplicate("team.get", &second, move || async move {
        let _ = rx2.await;
        Ok(json!(2))
    });

    assert_eq!(dedup.cancel("team.get", Some(&first)), 1);
    assert_eq!(dedup.cancel("team.get", Some(&first)), 0);
    assert!(dedup.is_pending("team.get", &second));
}

#[tokio::test]
async fn test_cancel_by_endpoint_keeps_unrelated_keys() {
    let dedup = Dedup::default();
    let (_tx, rx) = oneshot::channel::<()>();
    let rx = futures::FutureExt::shared(rx);

    let mut handles = Vec::new();
    for (endpoint, id) in [("team.get", 1), ("team.get", 2), ("team.list", 0), ("team", 0)] {
        let rx = rx.clone();
        handles.push(dedup.deduplicate(endpoint, &RequestParams::new().with("id", id), move || async move {
            let _ = rx.await;
            Ok(json!(id))
        }));
    }
    assert_eq!(dedup.pending_count(), 4);

    assert_eq!(dedup.cancel("team.get", None), 2);
    assert_eq!(dedup.pending_count(), 2);
    assert!(dedup.is_pending("team.list", &RequestParams::new().with("id", 0)));
    assert!(dedup.is_pending("team", &RequestParams::new().with("id", 0)));
}

#[tokio::test]
async fn test_cancelled_request_still_delivers_and_next_call_is_fresh() {
    let dedup = Dedup::default();
    let params = RequestParams::new();
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel::<()>();

    let counter = count.clone();
    let original = dedup.deduplicate("memory.list", &params, move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = rx.await;
        Ok(json!("original"))
    });
    let mut original = task::spawn(original);
    assert_pending!(original.poll());

    assert_eq!(dedup.cancel("memory.list", None), 1);

    let counter = count.clone();
    let fresh = dedup
        .deduplicate("memory.list", &params, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!("fresh"))
        })
        .await;
    assert_eq!(fresh, Ok(json!("fresh")));

    tx.send(()).unwrap();
    assert_ready_eq!(original.poll(), Ok(json!("original")));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clear_and_stats() {
    let dedup = Dedup::default();
    let (_tx, rx) = oneshot::channel::<()>();
    let rx = futures::FutureExt::shared(rx);

    let params = RequestParams::new();
    let mut calls = Vec::new();
    for _ in 0..4 {
        let rx = rx.clone();
        calls.push(dedup.deduplicate("dashboard.main", &params, move || async move {
            let _ = rx.await;
            Ok(json!(null))
        }));
    }

    let stats = dedup.stats();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.unique_requests, 1);
    assert_eq!(stats.deduplicated_requests, 3);
    assert_eq!(stats.deduplication_rate, 75.0);
    assert_eq!(stats.pending_requests, vec!["dashboard.main:{}".to_string()]);

    assert_eq!(dedup.clear(), 1);
    assert_eq!(dedup.pending_count(), 0);
    assert_eq!(dedup.stats().total_requests, 4);
}
