//! # Concurrency Stress
//!
//! Many callers add handlers to one key while the router dispatches frames
//! for that key. Checks: no lost registration, no duplicate subscribe
//! frame, and every self-removing handler runs exactly once.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use qc_sdk_websocket::{Handler, NotificationConfig, StatusEvents, StatusInfo};

use super::fixtures::{client, eventually, status_frame};

const ADDERS: usize = 16;
const PER_ADDER: usize = 20;
const FRAMES: usize = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_remove_dispatch() {
    let (client, conn) = client(NotificationConfig::default());
    let client = Arc::new(client);

    // Sentinel keeps the key subscribed and tracks the latest frame seen
    let last_seen = Arc::new(AtomicU64::new(0));
    let sentinel_seen = Arc::clone(&last_seen);
    client
        .add_status_handlers(
            "HOT",
            vec![Handler::from_fn(move |status: &StatusInfo| {
                if let Ok(n) = status.hash.parse::<u64>() {
                    sentinel_seen.store(n, Ordering::SeqCst);
                }
                false
            })],
        )
        .await
        .unwrap();

    let once_calls: Arc<Vec<AtomicUsize>> =
        Arc::new((0..ADDERS * PER_ADDER).map(|_| AtomicUsize::new(0)).collect());
    let latest: Arc<Vec<AtomicU64>> =
        Arc::new((0..ADDERS * PER_ADDER).map(|_| AtomicU64::new(0)).collect());

    let adders: Vec<_> = (0..ADDERS)
        .map(|adder| {
            let client = Arc::clone(&client);
            let once_calls = Arc::clone(&once_calls);
            let latest = Arc::clone(&latest);
            tokio::spawn(async move {
                for i in 0..PER_ADDER {
                    let slot = adder * PER_ADDER + i;
                    let once = Arc::clone(&once_calls);
                    let done = Handler::from_fn(move |_| {
                        once[slot].fetch_add(1, Ordering::SeqCst);
                        true
                    });
                    let seen = Arc::clone(&latest);
                    let keep = Handler::from_fn(move |status: &StatusInfo| {
                        if let Ok(n) = status.hash.parse::<u64>() {
                            seen[slot].fetch_max(n, Ordering::SeqCst);
                        }
                        false
                    });
                    client
                        .add_handlers::<StatusEvents>(Some("HOT"), vec![done, keep])
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let router = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            for n in 1..=FRAMES as u64 {
                client
                    .route_message(status_frame("HOT", &n.to_string(), "Success"))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    for adder in adders {
        adder.await.unwrap();
    }
    router.await.unwrap();

    // One more frame reaches every handler registered by now
    let last = FRAMES as u64 + 1;
    client
        .route_message(status_frame("HOT", &last.to_string(), "Success"))
        .await
        .unwrap();
    eventually(|| last_seen.load(Ordering::SeqCst) == last).await;
    eventually(|| latest.iter().all(|n| n.load(Ordering::SeqCst) == last)).await;
    eventually(|| once_calls.iter().all(|c| c.load(Ordering::SeqCst) >= 1)).await;

    for (slot, calls) in once_calls.iter().enumerate() {
        assert_eq!(calls.load(Ordering::SeqCst), 1, "handler {slot} ran more than once");
    }
    assert_eq!(conn.paths("subscribe"), vec!["status/HOT"]);
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_subscribers_send_one_frame() {
    let (client, conn) = client(NotificationConfig::default());
    let client = Arc::new(client);

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .add_status_handlers("RACE", vec![Handler::from_fn(|_| false)])
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(conn.paths("subscribe"), vec!["status/RACE"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unsubscribe_all_races_dispatch() {
    let (client, conn) = client(NotificationConfig::default());
    let client = Arc::new(client);

    for round in 0..20 {
        client
            .add_status_handlers("FLAP", vec![Handler::from_fn(|_| false)])
            .await
            .unwrap();

        let router = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                for n in 0..10 {
                    client
                        .route_message(status_frame("FLAP", &format!("{round}-{n}"), "Success"))
                        .await
                        .unwrap();
                }
            })
        };
        client
            .unsubscribe_all::<StatusEvents>(Some("FLAP"))
            .await
            .unwrap();
        router.await.unwrap();
    }

    // Every round subscribed once and unsubscribed once
    assert_eq!(conn.paths("subscribe").len(), 20);
    assert_eq!(conn.paths("unsubscribe").len(), 20);
}
