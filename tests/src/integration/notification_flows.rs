//! # Notification Flows
//!
//! End-to-end scenarios through `NotificationClient`: subscribe frames,
//! dispatch via the router, handler removal, and the unsubscribe protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use qc_sdk_websocket::{
    BlockEvents, ConfirmedAddedEvents, Handler, NotificationConfig, NotificationError,
    StatusEvents, TransactionInfo,
};
use tokio::time::timeout;

use super::fixtures::{block_frame, client, confirmed_frame, eventually, status_frame};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// =============================================================================
// REGISTRY PATH
// =============================================================================

#[tokio::test]
async fn test_status_handler_done_unsubscribes() {
    let (client, conn) = client(NotificationConfig::default());
    let calls = counter();
    let seen = Arc::clone(&calls);

    client
        .add_status_handlers(
            "ADDR1",
            vec![Handler::from_fn(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            })],
        )
        .await
        .unwrap();
    assert_eq!(conn.paths("subscribe"), vec!["status/ADDR1"]);

    client
        .route_message(status_frame("ADDR1", "TX1", "Failure_Core_Insufficient_Balance"))
        .await
        .unwrap();

    eventually(|| conn.paths("unsubscribe").len() == 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(conn.paths("unsubscribe"), vec!["status/ADDR1"]);
    assert_eq!(
        conn.sent().last().cloned(),
        Some(r#"{"uid":"uid-1","unsubscribe":"status/ADDR1"}"#.to_string())
    );
    assert!(client.keys::<StatusEvents>().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_block_handlers_keep_listening() {
    let (client, conn) = client(NotificationConfig::default());
    let calls = counter();
    let handlers = (0..2)
        .map(|_| {
            let seen = Arc::clone(&calls);
            Handler::from_fn(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            })
        })
        .collect();

    client.add_block_handlers(handlers).await.unwrap();
    for height in 1..=3 {
        client.route_message(block_frame(height)).await.unwrap();
    }

    eventually(|| calls.load(Ordering::SeqCst) == 6).await;
    // Let the loop settle before asserting nothing else happens
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(conn.paths("subscribe"), vec!["block"]);
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test]
async fn test_mixed_handlers_only_finished_removed() {
    let (client, conn) = client(NotificationConfig::default());
    let keep_calls = counter();
    let done_calls = counter();
    let keep_seen = Arc::clone(&keep_calls);
    let done_seen = Arc::clone(&done_calls);

    client
        .add_status_handlers(
            "ADDR1",
            vec![
                Handler::from_fn(move |_| {
                    done_seen.fetch_add(1, Ordering::SeqCst);
                    true
                }),
                Handler::from_fn(move |_| {
                    keep_seen.fetch_add(1, Ordering::SeqCst);
                    false
                }),
            ],
        )
        .await
        .unwrap();

    for hash in ["TX1", "TX2"] {
        client
            .route_message(status_frame("ADDR1", hash, "Success"))
            .await
            .unwrap();
    }

    eventually(|| keep_calls.load(Ordering::SeqCst) == 2).await;
    assert_eq!(done_calls.load(Ordering::SeqCst), 1);
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test]
async fn test_frames_routed_by_address() {
    let (client, conn) = client(NotificationConfig::default());
    let heights = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heights);

    client
        .add_confirmed_added_handlers(
            "ALICE",
            vec![Handler::from_fn(move |tx: &TransactionInfo| {
                sink.lock().push(tx.height);
                false
            })],
        )
        .await
        .unwrap();

    client
        .route_message(confirmed_frame("BOB", "TXB", 10))
        .await
        .unwrap();
    client
        .route_message(confirmed_frame("ALICE", "TXA", 11))
        .await
        .unwrap();

    eventually(|| !heights.lock().is_empty()).await;
    assert_eq!(heights.lock().clone(), vec![Some(11)]);
    assert_eq!(conn.paths("subscribe"), vec!["confirmedAdded/ALICE"]);
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test]
async fn test_resubscribe_after_unsubscribe() {
    let (client, conn) = client(NotificationConfig::default());
    client
        .add_status_handlers("ADDR1", vec![Handler::from_fn(|_| true)])
        .await
        .unwrap();
    client
        .route_message(status_frame("ADDR1", "TX1", "Success"))
        .await
        .unwrap();
    eventually(|| conn.paths("unsubscribe").len() == 1).await;

    client
        .add_status_handlers("ADDR1", vec![Handler::from_fn(|_| false)])
        .await
        .unwrap();
    assert_eq!(conn.paths("subscribe"), vec!["status/ADDR1", "status/ADDR1"]);
}

// =============================================================================
// FAILURE ISOLATION
// =============================================================================

#[tokio::test]
async fn test_decode_failure_drops_frame_only() {
    let (client, conn) = client(NotificationConfig::default());
    let mut errors = client.take_error_receiver().unwrap();
    let calls = counter();
    let seen = Arc::clone(&calls);

    client
        .add_status_handlers(
            "ADDR1",
            vec![Handler::from_fn(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            })],
        )
        .await
        .unwrap();

    // Routable, but the status body is missing
    client
        .route_message(r#"{"meta":{"channelName":"status","address":"ADDR1"}}"#)
        .await
        .unwrap();
    client
        .route_message(status_frame("ADDR1", "TX2", "Success"))
        .await
        .unwrap();

    let reported = timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reported, NotificationError::Dispatch(_)));

    eventually(|| calls.load(Ordering::SeqCst) == 1).await;
    assert!(conn.paths("unsubscribe").is_empty());
    assert_eq!(client.keys::<StatusEvents>().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_siblings() {
    let (client, conn) = client(NotificationConfig::default());
    let calls = counter();
    let seen = Arc::clone(&calls);

    client
        .add_block_handlers(vec![
            Handler::from_fn(|_| -> bool { panic!("handler bug") }),
            Handler::from_fn(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            }),
        ])
        .await
        .unwrap();

    for height in 1..=2 {
        client.route_message(block_frame(height)).await.unwrap();
    }

    eventually(|| calls.load(Ordering::SeqCst) == 2).await;
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test]
async fn test_unknown_channel_is_not_an_error() {
    let (client, conn) = client(NotificationConfig::default());
    let mut errors = client.take_error_receiver().unwrap();

    client
        .route_message(r#"{"meta":{"channelName":"cosignature","address":"A"}}"#)
        .await
        .unwrap();
    client.close().await.unwrap();

    assert!(errors.try_recv().is_err());
    assert!(conn.sent().is_empty());
    assert!(conn.is_closed());
}

// =============================================================================
// POOL PATH
// =============================================================================

#[tokio::test]
async fn test_streams_end_subscription_when_dropped() {
    let (client, conn) = client(NotificationConfig::default());
    let mut stream = client.stream::<BlockEvents>(None).await.unwrap();

    client.route_message(block_frame(1)).await.unwrap();
    let block = timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(block.height, 1);
    assert_eq!(block.hash, "H1");

    drop(stream);
    client.route_message(block_frame(2)).await.unwrap();

    eventually(|| conn.paths("unsubscribe") == vec!["block".to_string()]).await;
    assert_eq!(conn.paths("subscribe"), vec!["block"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_stream_evicted_without_blocking_others() {
    let (client, conn) = client(NotificationConfig {
        stream_capacity: 1,
        ..Default::default()
    });
    let mut slow = client.stream::<BlockEvents>(None).await.unwrap();
    let mut fast = client.stream::<BlockEvents>(None).await.unwrap();

    client.route_message(block_frame(1)).await.unwrap();
    client.route_message(block_frame(2)).await.unwrap();

    let started = tokio::time::Instant::now();
    assert_eq!(fast.recv().await.unwrap().height, 1);
    assert_eq!(fast.recv().await.unwrap().height, 2);
    assert!(started.elapsed() < Duration::from_secs(30));

    // Frame 3 waits for frame 2's dispatch, which ends when `slow` is evicted
    client.route_message(block_frame(3)).await.unwrap();
    assert_eq!(fast.recv().await.unwrap().height, 3);
    assert!(started.elapsed() >= Duration::from_secs(30));

    // The evicted stream drains its buffer, then ends
    assert_eq!(slow.recv().await.unwrap().height, 1);
    assert!(slow.recv().await.is_none());
    assert!(conn.paths("unsubscribe").is_empty());
}

#[tokio::test]
async fn test_unsubscribe_all_closes_streams_and_handlers() {
    let (client, conn) = client(NotificationConfig::default());
    let mut stream = client
        .stream::<ConfirmedAddedEvents>(Some("ALICE"))
        .await
        .unwrap();
    client
        .add_confirmed_added_handlers("ALICE", vec![Handler::from_fn(|_| false)])
        .await
        .unwrap();

    assert!(client
        .unsubscribe_all::<ConfirmedAddedEvents>(Some("ALICE"))
        .await
        .unwrap());
    assert!(timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap()
        .is_none());
    assert_eq!(conn.paths("subscribe"), vec!["confirmedAdded/ALICE"]);
    assert_eq!(conn.paths("unsubscribe"), vec!["confirmedAdded/ALICE"]);
}
