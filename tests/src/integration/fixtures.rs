//! Shared fixtures: a recording connection and inbound frame builders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use qc_sdk_websocket::{Connection, NotificationClient, NotificationConfig, TransportError};
use serde_json::{json, Value};

/// In-memory connection that records every outbound control frame.
#[derive(Default)]
pub struct MockConnection {
    sent: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every frame sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// Paths of sent frames carrying `action` (`subscribe` / `unsubscribe`).
    pub fn paths(&self, action: &str) -> Vec<String> {
        self.sent_json()
            .iter()
            .filter_map(|frame| frame.get(action).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Client wired over a fresh [`MockConnection`] with session uid `uid-1`.
pub fn client(config: NotificationConfig) -> (NotificationClient, Arc<MockConnection>) {
    quantum_telemetry::init_test_logging();
    let conn = MockConnection::new();
    let client = NotificationClient::with_connection(conn.clone(), "uid-1", config)
        .unwrap_or_else(|e| panic!("client construction failed: {e}"));
    (client, conn)
}

/// Poll `condition` until it holds, failing after five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn block_frame(height: u64) -> String {
    json!({
        "block": {
            "signer": "HARVESTER",
            "height": height.to_string(),
            "timestamp": "1000",
            "difficulty": "100000000000000",
            "previousBlockHash": format!("H{}", height.saturating_sub(1)),
        },
        "meta": {
            "hash": format!("H{height}"),
            "generationHash": "GEN",
            "numTransactions": 0,
        }
    })
    .to_string()
}

pub fn status_frame(address: &str, hash: &str, status: &str) -> String {
    json!({
        "meta": { "channelName": "status", "address": address },
        "hash": hash,
        "status": status,
        "deadline": "1",
    })
    .to_string()
}

pub fn confirmed_frame(address: &str, hash: &str, height: u64) -> String {
    json!({
        "meta": {
            "channelName": "confirmedAdded",
            "address": address,
            "hash": hash,
            "height": height.to_string(),
        },
        "transaction": {
            "signer": "SIGNER",
            "type": 16724,
            "version": 1,
            "deadline": "1",
        }
    })
    .to_string()
}
