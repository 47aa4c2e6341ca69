//! Message publisher: the only writer of the shared connection.
//!
//! Besides the write guard, the publisher hands out per-path gates. A caller
//! holds the gate of a path across "change the registry, then send the control
//! frame", so a subscribe and an unsubscribe for one path never cross on the wire.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error};

use crate::domain::{ControlFrame, NotificationError, Path, TransportError};
use crate::ports::Connection;

/// Serializes subscribe/unsubscribe control frames onto the connection.
///
/// Writes are taken under one guard so concurrent callers never interleave
/// frames. Failures go back to the caller; nothing is retried here.
pub struct MessagePublisher {
    connection: Arc<dyn Connection>,
    write_guard: Mutex<()>,
    gates: Arc<PathGates>,
}

type PathGates = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive hold on one path's subscription state.
///
/// The gate entry is dropped with the last guard or waiter.
pub struct PathGuard {
    guard: Option<OwnedMutexGuard<()>>,
    gates: Arc<PathGates>,
    key: String,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gates
            .remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}

impl MessagePublisher {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            write_guard: Mutex::new(()),
            gates: Arc::new(DashMap::new()),
        }
    }

    /// Wait for the gate of `path`.
    pub async fn lock_path(&self, path: &Path) -> PathGuard {
        let key = path.canonical().to_string();
        let gate = Arc::clone(
            self.gates
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        PathGuard {
            guard: Some(gate.lock_owned().await),
            gates: Arc::clone(&self.gates),
            key,
        }
    }

    /// Send `{"uid": uid, "subscribe": path}`.
    pub async fn publish_subscribe(&self, uid: &str, path: &Path) -> Result<(), NotificationError> {
        self.publish(ControlFrame::subscribe(uid, path)).await
    }

    /// Send `{"uid": uid, "unsubscribe": path}`.
    pub async fn publish_unsubscribe(
        &self,
        uid: &str,
        path: &Path,
    ) -> Result<(), NotificationError> {
        self.publish(ControlFrame::unsubscribe(uid, path)).await
    }

    async fn publish(&self, frame: ControlFrame) -> Result<(), NotificationError> {
        let text = frame.to_text()?;

        let _guard = self.write_guard.lock().await;
        if let Err(e) = self.connection.send_text(text).await {
            error!(uid = %frame.uid, error = %e, "Failed to write control frame");
            return Err(e.into());
        }

        debug!(
            uid = %frame.uid,
            subscribe = ?frame.subscribe,
            unsubscribe = ?frame.unsubscribe,
            "Control frame sent"
        );
        Ok(())
    }

    /// Close the underlying connection once pending writes finish.
    pub async fn close(&self) -> Result<(), TransportError> {
        let _guard = self.write_guard.lock().await;
        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    #[derive(Default)]
    struct RecordingConnection {
        sent: SyncMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn send_text(&self, text: String) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::ConnectionClosed);
            }
            // Yield mid-write so unguarded writers would interleave
            tokio::task::yield_now().await;
            self.sent.lock().push(text);
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe_frames() {
        let conn = Arc::new(RecordingConnection::default());
        let publisher = MessagePublisher::new(conn.clone());
        let path = Path::parse("status", Some("ADDR1"));

        publisher.publish_subscribe("uid-1", &path).await.unwrap();
        publisher.publish_unsubscribe("uid-1", &path).await.unwrap();

        let sent = conn.sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                r#"{"uid":"uid-1","subscribe":"status/ADDR1"}"#.to_string(),
                r#"{"uid":"uid-1","unsubscribe":"status/ADDR1"}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let conn = Arc::new(RecordingConnection {
            fail: true,
            ..Default::default()
        });
        let publisher = MessagePublisher::new(conn);

        let result = publisher
            .publish_subscribe("uid-1", &Path::parse("block", None))
            .await;
        assert!(matches!(
            result,
            Err(NotificationError::Transport(TransportError::ConnectionClosed))
        ));
    }

    #[tokio::test]
    async fn test_path_gate_is_exclusive_per_path() {
        let publisher = Arc::new(MessagePublisher::new(Arc::new(
            RecordingConnection::default(),
        )));
        let a = Path::parse("status", Some("A"));

        let held = publisher.lock_path(&a).await;
        let waiter = {
            let publisher = Arc::clone(&publisher);
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = publisher.lock_path(&a).await;
            })
        };
        // Other paths are not blocked
        let _b = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            publisher.lock_path(&Path::parse("status", Some("B"))),
        )
        .await
        .unwrap();

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!publisher.gates.contains_key("status/A"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_send_whole_frames() {
        let conn = Arc::new(RecordingConnection::default());
        let publisher = Arc::new(MessagePublisher::new(conn.clone()));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let publisher = Arc::clone(&publisher);
                tokio::spawn(async move {
                    let path = Path::parse("status", Some(&format!("A{i}")));
                    publisher.publish_subscribe("uid", &path).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let sent = conn.sent.lock().clone();
        assert_eq!(sent.len(), 20);
        for frame in sent {
            let parsed: ControlFrame = serde_json::from_str(&frame).unwrap();
            assert_eq!(parsed.uid, "uid");
            assert!(parsed.subscribe.unwrap().starts_with("status/A"));
        }
    }
}
