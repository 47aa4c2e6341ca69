//! Message router: sequential consumer of inbound frames.
//!
//! ```text
//! route_message ──► [bounded queue] ──► loop ──► TopicHandlerTable ──► binding.handle
//!                                         │                              │
//!                                         │      false (no handlers) ◄───┘
//!                                         └──► MessagePublisher::publish_unsubscribe
//! ```
//!
//! Frames are processed one at a time in arrival order. Only the handler
//! fan-out inside a binding is concurrent.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::domain::{NotificationConfig, NotificationError, RouterError, RoutingMetadata};
use crate::ws::publisher::MessagePublisher;
use crate::ws::topic::TopicHandlerTable;

/// State shared by the router handle and its loop.
struct RouterContext {
    table: Arc<TopicHandlerTable>,
    publisher: Arc<MessagePublisher>,
    uid: RwLock<String>,
    errors: Option<mpsc::Sender<NotificationError>>,
}

impl RouterContext {
    fn report(&self, error: NotificationError) {
        if let Some(errors) = &self.errors {
            if errors.try_send(error).is_err() {
                trace!("Error reporter full or closed, report dropped");
            }
        }
    }

    async fn dispatch(&self, frame: Vec<u8>) {
        let meta = match RoutingMetadata::parse(&frame) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, "Dropping frame without routing metadata");
                self.report(e.into());
                return;
            }
        };

        let Some(binding) = self.table.get_handler(&meta.channel_name) else {
            debug!(channel = %meta.channel_name, "No topic handler bound, frame dropped");
            return;
        };

        match binding.handle(&meta, &frame).await {
            Ok(true) => {}
            Ok(false) => {
                let path = binding.format_path(&meta);
                let _gate = self.publisher.lock_path(&path).await;
                if binding.is_subscribed(&path).await {
                    debug!(path = %path, "Path resubscribed meanwhile, keeping it");
                    return;
                }
                let uid = self.uid.read().clone();
                debug!(path = %path, "No handlers remain, unsubscribing");
                if let Err(e) = self.publisher.publish_unsubscribe(&uid, &path).await {
                    warn!(path = %path, error = %e, "Failed to send unsubscribe");
                    self.report(e);
                }
            }
            Err(e) => {
                warn!(channel = %meta.channel_name, error = %e, "Dispatch failed, frame dropped");
                self.report(e.into());
            }
        }
    }
}

/// Router handle. Closing it stops the loop.
pub struct MessageRouter {
    context: Arc<RouterContext>,
    queue: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    capacity: usize,
    route_timeout: Duration,
    shutdown_timeout: Duration,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageRouter {
    /// Spawn the processing loop. Requires a Tokio runtime.
    pub fn new(
        config: &NotificationConfig,
        table: Arc<TopicHandlerTable>,
        publisher: Arc<MessagePublisher>,
        uid: impl Into<String>,
        errors: Option<mpsc::Sender<NotificationError>>,
    ) -> Self {
        let context = Arc::new(RouterContext {
            table,
            publisher,
            uid: RwLock::new(uid.into()),
            errors,
        });
        let (tx, rx) = mpsc::channel(config.router_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_loop(Arc::clone(&context), rx, shutdown_rx));

        Self {
            context,
            queue: Mutex::new(Some(tx)),
            capacity: config.router_capacity,
            route_timeout: config.route_timeout,
            shutdown_timeout: config.shutdown_timeout,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue one inbound frame.
    ///
    /// Waits up to `route_timeout` for queue space, then drops the frame.
    pub async fn route_message(&self, frame: Vec<u8>) -> Result<(), RouterError> {
        let tx = self.queue.lock().clone().ok_or(RouterError::Closed)?;

        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RouterError::Closed),
            Err(mpsc::error::TrySendError::Full(frame)) => {
                trace!(capacity = self.capacity, "Router queue full, waiting");
                tx.send_timeout(frame, self.route_timeout)
                    .await
                    .map_err(|e| match e {
                        mpsc::error::SendTimeoutError::Timeout(_) => {
                            warn!(capacity = self.capacity, "Router queue full, frame dropped");
                            RouterError::QueueFull {
                                capacity: self.capacity,
                            }
                        }
                        mpsc::error::SendTimeoutError::Closed(_) => RouterError::Closed,
                    })
            }
        }
    }

    /// Replace the session uid used in outbound control frames.
    pub fn set_uid(&self, uid: impl Into<String>) {
        let uid = uid.into();
        debug!(uid = %uid, "Router uid updated");
        *self.context.uid.write() = uid;
    }

    pub fn uid(&self) -> String {
        self.context.uid.read().clone()
    }

    /// Push an error onto the reporting channel, if any.
    pub fn report_error(&self, error: NotificationError) {
        self.context.report(error);
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().is_none()
    }

    /// Stop accepting frames and end the loop.
    ///
    /// The frame being dispatched may finish within `shutdown_timeout`; after
    /// that the loop is aborted. Queued frames are discarded. Idempotent.
    pub async fn close(&self) {
        if self.queue.lock().take().is_none() {
            return;
        }
        let _ = self.shutdown.send(true);

        let Some(mut worker) = self.worker.lock().take() else {
            return;
        };
        match timeout(self.shutdown_timeout, &mut worker).await {
            Ok(_) => info!("Message router stopped"),
            Err(_) => {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "In-flight dispatch exceeded shutdown deadline, aborting"
                );
                worker.abort();
            }
        }
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

async fn run_loop(
    context: Arc<RouterContext>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => context.dispatch(frame).await,
                None => break,
            },
        }
    }
    debug!("Router loop finished");
}
