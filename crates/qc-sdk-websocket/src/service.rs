//! Notification client: the facade over registries, router and publisher.
//!
//! Topic state is created lazily per event kind on first use: a registry, a
//! subscribers pool, and the topic binding that the router dispatches to.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{
    BlockInfo, CosignatureInfo, DriveStateInfo, ReceiptStatement, StatusInfo, TransactionHash,
    TransactionInfo,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters;
use crate::domain::{
    Channel, Handler, NotificationConfig, NotificationError, NotificationResult, Path,
    RouterError,
};
use crate::kinds::{
    BlockEvents, ConfirmedAddedEvents, CosignatureEvents, DriveStateEvents, EventKind,
    PartialAddedEvents, PartialRemovedEvents, ReceiptEvents, StatusEvents,
    UnconfirmedAddedEvents, UnconfirmedRemovedEvents,
};
use crate::ports::Connection;
use crate::ws::{
    EventStream, MessagePublisher, MessageRouter, PoolForwarder, SubscribersPool,
    SubscriptionRegistry, TopicBinding, TopicHandlerTable,
};

/// Per event kind state owned by the client.
struct TopicState<E> {
    registry: Arc<SubscriptionRegistry<E>>,
    pool: Arc<SubscribersPool<E>>,
}

trait TopicSlot: Send + Sync {
    fn close(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<E: Send + Sync + 'static> TopicSlot for TopicState<E> {
    fn close(&self) {
        self.registry.close();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Client for the node's notification websocket.
///
/// # Usage
///
/// ```ignore
/// use qc_sdk_websocket::{Handler, NotificationClient, NotificationConfig, StatusInfo};
///
/// let client = NotificationClient::connect(NotificationConfig::from_env()).await?;
/// client
///     .add_status_handlers(
///         "SAONSOGFZZHNEIBRYXHDTDTBR2YSAXKTITRFHG2Y",
///         vec![Handler::from_fn(|status: &StatusInfo| {
///             println!("{} -> {}", status.hash, status.status);
///             true // one status is enough
///         })],
///     )
///     .await?;
/// ```
pub struct NotificationClient {
    config: NotificationConfig,
    publisher: Arc<MessagePublisher>,
    router: Arc<MessageRouter>,
    table: Arc<TopicHandlerTable>,
    topics: DashMap<Channel, Arc<dyn TopicSlot>>,
    errors: Mutex<Option<mpsc::Receiver<NotificationError>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl NotificationClient {
    /// Connect to `config.url`, complete the handshake and start reading.
    pub async fn connect(config: NotificationConfig) -> NotificationResult<Self> {
        config.validate()?;
        let (connection, uid, source) =
            adapters::connect(&config.url, config.handshake_timeout).await?;

        let client = Self::with_connection(connection, uid, config)?;
        let reader = adapters::spawn_reader(source, Arc::clone(&client.router));
        *client.reader.lock() = Some(reader);
        Ok(client)
    }

    /// Wire the client over an established connection.
    ///
    /// Inbound frames are then fed through [`route_message`](Self::route_message).
    pub fn with_connection(
        connection: Arc<dyn Connection>,
        uid: impl Into<String>,
        config: NotificationConfig,
    ) -> NotificationResult<Self> {
        config.validate()?;

        let publisher = Arc::new(MessagePublisher::new(connection));
        let table = Arc::new(TopicHandlerTable::new());
        let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity);
        let router = Arc::new(MessageRouter::new(
            &config,
            Arc::clone(&table),
            Arc::clone(&publisher),
            uid,
            Some(errors_tx),
        ));

        Ok(Self {
            config,
            publisher,
            router,
            table,
            topics: DashMap::new(),
            errors: Mutex::new(Some(errors_rx)),
            reader: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Session uid sent in control frames.
    pub fn uid(&self) -> String {
        self.router.uid()
    }

    /// Errors from the router and reader. Can be taken once.
    pub fn take_error_receiver(&self) -> Option<mpsc::Receiver<NotificationError>> {
        self.errors.lock().take()
    }

    /// Feed one inbound frame to the router.
    pub async fn route_message(&self, frame: impl Into<Vec<u8>>) -> Result<(), RouterError> {
        self.router.route_message(frame.into()).await
    }

    /// Register `handlers` for `key` on kind `K`.
    ///
    /// The subscribe frame is sent only when this call created the key.
    /// `key` is ignored for global channels and required otherwise.
    pub async fn add_handlers<K: EventKind>(
        &self,
        key: Option<&str>,
        handlers: Vec<Handler<K::Event>>,
    ) -> NotificationResult<()> {
        self.ensure_open()?;
        let path = key_path::<K>(key)?;
        let topic = self.topic::<K>()?;

        let _gate = self.publisher.lock_path(&path).await;
        let created = topic.registry.add_handlers(&path, handlers).await?;
        if created {
            self.subscribe_created(&topic.registry, &path).await?;
        }
        Ok(())
    }

    /// Open a stream of kind `K` events for `key`.
    ///
    /// All streams of one key share a single registry handler, removed once
    /// the last stream is gone.
    pub async fn stream<K: EventKind>(
        &self,
        key: Option<&str>,
    ) -> NotificationResult<EventStream<K::Event>> {
        self.ensure_open()?;
        let path = key_path::<K>(key)?;
        let topic = self.topic::<K>()?;

        let _gate = self.publisher.lock_path(&path).await;
        let stream = topic.pool.subscribe(path.canonical());
        if topic.pool.attach_forwarder(path.canonical()) {
            let forwarder = Handler::new(PoolForwarder::new(
                Arc::clone(&topic.pool),
                path.canonical(),
            ));
            let registered = match topic.registry.add_handlers(&path, vec![forwarder]).await {
                Ok(true) => self.subscribe_created(&topic.registry, &path).await,
                Ok(false) => Ok(()),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = registered {
                topic.pool.unsubscribe(path.canonical(), stream.id());
                topic.pool.detach_forwarder(path.canonical());
                return Err(e);
            }
        }
        Ok(stream)
    }

    /// Drop every handler and stream for `key` and unsubscribe.
    ///
    /// Returns `false` if nothing was registered.
    pub async fn unsubscribe_all<K: EventKind>(&self, key: Option<&str>) -> NotificationResult<bool> {
        self.ensure_open()?;
        let path = key_path::<K>(key)?;
        let topic = self.topic::<K>()?;

        let _gate = self.publisher.lock_path(&path).await;
        let streams = topic.pool.clear(path.canonical());
        let removed = topic.registry.remove_key(&path).await?;
        if removed {
            self.publisher
                .publish_unsubscribe(&self.router.uid(), &path)
                .await?;
            info!(path = %path, streams, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Keys currently subscribed on kind `K`.
    pub async fn keys<K: EventKind>(&self) -> NotificationResult<Vec<Path>> {
        self.ensure_open()?;
        Ok(self.topic::<K>()?.registry.keys().await)
    }

    pub async fn add_block_handlers(&self, handlers: Vec<Handler<BlockInfo>>) -> NotificationResult<()> {
        self.add_handlers::<BlockEvents>(None, handlers).await
    }

    pub async fn add_confirmed_added_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<TransactionInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<ConfirmedAddedEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_unconfirmed_added_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<TransactionInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<UnconfirmedAddedEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_unconfirmed_removed_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<TransactionHash>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<UnconfirmedRemovedEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_status_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<StatusInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<StatusEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_partial_added_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<TransactionInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<PartialAddedEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_partial_removed_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<TransactionHash>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<PartialRemovedEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_cosignature_handlers(
        &self,
        address: &str,
        handlers: Vec<Handler<CosignatureInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<CosignatureEvents>(Some(address), handlers)
            .await
    }

    pub async fn add_receipt_handlers(
        &self,
        handlers: Vec<Handler<ReceiptStatement>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<ReceiptEvents>(None, handlers).await
    }

    pub async fn add_drive_state_handlers(
        &self,
        drive_key: &str,
        handlers: Vec<Handler<DriveStateInfo>>,
    ) -> NotificationResult<()> {
        self.add_handlers::<DriveStateEvents>(Some(drive_key), handlers)
            .await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the router and reader, close every registry, then the connection.
    pub async fn close(&self) -> NotificationResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.router.close().await;
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        for slot in self.topics.iter() {
            slot.value().close();
        }
        self.publisher.close().await?;

        info!(uid = %self.router.uid(), "Notification client closed");
        Ok(())
    }

    /// Send the subscribe frame for a key this caller just created.
    ///
    /// On a failed write the key is dropped again, so the next registration
    /// creates it and retries the subscribe. Callers hold the path gate.
    async fn subscribe_created<E: Send + Sync + 'static>(
        &self,
        registry: &SubscriptionRegistry<E>,
        path: &Path,
    ) -> NotificationResult<()> {
        if let Err(e) = self
            .publisher
            .publish_subscribe(&self.router.uid(), path)
            .await
        {
            warn!(path = %path, error = %e, "Subscribe failed, handlers dropped");
            let _ = registry.remove_key(path).await;
            return Err(e);
        }
        info!(path = %path, "Subscribed");
        Ok(())
    }

    fn ensure_open(&self) -> NotificationResult<()> {
        if self.is_closed() {
            return Err(RouterError::Closed.into());
        }
        Ok(())
    }

    fn topic<K: EventKind>(&self) -> NotificationResult<Arc<TopicState<K::Event>>> {
        let slot = Arc::clone(
            self.topics
                .entry(K::CHANNEL)
                .or_insert_with(|| self.create_topic::<K>())
                .value(),
        );
        slot.into_any()
            .downcast::<TopicState<K::Event>>()
            .map_err(|_| NotificationError::KindConflict(K::CHANNEL.to_string()))
    }

    fn create_topic<K: EventKind>(&self) -> Arc<dyn TopicSlot> {
        let state = Arc::new(TopicState::<K::Event> {
            registry: Arc::new(SubscriptionRegistry::new(K::CHANNEL.as_str())),
            pool: Arc::new(SubscribersPool::from_config(&self.config)),
        });
        let registry = Arc::clone(&state.registry);
        self.table.get_or_bind(K::CHANNEL.as_str(), move || {
            Arc::new(TopicBinding::new(K::CHANNEL, registry, K::decode))
        });
        debug!(channel = %K::CHANNEL, "Topic state created");
        state
    }
}

fn key_path<K: EventKind>(key: Option<&str>) -> NotificationResult<Path> {
    if !K::CHANNEL.is_addressed() {
        return Ok(Path::for_channel(K::CHANNEL, None));
    }
    match key.filter(|k| !k.is_empty()) {
        Some(key) => Ok(Path::for_channel(K::CHANNEL, Some(key))),
        None => Err(NotificationError::MissingKey(K::CHANNEL.to_string())),
    }
}
