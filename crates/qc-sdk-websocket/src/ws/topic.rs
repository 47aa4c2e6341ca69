//! Topic handler bindings: decode + fan-out logic per channel kind.
//!
//! A binding couples a registry, a payload mapper and a path formatter.
//! The table holds one binding per channel name; a binding is created on the
//! first subscription for its channel and never replaced.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::{Channel, DispatchError, Handler, Path, RegistryError, RoutingMetadata};
use crate::ports::EventMapper;
use crate::ws::registry::SubscriptionRegistry;

/// Type-erased binding stored in the [`TopicHandlerTable`].
#[async_trait]
pub trait TopicHandler: Send + Sync {
    fn channel(&self) -> Channel;

    /// Registry key for an inbound frame.
    fn format_path(&self, meta: &RoutingMetadata) -> Path;

    /// Decode `payload`, fan it out to the handlers of its path and apply
    /// their removal requests.
    ///
    /// Returns `false` only when this call removed the path's last handler,
    /// which tells the router to unsubscribe.
    async fn handle(&self, meta: &RoutingMetadata, payload: &[u8]) -> Result<bool, DispatchError>;

    /// Whether `path` currently has handlers.
    async fn is_subscribed(&self, path: &Path) -> bool;
}

type PathFormatter = Box<dyn Fn(&RoutingMetadata) -> Path + Send + Sync>;

/// Binding of one event kind.
pub struct TopicBinding<E> {
    channel: Channel,
    registry: Arc<SubscriptionRegistry<E>>,
    mapper: Arc<dyn EventMapper<E>>,
    formatter: PathFormatter,
}

impl<E: Send + Sync + 'static> TopicBinding<E> {
    /// Binding using the channel's default path formatter.
    pub fn new<M>(channel: Channel, registry: Arc<SubscriptionRegistry<E>>, mapper: M) -> Self
    where
        M: EventMapper<E> + 'static,
    {
        Self {
            channel,
            registry,
            mapper: Arc::new(mapper),
            formatter: Box::new(move |meta| meta.path_for(channel)),
        }
    }

    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&RoutingMetadata) -> Path + Send + Sync + 'static,
    {
        self.formatter = Box::new(formatter);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry<E>> {
        &self.registry
    }

    /// Run every handler in its own task and wait for all of them.
    ///
    /// Returns the handlers that asked to be removed. A handler that panics
    /// is removed as well.
    async fn fan_out(&self, key: &Path, handlers: Vec<Handler<E>>, event: Arc<E>) -> Vec<Handler<E>> {
        let tasks: Vec<_> = handlers
            .iter()
            .map(|handler| {
                let handler = handler.clone();
                let event = Arc::clone(&event);
                tokio::spawn(async move { handler.invoke(event).await })
            })
            .collect();

        let mut finished = Vec::new();
        for (handler, task) in handlers.into_iter().zip(tasks) {
            match task.await {
                Ok(true) => finished.push(handler),
                Ok(false) => {}
                Err(e) if e.is_panic() => {
                    warn!(channel = %self.channel, path = %key, "Handler panicked, removing it");
                    finished.push(handler);
                }
                Err(e) => {
                    warn!(channel = %self.channel, path = %key, error = %e, "Handler task cancelled");
                }
            }
        }
        finished
    }
}

#[async_trait]
impl<E: Send + Sync + 'static> TopicHandler for TopicBinding<E> {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn format_path(&self, meta: &RoutingMetadata) -> Path {
        (self.formatter)(meta)
    }

    async fn handle(&self, meta: &RoutingMetadata, payload: &[u8]) -> Result<bool, DispatchError> {
        let event = self
            .mapper
            .map(payload)
            .map_err(|source| DispatchError::Decode {
                channel: self.channel.to_string(),
                source,
            })?;

        let key = self.format_path(meta);
        let handlers = self.registry.get_handlers(&key).await;
        if handlers.is_empty() {
            return Ok(true);
        }

        debug!(channel = %self.channel, path = %key, handlers = handlers.len(), "Dispatching event");
        let finished = self.fan_out(&key, handlers, Arc::new(event)).await;

        if finished.is_empty() {
            return Ok(true);
        }

        match self.registry.remove_handlers(&key, finished).await {
            // Emptied by this cycle; a concurrent add may have refilled it
            Ok(true) => Ok(self.registry.has_handlers(&key).await),
            Ok(false) => Ok(true),
            // Key dropped meanwhile by unsubscribe-all, which sent its own frame
            Err(RegistryError::HandlersNotFound(_)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_subscribed(&self, path: &Path) -> bool {
        self.registry.has_handlers(path).await
    }
}

/// Channel name → binding. Many concurrent readers, rare writers.
#[derive(Default)]
pub struct TopicHandlerTable {
    bindings: DashMap<String, Arc<dyn TopicHandler>>,
}

impl TopicHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_handler(&self, channel_name: &str) -> bool {
        self.bindings.contains_key(channel_name)
    }

    pub fn get_handler(&self, channel_name: &str) -> Option<Arc<dyn TopicHandler>> {
        self.bindings.get(channel_name).map(|b| Arc::clone(b.value()))
    }

    /// Store `binding` unless one already exists; returns the binding in effect.
    pub fn set_handler(
        &self,
        channel_name: &str,
        binding: Arc<dyn TopicHandler>,
    ) -> Arc<dyn TopicHandler> {
        self.get_or_bind(channel_name, move || binding)
    }

    /// Bind lazily: `make` runs only when the channel has no binding yet.
    pub fn get_or_bind(
        &self,
        channel_name: &str,
        make: impl FnOnce() -> Arc<dyn TopicHandler>,
    ) -> Arc<dyn TopicHandler> {
        let entry = self
            .bindings
            .entry(channel_name.to_string())
            .or_insert_with(|| {
                debug!(channel = channel_name, "Topic handler bound");
                make()
            });
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
