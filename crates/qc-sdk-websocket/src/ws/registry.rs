//! Subscription registry: per event kind `Path -> handlers` store.
//!
//! All mutation and reads go through one worker task that owns the map, so
//! add/remove never race with a dispatch cycle reading the same key.
//!
//! ```text
//! add_handlers ──┐
//! remove_handlers┼──► [unbounded queue] ──► worker ──► HashMap<canonical, Entry>
//! get_handlers ──┘                            │
//!        ▲                                    │
//!        └──────────── oneshot reply ◄────────┘
//! ```

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::domain::{Handler, Path, RegistryError};

/// Request processed by the registry worker.
enum RegistryRequest<E> {
    Add {
        key: Path,
        handlers: Vec<Handler<E>>,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        key: Path,
        handlers: Vec<Handler<E>>,
        reply: oneshot::Sender<Result<bool, RegistryError>>,
    },
    RemoveKey {
        key: Path,
        reply: oneshot::Sender<bool>,
    },
    Has {
        key: Path,
        reply: oneshot::Sender<bool>,
    },
    Get {
        key: Path,
        reply: oneshot::Sender<Vec<Handler<E>>>,
    },
    Keys {
        reply: oneshot::Sender<Vec<Path>>,
    },
    Close,
}

struct Entry<E> {
    path: Path,
    handlers: Vec<Handler<E>>,
}

/// Handler registry for one event kind.
///
/// Must be created inside a Tokio runtime: the constructor spawns the worker.
pub struct SubscriptionRegistry<E> {
    name: &'static str,
    requests: mpsc::UnboundedSender<RegistryRequest<E>>,
}

impl<E: Send + Sync + 'static> SubscriptionRegistry<E> {
    pub fn new(name: &'static str) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(name, rx));
        Self { name, requests }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryRequest<E>,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Append `handlers` to the set for `key`, creating it if absent.
    ///
    /// Returns `true` when this call created the entry. The worker applies
    /// requests one at a time, so among concurrent first subscribers exactly
    /// one observes `true`. An empty `handlers` list is a no-op.
    pub async fn add_handlers(
        &self,
        key: &Path,
        handlers: Vec<Handler<E>>,
    ) -> Result<bool, RegistryError> {
        if handlers.is_empty() {
            return Ok(false);
        }
        self.request(|reply| RegistryRequest::Add {
            key: key.clone(),
            handlers,
            reply,
        })
        .await
    }

    /// Remove `handlers` from the set for `key`.
    ///
    /// Returns `true` iff the set is now empty (the key was dropped). Handlers
    /// not present are skipped. An unknown key is
    /// [`RegistryError::HandlersNotFound`].
    pub async fn remove_handlers(
        &self,
        key: &Path,
        handlers: Vec<Handler<E>>,
    ) -> Result<bool, RegistryError> {
        if handlers.is_empty() {
            return Ok(false);
        }
        self.request(|reply| RegistryRequest::Remove {
            key: key.clone(),
            handlers,
            reply,
        })
        .await?
    }

    /// Drop every handler for `key`. Returns whether the key existed.
    pub async fn remove_key(&self, key: &Path) -> Result<bool, RegistryError> {
        self.request(|reply| RegistryRequest::RemoveKey {
            key: key.clone(),
            reply,
        })
        .await
    }

    /// `false` once the registry is closed.
    pub async fn has_handlers(&self, key: &Path) -> bool {
        self.request(|reply| RegistryRequest::Has {
            key: key.clone(),
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Snapshot of the handlers for `key`.
    pub async fn get_handlers(&self, key: &Path) -> Vec<Handler<E>> {
        self.request(|reply| RegistryRequest::Get {
            key: key.clone(),
            reply,
        })
        .await
        .unwrap_or_default()
    }

    /// Snapshot of the keys with at least one handler.
    pub async fn keys(&self) -> Vec<Path> {
        self.request(|reply| RegistryRequest::Keys { reply })
            .await
            .unwrap_or_default()
    }

    /// Stop the worker. Requests queued before this call are still applied.
    pub fn close(&self) {
        let _ = self.requests.send(RegistryRequest::Close);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

async fn run_worker<E: Send + Sync + 'static>(
    name: &'static str,
    mut rx: mpsc::UnboundedReceiver<RegistryRequest<E>>,
) {
    let mut entries: HashMap<String, Entry<E>> = HashMap::new();

    while let Some(request) = rx.recv().await {
        match request {
            RegistryRequest::Add {
                key,
                handlers,
                reply,
            } => {
                let added = handlers.len();
                let mut created = false;
                let entry = entries
                    .entry(key.canonical().to_string())
                    .or_insert_with(|| {
                        created = true;
                        Entry {
                            path: key.clone(),
                            handlers: Vec::new(),
                        }
                    });
                entry.handlers.extend(handlers);
                debug!(
                    registry = name,
                    path = %key,
                    added,
                    total = entry.handlers.len(),
                    "Handlers added"
                );
                let _ = reply.send(created);
            }
            RegistryRequest::Remove {
                key,
                handlers,
                reply,
            } => {
                let result = match entries.get_mut(key.canonical()) {
                    None => Err(RegistryError::HandlersNotFound(key.canonical().to_string())),
                    Some(entry) => {
                        for handler in &handlers {
                            if let Some(pos) = entry.handlers.iter().position(|h| h.ptr_eq(handler))
                            {
                                entry.handlers.remove(pos);
                            }
                        }
                        let remaining = entry.handlers.len();
                        debug!(registry = name, path = %key, remaining, "Handlers removed");
                        Ok(remaining == 0)
                    }
                };
                if let Ok(true) = result {
                    entries.remove(key.canonical());
                }
                let _ = reply.send(result);
            }
            RegistryRequest::RemoveKey { key, reply } => {
                let existed = entries.remove(key.canonical()).is_some();
                debug!(registry = name, path = %key, existed, "Key removed");
                let _ = reply.send(existed);
            }
            RegistryRequest::Has { key, reply } => {
                let _ = reply.send(entries.contains_key(key.canonical()));
            }
            RegistryRequest::Get { key, reply } => {
                let handlers = entries
                    .get(key.canonical())
                    .map(|e| e.handlers.clone())
                    .unwrap_or_default();
                let _ = reply.send(handlers);
            }
            RegistryRequest::Keys { reply } => {
                let _ = reply.send(entries.values().map(|e| e.path.clone()).collect());
            }
            RegistryRequest::Close => break,
        }
    }

    trace!(registry = name, keys = entries.len(), "Registry worker stopped");
}
