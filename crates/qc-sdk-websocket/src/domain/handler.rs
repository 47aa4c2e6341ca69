//! Handler capability.
//!
//! Handlers are compared by identity, not value: the same closure registered
//! twice yields two handlers that are removed independently.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with a decoded event.
///
/// Returning `true` means "done": the handler is removed from its registry
/// after the current dispatch cycle. Implementations should be short; one
/// dispatch cycle waits for every handler of the key to finish.
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    async fn handle(&self, event: Arc<E>) -> bool;
}

/// Registered handler: a shared, identity-compared [`EventHandler`].
pub struct Handler<E> {
    inner: Arc<dyn EventHandler<E>>,
}

impl<E: Send + Sync + 'static> Handler<E> {
    pub fn new<H>(handler: H) -> Self
    where
        H: EventHandler<E> + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::new(FnHandler(f))
    }

    pub async fn invoke(&self, event: Arc<E>) -> bool {
        self.inner.handle(event).await
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + Sync + 'static> PartialEq for Handler<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<E> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<E, F> EventHandler<E> for FnHandler<F>
where
    E: Send + Sync + 'static,
    F: Fn(&E) -> bool + Send + Sync,
{
    async fn handle(&self, event: Arc<E>) -> bool {
        (self.0)(event.as_ref())
    }
}
