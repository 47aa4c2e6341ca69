//! Outbound ports: the duplex connection and the payload mappers.

use async_trait::async_trait;
use shared_types::MappingError;

use crate::domain::TransportError;

/// Write side of the notification connection.
///
/// The connection is a single ordered message stream. Only
/// [`MessagePublisher`](crate::ws::MessagePublisher) writes to it.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one already-framed text message.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Pure `bytes -> event` mapper injected into a topic binding.
pub trait EventMapper<E>: Send + Sync {
    fn map(&self, payload: &[u8]) -> Result<E, MappingError>;
}

impl<E, F> EventMapper<E> for F
where
    F: Fn(&[u8]) -> Result<E, MappingError> + Send + Sync,
{
    fn map(&self, payload: &[u8]) -> Result<E, MappingError> {
        self(payload)
    }
}
