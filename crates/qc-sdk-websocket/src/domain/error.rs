//! Error types for the notification subsystem.
//!
//! Transport errors surface to the caller of the failing write. Decode and
//! envelope errors stay inside the router: they are logged, reported on the
//! error channel, and the frame is dropped.

use shared_types::MappingError;
use thiserror::Error;

/// Failures of the underlying duplex connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),
}

/// Subscription registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Removal targeted a key with no registered handlers. Benign.
    #[error("Handlers not found for {0}")]
    HandlersNotFound(String),

    /// The registry worker has stopped.
    #[error("Registry closed")]
    Closed,
}

/// Wire envelope errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame carries no channel name")]
    MissingChannel,

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Errors raised by a topic binding while dispatching one frame.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to decode {channel} payload: {source}")]
    Decode {
        channel: String,
        #[source]
        source: MappingError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Inbound queue errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Router closed")]
    Closed,

    #[error("Router queue full ({capacity} pending frames)")]
    QueueFull { capacity: usize },
}

/// Invalid [`NotificationConfig`](super::config::NotificationConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Top-level error returned by the client facade and reported on its error channel.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subscription to an addressed channel without an address or drive key.
    #[error("Channel {0} requires a key")]
    MissingKey(String),

    /// Two event kinds declared the same channel with different event types.
    #[error("Channel {0} is bound to another event type")]
    KindConflict(String),
}

/// Result alias for facade operations.
pub type NotificationResult<T> = Result<T, NotificationError>;
