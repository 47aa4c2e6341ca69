//! QC SDK Websocket - real-time notifications from a node over one duplex connection.
//!
//! # Architecture
//!
//! ```text
//!            ┌───────────────────── NotificationClient ─────────────────────┐
//!            │                                                              │
//!  add_*  ───┼──► SubscriptionRegistry<E> ──(created)──► MessagePublisher ──┼──► socket
//!  stream ───┼──► SubscribersPool<E> ──► PoolForwarder (registry handler)   │
//!            │                                                              │
//!  socket ───┼──► reader ──► MessageRouter ──► TopicHandlerTable            │
//!            │                    │                 │                       │
//!            │                    │        TopicBinding<E>: decode once,    │
//!            │                    │        fan out, drop finished handlers  │
//!            │                    └── no handlers left ──► unsubscribe ─────┼──► socket
//!            └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Wire protocol
//!
//! - Handshake: the server sends `{"uid": "<session>"}` once connected.
//! - Control: `{"uid": "<session>", "subscribe": "<path>"}` and
//!   `{"uid": "<session>", "unsubscribe": "<path>"}`.
//! - Paths are `channel` or `channel/key`, e.g. `block`, `status/<address>`.
//!
//! # Handlers
//!
//! A handler returns `true` when it is done. Once the last handler of a path
//! is done the client unsubscribes from the path. Streams follow the same
//! rule: the last dropped stream ends the subscription.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod kinds;
pub mod ports;
pub mod service;
pub mod ws;

// Re-exports for public API
pub use domain::{
    Channel, ConfigError, DispatchError, EnvelopeError, EventHandler, Handler,
    NotificationConfig, NotificationError, NotificationResult, Path, RegistryError, RouterError,
    TransportError,
};
pub use kinds::*;
pub use ports::{Connection, EventMapper};
pub use service::NotificationClient;
pub use ws::{EventStream, SubscriberId};

// Event entities delivered to handlers
pub use shared_types::{
    BlockInfo, CosignatureInfo, DriveState, DriveStateInfo, MappingError, Receipt,
    ReceiptStatement, StatusInfo, TransactionHash, TransactionInfo,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
