//! Notification core over one duplex connection.
//!
//! - **registry**: per event kind `Path -> handlers`, serialized by a worker task
//! - **publisher**: subscribe/unsubscribe control frames
//! - **topic**: per channel decode + fan-out bindings
//! - **router**: sequential inbound frame dispatch
//! - **pool**: stream-based subscribers with bounded delivery

pub mod pool;
pub mod publisher;
pub mod registry;
pub mod router;
pub mod topic;

pub use pool::{EventStream, PoolForwarder, SubscriberId, SubscribersPool};
pub use publisher::MessagePublisher;
pub use registry::SubscriptionRegistry;
pub use router::MessageRouter;
pub use topic::{TopicBinding, TopicHandler, TopicHandlerTable};
