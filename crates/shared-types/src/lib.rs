//! # Shared Types Crate
//!
//! Entities pushed by the node over the notification websocket, and the
//! pure mappers that build them from raw frames.
//!
//! ## Design Principles
//!
//! - **Transport-free**: nothing here knows about sockets or subscriptions.
//!   The websocket crate injects these mappers into its topic bindings.
//! - **One entity per channel kind**: see [`events`] for the mapping table.

pub mod events;
pub mod mapping;

pub use events::*;
pub use mapping::{
    decode_block, decode_cosignature, decode_drive_state, decode_receipt, decode_status,
    decode_transaction, decode_transaction_hash, MappingError,
};
