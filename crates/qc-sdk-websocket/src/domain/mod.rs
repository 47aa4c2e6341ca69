//! # Domain Layer for Notifications
//!
//! Pure types with no I/O: paths, wire envelopes, handler capability,
//! configuration and errors.
//!
//! ## Contents
//!
//! - **path**: `Channel` names and the `Path` subscription key
//! - **envelope**: control frames, handshake, routing metadata
//! - **handler**: `EventHandler` capability and identity-compared `Handler`
//! - **config**: `NotificationConfig`
//! - **error**: error taxonomy

pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod path;

pub use config::*;
pub use envelope::*;
pub use error::*;
pub use handler::*;
pub use path::*;
