//! Ports (SPI) for the notification subsystem.

pub mod outbound;

pub use outbound::{Connection, EventMapper};
