//! Transport adapters implementing the outbound ports.

pub mod ws;

pub use ws::{connect, spawn_reader, WsConnection, WsSource};
