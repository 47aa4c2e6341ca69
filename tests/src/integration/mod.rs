//! Cross-module notification tests over an in-memory connection.

pub mod fixtures;

#[cfg(test)]
mod notification_flows;
#[cfg(test)]
mod stress;
