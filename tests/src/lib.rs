//! # Quantum-Chain SDK Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs            # In-memory connection, frame builders
//!     ├── notification_flows.rs  # End-to-end scenarios through the client
//!     └── stress.rs              # Concurrent add/remove/dispatch
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::stress
//! ```

pub mod integration;
