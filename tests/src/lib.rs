//! # Wallet Relay Test Suite
//!
//! End-to-end tests that run a real relay on a local port and talk to it
//! through `relay-client` or a raw WebSocket.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── mod.rs          # RelayHarness, raw-socket helpers
//!     ├── flows.rs        # Request/response and progress flows
//!     ├── protocol.rs     # Frame-level behaviour (bad frames, INVALID_REQUEST)
//!     └── connection.rs   # Reconnects, timeouts, disconnect policy
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::connection::
//! ```

pub mod integration;
