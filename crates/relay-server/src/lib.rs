//! # Relay Server
//!
//! WebSocket relay between dashboard clients and the backend data sources.
//!
//! ## Request Flow
//!
//! ```text
//! socket ──▶ RelaySession ──decode──▶ RelayDispatcher ──▶ WalletApi / Scraper
//!   ▲                                       │
//!   └──────── writer task ◀── Outbound ◀────┘
//! ```
//!
//! Every response carries the request's correlation key. Add-wallets runs
//! sequentially and streams one `ADD_WALLETS_UPDATE` per wallet plus a
//! terminal `completed` message. The tracked-wallet snapshot is pushed
//! uncorrelated on connect and after each refetch.
//!
//! Malformed frames and unknown tags are dropped without a reply. A known
//! request whose payload does not decode is answered with `INVALID_REQUEST`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod scraper;
pub mod service;
pub mod session;
pub mod tracked;

/// In-memory upstream doubles.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ServerConfig, TrackedWalletsConfig, DEFAULT_MAX_MESSAGE_SIZE};
pub use dispatcher::{Outbound, RelayDispatcher};
pub use error::ServerError;
pub use scraper::{Scraper, UnconfiguredScraper};
pub use service::{RelayService, RunningRelay};
pub use session::RelaySession;
pub use tracked::{TrackedWalletStore, MAX_TRACKED_PAGES};
