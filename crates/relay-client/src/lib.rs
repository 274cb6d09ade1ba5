//! # Relay Client
//!
//! Browser-side half of the relay protocol, usable from any tokio program.
//!
//! ## Layers
//!
//! ```text
//! CachedQueries ──▶ ResultCache (TTL, coalescing)
//!       │
//!       ▼
//! RelayClient ──▶ PendingSet (de-duplication)
//!       │    └──▶ ListenerRegistry (dispatch by type)
//!       ▼
//! TransportManager (one socket, fixed-delay reconnect)
//! ```
//!
//! ## Disconnects
//!
//! By default a dropped connection does not fail in-flight requests: their
//! waiters stay registered across the reconnect and resolve only if a
//! matching response still arrives. Set
//! [`ClientConfig::fail_pending_on_disconnect`] or a per-request timeout to
//! bound the wait.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod queries;
pub mod transport;

pub use cache::{CacheStats, FetchOptions, ResultCache, DEFAULT_TTL};
pub use client::{EnvelopeRegistry, Matcher, RelayClient, Request, RequestOptions};
pub use config::ClientConfig;
pub use error::{ClientError, NOT_CONNECTED};
pub use pending::{PendingGuard, PendingSet, PendingStats};
pub use queries::CachedQueries;
pub use transport::{ConnectionState, TransportManager};
