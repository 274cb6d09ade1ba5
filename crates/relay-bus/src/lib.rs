//! # Relay Bus
//!
//! In-process dispatch of decoded envelopes to interested parties.
//!
//! ```text
//! transport ──emit(kind, envelope)──▶ ListenerRegistry ──▶ on/once callbacks
//!                                            │
//!                                            ├──▶ DispatchWaiter  (first match)
//!                                            └──▶ DispatchStream  (every match)
//! ```
//!
//! The registry is an owned object. Each client session holds its own, so
//! independent connections never share listeners.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod registry;
pub mod waiter;

pub use registry::{Callback, ListenerId, ListenerRegistry};
pub use waiter::{DispatchStream, DispatchWaiter, WaitError};
