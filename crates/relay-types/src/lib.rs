//! # Relay Types Crate
//!
//! Wire-level vocabulary shared by the relay server and its clients.
//!
//! ## Contents
//!
//! - [`DispatchType`]: the closed set of message tags.
//! - [`Envelope`]: the unit of wire exchange, plus the text codec.
//! - [`CorrelationKey`]: deterministic request keys used for de-duplication.
//! - [`Outcome`]: the `{success, data?, error?}` result shape.
//! - Payload entities (PnL tokens, aggregated stats, scrape results, add-wallet progress).
//! - [`Clock`]: injected time source used by retry and cache logic.

pub mod correlation;
pub mod dispatch;
pub mod entities;
pub mod envelope;
pub mod outcome;
pub mod ports;

pub use correlation::CorrelationKey;
pub use dispatch::DispatchType;
pub use entities::*;
pub use envelope::{decode, encode, CodecError, Envelope, Inbound};
pub use outcome::Outcome;
pub use ports::{Clock, ManualClock, SystemClock};
