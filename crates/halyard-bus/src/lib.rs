//! The message bus: two bounded FIFO queues — inbound (channel adapters to
//! the agent loop) and outbound (agent loop back to channel adapters) —
//! sharing one payload-accounting arena.
//!
//! `ConsumeOutboundForChannel` does a per-channel extraction without
//! disturbing the rest of the queue, and a full queue is distinguished
//! from an exhausted arena. Blocking consume is built on
//! `tokio::sync::Notify` rather than a condition-variable wait loop.

mod bus;
mod error;
mod types;

pub use bus::{Bus, DEFAULT_QUEUE_CAPACITY};
pub use error::{BusError, Result};
pub use types::{session_key, BusMessage, BusMessageKind};
