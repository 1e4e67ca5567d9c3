use std::sync::Arc;

use async_trait::async_trait;

use halyard_bus::Bus;

use crate::error::ChannelError;

/// Result of a single [`Channel::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// At least one inbound message was read and published onto the bus.
    Processed(u32),
    /// Nothing was waiting to be read this round.
    Timeout,
}

/// The abstract capability interface every channel adapter implements.
///
/// The six-method transport-adapter lifecycle:
/// `init` → `start` → repeated `poll` → `send` (as needed) → `stop` →
/// `destroy`. The manager drives one independent poll loop per registered
/// channel and a single dispatcher that drains the bus's outbound queue.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    ///
    /// The name is used as the key inside
    /// [`ChannelManager`](crate::manager::ChannelManager) and as the
    /// routing key for outbound bus messages.
    fn name(&self) -> &str;

    /// Wire the channel to the shared bus. Called once, before `start`.
    async fn init(&self, bus: Arc<Bus>) -> Result<(), ChannelError>;

    /// Begin accepting/producing traffic (open a socket, start a
    /// long-poll loop, etc). Called once, after `init`.
    async fn start(&self) -> Result<(), ChannelError>;

    /// Check for and publish any inbound messages that arrived since the
    /// last call. Non-blocking: adapters backed by push delivery (e.g.
    /// the WebSocket server, which publishes directly from its own
    /// per-connection tasks) simply return `Timeout` every time, since
    /// there is nothing for a poll call to pump.
    async fn poll(&self) -> Result<PollOutcome, ChannelError>;

    /// Deliver a single message to `chat_id` on this channel.
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), ChannelError>;

    /// Stop accepting new traffic. Idempotent.
    async fn stop(&self) -> Result<(), ChannelError>;

    /// Release any resources held by the adapter. Called once, after
    /// `stop`; the adapter is not reused afterwards.
    async fn destroy(&self) -> Result<(), ChannelError>;
}
