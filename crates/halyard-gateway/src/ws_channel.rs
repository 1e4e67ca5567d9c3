//! Adapts [`halyard_ws::WsServer`] to the [`Channel`] contract: a thin
//! wrapper so the outbound dispatcher can address `"websocket"` exactly
//! like any other registered channel instead of special-casing it.

use std::sync::Arc;

use async_trait::async_trait;

use halyard_bus::Bus;
use halyard_channels::{Channel, ChannelError, PollOutcome};
use halyard_ws::WsServer;

pub const TRANSPORT: &str = "websocket";

pub struct WsChannel {
    server: Arc<WsServer>,
}

impl WsChannel {
    pub fn new(server: Arc<WsServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Channel for WsChannel {
    fn name(&self) -> &str {
        TRANSPORT
    }

    /// The server is constructed with its bus reference already wired up;
    /// nothing further to do here.
    async fn init(&self, _bus: Arc<Bus>) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), ChannelError> {
        self.server
            .listen()
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))
    }

    /// Inbound messages are published straight onto the bus by each
    /// connection's own task as they arrive — nothing for a poll to pump.
    async fn poll(&self) -> Result<PollOutcome, ChannelError> {
        Ok(PollOutcome::Timeout)
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        self.server.send(chat_id, text).map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.server.stop().await;
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
