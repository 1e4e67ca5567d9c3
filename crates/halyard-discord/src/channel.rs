//! Discord channel adapter.
//!
//! Wraps a serenity `Client` and drives its gateway event loop on a
//! background task. Inbound messages on the configured `channel_id` are
//! published straight onto the bus from the event handler, so — like
//! `halyard-ws` and `halyard-telegram` — `poll` always returns `Timeout`.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::async_trait as serenity_async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use halyard_bus::{Bus, BusMessageKind};
use halyard_channels::{Channel, ChannelError, PollOutcome};
use halyard_core::config::DiscordConfig;

use crate::send::send_chunked;

/// Transport name used in session keys and bus routing for this adapter.
pub const TRANSPORT: &str = "discord";

pub struct DiscordChannel {
    config: DiscordConfig,
    http: Mutex<Option<Arc<serenity::http::Http>>>,
    gateway_task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            http: Mutex::new(None),
            gateway_task: Mutex::new(None),
        }
    }
}

struct Handler {
    bus: Arc<Bus>,
    channel_id: ChannelId,
}

#[serenity_async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(bot = %ready.user.name, "discord: gateway connected");
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot || msg.channel_id != self.channel_id {
            return;
        }
        if msg.content.is_empty() {
            return;
        }
        if let Err(e) = self
            .bus
            .publish_inbound(
                BusMessageKind::UserInput,
                TRANSPORT,
                &msg.author.id.to_string(),
                self.channel_id.get() as i64,
                msg.content.as_bytes(),
            )
            .await
        {
            warn!(error = %e, "discord: failed to publish inbound message");
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        TRANSPORT
    }

    async fn init(&self, bus: Arc<Bus>) -> Result<(), ChannelError> {
        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
        let channel_id = ChannelId::new(self.config.channel_id);
        let handler = Handler { bus, channel_id };

        let mut client = Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        *self.http.lock().await = Some(Arc::clone(&client.http));

        let handle = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                warn!(error = %e, "discord: gateway loop ended with error");
            }
        });
        *self.gateway_task.lock().await = Some(handle);
        Ok(())
    }

    async fn start(&self) -> Result<(), ChannelError> {
        // The gateway connection is already running from `init` — serenity
        // couples client construction and connection start tightly enough
        // that splitting them further would mean re-authenticating twice.
        Ok(())
    }

    async fn poll(&self) -> Result<PollOutcome, ChannelError> {
        Ok(PollOutcome::Timeout)
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let http = self
            .http
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("discord channel not initialised".into()))?;
        let channel_id = ChannelId::new(chat_id as u64);
        send_chunked(&http, channel_id, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        if let Some(handle) = self.gateway_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        *self.http.lock().await = None;
        Ok(())
    }
}
