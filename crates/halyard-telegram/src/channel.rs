//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop on a background task for the lifetime of the process. Inbound
//! messages are published directly onto the bus from the dispatcher's
//! handler, so — like `halyard-ws` — `poll` has nothing left to pump and
//! always returns `Timeout`.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use halyard_bus::{Bus, BusMessageKind};
use halyard_channels::{Channel, ChannelError, PollOutcome};
use halyard_core::config::TelegramConfig;

use crate::send::send_response;

/// Transport name used in session keys and bus routing for this adapter.
pub const TRANSPORT: &str = "telegram";

pub struct TelegramChannel {
    config: TelegramConfig,
    bot: Mutex<Option<Bot>>,
    bus: Mutex<Option<Arc<Bus>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            bot: Mutex::new(None),
            bus: Mutex::new(None),
            dispatch_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        TRANSPORT
    }

    async fn init(&self, bus: Arc<Bus>) -> Result<(), ChannelError> {
        *self.bot.lock().await = Some(Bot::new(&self.config.bot_token));
        *self.bus.lock().await = Some(bus);
        Ok(())
    }

    async fn start(&self) -> Result<(), ChannelError> {
        let bot = self
            .bot
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("telegram channel started before init".into()))?;
        let bus = self
            .bus
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("telegram channel started before init".into()))?;

        info!("telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message);

        let handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler)
                .dependencies(dptree::deps![bus])
                .default_handler(|_upd| async {})
                .build()
                .dispatch()
                .await;
        });

        *self.dispatch_task.lock().await = Some(handle);
        Ok(())
    }

    async fn poll(&self) -> Result<PollOutcome, ChannelError> {
        Ok(PollOutcome::Timeout)
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let bot = self
            .bot
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("telegram channel not initialised".into()))?;
        send_response(&bot, ChatId(chat_id), text).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        if let Some(handle) = self.dispatch_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        *self.bot.lock().await = None;
        Ok(())
    }
}

/// Publish one inbound Telegram text message onto the bus.
async fn handle_message(bus: Arc<Bus>, msg: Message) {
    let Some(text) = msg.text() else { return };
    let chat_id = msg.chat.id.0;
    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_else(|| chat_id.to_string());

    if let Err(e) = bus
        .publish_inbound(BusMessageKind::UserInput, TRANSPORT, &sender_id, chat_id, text.as_bytes())
        .await
    {
        warn!(error = %e, "telegram: failed to publish inbound message");
    }
}
