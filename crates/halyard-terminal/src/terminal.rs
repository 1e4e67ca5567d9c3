//! Synthetic `"tui"` channel adapter — a single local stdin/stdout
//! conversation: conversation id is always `0`, there is exactly
//! one operator, and there is no addressing scheme to speak of.
//!
//! Input delivery is push-based: a background task reads stdin
//! line-by-line and publishes directly onto the bus, the same pattern
//! `halyard-ws` uses for its per-connection reader tasks. `poll` therefore
//! always returns `Timeout` — there is nothing left for a pull to pump.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use halyard_bus::{Bus, BusMessageKind};
use halyard_channels::{Channel, ChannelError, PollOutcome};

/// Transport name used in session keys and bus routing for this adapter.
pub const TRANSPORT: &str = "tui";
/// The synthetic, always-zero conversation id for the local terminal.
pub const CONVERSATION_ID: i64 = 0;

/// Stdin/stdout channel adapter.
pub struct TerminalChannel {
    bus: Mutex<Option<Arc<Bus>>>,
    running: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalChannel {
    pub fn new() -> Self {
        Self {
            bus: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        }
    }
}

impl Default for TerminalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for TerminalChannel {
    fn name(&self) -> &str {
        TRANSPORT
    }

    async fn init(&self, bus: Arc<Bus>) -> Result<(), ChannelError> {
        *self.bus.lock().await = Some(bus);
        Ok(())
    }

    async fn start(&self) -> Result<(), ChannelError> {
        let bus = self
            .bus
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("tui channel started before init".into()))?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut lines = BufReader::new(stdin).lines();
            info!("tui channel: reading stdin for local conversation");
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.is_empty() {
                            continue;
                        }
                        if let Err(e) = bus
                            .publish_inbound(
                                BusMessageKind::UserInput,
                                TRANSPORT,
                                "local",
                                CONVERSATION_ID,
                                line.as_bytes(),
                            )
                            .await
                        {
                            warn!(error = %e, "tui channel: failed to publish stdin line");
                        }
                    }
                    Ok(None) => {
                        info!("tui channel: stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "tui channel: stdin read error");
                        break;
                    }
                }
            }
        });

        *self.reader_task.lock().await = Some(handle);
        Ok(())
    }

    async fn poll(&self) -> Result<PollOutcome, ChannelError> {
        Ok(PollOutcome::Timeout)
    }

    async fn send(&self, _chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        stdout
            .write_all(b"\n")
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        stdout.flush().await.map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_always_times_out() {
        let channel = TerminalChannel::new();
        let bus = Arc::new(Bus::with_defaults());
        channel.init(bus).await.unwrap();
        assert_eq!(channel.poll().await.unwrap(), PollOutcome::Timeout);
    }

    #[tokio::test]
    async fn start_before_init_fails() {
        let channel = TerminalChannel::new();
        assert!(channel.start().await.is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent_without_start() {
        let channel = TerminalChannel::new();
        assert!(channel.stop().await.is_ok());
        assert!(channel.stop().await.is_ok());
    }
}
