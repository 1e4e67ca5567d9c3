use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use halyard_bus::Bus;

use crate::channel::{Channel, PollOutcome};
use crate::types::ChannelStatus;

/// Delay before a poll worker retries after its channel returns a
/// non-timeout, non-ok error.
const POLL_RETRY_DELAY_SECS: u64 = 5;

struct Registered {
    channel: Arc<dyn Channel>,
    status: Arc<StdMutex<ChannelStatus>>,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

/// Owns every registered channel adapter and the long-lived tasks that
/// drive them.
///
/// One independent poll loop per channel (so a wedged adapter cannot
/// starve the others) plus a single outbound dispatcher that drains the
/// bus's outbound queue and routes each message to its named channel.
pub struct ChannelManager {
    channels: HashMap<String, Registered>,
}

impl ChannelManager {
    /// Create an empty manager with no registered channels.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    ///
    /// If a channel with the same name is already registered it is replaced.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registering channel adapter");
        self.channels.insert(
            name,
            Registered {
                channel,
                status: Arc::new(StdMutex::new(ChannelStatus::Stopped)),
                worker: StdMutex::new(None),
            },
        );
    }

    /// Return the named channel, if registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).map(|r| r.channel.clone())
    }

    /// Return the current [`ChannelStatus`] for every registered channel,
    /// sorted by name for deterministic output.
    pub fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result: Vec<(String, ChannelStatus)> = self
            .channels
            .iter()
            .map(|(name, r)| (name.clone(), r.status.lock().unwrap().clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Initialise and start every registered channel, then spawn a
    /// long-lived poll worker per channel.
    ///
    /// A channel whose `init` or `start` fails is marked `Error` and has no
    /// worker spawned for it; the remaining channels still start.
    pub async fn start_all(&self, bus: Arc<Bus>) {
        for (name, reg) in self.channels.iter() {
            if let Err(e) = reg.channel.init(bus.clone()).await {
                error!(channel = %name, error = %e, "channel init failed, skipping");
                *reg.status.lock().unwrap() = ChannelStatus::Error(e.to_string());
                continue;
            }
            *reg.status.lock().unwrap() = ChannelStatus::Starting;
            if let Err(e) = reg.channel.start().await {
                error!(channel = %name, error = %e, "channel start failed, skipping");
                *reg.status.lock().unwrap() = ChannelStatus::Error(e.to_string());
                continue;
            }
            *reg.status.lock().unwrap() = ChannelStatus::Running;

            let channel = reg.channel.clone();
            let status = reg.status.clone();
            let name_owned = name.clone();
            let handle = tokio::spawn(poll_loop(name_owned, channel, status));
            *reg.worker.lock().unwrap() = Some(handle);
        }
    }

    /// Stop every registered channel and its poll worker.
    ///
    /// Sets each channel's status to `Stopped` (the worker observes this on
    /// its next iteration and exits on its own), calls `stop` to unblock any
    /// in-flight read, aborts the worker task as a backstop, then calls
    /// `destroy` to release adapter resources.
    pub async fn stop_all(&self) {
        for (name, reg) in self.channels.iter() {
            *reg.status.lock().unwrap() = ChannelStatus::Stopped;
            if let Err(e) = reg.channel.stop().await {
                warn!(channel = %name, error = %e, "error while stopping channel");
            }
            if let Some(handle) = reg.worker.lock().unwrap().take() {
                handle.abort();
            }
            if let Err(e) = reg.channel.destroy().await {
                warn!(channel = %name, error = %e, "error while destroying channel");
            }
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll one channel until its status leaves `Running`.
///
/// On a poll error the worker records `Error`, sleeps
/// [`POLL_RETRY_DELAY_SECS`], then resumes polling as `Running` — unless
/// `stop_all` changed the status to `Stopped` in the meantime, in which
/// case the loop exits instead of resuming.
async fn poll_loop(name: String, channel: Arc<dyn Channel>, status: Arc<StdMutex<ChannelStatus>>) {
    loop {
        if *status.lock().unwrap() != ChannelStatus::Running {
            info!(channel = %name, "poll worker observed non-running status, exiting");
            return;
        }
        match channel.poll().await {
            Ok(PollOutcome::Processed(n)) => {
                if n > 0 {
                    debug!(channel = %name, count = n, "processed inbound messages");
                }
            }
            Ok(PollOutcome::Timeout) => {}
            Err(e) => {
                warn!(channel = %name, error = %e, "poll failed, backing off");
                *status.lock().unwrap() = ChannelStatus::Error(e.to_string());
                sleep(Duration::from_secs(POLL_RETRY_DELAY_SECS)).await;
                let mut guard = status.lock().unwrap();
                if *guard == ChannelStatus::Stopped {
                    return;
                }
                *guard = ChannelStatus::Running;
            }
        }
    }
}

/// Drain the bus's outbound queue and deliver each message through its
/// addressed channel's `send`.
///
/// A message whose channel is unregistered or not currently `Running` is
/// dropped and logged rather than requeued — outbound delivery is
/// best-effort. Returns the number of messages successfully dispatched.
pub async fn dispatch_outbound(bus: &Bus, manager: &ChannelManager) -> u32 {
    let mut dispatched = 0u32;
    loop {
        let msg = match bus.consume_outbound().await {
            Ok(msg) => msg,
            Err(_) => break,
        };

        let Some(reg) = manager.channels.get(&msg.channel) else {
            warn!(channel = %msg.channel, "dropping outbound message for unknown channel");
            continue;
        };
        if *reg.status.lock().unwrap() != ChannelStatus::Running {
            warn!(channel = %msg.channel, "dropping outbound message for non-running channel");
            continue;
        }
        match reg.channel.send(msg.conversation_id, &msg.content).await {
            Ok(()) => dispatched += 1,
            Err(e) => error!(channel = %msg.channel, error = %e, "failed to send outbound message"),
        }
    }
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockChannel {
        name: String,
        processed_then_timeout: AtomicU32,
        sent: StdMutex<Vec<(i64, String)>>,
    }

    impl MockChannel {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                processed_then_timeout: AtomicU32::new(0),
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            &self.name
        }
        async fn init(&self, _bus: Arc<Bus>) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn start(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn poll(&self) -> Result<PollOutcome, ChannelError> {
            if self.processed_then_timeout.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(PollOutcome::Processed(1))
            } else {
                sleep(Duration::from_millis(5)).await;
                Ok(PollOutcome::Timeout)
            }
        }
        async fn send(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
        async fn stop(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn destroy(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn register_and_get_roundtrip() {
        let mut mgr = ChannelManager::new();
        mgr.register(Arc::new(MockChannel::new("mock")));
        assert!(mgr.get("mock").is_some());
        assert!(mgr.get("missing").is_none());
    }

    #[tokio::test]
    async fn start_all_marks_channels_running() {
        let mut mgr = ChannelManager::new();
        mgr.register(Arc::new(MockChannel::new("mock")));
        let bus = Arc::new(Bus::with_defaults());
        mgr.start_all(bus).await;
        sleep(Duration::from_millis(20)).await;
        let statuses = mgr.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].0, "mock");
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn stop_all_marks_channels_stopped() {
        let mut mgr = ChannelManager::new();
        mgr.register(Arc::new(MockChannel::new("mock")));
        let bus = Arc::new(Bus::with_defaults());
        mgr.start_all(bus).await;
        mgr.stop_all().await;
        let statuses = mgr.statuses();
        assert_eq!(statuses[0].1, ChannelStatus::Stopped);
    }

    #[tokio::test]
    async fn dispatch_outbound_routes_to_named_channel() {
        let mut mgr = ChannelManager::new();
        mgr.register(Arc::new(MockChannel::new("mock")));
        let bus = Arc::new(Bus::with_defaults());
        mgr.start_all(bus.clone()).await;
        sleep(Duration::from_millis(5)).await;

        bus.publish_outbound("mock", 42, b"hello").await.unwrap();
        bus.publish_outbound("unknown-channel", 1, b"dropped").await.unwrap();

        let count = dispatch_outbound(&bus, &mgr).await;
        assert_eq!(count, 1);

        mgr.stop_all().await;
    }
}
