use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use halyard_core::arena::Arena;

use crate::error::{BusError, Result};
use crate::types::{session_key, BusMessage, BusMessageKind};

/// Default capacity of each bounded queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Two bounded FIFO queues — inbound and outbound — sharing one payload
/// arena. See the module-level docs in [`crate`] for the ordering and
/// failure-mode guarantees.
pub struct Bus {
    inbound: Mutex<VecDeque<BusMessage>>,
    inbound_notify: Notify,
    outbound: Mutex<VecDeque<BusMessage>>,
    outbound_notify: Notify,
    /// Payload byte-accounting only (see [`crate::types::BusMessage`] docs
    /// for why message bytes are owned directly rather than arena-backed).
    arena: StdMutex<Arena>,
    inbound_capacity: usize,
    outbound_capacity: usize,
    running: AtomicBool,
}

impl Bus {
    pub fn new(inbound_capacity: usize, outbound_capacity: usize, arena_capacity: usize) -> Self {
        Self {
            inbound: Mutex::new(VecDeque::with_capacity(inbound_capacity)),
            inbound_notify: Notify::new(),
            outbound: Mutex::new(VecDeque::with_capacity(outbound_capacity)),
            outbound_notify: Notify::new(),
            arena: StdMutex::new(Arena::new(arena_capacity)),
            inbound_capacity,
            outbound_capacity,
            running: AtomicBool::new(true),
        }
    }

    /// Convenience constructor using the default sizing (256-entry queues,
    /// 1 MiB of arena accounting).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY, 1024 * 1024)
    }

    fn account(&self, bytes: &[u8]) -> Result<()> {
        let mut arena = self.arena.lock().unwrap();
        arena.alloc_copy(bytes).map(|_| ()).ok_or(BusError::ArenaFull)
    }

    /// Publish a message onto the inbound queue. Never blocks: a full queue
    /// returns [`BusError::QueueFull`] immediately.
    pub async fn publish_inbound(
        &self,
        kind: BusMessageKind,
        channel: &str,
        sender_id: &str,
        conversation_id: i64,
        content: &[u8],
    ) -> Result<()> {
        if channel.is_empty() {
            return Err(BusError::InvalidInput("channel must not be empty".into()));
        }
        let mut q = self.inbound.lock().await;
        if q.len() >= self.inbound_capacity {
            warn!(channel, "inbound queue full, dropping message");
            return Err(BusError::QueueFull);
        }
        self.account(content)?;
        let msg = BusMessage {
            kind,
            channel: channel.to_string(),
            sender_id: sender_id.to_string(),
            conversation_id,
            content: String::from_utf8_lossy(content).into_owned(),
            session_key: session_key(channel, conversation_id),
            timestamp_ms: now_ms(),
        };
        debug!(channel, conversation_id, len = content.len(), "inbound published");
        q.push_back(msg);
        self.inbound_notify.notify_one();
        Ok(())
    }

    /// Consume from the inbound queue. `timeout_ms == 0` is strictly
    /// non-blocking (returns [`BusError::NotFound`] on an empty queue);
    /// otherwise blocks up to `timeout_ms`, returning
    /// [`BusError::Timeout`] on expiry and [`BusError::Eof`] if the bus is
    /// shut down while waiting.
    pub async fn consume_inbound(&self, timeout_ms: u64) -> Result<BusMessage> {
        if timeout_ms == 0 {
            let mut q = self.inbound.lock().await;
            return q.pop_front().ok_or(BusError::NotFound);
        }

        let wait = async {
            loop {
                let notified = self.inbound_notify.notified();
                {
                    let mut q = self.inbound.lock().await;
                    if let Some(msg) = q.pop_front() {
                        return Ok(msg);
                    }
                    if !self.running.load(Ordering::SeqCst) {
                        return Err(BusError::Eof);
                    }
                }
                notified.await;
            }
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout { ms: timeout_ms }),
        }
    }

    /// Publish onto the outbound queue. `kind` is always `Outbound`;
    /// `sender_id` is unused by convention.
    pub async fn publish_outbound(&self, channel: &str, conversation_id: i64, content: &[u8]) -> Result<()> {
        if channel.is_empty() {
            return Err(BusError::InvalidInput("channel must not be empty".into()));
        }
        let mut q = self.outbound.lock().await;
        if q.len() >= self.outbound_capacity {
            warn!(channel, "outbound queue full, dropping message");
            return Err(BusError::QueueFull);
        }
        self.account(content)?;
        let msg = BusMessage {
            kind: BusMessageKind::Outbound,
            channel: channel.to_string(),
            sender_id: String::new(),
            conversation_id,
            content: String::from_utf8_lossy(content).into_owned(),
            session_key: session_key(channel, conversation_id),
            timestamp_ms: now_ms(),
        };
        q.push_back(msg);
        self.outbound_notify.notify_one();
        Ok(())
    }

    /// Always non-blocking: returns [`BusError::NotFound`] on an empty queue.
    pub async fn consume_outbound(&self) -> Result<BusMessage> {
        let mut q = self.outbound.lock().await;
        q.pop_front().ok_or(BusError::NotFound)
    }

    /// Linear scan for the first outbound message addressed to `channel`.
    /// Removes it in place, preserving the relative order of survivors —
    /// i.e. FIFO within each channel's subsequence, without disturbing
    /// ordering across the rest of the queue. This is the resolution the
    /// spec asks implementers to pick for mixing this call with
    /// [`Bus::consume_outbound`].
    pub async fn consume_outbound_for_channel(&self, channel: &str) -> Result<BusMessage> {
        let mut q = self.outbound.lock().await;
        let pos = q.iter().position(|m| m.channel == channel).ok_or(BusError::NotFound)?;
        Ok(q.remove(pos).expect("position came from iter().position() over the same deque"))
    }

    /// Reset the payload-accounting arena. Acquires the inbound mutex
    /// before the outbound one — a fixed order documented to prevent
    /// deadlock with any other pair of holders. Since [`BusMessage`]
    /// fields are owned (not arena-backed), this cannot invalidate any
    /// message a caller is holding; it only reclaims the accounting space
    /// used to detect [`BusError::ArenaFull`].
    pub async fn reset_arena(&self) {
        let _inbound_guard = self.inbound.lock().await;
        let _outbound_guard = self.outbound.lock().await;
        self.arena.lock().unwrap().reset();
    }

    pub async fn inbound_count(&self) -> usize {
        self.inbound.lock().await.len()
    }

    pub async fn outbound_count(&self) -> usize {
        self.outbound.lock().await.len()
    }

    /// Shut the bus down: every blocked `consume_inbound` wakes and
    /// returns [`BusError::Eof`].
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.inbound_notify.notify_waiters();
        self.outbound_notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(bus: &Bus) -> &Bus {
        bus
    }

    #[tokio::test]
    async fn fifo_single_producer() {
        let bus = Bus::new(16, 16, 4096);
        for i in 0..5 {
            bus.publish_inbound(BusMessageKind::UserInput, "telegram", "u1", 100, format!("m{i}").as_bytes())
                .await
                .unwrap();
        }
        for i in 0..5 {
            let m = bus.consume_inbound(0).await.unwrap();
            assert_eq!(m.content, format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn capacity_enforced_and_recoverable() {
        let bus = Bus::new(4, 4, 4096);
        for _ in 0..4 {
            bus.publish_inbound(BusMessageKind::UserInput, "c", "s", 1, b"x").await.unwrap();
        }
        assert!(matches!(
            bus.publish_inbound(BusMessageKind::UserInput, "c", "s", 1, b"x").await,
            Err(BusError::QueueFull)
        ));
        assert_eq!(bus.inbound_count().await, 4);
        bus.consume_inbound(0).await.unwrap();
        bus.publish_inbound(BusMessageKind::UserInput, "c", "s", 1, b"y").await.unwrap();
        assert_eq!(bus.inbound_count().await, 4);
    }

    #[tokio::test]
    async fn session_key_is_derived() {
        let bus = Bus::new(4, 4, 4096);
        bus.publish_inbound(BusMessageKind::UserInput, "telegram", "42", 100, b"hello")
            .await
            .unwrap();
        let m = bus.consume_inbound(0).await.unwrap();
        assert_eq!(m.session_key, "telegram:100");
    }

    #[tokio::test]
    async fn non_blocking_consume_returns_not_found_on_empty() {
        let bus = Bus::new(4, 4, 4096);
        assert!(matches!(bus.consume_inbound(0).await, Err(BusError::NotFound)));
        assert!(matches!(bus.consume_outbound().await, Err(BusError::NotFound)));
    }

    #[tokio::test]
    async fn blocking_consume_times_out() {
        let bus = Bus::new(4, 4, 4096);
        let start = tokio::time::Instant::now();
        let r = bus.consume_inbound(20).await;
        assert!(matches!(r, Err(BusError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn blocking_consume_wakes_on_publish() {
        let bus = std::sync::Arc::new(Bus::new(4, 4, 4096));
        let bus2 = bus.clone();
        let handle = tokio::spawn(async move { bus2.consume_inbound(2000).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish_inbound(BusMessageKind::UserInput, "c", "s", 1, b"hi").await.unwrap();
        let got = handle.await.unwrap().unwrap();
        assert_eq!(got.content, "hi");
    }

    #[tokio::test]
    async fn shutdown_wakes_blocked_consumers_with_eof() {
        let bus = std::sync::Arc::new(Bus::new(4, 4, 4096));
        let bus2 = bus.clone();
        let handle = tokio::spawn(async move { bus2.consume_inbound(2000).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.shutdown();
        let r = handle.await.unwrap();
        assert!(matches!(r, Err(BusError::Eof)));
    }

    #[tokio::test]
    async fn consume_outbound_for_channel_preserves_fifo_within_channel() {
        let bus = Bus::new(16, 16, 4096);
        bus.publish_outbound("telegram", 1, b"t1").await.unwrap();
        bus.publish_outbound("discord", 2, b"d1").await.unwrap();
        bus.publish_outbound("telegram", 1, b"t2").await.unwrap();

        let first = bus.consume_outbound_for_channel("telegram").await.unwrap();
        assert_eq!(first.content, "t1");
        let next_any = bus.consume_outbound().await.unwrap();
        assert_eq!(next_any.content, "d1");
        let second = bus.consume_outbound_for_channel("telegram").await.unwrap();
        assert_eq!(second.content, "t2");
    }

    #[tokio::test]
    async fn concurrent_producers_preserve_multiset() {
        let bus = std::sync::Arc::new(Bus::new(512, 4, 1024 * 1024));
        let mut handles = Vec::new();
        for p in 0..4 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    bus.publish_inbound(BusMessageKind::UserInput, "c", "s", p, format!("{p}-{i}").as_bytes())
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let mut seen = Vec::new();
        while let Ok(m) = bus.consume_inbound(0).await {
            seen.push(m.content);
        }
        assert_eq!(seen.len(), 200);
        let mut expected: Vec<String> = (0..4).flat_map(|p| (0..50).map(move |i| format!("{p}-{i}"))).collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
        msg(&bus);
    }
}
