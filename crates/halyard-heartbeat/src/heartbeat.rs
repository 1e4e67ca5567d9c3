use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use tracing::info;

use halyard_bus::{Bus, BusMessageKind};

use crate::error::{HeartbeatError, Result};
use crate::parser;
use crate::types::HEARTBEAT_FILE;

fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Scans `<workspace>/HEARTBEAT.md` for `- [ ]` checklist lines and
/// injects each as a system message onto the bus.
pub struct Heartbeat {
    path: PathBuf,
    interval_sec: u64,
    enabled: AtomicBool,
    last_check: AtomicU64,
    total_checks: AtomicU32,
    total_injected: AtomicU32,
}

impl Heartbeat {
    pub fn new(workspace_path: &str, interval_sec: u64) -> Self {
        let path = PathBuf::from(workspace_path).join(HEARTBEAT_FILE);
        info!(interval_sec, path = %path.display(), "heartbeat initialised");
        Self {
            path,
            interval_sec: if interval_sec > 0 { interval_sec } else { 1800 },
            enabled: AtomicBool::new(true),
            last_check: AtomicU64::new(0),
            total_checks: AtomicU32::new(0),
            total_injected: AtomicU32::new(0),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "heartbeat enable toggled");
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> u32 {
        self.total_checks.load(Ordering::SeqCst)
    }

    pub fn injected_count(&self) -> u32 {
        self.total_injected.load(Ordering::SeqCst)
    }

    async fn inject_pending(&self, bus: &Bus) -> Result<u32> {
        let tasks = parser::parse_file(&self.path)?;
        let mut injected = 0u32;
        for task in tasks.iter().filter(|t| !t.completed) {
            let prompt = format!("[Heartbeat] Pending task from HEARTBEAT.md: {}", task.text);
            let _ = bus
                .publish_inbound(BusMessageKind::SystemEvent, "heartbeat", "system", 0, prompt.as_bytes())
                .await;
            injected += 1;
            info!(text = %task.text, "heartbeat task injected");
        }
        Ok(injected)
    }

    /// Called periodically (see the gateway's heartbeat task). No-ops if
    /// disabled or if less than `interval_sec` has passed since the last
    /// check — callers can tick as often as they like without needing
    /// their own rate limiting.
    pub async fn tick(&self, bus: &Bus) -> Result<u32> {
        if !self.enabled() {
            return Ok(0);
        }
        let now = now_epoch();
        let last = self.last_check.load(Ordering::SeqCst);
        if last > 0 && now.saturating_sub(last) < self.interval_sec {
            return Ok(0);
        }
        self.last_check.store(now, Ordering::SeqCst);
        self.total_checks.fetch_add(1, Ordering::SeqCst);

        let injected = self.inject_pending(bus).await?;
        self.total_injected.fetch_add(injected, Ordering::SeqCst);
        if injected > 0 {
            info!(checks = self.check_count(), injected, "heartbeat check complete");
        }
        Ok(injected)
    }

    /// Force an immediate check, bypassing the interval gate.
    pub async fn trigger(&self, bus: &Bus) -> Result<u32> {
        if !self.enabled() {
            return Ok(0);
        }
        self.last_check.store(now_epoch(), Ordering::SeqCst);
        self.total_checks.fetch_add(1, Ordering::SeqCst);

        let injected = self.inject_pending(bus).await?;
        self.total_injected.fetch_add(injected, Ordering::SeqCst);
        info!(injected, "heartbeat manual trigger");
        Ok(injected)
    }

    /// Mark the checklist line at `line` (1-indexed, as reported by
    /// [`crate::parser::parse`]) complete by flipping `- [ ]` to `- [x]`.
    /// Calling this twice on the same line returns
    /// [`HeartbeatError::NotFound`] the second time — the line no longer
    /// contains `- [ ]` to flip.
    pub fn complete(&self, line: u32) -> Result<()> {
        if line == 0 {
            return Err(HeartbeatError::InvalidInput("line must be >= 1".into()));
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let mut found = false;
        let mut rebuilt = String::with_capacity(contents.len());
        for (idx, raw_line) in contents.split_inclusive('\n').enumerate() {
            if (idx + 1) as u32 == line {
                if let Some(pos) = raw_line.find("- [ ]") {
                    let mut replaced = raw_line.to_string();
                    replaced.replace_range(pos..pos + 5, "- [x]");
                    rebuilt.push_str(&replaced);
                    found = true;
                    continue;
                }
            }
            rebuilt.push_str(raw_line);
        }
        if !found {
            return Err(HeartbeatError::NotFound { line });
        }
        std::fs::write(&self.path, rebuilt)?;
        info!(line, "heartbeat task completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_heartbeat(dir: &std::path::Path, body: &str) {
        std::fs::write(dir.join(HEARTBEAT_FILE), body).unwrap();
    }

    #[tokio::test]
    async fn trigger_injects_only_pending_tasks() {
        let dir = std::env::temp_dir().join(format!("halyard-hb-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_heartbeat(&dir, "- [ ] pending one\n- [x] done one\n- [ ] pending two\n");

        let hb = Heartbeat::new(dir.to_str().unwrap(), 3600);
        let bus = Bus::new(16, 16, 4096);
        let injected = hb.trigger(&bus).await.unwrap();
        assert_eq!(injected, 2);
        assert_eq!(hb.injected_count(), 2);
        assert_eq!(hb.check_count(), 1);

        let m1 = bus.consume_inbound(0).await.unwrap();
        assert!(m1.content.contains("pending one"));
        let m2 = bus.consume_inbound(0).await.unwrap();
        assert!(m2.content.contains("pending two"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn tick_respects_interval_gate() {
        let dir = std::env::temp_dir().join(format!("halyard-hb-test-gate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_heartbeat(&dir, "- [ ] only task\n");

        let hb = Heartbeat::new(dir.to_str().unwrap(), 3600);
        let bus = Bus::new(16, 16, 4096);
        assert_eq!(hb.tick(&bus).await.unwrap(), 1);
        assert_eq!(hb.tick(&bus).await.unwrap(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn complete_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("halyard-hb-test-complete-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_heartbeat(&dir, "- [ ] finish the report\n");

        let hb = Heartbeat::new(dir.to_str().unwrap(), 3600);
        hb.complete(1).unwrap();
        let contents = std::fs::read_to_string(hb.path()).unwrap();
        assert!(contents.contains("- [x] finish the report"));

        assert!(matches!(hb.complete(1), Err(HeartbeatError::NotFound { line: 1 })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn complete_rejects_unknown_line() {
        let dir = std::env::temp_dir().join(format!("halyard-hb-test-unknown-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_heartbeat(&dir, "- [ ] only task\n");

        let hb = Heartbeat::new(dir.to_str().unwrap(), 3600);
        assert!(matches!(hb.complete(99), Err(HeartbeatError::NotFound { line: 99 })));

        std::fs::remove_dir_all(&dir).ok();
    }
}
