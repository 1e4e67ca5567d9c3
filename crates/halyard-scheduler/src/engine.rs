use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};

use halyard_bus::{Bus, BusMessageKind};
use halyard_core::agent::ToolInvoker;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    schedule,
    types::{ActionKind, CronJob, JobState},
};

/// Cron-fired `Agent` messages are truncated to this many bytes before
/// publication, mirroring the bus's own payload-accounting limit.
const MAX_AGENT_CONTENT_LEN: usize = 4096;

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A shared, `Clone`-free handle is unnecessary here — `SchedulerEngine`
/// itself is `Send + Sync` and is wrapped in an `Arc` by its caller when a
/// handle is needed from more than one task (e.g. a WS admin endpoint
/// alongside the tick loop).
///
/// Core scheduler: persists jobs to SQLite and dispatches every job whose
/// `next_run` has arrived on each [`SchedulerEngine::tick`].
///
/// A fixed-capacity job table, `@every`/`@once`/cron-subset schedules (see
/// [`crate::schedule`]), and synchronous dispatch-by-kind on each tick
/// rather than a per-job task.
pub struct SchedulerEngine {
    conn: StdMutex<Connection>,
    /// Monotonically increasing job id counter, seeded from the database's
    /// current max id at startup. Ids are never reused, even after a job
    /// is removed — the explicit resolution for what a removed job's slot
    /// becomes.
    next_id: AtomicI64,
    capacity: usize,
    bus: Option<Arc<Bus>>,
    tools: Arc<dyn ToolInvoker>,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    ///
    /// `bus` is required to dispatch `BusMessage`/`Agent` actions — pass
    /// `None` only when the deployment has no such jobs. `tools` backs the
    /// `Tool` action kind; pass [`halyard_core::agent::NoToolInvoker`] when
    /// no tool registry is wired up.
    pub fn new(
        conn: Connection,
        capacity: usize,
        bus: Option<Arc<Bus>>,
        tools: Arc<dyn ToolInvoker>,
    ) -> Result<Self> {
        init_db(&conn)?;
        let max_id: i64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM cron_jobs", [], |row| row.get(0))
            .unwrap_or(0);
        Ok(Self {
            conn: StdMutex::new(conn),
            next_id: AtomicI64::new(max_id + 1),
            capacity,
            bus,
            tools,
        })
    }

    /// Register a new job and persist it. Returns the assigned id.
    pub fn add(
        &self,
        name: &str,
        action: ActionKind,
        schedule_str: &str,
        command: &str,
        args: &str,
    ) -> Result<i64> {
        let parsed = schedule::parse(schedule_str)?;
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cron_jobs", [], |row| row.get(0))?;
        if count as usize >= self.capacity {
            return Err(SchedulerError::Full { capacity: self.capacity });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = now_unix();
        let next_run = now + parsed.interval_sec as i64;

        conn.execute(
            "INSERT INTO cron_jobs
             (id, name, action, state, schedule, interval_sec, next_run,
              last_run, run_count, fail_count, command, args, created_at)
             VALUES (?1,?2,?3,'active',?4,?5,?6,0,0,0,?7,?8,?9)",
            rusqlite::params![
                id,
                name,
                action.as_str(),
                schedule_str,
                parsed.interval_sec as i64,
                next_run,
                command,
                args,
                now,
            ],
        )?;
        info!(job_id = id, %name, "cron job added");
        Ok(id)
    }

    /// Remove a job by id. Returns `NotFound` if no row is deleted.
    pub fn remove(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM cron_jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::NotFound { id });
        }
        info!(job_id = id, "cron job removed");
        Ok(())
    }

    /// Pause a job — it is skipped by `tick` until [`Self::resume`]s.
    pub fn pause(&self, id: i64) -> Result<()> {
        self.set_state(id, JobState::Paused)
    }

    /// Resume a paused job, recomputing `next_run` from the current time.
    pub fn resume(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let interval_sec: i64 = conn
            .query_row(
                "SELECT interval_sec FROM cron_jobs WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .map_err(|_| SchedulerError::NotFound { id })?;
        let next_run = now_unix() + interval_sec;
        let n = conn.execute(
            "UPDATE cron_jobs SET state = 'active', next_run = ?2 WHERE id = ?1",
            rusqlite::params![id, next_run],
        )?;
        if n == 0 {
            return Err(SchedulerError::NotFound { id });
        }
        info!(job_id = id, "cron job resumed");
        Ok(())
    }

    fn set_state(&self, id: i64, state: JobState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE cron_jobs SET state = ?2 WHERE id = ?1",
            rusqlite::params![id, state.as_str()],
        )?;
        if n == 0 {
            return Err(SchedulerError::NotFound { id });
        }
        Ok(())
    }

    /// Return all known jobs ordered by id.
    pub fn list(&self) -> Result<Vec<CronJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, action, state, schedule, interval_sec, next_run,
                    last_run, run_count, fail_count, command, args, created_at
             FROM cron_jobs ORDER BY id",
        )?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(jobs)
    }

    /// Return a single job by id.
    pub fn get(&self, id: i64) -> Result<CronJob> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, action, state, schedule, interval_sec, next_run,
                    last_run, run_count, fail_count, command, args, created_at
             FROM cron_jobs WHERE id = ?1",
            [id],
            row_to_job,
        )
        .map_err(|_| SchedulerError::NotFound { id })
    }

    /// Dispatch every `Active` job whose `next_run` has arrived.
    ///
    /// Returns the number of jobs executed (successfully or not — a failed
    /// action still advances `next_run` and increments `fail_count`, except
    /// for a `@once` job, which becomes `Completed` after its single fire
    /// regardless of outcome).
    pub async fn tick(&self) -> Result<u32> {
        let now = now_unix();
        let due: Vec<CronJob> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, name, action, state, schedule, interval_sec, next_run,
                        last_run, run_count, fail_count, command, args, created_at
                 FROM cron_jobs WHERE state = 'active' AND next_run <= ?1",
            )?;
            stmt.query_map([now], row_to_job)?.filter_map(|r| r.ok()).collect()
        };

        let mut executed = 0u32;
        for job in due {
            let outcome = self.dispatch(&job).await;
            let success = outcome.is_ok();
            if let Err(ref e) = outcome {
                warn!(job_id = job.id, name = %job.name, error = %e, "cron job action failed");
            }

            let once = job.interval_sec == 0;
            let new_next_run = if once { job.next_run } else { now + job.interval_sec as i64 };
            let new_state = if once { JobState::Completed } else { JobState::Active };
            let output = outcome.unwrap_or_default();

            {
                let conn = self.conn.lock().unwrap();
                conn.execute(
                    "UPDATE cron_jobs SET state=?1, last_run=?2, next_run=?3,
                       run_count=run_count+1, fail_count=fail_count+?4
                     WHERE id=?5",
                    rusqlite::params![new_state.as_str(), now, new_next_run, !success as i64, job.id],
                )?;
                conn.execute(
                    "INSERT INTO cron_log (job_id, status, output, executed_at, duration_ms)
                     VALUES (?1,?2,?3,?4,0)",
                    rusqlite::params![
                        job.id,
                        if success { "ok" } else { "error" },
                        output,
                        now,
                    ],
                )?;
            }

            executed += 1;
        }
        Ok(executed)
    }

    /// Dispatch a single job's action and return its textual output.
    async fn dispatch(&self, job: &CronJob) -> Result<String> {
        match job.action {
            ActionKind::Shell => {
                let output = tokio::process::Command::new("sh")
                    .arg("-c")
                    .arg(&job.command)
                    .output()
                    .await
                    .map_err(|e| SchedulerError::ActionFailed(format!("shell spawn failed: {e}")))?;
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
                } else {
                    Err(SchedulerError::ActionFailed(format!(
                        "shell exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr)
                    )))
                }
            }
            ActionKind::Tool => self
                .tools
                .invoke(&job.command, &job.args)
                .await
                .map_err(|e| SchedulerError::ActionFailed(e.to_string())),
            ActionKind::BusMessage => {
                let bus = self
                    .bus
                    .as_ref()
                    .ok_or_else(|| SchedulerError::ActionFailed("no bus configured".into()))?;
                let (channel, conv_id) = parse_bus_target(&job.args);
                bus.publish_inbound(
                    BusMessageKind::SystemEvent,
                    &channel,
                    "cron",
                    conv_id,
                    job.command.as_bytes(),
                )
                .await?;
                Ok(String::new())
            }
            ActionKind::Agent => {
                let bus = self
                    .bus
                    .as_ref()
                    .ok_or_else(|| SchedulerError::ActionFailed("no bus configured".into()))?;
                let mut content = format!("[Cron:{}] {}", job.name, job.command);
                if content.len() > MAX_AGENT_CONTENT_LEN {
                    content.truncate(MAX_AGENT_CONTENT_LEN);
                }
                bus.publish_inbound(BusMessageKind::SystemEvent, "cron-agent", "cron", 0, content.as_bytes())
                    .await?;
                Ok(String::new())
            }
        }
    }

    /// Drive `tick` on `tick_secs` cadence until `shutdown` broadcasts `true`.
    pub async fn run(self: Arc<Self>, tick_secs: u64, mut shutdown: watch::Receiver<bool>) {
        info!("cron scheduler started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(n) if n > 0 => info!(executed = n, "cron tick executed jobs"),
                        Ok(_) => {}
                        Err(e) => error!("cron tick error: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Parse a `BusMessage` action's `args` as `"<channel>:<conv_id>"`.
/// Falls back to channel `"system"`, conversation id `0` when there is no
/// colon, the channel half is empty, or the id half does not parse.
fn parse_bus_target(args: &str) -> (String, i64) {
    match args.rsplit_once(':') {
        Some((channel, conv)) if !channel.is_empty() => {
            let conv_id = conv.parse::<i64>().unwrap_or(0);
            (channel.to_string(), conv_id)
        }
        _ => ("system".to_string(), 0),
    }
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<CronJob> {
    let action_str: String = row.get(2)?;
    let state_str: String = row.get(3)?;
    Ok(CronJob {
        id: row.get(0)?,
        name: row.get(1)?,
        action: ActionKind::parse(&action_str).unwrap_or(ActionKind::Shell),
        state: JobState::parse(&state_str).unwrap_or(JobState::Paused),
        schedule: row.get(4)?,
        interval_sec: row.get::<_, i64>(5)? as u64,
        next_run: row.get(6)?,
        last_run: row.get(7)?,
        run_count: row.get::<_, i64>(8)? as u64,
        fail_count: row.get::<_, i64>(9)? as u64,
        command: row.get(10)?,
        args: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_core::agent::NoToolInvoker;

    fn make_engine() -> SchedulerEngine {
        let conn = Connection::open_in_memory().unwrap();
        SchedulerEngine::new(conn, 32, None, Arc::new(NoToolInvoker)).unwrap()
    }

    #[test]
    fn add_assigns_monotonic_ids() {
        let engine = make_engine();
        let id1 = engine.add("a", ActionKind::Shell, "@every 30s", "true", "").unwrap();
        let id2 = engine.add("b", ActionKind::Shell, "@every 30s", "true", "").unwrap();
        assert!(id2 > id1);
    }

    #[test]
    fn remove_unknown_job_is_not_found() {
        let engine = make_engine();
        assert!(matches!(engine.remove(999), Err(SchedulerError::NotFound { id: 999 })));
    }

    #[test]
    fn pause_then_resume_recomputes_next_run() {
        let engine = make_engine();
        let id = engine.add("a", ActionKind::Shell, "@every 100s", "true", "").unwrap();
        engine.pause(id).unwrap();
        assert_eq!(engine.get(id).unwrap().state, JobState::Paused);
        engine.resume(id).unwrap();
        let job = engine.get(id).unwrap();
        assert_eq!(job.state, JobState::Active);
        assert!(job.next_run >= now_unix());
    }

    #[test]
    fn capacity_is_enforced() {
        let engine = {
            let conn = Connection::open_in_memory().unwrap();
            SchedulerEngine::new(conn, 1, None, Arc::new(NoToolInvoker)).unwrap()
        };
        engine.add("a", ActionKind::Shell, "@every 30s", "true", "").unwrap();
        let result = engine.add("b", ActionKind::Shell, "@every 30s", "true", "");
        assert!(matches!(result, Err(SchedulerError::Full { capacity: 1 })));
    }

    #[tokio::test]
    async fn tick_executes_due_shell_job() {
        let engine = make_engine();
        let id = engine.add("a", ActionKind::Shell, "@once 0s", "true", "").unwrap();
        let executed = engine.tick().await.unwrap();
        assert_eq!(executed, 1);
        let job = engine.get(id).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.run_count, 1);
    }

    #[tokio::test]
    async fn tick_skips_jobs_not_yet_due() {
        let engine = make_engine();
        engine.add("a", ActionKind::Shell, "@every 3600s", "true", "").unwrap();
        let executed = engine.tick().await.unwrap();
        assert_eq!(executed, 0);
    }

    #[tokio::test]
    async fn failed_shell_job_increments_fail_count() {
        let engine = make_engine();
        let id = engine
            .add("a", ActionKind::Shell, "@once 0s", "exit 1", "")
            .unwrap();
        engine.tick().await.unwrap();
        let job = engine.get(id).unwrap();
        assert_eq!(job.fail_count, 1);
    }

    #[tokio::test]
    async fn bus_message_action_publishes_inbound() {
        let bus = Arc::new(Bus::with_defaults());
        let engine = SchedulerEngine::new(
            Connection::open_in_memory().unwrap(),
            32,
            Some(bus.clone()),
            Arc::new(NoToolInvoker),
        )
        .unwrap();
        engine
            .add("notify", ActionKind::BusMessage, "@once 0s", "hello", "websocket:7")
            .unwrap();
        engine.tick().await.unwrap();
        assert_eq!(bus.inbound_count().await, 1);
    }

    #[test]
    fn parse_bus_target_defaults_to_system() {
        assert_eq!(parse_bus_target("no-colon-here"), ("system".to_string(), 0));
        assert_eq!(parse_bus_target("websocket:42"), ("websocket".to_string(), 42));
    }
}
