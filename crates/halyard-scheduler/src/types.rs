/// What a cron job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Run `command` via the host shell; failure = non-zero exit.
    Shell,
    /// Invoke a registered tool named `command` with `args`.
    Tool,
    /// Parse `args` as `"<channel>:<conv_id>"` and publish `command` as a
    /// `SystemEvent` inbound message.
    BusMessage,
    /// Publish a `SystemEvent` on the synthetic `"cron-agent"` channel.
    Agent,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Shell => "shell",
            ActionKind::Tool => "tool",
            ActionKind::BusMessage => "bus_message",
            ActionKind::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shell" => Some(ActionKind::Shell),
            "tool" => Some(ActionKind::Tool),
            "bus_message" => Some(ActionKind::BusMessage),
            "agent" => Some(ActionKind::Agent),
            _ => None,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Paused,
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Active => "active",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(JobState::Active),
            "paused" => Some(JobState::Paused),
            "completed" => Some(JobState::Completed),
            _ => None,
        }
    }
}

/// A persisted, schedulable job.
#[derive(Debug, Clone)]
pub struct CronJob {
    pub id: i64,
    pub name: String,
    pub action: ActionKind,
    pub state: JobState,
    /// The raw schedule string as given to `Add` (`"@every 30s"`,
    /// `"@once 1s"`, a five-field cron expression, ...).
    pub schedule: String,
    /// Computed fixed-interval seconds for `@every`/cron-subset schedules.
    /// `0` for a `@once` schedule (it never re-fires).
    pub interval_sec: u64,
    pub next_run: i64,
    pub last_run: i64,
    pub run_count: u64,
    pub fail_count: u64,
    pub command: String,
    pub args: String,
    pub created_at: i64,
}
