pub const MAX_TASKS: usize = 256;
pub const TASK_TEXT_MAX: usize = 512;
pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";

/// One checklist line parsed out of `HEARTBEAT.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    pub completed: bool,
    /// 1-indexed line number within the file, used by [`crate::Heartbeat::complete`].
    pub line: u32,
}
