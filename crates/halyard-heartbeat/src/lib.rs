//! Proactive heartbeat: periodically scans `HEARTBEAT.md` for pending
//! checklist tasks and injects each one onto the message bus as a system
//! event.

mod error;
mod heartbeat;
mod parser;
mod types;

pub use error::HeartbeatError;
pub use heartbeat::Heartbeat;
pub use parser::parse;
pub use types::{Task, HEARTBEAT_FILE, MAX_TASKS};
