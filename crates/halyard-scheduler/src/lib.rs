//! `halyard-scheduler` — cron-style job scheduler with SQLite persistence.
//!
//! # Overview
//!
//! Jobs are persisted to a SQLite `cron_jobs` table and their execution
//! history to an append-only `cron_log` table. [`engine::SchedulerEngine`]
//! ticks on a fixed cadence (configurable, defaulting to once a second) and
//! dispatches every `Active` job whose `next_run` has arrived.
//!
//! # Schedule strings
//!
//! | Form                  | Behaviour                                   |
//! |------------------------|---------------------------------------------|
//! | `@every <duration>`   | Repeat every `<duration>` (`30s`, `5m`, `2h`, `1d`, bare digits = seconds) |
//! | `@once <duration>`    | Fire once after `<duration>`, then `Completed` |
//! | five-field cron subset | `* * * * *`, `0 * * * *`, `0 0 * * *`, `*/N * * * *`; anything else falls back to 60s |
//!
//! # Action kinds
//!
//! `Shell` runs `command` through the host shell; `Tool` invokes a
//! [`halyard_core::agent::ToolInvoker`]; `BusMessage` and `Agent` publish
//! directly onto the shared [`halyard_bus::Bus`] — see [`engine`] for the
//! exact addressing rules.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use types::{ActionKind, CronJob, JobState};
