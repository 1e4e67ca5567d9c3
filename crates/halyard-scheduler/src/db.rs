use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `cron_jobs` table (idempotent, integer primary key so ids
/// are assigned by SQLite's own rowid sequence), an index on `next_run`
/// for the tick query, and an append-only `cron_log` table recording one
/// row per execution attempt.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cron_jobs (
            id            INTEGER NOT NULL PRIMARY KEY,
            name          TEXT    NOT NULL,
            action        TEXT    NOT NULL,
            state         TEXT    NOT NULL DEFAULT 'active',
            schedule      TEXT    NOT NULL,
            interval_sec  INTEGER NOT NULL,
            next_run      INTEGER NOT NULL,
            last_run      INTEGER NOT NULL DEFAULT 0,
            run_count     INTEGER NOT NULL DEFAULT 0,
            fail_count    INTEGER NOT NULL DEFAULT 0,
            command       TEXT    NOT NULL,
            args          TEXT    NOT NULL DEFAULT '',
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cron_jobs_next_run ON cron_jobs (next_run);

        CREATE TABLE IF NOT EXISTS cron_log (
            id            INTEGER NOT NULL PRIMARY KEY,
            job_id        INTEGER NOT NULL,
            status        TEXT    NOT NULL,
            output        TEXT    NOT NULL DEFAULT '',
            executed_at   INTEGER NOT NULL,
            duration_ms   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_cron_log_job_id ON cron_log (job_id);
        ",
    )?;
    Ok(())
}
