use rusqlite::Connection;

use crate::error::Result;

/// Initialise the session-metadata and message tables.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout, per the
/// "migrations are recreate-on-open" non-goal.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            key             TEXT PRIMARY KEY,
            channel         TEXT NOT NULL,
            chat_id         INTEGER NOT NULL,
            summary         TEXT,
            total_messages  INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL,
            last_active     INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS session_messages (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            session_key   TEXT NOT NULL,
            role          TEXT NOT NULL,
            content       TEXT NOT NULL,
            timestamp_ms  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_session_messages_key
            ON session_messages(session_key, id DESC);",
    )?;
    Ok(())
}
