use rusqlite::Connection;

use crate::error::Result;

/// Initialise the tokens table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS auth_tokens (
            token          TEXT PRIMARY KEY,
            label          TEXT NOT NULL,
            permissions    INTEGER NOT NULL,
            created_at     INTEGER NOT NULL,
            expires_at     INTEGER NOT NULL DEFAULT 0,
            revoked        INTEGER NOT NULL DEFAULT 0,
            allowed_tools  TEXT NOT NULL DEFAULT ''
        );",
    )?;
    Ok(())
}
