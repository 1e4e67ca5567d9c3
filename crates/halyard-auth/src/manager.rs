use std::sync::Mutex;

use rand::RngCore;
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, instrument};

use crate::error::{AuthError, Result};
use crate::types::{Permission, Token, MAX_ALLOWED_TOOLS, MAX_TOKENS};

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn generate_token_string() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn join_tools(tools: &[String]) -> String {
    tools.join(",")
}

fn split_tools(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(|s| s.to_string()).collect()
    }
}

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<Token> {
    let allowed_tools_raw: String = row.get(6)?;
    Ok(Token {
        token: row.get(0)?,
        label: row.get(1)?,
        permissions: row.get::<_, i64>(2)? as u32,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        revoked: row.get::<_, i64>(5)? != 0,
        allowed_tools: split_tools(&allowed_tools_raw),
    })
}

/// Bearer-token auth store: persisted in SQLite, validated per request.
///
/// When `enabled` is false every request is granted `Permission::All` — a
/// development-mode escape hatch for running without configured tokens.
pub struct AuthStore {
    db: Mutex<Connection>,
    enabled: bool,
}

impl AuthStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection, enabled: bool) -> Self {
        info!(enabled, "token auth initialised");
        Self {
            db: Mutex::new(conn),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Generate and persist a new token, returning the raw (unmasked)
    /// token string. Callers must display this exactly once.
    #[instrument(skip(self, label))]
    pub fn create_token(&self, label: &str, permissions: u32, expires_at: i64) -> Result<String> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row("SELECT COUNT(*) FROM auth_tokens", [], |r| r.get(0))?;
        if count as usize >= MAX_TOKENS {
            return Err(AuthError::Full { limit: MAX_TOKENS });
        }

        let token = generate_token_string();
        let created_at = now_unix();
        db.execute(
            "INSERT INTO auth_tokens (token, label, permissions, created_at, expires_at, revoked, allowed_tools)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, '')",
            rusqlite::params![token, label, permissions as i64, created_at, expires_at],
        )?;
        info!(label, permissions = format!("{permissions:#04x}"), expires_at, "token created");
        Ok(token)
    }

    fn lookup(&self, db: &Connection, token: &str) -> rusqlite::Result<Option<Token>> {
        db.query_row(
            "SELECT token, label, permissions, created_at, expires_at, revoked, allowed_tools
             FROM auth_tokens WHERE token = ?1",
            rusqlite::params![token],
            row_to_token,
        )
        .optional()
    }

    /// Returns the permissions bitmask for `token`, or `0` if it is
    /// missing, revoked, or expired. Dev mode (`enabled == false`) always
    /// returns `Permission::All`.
    pub fn validate(&self, token: &str) -> Result<u32> {
        if !self.enabled {
            return Ok(Permission::All.bit());
        }
        let db = self.db.lock().unwrap();
        let now = now_unix();
        match self.lookup(&db, token)? {
            Some(t) if t.is_active(now) => Ok(t.permissions),
            _ => Ok(0),
        }
    }

    pub fn has_permission(&self, token: &str, perm: Permission) -> Result<bool> {
        let perms = self.validate(token)?;
        Ok(perms & perm.bit() != 0)
    }

    #[instrument(skip(self))]
    pub fn revoke(&self, token: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute("UPDATE auth_tokens SET revoked = 1 WHERE token = ?1", rusqlite::params![token])?;
        if rows == 0 {
            return Err(AuthError::NotFound);
        }
        info!("token revoked");
        Ok(())
    }

    /// List every token, masked (first 8 hex chars visible, the rest
    /// replaced with `*`) — never the live token string.
    pub fn list(&self) -> Result<Vec<Token>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT token, label, permissions, created_at, expires_at, revoked, allowed_tools
             FROM auth_tokens ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_token)?;
        Ok(rows.filter_map(|r| r.ok()).map(|t| t.masked()).collect())
    }

    pub fn active_count(&self) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let now = now_unix();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM auth_tokens WHERE revoked = 0 AND (expires_at = 0 OR expires_at > ?1)",
            rusqlite::params![now],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    #[instrument(skip(self))]
    pub fn allow_tool(&self, token: &str, tool_name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let mut t = self.lookup(&db, token)?.ok_or(AuthError::NotFound)?;
        if t.allowed_tools.iter().any(|existing| existing == tool_name) {
            return Err(AuthError::AlreadyExists);
        }
        if t.allowed_tools.len() >= MAX_ALLOWED_TOOLS {
            return Err(AuthError::Full { limit: MAX_ALLOWED_TOOLS });
        }
        t.allowed_tools.push(tool_name.to_string());
        db.execute(
            "UPDATE auth_tokens SET allowed_tools = ?1 WHERE token = ?2",
            rusqlite::params![join_tools(&t.allowed_tools), token],
        )?;
        info!(tool_name, count = t.allowed_tools.len(), "tool allowlisted");
        Ok(())
    }

    /// `true` iff the token has `Permission::Tools` and either carries an
    /// empty allowlist (meaning "all tools") or lists `tool_name`
    /// explicitly. Dev mode bypasses this check entirely.
    pub fn can_call_tool(&self, token: &str, tool_name: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(true);
        }
        let db = self.db.lock().unwrap();
        let now = now_unix();
        let t = match self.lookup(&db, token)? {
            Some(t) if t.is_active(now) => t,
            _ => return Ok(false),
        };
        if !t.has_permission(Permission::Tools) {
            return Ok(false);
        }
        if t.allowed_tools.is_empty() {
            return Ok(true);
        }
        Ok(t.allowed_tools.iter().any(|allowed| allowed == tool_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(enabled: bool) -> AuthStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        AuthStore::new(conn, enabled)
    }

    #[test]
    fn creates_and_validates_a_token() {
        let s = store(true);
        let token = s.create_token("cli", Permission::Chat.bit() | Permission::Tools.bit(), 0).unwrap();
        let perms = s.validate(&token).unwrap();
        assert_eq!(perms, Permission::Chat.bit() | Permission::Tools.bit());
        assert!(s.has_permission(&token, Permission::Chat).unwrap());
        assert!(!s.has_permission(&token, Permission::Admin).unwrap());
    }

    #[test]
    fn unknown_token_has_no_permissions() {
        let s = store(true);
        assert_eq!(s.validate("deadbeef").unwrap(), 0);
    }

    #[test]
    fn dev_mode_grants_all() {
        let s = store(false);
        assert_eq!(s.validate("anything").unwrap(), Permission::All.bit());
        assert!(s.can_call_tool("anything", "shell_exec").unwrap());
    }

    #[test]
    fn revoke_disables_validation() {
        let s = store(true);
        let token = s.create_token("t", Permission::All.bit(), 0).unwrap();
        s.revoke(&token).unwrap();
        assert_eq!(s.validate(&token).unwrap(), 0);
        assert!(matches!(s.revoke(&token), Err(AuthError::NotFound) | Ok(())));
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = store(true);
        let token = s.create_token("t", Permission::All.bit(), now_unix() - 10).unwrap();
        assert_eq!(s.validate(&token).unwrap(), 0);
    }

    #[test]
    fn list_masks_token_strings() {
        let s = store(true);
        let token = s.create_token("t", Permission::Chat.bit(), 0).unwrap();
        let listed = s.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].token.starts_with(&token[..8]));
        assert!(listed[0].token[8..].chars().all(|c| c == '*'));
    }

    #[test]
    fn tool_allowlist_gates_can_call_tool() {
        let s = store(true);
        let token = s.create_token("t", Permission::Tools.bit(), 0).unwrap();
        assert!(s.can_call_tool(&token, "anything").unwrap());
        s.allow_tool(&token, "shell_exec").unwrap();
        assert!(s.can_call_tool(&token, "shell_exec").unwrap());
        assert!(!s.can_call_tool(&token, "read_file").unwrap());
        assert!(matches!(s.allow_tool(&token, "shell_exec"), Err(AuthError::AlreadyExists)));
    }

    #[test]
    fn can_call_tool_requires_tools_permission() {
        let s = store(true);
        let token = s.create_token("t", Permission::Chat.bit(), 0).unwrap();
        assert!(!s.can_call_tool(&token, "shell_exec").unwrap());
    }

    #[test]
    fn token_store_enforces_capacity() {
        let s = store(true);
        for i in 0..MAX_TOKENS {
            s.create_token(&format!("t{i}"), Permission::Chat.bit(), 0).unwrap();
        }
        assert!(matches!(s.create_token("overflow", Permission::Chat.bit(), 0), Err(AuthError::Full { .. })));
    }
}
