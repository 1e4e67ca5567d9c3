use std::collections::VecDeque;

use halyard_core::types::SessionKey;

/// Upper bound on the in-memory ring kept per session, regardless of
/// `max_history`/`keep_recent` configuration invariant. Persistence
/// keeps the full history; only the in-memory ring is capped here.
pub const MAX_RING_SIZE: usize = 50;

/// Role tag for a single turn in a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// A single role-tagged turn held in a session's in-memory ring.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp_ms: u64,
}

/// Per-`(transport, conversation_id)` conversation state.
pub struct Session {
    pub key: SessionKey,
    pub transport: String,
    pub conv_id: i64,
    /// Newest-last ring, capped at [`MAX_RING_SIZE`].
    pub history: VecDeque<Message>,
    /// Replaces older turns once the ring has been compacted by
    /// [`crate::manager::SessionManager::summarise`].
    pub summary: Option<String>,
    pub total_messages: u64,
    pub created_at_ms: u64,
    pub last_active_ms: u64,
}

impl Session {
    pub fn new(key: SessionKey, transport: String, conv_id: i64, now_ms: u64) -> Self {
        Self {
            key,
            transport,
            conv_id,
            history: VecDeque::new(),
            summary: None,
            total_messages: 0,
            created_at_ms: now_ms,
            last_active_ms: now_ms,
        }
    }

    pub fn history_count(&self) -> usize {
        self.history.len()
    }
}
