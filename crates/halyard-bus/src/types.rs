/// The four message kinds that can travel across the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMessageKind {
    UserInput,
    SystemEvent,
    ToolResult,
    Outbound,
}

/// An immutable, fully-owned message record.
///
/// Every `BusMessage` owns its bytes outright (plain `String`s) rather than
/// pointing into a shared arena, so a consumer can hold one indefinitely
/// without risking a stale reference after a reset. The arena is still
/// used for payload-size accounting, not as a backing store for these
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub kind: BusMessageKind,
    pub channel: String,
    pub sender_id: String,
    pub conversation_id: i64,
    pub content: String,
    /// `"<channel>:<conversation_id>"` — derived once at publish time.
    pub session_key: String,
    /// Monotonic publish timestamp, milliseconds.
    pub timestamp_ms: u64,
}

/// Build the canonical session key for a (channel, conversation) pair.
pub fn session_key(channel: &str, conversation_id: i64) -> String {
    format!("{channel}:{conversation_id}")
}
