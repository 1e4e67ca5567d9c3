use thiserror::Error;

/// The flat error taxonomy shared across every core component.
///
/// Component crates (bus, auth, sessions, scheduler, ...) define their own
/// focused error enums and convert into this one at the orchestration
/// boundary — see each crate's `error.rs` for the narrower, crate-local
/// variant set.
#[derive(Debug, Error)]
pub enum HalyardError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Capacity exhausted: {0}")]
    Full(String),

    #[error("Bus queue full: {0}")]
    QueueFull(String),

    #[error("Arena out of space")]
    ArenaFull,

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Shutting down")]
    Eof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shield rejected input: {0}")]
    GrammarReject(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl HalyardError {
    /// Stable string code, used in log lines and in any user-facing surface
    /// (HTTP/WS error responses) that needs a machine-matchable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            HalyardError::InvalidInput(_) => "invalid_input",
            HalyardError::NotFound(_) => "not_found",
            HalyardError::AlreadyExists(_) => "already_exists",
            HalyardError::Full(_) => "full",
            HalyardError::QueueFull(_) => "queue_full",
            HalyardError::ArenaFull => "arena_full",
            HalyardError::Timeout { .. } => "timeout",
            HalyardError::Eof => "eof",
            HalyardError::Io(_) => "io",
            HalyardError::Config(_) => "config",
            HalyardError::GrammarReject(_) => "grammar_reject",
            HalyardError::PermissionDenied(_) => "permission_denied",
            HalyardError::Database(_) => "database",
        }
    }
}

pub type Result<T> = std::result::Result<T, HalyardError>;
