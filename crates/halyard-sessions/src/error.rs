use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist.
    #[error("session not found: {key}")]
    NotFound { key: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The provided session key string is malformed.
    ///
    /// Expected format: `"<transport>:<conversation_id>"`.
    #[error("invalid session key: {0}")]
    InvalidKey(String),

    /// Summarisation was attempted with no `LanguageModel` configured.
    #[error("no language model configured for summarisation")]
    NoLanguageModel,
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for halyard_core::error::HalyardError {
    fn from(e: SessionError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            SessionError::NotFound { key } => HalyardError::NotFound(key),
            SessionError::Database(err) => HalyardError::Database(err.to_string()),
            SessionError::InvalidKey(m) => HalyardError::InvalidInput(m),
            SessionError::NoLanguageModel => {
                HalyardError::Config("no language model configured".into())
            }
        }
    }
}
