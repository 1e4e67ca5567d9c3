use thiserror::Error;

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The token table is at its configured capacity.
    #[error("token store full: max {limit} tokens")]
    Full { limit: usize },

    /// No token matches the given string, or a token-scoped operation
    /// (revoke, allow-tool) targeted an unknown token.
    #[error("token not found")]
    NotFound,

    /// The tool is already present in the token's allowlist.
    #[error("tool already allowed")]
    AlreadyExists,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl From<AuthError> for halyard_core::error::HalyardError {
    fn from(e: AuthError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            AuthError::InvalidInput(m) => HalyardError::InvalidInput(m),
            AuthError::Full { limit } => HalyardError::Full(format!("token store full: max {limit}")),
            AuthError::NotFound => HalyardError::NotFound("token not found".into()),
            AuthError::AlreadyExists => HalyardError::AlreadyExists("tool already allowed".into()),
            AuthError::Database(e) => HalyardError::Database(e.to_string()),
        }
    }
}
