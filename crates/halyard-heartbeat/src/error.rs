use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("task at line {line} not found or already marked complete")]
    NotFound { line: u32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HeartbeatError>;

impl From<HeartbeatError> for halyard_core::error::HalyardError {
    fn from(e: HeartbeatError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            HeartbeatError::InvalidInput(m) => HalyardError::InvalidInput(m),
            HeartbeatError::NotFound { line } => HalyardError::NotFound(format!("heartbeat task at line {line}")),
            HeartbeatError::Io(e) => HalyardError::Io(e),
        }
    }
}
