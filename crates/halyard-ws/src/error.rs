use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("client not found: {0}")]
    NotFound(i64),

    #[error("no message available")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("frame protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, WsError>;

impl From<WsError> for halyard_core::error::HalyardError {
    fn from(e: WsError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            WsError::InvalidInput(m) => HalyardError::InvalidInput(m),
            WsError::NotFound(id) => HalyardError::NotFound(format!("ws client {id}")),
            WsError::Timeout => HalyardError::Timeout { ms: 0 },
            WsError::Io(e) => HalyardError::Io(e),
            WsError::Handshake(m) => HalyardError::InvalidInput(format!("handshake: {m}")),
            WsError::Protocol(m) => HalyardError::InvalidInput(format!("protocol: {m}")),
        }
    }
}
