use thiserror::Error;

/// Errors that can occur on the message bus.
///
/// `QueueFull` and `ArenaFull` are kept as distinct variants since they
/// carry different retry implications: a full queue means back off the
/// publisher, a full arena means the payload itself is the problem.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The target queue is at capacity — message dropped, never enqueued.
    #[error("queue full")]
    QueueFull,

    /// The arena could not hold the payload — message dropped, never enqueued.
    #[error("arena out of space")]
    ArenaFull,

    /// `consume*` found nothing to return (non-blocking path, or timeout=0).
    #[error("not found")]
    NotFound,

    /// A blocking consume's wait expired before a message arrived.
    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The bus has been shut down; blocked consumers unblock with this.
    #[error("bus shut down")]
    Eof,
}

pub type Result<T> = std::result::Result<T, BusError>;

impl From<BusError> for halyard_core::error::HalyardError {
    fn from(e: BusError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            BusError::InvalidInput(m) => HalyardError::InvalidInput(m),
            BusError::QueueFull => HalyardError::QueueFull("bus queue at capacity".into()),
            BusError::ArenaFull => HalyardError::ArenaFull,
            BusError::NotFound => HalyardError::NotFound("bus queue empty".into()),
            BusError::Timeout { ms } => HalyardError::Timeout { ms },
            BusError::Eof => HalyardError::Eof,
        }
    }
}
