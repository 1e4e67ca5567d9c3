use thiserror::Error;

/// Errors that can occur within the cron scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("job not found: {id}")]
    NotFound { id: i64 },

    #[error("job table is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("bus error: {0}")]
    Bus(#[from] halyard_bus::BusError),

    #[error("job action failed: {0}")]
    ActionFailed(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for halyard_core::error::HalyardError {
    fn from(e: SchedulerError) -> Self {
        use halyard_core::error::HalyardError;
        match e {
            SchedulerError::Database(err) => HalyardError::Database(err.to_string()),
            SchedulerError::InvalidSchedule(m) => HalyardError::InvalidInput(m),
            SchedulerError::NotFound { id } => HalyardError::NotFound(id.to_string()),
            SchedulerError::Full { capacity } => {
                HalyardError::Full(format!("cron job table at capacity ({capacity})"))
            }
            SchedulerError::Bus(e) => HalyardError::Io(std::io::Error::other(e.to_string())),
            SchedulerError::ActionFailed(m) => HalyardError::Io(std::io::Error::other(m)),
        }
    }
}
