pub mod channel;
pub mod error;

pub use channel::SlackChannel;
pub use error::SlackError;
