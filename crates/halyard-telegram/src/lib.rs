pub mod channel;
pub mod error;
pub mod send;

pub use channel::TelegramChannel;
pub use error::TelegramError;
