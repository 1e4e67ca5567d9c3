pub mod channel;
pub mod error;
pub mod send;

pub use channel::DiscordChannel;
pub use error::DiscordError;
