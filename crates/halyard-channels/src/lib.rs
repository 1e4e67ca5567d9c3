pub mod channel;
pub mod error;
pub mod manager;
pub mod types;

pub use channel::{Channel, PollOutcome};
pub use error::ChannelError;
pub use manager::{dispatch_outbound, ChannelManager};
pub use types::{ChannelStatus, InboundMessage, MessageFormat, OutboundMessage};
