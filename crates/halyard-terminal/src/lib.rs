//! `halyard-terminal` — the synthetic local `"tui"` channel adapter.
//!
//! A single stdin/stdout conversation, always conversation id `0`. See
//! [`terminal::TerminalChannel`].

pub mod terminal;

pub use terminal::{TerminalChannel, CONVERSATION_ID, TRANSPORT};
