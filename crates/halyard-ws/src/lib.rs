//! Hand-rolled RFC 6455 WebSocket server for LAN-accessible agent
//! communication: raw TCP sockets, text frames only, one chat_id per
//! connection. Built on `tokio::net` directly (no `axum`, no
//! `tokio-tungstenite`); the handshake uses the `sha1` and `base64` crates
//! for the digest and encoding primitives.

mod error;
mod frame;
mod handshake;
mod server;

pub use error::WsError;
pub use frame::{Frame, MAX_FRAME_SIZE};
pub use handshake::accept_key;
pub use server::WsServer;
