//! Bearer-token authentication: a permission bitmask per token, persisted in
//! SQLite, validated per request. Token generation uses `rand::rngs::OsRng`
//! directly, with no weaker fallback path.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::AuthError;
pub use manager::AuthStore;
pub use types::{Permission, Token, MAX_ALLOWED_TOOLS, MAX_TOKENS};
