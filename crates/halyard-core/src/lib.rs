pub mod agent;
pub mod arena;
pub mod config;
pub mod error;
pub mod pii;
pub mod shield;
pub mod types;
