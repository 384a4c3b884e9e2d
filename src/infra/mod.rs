//! Infrastructure - configuration and persistence
//!
//! - `config` - Application configuration (TOML loading, defaults, seeds)
//! - `store` - In-memory store for zones, sensors, barrier and events

pub mod config;
pub mod store;

pub use config::Config;
pub use store::Store;
