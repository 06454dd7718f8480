//! Configuration management and an authenticated client for the Quantive
//! Results API.

pub mod config;
pub mod quantive;
pub mod shared;

pub use config::{Config, ConfigManager};
pub use quantive::QuantiveClient;
pub use shared::error::{QuantiveError, Result};
