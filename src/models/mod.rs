//! Data models and structures for the network throughput tester

pub mod config;

// Re-export main model types
pub use config::{Config, TransferSettings, normalize_server_address};
