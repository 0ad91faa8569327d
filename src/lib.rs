//! Network Throughput Tester
//!
//! Measures download and upload bandwidth against a throughput server. Each
//! phase moves fixed-size chunks over a dedicated TCP connection for a fixed
//! duration; chunk completions are sampled into per-interval rates which are
//! folded into running current/max/average statistics and pushed to a
//! display sink.

pub mod cli;
pub mod config;
pub mod connector;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod output;
pub mod protocol;
pub mod runner;
pub mod sampler;
pub mod stats;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, TransferSettings};
pub use types::{RateSample, TestDirection, TestPlan};
pub use stats::{DirectionStats, StatisticsAggregator, ThroughputSummary};
pub use sampler::{RollingHistory, ThroughputSampler};
pub use transfer::{TransferOutcome, TransferResult, TransferSession};
pub use runner::{PhaseReport, RunReport, TestRunner};
pub use connector::{Connector, TcpConnector};
pub use output::{ConsoleSink, DisplaySink, MemorySink, OutputSinkFactory};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata injected by the build script
pub mod build_info {
    pub const BUILD_TIME: &str = env!("BUILD_TIME");
    pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");
    pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

    /// One-line description used by `--debug`
    pub fn describe() -> String {
        format!(
            "{} v{} ({}, built {}, commit {})",
            crate::PKG_NAME,
            crate::VERSION,
            TARGET_TRIPLE,
            BUILD_TIME,
            GIT_COMMIT.unwrap_or("unknown"),
        )
    }
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PORT: u16 = 7121;
    pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:7121";
    pub const DEFAULT_BLOCK_SIZE_KB: u32 = 64;
    pub const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_INBOUND_GRACE: Duration = Duration::from_secs(2);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_RANDOM_BUFFER_SIZE: usize = 10 * 1024 * 1024;
    /// Samples kept for charting
    pub const HISTORY_CAPACITY: usize = 70;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
