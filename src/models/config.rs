//! Configuration data model and validation

use crate::types::{AppError, Result, TestPlan};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Throughput server address (`host:port`)
    #[serde(default = "default_server_address")]
    pub server_address: String,

    /// Size of one transfer chunk in kilobytes
    #[serde(default = "default_block_size_kb")]
    pub block_size_kb: u32,

    /// Length of each test phase in seconds
    #[serde(default = "default_test_duration_secs")]
    pub test_duration_seconds: u64,

    /// Throughput sampling interval in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Extra time granted to download phases for the server's own start-up
    #[serde(default = "default_inbound_grace_secs")]
    pub inbound_grace_seconds: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_seconds: u64,

    /// Size of the pre-generated upload payload in bytes
    #[serde(default = "default_random_buffer_size")]
    pub random_buffer_size: usize,

    /// Phases to run
    #[serde(default)]
    pub test_plan: TestPlan,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            block_size_kb: default_block_size_kb(),
            test_duration_seconds: default_test_duration_secs(),
            sample_interval_ms: default_sample_interval_ms(),
            inbound_grace_seconds: default_inbound_grace_secs(),
            connect_timeout_seconds: default_connect_timeout_secs(),
            random_buffer_size: default_random_buffer_size(),
            test_plan: TestPlan::default(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> usize {
        self.block_size_kb as usize * 1024
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.server_address.trim().is_empty() {
            return Err(AppError::config("Server address cannot be empty"));
        }
        normalize_server_address(&self.server_address)?;

        if self.block_size_kb == 0 {
            return Err(AppError::config("Block size must be greater than 0"));
        }

        if self.block_size_kb > 4096 {
            return Err(AppError::config("Block size cannot exceed 4096 KB"));
        }

        if self.test_duration_seconds == 0 {
            return Err(AppError::config("Test duration must be greater than 0"));
        }

        if self.test_duration_seconds > 300 {
            return Err(AppError::config("Test duration cannot exceed 300 seconds"));
        }

        if self.sample_interval_ms < 10 {
            return Err(AppError::config("Sample interval must be at least 10ms"));
        }

        if self.sample_interval_ms > self.test_duration_seconds * 1000 {
            return Err(AppError::config(format!(
                "Sample interval of {}ms is longer than the {}s test duration",
                self.sample_interval_ms, self.test_duration_seconds
            )));
        }

        if self.inbound_grace_seconds > 30 {
            return Err(AppError::config("Inbound grace period cannot exceed 30 seconds"));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(AppError::config("Connect timeout must be greater than 0"));
        }

        if self.connect_timeout_seconds > 300 {
            return Err(AppError::config("Connect timeout cannot exceed 300 seconds"));
        }

        if self.random_buffer_size < self.chunk_size() * 2 {
            return Err(AppError::config(format!(
                "Random buffer of {} bytes must hold at least two {} KB chunks",
                self.random_buffer_size, self.block_size_kb
            )));
        }

        Ok(())
    }

    /// Runtime settings for the measurement pipeline
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            chunk_size: self.chunk_size(),
            test_duration: Duration::from_secs(self.test_duration_seconds),
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            inbound_grace: Duration::from_secs(self.inbound_grace_seconds),
            random_buffer_size: self.random_buffer_size,
            history_capacity: crate::defaults::HISTORY_CAPACITY,
        }
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server) = std::env::var("SERVER_ADDRESS") {
            let server = server.trim();
            if !server.is_empty() {
                self.server_address = server.to_string();
            }
        }

        if let Ok(block_size) = std::env::var("BLOCK_SIZE_KB") {
            self.block_size_kb = block_size.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid BLOCK_SIZE_KB value '{}': {}", block_size, e)))?;
        }

        if let Ok(duration) = std::env::var("TEST_DURATION_SECONDS") {
            self.test_duration_seconds = duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TEST_DURATION_SECONDS value '{}': {}", duration, e)))?;
        }

        if let Ok(interval) = std::env::var("SAMPLE_INTERVAL_MS") {
            self.sample_interval_ms = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SAMPLE_INTERVAL_MS value '{}': {}", interval, e)))?;
        }

        if let Ok(grace) = std::env::var("INBOUND_GRACE_SECONDS") {
            self.inbound_grace_seconds = grace.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid INBOUND_GRACE_SECONDS value '{}': {}", grace, e)))?;
        }

        if let Ok(timeout) = std::env::var("CONNECT_TIMEOUT_SECONDS") {
            self.connect_timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid CONNECT_TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(plan) = std::env::var("TEST_PLAN") {
            self.test_plan = plan.parse()
                .map_err(|e| AppError::config(format!("Invalid TEST_PLAN value '{}': {}", plan, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

/// Tunable parameters consumed by the transfer loop, sampler and runner
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    /// Bytes moved per chunk
    pub chunk_size: usize,
    /// Length of each phase
    pub test_duration: Duration,
    /// Sampling cadence
    pub sample_interval: Duration,
    /// Added to the deadline of download phases
    pub inbound_grace: Duration,
    /// Size of the circular upload payload
    pub random_buffer_size: usize,
    /// Rolling history length used for charts
    pub history_capacity: usize,
}

impl TransferSettings {
    /// Chunk size expressed in bits
    pub fn chunk_bits(&self) -> f64 {
        self.chunk_size as f64 * 8.0
    }

    /// Reject settings the transfer loop or sampler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::validation("Chunk size must be greater than 0"));
        }
        if self.sample_interval.is_zero() {
            return Err(AppError::validation("Sample interval must be greater than 0"));
        }
        if self.random_buffer_size < self.chunk_size {
            return Err(AppError::validation(format!(
                "Random buffer of {} bytes is smaller than one {} byte chunk",
                self.random_buffer_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Config::default().transfer_settings()
    }
}

/// Normalize a server address into `host:port`, appending the default port when missing
pub fn normalize_server_address(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AppError::validation("Server address cannot be empty"));
    }

    if address.parse::<SocketAddr>().is_ok() {
        return Ok(address.to_string());
    }

    // Bare IPv6 literal without port
    if let Ok(ip @ IpAddr::V6(_)) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, crate::defaults::DEFAULT_PORT).to_string());
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || host.contains(':') {
                return Err(AppError::validation(format!("Invalid server address: {}", address)));
            }
            port.parse::<u16>()
                .map_err(|_| AppError::validation(format!("Invalid port in server address: {}", address)))?;
            Ok(address.to_string())
        }
        None => {
            if address.contains(char::is_whitespace) {
                return Err(AppError::validation(format!("Invalid server address: {}", address)));
            }
            Ok(format!("{}:{}", address, crate::defaults::DEFAULT_PORT))
        }
    }
}

// Default value functions for serde
fn default_server_address() -> String {
    crate::defaults::DEFAULT_SERVER_ADDRESS.to_string()
}

fn default_block_size_kb() -> u32 {
    crate::defaults::DEFAULT_BLOCK_SIZE_KB
}

fn default_test_duration_secs() -> u64 {
    crate::defaults::DEFAULT_TEST_DURATION.as_secs()
}

fn default_sample_interval_ms() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_INTERVAL.as_millis() as u64
}

fn default_inbound_grace_secs() -> u64 {
    crate::defaults::DEFAULT_INBOUND_GRACE.as_secs()
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_random_buffer_size() -> usize {
    crate::defaults::DEFAULT_RANDOM_BUFFER_SIZE
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_server_invalid() {
        let mut config = Config::default();
        config.server_address = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_block_size_invalid() {
        let mut config = Config::default();
        config.block_size_kb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_longer_than_duration_invalid() {
        let mut config = Config::default();
        config.test_duration_seconds = 1;
        config.sample_interval_ms = 1500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_random_buffer_must_hold_two_chunks() {
        let mut config = Config::default();
        config.block_size_kb = 64;
        config.random_buffer_size = 64 * 1024;
        assert!(config.validate().is_err());

        config.random_buffer_size = 128 * 1024;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transfer_settings() {
        let mut config = Config::default();
        config.block_size_kb = 64;
        config.sample_interval_ms = 200;
        let settings = config.transfer_settings();

        assert_eq!(settings.chunk_size, 65536);
        assert_eq!(settings.chunk_bits(), 524288.0);
        assert_eq!(settings.sample_interval, Duration::from_millis(200));
        assert_eq!(settings.history_capacity, 70);
    }

    #[test]
    fn test_transfer_settings_validate() {
        assert!(TransferSettings::default().validate().is_ok());

        let mut settings = TransferSettings::default();
        settings.sample_interval = Duration::ZERO;
        let err = settings.validate().unwrap_err();
        assert_eq!(err.category(), "VALIDATION");
        assert!(err.to_string().contains("Sample interval"));

        let mut settings = TransferSettings::default();
        settings.chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = TransferSettings::default();
        settings.random_buffer_size = settings.chunk_size - 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_merge_from_env() {
        const VARS: [&str; 4] = ["SERVER_ADDRESS", "BLOCK_SIZE_KB", "TEST_PLAN", "SAMPLE_INTERVAL_MS"];

        std::env::set_var("SERVER_ADDRESS", " nas.local:9000 ");
        std::env::set_var("BLOCK_SIZE_KB", "128");
        std::env::set_var("TEST_PLAN", "upload");
        let mut config = Config::default();
        let merged = config.merge_from_env();

        std::env::set_var("SAMPLE_INTERVAL_MS", "fast");
        let mut broken = Config::default();
        let rejected = broken.merge_from_env();

        for var in VARS {
            std::env::remove_var(var);
        }

        merged.unwrap();
        assert_eq!(config.server_address, "nas.local:9000");
        assert_eq!(config.block_size_kb, 128);
        assert_eq!(config.test_plan, TestPlan::Upload);
        assert_eq!(rejected.unwrap_err().category(), "CONFIG");
    }

    #[test]
    fn test_normalize_server_address() {
        assert_eq!(normalize_server_address("10.0.0.1:9000").unwrap(), "10.0.0.1:9000");
        assert_eq!(normalize_server_address("speed.example.com").unwrap(), "speed.example.com:7121");
        assert_eq!(normalize_server_address("speed.example.com:80").unwrap(), "speed.example.com:80");
        assert_eq!(normalize_server_address("::1").unwrap(), "[::1]:7121");
        assert_eq!(normalize_server_address("[::1]:8000").unwrap(), "[::1]:8000");
        assert!(normalize_server_address("host:notaport").is_err());
        assert!(normalize_server_address(":80").is_err());
        assert!(normalize_server_address("").is_err());
    }
}
