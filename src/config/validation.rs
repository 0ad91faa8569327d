//! Configuration validation utilities and rules

use crate::{
    defaults::HISTORY_CAPACITY,
    error::Result,
    models::{normalize_server_address, Config},
    types::TestPlan,
};
use colored::*;
use std::net::{IpAddr, SocketAddr};

/// Configuration validator producing advisory warnings on top of hard checks
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run `Config::validate` and collect warnings about questionable settings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_server(&config.server_address)?);
        warnings.extend(Self::validate_transfer_settings(config));

        Ok(warnings)
    }

    /// Checks on the target server address
    fn validate_server(address: &str) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();
        let normalized = normalize_server_address(address)?;

        if let Ok(socket) = normalized.parse::<SocketAddr>() {
            match socket.ip() {
                IpAddr::V4(ip) if ip.is_loopback() => warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Server {} is on this machine; results reflect loopback speed", normalized),
                )),
                IpAddr::V6(ip) if ip.is_loopback() => warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Server {} is on this machine; results reflect loopback speed", normalized),
                )),
                IpAddr::V4(ip) if ip.is_unspecified() => warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Server address {} is unspecified and may not be reachable", normalized),
                )),
                _ => {}
            }

            if socket.port() != crate::defaults::DEFAULT_PORT {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Using non-standard port {}", socket.port()),
                ));
            }
        }

        Ok(warnings)
    }

    /// Checks on timing and chunk parameters
    fn validate_transfer_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.test_duration_seconds < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Test duration of {}s may end before the connection reaches steady state (recommended: >= 3)",
                    config.test_duration_seconds
                ),
            ));
        }

        let samples_per_phase = config.test_duration_seconds * 1000 / config.sample_interval_ms.max(1);
        if samples_per_phase < 5 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Only {} samples per phase at a {}ms interval; averages will be coarse",
                    samples_per_phase, config.sample_interval_ms
                ),
            ));
        } else if samples_per_phase > HISTORY_CAPACITY as u64 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Charts show the most recent {} of {} samples per phase",
                    HISTORY_CAPACITY, samples_per_phase
                ),
            ));
        }

        if config.block_size_kb < 4 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Block size of {}KB makes each rate step coarse and adds per-chunk overhead",
                    config.block_size_kb
                ),
            ));
        } else if config.block_size_kb > 1024 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Block size of {}KB means slow links may complete few chunks per interval",
                    config.block_size_kb
                ),
            ));
        }

        let runs_download = matches!(config.test_plan, TestPlan::Both | TestPlan::Download);
        if runs_download && config.inbound_grace_seconds == 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "No inbound grace period; the download phase may stop before the server finishes".to_string(),
            ));
        }

        if config.connect_timeout_seconds > 60 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Long connect timeout of {}s will slow down failure detection",
                    config.connect_timeout_seconds
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server_address: "192.168.1.20:7121".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_lan_config_has_no_warnings() {
        let warnings = validate_config(&config()).unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = config();
        config.block_size_kb = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_loopback_and_port_info() {
        let mut config = config();
        config.server_address = "127.0.0.1:9000".to_string();

        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().all(|w| w.level == ValidationLevel::Info));
        assert!(warnings.iter().any(|w| w.message.contains("loopback")));
        assert!(warnings.iter().any(|w| w.message.contains("non-standard port 9000")));
    }

    #[test]
    fn test_short_and_coarse_settings_warn() {
        let mut config = config();
        config.test_duration_seconds = 1;
        config.sample_interval_ms = 500;
        config.block_size_kb = 1;
        config.inbound_grace_seconds = 0;

        let warnings = validate_config(&config).unwrap();
        let warning_count = warnings.iter().filter(|w| w.level == ValidationLevel::Warning).count();
        assert_eq!(warning_count, 4);
    }

    #[test]
    fn test_zero_grace_fine_for_upload_only() {
        let mut config = config();
        config.inbound_grace_seconds = 0;
        config.test_plan = TestPlan::Upload;

        assert!(validate_config(&config).unwrap().is_empty());
    }

    #[test]
    fn test_long_runs_note_chart_window() {
        let mut config = config();
        config.test_duration_seconds = 60;

        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("most recent 70 of 300")));
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "check this".to_string());
        assert_eq!(warning.format(false), "[WARNING] check this");
        assert!(warning.format(true).contains("check this"));
    }
}
