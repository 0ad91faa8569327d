//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::normalize_server_address;
use crate::types::TestPlan;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Throughput Tester Configuration
#
# Values here act as defaults and can be overridden by command-line
# arguments.

# Throughput server (host or host:port, default port 7121)
# SERVER_ADDRESS=192.168.1.10:7121

# Transfer chunk size in kilobytes
# BLOCK_SIZE_KB=64

# Length of each test phase in seconds
# TEST_DURATION_SECONDS=10

# Sampling interval in milliseconds
# SAMPLE_INTERVAL_MS=200

# Extra seconds allowed for the server to start a download phase
# INBOUND_GRACE_SECONDS=2

# Connection timeout in seconds
# CONNECT_TIMEOUT_SECONDS=10

# Phases to run: both, download or upload
# TEST_PLAN=both

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example configurations for different scenarios:
#
# Quick upload check against a LAN host:
# SERVER_ADDRESS=nas.local
# TEST_PLAN=upload
# TEST_DURATION_SECONDS=5
#
# Fast links with smoother charts:
# BLOCK_SIZE_KB=256
# SAMPLE_INTERVAL_MS=100
"#
        .to_string()
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "SERVER_ADDRESS" => {
                normalize_server_address(value)
                    .map_err(|e| AppError::config(format!("Invalid SERVER_ADDRESS value '{}': {}", value, e)))?;
            }
            "BLOCK_SIZE_KB" => {
                Self::check_range(key, value, 1, 4096)?;
            }
            "TEST_DURATION_SECONDS" => {
                Self::check_range(key, value, 1, 300)?;
            }
            "SAMPLE_INTERVAL_MS" => {
                Self::check_range(key, value, 10, 300_000)?;
            }
            "INBOUND_GRACE_SECONDS" => {
                Self::check_range(key, value, 0, 30)?;
            }
            "CONNECT_TIMEOUT_SECONDS" => {
                Self::check_range(key, value, 1, 300)?;
            }
            "TEST_PLAN" => {
                value
                    .parse::<TestPlan>()
                    .map_err(|e| AppError::config(format!("Invalid TEST_PLAN value '{}': {}", value, e)))?;
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    fn check_range(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
        let parsed: u64 = value
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
        if parsed < min || parsed > max {
            return Err(AppError::config(format!(
                "{} must be between {} and {}, got: {}",
                key, min, max, parsed
            )));
        }
        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SERVER_ADDRESS", "Throughput server as host or host:port", "192.168.1.10:7121"),
            ("BLOCK_SIZE_KB", "Transfer chunk size in KB (1-4096)", "64"),
            ("TEST_DURATION_SECONDS", "Length of each phase in seconds (1-300)", "10"),
            ("SAMPLE_INTERVAL_MS", "Sampling interval in milliseconds (>= 10)", "200"),
            ("INBOUND_GRACE_SECONDS", "Extra download deadline in seconds (0-30)", "2"),
            ("CONNECT_TIMEOUT_SECONDS", "Connection timeout in seconds (1-300)", "10"),
            ("TEST_PLAN", "Phases to run: both, download, upload", "both"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Full `--env-help` text for the .env file in the working directory
    pub fn env_help_report() -> Result<String> {
        Self::env_help_report_at(Path::new(".env"))
    }

    /// Supported variables, an example file, then any problems found in the
    /// current environment and in the env file at `path`
    pub fn env_help_report_at(path: &Path) -> Result<String> {
        let mut report = Self::display_env_help();
        report.push_str("\nExample .env file:\n\n");
        report.push_str(&Self::create_example_env_content());

        let mut issues = Self::validate_current_env();
        if let Some(file_warnings) = Self::check_env_file_at(path)? {
            issues.extend(
                file_warnings
                    .into_iter()
                    .map(|warning| format!("{}: {}", path.display(), warning)),
            );
        }

        if !issues.is_empty() {
            report.push_str("\nProblems found:\n");
            for issue in issues {
                report.push_str(&format!("  {}\n", issue));
            }
        }

        Ok(report)
    }

    /// Validate every assignment in an env file without loading it
    pub fn check_env_file_at(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    if let Err(e) = Self::validate_env_var(key.trim(), value.trim().trim_matches('"')) {
                        warnings.push(format!("Line '{}': {}", line, e));
                    }
                }
                None => warnings.push(format!("Line '{}': expected KEY=VALUE", line)),
            }
        }

        Ok(Some(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();

        for (name, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("SERVER_ADDRESS", "10.0.0.5").is_ok());
        assert!(EnvManager::validate_env_var("SERVER_ADDRESS", "nas.local:9000").is_ok());
        assert!(EnvManager::validate_env_var("BLOCK_SIZE_KB", "64").is_ok());
        assert!(EnvManager::validate_env_var("SAMPLE_INTERVAL_MS", "200").is_ok());
        assert!(EnvManager::validate_env_var("INBOUND_GRACE_SECONDS", "0").is_ok());
        assert!(EnvManager::validate_env_var("TEST_PLAN", "upload").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("SOMETHING_ELSE", "whatever").is_ok());

        assert!(EnvManager::validate_env_var("SERVER_ADDRESS", "").is_err());
        assert!(EnvManager::validate_env_var("SERVER_ADDRESS", "host:notaport").is_err());
        assert!(EnvManager::validate_env_var("BLOCK_SIZE_KB", "0").is_err());
        assert!(EnvManager::validate_env_var("TEST_DURATION_SECONDS", "301").is_err());
        assert!(EnvManager::validate_env_var("SAMPLE_INTERVAL_MS", "5").is_err());
        assert!(EnvManager::validate_env_var("INBOUND_GRACE_SECONDS", "31").is_err());
        assert!(EnvManager::validate_env_var("CONNECT_TIMEOUT_SECONDS", "abc").is_err());
        assert!(EnvManager::validate_env_var("TEST_PLAN", "sideways").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();

        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("SERVER_ADDRESS"));
        assert!(help.contains("Configuration Priority"));
    }

    #[test]
    fn test_check_env_file_reports_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "SERVER_ADDRESS=10.0.0.5:7121").unwrap();
        writeln!(file, "BLOCK_SIZE_KB=0").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "TEST_PLAN=\"download\"").unwrap();

        let warnings = EnvManager::check_env_file_at(file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("BLOCK_SIZE_KB"));
        assert!(warnings[1].contains("expected KEY=VALUE"));
    }

    #[test]
    fn test_check_missing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EnvManager::check_env_file_at(&dir.path().join(".env")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_env_help_report_lists_env_file_problems() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SAMPLE_INTERVAL_MS=2").unwrap();
        writeln!(file, "TEST_DURATION_SECONDS=5").unwrap();

        let report = EnvManager::env_help_report_at(file.path()).unwrap();
        assert!(report.contains("Supported Environment Variables:"));
        assert!(report.contains("Example .env file:"));
        assert!(report.contains("Network Throughput Tester Configuration"));
        assert!(report.contains("Problems found:"));
        assert!(report.contains("Line 'SAMPLE_INTERVAL_MS=2'"));
        assert!(!report.contains("Line 'TEST_DURATION_SECONDS=5'"));
    }

    #[test]
    fn test_env_help_report_without_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = EnvManager::env_help_report_at(&dir.path().join(".env")).unwrap();
        assert!(report.contains("Example .env file:"));
    }
}
