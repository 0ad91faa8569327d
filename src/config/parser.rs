//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{normalize_server_address, Config},
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build the configuration: defaults, then .env, then environment, then CLI
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config)?;

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        self.cli.validate().map_err(AppError::validation)?;

        if let Some(server) = self.cli.server_address() {
            config.server_address = server.trim().to_string();
        }

        if let Some(port) = self.cli.port {
            config.server_address = with_port(&config.server_address, port)?;
        }

        if let Some(block_size) = self.cli.block_size {
            config.block_size_kb = block_size;
        }

        if let Some(duration) = self.cli.duration {
            config.test_duration_seconds = duration;
        }

        if let Some(interval) = self.cli.interval {
            config.sample_interval_ms = interval;
        }

        if let Some(grace) = self.cli.grace {
            config.inbound_grace_seconds = grace;
        }

        if let Some(timeout) = self.cli.connect_timeout {
            config.connect_timeout_seconds = timeout;
        }

        if let Some(plan) = self.cli.plan {
            config.test_plan = plan;
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color {
            config.enable_color = false;
        } else {
            config.enable_color = config.enable_color && self.cli.use_colors();
        }

        // CLI-only flags
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: server={}, block={}KB, duration={}s, interval={}ms, plan={}",
                config.server_address,
                config.block_size_kb,
                config.test_duration_seconds,
                config.sample_interval_ms,
                config.test_plan
            );
        }

        Ok(())
    }
}

/// Replace the port of an address, adding one if it had none
fn with_port(address: &str, port: u16) -> Result<String> {
    let normalized = normalize_server_address(address)?;
    let (host, _) = normalized
        .rsplit_once(':')
        .ok_or_else(|| AppError::validation(format!("Invalid server address: {}", address)))?;
    Ok(format!("{}:{}", host, port))
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Server: {}", config.server_address));
    summary.push(format!("Test Plan: {}", config.test_plan));
    summary.push(format!("Block Size: {}KB", config.block_size_kb));
    summary.push(format!("Test Duration: {}s", config.test_duration_seconds));
    summary.push(format!("Sample Interval: {}ms", config.sample_interval_ms));
    summary.push(format!("Inbound Grace: {}s", config.inbound_grace_seconds));
    summary.push(format!("Connect Timeout: {}s", config.connect_timeout_seconds));
    summary.push(format!("Upload Buffer: {} bytes", config.random_buffer_size));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
