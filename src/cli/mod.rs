//! Command-line interface

use crate::types::TestPlan;
use clap::Parser;

/// Network Throughput Tester - measure download and upload bandwidth against a throughput server
#[derive(Parser, Debug, Clone)]
#[command(name = "ntt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Throughput server as host or host:port
    #[arg(value_name = "SERVER")]
    pub server_positional: Option<String>,

    /// Throughput server as host or host:port
    #[arg(long = "server", value_name = "SERVER", conflicts_with = "server_positional")]
    pub server: Option<String>,

    /// Server port, replacing any port given with the server
    #[arg(long, value_parser = parse_port)]
    pub port: Option<u16>,

    /// Transfer chunk size in KB
    #[arg(short = 'b', long = "block-size", value_name = "KB", value_parser = parse_block_size)]
    pub block_size: Option<u32>,

    /// Length of each test phase in seconds
    #[arg(short, long, value_name = "SECONDS", value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Sampling interval in milliseconds
    #[arg(short, long, value_name = "MS", value_parser = parse_interval)]
    pub interval: Option<u64>,

    /// Phases to run: both, download or upload
    #[arg(long, value_parser = parse_plan)]
    pub plan: Option<TestPlan>,

    /// Extra seconds added to the download deadline for server start-up
    #[arg(long, value_name = "SECONDS", value_parser = parse_grace)]
    pub grace: Option<u64>,

    /// Connection timeout in seconds
    #[arg(short = 't', long = "connect-timeout", value_name = "SECONDS", value_parser = parse_duration)]
    pub connect_timeout: Option<u64>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print every summary refresh on its own line and log phase events
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print the final report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Show supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let (Some(duration), Some(interval)) = (self.duration, self.interval) {
            if interval > duration * 1000 {
                return Err(format!(
                    "Interval of {}ms is longer than the {}s test duration",
                    interval, duration
                ));
            }
        }

        Ok(())
    }

    /// Server given either positionally or with --server
    pub fn server_address(&self) -> Option<&str> {
        self.server.as_deref().or(self.server_positional.as_deref())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Command Line:\n");
        if let Some(server) = self.server_address() {
            summary.push_str(&format!("  Server: {}\n", server));
        }
        if let Some(port) = self.port {
            summary.push_str(&format!("  Port: {}\n", port));
        }
        if let Some(block_size) = self.block_size {
            summary.push_str(&format!("  Block size: {}KB\n", block_size));
        }
        if let Some(duration) = self.duration {
            summary.push_str(&format!("  Duration: {}s\n", duration));
        }
        if let Some(interval) = self.interval {
            summary.push_str(&format!("  Interval: {}ms\n", interval));
        }
        if let Some(plan) = self.plan {
            summary.push_str(&format!("  Plan: {}\n", plan));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

fn parse_bounded(s: &str, what: &str, min: u64, max: u64) -> Result<u64, String> {
    // Reject strings with leading + sign or other invalid formats
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid {}: {}", what, s));
    }

    let value = s.parse::<u64>().map_err(|_| format!("Invalid {}: {}", what, s))?;
    if value < min || value > max {
        return Err(format!("{} must be between {} and {}", capitalize(what), min, max));
    }
    Ok(value)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    parse_bounded(s, "duration", 1, 300)
}

fn parse_interval(s: &str) -> Result<u64, String> {
    parse_bounded(s, "interval", 10, 300_000)
}

fn parse_grace(s: &str) -> Result<u64, String> {
    parse_bounded(s, "grace period", 0, 30)
}

fn parse_block_size(s: &str) -> Result<u32, String> {
    parse_bounded(s, "block size", 1, 4096).map(|kb| kb as u32)
}

fn parse_port(s: &str) -> Result<u16, String> {
    parse_bounded(s, "port", 1, u16::MAX as u64).map(|port| port as u16)
}

fn parse_plan(s: &str) -> Result<TestPlan, String> {
    s.parse::<TestPlan>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    // Default to true on Unix-like systems, false on Windows
    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
