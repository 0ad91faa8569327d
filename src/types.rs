//! Type definitions shared by the measurement pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Which side of the connection originates the bulk data for a test phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestDirection {
    /// Remote sends, local receives and discards (download)
    Inbound,
    /// Local sends from a generated buffer, remote receives (upload)
    Outbound,
}

impl TestDirection {
    /// Get the label used in summaries and charts
    pub fn label(&self) -> &'static str {
        match self {
            TestDirection::Inbound => "DOWNLOAD",
            TestDirection::Outbound => "UPLOAD",
        }
    }
}

impl fmt::Display for TestDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestDirection::Inbound => write!(f, "inbound"),
            TestDirection::Outbound => write!(f, "outbound"),
        }
    }
}

/// One fixed-size chunk has been moved across the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTick;

/// A throughput measurement for one sampling interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    /// Direction that was active when the interval started
    pub direction: TestDirection,
    /// Throughput in bits per millisecond
    pub value: f64,
}

impl RateSample {
    pub fn new(direction: TestDirection, value: f64) -> Self {
        Self { direction, value }
    }

    /// Throughput in Mbit/s (1 bit/ms = 1 kbit/s)
    pub fn mbps(&self) -> f64 {
        bits_per_ms_to_mbps(self.value)
    }
}

/// Convert a bits-per-millisecond rate into Mbit/s
pub fn bits_per_ms_to_mbps(rate: f64) -> f64 {
    rate / 1000.0
}

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPlan {
    /// Download then upload
    Both,
    /// Download only
    Download,
    /// Upload only
    Upload,
}

impl TestPlan {
    /// Directions to run, in order
    pub fn directions(&self) -> &'static [TestDirection] {
        match self {
            TestPlan::Both => &[TestDirection::Inbound, TestDirection::Outbound],
            TestPlan::Download => &[TestDirection::Inbound],
            TestPlan::Upload => &[TestDirection::Outbound],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestPlan::Both => "both",
            TestPlan::Download => "download",
            TestPlan::Upload => "upload",
        }
    }
}

impl Default for TestPlan {
    fn default() -> Self {
        TestPlan::Both
    }
}

impl fmt::Display for TestPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestPlan {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "both" | "all" => Ok(TestPlan::Both),
            "download" | "inbound" | "down" => Ok(TestPlan::Download),
            "upload" | "outbound" | "up" => Ok(TestPlan::Upload),
            other => Err(AppError::parse(format!(
                "Invalid test plan '{}' (expected both, download or upload)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(TestDirection::Inbound.label(), "DOWNLOAD");
        assert_eq!(TestDirection::Outbound.label(), "UPLOAD");
        assert_eq!(TestDirection::Inbound.to_string(), "inbound");
    }

    #[test]
    fn test_plan_directions_are_download_first() {
        assert_eq!(
            TestPlan::Both.directions(),
            &[TestDirection::Inbound, TestDirection::Outbound]
        );
        assert_eq!(TestPlan::Upload.directions(), &[TestDirection::Outbound]);
    }

    #[test]
    fn test_plan_parsing() {
        assert_eq!("both".parse::<TestPlan>().unwrap(), TestPlan::Both);
        assert_eq!("Download".parse::<TestPlan>().unwrap(), TestPlan::Download);
        assert_eq!(" up ".parse::<TestPlan>().unwrap(), TestPlan::Upload);
        assert!("sideways".parse::<TestPlan>().is_err());
    }

    #[test]
    fn test_mbps_conversion() {
        let sample = RateSample::new(TestDirection::Inbound, 26214.4);
        assert!((sample.mbps() - 26.2144).abs() < 1e-9);
    }
}
