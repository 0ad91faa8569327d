//! Display sinks for live throughput results
//!
//! The measurement pipeline only talks to the [`DisplaySink`] capability:
//! chart series and summaries are pushed to it as they are computed, and it
//! is told when a phase starts and ends. Rendering is up to the sink.

mod console;
mod memory;
mod report;

pub use console::{ConsoleSink, sparkline};
pub use memory::{MemorySink, SinkEvent};
pub use report::format_run_report;

use crate::{stats::ThroughputSummary, types::TestDirection};
use std::sync::Arc;

/// Receiver of everything the measurement pipeline computes
pub trait DisplaySink: Send + Sync {
    /// A new phase is starting; clear per-phase display state
    fn reset(&self, direction: TestDirection);

    /// Rolling rate history for a direction, oldest first, bits/ms
    fn update_chart(&self, direction: TestDirection, series: &[f64]);

    /// Refreshed current/max/average for both directions
    fn update_summary(&self, summary: &ThroughputSummary);

    /// The phase for `direction` has finished
    fn test_complete(&self, direction: TestDirection);
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn reset(&self, _direction: TestDirection) {}
    fn update_chart(&self, _direction: TestDirection, _series: &[f64]) {}
    fn update_summary(&self, _summary: &ThroughputSummary) {}
    fn test_complete(&self, _direction: TestDirection) {}
}

/// Factory for creating the appropriate sink
pub struct OutputSinkFactory;

impl OutputSinkFactory {
    /// Create a console sink based on color support and preferences
    pub fn create_sink(enable_color: bool, verbose: bool) -> Arc<dyn DisplaySink> {
        Arc::new(ConsoleSink::new(enable_color, verbose))
    }

    /// Create a sink that renders nothing
    pub fn create_null_sink() -> Arc<dyn DisplaySink> {
        Arc::new(NullSink)
    }
}
