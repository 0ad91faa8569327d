//! In-memory sink that records every event, for embedding and tests

use super::DisplaySink;
use crate::{stats::ThroughputSummary, types::TestDirection};
use std::sync::Mutex;

/// One call received by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Reset(TestDirection),
    Chart(TestDirection, Vec<f64>),
    Summary(ThroughputSummary),
    Complete(TestDirection),
}

/// Records sink calls in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        // A poisoned lock only means another recorder panicked; keep recording
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    /// All events so far
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Chart updates as (direction, series)
    pub fn charts(&self) -> Vec<(TestDirection, Vec<f64>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Chart(direction, series) => Some((direction, series)),
                _ => None,
            })
            .collect()
    }

    /// Published summaries
    pub fn summaries(&self) -> Vec<ThroughputSummary> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Summary(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    /// Lifecycle events only (resets and completions)
    pub fn lifecycle(&self) -> Vec<SinkEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, SinkEvent::Reset(_) | SinkEvent::Complete(_)))
            .collect()
    }
}

impl DisplaySink for MemorySink {
    fn reset(&self, direction: TestDirection) {
        self.push(SinkEvent::Reset(direction));
    }

    fn update_chart(&self, direction: TestDirection, series: &[f64]) {
        self.push(SinkEvent::Chart(direction, series.to_vec()));
    }

    fn update_summary(&self, summary: &ThroughputSummary) {
        self.push(SinkEvent::Summary(*summary));
    }

    fn test_complete(&self, direction: TestDirection) {
        self.push(SinkEvent::Complete(direction));
    }
}
