//! Running throughput statistics
//!
//! The aggregator folds the sampler's rate stream into per-direction
//! current/max/average values and pushes a refreshed summary to the display
//! sink after every sample.

use crate::{
    lifecycle::DoneListener,
    output::DisplaySink,
    types::{bits_per_ms_to_mbps, RateSample, TestDirection},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Running readings for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionStats {
    /// Most recent reading
    pub current: f64,
    /// Highest reading seen; never decreases
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl DirectionStats {
    /// Fold one reading in
    pub fn record(&mut self, rate: f64) {
        self.current = rate;
        self.count += 1;
        self.sum += rate;
        if rate > self.max {
            self.max = rate;
        }
    }

    /// Mean of all readings, 0 when there are none
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn has_readings(&self) -> bool {
        self.count > 0
    }
}

/// Snapshot of both directions, published to the display sink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSummary {
    pub inbound: DirectionStats,
    pub outbound: DirectionStats,
    /// Direction of the phase currently running
    pub active: TestDirection,
}

impl ThroughputSummary {
    pub fn new(active: TestDirection) -> Self {
        Self {
            inbound: DirectionStats::default(),
            outbound: DirectionStats::default(),
            active,
        }
    }

    pub fn for_direction(&self, direction: TestDirection) -> &DirectionStats {
        match direction {
            TestDirection::Inbound => &self.inbound,
            TestDirection::Outbound => &self.outbound,
        }
    }

    fn for_direction_mut(&mut self, direction: TestDirection) -> &mut DirectionStats {
        match direction {
            TestDirection::Inbound => &mut self.inbound,
            TestDirection::Outbound => &mut self.outbound,
        }
    }

    /// One summary line for a direction, values in Mbit/s
    pub fn format_line(&self, direction: TestDirection) -> String {
        let stats = self.for_direction(direction);
        format!(
            "Current: {:.1} Mbit/s\tMax: {:.1}\tAvg: {:.1}",
            bits_per_ms_to_mbps(stats.current),
            bits_per_ms_to_mbps(stats.max),
            bits_per_ms_to_mbps(stats.average()),
        )
    }
}

impl fmt::Display for ThroughputSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n\n{}\n{}",
            TestDirection::Inbound.label(),
            self.format_line(TestDirection::Inbound),
            TestDirection::Outbound.label(),
            self.format_line(TestDirection::Outbound),
        )
    }
}

/// Queues the aggregator reads from
pub struct AggregatorChannels {
    pub samples: mpsc::UnboundedReceiver<RateSample>,
    pub direction: watch::Receiver<TestDirection>,
    /// Phase-end barriers, acknowledged once every earlier sample is published
    pub phase_ends: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    /// Fired by the runner once every phase has finished
    pub done: DoneListener,
}

/// Owns the run's statistics; lives across all phases of one run
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    summary: ThroughputSummary,
}

impl StatisticsAggregator {
    pub fn new(active: TestDirection) -> Self {
        Self {
            summary: ThroughputSummary::new(active),
        }
    }

    /// Fold a sample into the bucket named by its tag
    pub fn record(&mut self, sample: RateSample) -> &ThroughputSummary {
        self.summary.for_direction_mut(sample.direction).record(sample.value);
        &self.summary
    }

    pub fn set_active(&mut self, direction: TestDirection) {
        self.summary.active = direction;
    }

    pub fn summary(&self) -> &ThroughputSummary {
        &self.summary
    }

    /// Consume samples until the done signal; returns the final summary.
    ///
    /// Samples already queued when the signal arrives are still folded in,
    /// but nothing is published after this returns. A phase-end barrier is
    /// acknowledged only after every sample queued ahead of it has been
    /// published.
    pub async fn run(mut self, channels: AggregatorChannels, sink: Arc<dyn DisplaySink>) -> ThroughputSummary {
        let AggregatorChannels {
            mut samples,
            mut direction,
            mut phase_ends,
            mut done,
        } = channels;

        self.set_active(*direction.borrow_and_update());

        let mut samples_open = true;
        let mut direction_open = true;
        let mut phase_ends_open = true;

        loop {
            tokio::select! {
                biased;

                sample = samples.recv(), if samples_open => match sample {
                    Some(sample) => {
                        let summary = self.record(sample);
                        sink.update_summary(summary);
                    }
                    None => samples_open = false,
                },

                changed = direction.changed(), if direction_open => match changed {
                    Ok(()) => {
                        let next = *direction.borrow_and_update();
                        self.set_active(next);
                    }
                    Err(_) => direction_open = false,
                },

                // Polled only after the sample queue is empty
                barrier = phase_ends.recv(), if phase_ends_open => match barrier {
                    Some(ack) => {
                        let _ = ack.send(());
                    }
                    None => phase_ends_open = false,
                },

                _ = done.wait() => break,
            }
        }

        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::done_channel;
    use crate::output::MemorySink;
    use proptest::prelude::*;

    #[test]
    fn test_direction_stats_record() {
        let mut stats = DirectionStats::default();
        assert_eq!(stats.average(), 0.0);

        stats.record(100.0);
        stats.record(300.0);
        stats.record(200.0);

        assert_eq!(stats.current, 200.0);
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 600.0);
        assert_eq!(stats.average(), 200.0);
    }

    #[test]
    fn test_zero_readings_keep_max_at_zero() {
        let mut stats = DirectionStats::default();
        stats.record(0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.average(), 0.0);
    }

    #[test]
    fn test_samples_filed_by_tag() {
        let mut aggregator = StatisticsAggregator::new(TestDirection::Inbound);
        aggregator.record(RateSample::new(TestDirection::Inbound, 10.0));
        aggregator.record(RateSample::new(TestDirection::Outbound, 4.0));

        let summary = aggregator.summary();
        assert_eq!(summary.inbound.count, 1);
        assert_eq!(summary.outbound.count, 1);
        assert_eq!(summary.outbound.current, 4.0);
    }

    #[test]
    fn test_summary_text() {
        let mut aggregator = StatisticsAggregator::new(TestDirection::Inbound);
        aggregator.record(RateSample::new(TestDirection::Inbound, 26214.4));
        let text = aggregator.summary().to_string();

        assert!(text.starts_with("DOWNLOAD\nCurrent: 26.2 Mbit/s\tMax: 26.2\tAvg: 26.2"));
        assert!(text.contains("UPLOAD\nCurrent: 0.0 Mbit/s\tMax: 0.0\tAvg: 0.0"));
    }

    proptest! {
        #[test]
        fn prop_max_non_decreasing_and_average_consistent(rates in proptest::collection::vec(0.0f64..1e6, 1..200)) {
            let mut stats = DirectionStats::default();
            let mut previous_max = stats.max;
            for rate in &rates {
                stats.record(*rate);
                prop_assert!(stats.max >= previous_max);
                previous_max = stats.max;
                prop_assert_eq!(stats.average(), stats.sum / stats.count as f64);
            }
            prop_assert_eq!(stats.count, rates.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_run_publishes_after_every_sample() {
        let (sample_tx, samples) = mpsc::unbounded_channel();
        let (direction_tx, direction) = watch::channel(TestDirection::Inbound);
        let (_phase_end_tx, phase_ends) = mpsc::unbounded_channel();
        let (done, listener) = done_channel();
        let sink = Arc::new(MemorySink::new());

        let aggregator = StatisticsAggregator::new(TestDirection::Inbound);
        let handle = tokio::spawn(aggregator.run(
            AggregatorChannels { samples, direction, phase_ends, done: listener },
            sink.clone(),
        ));

        sample_tx.send(RateSample::new(TestDirection::Inbound, 100.0)).unwrap();
        sample_tx.send(RateSample::new(TestDirection::Inbound, 50.0)).unwrap();
        direction_tx.send(TestDirection::Outbound).unwrap();
        sample_tx.send(RateSample::new(TestDirection::Outbound, 20.0)).unwrap();
        done.fire();

        let summary = handle.await.unwrap();
        assert_eq!(summary.inbound.max, 100.0);
        assert_eq!(summary.inbound.average(), 75.0);
        assert_eq!(summary.outbound.current, 20.0);
        assert_eq!(summary.active, TestDirection::Outbound);

        let published = sink.summaries();
        assert_eq!(published.len(), 3);
        let last = published.last().unwrap();
        assert_eq!(last.inbound, summary.inbound);
        assert_eq!(last.outbound, summary.outbound);

        // Nothing further is published once the aggregator returned
        let _ = sample_tx.send(RateSample::new(TestDirection::Outbound, 99.0));
        tokio::task::yield_now().await;
        assert_eq!(sink.summaries().len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_done_stops_aggregator() {
        let (_sample_tx, samples) = mpsc::unbounded_channel::<RateSample>();
        let (_direction_tx, direction) = watch::channel(TestDirection::Inbound);
        let (_phase_end_tx, phase_ends) = mpsc::unbounded_channel();
        let (done, listener) = done_channel();
        let sink = Arc::new(MemorySink::new());

        drop(done);
        let summary = StatisticsAggregator::new(TestDirection::Inbound)
            .run(AggregatorChannels { samples, direction, phase_ends, done: listener }, sink.clone())
            .await;
        assert_eq!(summary.inbound.count, 0);
        assert!(sink.summaries().is_empty());
    }

    #[tokio::test]
    async fn test_phase_end_acknowledged_after_queued_samples() {
        let (sample_tx, samples) = mpsc::unbounded_channel();
        let (_direction_tx, direction) = watch::channel(TestDirection::Inbound);
        let (phase_end_tx, phase_ends) = mpsc::unbounded_channel();
        let (done, listener) = done_channel();
        let sink = Arc::new(MemorySink::new());

        for value in [10.0, 20.0, 30.0, 40.0] {
            sample_tx.send(RateSample::new(TestDirection::Inbound, value)).unwrap();
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        phase_end_tx.send(ack_tx).unwrap();

        let handle = tokio::spawn(StatisticsAggregator::new(TestDirection::Inbound).run(
            AggregatorChannels { samples, direction, phase_ends, done: listener },
            sink.clone(),
        ));

        ack_rx.await.unwrap();
        let published = sink.summaries();
        assert_eq!(published.len(), 4);
        assert_eq!(published[3].inbound.current, 40.0);

        done.fire();
        handle.await.unwrap();
    }
}
