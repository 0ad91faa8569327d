//! Throughput sampler
//!
//! Counts chunk ticks coming off the transfer loop and, once per sampling
//! interval, turns the chunks seen in that window into a rate:
//!
//! ```text
//! rate = chunks_in_interval * chunk_bits / interval_ms
//! ```
//!
//! Each sample is appended to the rolling chart history, pushed to the
//! display sink and forwarded to the statistics aggregator.

pub mod history;

pub use history::RollingHistory;

use crate::{
    error::{AppError, Result},
    lifecycle::DoneListener,
    logging::TransferLogger,
    models::TransferSettings,
    output::DisplaySink,
    types::{ChunkTick, RateSample, TestDirection},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Compute the rate for `chunks` moved during one interval, in bits per millisecond
pub fn interval_rate(chunks: u64, chunk_bits: f64, interval: Duration) -> f64 {
    let interval_ms = interval.as_nanos() as f64 / 1_000_000.0;
    if interval_ms <= 0.0 {
        return 0.0;
    }
    chunks as f64 * chunk_bits / interval_ms
}

/// Queues the sampler reads from and writes to
pub struct SamplerChannels {
    /// One tick per completed chunk
    pub ticks: mpsc::UnboundedReceiver<ChunkTick>,
    /// Direction-change notifications
    pub direction: watch::Receiver<TestDirection>,
    /// Fired by the transfer loop when the phase ends
    pub completion: DoneListener,
    /// Samples forwarded to the aggregator
    pub samples: mpsc::UnboundedSender<RateSample>,
}

/// What a finished sampler observed
#[derive(Debug, Clone)]
pub struct SamplerReport {
    pub samples_taken: usize,
    pub total_chunks: u64,
    pub history: Vec<f64>,
}

/// Per-phase sampling state; owned by a single task
#[derive(Debug)]
pub struct ThroughputSampler {
    chunk_bits: f64,
    interval: Duration,
    history: RollingHistory,
    /// Latest notified direction
    direction: TestDirection,
    /// Direction that was active when the current interval started
    interval_direction: TestDirection,
    block_count: u64,
    prev_block_count: u64,
    samples_taken: usize,
}

impl ThroughputSampler {
    pub fn new(settings: &TransferSettings, direction: TestDirection) -> Result<Self> {
        if settings.sample_interval.is_zero() {
            return Err(AppError::validation("Sample interval must be greater than 0"));
        }
        Ok(Self {
            chunk_bits: settings.chunk_bits(),
            interval: settings.sample_interval,
            history: RollingHistory::new(settings.history_capacity),
            direction,
            interval_direction: direction,
            block_count: 0,
            prev_block_count: 0,
            samples_taken: 0,
        })
    }

    /// Count one completed chunk
    pub fn record_tick(&mut self) {
        self.block_count += 1;
    }

    /// Switch direction for intervals that start from now on
    pub fn set_direction(&mut self, direction: TestDirection) {
        self.direction = direction;
    }

    pub fn direction(&self) -> TestDirection {
        self.direction
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Close the current interval and produce its sample
    pub fn take_sample(&mut self) -> RateSample {
        let chunks = self.block_count - self.prev_block_count;
        let rate = interval_rate(chunks, self.chunk_bits, self.interval);

        self.history.push(rate);
        let sample = RateSample::new(self.interval_direction, rate);

        self.prev_block_count = self.block_count;
        self.interval_direction = self.direction;
        self.samples_taken += 1;
        sample
    }

    /// Run until the completion signal arrives.
    ///
    /// Interval sampling is wall-clock periodic: a window with no ticks
    /// still yields a zero-rate sample.
    pub async fn run(
        mut self,
        channels: SamplerChannels,
        sink: Arc<dyn DisplaySink>,
        logger: Option<TransferLogger>,
    ) -> SamplerReport {
        let SamplerChannels {
            mut ticks,
            mut direction,
            mut completion,
            samples,
        } = channels;

        let current = *direction.borrow_and_update();
        self.direction = current;
        self.interval_direction = current;

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks_open = true;
        let mut direction_open = true;

        loop {
            tokio::select! {
                biased;

                _ = completion.wait() => break,

                changed = direction.changed(), if direction_open => match changed {
                    Ok(()) => {
                        let next = *direction.borrow_and_update();
                        self.set_direction(next);
                    }
                    Err(_) => direction_open = false,
                },

                _ = ticker.tick() => {
                    let chunks = self.block_count - self.prev_block_count;
                    let sample = self.take_sample();
                    sink.update_chart(sample.direction, self.history.series());
                    if let Some(logger) = &logger {
                        logger.log_sample(sample.direction, sample.value, chunks).await;
                    }
                    // The aggregator may already be gone on an aborted run
                    let _ = samples.send(sample);
                }

                tick = ticks.recv(), if ticks_open => match tick {
                    Some(ChunkTick) => self.record_tick(),
                    None => ticks_open = false,
                },
            }
        }

        SamplerReport {
            samples_taken: self.samples_taken,
            total_chunks: self.block_count,
            history: self.history.to_vec(),
        }
    }
}
