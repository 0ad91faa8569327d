//! Test orchestration
//!
//! A run executes the phases of a [`TestPlan`] strictly one after another.
//! The statistics aggregator lives for the whole run; each phase gets its
//! own connection, sampler task and metered transfer.

use crate::{
    connector::{Connector, TcpConnector},
    error::{AppError, Result},
    lifecycle::done_channel,
    logging::TransferLogger,
    models::{Config, TransferSettings},
    output::DisplaySink,
    protocol,
    sampler::{SamplerChannels, ThroughputSampler},
    stats::{AggregatorChannels, StatisticsAggregator, ThroughputSummary},
    transfer::{self, RandomBuffer, TransferOutcome, TransferSession},
    types::{RateSample, TestDirection, TestPlan},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// What happened during one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub direction: TestDirection,
    pub outcome: TransferOutcome,
    pub chunks: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub samples_taken: usize,
}

impl PhaseReport {
    /// Whole-phase average in Mbit/s, from bytes moved over elapsed time
    pub fn average_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.bytes as f64 * 8.0 / secs / 1_000_000.0
        }
    }
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub plan: TestPlan,
    pub server: String,
    pub phases: Vec<PhaseReport>,
    pub summary: ThroughputSummary,
}

impl RunReport {
    /// True when no phase ended in a transport failure
    pub fn is_success(&self) -> bool {
        self.phases.iter().all(|phase| phase.outcome.is_success())
    }

    pub fn phase(&self, direction: TestDirection) -> Option<&PhaseReport> {
        self.phases.iter().find(|phase| phase.direction == direction)
    }

    pub fn failed_phases(&self) -> Vec<&PhaseReport> {
        self.phases.iter().filter(|phase| !phase.outcome.is_success()).collect()
    }
}

/// Sequences the phases of a throughput test
pub struct TestRunner<C: Connector> {
    settings: TransferSettings,
    connector: C,
    sink: Arc<dyn DisplaySink>,
    logger: Option<TransferLogger>,
}

impl TestRunner<TcpConnector> {
    /// Runner connecting over TCP to the configured server
    pub fn from_config(config: &Config, sink: Arc<dyn DisplaySink>) -> Result<Self> {
        let connector = TcpConnector::new(&config.server_address, config.connect_timeout())?;
        Ok(Self::new(config.transfer_settings(), connector, sink))
    }
}

impl<C: Connector> TestRunner<C> {
    pub fn new(settings: TransferSettings, connector: C, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            settings,
            connector,
            sink,
            logger: None,
        }
    }

    /// Attach a logger for connection, phase and transfer events
    pub fn with_logger(mut self, logger: TransferLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Time allowed for a phase; downloads get the start-up grace on top
    pub fn phase_duration(&self, direction: TestDirection) -> Duration {
        match direction {
            TestDirection::Inbound => self.settings.test_duration + self.settings.inbound_grace,
            TestDirection::Outbound => self.settings.test_duration,
        }
    }

    /// Execute every phase of `plan` and return the final report.
    ///
    /// Connect and command failures abort the run. A transfer failure only
    /// ends its own phase and shows up in the report.
    pub async fn run(&self, plan: TestPlan) -> Result<RunReport> {
        self.settings.validate()?;

        let directions = plan.directions();
        let first = directions
            .first()
            .copied()
            .ok_or_else(|| AppError::internal("Test plan has no phases"))?;

        let (direction_tx, direction_rx) = watch::channel(first);
        let (sample_tx, sample_rx) = mpsc::unbounded_channel();
        let (phase_end_tx, phase_end_rx) = mpsc::unbounded_channel();
        let (done, done_listener) = done_channel();

        let aggregator = tokio::spawn(StatisticsAggregator::new(first).run(
            AggregatorChannels {
                samples: sample_rx,
                direction: direction_rx,
                phase_ends: phase_end_rx,
                done: done_listener,
            },
            self.sink.clone(),
        ));

        let mut phases = Vec::with_capacity(directions.len());
        for &direction in directions {
            match self.run_phase(direction, &direction_tx, &sample_tx, &phase_end_tx).await {
                Ok(phase) => phases.push(phase),
                Err(e) => {
                    if let Some(logger) = &self.logger {
                        logger.log_error(&e, &format!("{} phase aborted", direction)).await;
                    }
                    // Dropping the signal stops the aggregator without a final summary
                    drop(done);
                    let _ = aggregator.await;
                    return Err(e);
                }
            }
        }

        drop(sample_tx);
        done.fire();
        let summary = aggregator
            .await
            .map_err(|e| AppError::internal(format!("Statistics task failed: {}", e)))?;

        Ok(RunReport {
            plan,
            server: self.connector.target().to_string(),
            phases,
            summary,
        })
    }

    async fn run_phase(
        &self,
        direction: TestDirection,
        direction_tx: &watch::Sender<TestDirection>,
        sample_tx: &mpsc::UnboundedSender<RateSample>,
        phase_end_tx: &mpsc::UnboundedSender<oneshot::Sender<()>>,
    ) -> Result<PhaseReport> {
        direction_tx.send_replace(direction);
        self.sink.reset(direction);

        // Payload is ready before the server starts its clock
        let payload = match direction {
            TestDirection::Outbound => Some(RandomBuffer::generate(
                self.settings.random_buffer_size,
                self.settings.chunk_size,
            )?),
            TestDirection::Inbound => None,
        };

        let mut stream = match self.connector.connect().await {
            Ok(stream) => {
                if let Some(logger) = &self.logger {
                    logger.log_connection(self.connector.target(), true, None).await;
                }
                stream
            }
            Err(e) => {
                if let Some(logger) = &self.logger {
                    logger.log_connection(self.connector.target(), false, Some(&e.to_string())).await;
                }
                return Err(e);
            }
        };

        protocol::write_command(&mut stream, direction).await?;

        let duration = self.phase_duration(direction);
        let session = match payload {
            Some(payload) => TransferSession::sending(stream, duration, payload),
            None => TransferSession::receiving(stream, duration, self.settings.chunk_size)?,
        };

        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (completion, completion_listener) = done_channel();

        let sampler = ThroughputSampler::new(&self.settings, direction)?;
        let sampler_task = tokio::spawn(sampler.run(
            SamplerChannels {
                ticks: tick_rx,
                direction: direction_tx.subscribe(),
                completion: completion_listener,
                samples: sample_tx.clone(),
            },
            self.sink.clone(),
            self.logger.clone(),
        ));

        let correlation_id = match &self.logger {
            Some(logger) => Some(logger.log_phase_start(direction, duration).await),
            None => None,
        };

        let result = transfer::metered_copy(session, tick_tx, completion, self.logger.as_ref()).await;

        let sampler_report = sampler_task
            .await
            .map_err(|e| AppError::internal(format!("Sampler task failed: {}", e)))?;

        if let (Some(logger), Some(id)) = (&self.logger, &correlation_id) {
            logger
                .log_phase_complete(id, direction, result.outcome.describe(), result.chunks, result.elapsed)
                .await;
        }

        // The phase's last summary reaches the sink before its completion
        let (ack_tx, ack_rx) = oneshot::channel();
        if phase_end_tx.send(ack_tx).is_ok() {
            let _ = ack_rx.await;
        }

        self.sink.test_complete(direction);

        Ok(PhaseReport {
            direction,
            outcome: result.outcome,
            chunks: result.chunks,
            bytes: result.bytes,
            elapsed: result.elapsed,
            samples_taken: sampler_report.samples_taken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, SinkEvent};
    use async_trait::async_trait;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    const CHUNK: usize = 1024;

    fn settings(duration_ms: u64) -> TransferSettings {
        TransferSettings {
            chunk_size: CHUNK,
            test_duration: Duration::from_millis(duration_ms),
            sample_interval: Duration::from_millis(50),
            inbound_grace: Duration::ZERO,
            random_buffer_size: 16 * CHUNK,
            history_capacity: 70,
        }
    }

    /// Connector backed by in-memory pipes with a scripted peer per connection
    struct PipeConnector {
        /// Chunks the peer sends on a download before hanging up; None sends forever
        download_chunks: Option<usize>,
    }

    async fn serve(mut server: DuplexStream, download_chunks: Option<usize>) {
        let mut line = [0u8; 5];
        if server.read_exact(&mut line).await.is_err() {
            return;
        }
        let command = String::from_utf8_lossy(&line).to_string();
        match protocol::parse_command(&command) {
            Ok(TestDirection::Inbound) => {
                let chunk = vec![0xA5u8; CHUNK];
                let mut sent = 0;
                while download_chunks.map_or(true, |limit| sent < limit) {
                    if server.write_all(&chunk).await.is_err() {
                        return;
                    }
                    sent += 1;
                }
            }
            Ok(TestDirection::Outbound) => {
                let _ = tokio::io::copy(&mut server, &mut tokio::io::sink()).await;
            }
            Err(_) => {}
        }
    }

    #[async_trait]
    impl Connector for PipeConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream> {
            let (client, server) = duplex(8 * CHUNK);
            tokio::spawn(serve(server, self.download_chunks));
            Ok(client)
        }

        fn target(&self) -> &str {
            "pipe"
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream> {
            Err(AppError::network("connection refused"))
        }

        fn target(&self) -> &str {
            "nowhere"
        }
    }

    #[test]
    fn test_phase_duration_adds_grace_to_downloads_only() {
        let mut settings = settings(1000);
        settings.inbound_grace = Duration::from_secs(2);
        let runner = TestRunner::new(settings, RefusingConnector, Arc::new(MemorySink::new()));

        assert_eq!(runner.phase_duration(TestDirection::Inbound), Duration::from_secs(3));
        assert_eq!(runner.phase_duration(TestDirection::Outbound), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_full_run_downloads_then_uploads() {
        let sink = Arc::new(MemorySink::new());
        let runner = TestRunner::new(settings(300), PipeConnector { download_chunks: None }, sink.clone());

        let report = runner.run(TestPlan::Both).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.server, "pipe");
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.phases[0].direction, TestDirection::Inbound);
        assert_eq!(report.phases[1].direction, TestDirection::Outbound);
        for phase in &report.phases {
            assert_eq!(phase.outcome, TransferOutcome::DeadlineElapsed);
            assert!(phase.chunks > 0);
            assert_eq!(phase.bytes, phase.chunks * CHUNK as u64);
            assert!(phase.samples_taken >= 1);
        }

        assert!(report.summary.inbound.has_readings());
        assert!(report.summary.outbound.has_readings());
        assert_eq!(report.summary.active, TestDirection::Outbound);

        assert_eq!(
            sink.lifecycle(),
            vec![
                SinkEvent::Reset(TestDirection::Inbound),
                SinkEvent::Complete(TestDirection::Inbound),
                SinkEvent::Reset(TestDirection::Outbound),
                SinkEvent::Complete(TestDirection::Outbound),
            ]
        );

        // Charts between a phase's reset and completion belong to that phase
        let mut current = None;
        for event in sink.events() {
            match event {
                SinkEvent::Reset(direction) => current = Some(direction),
                SinkEvent::Chart(direction, series) => {
                    assert_eq!(Some(direction), current);
                    assert!(series.len() <= 70);
                }
                SinkEvent::Complete(_) => current = None,
                SinkEvent::Summary(_) => {}
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_summary_between_complete_and_next_reset() {
        for _ in 0..20 {
            let sink = Arc::new(MemorySink::new());
            let mut settings = settings(100);
            settings.sample_interval = Duration::from_millis(10);
            let runner = TestRunner::new(settings, PipeConnector { download_chunks: None }, sink.clone());

            runner.run(TestPlan::Both).await.unwrap();

            let mut phase_open = false;
            for event in sink.events() {
                match event {
                    SinkEvent::Reset(_) => phase_open = true,
                    SinkEvent::Complete(_) => phase_open = false,
                    SinkEvent::Summary(_) => assert!(phase_open, "summary published outside a phase"),
                    SinkEvent::Chart(..) => assert!(phase_open, "chart published outside a phase"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_peer_close_ends_download_normally() {
        let sink = Arc::new(MemorySink::new());
        let runner = TestRunner::new(settings(5_000), PipeConnector { download_chunks: Some(10) }, sink.clone());

        let report = runner.run(TestPlan::Download).await.unwrap();
        let phase = report.phase(TestDirection::Inbound).unwrap();

        assert_eq!(phase.outcome, TransferOutcome::PeerClosed);
        assert_eq!(phase.chunks, 10);
        assert!(phase.elapsed < Duration::from_secs(5));
        assert!(report.is_success());
        assert!(report.failed_phases().is_empty());
        assert!(report.phase(TestDirection::Outbound).is_none());
    }

    #[tokio::test]
    async fn test_zero_sample_interval_rejected_before_connecting() {
        let sink = Arc::new(MemorySink::new());
        let mut settings = settings(300);
        settings.sample_interval = Duration::ZERO;
        let runner = TestRunner::new(settings, PipeConnector { download_chunks: None }, sink.clone());

        let error = runner.run(TestPlan::Both).await.unwrap_err();

        assert_eq!(error.category(), "VALIDATION");
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_aborts_run() {
        let sink = Arc::new(MemorySink::new());
        let runner = TestRunner::new(settings(300), RefusingConnector, sink.clone());

        let error = runner.run(TestPlan::Both).await.unwrap_err();

        assert_eq!(error.category(), "NETWORK");
        assert_eq!(sink.lifecycle(), vec![SinkEvent::Reset(TestDirection::Inbound)]);
        assert!(sink.summaries().is_empty());
    }

    #[test]
    fn test_average_mbps() {
        let phase = PhaseReport {
            direction: TestDirection::Inbound,
            outcome: TransferOutcome::DeadlineElapsed,
            chunks: 125,
            bytes: 1_250_000,
            elapsed: Duration::from_secs(1),
            samples_taken: 5,
        };
        assert!((phase.average_mbps() - 10.0).abs() < 1e-9);
    }
}
