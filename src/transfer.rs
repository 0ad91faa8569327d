//! Metered transfer loop
//!
//! Moves fixed-size chunks across an established connection until the
//! phase deadline passes or the peer ends the exchange, emitting one
//! [`ChunkTick`] per chunk. Download phases read and discard; upload phases
//! write from a pre-generated circular buffer of random bytes.

use crate::{
    error::{AppError, Result},
    lifecycle::DoneSignal,
    logging::TransferLogger,
    types::{ChunkTick, TestDirection},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Pseudo-random upload payload read as a circular buffer
#[derive(Debug, Clone)]
pub struct RandomBuffer {
    data: Vec<u8>,
    chunk_size: usize,
    cursor: usize,
}

impl RandomBuffer {
    /// Generate `size` random bytes served in `chunk_size` pieces
    pub fn generate(size: usize, chunk_size: usize) -> Result<Self> {
        let mut data = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut data);
        Self::from_bytes(data, chunk_size)
    }

    /// Wrap existing bytes; they must hold at least one chunk
    pub fn from_bytes(data: Vec<u8>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::validation("Chunk size must be greater than 0"));
        }
        if data.len() < chunk_size {
            return Err(AppError::validation(format!(
                "Random buffer of {} bytes is smaller than one {} byte chunk",
                data.len(),
                chunk_size
            )));
        }
        Ok(Self {
            data,
            chunk_size,
            cursor: 0,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read offset of the next chunk
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Hand out the next chunk; rewinds to the start once no more than one
    /// chunk's worth remains after it
    pub fn next_chunk(&mut self) -> &[u8] {
        let start = self.cursor;
        let end = start + self.chunk_size;
        self.cursor = if self.data.len() - end <= self.chunk_size { 0 } else { end };
        &self.data[start..end]
    }
}

/// How one side of the exchange moves a chunk
#[derive(Debug)]
enum ChunkMover {
    Receive { buf: Vec<u8> },
    Send { payload: RandomBuffer },
}

impl ChunkMover {
    async fn move_chunk<S>(&mut self, stream: &mut S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            ChunkMover::Receive { buf } => stream.read_exact(buf).await.map(|_| ()),
            ChunkMover::Send { payload } => stream.write_all(payload.next_chunk()).await,
        }
    }

    fn chunk_size(&self) -> usize {
        match self {
            ChunkMover::Receive { buf } => buf.len(),
            ChunkMover::Send { payload } => payload.chunk_size(),
        }
    }
}

/// An established connection dedicated to one test phase
#[derive(Debug)]
pub struct TransferSession<S> {
    stream: S,
    direction: TestDirection,
    duration: Duration,
    mover: ChunkMover,
}

impl<S> TransferSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Session that reads and discards `chunk_size` blocks
    pub fn receiving(stream: S, duration: Duration, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::validation("Chunk size must be greater than 0"));
        }
        Ok(Self {
            stream,
            direction: TestDirection::Inbound,
            duration,
            mover: ChunkMover::Receive {
                buf: vec![0u8; chunk_size],
            },
        })
    }

    /// Session that writes chunks drawn from `payload`
    pub fn sending(stream: S, duration: Duration, payload: RandomBuffer) -> Self {
        Self {
            stream,
            direction: TestDirection::Outbound,
            duration,
            mover: ChunkMover::Send { payload },
        }
    }

    pub fn direction(&self) -> TestDirection {
        self.direction
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn chunk_size(&self) -> usize {
        self.mover.chunk_size()
    }
}

/// How a phase ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// The phase timer ran out
    DeadlineElapsed,
    /// The peer closed the connection, usually because its own timer fired first
    PeerClosed,
    /// Any other transport failure
    Failed(String),
}

impl TransferOutcome {
    /// Deadline and peer close both count as a completed test
    pub fn is_success(&self) -> bool {
        !matches!(self, TransferOutcome::Failed(_))
    }

    pub fn describe(&self) -> &str {
        match self {
            TransferOutcome::DeadlineElapsed => "deadline elapsed",
            TransferOutcome::PeerClosed => "peer closed connection",
            TransferOutcome::Failed(reason) => reason,
        }
    }
}

/// Result of one metered copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub direction: TestDirection,
    pub outcome: TransferOutcome,
    pub chunks: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Errors that mean the peer ended the exchange rather than the transport failing
pub fn is_peer_close(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// Run the metered copy for one session.
///
/// Each chunk's I/O is raced against the deadline. Whatever the reason the
/// loop stops, `completion` is fired exactly once and the connection is shut
/// down before returning.
pub async fn metered_copy<S>(
    session: TransferSession<S>,
    ticks: mpsc::UnboundedSender<ChunkTick>,
    completion: DoneSignal,
    logger: Option<&TransferLogger>,
) -> TransferResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let TransferSession {
        mut stream,
        direction,
        duration,
        mut mover,
    } = session;

    let chunk_size = mover.chunk_size() as u64;
    let start = Instant::now();
    let deadline = time::sleep_until(start + duration);
    tokio::pin!(deadline);

    let mut chunks: u64 = 0;

    let outcome = loop {
        tokio::select! {
            biased;

            _ = &mut deadline => break TransferOutcome::DeadlineElapsed,

            result = mover.move_chunk(&mut stream) => match result {
                Ok(()) => {
                    chunks += 1;
                    // Sampler gone means nobody is measuring; keep moving until the deadline
                    let _ = ticks.send(ChunkTick);
                }
                Err(e) if is_peer_close(&e) => break TransferOutcome::PeerClosed,
                Err(e) => {
                    if let Some(logger) = logger {
                        logger.log_transfer_error(direction, &e, chunks).await;
                    }
                    break TransferOutcome::Failed(e.to_string());
                }
            },
        }
    };

    completion.fire();
    drop(ticks);

    let _ = stream.shutdown().await;
    drop(stream);

    TransferResult {
        direction,
        outcome,
        chunks,
        bytes: chunks * chunk_size,
        elapsed: start.elapsed(),
    }
}
