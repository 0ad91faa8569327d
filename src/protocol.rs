//! Direction request vocabulary sent to the throughput server
//!
//! Before a metered phase the client writes a single plaintext command
//! terminated by CRLF. `SND` asks the server to send (download test) and
//! `RCV` asks it to receive (upload test). Everything after the command is
//! raw bulk payload with no framing.

use crate::error::{AppError, Result};
use crate::types::TestDirection;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Command token asking the server to originate data
pub const SEND_COMMAND: &str = "SND";

/// Command token asking the server to accept data
pub const RECEIVE_COMMAND: &str = "RCV";

/// Command line terminator
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Token requesting the given test direction
pub fn command_token(direction: TestDirection) -> &'static str {
    match direction {
        TestDirection::Inbound => SEND_COMMAND,
        TestDirection::Outbound => RECEIVE_COMMAND,
    }
}

/// Parse a command line (with or without terminator) back into a direction
pub fn parse_command(line: &str) -> Result<TestDirection> {
    match line.trim_end_matches(['\r', '\n']) {
        SEND_COMMAND => Ok(TestDirection::Inbound),
        RECEIVE_COMMAND => Ok(TestDirection::Outbound),
        other => Err(AppError::protocol(format!("Unknown command: {:?}", other))),
    }
}

/// Encode the full command line for a direction
pub fn encode_command(direction: TestDirection) -> Vec<u8> {
    format!("{}{}", command_token(direction), COMMAND_TERMINATOR).into_bytes()
}

/// Write the direction request to the peer.
///
/// A failure here is fatal to the whole test: no data phase can proceed
/// without the server knowing which way the data flows.
pub async fn write_command<W>(writer: &mut W, direction: TestDirection) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let command = encode_command(direction);
    writer.write_all(&command).await.map_err(|e| {
        AppError::protocol(format!(
            "Failed to send {} command: {}",
            command_token(direction),
            e
        ))
    })?;
    writer.flush().await.map_err(|e| {
        AppError::protocol(format!(
            "Failed to flush {} command: {}",
            command_token(direction),
            e
        ))
    })?;
    Ok(())
}
