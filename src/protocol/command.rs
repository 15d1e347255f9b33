//! Command encoding
//!
//! Commands are sent as inline text followed by the line terminator.

use std::io::Write;

use crate::error::Result;

/// Two-byte line terminator used in both directions
pub const CRLF: &[u8; 2] = b"\r\n";

/// Encode a command line for the wire
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(command.len() + CRLF.len());
    message.extend_from_slice(command.as_bytes());
    message.extend_from_slice(CRLF);
    message
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &str) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}
