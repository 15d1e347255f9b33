//! Error types for kvprobe
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ProbeError
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Unified error type for kvprobe operations
#[derive(Debug, Error)]
pub enum ProbeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // -------------------------------------------------------------------------
    // Reply Errors
    // -------------------------------------------------------------------------
    /// The server answered with an error line (`-ERR ...`)
    #[error("Invalid command: {0}")]
    ServerError(String),

    /// Integer, array and unknown reply kinds are not decoded
    #[error("Unsupported reply type {}", describe_marker(.0))]
    UnsupportedReply(u8),

    // -------------------------------------------------------------------------
    // Formatting Errors
    // -------------------------------------------------------------------------
    #[error("Invalid format string: unknown field '{0}'")]
    MissingField(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("[{0}] is not in the form of <host>:<port>")]
    InvalidHost(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Framing failures while assembling a reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("timed out waiting for reply")]
    Timeout,

    #[error("connection closed after {received} bytes of an incomplete frame")]
    TruncatedFrame { received: usize },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

fn describe_marker(marker: &u8) -> String {
    let marker = *marker;
    if marker.is_ascii_graphic() {
        format!("'{}'", marker as char)
    } else {
        format!("0x{:02x}", marker)
    }
}
