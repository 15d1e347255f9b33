//! Frame Reader
//!
//! Assembles one complete reply frame from a byte stream.
//!
//! A frame may arrive across any number of reads: the reader keeps reading
//! until the decoder reports a complete frame, the buffer grows past the
//! maximum frame size, the stream ends, or the deadline passes.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};

use super::frame::Decoded;
use super::{FrameDecoder, ReplyFrame};
use crate::config::Config;
use crate::error::{ProtocolError, Result};

/// Size of every read after the first one
const READ_CHUNK_SIZE: usize = 4096;

/// Reads reply frames from a stream (blocking)
pub struct FrameReader<R> {
    /// Underlying stream, owned by the caller's connection
    inner: R,

    /// Bytes received but not yet consumed by a frame
    buffer: BytesMut,

    decoder: FrameDecoder,

    /// Size of the first read for each frame
    initial_read_size: usize,

    /// Overall budget for assembling one frame
    deadline: Option<Duration>,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader with default framing limits and no deadline
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            decoder: FrameDecoder::default(),
            initial_read_size: Config::default().initial_read_size,
            deadline: None,
        }
    }

    /// Create a reader using the framing limits and read deadline from `config`
    pub fn with_config(inner: R, config: &Config) -> Self {
        let deadline = (config.read_timeout_ms > 0).then(|| config.read_timeout());
        Self {
            inner,
            buffer: BytesMut::new(),
            decoder: FrameDecoder::new(config.max_frame_size),
            initial_read_size: config.initial_read_size.max(1),
            deadline,
        }
    }

    /// Read one complete frame
    ///
    /// Bytes past the end of the frame stay buffered for the next call.
    pub fn read_frame(&mut self) -> Result<ReplyFrame> {
        let started = Instant::now();
        let mut read_size = self.initial_read_size;
        let mut scanned = 0;

        loop {
            let frame_len = match self.decoder.decode_from(&self.buffer, scanned)? {
                Decoded::Frame(frame, consumed) => {
                    self.buffer.advance(consumed);
                    tracing::trace!("Decoded frame of {} bytes", consumed);
                    return Ok(frame);
                }
                Decoded::Incomplete {
                    scanned: next,
                    frame_len,
                } => {
                    scanned = next;
                    frame_len
                }
            };

            // A parsed bulk header already bounds the frame; only a pending
            // line can grow without limit.
            if frame_len.is_none() && self.buffer.len() > self.decoder.max_frame_size() {
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.decoder.max_frame_size(),
                }
                .into());
            }

            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    return Err(ProtocolError::Timeout.into());
                }
            }

            let received = self.fill(read_size)?;
            if received == 0 {
                return Err(ProtocolError::TruncatedFrame {
                    received: self.buffer.len(),
                }
                .into());
            }
            read_size = READ_CHUNK_SIZE;
        }
    }

    /// Number of bytes buffered past the last decoded frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Issue one read of up to `size` bytes into the buffer
    fn fill(&mut self, size: usize) -> Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(start + size, 0);

        loop {
            match self.inner.read(&mut self.buffer[start..]) {
                Ok(n) => {
                    self.buffer.truncate(start + n);
                    tracing::trace!("Read {} bytes ({} buffered)", n, self.buffer.len());
                    return Ok(n);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                // Unix reports socket read timeouts as WouldBlock, Windows as TimedOut
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.buffer.truncate(start);
                    return Err(ProtocolError::Timeout.into());
                }
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e.into());
                }
            }
        }
    }
}
