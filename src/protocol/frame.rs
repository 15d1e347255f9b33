//! Reply frame definitions
//!
//! Classification of a raw reply buffer by its marker byte.

use std::borrow::Cow;

use bytes::Bytes;

use super::CRLF;
use crate::error::ProtocolError;

/// Default upper bound on a single frame (4 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Reply kinds, keyed by the leading marker byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `+`
    Status,
    /// `-`
    Error,
    /// `$`
    Bulk,
    /// Anything else, including `:` and `*`
    Unsupported(u8),
}

impl ReplyKind {
    /// Map a marker byte to its reply kind. Total over all byte values.
    pub fn from_marker(marker: u8) -> Self {
        match marker {
            b'+' => ReplyKind::Status,
            b'-' => ReplyKind::Error,
            b'$' => ReplyKind::Bulk,
            other => ReplyKind::Unsupported(other),
        }
    }
}

/// One complete server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFrame {
    /// One-line success reply, without the terminator
    Status(String),

    /// One-line failure reply, without the terminator
    ErrorReply(String),

    /// Payload of exactly the declared length
    Bulk(Bytes),

    /// Bulk reply with a negative declared length
    Absent,

    /// Leading byte outside the supported set
    Unsupported(u8),
}

impl ReplyFrame {
    /// Textual form of the reply, as stored in the `response` field
    ///
    /// One-line replies keep their marker byte but drop the terminator.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            ReplyFrame::Status(text) => Cow::Owned(format!("+{}", text)),
            ReplyFrame::ErrorReply(text) => Cow::Owned(format!("-{}", text)),
            ReplyFrame::Bulk(payload) => String::from_utf8_lossy(payload),
            ReplyFrame::Absent => Cow::Borrowed("(nil)"),
            ReplyFrame::Unsupported(_) => Cow::Borrowed(""),
        }
    }
}

/// Decodes frames from an accumulated buffer, bounded by a maximum size
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Try to decode one frame from the start of `buf`
    ///
    /// Returns `Ok(None)` when more bytes are needed, otherwise the frame and
    /// the number of bytes it occupied.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(ReplyFrame, usize)>, ProtocolError> {
        match self.decode_from(buf, 0)? {
            Decoded::Frame(frame, consumed) => Ok(Some((frame, consumed))),
            Decoded::Incomplete { .. } => Ok(None),
        }
    }

    /// Like [`decode`](Self::decode), but resumes the terminator search at
    /// `scanned`, the offset reported by the previous incomplete attempt on
    /// the same (grown) buffer.
    pub(crate) fn decode_from(&self, buf: &[u8], scanned: usize) -> Result<Decoded, ProtocolError> {
        let Some(&marker) = buf.first() else {
            return Ok(Decoded::line_pending(buf));
        };

        match ReplyKind::from_marker(marker) {
            ReplyKind::Status | ReplyKind::Error => {
                let Some(end) = find_crlf(buf, scanned) else {
                    return Ok(Decoded::line_pending(buf));
                };
                let text = String::from_utf8_lossy(&buf[1..end]).into_owned();
                let frame = if marker == b'+' {
                    ReplyFrame::Status(text)
                } else {
                    ReplyFrame::ErrorReply(text)
                };
                Ok(Decoded::Frame(frame, end + CRLF.len()))
            }
            ReplyKind::Bulk => self.decode_bulk(buf, scanned),
            ReplyKind::Unsupported(marker) => Ok(Decoded::Frame(ReplyFrame::Unsupported(marker), 1)),
        }
    }

    fn decode_bulk(&self, buf: &[u8], scanned: usize) -> Result<Decoded, ProtocolError> {
        let Some(header_end) = find_crlf(buf, scanned) else {
            return Ok(Decoded::line_pending(buf));
        };

        let declared = parse_length(&buf[1..header_end])?;
        let payload_start = header_end + CRLF.len();

        let Ok(len) = usize::try_from(declared) else {
            return Ok(Decoded::Frame(ReplyFrame::Absent, payload_start));
        };

        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                limit: self.max_frame_size,
            });
        }

        let payload_end = payload_start + len;
        let total = payload_end + CRLF.len();
        if buf.len() < total {
            return Ok(Decoded::Incomplete {
                scanned: header_end,
                frame_len: Some(total),
            });
        }

        if &buf[payload_end..total] != CRLF {
            return Err(ProtocolError::MalformedFrame(format!(
                "bulk payload of {} bytes not followed by CRLF",
                len
            )));
        }

        let payload = Bytes::copy_from_slice(&buf[payload_start..payload_end]);
        Ok(Decoded::Frame(ReplyFrame::Bulk(payload), total))
    }
}

/// Result of one decode attempt on a possibly partial buffer
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// A complete frame and the number of bytes it occupied
    Frame(ReplyFrame, usize),

    /// More bytes are needed
    Incomplete {
        /// Offset where the next terminator search may resume
        scanned: usize,

        /// Full frame length, once a bulk header has been parsed
        frame_len: Option<usize>,
    },
}

impl Decoded {
    /// Still looking for a line terminator in `buf`
    fn line_pending(buf: &[u8]) -> Self {
        // Keep one byte of overlap so a `\r` at the end is re-examined
        Decoded::Incomplete {
            scanned: buf.len().saturating_sub(1),
            frame_len: None,
        }
    }
}

/// Decode one frame using the default size limit
pub fn decode_frame(buf: &[u8]) -> Result<Option<(ReplyFrame, usize)>, ProtocolError> {
    FrameDecoder::default().decode(buf)
}

/// Position of the first CRLF at or after `from`
fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    let from = from.min(buf.len());
    buf[from..]
        .windows(CRLF.len())
        .position(|window| window == CRLF)
        .map(|pos| from + pos)
}

fn parse_length(digits: &[u8]) -> Result<i64, ProtocolError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            ProtocolError::MalformedFrame(format!(
                "invalid bulk length {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}
