//! Protocol Module
//!
//! Client side of the server's line-based reply protocol (RESP subset).
//!
//! ## Request Format
//! ```text
//! ┌─────────────────────────────┬──────┐
//! │        Command text         │ \r\n │
//! └─────────────────────────────┴──────┘
//! ```
//!
//! ## Reply Formats
//! ```text
//! +<text>\r\n                 Status
//! -<text>\r\n                 Error
//! $<len>\r\n<payload>\r\n     Bulk (len >= 0)
//! $-1\r\n                     Absent
//! ```
//!
//! ### Unsupported Markers
//! - `:` integer and `*` array replies
//! - any other leading byte

mod command;
mod frame;
mod reader;

pub use command::{encode_command, write_command, CRLF};
pub use frame::{decode_frame, FrameDecoder, ReplyFrame, ReplyKind, DEFAULT_MAX_FRAME_SIZE};
pub use reader::FrameReader;
