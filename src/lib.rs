//! # kvprobe
//!
//! Sends a command to one or more Redis-compatible servers and formats the
//! replies:
//! - Minimal RESP reply framing (status, error, bulk) across partial reads
//! - Structured decoding of the `info` report
//! - `%{field}` templates rendered from a per-host result store
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Runner / run_host                        │
//! │          (directives replayed per host, in order)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Connection                              │
//! │           (one command, one reply, then closed)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ FrameReader │          │ Info decoder│
//!   │ (+ decoder) │          │             │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ ResultStore │──▶ template::render
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod host;
pub mod info;
pub mod store;
pub mod template;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ProbeError, ProtocolError, Result};
pub use config::Config;
pub use host::HostAddr;
pub use store::ResultStore;
pub use session::{Directive, Runner};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvprobe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
