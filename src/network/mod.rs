//! Network Module
//!
//! TCP client handling.
//!
//! ## Lifecycle
//! - One connection per command
//! - Blocking reads bounded by the configured deadlines
//! - Socket closed when the connection is dropped

mod connection;

pub use connection::{execute, Connection};
