//! Configuration for kvprobe
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Client configuration shared by every host in a run
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Deadline for establishing the TCP connection (milliseconds)
    pub connect_timeout_ms: u64,

    /// Deadline for assembling one reply frame (milliseconds)
    ///
    /// Applied both per socket read and to the whole accumulation loop.
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Size of the first read issued for a reply
    pub initial_read_size: usize,

    /// Upper bound on a single reply frame (in bytes)
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            initial_read_size: 128,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the size of the first read for each reply
    pub fn initial_read_size(mut self, size: usize) -> Self {
        self.config.initial_read_size = size;
        self
    }

    /// Set the maximum reply frame size (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
