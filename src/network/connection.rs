//! Connection
//!
//! A single-use client connection: connect, send one command, read one reply.

use std::io::BufWriter;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use crate::config::Config;
use crate::error::{ProbeError, Result};
use crate::host::HostAddr;
use crate::protocol::{write_command, FrameReader, ReplyFrame};

/// Exclusively-owned connection to one server
///
/// Dropping the connection closes the socket.
pub struct Connection {
    /// TCP stream reader (frame assembly)
    reader: FrameReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Connect to `addr`, trying each resolved address within the connect deadline
    pub fn open(addr: &HostAddr, config: &Config) -> Result<Self> {
        let connect_err = |source: std::io::Error| ProbeError::Connect {
            addr: addr.hostport(),
            source,
        };

        let resolved: Vec<SocketAddr> = (addr.host(), addr.port())
            .to_socket_addrs()
            .map_err(connect_err)?
            .collect();

        let mut last_err = None;
        for socket_addr in resolved {
            let attempt = if config.connect_timeout_ms > 0 {
                TcpStream::connect_timeout(&socket_addr, config.connect_timeout())
            } else {
                TcpStream::connect(socket_addr)
            };

            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    tracing::debug!("Connect to {} ({}) failed: {}", addr, socket_addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        })))
    }

    /// Wrap an already-connected stream
    ///
    /// Sets up buffered I/O and configures timeouts
    pub fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(config.read_timeout()))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(config.write_timeout()))?;
        }

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        tracing::debug!("Connected to {}", peer_addr);

        Ok(Self {
            reader: FrameReader::with_config(read_stream, config),
            writer: BufWriter::new(write_stream),
            peer_addr,
        })
    }

    /// Send one command and wait for its reply
    pub fn request(&mut self, command: &str) -> Result<ReplyFrame> {
        tracing::debug!("Sending {:?} to {}", command, self.peer_addr);
        write_command(&mut self.writer, command)?;

        let frame = self.reader.read_frame()?;
        tracing::trace!("Reply from {}: {:?}", self.peer_addr, frame);
        Ok(frame)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Open a connection, run one command, and close it
pub fn execute(addr: &HostAddr, command: &str, config: &Config) -> Result<ReplyFrame> {
    let mut connection = Connection::open(addr, config)?;
    connection.request(command)
}
