//! Host addresses
//!
//! Parses and validates `<host>:<port>` arguments.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ProbeError, Result};

static HOST_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9.-]+):([0-9]+)$").expect("host:port pattern is valid")
});

/// A validated `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddr {
    host: String,
    port: u16,

    /// Port digits as written, leading zeros included
    port_text: String,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            port_text: port.to_string(),
        }
    }

    /// Parse a `host:port` argument
    pub fn parse(arg: &str) -> Result<Self> {
        let captures = HOST_PORT
            .captures(arg)
            .ok_or_else(|| ProbeError::InvalidHost(arg.to_string()))?;

        let port = captures[2]
            .parse::<u16>()
            .map_err(|_| ProbeError::InvalidHost(arg.to_string()))?;

        Ok(Self {
            host: captures[1].to_string(),
            port,
            port_text: captures[2].to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port exactly as given on the command line
    pub fn port_text(&self) -> &str {
        &self.port_text
    }

    /// `host:port` as given on the command line
    pub fn hostport(&self) -> String {
        self.to_string()
    }
}

impl FromStr for HostAddr {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port_text)
    }
}

/// Split a host list into valid addresses and rejected arguments
pub fn parse_hosts<'a, I>(args: I) -> (Vec<HostAddr>, Vec<ProbeError>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hosts = Vec::new();
    let mut rejected = Vec::new();

    for arg in args {
        match HostAddr::parse(arg) {
            Ok(addr) => hosts.push(addr),
            Err(e) => rejected.push(e),
        }
    }

    (hosts, rejected)
}
