//! Connection configuration.
use std::{borrow::Cow, fmt};

use crate::postgres::ProtocolVersion;

const DEFAULT_READ_CAPACITY: usize = 8 * 1024;
const DEFAULT_WRITE_CAPACITY: usize = 1024;

/// Fastpath connection config.
///
/// ```
/// use pgfastpath::{Config, postgres::ProtocolVersion};
///
/// let config = Config::new()
///     .protocol("2.0".parse().unwrap())
///     .write_capacity(4096);
///
/// assert_eq!(config.protocol_version(), ProtocolVersion::V2);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) protocol: ProtocolVersion,
    pub(crate) read_capacity: usize,
    pub(crate) write_capacity: usize,
}

impl Config {
    /// Create config with protocol 3.0 and default buffer sizes.
    pub fn new() -> Config {
        Config {
            protocol: ProtocolVersion::V3,
            read_capacity: DEFAULT_READ_CAPACITY,
            write_capacity: DEFAULT_WRITE_CAPACITY,
        }
    }

    /// Set the protocol version negotiated at startup.
    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the read buffer capacity.
    pub fn read_capacity(mut self, capacity: usize) -> Self {
        self.read_capacity = capacity;
        self
    }

    /// Set the initial write buffer capacity.
    ///
    /// The buffer still grows for larger messages.
    pub fn write_capacity(mut self, capacity: usize) -> Self {
        self.write_capacity = capacity;
        self
    }

    /// Returns the configured protocol version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when parsing config value.
pub struct ParseError {
    pub(crate) reason: Cow<'static,str>,
}

impl std::error::Error for ParseError { }

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason)
        }
        write!(f, "failed to parse config: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
