use std::fmt;

use crate::connection::ParseError;

/// Frontend/Backend protocol generation negotiated at startup.
///
/// The two generations frame messages differently and are not compatible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Protocol 2.0, used by PostgreSQL 6.4 to 7.3.
    V2,
    /// Protocol 3.0, used by PostgreSQL 7.4 and later.
    #[default]
    V3,
}

impl ProtocolVersion {
    /// The protocol version number as sent in the startup message.
    ///
    /// The most significant 16 bits are the major version number,
    /// the least significant 16 bits are the minor version number.
    pub const fn code(self) -> u32 {
        match self {
            ProtocolVersion::V2 => 131_072,
            ProtocolVersion::V3 => 196_608,
        }
    }

    /// Returns the version of a startup protocol code.
    ///
    /// Minor version is ignored.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code >> 16 {
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            _ => None,
        }
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2" | "2.0" => Ok(ProtocolVersion::V2),
            "3" | "3.0" => Ok(ProtocolVersion::V3),
            _ => Err(ParseError { reason: format!("unknown protocol version {s:?}").into() }),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V2 => f.write_str("2.0"),
            ProtocolVersion::V3 => f.write_str("3.0"),
        }
    }
}
