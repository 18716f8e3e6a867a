//! Protocol error
use std::fmt;

use super::{ProtocolVersion, backend};

/// An error when the backend sends something a fastpath call does not expect.
///
/// After a [`ProtocolError`] the stream position is unknown.
pub enum ProtocolError {
    /// Message type that is not part of a function call response.
    Unexpected {
        found: u8,
        version: ProtocolVersion,
    },
    /// `ReadyForQuery` length must always be 5.
    ReadyLength {
        found: i32,
    },
    /// `FunctionCallResponse` value length that cannot be decoded.
    ValueLength {
        found: i32,
    },
    /// Message length smaller than the length field itself.
    MessageLength {
        msgtype: u8,
        found: i32,
    },
    /// Message body that does not follow its format.
    Malformed {
        msgtype: u8,
    },
}

impl ProtocolError {
    pub(crate) fn unexpected(found: u8, version: ProtocolVersion) -> ProtocolError {
        Self::Unexpected { found, version }
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Unexpected { found, version } => write!(
                f,
                "Unexpected message `{}` ({:?}) in protocol {version} function call",
                backend::message_name(found),
                found as char,
            ),
            ProtocolError::ReadyLength { found } => {
                write!(f, "Expected `ReadyForQuery` length 5, found {found}")
            },
            ProtocolError::ValueLength { found } => {
                write!(f, "Invalid `FunctionCallResponse` value length {found}")
            },
            ProtocolError::MessageLength { msgtype, found } => write!(
                f,
                "Invalid `{}` message length {found}",
                backend::message_name(msgtype),
            ),
            ProtocolError::Malformed { msgtype } => {
                write!(f, "Malformed `{}` message", backend::message_name(msgtype))
            },
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
