//! Postgres Backend Messages
//!
//! Only the messages that can appear in a function call response.
use std::{fmt, io::Read};

use bytes::Buf;

use super::{ProtocolError, ProtocolVersion};
use crate::{
    Result,
    ext::{BytesExt, ReadExt},
};

/// Identifies the message as a function call result.
pub struct FunctionCallResponse;

impl FunctionCallResponse {
    pub const MSGTYPE: u8 = b'V';

    /// Protocol 2.0 marker that a result value follows.
    pub const VALUE: u8 = b'G';

    /// Protocol 2.0 marker of an empty result, also the value terminator.
    pub const NO_VALUE: u8 = b'0';
}

/// Identifies the message type. ReadyForQuery is sent whenever the backend is ready for a new query cycle.
pub struct ReadyForQuery;

impl ReadyForQuery {
    pub const MSGTYPE: u8 = b'Z';

    /// Protocol 3.0 `ReadyForQuery` length is fixed, the length itself and the status byte.
    pub const LEN: i32 = 5;
}

/// Get message name from message type.
///
/// Returns `"Unknown"` for unknown message type.
pub fn message_name(msgtype: u8) -> &'static str {
    match msgtype {
        Notification::MSGTYPE => "NotificationResponse",
        DiagnosticRecord::ERROR => "ErrorResponse",
        DiagnosticRecord::NOTICE => "NoticeResponse",
        FunctionCallResponse::MSGTYPE => "FunctionCallResponse",
        ReadyForQuery::MSGTYPE => "ReadyForQuery",
        _ => "Unknown",
    }
}

/// Current backend transaction status indicator, sent with `ReadyForQuery`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not in a transaction block.
    Idle,
    /// In a transaction block.
    Transaction,
    /// In a failed transaction block, queries will be rejected until block is ended.
    Failed,
}

impl TransactionStatus {
    pub fn from_u8(status: u8) -> Option<Self> {
        match status {
            b'I' => Some(Self::Idle),
            b'T' => Some(Self::Transaction),
            b'E' => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Identifies the message as a notification response.
///
/// Sent when a `NOTIFY` was executed for a channel this session is listening to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The process ID of the notifying backend process.
    pub process_id: i32,
    /// The name of the channel that the notify has been raised on.
    pub channel: String,
    /// The "payload" string passed from the notifying process.
    ///
    /// Always empty in protocol 2.0.
    pub payload: String,
}

impl Notification {
    pub const MSGTYPE: u8 = b'A';

    /// Read the message body, the message type is already consumed.
    pub fn read(io: &mut impl Read, version: ProtocolVersion) -> Result<Self> {
        match version {
            ProtocolVersion::V3 => {
                let _len = io.read_i32()?;
                Ok(Self {
                    process_id: io.read_i32()?,
                    channel: io.read_nul_string()?,
                    payload: io.read_nul_string()?,
                })
            },
            ProtocolVersion::V2 => Ok(Self {
                process_id: io.read_i32()?,
                channel: io.read_nul_string()?,
                payload: String::new(),
            }),
        }
    }
}

/// Error or notice sent by the backend.
///
/// In protocol 3.0 the message body consists of one or more identified fields,
/// followed by a zero byte as a terminator. Fields can appear in any order.
///
/// For each field there is the following:
///
/// `Byte1` A code identifying the field type; if zero, this is the message terminator and no string follows.
/// Since more field types might be added in future,
/// frontends should silently ignore fields of unrecognized type.
///
/// `String` The field value.
///
/// In protocol 2.0 the body is a single string, the whole string is the message.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DiagnosticRecord {
    severity: Option<String>,
    code: Option<String>,
    message: String,
    detail: Option<String>,
    hint: Option<String>,
}

impl DiagnosticRecord {
    /// Message type of `ErrorResponse`.
    pub const ERROR: u8 = b'E';
    /// Message type of `NoticeResponse`.
    pub const NOTICE: u8 = b'N';

    /// Read the message body, the message type is already consumed.
    pub fn read(msgtype: u8, io: &mut impl Read, version: ProtocolVersion) -> Result<Self> {
        match version {
            ProtocolVersion::V3 => {
                let len = io.read_i32()?;
                if len < 4 {
                    return Err(ProtocolError::MessageLength { msgtype, found: len }.into());
                }
                let body = io.read_bytes(len as usize - 4)?;
                Self::parse_fields(msgtype, body)
            },
            ProtocolVersion::V2 => Ok(Self {
                message: io.read_nul_string()?,
                ..Default::default()
            }),
        }
    }

    fn parse_fields(msgtype: u8, mut body: bytes::Bytes) -> Result<Self> {
        let mut me = Self::default();
        loop {
            if !body.has_remaining() {
                return Err(ProtocolError::Malformed { msgtype }.into());
            }
            let code = body.get_u8();
            if code == b'\0' {
                break;
            }
            let Some(value) = body.get_nul_string() else {
                return Err(ProtocolError::Malformed { msgtype }.into());
            };
            match code {
                b'S' => me.severity = Some(value),
                b'C' => me.code = Some(value),
                b'M' => me.message = value,
                b'D' => me.detail = Some(value),
                b'H' => me.hint = Some(value),
                _ => {},
            }
        }
        Ok(me)
    }

    /// The primary human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `ERROR`, `FATAL`, or `PANIC` (in an error message), or `WARNING`, `NOTICE`,
    /// `DEBUG`, `INFO`, or `LOG` (in a notice message).
    ///
    /// Always `None` in protocol 2.0.
    pub fn severity(&self) -> Option<&str> {
        self.severity.as_deref()
    }

    /// The SQLSTATE code for the error.
    ///
    /// Always `None` in protocol 2.0.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// An optional secondary error message carrying more detail about the problem.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// An optional suggestion what to do about the problem.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

impl std::error::Error for DiagnosticRecord { }

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{severity}: ")?;
        }
        f.write_str(self.message.trim_end())?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
