//! Function call message codec.
//!
//! Protocol 2.0 and 3.0 frame a function call differently, and report errors
//! differently. Each generation is one [`Codec`] implementation:
//!
//! - [`V3`] fails on the first `ErrorResponse`, notices go to the [`NoticeSink`].
//! - [`V2`] collects errors and notices until `ReadyForQuery`, then fails with all of them.
use std::{
    fmt,
    io::{Read, Write},
};

use bytes::{Bytes, BytesMut};

use crate::{
    Result,
    arg::FunctionArg,
    connection::PgStream,
    ext::ReadExt,
    postgres::{DiagnosticRecord, Notification, ProtocolError, ProtocolVersion},
};

mod v2;
mod v3;

pub use v2::V2;
pub use v3::V3;

/// Function call request encoder and response decoder of one protocol generation.
pub trait Codec {
    /// The protocol generation this codec speaks.
    const VERSION: ProtocolVersion;

    /// Write a function call message to `buf`.
    fn write_call<A: FunctionArg>(&self, function_id: i32, args: &[A], buf: &mut BytesMut);

    /// Read backend messages until the function call completes.
    ///
    /// If `want_int` is `true`, a non empty result is decoded as `int4`.
    fn read_result<S, N>(
        &self,
        stream: &mut PgStream<S>,
        want_int: bool,
        sink: &N,
    ) -> Result<FastpathValue>
    where
        S: Read + Write,
        N: NoticeSink + ?Sized;
}

/// Receiver of messages that arrive during a function call but are not part of the result.
///
/// It is called while the stream is locked, it must not block.
pub trait NoticeSink {
    /// A protocol 3.0 `NoticeResponse`.
    fn notice(&self, notice: DiagnosticRecord);

    /// Asynchronous notification.
    fn notification(&self, notification: Notification);
}

/// Function call result.
///
/// Note that [`Null`][FastpathValue::Null] and an empty [`Bytes`][FastpathValue::Bytes]
/// are different results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FastpathValue {
    /// Function returns NULL, or no value at all.
    Null,
    /// `int4` result, only when requested.
    Int(i32),
    /// Result in its binary representation.
    Bytes(Bytes),
}

impl FastpathValue {
    /// Returns `true` if result is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer result.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(int) => Some(*int),
            _ => None,
        }
    }

    /// Returns the binary result.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Try to get the integer result.
    pub fn try_int(self) -> Result<i32, UnexpectedResult> {
        match self {
            Self::Int(int) => Ok(int),
            other => Err(UnexpectedResult { expected: "integer", found: other.kind() }),
        }
    }

    /// Try to get the binary result.
    pub fn try_bytes(self) -> Result<Bytes, UnexpectedResult> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            other => Err(UnexpectedResult { expected: "binary", found: other.kind() }),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "integer",
            Self::Bytes(_) => "binary",
        }
    }
}

/// Read a function call result value of `len` bytes.
///
/// Length -1 is NULL, zero is an empty binary even when integer requested.
/// For integer, any bytes after the first 4 are skipped.
fn read_value<R: Read>(io: &mut R, len: i32, want_int: bool) -> Result<FastpathValue> {
    let value = match len {
        -1 => FastpathValue::Null,
        0 => FastpathValue::Bytes(Bytes::new()),
        1..4 if want_int => return Err(ProtocolError::ValueLength { found: len }.into()),
        4.. if want_int => {
            let int = io.read_i32()?;
            io.skip(len as u64 - 4)?;
            FastpathValue::Int(int)
        },
        1.. => FastpathValue::Bytes(io.read_bytes(len as usize)?),
        _ => return Err(ProtocolError::ValueLength { found: len }.into()),
    };
    Ok(value)
}

/// An error when function call result is not the expected kind.
pub struct UnexpectedResult {
    expected: &'static str,
    found: &'static str,
}

impl UnexpectedResult {
    pub(crate) fn new(expected: &'static str, found: &'static str) -> Self {
        Self { expected, found }
    }

    /// The expected kind of result.
    pub fn expected(&self) -> &'static str {
        self.expected
    }

    /// The kind of result received.
    pub fn found(&self) -> &'static str {
        self.found
    }
}

impl std::error::Error for UnexpectedResult { }

impl fmt::Display for UnexpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} function result, found {}", self.expected, self.found)
    }
}

impl fmt::Debug for UnexpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        cell::RefCell,
        io::{self, Cursor, Read, Write},
    };

    use crate::{
        codec::NoticeSink,
        connection::PgStream,
        postgres::{DiagnosticRecord, Notification},
    };

    /// Socket that returns at most `chunk` bytes per read.
    pub struct Chunked {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
        pub chunk: usize,
    }

    impl Chunked {
        pub fn stream(input: Vec<u8>, chunk: usize) -> PgStream<Chunked> {
            PgStream::with_capacity(Chunked { input: Cursor::new(input), output: vec![], chunk }, 1, 64)
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.input.read(&mut buf[..n])
        }
    }

    impl Write for Chunked {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct Sink {
        pub notices: RefCell<Vec<DiagnosticRecord>>,
        pub notifications: RefCell<Vec<Notification>>,
    }

    impl NoticeSink for Sink {
        fn notice(&self, notice: DiagnosticRecord) {
            self.notices.borrow_mut().push(notice);
        }

        fn notification(&self, notification: Notification) {
            self.notifications.borrow_mut().push(notification);
        }
    }

    /// Protocol 3.0 message with length.
    pub fn message(msgtype: u8, body: &[u8]) -> Vec<u8> {
        let mut msg = vec![msgtype];
        msg.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
        msg.extend_from_slice(body);
        msg
    }

    /// Protocol 3.0 `ErrorResponse` or `NoticeResponse` with severity and message fields.
    pub fn diagnostic(msgtype: u8, severity: &str, message: &str) -> Vec<u8> {
        let mut body = vec![b'S'];
        body.extend_from_slice(severity.as_bytes());
        body.extend_from_slice(b"\0M");
        body.extend_from_slice(message.as_bytes());
        body.extend_from_slice(b"\0\0");
        self::message(msgtype, &body)
    }
}
