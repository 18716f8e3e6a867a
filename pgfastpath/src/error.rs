//! `pgfastpath` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    codec::UnexpectedResult,
    connection::ParseError,
    postgres::{DiagnosticRecord, ProtocolError},
    registry::{FunctionNotFound, InvalidFunctionId},
};

/// A specialized [`Result`] type for `pgfastpath` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `pgfastpath` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns `true` if the connection this error came from must not be used anymore.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::ConnectionBroken(_) | ErrorKind::Protocol(_))
    }

    pub(crate) fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// All possible error kind from `pgfastpath` library.
pub enum ErrorKind {
    Config(ParseError),
    Protocol(ProtocolError),
    ConnectionBroken(io::Error),
    Server(ServerError),
    FunctionNotFound(FunctionNotFound),
    InvalidFunctionId(InvalidFunctionId),
    UnexpectedResult(UnexpectedResult),
}

/// An error reported by the backend during a function call.
pub enum ServerError {
    /// Protocol 3.0 `ErrorResponse`.
    Response(DiagnosticRecord),
    /// Protocol 2.0 errors and notices received during the call, concatenated.
    Legacy(String),
}

impl ServerError {
    /// Returns the server message.
    pub fn message(&self) -> &str {
        match self {
            ServerError::Response(record) => record.message(),
            ServerError::Legacy(message) => message,
        }
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<io::Error>e => ErrorKind::ConnectionBroken(e));
from!(<ServerError>e => ErrorKind::Server(e));
from!(<DiagnosticRecord>e => ErrorKind::Server(ServerError::Response(e)));
from!(<FunctionNotFound>e => ErrorKind::FunctionNotFound(e));
from!(<InvalidFunctionId>e => ErrorKind::InvalidFunctionId(e));
from!(<UnexpectedResult>e => ErrorKind::UnexpectedResult(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => fmt::Display::fmt(e, f),
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::ConnectionBroken(e) => write!(f, "the connection is broken: {e}"),
            Self::Server(e) => fmt::Display::fmt(e, f),
            Self::FunctionNotFound(e) => fmt::Display::fmt(e, f),
            Self::InvalidFunctionId(e) => fmt::Display::fmt(e, f),
            Self::UnexpectedResult(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ServerError { }

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Response(record) => fmt::Display::fmt(record, f),
            ServerError::Legacy(message) => write!(f, "fastpath error: {}", message.trim_end()),
        }
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
