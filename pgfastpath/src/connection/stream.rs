use std::io::{self, BufRead, BufReader, Read, Write};

use bytes::BytesMut;

use super::Config;
use crate::{
    Result,
    common::verbose,
    ext::ReadExt,
    postgres::{ProtocolError, TransactionStatus, backend::ReadyForQuery},
};

/// Buffered postgres stream.
///
/// Reads are buffered with [`BufReader`], messages are written to an
/// in memory buffer and sent with [`flush`][PgStream::flush].
#[derive(Debug)]
pub struct PgStream<S> {
    reader: BufReader<S>,
    write_buf: BytesMut,
    ready_pending: bool,
    status: Option<TransactionStatus>,
}

impl<S: Read + Write> PgStream<S> {
    /// Create new buffered stream with buffer sizes from `config`.
    pub fn new(socket: S, config: &Config) -> Self {
        Self::with_capacity(socket, config.read_capacity, config.write_capacity)
    }

    pub(crate) fn with_capacity(socket: S, read_capacity: usize, write_capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(read_capacity.max(1), socket),
            write_buf: BytesMut::with_capacity(write_capacity),
            ready_pending: false,
            status: None,
        }
    }

    /// Returns the pending outgoing messages.
    pub fn write_buf(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    /// Send all buffered messages.
    ///
    /// The buffer is cleared even on error, a partially written message
    /// cannot be resumed.
    pub fn flush(&mut self) -> io::Result<()> {
        let result = self.write_all_buf();
        self.write_buf.clear();
        result
    }

    fn write_all_buf(&mut self) -> io::Result<()> {
        let socket = self.reader.get_mut();
        socket.write_all(&self.write_buf)?;
        socket.flush()
    }

    /// Request to ignore all backend messages until `ReadyForQuery` is received.
    ///
    /// The messages are skipped on the next [`sync`][PgStream::sync].
    pub fn ready_request(&mut self) {
        self.ready_pending = true;
    }

    /// Returns `true` if a previous response was not read to completion.
    pub fn is_ready_pending(&self) -> bool {
        self.ready_pending
    }

    /// Skip protocol 3.0 messages until `ReadyForQuery`, if requested.
    pub(crate) fn sync(&mut self) -> Result<()> {
        if !self.ready_pending {
            return Ok(());
        }

        loop {
            let msgtype = self.read_u8()?;
            let len = self.read_i32()?;
            if len < 4 {
                return Err(ProtocolError::MessageLength { msgtype, found: len }.into());
            }

            if msgtype == ReadyForQuery::MSGTYPE {
                if len != ReadyForQuery::LEN {
                    return Err(ProtocolError::ReadyLength { found: len }.into());
                }
                let status = self.read_u8()?;
                self.set_transaction_status(status);
                break;
            }

            verbose!(msgtype = crate::postgres::backend::message_name(msgtype), "skipped");
            self.skip(len as u64 - 4)?;
        }

        self.ready_pending = false;
        Ok(())
    }

    /// Returns the transaction status of the last `ReadyForQuery`.
    ///
    /// Protocol 2.0 `ReadyForQuery` carries no status.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.status
    }

    pub(crate) fn set_transaction_status(&mut self, status: u8) {
        self.status = TransactionStatus::from_u8(status);
    }

    /// Gets a reference to the underlying socket.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Gets a mutable reference to the underlying socket.
    ///
    /// Reading from the socket directly may corrupt the buffered state.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Unwraps this `PgStream`, returning the underlying socket.
    ///
    /// Buffered data is lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: Read> Read for PgStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<S: Read> BufRead for PgStream<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt);
    }
}
