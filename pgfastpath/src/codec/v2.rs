use std::io::{Read, Write};

use bytes::BytesMut;

use super::{Codec, FastpathValue, NoticeSink, read_value};
use crate::{
    Result,
    arg::FunctionArg,
    common::verbose,
    connection::PgStream,
    error::ServerError,
    ext::ReadExt,
    postgres::{
        DiagnosticRecord, Notification, ProtocolError, ProtocolVersion,
        backend::{FunctionCallResponse, ReadyForQuery},
        frontend::LegacyFunctionCall,
    },
};

/// Protocol 2.0 function call codec.
///
/// Errors and notices does not end the call. They are collected until
/// `ReadyForQuery`, and the call fails with all of them if any was received.
#[derive(Clone, Copy, Debug, Default)]
pub struct V2;

impl Codec for V2 {
    const VERSION: ProtocolVersion = ProtocolVersion::V2;

    fn write_call<A: FunctionArg>(&self, function_id: i32, args: &[A], buf: &mut BytesMut) {
        LegacyFunctionCall { function_id, args }.write(buf);
    }

    fn read_result<S, N>(
        &self,
        stream: &mut PgStream<S>,
        want_int: bool,
        sink: &N,
    ) -> Result<FastpathValue>
    where
        S: Read + Write,
        N: NoticeSink + ?Sized,
    {
        let mut result = FastpathValue::Null;
        let mut errors = String::new();

        loop {
            let msgtype = stream.read_u8()?;
            verbose!(msgtype = crate::postgres::backend::message_name(msgtype), "recv");

            match msgtype {
                Notification::MSGTYPE => {
                    sink.notification(Notification::read(stream, Self::VERSION)?);
                },
                DiagnosticRecord::ERROR | DiagnosticRecord::NOTICE => {
                    let record = DiagnosticRecord::read(msgtype, stream, Self::VERSION)?;
                    errors.push_str(record.message());
                },
                FunctionCallResponse::MSGTYPE => match stream.read_u8()? {
                    FunctionCallResponse::VALUE => {
                        let len = stream.read_i32()?;
                        result = read_value(stream, len, want_int)?;
                        // trailing '0'
                        let _ = stream.read_u8()?;
                    },
                    // `NO_VALUE`, or anything else, carries no result
                    _ => { },
                },
                ReadyForQuery::MSGTYPE => break,
                found => return Err(ProtocolError::unexpected(found, Self::VERSION).into()),
            }
        }

        if !errors.is_empty() {
            return Err(ServerError::Legacy(errors).into());
        }

        Ok(result)
    }
}
