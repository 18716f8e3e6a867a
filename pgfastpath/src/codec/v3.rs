use std::io::{Read, Write};

use bytes::BytesMut;

use super::{Codec, FastpathValue, NoticeSink, read_value};
use crate::{
    Result,
    arg::FunctionArg,
    common::verbose,
    connection::PgStream,
    ext::ReadExt,
    postgres::{
        DiagnosticRecord, Notification, ProtocolError, ProtocolVersion,
        backend::{FunctionCallResponse, ReadyForQuery},
        frontend::{self, FunctionCall},
    },
};

/// Protocol 3.0 function call codec.
///
/// Response messages:
///
/// - `NotificationResponse`, forwarded to the sink
/// - `ErrorResponse`, fails immediately, the remaining messages are left in the stream
/// - `NoticeResponse`, forwarded to the sink
/// - `FunctionCallResponse`, the result
/// - `ReadyForQuery`, end of response
#[derive(Clone, Copy, Debug, Default)]
pub struct V3;

impl Codec for V3 {
    const VERSION: ProtocolVersion = ProtocolVersion::V3;

    fn write_call<A: FunctionArg>(&self, function_id: i32, args: &[A], buf: &mut BytesMut) {
        frontend::write(FunctionCall { function_id, args }, buf);
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

        loop {
            let msgtype = stream.read_u8()?;
            verbose!(msgtype = crate::postgres::backend::message_name(msgtype), "recv");

            match msgtype {
                Notification::MSGTYPE => {
                    sink.notification(Notification::read(stream, Self::VERSION)?);
                },
                DiagnosticRecord::ERROR => {
                    let error = DiagnosticRecord::read(msgtype, stream, Self::VERSION)?;
                    // `ReadyForQuery` is still pending
                    stream.ready_request();
                    return Err(error.into());
                },
                DiagnosticRecord::NOTICE => {
                    sink.notice(DiagnosticRecord::read(msgtype, stream, Self::VERSION)?);
                },
                FunctionCallResponse::MSGTYPE => {
                    let _len = stream.read_i32()?;
                    let value_len = stream.read_i32()?;
                    result = read_value(stream, value_len, want_int)?;
                },
                ReadyForQuery::MSGTYPE => {
                    let len = stream.read_i32()?;
                    if len != ReadyForQuery::LEN {
                        return Err(ProtocolError::ReadyLength { found: len }.into());
                    }
                    let status = stream.read_u8()?;
                    stream.set_transaction_status(status);
                    return Ok(result);
                },
                found => return Err(ProtocolError::unexpected(found, Self::VERSION).into()),
            }
        }
    }
}
