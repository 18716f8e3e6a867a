//! Postgres Frontend Messages
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{BufMut, BytesMut};

use crate::{
    arg::FunctionArg,
    ext::{BufMutExt, UsizeExt},
};

/// Binary has format code one.
///
/// Binary representations for integers use network byte order (most significant byte first).
const BINARY: u16 = 1;

/// Write a frontend message to `buf`.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    // msgtype + length
    const PREFIX: usize = 1 + 4;

    let size_hint = msg.size_hint();
    buf.reserve(PREFIX + size_hint as usize);

    let offset = buf.len();
    buf.put_u8(F::MSGTYPE);
    buf.put_u32(4 + size_hint);

    msg.encode(&mut *buf);

    assert_eq!(
        buf.len() - offset,
        PREFIX + size_hint as usize,
        "Frontend message body size not equal to size hint"
    );
}

/// A type which can be encoded into postgres frontend message
pub trait FrontendProtocol {
    /// Message type.
    const MSGTYPE: u8;

    /// Size of the main body.
    ///
    /// Note that this is **only** the size of main body as oppose of actual postgres message which
    /// include the length itself.
    fn size_hint(&self) -> u32;

    /// Write the main body of the message.
    ///
    /// The lenght of body written must be equal to the
    /// length returned by [`size_hint`][FrontendProtocol::size_hint].
    fn encode(self, buf: impl BufMut);
}

/// Identifies the message as a function call, protocol 3.0.
///
/// ```text
/// [F][len:4][fnid:4][argfmt_len:2=1][argfmt:2=1][argc:2][arg..][resultfmt:2=1]
/// ```
///
/// All arguments and the result are transferred in binary format.
pub struct FunctionCall<'a, A> {
    /// Specifies the object ID of the function to call.
    pub function_id: i32,
    /// The argument values.
    pub args: &'a [A],
}

impl<A: FunctionArg> FrontendProtocol for FunctionCall<'_, A> {
    const MSGTYPE: u8 = b'F';

    fn size_hint(&self) -> u32 {
        // fnid, argument format codes length, argument format code,
        // argument length, result format code
        const FIXED: u32 = 4 + 2 + 2 + 2 + 2;

        // length field (4) is added by `write`, thus the total length is 16 + args
        FIXED + self.args.iter().map(FunctionArg::size_hint).sum::<u32>()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_i32(self.function_id);

        // one format code applied to all arguments
        buf.put_u16(1);
        buf.put_u16(BINARY);

        buf.put_u16(self.args.len().try_into().expect("too many function arguments"));
        for arg in self.args {
            arg.encode(&mut buf);
        }

        buf.put_u16(BINARY);
    }
}

/// Identifies the message as a function call, protocol 2.0.
///
/// Protocol 2.0 messages carry no length, thus [`LegacyFunctionCall`] does not implement
/// [`FrontendProtocol`]. To write it, use [`LegacyFunctionCall::write`].
///
/// ```text
/// [F][\0][fnid:4][argc:4][arg..]
/// ```
pub struct LegacyFunctionCall<'a, A> {
    /// Specifies the object ID of the function to call.
    pub function_id: i32,
    /// The argument values.
    pub args: &'a [A],
}

impl<A: FunctionArg> LegacyFunctionCall<'_, A> {
    pub const MSGTYPE: u8 = b'F';

    pub fn write(self, buf: &mut BytesMut) {
        let args_size = self.args.iter().map(FunctionArg::size_hint).sum::<u32>();
        buf.reserve(1 + 1 + 4 + 4 + args_size as usize);

        buf.put_u8(Self::MSGTYPE);
        // unused string
        buf.put_nul_string("");
        buf.put_i32(self.function_id);
        buf.put_i32(self.args.len().to_i32());
        for arg in self.args {
            arg.encode(&mut *buf);
        }
    }
}
