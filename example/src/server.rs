//! Loopback server answering fastpath calls for a single large object.
use std::{
    io::{self, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use pgfastpath::postgres::ProtocolVersion;

pub const LO_CREAT: i32 = 957;
pub const LO_OPEN: i32 = 952;
pub const LO_CLOSE: i32 = 953;
pub const LOREAD: i32 = 954;
pub const LOWRITE: i32 = 955;
pub const LO_LSEEK64: i32 = 3170;
pub const LO_TELL64: i32 = 3172;

const LO_OID: i32 = 16403;

/// Spawn the server, returns the address to connect to.
pub fn spawn(protocol: ProtocolVersion) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    thread::spawn(move || {
        let result = listener.accept().and_then(|(socket, _)| serve(socket, protocol));
        if let Err(err) = result {
            tracing::warn!("server stopped: {err}");
        }
    });

    Ok(addr)
}

#[derive(Default)]
struct LargeObject {
    data: Vec<u8>,
    offset: usize,
}

enum Response {
    Value(Option<Bytes>),
    Error(&'static str),
}

fn serve(socket: TcpStream, protocol: ProtocolVersion) -> io::Result<()> {
    let mut reader = BufReader::new(socket.try_clone()?);
    let mut writer = socket;
    let mut lo = LargeObject::default();

    loop {
        let (fnid, args) = match read_call(&mut reader, protocol) {
            Ok(call) => call,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };
        tracing::debug!(fnid, argc = args.len(), "server received call");

        let response = lo.call(fnid, args);
        let mut buf = BytesMut::new();
        match protocol {
            ProtocolVersion::V3 => write_v3(response, &mut buf),
            ProtocolVersion::V2 => write_v2(response, &mut buf),
        }
        writer.write_all(&buf)?;
    }
}

impl LargeObject {
    fn call(&mut self, fnid: i32, mut args: Vec<Option<Bytes>>) -> Response {
        let int = |i: i32| Response::Value(Some(Bytes::copy_from_slice(&i.to_be_bytes())));
        match fnid {
            LO_CREAT => int(LO_OID),
            LO_OPEN | LO_CLOSE => int(0),
            LOWRITE => {
                let data = args.pop().flatten().unwrap_or_default();
                self.data.truncate(self.offset);
                self.data.extend_from_slice(&data);
                self.offset += data.len();
                int(data.len() as i32)
            },
            LOREAD => {
                let len = args.pop().flatten().map(|mut b| b.get_i32()).unwrap_or(0) as usize;
                let end = self.data.len().min(self.offset + len);
                let data = Bytes::copy_from_slice(&self.data[self.offset..end]);
                self.offset = end;
                Response::Value(Some(data))
            },
            LO_LSEEK64 => {
                let _whence = args.pop();
                let offset = args.pop().flatten().map(|mut b| b.get_i64()).unwrap_or(0);
                self.offset = offset as usize;
                Response::Value(Some(Bytes::copy_from_slice(&offset.to_be_bytes())))
            },
            LO_TELL64 => {
                Response::Value(Some(Bytes::copy_from_slice(&(self.offset as i64).to_be_bytes())))
            },
            _ => Response::Error("function does not exist"),
        }
    }
}

fn read_i32(io: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    io.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u8(io: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    io.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_arg(io: &mut impl Read) -> io::Result<Option<Bytes>> {
    let len = read_i32(io)?;
    if len < 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    io.read_exact(&mut buf)?;
    Ok(Some(buf.into()))
}

fn read_call(io: &mut impl Read, protocol: ProtocolVersion) -> io::Result<(i32, Vec<Option<Bytes>>)> {
    let msgtype = read_u8(io)?;
    if msgtype != b'F' {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "expected function call"));
    }

    match protocol {
        ProtocolVersion::V3 => {
            let _len = read_i32(io)?;
            let fnid = read_i32(io)?;
            let mut header = [0u8; 6];
            io.read_exact(&mut header)?;
            let argc = u16::from_be_bytes([header[4], header[5]]);
            let args = (0..argc).map(|_| read_arg(io)).collect::<io::Result<_>>()?;
            let _result_format = [read_u8(io)?, read_u8(io)?];
            Ok((fnid, args))
        },
        ProtocolVersion::V2 => {
            let _nul = read_u8(io)?;
            let fnid = read_i32(io)?;
            let argc = read_i32(io)?;
            let args = (0..argc).map(|_| read_arg(io)).collect::<io::Result<_>>()?;
            Ok((fnid, args))
        },
    }
}

fn message(buf: &mut BytesMut, msgtype: u8, body: &[u8]) {
    buf.put_u8(msgtype);
    buf.put_i32(4 + body.len() as i32);
    buf.put_slice(body);
}

fn write_v3(response: Response, buf: &mut BytesMut) {
    match response {
        Response::Value(value) => {
            let mut body = BytesMut::new();
            match value {
                Some(value) => {
                    body.put_i32(value.len() as i32);
                    body.put_slice(&value);
                },
                None => body.put_i32(-1),
            }
            message(buf, b'N', b"SNOTICE\0Mfastpath call served by loopback\0\0");
            message(buf, b'V', &body);
        },
        Response::Error(msg) => {
            let body = format!("SERROR\0C42883\0M{msg}\0\0");
            message(buf, b'E', body.as_bytes());
        },
    }
    message(buf, b'Z', b"I");
}

fn write_v2(response: Response, buf: &mut BytesMut) {
    match response {
        Response::Value(Some(value)) => {
            buf.put_slice(b"VG");
            buf.put_i32(value.len() as i32);
            buf.put_slice(&value);
            buf.put_u8(b'0');
        },
        Response::Value(None) => buf.put_slice(b"V0"),
        Response::Error(msg) => {
            buf.put_u8(b'E');
            buf.put_slice(format!("ERROR:  {msg}\n").as_bytes());
            buf.put_u8(0);
            buf.put_slice(b"V0");
        },
    }
    buf.put_u8(b'Z');
}
