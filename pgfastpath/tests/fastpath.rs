//! Fastpath calls over a scripted in-memory socket.
use std::{
    io::{self, Cursor, Read, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use pgfastpath::{
    Config, Connection, ErrorKind, Fastpath, FastpathArg, FastpathValue, PgTransport, ServerError,
    postgres::ProtocolVersion,
};

// =============================================================================
// Mock socket
// =============================================================================

#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Blocks socket reads until opened.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
    waiting: AtomicBool,
}

impl Gate {
    fn wait(&self) {
        self.waiting.store(true, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }

    fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    fn wait_for_reader(&self) {
        while !self.waiting.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    }
}

struct MockSocket {
    input: Cursor<Vec<u8>>,
    output: Output,
    chunk: usize,
    fail_write: bool,
    gate: Option<Arc<Gate>>,
}

impl MockSocket {
    fn new(input: Vec<u8>) -> (Self, Output) {
        let output = Output::default();
        let socket = Self {
            input: Cursor::new(input),
            output: output.clone(),
            chunk: usize::MAX,
            fail_write: false,
            gate: None,
        };
        (socket, output)
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        let n = buf.len().min(self.chunk);
        self.input.read(&mut buf[..n])
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        self.output.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

type MockFastpath = Fastpath<Connection<MockSocket>>;

fn fastpath(socket: MockSocket, protocol: ProtocolVersion) -> (MockFastpath, Arc<AtomicUsize>) {
    let discarded = Arc::new(AtomicUsize::new(0));
    let d = discarded.clone();
    let conn = Connection::new(socket, Config::new().protocol(protocol))
        .on_discard(move || { d.fetch_add(1, Ordering::SeqCst); });
    (Fastpath::new(conn), discarded)
}

// =============================================================================
// Backend messages
// =============================================================================

fn message(msgtype: u8, body: &[u8]) -> Vec<u8> {
    let mut msg = vec![msgtype];
    msg.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
    msg.extend_from_slice(body);
    msg
}

fn ready() -> Vec<u8> {
    message(b'Z', b"I")
}

fn value(value: &[u8]) -> Vec<u8> {
    let mut body = (value.len() as i32).to_be_bytes().to_vec();
    body.extend_from_slice(value);
    message(b'V', &body)
}

fn notice(msg: &str) -> Vec<u8> {
    let body = format!("SNOTICE\0M{msg}\0\0");
    message(b'N', body.as_bytes())
}

fn error(msg: &str) -> Vec<u8> {
    let body = format!("SERROR\0C42883\0M{msg}\0\0");
    message(b'E', body.as_bytes())
}

// =============================================================================
// Protocol 3.0
// =============================================================================

#[test]
fn v3_request_frame() {
    let (socket, output) = MockSocket::new([value(&3i32.to_be_bytes()), ready()].concat());
    let (fp, _) = fastpath(socket, ProtocolVersion::V3);

    let args = [FastpathArg::from(7i32), FastpathArg::Null, FastpathArg::from(&b"xy"[..])];
    assert_eq!(fp.call(952, true, &args).unwrap(), FastpathValue::Int(3));

    let mut expected = vec![b'F'];
    expected.extend_from_slice(&(16 + 8 + 4 + 6i32).to_be_bytes());
    expected.extend_from_slice(&952i32.to_be_bytes());
    expected.extend_from_slice(&[0, 1, 0, 1, 0, 3]);
    expected.extend_from_slice(&[0, 0, 0, 4, 0, 0, 0, 7]);
    expected.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    expected.extend_from_slice(&[0, 0, 0, 2, b'x', b'y']);
    expected.extend_from_slice(&[0, 1]);
    assert_eq!(output.take(), expected);
}

#[test]
fn v3_one_byte_reads() {
    let (mut socket, _) = MockSocket::new([value(b"0123456789"), ready()].concat());
    socket.chunk = 1;
    let (fp, _) = fastpath(socket, ProtocolVersion::V3);
    fp.add_function("loread", 954);

    let data = fp.get_data("loread", &[FastpathArg::from(0i32), FastpathArg::from(10i32)]).unwrap();
    assert_eq!(data, Bytes::from_static(b"0123456789"));
}

#[test]
fn v3_error_then_next_call() {
    let input = [
        error("function 1 does not exist"),
        ready(),
        value(&5i32.to_be_bytes()),
        ready(),
    ]
    .concat();
    let (socket, _) = MockSocket::new(input);
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);

    let err = fp.call(1, true, &[] as &[FastpathArg]).unwrap_err();
    match err.kind() {
        ErrorKind::Server(ServerError::Response(rec)) => {
            assert_eq!(rec.code(), Some("42883"));
            assert_eq!(rec.message(), "function 1 does not exist");
        },
        e => panic!("unexpected error: {e}"),
    }
    assert!(!err.is_fatal());
    assert!(!fp.connection().is_broken());

    // the pending `ReadyForQuery` is skipped first
    assert_eq!(fp.call(2, true, &[] as &[FastpathArg]).unwrap(), FastpathValue::Int(5));
    assert_eq!(discarded.load(Ordering::SeqCst), 0);
}

#[test]
fn v3_notice_reaches_connection() {
    let input = [notice("large object 16403 truncated"), value(b"ok"), ready()].concat();
    let (socket, _) = MockSocket::new(input);

    let notices = Arc::new(Mutex::new(Vec::new()));
    let n = notices.clone();
    let conn = Connection::new(socket, Config::new())
        .on_notice(move |notice| n.lock().push(notice.message().to_owned()));
    let fp = Fastpath::new(conn);

    let result = fp.call(954, false, &[FastpathArg::from(0i32)]).unwrap();
    assert_eq!(result, FastpathValue::Bytes(Bytes::from_static(b"ok")));
    assert_eq!(*notices.lock(), ["large object 16403 truncated"]);
}

#[test]
fn v3_protocol_violation_discards() {
    let (socket, _) = MockSocket::new(message(b'T', b""));
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);

    let err = fp.call(1, false, &[] as &[FastpathArg]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    assert!(fp.connection().is_broken());
    assert_eq!(discarded.load(Ordering::SeqCst), 1);
}

#[test]
fn convenience_accessors() {
    let input = [
        value(&(-2i32).to_be_bytes()),
        ready(),
        value(&(1i64 << 40).to_be_bytes()),
        ready(),
        value(b""),
        ready(),
        message(b'V', &(-1i32).to_be_bytes()),
        ready(),
    ]
    .concat();
    let (socket, _) = MockSocket::new(input);
    let (fp, _) = fastpath(socket, ProtocolVersion::V3);
    fp.add_functions([("lo_creat", "957"), ("lo_tell64", "3172"), ("loread", "954")]).unwrap();

    assert_eq!(fp.get_oid("lo_creat", &[FastpathArg::from(-1i32)]).unwrap(), u32::MAX - 1);
    assert_eq!(fp.get_long("lo_tell64", &[FastpathArg::from(0i32)]).unwrap(), 1 << 40);
    assert_eq!(fp.get_data("loread", &[FastpathArg::from(0i32)]).unwrap(), Bytes::new());

    let err = fp.get_data("loread", &[FastpathArg::from(0i32)]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnexpectedResult(e) if e.found() == "null"));
    assert!(!fp.connection().is_broken());
}

#[test]
fn unknown_function_name() {
    let (socket, output) = MockSocket::new(vec![]);
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);
    fp.add_function("lo_open", 952);

    let err = fp.get_integer("lo_opne", &[FastpathArg::from(1i32)]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FunctionNotFound(e) if e.name() == "lo_opne"));
    assert!(output.take().is_empty());
    assert_eq!(discarded.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Protocol 2.0
// =============================================================================

#[test]
fn v2_request_and_result() {
    let (socket, output) = MockSocket::new(b"VG\0\0\0\x04\0\0\0\x090Z".to_vec());
    let (fp, _) = fastpath(socket, ProtocolVersion::V2);
    fp.add_function("lo_open", 952);

    let fd = fp.get_integer("lo_open", &[FastpathArg::oid(16403), FastpathArg::from(0x20000i32)]);
    assert_eq!(fd.unwrap(), 9);

    let mut expected = b"F\0".to_vec();
    expected.extend_from_slice(&952i32.to_be_bytes());
    expected.extend_from_slice(&2i32.to_be_bytes());
    expected.extend_from_slice(&[0, 0, 0, 4]);
    expected.extend_from_slice(&16403i32.to_be_bytes());
    expected.extend_from_slice(&[0, 0, 0, 4]);
    expected.extend_from_slice(&0x20000i32.to_be_bytes());
    assert_eq!(output.take(), expected);
}

#[test]
fn v2_errors_are_aggregated() {
    let (socket, _) = MockSocket::new(b"EERROR:  bad fd\n\0NNOTICE:  closing\n\0V0Z".to_vec());
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V2);

    let err = fp.call(953, true, &[FastpathArg::from(3i32)]).unwrap_err();
    match err.kind() {
        ErrorKind::Server(ServerError::Legacy(msg)) => {
            assert_eq!(msg, "ERROR:  bad fd\nNOTICE:  closing\n");
        },
        e => panic!("unexpected error: {e}"),
    }
    assert_eq!(discarded.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Failure contract
// =============================================================================

#[test]
fn write_failure_discards_once() {
    let (mut socket, _) = MockSocket::new(vec![]);
    socket.fail_write = true;
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);

    let err = fp.call(952, false, &[FastpathArg::from(1i32)]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConnectionBroken(_)));
    assert!(err.is_fatal());
    assert_eq!(discarded.load(Ordering::SeqCst), 1);

    let err = fp.call(952, false, &[FastpathArg::from(1i32)]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConnectionBroken(_)));
    assert_eq!(discarded.load(Ordering::SeqCst), 1);
}

#[test]
fn eof_discards() {
    let (socket, _) = MockSocket::new(value(b"abc")[..7].to_vec());
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);

    let err = fp.call(954, false, &[] as &[FastpathArg]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConnectionBroken(_)));
    assert_eq!(discarded.load(Ordering::SeqCst), 1);
}

#[test]
fn waiting_call_fails_after_discard() {
    let gate = Arc::new(Gate::default());
    let input = [message(b'T', b""), value(&42i32.to_be_bytes()), ready()].concat();
    let (mut socket, output) = MockSocket::new(input);
    socket.gate = Some(gate.clone());
    let (fp, discarded) = fastpath(socket, ProtocolVersion::V3);
    let fp = Arc::new(fp);

    let first = {
        let fp = fp.clone();
        thread::spawn(move || fp.call(1, true, &[] as &[FastpathArg]))
    };
    gate.wait_for_reader();

    // blocks on the connection lock held by the first call
    let second = {
        let fp = fp.clone();
        thread::spawn(move || fp.call(2, true, &[] as &[FastpathArg]))
    };
    thread::sleep(Duration::from_millis(50));
    gate.open();

    let err = first.join().unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol(_)));

    let err = second.join().unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConnectionBroken(_)));

    assert_eq!(discarded.load(Ordering::SeqCst), 1);
    // only the first request was written
    assert_eq!(output.take().len(), 1 + 16);
}

#[test]
fn concurrent_calls_are_serialized() {
    const THREADS: usize = 8;

    let payload = |k: usize| vec![b'a' + k as u8; 10 + 7 * k];
    let input = (0..THREADS)
        .flat_map(|k| [value(&payload(k)), ready()].concat())
        .collect::<Vec<_>>();
    let (mut socket, output) = MockSocket::new(input);
    socket.chunk = 1;
    let (fp, _) = fastpath(socket, ProtocolVersion::V3);
    let fp = Arc::new(fp);

    let handles = (0..THREADS)
        .map(|i| {
            let fp = fp.clone();
            thread::spawn(move || {
                let arg = FastpathArg::from(vec![i as u8; 64 + i]);
                fp.call(2000 + i as i32, false, &[arg])
            })
        })
        .collect::<Vec<_>>();

    // each call decodes one whole response
    let mut results = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().try_bytes().unwrap().to_vec())
        .collect::<Vec<_>>();
    results.sort();
    assert_eq!(results, (0..THREADS).map(payload).collect::<Vec<_>>());

    // every request frame is whole, none interleaved
    let output = output.take();
    let mut buf = &output[..];
    let mut seen = vec![];
    while !buf.is_empty() {
        assert_eq!(buf[0], b'F');
        let len = i32::from_be_bytes(buf[1..5].try_into().unwrap()) as usize;
        let fnid = i32::from_be_bytes(buf[5..9].try_into().unwrap());
        let i = (fnid - 2000) as usize;
        assert_eq!(len, 16 + 4 + 64 + i);
        assert!(buf[19..19 + 64 + i].iter().all(|b| *b == i as u8));
        seen.push(i);
        buf = &buf[1 + len..];
    }
    seen.sort();
    assert_eq!(seen, (0..THREADS).collect::<Vec<_>>());
}
