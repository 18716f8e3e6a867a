use std::{env::var, net::TcpStream, sync::Arc, thread};

use tracing::trace_span;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use pgfastpath::{
    Config, Connection, ErrorKind, Fastpath, FastpathArg, Result, postgres::ProtocolVersion,
};

mod server;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let protocol = match var("FASTPATH_PROTOCOL") {
        Ok(version) => version.parse::<ProtocolVersion>()?,
        Err(_) => ProtocolVersion::V3,
    };

    let _s = trace_span!("large_object", %protocol).entered();
    large_object(protocol)
}

fn large_object(protocol: ProtocolVersion) -> Result<()> {
    let addr = server::spawn(protocol)?;
    let socket = TcpStream::connect(addr)?;

    let conn = Connection::new(socket, Config::new().protocol(protocol))
        .on_notice(|notice| tracing::info!("{notice}"))
        .on_discard(|| tracing::error!("connection discarded"));
    let fp = Arc::new(Fastpath::new(conn));

    fp.add_functions([
        ("lo_creat", server::LO_CREAT),
        ("lo_open", server::LO_OPEN),
        ("lo_close", server::LO_CLOSE),
        ("loread", server::LOREAD),
        ("lowrite", server::LOWRITE),
        ("lo_lseek64", server::LO_LSEEK64),
        ("lo_tell64", server::LO_TELL64),
    ])?;

    let oid = fp.get_oid("lo_creat", &[FastpathArg::from(-1i32)])?;
    let fd = fp.get_integer("lo_open", &[FastpathArg::oid(oid), FastpathArg::from(0x60000i32)])?;

    let written = fp.get_integer("lowrite", &[FastpathArg::from(fd), FastpathArg::from("Hello fastpath!")])?;
    assert_eq!(written, 15);

    let pos = fp.get_long("lo_tell64", &[FastpathArg::from(fd)])?;
    assert_eq!(pos, 15);

    fp.get_long("lo_lseek64", &[FastpathArg::from(fd), FastpathArg::from(0i64), FastpathArg::from(0i32)])?;

    // concurrent reads are serialized on the connection
    let handles = (0..3)
        .map(|_| {
            let fp = fp.clone();
            thread::spawn(move || fp.get_data("loread", &[FastpathArg::from(fd), FastpathArg::from(5i32)]))
        })
        .collect::<Vec<_>>();

    let mut chunks = vec![];
    for h in handles {
        chunks.push(h.join().expect("reader panicked")?);
    }
    chunks.sort();
    assert_eq!(chunks, [&b" fast"[..], &b"Hello"[..], &b"path!"[..]]);

    // server error leaves the connection usable
    match fp.call(1, false, &[FastpathArg::Null]) {
        Err(err) if matches!(err.kind(), ErrorKind::Server(_)) => tracing::info!("expected error: {err}"),
        other => panic!("expected server error, got {other:?}"),
    }

    fp.get_integer("lo_close", &[FastpathArg::from(fd)])?;
    tracing::info!(oid, "large object roundtrip done");

    Ok(())
}
