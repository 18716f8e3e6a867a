//! Postgres fastpath function call
//!
//! Fastpath calls a server side function by its object id, bypassing the
//! query protocol. Both protocol 3.0 and the legacy protocol 2.0 are supported.
//!
//! The connection must already be established and authenticated, this crate
//! only takes over the socket.
//!
//! # Examples
//!
//! ```no_run
//! use std::net::TcpStream;
//! use pgfastpath::{Config, Connection, Fastpath, FastpathArg, FastpathValue};
//!
//! # fn app(socket: TcpStream) -> pgfastpath::Result<()> {
//! let fp = Fastpath::new(Connection::new(socket, Config::new()));
//!
//! fp.add_functions([("lo_open", "952"), ("loread", "954")])?;
//!
//! let fd = fp.get_integer("lo_open", &[FastpathArg::oid(16403), FastpathArg::from(0x40000i32)])?;
//! let data = fp.get_data("loread", &[FastpathArg::from(fd), FastpathArg::from(1024i32)])?;
//!
//! // by function id
//! let value = fp.call(954, false, &[FastpathArg::from(fd), FastpathArg::from(1024i32)])?;
//! assert!(matches!(value, FastpathValue::Bytes(_) | FastpathValue::Null));
//! # Ok(())
//! # }
//! ```
//!
//! Sharing a connection between threads:
//!
//! ```no_run
//! use std::{net::TcpStream, sync::Arc, thread};
//! use pgfastpath::{Config, Connection, Fastpath, FastpathArg};
//!
//! # fn app(socket: TcpStream) -> pgfastpath::Result<()> {
//! let fp = Arc::new(Fastpath::new(Connection::new(socket, Config::new())));
//! fp.add_function("lo_close", 953);
//!
//! let handles = (0..4)
//!     .map(|fd| {
//!         let fp = fp.clone();
//!         thread::spawn(move || fp.get_integer("lo_close", &[FastpathArg::from(fd as i32)]))
//!     })
//!     .collect::<Vec<_>>();
//!
//! for h in handles {
//!     h.join().unwrap()?;
//! }
//! # Ok(())
//! # }
//! ```

mod common;
mod ext;

// Protocol
pub mod postgres;

// Component
pub mod arg;
pub mod registry;
pub mod codec;

// Operation
pub mod transport;
pub mod fastpath;

// Connection
pub mod connection;

mod error;


pub use arg::{FastpathArg, FunctionArg};
pub use registry::FunctionRegistry;
pub use codec::FastpathValue;
pub use transport::PgTransport;
pub use fastpath::{Fastpath, Function};
pub use connection::{Connection, Config};
pub use error::{Error, ErrorKind, ServerError, Result};
